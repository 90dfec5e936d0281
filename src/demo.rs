//! Built-in walkthrough: a handful of transition requests printed as they
//! run. Content goes to the configured storage backend; submission records,
//! permissions and sinks are in-memory.

use std::sync::Arc;

use anyhow::Result;

use crate::collaborators::{LogSink, MemoryStore, StaticPermissions};
use crate::config::PubflowConfig;
use crate::job::{AuditRecord, JobEngine};
use crate::storage::Tier;
use crate::submission::{Actor, SubmissionVersion};
use crate::transition::TransitionService;
use crate::ui::{self, TransitionProgress};
use crate::workflow::WorkflowRegistry;
use crate::workflow::builtin::{self, SCOPE_REVIEW, SCOPE_UPDATE};

struct Step {
    version: &'static str,
    target: &'static str,
    actor: Option<&'static str>,
}

const STEPS: &[Step] = &[
    Step {
        version: "v1",
        target: "PUBLISHED",
        actor: Some("editor"),
    },
    Step {
        version: "v1",
        target: "UNPUBLISHED",
        actor: Some("editor"),
    },
    Step {
        version: "v1",
        target: "PUBLISHED",
        actor: Some("editor"),
    },
    Step {
        version: "v1",
        target: "RETRACTED",
        actor: Some("editor"),
    },
    Step {
        version: "v2",
        target: "UNPUBLISHED",
        actor: Some("editor"),
    },
    Step {
        version: "v3",
        target: "IN_REVIEW",
        actor: Some("editor"),
    },
    Step {
        version: "v3",
        target: "IN_REVIEW",
        actor: Some("reviewer"),
    },
    Step {
        version: "v3",
        target: "PUBLISHED",
        actor: Some("reviewer"),
    },
    Step {
        version: "v3",
        target: "ACCEPTED",
        actor: None,
    },
    Step {
        version: "v4",
        target: "REJECTED",
        actor: Some("editor"),
    },
];

pub async fn run(config: &PubflowConfig, registry: Arc<WorkflowRegistry>) -> Result<()> {
    let storage = config.storage_tiers();
    let store = Arc::new(MemoryStore::new());

    storage
        .put_object(Tier::Private, "bundles/v1", b"paper one".to_vec())
        .await?;
    storage
        .put_object(Tier::Private, "bundles/v3", b"paper three".to_vec())
        .await?;
    // Nothing is stored for v2, so unpublishing it fails.
    for tier in [Tier::Public, Tier::Private] {
        storage.delete(tier, "bundles/v2").await?;
    }

    let private = storage.reference(Tier::Private).to_string();
    let public = storage.reference(Tier::Public).to_string();
    for (id, workflow, status, cdn) in [
        ("v1", builtin::SIMPLE, "PENDING", &private),
        ("v2", builtin::SIMPLE, "PUBLISHED", &public),
        ("v3", builtin::CLOSED_REVIEW, "PENDING", &private),
        ("v4", builtin::SIMPLE, "PENDING", &private),
    ] {
        let key = format!("bundles/{id}");
        let version = SubmissionVersion::new(id, "site-1", workflow, status, cdn, key);
        store.insert_version(version.with_slug(format!("paper-{id}")));
    }

    let permissions = StaticPermissions::new()
        .grant("editor", SCOPE_UPDATE)
        .grant("reviewer", SCOPE_REVIEW)
        .grant("reviewer", SCOPE_UPDATE);
    let engine = JobEngine::new(
        store.clone(),
        Some(storage),
        config.notifier()?,
        Arc::new(LogSink),
    );
    let service = TransitionService::new(
        registry,
        store,
        Arc::new(permissions),
        engine,
        Arc::new(LogSink),
    );

    for step in STEPS {
        let actor = step.actor.map(Actor::new);
        ui::heading(&format!(
            "{} -> {} as {}",
            step.version,
            step.target,
            step.actor.unwrap_or("anonymous")
        ));
        let progress = TransitionProgress::start(&format!("{} -> {}", step.version, step.target));
        let response = service
            .request_transition(step.version, step.target, actor.as_ref())
            .await;
        progress.complete(&response);
        if let Some(job) = &response.job {
            progress.print_audit(&AuditRecord::from_job(job));
        }
        println!();
    }
    Ok(())
}
