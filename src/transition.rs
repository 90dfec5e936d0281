//! The caller-facing transition operation.
//!
//! [`TransitionService::request_transition`] checks the request against the
//! governing workflow and the actor's scopes, then either hands off to the
//! [`JobEngine`] or writes the new status directly.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use crate::collaborators::{AnalyticsSink, PermissionOracle, SubmissionStore};
use crate::error::PubflowError;
use crate::job::{Job, JobEngine, JobRun, JobStatus, resolve_job_kind};
use crate::submission::{Actor, SubmissionVersion, VersionPatch};
use crate::workflow::{WorkflowRegistry, WorkflowTransition, get_valid_transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// What the routing layer sends back for one transition request.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResponse {
    pub status: ResponseStatus,
    /// HTTP-equivalent status code.
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_version: Option<SubmissionVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TransitionResponse {
    fn ok(version: SubmissionVersion, job: Option<Job>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            code: 200,
            job,
            submission_version: Some(version),
            message: None,
        }
    }

    fn error(error: &PubflowError, job: Option<Job>) -> Self {
        let message = job
            .as_ref()
            .and_then(|j| j.message.clone())
            .unwrap_or_else(|| error.to_string());
        Self {
            status: ResponseStatus::Error,
            code: error.status_code(),
            job,
            submission_version: None,
            message: Some(message),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

pub struct TransitionService {
    registry: Arc<WorkflowRegistry>,
    store: Arc<dyn SubmissionStore>,
    permissions: Arc<dyn PermissionOracle>,
    engine: JobEngine,
    analytics: Arc<dyn AnalyticsSink>,
}

impl TransitionService {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        store: Arc<dyn SubmissionStore>,
        permissions: Arc<dyn PermissionOracle>,
        engine: JobEngine,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            registry,
            store,
            permissions,
            engine,
            analytics,
        }
    }

    /// Move submission version `version_id` to `target_state`.
    ///
    /// Never returns an error: failures become an error response carrying
    /// the status code and, once a job exists, the failed job.
    #[instrument(skip(self, actor), fields(actor = actor.map(|a| a.id.as_str())))]
    pub async fn request_transition(
        &self,
        version_id: &str,
        target_state: &str,
        actor: Option<&Actor>,
    ) -> TransitionResponse {
        match self.try_transition(version_id, target_state, actor).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_client_error() {
                    tracing::info!(code = e.status_code(), error = %e, "transition rejected");
                } else {
                    tracing::error!(code = e.status_code(), error = %e, "transition failed");
                }
                TransitionResponse::error(&e, None)
            }
        }
    }

    async fn try_transition(
        &self,
        version_id: &str,
        target_state: &str,
        actor: Option<&Actor>,
    ) -> Result<TransitionResponse, PubflowError> {
        let actor = actor.ok_or(PubflowError::Unauthenticated)?;

        let version = self
            .store
            .get_submission_version(version_id)
            .await?
            .ok_or_else(|| PubflowError::SubmissionNotFound(version_id.to_string()))?;

        let workflow = self.registry.get(&version.workflow)?;
        if workflow.state(target_state).is_none() {
            return Err(PubflowError::UnknownState {
                workflow: workflow.name.clone(),
                state: target_state.to_string(),
            });
        }
        let transition = get_valid_transition(&workflow, &version.status, target_state)
            .ok_or_else(|| PubflowError::NoTransition {
                from: version.status.clone(),
                to: target_state.to_string(),
            })?;

        for scope in &transition.required_scopes {
            if !self.permissions.has_scope(actor, scope, &version.site) {
                return Err(PubflowError::Forbidden {
                    scope: scope.clone(),
                    resource: version.site.clone(),
                });
            }
        }

        self.ensure_no_running_job(&version).await?;

        let response = if transition.requires_job {
            let kind = resolve_job_kind(&workflow, transition)?;
            match self.engine.run(kind, &version, transition, actor).await? {
                JobRun::Completed { job, version } => TransitionResponse::ok(version, Some(job)),
                JobRun::Failed { job, error } => {
                    return Ok(TransitionResponse::error(&error, Some(job)));
                }
            }
        } else {
            let updated = self.apply_direct(&version, transition).await?;
            TransitionResponse::ok(updated, None)
        };

        let properties = json!({
            "submission_version_id": version.id,
            "site": version.site,
            "workflow": workflow.name,
            "transition": transition.name,
            "from": transition.source_state_name,
            "to": transition.target_state_name,
            "actor": actor.id,
        });
        if let Err(e) = self.analytics.track("submission.transition", properties).await {
            tracing::warn!(error = %e, "analytics event failed");
        }

        Ok(response)
    }

    async fn ensure_no_running_job(&self, version: &SubmissionVersion) -> Result<(), PubflowError> {
        let Some(job_id) = &version.job_id else {
            return Ok(());
        };
        match self.store.get_job(job_id).await? {
            Some(job) if job.status == JobStatus::Running => {
                Err(PubflowError::TransitionInProgress {
                    job_id: job_id.clone(),
                })
            }
            // A marker left behind by a failed job does not block.
            _ => Ok(()),
        }
    }

    async fn apply_direct(
        &self,
        version: &SubmissionVersion,
        transition: &WorkflowTransition,
    ) -> Result<SubmissionVersion, PubflowError> {
        let mut patch = VersionPatch::finish(&transition.target_state_name);
        if transition.options.sets_published_date {
            patch.date_published = Some(Some(Utc::now()));
        }
        let updated = self
            .store
            .update_submission_version(&version.id, version.revision, patch)
            .await?;
        tracing::info!(
            version = %updated.id,
            transition = %transition.name,
            status = %updated.status,
            "status updated"
        );
        Ok(updated)
    }
}
