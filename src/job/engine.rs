//! Runs the storage migration behind a job-requiring transition.
//!
//! Blob store moves are not transactional with the relational status
//! update, so every step is written to the job's `results` before the next
//! one starts. A job that fails part way shows exactly which steps ran:
//! `files_transferred` without `submission_updated` means the content moved
//! but the version still points at the old tier. Nothing is rolled back.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::instrument;

use super::model::{Job, JobKind, JobPayload, JobResults, JobUpdate};
use crate::collaborators::{AnalyticsSink, NotificationSink, SubmissionStore};
use crate::error::PubflowError;
use crate::storage::{StorageError, StorageTiers, Tier};
use crate::submission::{Actor, SubmissionVersion, VersionPatch};
use crate::workflow::{TAG_END, Workflow, WorkflowTransition};

/// How a job ended.
#[derive(Debug)]
pub enum JobRun {
    Completed {
        job: Job,
        version: SubmissionVersion,
    },
    Failed {
        job: Job,
        error: PubflowError,
    },
}

/// Attempts at writing the FAILED status before giving up on the job record.
const MARK_FAILED_ATTEMPTS: u32 = 3;
const MARK_FAILED_BACKOFF: Duration = Duration::from_millis(50);

/// An error plus the message stored on the failed job.
struct Failure {
    message: String,
    error: PubflowError,
}

impl Failure {
    fn storage(action: &str, key: &str, tier: Tier, err: StorageError) -> Self {
        Self {
            message: format!("Failed to {action} {key} in {tier}: {err}"),
            error: err.into(),
        }
    }

    fn precondition(message: String) -> Self {
        Self {
            message: message.clone(),
            error: PubflowError::Precondition(message),
        }
    }
}

impl From<PubflowError> for Failure {
    fn from(error: PubflowError) -> Self {
        Self {
            message: error.to_string(),
            error,
        }
    }
}

impl JobKind {
    /// Tier the content must end up in.
    pub fn target_tier(&self) -> Tier {
        match self {
            JobKind::Publish => Tier::Public,
            JobKind::Unpublish | JobKind::Retract => Tier::Private,
        }
    }

    fn event(&self) -> &'static str {
        match self {
            JobKind::Publish => "submission.published",
            JobKind::Unpublish => "submission.unpublished",
            JobKind::Retract => "submission.retracted",
        }
    }
}

/// The job kind a transition runs: its declared `job_type`, or one inferred
/// from the `published` flags of its source and target states.
pub fn resolve_job_kind(
    workflow: &Workflow,
    transition: &WorkflowTransition,
) -> Result<JobKind, PubflowError> {
    if let Some(kind) = transition.job_type {
        return Ok(kind);
    }
    let source = workflow.state(&transition.source_state_name);
    let target = workflow.state(&transition.target_state_name);
    let inferred = match (source, target) {
        (Some(s), Some(t)) if !s.published && t.published => Some(JobKind::Publish),
        (Some(s), Some(t)) if s.published && !t.published => {
            if t.has_tag(TAG_END) {
                Some(JobKind::Retract)
            } else {
                Some(JobKind::Unpublish)
            }
        }
        _ => None,
    };
    inferred.ok_or_else(|| {
        PubflowError::Configuration(format!(
            "transition {} requires a job but no job type can be inferred",
            transition.name
        ))
    })
}

pub struct JobEngine {
    store: Arc<dyn SubmissionStore>,
    storage: Option<StorageTiers>,
    notifier: Arc<dyn NotificationSink>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl JobEngine {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        storage: Option<StorageTiers>,
        notifier: Arc<dyn NotificationSink>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            store,
            storage,
            notifier,
            analytics,
        }
    }

    /// Run `kind` for `transition` on `version`.
    ///
    /// Returns `Err` only when no job record exists: a missing storage
    /// backend or a failure to create the record. Once the job exists, every
    /// failure is reported as [`JobRun::Failed`] carrying the job as stored
    /// after marking it FAILED.
    #[instrument(
        skip_all,
        fields(job_kind = %kind, version = %version.id, transition = %transition.name)
    )]
    pub async fn run(
        &self,
        kind: JobKind,
        version: &SubmissionVersion,
        transition: &WorkflowTransition,
        actor: &Actor,
    ) -> Result<JobRun, PubflowError> {
        let storage = self.storage.clone().ok_or_else(|| {
            PubflowError::Configuration("no storage backend configured".to_string())
        })?;

        let payload = JobPayload {
            submission_version_id: version.id.clone(),
            transition: transition.name.clone(),
            cdn: version.cdn.clone(),
            key: version.key.clone(),
            actor: actor.id.clone(),
        };
        let mut job = self.store.create_job(Job::new(kind, payload)).await?;
        tracing::info!(job_id = %job.id, "job started");

        let mut marked = None;
        match self
            .execute(&mut job, &storage, version, transition, &mut marked)
            .await
        {
            Ok(updated) => {
                tracing::info!(job_id = %job.id, status = %updated.status, "job completed");
                Ok(JobRun::Completed {
                    job,
                    version: updated,
                })
            }
            Err(failure) => {
                tracing::warn!(job_id = %job.id, error = %failure.message, "job failed");
                self.fail(&mut job, marked.as_ref(), &failure.message).await;
                Ok(JobRun::Failed {
                    job,
                    error: failure.error,
                })
            }
        }
    }

    async fn execute(
        &self,
        job: &mut Job,
        storage: &StorageTiers,
        version: &SubmissionVersion,
        transition: &WorkflowTransition,
        marked: &mut Option<SubmissionVersion>,
    ) -> Result<SubmissionVersion, Failure> {
        let kind = job.kind;
        let key = version.key.as_str();

        let mut step = JobResults::empty(kind);
        step.progress_mut().set_key(key);
        self.record(job, step).await?;

        let version = self
            .store
            .update_submission_version(
                &version.id,
                version.revision,
                VersionPatch::start_job(&job.id, &transition.name),
            )
            .await
            .map_err(PubflowError::from)?;
        *marked = Some(version.clone());

        let target = kind.target_tier();
        let current = storage
            .tier_from_reference(&version.cdn)
            .map_err(PubflowError::from)?;
        if current != target {
            let transferred = match kind {
                JobKind::Publish => publish_files(storage, key).await?,
                JobKind::Unpublish | JobKind::Retract => withdraw_files(storage, kind, key).await?,
            };
            if let Some(transferred) = transferred {
                let mut step = JobResults::empty(kind);
                step.progress_mut().set_files_transferred(transferred);
                self.record(job, step).await?;
            }
        }

        let mut patch = VersionPatch::finish(&transition.target_state_name);
        patch.cdn = Some(
            storage
                .urls()
                .rebase(&version.cdn, target)
                .map_err(PubflowError::from)?,
        );
        let mut outcome = JobResults::empty(kind);
        match &mut outcome {
            JobResults::Publish(results) => {
                if transition.options.sets_published_date {
                    let now = Utc::now();
                    patch.date_published = Some(Some(now));
                    results.set_date_published(now);
                }
                if transition.options.updates_slug {
                    if let Some(slug) = &version.slug {
                        patch.live_slug = Some(Some(slug.clone()));
                        results.set_slug(slug);
                    }
                }
            }
            JobResults::Retract(results) => {
                if transition.options.updates_slug {
                    patch.live_slug = Some(None);
                    results.set_slug_released(true);
                }
            }
            JobResults::Unpublish(_) => {}
        }

        let updated = self
            .store
            .update_submission_version(&version.id, version.revision, patch)
            .await
            .map_err(|e| Failure {
                message: format!("Failed to update submission version: {e}"),
                error: e.into(),
            })?;
        *marked = Some(updated.clone());

        outcome.progress_mut().set_submission_updated(true);
        self.record(job, outcome).await?;

        let metadata = json!({
            "submission_version_id": updated.id,
            "site": updated.site,
            "job_id": job.id,
            "transition": transition.name,
            "status": updated.status,
            "actor": job.payload.actor,
        });
        if let Err(e) = self.notifier.notify(kind.event(), metadata.clone()).await {
            tracing::warn!(job_id = %job.id, error = %e, "notification failed");
        }
        if let Err(e) = self.analytics.track("job.completed", metadata).await {
            tracing::warn!(job_id = %job.id, error = %e, "analytics event failed");
        }

        *job = self
            .store
            .update_job(&job.id, JobUpdate::completed(format!("{kind} completed")))
            .await
            .map_err(PubflowError::from)?;
        Ok(updated)
    }

    async fn record(&self, job: &mut Job, results: JobResults) -> Result<(), Failure> {
        *job = self
            .store
            .update_job(&job.id, JobUpdate::results(results))
            .await
            .map_err(PubflowError::from)?;
        Ok(())
    }

    /// Mark the job FAILED, retrying a few times.
    ///
    /// If the store never accepts the FAILED status the job record stays
    /// RUNNING, so the version's job marker is cleared instead; otherwise
    /// the version would look busy forever. Errors here are logged, never
    /// returned, so they don't hide the failure that got us here. `job` ends
    /// up as the stored record whenever the store can be read.
    async fn fail(&self, job: &mut Job, marked: Option<&SubmissionVersion>, message: &str) {
        for attempt in 1..=MARK_FAILED_ATTEMPTS {
            match self.store.update_job(&job.id, JobUpdate::failed(message)).await {
                Ok(updated) => {
                    *job = updated;
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        job_id = %job.id,
                        attempt,
                        error = %e,
                        "could not mark job failed"
                    );
                    if attempt < MARK_FAILED_ATTEMPTS {
                        tokio::time::sleep(MARK_FAILED_BACKOFF * attempt).await;
                    }
                }
            }
        }

        if let Some(version) = marked.filter(|v| v.job_id.as_deref() == Some(job.id.as_str())) {
            let release = VersionPatch {
                job_id: Some(None),
                active_transition: Some(None),
                ..Default::default()
            };
            match self
                .store
                .update_submission_version(&version.id, version.revision, release)
                .await
            {
                Ok(_) => {
                    tracing::warn!(job_id = %job.id, version = %version.id, "released job marker");
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "could not release job marker");
                }
            }
        }

        match self.store.get_job(&job.id).await {
            Ok(Some(stored)) => *job = stored,
            Ok(None) => tracing::error!(job_id = %job.id, "job record missing"),
            Err(e) => tracing::error!(job_id = %job.id, error = %e, "could not reload job"),
        }
    }
}

/// Move public content into the private tier.
///
/// `Some(true)` when storage changed, `None` when the content was already
/// private only.
async fn withdraw_files(
    storage: &StorageTiers,
    kind: JobKind,
    key: &str,
) -> Result<Option<bool>, Failure> {
    let in_public = storage
        .exists(Tier::Public, key)
        .await
        .map_err(|e| Failure::storage("check", key, Tier::Public, e))?;
    let in_private = storage
        .exists(Tier::Private, key)
        .await
        .map_err(|e| Failure::storage("check", key, Tier::Private, e))?;

    match (in_public, in_private) {
        (true, true) => {
            // The private copy is the source of truth.
            storage
                .delete(Tier::Public, key)
                .await
                .map_err(|e| Failure::storage("delete", key, Tier::Public, e))?;
            Ok(Some(true))
        }
        (true, false) => {
            storage
                .move_object(key, Tier::Public, Tier::Private)
                .await
                .map_err(|e| Failure::storage("move", key, Tier::Public, e))?;
            Ok(Some(true))
        }
        (false, true) => Ok(None),
        (false, false) => Err(Failure::precondition(format!(
            "Cannot {kind}, no copy exists in pub or prv"
        ))),
    }
}

/// Copy private content to the public tier, keeping the private copy.
///
/// `Some(true)` when a copy was made, `Some(false)` when both tiers already
/// held the content, `None` when it was only public.
async fn publish_files(storage: &StorageTiers, key: &str) -> Result<Option<bool>, Failure> {
    let in_private = storage
        .exists(Tier::Private, key)
        .await
        .map_err(|e| Failure::storage("check", key, Tier::Private, e))?;
    let in_public = storage
        .exists(Tier::Public, key)
        .await
        .map_err(|e| Failure::storage("check", key, Tier::Public, e))?;

    match (in_private, in_public) {
        (true, false) => {
            storage
                .copy_object(key, Tier::Private, Tier::Public)
                .await
                .map_err(|e| Failure::storage("copy", key, Tier::Private, e))?;
            Ok(Some(true))
        }
        (true, true) => Ok(Some(false)),
        (false, true) => Ok(None),
        (false, false) => Err(Failure::precondition(
            "Cannot publish, no copy exists in prv or pub".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryStore, RecordingSink, StoreError};
    use crate::job::{JobStatus, PublishResults, RetractResults, UnpublishResults};
    use crate::storage::{MemoryBlobStore, TierUrls};
    use crate::workflow::{WorkflowState, builtin, get_valid_transition};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PRV: &str = "https://prv.cdn.example.org";
    const PUB: &str = "https://cdn.example.org";

    struct Fixture {
        store: Arc<MemoryStore>,
        blobs: Arc<MemoryBlobStore>,
        sink: Arc<RecordingSink>,
        engine: JobEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        fixture_with_store(store.clone(), store)
    }

    fn fixture_with_store(
        store: Arc<MemoryStore>,
        backend: Arc<dyn SubmissionStore>,
    ) -> Fixture {
        let blobs = Arc::new(MemoryBlobStore::new());
        let sink = Arc::new(RecordingSink::new());
        let storage = StorageTiers::new(blobs.clone(), TierUrls::new(PRV, PUB));
        let engine = JobEngine::new(backend, Some(storage), sink.clone(), sink.clone());
        Fixture {
            store,
            blobs,
            sink,
            engine,
        }
    }

    fn published(key: &str) -> SubmissionVersion {
        let mut v = SubmissionVersion::new("v1", "site-1", builtin::SIMPLE, "PUBLISHED", PUB, key)
            .with_slug("my-paper");
        v.live_slug = Some("my-paper".into());
        v
    }

    fn transition(from: &str, to: &str) -> WorkflowTransition {
        get_valid_transition(&builtin::simple(), from, to)
            .unwrap()
            .clone()
    }

    async fn run(
        f: &Fixture,
        kind: JobKind,
        version: SubmissionVersion,
        t: &WorkflowTransition,
    ) -> JobRun {
        f.store.insert_version(version.clone());
        f.engine
            .run(kind, &version, t, &Actor::new("editor"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unpublish_public_only_moves_content() {
        let f = fixture();
        f.blobs.put(Tier::Public, "k1", b"bundle".to_vec());
        let t = transition("PUBLISHED", "UNPUBLISHED");

        let outcome = run(&f, JobKind::Unpublish, published("k1"), &t).await;

        let JobRun::Completed { job, version } = outcome else {
            panic!("expected completed job");
        };
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            job.results,
            JobResults::Unpublish(UnpublishResults {
                key: Some("k1".into()),
                files_transferred: Some(true),
                submission_updated: Some(true),
            })
        );
        assert_eq!(version.status, "UNPUBLISHED");
        assert_eq!(version.cdn, PRV);
        assert!(version.job_id.is_none());
        assert!(version.active_transition.is_none());
        assert!(!f.blobs.contains(Tier::Public, "k1"));
        assert_eq!(f.blobs.get(Tier::Private, "k1").unwrap(), b"bundle".to_vec());
        assert_eq!(
            f.sink.event_names(),
            vec!["submission.unpublished", "job.completed"]
        );
    }

    #[tokio::test]
    async fn unpublish_with_both_copies_deletes_public_only() {
        let f = fixture();
        f.blobs.put(Tier::Public, "k1", b"public".to_vec());
        f.blobs.put(Tier::Private, "k1", b"private".to_vec());
        let t = transition("PUBLISHED", "UNPUBLISHED");

        let outcome = run(&f, JobKind::Unpublish, published("k1"), &t).await;

        let JobRun::Completed { job, version } = outcome else {
            panic!("expected completed job");
        };
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.results.files_transferred(), Some(true));
        assert_eq!(version.status, "UNPUBLISHED");
        assert_eq!(version.cdn, PRV);
        assert!(!f.blobs.contains(Tier::Public, "k1"));
        assert_eq!(f.blobs.get(Tier::Private, "k1").unwrap(), b"private".to_vec());
    }

    #[tokio::test]
    async fn unpublish_with_no_copy_fails_precondition() {
        let f = fixture();
        let t = transition("PUBLISHED", "UNPUBLISHED");

        let outcome = run(&f, JobKind::Unpublish, published("k1"), &t).await;

        let JobRun::Failed { job, error } = outcome else {
            panic!("expected failed job");
        };
        assert_eq!(job.status, JobStatus::Failed);
        assert!(
            job.message
                .as_deref()
                .unwrap()
                .contains("no copy exists in pub or prv")
        );
        assert_eq!(error.status_code(), 422);
        assert_eq!(f.store.version("v1").unwrap().status, "PUBLISHED");
        assert_eq!(f.store.jobs()[0].status, JobStatus::Failed);
        assert!(f.sink.events().is_empty());
    }

    #[tokio::test]
    async fn unpublish_private_only_moves_nothing() {
        let f = fixture();
        f.blobs.put(Tier::Private, "k1", b"private".to_vec());
        let t = transition("PUBLISHED", "UNPUBLISHED");

        let outcome = run(&f, JobKind::Unpublish, published("k1"), &t).await;

        let JobRun::Completed { job, version } = outcome else {
            panic!("expected completed job");
        };
        assert_eq!(job.results.files_transferred(), None);
        assert_eq!(job.results.submission_updated(), Some(true));
        assert_eq!(version.cdn, PRV);
    }

    #[tokio::test]
    async fn unpublish_keeps_path_below_cdn_base() {
        let f = fixture();
        f.blobs.put(Tier::Public, "k1", b"bundle".to_vec());
        let mut version = published("k1");
        version.cdn = format!("{PUB}/sites/site-1/");
        let t = transition("PUBLISHED", "UNPUBLISHED");

        let outcome = run(&f, JobKind::Unpublish, version, &t).await;

        let JobRun::Completed { version, .. } = outcome else {
            panic!("expected completed job");
        };
        assert_eq!(version.cdn, format!("{PRV}/sites/site-1"));
        assert!(f.blobs.contains(Tier::Private, "k1"));
    }

    #[tokio::test]
    async fn unpublish_already_private_skips_storage() {
        let f = fixture();
        let mut version = published("k1");
        version.cdn = format!("{PRV}/");
        let t = transition("PUBLISHED", "UNPUBLISHED");

        let outcome = run(&f, JobKind::Unpublish, version, &t).await;

        let JobRun::Completed { job, version } = outcome else {
            panic!("expected completed job");
        };
        assert_eq!(job.results.files_transferred(), None);
        assert_eq!(version.status, "UNPUBLISHED");
    }

    #[tokio::test]
    async fn publish_copies_and_sets_date_and_slug() {
        let f = fixture();
        f.blobs.put(Tier::Private, "k2", b"bundle".to_vec());
        let version = SubmissionVersion::new("v1", "site-1", builtin::SIMPLE, "PENDING", PRV, "k2")
            .with_slug("my-paper");
        let t = transition("PENDING", "PUBLISHED");

        let outcome = run(&f, JobKind::Publish, version, &t).await;

        let JobRun::Completed { job, version } = outcome else {
            panic!("expected completed job");
        };
        let JobResults::Publish(PublishResults {
            key,
            files_transferred,
            submission_updated,
            date_published,
            slug,
        }) = job.results
        else {
            panic!("expected publish results");
        };
        assert_eq!(key.as_deref(), Some("k2"));
        assert_eq!(files_transferred, Some(true));
        assert_eq!(submission_updated, Some(true));
        assert_eq!(slug.as_deref(), Some("my-paper"));
        assert_eq!(version.date_published, date_published);
        assert!(version.date_published.is_some());
        assert_eq!(version.live_slug.as_deref(), Some("my-paper"));
        assert_eq!(version.cdn, PUB);
        assert_eq!(version.status, "PUBLISHED");
        assert!(f.blobs.contains(Tier::Private, "k2"));
        assert!(f.blobs.contains(Tier::Public, "k2"));
    }

    #[tokio::test]
    async fn republish_keeps_original_date() {
        let f = fixture();
        f.blobs.put(Tier::Private, "k2", b"bundle".to_vec());
        f.blobs.put(Tier::Public, "k2", b"bundle".to_vec());
        let first = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut version =
            SubmissionVersion::new("v1", "site-1", builtin::SIMPLE, "UNPUBLISHED", PRV, "k2");
        version.date_published = Some(first);
        let t = transition("UNPUBLISHED", "PUBLISHED");

        let outcome = run(&f, JobKind::Publish, version, &t).await;

        let JobRun::Completed { job, version } = outcome else {
            panic!("expected completed job");
        };
        assert_eq!(job.results.files_transferred(), Some(false));
        assert_eq!(version.date_published, Some(first));
        assert!(version.live_slug.is_none());
    }

    #[tokio::test]
    async fn publish_with_no_copy_fails_precondition() {
        let f = fixture();
        let version = SubmissionVersion::new("v1", "site-1", builtin::SIMPLE, "PENDING", PRV, "k2");
        let t = transition("PENDING", "PUBLISHED");

        let outcome = run(&f, JobKind::Publish, version, &t).await;

        let JobRun::Failed { job, error } = outcome else {
            panic!("expected failed job");
        };
        assert_eq!(error.status_code(), 422);
        assert_eq!(
            job.message.as_deref(),
            Some("Cannot publish, no copy exists in prv or pub")
        );
    }

    #[tokio::test]
    async fn retract_releases_slug() {
        let f = fixture();
        f.blobs.put(Tier::Public, "k1", b"bundle".to_vec());
        let t = transition("PUBLISHED", "RETRACTED");

        let outcome = run(&f, JobKind::Retract, published("k1"), &t).await;

        let JobRun::Completed { job, version } = outcome else {
            panic!("expected completed job");
        };
        assert_eq!(
            job.results,
            JobResults::Retract(RetractResults {
                key: Some("k1".into()),
                files_transferred: Some(true),
                submission_updated: Some(true),
                slug_released: Some(true),
            })
        );
        assert_eq!(version.status, "RETRACTED");
        assert!(version.live_slug.is_none());
        assert_eq!(f.sink.event_names()[0], "submission.retracted");
    }

    #[tokio::test]
    async fn missing_storage_fails_before_job_exists() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::new());
        let engine = JobEngine::new(store.clone(), None, sink.clone(), sink);
        let version = published("k1");
        store.insert_version(version.clone());

        let err = engine
            .run(
                JobKind::Unpublish,
                &version,
                &transition("PUBLISHED", "UNPUBLISHED"),
                &Actor::new("editor"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PubflowError::Configuration(_)));
        assert!(store.jobs().is_empty());
    }

    #[tokio::test]
    async fn unknown_tier_reference_fails_job() {
        let f = fixture();
        let mut version = published("k1");
        version.cdn = "https://elsewhere.example.net".into();
        let t = transition("PUBLISHED", "UNPUBLISHED");

        let outcome = run(&f, JobKind::Unpublish, version, &t).await;

        let JobRun::Failed { job, error } = outcome else {
            panic!("expected failed job");
        };
        assert_eq!(error.status_code(), 500);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(f.store.version("v1").unwrap().status, "PUBLISHED");
    }

    /// Fails every version update after the first `allowed`.
    struct FlakyStore {
        inner: Arc<MemoryStore>,
        allowed: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SubmissionStore for FlakyStore {
        async fn get_submission_version(
            &self,
            id: &str,
        ) -> Result<Option<SubmissionVersion>, StoreError> {
            self.inner.get_submission_version(id).await
        }

        async fn update_submission_version(
            &self,
            id: &str,
            expected_revision: u64,
            patch: VersionPatch,
        ) -> Result<SubmissionVersion, StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.allowed {
                return Err(StoreError::Backend("connection reset".into()));
            }
            self.inner
                .update_submission_version(id, expected_revision, patch)
                .await
        }

        async fn create_job(&self, job: Job) -> Result<Job, StoreError> {
            self.inner.create_job(job).await
        }

        async fn update_job(&self, id: &str, update: JobUpdate) -> Result<Job, StoreError> {
            self.inner.update_job(id, update).await
        }

        async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
            self.inner.get_job(id).await
        }
    }

    #[tokio::test]
    async fn status_update_failure_keeps_moved_content() {
        let store = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyStore {
            inner: store.clone(),
            allowed: 1,
            calls: AtomicUsize::new(0),
        });
        let f = fixture_with_store(store, flaky);
        f.blobs.put(Tier::Public, "k1", b"bundle".to_vec());
        let t = transition("PUBLISHED", "UNPUBLISHED");

        let outcome = run(&f, JobKind::Unpublish, published("k1"), &t).await;

        let JobRun::Failed { job, error } = outcome else {
            panic!("expected failed job");
        };
        assert_eq!(error.status_code(), 500);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(
            job.message
                .as_deref()
                .unwrap()
                .starts_with("Failed to update submission version")
        );
        assert_eq!(job.results.files_transferred(), Some(true));
        assert_eq!(job.results.submission_updated(), None);

        let version = f.store.version("v1").unwrap();
        assert_eq!(version.status, "PUBLISHED");
        assert_eq!(version.cdn, PUB);
        assert!(f.blobs.contains(Tier::Private, "k1"));
        assert!(!f.blobs.contains(Tier::Public, "k1"));
    }

    #[tokio::test]
    async fn concurrent_writer_conflict_fails_job() {
        let f = fixture();
        f.blobs.put(Tier::Public, "k1", b"bundle".to_vec());
        let stale = published("k1");
        f.store.insert_version(stale.clone());
        f.store
            .update_submission_version("v1", 0, VersionPatch::finish("RETRACTED"))
            .await
            .unwrap();

        let outcome = f
            .engine
            .run(
                JobKind::Unpublish,
                &stale,
                &transition("PUBLISHED", "UNPUBLISHED"),
                &Actor::new("editor"),
            )
            .await
            .unwrap();

        let JobRun::Failed { error, .. } = outcome else {
            panic!("expected failed job");
        };
        assert_eq!(error.status_code(), 409);
        assert!(f.blobs.contains(Tier::Public, "k1"));
    }

    struct FailingNotifier;

    #[async_trait]
    impl NotificationSink for FailingNotifier {
        async fn notify(&self, _event: &str, _metadata: serde_json::Value) -> anyhow::Result<()> {
            anyhow::bail!("slack is down")
        }
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_job() {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.put(Tier::Public, "k1", b"bundle".to_vec());
        let engine = JobEngine::new(
            store.clone(),
            Some(StorageTiers::new(blobs, TierUrls::new(PRV, PUB))),
            Arc::new(FailingNotifier),
            Arc::new(RecordingSink::new()),
        );
        let version = published("k1");
        store.insert_version(version.clone());

        let outcome = engine
            .run(
                JobKind::Unpublish,
                &version,
                &transition("PUBLISHED", "UNPUBLISHED"),
                &Actor::new("editor"),
            )
            .await
            .unwrap();

        let JobRun::Completed { job, .. } = outcome else {
            panic!("expected completed job");
        };
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn job_kind_inference() {
        let wf = Workflow::new("FLAGS", "DRAFT")
            .with_state(WorkflowState::new("DRAFT", "Draft"))
            .with_state(WorkflowState::new("LIVE", "Live").visible().published())
            .with_state(WorkflowState::new("HIDDEN", "Hidden"))
            .with_state(WorkflowState::new("WITHDRAWN", "Withdrawn").tagged(TAG_END));

        let mut t = WorkflowTransition::new("go_live", "DRAFT", "LIVE");
        t.requires_job = true;
        assert_eq!(resolve_job_kind(&wf, &t).unwrap(), JobKind::Publish);

        t = WorkflowTransition::new("hide", "LIVE", "HIDDEN");
        assert_eq!(resolve_job_kind(&wf, &t).unwrap(), JobKind::Unpublish);

        t = WorkflowTransition::new("withdraw", "LIVE", "WITHDRAWN");
        assert_eq!(resolve_job_kind(&wf, &t).unwrap(), JobKind::Retract);

        t = WorkflowTransition::new("shuffle", "DRAFT", "HIDDEN");
        assert!(matches!(
            resolve_job_kind(&wf, &t),
            Err(PubflowError::Configuration(_))
        ));

        let declared =
            WorkflowTransition::new("shuffle", "DRAFT", "HIDDEN").with_job(JobKind::Retract);
        assert_eq!(resolve_job_kind(&wf, &declared).unwrap(), JobKind::Retract);
    }
}
