use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The storage migrations a transition can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Publish,
    Unpublish,
    Retract,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Publish => write!(f, "publish"),
            JobKind::Unpublish => write!(f, "unpublish"),
            JobKind::Retract => write!(f, "retract"),
        }
    }
}

/// Tracks the lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// What a job was started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub submission_version_id: String,
    pub transition: String,
    pub cdn: String,
    pub key: String,
    pub actor: String,
}

/// Progress fields every storage migration records.
///
/// Each setter only touches its own field, so a partial result can be built
/// for one step and merged into the accumulated results.
pub trait MigrationProgress {
    fn set_key(&mut self, key: &str);
    fn set_files_transferred(&mut self, transferred: bool);
    fn set_submission_updated(&mut self, updated: bool);
}

fn merge_field<T>(into: &mut Option<T>, from: Option<T>) {
    if from.is_some() {
        *into = from;
    }
}

macro_rules! migration_progress {
    ($ty:ty) => {
        impl MigrationProgress for $ty {
            fn set_key(&mut self, key: &str) {
                self.key = Some(key.to_string());
            }

            fn set_files_transferred(&mut self, transferred: bool) {
                self.files_transferred = Some(transferred);
            }

            fn set_submission_updated(&mut self, updated: bool) {
                self.submission_updated = Some(updated);
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_transferred: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_updated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl PublishResults {
    pub fn set_date_published(&mut self, date: DateTime<Utc>) {
        self.date_published = Some(date);
    }

    pub fn set_slug(&mut self, slug: &str) {
        self.slug = Some(slug.to_string());
    }

    pub fn merge(&mut self, other: PublishResults) {
        merge_field(&mut self.key, other.key);
        merge_field(&mut self.files_transferred, other.files_transferred);
        merge_field(&mut self.submission_updated, other.submission_updated);
        merge_field(&mut self.date_published, other.date_published);
        merge_field(&mut self.slug, other.slug);
    }
}

migration_progress!(PublishResults);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpublishResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_transferred: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_updated: Option<bool>,
}

impl UnpublishResults {
    pub fn merge(&mut self, other: UnpublishResults) {
        merge_field(&mut self.key, other.key);
        merge_field(&mut self.files_transferred, other.files_transferred);
        merge_field(&mut self.submission_updated, other.submission_updated);
    }
}

migration_progress!(UnpublishResults);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetractResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_transferred: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_updated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug_released: Option<bool>,
}

impl RetractResults {
    pub fn set_slug_released(&mut self, released: bool) {
        self.slug_released = Some(released);
    }

    pub fn merge(&mut self, other: RetractResults) {
        merge_field(&mut self.key, other.key);
        merge_field(&mut self.files_transferred, other.files_transferred);
        merge_field(&mut self.submission_updated, other.submission_updated);
        merge_field(&mut self.slug_released, other.slug_released);
    }
}

migration_progress!(RetractResults);

/// Accumulated evidence of how far a job got, one shape per job kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResults {
    Publish(PublishResults),
    Unpublish(UnpublishResults),
    Retract(RetractResults),
}

impl JobResults {
    pub fn empty(kind: JobKind) -> Self {
        match kind {
            JobKind::Publish => JobResults::Publish(PublishResults::default()),
            JobKind::Unpublish => JobResults::Unpublish(UnpublishResults::default()),
            JobKind::Retract => JobResults::Retract(RetractResults::default()),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobResults::Publish(_) => JobKind::Publish,
            JobResults::Unpublish(_) => JobKind::Unpublish,
            JobResults::Retract(_) => JobKind::Retract,
        }
    }

    pub fn progress_mut(&mut self) -> &mut dyn MigrationProgress {
        match self {
            JobResults::Publish(r) => r,
            JobResults::Unpublish(r) => r,
            JobResults::Retract(r) => r,
        }
    }

    pub fn files_transferred(&self) -> Option<bool> {
        match self {
            JobResults::Publish(r) => r.files_transferred,
            JobResults::Unpublish(r) => r.files_transferred,
            JobResults::Retract(r) => r.files_transferred,
        }
    }

    pub fn submission_updated(&self) -> Option<bool> {
        match self {
            JobResults::Publish(r) => r.submission_updated,
            JobResults::Unpublish(r) => r.submission_updated,
            JobResults::Retract(r) => r.submission_updated,
        }
    }

    /// Merge `other` field by field. Results of a different kind are
    /// ignored; a job's kind never changes.
    pub fn merge(&mut self, other: JobResults) {
        match (self, other) {
            (JobResults::Publish(a), JobResults::Publish(b)) => a.merge(b),
            (JobResults::Unpublish(a), JobResults::Unpublish(b)) => a.merge(b),
            (JobResults::Retract(a), JobResults::Retract(b)) => a.merge(b),
            (current, other) => {
                tracing::warn!(
                    current = %current.kind(),
                    other = %other.kind(),
                    "ignoring results of a different job kind"
                );
            }
        }
    }
}

/// Durable record of one storage migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub payload: JobPayload,
    pub results: JobResults,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Job {
    /// A new RUNNING job with empty results.
    pub fn new(kind: JobKind, payload: JobPayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            status: JobStatus::Running,
            payload,
            results: JobResults::empty(kind),
            message: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Apply a partial update in place. Results are merged, never replaced.
    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(results) = update.results {
            self.results.merge(results);
        }
        if let Some(message) = update.message {
            self.message = Some(message);
        }
        self.modified_at = Utc::now();
    }
}

/// The fields of a [`Job`] a single step changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub results: Option<JobResults>,
    pub message: Option<String>,
}

impl JobUpdate {
    pub fn results(results: JobResults) -> Self {
        Self {
            results: Some(results),
            ..Default::default()
        }
    }

    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Summary of a finished job for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub submission_version_id: String,
    pub transition: String,
    pub results: JobResults,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl AuditRecord {
    pub fn from_job(job: &Job) -> Self {
        let duration = job.modified_at - job.created_at;
        Self {
            job_id: job.id.clone(),
            kind: job.kind,
            status: job.status,
            submission_version_id: job.payload.submission_version_id.clone(),
            transition: job.payload.transition.clone(),
            results: job.results.clone(),
            message: job.message.clone(),
            started_at: job.created_at,
            finished_at: job.modified_at,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
