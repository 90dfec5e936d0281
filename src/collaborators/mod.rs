//! Interfaces of the systems the engine depends on but does not own.
//!
//! - [`PermissionOracle`]: scope checks against an authorization service.
//! - [`SubmissionStore`]: the relational store holding submission versions
//!   and job records. Version updates are compare-and-swap on `revision`.
//! - [`NotificationSink`] / [`AnalyticsSink`]: fire-and-forget side effects.
//!   Callers log their errors and carry on.

mod log;
mod memory;
mod webhook;

use async_trait::async_trait;
use thiserror::Error;

use crate::job::{Job, JobUpdate};
use crate::submission::{Actor, SubmissionVersion, VersionPatch};

pub use log::LogSink;
pub use memory::{MemoryStore, RecordedEvent, RecordingSink, StaticPermissions};
pub use webhook::WebhookNotifier;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// Another writer updated the record since it was read.
    #[error("conflicting update on {id}: expected revision {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

pub trait PermissionOracle: Send + Sync {
    fn has_scope(&self, actor: &Actor, scope: &str, resource_id: &str) -> bool;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn get_submission_version(&self, id: &str)
    -> Result<Option<SubmissionVersion>, StoreError>;

    /// Apply `patch` if the stored revision still equals `expected_revision`.
    /// Returns the updated record with its new revision.
    async fn update_submission_version(
        &self,
        id: &str,
        expected_revision: u64,
        patch: VersionPatch,
    ) -> Result<SubmissionVersion, StoreError>;

    async fn create_job(&self, job: Job) -> Result<Job, StoreError>;

    async fn update_job(&self, id: &str, update: JobUpdate) -> Result<Job, StoreError>;

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &str, metadata: serde_json::Value) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn track(&self, event: &str, properties: serde_json::Value) -> anyhow::Result<()>;
}
