use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{AnalyticsSink, NotificationSink, PermissionOracle, StoreError, SubmissionStore};
use crate::job::{Job, JobUpdate};
use crate::submission::{Actor, SubmissionVersion, VersionPatch};

/// In-process relational store with compare-and-swap version updates.
#[derive(Debug, Default)]
pub struct MemoryStore {
    versions: Mutex<HashMap<String, SubmissionVersion>>,
    jobs: Mutex<HashMap<String, Job>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_version(&self, version: SubmissionVersion) {
        self.versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(version.id.clone(), version);
    }

    pub fn version(&self, id: &str) -> Option<SubmissionVersion> {
        self.versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn get_submission_version(
        &self,
        id: &str,
    ) -> Result<Option<SubmissionVersion>, StoreError> {
        Ok(self.version(id))
    }

    async fn update_submission_version(
        &self,
        id: &str,
        expected_revision: u64,
        patch: VersionPatch,
    ) -> Result<SubmissionVersion, StoreError> {
        let mut versions = self.versions.lock().unwrap_or_else(PoisonError::into_inner);
        let version = versions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if version.revision != expected_revision {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected_revision,
                actual: version.revision,
            });
        }
        patch.apply(version);
        version.revision += 1;
        Ok(version.clone())
    }

    async fn create_job(&self, job: Job) -> Result<Job, StoreError> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn update_job(&self, id: &str, update: JobUpdate) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        job.apply(update);
        Ok(job.clone())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}

/// Grants a fixed set of scopes per actor, on every resource.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    grants: HashMap<String, HashSet<String>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, actor: &str, scope: &str) -> Self {
        self.grants
            .entry(actor.to_string())
            .or_default()
            .insert(scope.to_string());
        self
    }
}

impl PermissionOracle for StaticPermissions {
    fn has_scope(&self, actor: &Actor, scope: &str, _resource_id: &str) -> bool {
        self.grants
            .get(&actor.id)
            .is_some_and(|scopes| scopes.contains(scope))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub event: String,
    pub data: serde_json::Value,
}

/// Keeps every notification and analytics event it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event).collect()
    }

    fn record(&self, event: &str, data: serde_json::Value) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                event: event.to_string(),
                data,
            });
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: &str, metadata: serde_json::Value) -> anyhow::Result<()> {
        self.record(event, metadata);
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn track(&self, event: &str, properties: serde_json::Value) -> anyhow::Result<()> {
        self.record(event, properties);
        Ok(())
    }
}
