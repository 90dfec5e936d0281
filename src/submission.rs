use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The acting principal of a transition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The relational record of one submission version.
///
/// Owned by the relational store; the engine only holds a copy for the
/// duration of one transition. `revision` is the optimistic-concurrency token
/// every update is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionVersion {
    pub id: String,
    pub site: String,
    pub workflow: String,
    pub status: String,
    /// CDN base URL of the tier currently holding the content.
    pub cdn: String,
    pub key: String,
    pub job_id: Option<String>,
    /// Name of the transition a running job is applying.
    pub active_transition: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    /// Slug requested for this version.
    pub slug: Option<String>,
    /// Slug the public site currently routes to this version.
    pub live_slug: Option<String>,
    pub revision: u64,
}

impl SubmissionVersion {
    pub fn new(
        id: impl Into<String>,
        site: impl Into<String>,
        workflow: impl Into<String>,
        status: impl Into<String>,
        cdn: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            site: site.into(),
            workflow: workflow.into(),
            status: status.into(),
            cdn: cdn.into(),
            key: key.into(),
            job_id: None,
            active_transition: None,
            date_published: None,
            slug: None,
            live_slug: None,
            revision: 0,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// Fields to change on a [`SubmissionVersion`].
///
/// Outer `None` leaves a field alone; for nullable fields `Some(None)` clears
/// it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionPatch {
    pub status: Option<String>,
    pub cdn: Option<String>,
    pub job_id: Option<Option<String>>,
    pub active_transition: Option<Option<String>>,
    pub date_published: Option<Option<DateTime<Utc>>>,
    pub live_slug: Option<Option<String>>,
}

impl VersionPatch {
    /// Link the version to a running job.
    pub fn start_job(job_id: &str, transition: &str) -> Self {
        Self {
            job_id: Some(Some(job_id.to_string())),
            active_transition: Some(Some(transition.to_string())),
            ..Default::default()
        }
    }

    /// Move to `status` and drop any in-progress markers.
    pub fn finish(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            job_id: Some(None),
            active_transition: Some(None),
            ..Default::default()
        }
    }

    pub fn apply(&self, version: &mut SubmissionVersion) {
        if let Some(status) = &self.status {
            version.status = status.clone();
        }
        if let Some(cdn) = &self.cdn {
            version.cdn = cdn.clone();
        }
        if let Some(job_id) = &self.job_id {
            version.job_id = job_id.clone();
        }
        if let Some(active) = &self.active_transition {
            version.active_transition = active.clone();
        }
        if let Some(date) = &self.date_published {
            version.date_published = *date;
        }
        if let Some(slug) = &self.live_slug {
            version.live_slug = slug.clone();
        }
    }
}
