//! Jobs: the records and the engine behind transitions that move content
//! between storage tiers.

mod engine;
mod model;

pub use engine::{JobEngine, JobRun, resolve_job_kind};
pub use model::{
    AuditRecord, Job, JobKind, JobPayload, JobResults, JobStatus, JobUpdate, MigrationProgress,
    PublishResults, RetractResults, UnpublishResults,
};
