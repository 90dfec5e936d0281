//! Editorial submission workflows and the storage-tier migration jobs that
//! publish, unpublish and retract submission content.

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod demo;
pub mod error;
pub mod job;
pub mod storage;
pub mod submission;
pub mod telemetry;
pub mod transition;
pub mod ui;
pub mod workflow;

pub use error::{PubflowError, WorkflowError};
pub use transition::{TransitionResponse, TransitionService};
