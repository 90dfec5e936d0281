use thiserror::Error;

use crate::collaborators::StoreError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum PubflowError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Missing required scope {scope} on {resource}")]
    Forbidden { scope: String, resource: String },

    #[error("Submission version not found: {0}")]
    SubmissionNotFound(String),

    #[error("State {state} does not exist in workflow {workflow}")]
    UnknownState { workflow: String, state: String },

    #[error("No transition from {from} to {to}")]
    NoTransition { from: String, to: String },

    #[error("Transition already in progress (job {job_id})")]
    TransitionInProgress { job_id: String },

    #[error("{0}")]
    Precondition(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PubflowError {
    /// HTTP-equivalent status code surfaced to the routing layer.
    pub fn status_code(&self) -> u16 {
        match self {
            PubflowError::Unauthenticated => 401,
            PubflowError::Forbidden { .. } => 403,
            PubflowError::SubmissionNotFound(_) => 404,
            PubflowError::UnknownState { .. } | PubflowError::NoTransition { .. } => 400,
            PubflowError::TransitionInProgress { .. } => 409,
            PubflowError::Precondition(_) => 422,
            PubflowError::Store(StoreError::Conflict { .. }) => 409,
            PubflowError::Store(StoreError::NotFound(_)) => 404,
            _ => 500,
        }
    }

    /// Client errors are the caller's to fix; everything else is ours.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow name must not be empty")]
    EmptyName,

    #[error("Workflow {workflow}: initial state {state} is not declared")]
    UnknownInitialState { workflow: String, state: String },

    #[error("Workflow {workflow}: state keyed {key} is named {name}")]
    StateNameMismatch {
        workflow: String,
        key: String,
        name: String,
    },

    #[error("Workflow {workflow}: transition {transition} references unknown state {state}")]
    UnknownTransitionState {
        workflow: String,
        transition: String,
        state: String,
    },

    #[error(
        "Invalid workflow {name}: {}",
        .problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    Invalid {
        name: String,
        problems: Vec<WorkflowError>,
    },
}
