pub mod builtin;
mod model;
mod registry;
pub mod validator;

pub use model::{TAG_END, TAG_ERROR, TransitionOptions, Workflow, WorkflowState, WorkflowTransition};
pub use registry::WorkflowRegistry;
pub use validator::{
    WorkflowLint, can_transition_to, get_valid_transition, transitions_with_source,
    transitions_with_target,
};
