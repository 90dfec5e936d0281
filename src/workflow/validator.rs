//! Pure lookups over a [`Workflow`] and structural checks.
//!
//! Nothing here panics or returns an error for a missing state or
//! transition: absence is `false`, `None` or an empty list.

use std::collections::HashSet;
use std::fmt;

use super::model::{Workflow, WorkflowTransition};
use crate::error::WorkflowError;

/// True iff some transition goes from `from` to `to`.
pub fn can_transition_to(workflow: &Workflow, from: &str, to: &str) -> bool {
    get_valid_transition(workflow, from, to).is_some()
}

/// The first transition, in declaration order, connecting `from` to `to`.
pub fn get_valid_transition<'a>(
    workflow: &'a Workflow,
    from: &str,
    to: &str,
) -> Option<&'a WorkflowTransition> {
    workflow.transitions.iter().find(|t| t.connects(from, to))
}

pub fn transitions_with_source<'a>(
    workflow: &'a Workflow,
    state: &str,
) -> Vec<&'a WorkflowTransition> {
    workflow
        .transitions
        .iter()
        .filter(|t| t.source_state_name == state)
        .collect()
}

pub fn transitions_with_target<'a>(
    workflow: &'a Workflow,
    state: &str,
) -> Vec<&'a WorkflowTransition> {
    workflow
        .transitions
        .iter()
        .filter(|t| t.target_state_name == state)
        .collect()
}

/// Collect every invariant violation in a workflow definition.
///
/// A workflow with a non-empty result must not be registered.
pub fn check_workflow(workflow: &Workflow) -> Vec<WorkflowError> {
    let mut errors = Vec::new();

    if workflow.name.trim().is_empty() {
        errors.push(WorkflowError::EmptyName);
    }

    if !workflow.states.contains_key(&workflow.initial_state) {
        errors.push(WorkflowError::UnknownInitialState {
            workflow: workflow.name.clone(),
            state: workflow.initial_state.clone(),
        });
    }

    for (key, state) in &workflow.states {
        if *key != state.name {
            errors.push(WorkflowError::StateNameMismatch {
                workflow: workflow.name.clone(),
                key: key.clone(),
                name: state.name.clone(),
            });
        }
    }

    for t in &workflow.transitions {
        for state in [&t.source_state_name, &t.target_state_name] {
            if !workflow.states.contains_key(state) {
                errors.push(WorkflowError::UnknownTransitionState {
                    workflow: workflow.name.clone(),
                    transition: t.name.clone(),
                    state: state.clone(),
                });
            }
        }
    }

    errors
}

/// Non-fatal findings about a workflow's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowLint {
    /// Several transitions share a `(source, target)` pair; only `first` is
    /// ever returned by [`get_valid_transition`].
    AmbiguousPair {
        source: String,
        target: String,
        first: String,
        shadowed: String,
    },
    /// No transition leads into this state and it isn't the initial state.
    Unreachable { state: String },
    /// A non-terminal state with no way out.
    DeadEnd { state: String },
}

impl fmt::Display for WorkflowLint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowLint::AmbiguousPair {
                source,
                target,
                first,
                shadowed,
            } => write!(
                f,
                "transition {shadowed} ({source} -> {target}) is shadowed by {first}"
            ),
            WorkflowLint::Unreachable { state } => write!(f, "state {state} is unreachable"),
            WorkflowLint::DeadEnd { state } => {
                write!(f, "state {state} has no outgoing transition and is not terminal")
            }
        }
    }
}

pub fn lint_workflow(workflow: &Workflow) -> Vec<WorkflowLint> {
    let mut lints = Vec::new();

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for t in &workflow.transitions {
        let pair = (t.source_state_name.as_str(), t.target_state_name.as_str());
        if !seen.insert(pair) {
            if let Some(first) = get_valid_transition(workflow, pair.0, pair.1) {
                lints.push(WorkflowLint::AmbiguousPair {
                    source: pair.0.to_string(),
                    target: pair.1.to_string(),
                    first: first.name.clone(),
                    shadowed: t.name.clone(),
                });
            }
        }
    }

    for (name, state) in &workflow.states {
        if *name != workflow.initial_state && transitions_with_target(workflow, name).is_empty() {
            lints.push(WorkflowLint::Unreachable {
                state: name.clone(),
            });
        }
        if !state.is_terminal() && transitions_with_source(workflow, name).is_empty() {
            lints.push(WorkflowLint::DeadEnd {
                state: name.clone(),
            });
        }
    }

    lints
}
