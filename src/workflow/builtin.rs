//! Workflows shipped with the crate and registered on first registry access.

use super::model::{TAG_END, TAG_ERROR, Workflow, WorkflowState, WorkflowTransition};
use crate::job::JobKind;

pub const SIMPLE: &str = "SIMPLE";
pub const CLOSED_REVIEW: &str = "CLOSED_REVIEW";

pub const SCOPE_UPDATE: &str = "site.submissions.update";
pub const SCOPE_REVIEW: &str = "site.submissions.review";

pub fn all() -> Vec<Workflow> {
    vec![simple(), closed_review()]
}

fn published_state() -> WorkflowState {
    WorkflowState::new("PUBLISHED", "Published")
        .visible()
        .published()
}

fn publishing_transitions(from: &str) -> Vec<WorkflowTransition> {
    vec![
        WorkflowTransition::new("publish", from, "PUBLISHED")
            .with_job(JobKind::Publish)
            .with_scope(SCOPE_UPDATE)
            .sets_published_date()
            .updates_slug(),
        WorkflowTransition::new("unpublish", "PUBLISHED", "UNPUBLISHED")
            .with_job(JobKind::Unpublish)
            .with_scope(SCOPE_UPDATE),
        WorkflowTransition::new("republish", "UNPUBLISHED", "PUBLISHED")
            .with_job(JobKind::Publish)
            .with_scope(SCOPE_UPDATE)
            .updates_slug(),
        WorkflowTransition::new("retract", "PUBLISHED", "RETRACTED")
            .with_job(JobKind::Retract)
            .with_scope(SCOPE_UPDATE)
            .updates_slug(),
    ]
}

/// Submissions go straight from the inbox to the public site.
pub fn simple() -> Workflow {
    let mut wf = Workflow::new(SIMPLE, "PENDING")
        .with_state(WorkflowState::new("PENDING", "Pending").inbox())
        .with_state(WorkflowState::new("REJECTED", "Rejected").tagged(TAG_END))
        .with_state(published_state())
        .with_state(WorkflowState::new("UNPUBLISHED", "Unpublished"))
        .with_state(WorkflowState::new("RETRACTED", "Retracted").visible().tagged(TAG_END));

    let mut transitions = publishing_transitions("PENDING");
    transitions.insert(
        1,
        WorkflowTransition::new("reject", "PENDING", "REJECTED").with_scope(SCOPE_UPDATE),
    );
    wf.transitions = transitions;
    wf
}

/// Submissions are reviewed privately before they can be published.
pub fn closed_review() -> Workflow {
    let mut wf = Workflow::new(CLOSED_REVIEW, "PENDING")
        .with_state(WorkflowState::new("PENDING", "Pending").inbox())
        .with_state(WorkflowState::new("IN_REVIEW", "In review").inbox().author_only())
        .with_state(WorkflowState::new("INCOMPLETE", "Changes requested").tagged(TAG_ERROR))
        .with_state(WorkflowState::new("ACCEPTED", "Accepted").inbox())
        .with_state(WorkflowState::new("REJECTED", "Rejected").tagged(TAG_END))
        .with_state(published_state())
        .with_state(WorkflowState::new("UNPUBLISHED", "Unpublished"))
        .with_state(WorkflowState::new("RETRACTED", "Retracted").visible().tagged(TAG_END))
        .with_transition(
            WorkflowTransition::new("start_review", "PENDING", "IN_REVIEW")
                .with_scope(SCOPE_REVIEW),
        )
        .with_transition(
            WorkflowTransition::new("accept", "IN_REVIEW", "ACCEPTED").with_scope(SCOPE_REVIEW),
        )
        .with_transition(
            WorkflowTransition::new("reject", "IN_REVIEW", "REJECTED").with_scope(SCOPE_REVIEW),
        )
        .with_transition(
            WorkflowTransition::new("request_changes", "IN_REVIEW", "INCOMPLETE")
                .with_scope(SCOPE_REVIEW),
        );
    wf.transitions.extend(publishing_transitions("ACCEPTED"));
    wf
}
