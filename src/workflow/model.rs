use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::job::JobKind;

/// Tag marking a terminal state.
pub const TAG_END: &str = "end";
/// Tag marking a failure-class terminal state.
pub const TAG_ERROR: &str = "error";

/// One editorial state a submission version can be in.
///
/// The boolean flags are consumed by callers for visibility decisions. The
/// job engine only reads `published` (and `tags`) to infer a job kind for
/// transitions that don't declare one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub author_only: bool,
    #[serde(default)]
    pub inbox: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WorkflowState {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            visible: false,
            published: false,
            author_only: false,
            inbox: false,
            tags: Vec::new(),
        }
    }

    pub fn visible(mut self) -> Self {
        self.visible = true;
        self
    }

    pub fn published(mut self) -> Self {
        self.published = true;
        self
    }

    pub fn author_only(mut self) -> Self {
        self.author_only = true;
        self
    }

    pub fn inbox(mut self) -> Self {
        self.inbox = true;
        self
    }

    pub fn tagged(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Terminal states are tagged `end` or `error`.
    pub fn is_terminal(&self) -> bool {
        self.has_tag(TAG_END) || self.has_tag(TAG_ERROR)
    }
}

/// Side effects a transition applies to the submission version on success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOptions {
    #[serde(default)]
    pub sets_published_date: bool,
    #[serde(default)]
    pub updates_slug: bool,
}

/// A named, permission-gated edge between two states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub name: String,
    pub source_state_name: String,
    pub target_state_name: String,
    #[serde(default)]
    pub requires_job: bool,
    #[serde(default)]
    pub job_type: Option<JobKind>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
    #[serde(default)]
    pub options: TransitionOptions,
}

impl WorkflowTransition {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_state_name: source.into(),
            target_state_name: target.into(),
            requires_job: false,
            job_type: None,
            required_scopes: Vec::new(),
            options: TransitionOptions::default(),
        }
    }

    /// Mark the transition as requiring a job of the given kind.
    pub fn with_job(mut self, kind: JobKind) -> Self {
        self.requires_job = true;
        self.job_type = Some(kind);
        self
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.required_scopes.push(scope.to_string());
        self
    }

    pub fn sets_published_date(mut self) -> Self {
        self.options.sets_published_date = true;
        self
    }

    pub fn updates_slug(mut self) -> Self {
        self.options.updates_slug = true;
        self
    }

    pub fn connects(&self, from: &str, to: &str) -> bool {
        self.source_state_name == from && self.target_state_name == to
    }
}

impl fmt::Display for WorkflowTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} -> {})",
            self.name, self.source_state_name, self.target_state_name
        )
    }
}

/// A named finite-state machine governing a submission's editorial lifecycle.
///
/// `transitions` keeps declaration order: lookups return the first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub initial_state: String,
    pub states: BTreeMap<String, WorkflowState>,
    #[serde(default)]
    pub transitions: Vec<WorkflowTransition>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, initial_state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_state: initial_state.into(),
            states: BTreeMap::new(),
            transitions: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: WorkflowState) -> Self {
        self.states.insert(state.name.clone(), state);
        self
    }

    pub fn with_transition(mut self, transition: WorkflowTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn state(&self, name: &str) -> Option<&WorkflowState> {
        self.states.get(name)
    }
}
