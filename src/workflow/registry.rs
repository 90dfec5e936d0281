//! Catalog of named workflows.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Once, PoisonError, RwLock};

use super::builtin;
use super::model::Workflow;
use super::validator::{check_workflow, lint_workflow};
use crate::error::{PubflowError, WorkflowError};

/// Thread-safe registry of workflows, keyed by name.
///
/// Built-in workflows are registered lazily on the first access to the
/// catalog. Registering a name twice replaces the earlier workflow and logs a
/// warning; extensions rely on this to override built-ins.
///
/// The registry is constructed by the application and handed out as an
/// `Arc<WorkflowRegistry>`.
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, Arc<Workflow>>>,
    builtins: Once,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            builtins: Once::new(),
        }
    }

    fn ensure_builtins(&self) {
        self.builtins.call_once(|| {
            let mut map = self.workflows.write().unwrap_or_else(PoisonError::into_inner);
            for wf in builtin::all() {
                tracing::debug!(workflow = %wf.name, "registered built-in workflow");
                map.insert(wf.name.clone(), Arc::new(wf));
            }
        });
    }

    /// Register `workflow` under `name`.
    ///
    /// Fails if the definition breaks a model invariant. Shadowed transitions
    /// and other lints are only logged.
    pub fn register(&self, name: &str, workflow: Workflow) -> Result<(), WorkflowError> {
        self.ensure_builtins();

        let problems = check_workflow(&workflow);
        if !problems.is_empty() {
            return Err(WorkflowError::Invalid {
                name: name.to_string(),
                problems,
            });
        }
        for lint in lint_workflow(&workflow) {
            tracing::warn!(workflow = name, %lint, "workflow lint");
        }

        let previous = self
            .workflows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(workflow));
        if previous.is_some() {
            tracing::warn!(workflow = name, "workflow already registered, overwriting");
        } else {
            tracing::info!(workflow = name, "registered workflow");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Workflow>, WorkflowError> {
        self.ensure_builtins();
        self.workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.ensure_builtins();
        let mut names: Vec<String> = self
            .workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names in `extensions` that are configured but not registered.
    pub fn validate(&self, extensions: &[String]) -> Vec<String> {
        extensions
            .iter()
            .filter(|name| !self.contains(name))
            .cloned()
            .collect()
    }

    /// Read a workflow definition from a `.toml` or `.json` file.
    pub fn load_file(path: &Path) -> Result<Workflow, PubflowError> {
        let contents = std::fs::read_to_string(path)?;
        let workflow = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str::<Workflow>(&contents)?,
            _ => serde_json::from_str::<Workflow>(&contents)?,
        };
        Ok(workflow)
    }

    /// Load a definition file and register it under its own name.
    pub fn register_file(&self, path: &Path) -> Result<String, PubflowError> {
        let workflow = Self::load_file(path)?;
        let name = workflow.name.clone();
        self.register(&name, workflow)?;
        Ok(name)
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{TAG_END, WorkflowState, WorkflowTransition};
    use crate::workflow::validator::get_valid_transition;

    fn extension(name: &str) -> Workflow {
        Workflow::new(name, "PENDING")
            .with_state(WorkflowState::new("PENDING", "Pending"))
            .with_state(WorkflowState::new("DONE", "Done").tagged(TAG_END))
            .with_transition(WorkflowTransition::new("finish", "PENDING", "DONE"))
    }

    #[test]
    fn builtins_are_available_lazily() {
        let registry = WorkflowRegistry::new();
        let wf = registry.get(builtin::SIMPLE).unwrap();
        assert_eq!(wf.name, "SIMPLE");
        assert_eq!(
            registry.names(),
            vec!["CLOSED_REVIEW".to_string(), "SIMPLE".to_string()]
        );
    }

    #[test]
    fn builtins_register_once() {
        let registry = WorkflowRegistry::new();
        registry.register(builtin::SIMPLE, extension(builtin::SIMPLE)).unwrap();
        // Later accesses must not re-insert the built-in over the override.
        let wf = registry.get(builtin::SIMPLE).unwrap();
        assert!(wf.state("DONE").is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let registry = WorkflowRegistry::new();
        let err = registry.get("MISSING").unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(name) if name == "MISSING"));
    }

    #[test]
    fn last_writer_wins() {
        let registry = WorkflowRegistry::new();
        registry.register("EXT", extension("EXT")).unwrap();

        let replacement = extension("EXT")
            .with_state(WorkflowState::new("ARCHIVED", "Archived").tagged(TAG_END))
            .with_transition(WorkflowTransition::new("archive", "PENDING", "ARCHIVED"));
        registry.register("EXT", replacement).unwrap();

        let wf = registry.get("EXT").unwrap();
        assert!(get_valid_transition(&wf, "PENDING", "ARCHIVED").is_some());
    }

    #[test]
    fn invalid_workflows_are_rejected() {
        let registry = WorkflowRegistry::new();
        let broken = extension("BROKEN")
            .with_transition(WorkflowTransition::new("vanish", "DONE", "NOWHERE"));

        let err = registry.register("BROKEN", broken).unwrap_err();
        assert!(matches!(err, WorkflowError::Invalid { ref problems, .. } if problems.len() == 1));
        assert!(!registry.contains("BROKEN"));
    }

    #[test]
    fn validate_reports_missing_extensions() {
        let registry = WorkflowRegistry::new();
        registry.register("EXT", extension("EXT")).unwrap();

        let missing = registry.validate(&[
            "EXT".to_string(),
            "SIMPLE".to_string(),
            "GHOST".to_string(),
        ]);
        assert_eq!(missing, vec!["GHOST".to_string()]);
        assert!(registry.contains("EXT"));
    }

    #[test]
    fn registered_workflows_hold_state_invariants() {
        let registry = WorkflowRegistry::new();
        registry.register("EXT", extension("EXT")).unwrap();
        for name in registry.names() {
            let wf = registry.get(&name).unwrap();
            assert!(wf.states.contains_key(&wf.initial_state));
            for t in &wf.transitions {
                assert!(wf.states.contains_key(&t.source_state_name), "{name}");
                assert!(wf.states.contains_key(&t.target_state_name), "{name}");
            }
        }
    }

    #[test]
    fn register_file_reads_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("ext.json");
        std::fs::write(&json_path, serde_json::to_string(&extension("JSON_EXT")).unwrap()).unwrap();

        let toml_path = dir.path().join("ext.toml");
        std::fs::write(
            &toml_path,
            r#"
                name = "TOML_EXT"
                initial_state = "PENDING"

                [states.PENDING]
                name = "PENDING"
                label = "Pending"

                [states.DONE]
                name = "DONE"
                label = "Done"
                tags = ["end"]

                [[transitions]]
                name = "finish"
                source_state_name = "PENDING"
                target_state_name = "DONE"
                required_scopes = ["site.submissions.update"]
            "#,
        )
        .unwrap();

        let registry = WorkflowRegistry::new();
        assert_eq!(registry.register_file(&json_path).unwrap(), "JSON_EXT");
        assert_eq!(registry.register_file(&toml_path).unwrap(), "TOML_EXT");

        let wf = registry.get("TOML_EXT").unwrap();
        let t = get_valid_transition(&wf, "PENDING", "DONE").unwrap();
        assert_eq!(t.required_scopes, vec!["site.submissions.update".to_string()]);
    }

    #[test]
    fn concurrent_readers() {
        let registry = Arc::new(WorkflowRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get(builtin::SIMPLE).map(|wf| wf.states.len()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 5);
        }
    }
}
