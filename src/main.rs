use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use pubflow::cli::{Cli, Command};
use pubflow::config::PubflowConfig;
use pubflow::workflow::{
    WorkflowRegistry, get_valid_transition, transitions_with_source, transitions_with_target,
};
use pubflow::{demo, telemetry, ui};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = PubflowConfig::load(cli.config.as_deref())?;
    telemetry::init_tracing(
        telemetry::effective_level(config.log_level.as_deref(), cli.verbose),
        cli.json_logs,
    )?;

    let registry = Arc::new(WorkflowRegistry::new());
    for file in &config.workflows.files {
        let name = registry
            .register_file(file)
            .with_context(|| format!("failed to load workflow {}", file.display()))?;
        tracing::info!(workflow = %name, path = %file.display(), "workflow loaded");
    }
    let missing = registry.validate(&config.workflows.extensions);
    if !missing.is_empty() {
        tracing::warn!(?missing, "configured workflow extensions are not registered");
    }

    let ok = match cli.command {
        Command::Demo => {
            demo::run(&config, registry).await?;
            true
        }
        command => inspect(&registry, command)?,
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Read-only workflow commands. `false` when a checked transition is absent.
fn inspect(registry: &WorkflowRegistry, command: Command) -> Result<bool> {
    match command {
        Command::Workflows => {
            for name in registry.names() {
                let workflow = registry.get(&name)?;
                println!(
                    "{name:<16} {} states, {} transitions",
                    workflow.states.len(),
                    workflow.transitions.len()
                );
            }
        }
        Command::Show { workflow } => {
            let workflow = registry.get(&workflow)?;
            ui::print_workflow(&workflow);
        }
        Command::Transitions { workflow, from, to } => {
            let workflow = registry.get(&workflow)?;
            let transitions = match (from.as_deref(), to.as_deref()) {
                (Some(from), _) => transitions_with_source(&workflow, from),
                (None, Some(to)) => transitions_with_target(&workflow, to),
                (None, None) => workflow.transitions.iter().collect(),
            };
            for t in transitions {
                ui::print_transition(t);
            }
        }
        Command::Check { workflow, from, to } => {
            let workflow = registry.get(&workflow)?;
            match get_valid_transition(&workflow, &from, &to) {
                Some(t) => ui::success(&t.to_string()),
                None => {
                    ui::failure(&format!("no transition from {from} to {to}"));
                    return Ok(false);
                }
            }
        }
        Command::Demo => {}
    }
    Ok(true)
}
