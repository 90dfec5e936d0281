//! Interface de terminal do pubflow: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`TransitionProgress`] acompanha visualmente
//! um pedido de transição no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::job::{AuditRecord, JobStatus};
use crate::transition::TransitionResponse;
use crate::workflow::{Workflow, WorkflowTransition};

/// Spinner enquanto uma transição (e seu job) executa.
pub struct TransitionProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl TransitionProgress {
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        // Template estático; só falha se a sintaxe estiver errada.
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(description.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado.
    pub fn complete(&self, response: &TransitionResponse) {
        self.pb.finish_and_clear();
        if response.is_ok() {
            let status = response
                .submission_version
                .as_ref()
                .map(|v| v.status.as_str())
                .unwrap_or("?");
            println!("  {} {} -> {status}", self.green.apply_to("✓"), response.code);
        } else {
            let style = if response.code < 500 {
                &self.yellow
            } else {
                &self.red
            };
            println!(
                "  {} {}: {}",
                style.apply_to("✗"),
                response.code,
                response.message.as_deref().unwrap_or("")
            );
        }
    }

    /// Imprime o registro de auditoria formatado em JSON com estilo colorido.
    pub fn print_audit(&self, record: &AuditRecord) {
        let status_style = match record.status {
            JobStatus::Completed => &self.green,
            JobStatus::Failed => &self.red,
            JobStatus::Running => &self.yellow,
        };
        println!("{}", status_style.apply_to("─── Audit Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}

pub fn heading(text: &str) {
    println!("{}", Style::new().bold().underlined().apply_to(text));
}

pub fn print_workflow(workflow: &Workflow) {
    let dim = Style::new().dim();
    heading(&workflow.name);
    println!("  initial: {}", workflow.initial_state);
    println!("  states:");
    for state in workflow.states.values() {
        let mut flags = Vec::new();
        if state.visible {
            flags.push("visible");
        }
        if state.published {
            flags.push("published");
        }
        if state.author_only {
            flags.push("author_only");
        }
        if state.inbox {
            flags.push("inbox");
        }
        flags.extend(state.tags.iter().map(String::as_str));
        println!(
            "    {:<14} {} {}",
            state.name,
            state.label,
            dim.apply_to(flags.join(","))
        );
    }
    println!("  transitions:");
    for t in &workflow.transitions {
        print_transition(t);
    }
}

pub fn print_transition(t: &WorkflowTransition) {
    let cyan = Style::new().cyan();
    let job = match (t.requires_job, t.job_type) {
        (true, Some(kind)) => format!(" [job: {kind}]"),
        (true, None) => " [job]".to_string(),
        (false, _) => String::new(),
    };
    println!(
        "    {}{} {}",
        cyan.apply_to(t),
        job,
        Style::new().dim().apply_to(t.required_scopes.join(","))
    );
}

pub fn success(message: &str) {
    println!("{} {message}", Style::new().green().bold().apply_to("✓"));
}

pub fn failure(message: &str) {
    println!("{} {message}", Style::new().red().bold().apply_to("✗"));
}
