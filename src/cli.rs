//! Interface de linha de comando do pubflow baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (workflows, show,
//! transitions, check, demo) e flags globais (--config, --verbose,
//! --json-logs).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pubflow: workflows editoriais e migração de conteúdo entre camadas.
#[derive(Debug, Parser)]
#[command(name = "pubflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./pubflow.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emite logs em JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lista os workflows registrados.
    Workflows,

    /// Mostra estados e transições de um workflow.
    Show {
        workflow: String,
    },

    /// Lista transições que saem de (ou chegam a) um estado.
    Transitions {
        workflow: String,

        /// Estado de origem.
        #[arg(long, conflicts_with = "to")]
        from: Option<String>,

        /// Estado de destino.
        #[arg(long)]
        to: Option<String>,
    },

    /// Verifica se uma transição é permitida.
    Check {
        workflow: String,
        from: String,
        to: String,
    },

    /// Executa a demonstração embutida com colaboradores em memória.
    Demo,
}
