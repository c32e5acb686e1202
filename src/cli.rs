//! Interface de linha de comando do TRACO baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status, demo)
//! e flags globais (--owner, --max-retries, --timeout-secs, --verbose).

use clap::{Parser, Subcommand};

/// TRACO — Orquestrador assíncrono de geração de diagramas.
#[derive(Debug, Parser)]
#[command(name = "traco", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Conta dona dos requisitos nesta sessão.
    #[arg(long, global = true, default_value = "local")]
    pub owner: String,

    /// Número máximo de retentativas em caso de timeout.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Teto de uma tentativa de geração, em segundos.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inicia a geração de diagrama para um requisito e acompanha até o fim.
    Run {
        /// Identificador do requisito a diagramar.
        requirement: String,
    },

    /// Mostra o status atual de um job de geração.
    Status {
        /// Identificador do requisito.
        requirement: String,
    },

    /// Runs the embedded retry/token-rotation demonstration.
    Demo,
}
