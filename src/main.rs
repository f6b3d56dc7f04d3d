//! Persona relay CLI entry point.
//!
//! Provides `serve` for the HTTP service, plus `summarize` and `prompt` for
//! rendering a profile file offline without calling a model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use persona_relay::config::AppConfig;
use persona_relay::generation::GenerationClient;
use persona_relay::profile::{self, BodyEncoding, Profile};
use persona_relay::prompt::{build_prompt, PersonaDomain};
use persona_relay::providers::openai::OpenAiProvider;
use persona_relay::summary::summarize;
use persona_relay::{logging, server};

/// Persona relay: persona narratives for insurance customers and students.
#[derive(Parser)]
#[command(name = "persona-relay", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve,
    /// Print the deterministic summary for a profile JSON file.
    Summarize {
        /// `customer` or `student`.
        #[arg(long)]
        domain: PersonaDomain,
        /// Path to the profile JSON.
        file: PathBuf,
    },
    /// Print the persona prompt for a profile JSON file.
    Prompt {
        /// `customer` or `student`.
        #[arg(long)]
        domain: PersonaDomain,
        /// Path to the profile JSON.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => handle_serve().await,
        Command::Summarize { domain, file } => {
            logging::init_cli();
            let profile = load_profile(domain, &file)?;
            println!("{}", summarize(&profile));
            Ok(())
        }
        Command::Prompt { domain, file } => {
            logging::init_cli();
            let profile = load_profile(domain, &file)?;
            println!("{}", build_prompt(&summarize(&profile), domain));
            Ok(())
        }
    }
}

/// Run the HTTP server until Ctrl-C.
async fn handle_serve() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is normal; anything else is worth a note once logging is up.
        if !e.not_found() {
            eprintln!("warning: failed to read .env: {e}");
        }
    }

    let config = AppConfig::load().context("failed to load configuration")?;
    let _logging_guard =
        logging::init_server(config.server.logs_dir.as_deref(), &config.server.log_level)?;
    debug!(?config, "configuration loaded");

    let provider = OpenAiProvider::from_config(&config.llm)
        .context("failed to create completion provider")?;
    let client = GenerationClient::new(Arc::new(provider));
    info!(version = env!("CARGO_PKG_VERSION"), "persona relay starting");

    server::serve(&config, client).await
}

fn load_profile(domain: PersonaDomain, path: &Path) -> anyhow::Result<Profile> {
    let body =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    profile::decode(domain, BodyEncoding::Json, &body)
        .with_context(|| format!("invalid profile in {}", path.display()))
}
