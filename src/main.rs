mod callback;
mod cli;
mod config;
mod error;
mod generator;
mod orchestrator;
mod query;
mod registry;
mod status;
mod token;
mod ui;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::time::sleep;

use crate::callback::{CallbackHandler, spawn_worker};
use crate::cli::{Cli, Command};
use crate::config::TracoConfig;
use crate::error::TracoError;
use crate::generator::{DiagramGenerator, GenerateResponse, GeneratorError, HttpGenerator};
use crate::orchestrator::{CallbackDispatcher, Orchestrator};
use crate::query::StatusQuery;
use crate::registry::InMemoryRegistry;
use crate::status::{RetryPolicy, StatusStore};
use crate::token::TokenVerifier;
use crate::ui::JobProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = TracoConfig::load()?;
    if let Some(max) = cli.max_retries {
        config.max_retries = max;
    }
    if let Some(secs) = cli.timeout_secs {
        config.attempt_timeout_secs = secs;
    }

    match cli.command {
        Command::Run { ref requirement } => {
            if config.api_key.is_empty() {
                return Err(TracoError::Config(
                    "api_key is empty; set TRACO_API_KEY or api_key in traco.toml".into(),
                )
                .into());
            }
            let generator = HttpGenerator::with_base_url(
                config.api_key.clone(),
                config.generator_url.clone(),
            );
            drive(
                generator,
                config.retry_policy(),
                config.queue_capacity,
                requirement,
                &cli.owner,
                cli.verbose,
            )
            .await?;
        }
        Command::Status { ref requirement } => {
            // Status records live with the process that runs the job; a fresh
            // CLI invocation starts from the not-found projection.
            let query = StatusQuery::new(Arc::new(StatusStore::new()));
            match query.status(requirement, &cli.owner) {
                Some(view) => ui::print_status(&view),
                None => println!("not_found: no generation status for {requirement}"),
            }
        }
        Command::Demo => demo(&cli).await?,
    }

    Ok(())
}

/// Wire the full pipeline around `generator`, initiate one job, and follow it
/// on the terminal until it settles or stalls.
async fn drive<G: DiagramGenerator>(
    generator: G,
    policy: RetryPolicy,
    queue_capacity: usize,
    requirement: &str,
    owner: &str,
    verbose: bool,
) -> Result<(), TracoError> {
    let store = Arc::new(StatusStore::new());
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert_job(requirement, owner);

    let (dispatcher, rx) = CallbackDispatcher::channel(queue_capacity);
    let handler = Arc::new(CallbackHandler::new(
        Arc::clone(&store),
        TokenVerifier::new(Arc::clone(&store)),
        generator,
        Arc::clone(&registry),
        policy.clone(),
        dispatcher.clone(),
    ));
    let worker = spawn_worker(handler, rx);

    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&registry),
        dispatcher,
    );
    let query = StatusQuery::new(Arc::clone(&store));

    orchestrator.initiate(requirement, owner).await?;
    let progress = JobProgress::start(requirement);

    // Anything still unsettled past every attempt plus every backoff is a
    // stall requiring manual intervention.
    let deadline = policy.attempt_timeout * (policy.max_retries + 1)
        + policy.retry_backoff * policy.max_retries
        + Duration::from_secs(5);
    let started = std::time::Instant::now();

    let view = loop {
        sleep(Duration::from_millis(200)).await;
        let Some(view) = query.status(requirement, owner) else {
            continue;
        };
        if view.status.is_terminal() || started.elapsed() > deadline {
            break view;
        }
        progress.update(&view);
    };

    if view.status.is_terminal() {
        progress.complete(&view);
    } else {
        progress.stall();
    }
    if verbose {
        ui::print_status(&view);
    }

    worker.abort();
    Ok(())
}

/// Generator used by `traco demo`: the first attempt hangs past the demo
/// timeout, the retry succeeds — showing backoff and token rotation end to end.
struct DemoGenerator {
    calls: AtomicU32,
}

impl DiagramGenerator for DemoGenerator {
    async fn run(&self, job_id: &str, _owner_id: &str) -> Result<GenerateResponse, GeneratorError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            sleep(Duration::from_secs(3600)).await;
        }
        sleep(Duration::from_millis(300)).await;
        Ok(GenerateResponse {
            diagram: format!("graph TD; {job_id}-->diagram;"),
            format: "mermaid".into(),
        })
    }
}

async fn demo(cli: &Cli) -> Result<(), TracoError> {
    let policy = RetryPolicy {
        max_retries: cli.max_retries.unwrap_or(3),
        attempt_timeout: Duration::from_secs(cli.timeout_secs.unwrap_or(2)),
        retry_backoff: Duration::from_secs(1),
    };
    println!(
        "Demo: first attempt times out after {}s, the retry succeeds.",
        policy.attempt_timeout.as_secs()
    );
    drive(
        DemoGenerator {
            calls: AtomicU32::new(0),
        },
        policy,
        8,
        "req-demo",
        &cli.owner,
        true,
    )
    .await
}
