//! Orchestrator CLI - runs the task broker or single dispatches.

use std::process::ExitCode;
use std::sync::Arc;

use agents::{MemoryCache, RetentionPolicy, Task};
use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use notify::Notifier;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orchestrator::bootstrap::{self, CACHE_JANITOR_INTERVAL};
use orchestrator::{
    open_source, Config, HealthMonitor, MemoryQueue, Orchestrator, TaskBroker, TaskQueue,
};

/// Storyloom task orchestrator.
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Routes queued tasks to narrative, voting and coaching agents")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Override ORCH_TASK_TIMEOUT_SECS
    #[arg(long, global = true)]
    task_timeout_secs: Option<u64>,

    /// Override ORCH_MESSAGE_DEADLINE_SECS
    #[arg(long, global = true)]
    message_deadline_secs: Option<u64>,

    /// Override ORCH_VOTE_RETENTION (seconds or "permanent")
    #[arg(long, global = true)]
    vote_retention: Option<RetentionPolicy>,

    /// Override ALERT_WEBHOOK_URL
    #[arg(long, env = "ALERT_WEBHOOK_URL", global = true)]
    alert_webhook_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume JSON-lines task messages until the input ends or Ctrl-C
    Serve {
        /// Queue source: a file path, or "-" for stdin
        #[arg(long, default_value = "-")]
        input: String,
    },

    /// Dispatch a single task and print its result
    Dispatch {
        /// Task JSON: {"agent_id": "...", "context": {...}}
        #[arg(long)]
        task: String,
    },

    /// List registered agents
    Agents,

    /// Check every agent once and print the system status
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let mut config = Config::from_env();
    if let Some(secs) = cli.task_timeout_secs {
        config.task_timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(secs) = cli.message_deadline_secs {
        config.message_deadline = std::time::Duration::from_secs(secs);
    }
    if let Some(retention) = cli.vote_retention {
        config.vote_retention = retention;
    }
    if let Some(url) = cli.alert_webhook_url.filter(|u| !u.trim().is_empty()) {
        config.alert_webhook_url = Some(url);
    }
    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Serve { input } => serve(&config, &input).await,
        Commands::Dispatch { task } => dispatch(&config, &task).await,
        Commands::Agents => list_agents(&config),
        Commands::Health => health(&config).await,
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("orchestrator=debug,agents=debug,notify=debug,info")
        } else {
            EnvFilter::new("orchestrator=info,agents=info,notify=info,warn")
        }
    });

    // stdout carries command output; logs go to stderr.
    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

fn build(config: &Config, store: Arc<MemoryCache>, notifier: Arc<Notifier>) -> Result<Orchestrator> {
    let generator = Arc::new(bootstrap::generator(config));
    let registry = bootstrap::build_registry(config, store, generator)
        .context("failed to build agent registry")?;
    Ok(bootstrap::orchestrator(config, Arc::new(registry), notifier))
}

async fn serve(config: &Config, input: &str) -> Result<ExitCode> {
    // The broker cannot run without its queue.
    let source = open_source(input)
        .await
        .with_context(|| format!("failed to open queue source '{input}'"))?;

    let store = Arc::new(MemoryCache::new());
    let janitor = Arc::clone(&store).spawn_janitor(CACHE_JANITOR_INTERVAL);
    let notifier = Arc::new(bootstrap::notifier(config));
    let orchestrator = Arc::new(build(config, store, Arc::clone(&notifier))?);

    let queue = Arc::new(MemoryQueue::new(config.max_delivery_attempts));
    let monitor = Arc::new(
        HealthMonitor::new(Arc::clone(&orchestrator), Arc::clone(&queue) as Arc<dyn TaskQueue>)
            .with_interval(config.health_check_interval),
    );
    let feeder = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            if let Err(e) = queue.feed_lines(source).await {
                warn!(error = %e, "Stopped reading queue source");
            }
            queue.close();
        })
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C");
                shutdown.cancel();
            }
        });
    }

    let monitoring = tokio::spawn(Arc::clone(&monitor).run(shutdown.clone()));

    let broker = TaskBroker::new(queue, Arc::clone(&orchestrator), notifier)
        .with_message_deadline(config.message_deadline);
    let stats = broker.run(shutdown.clone()).await?;

    shutdown.cancel();
    if let Err(e) = monitoring.await {
        warn!(error = %e, "Health monitor task failed");
    }
    feeder.abort();
    janitor.abort();

    let summary = json!({ "broker": stats, "status": monitor.status() });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::SUCCESS)
}

async fn dispatch(config: &Config, raw: &str) -> Result<ExitCode> {
    let task = Task::from_json(raw).context("task must be {\"agent_id\": string, \"context\": object}")?;
    let notifier = Arc::new(bootstrap::notifier(config));
    let orchestrator = build(config, Arc::new(MemoryCache::new()), notifier)?;

    let result = orchestrator.dispatch(&task).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn health(config: &Config) -> Result<ExitCode> {
    let orchestrator = Arc::new(build(
        config,
        Arc::new(MemoryCache::new()),
        Arc::new(Notifier::disabled()),
    )?);
    let monitor = HealthMonitor::new(orchestrator, Arc::new(MemoryQueue::new(1)));

    let report = monitor.check_once().await;
    println!("{}", serde_json::to_string_pretty(&monitor.status())?);

    Ok(if report.healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list_agents(config: &Config) -> Result<ExitCode> {
    let orchestrator = build(
        config,
        Arc::new(MemoryCache::new()),
        Arc::new(Notifier::disabled()),
    )?;

    for registration in orchestrator.registry().registrations() {
        let tags: Vec<&str> = registration
            .capability_tags
            .iter()
            .map(String::as_str)
            .collect();
        println!(
            "{:<22} {:<40} {}",
            registration.agent_id,
            tags.join(","),
            registration.description
        );
    }
    Ok(ExitCode::SUCCESS)
}
