//! edgepurge - debounced CloudFront cache invalidation.
//!
//! The binary is a thin front end over `edgepurge-coordinator`. Hosts call it
//! from publish hooks and from a periodic timer (`edgepurge tick`), or run
//! `edgepurge tick --watch 15` as a long-lived process.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EDGEPURGE_DISTRIBUTION_ID` | *(unset)* | Distribution to invalidate |
//! | `EDGEPURGE_ACCESS_KEY_ID` | *(unset)* | Static access key ID |
//! | `EDGEPURGE_SECRET_ACCESS_KEY` | *(unset)* | Static secret key |
//! | `EDGEPURGE_INSTANCE_METADATA` | `auto` | `auto`, `enabled` or `disabled` |
//! | `EDGEPURGE_DATA_DIR` | `/var/lib/edgepurge` | State and `settings.json` location |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! See `PurgeConfig::from_env` for the full list.

mod app;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgepurge_coordinator::{RetryOutcome, StaticPathResolver, SubmitOutcome};
use edgepurge_core::PurgeConfig;
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;

#[derive(Debug, Parser)]
#[command(name = "edgepurge")]
#[command(about = "Debounced CloudFront cache invalidation", version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Invalidate paths or URLs, merging with recent submissions
    Invalidate {
        /// Paths or URLs to invalidate
        #[arg(required = true)]
        paths: Vec<String>,

        /// Send immediately, ignoring the debounce window
        #[arg(long)]
        force: bool,
    },

    /// Invalidate the whole distribution immediately
    InvalidateAll,

    /// Report a content state change from the host
    ContentChange {
        /// Content identifier
        #[arg(long)]
        id: String,

        /// State before the change
        #[arg(long)]
        from: String,

        /// State after the change
        #[arg(long)]
        to: String,

        /// Public paths of the content item
        #[arg(long = "path")]
        paths: Vec<String>,
    },

    /// Show the coordinator status
    Status,

    /// List recent invalidations
    List {
        /// Maximum number of entries
        #[arg(long, default_value_t = 25)]
        max_items: u32,
    },

    /// Show one invalidation
    Get {
        /// Invalidation ID
        id: String,
    },

    /// Check the distribution ID and credentials against the API
    Verify,

    /// Run the deferred retry if it is due
    Tick {
        /// Keep running, checking every N seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn submit_outcome_json(outcome: &SubmitOutcome) -> Result<Value> {
    Ok(match outcome {
        SubmitOutcome::Submitted(result) => json!({
            "outcome": "submitted",
            "invalidation": serde_json::to_value(result)?,
        }),
        SubmitOutcome::Deferred {
            next_retry,
            pending_items,
        } => json!({
            "outcome": "deferred",
            "nextRetry": next_retry,
            "pendingItems": pending_items,
        }),
    })
}

fn retry_outcome_json(outcome: Option<&RetryOutcome>) -> Result<Value> {
    Ok(match outcome {
        None => json!({ "outcome": "not_due" }),
        Some(RetryOutcome::NothingPending) => json!({ "outcome": "nothing_pending" }),
        Some(RetryOutcome::Submitted(result)) => json!({
            "outcome": "submitted",
            "invalidation": serde_json::to_value(result)?,
        }),
        Some(RetryOutcome::Failed { message }) => json!({
            "outcome": "failed",
            "message": message,
        }),
        Some(RetryOutcome::Expired { message }) => json!({
            "outcome": "expired",
            "message": message,
        }),
    })
}

async fn watch(app: &App, interval: Duration) -> Result<()> {
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
    };
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match app.coordinator.tick().await {
                    Ok(Some(outcome)) => info!(?outcome, "ran deferred retry"),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "deferred retry check failed"),
                }
            }
            () = &mut shutdown => break,
        }
    }

    Ok(())
}

async fn run(command: Commands, app: App) -> Result<()> {
    match command {
        Commands::Invalidate { paths, force } => {
            let outcome = app.coordinator.invalidate_paths(&paths, force).await?;
            print_json(&submit_outcome_json(&outcome)?)
        }
        Commands::InvalidateAll => {
            let result = app.coordinator.invalidate_all().await?;
            print_json(&serde_json::to_value(result)?)
        }
        Commands::ContentChange {
            id,
            from,
            to,
            paths,
        } => {
            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            let coordinator = app
                .coordinator
                .with_path_resolver(Arc::new(
                    StaticPathResolver::new().with(id.clone(), &paths),
                ));
            match coordinator.on_content_change(&from, &to, &id).await? {
                Some(outcome) => print_json(&submit_outcome_json(&outcome)?),
                None => print_json(&json!({ "outcome": "ignored" })),
            }
        }
        Commands::Status => print_json(&serde_json::to_value(app.coordinator.get_status()?)?),
        Commands::List { max_items } => {
            let target = app.target()?;
            let items = app
                .client
                .list_invalidations(&target.distribution_id, max_items)
                .await?;
            print_json(&serde_json::to_value(items)?)
        }
        Commands::Get { id } => {
            let target = app.target()?;
            let detail = app
                .client
                .get_invalidation(&target.distribution_id, &id)
                .await?;
            print_json(&serde_json::to_value(detail)?)
        }
        Commands::Verify => {
            let target = app.target()?;
            let info = app.client.get_distribution(&target.distribution_id).await?;
            print_json(&json!({
                "id": info.id,
                "status": info.status,
                "domainName": info.domain_name,
                "enabled": info.enabled,
            }))
        }
        Commands::Tick { watch: None } => {
            let outcome = app.coordinator.tick().await?;
            print_json(&retry_outcome_json(outcome.as_ref())?)
        }
        Commands::Tick {
            watch: Some(secs),
        } => watch(&app, Duration::from_secs(secs.max(1))).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PurgeConfig::from_env();

    init_tracing(&config.log_level, cli.log_json)?;
    info!(version = env!("CARGO_PKG_VERSION"), ?config, "starting edgepurge");

    let app = App::build(&config)?;
    run(cli.command, app).await
}
