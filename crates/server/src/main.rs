//! Legionn Server
//!
//! Registers the configured Cores in the Legionn platform and exposes them
//! through the REST API.

mod api;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use legionn_core::bots::{Cleverbot, CleverJabberBot};
use legionn_core::{Core, Legionn, LegionnConfig};
use tokio::net::TcpListener;

use crate::api::AppState;
use crate::logging::{init_logging, Verbosity};

#[derive(Parser, Clone)]
#[command(author, version, about = "Legionn - platform of Cores and their Units")]
struct Args {
    /// Configuration file (defaults to $LEGIONN_CONFIG or ./legionn.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More output, repeat for trace level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the REST server (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the Jabber bot alone until Ctrl-C
    Bot,
}

/// Build the platform with every Core the configuration enables.
fn build_platform(config: &LegionnConfig) -> anyhow::Result<Legionn> {
    let mut legionn = Legionn::default();

    match &config.jabber {
        Some(jabber) => {
            let brain = Arc::new(Cleverbot::new(&config.cleverbot)?);
            let bot = CleverJabberBot::new(jabber.clone(), brain)
                .context("invalid jabber configuration")?;
            legionn.add(Arc::new(bot), None)?;
        }
        None => tracing::info!("No jabber account configured, bot disabled"),
    }

    Ok(legionn)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Shutting down");
}

/// Bind the API listener. `host` may be a hostname or an IP address.
async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))
}

async fn run_server(config: LegionnConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let legionn = build_platform(&config)?;

    let report = legionn.activate_all().await;
    for (core, e) in &report.failed {
        tracing::warn!(core = %core, error = %e, "Core not active");
    }

    let state = Arc::new(AppState::new(legionn));
    let app = api::router(state.clone(), &config.server.url_prefix);

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let listener = bind(&host, port).await?;
    let addr = listener.local_addr()?;
    tracing::info!(
        %addr,
        prefix = %config.server.url_prefix,
        "Legionn server running"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let report = state.legionn.read().await.deactivate_all().await;
    if !report.is_ok() {
        tracing::warn!(failed = report.failed.len(), "Some Cores did not shut down cleanly");
    }
    Ok(())
}

async fn run_bot(config: LegionnConfig) -> anyhow::Result<()> {
    let Some(jabber) = config.jabber else {
        anyhow::bail!("no jabber account configured (set LEGIONN_JABBER_ID and LEGIONN_JABBER_PASSWORD)");
    };
    let brain = Arc::new(Cleverbot::new(&config.cleverbot)?);
    let bot = CleverJabberBot::new(jabber, brain)?;

    bot.activate().await.context("bot failed to connect")?;
    tracing::info!(jid = %bot.jid(), "Bot online, press Ctrl-C to stop");

    shutdown_signal().await;
    bot.deactivate().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(Verbosity::from_flags(args.quiet, args.verbose));

    let path = LegionnConfig::resolve_path(args.config.as_deref());
    let config = LegionnConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    match args.command {
        Some(CliCommand::Serve { host, port }) => run_server(config, host, port).await,
        Some(CliCommand::Bot) => run_bot(config).await,
        None => run_server(config, None, None).await,
    }
}
