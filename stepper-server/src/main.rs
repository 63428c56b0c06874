//! Stepper server - HTTP control and query surface for the agent task scheduler.

mod error;
mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use clap::Parser;
use stepper::agent::AgentRunner;
use stepper::events::EventBus;
use stepper::io::config::load_config;
use stepper::io::reasoner::CommandReasoner;
use stepper::scheduler::{Scheduler, SchedulerControl};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "stepper-server")]
#[command(about = "Background agent task runner with step-by-step control")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "8000")]
    port: u16,

    /// Agent configuration file (TOML); defaults apply when missing
    #[arg(long, default_value = "config/agent.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stepper::logging::init("stepper=info,stepper_server=info");

    let args = Args::parse();
    let cfg = load_config(&args.config)?;
    info!(config = %args.config.display(), max_steps = cfg.max_steps, "loaded agent config");

    let reasoner = Arc::new(CommandReasoner::from_config(&cfg.reasoner));
    let agent = Arc::new(AgentRunner::from_config(reasoner, &cfg));
    let control = SchedulerControl::new(cfg.scheduler.settings(), EventBus::default());
    let state = AppState::new(agent.clone(), control.clone());

    // Exactly one loop per process, started before we accept requests.
    let scheduler = Scheduler::new(agent, control).spawn();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
