use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use trailmark_common::clock::SystemClock;
use trailmark_engine::config::{ConfigLoader, RecorderConfig};
use trailmark_engine::{Orchestrator, OrchestratorHandle, SessionEvent};
use trailmark_r::{RemoteHost, RemoteServer, route_frames};

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Trailmark recording bridge", long_about = None)]
struct Args {
    /// Port the browser extension connects to (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a YAML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: RecorderConfig = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await?,
        None => ConfigLoader::load_default().await?,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let port = args.port.unwrap_or(config.server.port);
    let server = RemoteServer::new(config.server.host.clone(), port);
    let handle = server.start().await?;
    info!(
        "Connect the browser extension to ws://{}",
        handle.local_addr
    );

    let host = Arc::new(RemoteHost::new(handle.outbound.clone()));
    let orchestrator = Orchestrator::new(host.clone(), Arc::new(SystemClock));
    tokio::spawn(log_session_events(orchestrator.subscribe()));

    let (orchestrator_handle, inbox) = OrchestratorHandle::channel();
    tokio::spawn(route_frames(
        handle.inbound,
        host,
        orchestrator_handle,
        handle.outbound,
    ));
    let orchestrator_task = tokio::spawn(orchestrator.run(inbox));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down");
        }
        _ = orchestrator_task => {
            warn!("Orchestrator stopped");
        }
    }
    Ok(())
}

async fn log_session_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Started(session)) => {
                info!(session_id = %session.id, title = %session.title, "recording started");
            }
            Ok(SessionEvent::StepAdded(step)) => {
                info!(step_id = %step.id, kind = ?step.kind, "step recorded");
            }
            Ok(SessionEvent::AnnotationsChanged(annotations)) => {
                info!(count = annotations.len(), "annotations changed");
            }
            Ok(SessionEvent::Stopped(session)) => {
                info!(
                    session_id = %session.id,
                    steps = session.steps.len(),
                    "recording stopped"
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
