//! Broker daemon
//!
//! Usage: mbroker <register_pipe> <max_sessions>

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mbroker::logging::init_logging;
use mbroker::{Broker, BrokerConfig, RegistryConfig};

#[derive(Parser)]
#[command(name = "mbroker")]
#[command(about = "Single-node message broker over named pipes")]
#[command(version)]
struct Cli {
    /// Administrative FIFO to create and listen on
    #[arg(env = "MBROKER_REGISTER_PIPE")]
    register_pipe: PathBuf,

    /// Worker pool size, which caps concurrent sessions
    #[arg(env = "MBROKER_MAX_SESSIONS")]
    max_sessions: usize,

    /// Request queue capacity (defaults to twice the worker count)
    #[arg(long, env = "MBROKER_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Maximum number of boxes
    #[arg(long, env = "MBROKER_MAX_BOXES", default_value_t = 64)]
    max_boxes: usize,

    /// Per-box byte limit
    #[arg(long, env = "MBROKER_MAX_BOX_SIZE")]
    max_box_size: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MBROKER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = BrokerConfig::with_admin_path(cli.register_pipe).max_sessions(cli.max_sessions);
    if let Some(capacity) = cli.queue_capacity {
        config = config.queue_capacity(capacity);
    }

    let mut registry_config = RegistryConfig::default().max_boxes(cli.max_boxes);
    if let Some(limit) = cli.max_box_size {
        registry_config = registry_config.max_box_size(limit);
    }

    let broker = Broker::fifo(config, registry_config);
    match broker.run_until(shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Broker exited with error");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
