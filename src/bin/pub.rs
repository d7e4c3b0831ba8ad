//! Publisher client: every line read from stdin becomes one message
//!
//! Usage: pub <register_pipe> <pipe> <box>

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mbroker::client::{ClientConfig, Publisher};
use mbroker::logging::init_logging;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "pub")]
#[command(about = "Publish stdin lines to a broker box")]
#[command(version)]
struct Cli {
    /// The broker's administrative FIFO
    #[arg(env = "MBROKER_REGISTER_PIPE")]
    register_pipe: PathBuf,

    /// FIFO this client creates for its messages
    pipe: PathBuf,

    /// Box to publish to
    box_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MBROKER_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = ClientConfig::new(cli.register_pipe, cli.pipe);
    let mut publisher = match Publisher::connect(&config, &cli.box_name).await {
        Ok(publisher) => publisher,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register publisher");
            return ExitCode::FAILURE;
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break,
        };

        let sent = match line {
            Ok(Some(text)) => publisher.send(&text).await,
            Ok(None) => break,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = sent {
            if e.is_disconnect() {
                tracing::error!(
                    box_name = %cli.box_name,
                    "Broker closed the pipe: box missing or already has a publisher"
                );
            } else {
                tracing::error!(error = %e, "Publishing failed");
            }
            return ExitCode::FAILURE;
        }
    }

    tracing::info!(box_name = %cli.box_name, messages = publisher.sent(), "Publisher done");
    ExitCode::SUCCESS
}
