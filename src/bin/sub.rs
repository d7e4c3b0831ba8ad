//! Subscriber client: prints each message of a box, then the count on exit
//!
//! Usage: sub <register_pipe> <pipe> <box>

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mbroker::client::{ClientConfig, Subscriber};
use mbroker::logging::init_logging;

#[derive(Parser)]
#[command(name = "sub")]
#[command(about = "Follow a broker box from the beginning")]
#[command(version)]
struct Cli {
    /// The broker's administrative FIFO
    #[arg(env = "MBROKER_REGISTER_PIPE")]
    register_pipe: PathBuf,

    /// FIFO this client creates for incoming messages
    pipe: PathBuf,

    /// Box to follow
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
    let mut subscriber = match Subscriber::connect(&config, &cli.box_name).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register subscriber");
            return ExitCode::FAILURE;
        }
    };

    let mut code = ExitCode::SUCCESS;
    loop {
        let next = tokio::select! {
            next = subscriber.next_message() => next,
            _ = tokio::signal::ctrl_c() => break,
        };

        match next {
            Ok(Some(text)) => println!("{text}"),
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Subscription failed");
                code = ExitCode::FAILURE;
                break;
            }
        }
    }

    println!("{}", subscriber.received());
    code
}
