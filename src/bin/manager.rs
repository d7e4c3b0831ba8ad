//! Box administration client
//!
//! Usage:
//!   manager <register_pipe> <pipe> create <box>
//!   manager <register_pipe> <pipe> remove <box>
//!   manager <register_pipe> <pipe> list

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mbroker::client::{create_box, list_boxes, remove_box, ClientConfig};
use mbroker::logging::init_logging;
use mbroker::protocol::BoxAnswer;

#[derive(Parser)]
#[command(name = "manager")]
#[command(about = "Create, remove and list broker boxes")]
#[command(version)]
struct Cli {
    /// The broker's administrative FIFO
    #[arg(env = "MBROKER_REGISTER_PIPE")]
    register_pipe: PathBuf,

    /// FIFO this client creates for the answer
    pipe: PathBuf,

    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MBROKER_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create a box
    Create { name: String },
    /// Remove a box and its messages
    Remove { name: String },
    /// List every box
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = ClientConfig::new(cli.register_pipe, cli.pipe);

    let result = match cli.command {
        Command::Create { name } => create_box(&config, &name).await.map(report),
        Command::Remove { name } => remove_box(&config, &name).await.map(report),
        Command::List => list_boxes(&config).await.map(|boxes| {
            if boxes.is_empty() {
                println!("NO BOXES FOUND");
            }
            for entry in boxes {
                println!(
                    "{} {} {} {}",
                    entry.box_name, entry.size, entry.publishers, entry.subscribers
                );
            }
            ExitCode::SUCCESS
        }),
    };

    result.unwrap_or_else(|e| {
        println!("ERROR {e}");
        ExitCode::FAILURE
    })
}

fn report(answer: BoxAnswer) -> ExitCode {
    if answer.is_ok() {
        println!("OK");
        ExitCode::SUCCESS
    } else {
        println!("ERROR {}", answer.error_message);
        ExitCode::FAILURE
    }
}
