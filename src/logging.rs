//! Log setup shared by the binaries

use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing` subscriber
///
/// `RUST_LOG` wins when set; otherwise everything at `level` and above is
/// shown. Stdout stays free for client output.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
