use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging to stderr.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` (the `-v` count) picks the
/// level for this crate.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,dynamo_transfer={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    tracing::debug!(level, "dynamo-transfer logging initialized");

    Ok(())
}
