// Logging module - diagnostic (tracing) output, distinct from the session
// transcript written by the core logger.
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber. Diagnostics go to stderr so they never
/// interleave with the interactive terminal surface on stdout; the default
/// filter stays quiet unless `--verbose` or `RUST_LOG` asks for more.
pub fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if verbose {
        "termlink=debug"
    } else {
        "termlink=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();

    Ok(())
}
