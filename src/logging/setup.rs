// SPDX-License-Identifier: GPL-3.0-only
use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the level filter: `RUST_LOG` first, then the configured level
fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing subscriber with configuration
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(build_filter(log_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
        )
        .try_init()?;

    Ok(())
}
