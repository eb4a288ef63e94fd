//! Log setup for the `sevis` binary.
//!
//! Stdout belongs to the command output (DIDs, credentials, verification
//! results as JSON). Every log line goes to stderr, so
//! `sevis show > identity.json` stays clean.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is unset. Wallet operations log at
/// `info`; everything else stays quiet.
pub const DEFAULT_DIRECTIVES: &str = "warn,sevis=info,sevis_identity=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact lines for a terminal.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// `RUST_LOG` if it parses, otherwise `fallback`.
fn wallet_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Panics if one is already set.
pub fn init_logging(fallback: &str, format: LogFormat) {
    let (pretty, json) = match format {
        LogFormat::Pretty => (
            Some(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(wallet_filter(fallback))
        .with(pretty)
        .with(json)
        .init();

    tracing::debug!(?format, "logging ready");
}
