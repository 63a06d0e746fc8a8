//! Tracing pipeline bootstrap.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use libris_kernel::settings::{LogFormat, TelemetrySettings};

/// Initialize the global tracing subscriber according to settings.
///
/// `RUST_LOG` overrides the default `info` filter. Safe to call once;
/// a second call reports the already-set subscriber as an error.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match settings.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
    };

    result.map_err(|error| anyhow!("failed to initialize tracing subscriber: {error}"))?;

    tracing::debug!(format = ?settings.log_format, "tracing pipeline initialized");
    Ok(())
}
