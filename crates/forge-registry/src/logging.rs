//! Tracing subscriber setup for binaries embedding the registry
//!
//! The library itself only emits `tracing` events. A host calls [`init`]
//! once, usually with `logging.level` from [`ForgeConfig`](crate::ForgeConfig).

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `level` (e.g. from
/// `logging.level` in the config) is used, falling back to `info`.
/// Returns an error if a subscriber is already installed.
pub fn init(level: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .compact();

    let fallback = level.filter(|l| !l.trim().is_empty()).unwrap_or("info");
    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_without_panicking() {
        let config = crate::ForgeConfig::default();
        let _ = init(Some(&config.logging.level));
        tracing::info!(name = "researcher", "resolved");
        assert!(init(None).is_err());
    }
}
