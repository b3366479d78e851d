//! Subscriber setup
//!
//! The base level comes from `LOG_LEVEL`. The `debugMode` setting can raise it
//! to debug at runtime through [`LogHandle::set_debug`].

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

pub fn parse_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Effective level for a base level with debug mode on or off
pub fn effective_level(base: LevelFilter, debug_mode: bool) -> LevelFilter {
    if debug_mode { base.max(LevelFilter::DEBUG) } else { base }
}

pub struct LogHandle {
    base: LevelFilter,
    handle: reload::Handle<LevelFilter, Registry>,
}

impl LogHandle {
    pub fn set_debug(&self, debug_mode: bool) {
        let level = effective_level(self.base, debug_mode);
        if let Err(e) = self.handle.modify(|filter| *filter = level) {
            warn!(error = %e, "Failed to change log level");
        }
    }
}

/// Install the global subscriber
pub fn init() -> Result<LogHandle> {
    let base = parse_level(&std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));
    let (filter, handle) = reload::Layer::new(base);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogHandle { base, handle })
}
