//! Perform basic configuration of logging.

use anyhow::Result;
use log::LevelFilter;
use pretty_env_logger::formatted_builder;
use std::env;

pub const LOG_ENV: &str = "SHARENIX__LOG";

/// Configure logging.
///
/// Quiet mode caps output at errors regardless of the other sources.
///
/// # Panics
///
/// Function should not panic. On error, logging is just disabled.
pub fn configure_logging(log_level: &Option<String>, quiet: bool) -> Result<()> {
    let mut builder = formatted_builder();

    if quiet {
        builder.filter_level(LevelFilter::Error);
    } else if let Some(s) = log_level {
        builder.parse_filters(s);
    } else if let Ok(s) = env::var(LOG_ENV) {
        builder.parse_filters(&s);
    } else {
        builder.filter_level(LevelFilter::Info);
    }

    builder.try_init()?;

    Ok(())
}
