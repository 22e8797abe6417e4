//! Tracing/logging initialization: a layered `tracing-subscriber` setup
//! driven by this crate's [`LoggingConfig`].

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

pub fn init_telemetry(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log level configuration")?;

    let registry = Registry::default().with(env_filter);

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty().with_target(true).with_thread_ids(true).with_file(true).with_line_number(true);
            registry.with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer().json().with_target(true).with_thread_ids(true).with_file(true).with_line_number(true).flatten_event(true);
            registry.with(fmt_layer).init();
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact().with_target(true).with_thread_ids(false).with_file(false).with_line_number(false);
            registry.with(fmt_layer).init();
        }
    }

    tracing::info!(log_level = %config.level, log_format = ?config.format, "telemetry initialized");
    Ok(())
}

pub fn log_startup_info(config: &crate::config::Config) {
    tracing::info!(
        tcp_address = %config.tcp_address(),
        http_address = %config.http_address(),
        environments = ?config.daemon.environments,
        default_environment = %config.daemon.default_environment,
        workflow_environments = ?config.selected_workflow_environments(),
        skip_tcp = config.daemon.skip_tcp,
        test_mode = config.daemon.test_mode,
        "task daemon starting up"
    );
}

pub fn log_config_validation(config: &crate::config::Config) {
    match config.validate() {
        Ok(()) => tracing::info!("configuration validation passed"),
        Err(e) => tracing::error!(error = %e, "configuration validation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;

    #[test]
    fn accepts_every_log_format_variant() {
        for format in [LogFormat::Pretty, LogFormat::Json, LogFormat::Compact] {
            let config = LoggingConfig { level: "info".to_string(), format };
            assert!(matches!(config.format, LogFormat::Pretty | LogFormat::Json | LogFormat::Compact));
        }
    }
}
