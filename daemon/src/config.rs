//! Daemon configuration: layered defaults, then a config
//! file, then `TASKD_`-prefixed environment overrides, then a few
//! standalone env vars kept for operational compatibility.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DaemonConfig {
    /// Base directory; each environment gets `<base>/<env>`.
    pub base_dir: String,
    /// TCP Command Server port.
    pub tcp_port: u16,
    /// Shared HTTP/WS listener port.
    pub http_port: u16,
    /// Configured environment names.
    pub environments: Vec<String>,
    /// The fallback environment when a request doesn't name one.
    pub default_environment: String,
    /// Explicit subset of environments to run the workflow loop for.
    /// Ignored when `process_all` is set.
    pub process_environments: Vec<String>,
    /// Run the workflow loop for every configured environment.
    pub process_all: bool,
    /// Disables the TCP Command Server for headless/test runs.
    pub skip_tcp: bool,
    /// Disables the workflow loop entirely.
    pub test_mode: bool,
    /// How long an Audit Log entry survives before the prune timer drops
    /// it.
    pub audit_retention_days: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl Config {
    /// Loads configuration from the built-in defaults, an optional
    /// `CONFIG_FILE`, then `TASKD_`-prefixed environment overrides
    ///.
    pub fn from_env() -> Result<Self> {
        let mut builder = ConfigBuilder::builder().add_source(File::from_str(
            include_str!("../config/default.toml"),
            FileFormat::Toml,
        ));

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false).format(FileFormat::Toml));
        }

        builder = builder.add_source(Environment::with_prefix("TASKD").separator("_").try_parsing(true));

        let built = builder.build().context("failed to build configuration")?;
        let mut result: Config = built.try_deserialize().context("failed to deserialize configuration")?;
        result.apply_standard_env_vars();
        Ok(result)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::with_name(path).format(FileFormat::Toml))
            .add_source(Environment::with_prefix("TASKD").separator("_").try_parsing(true));
        let built = builder.build().context("failed to build configuration from file")?;
        built.try_deserialize().context("failed to deserialize configuration from file")
    }

    /// A handful of standalone variable names kept independent of the
    /// `TASKD_` prefix for simpler deployment scripts.
    fn apply_standard_env_vars(&mut self) {
        if let Ok(port) = env::var("TASKD_TCP_PORT") {
            if let Ok(p) = port.parse() {
                self.daemon.tcp_port = p;
            }
        }
        if let Ok(port) = env::var("TASKD_HTTP_PORT") {
            if let Ok(p) = port.parse() {
                self.daemon.http_port = p;
            }
        }
        if let Ok(base) = env::var("TASKD_BASE_DIR") {
            self.daemon.base_dir = base;
        }
        if let Ok(envs) = env::var("TASKD_ENVIRONMENTS") {
            self.daemon.environments = envs.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(default_env) = env::var("TASKD_DEFAULT_ENVIRONMENT") {
            self.daemon.default_environment = default_env;
        }
        if env::var("TASKD_SKIP_TCP").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false) {
            self.daemon.skip_tcp = true;
        }
        if env::var("TASKD_TEST_MODE").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false) {
            self.daemon.test_mode = true;
        }
        if env::var("TASKD_PROCESS_ALL").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false) {
            self.daemon.process_all = true;
        }
        if let Ok(envs) = env::var("TASKD_PROCESS_ENVIRONMENTS") {
            self.daemon.process_environments = envs.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn base_path(&self) -> PathBuf {
        PathBuf::from(&self.daemon.base_dir)
    }

    pub fn environment_dir(&self, env_name: &str) -> PathBuf {
        self.base_path().join(env_name)
    }

    /// Resolves which environments the workflow loop should run for
    ///.
    pub fn selected_workflow_environments(&self) -> Vec<String> {
        if self.daemon.test_mode {
            return Vec::new();
        }
        if self.daemon.process_all {
            return self.daemon.environments.clone();
        }
        if !self.daemon.process_environments.is_empty() {
            return self.daemon.process_environments.clone();
        }
        vec![self.daemon.default_environment.clone()]
    }

    pub fn tcp_address(&self) -> String {
        format!("127.0.0.1:{}", self.daemon.tcp_port)
    }

    pub fn http_address(&self) -> String {
        format!("127.0.0.1:{}", self.daemon.http_port)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(anyhow::anyhow!("invalid log level: {other}")),
        }
        if self.daemon.tcp_port == 0 {
            return Err(anyhow::anyhow!("tcp_port cannot be 0"));
        }
        if self.daemon.http_port == 0 {
            return Err(anyhow::anyhow!("http_port cannot be 0"));
        }
        if self.daemon.environments.is_empty() {
            return Err(anyhow::anyhow!("at least one environment must be configured"));
        }
        if !self.daemon.environments.contains(&self.daemon.default_environment) {
            return Err(anyhow::anyhow!(
                "default_environment {:?} is not in the configured environment list",
                self.daemon.default_environment
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            daemon: DaemonConfig {
                base_dir: "./data".to_string(),
                tcp_port: 3001,
                http_port: 3000,
                environments: vec!["default".to_string()],
                default_environment: "default".to_string(),
                process_environments: Vec::new(),
                process_all: false,
                skip_tcp: false,
                test_mode: false,
                audit_retention_days: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_unknown_default_environment() {
        let mut config = Config::default();
        config.daemon.default_environment = "missing".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn selects_default_environment_when_nothing_else_specified() {
        let config = Config::default();
        assert_eq!(config.selected_workflow_environments(), vec!["default".to_string()]);
    }

    #[test]
    fn process_all_overrides_explicit_subset() {
        let mut config = Config::default();
        config.daemon.environments = vec!["a".to_string(), "b".to_string()];
        config.daemon.default_environment = "a".to_string();
        config.daemon.process_all = true;
        config.daemon.process_environments = vec!["a".to_string()];
        let mut selected = config.selected_workflow_environments();
        selected.sort();
        assert_eq!(selected, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_mode_disables_the_workflow_loop() {
        let mut config = Config::default();
        config.daemon.test_mode = true;
        assert!(config.selected_workflow_environments().is_empty());
    }
}
