//! Configuration file management for tlsplain.
//!
//! Settings come from three layers, later ones overriding earlier ones:
//!
//! 1. Default values
//! 2. Configuration file (tlsplain.toml or specified with --config)
//! 3. Command-line arguments
//!
//! # Example Configuration File
//!
//! ```toml
//! hosts = ["example.com", "example.com:8443"]
//! output = "summary"
//! timeout_secs = 10
//! exit_code = 1
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{Display, EnumString};

use crate::{FetchOptions, DEFAULT_TIMEOUT};

/// Main configuration structure.
///
/// All fields are optional so partial configurations can be merged.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// List of hosts to check
    pub hosts: Option<Vec<String>>,
    /// Output format: json, text, summary
    pub output: Option<String>,
    /// Per-connection timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Exit code to use when a host is unverified or could not be assessed
    pub exit_code: Option<i32>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus Push Gateway settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrometheusConfig {
    /// Enable prometheus metrics pushing
    pub enabled: Option<bool>,
    /// Prometheus push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

/// How results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Json,
    Text,
    Summary,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// ```no_run
    /// # use tlsplain::config::Config;
    /// let config = Config::from_file("tlsplain.toml")?;
    /// # Ok::<(), tlsplain::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Merges this configuration with another, prioritizing the other's values.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.hosts.is_some() {
            self.hosts = other.hosts;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Creates a Config holding only the values given on the command line.
    pub fn from_cli_args(
        hosts: Option<Vec<String>>,
        output: Option<String>,
        timeout_secs: Option<u64>,
        exit_code: Option<i32>,
        prometheus: Option<bool>,
        prometheus_address: Option<String>,
    ) -> Self {
        Config {
            hosts,
            output,
            timeout_secs,
            exit_code,
            prometheus: Some(PrometheusConfig {
                enabled: prometheus,
                address: prometheus_address,
            }),
        }
    }

    /// Checks the merged configuration and returns the hosts to assess.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        self.output_format()?;
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        match &self.hosts {
            Some(hosts) if !hosts.is_empty() => Ok(hosts.clone()),
            _ => Err(ConfigError::Validation(
                "no hosts given on the command line or in the configuration file".to_string(),
            )),
        }
    }

    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        let output = self.output.as_deref().unwrap_or("summary");
        OutputFormat::from_str(output).map_err(|_| {
            ConfigError::Validation(format!(
                "unknown output format '{}', expected json, text or summary",
                output
            ))
        })
    }

    pub fn fetch_options(&self) -> FetchOptions {
        let timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        FetchOptions::default().with_timeout(timeout)
    }

    /// Push gateway address, if pushing metrics is enabled.
    pub fn prometheus_address(&self) -> Option<String> {
        let prom = self.prometheus.as_ref()?;
        if prom.enabled.unwrap_or(false) {
            prom.address.clone()
        } else {
            None
        }
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            hosts: Some(vec![
                "example.com".to_string(),
                "example.com:8443".to_string(),
                "https://secure.example.com:9443".to_string(),
                "self-signed.badssl.com".to_string(),
            ]),
            output: Some("summary".to_string()),
            timeout_secs: Some(10),
            exit_code: Some(1),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

impl Default for Config {
    /// `summary` output, a 10 second timeout, exit code 0 and metrics off.
    fn default() -> Self {
        Config {
            hosts: None,
            output: Some("summary".to_string()),
            timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
            exit_code: Some(0),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
