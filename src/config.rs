// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the parsed [`ServerConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `lesson-ledger.redb` | unset: in-memory store |
//! | `LEDGER_URL` | Base URL of the ledger service | unset: in-process ledger |
//! | `BLOB_STORAGE_URL` | Base URL of blob storage | unset: in-process storage |
//! | `BLOB_GATEWAY_URL` | Gateway used by in-process blob storage | `http://localhost:8081/blobs` |
//! | `COLLABORATOR_TIMEOUT_SECS` | Per-request timeout for collaborator calls | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory for the embedded database. Without it nothing is persisted.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const LEDGER_URL_ENV: &str = "LEDGER_URL";
pub const BLOB_STORAGE_URL_ENV: &str = "BLOB_STORAGE_URL";
pub const BLOB_GATEWAY_URL_ENV: &str = "BLOB_GATEWAY_URL";
pub const COLLABORATOR_TIMEOUT_ENV: &str = "COLLABORATOR_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BLOB_GATEWAY: &str = "http://localhost:8081/blobs";
pub const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid port: {value}")]
    InvalidPort { var: &'static str, value: String },

    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddress { var: &'static str, value: String },

    #[error("{var} is not a valid URL ({value}): {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} must be a positive number of seconds: {value}")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("{var} must be 'json' or 'pretty': {value}")]
    InvalidLogFormat { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: Option<PathBuf>,
    pub ledger_url: Option<Url>,
    pub blob_storage_url: Option<Url>,
    pub blob_gateway: String,
    pub collaborator_timeout: Duration,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var(PORT_ENV) {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                var: PORT_ENV,
                value,
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddress {
                var: HOST_ENV,
                value: host.clone(),
            })?;

        let collaborator_timeout = match var(COLLABORATOR_TIMEOUT_ENV) {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        var: COLLABORATOR_TIMEOUT_ENV,
                        value,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_COLLABORATOR_TIMEOUT_SECS),
        };

        let log_format = match var(LOG_FORMAT_ENV).map(|v| v.to_lowercase()) {
            None => LogFormat::Pretty,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(v) if v == "json" => LogFormat::Json,
            Some(value) => {
                return Err(ConfigError::InvalidLogFormat {
                    var: LOG_FORMAT_ENV,
                    value,
                })
            }
        };

        Ok(Self {
            bind_addr,
            data_dir: var(DATA_DIR_ENV).map(PathBuf::from),
            ledger_url: parse_url(LEDGER_URL_ENV, var(LEDGER_URL_ENV))?,
            blob_storage_url: parse_url(BLOB_STORAGE_URL_ENV, var(BLOB_STORAGE_URL_ENV))?,
            blob_gateway: var(BLOB_GATEWAY_URL_ENV).unwrap_or_else(|| DEFAULT_BLOB_GATEWAY.to_string()),
            collaborator_timeout,
            log_format,
        })
    }
}

fn parse_url(var: &'static str, value: Option<String>) -> Result<Option<Url>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let url = Url::parse(&value).map_err(|e| ConfigError::InvalidUrl {
        var,
        value: value.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            var,
            value,
            reason: "scheme must be http or https".to_string(),
        });
    }
    Ok(Some(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_run_fully_in_memory() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert!(config.data_dir.is_none());
        assert!(config.ledger_url.is_none());
        assert!(config.blob_storage_url.is_none());
        assert_eq!(config.collaborator_timeout, Duration::from_secs(15));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (DATA_DIR_ENV, "/var/lib/lessons"),
            (LEDGER_URL_ENV, "http://ledger.internal:7000"),
            (BLOB_STORAGE_URL_ENV, "https://blobs.internal"),
            (COLLABORATOR_TIMEOUT_ENV, "3"),
            (LOG_FORMAT_ENV, "JSON"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/lessons")));
        assert_eq!(config.ledger_url.unwrap().port(), Some(7000));
        assert_eq!(config.blob_storage_url.unwrap().scheme(), "https");
        assert_eq!(config.collaborator_timeout, Duration::from_secs(3));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config(&[(DATA_DIR_ENV, "  "), (LEDGER_URL_ENV, "")]).unwrap();
        assert!(config.data_dir.is_none());
        assert!(config.ledger_url.is_none());
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config(&[(PORT_ENV, "http")]),
            Err(ConfigError::InvalidPort { .. })
        ));
        assert!(matches!(
            config(&[(COLLABORATOR_TIMEOUT_ENV, "0")]),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        assert!(matches!(
            config(&[(LEDGER_URL_ENV, "ftp://ledger")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            config(&[(LOG_FORMAT_ENV, "xml")]),
            Err(ConfigError::InvalidLogFormat { .. })
        ));
    }
}
