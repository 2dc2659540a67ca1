// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `NODE_URLS` | Comma-separated network node base URLs | `http://127.0.0.1:26657` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use url::Url;

/// Environment variable name for the server bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the comma-separated list of network node
/// base URLs the transaction pipeline submits to.
pub const NODE_URLS_ENV: &str = "NODE_URLS";

/// Environment variable name for the logging format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_NODE_URL: &str = "http://127.0.0.1:26657";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("the port {0:?} is not a valid port number")]
    InvalidPort(String),

    #[error("the node URL {0:?} is not a valid URL")]
    InvalidNodeUrl(String),
}

/// Service configuration, loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub node_urls: Vec<Url>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var(HOST_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match std::env::var(PORT_ENV) {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };
        let raw_urls =
            std::env::var(NODE_URLS_ENV).unwrap_or_else(|_| DEFAULT_NODE_URL.to_string());
        let node_urls = raw_urls
            .split(',')
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .map(|candidate| {
                Url::parse(candidate).map_err(|_| ConfigError::InvalidNodeUrl(candidate.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            host,
            port,
            node_urls,
        })
    }
}
