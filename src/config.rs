// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Configuration
//!
//! Connection parameters and per-handle options. A `QueueConfig` is built once
//! (from defaults, a config file or the environment), optionally merged with a
//! `QueueOverrides` value, and then only read by the handles built from it.

use crate::{errors::AmqpError, exchange::ExchangeKind};
use serde::Deserialize;
use std::env;
use url::Url;

/// Default broker address.
pub const DEFAULT_ADDRESS: &str = "localhost:5672";
/// Default broker user and password.
pub const DEFAULT_CREDENTIAL: &str = "guest";
/// Default virtual host.
pub const DEFAULT_VHOST: &str = "/";
/// Default exchange shared by producers and consumers.
pub const DEFAULT_EXCHANGE: &str = "sqs_exchange";
/// Name the connections announce to the broker.
pub const DEFAULT_CONNECTION_NAME: &str = "amqpqueue";

const AMQP_PORT: u16 = 5672;
const AMQPS_PORT: u16 = 5671;

/// Parameters identifying one broker endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// `host` or `host:port`
    pub address: String,
    pub user: String,
    pub password: String,
    /// Use `amqps` (TLS) instead of plain `amqp`
    pub ssl: bool,
    pub vhost: String,
    pub connection_name: String,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        ConnectionParams {
            address: DEFAULT_ADDRESS.to_owned(),
            user: DEFAULT_CREDENTIAL.to_owned(),
            password: DEFAULT_CREDENTIAL.to_owned(),
            ssl: false,
            vhost: DEFAULT_VHOST.to_owned(),
            connection_name: DEFAULT_CONNECTION_NAME.to_owned(),
        }
    }
}

impl ConnectionParams {
    /// Builds the AMQP URI for these parameters.
    ///
    /// A missing port resolves to 5672, or 5671 when `ssl` is set. User,
    /// password and vhost are percent-encoded, so the default vhost `/` is
    /// written as `%2F`.
    ///
    /// # Returns
    /// The URI, or `ConfigError` when the address is not a valid host
    pub fn uri(&self) -> Result<String, AmqpError> {
        let scheme = if self.ssl { "amqps" } else { "amqp" };

        let host = if self.address.contains(':') {
            self.address.clone()
        } else {
            let port = if self.ssl { AMQPS_PORT } else { AMQP_PORT };
            format!("{}:{}", self.address, port)
        };

        let invalid = || AmqpError::ConfigError(format!("broker address {}", self.address));

        let mut uri = Url::parse(&format!("{}://{}/", scheme, host)).map_err(|_| invalid())?;
        uri.set_username(&self.user).map_err(|_| invalid())?;
        uri.set_password(Some(self.password.as_str()))
            .map_err(|_| invalid())?;

        let vhost = match self.vhost.as_str() {
            "/" => "/",
            other => other.trim_start_matches('/'),
        };
        uri.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push(vhost);

        Ok(uri.into())
    }
}

/// Everything needed to build a Producer, Consumer or Subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub connection: ConnectionParams,
    pub exchange_name: String,
    pub exchange_kind: ExchangeKind,
    /// Unacknowledged deliveries the broker may push ahead of `get`.
    pub prefetch: u16,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            connection: ConnectionParams::default(),
            exchange_name: DEFAULT_EXCHANGE.to_owned(),
            exchange_kind: ExchangeKind::Direct,
            prefetch: 1,
        }
    }
}

/// Per-handle overrides applied on top of a `QueueConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueOverrides {
    pub address: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub ssl: Option<bool>,
    pub vhost: Option<String>,
    pub exchange_name: Option<String>,
    pub exchange_kind: Option<ExchangeKind>,
    pub prefetch: Option<u16>,
}

impl QueueOverrides {
    pub fn address(mut self, address: &str) -> Self {
        self.address = Some(address.to_owned());
        self
    }

    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        self.user = Some(user.to_owned());
        self.password = Some(password.to_owned());
        self
    }

    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    pub fn vhost(mut self, vhost: &str) -> Self {
        self.vhost = Some(vhost.to_owned());
        self
    }

    pub fn exchange_name(mut self, name: &str) -> Self {
        self.exchange_name = Some(name.to_owned());
        self
    }

    pub fn exchange_kind(mut self, kind: ExchangeKind) -> Self {
        self.exchange_kind = Some(kind);
        self
    }

    pub fn prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = Some(prefetch);
        self
    }
}

impl QueueConfig {
    /// Returns a new config with every `Some` override replacing the default.
    pub fn merge(&self, overrides: &QueueOverrides) -> QueueConfig {
        let base = &self.connection;

        QueueConfig {
            connection: ConnectionParams {
                address: overrides.address.clone().unwrap_or(base.address.clone()),
                user: overrides.user.clone().unwrap_or(base.user.clone()),
                password: overrides.password.clone().unwrap_or(base.password.clone()),
                ssl: overrides.ssl.unwrap_or(base.ssl),
                vhost: overrides.vhost.clone().unwrap_or(base.vhost.clone()),
                connection_name: base.connection_name.clone(),
            },
            exchange_name: overrides
                .exchange_name
                .clone()
                .unwrap_or(self.exchange_name.clone()),
            exchange_kind: overrides
                .exchange_kind
                .clone()
                .unwrap_or(self.exchange_kind.clone()),
            prefetch: overrides.prefetch.unwrap_or(self.prefetch),
        }
    }

    /// Loads the configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first when present.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<QueueConfig, AmqpError> {
        dotenv::dotenv().ok();
        QueueConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<QueueConfig, AmqpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = QueueConfig::default();

        if let Some(address) = lookup("AMQP_ADDR") {
            cfg.connection.address = address;
        }
        if let Some(user) = lookup("AMQP_USER") {
            cfg.connection.user = user;
        }
        if let Some(password) = lookup("AMQP_PASSWORD") {
            cfg.connection.password = password;
        }
        if let Some(ssl) = lookup("AMQP_SSL") {
            cfg.connection.ssl = parse_bool(&ssl)
                .ok_or_else(|| AmqpError::ConfigError(format!("AMQP_SSL={}", ssl)))?;
        }
        if let Some(vhost) = lookup("AMQP_VHOST") {
            cfg.connection.vhost = vhost;
        }
        if let Some(exchange) = lookup("AMQP_EXCHANGE") {
            cfg.exchange_name = exchange;
        }
        if let Some(kind) = lookup("AMQP_EXCHANGE_KIND") {
            cfg.exchange_kind = kind.parse()?;
        }
        if let Some(prefetch) = lookup("AMQP_PREFETCH") {
            cfg.prefetch = prefetch
                .parse()
                .map_err(|_| AmqpError::ConfigError(format!("AMQP_PREFETCH={}", prefetch)))?;
        }

        Ok(cfg)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
