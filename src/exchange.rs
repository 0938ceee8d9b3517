// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Management for RabbitMQ
//!
//! Exchanges receive every published message and route copies to the queues
//! bound to them. Point-to-point delivery and fan-out both go through a durable
//! `direct` exchange by default: fan-out comes from binding several queues under
//! the same key, not from the exchange type.

use crate::errors::AmqpError;
use serde::Deserialize;
use std::str::FromStr;

/// Represents the types of exchanges available in RabbitMQ.
///
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl From<&ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: &ExchangeKind) -> lapin::ExchangeKind {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        }
    }
}

impl FromStr for ExchangeKind {
    type Err = AmqpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(ExchangeKind::Direct),
            "fanout" => Ok(ExchangeKind::Fanout),
            "topic" => Ok(ExchangeKind::Topic),
            "headers" => Ok(ExchangeKind::Headers),
            other => Err(AmqpError::ConfigError(format!("exchange kind {}", other))),
        }
    }
}

/// Definition of a RabbitMQ exchange with its configuration parameters.
#[derive(Debug, Clone)]
pub struct ExchangeDefinition<'ex> {
    pub(crate) name: &'ex str,
    pub(crate) kind: &'ex ExchangeKind,
    pub(crate) durable: bool,
}

impl<'ex> ExchangeDefinition<'ex> {
    /// Creates a new, non-durable Direct exchange definition.
    ///
    /// Exchanges are never declared passive, internal or auto-deleted.
    ///
    /// # Parameters
    /// * `name` - Name of the exchange
    ///
    /// # Returns
    /// A new ExchangeDefinition instance
    pub fn new(name: &'ex str) -> ExchangeDefinition<'ex> {
        ExchangeDefinition {
            name,
            kind: &ExchangeKind::Direct,
            durable: false,
        }
    }

    /// Sets the exchange type.
    pub fn kind(mut self, kind: &'ex ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_non_durable_direct() {
        let def = ExchangeDefinition::new("sqs_exchange");
        assert_eq!(def.kind, &ExchangeKind::Direct);
        assert!(!def.durable);
    }

    #[test]
    fn builder_flags() {
        let kind = ExchangeKind::Fanout;
        let def = ExchangeDefinition::new("events").kind(&kind).durable();
        assert_eq!(def.kind, &ExchangeKind::Fanout);
        assert!(def.durable);
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!("Direct".parse::<ExchangeKind>().unwrap(), ExchangeKind::Direct);
        assert_eq!("topic".parse::<ExchangeKind>().unwrap(), ExchangeKind::Topic);
        assert!("x-delayed".parse::<ExchangeKind>().is_err());
    }

    #[test]
    fn converts_to_lapin_kind() {
        let kind: lapin::ExchangeKind = (&ExchangeKind::Headers).into();
        assert!(matches!(kind, lapin::ExchangeKind::Headers));
    }
}
