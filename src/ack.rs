// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Acknowledgment State
//!
//! A consumer holds at most one delivery that has been handed out by `get` and
//! not yet acknowledged or rejected.

use crate::errors::AmqpError;
pub use lapin::types::DeliveryTag;

/// Acknowledgment state of a single consumer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    /// No outstanding delivery, `get` may be called.
    #[default]
    Idle,
    /// A delivery was handed out and must be settled before the next `get`.
    AwaitingAck(DeliveryTag),
}

impl AckState {
    /// Fails with `PendingAcknowledgement` unless the state is `Idle`.
    pub fn ensure_idle(&self) -> Result<(), AmqpError> {
        match self {
            AckState::Idle => Ok(()),
            AckState::AwaitingAck(_) => Err(AmqpError::PendingAcknowledgement),
        }
    }

    /// Records `tag` as the outstanding delivery.
    ///
    /// A state that already holds a tag is left untouched.
    pub fn begin(&mut self, tag: DeliveryTag) -> Result<(), AmqpError> {
        self.ensure_idle()?;
        *self = AckState::AwaitingAck(tag);
        Ok(())
    }

    /// Returns the outstanding tag without settling it.
    pub fn outstanding(&self) -> Result<DeliveryTag, AmqpError> {
        match self {
            AckState::AwaitingAck(tag) => Ok(*tag),
            AckState::Idle => Err(AmqpError::NoPendingDelivery),
        }
    }

    /// Takes the outstanding tag and resets the state to `Idle`.
    pub fn settle(&mut self) -> Result<DeliveryTag, AmqpError> {
        let tag = self.outstanding()?;
        *self = AckState::Idle;
        Ok(tag)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, AckState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let state = AckState::default();
        assert!(state.is_idle());
        assert_eq!(state.outstanding(), Err(AmqpError::NoPendingDelivery));
    }

    #[test]
    fn second_begin_is_rejected_and_keeps_first_tag() {
        let mut state = AckState::default();
        state.begin(1).unwrap();

        assert_eq!(state.begin(2), Err(AmqpError::PendingAcknowledgement));
        assert_eq!(state, AckState::AwaitingAck(1));
        assert_eq!(state.ensure_idle(), Err(AmqpError::PendingAcknowledgement));
    }

    #[test]
    fn settle_returns_tag_and_resets() {
        let mut state = AckState::default();
        state.begin(5).unwrap();

        assert_eq!(state.settle(), Ok(5));
        assert!(state.is_idle());
        assert!(state.begin(6).is_ok());
    }

    #[test]
    fn settle_while_idle_is_a_protocol_error() {
        let mut state = AckState::Idle;
        assert_eq!(state.settle(), Err(AmqpError::NoPendingDelivery));
        assert!(state.is_idle());
    }
}
