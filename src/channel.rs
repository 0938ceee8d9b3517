// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! Every queue handle opens its own connection and a single channel on it.
//! Nothing here is pooled or shared: the caller becomes the exclusive owner of
//! both.

use crate::{config::ConnectionParams, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use tracing::{debug, error};

/// Opens a new connection to the broker described by `params` and creates one
/// channel on it.
///
/// # Parameters
/// * `params` - Address, credentials and vhost of the broker
///
/// # Returns
/// The connection and its channel, owned by the caller
///
/// # Example
/// ```no_run
/// # async fn run() -> Result<(), amqpqueue::errors::AmqpError> {
/// use amqpqueue::{channel::new_amqp_channel, config::ConnectionParams};
///
/// let (conn, channel) = new_amqp_channel(&ConnectionParams::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn new_amqp_channel(
    params: &ConnectionParams,
) -> Result<(Connection, Channel), AmqpError> {
    debug!(address = params.address.as_str(), "creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(params.connection_name.clone()));

    let uri = params.uri()?;
    let conn = match Connection::connect(&uri, options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(
                error = err.to_string(),
                address = params.address.as_str(),
                "failure to connect"
            );
            Err(AmqpError::ConnectionError {})
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((conn, c))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            if let Err(err) = conn.close(200, "channel creation failed").await {
                debug!(error = err.to_string(), "ignoring error while closing connection");
            }
            Err(AmqpError::ChannelError {})
        }
    }
}
