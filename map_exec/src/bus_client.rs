//! # Bus Client
//!
//! The bus client subscribes to the robot's telemetry topics and keeps the newest map payload and
//! status, ready for the pipeline to pick up on its next cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fs, path::PathBuf};

use comms_if::{
    map::{BusTopic, MapPayload, MapPayloadError, VacuumStatus},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::{debug, info, warn};

use crate::params::MapExecParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// File name of the raw payload dump, in the snapshots directory
pub const PAYLOAD_DUMP_FILE: &str = "map_payload.raw";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Source of map telemetry.
///
/// None of these calls block on the network, they only read what the client has buffered.
pub trait MessageBusClient {
    /// True if a map payload has arrived which hasn't been fetched yet.
    fn is_data_available(&mut self) -> bool;

    /// Take the pending map payload and parse it.
    fn fetch_and_parse(&mut self) -> Result<MapPayload, BusClientError>;

    /// Write the last fetched raw payload to disk.
    fn save_payload(&mut self) -> Result<(), BusClientError>;

    /// The last status the robot published.
    fn current_status(&self) -> Option<VacuumStatus>;

    /// Connect and subscribe.
    fn start(&mut self) -> Result<(), BusClientError>;

    /// Disconnect.
    fn stop(&mut self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Bus client subscribing to a zmq publisher.
pub struct ZmqBusClient {
    ctx: zmq::Context,

    endpoint: String,

    topic_prefix: String,

    credentials: Option<(String, String)>,

    payload_dump_path: PathBuf,

    /// Subscriber socket, only present while started
    socket: Option<MonitoredSocket>,

    /// Newest map body which hasn't been fetched yet
    pending: Option<Vec<u8>>,

    /// Last fetched map body
    last_raw: Option<Vec<u8>>,

    status: Option<VacuumStatus>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BusClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client has not been started")]
    NotStarted,

    #[error("No map payload is available")]
    NoData,

    #[error("Could not parse the map payload: {0}")]
    ParseError(MapPayloadError),

    #[error("No payload has been fetched yet, nothing to save")]
    NothingToSave,

    #[error("Could not save the payload: {0}")]
    SaveError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ZmqBusClient {
    /// Create a new, stopped, bus client.
    ///
    /// The raw payload dump is written to `payload_dump_path` by
    /// [`MessageBusClient::save_payload`].
    pub fn new(ctx: &zmq::Context, params: &MapExecParams, payload_dump_path: PathBuf) -> Self {
        Self {
            ctx: ctx.clone(),
            endpoint: params.bus_endpoint.clone(),
            topic_prefix: params.topic_prefix.clone(),
            credentials: params.credentials(),
            payload_dump_path,
            socket: None,
            pending: None,
            last_raw: None,
            status: None,
        }
    }

    /// Route one received message by its topic frame.
    fn handle_message(&mut self, parts: Vec<Vec<u8>>) {
        if parts.len() != 2 {
            warn!("Ignoring bus message with {} frames", parts.len());
            return;
        }

        let topic = String::from_utf8_lossy(&parts[0]).into_owned();

        match BusTopic::classify(&topic, &self.topic_prefix) {
            Some(BusTopic::MapData) => {
                // Older payloads are superseded, only the newest is kept
                self.pending = parts.into_iter().nth(1);
            }
            Some(BusTopic::Status) => {
                let status: VacuumStatus = String::from_utf8_lossy(&parts[1])
                    .parse()
                    .unwrap_or_else(|never| match never {});
                if self.status.as_ref() != Some(&status) {
                    debug!("Vacuum status changed to {}", status);
                }
                self.status = Some(status);
            }
            None => debug!("Ignoring message on topic {}", topic),
        }
    }
}

impl MessageBusClient for ZmqBusClient {
    fn is_data_available(&mut self) -> bool {
        // Drain everything the socket has buffered without blocking
        loop {
            let parts = match self.socket {
                Some(ref socket) => match socket.recv_multipart(zmq::DONTWAIT) {
                    Ok(p) => p,
                    Err(zmq::Error::EAGAIN) => break,
                    Err(e) => {
                        warn!("Could not receive from the bus: {}", e);
                        break;
                    }
                },
                None => break,
            };

            self.handle_message(parts);
        }

        self.pending.is_some()
    }

    fn fetch_and_parse(&mut self) -> Result<MapPayload, BusClientError> {
        let raw = self.pending.take().ok_or(BusClientError::NoData)?;

        let payload = MapPayload::from_slice(&raw);
        self.last_raw = Some(raw);

        payload.map_err(BusClientError::ParseError)
    }

    fn save_payload(&mut self) -> Result<(), BusClientError> {
        let raw = self.last_raw.as_ref().ok_or(BusClientError::NothingToSave)?;

        if let Some(parent) = self.payload_dump_path.parent() {
            fs::create_dir_all(parent).map_err(BusClientError::SaveError)?;
        }
        fs::write(&self.payload_dump_path, raw).map_err(BusClientError::SaveError)?;

        debug!("Raw payload saved to {:?}", self.payload_dump_path);

        Ok(())
    }

    fn current_status(&self) -> Option<VacuumStatus> {
        self.status.clone()
    }

    fn start(&mut self) -> Result<(), BusClientError> {
        if self.socket.is_some() {
            return Ok(());
        }

        let (plain_username, plain_password) = match self.credentials.clone() {
            Some((user, pass)) => (Some(user), Some(pass)),
            None => (None, None),
        };

        // Create the socket options, the publisher may not be up yet so don't block
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            subscribe: vec![self.topic_prefix.clone()],
            plain_username,
            plain_password,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 0,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(&self.ctx, zmq::SUB, socket_options, &self.endpoint)
            .map_err(BusClientError::SocketError)?;

        info!("Subscribed to {} on {}", self.topic_prefix, self.endpoint);

        self.socket = Some(socket);

        Ok(())
    }

    fn stop(&mut self) {
        if self.socket.take().is_some() {
            info!("Disconnected from {}", self.endpoint);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
