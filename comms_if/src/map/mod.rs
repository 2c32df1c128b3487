//! # Map Communications Module
//!
//! Telemetry published by the robot on the message bus, and the request/response structures used
//! by viewers to read the rendered map from the map executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod data;
pub mod status;

pub use data::*;
pub use status::VacuumStatus;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Topic suffix under which the robot publishes its map JSON
pub const MAP_DATA_TOPIC_SUFFIX: &str = "MapData/map-data";

/// Topic suffix under which the robot publishes its status string
pub const STATUS_TOPIC_SUFFIX: &str = "StatusStateAttribute/status";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A parsed map payload.
///
/// The raw JSON value is kept alongside the typed map so it can be written out verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPayload {
    pub raw: serde_json::Value,
    pub map: MapData,
}

/// A position in image pixels, or world units for the vacuum side of a calibration point.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// The robot's position in image pixels and its heading in degrees.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RobotPosition {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Pairs a point in the robot's world coordinates with the pixel it is drawn at.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CalibrationPoint {
    pub vacuum: Position,
    pub map: Position,
}

/// The attributes displayed next to the map image.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MapAttributes {
    /// Identifier of the vacuum this camera belongs to
    pub vacuum_entity: String,

    /// Last known status of the vacuum
    pub vacuum_status: Option<VacuumStatus>,

    /// Identifier of the map data the image was drawn from
    pub vacuum_json_id: Option<String>,

    pub robot_position: Option<RobotPosition>,

    pub charger_position: Option<Position>,

    pub image_size: Option<ImageSize>,

    pub calibration_points: Vec<CalibrationPoint>,

    /// Outcome of the last payload ingestion, `"Success"` or `"Error"`
    pub json_data: Option<String>,

    /// Topic the telemetry is read from
    pub listen_to: String,
}

/// A PNG map image as sent to viewers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapFrame {
    /// UTC timestamp at which the image was read
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// The PNG bytes, encoded in base64
    pub b64_png: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Topics the map executable listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusTopic {
    MapData,
    Status,
}

#[derive(Debug, thiserror::Error)]
pub enum MapPayloadError {
    #[error("The payload is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("The payload is not a valid map: {0}")]
    InvalidMap(serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum MapFrameError {
    #[error("Could not decode the frame's base64 data: {0}")]
    DecodeError(base64::DecodeError),
}

/// Requests a viewer can make to the map server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MapRequest {
    /// Get the latest map image
    Image,

    /// Get the display attributes
    Attributes,

    /// Connect to the bus and resume updates
    TurnOn,

    /// Disconnect from the bus and suspend updates
    TurnOff,
}

/// Responses from the map server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MapResponse {
    Image(MapFrame),

    Attributes(MapAttributes),

    /// The on/off request was carried out
    Ack,

    /// The request could not be handled
    Error(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BusTopic {
    /// Work out which topic a message belongs to, or `None` if it's not one we use.
    pub fn classify(topic: &str, prefix: &str) -> Option<Self> {
        let suffix = topic
            .strip_prefix(prefix.trim_end_matches('/'))?
            .strip_prefix('/')?;

        match suffix {
            MAP_DATA_TOPIC_SUFFIX => Some(BusTopic::MapData),
            STATUS_TOPIC_SUFFIX => Some(BusTopic::Status),
            _ => None,
        }
    }

    /// Full topic name under the given prefix.
    pub fn topic(&self, prefix: &str) -> String {
        let suffix = match self {
            BusTopic::MapData => MAP_DATA_TOPIC_SUFFIX,
            BusTopic::Status => STATUS_TOPIC_SUFFIX,
        };

        format!("{}/{}", prefix.trim_end_matches('/'), suffix)
    }
}

impl MapPayload {
    /// Parse a payload from the raw bytes of a map-data message.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MapPayloadError> {
        let raw: serde_json::Value =
            serde_json::from_slice(bytes).map_err(MapPayloadError::InvalidJson)?;

        let map = MapData::deserialize(&raw).map_err(MapPayloadError::InvalidMap)?;

        Ok(Self { raw, map })
    }
}

impl MapFrame {
    /// Build a frame from encoded PNG bytes.
    pub fn from_png(png: &[u8], timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            b64_png: base64::encode(png),
        }
    }

    /// Get the PNG bytes back out of the frame.
    pub fn to_png(&self) -> Result<Vec<u8>, MapFrameError> {
        base64::decode(&self.b64_png).map_err(MapFrameError::DecodeError)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
