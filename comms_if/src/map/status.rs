//! # Vacuum status
//!
//! The status string published by the robot on its status topic.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Last known state of the robot.
///
/// Serialises as the lower-case status string, unknown states are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VacuumStatus {
    Idle,
    Docked,
    Error,
    Cleaning,
    Returning,
    Paused,
    Manual,
    Moving,
    Other(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VacuumStatus {
    /// True if the robot is not expected to keep changing the map in this state.
    ///
    /// Terminal states are `idle`, `docked` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VacuumStatus::Idle | VacuumStatus::Docked | VacuumStatus::Error)
    }

    /// The status as the string published on the bus.
    pub fn as_str(&self) -> &str {
        match self {
            VacuumStatus::Idle => "idle",
            VacuumStatus::Docked => "docked",
            VacuumStatus::Error => "error",
            VacuumStatus::Cleaning => "cleaning",
            VacuumStatus::Returning => "returning",
            VacuumStatus::Paused => "paused",
            VacuumStatus::Manual => "manual_control",
            VacuumStatus::Moving => "moving",
            VacuumStatus::Other(s) => s.as_str(),
        }
    }
}

impl FromStr for VacuumStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('"');

        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "idle" => VacuumStatus::Idle,
            "docked" => VacuumStatus::Docked,
            "error" => VacuumStatus::Error,
            "cleaning" => VacuumStatus::Cleaning,
            "returning" => VacuumStatus::Returning,
            "paused" => VacuumStatus::Paused,
            "manual_control" | "manual" => VacuumStatus::Manual,
            "moving" => VacuumStatus::Moving,
            _ => VacuumStatus::Other(trimmed.to_string()),
        })
    }
}

impl fmt::Display for VacuumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VacuumStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VacuumStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or_else(|never: Infallible| match never {}))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
