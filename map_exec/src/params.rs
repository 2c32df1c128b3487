//! # Map Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Longest accepted update or throttle period, one day
pub const MAX_PERIOD_S: f64 = 86_400.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MapExecParams {

    /// Identifier of the vacuum this camera shows the map of
    pub vacuum_entity: String,

    /// Network endpoint of the telemetry publisher
    pub bus_endpoint: String,

    /// Topic prefix the robot publishes under
    pub topic_prefix: String,

    /// Bus username, empty for none
    pub bus_username: String,

    /// Bus password, empty for none
    pub bus_password: String,

    /// Counter-clockwise rotation applied to the map, in degrees
    pub rotation_deg: i32,

    /// Percentage of each image dimension cropped away, split between both sides
    pub crop_percent: u8,

    /// Network endpoint for the viewer requests socket
    pub server_endpoint: String,

    /// Period between map updates
    pub update_period_s: f64,

    /// Minimum period between image reads by viewers
    pub image_throttle_s: f64,

    /// Minimum log level, one of `trace`, `debug` or `info`
    pub log_level: String
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("The crop percentage must be between 0 and 100, found {0}")]
    InvalidCrop(u8),

    #[error("The {0} parameter must not be empty")]
    EmptyParam(&'static str),

    #[error("The {0} parameter must be between 0 and 86400 seconds, found {1}")]
    InvalidPeriod(&'static str, f64)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MapExecParams {
    /// Check the parameters make sense.
    ///
    /// The rotation is never rejected, any angle is passed on to the rotation.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.crop_percent > 100 {
            return Err(ParamsError::InvalidCrop(self.crop_percent))
        }

        for (name, value) in &[
            ("bus_endpoint", &self.bus_endpoint),
            ("topic_prefix", &self.topic_prefix),
            ("server_endpoint", &self.server_endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(ParamsError::EmptyParam(*name))
            }
        }

        for (name, value) in &[
            ("update_period_s", self.update_period_s),
            ("image_throttle_s", self.image_throttle_s),
        ] {
            if !(value.is_finite() && *value > 0.0 && *value <= MAX_PERIOD_S) {
                return Err(ParamsError::InvalidPeriod(*name, *value))
            }
        }

        Ok(())
    }

    /// The bus credentials, or `None` if either half is empty.
    pub fn credentials(&self) -> Option<(String, String)> {
        if self.bus_username.is_empty() || self.bus_password.is_empty() {
            None
        } else {
            Some((self.bus_username.clone(), self.bus_password.clone()))
        }
    }
}

impl Default for MapExecParams {
    fn default() -> Self {
        Self {
            vacuum_entity: String::from("vacuum.robot"),
            bus_endpoint: String::from("tcp://localhost:5010"),
            topic_prefix: String::from("valetudo/robot"),
            bus_username: String::new(),
            bus_password: String::new(),
            rotation_deg: 0,
            crop_percent: 50,
            server_endpoint: String::from("tcp://*:5020"),
            update_period_s: 5.0,
            image_throttle_s: 5.0,
            log_level: String::from("debug")
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = MapExecParams::default();
        assert_eq!(params.validate(), Ok(()));
        assert_eq!(params.credentials(), None);
    }

    #[test]
    fn test_partial_toml() {
        let params: MapExecParams = toml_from_str(
            "vacuum_entity = \"vacuum.valetudo_kitchen\"\n\
             rotation_deg = 270\n\
             crop_percent = 0\n\
             bus_username = \"robot\"\n\
             bus_password = \"hunter2\"\n"
        );

        assert_eq!(params.vacuum_entity, "vacuum.valetudo_kitchen");
        assert_eq!(params.rotation_deg, 270);
        assert_eq!(params.crop_percent, 0);
        assert_eq!(params.topic_prefix, "valetudo/robot");
        assert_eq!(params.credentials(), Some(("robot".into(), "hunter2".into())));
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_invalid_params() {
        let params = MapExecParams { crop_percent: 101, ..Default::default() };
        assert_eq!(params.validate(), Err(ParamsError::InvalidCrop(101)));

        let params = MapExecParams { topic_prefix: " ".into(), ..Default::default() };
        assert_eq!(params.validate(), Err(ParamsError::EmptyParam("topic_prefix")));

        let params = MapExecParams { update_period_s: 0.0, ..Default::default() };
        assert_eq!(params.validate(), Err(ParamsError::InvalidPeriod("update_period_s", 0.0)));

        let params = MapExecParams { image_throttle_s: 1e300, ..Default::default() };
        assert_eq!(params.validate(), Err(ParamsError::InvalidPeriod("image_throttle_s", 1e300)));

        let params = MapExecParams { update_period_s: MAX_PERIOD_S, ..Default::default() };
        assert_eq!(params.validate(), Ok(()));

        let params = MapExecParams { update_period_s: MAX_PERIOD_S + 1.0, ..Default::default() };
        assert!(params.validate().is_err());

        // Any rotation goes through
        let params = MapExecParams { rotation_deg: -1234, ..Default::default() };
        assert_eq!(params.validate(), Ok(()));
    }

    /// Load params the same way `util::params` does, from a temporary file.
    fn toml_from_str(s: &str) -> MapExecParams {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map_exec.toml");
        std::fs::write(&path, s).unwrap();
        util::params::load_from_path(&path).unwrap()
    }
}
