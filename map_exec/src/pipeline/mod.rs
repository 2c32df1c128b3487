//! # Map pipeline
//!
//! Turns map telemetry from the bus into a PNG image, one update cycle at a time. The pipeline
//! keeps the last encoded image so a cycle with nothing new to draw returns exactly what the
//! previous one did, and falls back to the last image, then a saved snapshot, then a placeholder
//! when there is nothing to draw at all.
//!
//! The first time a rendered map is seen while the robot is idle, docked or in error a snapshot of
//! the payload and image is saved, so a restarted executable has something to show before the robot
//! publishes again. Only one snapshot is ever attempted per pipeline.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod fallback;
mod snapshot;

#[cfg(test)]
pub(crate) mod test;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;

use comms_if::map::{
    BusTopic, CalibrationPoint, ImageSize, MapAttributes, MapPayload, Position, RobotPosition,
    VacuumStatus,
};
use image::{DynamicImage, ImageOutputFormat};
use log::{debug, error, info, trace, warn};

use crate::{
    bus_client::{BusClientError, MessageBusClient},
    params::MapExecParams,
    renderer::MapRenderer,
    rotation,
    snapshot_store::SnapshotStore,
};

pub use fallback::{placeholder, resolve_bitmap, ResolvedBitmap};
pub use snapshot::SnapshotState;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Settings fixed for the life of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub vacuum_entity: String,

    /// Map data topic, reported in the attributes
    pub listen_to: String,

    /// Counter-clockwise rotation in degrees
    pub rotation_deg: i32,

    pub crop_percent: u8,
}

/// Geometry of the last successfully rendered map.
///
/// Replaced as a whole after each render so the fields always describe the same map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapGeometry {
    pub charger_position: Option<Position>,
    pub robot_position: Option<RobotPosition>,
    pub image_size: Option<ImageSize>,
    pub calibration_points: Vec<CalibrationPoint>,
    pub map_data_id: Option<String>,
}

#[derive(Debug, Default)]
struct PipelineState {
    /// PNG bytes returned by the last cycle
    last_encoded: Option<Vec<u8>>,

    /// The image `last_encoded` was made from
    last_bitmap: Option<DynamicImage>,

    robot_status: Option<VacuumStatus>,

    snapshot: SnapshotState,

    geometry: Option<MapGeometry>,

    ingest: Option<IngestOutcome>,

    should_poll: bool,
}

pub struct MapPipeline<B, R, S>
where
    B: MessageBusClient,
    R: MapRenderer,
    S: SnapshotStore,
{
    config: PipelineConfig,
    bus: B,
    renderer: R,
    store: S,
    state: PipelineState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Outcome of the last attempt to fetch and parse a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Success,
    Error,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_params(params: &MapExecParams) -> Self {
        Self {
            vacuum_entity: params.vacuum_entity.clone(),
            listen_to: BusTopic::MapData.topic(&params.topic_prefix),
            rotation_deg: params.rotation_deg,
            crop_percent: params.crop_percent,
        }
    }
}

impl MapGeometry {
    fn from_renderer<R: MapRenderer>(renderer: &R, rotation_deg: i32) -> Self {
        Self {
            charger_position: renderer.charger_position(),
            robot_position: renderer.robot_position(),
            image_size: renderer.image_size(),
            calibration_points: renderer.calibration_points(rotation_deg),
            map_data_id: renderer.map_data_id(),
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestOutcome::Success => write!(f, "Success"),
            IngestOutcome::Error => write!(f, "Error"),
        }
    }
}

impl<B, R, S> MapPipeline<B, R, S>
where
    B: MessageBusClient,
    R: MapRenderer,
    S: SnapshotStore,
{
    /// Create a new pipeline. Nothing is connected until [`MapPipeline::start`] is called.
    pub fn new(config: PipelineConfig, bus: B, renderer: R, store: S) -> Self {
        Self {
            config,
            bus,
            renderer,
            store,
            state: PipelineState::default(),
        }
    }

    /// Connect to the bus and enable polling.
    pub fn start(&mut self) -> Result<(), BusClientError> {
        self.bus.start()?;
        self.state.should_poll = true;
        info!("Map pipeline started, listening to {}", self.config.listen_to);
        Ok(())
    }

    /// Disconnect from the bus and disable polling. The last image is kept.
    pub fn stop(&mut self) {
        self.bus.stop();
        self.state.should_poll = false;
        info!("Map pipeline stopped");
    }

    /// Run one update cycle and return the PNG image to display.
    ///
    /// If the bus has nothing new the previous image is returned unchanged. A payload that fails
    /// to parse also leaves the image, and the geometry, as they were.
    pub fn update(&mut self) -> &[u8] {
        if !self.bus.is_data_available() {
            trace!("No new map data");

            if self.state.last_encoded.is_none() {
                self.show_fallback();
            }

            return self.image();
        }

        info!("Map update started");

        let payload = match self.bus.fetch_and_parse() {
            Ok(p) => {
                self.state.ingest = Some(IngestOutcome::Success);
                p
            }
            Err(e) => {
                warn!("Could not ingest the map payload: {}", e);
                self.state.ingest = Some(IngestOutcome::Error);

                if self.state.last_encoded.is_none() {
                    self.show_fallback();
                }

                return self.image();
            }
        };

        match self.renderer.render(&payload.map, self.config.crop_percent) {
            Some(bitmap) => {
                let bitmap = rotation::rotate(bitmap, self.config.rotation_deg);
                debug!("Map rotated by {} degrees", self.config.rotation_deg);

                self.state.geometry = Some(MapGeometry::from_renderer(
                    &self.renderer,
                    self.config.rotation_deg,
                ));

                self.refresh_status();
                self.snapshot_if_terminal(&payload, &bitmap);
                self.store_bitmap(bitmap);
            }
            None => {
                debug!("Map has nothing to draw, showing the fallback image");
                self.show_fallback();
                self.refresh_status();
            }
        }

        info!("Map update complete");

        self.image()
    }

    /// PNG bytes of the last image, empty if no image has ever been produced.
    pub fn image(&self) -> &[u8] {
        self.state.last_encoded.as_deref().unwrap_or(&[])
    }

    /// The decoded image last shown.
    pub fn last_bitmap(&self) -> Option<&DynamicImage> {
        self.state.last_bitmap.as_ref()
    }

    pub fn should_poll(&self) -> bool {
        self.state.should_poll
    }

    pub fn snapshot_taken(&self) -> bool {
        self.state.snapshot.taken()
    }

    pub fn robot_status(&self) -> Option<&VacuumStatus> {
        self.state.robot_status.as_ref()
    }

    pub fn ingest_outcome(&self) -> Option<IngestOutcome> {
        self.state.ingest
    }

    pub fn geometry(&self) -> Option<&MapGeometry> {
        self.state.geometry.as_ref()
    }

    /// Display attributes describing the current image.
    pub fn attributes(&self) -> MapAttributes {
        let geometry = self.state.geometry.clone().unwrap_or_default();

        MapAttributes {
            vacuum_entity: self.config.vacuum_entity.clone(),
            vacuum_status: self.state.robot_status.clone(),
            vacuum_json_id: geometry.map_data_id,
            robot_position: geometry.robot_position,
            charger_position: geometry.charger_position,
            image_size: geometry.image_size,
            calibration_points: geometry.calibration_points,
            json_data: self.state.ingest.map(|o| o.to_string()),
            listen_to: self.config.listen_to.clone(),
        }
    }

    fn refresh_status(&mut self) {
        let status = self.bus.current_status();

        if status != self.state.robot_status {
            debug!(
                "Vacuum status changed to {}",
                status.as_ref().map_or("unknown", VacuumStatus::as_str)
            );
        }

        self.state.robot_status = status;
    }

    fn show_fallback(&mut self) {
        let resolved = resolve_bitmap(&mut self.state.last_bitmap, &self.store);
        self.store_bitmap(resolved.into_image());
    }

    /// Encode the image and make it the current one. On failure the previous image is kept.
    fn store_bitmap(&mut self, bitmap: DynamicImage) {
        let mut png = Vec::new();

        match bitmap.write_to(&mut png, ImageOutputFormat::Png) {
            Ok(()) => {
                self.state.last_encoded = Some(png);
                self.state.last_bitmap = Some(bitmap);
            }
            Err(e) => error!("Could not encode the map image: {}", e),
        }
    }

    fn snapshot_if_terminal(&mut self, payload: &MapPayload, bitmap: &DynamicImage) {
        if !self.state.snapshot.should_attempt(self.state.robot_status.as_ref()) {
            return;
        }

        // Advanced before writing so a failed write is never retried
        self.state.snapshot = SnapshotState::SnapshotAttempted;

        if let Err(e) = self.bus.save_payload() {
            warn!("Could not save the raw map payload: {}", e);
        }

        match self.store.write_snapshot(&payload.raw, bitmap) {
            Ok(()) => info!(
                "Map snapshot saved while {}",
                self.state
                    .robot_status
                    .as_ref()
                    .map_or("unknown", VacuumStatus::as_str)
            ),
            Err(e) => warn!(
                "Could not save the map snapshot, no snapshot available until restart: {}",
                e
            ),
        }
    }
}
