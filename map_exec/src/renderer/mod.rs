//! # Map Renderer
//!
//! Turns a parsed map into an image, and remembers the geometry of the last image it drew so the
//! pipeline can publish it alongside the image.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod draw;
mod layers;

pub use layers::LayerRenderer;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::map::{CalibrationPoint, ImageSize, MapData, Position, RobotPosition};
use image::DynamicImage;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can draw a map.
///
/// The geometry accessors describe the image returned by the last successful call to
/// [`MapRenderer::render`], in image pixels of the unrotated image.
pub trait MapRenderer {
    /// Draw the map, cropping `crop_percent` of each dimension away.
    ///
    /// Returns `None` if the map has nothing to draw yet.
    fn render(&mut self, map: &MapData, crop_percent: u8) -> Option<DynamicImage>;

    fn charger_position(&self) -> Option<Position>;

    fn robot_position(&self) -> Option<RobotPosition>;

    fn image_size(&self) -> Option<ImageSize>;

    /// Calibration points for the image once rotated counter-clockwise by `rotation_deg`.
    fn calibration_points(&self, rotation_deg: i32) -> Vec<CalibrationPoint>;

    /// Identifier of the map data that was drawn.
    fn map_data_id(&self) -> Option<String>;
}
