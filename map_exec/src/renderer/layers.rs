//! Renderer drawing one image pixel per map grid cell.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::map::{
    CalibrationPoint, EntityType, ImageSize, LayerType, MapData, MapLayer, Position, RobotPosition,
};
use image::{DynamicImage, Rgba, RgbaImage};
use log::{trace, warn};

use super::{draw, MapRenderer};
use crate::rotation::rotate_point;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const BACKGROUND: Rgba<u8> = Rgba([0, 125, 255, 0]);
const FLOOR: Rgba<u8> = Rgba([0, 125, 255, 255]);
const WALL: Rgba<u8> = Rgba([255, 255, 0, 255]);
const PATH: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CHARGER: Rgba<u8> = Rgba([0, 128, 0, 255]);
const ROBOT: Rgba<u8> = Rgba([255, 255, 204, 255]);
const ROBOT_HEADING: Rgba<u8> = Rgba([40, 40, 40, 255]);

/// Room colours, picked by segment id
const SEGMENT_PALETTE: [Rgba<u8>; 6] = [
    Rgba([135, 206, 250, 255]),
    Rgba([176, 226, 255, 255]),
    Rgba([164, 211, 238, 255]),
    Rgba([141, 182, 205, 255]),
    Rgba([96, 123, 139, 255]),
    Rgba([124, 205, 124, 255]),
];

const CHARGER_RADIUS: i64 = 3;
const ROBOT_RADIUS: i64 = 4;
const HEADING_LENGTH: f64 = 6.0;

/// Crop percentages are clamped to this so there is always something left to draw
const MAX_CROP_PERCENT: u8 = 99;

/// Largest grid side drawn, maps with a larger grid are not rendered
const MAX_GRID_SIDE: u32 = 4096;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Draws the floor, segments and walls of a map, then the path, charger and robot on top.
#[derive(Debug, Default)]
pub struct LayerRenderer {
    last: Option<Drawn>,
}

/// Geometry of the last drawn image.
#[derive(Debug, Clone)]
struct Drawn {
    /// Grid cell at the top left of the image
    offset: (u32, u32),
    pixel_size: f64,
    size: ImageSize,
    charger: Option<Position>,
    robot: Option<RobotPosition>,
    id: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LayerRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drawn {
    /// World units to (fractional) image pixels.
    fn to_image(&self, world: (f64, f64)) -> (f64, f64) {
        (
            world.0 / self.pixel_size - self.offset.0 as f64,
            world.1 / self.pixel_size - self.offset.1 as f64,
        )
    }

    /// Image pixels to world units.
    fn to_world(&self, image: Position) -> Position {
        Position {
            x: (image.x + self.offset.0 as f64) * self.pixel_size,
            y: (image.y + self.offset.1 as f64) * self.pixel_size,
        }
    }
}

impl MapRenderer for LayerRenderer {
    fn render(&mut self, map: &MapData, crop_percent: u8) -> Option<DynamicImage> {
        let (grid_w, grid_h) = map.grid_size();

        if grid_w == 0 || grid_h == 0 || !map.has_pixels() {
            trace!("Map has nothing to draw");
            return None;
        }

        if grid_w > MAX_GRID_SIDE || grid_h > MAX_GRID_SIDE {
            warn!(
                "Map grid of {}x{} cells is larger than {} a side, not drawing it",
                grid_w, grid_h, MAX_GRID_SIDE
            );
            return None;
        }

        // Remove the cropped share evenly from both sides
        let crop = crop_percent.min(MAX_CROP_PERCENT) as u32;
        let cut_x = grid_w * crop / 200;
        let cut_y = grid_h * crop / 200;

        let mut drawn = Drawn {
            offset: (cut_x, cut_y),
            pixel_size: map.pixel_size.max(1) as f64,
            size: ImageSize {
                width: grid_w - 2 * cut_x,
                height: grid_h - 2 * cut_y,
            },
            charger: None,
            robot: None,
            id: map.meta_data.nonce.clone(),
        };

        let mut img = RgbaImage::from_pixel(drawn.size.width, drawn.size.height, BACKGROUND);

        // Floor and rooms first so walls are drawn over their edges
        for pass in &[LayerType::Floor, LayerType::Segment, LayerType::Wall] {
            for (index, layer) in map.layers.iter().enumerate() {
                if layer.layer_type == *pass {
                    let colour = layer_colour(layer, index);
                    draw_layer(&mut img, &drawn, (grid_w, grid_h), layer, colour);
                }
            }
        }

        // Paths
        for entity in map.entities.iter().filter(|e| {
            matches!(e.entity_type, EntityType::Path | EntityType::PredictedPath)
        }) {
            let points: Vec<_> = entity.point_pairs().map(|p| drawn.to_image(p)).collect();
            for pair in points.windows(2) {
                draw::line(&mut img, pair[0], pair[1], PATH);
            }
        }

        // Charger
        if let Some((x, y)) = map
            .entity(EntityType::ChargerLocation)
            .and_then(|e| e.point_pairs().next())
        {
            let (x, y) = drawn.to_image((x, y));
            draw::disc(&mut img, (x, y), CHARGER_RADIUS, CHARGER);
            drawn.charger = Some(Position { x, y });
        }

        // Robot, with a tick showing its heading
        if let Some(robot) = map.entity(EntityType::RobotPosition) {
            if let Some(point) = robot.point_pairs().next() {
                let (x, y) = drawn.to_image(point);
                let angle = robot.meta_data.angle.unwrap_or(0.0);
                let (sin, cos) = angle.to_radians().sin_cos();

                draw::disc(&mut img, (x, y), ROBOT_RADIUS, ROBOT);
                draw::line(
                    &mut img,
                    (x, y),
                    (x + HEADING_LENGTH * cos, y + HEADING_LENGTH * sin),
                    ROBOT_HEADING,
                );
                drawn.robot = Some(RobotPosition { x, y, angle });
            }
        }

        trace!(
            "Drew {}x{} map, offset {:?}",
            drawn.size.width,
            drawn.size.height,
            drawn.offset
        );

        self.last = Some(drawn);

        Some(DynamicImage::ImageRgba8(img))
    }

    fn charger_position(&self) -> Option<Position> {
        self.last.as_ref().and_then(|d| d.charger)
    }

    fn robot_position(&self) -> Option<RobotPosition> {
        self.last.as_ref().and_then(|d| d.robot)
    }

    fn image_size(&self) -> Option<ImageSize> {
        self.last.as_ref().map(|d| d.size)
    }

    fn calibration_points(&self, rotation_deg: i32) -> Vec<CalibrationPoint> {
        let drawn = match self.last {
            Some(ref d) => d,
            None => return Vec::new(),
        };

        let (w, h) = (drawn.size.width, drawn.size.height);

        [(0.0, 0.0), (w as f64, 0.0), (w as f64, h as f64)]
            .iter()
            .map(|&(x, y)| {
                let corner = Position { x, y };
                CalibrationPoint {
                    vacuum: drawn.to_world(corner),
                    map: rotate_point(corner, w, h, rotation_deg),
                }
            })
            .collect()
    }

    fn map_data_id(&self) -> Option<String> {
        self.last.as_ref().and_then(|d| d.id.clone())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn layer_colour(layer: &MapLayer, index: usize) -> Rgba<u8> {
    match layer.layer_type {
        LayerType::Floor => FLOOR,
        LayerType::Wall => WALL,
        _ => {
            let key = layer
                .meta_data
                .segment_id
                .as_deref()
                .and_then(|id| id.parse::<usize>().ok())
                .unwrap_or(index);
            SEGMENT_PALETTE[key % SEGMENT_PALETTE.len()]
        }
    }
}

fn draw_layer(
    img: &mut RgbaImage,
    drawn: &Drawn,
    grid: (u32, u32),
    layer: &MapLayer,
    colour: Rgba<u8>,
) {
    for (x, y) in layer.cells(grid.0, grid.1) {
        draw::put_checked(
            img,
            x as i64 - drawn.offset.0 as i64,
            y as i64 - drawn.offset.1 as i64,
            colour,
        );
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
