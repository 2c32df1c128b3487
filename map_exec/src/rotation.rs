//! # Image rotation
//!
//! Rotates rendered maps by the configured number of degrees, counter-clockwise about the centre
//! of the image. The canvas keeps its size for every angle, so on a non-square map a quarter turn
//! cuts off the parts which no longer fit and leaves the uncovered corners transparent.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::map::Position;
use image::{DynamicImage, Rgba, RgbaImage};

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Bring an angle in degrees into `[0, 360)`.
pub fn normalise_degrees(degrees: i32) -> i32 {
    degrees.rem_euclid(360)
}

/// Rotate the image counter-clockwise by the given angle.
pub fn rotate(image: DynamicImage, degrees: i32) -> DynamicImage {
    match normalise_degrees(degrees) {
        0 => image,
        180 => image.rotate180(),
        d => DynamicImage::ImageRgba8(rotate_nearest(&image.to_rgba8(), d)),
    }
}

/// Where a point in an unrotated `width` x `height` image ends up after [`rotate`].
pub fn rotate_point(point: Position, width: u32, height: u32, degrees: i32) -> Position {
    let degrees = normalise_degrees(degrees);
    if degrees == 0 {
        return point;
    }

    let (sin, cos) = sin_cos(degrees);
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (dx, dy) = (point.x - cx, point.y - cy);

    // y points down the image, so a counter-clockwise turn takes +x towards -y
    Position {
        x: cx + dx * cos + dy * sin,
        y: cy - dx * sin + dy * cos,
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Nearest-neighbour counter-clockwise rotation about the image centre. Pixels which fall outside
/// the source are transparent.
fn rotate_nearest(src: &RgbaImage, degrees: i32) -> RgbaImage {
    let (width, height) = src.dimensions();
    let (sin, cos) = sin_cos(degrees);
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);

    RgbaImage::from_fn(width, height, |x, y| {
        // Sample the source by rotating the destination pixel centre backwards
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        let sx = (cx + dx * cos - dy * sin).floor();
        let sy = (cy + dx * sin + dy * cos).floor();

        if sx >= 0.0 && sy >= 0.0 && sx < width as f64 && sy < height as f64 {
            *src.get_pixel(sx as u32, sy as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Sine and cosine of a normalised angle, exact on the quarter turns.
fn sin_cos(degrees: i32) -> (f64, f64) {
    match degrees {
        0 => (0.0, 1.0),
        90 => (1.0, 0.0),
        180 => (0.0, -1.0),
        270 => (-1.0, 0.0),
        d => (d as f64).to_radians().sin_cos(),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
