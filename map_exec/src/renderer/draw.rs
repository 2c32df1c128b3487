//! Drawing primitives for the layer renderer.

use image::{Rgba, RgbaImage};

/// Set a pixel, ignoring coordinates outside the image.
pub fn put_checked(img: &mut RgbaImage, x: i64, y: i64, colour: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < img.width() as u64 && (y as u64) < img.height() as u64 {
        img.put_pixel(x as u32, y as u32, colour);
    }
}

/// Line between two points in image pixels, inclusive of both ends.
///
/// The line is clipped to the image before it is rasterised, so only pixels inside the image are
/// ever visited whatever the endpoints are.
pub fn line(img: &mut RgbaImage, from: (f64, f64), to: (f64, f64), colour: Rgba<u8>) {
    let (from, to) = match clip(from, to, img.width(), img.height()) {
        Some(c) => c,
        None => return,
    };

    bresenham(img, round(from), round(to), colour);
}

/// Filled disc centred on a pixel.
pub fn disc(img: &mut RgbaImage, centre: (f64, f64), radius: i64, colour: Rgba<u8>) {
    let r = radius as f64;
    if !(centre.0 >= -r
        && centre.1 >= -r
        && centre.0 <= img.width() as f64 + r
        && centre.1 <= img.height() as f64 + r)
    {
        return;
    }

    let centre = round(centre);

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_checked(img, centre.0 + dx, centre.1 + dy, colour);
            }
        }
    }
}

/// Liang-Barsky clip of a segment to `[0, width - 1] x [0, height - 1]`.
fn clip(
    from: (f64, f64),
    to: (f64, f64),
    width: u32,
    height: u32,
) -> Option<((f64, f64), (f64, f64))> {
    if width == 0 || height == 0 {
        return None;
    }

    let (x_max, y_max) = (width as f64 - 1.0, height as f64 - 1.0);
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);

    if !(from.0.is_finite() && from.1.is_finite() && dx.is_finite() && dy.is_finite()) {
        return None;
    }

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);

    for &(p, q) in &[
        (-dx, from.0),
        (dx, x_max - from.0),
        (-dy, from.1),
        (dy, y_max - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }

    Some((
        (from.0 + t0 * dx, from.1 + t0 * dy),
        (from.0 + t1 * dx, from.1 + t1 * dy),
    ))
}

fn bresenham(img: &mut RgbaImage, from: (i64, i64), to: (i64, i64), colour: Rgba<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_checked(img, x, y, colour);
        if (x, y) == to {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn round(p: (f64, f64)) -> (i64, i64) {
    (p.0.round() as i64, p.1.round() as i64)
}
