//! Choosing an image when there is no new map to draw.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{DynamicImage, Rgb, RgbImage};
use log::{info, warn};

use crate::snapshot_store::{SnapshotError, SnapshotStore};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

pub const PLACEHOLDER_WIDTH: u32 = 800;
pub const PLACEHOLDER_HEIGHT: u32 = 600;
pub const PLACEHOLDER_COLOUR: Rgb<u8> = Rgb([128, 128, 128]);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The fallback image, tagged with where it came from.
#[derive(Debug, Clone)]
pub enum ResolvedBitmap {
    /// The last image shown by this pipeline
    Memory(DynamicImage),

    /// The durable snapshot, now cached in memory
    Snapshot(DynamicImage),

    /// A blank image, nothing has been drawn yet
    Placeholder(DynamicImage),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ResolvedBitmap {
    pub fn image(&self) -> &DynamicImage {
        match self {
            ResolvedBitmap::Memory(i) | ResolvedBitmap::Snapshot(i) | ResolvedBitmap::Placeholder(i) => i,
        }
    }

    pub fn into_image(self) -> DynamicImage {
        match self {
            ResolvedBitmap::Memory(i) | ResolvedBitmap::Snapshot(i) | ResolvedBitmap::Placeholder(i) => i,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Pick the image to show, in order: the in-memory image, the durable snapshot, a placeholder.
///
/// A snapshot loaded from the store is put in `cache` so the store is only read once.
pub fn resolve_bitmap<S: SnapshotStore>(
    cache: &mut Option<DynamicImage>,
    store: &S,
) -> ResolvedBitmap {
    if let Some(ref img) = cache {
        return ResolvedBitmap::Memory(img.clone());
    }

    match store.load_snapshot_bitmap() {
        Ok(img) => {
            info!("Snapshot image loaded");
            *cache = Some(img.clone());
            return ResolvedBitmap::Snapshot(img);
        }
        Err(SnapshotError::NotFound(_)) => (),
        Err(e) => warn!("Could not load the snapshot image: {}", e),
    }

    info!("Starting up, no map to show yet");
    ResolvedBitmap::Placeholder(placeholder())
}

/// Flat grey image shown before anything has been drawn.
pub fn placeholder() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(
        PLACEHOLDER_WIDTH,
        PLACEHOLDER_HEIGHT,
        PLACEHOLDER_COLOUR,
    ))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::snapshot_store::FsSnapshotStore;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn small(colour: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba(colour)))
    }

    #[test]
    fn test_fallback_order() {
        let root = tempfile::tempdir().unwrap();
        let mut store = FsSnapshotStore::new(root.path());
        let mut cache = None;

        // Nothing anywhere
        let resolved = resolve_bitmap(&mut cache, &store);
        assert!(matches!(resolved, ResolvedBitmap::Placeholder(_)));
        assert_eq!(resolved.image().dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
        assert_eq!(resolved.image().to_rgb8().get_pixel(0, 0), &PLACEHOLDER_COLOUR);
        assert!(cache.is_none());

        // Snapshot on disk, loaded and cached
        store
            .write_snapshot(&serde_json::json!({}), &small([1, 2, 3, 255]))
            .unwrap();
        let resolved = resolve_bitmap(&mut cache, &store);
        assert!(matches!(resolved, ResolvedBitmap::Snapshot(_)));
        assert_eq!(resolved.image().dimensions(), (4, 3));
        assert!(cache.is_some());

        // The cache wins over the disk from now on
        cache = Some(small([9, 9, 9, 255]));
        let resolved = resolve_bitmap(&mut cache, &store);
        assert!(matches!(resolved, ResolvedBitmap::Memory(_)));
        assert_eq!(resolved.into_image().to_rgba8().get_pixel(0, 0).0, [9, 9, 9, 255]);
    }

    #[test]
    fn test_corrupt_snapshot_gives_placeholder() {
        let root = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(root.path());
        std::fs::create_dir_all(store.png_path().parent().unwrap()).unwrap();
        std::fs::write(store.png_path(), b"not a png").unwrap();

        let mut cache = None;
        let resolved = resolve_bitmap(&mut cache, &store);

        assert!(matches!(resolved, ResolvedBitmap::Placeholder(_)));
        assert!(cache.is_none());
    }
}
