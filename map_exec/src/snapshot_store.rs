//! # Snapshot store
//!
//! Durable copy of the last map payload and image taken while the robot was in a terminal state.
//! The files live at fixed paths under the software root so that a restarted executable can show
//! the map before any telemetry arrives.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::DynamicImage;
use log::debug;
use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Directory under the software root holding the snapshot files
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// File name of the pretty printed payload
pub const SNAPSHOT_JSON_FILE: &str = "map_snapshot.json";

/// File name of the PNG image
pub const SNAPSHOT_PNG_FILE: &str = "map_snapshot.png";

/// Indent used when pretty printing the payload
const JSON_INDENT: &[u8] = b"    ";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Persistence boundary for snapshots.
pub trait SnapshotStore {
    /// Write the raw payload and its image.
    ///
    /// Writes are not atomic: the payload may be written while the image fails, in which case the
    /// payload is left in place.
    fn write_snapshot(
        &mut self,
        raw_payload: &serde_json::Value,
        bitmap: &DynamicImage,
    ) -> Result<(), SnapshotError>;

    /// Load the previously written image, or `SnapshotError::NotFound` if there isn't one.
    fn load_snapshot_bitmap(&self) -> Result<DynamicImage, SnapshotError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Snapshot store writing to the file system.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    json_path: PathBuf,
    png_path: PathBuf,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Could not write the snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not serialize the payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Could not encode or decode the snapshot image: {0}")]
    Image(#[from] image::ImageError),

    #[error("No snapshot image found at {0:?}")]
    NotFound(PathBuf),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FsSnapshotStore {
    /// Create a store under the given software root.
    pub fn new(sw_root: &Path) -> Self {
        let dir = sw_root.join(SNAPSHOTS_DIR);

        Self {
            json_path: dir.join(SNAPSHOT_JSON_FILE),
            png_path: dir.join(SNAPSHOT_PNG_FILE),
        }
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn png_path(&self) -> &Path {
        &self.png_path
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn write_snapshot(
        &mut self,
        raw_payload: &serde_json::Value,
        bitmap: &DynamicImage,
    ) -> Result<(), SnapshotError> {
        for path in &[&self.json_path, &self.png_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        // Payload first, then the image
        let mut json = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut json, formatter);
        raw_payload.serialize(&mut ser)?;
        fs::write(&self.json_path, &json)?;

        bitmap.save_with_format(&self.png_path, image::ImageFormat::Png)?;

        debug!("Snapshot written to {:?} and {:?}", self.json_path, self.png_path);

        Ok(())
    }

    fn load_snapshot_bitmap(&self) -> Result<DynamicImage, SnapshotError> {
        if !self.png_path.is_file() {
            return Err(SnapshotError::NotFound(self.png_path.clone()))
        }

        Ok(image::open(&self.png_path)?)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
