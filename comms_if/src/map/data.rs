//! # Map data
//!
//! Serde model of the map JSON published by the robot on its map-data topic. Only the parts
//! needed to draw the map are modelled, anything else in the payload is ignored.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A complete robot map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    #[serde(default)]
    pub meta_data: MapMetaData,

    /// Size of the map in world units (cm)
    pub size: MapSize,

    /// Size of one grid cell in world units
    pub pixel_size: u32,

    #[serde(default)]
    pub layers: Vec<MapLayer>,

    #[serde(default)]
    pub entities: Vec<MapEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapMetaData {
    #[serde(default)]
    pub version: Option<u32>,

    /// Changes every time the robot publishes a new map
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MapSize {
    pub x: u32,
    pub y: u32,
}

/// A layer of grid cells, for example the floor or a room segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
    #[serde(rename = "type")]
    pub layer_type: LayerType,

    /// Flat `x, y, x, y, ...` cell list
    #[serde(default)]
    pub pixels: Vec<u32>,

    /// Run length `x, y, count, ...` triples, each run extending along +x
    #[serde(default)]
    pub compressed_pixels: Vec<u32>,

    #[serde(default)]
    pub meta_data: LayerMetaData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerMetaData {
    #[serde(default)]
    pub segment_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// A point or path entity drawn on top of the layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapEntity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Flat `x, y, x, y, ...` list in world units
    #[serde(default)]
    pub points: Vec<f64>,

    #[serde(default)]
    pub meta_data: EntityMetaData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetaData {
    /// Heading in degrees, only set on the robot position
    #[serde(default)]
    pub angle: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Floor,
    Wall,
    Segment,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    RobotPosition,
    ChargerLocation,
    Path,
    PredictedPath,
    VirtualWall,
    NoGoArea,
    NoMopArea,
    ActiveZone,
    #[serde(other)]
    Other,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MapData {
    /// Number of grid cells along x and y.
    pub fn grid_size(&self) -> (u32, u32) {
        let pixel_size = self.pixel_size.max(1);
        (self.size.x / pixel_size, self.size.y / pixel_size)
    }

    /// True if any layer holds at least one cell inside the grid.
    pub fn has_pixels(&self) -> bool {
        let (width, height) = self.grid_size();
        self.layers.iter().any(|l| l.cells(width, height).next().is_some())
    }

    /// Find the first entity of the given type.
    pub fn entity(&self, entity_type: EntityType) -> Option<&MapEntity> {
        self.entities.iter().find(|e| e.entity_type == entity_type)
    }
}

impl MapLayer {
    /// Iterate over every `(x, y)` cell of this layer inside a `width` x `height` grid, whichever
    /// encoding it uses. Cells outside the grid are skipped and runs are cut at its right edge.
    pub fn cells(&self, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let flat = self
            .pixels
            .chunks_exact(2)
            .map(|c| (c[0], c[1]))
            .filter(move |&(x, y)| x < width && y < height);

        let runs = self
            .compressed_pixels
            .chunks_exact(3)
            .filter(move |c| c[1] < height)
            .flat_map(move |c| {
                let end = c[0].saturating_add(c[2]).min(width);
                (c[0]..end).map(move |x| (x, c[1]))
            });

        flat.chain(runs)
    }
}

impl MapEntity {
    /// The entity's points as `(x, y)` pairs in world units.
    pub fn point_pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.chunks_exact(2).map(|c| (c[0], c[1]))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const MAP_JSON: &str = r#"{
        "__class": "ValetudoMap",
        "metaData": { "version": 2, "nonce": "5f1c-aa", "totalLayerArea": 250000 },
        "size": { "x": 500, "y": 400 },
        "pixelSize": 5,
        "layers": [
            { "__class": "MapLayer", "type": "floor", "pixels": [], "compressedPixels": [10, 10, 3, 10, 11, 2] },
            { "__class": "MapLayer", "type": "wall", "pixels": [9, 9, 9, 10] },
            { "__class": "MapLayer", "type": "segment", "compressedPixels": [20, 20, 1],
              "metaData": { "segmentId": "16", "name": "Kitchen", "active": false } },
            { "__class": "MapLayer", "type": "carpet", "pixels": [] }
        ],
        "entities": [
            { "__class": "PointMapEntity", "type": "robot_position", "points": [60, 55], "metaData": { "angle": 90 } },
            { "__class": "PointMapEntity", "type": "charger_location", "points": [50, 50] },
            { "__class": "PathMapEntity", "type": "path", "points": [50, 50, 55, 50, 60, 55] },
            { "__class": "PolygonMapEntity", "type": "no_go_zone_v2", "points": [] }
        ]
    }"#;

    #[test]
    fn test_parse_map() {
        let map: MapData = serde_json::from_str(MAP_JSON).unwrap();

        assert_eq!(map.meta_data.nonce.as_deref(), Some("5f1c-aa"));
        assert_eq!(map.grid_size(), (100, 80));
        assert_eq!(map.layers.len(), 4);
        assert_eq!(map.layers[3].layer_type, LayerType::Other);
        assert_eq!(map.layers[2].meta_data.segment_id.as_deref(), Some("16"));
        assert_eq!(map.entities[3].entity_type, EntityType::Other);
        assert!(map.has_pixels());

        let robot = map.entity(EntityType::RobotPosition).unwrap();
        assert_eq!(robot.meta_data.angle, Some(90.0));
        assert_eq!(robot.point_pairs().collect::<Vec<_>>(), vec![(60.0, 55.0)]);
    }

    #[test]
    fn test_layer_cells() {
        let map: MapData = serde_json::from_str(MAP_JSON).unwrap();

        let floor: Vec<_> = map.layers[0].cells(100, 80).collect();
        assert_eq!(floor, vec![(10, 10), (11, 10), (12, 10), (10, 11), (11, 11)]);

        let wall: Vec<_> = map.layers[1].cells(100, 80).collect();
        assert_eq!(wall, vec![(9, 9), (9, 10)]);

        // Only what lies inside the grid is kept
        let wall: Vec<_> = map.layers[1].cells(10, 10).collect();
        assert_eq!(wall, vec![(9, 9)]);
        let floor: Vec<_> = map.layers[0].cells(12, 80).collect();
        assert_eq!(floor, vec![(10, 10), (11, 10), (10, 11), (11, 11)]);
    }

    #[test]
    fn test_runs_outside_grid() {
        let map: MapData = serde_json::from_str(
            r#"{ "size": { "x": 50, "y": 50 }, "pixelSize": 5, "layers": [
                { "type": "floor", "compressedPixels": [4294967295, 0, 2] },
                { "type": "wall", "compressedPixels": [0, 0, 4000000000, 3, 99, 5] }
            ] }"#,
        )
        .unwrap();

        // A run starting past the edge has no cells at all
        assert_eq!(map.layers[0].cells(10, 10).count(), 0);

        // A huge run is cut at the edge, a run on a row outside the grid is dropped
        let wall: Vec<_> = map.layers[1].cells(10, 10).collect();
        assert_eq!(wall, (0..10).map(|x| (x, 0)).collect::<Vec<_>>());

        assert!(map.has_pixels());
    }

    #[test]
    fn test_empty_map() {
        let map: MapData =
            serde_json::from_str(r#"{ "size": { "x": 100, "y": 100 }, "pixelSize": 0 }"#).unwrap();

        assert!(!map.has_pixels());
        assert_eq!(map.grid_size(), (100, 100));
        assert!(map.entity(EntityType::ChargerLocation).is_none());
    }
}
