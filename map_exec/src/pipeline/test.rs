// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{cell::RefCell, collections::VecDeque, path::PathBuf, rc::Rc};

use comms_if::map::{ImageSize, MapData, MapPayload, Position, RobotPosition, VacuumStatus};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use serde_json::json;

use super::*;
use crate::{
    bus_client::{BusClientError, MessageBusClient},
    renderer::MapRenderer,
    snapshot_store::{SnapshotError, SnapshotStore},
};

// ------------------------------------------------------------------------------------------------
// FAKES
// ------------------------------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct BusScript {
    /// Queued messages, `None` being one that fails to parse
    queue: VecDeque<Option<MapPayload>>,
    status: Option<VacuumStatus>,
    saves: usize,
    pub(crate) started: bool,
}

#[derive(Default)]
pub(crate) struct StoreScript {
    saved: Option<DynamicImage>,
    writes: usize,
    loads: usize,
    fail_writes: bool,
}

pub(crate) struct FakeBus(Rc<RefCell<BusScript>>);

pub(crate) struct FakeStore(Rc<RefCell<StoreScript>>);

/// Draws the map as a flat image the size of the map, if it has any layers.
#[derive(Default)]
pub(crate) struct FakeRenderer {
    size: Option<ImageSize>,
    id: Option<String>,
}

impl MessageBusClient for FakeBus {
    fn is_data_available(&mut self) -> bool {
        !self.0.borrow().queue.is_empty()
    }

    fn fetch_and_parse(&mut self) -> Result<MapPayload, BusClientError> {
        match self.0.borrow_mut().queue.pop_front() {
            Some(Some(p)) => Ok(p),
            Some(None) => Err(BusClientError::ParseError(
                MapPayload::from_slice(b"{\"size\":").unwrap_err(),
            )),
            None => Err(BusClientError::NoData),
        }
    }

    fn save_payload(&mut self) -> Result<(), BusClientError> {
        self.0.borrow_mut().saves += 1;
        Ok(())
    }

    fn current_status(&self) -> Option<VacuumStatus> {
        self.0.borrow().status.clone()
    }

    fn start(&mut self) -> Result<(), BusClientError> {
        self.0.borrow_mut().started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.0.borrow_mut().started = false;
    }
}

impl SnapshotStore for FakeStore {
    fn write_snapshot(
        &mut self,
        _raw_payload: &serde_json::Value,
        bitmap: &DynamicImage,
    ) -> Result<(), SnapshotError> {
        let mut script = self.0.borrow_mut();
        script.writes += 1;

        if script.fail_writes {
            return Err(SnapshotError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read only",
            )));
        }

        script.saved = Some(bitmap.clone());
        Ok(())
    }

    fn load_snapshot_bitmap(&self) -> Result<DynamicImage, SnapshotError> {
        let mut script = self.0.borrow_mut();
        script.loads += 1;

        script
            .saved
            .clone()
            .ok_or_else(|| SnapshotError::NotFound(PathBuf::from("map_snapshot.png")))
    }
}

impl MapRenderer for FakeRenderer {
    fn render(&mut self, map: &MapData, _crop_percent: u8) -> Option<DynamicImage> {
        if map.layers.is_empty() {
            return None;
        }

        self.size = Some(ImageSize {
            width: map.size.x,
            height: map.size.y,
        });
        self.id = map.meta_data.nonce.clone();

        let mut img = RgbaImage::from_pixel(map.size.x, map.size.y, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));

        Some(DynamicImage::ImageRgba8(img))
    }

    fn charger_position(&self) -> Option<Position> {
        self.size.map(|_| Position { x: 1.0, y: 2.0 })
    }

    fn robot_position(&self) -> Option<RobotPosition> {
        self.size.map(|_| RobotPosition {
            x: 3.0,
            y: 4.0,
            angle: 90.0,
        })
    }

    fn image_size(&self) -> Option<ImageSize> {
        self.size
    }

    fn calibration_points(&self, _rotation_deg: i32) -> Vec<CalibrationPoint> {
        Vec::new()
    }

    fn map_data_id(&self) -> Option<String> {
        self.id.clone()
    }
}

// ------------------------------------------------------------------------------------------------
// HELPERS
// ------------------------------------------------------------------------------------------------

pub(crate) type TestPipeline = MapPipeline<FakeBus, FakeRenderer, FakeStore>;

pub(crate) struct Harness {
    pub bus: Rc<RefCell<BusScript>>,
    pub store: Rc<RefCell<StoreScript>>,
    pub pipeline: TestPipeline,
}

pub(crate) fn harness(rotation_deg: i32) -> Harness {
    harness_with_store(rotation_deg, Rc::new(RefCell::new(StoreScript::default())))
}

fn harness_with_store(rotation_deg: i32, store: Rc<RefCell<StoreScript>>) -> Harness {
    let bus = Rc::new(RefCell::new(BusScript::default()));

    let config = PipelineConfig {
        vacuum_entity: "vacuum.robot".into(),
        listen_to: "valetudo/robot/MapData/map-data".into(),
        rotation_deg,
        crop_percent: 0,
    };

    let mut pipeline = MapPipeline::new(
        config,
        FakeBus(bus.clone()),
        FakeRenderer::default(),
        FakeStore(store.clone()),
    );
    pipeline.start().unwrap();

    Harness {
        bus,
        store,
        pipeline,
    }
}

/// A payload for a `width` by `height` map, with nothing to draw if `drawable` is false.
pub(crate) fn payload(width: u32, height: u32, nonce: &str, drawable: bool) -> MapPayload {
    let layers = if drawable {
        json!([{ "type": "floor", "pixels": [0, 0] }])
    } else {
        json!([])
    };

    let raw = json!({
        "metaData": { "version": 2, "nonce": nonce },
        "size": { "x": width, "y": height },
        "pixelSize": 5,
        "layers": layers,
        "entities": []
    });

    MapPayload::from_slice(raw.to_string().as_bytes()).unwrap()
}

impl Harness {
    pub fn push(&self, payload: Option<MapPayload>) {
        self.bus.borrow_mut().queue.push_back(payload);
    }

    pub fn set_status(&self, status: VacuumStatus) {
        self.bus.borrow_mut().status = Some(status);
    }

    pub fn update(&mut self) -> Vec<u8> {
        self.pipeline.update().to_vec()
    }
}

fn decode(png: &[u8]) -> DynamicImage {
    image::load_from_memory(png).unwrap()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[test]
fn test_cold_start_placeholder() {
    let mut h = harness(0);

    let first = h.update();
    let img = decode(&first);

    assert_eq!(img.dimensions(), (800, 600));
    assert_eq!(img.to_rgb8().get_pixel(400, 300).0, [128, 128, 128]);
    assert_eq!(h.store.borrow().loads, 1);

    // Nothing new, same bytes and no second read of the store
    assert_eq!(h.update(), first);
    assert_eq!(h.store.borrow().loads, 1);
    assert!(!h.pipeline.snapshot_taken());
    assert!(h.pipeline.geometry().is_none());

    // No payload has been ingested, so there is no outcome to report
    assert_eq!(h.pipeline.ingest_outcome(), None);
    assert!(h.pipeline.attributes().json_data.is_none());
}

#[test]
fn test_snapshot_taken_once_when_docked() {
    let mut h = harness(0);

    // Cleaning, no snapshot
    h.set_status(VacuumStatus::Cleaning);
    h.push(Some(payload(20, 10, "a", true)));
    let cleaning = h.update();

    assert_eq!(decode(&cleaning).dimensions(), (20, 10));
    assert_eq!(h.store.borrow().writes, 0);
    assert_eq!(h.pipeline.robot_status(), Some(&VacuumStatus::Cleaning));

    // Docked, the first rendered cycle snapshots
    h.set_status(VacuumStatus::Docked);
    h.push(Some(payload(20, 10, "b", true)));
    h.update();

    assert!(h.pipeline.snapshot_taken());
    assert_eq!(h.store.borrow().writes, 1);
    assert_eq!(h.bus.borrow().saves, 1);

    // Still docked, never again
    for nonce in &["c", "d", "e"] {
        h.push(Some(payload(20, 10, nonce, true)));
        h.update();
    }
    h.set_status(VacuumStatus::Idle);
    h.push(Some(payload(20, 10, "f", true)));
    h.update();

    assert_eq!(h.store.borrow().writes, 1);
    assert_eq!(h.bus.borrow().saves, 1);
}

#[test]
fn test_parse_error_keeps_image_and_geometry() {
    let mut h = harness(0);

    h.push(Some(payload(30, 20, "good", true)));
    let good = h.update();
    let geometry = h.pipeline.geometry().cloned();

    assert!(geometry.is_some());
    assert_eq!(h.pipeline.ingest_outcome(), Some(IngestOutcome::Success));

    h.push(None);
    let after = h.update();

    assert_eq!(after, good);
    assert_eq!(h.pipeline.geometry().cloned(), geometry);
    assert_eq!(h.pipeline.ingest_outcome(), Some(IngestOutcome::Error));
    assert_eq!(h.pipeline.attributes().json_data.as_deref(), Some("Error"));
}

#[test]
fn test_parse_error_on_cold_start() {
    let mut h = harness(0);

    h.push(None);
    let img = decode(&h.update());

    assert_eq!(img.dimensions(), (800, 600));
    assert_eq!(h.pipeline.ingest_outcome(), Some(IngestOutcome::Error));
}

#[test]
fn test_failed_snapshot_not_retried() {
    let mut h = harness(0);
    h.store.borrow_mut().fail_writes = true;

    h.set_status(VacuumStatus::Error);
    h.push(Some(payload(10, 10, "a", true)));
    let img = h.update();

    // The image is still shown despite the failed write
    assert_eq!(decode(&img).dimensions(), (10, 10));
    assert!(h.pipeline.snapshot_taken());
    assert_eq!(h.store.borrow().writes, 1);

    h.store.borrow_mut().fail_writes = false;
    h.push(Some(payload(10, 10, "b", true)));
    h.update();

    assert_eq!(h.store.borrow().writes, 1);
}

#[test]
fn test_restart_shows_snapshot() {
    let store = Rc::new(RefCell::new(StoreScript::default()));

    // First run takes a snapshot
    let saved = {
        let mut h = harness_with_store(0, store.clone());
        h.set_status(VacuumStatus::Docked);
        h.push(Some(payload(40, 30, "a", true)));
        h.update()
    };
    assert_eq!(store.borrow().writes, 1);

    // Second run has no telemetry yet
    let mut h = harness_with_store(0, store.clone());
    let shown = h.update();

    assert_eq!(decode(&shown).dimensions(), (40, 30));
    assert_eq!(decode(&shown).to_rgba8(), decode(&saved).to_rgba8());
    assert_eq!(store.borrow().loads, 1);

    h.update();
    assert_eq!(store.borrow().loads, 1);
}

#[test]
fn test_render_unavailable_uses_memory() {
    let mut h = harness(0);

    h.push(Some(payload(16, 8, "a", true)));
    let drawn = h.update();
    let geometry = h.pipeline.geometry().cloned();

    h.push(Some(payload(50, 50, "b", false)));
    let fallback = h.update();

    assert_eq!(decode(&fallback).to_rgba8(), decode(&drawn).to_rgba8());
    assert_eq!(h.pipeline.geometry().cloned(), geometry);
    assert_eq!(h.store.borrow().loads, 0);
}

#[test]
fn test_render_unavailable_does_not_snapshot() {
    let mut h = harness(0);

    h.set_status(VacuumStatus::Docked);
    h.push(Some(payload(50, 50, "a", false)));
    let img = decode(&h.update());

    assert_eq!(img.dimensions(), (800, 600));
    assert!(!h.pipeline.snapshot_taken());
    assert_eq!(h.pipeline.robot_status(), Some(&VacuumStatus::Docked));
}

#[test]
fn test_rotation() {
    let mut h = harness(90);
    h.push(Some(payload(10, 10, "a", true)));
    let rotated = decode(&h.update());

    // Counter-clockwise on the same canvas, the red corner pixel ends up bottom left
    assert_eq!(rotated.dimensions(), (10, 10));
    assert_eq!(rotated.to_rgba8().get_pixel(0, 9).0, [255, 0, 0, 255]);
    assert_ne!(rotated.to_rgba8().get_pixel(0, 0).0, [255, 0, 0, 255]);

    let mut wide = harness(90);
    wide.push(Some(payload(20, 10, "a", true)));
    assert_eq!(decode(&wide.update()).dimensions(), (20, 10));

    let mut zero = harness(0);
    let mut full = harness(360);
    zero.push(Some(payload(20, 10, "a", true)));
    full.push(Some(payload(20, 10, "a", true)));

    assert_eq!(zero.update(), full.update());
}

#[test]
fn test_start_stop_and_attributes() {
    let mut h = harness(0);

    assert!(h.pipeline.should_poll());
    assert!(h.bus.borrow().started);

    h.set_status(VacuumStatus::Cleaning);
    h.push(Some(payload(20, 10, "abc", true)));
    h.update();

    let attrs = h.pipeline.attributes();
    assert_eq!(attrs.vacuum_entity, "vacuum.robot");
    assert_eq!(attrs.vacuum_status, Some(VacuumStatus::Cleaning));
    assert_eq!(attrs.vacuum_json_id.as_deref(), Some("abc"));
    assert_eq!(attrs.json_data.as_deref(), Some("Success"));
    assert_eq!(
        attrs.image_size,
        Some(ImageSize {
            width: 20,
            height: 10
        })
    );
    assert_eq!(attrs.listen_to, "valetudo/robot/MapData/map-data");

    let before = h.pipeline.image().to_vec();
    h.pipeline.stop();

    assert!(!h.pipeline.should_poll());
    assert!(!h.bus.borrow().started);
    assert_eq!(h.pipeline.image(), &before[..]);
}
