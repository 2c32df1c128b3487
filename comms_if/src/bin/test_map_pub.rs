//! Map telemetry publisher test
//!
//! Publishes a small synthetic map and a cycling vacuum status, so the map executable can be run
//! end to end without a robot.
//!
//! Usage: `test_map_pub [endpoint] [topic_prefix]`

use comms_if::{
    map::BusTopic,
    net::{zmq, MonitoredSocket, SocketOptions},
};
use serde_json::json;

/// Statuses the fake robot cycles through, one per published map
const STATUSES: [&str; 5] = ["cleaning", "cleaning", "returning", "docked", "idle"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let endpoint = args.get(1).map(String::as_str).unwrap_or("tcp://*:5010");
    let prefix = args.get(2).map(String::as_str).unwrap_or("valetudo/robot");

    // Create zmq context
    let ctx = zmq::Context::new();

    // Create socket options
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        ..Default::default()
    };

    // Create the socket
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::PUB,
        socket_options,
        endpoint
    )?;

    println!("Map publisher open on {}, topic prefix {}", endpoint, prefix);

    let map_topic = BusTopic::MapData.topic(prefix);
    let status_topic = BusTopic::Status.topic(prefix);

    // Send data to subscribers
    for cycle in 0usize.. {
        let map = synthetic_map(cycle);

        // Messages are [topic, body] pairs, subscribers filter on the topic frame
        let body = map.to_string();
        if let Err(e) = socket.send_multipart(vec![map_topic.as_bytes(), body.as_bytes()], 0) {
            println!("Failed to send map: {}", e)
        }

        let status = STATUSES[cycle % STATUSES.len()];
        if let Err(e) = socket.send_multipart(vec![status_topic.as_bytes(), status.as_bytes()], 0) {
            println!("Failed to send status: {}", e)
        }

        println!("Cycle {}: sent map and status \"{}\"", cycle, status);

        std::thread::sleep(std::time::Duration::from_millis(3000));
    }

    Ok(())
}

/// Build a square room with the robot moving along its diagonal.
fn synthetic_map(cycle: usize) -> serde_json::Value {
    let mut floor = Vec::new();
    for y in 20..80 {
        floor.extend_from_slice(&[20, y, 60]);
    }

    let mut walls = Vec::new();
    for i in 19..=80 {
        walls.extend_from_slice(&[i, 19, i, 80, 19, i, 80, i]);
    }

    let step = (cycle % 10) as f64 * 25.0;

    json!({
        "__class": "ValetudoMap",
        "metaData": { "version": 2, "nonce": format!("test-map-{}", cycle) },
        "size": { "x": 500, "y": 500 },
        "pixelSize": 5,
        "layers": [
            { "__class": "MapLayer", "type": "floor", "pixels": [], "compressedPixels": floor },
            { "__class": "MapLayer", "type": "wall", "pixels": walls, "compressedPixels": [] }
        ],
        "entities": [
            { "__class": "PointMapEntity", "type": "charger_location", "points": [110, 110] },
            { "__class": "PointMapEntity", "type": "robot_position",
              "points": [110.0 + step, 110.0 + step], "metaData": { "angle": 45 } },
            { "__class": "PathMapEntity", "type": "path",
              "points": [110, 110, 110.0 + step, 110.0 + step] }
        ]
    })
}
