//! # Map library
//!
//! Turns the map telemetry published by a robot vacuum into a PNG image, and serves it to viewers.

pub mod bus_client;
pub mod map_server;
pub mod params;
pub mod pipeline;
pub mod renderer;
pub mod rotation;
pub mod scheduler;
pub mod snapshot_store;
