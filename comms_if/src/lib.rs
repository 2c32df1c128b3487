//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the map camera software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Map telemetry and viewer definitions
pub mod map;

/// Network module
pub mod net;
