//! Snapshot state machine.

use comms_if::map::VacuumStatus;

/// Whether this pipeline has used its one chance to snapshot the map.
///
/// The only transition is `NoSnapshot` to `SnapshotAttempted`, whatever the outcome of the write.
/// A new chance needs a new pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    NoSnapshot,
    SnapshotAttempted,
}

impl SnapshotState {
    /// True if a snapshot should be attempted given the status known right now.
    pub fn should_attempt(&self, status: Option<&VacuumStatus>) -> bool {
        *self == SnapshotState::NoSnapshot && status.map_or(false, VacuumStatus::is_terminal)
    }

    pub fn taken(&self) -> bool {
        *self == SnapshotState::SnapshotAttempted
    }
}

impl Default for SnapshotState {
    fn default() -> Self {
        SnapshotState::NoSnapshot
    }
}
