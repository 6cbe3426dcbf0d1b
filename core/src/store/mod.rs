//! Snapshot storage.
//!
//! RULE: The scheduler only ever sees a store through `SnapshotStore`.
//! Metadata queries must never pull per-particle field arrays.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::{
    error::InjectResult,
    particle::{Field, ParticleRecord, SnapshotData},
    snapshot_id::SnapshotId,
};
use serde::{Deserialize, Serialize};

/// Cheap per-snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub time:           f64,
    pub particle_count: usize,
}

/// Read side of a snapshot sequence.
pub trait SnapshotStore {
    /// Time and particle count without loading fields.
    fn metadata(&self, id: &SnapshotId) -> InjectResult<SnapshotMetadata>;

    /// Per-particle records, index-aligned across the sequence.
    /// Fields not requested are zeroed.
    fn load(&self, id: &SnapshotId, fields: &[Field]) -> InjectResult<Vec<ParticleRecord>>;

    /// The snapshot after `id`.
    fn successor(&self, id: &SnapshotId) -> SnapshotId {
        id.successor()
    }
}

/// Write side, used by generators and importers.
pub trait SnapshotSink {
    fn insert_snapshot(&mut self, id: &SnapshotId, data: &SnapshotData) -> InjectResult<()>;
}
