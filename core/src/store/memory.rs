//! In-memory snapshot store (tests and synthetic runs).

use std::collections::{HashMap, HashSet};

use crate::{
    error::{InjectError, InjectResult},
    particle::{mask_fields, Field, ParticleRecord, SnapshotData},
    snapshot_id::SnapshotId,
};

use super::{SnapshotMetadata, SnapshotSink, SnapshotStore};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    snapshots:  HashMap<SnapshotId, SnapshotData>,
    unreadable: HashSet<SnapshotId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(name, data)` pairs.
    pub fn from_sequence<I, N>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = (N, SnapshotData)>,
        N: Into<SnapshotId>,
    {
        let mut store = Self::new();
        for (name, data) in snapshots {
            store.snapshots.insert(name.into(), data);
        }
        store
    }

    pub fn insert(&mut self, id: impl Into<SnapshotId>, data: SnapshotData) {
        self.snapshots.insert(id.into(), data);
    }

    /// Make every read of `id` fail as if the file were corrupt.
    pub fn mark_unreadable(&mut self, id: impl Into<SnapshotId>) {
        self.unreadable.insert(id.into());
    }

    pub fn mark_readable(&mut self, id: &SnapshotId) {
        self.unreadable.remove(id);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn get(&self, id: &SnapshotId) -> InjectResult<&SnapshotData> {
        if self.unreadable.contains(id) {
            return Err(InjectError::SnapshotRead {
                id:     id.clone(),
                reason: "marked unreadable".into(),
            });
        }
        self.snapshots
            .get(id)
            .ok_or_else(|| InjectError::SnapshotNotFound { id: id.clone() })
    }
}

impl SnapshotStore for MemoryStore {
    fn metadata(&self, id: &SnapshotId) -> InjectResult<SnapshotMetadata> {
        let data = self.get(id)?;
        Ok(SnapshotMetadata {
            time:           data.time,
            particle_count: data.particle_count(),
        })
    }

    fn load(&self, id: &SnapshotId, fields: &[Field]) -> InjectResult<Vec<ParticleRecord>> {
        let data = self.get(id)?;
        if Field::ALL.iter().all(|f| fields.contains(f)) {
            return Ok(data.particles.clone());
        }
        Ok(data.particles.iter().map(|p| mask_fields(p, fields)).collect())
    }
}

impl SnapshotSink for MemoryStore {
    fn insert_snapshot(&mut self, id: &SnapshotId, data: &SnapshotData) -> InjectResult<()> {
        self.snapshots.insert(id.clone(), data.clone());
        Ok(())
    }
}
