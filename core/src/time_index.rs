//! Metadata-only view of a snapshot sequence.
//!
//! Used to place and advance the scheduler's pointers without paying for
//! full particle loads.

use crate::{
    error::{InjectError, InjectResult},
    snapshot_id::SnapshotId,
    store::{SnapshotMetadata, SnapshotStore},
    types::SimTime,
};

pub struct SnapshotTimeIndex<'a, S: SnapshotStore + ?Sized> {
    store: &'a S,
}

/// Where a forward scan landed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub id:       SnapshotId,
    pub meta:     SnapshotMetadata,
    /// Successor steps taken from the starting snapshot.
    pub advances: u32,
    /// Last readable snapshot passed on the way, if any.
    pub preceding: Option<(SnapshotId, SnapshotMetadata)>,
    /// Snapshots that failed to read and were stepped over.
    pub skipped:  Vec<(SnapshotId, String)>,
}

impl<'a, S: SnapshotStore + ?Sized> SnapshotTimeIndex<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Metadata for one snapshot. Errors are returned for the caller to
    /// skip or abort on.
    pub fn resolve(&self, id: &SnapshotId) -> InjectResult<SnapshotMetadata> {
        self.store.metadata(id)
    }

    /// Walk forward from `start` to the first snapshot with
    /// `time >= host_time`, taking at most `max_advances` successor steps.
    ///
    /// Unreadable snapshots are logged and stepped over. Running out of
    /// budget is `StartSnapshotNotFound`; any error that is not a read
    /// error aborts the scan immediately.
    pub fn scan_forward(
        &self,
        start:        &SnapshotId,
        host_time:    SimTime,
        max_advances: u32,
    ) -> InjectResult<ScanOutcome> {
        let mut id = start.clone();
        let mut preceding = None;
        let mut skipped = Vec::new();
        let mut advances = 0u32;

        loop {
            match self.resolve(&id) {
                Ok(meta) if meta.time >= host_time => {
                    log::debug!(
                        "scan landed on {id} (t={}) after {advances} advances",
                        meta.time
                    );
                    return Ok(ScanOutcome { id, meta, advances, preceding, skipped });
                }
                Ok(meta) => {
                    preceding = Some((id.clone(), meta));
                }
                Err(e) if e.is_skippable_read() => {
                    log::warn!("skipping snapshot {id}: {e}");
                    skipped.push((id.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }

            if advances >= max_advances {
                return Err(InjectError::StartSnapshotNotFound {
                    start: start.clone(),
                    advances,
                    host_time,
                });
            }
            id = self.store.successor(&id);
            advances += 1;
        }
    }
}
