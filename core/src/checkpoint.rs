//! Scheduler checkpoints, serialized to JSON.
//!
//! A checkpoint captures everything needed to resume injection after a
//! host restart without rescanning. The comparison buffer itself is not
//! stored; it is reloaded from the snapshot store by id.

use crate::{error::InjectResult, snapshot_id::SnapshotId, types::SimTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerCheckpoint {
    pub previous_id:      Option<SnapshotId>,
    pub next_id:          SnapshotId,
    pub next_time:        SimTime,
    /// Code units.
    pub injection_radius: f64,
    pub total_injected:   usize,
    #[serde(default)]
    pub exhausted:        bool,
}

impl SchedulerCheckpoint {
    pub fn to_json(&self) -> InjectResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> InjectResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &str) -> InjectResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &str) -> InjectResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
