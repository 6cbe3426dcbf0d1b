//! Domain events emitted by the injection scheduler.
//!
//! RULE: The scheduler never logs to a store directly. It queues events;
//! the engine drains them once per step and persists them if a store is
//! attached. Variants are append-only.

use crate::{
    snapshot_id::SnapshotId,
    types::{RunId, SimTime},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InjectEvent {
    SchedulerStarted {
        start:     SnapshotId,
        next:      SnapshotId,
        next_time: SimTime,
        advances:  u32,
        primed:    bool,
    },
    SnapshotSkipped {
        id:     SnapshotId,
        reason: String,
    },
    BufferPrimed {
        time:     SimTime,
        snapshot: SnapshotId,
        count:    usize,
    },
    ParticlesInjected {
        time:           SimTime,
        snapshot:       SnapshotId,
        injected:       usize,
        total_injected: usize,
    },
    SequenceExhausted {
        time:      SimTime,
        last:      SnapshotId,
        missing:   SnapshotId,
    },
}

impl InjectEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SchedulerStarted { .. }  => "scheduler_started",
            Self::SnapshotSkipped { .. }   => "snapshot_skipped",
            Self::BufferPrimed { .. }      => "buffer_primed",
            Self::ParticlesInjected { .. } => "particles_injected",
            Self::SequenceExhausted { .. } => "sequence_exhausted",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub step:       u64,
    pub sim_time:   SimTime,
    pub event_type: String,
    pub payload:    String, // JSON-serialized InjectEvent
}

impl EventLogEntry {
    pub fn from_event(
        run_id:   &str,
        step:     u64,
        sim_time: SimTime,
        event:    &InjectEvent,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            run_id:     run_id.to_string(),
            step,
            sim_time,
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        })
    }
}
