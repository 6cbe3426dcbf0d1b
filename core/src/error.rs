use thiserror::Error;

use crate::snapshot_id::SnapshotId;

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Configuration ─────────────────────────────
    #[error("Invalid injection radius: {value} (must be finite and >= 0)")]
    InvalidRadius { value: f64 },

    #[error("Invalid value for option '{key}': {value}")]
    InvalidOption { key: String, value: String },

    #[error("Unknown option '{key}'")]
    UnknownOption { key: String },

    #[error(
        "No snapshot with time >= {host_time} found from '{start}' within {advances} advances"
    )]
    StartSnapshotNotFound {
        start:     SnapshotId,
        advances:  u32,
        host_time: f64,
    },

    // ── Snapshot reads ────────────────────────────
    #[error("Snapshot '{id}' not found")]
    SnapshotNotFound { id: SnapshotId },

    #[error("Cannot read snapshot '{id}': {reason}")]
    SnapshotRead { id: SnapshotId, reason: String },

    // ── Data ──────────────────────────────────────
    #[error("Particle count mismatch: '{previous}' has {previous_count}, '{next}' has {next_count}")]
    ParticleCountMismatch {
        previous:       SnapshotId,
        previous_count: usize,
        next:           SnapshotId,
        next_count:     usize,
    },

    #[error("Detector input length mismatch: previous {previous}, next {next}")]
    BufferLengthMismatch { previous: usize, next: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InjectError {
    /// True for the read errors a forward scan may skip over.
    pub fn is_skippable_read(&self) -> bool {
        matches!(
            self,
            Self::SnapshotNotFound { .. } | Self::SnapshotRead { .. }
        )
    }
}

pub type InjectResult<T> = Result<T, InjectError>;
