//! Snapshot-driven particle-stream injection.
//!
//! Replays a precomputed outflow, stored as a time-ordered sequence of
//! full particle snapshots, into a live simulation: each tracked particle
//! is materialized once it crosses the injection radius moving outward.

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod event;
pub mod live;
pub mod particle;
pub mod rng;
pub mod scheduler;
pub mod snapshot_id;
pub mod store;
pub mod synth;
pub mod time_index;
pub mod types;
