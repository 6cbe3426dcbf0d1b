//! Per-particle records as stored in a snapshot.

use crate::types::Vec3;
use serde::{Deserialize, Serialize};

/// One tracked particle in one snapshot.
///
/// `velocity` holds velocity or momentum depending on what the producing
/// simulation wrote; `scalar_a` is the smoothing length or specific energy
/// and `scalar_b` the momentum companion or entropy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub position: Vec3,
    pub velocity: Vec3,
    pub scalar_a: f64,
    pub scalar_b: f64,
    /// Dead or accreted in the producing simulation.
    pub dead:     bool,
}

impl ParticleRecord {
    pub fn new(position: Vec3, velocity: Vec3, scalar_a: f64, scalar_b: f64) -> Self {
        Self { position, velocity, scalar_a, scalar_b, dead: false }
    }

    pub fn dead(mut self) -> Self {
        self.dead = true;
        self
    }

    /// Distance from the origin.
    pub fn radius(&self) -> f64 {
        self.position.norm()
    }

    /// Projection of the velocity onto the radial direction.
    /// Zero at the origin, where the direction is undefined.
    pub fn radial_velocity(&self) -> f64 {
        let r = self.radius();
        if r > 0.0 {
            self.position.dot(&self.velocity) / r
        } else {
            0.0
        }
    }
}

impl Default for ParticleRecord {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Vec3::zeros(), 0.0, 0.0)
    }
}

/// A per-particle field that can be requested from a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Position,
    Velocity,
    ScalarA,
    ScalarB,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Position, Field::Velocity, Field::ScalarA, Field::ScalarB];
}

/// Zero every field not listed in `fields`. The dead flag always survives.
pub fn mask_fields(record: &ParticleRecord, fields: &[Field]) -> ParticleRecord {
    let mut out = ParticleRecord { dead: record.dead, ..ParticleRecord::default() };
    for field in fields {
        match field {
            Field::Position => out.position = record.position,
            Field::Velocity => out.velocity = record.velocity,
            Field::ScalarA  => out.scalar_a = record.scalar_a,
            Field::ScalarB  => out.scalar_b = record.scalar_b,
        }
    }
    out
}

/// A full snapshot: its time plus every tracked particle, index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub time:      f64,
    pub particles: Vec<ParticleRecord>,
}

impl SnapshotData {
    pub fn new(time: f64, particles: Vec<ParticleRecord>) -> Self {
        Self { time, particles }
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }
}
