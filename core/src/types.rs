//! Shared primitive types used across the entire engine.

use serde::{Deserialize, Serialize};

/// Simulation time in code units.
pub type SimTime = f64;

/// Cartesian 3-vector for positions and velocities.
pub type Vec3 = nalgebra::Vector3<f64>;

/// Index of a particle in the live particle system.
pub type LiveIndex = usize;

/// The canonical run identifier.
pub type RunId = String;

/// Particle type bookkeeping in the live system.
/// Variants are append-only: their order is the per-kind count slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticleKind {
    #[default]
    Gas,
    Dust,
}

impl ParticleKind {
    pub const COUNT: usize = 2;
    pub const ALL: [ParticleKind; Self::COUNT] = [ParticleKind::Gas, ParticleKind::Dust];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gas  => "gas",
            Self::Dust => "dust",
        }
    }

    pub fn slot(&self) -> usize {
        *self as usize
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}
