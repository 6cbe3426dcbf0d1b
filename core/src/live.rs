//! The live particle system injected particles land in.

use crate::types::{LiveIndex, ParticleKind, Vec3};
use serde::{Deserialize, Serialize};

/// What the injector needs from a host particle store.
pub trait LiveParticleSystem {
    /// Append a particle and return its stable index.
    fn add_particle(
        &mut self,
        kind:     ParticleKind,
        position: Vec3,
        velocity: Vec3,
        scalar_a: f64,
    ) -> LiveIndex;

    /// Write the companion scalar (momentum companion or entropy) for
    /// `index`. The companion array is sized independently of the
    /// primary one and grows on demand.
    fn set_companion(&mut self, index: LiveIndex, value: f64);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveParticle {
    pub kind:     ParticleKind,
    pub position: Vec3,
    pub velocity: Vec3,
    pub scalar_a: f64,
}

/// In-memory host particle arrays with per-kind counts.
#[derive(Debug, Clone, Default)]
pub struct ParticleSystem {
    particles: Vec<LiveParticle>,
    companion: Vec<f64>,
    counts:    [usize; ParticleKind::COUNT],
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn count(&self, kind: ParticleKind) -> usize {
        self.counts[kind.slot()]
    }

    pub fn get(&self, index: LiveIndex) -> Option<&LiveParticle> {
        self.particles.get(index)
    }

    pub fn particles(&self) -> &[LiveParticle] {
        &self.particles
    }

    /// Companion scalar for `index`, zero if never written.
    pub fn companion(&self, index: LiveIndex) -> f64 {
        self.companion.get(index).copied().unwrap_or(0.0)
    }
}

impl LiveParticleSystem for ParticleSystem {
    fn add_particle(
        &mut self,
        kind:     ParticleKind,
        position: Vec3,
        velocity: Vec3,
        scalar_a: f64,
    ) -> LiveIndex {
        let index = self.particles.len();
        self.particles.push(LiveParticle { kind, position, velocity, scalar_a });
        self.counts[kind.slot()] += 1;
        index
    }

    fn set_companion(&mut self, index: LiveIndex, value: f64) {
        if self.companion.len() <= index {
            self.companion.resize(index + 1, 0.0);
        }
        self.companion[index] = value;
    }
}
