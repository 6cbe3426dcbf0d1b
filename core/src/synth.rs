//! Synthetic ballistic outflow sequences.
//!
//! Every tracked particle starts at `launch_radius` along a random
//! direction, waits a random delay, then coasts radially outward at a
//! random constant speed. A fraction is flagged accreted from a random
//! time onward. Particle `i` always draws from RNG stream `i`, so a
//! trajectory does not depend on how many particles are generated.

use crate::{
    error::InjectResult,
    particle::{ParticleRecord, SnapshotData},
    rng::SynthRng,
    snapshot_id::SnapshotId,
    store::SnapshotSink,
    types::{SimTime, Vec3},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutflowSpec {
    pub seed:              u64,
    pub particles:         usize,
    pub snapshots:         usize,
    pub prefix:            String,
    pub t0:                SimTime,
    pub snapshot_interval: f64,
    pub launch_radius:     f64,
    pub speed_min:         f64,
    pub speed_max:         f64,
    /// Launch delays are drawn from [0, max_delay).
    pub max_delay:         f64,
    pub accrete_fraction:  f64,
    pub smoothing_length:  f64,
    pub specific_energy:   f64,
}

impl Default for OutflowSpec {
    fn default() -> Self {
        Self {
            seed:              42,
            particles:         1_000,
            snapshots:         20,
            prefix:            "dump_".into(),
            t0:                0.0,
            snapshot_interval: 1.0,
            launch_radius:     0.5,
            speed_min:         0.05,
            speed_max:         0.5,
            max_delay:         10.0,
            accrete_fraction:  0.05,
            smoothing_length:  0.01,
            specific_energy:   1.0,
        }
    }
}

impl OutflowSpec {
    pub fn snapshot_id(&self, k: usize) -> SnapshotId {
        SnapshotId::from(format!("{}{k:05}", self.prefix))
    }

    pub fn snapshot_time(&self, k: usize) -> SimTime {
        self.t0 + k as f64 * self.snapshot_interval
    }
}

struct Trajectory {
    direction:   Vec3,
    speed:       f64,
    delay:       f64,
    accreted_at: Option<SimTime>,
}

impl Trajectory {
    fn draw(spec: &OutflowSpec, index: usize) -> Self {
        let mut rng = SynthRng::new(spec.seed, index as u64);
        let direction = rng.unit_vector();
        let speed = rng.uniform(spec.speed_min, spec.speed_max);
        let delay = rng.uniform(0.0, spec.max_delay);
        let duration = spec.snapshots as f64 * spec.snapshot_interval;
        let accreted_at = rng
            .chance(spec.accrete_fraction)
            .then(|| spec.t0 + rng.uniform(0.0, duration));
        Self { direction, speed, delay, accreted_at }
    }

    fn record_at(&self, spec: &OutflowSpec, time: SimTime) -> ParticleRecord {
        let elapsed = (time - spec.t0 - self.delay).max(0.0);
        let moving = elapsed > 0.0;
        let position = self.direction * (spec.launch_radius + self.speed * elapsed);
        let velocity = if moving { self.direction * self.speed } else { Vec3::zeros() };
        ParticleRecord {
            position,
            velocity,
            scalar_a: spec.smoothing_length,
            scalar_b: spec.specific_energy,
            dead:     self.accreted_at.is_some_and(|t| t <= time),
        }
    }
}

/// Write the whole sequence into `sink`. Returns the ids in order.
pub fn generate_outflow<K: SnapshotSink + ?Sized>(
    spec: &OutflowSpec,
    sink: &mut K,
) -> InjectResult<Vec<SnapshotId>> {
    let trajectories: Vec<Trajectory> = (0..spec.particles)
        .map(|i| Trajectory::draw(spec, i))
        .collect();

    let mut ids = Vec::with_capacity(spec.snapshots);
    for k in 0..spec.snapshots {
        let time = spec.snapshot_time(k);
        let particles = trajectories.iter().map(|t| t.record_at(spec, time)).collect();
        let id = spec.snapshot_id(k);
        sink.insert_snapshot(&id, &SnapshotData::new(time, particles))?;
        ids.push(id);
    }
    log::debug!(
        "generated {} snapshots x {} particles (seed {})",
        spec.snapshots,
        spec.particles,
        spec.seed
    );
    Ok(ids)
}
