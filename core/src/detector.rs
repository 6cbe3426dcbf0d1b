//! Boundary-crossing detection and injection.
//!
//! A tracked particle is a crosser between two consecutive snapshots when
//! it was strictly inside the injection radius before, is strictly outside
//! it now, and is moving outward now. Sitting exactly on the radius is
//! never a crossing. Particles flagged dead in the newer snapshot are
//! ignored.

use crate::{
    error::{InjectError, InjectResult},
    live::LiveParticleSystem,
    particle::ParticleRecord,
    types::{LiveIndex, ParticleKind},
};

/// Crossing predicate for one tracked particle.
pub fn is_crosser(previous: &ParticleRecord, next: &ParticleRecord, radius: f64) -> bool {
    if next.dead {
        return false;
    }
    let r_next = next.radius();
    let r_prev = previous.radius();
    // r_next > radius > 0 here, so the radial projection is well defined.
    r_next > radius && r_prev < radius && next.radial_velocity() > 0.0
}

/// Indices of every crosser, in ascending order.
pub fn find_crossers(
    previous: &[ParticleRecord],
    next:     &[ParticleRecord],
    radius:   f64,
) -> InjectResult<Vec<usize>> {
    if previous.len() != next.len() {
        return Err(InjectError::BufferLengthMismatch {
            previous: previous.len(),
            next:     next.len(),
        });
    }
    Ok(previous
        .iter()
        .zip(next)
        .enumerate()
        .filter(|(_, (prev, next))| is_crosser(prev, next, radius))
        .map(|(i, _)| i)
        .collect())
}

/// Detect crossers and write their newer state into `live`.
///
/// Returns the live indices of the injected particles, in tracked-index
/// order.
pub fn inject_crossers<L: LiveParticleSystem + ?Sized>(
    previous: &[ParticleRecord],
    next:     &[ParticleRecord],
    radius:   f64,
    kind:     ParticleKind,
    live:     &mut L,
) -> InjectResult<Vec<LiveIndex>> {
    let crossers = find_crossers(previous, next, radius)?;
    let injected = crossers
        .into_iter()
        .map(|i| {
            let p = &next[i];
            let index = live.add_particle(kind, p.position, p.velocity, p.scalar_a);
            live.set_companion(index, p.scalar_b);
            index
        })
        .collect();
    Ok(injected)
}
