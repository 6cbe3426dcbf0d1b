//! Injection scheduler tests.
//!
//! Tests cover: the start-up scan (landing, skipping, budget), the
//! waiting/injecting cycle, time-step advice, sequence exhaustion,
//! out-of-order snapshot times, checkpoint resume and failure handling on
//! steady-state reads.

use std::cell::Cell;

use approx::assert_relative_eq;
use outflow_replay_core::{
    checkpoint::SchedulerCheckpoint,
    config::{InjectConfig, ResolvedConfig},
    error::{InjectError, InjectResult},
    event::InjectEvent,
    live::ParticleSystem,
    particle::{Field, ParticleRecord, SnapshotData},
    scheduler::{InjectionScheduler, SchedulerPhase},
    snapshot_id::SnapshotId,
    store::{MemoryStore, SnapshotMetadata, SnapshotStore},
    time_index::SnapshotTimeIndex,
    types::Vec3,
};

fn config() -> ResolvedConfig {
    InjectConfig::default_test().resolve().expect("test config")
}

fn particle(x: f64, vx: f64) -> ParticleRecord {
    ParticleRecord::new(Vec3::new(x, 0.0, 0.0), Vec3::new(vx, 0.0, 0.0), 0.01, 3.0)
}

/// `dump_0000k` at time `times[k]`, each with the given particles.
fn sequence(times: &[f64], particles: impl Fn(usize) -> Vec<ParticleRecord>) -> MemoryStore {
    MemoryStore::from_sequence(
        times
            .iter()
            .enumerate()
            .map(|(k, &t)| (format!("dump_{k:05}"), SnapshotData::new(t, particles(k)))),
    )
}

/// Scenario A store: one particle at r=0.5 (t=0) then r=1.5 (t=1).
fn single_crossing(vx: f64) -> MemoryStore {
    sequence(&[0.0, 1.0], |k| vec![particle(if k == 0 { 0.5 } else { 1.5 }, vx)])
}

#[test]
fn outward_crossing_injects_once() {
    let store = single_crossing(0.8);
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.0).unwrap();

    // t=0 lands on the first snapshot: it only primes the buffer.
    let first = sched.step(&store, 0.0, &mut live).unwrap();
    assert!(first.injection.unwrap().injected.is_empty());
    assert!(live.is_empty());

    let wait = sched.step(&store, 0.4, &mut live).unwrap();
    assert!(wait.injection.is_none());
    assert_relative_eq!(wait.dt, 0.6, epsilon = 1e-12);

    let advice = sched.step(&store, 1.0, &mut live).unwrap();
    let report = advice.injection.expect("injection at t=1");
    assert_eq!(report.snapshot.as_str(), "dump_00001");
    assert_eq!(report.injected, vec![0]);
    assert_eq!(live.len(), 1);
    assert_eq!(sched.total_injected(), 1);

    let p = live.get(0).unwrap();
    assert_relative_eq!(p.position, Vec3::new(1.5, 0.0, 0.0));
    assert_relative_eq!(p.velocity, Vec3::new(0.8, 0.0, 0.0));
    assert_eq!(live.companion(0), 3.0);
}

#[test]
fn inward_velocity_injects_nothing() {
    let store = single_crossing(-0.8);
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.0).unwrap();

    sched.step(&store, 0.0, &mut live).unwrap();
    let advice = sched.step(&store, 1.0, &mut live).unwrap();
    assert!(advice.injection.unwrap().injected.is_empty());
    assert!(live.is_empty());
    assert_eq!(sched.total_injected(), 0);
}

#[test]
fn mid_sequence_start_preloads_previous_snapshot() {
    let store = single_crossing(0.8);
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.5).unwrap();

    assert_eq!(sched.state().next_id.as_str(), "dump_00001");
    assert_eq!(sched.state().previous_id.as_ref().map(SnapshotId::as_str), Some("dump_00000"));

    let advice = sched.step(&store, 1.0, &mut live).unwrap();
    assert_eq!(advice.injection.unwrap().injected.len(), 1);
}

#[test]
fn scan_lands_on_first_snapshot_at_or_after_host_time() {
    let store = sequence(&[0.0, 1.0, 2.0, 3.0, 4.0], |_| vec![particle(0.5, 1.0)]);
    let index = SnapshotTimeIndex::new(&store);

    let outcome = index.scan_forward(&SnapshotId::from("dump_00000"), 2.5, 100).unwrap();
    assert_eq!(outcome.id.as_str(), "dump_00003");
    assert_eq!(outcome.meta.time, 3.0);
    assert_eq!(outcome.advances, 3);
    assert_eq!(outcome.preceding.map(|(id, _)| id), Some(SnapshotId::from("dump_00002")));

    let sched = InjectionScheduler::start(config(), &store, 2.5).unwrap();
    assert_eq!(sched.state().next_time, 3.0);
}

#[test]
fn scan_budget_exhaustion_is_a_distinct_error() {
    let store = sequence(&[0.0, 1.0, 2.0, 3.0, 4.0], |_| vec![particle(0.5, 1.0)]);
    let cfg = ResolvedConfig { max_start_advances: 3, ..config() };

    let err = InjectionScheduler::start(cfg, &store, 10.0).err().expect("must fail");
    match err {
        InjectError::StartSnapshotNotFound { start, advances, host_time } => {
            assert_eq!(start.as_str(), "dump_00000");
            assert_eq!(advances, 3);
            assert_eq!(host_time, 10.0);
        }
        other => panic!("expected StartSnapshotNotFound, got {other}"),
    }
}

#[test]
fn scan_past_end_of_sequence_stops_at_budget() {
    // Every snapshot is before host time and the names run out.
    let store = sequence(&[0.0, 1.0], |_| vec![particle(0.5, 1.0)]);
    let cfg = ResolvedConfig { max_start_advances: 8, ..config() };
    let err = InjectionScheduler::start(cfg, &store, 5.0).err().expect("must fail");
    assert!(matches!(err, InjectError::StartSnapshotNotFound { advances: 8, .. }));
}

#[test]
fn scan_skips_unreadable_snapshots() {
    let mut store = sequence(&[0.0, 1.0, 2.0, 3.0], |_| vec![particle(0.5, 1.0)]);
    store.mark_unreadable("dump_00002");

    let mut sched = InjectionScheduler::start(config(), &store, 1.5).unwrap();
    assert_eq!(sched.state().next_id.as_str(), "dump_00003");
    // The last readable snapshot before the gap becomes the buffer.
    assert_eq!(sched.state().previous_id.as_ref().unwrap().as_str(), "dump_00001");

    let events = sched.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        InjectEvent::SnapshotSkipped { id, .. } if id.as_str() == "dump_00002"
    )));
    assert!(matches!(events.last(), Some(InjectEvent::SchedulerStarted { advances: 3, .. })));
}

#[test]
fn waiting_dt_is_positive_and_post_injection_dt_is_fixed() {
    // Second gap is huge: the post-injection dt must not depend on it.
    let store = sequence(&[0.0, 1.0, 1000.0], |k| vec![particle(0.5 + k as f64, 1.0)]);
    let cfg = config();
    let tiny = cfg.post_injection_dt;
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(cfg, &store, 0.0).unwrap();

    let after_prime = sched.step(&store, 0.0, &mut live).unwrap();
    assert_eq!(after_prime.dt, tiny);

    for t in [1e-6, 0.25, 0.5, 0.999_999] {
        let advice = sched.step(&store, t, &mut live).unwrap();
        assert!(advice.injection.is_none());
        assert!(advice.dt > 0.0, "dt at t={t} was {}", advice.dt);
        assert_eq!(advice.event_time, Some(1.0));
    }

    let after_event = sched.step(&store, 1.0, &mut live).unwrap();
    assert!(after_event.injection.is_some());
    assert_eq!(after_event.dt, tiny);
    assert_eq!(sched.state().next_time, 1000.0);
    assert_eq!(sched.phase(), SchedulerPhase::Waiting);
}

#[test]
fn host_past_event_time_still_fires() {
    let store = single_crossing(0.8);
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.0).unwrap();
    sched.step(&store, 0.0, &mut live).unwrap();

    let advice = sched.step(&store, 1.3, &mut live).unwrap();
    assert_eq!(advice.injection.unwrap().injected.len(), 1);
}

#[test]
fn missing_successor_exhausts_the_sequence() {
    let store = single_crossing(0.8);
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.0).unwrap();

    sched.step(&store, 0.0, &mut live).unwrap();
    sched.step(&store, 1.0, &mut live).unwrap();
    assert_eq!(sched.phase(), SchedulerPhase::Exhausted);
    assert_eq!(sched.next_event_time(), None);

    let later = sched.step(&store, 50.0, &mut live).unwrap();
    assert!(later.injection.is_none());
    assert!(later.dt.is_infinite());
    assert_eq!(live.len(), 1);

    assert!(sched
        .drain_events()
        .iter()
        .any(|e| matches!(e, InjectEvent::SequenceExhausted { .. })));
}

#[test]
fn particle_count_mismatch_is_a_data_error() {
    let store = sequence(&[0.0, 1.0], |k| vec![particle(0.5, 1.0); k + 1]);
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.0).unwrap();
    sched.step(&store, 0.0, &mut live).unwrap();

    let err = sched.step(&store, 1.0, &mut live).unwrap_err();
    assert!(
        matches!(err, InjectError::ParticleCountMismatch { previous_count: 1, next_count: 2, .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn unreadable_event_snapshot_is_fatal_and_leaves_state_untouched() {
    let mut store = sequence(&[0.0, 1.0, 2.0], |k| vec![particle(0.5 + k as f64, 1.0)]);
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.0).unwrap();
    sched.step(&store, 0.0, &mut live).unwrap();

    store.mark_unreadable("dump_00001");
    let err = sched.step(&store, 1.0, &mut live).unwrap_err();
    assert!(matches!(err, InjectError::SnapshotRead { .. }));
    assert_eq!(sched.phase(), SchedulerPhase::Waiting);
    assert_eq!(sched.state().next_id.as_str(), "dump_00001");
    assert!(live.is_empty());

    // Once readable again the same step succeeds.
    store.mark_readable(&SnapshotId::from("dump_00001"));
    let advice = sched.step(&store, 1.0, &mut live).unwrap();
    assert_eq!(advice.injection.unwrap().injected.len(), 1);
}

/// Fails the first `failures` loads of every snapshot it wraps.
struct FlakyStore {
    inner:    MemoryStore,
    failures: Cell<u32>,
}

impl SnapshotStore for FlakyStore {
    fn metadata(&self, id: &SnapshotId) -> InjectResult<SnapshotMetadata> {
        self.inner.metadata(id)
    }

    fn load(&self, id: &SnapshotId, fields: &[Field]) -> InjectResult<Vec<ParticleRecord>> {
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(InjectError::SnapshotRead {
                id:     id.clone(),
                reason: "transient".into(),
            });
        }
        self.inner.load(id, fields)
    }
}

#[test]
fn advance_retries_absorb_transient_read_errors() {
    let store = FlakyStore {
        inner:    single_crossing(0.8),
        failures: Cell::new(0),
    };
    let cfg = ResolvedConfig { advance_retries: 2, ..config() };
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(cfg, &store, 0.0).unwrap();
    sched.step(&store, 0.0, &mut live).unwrap();

    store.failures.set(2);
    let advice = sched.step(&store, 1.0, &mut live).unwrap();
    assert_eq!(advice.injection.unwrap().injected.len(), 1);

    // Three consecutive failures exceed two retries.
    let store = FlakyStore {
        inner:    single_crossing(0.8),
        failures: Cell::new(0),
    };
    let cfg = ResolvedConfig { advance_retries: 2, ..config() };
    let mut sched = InjectionScheduler::start(cfg, &store, 0.0).unwrap();
    store.failures.set(3);
    assert!(sched.step(&store, 0.0, &mut ParticleSystem::new()).is_err());
}

#[test]
fn independent_schedulers_do_not_share_state() {
    let store = single_crossing(0.8);
    let mut live_a = ParticleSystem::new();
    let mut live_b = ParticleSystem::new();
    let mut a = InjectionScheduler::start(config(), &store, 0.0).unwrap();
    let mut b = InjectionScheduler::start(config(), &store, 0.0).unwrap();

    a.step(&store, 0.0, &mut live_a).unwrap();
    a.step(&store, 1.0, &mut live_a).unwrap();

    assert_eq!(a.total_injected(), 1);
    assert_eq!(b.total_injected(), 0);
    assert_eq!(b.state().next_id.as_str(), "dump_00000");
    b.step(&store, 0.0, &mut live_b).unwrap();
    assert!(live_b.is_empty());
}

#[test]
fn extension_digits_do_not_break_the_sequence_walk() {
    let store = MemoryStore::from_sequence((0..4).map(|k| {
        (
            format!("run2/wind_{k:04}.h5"),
            SnapshotData::new(k as f64, vec![particle(0.5 + k as f64, 1.0)]),
        )
    }));
    let cfg = ResolvedConfig {
        start_snapshot: SnapshotId::from("run2/wind_0000.h5"),
        ..config()
    };

    let sched = InjectionScheduler::start(cfg, &store, 2.5).unwrap();
    assert_eq!(sched.state().next_id.as_str(), "run2/wind_0003.h5");
    assert_eq!(
        sched.state().previous_id.as_ref().map(SnapshotId::as_str),
        Some("run2/wind_0002.h5")
    );
}

#[test]
fn recommended_dt_stays_positive_once_the_event_is_due() {
    let store = single_crossing(0.8);
    let cfg = config();
    let tiny = cfg.post_injection_dt;
    let sched = InjectionScheduler::start(cfg, &store, 0.0).unwrap();

    assert_eq!(sched.phase(), SchedulerPhase::Waiting);
    assert_eq!(sched.recommended_dt(0.0), tiny);
    assert_eq!(sched.recommended_dt(0.5), tiny);
    assert!(sched.recommended_dt(-0.25) > 0.0);
    assert_relative_eq!(sched.recommended_dt(-0.25), 0.25, epsilon = 1e-12);
}

#[test]
fn out_of_order_snapshot_times_warn_and_keep_going() {
    let _ = env_logger::builder().is_test(true).try_init();
    // r: 0.5 -> 1.5 (out) -> 0.8 (moving in) -> 1.2 (out again)
    let radii = [0.5, 1.5, 0.8, 1.2];
    let store = sequence(&[0.0, 1.0, 0.5, 2.0], |k| {
        vec![particle(radii[k], if k == 2 { -1.0 } else { 1.0 })]
    });
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.0).unwrap();

    sched.step(&store, 0.0, &mut live).unwrap();
    let first = sched.step(&store, 1.0, &mut live).unwrap();
    assert_eq!(first.injection.unwrap().injected.len(), 1);

    // The successor is earlier than the event just handled; it is accepted.
    assert_eq!(sched.state().next_id.as_str(), "dump_00002");
    assert_eq!(sched.state().next_time, 0.5);
    assert_eq!(sched.phase(), SchedulerPhase::Waiting);

    // Already due, so the very next step fires it.
    let second = sched.step(&store, 1.0 + 1e-6, &mut live).unwrap();
    let report = second.injection.expect("overdue snapshot fires");
    assert_eq!(report.snapshot.as_str(), "dump_00002");
    assert!(report.injected.is_empty());

    let third = sched.step(&store, 2.0, &mut live).unwrap();
    assert_eq!(third.injection.unwrap().injected.len(), 1);
    assert_eq!(sched.total_injected(), 2);
    assert_eq!(sched.phase(), SchedulerPhase::Exhausted);

    let injected_from: Vec<String> = sched
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            InjectEvent::ParticlesInjected { snapshot, .. } => Some(snapshot.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(injected_from, vec!["dump_00001", "dump_00002", "dump_00003"]);
}

#[test]
fn exhausted_checkpoint_resumes_exhausted() {
    let store = single_crossing(0.8);
    let mut live = ParticleSystem::new();
    let mut sched = InjectionScheduler::start(config(), &store, 0.0).unwrap();
    sched.step(&store, 0.0, &mut live).unwrap();
    sched.step(&store, 1.0, &mut live).unwrap();
    assert_eq!(sched.phase(), SchedulerPhase::Exhausted);

    let checkpoint = sched.checkpoint();
    assert!(checkpoint.exhausted);
    let json = checkpoint.to_json().unwrap();

    let mut resumed =
        InjectionScheduler::resume(config(), &SchedulerCheckpoint::from_json(&json).unwrap(), &store)
            .unwrap();
    assert_eq!(resumed.phase(), SchedulerPhase::Exhausted);
    assert_eq!(resumed.next_event_time(), None);
    assert_eq!(resumed.total_injected(), 1);

    let mut fresh_live = ParticleSystem::new();
    let advice = resumed.step(&store, 5.0, &mut fresh_live).unwrap();
    assert!(advice.injection.is_none());
    assert!(advice.dt.is_infinite());
    assert!(fresh_live.is_empty());
}
