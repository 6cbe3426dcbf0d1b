//! The injection scheduler.
//!
//! PHASES:
//!   Locating  → `start()`: scan for the first snapshot at or after host time
//!   Waiting   → recommend dt = next_time − host_time, never inject
//!   Injecting → load next snapshot, inject crossers, advance pointers
//!   Exhausted → the sequence has no successor; no more injections
//!
//! RULES:
//!   - One scheduler owns one `InjectionSchedulerState`; there is no
//!     process-wide state, so several injectors can run side by side.
//!   - The previous-snapshot buffer is replaced wholesale per event.
//!   - Every fallible read of an event happens before the live system or
//!     the state is touched, so a failed step leaves both unchanged.

use crate::{
    checkpoint::SchedulerCheckpoint,
    config::ResolvedConfig,
    detector,
    error::{InjectError, InjectResult},
    event::InjectEvent,
    live::LiveParticleSystem,
    particle::{Field, ParticleRecord},
    snapshot_id::SnapshotId,
    store::{SnapshotMetadata, SnapshotStore},
    time_index::SnapshotTimeIndex,
    types::{LiveIndex, SimTime},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Waiting,
    Injecting,
    Exhausted,
}

/// Pointers into the replay sequence plus the comparison buffer.
#[derive(Debug, Clone)]
pub struct InjectionSchedulerState {
    pub previous:         Option<Vec<ParticleRecord>>,
    pub previous_id:      Option<SnapshotId>,
    pub previous_time:    Option<SimTime>,
    pub next_id:          SnapshotId,
    pub next_time:        SimTime,
    /// Code units.
    pub injection_radius: f64,
}

/// What one injection event did.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionReport {
    pub snapshot: SnapshotId,
    pub time:     SimTime,
    /// Live indices of the particles added, in tracked-index order.
    pub injected: Vec<LiveIndex>,
}

/// The scheduler's answer for one host step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepAdvice {
    /// Largest step the host may take. Infinite when unconstrained.
    pub dt:         f64,
    /// Set when `dt` was chosen to land exactly on this event time.
    pub event_time: Option<SimTime>,
    pub injection:  Option<InjectionReport>,
}

pub struct InjectionScheduler {
    config:         ResolvedConfig,
    state:          InjectionSchedulerState,
    phase:          SchedulerPhase,
    total_injected: usize,
    events:         Vec<InjectEvent>,
}

impl InjectionScheduler {
    /// Locate the first snapshot at or after `host_time`.
    ///
    /// If the scan passed a readable snapshot on the way, it becomes the
    /// initial comparison buffer. Otherwise the first event only primes
    /// the buffer.
    pub fn start<S: SnapshotStore + ?Sized>(
        config:    ResolvedConfig,
        store:     &S,
        host_time: SimTime,
    ) -> InjectResult<Self> {
        let index = SnapshotTimeIndex::new(store);
        let scan = index.scan_forward(&config.start_snapshot, host_time, config.max_start_advances)?;

        let mut events: Vec<InjectEvent> = scan
            .skipped
            .iter()
            .map(|(id, reason)| InjectEvent::SnapshotSkipped {
                id:     id.clone(),
                reason: reason.clone(),
            })
            .collect();

        let mut state = InjectionSchedulerState {
            previous:         None,
            previous_id:      None,
            previous_time:    None,
            next_id:          scan.id.clone(),
            next_time:        scan.meta.time,
            injection_radius: config.injection_radius,
        };

        if let Some((prev_id, prev_meta)) = &scan.preceding {
            match store.load(prev_id, &Field::ALL) {
                Ok(buffer) => {
                    check_counts(prev_id, buffer.len(), &scan.id, scan.meta.particle_count)?;
                    state.previous = Some(buffer);
                    state.previous_id = Some(prev_id.clone());
                    state.previous_time = Some(prev_meta.time);
                }
                Err(e) if e.is_skippable_read() => {
                    log::warn!("cannot preload {prev_id}, first event will prime: {e}");
                    events.push(InjectEvent::SnapshotSkipped {
                        id:     prev_id.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "injection scheduler: start={} next={} t_next={} radius={} advances={} primed={}",
            config.start_snapshot,
            state.next_id,
            state.next_time,
            state.injection_radius,
            scan.advances,
            state.previous.is_some(),
        );
        events.push(InjectEvent::SchedulerStarted {
            start:     config.start_snapshot.clone(),
            next:      state.next_id.clone(),
            next_time: state.next_time,
            advances:  scan.advances,
            primed:    state.previous.is_some(),
        });

        Ok(Self {
            config,
            state,
            phase: SchedulerPhase::Waiting,
            total_injected: 0,
            events,
        })
    }

    /// Rebuild a scheduler from a checkpoint, reloading the comparison
    /// buffer from the store.
    pub fn resume<S: SnapshotStore + ?Sized>(
        config:     ResolvedConfig,
        checkpoint: &SchedulerCheckpoint,
        store:      &S,
    ) -> InjectResult<Self> {
        if checkpoint.injection_radius != config.injection_radius {
            log::warn!(
                "checkpoint radius {} differs from configured {}; keeping the checkpoint value",
                checkpoint.injection_radius,
                config.injection_radius
            );
        }

        let (previous, previous_time) = match &checkpoint.previous_id {
            Some(id) => {
                let meta = store.metadata(id)?;
                (Some(store.load(id, &Field::ALL)?), Some(meta.time))
            }
            None => (None, None),
        };

        let phase = if checkpoint.exhausted {
            SchedulerPhase::Exhausted
        } else {
            SchedulerPhase::Waiting
        };
        log::info!(
            "injection scheduler resumed: next={} t_next={} phase={phase:?}",
            checkpoint.next_id,
            checkpoint.next_time
        );

        Ok(Self {
            config,
            state: InjectionSchedulerState {
                previous,
                previous_id: checkpoint.previous_id.clone(),
                previous_time,
                next_id: checkpoint.next_id.clone(),
                next_time: checkpoint.next_time,
                injection_radius: checkpoint.injection_radius,
            },
            phase,
            total_injected: checkpoint.total_injected,
            events: Vec::new(),
        })
    }

    pub fn checkpoint(&self) -> SchedulerCheckpoint {
        SchedulerCheckpoint {
            previous_id:      self.state.previous_id.clone(),
            next_id:          self.state.next_id.clone(),
            next_time:        self.state.next_time,
            injection_radius: self.state.injection_radius,
            total_injected:   self.total_injected,
            exhausted:        self.phase == SchedulerPhase::Exhausted,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn state(&self) -> &InjectionSchedulerState {
        &self.state
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn total_injected(&self) -> usize {
        self.total_injected
    }

    /// Time of the next scheduled event, if any remain.
    pub fn next_event_time(&self) -> Option<SimTime> {
        match self.phase {
            SchedulerPhase::Exhausted => None,
            _ => Some(self.state.next_time),
        }
    }

    /// Take the events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<InjectEvent> {
        std::mem::take(&mut self.events)
    }

    /// Largest dt the host may take from `host_time` without passing the
    /// next event. Always strictly positive; an event already due gets
    /// `post_injection_dt`.
    pub fn recommended_dt(&self, host_time: SimTime) -> f64 {
        match self.phase {
            SchedulerPhase::Exhausted => f64::INFINITY,
            _ if self.state.next_time > host_time => self.state.next_time - host_time,
            _ => self.config.post_injection_dt,
        }
    }

    /// Called once per host step.
    pub fn step<S, L>(
        &mut self,
        store:     &S,
        host_time: SimTime,
        live:      &mut L,
    ) -> InjectResult<StepAdvice>
    where
        S: SnapshotStore + ?Sized,
        L: LiveParticleSystem + ?Sized,
    {
        match self.phase {
            SchedulerPhase::Exhausted => Ok(StepAdvice {
                dt:         f64::INFINITY,
                event_time: None,
                injection:  None,
            }),
            _ if host_time < self.state.next_time => Ok(StepAdvice {
                dt:         self.recommended_dt(host_time),
                event_time: Some(self.state.next_time),
                injection:  None,
            }),
            _ => {
                self.phase = SchedulerPhase::Injecting;
                let result = self.inject(store, host_time, live);
                if result.is_err() {
                    self.phase = SchedulerPhase::Waiting;
                }
                result
            }
        }
    }

    fn inject<S, L>(
        &mut self,
        store:     &S,
        host_time: SimTime,
        live:      &mut L,
    ) -> InjectResult<StepAdvice>
    where
        S: SnapshotStore + ?Sized,
        L: LiveParticleSystem + ?Sized,
    {
        let event_id = self.state.next_id.clone();
        let event_time = self.state.next_time;

        // Reads first.
        let next = self.load_with_retries(store, &event_id)?;
        if let (Some(prev), Some(prev_id)) = (&self.state.previous, &self.state.previous_id) {
            check_counts(prev_id, prev.len(), &event_id, next.len())?;
        }
        let successor_id = store.successor(&event_id);
        let successor = self.resolve_with_retries(store, &successor_id)?;

        // Then effects.
        let injected = match &self.state.previous {
            Some(prev) => detector::inject_crossers(
                prev,
                &next,
                self.state.injection_radius,
                self.config.inject_kind,
                live,
            )?,
            None => {
                log::debug!("t={host_time} primed buffer from {event_id} ({} particles)", next.len());
                self.events.push(InjectEvent::BufferPrimed {
                    time:     host_time,
                    snapshot: event_id.clone(),
                    count:    next.len(),
                });
                Vec::new()
            }
        };
        let primed_only = self.state.previous.is_none();

        self.state.previous = Some(next);
        self.state.previous_id = Some(event_id.clone());
        self.state.previous_time = Some(event_time);

        if !primed_only {
            self.total_injected += injected.len();
            log::debug!(
                "t={host_time} injected {} particles from {event_id} (total {})",
                injected.len(),
                self.total_injected
            );
            self.events.push(InjectEvent::ParticlesInjected {
                time:           host_time,
                snapshot:       event_id.clone(),
                injected:       injected.len(),
                total_injected: self.total_injected,
            });
        }

        match successor {
            Some(meta) => {
                if meta.time <= event_time {
                    log::warn!(
                        "snapshot times not increasing: {event_id} t={event_time}, {successor_id} t={}",
                        meta.time
                    );
                }
                self.state.next_id = successor_id;
                self.state.next_time = meta.time;
                self.phase = SchedulerPhase::Waiting;
            }
            None => {
                log::info!("replay sequence exhausted after {event_id}");
                self.events.push(InjectEvent::SequenceExhausted {
                    time:    host_time,
                    last:    event_id.clone(),
                    missing: successor_id.clone(),
                });
                self.state.next_id = successor_id;
                self.phase = SchedulerPhase::Exhausted;
            }
        }

        Ok(StepAdvice {
            dt:         self.config.post_injection_dt,
            event_time: None,
            injection:  Some(InjectionReport {
                snapshot: event_id,
                time:     event_time,
                injected,
            }),
        })
    }

    fn load_with_retries<S: SnapshotStore + ?Sized>(
        &self,
        store: &S,
        id:    &SnapshotId,
    ) -> InjectResult<Vec<ParticleRecord>> {
        let mut attempt = 0;
        loop {
            match store.load(id, &Field::ALL) {
                Err(e @ InjectError::SnapshotRead { .. }) if attempt < self.config.advance_retries => {
                    attempt += 1;
                    log::warn!("retrying load of {id} ({attempt}/{}): {e}", self.config.advance_retries);
                }
                other => return other,
            }
        }
    }

    /// Metadata of the successor; `None` when it does not exist.
    fn resolve_with_retries<S: SnapshotStore + ?Sized>(
        &self,
        store: &S,
        id:    &SnapshotId,
    ) -> InjectResult<Option<SnapshotMetadata>> {
        let index = SnapshotTimeIndex::new(store);
        let mut attempt = 0;
        loop {
            match index.resolve(id) {
                Ok(meta) => return Ok(Some(meta)),
                Err(InjectError::SnapshotNotFound { .. }) => return Ok(None),
                Err(e @ InjectError::SnapshotRead { .. }) if attempt < self.config.advance_retries => {
                    attempt += 1;
                    log::warn!("retrying metadata of {id} ({attempt}/{}): {e}", self.config.advance_retries);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn check_counts(
    previous:       &SnapshotId,
    previous_count: usize,
    next:           &SnapshotId,
    next_count:     usize,
) -> InjectResult<()> {
    if previous_count != next_count {
        return Err(InjectError::ParticleCountMismatch {
            previous: previous.clone(),
            previous_count,
            next: next.clone(),
            next_count,
        });
    }
    Ok(())
}
