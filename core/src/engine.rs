//! The replay engine: a minimal host loop around the scheduler.
//!
//! It owns a live particle system and a clock and does no physics.
//! Per step:
//!   1. Ask the scheduler (may inject into the live system).
//!   2. Drain the scheduler's events; persist them if a log is attached.
//!   3. Advance time by min(dtmax, scheduler dt), landing exactly on the
//!      next snapshot time when that is the binding limit.

use crate::{
    clock::SimClock,
    config::ResolvedConfig,
    error::{InjectError, InjectResult},
    event::{EventLogEntry, InjectEvent},
    live::ParticleSystem,
    scheduler::{InjectionReport, InjectionScheduler},
    store::{SnapshotStore, SqliteStore},
    types::{RunId, SimTime},
};

pub struct ReplayEngine<'s, S: SnapshotStore + ?Sized> {
    pub run_id:    RunId,
    pub clock:     SimClock,
    pub particles: ParticleSystem,
    scheduler:     InjectionScheduler,
    store:         &'s S,
    event_log:     Option<&'s SqliteStore>,
    history:       Vec<InjectEvent>,
}

/// What one host step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub time_before: SimTime,
    pub time_after:  SimTime,
    pub injection:   Option<InjectionReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps:          u64,
    pub final_time:     SimTime,
    pub events:         usize,
    pub total_injected: usize,
    pub live_particles: usize,
}

impl<'s, S: SnapshotStore + ?Sized> ReplayEngine<'s, S> {
    /// Start the scheduler at `start_time` and build the engine.
    pub fn new(
        run_id:     RunId,
        config:     ResolvedConfig,
        store:      &'s S,
        start_time: SimTime,
        dtmax:      f64,
    ) -> InjectResult<Self> {
        check_dtmax(dtmax)?;
        let scheduler = InjectionScheduler::start(config, store, start_time)?;
        Self::with_scheduler(run_id, scheduler, store, start_time, dtmax)
    }

    /// Build around an existing scheduler (e.g. one resumed from a checkpoint).
    pub fn with_scheduler(
        run_id:     RunId,
        scheduler:  InjectionScheduler,
        store:      &'s S,
        start_time: SimTime,
        dtmax:      f64,
    ) -> InjectResult<Self> {
        check_dtmax(dtmax)?;
        Ok(Self {
            run_id,
            clock: SimClock::new(start_time, dtmax),
            particles: ParticleSystem::new(),
            scheduler,
            store,
            event_log: None,
            history: Vec::new(),
        })
    }

    /// Persist every domain event to `log` from now on.
    pub fn with_event_log(mut self, log: &'s SqliteStore) -> Self {
        self.event_log = Some(log);
        self
    }

    pub fn scheduler(&self) -> &InjectionScheduler {
        &self.scheduler
    }

    pub fn history(&self) -> &[InjectEvent] {
        &self.history
    }

    /// Advance one host step.
    pub fn step(&mut self) -> InjectResult<StepOutcome> {
        let time_before = self.clock.time;
        let advice = self
            .scheduler
            .step(self.store, time_before, &mut self.particles)?;
        self.record_events()?;

        let time_after = match advice.event_time {
            Some(target) if advice.dt <= self.clock.dtmax => self.clock.advance_to(target),
            _ => self.clock.advance(advice.dt.min(self.clock.dtmax)),
        };

        Ok(StepOutcome {
            time_before,
            time_after,
            injection: advice.injection,
        })
    }

    /// Step until the clock reaches `t_end`.
    pub fn run_until(&mut self, t_end: SimTime) -> InjectResult<RunSummary> {
        // Events queued by start-up land before the first step.
        self.record_events()?;
        while self.clock.time < t_end {
            self.step()?;
        }
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            steps:          self.clock.steps,
            final_time:     self.clock.time,
            events:         self.history.len(),
            total_injected: self.scheduler.total_injected(),
            live_particles: self.particles.len(),
        }
    }

    fn record_events(&mut self) -> InjectResult<()> {
        for event in self.scheduler.drain_events() {
            if let Some(log) = self.event_log {
                let entry =
                    EventLogEntry::from_event(&self.run_id, self.clock.steps, self.clock.time, &event)?;
                log.append_event(&entry)?;
            }
            self.history.push(event);
        }
        Ok(())
    }
}

fn check_dtmax(dtmax: f64) -> InjectResult<()> {
    if dtmax.is_finite() && dtmax > 0.0 {
        Ok(())
    } else {
        Err(InjectError::InvalidOption {
            key:   "dtmax".to_string(),
            value: dtmax.to_string(),
        })
    }
}
