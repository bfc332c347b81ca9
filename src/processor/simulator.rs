//! Simulator harness - step a detached copy of a processor forward
//!
//! Used for look-ahead queries ("when does the battery run flat?") and for
//! driving tests. The copy shares behaviours with the original but nothing
//! it does is visible to the original processor.

use crate::core::error::{Result, SolverError};
use crate::core::types::SimTime;
use crate::processor::ResourceProcessor;

#[derive(Debug, Clone)]
pub struct Simulator {
    processor: ResourceProcessor,
    iterations: usize,
    limit: usize,
    finished: bool,
}

impl Simulator {
    /// Copy `processor` into a new simulator
    pub fn new(processor: &ResourceProcessor) -> Self {
        let limit = processor.config().iteration_limit;
        Self {
            processor: processor.clone(),
            iterations: 0,
            limit,
            finished: false,
        }
    }

    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn processor(&self) -> &ResourceProcessor {
        &self.processor
    }

    pub fn into_processor(self) -> ResourceProcessor {
        self.processor
    }

    pub fn current_time(&self) -> SimTime {
        self.processor.last_update()
    }

    /// Steps taken so far
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the step budget is spent
    pub fn hit_limit(&self) -> bool {
        self.iterations >= self.limit
    }

    /// Resolve once and integrate to the next changepoint
    ///
    /// Returns `false` when nothing will change again or the step budget is
    /// spent; neither is an error.
    pub fn step(&mut self) -> Result<bool> {
        if self.finished || self.hit_limit() {
            return Ok(false);
        }

        let now = self.current_time();
        self.processor.compute_rates(now)?;
        let changepoint = match self.processor.update_next_changepoint(now) {
            Ok(cp) => cp,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        if !changepoint.is_finite() {
            self.finished = true;
            return Ok(false);
        }

        self.processor.update_state(changepoint.time)?;
        self.iterations += 1;
        tracing::trace!(
            "Simulator step {} reached {} ({:?})",
            self.iterations,
            changepoint.time,
            changepoint.source
        );
        Ok(true)
    }

    /// Lazily step through changepoint timestamps
    ///
    /// The iterator ends at the horizon, at the step budget or after the
    /// first error; once ended it stays ended.
    pub fn steps(&mut self) -> Steps<'_> {
        Steps { simulator: self }
    }

    /// Advance to the absolute time `time`, stopping early at the step budget
    ///
    /// Returns the time actually reached.
    pub fn run_until(&mut self, time: SimTime) -> Result<SimTime> {
        SolverError::check_not_nan("time", time)?;
        let start = self.current_time();
        if time < start {
            return Err(SolverError::TimeReversal {
                requested: time,
                last_update: start,
            });
        }

        while self.current_time() < time {
            if self.hit_limit() {
                tracing::debug!("Look-ahead stopped at step budget {}", self.limit);
                break;
            }

            let now = self.current_time();
            self.processor.compute_rates(now)?;
            let changepoint = self.processor.update_next_changepoint(now)?;

            if changepoint.time >= time {
                if time.is_finite() {
                    self.processor.update_state(time)?;
                } else {
                    self.finished = true;
                }
                break;
            }
            self.processor.update_state(changepoint.time)?;
            self.iterations += 1;
        }

        Ok(self.current_time())
    }
}

/// Iterator over the changepoint timestamps a simulator reaches
#[derive(Debug)]
pub struct Steps<'a> {
    simulator: &'a mut Simulator,
}

impl Iterator for Steps<'_> {
    type Item = Result<SimTime>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.simulator.step() {
            Ok(true) => Some(Ok(self.simulator.current_time())),
            Ok(false) => None,
            Err(e) => {
                self.simulator.finished = true;
                Some(Err(e))
            }
        }
    }
}
