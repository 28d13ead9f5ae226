//! Numerical parameters for one simulation run.
//!
//! `Parameters` holds the settings the tick loop reads:
//! - integration scheme and the relativistic switch,
//! - step size and total duration,
//! - logging and progress cadences.

use super::integrator::Scheme;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Parameters {
    pub name: String, // run name, used in output keys and file names
    pub scheme: Scheme, // integration scheme
    pub relativistic: bool, // enables the gamma-gated acceleration form
    pub t_step: f64, // step size
    pub duration: f64, // simulated time span
    pub log_every: usize, // snapshot every n ticks
    pub print_every: usize, // progress trace every n ticks, 0 silences it
}

impl Parameters {
    pub fn new(name: impl Into<String>, scheme: Scheme, t_step: f64, duration: f64) -> Self {
        Self {
            name: name.into(),
            scheme,
            relativistic: false,
            t_step,
            duration,
            log_every: 1,
            print_every: 0,
        }
    }

    pub fn relativistic(mut self, on: bool) -> Self {
        self.relativistic = on;
        self
    }

    pub fn log_every(mut self, n: usize) -> Self {
        self.log_every = n;
        self
    }

    pub fn print_every(mut self, n: usize) -> Self {
        self.print_every = n;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.t_step > 0.0) {
            return Err(Error::NonPositiveTimeStep(self.t_step));
        }
        if self.duration < 0.0 {
            return Err(Error::NegativeDuration(self.duration));
        }
        if self.log_every == 0 {
            return Err(Error::ZeroLogCadence);
        }
        Ok(())
    }

    /// Number of ticks a run executes: floor(duration / step) + 1. The
    /// +1 tick makes the final committed time reach at least `duration`.
    pub fn tick_length(&self) -> usize {
        (self.duration / self.t_step) as usize + 1
    }
}
