use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building or running a simulation.
///
/// Physics violations (superluminal velocities, singular Coulomb
/// evaluations) abort the tick that produced them. Wiring mistakes
/// (dangling ids, degenerate regions) surface at construction time.
#[derive(Debug, Error)]
pub enum Error {
    #[error("velocity reached {speed} (light speed is 1 in natural units)")]
    SuperluminalVelocity { speed: f64 },

    #[error("particle '{name}' has zero mass but a nonzero force acting on it")]
    MasslessParticle { name: String },

    #[error("region interval has min {min} greater than max {max}")]
    DegenerateRegion { min: f64, max: f64 },

    #[error("a bunch must hold at least one particle")]
    EmptyBunch,

    #[error("field evaluated at the position of its own source particle {source_id}")]
    CoulombSingularity { source_id: usize },

    #[error("resonance period is undefined when charge times field magnitude is zero")]
    ResonanceUndefined,

    #[error("no particle with id {0}")]
    UnknownParticle(usize),

    #[error("no bunch with id {0}")]
    UnknownBunch(usize),

    #[error("no field with id {0}")]
    UnknownField(usize),

    #[error("unknown species '{0}'")]
    UnknownSpecies(String),

    #[error("field {0} cannot drive a resonance period (not a uniform magnetic field)")]
    NotMagnetic(usize),

    #[error("time step must be positive, got {0}")]
    NonPositiveTimeStep(f64),

    #[error("oscillation period must be positive, got {0}")]
    NonPositivePeriod(f64),

    #[error("duration must not be negative, got {0}")]
    NegativeDuration(f64),

    #[error("logging cadence must be at least one tick")]
    ZeroLogCadence,

    #[error("simulation has already been started; restarting is not supported")]
    AlreadyStarted,
}
