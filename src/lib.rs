pub mod simulation;
pub mod configuration;
pub mod tracking;
pub mod benchmark;
pub mod error;

pub use simulation::states::{Bunch, Kinematics, Particle, Species, System, Vec3};
pub use simulation::integrator::{Scheme, GAMMA_THRESHOLD};
pub use simulation::region::{Axis, Region};
pub use simulation::fields::{
    CyclotronEField, Field, FieldSet, GammaRef, IsoCyclotronBField, OscillatingEField,
    ParticleEField, SynchroCyclotronEField, UniformBField, UniformEField,
};
pub use simulation::params::Parameters;
pub use simulation::engine::{RunReport, RunState, Simulation};
pub use simulation::scenario::{build_simulation, single_proton};

pub use configuration::config::ScenarioConfig;

pub use tracking::properties::{
    BunchProperty, FieldProperty, ParticleProperty, PropertyValue, Registration,
    SimulationProperty,
};
pub use tracking::sink::{Column, Row, SimLog, SinkError, TrackSink};

pub use error::{Error, Result};

pub use benchmark::benchmark::{bench_forces, bench_ticks};
