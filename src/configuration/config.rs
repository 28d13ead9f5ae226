//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. A scenario consists of:
//!
//! - [`SimulationConfig`] – run name, scheme, step size and cadences
//! - [`ParticleConfig`]   – initial state for each standalone particle
//! - [`BunchConfig`]      – a prototype particle plus a member count
//! - [`FieldConfig`]      – one entry per field source, tagged by `kind`
//! - [`TrackConfig`]      – what to record at every logging tick
//! - [`ScenarioConfig`]   – top-level wrapper used to load from YAML
//!
//! # YAML format
//! An example scenario YAML matching these types:
//!
//! ```yaml
//! simulation:
//!   name: "cyclotron"
//!   scheme: "verlet"          # or "euler", "euler-cromer"
//!   relativistic: true
//!   t_step: 0.001             # step size
//!   duration: 6.0             # total simulated time
//!   log_every: 10             # snapshot cadence in ticks
//!
//! particles:
//!   - species: "proton"
//!     position: [0.0, -0.938, 0.0]
//!     velocity: [1.0e-3, 0.0, 0.0]
//!
//! bunches:
//!   - species: "proton"
//!     position: [0.0, 0.0, 0.0]
//!     velocity: [1.0e-3, 0.0, 0.0]
//!     count: 5
//!
//! fields:
//!   - kind: "uniform_b"
//!     vector: [0.0, 0.0, 1000.0]
//!   - kind: "cyclotron_e"
//!     vector: [500.0, 0.0, 0.0]
//!     species: "proton"
//!     b_field: 0              # id of the magnetic field to resonate with
//!     t_step: 0.001
//!     region:
//!       axis: "x"
//!       min: -0.05
//!       max: 0.05
//!
//! track:
//!   - particle: 0
//!     properties: ["position", "velocity", "gamma"]
//!   - bunch: 0
//!     properties: ["avg_position", "energy"]
//!   - probe:
//!       field: 1
//!       point: [0.0, 0.0, 0.0]
//!       label: "gap center"
//!   - simulation: ["time", "total_energy"]
//! ```
//!
//! Custom particles replace `species` with explicit `name`, `mass` and
//! `charge` keys. Region entries are either axis intervals, as above, or
//! boxes with `min`/`max` corner vectors.

use serde::Deserialize;

use crate::simulation::integrator::Scheme;
use crate::simulation::region::Axis;
use crate::tracking::properties::{
    BunchProperty, FieldProperty, ParticleProperty, SimulationProperty,
};

/// Run-level settings: name, scheme, step, cadences.
#[derive(Deserialize, Debug, Clone)]
pub struct SimulationConfig {
    pub name: String,
    pub scheme: Scheme,
    #[serde(default)]
    pub relativistic: bool,
    pub t_step: f64,
    pub duration: f64,
    #[serde(default = "default_log_every")]
    pub log_every: usize, // snapshot cadence, defaults to every tick
    #[serde(default)]
    pub print_every: usize, // progress cadence, 0 disables it
}

fn default_log_every() -> usize {
    1
}

/// Initial state for a single particle. Either a `species` or an explicit
/// `mass`/`charge` pair; explicit values override the species.
#[derive(Deserialize, Debug, Clone)]
pub struct ParticleConfig {
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mass: Option<f64>,
    #[serde(default)]
    pub charge: Option<f64>,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    #[serde(default)]
    pub acceleration: Option<[f64; 3]>,
}

/// A bunch is a prototype particle stamped out `count` times.
#[derive(Deserialize, Debug, Clone)]
pub struct BunchConfig {
    #[serde(flatten)]
    pub prototype: ParticleConfig,
    pub count: usize,
    #[serde(default)]
    pub bunch_name: Option<String>,
}

/// Spatial gate for a field; absent means all of space.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum RegionConfig {
    Interval { axis: Axis, min: f64, max: f64 },
    Box { min: [f64; 3], max: [f64; 3] },
}

/// Reference entity for gamma-tracking fields.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(untagged)]
pub enum GammaRefConfig {
    Particle { particle: usize },
    Bunch { bunch: usize },
}

/// One field source, discriminated by its `kind` tag.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldConfig {
    UniformB {
        vector: [f64; 3],
        #[serde(default)]
        region: Option<RegionConfig>,
    },
    UniformE {
        vector: [f64; 3],
        #[serde(default)]
        region: Option<RegionConfig>,
    },
    OscillatingE {
        vector: [f64; 3],
        period: f64,
        t_step: f64,
        #[serde(default)]
        region: Option<RegionConfig>,
    },
    /// Fixed-frequency gap resonant with `species` in the magnetic field
    /// registered at id `b_field`.
    CyclotronE {
        vector: [f64; 3],
        species: String,
        b_field: usize,
        t_step: f64,
        #[serde(default)]
        region: Option<RegionConfig>,
    },
    SynchroE {
        vector: [f64; 3],
        species: String,
        b_field: usize,
        t_step: f64,
        reference: GammaRefConfig,
        #[serde(default)]
        region: Option<RegionConfig>,
    },
    IsoB {
        vector: [f64; 3],
        reference: GammaRefConfig,
        #[serde(default)]
        region: Option<RegionConfig>,
    },
    ParticleE {
        source: usize,
    },
}

/// A probe samples one field at a fixed point.
#[derive(Deserialize, Debug, Clone)]
pub struct ProbeConfig {
    pub field: usize,
    pub point: [f64; 3],
    pub label: String,
    #[serde(default = "default_probe_properties")]
    pub properties: Vec<FieldProperty>,
}

fn default_probe_properties() -> Vec<FieldProperty> {
    vec![FieldProperty::Vector]
}

/// One tracking request. The variant is inferred from the key used.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum TrackConfig {
    Particle {
        particle: usize,
        properties: Vec<ParticleProperty>,
    },
    Bunch {
        bunch: usize,
        properties: Vec<BunchProperty>,
    },
    Probe {
        probe: ProbeConfig,
    },
    Simulation {
        simulation: Vec<SimulationProperty>,
    },
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub particles: Vec<ParticleConfig>,
    #[serde(default)]
    pub bunches: Vec<BunchConfig>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub track: Vec<TrackConfig>,
}
