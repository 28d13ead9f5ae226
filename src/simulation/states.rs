//! Particle state containers.
//!
//! Everything a tick needs to know about the matter being simulated lives
//! here:
//! - [`Kinematics`]: one buffer of position, velocity, acceleration, gamma.
//! - [`Particle`]: committed + staged kinematics plus mass and charge.
//! - [`Bunch`]: a group of particles advanced and reduced together.
//! - [`System`]: all particles and bunches known to a simulation.
//!
//! Units are natural: c = 1, distances and times share one scale, and the
//! Coulomb constant is 1. Energies and masses are interchangeable.

use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::simulation::integrator::{self, Scheme};

pub type Vec3 = Vector3<f64>;

/// One complete kinematic state of a particle.
///
/// `gamma` is cached rather than derived on demand so that a staged state
/// can carry the Lorentz factor of its own velocity before it is committed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub gamma: f64,
}

impl Kinematics {
    pub fn new(position: Vec3, velocity: Vec3, acceleration: Vec3) -> Self {
        // Gamma starts at 1 regardless of the initial speed; the first
        // staged update recomputes it from the staged velocity.
        Self {
            position,
            velocity,
            acceleration,
            gamma: 1.0,
        }
    }

    pub fn at_rest(position: Vec3) -> Self {
        Self::new(position, Vec3::zeros(), Vec3::zeros())
    }
}

/// A named kind of particle with fixed mass and charge.
///
/// Masses are in MeV, charges in units of the elementary charge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Species {
    pub name: &'static str,
    pub mass: f64,
    pub charge: f64,
}

impl Species {
    pub const PROTON: Species = Species {
        name: "Proton",
        mass: 938.0,
        charge: 1.0,
    };

    pub const ELECTRON: Species = Species {
        name: "Electron",
        mass: 0.511,
        charge: -1.0,
    };

    /// Looks a species up by its display name, case-insensitively.
    pub fn named(name: &str) -> Option<Species> {
        match name.to_ascii_lowercase().as_str() {
            "proton" => Some(Self::PROTON),
            "electron" => Some(Self::ELECTRON),
            _ => None,
        }
    }

    /// Builds a particle of this species at the given position and velocity.
    pub fn particle(&self, position: Vec3, velocity: Vec3) -> Particle {
        Particle::new(
            self.name,
            position,
            velocity,
            Vec3::zeros(),
            self.mass,
            self.charge,
        )
    }
}

/// A point particle with double-buffered kinematics.
///
/// Reads always see the committed state. Forces and integration write the
/// staged state, and [`Particle::tick`] makes the staged state committed.
/// Between a commit and the next update both buffers are equal.
#[derive(Debug, Clone)]
pub struct Particle {
    pub name: String,
    pub mass: f64,
    pub charge: f64,
    state: Kinematics,
    staged: Kinematics,
    force: Vec3,
    id: Option<usize>,
}

impl Particle {
    pub fn new(
        name: impl Into<String>,
        position: Vec3,
        velocity: Vec3,
        acceleration: Vec3,
        mass: f64,
        charge: f64,
    ) -> Self {
        let state = Kinematics::new(position, velocity, acceleration);
        Self {
            name: name.into(),
            mass,
            charge,
            state,
            staged: state,
            force: Vec3::zeros(),
            id: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    pub fn acceleration(&self) -> Vec3 {
        self.state.acceleration
    }

    pub fn gamma(&self) -> f64 {
        self.state.gamma
    }

    /// Id inside the owning collection, assigned at registration.
    pub fn id(&self) -> Option<usize> {
        self.id
    }

    /// Display name plus id, e.g. "Proton 0". Used as a column key prefix.
    pub fn full_name(&self) -> String {
        match self.id {
            Some(id) => format!("{} {}", self.name, id),
            None => self.name.clone(),
        }
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = Some(id);
    }

    pub(crate) fn clear_id(&mut self) {
        self.id = None;
    }

    /// Records the net force for the tick being staged. Does not touch the
    /// committed state.
    pub fn apply_force(&mut self, force: Vec3) {
        self.force = force;
    }

    /// Stages the next state from the recorded force and the committed
    /// state. Call [`Particle::tick`] afterwards to commit it.
    pub fn update(&mut self, t_step: f64, scheme: Scheme, relativistic: bool) -> Result<()> {
        if self.mass == 0.0 && self.force != Vec3::zeros() {
            return Err(Error::MasslessParticle {
                name: self.name.clone(),
            });
        }
        self.staged.acceleration = integrator::staged_acceleration(
            &self.state,
            &self.force,
            self.mass,
            t_step,
            relativistic,
        )?;
        integrator::advance(scheme, t_step, &self.state, &mut self.staged);
        self.staged.gamma = integrator::gamma_for(&self.staged.velocity)?;
        Ok(())
    }

    /// Commits the staged state. Both buffers are equal afterwards.
    pub fn tick(&mut self) {
        self.state = self.staged;
    }

    /// Relativistic momentum, gamma * m * v, from committed state.
    pub fn momentum(&self) -> Vec3 {
        self.state.gamma * self.mass * self.state.velocity
    }

    /// Angular momentum about the origin, r x p.
    pub fn angular_momentum(&self) -> Vec3 {
        self.state.position.cross(&self.momentum())
    }

    /// Total energy sqrt(|p|^2 + m^2), kinetic plus rest mass.
    pub fn energy(&self) -> f64 {
        (self.momentum().norm_squared() + self.mass * self.mass).sqrt()
    }
}

/// A group of identical particles advanced together.
///
/// Members start as copies of one prototype and then evolve independently
/// under the fields. Reductions over the members come in summed and
/// averaged flavours.
#[derive(Debug, Clone)]
pub struct Bunch {
    pub name: String,
    members: Vec<Particle>,
    id: Option<usize>,
}

impl Bunch {
    pub fn new(name: impl Into<String>, prototype: Particle, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::EmptyBunch);
        }
        let mut prototype = prototype;
        prototype.clear_id();
        let mut members = Vec::with_capacity(count);
        for _ in 1..count {
            members.push(prototype.clone());
        }
        members.push(prototype);
        Ok(Self {
            name: name.into(),
            members,
            id: None,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Particle] {
        &self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut [Particle] {
        &mut self.members
    }

    pub fn id(&self) -> Option<usize> {
        self.id
    }

    pub fn full_name(&self) -> String {
        match self.id {
            Some(id) => format!("{} {}", self.name, id),
            None => self.name.clone(),
        }
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = Some(id);
    }

    pub fn momentum(&self) -> Vec3 {
        self.members.iter().map(Particle::momentum).sum()
    }

    pub fn angular_momentum(&self) -> Vec3 {
        self.members.iter().map(Particle::angular_momentum).sum()
    }

    pub fn energy(&self) -> f64 {
        self.members.iter().map(Particle::energy).sum()
    }

    pub fn mass(&self) -> f64 {
        self.members.iter().map(|p| p.mass).sum()
    }

    fn avg(&self, f: impl Fn(&Particle) -> Vec3) -> Vec3 {
        self.members.iter().map(f).sum::<Vec3>() / self.members.len() as f64
    }

    pub fn avg_momentum(&self) -> Vec3 {
        self.avg(Particle::momentum)
    }

    pub fn avg_position(&self) -> Vec3 {
        self.avg(|p| p.position())
    }

    pub fn avg_velocity(&self) -> Vec3 {
        self.avg(|p| p.velocity())
    }

    pub fn avg_acceleration(&self) -> Vec3 {
        self.avg(|p| p.acceleration())
    }

    pub fn avg_gamma(&self) -> f64 {
        self.members.iter().map(Particle::gamma).sum::<f64>() / self.members.len() as f64
    }

    pub fn avg_energy(&self) -> f64 {
        self.energy() / self.members.len() as f64
    }
}

/// All matter known to a simulation.
#[derive(Debug, Clone, Default)]
pub struct System {
    pub particles: Vec<Particle>,
    pub bunches: Vec<Bunch>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standalone particles plus every bunch member.
    pub fn particle_count(&self) -> usize {
        self.particles.len() + self.bunches.iter().map(Bunch::len).sum::<usize>()
    }

    pub fn particle(&self, id: usize) -> Result<&Particle> {
        self.particles.get(id).ok_or(Error::UnknownParticle(id))
    }

    pub fn bunch(&self, id: usize) -> Result<&Bunch> {
        self.bunches.get(id).ok_or(Error::UnknownBunch(id))
    }

    /// Iterates standalone particles first, then bunch members in bunch
    /// order. Force accumulation and the commit walk use this order.
    pub fn iter_all(&self) -> impl Iterator<Item = &Particle> {
        self.particles
            .iter()
            .chain(self.bunches.iter().flat_map(|b| b.members().iter()))
    }
}
