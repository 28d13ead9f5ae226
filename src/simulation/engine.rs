//! The tick-loop driver.
//!
//! [`Simulation`] owns the system, the fields, the tracking registrations
//! and the sink, and runs the fixed tick schedule:
//! 1. accumulate forces from committed state and stage every particle,
//! 2. on logging ticks, sample tracked properties (still pre-commit),
//! 3. commit all particles,
//! 4. update() then tick() every field,
//! 5. advance the tick counter.
//!
//! Physics and wiring errors abort the run; sink failures are downgraded
//! to warnings and reported at the end.

use std::mem;

use tracing::{debug, info, warn};

use super::fields::{Field, FieldSet};
use super::params::Parameters;
use super::states::{Bunch, Particle, System, Vec3};
use crate::error::{Error, Result};
use crate::tracking::properties::{
    BunchProperty, FieldProperty, ParticleProperty, PropertyValue, Registration,
    SimulationProperty,
};
use crate::tracking::sink::{Column, SimLog, SinkError, TrackSink};

/// Lifecycle of a simulation. There is no transition out of `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Constructed,
    Running,
    Finished,
}

/// What a completed run hands back.
#[derive(Debug)]
pub struct RunReport {
    pub ticks: usize,
    pub final_time: f64,
    pub sink_warnings: Vec<SinkError>,
}

pub struct Simulation<S: TrackSink = SimLog> {
    params: Parameters,
    system: System,
    fields: FieldSet,
    registrations: Vec<Registration>,
    columns: Vec<Column>,
    columns_sent: bool,
    sink: S,
    state: RunState,
    tick: usize,
    sink_warnings: Vec<SinkError>,
}

impl Simulation<SimLog> {
    pub fn new(params: Parameters) -> Result<Self> {
        Self::with_sink(params, SimLog::new())
    }
}

impl<S: TrackSink> Simulation<S> {
    pub fn with_sink(params: Parameters, sink: S) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            system: System::new(),
            fields: FieldSet::new(),
            registrations: Vec::new(),
            columns: Vec::new(),
            columns_sent: false,
            sink,
            state: RunState::Constructed,
            tick: 0,
            sink_warnings: Vec::new(),
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn current_tick(&self) -> usize {
        self.tick
    }

    /// Simulated time of the committed state, tick * t_step.
    pub fn current_time(&self) -> f64 {
        self.tick as f64 * self.params.t_step
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn ensure_constructed(&self) -> Result<()> {
        if self.state != RunState::Constructed {
            return Err(Error::AlreadyStarted);
        }
        Ok(())
    }

    /// Registers a standalone particle and returns its id.
    pub fn add_particle(&mut self, mut particle: Particle) -> Result<usize> {
        self.ensure_constructed()?;
        let id = self.system.particles.len();
        particle.set_id(id);
        self.system.particles.push(particle);
        Ok(id)
    }

    /// Registers a bunch and returns its id. Bunch ids are independent of
    /// particle ids.
    pub fn add_bunch(&mut self, mut bunch: Bunch) -> Result<usize> {
        self.ensure_constructed()?;
        let id = self.system.bunches.len();
        bunch.set_id(id);
        self.system.bunches.push(bunch);
        Ok(id)
    }

    /// Registers a field and returns its id.
    pub fn add_field(&mut self, field: impl Field + Send + Sync + 'static) -> Result<usize> {
        self.ensure_constructed()?;
        Ok(self.fields.add(field))
    }

    pub fn track_particle(&mut self, id: usize, props: &[ParticleProperty]) -> Result<()> {
        self.ensure_constructed()?;
        let full_name = self.system.particle(id)?.full_name();
        for prop in props {
            self.columns.push(Column::new(
                format!("{}: {}", full_name, prop.label()),
                prop.is_vector(),
            ));
        }
        self.registrations.push(Registration::Particle {
            id,
            props: props.to_vec(),
        });
        Ok(())
    }

    pub fn track_bunch(&mut self, id: usize, props: &[BunchProperty]) -> Result<()> {
        self.ensure_constructed()?;
        let full_name = self.system.bunch(id)?.full_name();
        for prop in props {
            self.columns.push(Column::new(
                format!("{}: {}", full_name, prop.label()),
                prop.is_vector(),
            ));
        }
        self.registrations.push(Registration::Bunch {
            id,
            props: props.to_vec(),
        });
        Ok(())
    }

    /// Tracks a field sampled at a fixed point in space.
    pub fn track_probe(
        &mut self,
        field: usize,
        point: Vec3,
        label: &str,
        props: &[FieldProperty],
    ) -> Result<()> {
        self.ensure_constructed()?;
        let full_name = self.fields.full_name(field)?;
        for prop in props {
            self.columns.push(Column::new(
                format!("{}: {}: {}", full_name, label, prop.label()),
                prop.is_vector(),
            ));
        }
        self.registrations.push(Registration::Probe {
            field,
            point,
            label: label.to_string(),
            props: props.to_vec(),
        });
        Ok(())
    }

    pub fn track_simulation(&mut self, props: &[SimulationProperty]) -> Result<()> {
        self.ensure_constructed()?;
        for prop in props {
            self.columns.push(Column::new(
                format!("{}: {}", self.params.name, prop.label()),
                prop.is_vector(),
            ));
        }
        self.registrations.push(Registration::Simulation {
            props: props.to_vec(),
        });
        Ok(())
    }

    /// Sum of particle energies, standalone and bunched.
    pub fn total_energy(&self) -> f64 {
        self.system.iter_all().map(Particle::energy).sum()
    }

    pub fn total_momentum(&self) -> Vec3 {
        self.system.iter_all().map(Particle::momentum).sum()
    }

    pub fn total_angular_momentum(&self) -> Vec3 {
        self.system.iter_all().map(Particle::angular_momentum).sum()
    }

    /// Runs the whole tick schedule. Consumes the `Constructed` state; a
    /// simulation never runs twice.
    pub fn run(&mut self) -> Result<RunReport> {
        self.ensure_constructed()?;
        self.state = RunState::Running;

        let tick_length = self.params.tick_length();
        info!(
            name = %self.params.name,
            scheme = self.params.scheme.label(),
            relativistic = self.params.relativistic,
            ticks = tick_length,
            "starting run"
        );

        for _ in 0..tick_length {
            self.step()?;
        }

        self.state = RunState::Finished;
        self.finish();

        let sink_warnings = mem::take(&mut self.sink_warnings);
        let report = RunReport {
            ticks: tick_length,
            final_time: self.current_time(),
            sink_warnings,
        };
        info!(
            final_time = report.final_time,
            sink_warnings = report.sink_warnings.len(),
            "run finished"
        );
        Ok(report)
    }

    /// One full tick in the fixed order.
    fn step(&mut self) -> Result<()> {
        let forces = self.accumulate_forces()?;
        self.stage_particles(&forces)?;

        if self.tick % self.params.log_every == 0 {
            self.snapshot()?;
        }
        if self.params.print_every > 0 && self.tick % self.params.print_every == 0 {
            debug!(tick = self.tick, time = self.current_time(), "progress");
        }

        self.commit_particles();
        self.fields.update_all(&self.system)?;
        self.tick += 1;
        Ok(())
    }

    /// Net force per particle, all read from the committed state, in
    /// system iteration order.
    fn accumulate_forces(&self) -> Result<Vec<Vec3>> {
        let mut forces = Vec::with_capacity(self.system.particle_count());
        for particle in self.system.iter_all() {
            forces.push(self.fields.total_force(&self.system, particle)?);
        }
        Ok(forces)
    }

    fn stage_particles(&mut self, forces: &[Vec3]) -> Result<()> {
        let (t_step, scheme, relativistic) = (
            self.params.t_step,
            self.params.scheme,
            self.params.relativistic,
        );
        let mut next = 0;
        for particle in &mut self.system.particles {
            particle.apply_force(forces[next]);
            particle.update(t_step, scheme, relativistic)?;
            next += 1;
        }
        for bunch in &mut self.system.bunches {
            for particle in bunch.members_mut() {
                particle.apply_force(forces[next]);
                particle.update(t_step, scheme, relativistic)?;
                next += 1;
            }
        }
        Ok(())
    }

    fn commit_particles(&mut self) {
        for particle in &mut self.system.particles {
            particle.tick();
        }
        for bunch in &mut self.system.bunches {
            for particle in bunch.members_mut() {
                particle.tick();
            }
        }
    }

    fn read_simulation_property(&self, prop: SimulationProperty) -> PropertyValue {
        match prop {
            SimulationProperty::Time => PropertyValue::Scalar(self.current_time()),
            SimulationProperty::TotalEnergy => PropertyValue::Scalar(self.total_energy()),
            SimulationProperty::TotalMomentum => PropertyValue::Vector(self.total_momentum()),
            SimulationProperty::TotalAngularMomentum => {
                PropertyValue::Vector(self.total_angular_momentum())
            }
        }
    }

    /// Samples every registration against the committed (pre-commit for
    /// this tick) state.
    fn resolve_row(&self) -> Result<Vec<PropertyValue>> {
        let mut values = Vec::with_capacity(self.columns.len());
        for registration in &self.registrations {
            match registration {
                Registration::Particle { id, props } => {
                    let particle = self.system.particle(*id)?;
                    for prop in props {
                        values.push(prop.read(particle));
                    }
                }
                Registration::Bunch { id, props } => {
                    let bunch = self.system.bunch(*id)?;
                    for prop in props {
                        values.push(prop.read(bunch));
                    }
                }
                Registration::Probe {
                    field,
                    point,
                    props,
                    ..
                } => {
                    let field = self.fields.get(*field)?;
                    for prop in props {
                        values.push(prop.read(field, &self.system, point)?);
                    }
                }
                Registration::Simulation { props } => {
                    for prop in props {
                        values.push(self.read_simulation_property(*prop));
                    }
                }
            }
        }
        Ok(values)
    }

    fn snapshot(&mut self) -> Result<()> {
        if !self.columns_sent {
            if let Err(e) = self.sink.begin(&self.columns) {
                warn!(error = %e, "sink rejected column layout");
                self.sink_warnings.push(e);
            }
            self.columns_sent = true;
        }
        let values = self.resolve_row()?;
        if let Err(e) = self.sink.append(self.tick, &values) {
            warn!(error = %e, tick = self.tick, "sink rejected row");
            self.sink_warnings.push(e);
        }
        Ok(())
    }

    /// End-of-run summary: run facts as notes, entity counts as the
    /// environment table.
    fn finish(&mut self) {
        let p = &self.params;
        self.sink.note("name", &p.name);
        self.sink.note("scheme", p.scheme.label());
        self.sink
            .note("relativistic", if p.relativistic { "true" } else { "false" });
        self.sink.note("t_step", &p.t_step.to_string());
        self.sink.note("duration", &p.duration.to_string());
        self.sink.note("ticks", &p.tick_length().to_string());

        let mut entries: Vec<(String, usize)> = Vec::new();
        let mut bump = |key: String| {
            if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
                entry.1 += 1;
            } else {
                entries.push((key, 1));
            }
        };
        for particle in &self.system.particles {
            bump(format!("particle: {}", particle.name));
        }
        for bunch in &self.system.bunches {
            bump(format!("bunch: {}", bunch.name));
        }
        for field in self.fields.iter() {
            bump(format!("field: {}", field.kind()));
        }
        self.sink.record_environment(&entries);
    }
}
