//! Build fully-initialized simulations from configuration.
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a ready-to-run
//! [`Simulation`]:
//! - run parameters from the `simulation` block,
//! - particles and bunches registered in file order (ids follow),
//! - fields wired up, resonant gaps keyed to earlier magnetic fields,
//! - tracking registrations from the `track` block.
//!
//! Also ships the classic single-proton preset: one proton circling in a
//! unit magnetic field.

use tracing::info;

use crate::configuration::config::{
    BunchConfig, FieldConfig, GammaRefConfig, ParticleConfig, RegionConfig, ScenarioConfig,
    TrackConfig,
};
use crate::error::{Error, Result};
use crate::simulation::engine::Simulation;
use crate::simulation::fields::{
    CyclotronEField, GammaRef, IsoCyclotronBField, OscillatingEField, ParticleEField,
    SynchroCyclotronEField, UniformBField, UniformEField,
};
use crate::simulation::integrator::Scheme;
use crate::simulation::params::Parameters;
use crate::simulation::region::Region;
use crate::simulation::states::{Bunch, Particle, Species, Vec3};
use crate::tracking::properties::ParticleProperty;

fn vec3(a: [f64; 3]) -> Vec3 {
    Vec3::new(a[0], a[1], a[2])
}

fn region_from(cfg: Option<&RegionConfig>) -> Result<Region> {
    match cfg {
        None => Ok(Region::AllSpace),
        Some(RegionConfig::Interval { axis, min, max }) => {
            Region::axis_interval(*axis, *min, *max)
        }
        Some(RegionConfig::Box { min, max }) => Region::cuboid(vec3(*min), vec3(*max)),
    }
}

fn gamma_ref_from(cfg: GammaRefConfig, sim: &Simulation) -> Result<GammaRef> {
    // Validate the reference now; a dangling id should not wait for the
    // first field update to surface.
    match cfg {
        GammaRefConfig::Particle { particle } => {
            sim.system().particle(particle)?;
            Ok(GammaRef::Particle(particle))
        }
        GammaRefConfig::Bunch { bunch } => {
            sim.system().bunch(bunch)?;
            Ok(GammaRef::Bunch(bunch))
        }
    }
}

fn particle_from(cfg: &ParticleConfig) -> Result<Particle> {
    let (name, mass, charge) = match &cfg.species {
        Some(species) => {
            let sp = Species::named(species)
                .ok_or_else(|| Error::UnknownSpecies(species.clone()))?;
            (
                cfg.name.clone().unwrap_or_else(|| sp.name.to_string()),
                cfg.mass.unwrap_or(sp.mass),
                cfg.charge.unwrap_or(sp.charge),
            )
        }
        None => (
            cfg.name.clone().unwrap_or_else(|| "Particle".to_string()),
            cfg.mass.unwrap_or(0.0),
            cfg.charge.unwrap_or(0.0),
        ),
    };
    let acceleration = cfg.acceleration.map(vec3).unwrap_or_else(Vec3::zeros);
    Ok(Particle::new(
        name,
        vec3(cfg.position),
        vec3(cfg.velocity),
        acceleration,
        mass,
        charge,
    ))
}

fn bunch_from(cfg: &BunchConfig) -> Result<Bunch> {
    let prototype = particle_from(&cfg.prototype)?;
    let name = cfg
        .bunch_name
        .clone()
        .unwrap_or_else(|| format!("{} bunch", prototype.name));
    Bunch::new(name, prototype, cfg.count)
}

/// Builds a runnable [`Simulation`] from a parsed scenario.
pub fn build_simulation(cfg: ScenarioConfig) -> Result<Simulation> {
    let sc = &cfg.simulation;
    let params = Parameters::new(sc.name.clone(), sc.scheme, sc.t_step, sc.duration)
        .relativistic(sc.relativistic)
        .log_every(sc.log_every)
        .print_every(sc.print_every);
    let mut sim = Simulation::new(params)?;

    for pc in &cfg.particles {
        sim.add_particle(particle_from(pc)?)?;
    }
    for bc in &cfg.bunches {
        sim.add_bunch(bunch_from(bc)?)?;
    }

    // Resonant gaps reference a magnetic field by id; keep a copy of every
    // magnetic field already built so later gaps can resonate with it.
    let mut partners: Vec<Option<UniformBField>> = Vec::with_capacity(cfg.fields.len());
    let partner_of = |partners: &[Option<UniformBField>], id: usize| -> Result<UniformBField> {
        match partners.get(id) {
            Some(Some(b)) => Ok(b.clone()),
            Some(None) => Err(Error::NotMagnetic(id)),
            None => Err(Error::UnknownField(id)),
        }
    };

    for fc in &cfg.fields {
        match fc {
            FieldConfig::UniformB { vector, region } => {
                let field = UniformBField::with_region(vec3(*vector), region_from(region.as_ref())?);
                partners.push(Some(field.clone()));
                sim.add_field(field)?;
            }
            FieldConfig::UniformE { vector, region } => {
                partners.push(None);
                sim.add_field(UniformEField::with_region(
                    vec3(*vector),
                    region_from(region.as_ref())?,
                ))?;
            }
            FieldConfig::OscillatingE {
                vector,
                period,
                t_step,
                region,
            } => {
                partners.push(None);
                sim.add_field(OscillatingEField::with_region(
                    vec3(*vector),
                    *period,
                    *t_step,
                    region_from(region.as_ref())?,
                )?)?;
            }
            FieldConfig::CyclotronE {
                vector,
                species,
                b_field,
                t_step,
                region,
            } => {
                let sp = Species::named(species)
                    .ok_or_else(|| Error::UnknownSpecies(species.clone()))?;
                let partner = partner_of(&partners, *b_field)?;
                partners.push(None);
                sim.add_field(CyclotronEField::new(
                    vec3(*vector),
                    sp,
                    &partner,
                    *t_step,
                    region_from(region.as_ref())?,
                )?)?;
            }
            FieldConfig::SynchroE {
                vector,
                species,
                b_field,
                t_step,
                reference,
                region,
            } => {
                let sp = Species::named(species)
                    .ok_or_else(|| Error::UnknownSpecies(species.clone()))?;
                let partner = partner_of(&partners, *b_field)?;
                let reference = gamma_ref_from(*reference, &sim)?;
                partners.push(None);
                sim.add_field(SynchroCyclotronEField::new(
                    vec3(*vector),
                    sp,
                    &partner,
                    *t_step,
                    region_from(region.as_ref())?,
                    reference,
                )?)?;
            }
            FieldConfig::IsoB { vector, reference, region } => {
                let reference = gamma_ref_from(*reference, &sim)?;
                let v = vec3(*vector);
                // Gaps keyed to this field resonate with its base profile.
                partners.push(Some(UniformBField::new(v)));
                sim.add_field(IsoCyclotronBField::new(
                    v,
                    region_from(region.as_ref())?,
                    reference,
                ))?;
            }
            FieldConfig::ParticleE { source } => {
                sim.system().particle(*source)?;
                partners.push(None);
                sim.add_field(ParticleEField::new(*source))?;
            }
        }
    }

    for tc in &cfg.track {
        match tc {
            TrackConfig::Particle {
                particle,
                properties,
            } => sim.track_particle(*particle, properties)?,
            TrackConfig::Bunch { bunch, properties } => sim.track_bunch(*bunch, properties)?,
            TrackConfig::Probe { probe } => sim.track_probe(
                probe.field,
                vec3(probe.point),
                &probe.label,
                &probe.properties,
            )?,
            TrackConfig::Simulation { simulation } => sim.track_simulation(simulation)?,
        }
    }

    info!(
        name = %cfg.simulation.name,
        particles = sim.system().particles.len(),
        bunches = sim.system().bunches.len(),
        fields = sim.fields().len(),
        "scenario built"
    );
    Ok(sim)
}

/// The classic starter scenario: one proton circling in a unit magnetic
/// field along z, position and velocity tracked.
pub fn single_proton(scheme: Scheme, t_step: f64, duration: f64) -> Result<Simulation> {
    let params = Parameters::new("single-proton", scheme, t_step, duration);
    let mut sim = Simulation::new(params)?;
    let id = sim.add_particle(
        Species::PROTON.particle(Vec3::zeros(), Vec3::new(0.5, 0.0, 0.0)),
    )?;
    sim.add_field(UniformBField::new(Vec3::new(0.0, 0.0, 1.0)))?;
    sim.track_particle(id, &[ParticleProperty::Position, ParticleProperty::Velocity])?;
    Ok(sim)
}
