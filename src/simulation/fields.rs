//! Electromagnetic field sources and their composition.
//!
//! Defines the [`Field`] trait plus the concrete sources:
//! - uniform electric and magnetic fields, optionally region-gated
//! - sinusoidally and square-wave modulated accelerating fields
//! - cyclotron-resonant gap fields, fixed-frequency and gamma-tracking
//! - the point-charge Coulomb field of a tracked particle
//!
//! Fields are queried against the committed system state and never mutate
//! particles themselves; the engine collects forces and hands them over.

use std::f64::consts::PI;

use super::region::Region;
use super::states::{Particle, Species, System, Vec3};
use crate::error::{Error, Result};

/// Permittivity of free space in natural units, chosen so the Coulomb
/// constant comes out as exactly 1.
pub const VACUUM_PERMITTIVITY: f64 = 1.0 / (4.0 * PI);

/// Coulomb constant 1 / (4 pi eps0).
pub const COULOMB_K: f64 = 1.0 / (4.0 * PI * VACUUM_PERMITTIVITY);

/// Lorentz force of a magnetic field: q v x B.
fn magnetic_force(charge: f64, velocity: &Vec3, field: &Vec3) -> Vec3 {
    charge * velocity.cross(field)
}

/// Electrostatic force: q E.
fn electric_force(charge: f64, field: &Vec3) -> Vec3 {
    charge * field
}

/// One source of electromagnetic field.
///
/// `vector_at` samples the field vector at a point, `force_on` turns that
/// sample into a force through the source's own force law. `update` applies
/// state transitions that read the system (phase flips, gamma tracking) and
/// `tick` advances the source's internal clock; the engine calls both once
/// per tick, in that order, after particles have committed.
pub trait Field {
    /// Short display kind, e.g. "Uniform B-Field".
    fn kind(&self) -> &'static str;

    fn vector_at(&self, sys: &System, point: &Vec3) -> Result<Vec3>;

    fn magnitude_at(&self, sys: &System, point: &Vec3) -> Result<f64> {
        Ok(self.vector_at(sys, point)?.norm())
    }

    fn force_on(&self, sys: &System, particle: &Particle) -> Result<Vec3>;

    /// Potential energy of a particle in this field. Sources without a
    /// useful potential report zero.
    fn potential_energy(&self, sys: &System, particle: &Particle) -> Result<f64>;

    fn update(&mut self, sys: &System) -> Result<()>;

    fn tick(&mut self);

    /// Id of the standalone particle sourcing this field, if any. The
    /// engine skips a field when accumulating forces on its own source.
    fn source(&self) -> Option<usize> {
        None
    }
}

/// A constant vector confined to a region, sampling as zero outside it.
#[derive(Debug, Clone, PartialEq)]
struct UniformProfile {
    vector: Vec3,
    region: Region,
}

impl UniformProfile {
    fn new(vector: Vec3, region: Region) -> Self {
        Self { vector, region }
    }

    fn sample(&self, point: &Vec3) -> Vec3 {
        if self.region.contains(point) {
            self.vector
        } else {
            Vec3::zeros()
        }
    }
}

/// Internal phase clock shared by the modulated fields.
///
/// One advance per engine tick. On the tick after the phase passes the
/// wrap point the clock rewinds by the wrap instead of stepping, so a
/// wrap consumes one extra tick of the cadence.
#[derive(Debug, Clone, PartialEq)]
struct PhaseClock {
    period: f64,
    t_step: f64,
    t: f64,
}

impl PhaseClock {
    fn new(period: f64, t_step: f64) -> Self {
        Self {
            period,
            t_step,
            t: 0.0,
        }
    }

    fn advance_wrapping(&mut self, wrap: f64) {
        if self.t > wrap {
            self.t -= wrap;
        } else {
            self.t += self.t_step;
        }
    }

    fn advance(&mut self) {
        self.advance_wrapping(self.period);
    }
}

/// Square-wave phase tracker: wraps at the half period, and reports a
/// pending polarity flip whenever the phase has crossed it.
#[derive(Debug, Clone, PartialEq)]
struct SquareWave {
    clock: PhaseClock,
}

impl SquareWave {
    fn new(period: f64, t_step: f64) -> Self {
        Self {
            clock: PhaseClock::new(period, t_step),
        }
    }

    fn half_period(&self) -> f64 {
        0.5 * self.clock.period
    }

    fn pending_flip(&self) -> bool {
        self.clock.t > self.half_period()
    }

    fn set_period(&mut self, period: f64) {
        self.clock.period = period;
    }

    fn advance(&mut self) {
        let half = self.half_period();
        self.clock.advance_wrapping(half);
    }
}

// =========================================================================
// Static uniform fields
// =========================================================================

/// Constant uniform magnetic field, optionally confined to a region.
#[derive(Debug, Clone)]
pub struct UniformBField {
    profile: UniformProfile,
}

impl UniformBField {
    pub fn new(vector: Vec3) -> Self {
        Self::with_region(vector, Region::AllSpace)
    }

    pub fn with_region(vector: Vec3, region: Region) -> Self {
        Self {
            profile: UniformProfile::new(vector, region),
        }
    }

    /// Magnitude of the ungated vector; resonant gap fields key their
    /// period off this.
    pub fn magnitude(&self) -> f64 {
        self.profile.vector.norm()
    }
}

impl Field for UniformBField {
    fn kind(&self) -> &'static str {
        "Uniform B-Field"
    }

    fn vector_at(&self, _sys: &System, point: &Vec3) -> Result<Vec3> {
        Ok(self.profile.sample(point))
    }

    fn force_on(&self, _sys: &System, particle: &Particle) -> Result<Vec3> {
        let b = self.profile.sample(&particle.position());
        Ok(magnetic_force(particle.charge, &particle.velocity(), &b))
    }

    fn potential_energy(&self, _sys: &System, _particle: &Particle) -> Result<f64> {
        // Magnetic forces do no work.
        Ok(0.0)
    }

    fn update(&mut self, _sys: &System) -> Result<()> {
        Ok(())
    }

    fn tick(&mut self) {}
}

/// Constant uniform electric field, optionally confined to a region.
#[derive(Debug, Clone)]
pub struct UniformEField {
    profile: UniformProfile,
}

impl UniformEField {
    pub fn new(vector: Vec3) -> Self {
        Self::with_region(vector, Region::AllSpace)
    }

    pub fn with_region(vector: Vec3, region: Region) -> Self {
        Self {
            profile: UniformProfile::new(vector, region),
        }
    }
}

impl Field for UniformEField {
    fn kind(&self) -> &'static str {
        "Uniform E-Field"
    }

    fn vector_at(&self, _sys: &System, point: &Vec3) -> Result<Vec3> {
        Ok(self.profile.sample(point))
    }

    fn force_on(&self, _sys: &System, particle: &Particle) -> Result<Vec3> {
        let e = self.profile.sample(&particle.position());
        Ok(electric_force(particle.charge, &e))
    }

    fn potential_energy(&self, _sys: &System, particle: &Particle) -> Result<f64> {
        // Potential of a uniform field relative to the origin, -E . r,
        // with the sample already gated by the region.
        let r = particle.position();
        let e = self.profile.sample(&r);
        Ok(-particle.charge * e.dot(&r))
    }

    fn update(&mut self, _sys: &System) -> Result<()> {
        Ok(())
    }

    fn tick(&mut self) {}
}

// =========================================================================
// Modulated accelerating fields
// =========================================================================

/// Uniform electric field modulated by sin(2 pi t / period) on its own
/// phase clock.
#[derive(Debug, Clone)]
pub struct OscillatingEField {
    profile: UniformProfile,
    clock: PhaseClock,
}

impl OscillatingEField {
    pub fn new(vector: Vec3, period: f64, t_step: f64) -> Result<Self> {
        Self::with_region(vector, period, t_step, Region::AllSpace)
    }

    pub fn with_region(vector: Vec3, period: f64, t_step: f64, region: Region) -> Result<Self> {
        // The modulation divides by the period; zero or NaN would turn
        // every sample into NaN without ever failing a tick.
        if !(period > 0.0) {
            return Err(Error::NonPositivePeriod(period));
        }
        Ok(Self {
            profile: UniformProfile::new(vector, region),
            clock: PhaseClock::new(period, t_step),
        })
    }

    fn modulation(&self) -> f64 {
        (2.0 * PI * self.clock.t / self.clock.period).sin()
    }
}

impl Field for OscillatingEField {
    fn kind(&self) -> &'static str {
        "Oscillating E-Field"
    }

    fn vector_at(&self, _sys: &System, point: &Vec3) -> Result<Vec3> {
        Ok(self.modulation() * self.profile.sample(point))
    }

    fn force_on(&self, sys: &System, particle: &Particle) -> Result<Vec3> {
        let e = self.vector_at(sys, &particle.position())?;
        Ok(electric_force(particle.charge, &e))
    }

    fn potential_energy(&self, _sys: &System, _particle: &Particle) -> Result<f64> {
        Ok(0.0)
    }

    fn update(&mut self, _sys: &System) -> Result<()> {
        // Continuous modulation; the phase advances in tick().
        Ok(())
    }

    fn tick(&mut self) {
        self.clock.advance();
    }
}

/// Fixed-frequency accelerating gap: the uniform vector flips sign every
/// half resonance period of the driving species in a given magnetic field.
#[derive(Debug, Clone)]
pub struct CyclotronEField {
    profile: UniformProfile,
    wave: SquareWave,
}

impl CyclotronEField {
    /// Resonance period 2 pi m / (q |B|) of a species in a field of the
    /// given magnitude.
    pub fn resonance_period(species: Species, b_magnitude: f64) -> Result<f64> {
        let denom = species.charge * b_magnitude;
        if denom == 0.0 {
            return Err(Error::ResonanceUndefined);
        }
        Ok(2.0 * PI * species.mass / denom)
    }

    pub fn new(
        vector: Vec3,
        species: Species,
        b_field: &UniformBField,
        t_step: f64,
        region: Region,
    ) -> Result<Self> {
        Self::with_b_magnitude(vector, species, b_field.magnitude(), t_step, region)
    }

    /// Like [`CyclotronEField::new`] but keyed off a raw field magnitude,
    /// for callers that no longer hold the magnetic field by reference.
    pub fn with_b_magnitude(
        vector: Vec3,
        species: Species,
        b_magnitude: f64,
        t_step: f64,
        region: Region,
    ) -> Result<Self> {
        let period = Self::resonance_period(species, b_magnitude)?;
        Ok(Self {
            profile: UniformProfile::new(vector, region),
            wave: SquareWave::new(period, t_step),
        })
    }

    pub fn period(&self) -> f64 {
        self.wave.clock.period
    }
}

impl Field for CyclotronEField {
    fn kind(&self) -> &'static str {
        "Cyclotron E-Field"
    }

    fn vector_at(&self, _sys: &System, point: &Vec3) -> Result<Vec3> {
        // The square-wave sign is carried in the profile vector itself.
        Ok(self.profile.sample(point))
    }

    fn force_on(&self, _sys: &System, particle: &Particle) -> Result<Vec3> {
        let e = self.profile.sample(&particle.position());
        Ok(electric_force(particle.charge, &e))
    }

    fn potential_energy(&self, _sys: &System, _particle: &Particle) -> Result<f64> {
        Ok(0.0)
    }

    fn update(&mut self, _sys: &System) -> Result<()> {
        if self.wave.pending_flip() {
            self.profile.vector = -self.profile.vector;
        }
        Ok(())
    }

    fn tick(&mut self) {
        self.wave.advance();
    }
}

/// Reference whose Lorentz factor a gamma-tracking field follows. Bunches
/// contribute their average gamma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GammaRef {
    Particle(usize),
    Bunch(usize),
}

impl GammaRef {
    pub fn resolve(&self, sys: &System) -> Result<f64> {
        match self {
            GammaRef::Particle(id) => Ok(sys.particle(*id)?.gamma()),
            GammaRef::Bunch(id) => Ok(sys.bunch(*id)?.avg_gamma()),
        }
    }
}

/// Accelerating gap whose flip period stretches with the reference's
/// gamma, staying resonant as the driven particles go relativistic.
#[derive(Debug, Clone)]
pub struct SynchroCyclotronEField {
    profile: UniformProfile,
    wave: SquareWave,
    base_period: f64,
    reference: GammaRef,
}

impl SynchroCyclotronEField {
    pub fn new(
        vector: Vec3,
        species: Species,
        b_field: &UniformBField,
        t_step: f64,
        region: Region,
        reference: GammaRef,
    ) -> Result<Self> {
        Self::with_b_magnitude(vector, species, b_field.magnitude(), t_step, region, reference)
    }

    pub fn with_b_magnitude(
        vector: Vec3,
        species: Species,
        b_magnitude: f64,
        t_step: f64,
        region: Region,
        reference: GammaRef,
    ) -> Result<Self> {
        let base_period = CyclotronEField::resonance_period(species, b_magnitude)?;
        Ok(Self {
            profile: UniformProfile::new(vector, region),
            wave: SquareWave::new(base_period, t_step),
            base_period,
            reference,
        })
    }

    pub fn period(&self) -> f64 {
        self.wave.clock.period
    }
}

impl Field for SynchroCyclotronEField {
    fn kind(&self) -> &'static str {
        "Synchro-Cyclotron E-Field"
    }

    fn vector_at(&self, _sys: &System, point: &Vec3) -> Result<Vec3> {
        Ok(self.profile.sample(point))
    }

    fn force_on(&self, _sys: &System, particle: &Particle) -> Result<Vec3> {
        let e = self.profile.sample(&particle.position());
        Ok(electric_force(particle.charge, &e))
    }

    fn potential_energy(&self, _sys: &System, _particle: &Particle) -> Result<f64> {
        Ok(0.0)
    }

    fn update(&mut self, sys: &System) -> Result<()> {
        // Stretch the period to the reference gamma first; the flip test
        // must see the current period.
        let gamma = self.reference.resolve(sys)?;
        self.wave.set_period(self.base_period * gamma);
        if self.wave.pending_flip() {
            self.profile.vector = -self.profile.vector;
        }
        Ok(())
    }

    fn tick(&mut self) {
        self.wave.advance();
    }
}

/// Magnetic field whose strength grows with the reference's gamma, the
/// isochronous counterpart to the synchro-cyclotron gap.
#[derive(Debug, Clone)]
pub struct IsoCyclotronBField {
    base: Vec3,
    profile: UniformProfile,
    reference: GammaRef,
}

impl IsoCyclotronBField {
    pub fn new(vector: Vec3, region: Region, reference: GammaRef) -> Self {
        Self {
            base: vector,
            profile: UniformProfile::new(vector, region),
            reference,
        }
    }
}

impl Field for IsoCyclotronBField {
    fn kind(&self) -> &'static str {
        "Iso-Cyclotron B-Field"
    }

    fn vector_at(&self, _sys: &System, point: &Vec3) -> Result<Vec3> {
        Ok(self.profile.sample(point))
    }

    fn force_on(&self, _sys: &System, particle: &Particle) -> Result<Vec3> {
        let b = self.profile.sample(&particle.position());
        Ok(magnetic_force(particle.charge, &particle.velocity(), &b))
    }

    fn potential_energy(&self, _sys: &System, _particle: &Particle) -> Result<f64> {
        Ok(0.0)
    }

    fn update(&mut self, sys: &System) -> Result<()> {
        // Rescale from the immutable base vector, not the current one, so
        // gamma noise cannot compound across ticks.
        let gamma = self.reference.resolve(sys)?;
        self.profile.vector = self.base * gamma;
        Ok(())
    }

    fn tick(&mut self) {}
}

// =========================================================================
// Particle-sourced Coulomb field
// =========================================================================

/// Coulomb field of one standalone particle, k q rhat / r^2, tracking the
/// source's committed position every query.
#[derive(Debug, Clone)]
pub struct ParticleEField {
    source: usize,
}

impl ParticleEField {
    pub fn new(source: usize) -> Self {
        Self { source }
    }

    fn potential_at(&self, sys: &System, point: &Vec3) -> Result<f64> {
        let src = sys.particle(self.source)?;
        let r = (point - src.position()).norm();
        if r == 0.0 {
            return Err(Error::CoulombSingularity {
                source_id: self.source,
            });
        }
        Ok(COULOMB_K * src.charge / r)
    }
}

impl Field for ParticleEField {
    fn kind(&self) -> &'static str {
        "Particle E-Field"
    }

    fn vector_at(&self, sys: &System, point: &Vec3) -> Result<Vec3> {
        let src = sys.particle(self.source)?;
        let rvec = point - src.position();
        let r2 = rvec.norm_squared();
        if r2 == 0.0 {
            return Err(Error::CoulombSingularity {
                source_id: self.source,
            });
        }
        Ok(COULOMB_K * src.charge * rvec / (r2 * r2.sqrt()))
    }

    fn force_on(&self, sys: &System, particle: &Particle) -> Result<Vec3> {
        let e = self.vector_at(sys, &particle.position())?;
        Ok(electric_force(particle.charge, &e))
    }

    fn potential_energy(&self, sys: &System, particle: &Particle) -> Result<f64> {
        Ok(particle.charge * self.potential_at(sys, &particle.position())?)
    }

    fn update(&mut self, _sys: &System) -> Result<()> {
        Ok(())
    }

    fn tick(&mut self) {}

    fn source(&self) -> Option<usize> {
        Some(self.source)
    }
}

// =========================================================================
// Field collection
// =========================================================================

/// All field sources of a simulation, in registration order.
#[derive(Default)]
pub struct FieldSet {
    fields: Vec<Box<dyn Field + Send + Sync>>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Adds a field and returns its id in this collection.
    pub fn add(&mut self, field: impl Field + Send + Sync + 'static) -> usize {
        self.fields.push(Box::new(field));
        self.fields.len() - 1
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, id: usize) -> Result<&(dyn Field + Send + Sync)> {
        self.fields
            .get(id)
            .map(|b| b.as_ref())
            .ok_or(Error::UnknownField(id))
    }

    /// Display kind plus id, e.g. "Uniform B-Field 0".
    pub fn full_name(&self, id: usize) -> Result<String> {
        Ok(format!("{} {}", self.get(id)?.kind(), id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Field + Send + Sync)> {
        self.fields.iter().map(|b| b.as_ref())
    }

    /// Net force on a particle from every field it is exposed to.
    pub fn total_force(&self, sys: &System, particle: &Particle) -> Result<Vec3> {
        let mut total = Vec3::zeros();
        for field in &self.fields {
            if let (Some(source), Some(id)) = (field.source(), particle.id()) {
                if source == id {
                    continue; // a particle never feels its own field
                }
            }
            total += field.force_on(sys, particle)?;
        }
        Ok(total)
    }

    /// Runs the per-tick field transition: update() then tick(), field by
    /// field, against the freshly committed system.
    pub(crate) fn update_all(&mut self, sys: &System) -> Result<()> {
        for field in &mut self.fields {
            field.update(sys)?;
            field.tick();
        }
        Ok(())
    }
}
