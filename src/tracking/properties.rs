//! Trackable properties and their sampled values.
//!
//! Each entity kind exposes a closed set of properties. A registration
//! pairs an entity with the properties to record, and the engine samples
//! them at every logging tick, before the commit, into [`PropertyValue`]s.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::simulation::fields::Field;
use crate::simulation::states::{Bunch, Particle, System, Vec3};

/// One sampled value: a scalar or a fixed three-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Scalar(f64),
    Vector(Vec3),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleProperty {
    Position,
    Velocity,
    Acceleration,
    Momentum,
    AngularMomentum,
    Gamma,
    Energy,
}

impl ParticleProperty {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Position => "Position",
            Self::Velocity => "Velocity",
            Self::Acceleration => "Acceleration",
            Self::Momentum => "Momentum",
            Self::AngularMomentum => "Angular Momentum",
            Self::Gamma => "Gamma",
            Self::Energy => "Energy",
        }
    }

    pub fn is_vector(&self) -> bool {
        !matches!(self, Self::Gamma | Self::Energy)
    }

    pub fn read(&self, p: &Particle) -> PropertyValue {
        match self {
            Self::Position => PropertyValue::Vector(p.position()),
            Self::Velocity => PropertyValue::Vector(p.velocity()),
            Self::Acceleration => PropertyValue::Vector(p.acceleration()),
            Self::Momentum => PropertyValue::Vector(p.momentum()),
            Self::AngularMomentum => PropertyValue::Vector(p.angular_momentum()),
            Self::Gamma => PropertyValue::Scalar(p.gamma()),
            Self::Energy => PropertyValue::Scalar(p.energy()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BunchProperty {
    Momentum,
    AngularMomentum,
    Energy,
    Mass,
    AvgMomentum,
    AvgPosition,
    AvgVelocity,
    AvgAcceleration,
    AvgGamma,
    AvgEnergy,
}

impl BunchProperty {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Momentum => "Momentum",
            Self::AngularMomentum => "Angular Momentum",
            Self::Energy => "Energy",
            Self::Mass => "Mass",
            Self::AvgMomentum => "Avg Momentum",
            Self::AvgPosition => "Avg Position",
            Self::AvgVelocity => "Avg Velocity",
            Self::AvgAcceleration => "Avg Acceleration",
            Self::AvgGamma => "Avg Gamma",
            Self::AvgEnergy => "Avg Energy",
        }
    }

    pub fn is_vector(&self) -> bool {
        !matches!(
            self,
            Self::Energy | Self::Mass | Self::AvgGamma | Self::AvgEnergy
        )
    }

    pub fn read(&self, b: &Bunch) -> PropertyValue {
        match self {
            Self::Momentum => PropertyValue::Vector(b.momentum()),
            Self::AngularMomentum => PropertyValue::Vector(b.angular_momentum()),
            Self::Energy => PropertyValue::Scalar(b.energy()),
            Self::Mass => PropertyValue::Scalar(b.mass()),
            Self::AvgMomentum => PropertyValue::Vector(b.avg_momentum()),
            Self::AvgPosition => PropertyValue::Vector(b.avg_position()),
            Self::AvgVelocity => PropertyValue::Vector(b.avg_velocity()),
            Self::AvgAcceleration => PropertyValue::Vector(b.avg_acceleration()),
            Self::AvgGamma => PropertyValue::Scalar(b.avg_gamma()),
            Self::AvgEnergy => PropertyValue::Scalar(b.avg_energy()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProperty {
    Vector,
    Magnitude,
}

impl FieldProperty {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Vector => "Vector",
            Self::Magnitude => "Magnitude",
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector)
    }

    /// Probe sampling can fail, e.g. a Coulomb source sitting exactly on
    /// the probe point.
    pub fn read(
        &self,
        field: &(dyn Field + Send + Sync),
        sys: &System,
        point: &Vec3,
    ) -> Result<PropertyValue> {
        Ok(match self {
            Self::Vector => PropertyValue::Vector(field.vector_at(sys, point)?),
            Self::Magnitude => PropertyValue::Scalar(field.magnitude_at(sys, point)?),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationProperty {
    Time,
    TotalEnergy,
    TotalMomentum,
    TotalAngularMomentum,
}

impl SimulationProperty {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Time => "Time",
            Self::TotalEnergy => "Total Energy",
            Self::TotalMomentum => "Total Momentum",
            Self::TotalAngularMomentum => "Total Angular Momentum",
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::TotalMomentum | Self::TotalAngularMomentum)
    }
}

/// One tracked entity and the properties recorded for it.
#[derive(Debug, Clone)]
pub enum Registration {
    Particle {
        id: usize,
        props: Vec<ParticleProperty>,
    },
    Bunch {
        id: usize,
        props: Vec<BunchProperty>,
    },
    /// A fixed-point probe into one field.
    Probe {
        field: usize,
        point: Vec3,
        label: String,
        props: Vec<FieldProperty>,
    },
    Simulation {
        props: Vec<SimulationProperty>,
    },
}
