//! Fixed-step integration schemes and the relativistic staging rules.
//!
//! Provides the three schemes that stage a particle's next state from its
//! committed state:
//! - `Euler`: position from old velocity, velocity from old acceleration.
//! - `Euler-Cromer`: velocity first, position from the new velocity.
//! - `Verlet`: half-step blend of old and staged acceleration.
//!
//! All schemes write into a staged [`Kinematics`] buffer; committing is the
//! particle's job, never the integrator's.

use serde::Deserialize;

use super::states::{Kinematics, Vec3};
use crate::error::{Error, Result};

/// Committed gamma above which the next staged acceleration switches from
/// F/m to the relativistic form.
pub const GAMMA_THRESHOLD: f64 = 1.4;

/// Integration scheme selector. Scenario files spell these lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Scheme {
    #[serde(rename = "euler")]
    Euler,
    #[serde(rename = "euler-cromer")]
    EulerCromer,
    #[serde(rename = "verlet")]
    Verlet,
}

impl Scheme {
    pub fn label(&self) -> &'static str {
        match self {
            Scheme::Euler => "Euler",
            Scheme::EulerCromer => "Euler-Cromer",
            Scheme::Verlet => "Verlet",
        }
    }
}

/// Lorentz factor of a velocity, with c = 1.
///
/// Speeds at or above light speed have no real gamma and abort the tick.
pub fn gamma_for(velocity: &Vec3) -> Result<f64> {
    let v2 = velocity.norm_squared();
    if v2 >= 1.0 {
        return Err(Error::SuperluminalVelocity { speed: v2.sqrt() });
    }
    Ok(1.0 / (1.0 - v2).sqrt())
}

/// Stages the acceleration for the next state from the recorded net force.
///
/// Classically this is F/m. Once the committed gamma of the previous tick
/// exceeds [`GAMMA_THRESHOLD`] the relativistic form takes over, built
/// around a candidate velocity v_c = v + dt * a:
///
/// a_next = (F - (F . v_c) v_c) / (m * gamma_c)
///
/// The switch looks at the committed gamma, not the staged one, so a
/// particle crossing the threshold feels the relativistic correction one
/// tick late. Massless particles only pass here with zero force, which
/// stages zero acceleration.
pub fn staged_acceleration(
    current: &Kinematics,
    force: &Vec3,
    mass: f64,
    t_step: f64,
    relativistic: bool,
) -> Result<Vec3> {
    if mass == 0.0 {
        return Ok(Vec3::zeros());
    }
    if relativistic && current.gamma > GAMMA_THRESHOLD {
        let candidate = current.velocity + t_step * current.acceleration;
        let gamma_c = gamma_for(&candidate)?;
        Ok((force - force.dot(&candidate) * candidate) / (mass * gamma_c))
    } else {
        Ok(force / mass)
    }
}

/// Applies one scheme step on top of the staged buffer.
///
/// The staged buffer equals the committed one on entry (the commit copies
/// the whole state), so the += forms below accumulate exactly one step.
/// `staged.acceleration` must already hold the freshly staged value; the
/// Verlet branch reads it.
pub fn advance(scheme: Scheme, t_step: f64, current: &Kinematics, staged: &mut Kinematics) {
    match scheme {
        Scheme::Euler => {
            staged.position += t_step * current.velocity;
            staged.velocity += t_step * current.acceleration;
        }
        Scheme::EulerCromer => {
            staged.velocity += t_step * current.acceleration;
            staged.position += t_step * staged.velocity;
        }
        Scheme::Verlet => {
            staged.position += t_step * (current.velocity + 0.5 * t_step * current.acceleration);
            staged.velocity += 0.5 * t_step * (staged.acceleration + current.acceleration);
        }
    }
}
