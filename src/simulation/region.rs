//! Spatial gating for field extents.
//!
//! A [`Region`] answers a single question: does a point lie inside the
//! volume a field occupies? Fields sample as zero outside their region.

use serde::Deserialize;

use super::states::Vec3;
use crate::error::{Error, Result};

/// Coordinate axis selector for slab-shaped regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn component(&self, point: &Vec3) -> f64 {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y,
            Axis::Z => point.z,
        }
    }
}

/// A volume of space a field is confined to.
///
/// Bounds are inclusive on both ends, and a zero-width interval (min equal
/// to max) is a legal single-plane region.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// No gating at all.
    AllSpace,
    /// Slab bounded along one axis, unbounded along the other two.
    AxisInterval { axis: Axis, min: f64, max: f64 },
    /// Axis-aligned box bounded on all three axes.
    Cuboid { min: Vec3, max: Vec3 },
}

impl Region {
    pub fn axis_interval(axis: Axis, min: f64, max: f64) -> Result<Self> {
        if min > max {
            return Err(Error::DegenerateRegion { min, max });
        }
        Ok(Region::AxisInterval { axis, min, max })
    }

    pub fn cuboid(min: Vec3, max: Vec3) -> Result<Self> {
        for (lo, hi) in [(min.x, max.x), (min.y, max.y), (min.z, max.z)] {
            if lo > hi {
                return Err(Error::DegenerateRegion { min: lo, max: hi });
            }
        }
        Ok(Region::Cuboid { min, max })
    }

    pub fn contains(&self, point: &Vec3) -> bool {
        match self {
            Region::AllSpace => true,
            Region::AxisInterval { axis, min, max } => {
                let c = axis.component(point);
                *min <= c && c <= *max
            }
            Region::Cuboid { min, max } => {
                min.x <= point.x
                    && point.x <= max.x
                    && min.y <= point.y
                    && point.y <= max.y
                    && min.z <= point.z
                    && point.z <= max.z
            }
        }
    }
}
