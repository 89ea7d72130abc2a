//! SGP4 propagator driver.
//!
//! Wraps the `sgp4` kernel (Vallado reference implementation): the kernel
//! is initialized once per TLE, then queried for TEME position/velocity
//! at arbitrary UTC instants. Deep-space element sets (period ≥ 225 min)
//! take the kernel's SDP4 branch transparently.

use crate::earth::EARTH_MEAN_RADIUS_KM;
use crate::transforms::EciPosition;
use crate::{OrbitalError, Result, Tle};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Geopotential model used to initialize the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GravityModel {
    /// WGS72 constants with the AFSPC sidereal-time expression; matches
    /// the original AFSPC code and most published test vectors.
    Wgs72,
    /// WGS84 constants with the IAU sidereal-time expression.
    #[default]
    Wgs84,
}

/// Inertial position and velocity at an instant, km and km/s.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub epoch: DateTime<Utc>,
}

impl StateVector {
    /// Distance from the Earth's center, km.
    pub fn distance_from_center(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Altitude above the mean sphere (6371 km), km.
    pub fn altitude(&self) -> f64 {
        self.distance_from_center() - EARTH_MEAN_RADIUS_KM
    }

    /// Speed, km/s.
    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy + self.vz * self.vz).sqrt()
    }

    pub fn position(&self) -> EciPosition {
        EciPosition {
            x: self.x,
            y: self.y,
            z: self.z,
            epoch: self.epoch,
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && self.vx.is_finite()
            && self.vy.is_finite()
            && self.vz.is_finite()
    }
}

/// A propagator initialized from one TLE. Read-only after construction;
/// repeated calls with the same timestamp produce identical output.
#[derive(Debug)]
pub struct Propagator {
    norad_id: u32,
    epoch: DateTime<Utc>,
    gravity: GravityModel,
    constants: sgp4::Constants,
}

impl Propagator {
    /// Initialize the kernel from a validated TLE under the given gravity
    /// model.
    pub fn new(tle: &Tle, gravity: GravityModel) -> Result<Propagator> {
        if tle.line1.is_empty() || tle.line2.is_empty() {
            return Err(OrbitalError::MissingLines {
                norad_id: tle.norad_id,
            });
        }

        let name = (!tle.name.is_empty()).then(|| tle.name.clone());
        let elements = sgp4::Elements::from_tle(name, tle.line1.as_bytes(), tle.line2.as_bytes())
            .map_err(|e| OrbitalError::DecayedOrInvalid {
                norad_id: tle.norad_id,
                reason: e.to_string(),
            })?;

        let constants = match gravity {
            GravityModel::Wgs84 => sgp4::Constants::from_elements(&elements),
            GravityModel::Wgs72 => sgp4::Constants::from_elements_afspc_compatibility_mode(&elements),
        }
        .map_err(|e| OrbitalError::DecayedOrInvalid {
            norad_id: tle.norad_id,
            reason: e.to_string(),
        })?;

        Ok(Propagator {
            norad_id: tle.norad_id,
            epoch: tle.epoch,
            gravity,
            constants,
        })
    }

    /// Initialize with the default WGS84 model.
    pub fn from_tle(tle: &Tle) -> Result<Propagator> {
        Propagator::new(tle, GravityModel::default())
    }

    pub fn norad_id(&self) -> u32 {
        self.norad_id
    }

    pub fn gravity(&self) -> GravityModel {
        self.gravity
    }

    /// TEME position and velocity at `t`.
    pub fn propagate(&self, t: DateTime<Utc>) -> Result<StateVector> {
        let minutes = (t - self.epoch).num_milliseconds() as f64 / 60_000.0;
        let prediction = self
            .constants
            .propagate(sgp4::MinutesSinceEpoch(minutes))
            .map_err(|e| OrbitalError::DecayedOrInvalid {
                norad_id: self.norad_id,
                reason: e.to_string(),
            })?;

        let state = StateVector {
            x: prediction.position[0],
            y: prediction.position[1],
            z: prediction.position[2],
            vx: prediction.velocity[0],
            vy: prediction.velocity[1],
            vz: prediction.velocity[2],
            epoch: t,
        };
        if !state.is_finite() {
            return Err(OrbitalError::DecayedOrInvalid {
                norad_id: self.norad_id,
                reason: "non-finite state component".to_string(),
            });
        }
        Ok(state)
    }

    /// Sample `[start, end]` at `step` intervals.
    ///
    /// `end < start` is swapped silently. A non-positive step yields
    /// `InvalidStep`. On a per-step failure the prefix collected so far is
    /// returned together with the error.
    pub fn propagate_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> (Vec<StateVector>, Option<OrbitalError>) {
        if step <= Duration::zero() {
            return (Vec::new(), Some(OrbitalError::InvalidStep));
        }
        let (start, end) = if end < start { (end, start) } else { (start, end) };

        let mut states = Vec::new();
        let mut t = start;
        while t <= end {
            match self.propagate(t) {
                Ok(state) => states.push(state),
                Err(e) => return (states, Some(e)),
            }
            t = t + step;
        }
        (states, None)
    }
}
