//! Observer pass prediction.
//!
//! Samples a satellite's elevation over a window and interpolates the
//! horizon crossings linearly, yielding acquisition-of-signal and
//! loss-of-signal instants plus the culmination per pass.

use crate::propagation::Propagator;
use crate::transforms::{eci_to_ecef, look_angles, Observer};
use crate::{OrbitalError, Result, Tle};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One predicted pass of a satellite over an observer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pass {
    /// Acquisition of signal: rise above the elevation mask.
    pub aos: DateTime<Utc>,
    /// Loss of signal: drop below the elevation mask.
    pub los: DateTime<Utc>,
    /// Highest elevation reached, degrees.
    pub max_elevation_deg: f64,
    /// Instant of the highest elevation.
    pub max_elevation_time: DateTime<Utc>,
}

impl Pass {
    pub fn duration(&self) -> Duration {
        self.los - self.aos
    }
}

/// Find all passes of `tle` over `observer` within `[start, end]`.
///
/// Elevation is sampled at `step`; mask crossings between consecutive
/// samples are located by linear interpolation. A pass still in progress
/// at `end` is closed at `end`; one already in progress at `start` opens
/// at `start`.
pub fn find_passes(
    tle: &Tle,
    observer: &Observer,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    min_elevation_deg: f64,
) -> Result<Vec<Pass>> {
    if step <= Duration::zero() {
        return Err(OrbitalError::InvalidStep);
    }
    if start == end {
        return Err(OrbitalError::InvalidRange);
    }
    let (start, end) = if end < start { (end, start) } else { (start, end) };

    let propagator = Propagator::from_tle(tle)?;
    let elevation_at = |t: DateTime<Utc>| -> Result<f64> {
        let state = propagator.propagate(t)?;
        let ecef = eci_to_ecef(&state.position());
        Ok(look_angles(observer, &ecef).elevation_deg())
    };

    let mut passes = Vec::new();
    let mut current: Option<(DateTime<Utc>, f64, DateTime<Utc>)> = None; // (aos, max_el, max_t)

    let mut prev_t = start;
    let mut prev_el = elevation_at(start)?;
    if prev_el >= min_elevation_deg {
        current = Some((start, prev_el, start));
    }

    let mut t = start + step;
    while t <= end {
        let el = elevation_at(t)?;

        if el >= min_elevation_deg {
            if let Some((_, max_el, max_t)) = current.as_mut() {
                if el > *max_el {
                    *max_el = el;
                    *max_t = t;
                }
            } else {
                let aos = crossing(prev_t, prev_el, t, el, min_elevation_deg);
                current = Some((aos, el, t));
            }
        } else if let Some((aos, max_el, max_t)) = current.take() {
            let los = crossing(prev_t, prev_el, t, el, min_elevation_deg);
            passes.push(Pass {
                aos,
                los,
                max_elevation_deg: max_el,
                max_elevation_time: max_t,
            });
        }

        prev_t = t;
        prev_el = el;
        t = t + step;
    }

    if let Some((aos, max_el, max_t)) = current {
        passes.push(Pass {
            aos,
            los: end,
            max_elevation_deg: max_el,
            max_elevation_time: max_t,
        });
    }

    Ok(passes)
}

/// Linear interpolation of the instant where elevation crosses the mask
/// between two samples.
fn crossing(
    t0: DateTime<Utc>,
    el0: f64,
    t1: DateTime<Utc>,
    el1: f64,
    mask: f64,
) -> DateTime<Utc> {
    let span = el1 - el0;
    if span.abs() < 1e-12 {
        return t0;
    }
    let frac = ((mask - el0) / span).clamp(0.0, 1.0);
    let millis = (t1 - t0).num_milliseconds() as f64 * frac;
    t0 + Duration::milliseconds(millis.round() as i64)
}
