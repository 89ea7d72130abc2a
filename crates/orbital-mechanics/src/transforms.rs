//! Coordinate transforms between the inertial (TEME/ECI), Earth-fixed
//! (ECEF), geodetic (WGS84) and topocentric (azimuth/elevation/range)
//! frames.
//!
//! All functions are pure. ECI ↔ ECEF is a Z-rotation by GMST at the
//! position's timestamp; ECEF → geodetic uses the iterative Bowring
//! method.

use crate::earth::{gmst_rad, EARTH_ROTATION_RAD_S, WGS84_A_KM, WGS84_E2};
use crate::propagation::StateVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Inertial position, km, with the instant it was computed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EciPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub epoch: DateTime<Utc>,
}

/// Earth-fixed position, km.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EcefPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub epoch: DateTime<Utc>,
}

/// Geodetic coordinates on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Geodetic {
    /// Latitude in radians, [−π/2, +π/2].
    pub latitude_rad: f64,
    /// Longitude in radians, (−π, +π].
    pub longitude_rad: f64,
    /// Altitude above the ellipsoid in km; may be negative.
    pub altitude_km: f64,
}

impl Geodetic {
    pub fn latitude_deg(&self) -> f64 {
        self.latitude_rad.to_degrees()
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude_rad.to_degrees()
    }
}

/// Topocentric look angles from a ground observer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LookAngles {
    /// Azimuth in radians, [0, 2π); 0 = true north, increasing clockwise.
    pub azimuth_rad: f64,
    /// Elevation in radians, [−π/2, +π/2].
    pub elevation_rad: f64,
    /// Slant range in km.
    pub range_km: f64,
}

impl LookAngles {
    pub fn azimuth_deg(&self) -> f64 {
        self.azimuth_rad.to_degrees()
    }

    pub fn elevation_deg(&self) -> f64 {
        self.elevation_rad.to_degrees()
    }
}

/// A fixed ground station. Angles are stored in degrees for ergonomics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Observer {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

impl Observer {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> Self {
        Observer {
            latitude_deg,
            longitude_deg,
            altitude_km,
        }
    }

    pub fn geodetic(&self) -> Geodetic {
        Geodetic {
            latitude_rad: self.latitude_deg.to_radians(),
            longitude_rad: self.longitude_deg.to_radians(),
            altitude_km: self.altitude_km,
        }
    }

    /// Observer position in the Earth-fixed frame, km.
    pub fn ecef(&self) -> [f64; 3] {
        geodetic_to_ecef(&self.geodetic())
    }
}

/// Rotate an inertial position into the Earth-fixed frame by GMST.
pub fn eci_to_ecef(p: &EciPosition) -> EcefPosition {
    let theta = gmst_rad(p.epoch);
    let (sin_t, cos_t) = theta.sin_cos();
    EcefPosition {
        x: cos_t * p.x + sin_t * p.y,
        y: -sin_t * p.x + cos_t * p.y,
        z: p.z,
        epoch: p.epoch,
    }
}

/// Inverse rotation of [`eci_to_ecef`].
pub fn ecef_to_eci(p: &EcefPosition) -> EciPosition {
    let theta = gmst_rad(p.epoch);
    let (sin_t, cos_t) = theta.sin_cos();
    EciPosition {
        x: cos_t * p.x - sin_t * p.y,
        y: sin_t * p.x + cos_t * p.y,
        z: p.z,
        epoch: p.epoch,
    }
}

/// Geodetic → ECEF with the prime-vertical radius of curvature N.
pub fn geodetic_to_ecef(g: &Geodetic) -> [f64; 3] {
    let (sin_lat, cos_lat) = g.latitude_rad.sin_cos();
    let (sin_lon, cos_lon) = g.longitude_rad.sin_cos();
    let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    [
        (n + g.altitude_km) * cos_lat * cos_lon,
        (n + g.altitude_km) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + g.altitude_km) * sin_lat,
    ]
}

/// ECEF → geodetic by Bowring iteration: at most 10 refinements of the
/// latitude or until |Δφ| < 1e−12.
pub fn ecef_to_geodetic(xyz: [f64; 3]) -> Geodetic {
    let [x, y, z] = xyz;
    let longitude_rad = y.atan2(x);
    let p = (x * x + y * y).sqrt();

    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..10 {
        let sin_lat = lat.sin();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let next = (z + WGS84_E2 * n * sin_lat).atan2(p);
        let delta = (next - lat).abs();
        lat = next;
        if delta < 1e-12 {
            break;
        }
    }

    let sin_lat = lat.sin();
    let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    // cos φ degenerates at the poles; fall back to the Z-axis expression
    let altitude_km = if lat.cos().abs() > 1e-10 {
        p / lat.cos() - n
    } else {
        z.abs() / sin_lat.abs() - n * (1.0 - WGS84_E2)
    };

    Geodetic {
        latitude_rad: lat,
        longitude_rad,
        altitude_km,
    }
}

impl EcefPosition {
    pub fn geodetic(&self) -> Geodetic {
        ecef_to_geodetic([self.x, self.y, self.z])
    }
}

/// Look angles from an observer to a satellite in the Earth-fixed frame.
///
/// The range vector is projected onto the observer's local east/north/up
/// basis; azimuth = atan2(E, N) normalized to [0, 2π), elevation =
/// asin(U / range).
pub fn look_angles(observer: &Observer, sat: &EcefPosition) -> LookAngles {
    let obs = observer.ecef();
    let dx = sat.x - obs[0];
    let dy = sat.y - obs[1];
    let dz = sat.z - obs[2];

    let g = observer.geodetic();
    let (sin_lat, cos_lat) = g.latitude_rad.sin_cos();
    let (sin_lon, cos_lon) = g.longitude_rad.sin_cos();

    let east = -sin_lon * dx + cos_lon * dy;
    let north = -sin_lat * cos_lon * dx - sin_lat * sin_lon * dy + cos_lat * dz;
    let up = cos_lat * cos_lon * dx + cos_lat * sin_lon * dy + sin_lat * dz;

    let range_km = (dx * dx + dy * dy + dz * dz).sqrt();
    LookAngles {
        azimuth_rad: east.atan2(north).rem_euclid(2.0 * PI),
        elevation_rad: (up / range_km).asin(),
        range_km,
    }
}

/// True when the satellite sits above `min_elevation_rad` for the observer.
pub fn is_visible(observer: &Observer, sat: &EcefPosition, min_elevation_rad: f64) -> bool {
    look_angles(observer, sat).elevation_rad >= min_elevation_rad
}

/// Speed of light in km/s.
const C_KM_S: f64 = 299_792.458;

/// Satellite velocity rotated into the Earth-fixed frame, km/s.
///
/// On top of the GMST rotation this carries the frame-rotation term
/// −ω × r, so a geostationary satellite comes out near zero.
pub fn eci_velocity_to_ecef(state: &StateVector) -> [f64; 3] {
    let ecef = eci_to_ecef(&state.position());
    let theta = gmst_rad(state.epoch);
    let (sin_t, cos_t) = theta.sin_cos();
    [
        cos_t * state.vx + sin_t * state.vy + EARTH_ROTATION_RAD_S * ecef.y,
        -sin_t * state.vx + cos_t * state.vy - EARTH_ROTATION_RAD_S * ecef.x,
        state.vz,
    ]
}

/// Range rate between a fixed ground observer and a satellite, km/s.
/// Positive while the satellite recedes.
pub fn range_rate(observer: &Observer, state: &StateVector) -> f64 {
    let sat = eci_to_ecef(&state.position());
    let vel = eci_velocity_to_ecef(state);
    let obs = observer.ecef();

    let dx = sat.x - obs[0];
    let dy = sat.y - obs[1];
    let dz = sat.z - obs[2];
    let range = (dx * dx + dy * dy + dz * dz).sqrt();

    (dx * vel[0] + dy * vel[1] + dz * vel[2]) / range
}

/// Doppler shift of a carrier as seen by the observer, Hz:
/// Δf = −f₀ · (v_r / c).
pub fn doppler_shift_hz(range_rate_km_s: f64, carrier_freq_hz: f64) -> f64 {
    -carrier_freq_hz * (range_rate_km_s / C_KM_S)
}
