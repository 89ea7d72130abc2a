//! Earth model constants and sidereal time.
//!
//! WGS84 ellipsoid parameters plus the Julian-date and Greenwich Mean
//! Sidereal Time helpers that relate the inertial and Earth-fixed frames.

use chrono::{DateTime, Utc};
use std::f64::consts::PI;

/// WGS84 equatorial radius in km.
pub const WGS84_A_KM: f64 = 6378.137;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257223563;
/// WGS84 polar radius in km, A(1 − f).
pub const WGS84_B_KM: f64 = WGS84_A_KM * (1.0 - WGS84_F);
/// WGS84 first eccentricity squared, 2f − f².
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);
/// Earth rotation rate in rad/s.
pub const EARTH_ROTATION_RAD_S: f64 = 7.292115e-5;
/// Mean Earth radius in km, used for spherical altitude estimates.
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;
/// Geocentric gravitational constant μ = GM in km³/s².
pub const MU_KM3_S2: f64 = 398_600.4418;

/// Julian date of J2000.0 (2000-01-01 12:00:00 TT, used here as UTC).
const JD_J2000: f64 = 2_451_545.0;
/// Julian date of the Unix epoch.
const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Julian date for a UTC calendar instant.
pub fn julian_date(t: DateTime<Utc>) -> f64 {
    let seconds = t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9;
    seconds / 86_400.0 + JD_UNIX_EPOCH
}

/// Greenwich Mean Sidereal Time in radians for a UTC instant.
///
/// Standard polynomial in Julian centuries since J2000.0, reduced to
/// [0, 2π).
pub fn gmst_rad(t: DateTime<Utc>) -> f64 {
    let jd = julian_date(t);
    let tc = (jd - JD_J2000) / 36_525.0;

    // GMST in seconds of sidereal time
    let gmst_sec = 67_310.54841
        + (876_600.0 * 3600.0 + 8_640_184.812866) * tc
        + 0.093104 * tc * tc
        - 6.2e-6 * tc * tc * tc;

    // 240 sidereal seconds per degree
    ((gmst_sec / 240.0) * (PI / 180.0)).rem_euclid(2.0 * PI)
}
