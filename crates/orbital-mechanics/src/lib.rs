//! Orbital Mechanics Library
//!
//! TLE parsing, SGP4 propagation, coordinate transforms and ground-track
//! generation for Earth-orbiting satellites.
//!
//! The crate is organised around four façades:
//! - [`Tle`]: a parsed and checksum-validated two-line element set
//! - [`Propagator`]: SGP4/SDP4 state vectors at arbitrary UTC instants
//! - [`transforms`]: ECI/ECEF/geodetic/topocentric conversions
//! - [`ground_track`]: serialization-ready ground tracks split at the
//!   antimeridian and partitioned into past/future segments

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod earth;
pub mod ground_track;
pub mod passes;
pub mod propagation;
pub mod tle;
pub mod transforms;

pub use ground_track::{GroundTrack, TrackPoint};
pub use passes::Pass;
pub use propagation::{GravityModel, Propagator, StateVector};
pub use tle::Tle;
pub use transforms::{EcefPosition, EciPosition, Geodetic, LookAngles, Observer};

/// Errors produced while decoding a TLE record.
///
/// The parser reports the earliest offending field; `line` is 1 or 2 for
/// element lines (0 for the optional name line).
#[derive(Error, Debug)]
pub enum TleError {
    #[error("line {line}: malformed TLE record: {reason}")]
    Format { line: usize, reason: String },
    #[error("line {line} is {len} characters, expected at least 69")]
    LineTooShort { line: usize, len: usize },
    #[error("line {line} begins with {found:?}, expected {expected:?}")]
    LineNumber {
        line: usize,
        expected: char,
        found: char,
    },
    #[error("line {line} checksum mismatch: computed {computed}, found {found:?}")]
    Checksum {
        line: usize,
        computed: u32,
        found: char,
    },
    #[error("catalog numbers disagree between lines: {line1} vs {line2}")]
    CatalogMismatch { line1: u32, line2: u32 },
    #[error("invalid Alpha-5 catalog designator {0:?}")]
    Alpha5Invalid(String),
    #[error("line {line}, {field}: cannot parse {value:?} as a number")]
    FieldNumeric {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// Errors produced by propagation and track generation.
#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error(transparent)]
    Tle(#[from] TleError),
    #[error("TLE {norad_id} is missing its element lines")]
    MissingLines { norad_id: u32 },
    #[error("satellite {norad_id} decayed or element set invalid: {reason}")]
    DecayedOrInvalid { norad_id: u32, reason: String },
    #[error("time range is empty")]
    InvalidRange,
    #[error("sampling step must be positive")]
    InvalidStep,
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Millisecond Unix timestamp of a UTC instant, as used by track points.
pub(crate) fn unix_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}
