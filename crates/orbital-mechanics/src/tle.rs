//! Two-Line Element set decoding and validation.
//!
//! Handles the fixed-column NORAD/Celestrak text format: Modulo-10 line
//! checksums, Alpha-5 extended catalog numbers, implicit-decimal scientific
//! fields and two-digit epoch years. Batch parsing accepts 2-line records,
//! 3-line records (leading name line) and concatenated bundles with
//! optional blank separators.

use crate::earth::{MU_KM3_S2, WGS84_A_KM};
use crate::TleError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A parsed, validated TLE record. Immutable after parsing.
///
/// The two original element lines are retained verbatim for the SGP4
/// kernel and for cache serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tle {
    /// Satellite name from the optional leading line; may be empty.
    pub name: String,
    /// NORAD catalog number (Alpha-5 decoded, 1–339 999).
    pub norad_id: u32,
    /// Classification letter (U, C or S).
    pub classification: char,
    /// International designator, e.g. "98067A".
    pub intl_designator: String,
    /// Element set epoch.
    pub epoch: DateTime<Utc>,
    /// First derivative of mean motion over two, rev/day².
    pub mean_motion_dot: f64,
    /// Second derivative of mean motion over six, rev/day³.
    pub mean_motion_ddot: f64,
    /// Ballistic drag term B*, inverse Earth radii.
    pub bstar: f64,
    /// Ephemeris type digit.
    pub ephemeris_type: u8,
    /// Element set number.
    pub element_set: u32,
    /// Inclination, degrees.
    pub inclination_deg: f64,
    /// Right ascension of the ascending node, degrees.
    pub raan_deg: f64,
    /// Eccentricity, 0 ≤ e < 1.
    pub eccentricity: f64,
    /// Argument of perigee, degrees.
    pub arg_perigee_deg: f64,
    /// Mean anomaly, degrees.
    pub mean_anomaly_deg: f64,
    /// Mean motion, revolutions per day.
    pub mean_motion: f64,
    /// Revolution number at epoch.
    pub rev_number: u32,
    /// Verbatim element line 1.
    pub line1: String,
    /// Verbatim element line 2.
    pub line2: String,
}

impl Tle {
    /// Parse a single record from its element lines and optional name.
    pub fn parse(name: Option<&str>, line1: &str, line2: &str) -> Result<Tle, TleError> {
        let line1 = normalize_line(1, line1)?;
        let line2 = normalize_line(2, line2)?;

        check_line_number(1, '1', line1)?;
        check_line_number(2, '2', line2)?;
        check_checksum(1, line1)?;
        check_checksum(2, line2)?;

        let id1 = parse_catalog_number(1, &line1[2..7])?;
        let id2 = parse_catalog_number(2, &line2[2..7])?;
        if id1 != id2 {
            return Err(TleError::CatalogMismatch { line1: id1, line2: id2 });
        }

        let classification = line1.as_bytes()[7] as char;
        let intl_designator = line1[9..17].trim().to_string();
        let epoch = parse_epoch(1, &line1[18..32])?;
        let mean_motion_dot = parse_f64(1, "mean motion derivative", &line1[33..43])?;
        let mean_motion_ddot = parse_exp_field(1, "mean motion 2nd derivative", &line1[44..52])?;
        let bstar = parse_exp_field(1, "B* drag term", &line1[53..61])?;
        let ephemeris_type = match line1.as_bytes()[62] {
            b' ' => 0,
            b @ b'0'..=b'9' => b - b'0',
            other => {
                return Err(TleError::FieldNumeric {
                    line: 1,
                    field: "ephemeris type",
                    value: (other as char).to_string(),
                })
            }
        };
        let element_set = parse_u32(1, "element set number", &line1[64..68])?;

        let inclination_deg = parse_f64(2, "inclination", &line2[8..16])?;
        let raan_deg = parse_f64(2, "right ascension", &line2[17..25])?;
        let eccentricity = parse_implicit_decimal(2, "eccentricity", &line2[26..33])?;
        let arg_perigee_deg = parse_f64(2, "argument of perigee", &line2[34..42])?;
        let mean_anomaly_deg = parse_f64(2, "mean anomaly", &line2[43..51])?;
        let mean_motion = parse_f64(2, "mean motion", &line2[52..63])?;
        let rev_number = parse_u32(2, "revolution number", &line2[63..68])?;

        Ok(Tle {
            name: name.map(|n| n.trim().to_string()).unwrap_or_default(),
            norad_id: id1,
            classification,
            intl_designator,
            epoch,
            mean_motion_dot,
            mean_motion_ddot,
            bstar,
            ephemeris_type,
            element_set,
            inclination_deg,
            raan_deg,
            eccentricity,
            arg_perigee_deg,
            mean_anomaly_deg,
            mean_motion,
            rev_number,
            line1: line1.to_string(),
            line2: line2.to_string(),
        })
    }

    /// Serialize back to the 3-line text layout used by the file cache.
    /// The name line is emitted even when empty so records stay 3 lines.
    pub fn to_tle_string(&self) -> String {
        format!("{}\n{}\n{}\n", self.name, self.line1, self.line2)
    }

    /// Orbital period in minutes, 1440 / n.
    pub fn period_minutes(&self) -> f64 {
        1440.0 / self.mean_motion
    }

    /// Semi-major axis in km, (μ/n²)^⅓ with n in rad/s.
    pub fn semi_major_axis_km(&self) -> f64 {
        let n_rad_s = self.mean_motion * 2.0 * std::f64::consts::PI / 86_400.0;
        (MU_KM3_S2 / (n_rad_s * n_rad_s)).powf(1.0 / 3.0)
    }

    /// Apogee altitude above the equatorial radius, km.
    pub fn apogee_km(&self) -> f64 {
        self.semi_major_axis_km() * (1.0 + self.eccentricity) - WGS84_A_KM
    }

    /// Perigee altitude above the equatorial radius, km.
    pub fn perigee_km(&self) -> f64 {
        self.semi_major_axis_km() * (1.0 - self.eccentricity) - WGS84_A_KM
    }

    /// Geostationary heuristic: mean motion within 0.1 rev/day of 1.0.
    pub fn is_geostationary(&self) -> bool {
        (self.mean_motion - 1.0).abs() < 0.1
    }

    /// Age of the element set in fractional days at `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.epoch).num_milliseconds() as f64 / 86_400_000.0
    }
}

/// Parse a blob of concatenated records.
///
/// Non-empty lines accumulate in a buffer; two lines starting with `1`/`2`
/// emit a 2-line record, three lines whose first is a name emit a 3-line
/// record. Blank lines flush the buffer. Per-record errors are collected
/// so one bad record never fails the batch.
pub fn parse_batch(text: &str) -> (Vec<Tle>, Vec<TleError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    let mut buf: Vec<&str> = Vec::new();

    let flush_incomplete = |buf: &mut Vec<&str>, errors: &mut Vec<TleError>| {
        if !buf.is_empty() {
            errors.push(TleError::Format {
                line: 0,
                reason: format!("incomplete record of {} line(s)", buf.len()),
            });
            buf.clear();
        }
    };

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            flush_incomplete(&mut buf, &mut errors);
            continue;
        }
        buf.push(line);

        if buf.len() == 2 && buf[0].starts_with('1') && buf[1].starts_with('2') {
            match Tle::parse(None, buf[0], buf[1]) {
                Ok(tle) => records.push(tle),
                Err(e) => errors.push(e),
            }
            buf.clear();
        } else if buf.len() == 3 {
            if !buf[0].starts_with('1') && !buf[0].starts_with('2') {
                match Tle::parse(Some(buf[0]), buf[1], buf[2]) {
                    Ok(tle) => records.push(tle),
                    Err(e) => errors.push(e),
                }
            } else {
                errors.push(TleError::Format {
                    line: 0,
                    reason: "three element lines without a name line".to_string(),
                });
            }
            buf.clear();
        }
    }
    flush_incomplete(&mut buf, &mut errors);

    (records, errors)
}

/// Modulo-10 checksum over the first 68 columns: digits count their value,
/// a minus sign counts 1, everything else counts 0.
pub fn line_checksum(line: &str) -> u32 {
    line.bytes()
        .take(68)
        .map(|b| match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'-' => 1,
            _ => 0,
        })
        .sum::<u32>()
        % 10
}

/// Decode a 5-column catalog number field, Alpha-5 aware.
///
/// A leading letter in {A–H, J–N, P–Z} contributes `value × 10 000` on top
/// of the remaining 4 digits; `I` and `O` are excluded from the alphabet.
pub fn parse_catalog_number(line: usize, field: &str) -> Result<u32, TleError> {
    let field_trim = field.trim();
    let mut chars = field_trim.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            let high = alpha5_value(c).ok_or_else(|| TleError::Alpha5Invalid(field_trim.to_string()))?;
            let low = chars.as_str();
            if low.len() != 4 || !low.bytes().all(|b| b.is_ascii_digit()) {
                return Err(TleError::Alpha5Invalid(field_trim.to_string()));
            }
            let low: u32 = low.parse().map_err(|_| TleError::Alpha5Invalid(field_trim.to_string()))?;
            Ok(high * 10_000 + low)
        }
        _ => field_trim.parse().map_err(|_| TleError::FieldNumeric {
            line,
            field: "catalog number",
            value: field.to_string(),
        }),
    }
}

/// Alpha-5 letter value: A=10 … Z=33, skipping I and O.
fn alpha5_value(c: char) -> Option<u32> {
    match c {
        'I' | 'O' => None,
        'A'..='H' => Some(10 + (c as u32 - 'A' as u32)),
        'J'..='N' => Some(18 + (c as u32 - 'J' as u32)),
        'P'..='Z' => Some(23 + (c as u32 - 'P' as u32)),
        _ => None,
    }
}

fn normalize_line(line_no: usize, line: &str) -> Result<&str, TleError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.is_ascii() {
        return Err(TleError::Format {
            line: line_no,
            reason: "non-ASCII characters".to_string(),
        });
    }
    if line.len() < 69 {
        return Err(TleError::LineTooShort {
            line: line_no,
            len: line.len(),
        });
    }
    Ok(&line[..69])
}

fn check_line_number(line_no: usize, expected: char, line: &str) -> Result<(), TleError> {
    let found = line.as_bytes()[0] as char;
    if found != expected {
        return Err(TleError::LineNumber {
            line: line_no,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_checksum(line_no: usize, line: &str) -> Result<(), TleError> {
    let computed = line_checksum(line);
    let found = line.as_bytes()[68] as char;
    if found.to_digit(10) != Some(computed) {
        return Err(TleError::Checksum {
            line: line_no,
            computed,
            found,
        });
    }
    Ok(())
}

fn parse_f64(line: usize, field: &'static str, s: &str) -> Result<f64, TleError> {
    s.trim().parse().map_err(|_| TleError::FieldNumeric {
        line,
        field,
        value: s.to_string(),
    })
}

fn parse_u32(line: usize, field: &'static str, s: &str) -> Result<u32, TleError> {
    s.trim().parse().map_err(|_| TleError::FieldNumeric {
        line,
        field,
        value: s.to_string(),
    })
}

/// Seven digits with an implicit leading `0.` (the eccentricity field).
fn parse_implicit_decimal(line: usize, field: &'static str, s: &str) -> Result<f64, TleError> {
    let digits = s.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TleError::FieldNumeric {
            line,
            field,
            value: s.to_string(),
        });
    }
    format!("0.{digits}").parse().map_err(|_| TleError::FieldNumeric {
        line,
        field,
        value: s.to_string(),
    })
}

/// Scientific mantissa field `[±]NNNNN±E`, meaning ±0.NNNNN × 10^±E.
fn parse_exp_field(line: usize, field: &'static str, s: &str) -> Result<f64, TleError> {
    let t = s.trim();
    if t.is_empty() {
        return Ok(0.0);
    }
    let err = || TleError::FieldNumeric {
        line,
        field,
        value: s.to_string(),
    };

    // The exponent sign is the last +/- past the leading mantissa sign.
    let idx = t.rfind(['+', '-']).filter(|&i| i > 0).ok_or_else(err)?;
    let (mantissa, exponent) = t.split_at(idx);
    let exponent: i32 = exponent.parse().map_err(|_| err())?;

    let negative = mantissa.starts_with('-');
    let digits = mantissa.trim_start_matches(['+', '-']).trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let value: f64 = format!("0.{digits}").parse().map_err(|_| err())?;

    Ok(if negative { -value } else { value } * 10f64.powi(exponent))
}

/// Epoch field: 2-digit year (57–99 → 19xx, 00–56 → 20xx) followed by a
/// fractional day of year, day 1.0 being Jan 1 00:00 UTC.
fn parse_epoch(line: usize, s: &str) -> Result<DateTime<Utc>, TleError> {
    let err = |value: &str| TleError::FieldNumeric {
        line,
        field: "epoch",
        value: value.to_string(),
    };

    let yy: i32 = s[..2].trim().parse().map_err(|_| err(s))?;
    let year = if yy >= 57 { 1900 + yy } else { 2000 + yy };
    let doy: f64 = s[2..].trim().parse().map_err(|_| err(s))?;
    if !(1.0..367.0).contains(&doy) {
        return Err(err(s));
    }

    let jan1 = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| err(s))?;
    let nanos = ((doy - 1.0) * 86_400.0 * 1e9).round() as i64;
    Ok(jan1 + Duration::nanoseconds(nanos))
}
