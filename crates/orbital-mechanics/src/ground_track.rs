//! Ground-track generation.
//!
//! Samples a propagator over an interval, projects each state to geodetic
//! longitude/latitude, splits the polyline wherever it crosses the ±180°
//! antimeridian and partitions the segments into past and future around a
//! wall-clock reference. The output shape is consumed directly by map
//! renderers.

use crate::propagation::Propagator;
use crate::transforms::eci_to_ecef;
use crate::{unix_millis, OrbitalError, Result, Tle};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default sampling step for [`generate_default`].
pub fn default_step() -> Duration {
    Duration::seconds(30)
}

/// One sub-satellite sample: degrees and Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lon: f64,
    pub lat: f64,
    pub ts: i64,
}

/// A ground track split into past and future polyline segments.
///
/// No segment crosses the antimeridian; crossings are closed and reopened
/// on interpolated ±180° boundary points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTrack {
    pub past: Vec<Vec<TrackPoint>>,
    pub future: Vec<Vec<TrackPoint>>,
    pub norad_id: u32,
}

impl GroundTrack {
    /// Total number of points across both partitions.
    pub fn point_count(&self) -> usize {
        self.past
            .iter()
            .chain(self.future.iter())
            .map(Vec::len)
            .sum()
    }
}

/// Generate a ground track for `[start, end]` sampled at `step`,
/// partitioned around `now`.
///
/// `end < start` is swapped silently; `start == end` is an empty range.
pub fn generate(
    tle: &Tle,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    step: Duration,
) -> Result<GroundTrack> {
    if start == end {
        return Err(OrbitalError::InvalidRange);
    }
    if step <= Duration::zero() {
        return Err(OrbitalError::InvalidStep);
    }
    let (start, end) = if end < start { (end, start) } else { (start, end) };

    let propagator = Propagator::from_tle(tle)?;
    let points = sample_points(&propagator, start, end, step)?;

    let segments = split_antimeridian(&points);
    let (past, future) = partition_past_future(segments, unix_millis(now));

    Ok(GroundTrack {
        past,
        future,
        norad_id: tle.norad_id,
    })
}

/// Generate the default track: `[now − P, now + 3P]` at a 30-second step,
/// with P the orbital period.
pub fn generate_default(tle: &Tle, now: DateTime<Utc>) -> Result<GroundTrack> {
    let period = Duration::milliseconds((tle.period_minutes() * 60_000.0) as i64);
    generate(tle, now - period, now + period * 3, now, default_step())
}

/// Raw sub-satellite samples over `[start, end]`, before any splitting.
///
/// Exposed separately so renderers can choose between the raw polyline
/// and the interpolated boundary points of [`split_antimeridian`]. A
/// per-step propagation failure truncates the sampling; if nothing was
/// collected the error is surfaced.
pub fn sample_points(
    propagator: &Propagator,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Result<Vec<TrackPoint>> {
    let (states, err) = propagator.propagate_range(start, end, step);
    if states.is_empty() {
        return Err(err.unwrap_or(OrbitalError::InvalidRange));
    }

    Ok(states
        .iter()
        .map(|state| {
            let geo = eci_to_ecef(&state.position()).geodetic();
            TrackPoint {
                lon: geo.longitude_deg(),
                lat: geo.latitude_deg(),
                ts: unix_millis(state.epoch),
            }
        })
        .collect())
}

/// Split a point list into segments that never cross ±180° longitude.
///
/// A jump of more than 270° between consecutive samples is a crossing:
/// the outgoing segment is closed on an interpolated boundary point at
/// ±180° and a new segment opens at ∓180° with the same latitude and
/// timestamp.
pub fn split_antimeridian(points: &[TrackPoint]) -> Vec<Vec<TrackPoint>> {
    let mut segments: Vec<Vec<TrackPoint>> = Vec::new();
    let mut current: Vec<TrackPoint> = Vec::new();

    for &point in points {
        if let Some(&prev) = current.last() {
            if (point.lon - prev.lon).abs() > 270.0 {
                // Unwrap the far side so the jump becomes continuous,
                // then solve linearly for the crossing.
                let (boundary, unwrapped) = if prev.lon > 0.0 {
                    (180.0, point.lon + 360.0)
                } else {
                    (-180.0, point.lon - 360.0)
                };
                let t = (boundary - prev.lon) / (unwrapped - prev.lon);
                let lat = prev.lat + t * (point.lat - prev.lat);
                let ts = prev.ts + (t * (point.ts - prev.ts) as f64).round() as i64;

                current.push(TrackPoint { lon: boundary, lat, ts });
                segments.push(std::mem::take(&mut current));
                current.push(TrackPoint { lon: -boundary, lat, ts });
            }
        }
        current.push(point);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Partition segments around `now_ms`.
///
/// A segment ending before `now_ms` is past; one starting at or after it
/// is future; a straddling segment is cut at the first sample with
/// `ts >= now_ms`.
fn partition_past_future(
    segments: Vec<Vec<TrackPoint>>,
    now_ms: i64,
) -> (Vec<Vec<TrackPoint>>, Vec<Vec<TrackPoint>>) {
    let mut past = Vec::new();
    let mut future = Vec::new();

    for segment in segments {
        let (first, last) = match (segment.first(), segment.last()) {
            (Some(f), Some(l)) => (f.ts, l.ts),
            _ => continue,
        };
        if last < now_ms {
            past.push(segment);
        } else if first >= now_ms {
            future.push(segment);
        } else {
            let cut = segment
                .iter()
                .position(|p| p.ts >= now_ms)
                .unwrap_or(segment.len());
            let (left, right) = segment.split_at(cut);
            if !left.is_empty() {
                past.push(left.to_vec());
            }
            if !right.is_empty() {
                future.push(right.to_vec());
            }
        }
    }
    (past, future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ISS_L1: &str = "1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9997";
    const ISS_L2: &str = "2 25544  51.6400 247.4627 0006703 130.5360 325.0288 15.49815571423401";

    fn iss() -> Tle {
        Tle::parse(Some("ISS (ZARYA)"), ISS_L1, ISS_L2).unwrap()
    }

    fn pt(lon: f64, lat: f64, ts: i64) -> TrackPoint {
        TrackPoint { lon, lat, ts }
    }

    #[test]
    fn splits_eastward_crossing() {
        let points = [
            pt(170.0, 10.0, 1000),
            pt(175.0, 11.0, 2000),
            pt(-175.0, 13.0, 3000),
            pt(-170.0, 14.0, 4000),
        ];
        let segments = split_antimeridian(&points);
        assert_eq!(segments.len(), 2);

        let out = segments[0].last().unwrap();
        let incoming = segments[1].first().unwrap();
        assert_eq!(out.lon, 180.0);
        assert_eq!(incoming.lon, -180.0);
        // crossing halfway between samples 2 and 3
        assert!((out.lat - 12.0).abs() < 1e-3);
        assert!((incoming.lat - out.lat).abs() < 1e-3);
        assert_eq!(out.ts, 2500);
        assert_eq!(incoming.ts, out.ts);

        assert_eq!(segments[0].len(), 3);
        assert_eq!(segments[1].len(), 3);
    }

    #[test]
    fn splits_westward_crossing() {
        let points = [
            pt(-175.0, -5.0, 0),
            pt(175.0, -7.0, 1000),
        ];
        let segments = split_antimeridian(&points);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].last().unwrap().lon, -180.0);
        assert_eq!(segments[1].first().unwrap().lon, 180.0);
        assert!((segments[0].last().unwrap().lat + 6.0).abs() < 1e-9);
    }

    #[test]
    fn no_split_for_small_jumps() {
        let points = [pt(-130.0, 0.0, 0), pt(130.0, 5.0, 1000)];
        // 260° < 270°, treated as an ordinary (if ugly) jump
        assert_eq!(split_antimeridian(&points).len(), 1);
    }

    #[test]
    fn segments_never_jump_within() {
        let points: Vec<TrackPoint> = (0..200)
            .map(|i| {
                let lon = ((i as f64) * 7.3 + 100.0).rem_euclid(360.0) - 180.0;
                pt(lon, (i % 90) as f64 - 45.0, i64::from(i) * 1000)
            })
            .collect();
        for segment in split_antimeridian(&points) {
            for w in segment.windows(2) {
                assert!((w[1].lon - w[0].lon).abs() < 270.0);
            }
        }
    }

    #[test]
    fn partition_cuts_straddling_segment() {
        let segments = vec![vec![
            pt(0.0, 0.0, 1000),
            pt(1.0, 0.0, 2000),
            pt(2.0, 0.0, 3000),
            pt(3.0, 0.0, 4000),
        ]];
        let (past, future) = partition_past_future(segments, 2500);
        assert_eq!(past.len(), 1);
        assert_eq!(future.len(), 1);
        assert_eq!(past[0].len(), 2);
        assert_eq!(future[0].len(), 2);
        assert!(past[0].iter().all(|p| p.ts < 2500));
        assert!(future[0].iter().all(|p| p.ts >= 2500));
    }

    #[test]
    fn partition_whole_segments() {
        let segments = vec![
            vec![pt(0.0, 0.0, 0), pt(1.0, 0.0, 1000)],
            vec![pt(2.0, 0.0, 5000), pt(3.0, 0.0, 6000)],
        ];
        let (past, future) = partition_past_future(segments, 3000);
        assert_eq!(past.len(), 1);
        assert_eq!(future.len(), 1);
    }

    #[test]
    fn rejects_empty_range_and_bad_step() {
        let tle = iss();
        let now = tle.epoch;
        assert!(matches!(
            generate(&tle, now, now, now, Duration::seconds(30)),
            Err(OrbitalError::InvalidRange)
        ));
        assert!(matches!(
            generate(&tle, now, now + Duration::hours(1), now, Duration::zero()),
            Err(OrbitalError::InvalidStep)
        ));
    }

    #[test]
    fn swaps_reversed_interval() {
        let tle = iss();
        let now = tle.epoch;
        let track = generate(
            &tle,
            now + Duration::minutes(30),
            now,
            now,
            Duration::seconds(30),
        )
        .unwrap();
        assert!(track.point_count() > 0);
    }

    #[test]
    fn default_track_shape() {
        let tle = iss();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let track = generate_default(&tle, now).unwrap();

        // 4 orbital periods at 30 s ≈ 743 samples, plus boundary points
        let total = track.point_count();
        assert!((700..=800).contains(&total), "total {total}");

        // inclination bounds the latitude
        for p in track.past.iter().chain(track.future.iter()).flatten() {
            assert!(p.lat.abs() <= 53.0, "lat {}", p.lat);
            assert!((-180.0..=180.0).contains(&p.lon));
        }

        assert!(!track.past.is_empty());
        assert!(!track.future.is_empty());
        assert_eq!(track.norad_id, 25544);

        // time-ordered across the partition boundary
        let mut last_ts = i64::MIN;
        for p in track.past.iter().chain(track.future.iter()).flatten() {
            assert!(p.ts >= last_ts);
            last_ts = p.ts;
        }
    }

    #[test]
    fn json_shape_matches_renderer_contract() {
        let track = GroundTrack {
            past: vec![vec![pt(10.0, 20.0, 1000)]],
            future: vec![],
            norad_id: 25544,
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["norad_id"], 25544);
        assert_eq!(json["past"][0][0]["lon"], 10.0);
        assert_eq!(json["past"][0][0]["lat"], 20.0);
        assert_eq!(json["past"][0][0]["ts"], 1000);
        assert!(json["future"].as_array().unwrap().is_empty());
    }
}
