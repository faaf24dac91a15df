// Copyright 2024 Viktor Reusch
//
// This file is part of timeline_gpx.
//
// timeline_gpx is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// timeline_gpx is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with timeline_gpx. If not, see <https://www.gnu.org/licenses/>.

//! Validation of raw records and grouping of the resulting points.

use std::collections::BTreeMap;

use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime, UtcOffset};
use tracing::debug;

use crate::loader::{ActivitySegment, RawCoordinate, RawPath, RawRecord, RawSample};
use crate::options::{DayBoundary, ExportOptions, Grouping, Kind};

/// Divisor for coordinates stored as scaled integers.
const E7: f64 = 1e7;
/// Activity type of segments which do not name one.
const UNKNOWN_ACTIVITY: &str = "UNKNOWN";

/// A validated location with an absolute UTC timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
    pub time: OffsetDateTime,
}

/// A movement between two points, written as `<rte>`.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteEntry {
    pub start: Point,
    pub end: Point,
    /// Name like `CYCLING 08:00`.
    pub name: String,
    /// `UNKNOWN` if the source names no type.
    pub activity_type: String,
    pub distance_meters: Option<f64>,
}

impl RouteEntry {
    /// Description like `1.2 km - CYCLING`, or just the type without a
    /// positive distance.
    pub fn description(&self) -> String {
        match self.distance_meters.filter(|&d| d > 0.0) {
            Some(distance) => format!("{:.1} km - {}", distance / 1000.0, self.activity_type),
            None => self.activity_type.clone(),
        }
    }
}

/// Key of a group of points which is written to its own files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    /// Everything, when grouping is disabled.
    All,
    Month { year: i32, month: u8 },
    Day(Date),
}

impl BucketKey {
    fn new(grouping: Grouping, day: Date) -> Self {
        match grouping {
            Grouping::Combined => BucketKey::All,
            Grouping::Daily => BucketKey::Day(day),
            Grouping::Monthly => BucketKey::Month {
                year: day.year(),
                month: day.month().into(),
            },
        }
    }

    /// `YYYY-MM-DD` or `YYYY-MM`, and [`None`] for [`BucketKey::All`].
    pub fn label(&self) -> Option<String> {
        match self {
            BucketKey::All => None,
            BucketKey::Month { year, month } => Some(format!("{year:04}-{month:02}")),
            BucketKey::Day(day) => Some(format!(
                "{:04}-{:02}-{:02}",
                day.year(),
                u8::from(day.month()),
                day.day()
            )),
        }
    }
}

/// Routes and track points sharing one [`BucketKey`], in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DayBucket {
    pub routes: Vec<RouteEntry>,
    pub track: Vec<Point>,
}

impl DayBucket {
    pub fn is_empty(&self, kind: Kind) -> bool {
        match kind {
            Kind::Route => self.routes.is_empty(),
            Kind::Track => self.track.is_empty(),
        }
    }
}

/// Counts of source data dropped during normalization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkipReport {
    /// Records of unknown shape.
    pub unrecognized: usize,
    /// Activity segments with a missing or invalid start or end.
    pub invalid_segments: usize,
    /// Path samples with a missing or invalid coordinate or timestamp.
    pub invalid_samples: usize,
}

impl SkipReport {
    pub fn total(&self) -> usize {
        self.unrecognized + self.invalid_segments + self.invalid_samples
    }
}

/// Result of [`group`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grouped {
    pub buckets: BTreeMap<BucketKey, DayBucket>,
    pub skipped: SkipReport,
}

impl Grouped {
    pub fn route_count(&self) -> usize {
        self.buckets.values().map(|b| b.routes.len()).sum()
    }

    pub fn track_point_count(&self) -> usize {
        self.buckets.values().map(|b| b.track.len()).sum()
    }
}

/// Validate `records` and group them into buckets according to `options`.
///
/// Activity segments are bucketed by their start day, path samples each by
/// their own day. Kinds excluded by the format are ignored entirely, and so
/// are points outside the date range.
pub fn group(records: impl IntoIterator<Item = RawRecord>, options: &ExportOptions) -> Grouped {
    let mut grouped = Grouped::default();

    for record in records {
        match record {
            RawRecord::ActivitySegment(segment) => {
                if options.format.includes(Kind::Route) {
                    group_segment(segment, options, &mut grouped);
                }
            }
            RawRecord::RawPath(path) => {
                if options.format.includes(Kind::Track) {
                    group_path(path, options, &mut grouped);
                }
            }
            RawRecord::Unrecognized => grouped.skipped.unrecognized += 1,
        }
    }

    debug!(
        buckets = grouped.buckets.len(),
        skipped = grouped.skipped.total(),
        "grouped records"
    );
    grouped
}

fn group_segment(segment: ActivitySegment, options: &ExportOptions, grouped: &mut Grouped) {
    let (start, start_local) = match normalize_sample(&segment.start, options.day_boundary) {
        Some(start) => start,
        None => {
            debug!(start = ?segment.start, "skipping segment with invalid start");
            grouped.skipped.invalid_segments += 1;
            return;
        }
    };
    let end = match normalize_sample(&segment.end, options.day_boundary) {
        Some((end, _)) if end.time >= start.time => end,
        _ => {
            debug!(end = ?segment.end, "skipping segment with invalid end");
            grouped.skipped.invalid_segments += 1;
            return;
        }
    };

    let day = start_local.date();
    if !options.date_range.contains(day) {
        return;
    }

    let activity_type = segment
        .activity_type
        .unwrap_or_else(|| UNKNOWN_ACTIVITY.to_string());
    let name = format!(
        "{activity_type} {:02}:{:02}",
        start_local.hour(),
        start_local.minute()
    );
    grouped
        .buckets
        .entry(BucketKey::new(options.grouping, day))
        .or_default()
        .routes
        .push(RouteEntry {
            start,
            end,
            name,
            activity_type,
            distance_meters: segment.distance_meters,
        });
}

fn group_path(path: RawPath, options: &ExportOptions, grouped: &mut Grouped) {
    for sample in &path.samples {
        let Some((point, local)) = normalize_sample(sample, options.day_boundary) else {
            debug!(?sample, "skipping invalid path sample");
            grouped.skipped.invalid_samples += 1;
            continue;
        };

        let day = local.date();
        if !options.date_range.contains(day) {
            continue;
        }
        grouped
            .buckets
            .entry(BucketKey::new(options.grouping, day))
            .or_default()
            .track
            .push(point);
    }
}

/// Validate a sample.
///
/// Returns the point with a UTC timestamp together with the timestamp in the
/// zone selected by `boundary`.
fn normalize_sample(sample: &RawSample, boundary: DayBoundary) -> Option<(Point, OffsetDateTime)> {
    let (latitude, longitude) = parse_coordinate(sample.coordinate.as_ref()?)?;
    let source = OffsetDateTime::parse(sample.time.as_deref()?, &Rfc3339).ok()?;
    let time = source.to_offset(UtcOffset::UTC);
    let local = match boundary {
        DayBoundary::Utc => time,
        DayBoundary::Source => source,
    };

    Some((
        Point {
            latitude,
            longitude,
            time,
        },
        local,
    ))
}

/// Parse and range-check a coordinate, returning `(latitude, longitude)`.
pub fn parse_coordinate(coordinate: &RawCoordinate) -> Option<(f64, f64)> {
    let (lat, lon) = match coordinate {
        RawCoordinate::Degrees(text) => {
            let mut parts = text.split(',');
            let lat = parse_degrees(parts.next()?)?;
            let lon = parse_degrees(parts.next()?)?;
            if parts.next().is_some() {
                return None;
            }
            (lat, lon)
        }
        RawCoordinate::ScaledE7 { lat, lng } => (*lat as f64 / E7, *lng as f64 / E7),
    };

    // Also rejects NaN.
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Some((lat, lon))
    } else {
        None
    }
}

/// Parse a single value like `52.0°`.
fn parse_degrees(text: &str) -> Option<f64> {
    text.trim().trim_end_matches('°').trim_end().parse().ok()
}
