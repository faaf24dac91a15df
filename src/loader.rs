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

//! Reading location-history exports into [`RawRecord`]s.
//!
//! Three export layouts are understood, distinguished by their top-level key:
//! `semanticSegments` (on-device Timeline), `timelineObjects` (Semantic
//! Location History) and `locations` (Records.json).

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Error returned when an export cannot be loaded at all.
#[derive(Error, Debug)]
pub enum InputError {
    /// The input file could not be opened.
    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    /// Reading the input failed.
    #[error("reading input failed: {0}")]
    Read(#[source] io::Error),
    /// The input is not valid JSON or has an invalid top-level structure.
    #[error("input is not a valid location history: {0}")]
    Json(#[from] serde_json::Error),
    /// None of the known container keys is present.
    #[error("input contains no semanticSegments, timelineObjects or locations")]
    MissingContainer,
}

/// Coordinate as found in the source, not yet validated.
#[derive(Clone, Debug, PartialEq)]
pub enum RawCoordinate {
    /// Text like `52.0°, 4.0°`.
    Degrees(String),
    /// Degrees multiplied by 1e7.
    ScaledE7 { lat: i64, lng: i64 },
}

/// One timestamped location as found in the source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawSample {
    pub coordinate: Option<RawCoordinate>,
    pub time: Option<String>,
}

/// A movement from one location to another.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivitySegment {
    pub start: RawSample,
    pub end: RawSample,
    pub activity_type: Option<String>,
    pub distance_meters: Option<f64>,
}

/// An ordered sequence of raw location samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawPath {
    pub samples: Vec<RawSample>,
}

/// A single history entry, classified by its shape.
#[derive(Clone, Debug, PartialEq)]
pub enum RawRecord {
    ActivitySegment(ActivitySegment),
    RawPath(RawPath),
    /// Entries without movement data, like place visits, or malformed ones.
    Unrecognized,
}

/// Load an export from the file at `path`.
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<RawRecord>, InputError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| InputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    load(file)
}

/// Load a complete export from `source`.
///
/// The load either succeeds completely or fails. Individual entries that do
/// not match their expected shape become [`RawRecord::Unrecognized`].
///
/// # Example
/// ```
/// # use timeline_gpx::loader::{load, RawRecord};
/// #
/// let source = r#"{"semanticSegments": [
///     {"startTime": "2024-01-01T08:00:00Z", "endTime": "2024-01-01T08:30:00Z",
///      "activity": {"start": {"latLng": "52.0°, 4.0°"},
///                   "end": {"latLng": "52.1°, 4.2°"}}}
/// ]}"#;
///
/// let records = load(source.as_bytes()).expect("load failed");
/// assert!(matches!(records[..], [RawRecord::ActivitySegment(_)]));
/// ```
pub fn load(mut source: impl Read) -> Result<Vec<RawRecord>, InputError> {
    let mut buffer = vec![];
    source.read_to_end(&mut buffer).map_err(InputError::Read)?;
    let export: Export = serde_json::from_slice(&buffer)?;

    let mut records = vec![];
    let mut found = false;
    if let Some(segments) = export.semantic_segments {
        found = true;
        for segment in segments {
            push_semantic_segment(segment, &mut records);
        }
    }
    if let Some(objects) = export.timeline_objects {
        found = true;
        for object in objects {
            push_timeline_object(object, &mut records);
        }
    }
    if let Some(locations) = export.locations {
        found = true;
        records.push(convert_locations(locations));
    }
    if !found {
        return Err(InputError::MissingContainer);
    }

    debug!(records = records.len(), "loaded location history");
    Ok(records)
}

/// Top-level layout of all supported exports.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Export {
    semantic_segments: Option<Vec<Value>>,
    timeline_objects: Option<Vec<Value>>,
    locations: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SemanticSegment {
    start_time: Option<String>,
    end_time: Option<String>,
    activity: Option<SemanticActivity>,
    #[serde(default)]
    timeline_path: Vec<PathPoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SemanticActivity {
    start: Option<LatLng>,
    end: Option<LatLng>,
    top_candidate: Option<TopCandidate>,
    distance_meters: Option<f64>,
}

/// Locations appear both as plain text and wrapped in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum LatLng {
    Text(String),
    Nested {
        #[serde(rename = "latLng")]
        lat_lng: String,
    },
}

impl LatLng {
    fn into_coordinate(self) -> RawCoordinate {
        match self {
            LatLng::Text(text) | LatLng::Nested { lat_lng: text } => RawCoordinate::Degrees(text),
        }
    }
}

#[derive(Deserialize)]
struct TopCandidate {
    #[serde(rename = "type")]
    typ: Option<String>,
}

#[derive(Deserialize)]
struct PathPoint {
    point: Option<String>,
    time: Option<String>,
}

/// Convert one `semanticSegments` entry.
///
/// A segment can contain both an activity and a path, yielding two records.
fn push_semantic_segment(value: Value, records: &mut Vec<RawRecord>) {
    let segment = match serde_json::from_value::<SemanticSegment>(value) {
        Ok(segment) => segment,
        Err(err) => {
            debug!(%err, "unrecognized semantic segment");
            records.push(RawRecord::Unrecognized);
            return;
        }
    };

    let mut recognized = false;
    if let Some(activity) = segment.activity {
        recognized = true;
        records.push(RawRecord::ActivitySegment(ActivitySegment {
            start: RawSample {
                coordinate: activity.start.map(LatLng::into_coordinate),
                time: segment.start_time,
            },
            end: RawSample {
                coordinate: activity.end.map(LatLng::into_coordinate),
                time: segment.end_time,
            },
            activity_type: activity.top_candidate.and_then(|c| c.typ),
            distance_meters: activity.distance_meters,
        }));
    }
    if !segment.timeline_path.is_empty() {
        recognized = true;
        let samples = segment
            .timeline_path
            .into_iter()
            .map(|p| RawSample {
                coordinate: p.point.map(RawCoordinate::Degrees),
                time: p.time,
            })
            .collect();
        records.push(RawRecord::RawPath(RawPath { samples }));
    }
    if !recognized {
        records.push(RawRecord::Unrecognized);
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineObject {
    activity_segment: Option<LegacyActivity>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyActivity {
    start_location: Option<E7Location>,
    end_location: Option<E7Location>,
    duration: Option<LegacyDuration>,
    activity_type: Option<String>,
    distance: Option<f64>,
    simplified_raw_path: Option<SimplifiedRawPath>,
}

#[derive(Deserialize)]
struct E7Location {
    #[serde(rename = "latitudeE7")]
    latitude_e7: Option<i64>,
    #[serde(rename = "longitudeE7")]
    longitude_e7: Option<i64>,
}

impl E7Location {
    fn into_coordinate(self) -> Option<RawCoordinate> {
        Some(RawCoordinate::ScaledE7 {
            lat: self.latitude_e7?,
            lng: self.longitude_e7?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDuration {
    start_timestamp: Option<String>,
    end_timestamp: Option<String>,
}

#[derive(Deserialize)]
struct SimplifiedRawPath {
    #[serde(default)]
    points: Vec<E7PathPoint>,
}

#[derive(Deserialize)]
struct E7PathPoint {
    #[serde(rename = "latE7")]
    lat_e7: Option<i64>,
    #[serde(rename = "lngE7")]
    lng_e7: Option<i64>,
    timestamp: Option<String>,
}

/// Convert one `timelineObjects` entry.
fn push_timeline_object(value: Value, records: &mut Vec<RawRecord>) {
    let activity = match serde_json::from_value::<TimelineObject>(value) {
        Ok(TimelineObject {
            activity_segment: Some(activity),
        }) => activity,
        Ok(_) => {
            records.push(RawRecord::Unrecognized);
            return;
        }
        Err(err) => {
            debug!(%err, "unrecognized timeline object");
            records.push(RawRecord::Unrecognized);
            return;
        }
    };

    let (start_time, end_time) = activity
        .duration
        .map(|d| (d.start_timestamp, d.end_timestamp))
        .unwrap_or_default();
    records.push(RawRecord::ActivitySegment(ActivitySegment {
        start: RawSample {
            coordinate: activity.start_location.and_then(E7Location::into_coordinate),
            time: start_time,
        },
        end: RawSample {
            coordinate: activity.end_location.and_then(E7Location::into_coordinate),
            time: end_time,
        },
        activity_type: activity.activity_type,
        distance_meters: activity.distance,
    }));

    if let Some(path) = activity.simplified_raw_path.filter(|p| !p.points.is_empty()) {
        let samples = path
            .points
            .into_iter()
            .map(|p| RawSample {
                coordinate: p
                    .lat_e7
                    .zip(p.lng_e7)
                    .map(|(lat, lng)| RawCoordinate::ScaledE7 { lat, lng }),
                time: p.timestamp,
            })
            .collect();
        records.push(RawRecord::RawPath(RawPath { samples }));
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordsLocation {
    #[serde(rename = "latitudeE7")]
    latitude_e7: Option<i64>,
    #[serde(rename = "longitudeE7")]
    longitude_e7: Option<i64>,
    timestamp: Option<String>,
}

/// Convert the Records.json `locations` array into a single path.
///
/// Malformed entries are kept as empty samples so that they are counted when
/// normalizing.
fn convert_locations(locations: Vec<Value>) -> RawRecord {
    let samples = locations
        .into_iter()
        .map(|value| match serde_json::from_value::<RecordsLocation>(value) {
            Ok(location) => RawSample {
                coordinate: location
                    .latitude_e7
                    .zip(location.longitude_e7)
                    .map(|(lat, lng)| RawCoordinate::ScaledE7 { lat, lng }),
                time: location.timestamp,
            },
            Err(_) => RawSample::default(),
        })
        .collect();
    RawRecord::RawPath(RawPath { samples })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_segments() {
        let source = r#"{"semanticSegments": [
            {"startTime": "2024-01-01T08:00:00.000+01:00",
             "endTime": "2024-01-01T08:30:00.000+01:00",
             "activity": {"start": {"latLng": "52.0°, 4.0°"}, "end": "52.1°, 4.2°",
                          "distanceMeters": 1234.5,
                          "topCandidate": {"type": "CYCLING", "probability": 0.9}}},
            {"startTime": "2024-01-01T10:00:00.000+01:00",
             "endTime": "2024-01-01T12:00:00.000+01:00",
             "timelinePath": [{"point": "52.0°, 4.0°", "time": "2024-01-01T10:01:00.000+01:00"}]},
            {"startTime": "2024-01-01T12:00:00.000+01:00",
             "endTime": "2024-01-01T13:00:00.000+01:00",
             "visit": {"topCandidate": {"placeId": "x"}}}
        ]}"#;

        let records = load(source.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            RawRecord::ActivitySegment(ActivitySegment {
                start: RawSample {
                    coordinate: Some(RawCoordinate::Degrees("52.0°, 4.0°".to_string())),
                    time: Some("2024-01-01T08:00:00.000+01:00".to_string()),
                },
                end: RawSample {
                    coordinate: Some(RawCoordinate::Degrees("52.1°, 4.2°".to_string())),
                    time: Some("2024-01-01T08:30:00.000+01:00".to_string()),
                },
                activity_type: Some("CYCLING".to_string()),
                distance_meters: Some(1234.5),
            })
        );
        match &records[1] {
            RawRecord::RawPath(path) => assert_eq!(path.samples.len(), 1),
            other => panic!("expected path, got {other:?}"),
        }
        assert_eq!(records[2], RawRecord::Unrecognized);
    }

    #[test]
    fn timeline_objects() {
        let source = r#"{"timelineObjects": [
            {"activitySegment": {
                "startLocation": {"latitudeE7": 520000000, "longitudeE7": 40000000},
                "endLocation": {"latitudeE7": 521000000, "longitudeE7": 42000000},
                "duration": {"startTimestamp": "2024-01-01T08:00:00Z",
                             "endTimestamp": "2024-01-01T08:30:00Z"},
                "activityType": "WALKING",
                "simplifiedRawPath": {"points": [
                    {"latE7": 520500000, "lngE7": 41000000, "timestamp": "2024-01-01T08:15:00Z"}
                ]}}},
            {"placeVisit": {"location": {"latitudeE7": 1, "longitudeE7": 2}}}
        ]}"#;

        let records = load(source.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        match &records[0] {
            RawRecord::ActivitySegment(segment) => {
                assert_eq!(
                    segment.start.coordinate,
                    Some(RawCoordinate::ScaledE7 {
                        lat: 520000000,
                        lng: 40000000
                    })
                );
                assert_eq!(segment.end.time.as_deref(), Some("2024-01-01T08:30:00Z"));
                assert_eq!(segment.activity_type.as_deref(), Some("WALKING"));
            }
            other => panic!("expected activity segment, got {other:?}"),
        }
        assert!(matches!(&records[1], RawRecord::RawPath(p) if p.samples.len() == 1));
        assert_eq!(records[2], RawRecord::Unrecognized);
    }

    #[test]
    fn records_locations() {
        let source = r#"{"locations": [
            {"latitudeE7": 520000000, "longitudeE7": 40000000, "timestamp": "2024-01-01T08:00:00Z"},
            {"latitudeE7": "bogus"}
        ]}"#;

        let records = load(source.as_bytes()).unwrap();

        match &records[..] {
            [RawRecord::RawPath(path)] => {
                assert_eq!(path.samples.len(), 2);
                assert_eq!(path.samples[1], RawSample::default());
            }
            other => panic!("expected a single path, got {other:?}"),
        }
    }

    #[test]
    fn malformed_entry_is_unrecognized() {
        let source = r#"{"semanticSegments": [{"timelinePath": 5}]}"#;
        let records = load(source.as_bytes()).unwrap();
        assert_eq!(records, vec![RawRecord::Unrecognized]);
    }

    #[test]
    fn missing_container() {
        let err = load(r#"{"something": []}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, InputError::MissingContainer));
    }

    #[test]
    fn invalid_json() {
        let err = load(r#"{"semanticSegments": ["#.as_bytes()).unwrap_err();
        assert!(matches!(err, InputError::Json(_)));
    }

    #[test]
    fn missing_file() {
        let err = load_file("/nonexistent/Timeline.json").unwrap_err();
        assert!(matches!(err, InputError::Open { .. }));
    }
}
