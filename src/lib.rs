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

//! Library for converting location-history exports (JSON) to
//! [GPX](https://www.topografix.com/gpx.asp).
//!
//! Activity segments, i.e. movements from one place to another, become GPX
//! routes. Raw location samples become GPX tracks. Output can be split into
//! one file per day or month.
//!
//! The conversion runs in three stages: [`loader`] reads the export,
//! [`normalize`] validates and groups the points, and [`writer`] serializes
//! the groups. [`export`] runs all of them from file to directory, [`convert`]
//! works in memory.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use gpx::errors::GpxError;
use thiserror::Error;
use tracing::info;

pub mod loader;
pub mod normalize;
pub mod options;
pub mod writer;

pub use loader::InputError;
pub use normalize::SkipReport;
pub use options::{DateRange, DayBoundary, ExportOptions, Format, Grouping, Kind};
pub use writer::WriteError;

/// Error returned from [`export`] and [`convert`].
#[derive(Error, Debug)]
pub enum Error {
    /// The export could not be loaded.
    #[error("loading location history failed: {0}")]
    Input(#[from] InputError),
    /// The output directory could not be created.
    #[error(transparent)]
    Write(#[from] WriteError),
    /// GPX writing failed.
    #[error("writing GPX failed: {0}")]
    Gpx(#[from] GpxError),
}

/// Outcome of a successful [`export`].
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub skipped: SkipReport,
    /// Number of exported routes.
    pub routes: usize,
    /// Number of exported track points.
    pub track_points: usize,
    /// Files written successfully.
    pub written: Vec<PathBuf>,
    /// Files which could not be written.
    pub failures: Vec<WriteError>,
}

/// Convert the export at `input` to GPX files in `output_dir`.
///
/// Loading failures and failing to create `output_dir` abort the export.
/// Everything else is reported in the returned [`ExportSummary`].
pub fn export(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &ExportOptions,
) -> Result<ExportSummary, Error> {
    let records = loader::load_file(input)?;
    let grouped = normalize::group(records, options);
    info!(
        routes = grouped.route_count(),
        track_points = grouped.track_point_count(),
        skipped = grouped.skipped.total(),
        "normalized location history"
    );

    let summary = writer::write_buckets(&grouped, output_dir.as_ref(), options.format)?;
    Ok(ExportSummary {
        skipped: grouped.skipped,
        routes: grouped.route_count(),
        track_points: grouped.track_point_count(),
        written: summary.written,
        failures: summary.failures,
    })
}

/// Read an export and write all its points of `kind` as one GPX document.
///
/// A complete export is read from `source`. A complete GPX file is written to
/// `sink`, even if it contains no routes or tracks.
///
/// If an error occurs, the function returns immediately. The `source` and
/// `sink` might have been modified in this case.
///
/// # Example
/// ```
/// # use timeline_gpx::{convert, Kind};
/// #
/// let source = r#"{"semanticSegments": [
///     {"startTime": "2024-01-01T08:00:00Z", "endTime": "2024-01-01T08:30:00Z",
///      "activity": {"start": {"latLng": "52.0°, 4.0°"},
///                   "end": {"latLng": "52.1°, 4.2°"},
///                   "topCandidate": {"type": "CYCLING"}}}
/// ]}"#;
/// let mut sink = vec![];
///
/// let skipped = convert(source.as_bytes(), Kind::Route, &mut sink).expect("conversion failed");
///
/// let gpx = String::from_utf8(sink).expect("GPX data is not valid UTF-8");
/// assert_eq!(skipped.total(), 0);
/// assert!(gpx.contains("<rte>"));
/// assert!(gpx.contains("CYCLING 08:00"));
/// ```
pub fn convert(source: impl Read, kind: Kind, sink: impl io::Write) -> Result<SkipReport, Error> {
    let records = loader::load(source)?;
    let options = ExportOptions {
        format: match kind {
            Kind::Route => Format::Routes,
            Kind::Track => Format::Tracks,
        },
        ..Default::default()
    };
    let grouped = normalize::group(records, &options);

    let stem = kind.plural();
    let gpx = match grouped.buckets.values().next() {
        Some(bucket) => writer::bucket_to_gpx(stem, bucket, kind),
        None => writer::empty_gpx(),
    };
    writer::write_gpx(&gpx, sink)?;

    Ok(grouped.skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH_ONLY: &str = r#"{"semanticSegments": [
        {"startTime": "2024-01-01T10:00:00Z", "endTime": "2024-01-01T11:00:00Z",
         "timelinePath": [
            {"point": "52.0°, 4.0°", "time": "2024-01-01T10:00:00Z"},
            {"point": "52.1°, 4.1°", "time": "2024-01-01T10:05:00Z"}
         ]}
    ]}"#;

    fn convert_to_string(source: &str, kind: Kind) -> (SkipReport, String) {
        let mut sink = vec![];
        let skipped = convert(source.as_bytes(), kind, &mut sink).unwrap();
        (skipped, String::from_utf8(sink).unwrap())
    }

    #[test]
    fn convert_without_matching_kind_writes_empty_document() {
        let (skipped, xml) = convert_to_string(PATH_ONLY, Kind::Route);

        assert_eq!(skipped.total(), 0);
        assert!(xml.contains("<gpx"));
        assert!(!xml.contains("<rte"));
        assert!(!xml.contains("<trk"));
        let gpx = gpx::read(xml.as_bytes()).unwrap();
        assert!(gpx.routes.is_empty());
        assert!(gpx.tracks.is_empty());
    }

    #[test]
    fn convert_tracks() {
        let (skipped, xml) = convert_to_string(PATH_ONLY, Kind::Track);

        assert_eq!(skipped.total(), 0);
        assert_eq!(xml.matches("<trk>").count(), 1);
        assert_eq!(xml.matches("<trkseg>").count(), 1);
        let gpx = gpx::read(xml.as_bytes()).unwrap();
        assert_eq!(gpx.tracks[0].name.as_deref(), Some("Track tracks"));
        assert_eq!(gpx.tracks[0].segments[0].points.len(), 2);
    }

    #[test]
    fn convert_invalid_input() {
        let mut sink = vec![];

        let err = convert("not json".as_bytes(), Kind::Track, &mut sink).unwrap_err();

        assert!(matches!(err, Error::Input(InputError::Json(_))));
        assert!(sink.is_empty());
    }
}
