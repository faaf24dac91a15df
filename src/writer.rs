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

//! Serialization of grouped points as [GPX](https://www.topografix.com/gpx.asp)
//! files.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gpx::{errors::GpxError, Gpx, GpxVersion, Route, Track, TrackSegment, Waypoint};
use thiserror::Error;
use tracing::{info, warn};

use crate::normalize::{BucketKey, DayBucket, Grouped, Point, RouteEntry};
use crate::options::{Format, Kind};

/// Value of the `creator` attribute of every written document.
pub const CREATOR: &str = "timeline-gpx";
/// Extension of all written files.
const EXTENSION: &str = "gpx";

/// Error for a single output file or the output directory.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot create output directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("cannot create {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },
    #[error("serializing {} failed: {source}", path.display())]
    Serialize { path: PathBuf, source: GpxError },
    #[error("writing {} failed: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Outcome of [`write_buckets`].
#[derive(Debug, Default)]
pub struct WriteSummary {
    /// Files written successfully, in order.
    pub written: Vec<PathBuf>,
    /// Files which could not be written.
    pub failures: Vec<WriteError>,
}

/// Write one file per bucket and kind included in `format` into `dir`.
///
/// The directory is created if necessary; failing to do so is the only fatal
/// error. Existing files are overwritten. A failing file does not stop the
/// remaining ones, its error is collected in the returned summary instead.
/// Pairs of bucket and kind without any points produce no file.
pub fn write_buckets(
    grouped: &Grouped,
    dir: &Path,
    format: Format,
) -> Result<WriteSummary, WriteError> {
    fs::create_dir_all(dir).map_err(|source| WriteError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut summary = WriteSummary::default();
    for (key, bucket) in &grouped.buckets {
        for kind in [Kind::Route, Kind::Track] {
            if !format.includes(kind) || bucket.is_empty(kind) {
                continue;
            }

            let stem = file_stem(key, kind, format);
            let path = dir.join(format!("{stem}.{EXTENSION}"));
            let gpx = bucket_to_gpx(&stem, bucket, kind);
            match write_file(&gpx, &path) {
                Ok(()) => {
                    info!(path = %path.display(), kind = kind.plural(), "wrote GPX file");
                    summary.written.push(path);
                }
                Err(err) => {
                    warn!(%err, "skipping output file");
                    summary.failures.push(err);
                }
            }
        }
    }

    Ok(summary)
}

/// File name without extension for `key` and `kind`.
///
/// Dated files carry the kind as suffix only if both kinds are exported, so
/// that they cannot overwrite each other.
pub fn file_stem(key: &BucketKey, kind: Kind, format: Format) -> String {
    match (key.label(), format) {
        (None, _) => kind.plural().to_string(),
        (Some(label), Format::Both) => format!("{label}_{}", kind.plural()),
        (Some(label), _) => label,
    }
}

/// Build the GPX document of `kind` for a single bucket.
pub fn bucket_to_gpx(stem: &str, bucket: &DayBucket, kind: Kind) -> Gpx {
    match kind {
        Kind::Route => routes_to_gpx(&bucket.routes),
        Kind::Track => track_to_gpx(format!("Track {stem}"), &bucket.track),
    }
}

/// A GPX document with one `<rte>` per route, each with a start and an end
/// point.
pub fn routes_to_gpx(routes: &[RouteEntry]) -> Gpx {
    let mut gpx = empty_gpx();
    gpx.routes = routes.iter().map(convert_route).collect();
    gpx
}

/// A GPX document with a single `<trk>` holding all `points` in one segment.
pub fn track_to_gpx(name: impl Into<String>, points: &[Point]) -> Gpx {
    let mut segment = TrackSegment::default();
    segment.points = points.iter().map(|p| create_waypoint(p, None)).collect();

    let mut track = Track::default();
    track.name = Some(name.into());
    track.segments.push(segment);

    let mut gpx = empty_gpx();
    gpx.tracks.push(track);
    gpx
}

/// A GPX 1.1 document without content.
///
/// No metadata is added so that repeated exports are byte-identical.
pub fn empty_gpx() -> Gpx {
    Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.to_string()),
        ..Default::default()
    }
}

/// Serialize `gpx` into `sink`.
pub fn write_gpx(gpx: &Gpx, sink: impl io::Write) -> Result<(), GpxError> {
    gpx::write(gpx, sink)
}

/// Serialize `gpx` completely before creating the file at `path`.
fn write_file(gpx: &Gpx, path: &Path) -> Result<(), WriteError> {
    let mut data = vec![];
    write_gpx(gpx, &mut data).map_err(|source| WriteError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let mut file = File::create(path).map_err(|source| WriteError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(&data)
        .and_then(|()| file.flush())
        .map_err(|source| WriteError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn convert_route(entry: &RouteEntry) -> Route {
    let mut route = Route::default();
    route.name = Some(entry.name.clone());
    route.description = Some(entry.description());
    route.type_ = Some(entry.activity_type.clone());
    route.points = vec![
        create_waypoint(&entry.start, Some("Start")),
        create_waypoint(&entry.end, Some("End")),
    ];
    route
}

fn create_waypoint(point: &Point, name: Option<&str>) -> Waypoint {
    let mut waypoint = Waypoint::new(geo_types::Point::new(point.longitude, point.latitude));
    waypoint.time = Some(point.time.into());
    waypoint.name = name.map(str::to_string);
    waypoint
}
