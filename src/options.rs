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

//! Options controlling which records are exported and how they are grouped.

use time::{macros::date, Date};

/// Which kinds of GPX output are produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Only activity segments as `<rte>`.
    Routes,
    /// Only raw paths as `<trk>`.
    Tracks,
    #[default]
    Both,
}

impl Format {
    /// Whether this format produces output of `kind`.
    pub fn includes(self, kind: Kind) -> bool {
        matches!(
            (self, kind),
            (Format::Both, _) | (Format::Routes, Kind::Route) | (Format::Tracks, Kind::Track)
        )
    }
}

/// Kind of a single GPX output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Route,
    Track,
}

impl Kind {
    /// Plural name used for file naming, e.g. `routes.gpx`.
    pub fn plural(self) -> &'static str {
        match self {
            Kind::Route => "routes",
            Kind::Track => "tracks",
        }
    }
}

/// How points are split into output files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Grouping {
    /// One file per kind.
    #[default]
    Combined,
    /// One file per calendar day and kind.
    Daily,
    /// One file per calendar month and kind.
    Monthly,
}

/// Time zone in which the calendar day of a timestamp is determined.
///
/// This only affects bucketing and route names. Timestamps are always written
/// as UTC instants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DayBoundary {
    /// Calendar day in UTC.
    Utc,
    /// Calendar day in the UTC offset recorded with the source timestamp.
    #[default]
    Source,
}

/// Inclusive range of calendar days to export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    pub fn contains(&self, day: Date) -> bool {
        self.start <= day && day <= self.end
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: date!(2000 - 01 - 01),
            end: date!(2099 - 12 - 31),
        }
    }
}

/// All settings of a single export run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: Format,
    pub grouping: Grouping,
    pub day_boundary: DayBoundary,
    pub date_range: DateRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_includes_kinds() {
        assert!(Format::Both.includes(Kind::Route));
        assert!(Format::Both.includes(Kind::Track));
        assert!(Format::Routes.includes(Kind::Route));
        assert!(!Format::Routes.includes(Kind::Track));
        assert!(!Format::Tracks.includes(Kind::Route));
    }

    #[test]
    fn date_range_is_inclusive() {
        let range = DateRange {
            start: date!(2024 - 03 - 01),
            end: date!(2024 - 03 - 31),
        };
        assert!(range.contains(date!(2024 - 03 - 01)));
        assert!(range.contains(date!(2024 - 03 - 31)));
        assert!(!range.contains(date!(2024 - 04 - 01)));
        assert!(!range.contains(date!(2024 - 02 - 29)));
    }
}
