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

//! Command-line interface for exporting location history to GPX files.

use std::{io, path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use time::{macros::format_description, Date};
use timeline_gpx::{export, DateRange, DayBoundary, ExportOptions, Format, Grouping};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Export location history to GPX files", long_about = None)]
struct Cli {
    /// Location history JSON file
    #[arg(short, long, default_value = "Timeline.json", value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Directory receiving the GPX files
    #[arg(short, long, default_value = "GPX_Output", value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Which records to export
    #[arg(short, long, value_enum, default_value_t = FormatOpt::Both)]
    format: FormatOpt,

    /// Write one file per day
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "monthly")]
    daily: bool,

    /// Write one file per month
    #[arg(long, action = ArgAction::SetTrue)]
    monthly: bool,

    /// Time zone deciding the calendar day of a timestamp
    #[arg(long, value_enum, default_value_t = TimezoneOpt::Source)]
    timezone: TimezoneOpt,

    /// First day to export (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    start: Option<Date>,

    /// Last day to export (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    end: Option<Date>,

    /// Only log warnings and errors
    #[arg(short, long, action = ArgAction::SetTrue, conflicts_with = "verbose")]
    quiet: bool,

    /// Log every skipped record
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatOpt {
    Routes,
    Tracks,
    Both,
}

impl From<FormatOpt> for Format {
    fn from(value: FormatOpt) -> Self {
        match value {
            FormatOpt::Routes => Format::Routes,
            FormatOpt::Tracks => Format::Tracks,
            FormatOpt::Both => Format::Both,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TimezoneOpt {
    /// Offset recorded with each timestamp
    Source,
    Utc,
}

impl From<TimezoneOpt> for DayBoundary {
    fn from(value: TimezoneOpt) -> Self {
        match value {
            TimezoneOpt::Source => DayBoundary::Source,
            TimezoneOpt::Utc => DayBoundary::Utc,
        }
    }
}

fn parse_date(value: &str) -> Result<Date, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

impl Cli {
    fn options(&self) -> ExportOptions {
        let defaults = DateRange::default();
        ExportOptions {
            format: self.format.into(),
            grouping: if self.daily {
                Grouping::Daily
            } else if self.monthly {
                Grouping::Monthly
            } else {
                Grouping::Combined
            },
            day_boundary: self.timezone.into(),
            date_range: DateRange {
                start: self.start.unwrap_or(defaults.start),
                end: self.end.unwrap_or(defaults.end),
            },
        }
    }

    fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let options = cli.options();
    info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        ?options,
        "exporting"
    );

    match export(&cli.input, &cli.output, &options) {
        Ok(summary) => {
            info!(
                routes = summary.routes,
                track_points = summary.track_points,
                files = summary.written.len(),
                "export finished"
            );
            if summary.skipped.total() > 0 {
                warn!(
                    unrecognized = summary.skipped.unrecognized,
                    invalid_segments = summary.skipped.invalid_segments,
                    invalid_samples = summary.skipped.invalid_samples,
                    "skipped records"
                );
            }
            for failure in &summary.failures {
                error!(%failure, "file not written");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "export failed");
            ExitCode::FAILURE
        }
    }
}
