//! CLI argument definitions using clap.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use hindcast_core::MAX_SPAN_YEARS;
use hindcast_history::ReferenceDay;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "hindcast")]
#[command(author, version, about = "Today's weather against the same day in past years", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Look up a place by name: current weather, history and anomaly
    Lookup {
        /// Place name, e.g. "Lisbon" or "Springfield, Illinois"
        place: String,
    },

    /// Look up coordinates (e.g. from a device GPS)
    Here {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Store history under this name instead of reverse geocoding
        #[arg(long)]
        name: Option<String>,
    },

    /// Fetch and store daily history without the rest of the lookup
    Sync {
        /// Location key the history is stored under
        location: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// First day to fetch (YYYY-MM-DD); defaults to the configured span
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,

        /// Last day to fetch (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
    },

    /// Print the stored daily series for a location
    Series {
        location: String,

        /// Only the most recent N days
        #[arg(long)]
        last: Option<usize>,
    },

    /// Compare a temperature with stored history for the same day
    Anomaly {
        location: String,

        /// Current temperature in °C
        #[arg(long, allow_hyphen_values = true)]
        current: f64,

        /// Calendar day as MM-DD; defaults to today
        #[arg(long)]
        date: Option<ReferenceDay>,

        /// Number of previous years to average
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_SPAN_YEARS)))]
        years: Option<u32>,
    },

    /// List locations with stored history
    Locations,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_coordinates_parse() {
        let cli = Cli::try_parse_from(["hindcast", "here", "--lat", "-33.86", "--lon", "151.2"]).unwrap();
        match cli.command {
            Commands::Here { lat, lon, name } => {
                assert_eq!(lat, -33.86);
                assert_eq!(lon, 151.2);
                assert!(name.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_sync_range_needs_both_ends() {
        assert!(Cli::try_parse_from([
            "hindcast", "sync", "Oslo", "--lat", "59.9", "--lon", "10.7", "--start", "2020-01-01",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "hindcast", "sync", "Oslo", "--lat", "59.9", "--lon", "10.7", "--start", "2020-01-01",
            "--end", "2020-12-31",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Sync { start: Some(_), end: Some(_), .. }));
    }

    #[test]
    fn test_anomaly_years_bounded() {
        for years in ["0", "101", "2147483648", "-1"] {
            assert!(
                Cli::try_parse_from(["hindcast", "anomaly", "Oslo", "--current", "5", "--years", years])
                    .is_err(),
                "{years}"
            );
        }

        let cli = Cli::try_parse_from(["hindcast", "anomaly", "Oslo", "--current", "5", "--years", "100"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Anomaly { years: Some(100), .. }));
    }

    #[test]
    fn test_anomaly_parses_reference_day_and_json() {
        let cli = Cli::try_parse_from([
            "hindcast", "--format", "json", "anomaly", "Oslo", "--current", "-4.5", "--date", "02-29",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Anomaly { current, date, .. } => {
                assert_eq!(current, -4.5);
                assert_eq!(date, ReferenceDay::new(2, 29));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_reference_day_rejected() {
        assert!(Cli::try_parse_from(["hindcast", "anomaly", "Oslo", "--current", "3", "--date", "02-30"]).is_err());
    }
}
