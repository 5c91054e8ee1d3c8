use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::level_filters::LevelFilter;

pub const DEFAULT_PORT: u16 = 5000;

/// Monitor the status and optionally the content of given websites in a given interval.
///
/// Targets and their content requirements are read from the config file.
#[derive(Debug, Parser)]
#[command(name = "sitewatch", version, about)]
pub struct Cli {
    /// Check interval in seconds, overrides the config file
    #[arg(short, long, allow_negative_numbers = true)]
    pub interval: Option<i64>,

    /// Config file path, defaults to $XDG_CONFIG_HOME/sitewatch/config.toml
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Status server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Event log database path, overrides the config file
    #[arg(long)]
    pub database: Option<String>,

    /// Validate and print the configuration, then exit
    #[arg(long)]
    pub check_config: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sitewatch"]);
        assert_eq!(cli.port, DEFAULT_PORT);
        assert_eq!(cli.interval, None);
        assert_eq!(cli.log_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from(["sitewatch", "-i", "5", "-f", "targets.json", "-vv"]);
        assert_eq!(cli.interval, Some(5));
        assert_eq!(cli.file, Some(PathBuf::from("targets.json")));
        assert_eq!(cli.log_level(), LevelFilter::TRACE);
    }

    #[test]
    fn test_negative_interval_reaches_validation() {
        let cli = Cli::parse_from(["sitewatch", "--interval", "-1"]);
        assert_eq!(cli.interval, Some(-1));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
