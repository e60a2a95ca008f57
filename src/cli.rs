use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use itertools::Itertools;

use crate::controlplane::DEFAULT_API_ADDR;
use crate::session::config::SessionConfig;

/// Downloads a file shared on the Hive network.
///
/// By default the file lands in the current directory. Use `--info` to only
/// look at what a sharable points to.
#[derive(Parser, Debug)]
#[command(name = "light-client", version)]
pub struct Args {
    /// Directory to store the downloaded file in
    #[arg(long, env = "LIGHT_CLIENT_DST", default_value = ".")]
    pub dst: Utf8PathBuf,

    /// Sharable string provided for the file
    #[arg(long, env = "LIGHT_CLIENT_SHARABLE", value_parser = non_empty_sharable)]
    pub sharable: String,

    /// Timeout for the whole download, e.g. 90s, 15m, 1h30m
    #[arg(long, env = "LIGHT_CLIENT_TIMEOUT", default_value = "15m", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Only fetch and print the download info
    #[arg(long, env = "LIGHT_CLIENT_INFO")]
    pub info: bool,

    /// Print connected peers and the payment ledger after the download
    #[arg(long, env = "LIGHT_CLIENT_STAT")]
    pub stat: bool,

    /// Write debug logs to stderr
    #[arg(
        short,
        long,
        env = "LIGHT_CLIENT_VERBOSE",
        visible_alias = "log-to-stderr",
        alias = "logToStderr",
        conflicts_with = "progress"
    )]
    pub verbose: bool,

    /// Print download progress on stdout
    #[arg(long, env = "LIGHT_CLIENT_PROGRESS")]
    pub progress: bool,

    /// Print output as JSON
    #[arg(long, env = "LIGHT_CLIENT_JSON")]
    pub json: bool,

    /// Control plane endpoint
    #[arg(long, env = "HIVE_API_ADDR", default_value = DEFAULT_API_ADDR)]
    pub api_addr: String,
}

impl Args {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.dst.clone(), self.timeout)
    }

    /// Progress only makes sense when something is downloaded.
    pub fn show_progress(&self) -> bool {
        self.progress && !self.info
    }
}

fn non_empty_sharable(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("Sharable string not provided".to_owned());
    }
    Ok(value.to_owned())
}

/// Flattens a clap error into the one-line reason printed after `ERR:`.
pub fn usage_error(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with("Usage:") && !line.starts_with("For more")
        })
        .map(|line| line.trim_start_matches("error: "))
        .join(" ")
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
}

/// Parses durations written as a sequence of decimal numbers with units,
/// such as `300ms`, `1.5h` or `2h45m`. Valid units are `ns`, `us` (or `µs`),
/// `ms`, `s`, `m` and `h`. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);
        let value: f64 = number
            .parse()
            .map_err(|_| DurationError::Invalid(input.to_owned()))?;

        let split = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(split);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(DurationError::MissingUnit(input.to_owned())),
            other => {
                return Err(DurationError::UnknownUnit {
                    unit: other.to_owned(),
                    input: input.to_owned(),
                });
            }
        };
        nanos += value * scale;
        rest = tail;
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn go_style_durations() {
        assert_eq!(parse_duration("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("90s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m500ms"), Ok(Duration::from_millis(120_500)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn malformed_durations() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert!(matches!(parse_duration("15"), Err(DurationError::MissingUnit(_))));
        assert!(matches!(parse_duration("5x"), Err(DurationError::UnknownUnit { .. })));
        assert!(matches!(parse_duration("m"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("-5m"), Err(DurationError::Invalid(_))));
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["light-client", "--sharable", "abc123"]).unwrap();
        assert_eq!(args.dst, Utf8PathBuf::from("."));
        assert_eq!(args.timeout, Duration::from_secs(15 * 60));
        assert!(!args.info && !args.stat && !args.verbose && !args.progress && !args.json);
        let config = args.session_config();
        assert_eq!(config.timeout, Duration::from_secs(900));
    }

    #[test]
    fn log_and_progress_conflict() {
        let err = Args::try_parse_from([
            "light-client",
            "--sharable",
            "abc123",
            "--logToStderr",
            "--progress",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn empty_sharable_is_rejected() {
        for sharable in ["", "   "] {
            let err = Args::try_parse_from(["light-client", "--sharable", sharable]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation);
            let reason = usage_error(&err);
            assert!(reason.contains("Sharable string not provided"), "{reason}");
            assert!(!reason.contains('\n'));
        }
    }

    #[test]
    fn missing_sharable_names_the_flag() {
        let err = Args::try_parse_from(["light-client", "--info"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(usage_error(&err).contains("--sharable"));
    }

    #[test]
    fn sharable_is_trimmed() {
        let args = Args::try_parse_from(["light-client", "--sharable", " abc123 "]).unwrap();
        assert_eq!(args.sharable, "abc123");
    }

    #[test]
    fn progress_is_ignored_in_info_mode() {
        let args = Args::try_parse_from([
            "light-client",
            "--sharable",
            "abc123",
            "--info",
            "--progress",
            "--timeout",
            "5m",
        ])
        .unwrap();
        assert!(!args.show_progress());
        assert_eq!(args.timeout, Duration::from_secs(300));
    }
}
