//! CLI configuration for the `store` binary (spec.md §4.2.1, §6).
//!
//! Parsed with `clap`'s builder API rather than its derive macro: `-l` and
//! `-t` are mutually exclusive, and that constraint reads far more plainly
//! as a runtime check in [`RuntimeOptions::parse`] than as a derive-macro
//! group annotation once `--since` and `--idle-timeout` are folded in too.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};

use logging::Verbosity;

/// How records are framed in the input stream (spec.md §4.2.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Framing {
    /// Records are delimited by a single separator byte.
    Separator(u8),
    /// Records are exactly `length` bytes; no separator.
    FixedLength(u64),
}

impl Default for Framing {
    fn default() -> Self {
        Self::Separator(b'\n')
    }
}

/// The response window, a right-inclusive-left-exclusive reverse range in
/// records counted from the newest (spec.md §4.2.1). `(0, 1)` is "just the
/// latest record".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Window {
    /// Records this far back from the newest are excluded.
    pub rbegin: u64,
    /// Records this far back from the newest are included, down to
    /// `rbegin`.
    pub rend: u64,
}

impl Default for Window {
    fn default() -> Self {
        Self { rbegin: 0, rend: 1 }
    }
}

/// Errors parsing the store's command line.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `clap` rejected the argument list outright (missing required
    /// value, unknown flag, etc).
    #[error("{0}")]
    Clap(String),
    /// `-l` and `-t` were both given.
    #[error("-l and -t are mutually exclusive")]
    ConflictingFraming,
    /// `-t` was given a value that was not exactly one byte.
    #[error("-t expects exactly one byte, got {0:?}")]
    SeparatorNotOneByte(String),
    /// `-l` was given `0`; fixed-length records must have a positive
    /// length.
    #[error("-l expects a positive length, got 0")]
    ZeroLength,
    /// `--window a,b` was malformed or had `rbegin >= rend`.
    #[error("--window expects \"rbegin,rend\" with rbegin < rend, got {0:?}")]
    InvalidWindow(String),
}

/// Parsed command-line configuration for one store process.
#[derive(Clone, Debug)]
pub struct RuntimeOptions {
    /// How the input stream is split into records.
    pub framing: Framing,
    /// The response window served to `C`/`L` clients.
    pub window: Window,
    /// Path of the control socket to create.
    pub socket_path: PathBuf,
    /// `--since`: accepted and stored, but ignored by the record locator
    /// (spec.md §9's recorded decision for the time-window open question).
    pub since: Option<u64>,
    /// `--idle-timeout SECS`: moves a `read_command` client straight to
    /// `inactive` if no command byte arrives within the window.
    pub idle_timeout: Option<u64>,
    /// `-v`/`-q` folded into one level (ambient; does not affect exit
    /// codes or the wire protocol).
    pub verbosity: Verbosity,
}

fn command() -> Command {
    Command::new("store")
        .arg(
            Arg::new("length")
                .short('l')
                .value_name("N")
                .value_parser(value_parser!(u64))
                .help("fixed-length mode: records are exactly N bytes"),
        )
        .arg(
            Arg::new("separator")
                .short('t')
                .value_name("CHAR")
                .help("separator mode: byte delimiting records (default: newline)"),
        )
        .arg(
            Arg::new("window")
                .long("window")
                .value_name("RBEGIN,REND")
                .help("response window as a reverse record range (default: 0,1)"),
        )
        .arg(
            Arg::new("since")
                .long("since")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("time-window mode (accepted, not implemented; see docs)"),
        )
        .arg(
            Arg::new("idle-timeout")
                .long("idle-timeout")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("disconnect a client that sends no command within SECS"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("increase logging verbosity (repeatable)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("only log errors"),
        )
        .arg(
            Arg::new("socket_path")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("path of the control socket to create"),
        )
}

fn parse_window(raw: &str) -> Result<Window, ConfigError> {
    let (a, b) = raw
        .split_once(',')
        .ok_or_else(|| ConfigError::InvalidWindow(raw.to_owned()))?;
    let rbegin: u64 = a
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidWindow(raw.to_owned()))?;
    let rend: u64 = b
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidWindow(raw.to_owned()))?;
    if rbegin >= rend {
        return Err(ConfigError::InvalidWindow(raw.to_owned()));
    }
    Ok(Window { rbegin, rend })
}

impl RuntimeOptions {
    /// Parses a store process's command-line arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `args` is not well-formed, `-l` and `-t`
    /// are both present, `-l` is given `0`, `-t`'s value is not exactly one
    /// byte, or `--window` is malformed.
    pub fn parse(args: &[OsString]) -> Result<Self, ConfigError> {
        let matches = command()
            .try_get_matches_from(std::iter::once(OsString::from("store")).chain(args.iter().cloned()))
            .map_err(|err| ConfigError::Clap(err.render().to_string()))?;

        let length = matches.get_one::<u64>("length").copied();
        let separator = matches.get_one::<String>("separator").cloned();
        if length.is_some() && separator.is_some() {
            return Err(ConfigError::ConflictingFraming);
        }
        let framing = if let Some(len) = length {
            if len == 0 {
                return Err(ConfigError::ZeroLength);
            }
            Framing::FixedLength(len)
        } else if let Some(raw) = separator {
            let bytes = unescape_one_byte(&raw);
            let byte = bytes.ok_or_else(|| ConfigError::SeparatorNotOneByte(raw.clone()))?;
            Framing::Separator(byte)
        } else {
            Framing::default()
        };

        let window = match matches.get_one::<String>("window") {
            Some(raw) => parse_window(raw)?,
            None => Window::default(),
        };

        let verbosity = Verbosity::from_flags(
            matches.get_count("verbose"),
            matches.get_flag("quiet"),
        );

        Ok(Self {
            framing,
            window,
            socket_path: matches
                .get_one::<PathBuf>("socket_path")
                .expect("required")
                .clone(),
            since: matches.get_one::<u64>("since").copied(),
            idle_timeout: matches.get_one::<u64>("idle-timeout").copied(),
            verbosity,
        })
    }
}

/// Accepts either a literal single byte or the two-character escape
/// `\0` for NUL (spec.md §6: "-t c ... accepts \0").
fn unescape_one_byte(raw: &str) -> Option<u8> {
    if raw == "\\0" {
        return Some(0);
    }
    let bytes = raw.as_bytes();
    if bytes.len() == 1 {
        Some(bytes[0])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn defaults_to_newline_separator_and_latest_window() {
        let opts = RuntimeOptions::parse(&args(&["/tmp/sock"])).expect("parse");
        assert_eq!(opts.framing, Framing::Separator(b'\n'));
        assert_eq!(opts.window, Window { rbegin: 0, rend: 1 });
        assert_eq!(opts.socket_path, PathBuf::from("/tmp/sock"));
    }

    #[test]
    fn fixed_length_mode_parses_length() {
        let opts = RuntimeOptions::parse(&args(&["-l", "8", "/tmp/sock"])).expect("parse");
        assert_eq!(opts.framing, Framing::FixedLength(8));
    }

    #[test]
    fn separator_accepts_nul_escape() {
        let opts = RuntimeOptions::parse(&args(&["-t", "\\0", "/tmp/sock"])).expect("parse");
        assert_eq!(opts.framing, Framing::Separator(0));
    }

    #[test]
    fn rejects_both_length_and_separator() {
        let err = RuntimeOptions::parse(&args(&["-l", "8", "-t", ",", "/tmp/sock"])).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingFraming));
    }

    #[test]
    fn rejects_zero_length() {
        let err = RuntimeOptions::parse(&args(&["-l", "0", "/tmp/sock"])).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroLength));
    }

    #[test]
    fn rejects_multi_byte_separator() {
        let err = RuntimeOptions::parse(&args(&["-t", "ab", "/tmp/sock"])).unwrap_err();
        assert!(matches!(err, ConfigError::SeparatorNotOneByte(_)));
    }

    #[test]
    fn parses_explicit_window() {
        let opts = RuntimeOptions::parse(&args(&["--window", "1,2", "/tmp/sock"])).expect("parse");
        assert_eq!(opts.window, Window { rbegin: 1, rend: 2 });
    }

    #[test]
    fn rejects_inverted_window() {
        let err = RuntimeOptions::parse(&args(&["--window", "2,1", "/tmp/sock"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWindow(_)));
    }

    #[test]
    fn missing_socket_path_is_a_clap_error() {
        let err = RuntimeOptions::parse(&args(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Clap(_)));
    }
}
