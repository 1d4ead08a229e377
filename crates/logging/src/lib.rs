#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Verbosity flags and [`tracing-subscriber`] wiring shared by the `store`
//! binary (and any future negotiator-hosting CLI). Unlike upstream rsync,
//! neither core has a per-category debug-flag matrix to parse — spec.md's
//! diagnostics are a handful of fatal/warning lines, so this crate is just
//! a repeatable `-v`/`-q` counter plus an `EnvFilter` initializer.
//!
//! # Design
//!
//! [`Verbosity::from_flags`] folds repeated `-v`/`-q` occurrences into a
//! single level, the same way upstream counts verbosity flags. [`init`]
//! builds an `EnvFilter` from that level but lets `RUST_LOG` override it
//! entirely, matching the ambient-stack note in SPEC_FULL.md §6.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// A resolved verbosity level, independent of how many `-v`/`-q` flags
/// produced it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    /// Only errors are reported.
    Quiet,
    /// Errors and warnings (the default).
    Normal,
    /// Adds per-connection and per-round tracing.
    Verbose,
    /// Adds per-byte buffer/queue tracing.
    Trace,
}

impl Verbosity {
    /// Folds a `-v` count and a `-q` count into one level.
    ///
    /// `-q` always wins over `-v`: asking for both quiet and verbose output
    /// is a usage mistake, but not one worth rejecting when the difference
    /// is cosmetic.
    #[must_use]
    pub const fn from_flags(verbose_count: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose_count {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    const fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info,store=debug,negotiate=debug",
            Self::Trace => "debug,store=trace,negotiate=trace",
        }
    }
}

static INIT: Once = Once::new();

/// Installs a global `tracing` subscriber.
///
/// Safe to call more than once per process (only the first call takes
/// effect); `RUST_LOG`, if set, always takes precedence over `level`.
pub fn init(level: Verbosity) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.directive()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::Verbosity;

    #[test]
    fn quiet_overrides_verbose_count() {
        assert_eq!(Verbosity::from_flags(3, true), Verbosity::Quiet);
    }

    #[test]
    fn verbose_count_escalates_levels() {
        assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(2, false), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(9, false), Verbosity::Trace);
    }

    #[test]
    fn levels_are_ordered_by_chattiness() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert!(Verbosity::Verbose < Verbosity::Trace);
    }
}
