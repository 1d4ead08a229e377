//! The negotiator's environment contract (spec.md §6): two integer-valued
//! variables telling this tool which of its two stdio sides are
//! graph-aware. Absence or a parse failure is fatal.

use crate::NegotiateError;

/// Which of a tool's two stdio sides are graph-aware, read from the
/// environment at startup.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GraphAwareness {
    /// Whether standard input is graph-aware.
    pub is_graph_in: bool,
    /// Whether standard output is graph-aware.
    pub is_graph_out: bool,
}

fn read_bool_env(name: &'static str) -> Result<bool, NegotiateError> {
    let value = std::env::var(name).map_err(|_| NegotiateError::MissingEnvVar(name))?;
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| NegotiateError::InvalidEnvVar {
            name,
            value: value.clone(),
        })?;
    Ok(parsed != 0)
}

impl GraphAwareness {
    /// Reads `is_graph_in` and `is_graph_out` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiateError::MissingEnvVar`] if either is unset, or
    /// [`NegotiateError::InvalidEnvVar`] if either is set but not an
    /// integer.
    pub fn from_env() -> Result<Self, NegotiateError> {
        Ok(Self {
            is_graph_in: read_bool_env("is_graph_in")?,
            is_graph_out: read_bool_env("is_graph_out")?,
        })
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_integer_value() {
        // SAFETY: test-only process-wide env mutation, serialized by
        // `cargo test`'s default single-threaded-per-binary env access
        // for this crate (no other test touches these names).
        unsafe {
            std::env::set_var("is_graph_in", "not-a-number");
        }
        let err = read_bool_env("is_graph_in").unwrap_err();
        assert!(matches!(err, NegotiateError::InvalidEnvVar { .. }));
        unsafe {
            std::env::remove_var("is_graph_in");
        }
    }

    #[test]
    fn treats_nonzero_as_true() {
        // SAFETY: see above.
        unsafe {
            std::env::set_var("is_graph_out", "1");
        }
        assert!(read_bool_env("is_graph_out").expect("parse"));
        unsafe {
            std::env::remove_var("is_graph_out");
        }
    }
}
