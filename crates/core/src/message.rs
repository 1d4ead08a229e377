//! Diagnostic formatting shared by the negotiator and the store.
//!
//! Both cores are short-lived, single-process programs that report failures
//! to stderr and exit; neither needs upstream rsync's full trailer/version
//! machinery, so this is a small, purpose-built analogue of
//! `rsync_core::message` rather than a port of it.

use std::fmt;

/// Which of the two cores produced a diagnostic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Role {
    /// The negotiator library, linked into a graph-aware tool.
    Negotiator,
    /// The standalone `store` process.
    Store,
}

impl Role {
    /// The lowercase label rendered in the trailer of a [`Message`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Negotiator => "negotiator",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a user-visible diagnostic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Severity {
    /// Informational message (gated behind verbosity, not an error path).
    Info,
    /// Warning: an open question from spec.md §9 was hit at runtime.
    Warning,
    /// Fatal error: the taxonomy in spec.md §7.
    Error,
}

impl Severity {
    /// The lowercase label rendered at the start of a [`Message`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A single diagnostic line, formatted consistently regardless of which
/// core or which error variant produced it.
///
/// # Examples
///
/// ```ignore
/// use core::message::{Message, Role, Severity};
///
/// let rendered = Message::new(Severity::Error, "unknown command byte 'x'")
///     .with_role(Role::Store)
///     .to_string();
/// assert_eq!(rendered, "sgsh error: unknown command byte 'x' [store]");
/// ```
#[derive(Clone, Debug)]
pub struct Message {
    severity: Severity,
    text: String,
    role: Option<Role>,
}

impl Message {
    /// Builds a new message with the given severity and body text.
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
            role: None,
        }
    }

    /// Convenience constructor for [`Severity::Error`].
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    /// Convenience constructor for [`Severity::Warning`].
    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    /// Attaches the role that produced this message.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// The message's severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sgsh {}: {}", self.severity.as_str(), self.text)?;
        if let Some(role) = self.role {
            write!(f, " [{role}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, Role, Severity};

    #[test]
    fn renders_severity_text_and_role() {
        let rendered = Message::new(Severity::Error, "unknown command byte 'x'")
            .with_role(Role::Store)
            .to_string();
        assert_eq!(rendered, "sgsh error: unknown command byte 'x' [store]");
    }

    #[test]
    fn omits_trailer_when_role_absent() {
        let rendered = Message::warning("time-window mode is not implemented").to_string();
        assert_eq!(
            rendered,
            "sgsh warning: time-window mode is not implemented"
        );
    }
}
