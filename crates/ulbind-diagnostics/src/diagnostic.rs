//! Diagnostic types for failures isolated at the native boundary.

use crate::origin::Origin;
use serde::{Deserialize, Serialize};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational hint
    Hint,
    /// Warning (event dropped or degraded, session unaffected)
    Warning,
    /// Error (listener failed; the event was not handled)
    Error,
}

impl Severity {
    /// Get the string representation for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Hint => "hint",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Listener failures (L001-L099)
    /// Listener returned an error
    ListenerError,
    /// Listener panicked
    ListenerPanic,

    // Marshalling (M001-M099)
    /// Enumerated argument outside the known range
    UnknownEnumCode,
    /// String argument was not valid UTF-8
    InvalidUtf8,

    // Handles (H001-H099)
    /// Child-view request answered with an unusable view
    InvalidChildView,
    /// Callback raised while no renderer was live
    NoLiveRenderer,
}

impl DiagnosticCode {
    /// Every known code, in display order.
    pub const ALL: [DiagnosticCode; 6] = [
        Self::ListenerError,
        Self::ListenerPanic,
        Self::UnknownEnumCode,
        Self::InvalidUtf8,
        Self::InvalidChildView,
        Self::NoLiveRenderer,
    ];

    /// Get the code string (e.g., "L001").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListenerError => "L001",
            Self::ListenerPanic => "L002",

            Self::UnknownEnumCode => "M001",
            Self::InvalidUtf8 => "M002",

            Self::InvalidChildView => "H001",
            Self::NoLiveRenderer => "H002",
        }
    }

    /// Look a code up by its string form, case-insensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }

    /// Get the default severity for this code.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::ListenerError | Self::ListenerPanic => Severity::Error,

            Self::UnknownEnumCode | Self::InvalidUtf8 | Self::InvalidChildView => {
                Severity::Warning
            }

            Self::NoLiveRenderer => Severity::Hint,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A diagnostic raised while dispatching a native callback.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Unique code
    pub code: DiagnosticCode,
    /// Severity level
    pub severity: Severity,
    /// Short message (single line)
    pub message: String,
    /// Longer explanation (optional)
    pub help: Option<String>,
    /// Native object and callback the failure came from
    pub origin: Option<Origin>,
    /// Extra context lines
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic with the code's default severity.
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, code.default_severity(), message)
    }

    /// Check if this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Builder for constructing diagnostics fluently.
pub struct DiagnosticBuilder {
    inner: Diagnostic,
}

impl DiagnosticBuilder {
    /// Create a new diagnostic builder.
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            inner: Diagnostic {
                code,
                severity,
                message: message.into(),
                help: None,
                origin: None,
                notes: Vec::new(),
            },
        }
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.inner.origin = Some(origin);
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.help = Some(help.into());
        self
    }

    /// Add a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.inner.notes.push(note.into());
        self
    }

    /// Build the diagnostic.
    pub fn build(self) -> Diagnostic {
        self.inner
    }
}

/// Collection of diagnostics with summary statistics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// All diagnostics
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.is_error())
    }

    /// Count errors.
    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    /// Count warnings.
    pub fn warning_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_warning()).count()
    }

    /// Count diagnostics carrying `code`.
    pub fn count_code(&self, code: DiagnosticCode) -> usize {
        self.items.iter().filter(|d| d.code == code).count()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Iterate over diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
