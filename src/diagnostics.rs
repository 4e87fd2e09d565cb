//! Structured compiler diagnostics
//!
//! Recoverable schema problems never abort a compilation; they are recorded
//! here in order and returned to the caller, so that a single run surfaces
//! as many problems as possible.

use std::fmt;

/// Severity of a diagnostic record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational
    Info,
    /// Possible problem, compilation result unaffected
    Warning,
    /// Recoverable error; the offending component was substituted or dropped
    Error,
}

impl Severity {
    /// Get the severity as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable diagnostic codes
pub mod codes {
    /// Missing required sub-element, invalid name or similar malformed input
    pub const MALFORMED_INPUT: &str = "malformed-input";
    /// Two global definitions of the same qualified name in one namespace
    pub const DUPLICATE_GLOBAL: &str = "duplicate-global";
    /// A named type/element/attribute/group was not found
    pub const UNRESOLVED_REF: &str = "unresolved-ref";
    /// A component depends on itself, directly or transitively
    pub const CYCLIC_DEPENDENCY: &str = "cyclic-dependency";
    /// A facet does not apply or its value is invalid for the base
    pub const FACET_VIOLATION: &str = "facet-violation";
    /// A facet fixed on the base was overridden with a different value
    pub const FACET_FIXED_OVERRIDE: &str = "facet-fixed-override";
    /// Inclusive and exclusive limits given for the same end
    pub const FACET_BOUND_CONFLICT: &str = "facet-bound-conflict";
    /// Numeric bound facets invert (min above max)
    pub const FACET_BOUND_INVERTED: &str = "facet-bound-inverted";
    /// whiteSpace may only tighten along preserve < replace < collapse
    pub const WHITESPACE_LOOSENED: &str = "whitespace-loosened";
    /// The item type of a list is itself a list (or a union containing one)
    pub const ITEM_TYPE_LIST_OF_LIST: &str = "item-type-not-simple-list-of-list";
    /// A union member is not a simple type
    pub const UNION_MEMBER_NOT_SIMPLE: &str = "union-member-not-simple";
    /// A redefining type must derive from the type it redefines
    pub const REDEFINITION_MUST_DERIVE: &str = "redefinition-must-derive";
    /// Re-fetching a source file for incremental recompilation failed
    pub const FETCH_FAILED: &str = "fetch-failed";
}

/// Position of a diagnostic in its source schema document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    /// The source file the component came from
    pub file: String,
    /// The qualified name of the nearest enclosing component, if any
    pub component: Option<String>,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Some(c) => write!(f, "{} ({})", self.file, c),
            None => write!(f, "{}", self.file),
        }
    }
}

/// One structured diagnostic record
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Human-readable message
    pub message: String,
    /// Severity of the record
    pub severity: Severity,
    /// Stable code from [`codes`]
    pub code: &'static str,
    /// Where the problem was found, if known
    pub location: Option<SourcePosition>,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
            code,
            location: None,
        }
    }

    /// Create a warning diagnostic
    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Warning,
            code,
            location: None,
        }
    }

    /// Create an info diagnostic
    pub fn info(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
            code,
            location: None,
        }
    }

    /// Set the source location
    pub fn with_location(mut self, file: impl Into<String>) -> Self {
        self.location = Some(SourcePosition {
            file: file.into(),
            component: None,
        });
        self
    }

    /// Set the source location including the enclosing component
    pub fn with_component(mut self, file: impl Into<String>, component: impl Into<String>) -> Self {
        self.location = Some(SourcePosition {
            file: file.into(),
            component: Some(component.into()),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.severity, self.message, self.code)?;
        if let Some(ref loc) = self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Ordered collection of diagnostics accumulated during one compilation
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    records: Vec<Diagnostic>,
}

impl DiagnosticSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.records.push(diagnostic);
    }

    /// All records in the order they were produced
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Count of error-severity records
    pub fn error_count(&self) -> usize {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Whether any error-severity record was produced
    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|d| d.severity == Severity::Error)
    }

    /// Find records with the given code
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.records.iter().filter(move |d| d.code == code)
    }

    /// Move the accumulated records out of the sink
    pub fn into_records(self) -> Vec<Diagnostic> {
        self.records
    }

    /// Absorb the records of a nested compilation
    pub fn merge(&mut self, other: DiagnosticSink) {
        self.records.extend(other.records);
    }
}
