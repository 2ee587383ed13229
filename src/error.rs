//! Error types for sqlspec.

use compact_str::CompactString;
use thiserror::Error;

/// A byte-offset span into the original SQL source, used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// The severity of a validation finding, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Core error type for sqlspec's compilation pipeline.
///
/// Mirrors the taxonomy in the specification: each variant is a kind the
/// caller can pattern-match on, not a generic "something went wrong" bag.
#[derive(Debug, Error)]
pub enum SqlSpecError {
    /// The AST layer could not parse the input.
    #[error("parse error at {span:?}: {message} (in: {source_snippet})")]
    ParseError {
        span: Option<Span>,
        message: CompactString,
        source_snippet: CompactString,
    },

    /// Input SQL was blank or whitespace-only.
    #[error("statement is empty")]
    EmptyStatement,

    /// A placeholder style present in the SQL is not in `allowed_parameter_styles`.
    #[error("parameter style {style:?} is not permitted by configuration")]
    StyleNotSupported { style: crate::placeholder::PlaceholderStyle },

    /// Two different placeholder styles coexist and mixing is disallowed.
    #[error("mixed parameter styles are not permitted: {found:?}")]
    MixedStyles { found: Vec<crate::placeholder::PlaceholderStyle> },

    /// A named placeholder has no matching value in the payload.
    #[error("no value supplied for named parameter `{name}`")]
    NoSuchParameter { name: CompactString },

    /// Positional parameter count does not match the number of placeholders.
    #[error("parameter arity mismatch: expected {expected}, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// `strict_mode` saw a validation finding at or above `High` severity.
    #[error("compilation blocked by validator `{rule}` ({severity:?}): {message}")]
    ValidationBlocked {
        rule: CompactString,
        severity: Severity,
        message: CompactString,
    },

    /// An invariant was violated inside a processor. Indicates a bug in
    /// sqlspec itself, not a caller error.
    #[error("internal compilation invariant violated: {0}")]
    CompilationInternal(CompactString),
}

/// Result type for sqlspec operations.
pub type Result<T> = core::result::Result<T, SqlSpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn span_new_sets_both_ends() {
        let span = Span::new(3, 9);
        assert_eq!(span.start, 3);
        assert_eq!(span.end, 9);
    }

    #[test]
    fn errors_render_through_display() {
        let err = SqlSpecError::NoSuchParameter { name: CompactString::from("foo") };
        assert!(err.to_string().contains("foo"));
        let err = SqlSpecError::ArityMismatch { expected: 2, actual: 1 };
        assert!(err.to_string().contains('2') && err.to_string().contains('1'));
    }
}
