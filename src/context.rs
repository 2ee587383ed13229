//! The processing context threaded through a single `compile()` run (§4.3).

use crate::ast::{Ast, Script};
use crate::config::Configuration;
use crate::error::Severity;
use crate::placeholder::ParameterInfo;
use crate::value::{TypedValue, Value};
use compact_str::CompactString;
use std::sync::Arc;

/// One non-fatal finding raised by a validator (§4.3.2).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub kind: CompactString,
    pub severity: Severity,
    pub message: CompactString,
    pub location: Option<crate::error::Span>,
}

impl ValidationResult {
    pub fn new(
        kind: impl Into<CompactString>,
        severity: Severity,
        message: impl Into<CompactString>,
    ) -> Self {
        Self {
            kind: kind.into(),
            severity,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: crate::error::Span) -> Self {
        self.location = Some(location);
        self
    }
}

/// Operation classification produced by the analyzer / DML-safety validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Ddl,
    Script,
    Other,
}

/// Best-effort structural metadata the analyzer fills in (§4.3.3, §3.7).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSummary {
    pub operation_kind: Option<OperationKind>,
    pub tables: Vec<CompactString>,
    pub columns: Vec<CompactString>,
    pub join_count: usize,
    pub join_kinds: Vec<CompactString>,
    pub subquery_depth: usize,
    pub has_where: bool,
    pub has_limit: bool,
}

/// What stage of parsing the context currently holds, mirroring `ParsedInput`
/// but owned by the context for the duration of one pipeline run.
#[derive(Debug, Clone)]
pub enum ParsedAst {
    None,
    Single(Ast),
    Script(Script),
}

impl ParsedAst {
    pub fn as_single(&self) -> Option<&Ast> {
        match self {
            ParsedAst::Single(ast) => Some(ast),
            _ => None,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, ParsedAst::Script(_))
    }
}

/// Threaded, mutable-within-a-run state for one `compile()` invocation.
///
/// Mutable while the pipeline runs (processors append to the lists below),
/// immutable once `compile()` returns — a `Statement` never re-enters the
/// pipeline with the same `ProcessingContext`; `with_filter`/`with_parameters`
/// etc. build a fresh one.
pub struct ProcessingContext {
    pub configuration: Arc<Configuration>,
    pub raw_sql: CompactString,
    pub raw_had_placeholders: bool,

    pub ast: ParsedAst,

    pub parameter_info: Vec<ParameterInfo>,
    pub parameter_values: Vec<TypedValue>,
    /// Literals hoisted by the literal parameterizer, in hoist order —
    /// `(placeholder name, value)`. The compiler looks these up by name once
    /// it has detected the final placeholder list from the rendered SQL
    /// (§4.3.1 item 2, §4.4 step 7).
    pub hoisted_named: Vec<(CompactString, Value)>,

    pub validation_findings: Vec<ValidationResult>,
    pub analysis: AnalysisSummary,

    pub is_script: bool,
    pub is_many: bool,

    pub processing_errors: Vec<CompactString>,
}

impl ProcessingContext {
    pub fn new(
        configuration: Arc<Configuration>,
        raw_sql: impl Into<CompactString>,
        is_script: bool,
        is_many: bool,
    ) -> Self {
        let raw_sql = raw_sql.into();
        Self {
            configuration,
            raw_had_placeholders: !crate::style::detect_styles(&raw_sql, "").is_empty(),
            raw_sql,
            ast: ParsedAst::None,
            parameter_info: Vec::new(),
            parameter_values: Vec::new(),
            hoisted_named: Vec::new(),
            validation_findings: Vec::new(),
            analysis: AnalysisSummary::default(),
            is_script,
            is_many,
            processing_errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, message: impl Into<CompactString>) {
        self.processing_errors.push(message.into());
    }

    pub fn worst_finding(&self) -> Option<Severity> {
        self.validation_findings.iter().map(|f| f.severity).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[test]
    fn new_detects_placeholders_already_present_in_raw_sql() {
        let config = Configuration::new("sqlite").shared();
        let ctx = ProcessingContext::new(config, "SELECT * FROM t WHERE id = ?", false, false);
        assert!(ctx.raw_had_placeholders);
    }

    #[test]
    fn new_without_placeholders_reports_false() {
        let config = Configuration::new("sqlite").shared();
        let ctx = ProcessingContext::new(config, "SELECT 1", false, false);
        assert!(!ctx.raw_had_placeholders);
    }

    #[test]
    fn worst_finding_picks_highest_severity() {
        let config = Configuration::new("sqlite").shared();
        let mut ctx = ProcessingContext::new(config, "SELECT 1", false, false);
        ctx.validation_findings.push(ValidationResult::new("a", Severity::Low, "low"));
        ctx.validation_findings.push(ValidationResult::new("b", Severity::Critical, "critical"));
        ctx.validation_findings.push(ValidationResult::new("c", Severity::Medium, "medium"));
        assert_eq!(ctx.worst_finding(), Some(Severity::Critical));
    }

    #[test]
    fn worst_finding_is_none_with_no_findings() {
        let config = Configuration::new("sqlite").shared();
        let ctx = ProcessingContext::new(config, "SELECT 1", false, false);
        assert_eq!(ctx.worst_finding(), None);
    }

    #[test]
    fn parsed_ast_as_single_and_is_script_predicates() {
        assert!(ParsedAst::None.as_single().is_none());
        assert!(!ParsedAst::None.is_script());
    }
}
