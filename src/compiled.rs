//! The result of the compilation pipeline (§3.7).

use crate::context::{AnalysisSummary, OperationKind, ValidationResult};
use crate::placeholder::{ParameterInfo, PlaceholderStyle};
use crate::value::ExecParams;
use compact_str::CompactString;

/// A rollup of the validation findings gathered during compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSummary {
    pub findings: Vec<ValidationResult>,
}

impl ValidationSummary {
    pub fn worst_severity(&self) -> Option<crate::error::Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// The output of `compile()` (§3.7). Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub rendered_sql: CompactString,
    pub parameters: ExecParams,
    pub placeholder_style: PlaceholderStyle,
    pub parameter_info: Vec<ParameterInfo>,
    pub operation_kind: OperationKind,
    pub validation_summary: ValidationSummary,
    pub analysis_summary: AnalysisSummary,
    /// Structural hash over `(sql_text, dialect, compilation-affecting
    /// configuration, target_style, parameter_info structure)`; excludes
    /// parameter *values* (§4.6 tier 2).
    pub cache_fingerprint: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ValidationResult;
    use crate::error::Severity;

    #[test]
    fn validation_summary_is_clean_with_no_findings() {
        let summary = ValidationSummary::default();
        assert!(summary.is_clean());
        assert_eq!(summary.worst_severity(), None);
    }

    #[test]
    fn validation_summary_reports_worst_severity() {
        let summary = ValidationSummary {
            findings: vec![
                ValidationResult::new("a", Severity::Low, "low"),
                ValidationResult::new("b", Severity::High, "high"),
            ],
        };
        assert!(!summary.is_clean());
        assert_eq!(summary.worst_severity(), Some(Severity::High));
    }
}
