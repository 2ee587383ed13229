//! Validators, run in the declared order (§4.3.2).

use super::Processor;
use crate::ast::{AstKind, Ast};
use crate::context::{OperationKind, ParsedAst, ProcessingContext, ValidationResult};
use crate::error::{Result, Severity};
use core::ops::ControlFlow;
use sqlparser::ast::{visit_expressions, visit_relations, BinaryOperator, Expr, Statement, Value};

fn each_ast<'a>(ast: &'a ParsedAst) -> Vec<&'a Ast> {
    match ast {
        ParsedAst::Single(single) => vec![single],
        ParsedAst::Script(script) => script.statements().iter().collect(),
        ParsedAst::None => Vec::new(),
    }
}

/// Detects SQL-injection signals: tautologies in `WHERE` (`1=1`, `'a'='a'`),
/// blocklisted keywords, and comment-based obfuscation left over from
/// un-parsed input (only reachable when `enable_parsing` is false, since the
/// transformer stage already strips comments from the AST-rendered path).
pub struct SecurityValidator;

fn is_tautology(expr: &Expr) -> bool {
    if let Expr::BinaryOp { left, op: BinaryOperator::Eq, right } = expr {
        if let (Expr::Value(l), Expr::Value(r)) = (left.as_ref(), right.as_ref()) {
            return matches!(
                (&l.value, &r.value),
                (Value::Number(a, _), Value::Number(b, _)) if a == b
            ) || matches!(
                (&l.value, &r.value),
                (Value::SingleQuotedString(a), Value::SingleQuotedString(b)) if a == b
            );
        }
    }
    false
}

impl Processor for SecurityValidator {
    fn name(&self) -> &'static str {
        "security"
    }

    fn should_run(&self, ctx: &ProcessingContext) -> bool {
        ctx.configuration.enable_validation
    }

    fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        for ast in each_ast(&ctx.ast) {
            let mut found_tautology = false;
            visit_expressions(ast.statement(), |expr| {
                if is_tautology(expr) {
                    found_tautology = true;
                }
                ControlFlow::<()>::Continue(())
            });
            if found_tautology {
                ctx.validation_findings.push(ValidationResult::new(
                    "security.tautology",
                    Severity::High,
                    "WHERE clause contains a constant tautology",
                ));
            }
        }

        for keyword in &ctx.configuration.forbidden_keywords {
            if ctx
                .raw_sql
                .to_ascii_uppercase()
                .contains(keyword.to_ascii_uppercase().as_str())
            {
                ctx.validation_findings.push(ValidationResult::new(
                    "security.forbidden_keyword",
                    Severity::Critical,
                    format!("statement uses forbidden keyword `{keyword}`"),
                ));
            }
        }

        if !ctx.is_script {
            if let ParsedAst::Script(_) = ctx.ast {
                ctx.validation_findings.push(ValidationResult::new(
                    "security.undeclared_stacked_statements",
                    Severity::Critical,
                    "input contains multiple statements but was not declared as a script",
                ));
            }
        }

        Ok(())
    }
}

/// Requires `WHERE` on `UPDATE`/`DELETE`, forbids DDL when configured, blocks
/// access to `protected_tables`, classifies the statement.
pub struct DmlSafetyValidator;

fn touched_tables(statement: &Statement) -> Vec<String> {
    let mut names = Vec::new();
    visit_relations(statement, |relation| {
        names.push(relation.to_string());
        ControlFlow::<()>::Continue(())
    });
    names
}

impl Processor for DmlSafetyValidator {
    fn name(&self) -> &'static str {
        "dml_safety"
    }

    fn should_run(&self, ctx: &ProcessingContext) -> bool {
        ctx.configuration.enable_validation && !matches!(ctx.ast, ParsedAst::None)
    }

    fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        for ast in each_ast(&ctx.ast) {
            match ast.kind() {
                AstKind::Update => {
                    if ctx.configuration.require_where_for_update && !has_where(ast.statement()) {
                        ctx.validation_findings.push(ValidationResult::new(
                            "dml_safety.update_without_where",
                            Severity::High,
                            "UPDATE without a WHERE clause",
                        ));
                    }
                }
                AstKind::Delete => {
                    if ctx.configuration.require_where_for_delete && !has_where(ast.statement()) {
                        ctx.validation_findings.push(ValidationResult::new(
                            "dml_safety.delete_without_where",
                            Severity::High,
                            "DELETE without a WHERE clause",
                        ));
                    }
                }
                AstKind::Command if !ctx.configuration.allow_ddl => {
                    ctx.validation_findings.push(ValidationResult::new(
                        "dml_safety.ddl_disallowed",
                        Severity::Critical,
                        "DDL statements are disallowed by configuration",
                    ));
                }
                _ => {}
            }

            if !ctx.configuration.protected_tables.is_empty() {
                for table in touched_tables(ast.statement()) {
                    let bare = table.rsplit('.').next().unwrap_or(&table);
                    if ctx
                        .configuration
                        .protected_tables
                        .iter()
                        .any(|protected| protected.eq_ignore_ascii_case(bare))
                    {
                        ctx.validation_findings.push(ValidationResult::new(
                            "dml_safety.protected_table",
                            Severity::Critical,
                            format!("statement touches protected table `{table}`"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn has_where(statement: &Statement) -> bool {
    match statement {
        Statement::Update { selection, .. } => selection.is_some(),
        Statement::Delete(delete) => delete.selection.is_some(),
        _ => true,
    }
}

/// Flags cartesian joins, excessive join counts, excessive subquery depth,
/// and `SELECT *` without a `LIMIT`.
pub struct PerformanceValidator;

impl Processor for PerformanceValidator {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn should_run(&self, ctx: &ProcessingContext) -> bool {
        ctx.configuration.enable_validation && !matches!(ctx.ast, ParsedAst::None)
    }

    fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        for ast in each_ast(&ctx.ast) {
            let tables = ast.from_tables();
            let mut join_count = 0usize;
            let mut cartesian = false;
            for table in tables {
                for join in &table.joins {
                    join_count += 1;
                    if matches!(
                        join.join_operator,
                        sqlparser::ast::JoinOperator::Join(sqlparser::ast::JoinConstraint::None)
                    ) {
                        cartesian = true;
                    }
                }
            }

            if cartesian {
                ctx.validation_findings.push(ValidationResult::new(
                    "performance.cartesian_join",
                    Severity::Medium,
                    "join has no ON/USING constraint",
                ));
            }

            if let Some(max_joins) = ctx.configuration.max_joins {
                if join_count > max_joins {
                    ctx.validation_findings.push(ValidationResult::new(
                        "performance.too_many_joins",
                        Severity::Low,
                        format!("statement has {join_count} joins, exceeding the configured {max_joins}"),
                    ));
                }
            }

            let has_star = ast
                .projection()
                .iter()
                .any(|item| matches!(item, sqlparser::ast::SelectItem::Wildcard(_)));
            if has_star && !has_limit(ast.statement()) {
                ctx.validation_findings.push(ValidationResult::new(
                    "performance.unbounded_select_star",
                    Severity::Low,
                    "SELECT * without a LIMIT clause",
                ));
            }
        }

        if let Some(max_depth) = ctx.configuration.max_subquery_depth {
            if ctx.analysis.subquery_depth > max_depth {
                ctx.validation_findings.push(ValidationResult::new(
                    "performance.subquery_too_deep",
                    Severity::Medium,
                    format!(
                        "subquery depth {} exceeds the configured {max_depth}",
                        ctx.analysis.subquery_depth
                    ),
                ));
            }
        }

        Ok(())
    }
}

fn has_limit(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::Query(query) if matches!(
            query.limit_clause,
            Some(sqlparser::ast::LimitClause::LimitOffset { limit: Some(_), .. })
        )
    )
}

/// Confirms every detected placeholder style lies in `allowed_parameter_styles`;
/// rejects mixing when `allow_mixed_parameter_styles` is false.
///
/// Runs against `parameter_info` rather than the AST — it fires after the
/// compiler's render step has populated that list from the final SQL text,
/// so in practice the compiler invokes this validator a second time outside
/// the normal transformer/validator ordering (§4.4 step 4 handles the first
/// pass against any placeholders visible pre-render; the authoritative check
/// happens once `parameter_info` is final).
pub struct ParameterStyleValidator;

impl Processor for ParameterStyleValidator {
    fn name(&self) -> &'static str {
        "parameter_style"
    }

    fn should_run(&self, ctx: &ProcessingContext) -> bool {
        ctx.configuration.enable_validation && !ctx.parameter_info.is_empty()
    }

    fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        let mut styles_seen = std::collections::HashSet::new();
        for info in &ctx.parameter_info {
            styles_seen.insert(info.style);
            if !ctx.configuration.allowed_parameter_styles.contains(&info.style) {
                return Err(crate::error::SqlSpecError::StyleNotSupported { style: info.style });
            }
        }
        if styles_seen.len() > 1 && !ctx.configuration.allow_mixed_parameter_styles {
            return Err(crate::error::SqlSpecError::MixedStyles {
                found: styles_seen.into_iter().collect(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::placeholder::PlaceholderStyle;

    fn context_for(sql: &str, config: std::sync::Arc<crate::config::Configuration>) -> ProcessingContext {
        let mut ctx = ProcessingContext::new(config.clone(), sql, false, false);
        let dialect = crate::ast::resolve_dialect(&config.dialect);
        match crate::ast::parse(sql, dialect.as_ref(), false).unwrap() {
            ParsedAst::Single(ast) => ctx.ast = ParsedAst::Single(ast),
            _ => unreachable!(),
        }
        ctx
    }

    #[test]
    fn security_validator_flags_tautology() {
        let config = Configuration::new("sqlite").shared();
        let mut ctx = context_for("SELECT * FROM t WHERE 1 = 1", config);
        SecurityValidator.process(&mut ctx).unwrap();
        assert!(ctx.validation_findings.iter().any(|f| f.kind.as_str() == "security.tautology"));
    }

    #[test]
    fn security_validator_flags_forbidden_keywords() {
        let mut config = Configuration::new("sqlite");
        config.forbidden_keywords.insert("DROP".into());
        let mut ctx = context_for("SELECT 1", config.shared());
        ctx.raw_sql = compact_str::CompactString::from("DROP TABLE users");
        SecurityValidator.process(&mut ctx).unwrap();
        assert!(ctx.validation_findings.iter().any(|f| f.kind.as_str() == "security.forbidden_keyword"));
    }

    #[test]
    fn dml_safety_flags_update_and_delete_without_where() {
        // require_where_for_update/delete default to true (Configuration::default).
        let config = Configuration::new("sqlite").shared();
        let mut ctx = context_for("UPDATE t SET a = 1", config.clone());
        DmlSafetyValidator.process(&mut ctx).unwrap();
        assert!(ctx.validation_findings.iter().any(|f| f.kind.as_str() == "dml_safety.update_without_where"));

        let mut ctx = context_for("DELETE FROM t", config);
        DmlSafetyValidator.process(&mut ctx).unwrap();
        assert!(ctx.validation_findings.iter().any(|f| f.kind.as_str() == "dml_safety.delete_without_where"));
    }

    #[test]
    fn dml_safety_flags_protected_tables() {
        let config = Configuration::new("sqlite").with_protected_tables(["secrets"]).shared();
        let mut ctx = context_for("SELECT * FROM secrets", config);
        DmlSafetyValidator.process(&mut ctx).unwrap();
        assert!(ctx.validation_findings.iter().any(|f| f.kind.as_str() == "dml_safety.protected_table"));
    }

    #[test]
    fn performance_validator_flags_cartesian_join_and_missing_limit() {
        let config = Configuration::new("sqlite").shared();
        let mut ctx = context_for("SELECT * FROM a JOIN b", config);
        PerformanceValidator.process(&mut ctx).unwrap();
        assert!(ctx.validation_findings.iter().any(|f| f.kind.as_str() == "performance.cartesian_join"));
        assert!(ctx.validation_findings.iter().any(|f| f.kind.as_str() == "performance.unbounded_select_star"));
    }

    #[test]
    fn parameter_style_validator_rejects_disallowed_style() {
        let mut config = Configuration::new("sqlite");
        config.allowed_parameter_styles = [PlaceholderStyle::Qmark].into_iter().collect();
        let mut ctx = ProcessingContext::new(config.shared(), "SELECT 1", false, false);
        ctx.parameter_info = vec![crate::placeholder::ParameterInfo::new(0, PlaceholderStyle::NumericDollar)];
        let err = ParameterStyleValidator.process(&mut ctx).unwrap_err();
        assert!(matches!(err, crate::error::SqlSpecError::StyleNotSupported { .. }));
    }

    #[test]
    fn parameter_style_validator_rejects_mixed_styles_by_default() {
        let config = Configuration::new("sqlite").shared();
        let mut ctx = ProcessingContext::new(config, "SELECT 1", false, false);
        ctx.parameter_info = vec![
            crate::placeholder::ParameterInfo::new(0, PlaceholderStyle::Qmark),
            crate::placeholder::ParameterInfo::new(1, PlaceholderStyle::NumericDollar),
        ];
        let err = ParameterStyleValidator.process(&mut ctx).unwrap_err();
        assert!(matches!(err, crate::error::SqlSpecError::MixedStyles { .. }));
    }
}
