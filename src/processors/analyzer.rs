//! Single-pass metadata analyzer (§4.3.3).

use super::Processor;
use crate::ast::{Ast, AstKind};
use crate::context::{AnalysisSummary, OperationKind, ParsedAst, ProcessingContext};
use crate::error::Result;
use compact_str::CompactString;
use core::ops::ControlFlow;
use sqlparser::ast::{visit_relations, Expr, Statement};

pub struct Analyzer;

fn operation_kind_of(kind: AstKind) -> OperationKind {
    match kind {
        AstKind::Select => OperationKind::Select,
        AstKind::Insert => OperationKind::Insert,
        AstKind::Update => OperationKind::Update,
        AstKind::Delete => OperationKind::Delete,
        AstKind::Merge => OperationKind::Merge,
        AstKind::Command => OperationKind::Ddl,
        AstKind::Script => OperationKind::Script,
        AstKind::Other => OperationKind::Other,
    }
}

fn subquery_depth(statement: &Statement) -> usize {
    let mut max_depth = 0usize;
    fn walk(expr: &Expr, current: usize, max_depth: &mut usize) {
        if let Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. } = expr {
            *max_depth = (*max_depth).max(current + 1);
        }
    }
    let mut depth_tracker = 0usize;
    sqlparser::ast::visit_expressions(statement, |expr| {
        if matches!(expr, Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. }) {
            depth_tracker += 1;
        }
        walk(expr, depth_tracker, &mut max_depth);
        ControlFlow::<()>::Continue(())
    });
    max_depth
}

fn analyze_one(ast: &Ast) -> AnalysisSummary {
    let mut summary = AnalysisSummary {
        operation_kind: Some(operation_kind_of(ast.kind())),
        ..Default::default()
    };

    let mut tables = Vec::new();
    visit_relations(ast.statement(), |relation| {
        tables.push(CompactString::from(relation.to_string()));
        ControlFlow::<()>::Continue(())
    });
    summary.tables = tables;

    for table in ast.from_tables() {
        for join in &table.joins {
            summary.join_count += 1;
            summary
                .join_kinds
                .push(CompactString::from(format!("{:?}", join.join_operator)));
        }
    }

    summary.has_where = match ast.statement() {
        Statement::Query(query) => matches!(
            query.body.as_ref(),
            sqlparser::ast::SetExpr::Select(select) if select.selection.is_some()
        ),
        Statement::Update { selection, .. } => selection.is_some(),
        Statement::Delete(delete) => delete.selection.is_some(),
        _ => false,
    };

    summary.has_limit = matches!(
        ast.statement(),
        Statement::Query(query) if matches!(
            query.limit_clause,
            Some(sqlparser::ast::LimitClause::LimitOffset { limit: Some(_), .. })
        )
    );

    for item in ast.projection() {
        if let sqlparser::ast::SelectItem::UnnamedExpr(Expr::Identifier(ident))
        | sqlparser::ast::SelectItem::ExprWithAlias {
            expr: Expr::Identifier(ident),
            ..
        } = item
        {
            summary.columns.push(CompactString::from(ident.value.as_str()));
        }
    }

    summary.subquery_depth = subquery_depth(ast.statement());

    summary
}

impl Processor for Analyzer {
    fn name(&self) -> &'static str {
        "analyzer"
    }

    fn should_run(&self, ctx: &ProcessingContext) -> bool {
        ctx.configuration.enable_analysis && !matches!(ctx.ast, ParsedAst::None)
    }

    fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        let mut combined = AnalysisSummary::default();
        match &ctx.ast {
            ParsedAst::Single(ast) => {
                combined = analyze_one(ast);
            }
            ParsedAst::Script(script) => {
                combined.operation_kind = Some(OperationKind::Script);
                for ast in script.statements() {
                    let piece = analyze_one(ast);
                    combined.tables.extend(piece.tables);
                    combined.columns.extend(piece.columns);
                    combined.join_count += piece.join_count;
                    combined.join_kinds.extend(piece.join_kinds);
                    combined.subquery_depth = combined.subquery_depth.max(piece.subquery_depth);
                    combined.has_where |= piece.has_where;
                    combined.has_limit |= piece.has_limit;
                }
            }
            ParsedAst::None => {}
        }
        ctx.analysis = combined;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::processors::Processor;

    fn analyzed(sql: &str) -> AnalysisSummary {
        let config = Configuration::new("postgres").shared();
        let mut ctx = ProcessingContext::new(config.clone(), sql, false, false);
        let dialect = crate::ast::resolve_dialect(&config.dialect);
        let parsed = crate::ast::parse(sql, dialect.as_ref(), false).unwrap();
        match parsed {
            crate::ast::ParsedInput::Single(ast) => ctx.ast = ParsedAst::Single(ast),
            crate::ast::ParsedInput::Script(script) => ctx.ast = ParsedAst::Script(script),
        }
        Analyzer.process(&mut ctx).unwrap();
        ctx.analysis
    }

    #[test]
    fn classifies_operation_kind() {
        assert_eq!(analyzed("SELECT 1").operation_kind, Some(OperationKind::Select));
        assert_eq!(analyzed("DELETE FROM t").operation_kind, Some(OperationKind::Delete));
    }

    #[test]
    fn counts_joins_and_detects_where_limit() {
        let summary = analyzed("SELECT * FROM a JOIN b ON a.id = b.id WHERE a.x = 1 LIMIT 10");
        assert_eq!(summary.join_count, 1);
        assert!(summary.has_where);
        assert!(summary.has_limit);
    }

    #[test]
    fn detects_subquery_depth() {
        let summary = analyzed("SELECT * FROM a WHERE id IN (SELECT id FROM b WHERE x IN (SELECT x FROM c))");
        assert_eq!(summary.subquery_depth, 2);
    }

    #[test]
    fn collects_table_names() {
        let summary = analyzed("SELECT * FROM users");
        assert!(summary.tables.iter().any(|t| t.as_str() == "users"));
    }
}
