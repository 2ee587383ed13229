//! Thin interface around `sqlparser` (§4.2): parse, render, walk, `supports`,
//! and structural `replace` for the handful of clauses the builder and
//! filters need to add.
//!
//! Deliberately does not expose `sqlparser`'s types in the public surface
//! (no `pub use sqlparser::...`) — callers go through `AstKind`/`AstOp`/`Ast`
//! so a future parser swap only touches this module.

pub mod script;

use crate::error::{Result, Span, SqlSpecError};
use compact_str::CompactString;
use sqlparser::ast::{
    Expr, GroupByExpr, Offset, OffsetRows, OrderBy, OrderByExpr, OrderByKind, Query, Select,
    SelectItem, SetExpr, Statement, TableWithJoins,
};
use sqlparser::dialect::{
    AnsiDialect, BigQueryDialect, Dialect, DuckDbDialect, GenericDialect, MySqlDialect,
    PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::Parser;

pub use script::Script;

/// The coarse shape of a parsed statement (§3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Script,
    Command,
    Other,
}

/// Clauses `supports` can be asked about (§3.4, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstOp {
    Where,
    Limit,
    Offset,
    OrderBy,
    GroupBy,
    Having,
}

/// Resolves a configured dialect name to the `sqlparser` dialect it maps to.
///
/// `GenericDialect` is the fallback for names sqlspec doesn't special-case —
/// it accepts the broadest placeholder/keyword surface, which is the safer
/// default for an unrecognized string than refusing to parse at all.
pub fn resolve_dialect(name: &str) -> Box<dyn Dialect> {
    match name.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Box::new(PostgreSqlDialect {}),
        "mysql" | "mariadb" => Box::new(MySqlDialect {}),
        "sqlite" => Box::new(SQLiteDialect {}),
        "duckdb" => Box::new(DuckDbDialect {}),
        "bigquery" => Box::new(BigQueryDialect {}),
        "ansi" => Box::new(AnsiDialect {}),
        _ => Box::new(GenericDialect {}),
    }
}

/// A single parsed statement.
#[derive(Debug, Clone)]
pub struct Ast {
    pub(crate) inner: Statement,
}

/// The result of `parse`: either one statement or a script of several.
pub enum ParsedInput {
    Single(Ast),
    Script(Script),
}

fn kind_of(statement: &Statement) -> AstKind {
    match statement {
        Statement::Query(_) => AstKind::Select,
        Statement::Insert(_) => AstKind::Insert,
        Statement::Update { .. } => AstKind::Update,
        Statement::Delete(_) => AstKind::Delete,
        Statement::Merge { .. } => AstKind::Merge,
        Statement::CreateTable(_)
        | Statement::AlterTable { .. }
        | Statement::Drop { .. }
        | Statement::CreateIndex(_)
        | Statement::CreateView { .. }
        | Statement::Truncate { .. } => AstKind::Command,
        _ => AstKind::Other,
    }
}

/// Parses `sql` under `dialect`. With `as_script` false, more than one
/// top-level statement is an error from this function's point of view —
/// callers that want auto-detection call `parse` once, inspect the
/// statement count, and re-invoke with `as_script: true` (§4.2, §4.4 step 1).
pub fn parse(sql: &str, dialect: &dyn Dialect, as_script: bool) -> Result<ParsedInput> {
    let statements = Parser::parse_sql(dialect, sql).map_err(|err| SqlSpecError::ParseError {
        span: None,
        message: CompactString::from(err.to_string()),
        source_snippet: CompactString::from(snippet(sql)),
    })?;

    if statements.is_empty() {
        return Err(SqlSpecError::EmptyStatement);
    }

    if statements.len() > 1 && !as_script {
        // Caller didn't ask for script mode; surface this as a parse error so
        // the compiler's script-detection step can retry explicitly rather
        // than silently guessing.
        return Err(SqlSpecError::ParseError {
            span: None,
            message: CompactString::from(
                "input contains more than one statement; re-parse with as_script",
            ),
            source_snippet: CompactString::from(snippet(sql)),
        });
    }

    if as_script {
        let children = statements.into_iter().map(|inner| Ast { inner }).collect();
        Ok(ParsedInput::Script(Script::new(children)))
    } else {
        let inner = statements.into_iter().next().expect("checked non-empty");
        Ok(ParsedInput::Single(Ast { inner }))
    }
}

/// Builds a bare column-reference `Expr`, used by `Filter::apply` to turn an
/// `OrderTerm`'s column name into a genuine AST node without reparsing.
pub(crate) fn ident_expr(name: &str) -> Expr {
    match name.split_once('.') {
        Some((table, column)) => Expr::CompoundIdentifier(vec![
            sqlparser::ast::Ident::new(table),
            sqlparser::ast::Ident::new(column),
        ]),
        None => Expr::Identifier(sqlparser::ast::Ident::new(name)),
    }
}

/// Parses a standalone expression fragment (e.g. a rendered `Cond`) under
/// `dialect`, for filters that graft a predicate onto an already-parsed AST
/// rather than a fresh statement (§4.7 filter half).
pub(crate) fn parse_expr_fragment(text: &str, dialect: &dyn Dialect) -> Result<Expr> {
    let mut parser = Parser::new(dialect).try_with_sql(text).map_err(|err| SqlSpecError::ParseError {
        span: None,
        message: CompactString::from(err.to_string()),
        source_snippet: CompactString::from(snippet(text)),
    })?;
    parser.parse_expr().map_err(|err| SqlSpecError::ParseError {
        span: None,
        message: CompactString::from(err.to_string()),
        source_snippet: CompactString::from(snippet(text)),
    })
}

fn snippet(sql: &str) -> String {
    const MAX: usize = 80;
    if sql.len() <= MAX {
        sql.to_string()
    } else {
        format!("{}…", &sql[..MAX])
    }
}

impl Ast {
    pub fn kind(&self) -> AstKind {
        kind_of(&self.inner)
    }

    /// Deterministic serialization. `sqlparser`'s `Display` already renders
    /// using the keyword/quoting conventions baked in at parse time, so no
    /// further dialect parameter is needed to round-trip the same text back.
    pub fn render(&self) -> CompactString {
        CompactString::from(self.inner.to_string())
    }

    pub fn span(&self) -> Option<Span> {
        None
    }

    pub fn statement(&self) -> &Statement {
        &self.inner
    }

    pub fn statement_mut(&mut self) -> &mut Statement {
        &mut self.inner
    }

    fn select_mut(&mut self) -> Option<&mut Select> {
        if let Statement::Query(query) = &mut self.inner {
            if let SetExpr::Select(select) = query.body.as_mut() {
                return Some(select.as_mut());
            }
        }
        None
    }

    fn query_mut(&mut self) -> Option<&mut Query> {
        if let Statement::Query(query) = &mut self.inner {
            Some(query.as_mut())
        } else {
            None
        }
    }

    pub fn supports(&self, op: AstOp) -> bool {
        match (&self.inner, op) {
            (Statement::Query(query), AstOp::Limit | AstOp::Offset) => {
                let _ = query;
                matches!(self.inner, Statement::Query(_))
            }
            (Statement::Query(query), AstOp::OrderBy) => {
                let _ = query;
                true
            }
            (Statement::Query(query), AstOp::Where | AstOp::GroupBy | AstOp::Having) => {
                matches!(query.body.as_ref(), SetExpr::Select(_))
            }
            (Statement::Update { .. }, AstOp::Where) => true,
            (Statement::Delete(_), AstOp::Where) => true,
            _ => false,
        }
    }

    /// Adds (ANDs in) a `WHERE` predicate. Returns `StyleNotSupported`-shaped
    /// failure via `supports` being false is the caller's job to check first;
    /// this always succeeds structurally once `supports(Where)` held.
    pub fn with_where(&self, predicate: Expr) -> Ast {
        let mut clone = self.clone();
        match &mut clone.inner {
            Statement::Query(query) => {
                if let SetExpr::Select(select) = query.body.as_mut() {
                    select.selection = Some(match select.selection.take() {
                        Some(existing) => Expr::BinaryOp {
                            left: Box::new(existing),
                            op: sqlparser::ast::BinaryOperator::And,
                            right: Box::new(predicate),
                        },
                        None => predicate,
                    });
                }
            }
            Statement::Update { selection, .. } => {
                *selection = Some(match selection.take() {
                    Some(existing) => Expr::BinaryOp {
                        left: Box::new(existing),
                        op: sqlparser::ast::BinaryOperator::And,
                        right: Box::new(predicate),
                    },
                    None => predicate,
                });
            }
            Statement::Delete(delete) => {
                delete.selection = Some(match delete.selection.take() {
                    Some(existing) => Expr::BinaryOp {
                        left: Box::new(existing),
                        op: sqlparser::ast::BinaryOperator::And,
                        right: Box::new(predicate),
                    },
                    None => predicate,
                });
            }
            _ => {}
        }
        clone
    }

    pub fn with_order_by(&self, exprs: Vec<OrderByExpr>) -> Ast {
        let mut clone = self.clone();
        if let Some(query) = clone.query_mut() {
            query.order_by = Some(OrderBy {
                kind: OrderByKind::Expressions(exprs),
                interpolate: None,
            });
        }
        clone
    }

    pub fn with_group_by(&self, exprs: Vec<Expr>) -> Ast {
        let mut clone = self.clone();
        if let Some(select) = clone.select_mut() {
            select.group_by = GroupByExpr::Expressions(exprs, Vec::new());
        }
        clone
    }

    pub fn with_having(&self, predicate: Expr) -> Ast {
        let mut clone = self.clone();
        if let Some(select) = clone.select_mut() {
            select.having = Some(match select.having.take() {
                Some(existing) => Expr::BinaryOp {
                    left: Box::new(existing),
                    op: sqlparser::ast::BinaryOperator::And,
                    right: Box::new(predicate),
                },
                None => predicate,
            });
        }
        clone
    }

    pub fn with_limit(&self, n: Expr) -> Ast {
        let mut clone = self.clone();
        if let Some(query) = clone.query_mut() {
            query.limit_clause = Some(sqlparser::ast::LimitClause::LimitOffset {
                limit: Some(n),
                offset: None,
                limit_by: Vec::new(),
            });
        }
        clone
    }

    pub fn with_offset(&self, n: Expr) -> Ast {
        let mut clone = self.clone();
        if let Some(query) = clone.query_mut() {
            let offset = Offset {
                value: n,
                rows: OffsetRows::None,
            };
            query.limit_clause = match query.limit_clause.take() {
                Some(sqlparser::ast::LimitClause::LimitOffset { limit, limit_by, .. }) => {
                    Some(sqlparser::ast::LimitClause::LimitOffset {
                        limit,
                        offset: Some(offset),
                        limit_by,
                    })
                }
                other => other.or(Some(sqlparser::ast::LimitClause::LimitOffset {
                    limit: None,
                    offset: Some(offset),
                    limit_by: Vec::new(),
                })),
            };
        }
        clone
    }

    pub fn projection(&self) -> &[SelectItem] {
        match &self.inner {
            Statement::Query(query) => match query.body.as_ref() {
                SetExpr::Select(select) => &select.projection,
                _ => &[],
            },
            _ => &[],
        }
    }

    pub fn from_tables(&self) -> &[TableWithJoins] {
        match &self.inner {
            Statement::Query(query) => match query.body.as_ref() {
                SetExpr::Select(select) => &select.from,
                _ => &[],
            },
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_multiple_statements_without_script() {
        let dialect = resolve_dialect("sqlite");
        let err = parse("SELECT 1; SELECT 2;", dialect.as_ref(), false).unwrap_err();
        assert!(matches!(err, SqlSpecError::ParseError { .. }));
    }

    #[test]
    fn parse_script_mode_collects_children() {
        let dialect = resolve_dialect("sqlite");
        match parse("SELECT 1; SELECT 2;", dialect.as_ref(), true).unwrap() {
            ParsedInput::Script(script) => assert_eq!(script.statements().len(), 2),
            _ => panic!("expected script"),
        }
    }

    #[test]
    fn kind_reports_select() {
        let dialect = resolve_dialect("sqlite");
        match parse("SELECT 1", dialect.as_ref(), false).unwrap() {
            ParsedInput::Single(ast) => assert_eq!(ast.kind(), AstKind::Select),
            _ => panic!("expected single"),
        }
    }

    #[test]
    fn supports_where_on_select_but_not_limit_clause_gate() {
        let dialect = resolve_dialect("sqlite");
        match parse("SELECT 1", dialect.as_ref(), false).unwrap() {
            ParsedInput::Single(ast) => {
                assert!(ast.supports(AstOp::Where));
                assert!(ast.supports(AstOp::Limit));
            }
            _ => panic!("expected single"),
        }
    }
}
