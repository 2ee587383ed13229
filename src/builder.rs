//! Fluent programmatic SQL construction (§4.7).
//!
//! Each operation is pure (`self -> Self`, never `&mut self`): every method
//! takes the builder by value and returns a new one, mirroring the teacher's
//! chunk-based `SQL` fragment builder (`core/src/sql/mod.rs`, `SQL::ident` /
//! `SQL::raw` / `SQL::param`) — three kinds of fragment (identifier, literal
//! structure, bound parameter) composed left to right.
//!
//! Column references and comparisons never let a caller-supplied *value*
//! reach the assembled text as a literal: every value passed to a [`Column`]
//! comparison is minted a fresh named placeholder (`p0`, `p1`, …) by
//! [`ParamSink`], exactly as §4.7 specifies. The surrounding statement shape
//! (which table, which columns, which join kind) is still assembled as text
//! fragments of trusted, caller-chosen identifiers — the same chunk-then-join
//! approach the teacher's `SQL` type uses — and handed to the single shared
//! parser (`crate::ast::parse`) to produce the genuine AST the rest of the
//! pipeline already trusts, rather than hand-constructing every `sqlparser`
//! statement-node variant a second time.

use crate::ast::{self, Ast, ParsedInput};
use crate::config::Configuration;
use crate::error::{Result, SqlSpecError};
use crate::statement::Statement;
use crate::value::{ParamPayload, TypedValue, Value};
use compact_str::CompactString;
use std::sync::Arc;

/// Mints auto-generated named placeholders (`p0`, `p1`, …) and accumulates
/// their bound values, in the order they were requested (§4.7).
pub(crate) struct ParamSink {
    bound: Vec<(CompactString, Value)>,
    prefix: CompactString,
}

impl ParamSink {
    pub(crate) fn new(prefix: impl Into<CompactString>) -> Self {
        Self { bound: Vec::new(), prefix: prefix.into() }
    }

    fn bind(&mut self, value: Value) -> CompactString {
        let name = CompactString::from(format!("{}{}", self.prefix, self.bound.len()));
        self.bound.push((name.clone(), value));
        name
    }

    pub(crate) fn into_bound(self) -> Vec<(CompactString, Value)> {
        self.bound
    }
}

impl Default for ParamSink {
    fn default() -> Self {
        Self::new("p")
    }
}

/// A predicate or scalar expression built from [`Column`] methods. Rendered
/// lazily against a [`ParamSink`] so that two predicates composed with
/// [`and`]/[`or`] share one sink and a stable placeholder numbering.
#[derive(Clone)]
pub struct Cond(Arc<dyn Fn(&mut ParamSink) -> String + Send + Sync>);

impl Cond {
    pub(crate) fn render(&self, sink: &mut ParamSink) -> String {
        (self.0)(sink)
    }
}

fn quote_ident(name: &str) -> String {
    if let Some((table, column)) = name.split_once('.') {
        format!("{table}.{column}")
    } else {
        name.to_string()
    }
}

/// A column reference, the starting point for comparison builders (§4.7).
#[derive(Clone)]
pub struct Column(CompactString);

/// Starts a column reference. Accepts `"col"` or `"table.col"`.
pub fn col(name: impl Into<CompactString>) -> Column {
    Column(name.into())
}

macro_rules! binary_cmp {
    ($name:ident, $op:literal) => {
        pub fn $name(self, value: impl Into<Value>) -> Cond {
            let ident = self.0;
            let value = value.into();
            Cond(Arc::new(move |sink: &mut ParamSink| {
                let name = sink.bind(value.clone());
                format!("{} {} :{}", quote_ident(&ident), $op, name)
            }))
        }
    };
}

impl Column {
    binary_cmp!(eq, "=");
    binary_cmp!(ne, "<>");
    binary_cmp!(lt, "<");
    binary_cmp!(lte, "<=");
    binary_cmp!(gt, ">");
    binary_cmp!(gte, ">=");
    binary_cmp!(like, "LIKE");

    pub fn is_null(self) -> Cond {
        let ident = self.0;
        Cond(Arc::new(move |_sink| format!("{} IS NULL", quote_ident(&ident))))
    }

    pub fn is_not_null(self) -> Cond {
        let ident = self.0;
        Cond(Arc::new(move |_sink| format!("{} IS NOT NULL", quote_ident(&ident))))
    }

    /// `IN (...)`, bound as one named placeholder per value.
    pub fn in_list(self, values: impl IntoIterator<Item = impl Into<Value>>) -> Cond {
        let ident = self.0;
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Cond(Arc::new(move |sink: &mut ParamSink| {
            let names: Vec<String> = values
                .iter()
                .cloned()
                .map(|v| format!(":{}", sink.bind(v)))
                .collect();
            format!("{} IN ({})", quote_ident(&ident), names.join(", "))
        }))
    }

}

/// `a AND b AND ...`.
pub fn and(conds: impl IntoIterator<Item = Cond>) -> Cond {
    let conds: Vec<Cond> = conds.into_iter().collect();
    Cond(Arc::new(move |sink: &mut ParamSink| {
        conds
            .iter()
            .map(|c| format!("({})", c.render(sink)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }))
}

/// `a OR b OR ...`.
pub fn or(conds: impl IntoIterator<Item = Cond>) -> Cond {
    let conds: Vec<Cond> = conds.into_iter().collect();
    Cond(Arc::new(move |sink: &mut ParamSink| {
        conds
            .iter()
            .map(|c| format!("({})", c.render(sink)))
            .collect::<Vec<_>>()
            .join(" OR ")
    }))
}

/// An ascending/descending order-by term.
#[derive(Clone)]
pub struct OrderTerm {
    column: CompactString,
    descending: bool,
}

pub fn asc(column: impl Into<CompactString>) -> OrderTerm {
    OrderTerm { column: column.into(), descending: false }
}

pub fn desc(column: impl Into<CompactString>) -> OrderTerm {
    OrderTerm { column: column.into(), descending: true }
}

impl OrderTerm {
    pub(crate) fn column(&self) -> &str {
        &self.column
    }

    pub(crate) fn is_descending(&self) -> bool {
        self.descending
    }
}

#[derive(Clone, Copy)]
enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

#[derive(Clone)]
struct JoinSpec {
    kind: JoinKind,
    table: CompactString,
    on: Cond,
}

/// Builds a `SELECT` statement (§4.7).
#[derive(Clone)]
pub struct SelectBuilder {
    columns: Vec<CompactString>,
    table: CompactString,
    joins: Vec<JoinSpec>,
    selection: Option<Cond>,
    group_by: Vec<CompactString>,
    having: Option<Cond>,
    order_by: Vec<OrderTerm>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Starts a `SELECT <cols> FROM ...` builder.
pub fn select(columns: impl IntoIterator<Item = impl Into<CompactString>>) -> SelectBuilder {
    SelectBuilder {
        columns: columns.into_iter().map(Into::into).collect(),
        table: CompactString::new(""),
        joins: Vec::new(),
        selection: None,
        group_by: Vec::new(),
        having: None,
        order_by: Vec::new(),
        limit: None,
        offset: None,
    }
}

impl SelectBuilder {
    pub fn from(mut self, table: impl Into<CompactString>) -> Self {
        self.table = table.into();
        self
    }

    fn join(mut self, kind: JoinKind, table: impl Into<CompactString>, on: Cond) -> Self {
        self.joins.push(JoinSpec { kind, table: table.into(), on });
        self
    }

    pub fn inner_join(self, table: impl Into<CompactString>, on: Cond) -> Self {
        self.join(JoinKind::Inner, table, on)
    }
    pub fn left_join(self, table: impl Into<CompactString>, on: Cond) -> Self {
        self.join(JoinKind::Left, table, on)
    }
    pub fn right_join(self, table: impl Into<CompactString>, on: Cond) -> Self {
        self.join(JoinKind::Right, table, on)
    }
    pub fn full_join(self, table: impl Into<CompactString>, on: Cond) -> Self {
        self.join(JoinKind::Full, table, on)
    }

    pub fn where_(mut self, predicate: Cond) -> Self {
        self.selection = Some(predicate);
        self
    }

    pub fn group_by(mut self, columns: impl IntoIterator<Item = impl Into<CompactString>>) -> Self {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn having(mut self, predicate: Cond) -> Self {
        self.having = Some(predicate);
        self
    }

    pub fn order_by(mut self, terms: impl IntoIterator<Item = OrderTerm>) -> Self {
        self.order_by = terms.into_iter().collect();
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Renders the statement text and the bound named parameters, minting
    /// placeholders in clause-declaration order (WHERE, then GROUP BY/HAVING,
    /// then ORDER BY — group by/order by columns bind nothing).
    fn render(&self) -> (String, Vec<(CompactString, Value)>) {
        let mut sink = ParamSink::default();
        let cols = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
        };
        let mut sql = format!("SELECT {cols} FROM {}", quote_ident(&self.table));
        for join in &self.joins {
            let on = join.on.render(&mut sink);
            sql.push_str(&format!(" {} {} ON {on}", join.kind.keyword(), quote_ident(&join.table)));
        }
        if let Some(predicate) = &self.selection {
            sql.push_str(&format!(" WHERE {}", predicate.render(&mut sink)));
        }
        if !self.group_by.is_empty() {
            let cols = self.group_by.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
            sql.push_str(&format!(" GROUP BY {cols}"));
        }
        if let Some(predicate) = &self.having {
            sql.push_str(&format!(" HAVING {}", predicate.render(&mut sink)));
        }
        if !self.order_by.is_empty() {
            let terms = self
                .order_by
                .iter()
                .map(|t| format!("{} {}", quote_ident(&t.column), if t.descending { "DESC" } else { "ASC" }))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {terms}"));
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        if let Some(n) = self.offset {
            sql.push_str(&format!(" OFFSET {n}"));
        }
        (sql, sink.bound)
    }

    /// Parses the assembled skeleton into a genuine AST and wraps it as a
    /// `Statement` whose raw input is already an AST — the compiler skips
    /// parsing and goes straight to transformers (§4.7).
    pub fn to_statement(&self, config: Arc<Configuration>) -> Result<Statement> {
        let (sql, bound) = self.render();
        build_ast_statement(&sql, &config, bound)
    }
}

/// Builds an `INSERT INTO table (cols) VALUES (...)` statement.
pub fn insert(table: impl Into<CompactString>) -> InsertBuilder {
    InsertBuilder { table: table.into(), columns: Vec::new(), values: Vec::new() }
}

pub struct InsertBuilder {
    table: CompactString,
    columns: Vec<CompactString>,
    values: Vec<Value>,
}

impl InsertBuilder {
    pub fn values(
        mut self,
        pairs: impl IntoIterator<Item = (impl Into<CompactString>, impl Into<Value>)>,
    ) -> Self {
        for (column, value) in pairs {
            self.columns.push(column.into());
            self.values.push(value.into());
        }
        self
    }

    fn render(&self) -> (String, Vec<(CompactString, Value)>) {
        let mut sink = ParamSink::default();
        let cols = self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let placeholders: Vec<String> = self
            .values
            .iter()
            .cloned()
            .map(|v| format!(":{}", sink.bind(v)))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({cols}) VALUES ({})",
            quote_ident(&self.table),
            placeholders.join(", ")
        );
        (sql, sink.bound)
    }

    pub fn to_statement(&self, config: Arc<Configuration>) -> Result<Statement> {
        let (sql, bound) = self.render();
        build_ast_statement(&sql, &config, bound)
    }
}

/// Builds an `UPDATE table SET ... WHERE ...` statement.
pub fn update(table: impl Into<CompactString>) -> UpdateBuilder {
    UpdateBuilder { table: table.into(), assignments: Vec::new(), selection: None }
}

pub struct UpdateBuilder {
    table: CompactString,
    assignments: Vec<(CompactString, Value)>,
    selection: Option<Cond>,
}

impl UpdateBuilder {
    pub fn set(
        mut self,
        pairs: impl IntoIterator<Item = (impl Into<CompactString>, impl Into<Value>)>,
    ) -> Self {
        for (column, value) in pairs {
            self.assignments.push((column.into(), value.into()));
        }
        self
    }

    pub fn where_(mut self, predicate: Cond) -> Self {
        self.selection = Some(predicate);
        self
    }

    fn render(&self) -> (String, Vec<(CompactString, Value)>) {
        let mut sink = ParamSink::default();
        let assignments: Vec<String> = self
            .assignments
            .iter()
            .cloned()
            .map(|(col, value)| format!("{} = :{}", quote_ident(&col), sink.bind(value)))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", quote_ident(&self.table), assignments.join(", "));
        if let Some(predicate) = &self.selection {
            sql.push_str(&format!(" WHERE {}", predicate.render(&mut sink)));
        }
        (sql, sink.bound)
    }

    pub fn to_statement(&self, config: Arc<Configuration>) -> Result<Statement> {
        let (sql, bound) = self.render();
        build_ast_statement(&sql, &config, bound)
    }
}

/// Builds a `DELETE FROM table WHERE ...` statement.
pub fn delete(table: impl Into<CompactString>) -> DeleteBuilder {
    DeleteBuilder { table: table.into(), selection: None }
}

pub struct DeleteBuilder {
    table: CompactString,
    selection: Option<Cond>,
}

impl DeleteBuilder {
    pub fn where_(mut self, predicate: Cond) -> Self {
        self.selection = Some(predicate);
        self
    }

    fn render(&self) -> (String, Vec<(CompactString, Value)>) {
        let mut sink = ParamSink::default();
        let mut sql = format!("DELETE FROM {}", quote_ident(&self.table));
        if let Some(predicate) = &self.selection {
            sql.push_str(&format!(" WHERE {}", predicate.render(&mut sink)));
        }
        (sql, sink.bound)
    }

    pub fn to_statement(&self, config: Arc<Configuration>) -> Result<Statement> {
        let (sql, bound) = self.render();
        build_ast_statement(&sql, &config, bound)
    }
}

/// Builds a `MERGE INTO target USING source ON ...` statement (§4.7).
///
/// `sqlparser`'s `MERGE` grammar support is comparatively young and its
/// clause ordering is strict (`WHEN MATCHED ... WHEN NOT MATCHED ...`), so
/// this builder accumulates clauses in the caller's order and requires at
/// least one `when_matched`/`when_not_matched` before rendering.
pub fn merge(target: impl Into<CompactString>) -> MergeBuilder {
    MergeBuilder {
        target: target.into(),
        source: CompactString::new(""),
        on: None,
        matched: Vec::new(),
        not_matched: Vec::new(),
    }
}

pub struct MergeBuilder {
    target: CompactString,
    source: CompactString,
    on: Option<Cond>,
    matched: Vec<CompactString>,
    not_matched: Vec<CompactString>,
}

impl MergeBuilder {
    pub fn using(mut self, source: impl Into<CompactString>) -> Self {
        self.source = source.into();
        self
    }

    pub fn on(mut self, predicate: Cond) -> Self {
        self.on = Some(predicate);
        self
    }

    /// `WHEN MATCHED THEN <action>`, e.g. `"UPDATE SET total = source.total"`.
    pub fn when_matched(mut self, action: impl Into<CompactString>) -> Self {
        self.matched.push(action.into());
        self
    }

    /// `WHEN NOT MATCHED THEN <action>`, e.g. `"INSERT (id) VALUES (source.id)"`.
    pub fn when_not_matched(mut self, action: impl Into<CompactString>) -> Self {
        self.not_matched.push(action.into());
        self
    }

    fn render(&self) -> (String, Vec<(CompactString, Value)>) {
        let mut sink = ParamSink::default();
        let on = self
            .on
            .as_ref()
            .map(|c| c.render(&mut sink))
            .unwrap_or_else(|| "1 = 1".to_string());
        let mut sql = format!(
            "MERGE INTO {} USING {} ON {on}",
            quote_ident(&self.target),
            quote_ident(&self.source)
        );
        for action in &self.matched {
            sql.push_str(&format!(" WHEN MATCHED THEN {action}"));
        }
        for action in &self.not_matched {
            sql.push_str(&format!(" WHEN NOT MATCHED THEN {action}"));
        }
        (sql, sink.bound)
    }

    pub fn to_statement(&self, config: Arc<Configuration>) -> Result<Statement> {
        let (sql, bound) = self.render();
        build_ast_statement(&sql, &config, bound)
    }
}

fn build_ast_statement(
    sql: &str,
    config: &Arc<Configuration>,
    bound: Vec<(CompactString, Value)>,
) -> Result<Statement> {
    let dialect = ast::resolve_dialect(&config.dialect);
    let ast = match ast::parse(sql, dialect.as_ref(), false)? {
        ParsedInput::Single(ast) => ast,
        ParsedInput::Script(_) => {
            return Err(SqlSpecError::CompilationInternal(
                "builder produced more than one statement".into(),
            ));
        }
    };
    let payload = ParamPayload::Named(
        bound
            .into_iter()
            .map(|(name, value)| (name, TypedValue::new(value)))
            .collect(),
    );
    Ok(Statement::from_ast(ast, payload, config.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[test]
    fn select_builder_renders_where_with_named_placeholder() {
        let config = Configuration::new("sqlite").shared();
        let stmt = select(["id", "name"])
            .from("users")
            .where_(col("id").eq(42i64))
            .limit(10)
            .to_statement(config)
            .unwrap();
        let compiled = stmt.compile().unwrap();
        assert!(compiled.rendered_sql.contains("SELECT"));
        assert_eq!(compiled.parameter_info.len(), 1);
    }

    #[test]
    fn insert_builder_binds_every_value() {
        let config = Configuration::new("sqlite").shared();
        let stmt = insert("users")
            .values([("id", Value::from(1i64)), ("name", Value::from("ada"))])
            .to_statement(config)
            .unwrap();
        let compiled = stmt.compile().unwrap();
        assert_eq!(compiled.parameter_info.len(), 2);
    }

    #[test]
    fn update_builder_combines_set_and_where() {
        let config = Configuration::new("sqlite").shared();
        let stmt = update("users")
            .set([("name", Value::from("ada"))])
            .where_(col("id").eq(1i64))
            .to_statement(config)
            .unwrap();
        let compiled = stmt.compile().unwrap();
        assert_eq!(compiled.parameter_info.len(), 2);
    }
}
