//! The `Statement` object (§3.6, §4.5) and `Filter` (§4.7, filter half).
//!
//! A `Statement` is an immutable description of "one thing to compile" —
//! either raw SQL text or an already-parsed `Ast` handed in by the builder —
//! plus the configuration and parameters to compile it with. `compile()` is
//! lazy and idempotent: the first call runs the pipeline and publishes the
//! result atomically into a `OnceLock`; every later call (and every accessor)
//! returns the same `Arc<CompiledStatement>` without re-running anything.

use crate::ast::{self, Ast};
use crate::builder::{Cond, OrderTerm, ParamSink};
use crate::compiled::CompiledStatement;
use crate::compiled::ValidationSummary;
use crate::config::Configuration;
use crate::error::{Result, SqlSpecError};
use crate::value::{ExecParams, ParamPayload, Value};
use compact_str::CompactString;
use std::sync::{Arc, OnceLock};

/// One accumulated modification to an already-parsed AST (§4.7).
///
/// Filters are a deliberately narrow seam: each variant adds exactly one
/// clause, never an arbitrary tree edit. `Where` predicates still go through
/// the builder's `Cond`/`ParamSink` machinery, so a filter-bound value is
/// just as safely parameterized as a builder-bound one.
#[derive(Clone)]
pub enum Filter {
    Where(Cond),
    OrderBy(Vec<OrderTerm>),
    Limit(i64),
    Offset(i64),
    /// Prepends `WITH <name> AS (<query_sql>)` to the statement. Implemented
    /// by re-rendering the current AST to text and reparsing once, rather
    /// than constructing a `Query.with` clause by hand (§4.7 builder-design
    /// note in `builder.rs` applies here too).
    Cte { name: CompactString, query_sql: CompactString },
}

impl Filter {
    fn apply(
        &self,
        index: usize,
        ast: &Ast,
        dialect: &dyn sqlparser::dialect::Dialect,
    ) -> Result<(Ast, Vec<(CompactString, Value)>)> {
        match self {
            Filter::Where(cond) => {
                if !ast.supports(crate::ast::AstOp::Where) {
                    return Ok((ast.clone(), Vec::new()));
                }
                let mut sink = ParamSink::new(format!("f{index}_"));
                let rendered = cond.render(&mut sink);
                let expr = ast::parse_expr_fragment(&rendered, dialect)?;
                Ok((ast.with_where(expr), sink.into_bound()))
            }
            Filter::OrderBy(terms) => {
                if !ast.supports(crate::ast::AstOp::OrderBy) {
                    return Ok((ast.clone(), Vec::new()));
                }
                let exprs = terms
                    .iter()
                    .map(|term| sqlparser::ast::OrderByExpr {
                        expr: ast::ident_expr(term.column()),
                        options: sqlparser::ast::OrderByOptions {
                            asc: Some(!term.is_descending()),
                            nulls_first: None,
                        },
                        with_fill: None,
                    })
                    .collect();
                Ok((ast.with_order_by(exprs), Vec::new()))
            }
            Filter::Limit(n) => {
                if !ast.supports(crate::ast::AstOp::Limit) {
                    return Ok((ast.clone(), Vec::new()));
                }
                let expr = sqlparser::ast::Expr::Value(
                    sqlparser::ast::Value::Number(n.to_string(), false).into(),
                );
                Ok((ast.with_limit(expr), Vec::new()))
            }
            Filter::Offset(n) => {
                if !ast.supports(crate::ast::AstOp::Offset) {
                    return Ok((ast.clone(), Vec::new()));
                }
                let expr = sqlparser::ast::Expr::Value(
                    sqlparser::ast::Value::Number(n.to_string(), false).into(),
                );
                Ok((ast.with_offset(expr), Vec::new()))
            }
            Filter::Cte { name, query_sql } => {
                let rendered = ast.render();
                let with_cte = format!("WITH {name} AS ({query_sql}) {rendered}");
                match ast::parse(&with_cte, dialect, false)? {
                    crate::ast::ParsedInput::Single(ast) => Ok((ast, Vec::new())),
                    crate::ast::ParsedInput::Script(_) => Err(SqlSpecError::CompilationInternal(
                        "CTE filter produced more than one statement".into(),
                    )),
                }
            }
        }
    }
}

/// Applies `filters` in order, accumulating their bound values under a
/// per-filter-index namespace so two filters can never mint colliding
/// placeholder names.
pub(crate) fn apply_filters(
    ast: &Ast,
    filters: &[Filter],
    dialect: &dyn sqlparser::dialect::Dialect,
) -> Result<(Ast, Vec<(CompactString, Value)>)> {
    let mut current = ast.clone();
    let mut bound = Vec::new();
    for (index, filter) in filters.iter().enumerate() {
        let (next, mut filter_bound) = filter.apply(index, &current, dialect)?;
        current = next;
        bound.append(&mut filter_bound);
    }
    Ok((current, bound))
}

/// The raw input a `Statement` was built from (§3.6).
#[derive(Clone)]
pub(crate) enum Input {
    Sql(CompactString),
    Ast(Ast),
}

/// An immutable compilation unit: SQL (or an AST), its parameters, its
/// configuration, and an ordered list of filters to apply before compiling
/// (§3.6). `compile()` is the only place this ever turns into a
/// `CompiledStatement`; every other accessor goes through it.
pub struct Statement {
    pub(crate) input: Input,
    pub(crate) parameters: ParamPayload,
    pub(crate) config: Arc<Configuration>,
    pub(crate) filters: Vec<Filter>,
    pub(crate) is_script: bool,
    pub(crate) is_many: bool,
    pub(crate) is_batch: bool,
    compiled: OnceLock<Arc<CompiledStatement>>,
}

impl Statement {
    /// Builds a `Statement` from raw SQL text (§3.6 "constructed from SQL text
    /// plus a `ParamValue` plus a `Configuration`").
    pub fn new(
        sql: impl Into<CompactString>,
        parameters: ParamPayload,
        config: Arc<Configuration>,
    ) -> Self {
        let is_batch = parameters.is_batch();
        Self {
            input: Input::Sql(sql.into()),
            parameters,
            config,
            filters: Vec::new(),
            is_script: false,
            is_many: false,
            is_batch,
            compiled: OnceLock::new(),
        }
    }

    /// Builds a `Statement` from an already-parsed AST — the path the fluent
    /// builder uses, skipping the compiler's parse step entirely.
    pub fn from_ast(ast: Ast, parameters: ParamPayload, config: Arc<Configuration>) -> Self {
        let is_batch = parameters.is_batch();
        Self {
            input: Input::Ast(ast),
            parameters,
            config,
            filters: Vec::new(),
            is_script: false,
            is_many: false,
            is_batch,
            compiled: OnceLock::new(),
        }
    }

    /// Compiles (on first call) or returns the cached result (§4.5, §4.6).
    /// Atomic publish: concurrent first calls may both run the pipeline, but
    /// `OnceLock` ensures every caller observes the same winning result.
    pub fn compile(&self) -> Result<Arc<CompiledStatement>> {
        self.compiled
            .get_or_try_init(|| crate::compiler::compile(self))
            .cloned()
    }

    pub fn rendered_sql(&self) -> Result<CompactString> {
        Ok(self.compile()?.rendered_sql.clone())
    }

    pub fn parameters(&self) -> Result<ExecParams> {
        Ok(self.compile()?.parameters.clone())
    }

    pub fn validation_summary(&self) -> Result<ValidationSummary> {
        Ok(self.compile()?.validation_summary.clone())
    }

    /// Appends one filter. Invalidates any cached compiled result — the
    /// rendered SQL depends on the filter list, so the existing cache entry
    /// (if any) no longer describes this statement.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self.compiled = OnceLock::new();
        self
    }

    pub fn with_config(mut self, config: Arc<Configuration>) -> Self {
        self.config = config;
        self.compiled = OnceLock::new();
        self
    }

    pub fn with_parameters(mut self, parameters: ParamPayload) -> Self {
        self.is_batch = parameters.is_batch();
        self.parameters = parameters;
        self.compiled = OnceLock::new();
        self
    }

    /// Declares the input as a script (possibly several statements); the
    /// compiler re-parses with `as_script: true` instead of erroring on more
    /// than one statement (§4.4 step 1, §4.5).
    pub fn as_script(mut self) -> Self {
        self.is_script = true;
        self.compiled = OnceLock::new();
        self
    }

    /// Declares the input as an `execute_many` batch: `self.parameters` is
    /// expected to be `ParamPayload::Batch`, and validation runs per-record
    /// rather than once (§4.5, §6.2).
    pub fn as_many(mut self) -> Self {
        self.is_many = true;
        self.compiled = OnceLock::new();
        self
    }

    /// A structural copy. Preserves the cached `CompiledStatement` — nothing
    /// about a `Statement` can mutate after construction except through the
    /// `with_*`/`as_*` builders above, each of which already clears the
    /// cache, so a copy's cached value (if present) is always still valid.
    pub fn copy(&self) -> Self {
        let compiled = OnceLock::new();
        if let Some(value) = self.compiled.get() {
            let _ = compiled.set(value.clone());
        }
        Self {
            input: self.input.clone(),
            parameters: self.parameters.clone(),
            config: self.config.clone(),
            filters: self.filters.clone(),
            is_script: self.is_script,
            is_many: self.is_many,
            is_batch: self.is_batch,
            compiled,
        }
    }
}

impl Clone for Input {
    fn clone(&self) -> Self {
        match self {
            Input::Sql(sql) => Input::Sql(sql.clone()),
            Input::Ast(ast) => Input::Ast(ast.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{asc, col};
    use crate::config::Configuration;

    #[test]
    fn compile_is_cached_after_first_call() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT 1", ParamPayload::Empty, config);
        let first = stmt.compile().unwrap();
        let second = stmt.compile().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn with_filter_invalidates_cache_and_appends_where() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT id FROM users", ParamPayload::Empty, config)
            .with_filter(Filter::Where(col("active").eq(true)))
            .with_filter(Filter::OrderBy(vec![asc("id")]))
            .with_filter(Filter::Limit(5));
        let compiled = stmt.compile().unwrap();
        assert!(compiled.rendered_sql.to_ascii_uppercase().contains("WHERE"));
        assert!(compiled.rendered_sql.to_ascii_uppercase().contains("ORDER BY"));
        assert_eq!(compiled.parameter_info.len(), 1);
    }

    #[test]
    fn copy_preserves_compiled_cache() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT 1", ParamPayload::Empty, config);
        let _ = stmt.compile().unwrap();
        let copy = stmt.copy();
        let original = stmt.compile().unwrap();
        let copied = copy.compile().unwrap();
        assert!(Arc::ptr_eq(&original, &copied));
    }

    #[test]
    fn as_script_allows_multiple_statements() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT 1; SELECT 2;", ParamPayload::Empty, config).as_script();
        let compiled = stmt.compile().unwrap();
        assert!(compiled.rendered_sql.contains("SELECT"));
    }
}
