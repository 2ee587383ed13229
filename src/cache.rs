//! The two-tier content-addressed cache (§4.6): parsed ASTs keyed by
//! `(sql_text, dialect, is_script)`, and compiled statements keyed by a
//! structural fingerprint that excludes parameter values.
//!
//! Both tiers are `moka::sync::Cache` — many-reader/one-writer, atomic
//! publish on insert, bounded LRU-ish (moka's TinyLFU) eviction. A cache miss
//! computed twice concurrently is harmless here: every processor is pure
//! (§4.3 "Processor contract"), so the second writer's result is equivalent
//! and simply overwrites the first (§5 "last-writer-wins on publish").

use crate::ast::{Ast, Script};
use crate::compiled::ValidationSummary;
use crate::context::{AnalysisSummary, OperationKind};
use crate::placeholder::{ParameterInfo, PlaceholderStyle};
use crate::value::Value;
use compact_str::CompactString;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Key for the parsed-AST tier (§4.6 tier 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedAstKey {
    pub sql_text: CompactString,
    pub dialect: CompactString,
    pub is_script: bool,
}

impl ParsedAstKey {
    pub fn new(sql_text: impl Into<CompactString>, dialect: impl Into<CompactString>, is_script: bool) -> Self {
        Self {
            sql_text: sql_text.into(),
            dialect: dialect.into(),
            is_script,
        }
    }
}

/// A cached parse result. `Single`/`Script` mirror `ParsedInput`, but are
/// stored behind an `Arc` so a cache hit clones a handle, not the tree, and
/// callers `.as_ref().clone()` to get an owned copy transformers can mutate
/// without disturbing the cached original (§4.6 "stores a clone of the AST").
#[derive(Debug, Clone)]
pub enum CachedAst {
    Single(Ast),
    Script(Script),
}

/// The parsed-AST cache (§4.6 tier 1), bounded by `parsed_ast_cache_size`.
#[derive(Clone)]
pub struct ParsedAstCache {
    inner: moka::sync::Cache<ParsedAstKey, Arc<CachedAst>>,
}

impl ParsedAstCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: moka::sync::Cache::builder()
                .max_capacity(max_capacity)
                .eviction_listener(|_key, _value, cause| {
                    if matches!(cause, moka::notification::RemovalCause::Size) {
                        crate::sqlspec_trace_cache!("parsed_ast", "evict");
                    }
                })
                .build(),
        }
    }

    pub fn get(&self, key: &ParsedAstKey) -> Option<Arc<CachedAst>> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: ParsedAstKey, value: CachedAst) -> Arc<CachedAst> {
        let value = Arc::new(value);
        self.inner.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Hashes a collection order-independently by combining each element's own
/// hash with XOR, so `{"a", "b"}` and `{"b", "a"}` (`HashSet` iteration order
/// is unspecified) fold to the same fingerprint contribution.
fn hash_set_unordered<T: Hash, H: Hasher>(items: impl IntoIterator<Item = T>, hasher: &mut H) {
    let mut combined = 0u64;
    for item in items {
        let mut item_hasher = std::collections::hash_map::DefaultHasher::new();
        item.hash(&mut item_hasher);
        combined ^= item_hasher.finish();
    }
    combined.hash(hasher);
}

/// Structural hash over everything that affects compiled SQL shape *or* the
/// validation findings attached to it — the primary cache key (§4.6 tier 2).
/// Parameter *values* are deliberately excluded; the `parameter_info`
/// structure (count, style, names in order) is included because it changes
/// what the rendered SQL looks like, while the bound values behind it never
/// do. Every `Configuration` field that can change either `rendered_sql` or
/// `validation_summary` must be represented here, or two configs differing
/// only in, say, `protected_tables` would share a stale validation result.
pub fn compiled_fingerprint(
    sql_text: &str,
    dialect: &str,
    config: &crate::config::Configuration,
    target_style: crate::placeholder::PlaceholderStyle,
    is_script: bool,
    is_many: bool,
) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    sql_text.hash(&mut hasher);
    dialect.hash(&mut hasher);
    config.enable_parsing.hash(&mut hasher);
    config.enable_validation.hash(&mut hasher);
    config.enable_transformations.hash(&mut hasher);
    config.enable_analysis.hash(&mut hasher);
    config.strict_mode.hash(&mut hasher);
    config.parameterize_literals.hash(&mut hasher);
    config.preserve_patterns.hash(&mut hasher);
    format!("{target_style:?}").hash(&mut hasher);
    is_script.hash(&mut hasher);
    is_many.hash(&mut hasher);
    config.allow_ddl.hash(&mut hasher);
    config.allow_risky_dml.hash(&mut hasher);
    config.require_where_for_update.hash(&mut hasher);
    config.require_where_for_delete.hash(&mut hasher);
    config.max_joins.hash(&mut hasher);
    config.max_subquery_depth.hash(&mut hasher);
    config.allow_mixed_parameter_styles.hash(&mut hasher);
    hash_set_unordered(config.protected_tables.iter(), &mut hasher);
    hash_set_unordered(config.forbidden_keywords.iter(), &mut hasher);
    hash_set_unordered(
        config.allowed_parameter_styles.iter().map(|s| format!("{s:?}")),
        &mut hasher,
    );
    hasher.finish()
}

/// How `compiler::reshape_template` must turn a cached template's `base_sql`/
/// `base_infos` into that call's `CompiledStatement`. Only `Placeholders`
/// varies by call — `Static` and `Script` statements carry no placeholders
/// left to bind once the template is built, so their `base_sql` already *is*
/// the final `rendered_sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Placeholders,
    Static,
    Script,
}

/// The cacheable half of a compiled statement (§4.6 tier 2): everything that
/// depends on SQL text, dialect and configuration, but never on bound
/// parameter *values*.
///
/// `base_sql`/`base_infos` hold the style-converted, *pre-list-expansion*
/// text and placeholder list for `Placeholders` mode — not the fully reshaped
/// `rendered_sql`/`parameter_info` a `CompiledStatement` exposes. List
/// expansion depends on which placeholders are actually bound to
/// `Value::List` in a given call's own payload, which can legitimately differ
/// between two calls sharing this template (different list lengths, or a
/// list-valued placeholder bound to a scalar in one call), so it has to be
/// redone on every `compile()`, not baked into the cached entry. `hoisted_named`
/// carries literal-hoisted bind values (deterministic per SQL text) so they
/// can be folded into each call's payload before reshaping.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub mode: RenderMode,
    pub base_sql: CompactString,
    pub base_infos: Vec<ParameterInfo>,
    pub hoisted_named: Vec<(CompactString, Value)>,
    pub placeholder_style: PlaceholderStyle,
    pub operation_kind: OperationKind,
    pub validation_summary: ValidationSummary,
    pub analysis_summary: AnalysisSummary,
    pub cache_fingerprint: u64,
}

/// The compiled-statement cache (§4.6 tier 2), bounded by `compiled_cache_size`.
///
/// This tier is the primary performance lever of the whole pipeline ("hit
/// rate in steady state must approach 1" — §4.6): two calls that differ only
/// in parameter values share one entry. The cached value is a *template*
/// (`CompiledTemplate`), not a finished `CompiledStatement` — `compiler::compile`
/// reshapes each call's own parameters against it, on both a hit and a miss,
/// so a cache hit never hands back another caller's bound values (§4.6 "only
/// reshaping values").
#[derive(Clone)]
pub struct CompiledCache {
    inner: moka::sync::Cache<u64, Arc<CompiledTemplate>>,
}

impl CompiledCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: moka::sync::Cache::builder()
                .max_capacity(max_capacity)
                .eviction_listener(|_key, _value, cause| {
                    if matches!(cause, moka::notification::RemovalCause::Size) {
                        crate::sqlspec_trace_cache!("compiled", "evict");
                    }
                })
                .build(),
        }
    }

    pub fn get(&self, fingerprint: u64) -> Option<Arc<CompiledTemplate>> {
        self.inner.get(&fingerprint)
    }

    pub fn insert(&self, fingerprint: u64, value: CompiledTemplate) -> Arc<CompiledTemplate> {
        let value = Arc::new(value);
        self.inner.insert(fingerprint, value.clone());
        value
    }

    pub fn len(&self) -> u64 {
        self.inner.entry_count()
    }
}

static PARSED_AST_CACHE: OnceLock<ParsedAstCache> = OnceLock::new();
static COMPILED_CACHE: OnceLock<CompiledCache> = OnceLock::new();

/// The shared, process-wide parsed-AST cache (§4.6 tier 1). Sized on first
/// use from whichever `Configuration` triggers it first — later callers with
/// a different `parsed_ast_cache_size` share the already-built instance,
/// same tradeoff the adapter registry (`adapter::registry`) already makes.
pub fn parsed_ast_cache(max_capacity: u64) -> &'static ParsedAstCache {
    PARSED_AST_CACHE.get_or_init(|| ParsedAstCache::new(max_capacity))
}

/// The shared, process-wide compiled-statement cache (§4.6 tier 2).
pub fn compiled_cache(max_capacity: u64) -> &'static CompiledCache {
    COMPILED_CACHE.get_or_init(|| CompiledCache::new(max_capacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_ast_cache_round_trips() {
        let cache = ParsedAstCache::new(8);
        let key = ParsedAstKey::new("SELECT 1", "sqlite", false);
        assert!(cache.get(&key).is_none());

        let dialect = crate::ast::resolve_dialect("sqlite");
        let parsed = crate::ast::parse("SELECT 1", dialect.as_ref(), false).unwrap();
        let cached = match parsed {
            crate::ast::ParsedInput::Single(ast) => CachedAst::Single(ast),
            crate::ast::ParsedInput::Script(script) => CachedAst::Script(script),
        };
        cache.insert(key.clone(), cached);
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn fingerprint_ignores_nothing_but_values() {
        let config = crate::config::Configuration::default();
        let a = compiled_fingerprint(
            "SELECT ?",
            "sqlite",
            &config,
            crate::placeholder::PlaceholderStyle::Qmark,
            false,
            false,
        );
        let b = compiled_fingerprint(
            "SELECT ?",
            "sqlite",
            &config,
            crate::placeholder::PlaceholderStyle::Qmark,
            false,
            false,
        );
        assert_eq!(a, b);

        let c = compiled_fingerprint(
            "SELECT ?",
            "sqlite",
            &config,
            crate::placeholder::PlaceholderStyle::NumericDollar,
            false,
            false,
        );
        assert_ne!(a, c);
    }

    #[test]
    fn fingerprint_distinguishes_validation_affecting_fields() {
        let base = crate::config::Configuration::new("sqlite");
        let mut protected = base.clone();
        protected.protected_tables.insert("accounts".into());
        let mut forbidden = base.clone();
        forbidden.forbidden_keywords.insert("DROP".into());
        let mut max_joins = base.clone();
        max_joins.max_joins = Some(2);

        let style = crate::placeholder::PlaceholderStyle::Qmark;
        let f = |c: &crate::config::Configuration| {
            compiled_fingerprint("SELECT ?", "sqlite", c, style, false, false)
        };

        let base_fp = f(&base);
        assert_ne!(base_fp, f(&protected));
        assert_ne!(base_fp, f(&forbidden));
        assert_ne!(base_fp, f(&max_joins));
    }

    #[test]
    fn fingerprint_for_protected_tables_is_order_independent() {
        let mut a = crate::config::Configuration::new("sqlite");
        a.protected_tables.insert("accounts".into());
        a.protected_tables.insert("users".into());
        let mut b = crate::config::Configuration::new("sqlite");
        b.protected_tables.insert("users".into());
        b.protected_tables.insert("accounts".into());

        let style = crate::placeholder::PlaceholderStyle::Qmark;
        assert_eq!(
            compiled_fingerprint("SELECT ?", "sqlite", &a, style, false, false),
            compiled_fingerprint("SELECT ?", "sqlite", &b, style, false, false),
        );
    }
}
