//! The `compile()` orchestration (§4.4, §6.1): parse, transform, analyze,
//! validate, render, reshape — the one place all of those stages meet.
//!
//! Ordering note: the spec prose lists transformers, then validators, then
//! the analyzer, but `PerformanceValidator`'s subquery-depth check reads
//! `ctx.analysis.subquery_depth` (`processors/validators.rs`), which only the
//! analyzer populates. This module runs the analyzer between transformers and
//! validators so that check has real data, rather than always-false. The
//! parameter-style validator still runs twice, exactly as its own doc comment
//! describes: once here (a no-op, since `parameter_info` is empty before
//! render) and once more, authoritatively, right after render.
//!
//! Cache wiring (§4.6): `target_style` is resolved from configuration/adapter
//! before any parsing happens, which lets the tier-2 fingerprint be computed
//! up front and checked before doing any of the work below. Filtered
//! statements skip the shared tier-2 cache entirely — a `Filter` is call-site
//! state, not reflected in the fingerprint, so sharing across `Statement`
//! instances would be unsound; each `Statement`'s own `OnceLock` still covers
//! repeated `compile()` calls on the same instance.

use crate::adapter::{AdapterProfile, JsonStrategy};
use crate::ast::{self, ParsedInput};
use crate::cache::{self, CachedAst, CompiledTemplate, ParsedAstKey, RenderMode};
use crate::compiled::{CompiledStatement, ValidationSummary};
use crate::config::Configuration;
use crate::context::{OperationKind, ParsedAst, ProcessingContext};
use crate::error::{Result, Span, SqlSpecError};
use crate::placeholder::{ParameterInfo, PlaceholderStyle};
use crate::processors::{self, Processor};
use crate::statement::{apply_filters, Input, Statement};
use crate::style::{self, ExecutionStyle};
use crate::value::{ExecParams, ParamPayload, TypedValue, Value};
use compact_str::CompactString;
use hashbrown::HashMap;
use std::sync::Arc;

/// Binary literals longer than this are truncated before hex-rendering under
/// `Static` style (§9 open question on a size cap, resolved here): a single
/// oversized `Value::Bytes` bind should not blow up the rendered SQL text.
const STATIC_BINARY_INLINE_LIMIT: usize = 256;

pub fn compile(stmt: &Statement) -> Result<Arc<CompiledStatement>> {
    let config = stmt.config.clone();
    let dialect = ast::resolve_dialect(&config.dialect);
    let dialect_name = config.dialect.clone();
    let profile = crate::adapter::registry().lookup(&dialect_name);

    if !stmt.filters.is_empty() && matches!(stmt.parameters, ParamPayload::Positional(_)) {
        return Err(SqlSpecError::CompilationInternal(
            "filters require an Empty or Named parameter payload, not Positional".into(),
        ));
    }

    if stmt.is_script && !matches!(stmt.parameters, ParamPayload::Empty) {
        return Err(SqlSpecError::CompilationInternal(
            "is_script requires an empty parameter payload (§4.4, §6.1)".into(),
        ));
    }

    // Resolved before any parsing so the tier-2 fingerprint can be computed
    // up front; the "sniff the first detected style" fallback from §6.1 is
    // deliberately dropped in favor of a fixed default — that fallback would
    // otherwise require doing the expensive work the cache exists to avoid
    // before knowing whether a cache hit was even possible.
    let target_style = config
        .target_parameter_style
        .or_else(|| profile.as_ref().map(|p| p.default_parameter_style))
        .unwrap_or(PlaceholderStyle::Qmark);

    // §6.3: Static inlines bound values straight into the SQL text, so it
    // must not be used against caller-supplied values unless the caller
    // opts in — hoisted literals and filter-bound values never reach here
    // through `stmt.parameters`, only genuine user input does.
    if target_style == PlaceholderStyle::Static
        && !stmt.parameters.is_empty()
        && !config.allow_static_with_user_values
    {
        return Err(SqlSpecError::StyleNotSupported { style: PlaceholderStyle::Static });
    }

    let fingerprint_source = match &stmt.input {
        Input::Sql(sql) => sql.clone(),
        Input::Ast(ast) => ast.render(),
    };
    let fingerprint = cache::compiled_fingerprint(
        &fingerprint_source,
        &dialect_name,
        &config,
        target_style,
        stmt.is_script,
        stmt.is_many,
    );

    // A `Static` render against real user values bakes those values straight
    // into `base_sql`; the template one call builds is simply wrong for
    // another call's values, so such statements never share the tier-2 cache
    // (mirrors how filtered statements already opt out above it).
    let static_with_user_values = target_style == PlaceholderStyle::Static && !stmt.parameters.is_empty();
    let shares_tier2_cache = stmt.filters.is_empty() && !static_with_user_values;

    let template = if shares_tier2_cache {
        cache::compiled_cache(config.compiled_cache_size).get(fingerprint)
    } else {
        None
    };
    let template = match template {
        Some(template) => template,
        None => {
            let built = build_template(stmt, &config, dialect.as_ref(), &dialect_name, target_style, fingerprint)?;
            if shares_tier2_cache {
                cache::compiled_cache(config.compiled_cache_size).insert(fingerprint, built)
            } else {
                Arc::new(built)
            }
        }
    };

    crate::sqlspec_trace_compile!(&dialect_name, false, operation_kind_label(template.operation_kind));
    reshape_template(&template, stmt, profile.as_deref())
}

/// Steps 1-6 of §4.4: parse, transform, analyze, validate, render and detect
/// the surviving placeholders. Produces the cacheable template half of a
/// compiled statement — everything that depends on SQL text, dialect and
/// configuration, but never on bound parameter values (§4.6 tier 2).
fn build_template(
    stmt: &Statement,
    config: &Arc<Configuration>,
    dialect: &dyn sqlparser::dialect::Dialect,
    dialect_name: &str,
    target_style: PlaceholderStyle,
    fingerprint: u64,
) -> Result<CompiledTemplate> {
    // Step 1: parse (unless disabled), fold filters into the AST, and stand
    // up the context every later stage shares (§4.4 step 1).
    let mut ctx = match &stmt.input {
        Input::Sql(sql) => {
            let raw_sql = sql.clone();
            let mut ctx =
                ProcessingContext::new(config.clone(), raw_sql.clone(), stmt.is_script, stmt.is_many);
            if config.enable_parsing {
                let (parsed, effective_is_script) =
                    parse_cached(sql, dialect_name, dialect, stmt.is_script, config)?;
                ctx.is_script = effective_is_script;
                match parsed {
                    ParsedInput::Single(ast) => {
                        let (ast, filter_bound) = apply_filters(&ast, &stmt.filters, dialect)?;
                        ctx.hoisted_named.extend(filter_bound);
                        ctx.ast = ParsedAst::Single(ast);
                    }
                    ParsedInput::Script(script) => {
                        ctx.ast = ParsedAst::Script(script);
                    }
                }
            }
            ctx
        }
        Input::Ast(ast) => {
            let (ast, filter_bound) = apply_filters(ast, &stmt.filters, dialect)?;
            let rendered = ast.render();
            let mut ctx =
                ProcessingContext::new(config.clone(), rendered.clone(), stmt.is_script, stmt.is_many);
            ctx.hoisted_named.extend(filter_bound);
            ctx.ast = ParsedAst::Single(ast);
            ctx
        }
    };

    // §4.4 step 1 auto-detection can flip a statement into script mode after
    // the fact; the "is_script requires empty parameters" invariant has to be
    // re-checked against the *effective* flag, not just the declared one.
    if ctx.is_script && !matches!(stmt.parameters, ParamPayload::Empty) {
        return Err(SqlSpecError::CompilationInternal(
            "is_script requires an empty parameter payload (§4.4, §6.1)".into(),
        ));
    }

    // Step 2: transformers, in declared order (§4.3.1).
    if config.enable_transformations {
        processors::run_stage(&processors::transformers(), &mut ctx)?;
    }

    // Step 3: analyzer (moved ahead of validators — see module doc comment).
    if config.enable_analysis {
        let analyzer: Vec<Box<dyn Processor>> = vec![Box::new(processors::analyzer::Analyzer)];
        processors::run_stage(&analyzer, &mut ctx)?;
    }

    // Step 4: validators, first pass (§4.3.2). `ParameterStyleValidator`
    // no-ops here since `parameter_info` is still empty.
    if config.enable_validation {
        processors::run_stage(&processors::validators(), &mut ctx)?;
    }

    // Step 5: render to text and detect whatever placeholders survived
    // (§4.4 step 6). This one-time pass uses whichever call's payload
    // triggered the build, merged with whatever the transformers hoisted —
    // only to have *something* to validate and, for `Static`, to finish
    // rendering against; `reshape_template` redoes the value-dependent part
    // fresh for every call.
    let combined_payload = merge_hoisted(&stmt.parameters, &ctx.hoisted_named)?;

    if config.enable_parsing {
        if let ParsedAst::Script(script) = &ctx.ast {
            // Script path (§4.4 step 6): render and convert each sub-statement
            // independently, then join — converting the joined text as one
            // blob would misnumber styles that restart per statement and can
            // misbehave around string literals that themselves contain `;`.
            let (joined_sql, combined_infos) =
                render_script(script, dialect_name, target_style, &combined_payload)?;
            ctx.parameter_info = combined_infos.clone();

            return Ok(CompiledTemplate {
                mode: RenderMode::Script,
                base_sql: joined_sql,
                base_infos: combined_infos,
                hoisted_named: Vec::new(),
                placeholder_style: target_style,
                operation_kind: OperationKind::Script,
                validation_summary: ValidationSummary { findings: ctx.validation_findings },
                analysis_summary: ctx.analysis,
                cache_fingerprint: fingerprint,
            });
        }
    }

    let rendered_text = if config.enable_parsing {
        match &ctx.ast {
            ParsedAst::Single(ast) => ast.render(),
            ParsedAst::Script(_) => unreachable!("script path handled above"),
            ParsedAst::None => ctx.raw_sql.clone(),
        }
    } else {
        ctx.raw_sql.clone()
    };

    let detected = style::detect_styles(&rendered_text, dialect_name);

    let operation_kind = ctx
        .analysis
        .operation_kind
        .unwrap_or(if ctx.is_script { OperationKind::Script } else { OperationKind::Other });

    if target_style == PlaceholderStyle::Static {
        let sql = render_static(&rendered_text, &detected, &combined_payload)?;
        return Ok(CompiledTemplate {
            mode: RenderMode::Static,
            base_sql: sql,
            base_infos: Vec::new(),
            hoisted_named: Vec::new(),
            placeholder_style: target_style,
            operation_kind,
            validation_summary: ValidationSummary { findings: ctx.validation_findings },
            analysis_summary: ctx.analysis,
            cache_fingerprint: fingerprint,
        });
    }

    let (converted_sql, converted_infos) = style::convert(&rendered_text, &detected, target_style);

    // Step 6: the parameter-style validator's authoritative pass, now that
    // `parameter_info` reflects the final rendered SQL shape for this build.
    ctx.parameter_info = converted_infos.clone();
    if config.enable_validation {
        let second_pass: Vec<Box<dyn Processor>> =
            vec![Box::new(processors::validators::ParameterStyleValidator)];
        processors::run_stage(&second_pass, &mut ctx)?;
    }

    Ok(CompiledTemplate {
        mode: RenderMode::Placeholders,
        base_sql: converted_sql,
        base_infos: converted_infos,
        hoisted_named: ctx.hoisted_named.clone(),
        placeholder_style: target_style,
        operation_kind,
        validation_summary: ValidationSummary { findings: ctx.validation_findings },
        analysis_summary: ctx.analysis,
        cache_fingerprint: fingerprint,
    })
}

/// Step 7 of §4.4: reshapes this call's own `ParamPayload` against a
/// template's `base_sql`/`base_infos`, whether the template just came from a
/// cache hit or was freshly built. List expansion and the final reshape both
/// run here, every call, so a cache hit never hands back another caller's
/// values — only the shape-defining parts of compilation are shared (§4.6).
fn reshape_template(
    template: &CompiledTemplate,
    stmt: &Statement,
    profile: Option<&AdapterProfile>,
) -> Result<Arc<CompiledStatement>> {
    let (rendered_sql, parameter_info, parameters) = match template.mode {
        RenderMode::Static | RenderMode::Script => {
            (template.base_sql.clone(), template.base_infos.clone(), ExecParams::Positional(Vec::new()))
        }
        RenderMode::Placeholders => {
            let combined_payload = merge_hoisted(&stmt.parameters, &template.hoisted_named)?;

            let exec_style = profile.map(|p| p.execution_style).unwrap_or(ExecutionStyle::Either);
            let native_list_expansion = profile.map(|p| p.native_list_expansion).unwrap_or(true);
            let list_values = list_value_map(&combined_payload, &template.base_infos);

            let (expanded_sql, expanded_infos, expanded_payload) =
                if !native_list_expansion && !list_values.is_empty() {
                    let (sql, infos) =
                        style::list_expansion(&template.base_sql, &template.base_infos, &list_values);
                    let payload = expand_payload_for_lists(&combined_payload, &template.base_infos)?;
                    (sql, infos, payload)
                } else {
                    (template.base_sql.clone(), template.base_infos.clone(), combined_payload)
                };

            let reshaped = style::reshape(&expanded_payload, &expanded_infos, exec_style)?;
            let reshaped = apply_json_strategy(reshaped, profile);
            (expanded_sql, expanded_infos, reshaped)
        }
    };

    Ok(Arc::new(CompiledStatement {
        rendered_sql,
        parameters,
        placeholder_style: template.placeholder_style,
        parameter_info,
        operation_kind: template.operation_kind,
        validation_summary: template.validation_summary.clone(),
        analysis_summary: template.analysis_summary.clone(),
        cache_fingerprint: template.cache_fingerprint,
    }))
}

fn operation_kind_label(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Select => "select",
        OperationKind::Insert => "insert",
        OperationKind::Update => "update",
        OperationKind::Delete => "delete",
        OperationKind::Merge => "merge",
        OperationKind::Ddl => "ddl",
        OperationKind::Script => "script",
        OperationKind::Other => "other",
    }
}

/// Renders and converts every sub-statement of a `Script` independently,
/// then joins with `;\n` plus a trailing semicolon (§4.4 step 6). Ordinals
/// are renumbered to keep running across the whole joined script; spans are
/// diagnostic-only (`ParameterInfo::span`) and `style::convert` never
/// populates them, so no byte-offset bookkeeping is needed across parts.
fn render_script(
    script: &crate::ast::Script,
    dialect_name: &str,
    target_style: PlaceholderStyle,
    payload: &ParamPayload,
) -> Result<(CompactString, Vec<ParameterInfo>)> {
    let mut rendered_parts = Vec::with_capacity(script.len());
    let mut combined_infos = Vec::new();
    let mut ordinal_offset = 0usize;

    for sub in script.statements() {
        let sub_text = sub.render();
        let detected = style::detect_styles(&sub_text, dialect_name);

        let (part_sql, part_infos) = if target_style == PlaceholderStyle::Static {
            (render_static(&sub_text, &detected, payload)?, Vec::new())
        } else {
            style::convert(&sub_text, &detected, target_style)
        };

        for mut info in part_infos {
            info.ordinal += ordinal_offset;
            combined_infos.push(info);
        }
        ordinal_offset = combined_infos.len();
        rendered_parts.push(part_sql.to_string());
    }

    let mut joined = rendered_parts.join(";\n");
    joined.push(';');
    Ok((CompactString::from(joined), combined_infos))
}

/// Consults the shared tier-1 cache before asking `sqlparser` to reparse the
/// same `(sql, dialect, is_script)` triple (§4.6 tier 1).
/// Parses `sql` via the tier-1 cache, returning the effective `is_script`
/// actually used. If the caller didn't ask for script mode but the SQL turns
/// out to hold more than one top-level statement, this silently retries as a
/// script (§4.2, §4.4 step 1) — `ast::parse`'s own doc comment describes
/// exactly this contract: it rejects multi-statement input itself, and
/// expects the caller to inspect the failure and re-invoke with
/// `as_script: true`.
fn parse_cached(
    sql: &str,
    dialect_name: &str,
    dialect: &dyn sqlparser::dialect::Dialect,
    is_script: bool,
    config: &crate::config::Configuration,
) -> Result<(ParsedInput, bool)> {
    match parse_cached_once(sql, dialect_name, dialect, is_script, config) {
        Ok(parsed) => Ok((parsed, is_script)),
        Err(SqlSpecError::ParseError { message, .. })
            if !is_script && message.contains("more than one statement") =>
        {
            let parsed = parse_cached_once(sql, dialect_name, dialect, true, config)?;
            Ok((parsed, true))
        }
        Err(err) => Err(err),
    }
}

fn parse_cached_once(
    sql: &str,
    dialect_name: &str,
    dialect: &dyn sqlparser::dialect::Dialect,
    is_script: bool,
    config: &crate::config::Configuration,
) -> Result<ParsedInput> {
    let key = ParsedAstKey::new(sql, dialect_name, is_script);
    if let Some(cached) = cache::parsed_ast_cache(config.parsed_ast_cache_size).get(&key) {
        return Ok(match cached.as_ref() {
            CachedAst::Single(ast) => ParsedInput::Single(ast.clone()),
            CachedAst::Script(script) => ParsedInput::Script(script.clone()),
        });
    }
    let parsed = ast::parse(sql, dialect, is_script)?;
    let to_cache = match &parsed {
        ParsedInput::Single(ast) => CachedAst::Single(ast.clone()),
        ParsedInput::Script(script) => CachedAst::Script(script.clone()),
    };
    cache::parsed_ast_cache(config.parsed_ast_cache_size).insert(key, to_cache);
    Ok(parsed)
}

/// Folds literal-hoisting and filter-bound values into the caller's payload.
/// Both only ever mint *named* placeholders, so a `Positional` payload can
/// never absorb them — `compile` rejects that combination up front.
fn merge_hoisted(payload: &ParamPayload, hoisted: &[(CompactString, Value)]) -> Result<ParamPayload> {
    if hoisted.is_empty() {
        return Ok(payload.clone());
    }
    match payload {
        ParamPayload::Empty => Ok(ParamPayload::Named(
            hoisted.iter().cloned().map(|(k, v)| (k, TypedValue::new(v))).collect(),
        )),
        ParamPayload::Named(map) => {
            let mut merged = map.clone();
            for (k, v) in hoisted {
                merged.insert(k.clone(), TypedValue::new(v.clone()));
            }
            Ok(ParamPayload::Named(merged))
        }
        ParamPayload::Positional(_) => Err(SqlSpecError::CompilationInternal(
            "filters/hoisted literals require a named or empty parameter payload".into(),
        )),
        ParamPayload::Batch(records) => {
            let mut out = Vec::with_capacity(records.len());
            for record in records {
                out.push(merge_hoisted(record, hoisted)?);
            }
            Ok(ParamPayload::Batch(out))
        }
    }
}

/// Collects the `Value::List`-bound placeholders keyed the same way
/// `style::list_expansion` looks them up (§4.1). For a `Batch` payload this
/// reads only the first record — `execute_many` records share one SQL shape,
/// so the list-valued placeholders are the same ones in every record.
fn list_value_map(payload: &ParamPayload, infos: &[ParameterInfo]) -> HashMap<CompactString, Vec<Value>> {
    let mut map = HashMap::new();
    let representative: Option<&ParamPayload> = match payload {
        ParamPayload::Batch(records) => records.first(),
        other => Some(other),
    };
    let Some(payload) = representative else {
        return map;
    };
    match payload {
        ParamPayload::Named(values) => {
            for (key, typed) in values {
                if let Value::List(items) = &typed.value {
                    map.insert(key.clone(), items.clone());
                }
            }
        }
        ParamPayload::Positional(values) => {
            for (idx, typed) in values.iter().enumerate() {
                if let Value::List(items) = &typed.value {
                    let key = infos
                        .get(idx)
                        .and_then(|i| i.name.clone())
                        .unwrap_or_else(|| CompactString::from(format!("param_{idx}")));
                    map.insert(key, items.clone());
                }
            }
        }
        _ => {}
    }
    map
}

/// Splits every `Value::List` entry into `{key}_0`, `{key}_1`, … scalar
/// entries, mirroring the placeholder names `style::list_expansion` mints in
/// the SQL text. Always returns a `Named` payload (or `Batch`/`Empty`) since
/// `list_expansion` always assigns every surviving placeholder a name.
fn expand_payload_for_lists(payload: &ParamPayload, infos: &[ParameterInfo]) -> Result<ParamPayload> {
    match payload {
        ParamPayload::Batch(records) => {
            let mut out = Vec::with_capacity(records.len());
            for record in records {
                out.push(expand_payload_for_lists(record, infos)?);
            }
            Ok(ParamPayload::Batch(out))
        }
        ParamPayload::Empty => Ok(ParamPayload::Empty),
        ParamPayload::Named(map) => {
            let mut out = HashMap::new();
            for (key, typed) in map {
                match &typed.value {
                    Value::List(items) => {
                        for (idx, item) in items.iter().enumerate() {
                            out.insert(
                                CompactString::from(format!("{key}_{idx}")),
                                TypedValue::new(item.clone()),
                            );
                        }
                    }
                    _ => {
                        out.insert(key.clone(), typed.clone());
                    }
                }
            }
            Ok(ParamPayload::Named(out))
        }
        ParamPayload::Positional(values) => {
            let mut out = HashMap::new();
            for (idx, typed) in values.iter().enumerate() {
                let key = infos
                    .get(idx)
                    .and_then(|i| i.name.clone())
                    .unwrap_or_else(|| CompactString::from(format!("param_{idx}")));
                match &typed.value {
                    Value::List(items) => {
                        for (j, item) in items.iter().enumerate() {
                            out.insert(
                                CompactString::from(format!("{key}_{j}")),
                                TypedValue::new(item.clone()),
                            );
                        }
                    }
                    _ => {
                        out.insert(key, typed.clone());
                    }
                }
            }
            Ok(ParamPayload::Named(out))
        }
    }
}

fn render_json_text(json: &crate::value::serde_json_value::JsonValue) -> String {
    #[cfg(feature = "serde")]
    {
        serde_json::to_string(json).unwrap_or_default()
    }
    #[cfg(not(feature = "serde"))]
    {
        use crate::value::serde_json_value::JsonValue;
        match json {
            JsonValue::Null => "null".to_string(),
            JsonValue::Bool(b) => b.to_string(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
            JsonValue::Array(items) => {
                format!("[{}]", items.iter().map(render_json_text).collect::<Vec<_>>().join(","))
            }
            JsonValue::Object(entries) => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("\"{}\":{}", k, render_json_text(v)))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

/// Renders one bound value as a SQL literal for `Static` style (§6.3).
fn render_literal(value: &Value) -> CompactString {
    match value {
        Value::Null => CompactString::new("NULL"),
        Value::Bool(b) => CompactString::new(if *b { "TRUE" } else { "FALSE" }),
        Value::Int(n) => CompactString::from(n.to_string()),
        Value::Float(f) => CompactString::from(f.to_string()),
        Value::Text(s) => CompactString::from(format!("'{}'", s.replace('\'', "''"))),
        Value::Bytes(bytes) => {
            let truncated = &bytes[..bytes.len().min(STATIC_BINARY_INLINE_LIMIT)];
            let hex: String = truncated.iter().map(|b| format!("{b:02x}")).collect();
            CompactString::from(format!("X'{hex}'"))
        }
        Value::Json(json) => {
            CompactString::from(format!("'{}'", render_json_text(json).replace('\'', "''")))
        }
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(|v| render_literal(v).to_string()).collect();
            CompactString::from(format!("({})", rendered.join(", ")))
        }
    }
}

fn lookup_value(payload: &ParamPayload, info: &ParameterInfo) -> Result<Value> {
    match payload {
        ParamPayload::Batch(records) => records
            .first()
            .map(|record| lookup_value(record, info))
            .unwrap_or(Ok(Value::Null)),
        ParamPayload::Empty => Err(SqlSpecError::NoSuchParameter {
            name: info
                .name
                .clone()
                .unwrap_or_else(|| CompactString::from(format!("param_{}", info.ordinal))),
        }),
        ParamPayload::Named(map) => {
            let key = info.name.clone().ok_or_else(|| {
                SqlSpecError::CompilationInternal("static rendering requires named placeholders".into())
            })?;
            map.get(key.as_str())
                .map(|t| t.value.clone())
                .ok_or(SqlSpecError::NoSuchParameter { name: key })
        }
        ParamPayload::Positional(values) => values
            .get(info.ordinal)
            .map(|t| t.value.clone())
            .ok_or(SqlSpecError::ArityMismatch { expected: info.ordinal + 1, actual: values.len() }),
    }
}

/// Substitutes every placeholder span in `sql` with its literal value instead
/// of a placeholder token (§6.3 `Static` style).
fn render_static(sql: &str, infos: &[ParameterInfo], payload: &ParamPayload) -> Result<CompactString> {
    let mut out = String::with_capacity(sql.len());
    let mut last_end = 0usize;
    for info in infos {
        let span = info.span.unwrap_or(Span::new(last_end, last_end));
        out.push_str(&sql[last_end..span.start]);
        let value = lookup_value(payload, info)?;
        out.push_str(render_literal(&value).as_str());
        last_end = span.end;
    }
    out.push_str(&sql[last_end..]);
    Ok(CompactString::from(out))
}

/// Applies an adapter's `json_strategy` to already-reshaped parameters
/// (§6.4). Only `Helper` does anything here — `Driver`/`None` pass the value
/// through for the adapter (outside this crate) to handle.
fn apply_json_strategy(params: ExecParams, profile: Option<&AdapterProfile>) -> ExecParams {
    let helper = matches!(profile.map(|p| p.json_strategy), Some(JsonStrategy::Helper));
    if !helper {
        return params;
    }
    fn convert_value(value: Value) -> Value {
        match value {
            Value::Json(json) => Value::Text(CompactString::from(render_json_text(&json))),
            Value::List(items) => Value::List(items.into_iter().map(convert_value).collect()),
            other => other,
        }
    }
    match params {
        ExecParams::Positional(values) => {
            ExecParams::Positional(values.into_iter().map(convert_value).collect())
        }
        ExecParams::Named(map) => {
            ExecParams::Named(map.into_iter().map(|(k, v)| (k, convert_value(v))).collect())
        }
        ExecParams::Batch(batch) => {
            ExecParams::Batch(batch.into_iter().map(|p| apply_json_strategy(p, profile)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[test]
    fn compiles_plain_select_with_no_parameters() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT 1", ParamPayload::Empty, config);
        let compiled = stmt.compile().unwrap();
        assert_eq!(compiled.rendered_sql.as_str(), "SELECT 1");
        assert!(compiled.parameter_info.is_empty());
    }

    #[test]
    fn converts_qmark_to_configured_target_style() {
        let config = Configuration::new("postgres")
            .with_target_parameter_style(PlaceholderStyle::NumericDollar)
            .shared();
        let stmt = Statement::new(
            "SELECT * FROM users WHERE id = ?",
            ParamPayload::positional([1i64]),
            config,
        );
        let compiled = stmt.compile().unwrap();
        assert!(compiled.rendered_sql.contains('$'));
        assert_eq!(compiled.placeholder_style, PlaceholderStyle::NumericDollar);
    }

    #[test]
    fn static_style_inlines_literals() {
        let config = Configuration::new("sqlite")
            .with_target_parameter_style(PlaceholderStyle::Static)
            .with_allow_static_with_user_values(true)
            .shared();
        let stmt = Statement::new(
            "SELECT * FROM users WHERE id = :id",
            ParamPayload::named([("id", 7i64)]),
            config,
        );
        let compiled = stmt.compile().unwrap();
        assert!(compiled.rendered_sql.contains('7'));
        assert!(compiled.parameter_info.is_empty());
    }

    /// §6.3: `Static` must not silently inline user-controlled values.
    #[test]
    fn static_style_rejects_user_values_without_opt_in() {
        let config = Configuration::new("sqlite")
            .with_target_parameter_style(PlaceholderStyle::Static)
            .shared();
        let stmt = Statement::new(
            "SELECT * FROM users WHERE id = :id",
            ParamPayload::named([("id", 7i64)]),
            config,
        );
        let err = stmt.compile().unwrap_err();
        assert!(matches!(
            err,
            SqlSpecError::StyleNotSupported { style: PlaceholderStyle::Static }
        ));
    }

    #[test]
    fn static_style_without_user_values_needs_no_opt_in() {
        let config = Configuration::new("sqlite")
            .with_parameterize_literals(true)
            .with_target_parameter_style(PlaceholderStyle::Static)
            .shared();
        let stmt = Statement::new("SELECT * FROM users WHERE id = 7", ParamPayload::Empty, config);
        let compiled = stmt.compile().unwrap();
        assert!(compiled.rendered_sql.contains('7'));
    }

    #[test]
    fn literal_parameterizer_hoists_when_enabled() {
        let config = Configuration::new("sqlite").with_parameterize_literals(true).shared();
        let stmt = Statement::new("SELECT * FROM users WHERE id = 42", ParamPayload::Empty, config);
        let compiled = stmt.compile().unwrap();
        assert_eq!(compiled.parameter_info.len(), 1);
    }

    #[test]
    fn strict_mode_blocks_update_without_where() {
        let config = Configuration::new("sqlite").with_strict_mode(true).shared();
        let stmt = Statement::new("UPDATE users SET name = 'x'", ParamPayload::Empty, config);
        let err = stmt.compile().unwrap_err();
        assert!(matches!(err, SqlSpecError::ValidationBlocked { .. }));
    }

    #[test]
    fn positional_payload_rejects_filters() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT * FROM users", ParamPayload::positional([1i64]), config)
            .with_filter(crate::statement::Filter::Limit(1));
        let err = stmt.compile().unwrap_err();
        assert!(matches!(err, SqlSpecError::CompilationInternal(_)));
    }

    #[test]
    fn script_compiles_each_statement() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT 1; SELECT 2;", ParamPayload::Empty, config).as_script();
        let compiled = stmt.compile().unwrap();
        assert!(compiled.rendered_sql.contains("SELECT 1"));
        assert!(compiled.rendered_sql.contains("SELECT 2"));
    }

    /// §4.2, §4.4 step 1: multi-statement SQL switches to script mode on its
    /// own, without the caller ever calling `.as_script()`.
    #[test]
    fn auto_detects_script_mode_from_multi_statement_sql_without_as_script() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT 1; SELECT 2;", ParamPayload::Empty, config);
        let compiled = stmt.compile().unwrap();
        assert_eq!(compiled.operation_kind, OperationKind::Script);
        assert!(compiled.rendered_sql.contains("SELECT 1"));
        assert!(compiled.rendered_sql.contains("SELECT 2"));
        assert!(compiled.rendered_sql.trim_end().ends_with(';'));
    }

    /// Auto-detection still enforces the empty-parameters invariant, even
    /// though the caller never declared `is_script`.
    #[test]
    fn auto_detected_script_rejects_nonempty_parameters() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new(
            "SELECT 1; SELECT 2;",
            ParamPayload::positional([1i64]),
            config,
        );
        let err = stmt.compile().unwrap_err();
        assert!(matches!(err, SqlSpecError::CompilationInternal(_)));
    }

    /// E4: three statements joined by `;\n`, trailing semicolon, no
    /// placeholders, with `Static` as the target style.
    #[test]
    fn script_joins_statements_with_newline_semicolon_and_trailing_semicolon() {
        let config = Configuration::new("sqlite")
            .with_target_parameter_style(PlaceholderStyle::Static)
            .shared();
        let stmt = Statement::new(
            "INSERT INTO t(a) VALUES (1); INSERT INTO t(a) VALUES (2); UPDATE t SET a = 3 WHERE a = 1;",
            ParamPayload::Empty,
            config,
        )
        .as_script();
        let compiled = stmt.compile().unwrap();
        let parts: Vec<&str> = compiled.rendered_sql.split(";\n").collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].contains("INSERT INTO t"));
        assert!(parts[2].trim_end().ends_with(';'));
        assert!(compiled.parameter_info.is_empty());
        assert!(!compiled.rendered_sql.contains('?'));
    }

    #[test]
    fn script_rejects_nonempty_parameters() {
        let config = Configuration::new("sqlite").shared();
        let stmt = Statement::new("SELECT 1; SELECT 2;", ParamPayload::positional([1i64]), config)
            .as_script();
        let err = stmt.compile().unwrap_err();
        assert!(matches!(err, SqlSpecError::CompilationInternal(_)));
    }

    #[test]
    fn script_forces_parameterize_literals_off() {
        let config = Configuration::new("sqlite").with_parameterize_literals(true).shared();
        let stmt =
            Statement::new("SELECT * FROM u WHERE id = 1; SELECT * FROM u WHERE id = 2;", ParamPayload::Empty, config)
                .as_script();
        let compiled = stmt.compile().unwrap();
        assert!(compiled.parameter_info.is_empty());
        assert!(compiled.rendered_sql.contains('1') && compiled.rendered_sql.contains('2'));
    }

    #[test]
    fn repeated_compiles_of_equivalent_sql_share_tier2_cache() {
        // Same SQL/config/target-style shares one tier-2 template, but each
        // call still gets its own reshaped values back (§4.6) — not the
        // other call's `Arc`.
        let config = Configuration::new("sqlite").shared();
        let a =
            Statement::new("SELECT * FROM t WHERE id = ?", ParamPayload::positional([1i64]), config.clone());
        let b = Statement::new("SELECT * FROM t WHERE id = ?", ParamPayload::positional([2i64]), config);
        let first = a.compile().unwrap();
        let second = b.compile().unwrap();
        assert_eq!(first.cache_fingerprint, second.cache_fingerprint);
        assert_eq!(first.rendered_sql, second.rendered_sql);
        assert_eq!(first.parameters, ExecParams::Positional(vec![Value::Int(1)]));
        assert_eq!(second.parameters, ExecParams::Positional(vec![Value::Int(2)]));
    }
}
