//! Placeholder-style detection, conversion, parameter reshaping and list
//! expansion (§4.1).
//!
//! `detect_styles` is a hand-rolled forward scan rather than a regex: it has
//! to track string/identifier/comment state char-by-char to avoid matching
//! placeholder-shaped text inside a string literal, and regex backtracking
//! over dollar-quoted bodies (`$tag$ ... $tag$`, where `tag` is arbitrary)
//! isn't expressible without it turning into a hand-rolled scanner anyway.

use crate::error::{Span, SqlSpecError};
use crate::placeholder::{ParamSource, ParameterInfo, PlaceholderStyle};
use crate::value::ExecParams;
use compact_str::CompactString;
use hashbrown::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Bracketed,
    LineComment,
    BlockComment,
    DollarQuoted,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Scans `sql` left to right and returns every placeholder found, in
/// appearance order, skipping string/identifier/comment bodies.
///
/// `dialect` is accepted for forward compatibility (e.g. a dialect that
/// disables dollar-quoting) but the current scan rules are dialect-agnostic:
/// every style is recognized everywhere and left to the caller's
/// `allowed_parameter_styles` / `allow_mixed_parameter_styles` config to
/// reject what doesn't belong.
pub fn detect_styles(sql: &str, _dialect: &str) -> Vec<ParameterInfo> {
    let bytes = sql.as_bytes();
    let chars: Vec<char> = sql.chars().collect();
    let mut byte_offsets = Vec::with_capacity(chars.len() + 1);
    {
        let mut acc = 0usize;
        for c in &chars {
            byte_offsets.push(acc);
            acc += c.len_utf8();
        }
        byte_offsets.push(bytes.len());
    }

    let mut state = ScanState::Normal;
    let mut dollar_tag: CompactString = CompactString::new("");
    let mut infos = Vec::new();
    let mut ordinal = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match state {
            ScanState::SingleQuoted => {
                if c == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        i += 2;
                        continue;
                    }
                    state = ScanState::Normal;
                }
                i += 1;
                continue;
            }
            ScanState::DoubleQuoted => {
                if c == '"' {
                    if chars.get(i + 1) == Some(&'"') {
                        i += 2;
                        continue;
                    }
                    state = ScanState::Normal;
                }
                i += 1;
                continue;
            }
            ScanState::Bracketed => {
                if c == ']' {
                    state = ScanState::Normal;
                }
                i += 1;
                continue;
            }
            ScanState::LineComment => {
                if c == '\n' {
                    state = ScanState::Normal;
                }
                i += 1;
                continue;
            }
            ScanState::BlockComment => {
                if c == '*' && chars.get(i + 1) == Some(&'/') {
                    state = ScanState::Normal;
                    i += 2;
                    continue;
                }
                i += 1;
                continue;
            }
            ScanState::DollarQuoted => {
                if c == '$' {
                    let rest_start = i + 1;
                    let mut j = rest_start;
                    while j < chars.len() && is_ident_continue(chars[j]) {
                        j += 1;
                    }
                    if chars.get(j) == Some(&'$') {
                        let tag: CompactString = chars[rest_start..j].iter().collect();
                        if tag == dollar_tag {
                            state = ScanState::Normal;
                            i = j + 1;
                            continue;
                        }
                    }
                }
                i += 1;
                continue;
            }
            ScanState::Normal => {}
        }

        match c {
            '\'' => {
                state = ScanState::SingleQuoted;
                i += 1;
            }
            '"' => {
                state = ScanState::DoubleQuoted;
                i += 1;
            }
            '[' => {
                state = ScanState::Bracketed;
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                state = ScanState::LineComment;
                i += 2;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                state = ScanState::BlockComment;
                i += 2;
            }
            '$' if chars.get(i + 1).is_some_and(|n| is_ident_start(*n) || *n == '$') => {
                // Could be a dollar-quote tag ($tag$ ... $tag$ / $$ ... $$) or a
                // NamedDollar/NumericDollar placeholder. Disambiguate by
                // looking for the closing `$` immediately after an identifier
                // (or digits, for NumericDollar) run.
                let start = i;
                let mut j = i + 1;
                let numeric_start = j;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j > numeric_start {
                    // $123 -> NumericDollar placeholder
                    infos.push(
                        ParameterInfo::new(ordinal, PlaceholderStyle::NumericDollar)
                            .with_span(Span::new(byte_offsets[start], byte_offsets[j])),
                    );
                    ordinal += 1;
                    i = j;
                    continue;
                }

                let ident_start = i + 1;
                let mut k = ident_start;
                while k < chars.len() && is_ident_continue(chars[k]) {
                    k += 1;
                }
                if chars.get(k) == Some(&'$') {
                    // Ambiguous between `$name$` dollar-quote open and a
                    // `$name` placeholder immediately followed by a second
                    // `$name` tag's own body-starting `$`. A real dollar-quote
                    // body follows with its own content, so prefer it only
                    // when the tag looks like a dollar-quote tag, i.e. is
                    // empty or alphanumeric and the construct is used as a
                    // string body starter. We treat `$tag$` as a dollar-quote
                    // opener; a `NamedDollar` placeholder never has a second
                    // `$` abutting it in the grammars sqlspec targets.
                    dollar_tag = chars[ident_start..k].iter().collect();
                    state = ScanState::DollarQuoted;
                    i = k + 1;
                    continue;
                }
                if k > ident_start {
                    let name: CompactString = chars[ident_start..k].iter().collect();
                    infos.push(
                        ParameterInfo::new(ordinal, PlaceholderStyle::NamedDollar)
                            .named(name)
                            .with_span(Span::new(byte_offsets[start], byte_offsets[k])),
                    );
                    ordinal += 1;
                    i = k;
                    continue;
                }
                i += 1;
            }
            '?' => {
                infos.push(
                    ParameterInfo::new(ordinal, PlaceholderStyle::Qmark)
                        .with_span(Span::new(byte_offsets[i], byte_offsets[i + 1])),
                );
                ordinal += 1;
                i += 1;
            }
            ':' if chars.get(i + 1) != Some(&':') => {
                let start = i;
                let mut j = i + 1;
                let digit_start = j;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j > digit_start {
                    infos.push(
                        ParameterInfo::new(ordinal, PlaceholderStyle::NumericColon)
                            .with_span(Span::new(byte_offsets[start], byte_offsets[j])),
                    );
                    ordinal += 1;
                    i = j;
                    continue;
                }
                let ident_start = i + 1;
                if chars.get(ident_start).is_some_and(|c| is_ident_start(*c)) {
                    let mut k = ident_start + 1;
                    while k < chars.len() && is_ident_continue(chars[k]) {
                        k += 1;
                    }
                    let name: CompactString = chars[ident_start..k].iter().collect();
                    infos.push(
                        ParameterInfo::new(ordinal, PlaceholderStyle::NamedColon)
                            .named(name)
                            .with_span(Span::new(byte_offsets[start], byte_offsets[k])),
                    );
                    ordinal += 1;
                    i = k;
                    continue;
                }
                i += 1;
            }
            '@' if chars.get(i + 1).is_some_and(|c| is_ident_start(*c)) => {
                let start = i;
                let ident_start = i + 1;
                let mut k = ident_start + 1;
                while k < chars.len() && is_ident_continue(chars[k]) {
                    k += 1;
                }
                let name: CompactString = chars[ident_start..k].iter().collect();
                infos.push(
                    ParameterInfo::new(ordinal, PlaceholderStyle::NamedAt)
                        .named(name)
                        .with_span(Span::new(byte_offsets[start], byte_offsets[k])),
                );
                ordinal += 1;
                i = k;
            }
            '%' if chars.get(i + 1) == Some(&'s') => {
                infos.push(
                    ParameterInfo::new(ordinal, PlaceholderStyle::PyformatPositional)
                        .with_span(Span::new(byte_offsets[i], byte_offsets[i + 2])),
                );
                ordinal += 1;
                i += 2;
            }
            '%' if chars.get(i + 1) == Some(&'(') => {
                let start = i;
                let ident_start = i + 2;
                let mut k = ident_start;
                while k < chars.len() && chars[k] != ')' {
                    k += 1;
                }
                // Require the `)s` closer; otherwise it's not ours to claim.
                if chars.get(k) == Some(&')') && chars.get(k + 1) == Some(&'s') {
                    let name: CompactString = chars[ident_start..k].iter().collect();
                    infos.push(
                        ParameterInfo::new(ordinal, PlaceholderStyle::PyformatNamed)
                            .named(name)
                            .with_span(Span::new(byte_offsets[start], byte_offsets[k + 2])),
                    );
                    ordinal += 1;
                    i = k + 2;
                    continue;
                }
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    infos
}

/// Renders the placeholder token for `target_style` at 1-based `ordinal`
/// and optional `name` (§6.3).
pub fn render_placeholder_token(
    target_style: PlaceholderStyle,
    ordinal_1based: usize,
    name: Option<&str>,
) -> CompactString {
    match target_style {
        PlaceholderStyle::Qmark => CompactString::new("?"),
        PlaceholderStyle::NumericDollar => CompactString::from(format!("${ordinal_1based}")),
        PlaceholderStyle::NumericColon => CompactString::from(format!(":{ordinal_1based}")),
        PlaceholderStyle::NamedColon => {
            CompactString::from(format!(":{}", name.unwrap_or("param")))
        }
        PlaceholderStyle::NamedAt => CompactString::from(format!("@{}", name.unwrap_or("param"))),
        PlaceholderStyle::NamedDollar => {
            CompactString::from(format!("${}", name.unwrap_or("param")))
        }
        PlaceholderStyle::PyformatPositional => CompactString::new("%s"),
        PlaceholderStyle::PyformatNamed => {
            CompactString::from(format!("%({})s", name.unwrap_or("param")))
        }
        PlaceholderStyle::Static => CompactString::new(""),
    }
}

/// Rewrites every placeholder token in `sql` to `target_style`, in the order
/// given by `infos` (which must be in appearance order and match `sql`
/// exactly — callers get this from `detect_styles` against the same string).
///
/// Numeric styles number by order of first appearance (ordinal + 1). Named
/// placeholders converted to a positional target become `param_<ordinal>`;
/// the caller only sees `param_N` once it genuinely has no name (positional
/// target discards names, but `ParameterInfo.name` on the returned list keeps
/// the original for diagnostics).
pub fn convert(
    sql: &str,
    infos: &[ParameterInfo],
    target_style: PlaceholderStyle,
) -> (CompactString, Vec<ParameterInfo>) {
    let mut out = String::with_capacity(sql.len());
    let mut last_end = 0usize;
    let mut new_infos = Vec::with_capacity(infos.len());

    for info in infos {
        let span = info.span.unwrap_or(Span::new(last_end, last_end));
        out.push_str(&sql[last_end..span.start]);

        let synthetic_name = format!("param_{}", info.ordinal);
        let name_for_render = if target_style.is_named() {
            info.name.as_deref().unwrap_or(&synthetic_name)
        } else {
            ""
        };
        let token = render_placeholder_token(
            target_style,
            info.ordinal + 1,
            if name_for_render.is_empty() {
                None
            } else {
                Some(name_for_render)
            },
        );
        out.push_str(&token);

        let mut new_info = ParameterInfo::new(info.ordinal, target_style).with_source(info.source);
        if target_style.is_named() {
            new_info = new_info.named(if let Some(n) = &info.name {
                n.clone()
            } else {
                CompactString::from(synthetic_name.as_str())
            });
        } else if let Some(name) = &info.name {
            // Retained for diagnostics even though the target is positional.
            new_info = new_info.named(name.clone());
        }
        new_infos.push(new_info);

        last_end = span.end;
    }
    out.push_str(&sql[last_end..]);

    (CompactString::from(out), new_infos)
}

/// The binding convention an adapter accepts (§3.8 `execution_style`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStyle {
    PositionOnly,
    NameOnly,
    Either,
}

/// Reshapes a user parameter payload into the `ExecParams` shape the final
/// `parameter_info` and the adapter's execution style require (§4.1 `reshape`).
pub fn reshape(
    payload: &crate::value::ParamPayload,
    infos: &[ParameterInfo],
    exec_style: ExecutionStyle,
) -> crate::error::Result<ExecParams> {
    use crate::value::ParamPayload;

    match payload {
        ParamPayload::Batch(records) => {
            let mut out = Vec::with_capacity(records.len());
            for record in records {
                out.push(reshape(record, infos, exec_style)?);
            }
            Ok(ExecParams::Batch(out))
        }
        ParamPayload::Empty => match exec_style {
            ExecutionStyle::NameOnly => Ok(ExecParams::Named(HashMap::new())),
            _ => Ok(ExecParams::Positional(Vec::new())),
        },
        ParamPayload::Positional(values) => {
            if values.len() != infos.len() {
                return Err(SqlSpecError::ArityMismatch {
                    expected: infos.len(),
                    actual: values.len(),
                });
            }
            match exec_style {
                ExecutionStyle::NameOnly => {
                    let mut map = HashMap::with_capacity(infos.len());
                    for (info, value) in infos.iter().zip(values.iter()) {
                        let key = info
                            .name
                            .clone()
                            .unwrap_or_else(|| CompactString::from(format!("param_{}", info.ordinal)));
                        map.insert(key, value.value.clone());
                    }
                    Ok(ExecParams::Named(map))
                }
                _ => Ok(ExecParams::Positional(
                    values.iter().map(|v| v.value.clone()).collect(),
                )),
            }
        }
        ParamPayload::Named(map) => {
            match exec_style {
                ExecutionStyle::NameOnly => {
                    let mut out = HashMap::with_capacity(infos.len());
                    for info in infos {
                        let key = info.name.clone().ok_or_else(|| {
                            SqlSpecError::CompilationInternal(
                                "named exec style requires every placeholder to carry a name"
                                    .into(),
                            )
                        })?;
                        let value = map.get(key.as_str()).ok_or_else(|| {
                            SqlSpecError::NoSuchParameter { name: key.clone() }
                        })?;
                        out.insert(key, value.value.clone());
                    }
                    Ok(ExecParams::Named(out))
                }
                _ => {
                    let mut out = Vec::with_capacity(infos.len());
                    for info in infos {
                        let name = info.name.as_ref().ok_or_else(|| {
                            SqlSpecError::CompilationInternal(
                                "positional reshape of named payload requires placeholder names"
                                    .into(),
                            )
                        })?;
                        let value = map
                            .get(name.as_str())
                            .ok_or_else(|| SqlSpecError::NoSuchParameter { name: name.clone() })?;
                        out.push(value.value.clone());
                    }
                    Ok(ExecParams::Positional(out))
                }
            }
        }
    }
}

/// Rewrites `x IN (:p)` into `x IN (:p_0, :p_1, ...)` and splits the bound
/// list value accordingly, for adapters whose driver can't bind a single
/// list parameter (§4.1 `list_expansion`, §8 E5).
///
/// `sql`/`infos` must be in sync (as produced by `detect_styles`/`convert`).
/// Only placeholders whose bound value is `Value::List` are expanded;
/// scalar-bound placeholders pass through untouched.
pub fn list_expansion(
    sql: &str,
    infos: &[ParameterInfo],
    values: &HashMap<CompactString, Vec<crate::value::Value>>,
) -> (CompactString, Vec<ParameterInfo>) {
    let mut out = String::with_capacity(sql.len());
    let mut last_end = 0usize;
    let mut new_infos = Vec::with_capacity(infos.len());
    let mut next_ordinal = 0usize;

    for info in infos {
        let span = info.span.unwrap_or(Span::new(last_end, last_end));
        out.push_str(&sql[last_end..span.start]);

        let key = info
            .name
            .clone()
            .unwrap_or_else(|| CompactString::from(format!("param_{}", info.ordinal)));

        if let Some(list) = values.get(&key) {
            for (idx, _) in list.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                let expanded_name = format!("{key}_{idx}");
                out.push_str(&render_placeholder_token(
                    info.style,
                    next_ordinal + 1,
                    Some(&expanded_name),
                ));
                new_infos.push(
                    ParameterInfo::new(next_ordinal, info.style)
                        .named(expanded_name)
                        .with_source(info.source),
                );
                next_ordinal += 1;
            }
        } else {
            out.push_str(&sql[span.start..span.end]);
            new_infos.push(
                ParameterInfo::new(next_ordinal, info.style)
                    .with_source(info.source)
                    .named(
                        info.name
                            .clone()
                            .unwrap_or_else(|| CompactString::from(key.as_str())),
                    ),
            );
            next_ordinal += 1;
        }

        last_end = span.end;
    }
    out.push_str(&sql[last_end..]);

    (CompactString::from(out), new_infos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_skips_string_literals() {
        let infos = detect_styles("SELECT * FROM t WHERE s = 'a?b' AND id = ?", "sqlite");
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].style, PlaceholderStyle::Qmark);
    }

    #[test]
    fn detect_skips_line_comments() {
        let infos = detect_styles("SELECT ? -- what about ?\n, ?", "sqlite");
        assert_eq!(infos.len(), 2);
    }

    #[test]
    fn detect_skips_block_comments() {
        let infos = detect_styles("SELECT ? /* :named @at %s */, :x", "sqlite");
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].style, PlaceholderStyle::NamedColon);
    }

    #[test]
    fn detect_skips_dollar_quoted_bodies() {
        let sql = "SELECT $tag$ ? :x $tag$, $1";
        let infos = detect_styles(sql, "postgres");
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].style, PlaceholderStyle::NumericDollar);
    }

    #[test]
    fn convert_qmark_to_numeric_dollar() {
        let sql = "SELECT * FROM u WHERE id = ? AND name = ?";
        let infos = detect_styles(sql, "postgres");
        let (rendered, _) = convert(sql, &infos, PlaceholderStyle::NumericDollar);
        assert_eq!(
            rendered.as_str(),
            "SELECT * FROM u WHERE id = $1 AND name = $2"
        );
    }

    #[test]
    fn convert_named_to_qmark() {
        let sql = "SELECT 1 WHERE a = :alpha AND b = :beta";
        let infos = detect_styles(sql, "sqlite");
        let (rendered, _) = convert(sql, &infos, PlaceholderStyle::Qmark);
        assert_eq!(rendered.as_str(), "SELECT 1 WHERE a = ? AND b = ?");
    }

    #[test]
    fn reshape_named_payload_to_positional() {
        let sql = "SELECT 1 WHERE a = :alpha AND b = :beta";
        let infos = detect_styles(sql, "sqlite");
        let payload = crate::value::ParamPayload::named([("alpha", 1i64), ("beta", 2i64)]);
        let out = reshape(&payload, &infos, ExecutionStyle::PositionOnly).unwrap();
        match out {
            ExecParams::Positional(values) => {
                assert_eq!(values, vec![crate::value::Value::Int(1), crate::value::Value::Int(2)]);
            }
            _ => panic!("expected positional"),
        }
    }

    #[test]
    fn reshape_unknown_name_errors() {
        let sql = "SELECT :a";
        let infos = detect_styles(sql, "sqlite");
        let payload = crate::value::ParamPayload::named([("b", 1i64)]);
        let err = reshape(&payload, &infos, ExecutionStyle::PositionOnly).unwrap_err();
        assert!(matches!(err, SqlSpecError::NoSuchParameter { .. }));
    }

    #[test]
    fn reshape_arity_mismatch_errors() {
        let sql = "SELECT ?, ?";
        let infos = detect_styles(sql, "sqlite");
        let payload = crate::value::ParamPayload::positional([1i64]);
        let err = reshape(&payload, &infos, ExecutionStyle::PositionOnly).unwrap_err();
        assert!(matches!(err, SqlSpecError::ArityMismatch { expected: 2, actual: 1 }));
    }
}
