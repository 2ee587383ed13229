//! Transformers, run in declared order (§4.3.1).

use super::Processor;
use crate::context::{ParsedAst, ProcessingContext};
use crate::error::{Result, Severity};
use crate::value::Value;
use compact_str::CompactString;
use core::ops::ControlFlow;
use sqlparser::ast::{visit_expressions_mut, Expr, Ident, Value as AstValue};

fn for_each_statement_mut(ast: &mut ParsedAst, mut f: impl FnMut(&mut crate::ast::Ast)) {
    match ast {
        ParsedAst::Single(single) => f(single),
        ParsedAst::Script(script) => {
            for stmt in script.statements_mut() {
                f(stmt);
            }
        }
        ParsedAst::None => {}
    }
}

/// Rewrites identifiers that carry stray control characters into a safe
/// form. Parsing already rejects most malformed quoting, so in practice this
/// catches identifiers that made it through with embedded control bytes
/// (e.g. round-tripped from a source that didn't validate them).
pub struct IdentifierSanitizer;

fn sanitize_ident(ident: &mut Ident) -> bool {
    if ident.value.chars().any(|c| c.is_control()) {
        let cleaned: String = ident.value.chars().filter(|c| !c.is_control()).collect();
        if cleaned.is_empty() {
            return false;
        }
        ident.value = cleaned;
    }
    true
}

impl Processor for IdentifierSanitizer {
    fn name(&self) -> &'static str {
        "identifier_sanitizer"
    }

    fn should_run(&self, ctx: &ProcessingContext) -> bool {
        ctx.configuration.enable_parsing && !matches!(ctx.ast, ParsedAst::None)
    }

    fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        let mut unsafe_found = false;
        for_each_statement_mut(&mut ctx.ast, |ast| {
            visit_expressions_mut(ast.statement_mut(), |expr| {
                match expr {
                    Expr::Identifier(ident) => {
                        if !sanitize_ident(ident) {
                            unsafe_found = true;
                        }
                    }
                    Expr::CompoundIdentifier(idents) => {
                        for ident in idents {
                            if !sanitize_ident(ident) {
                                unsafe_found = true;
                            }
                        }
                    }
                    _ => {}
                }
                ControlFlow::<()>::Continue(())
            });
        });

        if unsafe_found {
            ctx.validation_findings.push(crate::context::ValidationResult::new(
                "identifier_sanitizer",
                Severity::Medium,
                "an identifier could not be made safe and was left unchanged",
            ));
        }
        Ok(())
    }
}

/// Walks the AST once and replaces literals in comparison positions with
/// fresh placeholders, appending their values to the hoisted-parameters list
/// (§4.3.1 item 2).
///
/// Only `Expr::Value` literals sitting directly as an operand of a
/// comparison `BinaryOp` are hoisted — this keeps `LIMIT`/`OFFSET` literals
/// (which live outside `Select`'s expression tree) and literals nested
/// inside `CAST`/function calls (which `visit_expressions_mut` still visits,
/// but whose parent shape doesn't match a comparison operand) out of scope
/// without a second AST pass to special-case them.
pub struct LiteralParameterizer;

fn is_comparison(op: &sqlparser::ast::BinaryOperator) -> bool {
    use sqlparser::ast::BinaryOperator::*;
    matches!(op, Eq | NotEq | Lt | LtEq | Gt | GtEq)
}

fn literal_to_value(value: &AstValue) -> Option<Value> {
    match value {
        AstValue::Null => Some(Value::Null),
        AstValue::Boolean(b) => Some(Value::Bool(*b)),
        AstValue::Number(n, _) => n
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| n.parse::<f64>().map(Value::Float))
            .ok(),
        AstValue::SingleQuotedString(s) | AstValue::DoubleQuotedString(s) => {
            Some(Value::Text(CompactString::from(s.as_str())))
        }
        _ => None,
    }
}

fn matches_preserve_pattern(text: &str, patterns: &[CompactString]) -> bool {
    patterns.iter().any(|pattern| text.contains(pattern.as_str()))
}

impl Processor for LiteralParameterizer {
    fn name(&self) -> &'static str {
        "literal_parameterizer"
    }

    fn should_run(&self, ctx: &ProcessingContext) -> bool {
        // §4.4: is_script forces parameterize_literals off regardless of config.
        ctx.configuration.parameterize_literals
            && !ctx.raw_had_placeholders
            && !ctx.is_script
            && !matches!(ctx.ast, ParsedAst::None)
    }

    fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        let preserve_patterns = ctx.configuration.preserve_patterns.clone();
        let mut next_ordinal = ctx.hoisted_named.len();

        for_each_statement_mut(&mut ctx.ast, |ast| {
            visit_expressions_mut(ast.statement_mut(), |expr| {
                if let Expr::BinaryOp { left, op, right } = expr {
                    if is_comparison(op) {
                        for side in [left.as_mut(), right.as_mut()] {
                            if let Expr::Value(value_with_span) = side {
                                let rendered = value_with_span.to_string();
                                if matches_preserve_pattern(&rendered, &preserve_patterns) {
                                    continue;
                                }
                                if let Some(value) = literal_to_value(&value_with_span.value) {
                                    let name = CompactString::from(format!("hoisted_{next_ordinal}"));
                                    *side = Expr::Value(
                                        sqlparser::ast::Value::Placeholder(format!(":{name}"))
                                            .into(),
                                    );
                                    ctx.hoisted_named.push((name, value));
                                    next_ordinal += 1;
                                }
                            }
                        }
                    }
                }
                ControlFlow::<()>::Continue(())
            });
        });

        Ok(())
    }
}

/// Strips `--` and `/* */` comments from the rendered SQL, preserving
/// optimizer hints (`/*+ ... */`). Runs last among the transformers since it
/// only affects formatting, not structure — whatever comments survive
/// re-rendering from the AST (`sqlparser` drops most already) are handled
/// here for the `enable_parsing = false` opaque-text path, where the raw SQL
/// itself is what gets rendered.
pub struct CommentStripper;

impl Processor for CommentStripper {
    fn name(&self) -> &'static str {
        "comment_stripper"
    }

    fn should_run(&self, ctx: &ProcessingContext) -> bool {
        !ctx.configuration.enable_parsing
    }

    fn process(&self, ctx: &mut ProcessingContext) -> Result<()> {
        ctx.raw_sql = CompactString::from(strip_comments(&ctx.raw_sql));
        Ok(())
    }
}

fn strip_comments(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            if chars.get(i + 2) == Some(&'+') {
                // preserved hint: copy through to the closing `*/` inclusive
                let start = i;
                let mut j = i + 2;
                while j < chars.len() && !(chars[j] == '*' && chars.get(j + 1) == Some(&'/')) {
                    j += 1;
                }
                let end = (j + 2).min(chars.len());
                out.extend(&chars[start..end]);
                i = end;
                continue;
            }
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            continue;
        }
        if c == '\'' {
            out.push(c);
            i += 1;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_comments_keeps_hints() {
        let out = strip_comments("SELECT /*+ INDEX(t) */ 1 -- trailing\nFROM t /* note */");
        assert_eq!(out, "SELECT /*+ INDEX(t) */ 1 \nFROM t ");
    }

    #[test]
    fn strip_comments_ignores_markers_inside_strings() {
        let out = strip_comments("SELECT '-- not a comment'");
        assert_eq!(out, "SELECT '-- not a comment'");
    }
}
