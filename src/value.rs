//! The parameter value model (§3.2, §6.2).

use compact_str::CompactString;
use hashbrown::HashMap;

/// A single bindable scalar value.
///
/// Closed on purpose: the compiler never needs to special-case an unbounded
/// set of host-language types, only this one. Adapters translate `Value`
/// into their wire representation; `Json`/`Jsonb` exist so the `json_strategy`
/// (§6.4) has something concrete to act on without sqlspec depending on a
/// user's domain types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(CompactString),
    Bytes(Vec<u8>),
    /// A JSON-shaped value that has not yet been serialized. The
    /// `json_strategy` on the target `AdapterProfile` decides whether this
    /// gets turned into a `Text` (helper) or passed through (driver).
    Json(serde_json_value::JsonValue),
    /// A homogeneous list, bound either natively (`IN (?)` with array
    /// support) or expanded by `list_expansion` (§4.1) when the adapter can't.
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(CompactString::from(v))
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(CompactString::from(v))
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A declared SQL type used to force a binding type without relying on
/// reflection over the Rust value (§3.2, "Typed wrapper").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Text,
    Bytea,
    Json,
    Jsonb,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
}

/// A value plus an optional forced type / style hint (§3.2).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    pub declared_type: Option<DeclaredType>,
    pub style_hint: Option<crate::placeholder::PlaceholderStyle>,
}

impl TypedValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            declared_type: None,
            style_hint: None,
        }
    }

    pub fn with_type(mut self, ty: DeclaredType) -> Self {
        self.declared_type = Some(ty);
        self
    }

    pub fn with_style_hint(mut self, style: crate::placeholder::PlaceholderStyle) -> Self {
        self.style_hint = Some(style);
        self
    }
}

impl<T: Into<Value>> From<T> for TypedValue {
    fn from(v: T) -> Self {
        TypedValue::new(v)
    }
}

/// One user-supplied parameter payload, in one of the four accepted shapes
/// (§3.2, §6.2). A `Statement`'s raw parameters are always exactly one of
/// these — never an ad hoc container the pipeline has to sniff apart.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParamPayload {
    #[default]
    Empty,
    Positional(Vec<TypedValue>),
    Named(HashMap<CompactString, TypedValue>),
    /// `execute_many`: an ordered sequence of same-shape records.
    Batch(Vec<ParamPayload>),
}

impl ParamPayload {
    pub fn positional(values: impl IntoIterator<Item = impl Into<TypedValue>>) -> Self {
        ParamPayload::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named(
        values: impl IntoIterator<Item = (impl Into<CompactString>, impl Into<TypedValue>)>,
    ) -> Self {
        ParamPayload::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ParamPayload::Empty)
            || matches!(self, ParamPayload::Positional(v) if v.is_empty())
            || matches!(self, ParamPayload::Named(m) if m.is_empty())
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, ParamPayload::Batch(_))
    }
}

/// The reshaped parameters a `CompiledStatement` carries, ready for an
/// adapter to bind (§3.7, §4.1 `reshape`).
#[derive(Debug, Clone, PartialEq)]
pub enum ExecParams {
    Positional(Vec<Value>),
    Named(HashMap<CompactString, Value>),
    Batch(Vec<ExecParams>),
}

impl ExecParams {
    pub fn len(&self) -> usize {
        match self {
            ExecParams::Positional(v) => v.len(),
            ExecParams::Named(m) => m.len(),
            ExecParams::Batch(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_conversions_cover_scalars_and_containers() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7i32), Value::Int(7));
        assert_eq!(Value::from("x"), Value::Text(CompactString::from("x")));
        assert_eq!(Value::from(vec![1i64, 2, 3]), Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
    }

    #[test]
    fn as_list_only_matches_list_variant() {
        assert!(Value::from(vec![1i64]).as_list().is_some());
        assert!(Value::Int(1).as_list().is_none());
    }

    #[test]
    fn param_payload_is_empty_covers_all_empty_shapes() {
        assert!(ParamPayload::Empty.is_empty());
        assert!(ParamPayload::positional(Vec::<i64>::new()).is_empty());
        assert!(ParamPayload::named(Vec::<(&str, i64)>::new()).is_empty());
        assert!(!ParamPayload::positional([1i64]).is_empty());
    }

    #[test]
    fn param_payload_batch_is_detected() {
        let batch = ParamPayload::Batch(vec![ParamPayload::positional([1i64])]);
        assert!(batch.is_batch());
        assert!(!ParamPayload::Empty.is_batch());
    }

    #[test]
    fn exec_params_len_matches_variant_shape() {
        assert_eq!(ExecParams::Positional(vec![Value::Int(1), Value::Int(2)]).len(), 2);
        assert!(ExecParams::Named(HashMap::new()).is_empty());
    }

    #[test]
    fn typed_value_builder_sets_type_and_style_hint() {
        let tv = TypedValue::new(1i64)
            .with_type(DeclaredType::BigInt)
            .with_style_hint(crate::placeholder::PlaceholderStyle::NumericDollar);
        assert_eq!(tv.declared_type, Some(DeclaredType::BigInt));
        assert_eq!(tv.style_hint, Some(crate::placeholder::PlaceholderStyle::NumericDollar));
    }
}

/// A tiny seam so this module does not hard-depend on `serde_json` when the
/// `serde` feature is off, while still giving `Value::Json` a concrete type.
pub mod serde_json_value {
    #[cfg(feature = "serde")]
    pub type JsonValue = serde_json::Value;

    #[cfg(not(feature = "serde"))]
    #[derive(Debug, Clone, PartialEq)]
    pub enum JsonValue {
        Null,
        Bool(bool),
        Number(i64),
        String(compact_str::CompactString),
        Array(Vec<JsonValue>),
        Object(Vec<(compact_str::CompactString, JsonValue)>),
    }
}
