//! Adapter profiles and the process-wide registry (§3.8, §4.8).
//!
//! The registry is the only place adapter-specific quirks live; the compiler
//! stays adapter-agnostic and only ever sees a `target_parameter_style` and an
//! `ExecutionStyle`/`native_list_expansion`/`json_strategy` drawn from a
//! looked-up profile. Frozen at startup (§9 "global registries mutated at
//! import time" is the anti-pattern this replaces): `AdapterRegistry::new`
//! seeds the closed set of known adapters, callers may `register` more before
//! the first `compile`, and lookups afterward are lock-free reads over an
//! `Arc<HashMap<..>>` snapshot.

use crate::placeholder::PlaceholderStyle;
use crate::style::ExecutionStyle;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// How a `Value::Json`/`Value::List`-of-objects parameter should be prepared
/// before hand-off to the adapter (§6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonStrategy {
    /// The core serializes to a JSON string before hand-off.
    Helper,
    /// The value passes through; the adapter registers its own codec.
    Driver,
    /// Neither the core nor anything it calls touches JSON values.
    None,
}

/// Per-type coercion a given adapter wants applied to `Value` before bind.
/// Kept as a closed set rather than a callback: the core never executes
/// arbitrary adapter code, only chooses among declared coercions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCoercion {
    /// No coercion; bind the value as-is.
    None,
    /// Render `bool` as `0`/`1` instead of the driver's native boolean bind.
    BoolAsInt,
    /// Render `Value::Bytes` as the dialect's hex literal instead of binding
    /// raw bytes (only relevant under `Static` rendering).
    BytesAsHex,
}

/// An immutable, per-adapter record of SQL-shaping preferences (§3.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProfile {
    pub key: CompactString,
    pub default_parameter_style: PlaceholderStyle,
    pub supported_parameter_styles: Vec<PlaceholderStyle>,
    pub execution_style: ExecutionStyle,
    pub native_list_expansion: bool,
    pub json_strategy: JsonStrategy,
    pub type_coercion_overrides: Vec<(CompactString, TypeCoercion)>,
    pub autocommit_default: bool,
}

impl AdapterProfile {
    pub fn new(key: impl Into<CompactString>, default_parameter_style: PlaceholderStyle) -> Self {
        Self {
            key: key.into(),
            default_parameter_style,
            supported_parameter_styles: vec![default_parameter_style],
            execution_style: ExecutionStyle::Either,
            native_list_expansion: true,
            json_strategy: JsonStrategy::Driver,
            type_coercion_overrides: Vec::new(),
            autocommit_default: true,
        }
    }

    pub fn with_supported_styles(mut self, styles: impl IntoIterator<Item = PlaceholderStyle>) -> Self {
        self.supported_parameter_styles = styles.into_iter().collect();
        self
    }

    pub fn with_execution_style(mut self, style: ExecutionStyle) -> Self {
        self.execution_style = style;
        self
    }

    pub fn with_native_list_expansion(mut self, native: bool) -> Self {
        self.native_list_expansion = native;
        self
    }

    pub fn with_json_strategy(mut self, strategy: JsonStrategy) -> Self {
        self.json_strategy = strategy;
        self
    }

    pub fn coercion_for(&self, declared_type: &str) -> TypeCoercion {
        self.type_coercion_overrides
            .iter()
            .find(|(k, _)| k.as_str() == declared_type)
            .map(|(_, v)| *v)
            .unwrap_or(TypeCoercion::None)
    }
}

fn builtin_profiles() -> HashMap<CompactString, Arc<AdapterProfile>> {
    let mut map = HashMap::new();

    let postgres = AdapterProfile::new("postgres", PlaceholderStyle::NumericDollar)
        .with_supported_styles([PlaceholderStyle::NumericDollar, PlaceholderStyle::NamedDollar])
        .with_execution_style(ExecutionStyle::PositionOnly)
        .with_native_list_expansion(false)
        .with_json_strategy(JsonStrategy::Helper);

    let mysql = AdapterProfile::new("mysql", PlaceholderStyle::PyformatPositional)
        .with_supported_styles([PlaceholderStyle::PyformatPositional, PlaceholderStyle::Qmark])
        .with_execution_style(ExecutionStyle::PositionOnly)
        .with_native_list_expansion(false)
        .with_json_strategy(JsonStrategy::Helper);

    let sqlite = AdapterProfile::new("sqlite", PlaceholderStyle::Qmark)
        .with_supported_styles([PlaceholderStyle::Qmark, PlaceholderStyle::NamedColon])
        .with_execution_style(ExecutionStyle::Either)
        .with_native_list_expansion(false)
        .with_json_strategy(JsonStrategy::Helper);

    let oracle = AdapterProfile::new("oracle", PlaceholderStyle::NamedColon)
        .with_supported_styles([PlaceholderStyle::NamedColon, PlaceholderStyle::NumericColon])
        .with_execution_style(ExecutionStyle::Either)
        .with_native_list_expansion(false)
        .with_json_strategy(JsonStrategy::Driver);

    let duckdb = AdapterProfile::new("duckdb", PlaceholderStyle::Qmark)
        .with_supported_styles([PlaceholderStyle::Qmark, PlaceholderStyle::NumericDollar])
        .with_execution_style(ExecutionStyle::PositionOnly)
        .with_native_list_expansion(true)
        .with_json_strategy(JsonStrategy::Driver);

    let bigquery = AdapterProfile::new("bigquery", PlaceholderStyle::NamedAt)
        .with_supported_styles([PlaceholderStyle::NamedAt])
        .with_execution_style(ExecutionStyle::NameOnly)
        .with_native_list_expansion(true)
        .with_json_strategy(JsonStrategy::Driver);

    for profile in [postgres, mysql, sqlite, oracle, duckdb, bigquery] {
        map.insert(profile.key.clone(), Arc::new(profile));
    }
    map
}

/// The process-wide, write-once profile registry (§4.8).
///
/// Built frozen at startup from the closed set of known adapters. Additional
/// entries may be `register`ed before the first `compile`; `RwLock` guards the
/// registration window but steady-state `lookup` calls are simple read locks
/// over an already-settled map, never blocked by a writer in practice.
pub struct AdapterRegistry {
    profiles: RwLock<HashMap<CompactString, Arc<AdapterProfile>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(builtin_profiles()),
        }
    }

    pub fn register(&self, profile: AdapterProfile) {
        self.profiles
            .write()
            .expect("adapter registry lock poisoned")
            .insert(profile.key.clone(), Arc::new(profile));
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<AdapterProfile>> {
        self.profiles
            .read()
            .expect("adapter registry lock poisoned")
            .get(key)
            .cloned()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: OnceLock<AdapterRegistry> = OnceLock::new();

/// The shared, process-wide registry instance.
pub fn registry() -> &'static AdapterRegistry {
    REGISTRY.get_or_init(AdapterRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_postgres_profile_prefers_numeric_dollar() {
        let registry = AdapterRegistry::new();
        let profile = registry.lookup("postgres").unwrap();
        assert_eq!(profile.default_parameter_style, PlaceholderStyle::NumericDollar);
        assert!(!profile.native_list_expansion);
    }

    #[test]
    fn unknown_adapter_key_is_none() {
        let registry = AdapterRegistry::new();
        assert!(registry.lookup("made_up_driver").is_none());
    }

    #[test]
    fn register_adds_a_custom_profile() {
        let registry = AdapterRegistry::new();
        registry.register(AdapterProfile::new("custom", PlaceholderStyle::Qmark));
        assert!(registry.lookup("custom").is_some());
    }
}
