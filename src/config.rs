//! The immutable compilation configuration (§3.5).

use crate::placeholder::PlaceholderStyle;
use compact_str::CompactString;
use std::collections::HashSet;
use std::sync::Arc;

/// A shared, immutable configuration value.
///
/// `Statement` holds this as an `Arc<Configuration>` rather than by value
/// (§3.6 "shared by reference; immutable; lifetime ≥ statement lifetime") so
/// `with_config`/`copy` are cheap clones, not deep copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub dialect: CompactString,

    pub enable_parsing: bool,
    pub enable_validation: bool,
    pub enable_transformations: bool,
    pub enable_analysis: bool,
    pub strict_mode: bool,

    pub parameterize_literals: bool,
    pub preserve_patterns: Vec<CompactString>,

    pub target_parameter_style: Option<PlaceholderStyle>,
    pub allowed_parameter_styles: HashSet<PlaceholderStyle>,
    pub allow_mixed_parameter_styles: bool,

    /// Static inlines bound values straight into the SQL text (§6.3); that's
    /// only safe for caller-controlled or hoisted literal values, never for
    /// arbitrary user input, so callers must opt in explicitly.
    pub allow_static_with_user_values: bool,

    pub allow_ddl: bool,
    pub allow_risky_dml: bool,
    pub require_where_for_update: bool,
    pub require_where_for_delete: bool,
    pub protected_tables: HashSet<CompactString>,
    pub max_joins: Option<usize>,
    pub max_subquery_depth: Option<usize>,
    pub forbidden_keywords: HashSet<CompactString>,

    pub parsed_ast_cache_size: u64,
    pub compiled_cache_size: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            dialect: CompactString::new("generic"),
            enable_parsing: true,
            enable_validation: true,
            enable_transformations: true,
            enable_analysis: true,
            strict_mode: false,
            parameterize_literals: false,
            preserve_patterns: Vec::new(),
            target_parameter_style: None,
            allowed_parameter_styles: PlaceholderStyle::ALL.iter().copied().collect(),
            allow_mixed_parameter_styles: false,
            allow_static_with_user_values: false,
            allow_ddl: true,
            allow_risky_dml: false,
            require_where_for_update: true,
            require_where_for_delete: true,
            protected_tables: HashSet::new(),
            max_joins: None,
            max_subquery_depth: None,
            forbidden_keywords: HashSet::new(),
            parsed_ast_cache_size: 512,
            compiled_cache_size: 2048,
        }
    }
}

impl Configuration {
    pub fn new(dialect: impl Into<CompactString>) -> Self {
        Self {
            dialect: dialect.into(),
            ..Default::default()
        }
    }

    pub fn shared(self) -> Arc<Configuration> {
        Arc::new(self)
    }

    pub fn with_target_parameter_style(mut self, style: PlaceholderStyle) -> Self {
        self.target_parameter_style = Some(style);
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_parameterize_literals(mut self, on: bool) -> Self {
        self.parameterize_literals = on;
        self
    }

    pub fn with_allow_static_with_user_values(mut self, allow: bool) -> Self {
        self.allow_static_with_user_values = allow;
        self
    }

    pub fn with_protected_tables(
        mut self,
        tables: impl IntoIterator<Item = impl Into<CompactString>>,
    ) -> Self {
        self.protected_tables = tables.into_iter().map(Into::into).collect();
        self
    }
}

impl PlaceholderStyle {
    pub const ALL: [PlaceholderStyle; 9] = [
        PlaceholderStyle::Qmark,
        PlaceholderStyle::NumericDollar,
        PlaceholderStyle::NumericColon,
        PlaceholderStyle::NamedColon,
        PlaceholderStyle::NamedAt,
        PlaceholderStyle::NamedDollar,
        PlaceholderStyle::PyformatPositional,
        PlaceholderStyle::PyformatNamed,
        PlaceholderStyle::Static,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_every_style_but_forbids_mixing() {
        let config = Configuration::default();
        assert_eq!(config.allowed_parameter_styles.len(), 9);
        assert!(!config.allow_mixed_parameter_styles);
    }
}
