//! Tracing utilities for sqlspec compilation observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate. These
//! macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate at
//! every call site.

/// Emit a debug-level tracing event for one actual pipeline run (never for a
/// cache hit — those are observable separately via `sqlspec_trace_cache!`).
///
/// ```ignore
/// sqlspec_trace_compile!(&config.dialect, false, "select");
/// ```
#[macro_export]
macro_rules! sqlspec_trace_compile {
    ($dialect:expr, $cache_hit:expr, $kind:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            dialect = %$dialect,
            cache_hit = $cache_hit,
            kind = %$kind,
            "sqlspec.compile"
        );
    };
}

/// Emit an info-level tracing event when a cache tier evicts an entry.
///
/// ```ignore
/// sqlspec_trace_cache!("compiled", "evict");
/// ```
#[macro_export]
macro_rules! sqlspec_trace_cache {
    ($tier:literal, $event:literal) => {
        #[cfg(feature = "tracing")]
        tracing::info!(tier = $tier, event = $event, "sqlspec.cache");
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn trace_macros_expand_without_the_tracing_feature() {
        let dialect = "postgres";
        sqlspec_trace_compile!(dialect, false, "select");
        sqlspec_trace_cache!("compiled", "evict");
    }
}
