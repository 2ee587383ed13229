//! `sqlspec`: a type-safe SQL statement compiler and parameter-style
//! normalizer (§1, §2).
//!
//! A [`Statement`](statement::Statement) carries raw SQL (or a
//! [`builder`]-produced AST) plus a [`Configuration`](config::Configuration)
//! and a [`ParamPayload`](value::ParamPayload). Calling
//! [`Statement::compile`](statement::Statement::compile) runs the pipeline in
//! [`compiler`] once, lazily, and caches the result — both on the
//! `Statement` itself and, for filter-free statements, in the process-wide
//! two-tier [`cache`].
//!
//! ```
//! use sqlspec::config::Configuration;
//! use sqlspec::statement::Statement;
//! use sqlspec::value::ParamPayload;
//!
//! let config = Configuration::new("postgres").shared();
//! let stmt = Statement::new(
//!     "SELECT * FROM users WHERE id = ?",
//!     ParamPayload::positional([1i64]),
//!     config,
//! );
//! let compiled = stmt.compile().unwrap();
//! assert!(compiled.rendered_sql.contains('$'));
//! ```

pub mod adapter;
pub mod ast;
pub mod builder;
pub mod cache;
pub mod compiled;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod placeholder;
pub mod processors;
pub mod statement;
pub mod style;
pub mod tracing;
pub mod value;

pub use compiled::CompiledStatement;
pub use config::Configuration;
pub use error::{Result, Severity, SqlSpecError};
pub use placeholder::PlaceholderStyle;
pub use statement::{Filter, Statement};
pub use value::{ExecParams, ParamPayload, Value};
