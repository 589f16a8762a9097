//! # instrumented-sql
//!
//! Transparent timing and tracing instrumentation for async SQL drivers.
//!
//! This crate wraps a database driver (anything implementing [`Driver`]) so
//! that every driver-level operation (open, prepare, exec, query, begin,
//! commit, rollback, row iteration, result inspection) is timed and logged
//! without changing what the driver returns.
//!
//! ## Features
//!
//! - **Drop-in**: the wrapped driver implements the same traits as the real
//!   one, including the optional capability traits
//! - **Error transparent**: driver errors come back untouched, so downcasting
//!   still works
//! - **Capability fallback**: context-aware calls fall back to a driver's
//!   legacy methods when it lacks the context-aware ones
//! - **Pluggable backends**: bring your own [`Logger`] and [`Instrumenter`],
//!   or use the bundled `tracing` backend
//! - **Zero Config**: without options everything is a no-op
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use instrumented_sql::prelude::*;
//!
//! let driver = MyDriver::new().instrumented_with(WrapOptions::tracing(TracingConfig::default()));
//!
//! let ctx = Context::current();
//! let mut conn = driver.open("postgres://localhost/mydb").await?;
//! let queryer = conn.as_queryer_context().expect("wrapped connections can always query");
//! let mut rows = queryer.query_context(&ctx, "SELECT id FROM users", &[]).await?;
//! ```
//!
//! ## Timing
//!
//! Timers are started with the [`Context`] of the call, or of the call that
//! created the object being used. Objects created through a legacy
//! (context-less) entry point pass `None`, which the bundled backends treat
//! as untraced unless [`TracingConfig::with_contextless_tracing`] is set.

mod config;
mod connection;
mod context;
pub mod driver;
mod error;
mod instrument;
mod params;
mod result;
mod span;
mod statement;
mod transaction;

pub use config::{TracingConfig, WrapOptions};
pub use connection::{wrap_driver, InstrumentExt, WrappedConn, WrappedDriver};
pub use context::{Context, ContextError};
pub use driver::{
    Conn, ConnBeginTx, ConnCapabilities, ConnPrepareContext, Driver, ExecResult, Execer,
    ExecerContext, NamedValue, NamedValueChecker, Pinger, Queryer, QueryerContext, Rows,
    RowsCapabilities, RowsNextResultSet, SessionResetter, Stmt, StmtCapabilities,
    StmtExecContext, StmtQueryContext, Tx, TxOptions, Validator, Value,
};
pub use error::{BoxError, Error, Result};
pub use instrument::{
    Instrumenter, LogEntry, Logger, NoopTimer, NullInstrumenter, NullLogger, Operation, Timer,
};
pub use params::named_values_to_values;
pub use result::{WrappedResult, WrappedRows};
pub use span::{TracingInstrumenter, TracingLogger};
pub use statement::WrappedStmt;
pub use transaction::WrappedTx;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::driver::*;
    pub use crate::{
        wrap_driver, Context, Error, InstrumentExt, Result, TracingConfig, WrapOptions,
        WrappedDriver,
    };
}
