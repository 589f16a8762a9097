//! Logger and timer collaborators, plus the scoped timer used by the wrappers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::instrument::Instrumented;
use tracing::{Instrument, Level, Span};

use crate::config::WrapOptions;
use crate::context::Context;
use crate::error::{Error, Result};

/// Driver operations that are timed or logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Prepare,
    TxBegin,
    ConnExec,
    ConnQuery,
    Ping,
    ResetSession,
    TxCommit,
    TxRollback,
    StmtClose,
    StmtExec,
    StmtQuery,
    LastInsertId,
    RowsAffected,
    RowsNext,
    RowsNextResultSet,
}

impl Operation {
    /// Returns the operation tag handed to instrumenters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Prepare => "sql-prepare",
            Operation::TxBegin => "sql-tx-begin",
            Operation::ConnExec => "sql-conn-exec",
            Operation::ConnQuery => "sql-conn-query",
            Operation::Ping => "sql-ping",
            Operation::ResetSession => "sql-conn-reset-session",
            Operation::TxCommit => "sql-tx-commit",
            Operation::TxRollback => "sql-tx-rollback",
            Operation::StmtClose => "sql-stmt-close",
            Operation::StmtExec => "sql-stmt-exec",
            Operation::StmtQuery => "sql-stmt-query",
            Operation::LastInsertId => "sql-res-last-insert-id",
            Operation::RowsAffected => "sql-res-rows-affected",
            Operation::RowsNext => "sql-rows-next",
            Operation::RowsNextResultSet => "sql-rows-next-result-set",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured log record emitted by the wrappers.
#[derive(Debug, Clone, Copy)]
pub struct LogEntry<'a> {
    pub level: Level,
    pub operation: Operation,
    /// Query text, empty when the operation has none.
    pub query: &'a str,
    pub message: &'a str,
    pub error: Option<&'a Error>,
}

/// Sink for the wrappers' own decisions (fallbacks, skips, rejections).
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry<'_>);
}

/// Discards every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _entry: &LogEntry<'_>) {}
}

/// A running timer. Ended exactly once.
pub trait Timer: Send {
    /// Mark the timed operation as failed. May be called before `end`.
    fn record_error(&mut self, _error: &Error) {}

    /// Span the timed driver call should run in, if the backend has one.
    fn span(&self) -> Option<Span> {
        None
    }

    /// Stop the timer and record the elapsed duration.
    fn end(self: Box<Self>);
}

/// Starts timers for driver operations.
///
/// `ctx` is `None` when the wrapped object was created through a path that
/// had no context; backends usually treat such calls as untimed.
pub trait Instrumenter: Send + Sync {
    fn start_timer(
        &self,
        ctx: Option<&Context>,
        connection: &str,
        operation: Operation,
        query: &str,
    ) -> Box<dyn Timer>;
}

/// Hands out timers that record nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInstrumenter;

impl Instrumenter for NullInstrumenter {
    fn start_timer(
        &self,
        _ctx: Option<&Context>,
        _connection: &str,
        _operation: Operation,
        _query: &str,
    ) -> Box<dyn Timer> {
        Box::new(NoopTimer)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTimer;

impl Timer for NoopTimer {
    fn end(self: Box<Self>) {}
}

/// Ends its timer when dropped, so early returns, panics and dropped futures
/// all close the timer.
pub(crate) struct TimerScope {
    timer: Option<Box<dyn Timer>>,
}

impl TimerScope {
    /// Run the forwarded driver call inside the timer's span.
    pub(crate) fn instrument<F: Future>(&self, future: F) -> Instrumented<F> {
        let span = self
            .timer
            .as_ref()
            .and_then(|timer| timer.span())
            .unwrap_or_else(Span::none);
        future.instrument(span)
    }

    /// Forward a failed result to the timer. The skip signal is negotiation,
    /// not failure, and is not recorded.
    pub(crate) fn observe<T>(&mut self, result: &Result<T>) {
        if let (Err(err), Some(timer)) = (result, self.timer.as_mut()) {
            if !err.is_skip() {
                timer.record_error(err);
            }
        }
    }
}

impl Drop for TimerScope {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.end();
        }
    }
}

/// Logger, instrumenter and connection label shared by every wrapper created
/// from one driver.
pub(crate) struct Hooks {
    logger: Arc<dyn Logger>,
    instrumenter: Arc<dyn Instrumenter>,
    connection: String,
}

impl Hooks {
    pub(crate) fn new(options: WrapOptions) -> Self {
        Self {
            logger: options.logger,
            instrumenter: options.instrumenter,
            connection: options.connection_label,
        }
    }

    pub(crate) fn start(
        &self,
        ctx: Option<&Context>,
        operation: Operation,
        query: &str,
    ) -> TimerScope {
        TimerScope {
            timer: Some(
                self.instrumenter
                    .start_timer(ctx, &self.connection, operation, query),
            ),
        }
    }

    pub(crate) fn log(&self, level: Level, operation: Operation, query: &str, message: &str) {
        self.logger.log(&LogEntry {
            level,
            operation,
            query,
            message,
            error: None,
        });
    }

    pub(crate) fn log_error(&self, operation: Operation, query: &str, message: &str, error: &Error) {
        self.logger.log(&LogEntry {
            level: Level::WARN,
            operation,
            query,
            message,
            error: Some(error),
        });
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
