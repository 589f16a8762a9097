//! `tracing` backed instrumenter and logger.

use std::sync::Arc;
use std::time::Instant;

use tracing::{field, Level, Span};

use crate::config::TracingConfig;
use crate::context::Context;
use crate::error::Error;
use crate::instrument::{Instrumenter, LogEntry, Logger, NoopTimer, Operation, Timer};

/// Records every timed driver operation as a `db.query` span.
///
/// The span becomes a child of the context's span, or of the current span
/// when the context carries none, so database spans nest under whatever
/// request span the caller is running in.
///
/// # Span Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `db.operation` | Operation tag, e.g. `sql-conn-query` |
/// | `db.system` | Configured database system |
/// | `db.name` | Configured database name |
/// | `db.connection` | Connection label from the wrap options |
/// | `db.statement` | Query text (when enabled) |
/// | `db.duration_ms` | Elapsed time |
/// | `otel.status_code` | "OK" or "ERROR" |
/// | `error.message` | Error details (on failure) |
#[derive(Debug, Clone, Default)]
pub struct TracingInstrumenter {
    config: Arc<TracingConfig>,
}

impl TracingInstrumenter {
    pub fn new(config: TracingConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub(crate) fn with_shared_config(config: Arc<TracingConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    fn create_span(
        &self,
        parent: &Span,
        connection: &str,
        operation: Operation,
        query: &str,
    ) -> Span {
        let span = tracing::info_span!(
            parent: parent,
            "db.query",
            otel.name = %operation,
            db.operation = %operation,
            db.system = field::Empty,
            db.name = field::Empty,
            db.connection = field::Empty,
            db.statement = field::Empty,
            db.duration_ms = field::Empty,
            otel.status_code = field::Empty,
            error.message = field::Empty,
            slow_query = field::Empty,
        );

        if let Some(system) = &self.config.db_system {
            span.record("db.system", system.as_str());
        }

        if let Some(db_name) = &self.config.database_name {
            span.record("db.name", db_name.as_str());
        }

        if !connection.is_empty() {
            span.record("db.connection", connection);
        }

        if self.config.log_statements && !query.is_empty() {
            span.record("db.statement", query);
        }

        span
    }
}

impl Instrumenter for TracingInstrumenter {
    fn start_timer(
        &self,
        ctx: Option<&Context>,
        connection: &str,
        operation: Operation,
        query: &str,
    ) -> Box<dyn Timer> {
        let parent = match ctx {
            Some(ctx) if !ctx.span().is_none() => ctx.span().clone(),
            Some(_) => Span::current(),
            None if self.config.trace_contextless => Span::current(),
            None => return Box::new(NoopTimer),
        };

        Box::new(TracingTimer {
            span: self.create_span(&parent, connection, operation, query),
            start: Instant::now(),
            config: Arc::clone(&self.config),
            failed: false,
        })
    }
}

struct TracingTimer {
    span: Span,
    start: Instant,
    config: Arc<TracingConfig>,
    failed: bool,
}

impl Timer for TracingTimer {
    fn record_error(&mut self, error: &Error) {
        self.failed = true;
        self.span.record("otel.status_code", "ERROR");
        self.span.record("error.message", error.to_string().as_str());
        tracing::error!(
            parent: &self.span,
            error = %error,
            "Database operation failed"
        );
    }

    fn span(&self) -> Option<Span> {
        Some(self.span.clone())
    }

    fn end(self: Box<Self>) {
        let elapsed = self.start.elapsed();
        let duration_ms = elapsed.as_millis() as i64;
        self.span.record("db.duration_ms", duration_ms);

        if elapsed > self.config.slow_query_threshold {
            self.span.record("slow_query", true);
            let threshold_ms = self.config.slow_query_threshold.as_millis() as i64;
            tracing::warn!(
                parent: &self.span,
                duration_ms = duration_ms,
                threshold_ms = threshold_ms,
                "Slow query detected"
            );
        }

        if !self.failed {
            self.span.record("otel.status_code", "OK");
        }
    }
}

/// Emits log entries as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger {
    log_statements: bool,
}

impl TracingLogger {
    /// `log_statements` controls whether query text is attached to events.
    pub fn new(log_statements: bool) -> Self {
        Self { log_statements }
    }
}

macro_rules! emit {
    ($level:ident, $operation:ident, $query:ident, $message:ident, $error:ident) => {
        match $error {
            Some(error) => tracing::$level!(
                db.operation = %$operation,
                db.statement = $query,
                error = %error,
                "{}",
                $message
            ),
            None => tracing::$level!(
                db.operation = %$operation,
                db.statement = $query,
                "{}",
                $message
            ),
        }
    };
}

impl Logger for TracingLogger {
    fn log(&self, entry: &LogEntry<'_>) {
        let operation = entry.operation;
        let query = if self.log_statements { entry.query } else { "" };
        let message = entry.message;
        let failure = entry.error;

        match entry.level {
            Level::ERROR => emit!(error, operation, query, message, failure),
            Level::WARN => emit!(warn, operation, query, message, failure),
            Level::INFO => emit!(info, operation, query, message, failure),
            Level::DEBUG => emit!(debug, operation, query, message, failure),
            _ => emit!(trace, operation, query, message, failure),
        }
    }
}
