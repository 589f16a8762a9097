//! Configuration for the wrapped driver and the tracing backend.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::instrument::{Instrumenter, Logger, NullInstrumenter, NullLogger};
use crate::span::{TracingInstrumenter, TracingLogger};

/// Options applied when wrapping a driver.
///
/// Anything left unset falls back to a no-op implementation.
///
/// # Example
///
/// ```rust
/// use instrumented_sql::{TracingConfig, WrapOptions};
///
/// let options = WrapOptions::tracing(TracingConfig::default().with_statement_logging(true))
///     .with_connection_label("primary");
/// assert_eq!(options.connection_label, "primary");
/// ```
#[derive(Clone)]
pub struct WrapOptions {
    /// Receives the wrappers' own log entries.
    /// Default: [`NullLogger`]
    pub logger: Arc<dyn Logger>,

    /// Starts a timer around every timed operation.
    /// Default: [`NullInstrumenter`]
    pub instrumenter: Arc<dyn Instrumenter>,

    /// Label passed to the instrumenter with every timer.
    /// Default: empty
    pub connection_label: String,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            logger: Arc::new(NullLogger),
            instrumenter: Arc::new(NullInstrumenter),
            connection_label: String::new(),
        }
    }
}

impl WrapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that send both timers and log entries to `tracing`.
    pub fn tracing(config: TracingConfig) -> Self {
        let config = Arc::new(config);
        Self::default()
            .with_logger(TracingLogger::new(config.log_statements))
            .with_instrumenter(TracingInstrumenter::with_shared_config(config))
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn with_instrumenter(mut self, instrumenter: impl Instrumenter + 'static) -> Self {
        self.instrumenter = Arc::new(instrumenter);
        self
    }

    /// Install an instrumenter that is also held elsewhere, e.g. for
    /// inspection in tests.
    pub fn with_shared_instrumenter(mut self, instrumenter: Arc<dyn Instrumenter>) -> Self {
        self.instrumenter = instrumenter;
        self
    }

    pub fn with_shared_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_connection_label(mut self, label: impl Into<String>) -> Self {
        self.connection_label = label.into();
        self
    }
}

impl fmt::Debug for WrapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapOptions")
            .field("connection_label", &self.connection_label)
            .finish_non_exhaustive()
    }
}

/// Settings for [`TracingInstrumenter`] and [`TracingLogger`].
///
/// # Example
///
/// ```rust
/// use instrumented_sql::TracingConfig;
/// use std::time::Duration;
///
/// let config = TracingConfig::default()
///     .with_statement_logging(true)
///     .with_slow_query_threshold(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether to include the SQL statement in spans and log events.
    /// Default: `false` (for security - prevents accidental credential logging)
    pub log_statements: bool,

    /// Operations exceeding this duration are logged at WARN level.
    /// Default: 500ms
    pub slow_query_threshold: Duration,

    /// Custom database name to include in spans (useful for multi-database setups).
    /// Default: `None`
    pub database_name: Option<String>,

    /// Value for the `db.system` span attribute, e.g. "postgresql".
    /// Default: `None`
    pub db_system: Option<String>,

    /// Whether operations on objects created without a context get spans.
    /// Default: `false`
    pub trace_contextless: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_statements: false,
            slow_query_threshold: Duration::from_millis(500),
            database_name: None,
            db_system: None,
            trace_contextless: false,
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable SQL statement logging in spans.
    ///
    /// **Security Warning**: Enabling this may expose sensitive data in your traces
    /// if your queries contain credentials or PII in the SQL text itself.
    pub fn with_statement_logging(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Set the threshold for slow operation warnings.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Set a database name to include in spans.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    pub fn with_db_system(mut self, system: impl Into<String>) -> Self {
        self.db_system = Some(system.into());
        self
    }

    /// Also trace operations that were not started under a context, using the
    /// current span as parent.
    pub fn with_contextless_tracing(mut self, enabled: bool) -> Self {
        self.trace_contextless = enabled;
        self
    }

    /// Create a development-friendly configuration with full logging enabled.
    ///
    /// **Warning**: Do not use in production as it logs all SQL.
    pub fn development() -> Self {
        Self {
            log_statements: true,
            slow_query_threshold: Duration::from_millis(100),
            trace_contextless: true,
            ..Self::default()
        }
    }

    /// Create a production-safe configuration with minimal overhead.
    pub fn production() -> Self {
        Self {
            log_statements: false,
            slow_query_threshold: Duration::from_secs(1),
            trace_contextless: false,
            ..Self::default()
        }
    }
}
