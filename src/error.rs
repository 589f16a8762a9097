//! Error types shared by drivers and the instrumentation layer.

use thiserror::Error;

use crate::context::ContextError;

/// Boxed error produced by a real driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate and by driver implementations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors crossing the driver boundary.
///
/// The instrumentation layer never rewrites an error it receives from the
/// real driver: whatever variant the driver returned is handed back to the
/// caller as-is. Only [`Error::NamedParametersUnsupported`],
/// [`Error::UnsupportedTxOptions`], [`Error::Context`] and [`Error::Skip`] are
/// ever raised by the wrappers themselves.
#[derive(Error, Debug)]
pub enum Error {
    /// The driver does not implement this path; the caller should fall back
    /// to another one (for example prepare followed by exec).
    #[error("driver: skip fast-path; continue as if unimplemented")]
    Skip,

    /// A named parameter was passed to a path that only accepts positional
    /// values.
    #[error("sql: driver does not support the use of named parameters")]
    NamedParametersUnsupported,

    /// Isolation level or access mode was requested from a connection that
    /// can only begin default transactions.
    #[error("sql: driver does not support non-default transaction options")]
    UnsupportedTxOptions,

    /// The request context was cancelled or its deadline passed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The connection is unusable and should be discarded.
    #[error("driver: bad connection")]
    BadConnection,

    /// Error reported by the underlying driver.
    #[error(transparent)]
    Driver(BoxError),
}

impl Error {
    /// Wrap a driver specific error.
    pub fn driver(error: impl Into<BoxError>) -> Self {
        Error::Driver(error.into())
    }

    /// Whether this is the "use another path" signal rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::Skip)
    }

    /// Downcast the driver error carried by [`Error::Driver`].
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Error::Driver(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}
