//! The driver-facing trait surface.
//!
//! A database driver implements [`Driver`], [`Conn`], [`Stmt`], [`Tx`],
//! [`ExecResult`] and [`Rows`]. Everything else is optional: a driver opts in
//! to a capability by implementing its trait and returning `Some(self)` from
//! the matching `as_*` accessor. Callers probe those accessors (or the
//! `capabilities()` summaries) instead of casting.
//!
//! ```rust,ignore
//! impl Conn for MyConn {
//!     // required methods ...
//!
//!     fn as_queryer_context(&mut self) -> Option<&mut dyn QueryerContext> {
//!         Some(self)
//!     }
//! }
//! ```

use async_trait::async_trait;
use sea_orm::{AccessMode, IsolationLevel};

use crate::context::Context;
use crate::error::Result;

/// A single bound or scanned value.
pub type Value = sea_orm::Value;

/// A query argument together with its optional name and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: Option<String>,
    pub ordinal: usize,
    pub value: Value,
}

impl NamedValue {
    /// A positional argument.
    pub fn positional(ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: None,
            ordinal,
            value: value.into(),
        }
    }

    /// An argument bound by name.
    pub fn named(name: impl Into<String>, ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            ordinal,
            value: value.into(),
        }
    }

    /// Whether the argument carries a non-empty name.
    pub fn is_named(&self) -> bool {
        self.name.as_deref().is_some_and(|name| !name.is_empty())
    }
}

/// Number the given values as positional arguments.
pub fn positional_args<I, V>(values: I) -> Vec<NamedValue>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| NamedValue::positional(index + 1, value))
        .collect()
}

/// Options for beginning a transaction.
#[derive(Debug, Clone, Default)]
pub struct TxOptions {
    pub isolation_level: Option<IsolationLevel>,
    pub access_mode: Option<AccessMode>,
}

impl TxOptions {
    /// Whether these options ask for anything beyond a plain `begin`.
    pub fn is_default(&self) -> bool {
        self.isolation_level.is_none() && self.access_mode.is_none()
    }
}

/// Entry point of a database driver.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new connection using a driver specific connection string.
    async fn open(&self, name: &str) -> Result<Box<dyn Conn>>;
}

/// A connection to the database. Used by one caller at a time.
#[async_trait]
pub trait Conn: Send {
    async fn prepare(&mut self, query: &str) -> Result<Box<dyn Stmt>>;

    async fn begin(&mut self) -> Result<Box<dyn Tx>>;

    async fn close(self: Box<Self>) -> Result<()>;

    fn as_prepare_context(&mut self) -> Option<&mut dyn ConnPrepareContext> {
        None
    }

    fn as_begin_tx(&mut self) -> Option<&mut dyn ConnBeginTx> {
        None
    }

    fn as_execer(&mut self) -> Option<&mut dyn Execer> {
        None
    }

    fn as_execer_context(&mut self) -> Option<&mut dyn ExecerContext> {
        None
    }

    fn as_queryer(&mut self) -> Option<&mut dyn Queryer> {
        None
    }

    fn as_queryer_context(&mut self) -> Option<&mut dyn QueryerContext> {
        None
    }

    fn as_pinger(&mut self) -> Option<&mut dyn Pinger> {
        None
    }

    fn as_session_resetter(&mut self) -> Option<&mut dyn SessionResetter> {
        None
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        None
    }

    /// Summarize which optional capabilities this connection offers.
    fn capabilities(&mut self) -> ConnCapabilities {
        ConnCapabilities {
            prepare_context: self.as_prepare_context().is_some(),
            begin_tx: self.as_begin_tx().is_some(),
            exec: self.as_execer().is_some(),
            exec_context: self.as_execer_context().is_some(),
            query: self.as_queryer().is_some(),
            query_context: self.as_queryer_context().is_some(),
            ping: self.as_pinger().is_some(),
            reset_session: self.as_session_resetter().is_some(),
            validator: self.as_validator().is_some(),
            named_value_checker: self.as_named_value_checker().is_some(),
        }
    }
}

#[async_trait]
pub trait ConnPrepareContext: Send {
    async fn prepare_context(&mut self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>>;
}

#[async_trait]
pub trait ConnBeginTx: Send {
    async fn begin_tx(&mut self, ctx: &Context, options: &TxOptions) -> Result<Box<dyn Tx>>;
}

/// Direct execution without a prepared statement. Returning
/// [`Error::Skip`](crate::Error::Skip) asks the caller to prepare instead.
#[async_trait]
pub trait Execer: Send {
    async fn exec(&mut self, query: &str, args: &[Value]) -> Result<Box<dyn ExecResult>>;
}

#[async_trait]
pub trait ExecerContext: Send {
    async fn exec_context(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>>;
}

#[async_trait]
pub trait Queryer: Send {
    async fn query(&mut self, query: &str, args: &[Value]) -> Result<Box<dyn Rows>>;
}

#[async_trait]
pub trait QueryerContext: Send {
    async fn query_context(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>>;
}

#[async_trait]
pub trait Pinger: Send {
    async fn ping(&mut self, ctx: &Context) -> Result<()>;
}

/// Called before a pooled connection is reused.
#[async_trait]
pub trait SessionResetter: Send {
    async fn reset_session(&mut self, ctx: &Context) -> Result<()>;
}

/// Reports whether a connection may still be used.
pub trait Validator {
    fn is_valid(&self) -> bool;
}

/// Lets a driver accept or convert argument types before execution.
pub trait NamedValueChecker {
    fn check_named_value(&self, value: &mut NamedValue) -> Result<()>;
}

/// A prepared statement bound to a connection.
#[async_trait]
pub trait Stmt: Send {
    async fn close(self: Box<Self>) -> Result<()>;

    /// Number of placeholders, or `None` if the driver does not know.
    fn num_input(&self) -> Option<usize>;

    async fn exec(&mut self, args: &[Value]) -> Result<Box<dyn ExecResult>>;

    async fn query(&mut self, args: &[Value]) -> Result<Box<dyn Rows>>;

    fn as_exec_context(&mut self) -> Option<&mut dyn StmtExecContext> {
        None
    }

    fn as_query_context(&mut self) -> Option<&mut dyn StmtQueryContext> {
        None
    }

    fn capabilities(&mut self) -> StmtCapabilities {
        StmtCapabilities {
            exec_context: self.as_exec_context().is_some(),
            query_context: self.as_query_context().is_some(),
        }
    }
}

#[async_trait]
pub trait StmtExecContext: Send {
    async fn exec_context(
        &mut self,
        ctx: &Context,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>>;
}

#[async_trait]
pub trait StmtQueryContext: Send {
    async fn query_context(&mut self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>>;
}

#[async_trait]
pub trait Tx: Send {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Outcome of an exec.
#[async_trait]
pub trait ExecResult: Send + Sync {
    async fn last_insert_id(&self) -> Result<i64>;

    async fn rows_affected(&self) -> Result<u64>;
}

/// A cursor over query results.
#[async_trait]
pub trait Rows: Send {
    fn columns(&self) -> &[String];

    /// Scan the next row into `dest`. `Ok(false)` means there are no more
    /// rows and `dest` was left untouched.
    async fn next(&mut self, dest: &mut [Value]) -> Result<bool>;

    async fn close(self: Box<Self>) -> Result<()>;

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        None
    }

    fn capabilities(&mut self) -> RowsCapabilities {
        RowsCapabilities {
            next_result_set: self.as_next_result_set().is_some(),
        }
    }
}

#[async_trait]
pub trait RowsNextResultSet: Send {
    fn has_next_result_set(&mut self) -> bool;

    /// Advance to the next result set. `Ok(false)` means there is none.
    async fn next_result_set(&mut self) -> Result<bool>;
}

/// Optional capabilities of a [`Conn`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnCapabilities {
    pub prepare_context: bool,
    pub begin_tx: bool,
    pub exec: bool,
    pub exec_context: bool,
    pub query: bool,
    pub query_context: bool,
    pub ping: bool,
    pub reset_session: bool,
    pub validator: bool,
    pub named_value_checker: bool,
}

impl ConnCapabilities {
    pub const ALL: Self = Self {
        prepare_context: true,
        begin_tx: true,
        exec: true,
        exec_context: true,
        query: true,
        query_context: true,
        ping: true,
        reset_session: true,
        validator: true,
        named_value_checker: true,
    };

    /// Whether every capability in `other` is also present in `self`.
    pub fn covers(&self, other: &Self) -> bool {
        (!other.prepare_context || self.prepare_context)
            && (!other.begin_tx || self.begin_tx)
            && (!other.exec || self.exec)
            && (!other.exec_context || self.exec_context)
            && (!other.query || self.query)
            && (!other.query_context || self.query_context)
            && (!other.ping || self.ping)
            && (!other.reset_session || self.reset_session)
            && (!other.validator || self.validator)
            && (!other.named_value_checker || self.named_value_checker)
    }
}

/// Optional capabilities of a [`Stmt`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StmtCapabilities {
    pub exec_context: bool,
    pub query_context: bool,
}

impl StmtCapabilities {
    pub const ALL: Self = Self {
        exec_context: true,
        query_context: true,
    };
}

/// Optional capabilities of a [`Rows`] cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowsCapabilities {
    pub next_result_set: bool,
}

impl RowsCapabilities {
    pub const ALL: Self = Self {
        next_result_set: true,
    };
}
