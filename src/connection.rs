//! Instrumented driver and connection wrappers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Level;

use crate::config::WrapOptions;
use crate::context::Context;
use crate::driver::{
    Conn, ConnBeginTx, ConnPrepareContext, Driver, ExecResult, Execer, ExecerContext, NamedValue,
    NamedValueChecker, Pinger, Queryer, QueryerContext, Rows, SessionResetter, Stmt, Tx,
    TxOptions, Validator, Value,
};
use crate::error::{Error, Result};
use crate::instrument::{Hooks, Operation};
use crate::params::named_values_to_values;
use crate::result::{WrappedResult, WrappedRows};
use crate::statement::WrappedStmt;
use crate::transaction::WrappedTx;

/// An instrumented wrapper around a [`Driver`].
///
/// Every connection it opens is a [`WrappedConn`], and every statement,
/// transaction, result and cursor reached from that connection is wrapped in
/// turn. Return values and errors are those of the underlying driver.
///
/// Only calls made with a [`Context`] are timed: the context carries the
/// cancellation and tracing parent the instrumenter needs. Prefer the
/// `*_context` methods and `begin_tx` over their legacy counterparts.
///
/// # Example
///
/// ```rust,ignore
/// use instrumented_sql::{InstrumentExt, TracingConfig, WrapOptions};
///
/// let driver = MyDriver::new().instrumented_with(WrapOptions::tracing(TracingConfig::default()));
/// let mut conn = driver.open("postgres://localhost/mydb").await?;
/// ```
#[derive(Debug)]
pub struct WrappedDriver<D> {
    inner: D,
    hooks: Arc<Hooks>,
}

impl<D: Driver> WrappedDriver<D> {
    /// Wrap a driver with the given options.
    pub fn new(driver: D, options: WrapOptions) -> Self {
        Self {
            inner: driver,
            hooks: Arc::new(Hooks::new(options)),
        }
    }

    /// Wrap a driver with no-op logging and instrumentation.
    pub fn wrap(driver: D) -> Self {
        Self::new(driver, WrapOptions::default())
    }

    /// Get a reference to the underlying driver.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Consume the wrapper and return the underlying driver.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

/// Wrap `driver` so that every operation reaching it is timed and logged
/// through the collaborators in `options`.
pub fn wrap_driver<D: Driver>(driver: D, options: WrapOptions) -> WrappedDriver<D> {
    WrappedDriver::new(driver, options)
}

#[async_trait]
impl<D: Driver> Driver for WrappedDriver<D> {
    async fn open(&self, name: &str) -> Result<Box<dyn Conn>> {
        let conn = self.inner.open(name).await?;
        Ok(Box::new(WrappedConn::new(conn, Arc::clone(&self.hooks))))
    }
}

/// Extension trait for easy wrapping of drivers.
pub trait InstrumentExt: Driver + Sized {
    /// Wrap this driver with no-op instrumentation.
    fn instrumented(self) -> WrappedDriver<Self>;

    /// Wrap this driver with custom options.
    fn instrumented_with(self, options: WrapOptions) -> WrappedDriver<Self>;
}

impl<D: Driver> InstrumentExt for D {
    fn instrumented(self) -> WrappedDriver<Self> {
        WrappedDriver::wrap(self)
    }

    fn instrumented_with(self, options: WrapOptions) -> WrappedDriver<Self> {
        WrappedDriver::new(self, options)
    }
}

/// An instrumented connection returned by [`WrappedDriver::open`].
///
/// The wrapper always offers the context-aware capabilities, falling back to
/// the legacy methods of the real connection when it lacks them. Session
/// capabilities (reset, validation, argument checking) are offered only when
/// the real connection has them.
pub struct WrappedConn {
    inner: Box<dyn Conn>,
    hooks: Arc<Hooks>,
}

impl WrappedConn {
    pub(crate) fn new(inner: Box<dyn Conn>, hooks: Arc<Hooks>) -> Self {
        Self { inner, hooks }
    }

    fn wrap_stmt(&self, stmt: Box<dyn Stmt>, ctx: Option<&Context>, query: &str) -> Box<dyn Stmt> {
        Box::new(WrappedStmt::new(
            stmt,
            ctx.cloned(),
            query,
            Arc::clone(&self.hooks),
        ))
    }

    fn wrap_tx(&self, tx: Box<dyn Tx>, ctx: Option<&Context>) -> Box<dyn Tx> {
        Box::new(WrappedTx::new(tx, ctx.cloned(), Arc::clone(&self.hooks)))
    }

    fn wrap_result(&self, result: Box<dyn ExecResult>, ctx: Option<&Context>) -> Box<dyn ExecResult> {
        Box::new(WrappedResult::new(result, ctx.cloned(), Arc::clone(&self.hooks)))
    }

    fn wrap_rows(&self, rows: Box<dyn Rows>, ctx: Option<&Context>) -> Box<dyn Rows> {
        Box::new(WrappedRows::new(rows, ctx.cloned(), Arc::clone(&self.hooks)))
    }

    /// Convert arguments and check the context before entering a legacy
    /// method, which can be neither cancelled nor handed names.
    fn prepare_fallback(
        &self,
        ctx: &Context,
        operation: Operation,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Vec<Value>> {
        let values = named_values_to_values(args).inspect_err(|err| {
            self.hooks
                .log_error(operation, query, "rejected arguments for legacy path", err)
        })?;
        self.check_context(ctx, operation, query)?;
        Ok(values)
    }

    fn check_context(&self, ctx: &Context, operation: Operation, query: &str) -> Result<()> {
        if let Err(err) = ctx.check() {
            self.hooks
                .log(Level::DEBUG, operation, query, "context done before legacy call");
            return Err(err.into());
        }
        self.hooks
            .log(Level::DEBUG, operation, query, "falling back to legacy driver call");
        Ok(())
    }

    async fn prepare_untimed(&mut self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
        if let Some(prepare) = self.inner.as_prepare_context() {
            let stmt = prepare.prepare_context(ctx, query).await?;
            return Ok(self.wrap_stmt(stmt, Some(ctx), query));
        }

        self.check_context(ctx, Operation::Prepare, query)?;
        let stmt = self.inner.prepare(query).await?;
        Ok(self.wrap_stmt(stmt, Some(ctx), query))
    }

    async fn begin_untimed(&mut self, ctx: &Context, options: &TxOptions) -> Result<Box<dyn Tx>> {
        if let Some(begin) = self.inner.as_begin_tx() {
            let tx = begin.begin_tx(ctx, options).await?;
            return Ok(self.wrap_tx(tx, Some(ctx)));
        }

        if !options.is_default() {
            let err = Error::UnsupportedTxOptions;
            self.hooks
                .log_error(Operation::TxBegin, "", "legacy begin cannot honor options", &err);
            return Err(err);
        }

        self.check_context(ctx, Operation::TxBegin, "")?;
        let tx = self.inner.begin().await?;
        Ok(self.wrap_tx(tx, Some(ctx)))
    }

    async fn exec_untimed(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        if let Some(execer) = self.inner.as_execer_context() {
            let result = execer.exec_context(ctx, query, args).await?;
            return Ok(self.wrap_result(result, Some(ctx)));
        }

        if self.inner.as_execer().is_none() {
            self.hooks
                .log(Level::TRACE, Operation::ConnExec, query, "no exec capability, skipping");
            return Err(Error::Skip);
        }

        let values = self.prepare_fallback(ctx, Operation::ConnExec, query, args)?;
        let execer = self.inner.as_execer().ok_or(Error::Skip)?;
        let result = execer.exec(query, &values).await?;
        Ok(self.wrap_result(result, Some(ctx)))
    }

    async fn query_untimed(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        if let Some(queryer) = self.inner.as_queryer_context() {
            let rows = queryer.query_context(ctx, query, args).await?;
            return Ok(self.wrap_rows(rows, Some(ctx)));
        }

        if self.inner.as_queryer().is_none() {
            self.hooks
                .log(Level::TRACE, Operation::ConnQuery, query, "no query capability, skipping");
            return Err(Error::Skip);
        }

        let values = self.prepare_fallback(ctx, Operation::ConnQuery, query, args)?;
        let queryer = self.inner.as_queryer().ok_or(Error::Skip)?;
        let rows = queryer.query(query, &values).await?;
        Ok(self.wrap_rows(rows, Some(ctx)))
    }
}

#[async_trait]
impl Conn for WrappedConn {
    async fn prepare(&mut self, query: &str) -> Result<Box<dyn Stmt>> {
        let stmt = self.inner.prepare(query).await?;
        Ok(self.wrap_stmt(stmt, None, query))
    }

    async fn begin(&mut self) -> Result<Box<dyn Tx>> {
        let tx = self.inner.begin().await?;
        Ok(self.wrap_tx(tx, None))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.inner.close().await
    }

    fn as_prepare_context(&mut self) -> Option<&mut dyn ConnPrepareContext> {
        Some(self)
    }

    fn as_begin_tx(&mut self) -> Option<&mut dyn ConnBeginTx> {
        Some(self)
    }

    fn as_execer(&mut self) -> Option<&mut dyn Execer> {
        Some(self)
    }

    fn as_execer_context(&mut self) -> Option<&mut dyn ExecerContext> {
        Some(self)
    }

    fn as_queryer(&mut self) -> Option<&mut dyn Queryer> {
        Some(self)
    }

    fn as_queryer_context(&mut self) -> Option<&mut dyn QueryerContext> {
        Some(self)
    }

    fn as_pinger(&mut self) -> Option<&mut dyn Pinger> {
        Some(self)
    }

    fn as_session_resetter(&mut self) -> Option<&mut dyn SessionResetter> {
        if self.inner.as_session_resetter().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        self.inner.as_validator().map(|_| self as &dyn Validator)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        self.inner
            .as_named_value_checker()
            .map(|_| self as &dyn NamedValueChecker)
    }
}

#[async_trait]
impl ConnPrepareContext for WrappedConn {
    async fn prepare_context(&mut self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
        let mut timer = self.hooks.start(Some(ctx), Operation::Prepare, query);
        let result = timer.instrument(self.prepare_untimed(ctx, query)).await;
        timer.observe(&result);
        result
    }
}

#[async_trait]
impl ConnBeginTx for WrappedConn {
    async fn begin_tx(&mut self, ctx: &Context, options: &TxOptions) -> Result<Box<dyn Tx>> {
        let mut timer = self.hooks.start(Some(ctx), Operation::TxBegin, "");
        let result = timer.instrument(self.begin_untimed(ctx, options)).await;
        timer.observe(&result);
        result
    }
}

#[async_trait]
impl Execer for WrappedConn {
    async fn exec(&mut self, query: &str, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        let Some(execer) = self.inner.as_execer() else {
            return Err(Error::Skip);
        };
        let result = execer.exec(query, args).await?;
        Ok(self.wrap_result(result, None))
    }
}

#[async_trait]
impl ExecerContext for WrappedConn {
    async fn exec_context(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        let mut timer = self.hooks.start(Some(ctx), Operation::ConnExec, query);
        let result = timer.instrument(self.exec_untimed(ctx, query, args)).await;
        timer.observe(&result);
        result
    }
}

#[async_trait]
impl Queryer for WrappedConn {
    async fn query(&mut self, query: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        let Some(queryer) = self.inner.as_queryer() else {
            return Err(Error::Skip);
        };
        let rows = queryer.query(query, args).await?;
        Ok(self.wrap_rows(rows, None))
    }
}

#[async_trait]
impl QueryerContext for WrappedConn {
    async fn query_context(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        let mut timer = self.hooks.start(Some(ctx), Operation::ConnQuery, query);
        let result = timer.instrument(self.query_untimed(ctx, query, args)).await;
        timer.observe(&result);
        result
    }
}

#[async_trait]
impl Pinger for WrappedConn {
    async fn ping(&mut self, ctx: &Context) -> Result<()> {
        let mut timer = self.hooks.start(Some(ctx), Operation::Ping, "");
        let result = match self.inner.as_pinger() {
            Some(pinger) => timer.instrument(pinger.ping(ctx)).await,
            None => Ok(()),
        };
        timer.observe(&result);
        result
    }
}

#[async_trait]
impl SessionResetter for WrappedConn {
    async fn reset_session(&mut self, ctx: &Context) -> Result<()> {
        let mut timer = self.hooks.start(Some(ctx), Operation::ResetSession, "");
        let result = match self.inner.as_session_resetter() {
            Some(resetter) => timer.instrument(resetter.reset_session(ctx)).await,
            None => Ok(()),
        };
        timer.observe(&result);
        result
    }
}

impl Validator for WrappedConn {
    fn is_valid(&self) -> bool {
        self.inner
            .as_validator()
            .map_or(true, |validator| validator.is_valid())
    }
}

impl NamedValueChecker for WrappedConn {
    fn check_named_value(&self, value: &mut NamedValue) -> Result<()> {
        match self.inner.as_named_value_checker() {
            Some(checker) => checker.check_named_value(value),
            None => Err(Error::Skip),
        }
    }
}
