//! Instrumented prepared statement wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Level;

use crate::context::Context;
use crate::driver::{ExecResult, NamedValue, Rows, Stmt, StmtExecContext, StmtQueryContext, Value};
use crate::error::Result;
use crate::instrument::{Hooks, Operation};
use crate::params::named_values_to_values;
use crate::result::{WrappedResult, WrappedRows};

/// An instrumented prepared statement.
///
/// Keeps the query text it was prepared from so that every timer started on
/// its behalf carries it. Legacy calls are timed against the context the
/// statement was prepared under (if any); context-aware calls are timed
/// against the call's own context.
pub struct WrappedStmt {
    inner: Box<dyn Stmt>,
    ctx: Option<Context>,
    query: String,
    hooks: Arc<Hooks>,
}

impl WrappedStmt {
    pub(crate) fn new(
        inner: Box<dyn Stmt>,
        ctx: Option<Context>,
        query: impl Into<String>,
        hooks: Arc<Hooks>,
    ) -> Self {
        Self {
            inner,
            ctx,
            query: query.into(),
            hooks,
        }
    }

    fn wrap_result(&self, result: Box<dyn ExecResult>, ctx: Option<&Context>) -> Box<dyn ExecResult> {
        Box::new(WrappedResult::new(result, ctx.cloned(), Arc::clone(&self.hooks)))
    }

    fn wrap_rows(&self, rows: Box<dyn Rows>, ctx: Option<&Context>) -> Box<dyn Rows> {
        Box::new(WrappedRows::new(rows, ctx.cloned(), Arc::clone(&self.hooks)))
    }

    fn legacy_values(
        &self,
        ctx: &Context,
        operation: Operation,
        args: &[NamedValue],
    ) -> Result<Vec<Value>> {
        let values = named_values_to_values(args).inspect_err(|err| {
            self.hooks
                .log_error(operation, &self.query, "rejected arguments for legacy path", err)
        })?;

        if let Err(err) = ctx.check() {
            self.hooks
                .log(Level::DEBUG, operation, &self.query, "context done before legacy call");
            return Err(err.into());
        }

        self.hooks
            .log(Level::DEBUG, operation, &self.query, "falling back to legacy statement call");
        Ok(values)
    }

    async fn exec_untimed(
        &mut self,
        ctx: &Context,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        if let Some(stmt) = self.inner.as_exec_context() {
            let result = stmt.exec_context(ctx, args).await?;
            return Ok(self.wrap_result(result, Some(ctx)));
        }

        let values = self.legacy_values(ctx, Operation::StmtExec, args)?;
        let result = self.inner.exec(&values).await?;
        Ok(self.wrap_result(result, Some(ctx)))
    }

    async fn query_untimed(&mut self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>> {
        if let Some(stmt) = self.inner.as_query_context() {
            let rows = stmt.query_context(ctx, args).await?;
            return Ok(self.wrap_rows(rows, Some(ctx)));
        }

        let values = self.legacy_values(ctx, Operation::StmtQuery, args)?;
        let rows = self.inner.query(&values).await?;
        Ok(self.wrap_rows(rows, Some(ctx)))
    }
}

#[async_trait]
impl Stmt for WrappedStmt {
    async fn close(self: Box<Self>) -> Result<()> {
        let mut timer = self
            .hooks
            .start(self.ctx.as_ref(), Operation::StmtClose, &self.query);
        let result = timer.instrument(self.inner.close()).await;
        timer.observe(&result);
        result
    }

    fn num_input(&self) -> Option<usize> {
        self.inner.num_input()
    }

    async fn exec(&mut self, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        let mut timer = self
            .hooks
            .start(self.ctx.as_ref(), Operation::StmtExec, &self.query);
        let result = match timer.instrument(self.inner.exec(args)).await {
            Ok(result) => Ok(self.wrap_result(result, self.ctx.as_ref())),
            Err(err) => Err(err),
        };
        timer.observe(&result);
        result
    }

    async fn query(&mut self, args: &[Value]) -> Result<Box<dyn Rows>> {
        let mut timer = self
            .hooks
            .start(self.ctx.as_ref(), Operation::StmtQuery, &self.query);
        let result = match timer.instrument(self.inner.query(args)).await {
            Ok(rows) => Ok(self.wrap_rows(rows, self.ctx.as_ref())),
            Err(err) => Err(err),
        };
        timer.observe(&result);
        result
    }

    fn as_exec_context(&mut self) -> Option<&mut dyn StmtExecContext> {
        Some(self)
    }

    fn as_query_context(&mut self) -> Option<&mut dyn StmtQueryContext> {
        Some(self)
    }
}

#[async_trait]
impl StmtExecContext for WrappedStmt {
    async fn exec_context(
        &mut self,
        ctx: &Context,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        let mut timer = self.hooks.start(Some(ctx), Operation::StmtExec, &self.query);
        let result = timer.instrument(self.exec_untimed(ctx, args)).await;
        timer.observe(&result);
        result
    }
}

#[async_trait]
impl StmtQueryContext for WrappedStmt {
    async fn query_context(&mut self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>> {
        let mut timer = self.hooks.start(Some(ctx), Operation::StmtQuery, &self.query);
        let result = timer.instrument(self.query_untimed(ctx, args)).await;
        timer.observe(&result);
        result
    }
}
