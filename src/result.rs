//! Instrumented exec result and row cursor wrappers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::driver::{ExecResult, Rows, RowsNextResultSet, Value};
use crate::error::Result;
use crate::instrument::{Hooks, Operation};

/// An instrumented exec result. Both accessors are timed independently.
pub struct WrappedResult {
    inner: Box<dyn ExecResult>,
    ctx: Option<Context>,
    hooks: Arc<Hooks>,
}

impl WrappedResult {
    pub(crate) fn new(inner: Box<dyn ExecResult>, ctx: Option<Context>, hooks: Arc<Hooks>) -> Self {
        Self { inner, ctx, hooks }
    }
}

#[async_trait]
impl ExecResult for WrappedResult {
    async fn last_insert_id(&self) -> Result<i64> {
        let mut timer = self.hooks.start(self.ctx.as_ref(), Operation::LastInsertId, "");
        let result = timer.instrument(self.inner.last_insert_id()).await;
        timer.observe(&result);
        result
    }

    async fn rows_affected(&self) -> Result<u64> {
        let mut timer = self.hooks.start(self.ctx.as_ref(), Operation::RowsAffected, "");
        let result = timer.instrument(self.inner.rows_affected()).await;
        timer.observe(&result);
        result
    }
}

/// An instrumented row cursor.
///
/// Only advancing the cursor is timed; column metadata and close are plain
/// forwards.
pub struct WrappedRows {
    inner: Box<dyn Rows>,
    ctx: Option<Context>,
    hooks: Arc<Hooks>,
}

impl WrappedRows {
    pub(crate) fn new(inner: Box<dyn Rows>, ctx: Option<Context>, hooks: Arc<Hooks>) -> Self {
        Self { inner, ctx, hooks }
    }
}

#[async_trait]
impl Rows for WrappedRows {
    fn columns(&self) -> &[String] {
        self.inner.columns()
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        let mut timer = self.hooks.start(self.ctx.as_ref(), Operation::RowsNext, "");
        let result = timer.instrument(self.inner.next(dest)).await;
        timer.observe(&result);
        result
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.inner.close().await
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        if self.inner.as_next_result_set().is_some() {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl RowsNextResultSet for WrappedRows {
    fn has_next_result_set(&mut self) -> bool {
        self.inner
            .as_next_result_set()
            .is_some_and(|rows| rows.has_next_result_set())
    }

    async fn next_result_set(&mut self) -> Result<bool> {
        let mut timer = self
            .hooks
            .start(self.ctx.as_ref(), Operation::RowsNextResultSet, "");
        let result = match self.inner.as_next_result_set() {
            Some(rows) => timer.instrument(rows.next_result_set()).await,
            None => Ok(false),
        };
        timer.observe(&result);
        result
    }
}
