//! Instrumented transaction wrapper.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::driver::Tx;
use crate::error::Result;
use crate::instrument::{Hooks, Operation};

/// An instrumented transaction. Commit and rollback are timed against the
/// context the transaction was begun with, if any.
pub struct WrappedTx {
    inner: Box<dyn Tx>,
    ctx: Option<Context>,
    hooks: Arc<Hooks>,
}

impl WrappedTx {
    pub(crate) fn new(inner: Box<dyn Tx>, ctx: Option<Context>, hooks: Arc<Hooks>) -> Self {
        Self { inner, ctx, hooks }
    }
}

#[async_trait]
impl Tx for WrappedTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        let mut timer = self.hooks.start(self.ctx.as_ref(), Operation::TxCommit, "");
        let result = timer.instrument(self.inner.commit()).await;
        timer.observe(&result);
        result
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut timer = self.hooks.start(self.ctx.as_ref(), Operation::TxRollback, "");
        let result = timer.instrument(self.inner.rollback()).await;
        timer.observe(&result);
        result
    }
}
