//! Shared stub driver and collaborators for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use instrumented_sql::prelude::*;
use instrumented_sql::{
    named_values_to_values, Instrumenter, LogEntry, Logger, Operation, Timer,
};
use tracing::Level;

/// Error returned by stub objects for scripted failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubError(pub &'static str);

impl fmt::Display for StubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stub failure in {}", self.0)
    }
}

impl std::error::Error for StubError {}

/// Capabilities, scripted failures and the call log shared by every stub
/// object created from one driver.
#[derive(Clone)]
pub struct Script {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<HashSet<&'static str>>,
    pub conn_caps: ConnCapabilities,
    pub stmt_caps: StmtCapabilities,
    pub rows_caps: RowsCapabilities,
    pub rows: usize,
    pub valid: bool,
    pub hang: bool,
}

impl Script {
    pub fn new(conn_caps: ConnCapabilities) -> Self {
        Self {
            calls: Arc::default(),
            failing: Arc::default(),
            conn_caps,
            stmt_caps: StmtCapabilities::ALL,
            rows_caps: RowsCapabilities::ALL,
            rows: 2,
            valid: true,
            hang: false,
        }
    }

    /// Every optional capability present.
    pub fn full() -> Self {
        Self::new(ConnCapabilities::ALL)
    }

    /// Only the legacy exec and query capabilities.
    pub fn legacy() -> Self {
        let mut script = Self::new(ConnCapabilities {
            exec: true,
            query: true,
            ..Default::default()
        });
        script.stmt_caps = StmtCapabilities::default();
        script.rows_caps = RowsCapabilities::default();
        script
    }

    /// Nothing beyond prepare and begin.
    pub fn bare() -> Self {
        let mut script = Self::new(ConnCapabilities::default());
        script.stmt_caps = StmtCapabilities::default();
        script.rows_caps = RowsCapabilities::default();
        script
    }

    pub fn failing(mut self, calls: &[&'static str]) -> Self {
        self.failing = Arc::new(calls.iter().copied().collect());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(name))
    }

    fn call(&self, name: &'static str, detail: String) -> Result<()> {
        tracing::info!(target: "stub", call = name, "driver call");
        self.calls.lock().unwrap().push(format!("{name}: {detail}"));
        if self.failing.contains(name) {
            Err(Error::driver(StubError(name)))
        } else {
            Ok(())
        }
    }
}

pub struct StubDriver {
    pub script: Script,
}

impl StubDriver {
    pub fn new(script: &Script) -> Self {
        Self {
            script: script.clone(),
        }
    }
}

#[async_trait]
impl Driver for StubDriver {
    async fn open(&self, name: &str) -> Result<Box<dyn Conn>> {
        self.script.call("driver.open", name.to_string())?;
        Ok(Box::new(StubConn {
            script: self.script.clone(),
        }))
    }
}

pub struct StubConn {
    script: Script,
}

impl StubConn {
    fn stmt(&self, query: &str) -> Box<dyn Stmt> {
        Box::new(StubStmt {
            script: self.script.clone(),
            query: query.to_string(),
        })
    }

    fn tx(&self) -> Box<dyn Tx> {
        Box::new(StubTx {
            script: self.script.clone(),
        })
    }
}

#[async_trait]
impl Conn for StubConn {
    async fn prepare(&mut self, query: &str) -> Result<Box<dyn Stmt>> {
        self.script.call("conn.prepare", query.to_string())?;
        Ok(self.stmt(query))
    }

    async fn begin(&mut self) -> Result<Box<dyn Tx>> {
        self.script.call("conn.begin", String::new())?;
        Ok(self.tx())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.script.call("conn.close", String::new())
    }

    fn as_prepare_context(&mut self) -> Option<&mut dyn ConnPrepareContext> {
        if self.script.conn_caps.prepare_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_begin_tx(&mut self) -> Option<&mut dyn ConnBeginTx> {
        if self.script.conn_caps.begin_tx {
            Some(self)
        } else {
            None
        }
    }

    fn as_execer(&mut self) -> Option<&mut dyn Execer> {
        if self.script.conn_caps.exec {
            Some(self)
        } else {
            None
        }
    }

    fn as_execer_context(&mut self) -> Option<&mut dyn ExecerContext> {
        if self.script.conn_caps.exec_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_queryer(&mut self) -> Option<&mut dyn Queryer> {
        if self.script.conn_caps.query {
            Some(self)
        } else {
            None
        }
    }

    fn as_queryer_context(&mut self) -> Option<&mut dyn QueryerContext> {
        if self.script.conn_caps.query_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_pinger(&mut self) -> Option<&mut dyn Pinger> {
        if self.script.conn_caps.ping {
            Some(self)
        } else {
            None
        }
    }

    fn as_session_resetter(&mut self) -> Option<&mut dyn SessionResetter> {
        if self.script.conn_caps.reset_session {
            Some(self)
        } else {
            None
        }
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        if self.script.conn_caps.validator {
            Some(self)
        } else {
            None
        }
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        if self.script.conn_caps.named_value_checker {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl ConnPrepareContext for StubConn {
    async fn prepare_context(&mut self, _ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
        self.script.call("conn.prepare_context", query.to_string())?;
        Ok(self.stmt(query))
    }
}

#[async_trait]
impl ConnBeginTx for StubConn {
    async fn begin_tx(&mut self, _ctx: &Context, options: &TxOptions) -> Result<Box<dyn Tx>> {
        self.script.call("conn.begin_tx", format!("{options:?}"))?;
        Ok(self.tx())
    }
}

#[async_trait]
impl Execer for StubConn {
    async fn exec(&mut self, query: &str, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        self.script.call("conn.exec", format!("{query} {args:?}"))?;
        Ok(Box::new(StubResult {
            script: self.script.clone(),
        }))
    }
}

#[async_trait]
impl ExecerContext for StubConn {
    async fn exec_context(
        &mut self,
        _ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        if self.script.hang {
            std::future::pending::<()>().await;
        }
        self.script.call("conn.exec_context", format!("{query} {args:?}"))?;
        Ok(Box::new(StubResult {
            script: self.script.clone(),
        }))
    }
}

#[async_trait]
impl Queryer for StubConn {
    async fn query(&mut self, query: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.script.call("conn.query", format!("{query} {args:?}"))?;
        Ok(Box::new(StubRows::new(&self.script)))
    }
}

#[async_trait]
impl QueryerContext for StubConn {
    async fn query_context(
        &mut self,
        _ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        self.script.call("conn.query_context", format!("{query} {args:?}"))?;
        Ok(Box::new(StubRows::new(&self.script)))
    }
}

#[async_trait]
impl Pinger for StubConn {
    async fn ping(&mut self, _ctx: &Context) -> Result<()> {
        self.script.call("conn.ping", String::new())
    }
}

#[async_trait]
impl SessionResetter for StubConn {
    async fn reset_session(&mut self, _ctx: &Context) -> Result<()> {
        self.script.call("conn.reset_session", String::new())
    }
}

impl Validator for StubConn {
    fn is_valid(&self) -> bool {
        self.script.valid
    }
}

impl NamedValueChecker for StubConn {
    fn check_named_value(&self, value: &mut NamedValue) -> Result<()> {
        self.script
            .call("conn.check_named_value", format!("{value:?}"))?;
        value.name = None;
        Ok(())
    }
}

pub struct StubStmt {
    script: Script,
    query: String,
}

#[async_trait]
impl Stmt for StubStmt {
    async fn close(self: Box<Self>) -> Result<()> {
        self.script.call("stmt.close", self.query.clone())
    }

    fn num_input(&self) -> Option<usize> {
        Some(self.query.matches('?').count())
    }

    async fn exec(&mut self, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        self.script.call("stmt.exec", format!("{} {args:?}", self.query))?;
        Ok(Box::new(StubResult {
            script: self.script.clone(),
        }))
    }

    async fn query(&mut self, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.script.call("stmt.query", format!("{} {args:?}", self.query))?;
        Ok(Box::new(StubRows::new(&self.script)))
    }

    fn as_exec_context(&mut self) -> Option<&mut dyn StmtExecContext> {
        if self.script.stmt_caps.exec_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_query_context(&mut self) -> Option<&mut dyn StmtQueryContext> {
        if self.script.stmt_caps.query_context {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl StmtExecContext for StubStmt {
    async fn exec_context(
        &mut self,
        _ctx: &Context,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        self.script
            .call("stmt.exec_context", format!("{} {args:?}", self.query))?;
        Ok(Box::new(StubResult {
            script: self.script.clone(),
        }))
    }
}

#[async_trait]
impl StmtQueryContext for StubStmt {
    async fn query_context(&mut self, _ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>> {
        self.script
            .call("stmt.query_context", format!("{} {args:?}", self.query))?;
        Ok(Box::new(StubRows::new(&self.script)))
    }
}

pub struct StubTx {
    script: Script,
}

#[async_trait]
impl Tx for StubTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.script.call("tx.commit", String::new())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.script.call("tx.rollback", String::new())
    }
}

pub struct StubResult {
    script: Script,
}

#[async_trait]
impl ExecResult for StubResult {
    async fn last_insert_id(&self) -> Result<i64> {
        self.script.call("result.last_insert_id", String::new())?;
        Ok(41)
    }

    async fn rows_affected(&self) -> Result<u64> {
        self.script.call("result.rows_affected", String::new())?;
        Ok(3)
    }
}

pub struct StubRows {
    script: Script,
    columns: Vec<String>,
    remaining: usize,
    result_sets: usize,
}

impl StubRows {
    fn new(script: &Script) -> Self {
        Self {
            script: script.clone(),
            columns: vec!["id".to_string()],
            remaining: script.rows,
            result_sets: 1,
        }
    }
}

#[async_trait]
impl Rows for StubRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        self.script
            .call("rows.next", format!("remaining={}", self.remaining))?;
        if self.remaining == 0 {
            return Ok(false);
        }
        if let Some(slot) = dest.first_mut() {
            *slot = Value::from(self.remaining as i64);
        }
        self.remaining -= 1;
        Ok(true)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.script.call("rows.close", String::new())
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        if self.script.rows_caps.next_result_set {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl RowsNextResultSet for StubRows {
    fn has_next_result_set(&mut self) -> bool {
        self.result_sets > 0
    }

    async fn next_result_set(&mut self) -> Result<bool> {
        self.script.call("rows.next_result_set", String::new())?;
        if self.result_sets == 0 {
            return Ok(false);
        }
        self.result_sets -= 1;
        self.remaining = self.script.rows;
        Ok(true)
    }
}

/// One started timer as seen by [`CountingInstrumenter`].
#[derive(Debug, Clone, PartialEq)]
pub struct Started {
    pub operation: Operation,
    pub has_context: bool,
    pub connection: String,
    pub query: String,
}

/// Records every timer it starts and counts how often timers end.
#[derive(Default)]
pub struct CountingInstrumenter {
    started: Mutex<Vec<Started>>,
    ended: AtomicUsize,
    errors: AtomicUsize,
}

impl CountingInstrumenter {
    pub fn started(&self) -> Vec<Started> {
        self.started.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.started().into_iter().map(|s| s.operation).collect()
    }

    pub fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.started.lock().unwrap().clear();
        self.ended.store(0, Ordering::SeqCst);
        self.errors.store(0, Ordering::SeqCst);
    }
}

struct CountingTimer(Arc<CountingInstrumenter>);

impl Timer for CountingTimer {
    fn record_error(&mut self, _error: &Error) {
        self.0.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn end(self: Box<Self>) {
        self.0.ended.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shareable handle so tests can keep inspecting the instrumenter after
/// handing it to the wrapper.
#[derive(Clone, Default)]
pub struct Counting(pub Arc<CountingInstrumenter>);

impl Instrumenter for Counting {
    fn start_timer(
        &self,
        ctx: Option<&Context>,
        connection: &str,
        operation: Operation,
        query: &str,
    ) -> Box<dyn Timer> {
        self.0.started.lock().unwrap().push(Started {
            operation,
            has_context: ctx.is_some(),
            connection: connection.to_string(),
            query: query.to_string(),
        });
        Box::new(CountingTimer(Arc::clone(&self.0)))
    }
}

/// Keeps every log entry it receives.
#[derive(Clone, Default)]
pub struct RecordingLogger(pub Arc<Mutex<Vec<(Level, Operation, String)>>>);

impl RecordingLogger {
    pub fn entries(&self) -> Vec<(Level, Operation, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, entry: &LogEntry<'_>) {
        self.0
            .lock()
            .unwrap()
            .push((entry.level, entry.operation, entry.message.to_string()));
    }
}

/// A wrapped stub driver plus handles on its collaborators.
pub struct Harness {
    pub driver: WrappedDriver<StubDriver>,
    pub timers: Arc<CountingInstrumenter>,
    pub logger: RecordingLogger,
}

pub fn harness(script: &Script) -> Harness {
    let counting = Counting::default();
    let logger = RecordingLogger::default();
    let options = WrapOptions::default()
        .with_instrumenter(counting.clone())
        .with_logger(logger.clone())
        .with_connection_label("stub");

    Harness {
        driver: StubDriver::new(script).instrumented_with(options),
        timers: counting.0,
        logger,
    }
}

async fn prepare(conn: &mut dyn Conn, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
    match conn.as_prepare_context() {
        Some(preparer) => preparer.prepare_context(ctx, query).await,
        None => conn.prepare(query).await,
    }
}

async fn begin(conn: &mut dyn Conn, ctx: &Context) -> Result<Box<dyn Tx>> {
    match conn.as_begin_tx() {
        Some(beginner) => beginner.begin_tx(ctx, &TxOptions::default()).await,
        None => conn.begin().await,
    }
}

/// Exec the way a SQL front end would: direct path first, prepared statement
/// when the connection signals skip.
pub async fn exec(
    conn: &mut dyn Conn,
    ctx: &Context,
    query: &str,
    args: &[NamedValue],
) -> Result<Box<dyn ExecResult>> {
    let direct = if let Some(execer) = conn.as_execer_context() {
        execer.exec_context(ctx, query, args).await
    } else if let Some(execer) = conn.as_execer() {
        let values = named_values_to_values(args)?;
        execer.exec(query, &values).await
    } else {
        Err(Error::Skip)
    };
    match direct {
        Err(Error::Skip) => {}
        other => return other,
    }

    let mut stmt = prepare(conn, ctx, query).await?;
    let result = match stmt.as_exec_context() {
        Some(prepared) => prepared.exec_context(ctx, args).await,
        None => stmt.exec(&named_values_to_values(args)?).await,
    };
    stmt.close().await?;
    result
}

/// Query counterpart of [`exec`].
pub async fn query(
    conn: &mut dyn Conn,
    ctx: &Context,
    query: &str,
    args: &[NamedValue],
) -> Result<Box<dyn Rows>> {
    let direct = if let Some(queryer) = conn.as_queryer_context() {
        queryer.query_context(ctx, query, args).await
    } else if let Some(queryer) = conn.as_queryer() {
        let values = named_values_to_values(args)?;
        queryer.query(query, &values).await
    } else {
        Err(Error::Skip)
    };
    match direct {
        Err(Error::Skip) => {}
        other => return other,
    }

    let mut stmt = prepare(conn, ctx, query).await?;
    let rows = match stmt.as_query_context() {
        Some(prepared) => prepared.query_context(ctx, args).await,
        None => stmt.query(&named_values_to_values(args)?).await,
    };
    stmt.close().await?;
    rows
}

/// A representative session: exec, read the result, query and drain rows,
/// one committed and one rolled back transaction, ping, close.
pub async fn run_workload(driver: &dyn Driver) -> Result<()> {
    let ctx = Context::background();
    let mut conn = driver.open("stub://primary").await?;

    let result = exec(
        &mut *conn,
        &ctx,
        "INSERT INTO users (name) VALUES (?)",
        &positional_args(["alice"]),
    )
    .await?;
    result.last_insert_id().await?;
    result.rows_affected().await?;

    let mut rows = query(&mut *conn, &ctx, "SELECT id FROM users", &[]).await?;
    let mut dest = vec![Value::BigInt(None); rows.columns().len()];
    while rows.next(&mut dest).await? {}
    rows.close().await?;

    let tx = begin(&mut *conn, &ctx).await?;
    tx.commit().await?;

    let tx = conn.begin().await?;
    tx.rollback().await?;

    if let Some(pinger) = conn.as_pinger() {
        pinger.ping(&ctx).await?;
    }

    conn.close().await
}
