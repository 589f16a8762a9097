//! Basic example showing how to instrument a driver.
//!
//! Run with: cargo run --example basic
//!
//! Uses a tiny in-memory driver so it runs without a database. Set
//! `RUST_LOG=trace` to also see the fallback decisions of the wrapper.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use instrumented_sql::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,instrumented_sql=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Option 1: No-op instrumentation
    // let driver = MemoryDriver::default().instrumented();

    // Option 2: Development config (logs every statement)
    // let driver = MemoryDriver::default().instrumented_with(WrapOptions::tracing(TracingConfig::development()));

    // Option 3: Custom configuration
    let driver = MemoryDriver::default().instrumented_with(
        WrapOptions::tracing(
            TracingConfig::default()
                .with_statement_logging(true)
                .with_slow_query_threshold(Duration::from_millis(100))
                .with_database_name("demo"),
        )
        .with_connection_label("memory"),
    );

    let request = tracing::info_span!("handle_request");
    let ctx = Context::background().with_span(request);
    let mut conn = driver.open("memory://demo").await?;

    let tx = match conn.as_begin_tx() {
        Some(beginner) => beginner.begin_tx(&ctx, &TxOptions::default()).await?,
        None => conn.begin().await?,
    };
    for name in ["alice", "bob"] {
        if let Some(execer) = conn.as_execer_context() {
            let result = execer
                .exec_context(&ctx, "INSERT INTO users (name) VALUES (?)", &positional_args([name]))
                .await?;
            tracing::info!(id = result.last_insert_id().await?, "inserted {name}");
        }
    }
    tx.commit().await?;

    if let Some(queryer) = conn.as_queryer_context() {
        let mut rows = queryer.query_context(&ctx, "SELECT name FROM users", &[]).await?;
        let mut dest = vec![Value::String(None); rows.columns().len()];
        while rows.next(&mut dest).await? {
            tracing::info!(row = ?dest, "fetched");
        }
        rows.close().await?;
    }

    conn.close().await?;
    Ok(())
}

/// Stores user names in memory. Understands one INSERT and one SELECT.
#[derive(Default)]
struct MemoryDriver {
    users: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn open(&self, _name: &str) -> Result<Box<dyn Conn>> {
        Ok(Box::new(MemoryConn {
            users: Arc::clone(&self.users),
        }))
    }
}

struct MemoryConn {
    users: Arc<Mutex<Vec<String>>>,
}

impl MemoryConn {
    fn insert(&self, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        let name = match args.first() {
            Some(Value::String(Some(name))) => name.to_string(),
            other => return Err(Error::driver(format!("expected a name, got {other:?}"))),
        };
        let mut users = self.users.lock().map_err(|_| Error::BadConnection)?;
        users.push(name);
        Ok(Box::new(Inserted {
            id: users.len() as i64,
        }))
    }

    fn select(&self) -> Result<Box<dyn Rows>> {
        let users = self.users.lock().map_err(|_| Error::BadConnection)?;
        Ok(Box::new(Names {
            columns: vec!["name".to_string()],
            names: users.clone().into_iter(),
        }))
    }
}

#[async_trait]
impl Conn for MemoryConn {
    async fn prepare(&mut self, query: &str) -> Result<Box<dyn Stmt>> {
        Err(Error::driver(format!("prepared statements are not supported: {query}")))
    }

    async fn begin(&mut self) -> Result<Box<dyn Tx>> {
        Ok(Box::new(NoopTx))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn as_execer(&mut self) -> Option<&mut dyn Execer> {
        Some(self)
    }

    fn as_queryer(&mut self) -> Option<&mut dyn Queryer> {
        Some(self)
    }
}

// Only the legacy methods: the wrapper supplies the context-aware ones.
#[async_trait]
impl Execer for MemoryConn {
    async fn exec(&mut self, query: &str, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        if query.starts_with("INSERT") {
            self.insert(args)
        } else {
            Err(Error::Skip)
        }
    }
}

#[async_trait]
impl Queryer for MemoryConn {
    async fn query(&mut self, query: &str, _args: &[Value]) -> Result<Box<dyn Rows>> {
        if query.starts_with("SELECT") {
            self.select()
        } else {
            Err(Error::Skip)
        }
    }
}

struct NoopTx;

#[async_trait]
impl Tx for NoopTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

struct Inserted {
    id: i64,
}

#[async_trait]
impl ExecResult for Inserted {
    async fn last_insert_id(&self) -> Result<i64> {
        Ok(self.id)
    }

    async fn rows_affected(&self) -> Result<u64> {
        Ok(1)
    }
}

struct Names {
    columns: Vec<String>,
    names: std::vec::IntoIter<String>,
}

#[async_trait]
impl Rows for Names {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        let Some(name) = self.names.next() else {
            return Ok(false);
        };
        if let Some(slot) = dest.first_mut() {
            *slot = Value::from(name);
        }
        Ok(true)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
