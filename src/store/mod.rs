//! Serialized Store Access
//! Mission: Give every handler non-blocking access to one SQLite connection
//! while executing store operations strictly one at a time.
//!
//! A single worker thread owns the connection. Callers hand it closures via
//! [`Store::run`]; each closure is queued, executed in isolation, and its
//! `Result` comes back over a per-call oneshot channel.

mod error;
mod schema;

pub use error::StoreError;
pub(crate) use schema::init as init_schema;

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// What to do with a new operation when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backpressure {
    /// Suspend the caller until a queue slot frees up.
    #[default]
    Wait,
    /// Fail immediately with [`StoreError::Busy`].
    Reject,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of operations waiting for the worker.
    pub queue_capacity: usize,
    pub backpressure: Backpressure,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            backpressure: Backpressure::Wait,
        }
    }
}

#[derive(Debug, Default)]
struct StoreCounters {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time view of the store counters.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StoreStats {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
}

/// Cloneable handle to the serialized store.
///
/// Dropping the last handle closes the queue; the worker drains what is
/// left and then closes the connection.
#[derive(Clone)]
pub struct Store {
    tx: mpsc::Sender<Job>,
    backpressure: Backpressure,
    counters: Arc<StoreCounters>,
}

impl Store {
    /// Open (or create) the database file and start the worker.
    pub fn open(db_path: &str, config: StoreConfig) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // the worker is the only user

        let conn = Connection::open_with_flags(db_path, flags)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        info!(path = db_path, "📊 Store opened");
        Self::with_connection(conn, config)
    }

    /// Private in-memory database, mainly for tests.
    pub fn in_memory(config: StoreConfig) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    fn with_connection(conn: Connection, config: StoreConfig) -> Result<Self, StoreError> {
        schema::init(&conn)?;

        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        spawn_worker(conn, rx)?;

        Ok(Self {
            tx,
            backpressure: config.backpressure,
            counters: Arc::new(StoreCounters::default()),
        })
    }

    /// Execute `f` on the store worker and wait for its result.
    ///
    /// `op` names the operation in logs. A panic inside `f` is reported as
    /// [`StoreError::Internal`] and the worker keeps serving.
    pub async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel::<Result<T, StoreError>>();
        let counters = self.counters.clone();

        let job: Job = Box::new(move |conn| {
            debug!(op, "store op executing");
            let outcome = catch_unwind(AssertUnwindSafe(|| f(conn))).unwrap_or_else(|_| {
                Err(StoreError::Internal(format!("store operation {op} panicked")))
            });

            match &outcome {
                Ok(_) => {
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(op, "store op succeeded");
                }
                Err(e) if e.is_infrastructure() => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(op, error = %e, "store op failed");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    debug!(op, error = %e, "store op failed");
                }
            }

            if reply_tx.send(outcome).is_err() {
                debug!(op, "caller stopped waiting before the result was delivered");
            }
        });

        self.enqueue(op, job).await?;
        reply_rx.await.map_err(|_| StoreError::Unavailable)?
    }

    async fn enqueue(&self, op: &'static str, job: Job) -> Result<(), StoreError> {
        match self.backpressure {
            Backpressure::Wait => self
                .tx
                .send(job)
                .await
                .map_err(|_| StoreError::Unavailable)?,
            Backpressure::Reject => self.tx.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(op, "store queue full, rejecting operation");
                    StoreError::Busy
                }
                mpsc::error::TrySendError::Closed(_) => StoreError::Unavailable,
            })?,
        }

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(op, "store op dispatched");
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

fn spawn_worker(mut conn: Connection, mut rx: mpsc::Receiver<Job>) -> Result<(), StoreError> {
    thread::Builder::new()
        .name("store-worker".to_string())
        .spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                job(&mut conn);
            }
            debug!("store worker stopped");
        })
        .map_err(|e| StoreError::Internal(format!("failed to spawn store worker: {e}")))?;
    Ok(())
}
