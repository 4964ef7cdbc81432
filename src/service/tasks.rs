//! Background workers and non-blocking completion polling.
//!
//! [`QueryRuntime`] owns the worker threads. Every network operation runs as
//! a spawned task that publishes its result once through a
//! [`tokio::sync::oneshot`] channel; callers check for completion with
//! `poll` on their own schedule and are never blocked.
//!
//! ```no_run
//! use utquery::config::QueryConfig;
//! use utquery::service::tasks::{QueryRuntime, ServerEntry};
//!
//! let runtime = QueryRuntime::init(QueryConfig::default())?;
//! let mut entry = ServerEntry::new("192.0.2.10", 7777);
//! entry.refresh(&runtime);
//! while !entry.poll() {
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! println!("{} is {}", entry.record.address, entry.record.status);
//! runtime.shutdown();
//! # Ok::<(), utquery::error::ProtocolError>(())
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::config::QueryConfig;
use crate::error::{constants, ErrorKind, ProtocolError, Result};
use crate::protocol::record::{MasterQueryResult, ServerRecord, ServerStatus};
use crate::service::master_client::query_master_with;
use crate::service::query_client::query_server_with;

/// Progress of the background work attached to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Idle,
    InFlight,
    Completed,
}

/// Worker runtime shared by all queries.
///
/// Must be created and shut down outside of any async context.
///
/// The application creates one runtime per process and hands it to every
/// caller. The one-master-session limit is enforced per runtime, so a
/// second runtime would get its own master slot.
pub struct QueryRuntime {
    runtime: Runtime,
    config: QueryConfig,
    master_active: Arc<AtomicBool>,
    spawned: Arc<AtomicUsize>,
}

impl QueryRuntime {
    /// Start the worker threads.
    ///
    /// Call once at startup and share the result; see [`QueryRuntime`] for
    /// the master session limit.
    ///
    /// # Errors
    /// `ConfigError` for an invalid configuration, `SocketError` if the
    /// runtime cannot be built.
    pub fn init(config: QueryConfig) -> Result<Self> {
        config.validate_strict()?;

        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name("utquery-worker");
        if config.runtime.worker_threads > 0 {
            builder.worker_threads(config.runtime.worker_threads);
        }
        let runtime = builder
            .build()
            .map_err(|e| ProtocolError::SocketError(format!("failed to start worker runtime: {e}")))?;

        info!(worker_threads = config.runtime.worker_threads, "query runtime started");
        Ok(Self {
            runtime,
            config,
            master_active: Arc::new(AtomicBool::new(false)),
            spawned: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Number of worker tasks spawned since the runtime started.
    pub fn spawned_tasks(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Whether a master server session is running.
    pub fn master_active(&self) -> bool {
        self.master_active.load(Ordering::Acquire)
    }

    /// Stop the workers, giving in-flight tasks the configured grace period.
    pub fn shutdown(self) {
        let grace = self.config.runtime.shutdown_timeout;
        debug!(?grace, "shutting down query runtime");
        self.runtime.shutdown_timeout(grace);
    }

    fn spawn<F>(&self, work: F) -> oneshot::Receiver<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.spawned.fetch_add(1, Ordering::Relaxed);
        self.runtime.spawn(async move {
            // The caller may have dropped its handle
            let _ = tx.send(work.await);
        });
        rx
    }

    /// Start a master server query in the background.
    ///
    /// # Errors
    /// `MissingCdKey` for an empty key and `MasterBusy` while another master
    /// query is running. Neither touches the network.
    pub fn start_master_query(
        &self,
        host: &str,
        port: u16,
        cdkey: &str,
        gametype_filter: &str,
    ) -> Result<MasterTask> {
        if cdkey.is_empty() {
            return Err(ProtocolError::MissingCdKey);
        }
        if self
            .master_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ProtocolError::MasterBusy);
        }

        let guard = MasterGuard(Arc::clone(&self.master_active));
        let config = self.config.master.clone();
        let host = host.to_string();
        let cdkey = cdkey.to_string();
        let gametype_filter = gametype_filter.to_string();
        let pending = self.spawn(async move {
            let _guard = guard;
            query_master_with(&config, &host, port, &cdkey, &gametype_filter).await
        });

        Ok(MasterTask {
            pending: Some(pending),
        })
    }

    /// Dispatch a refresh for every idle entry, returning how many started.
    pub fn refresh_all(&self, entries: &mut [ServerEntry]) -> usize {
        entries
            .iter_mut()
            .map(|entry| entry.refresh(self))
            .filter(|&started| started)
            .count()
    }
}

/// Clears the master session flag when the worker finishes or dies.
struct MasterGuard(Arc<AtomicBool>);

impl Drop for MasterGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A server the caller tracks, plus its outstanding query if any.
#[derive(Debug, Default)]
pub struct ServerEntry {
    pub record: ServerRecord,
    state: TaskState,
    pending: Option<oneshot::Receiver<ServerRecord>>,
}

impl ServerEntry {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self::from_record(ServerRecord::new(address, port))
    }

    pub fn from_record(record: ServerRecord) -> Self {
        Self {
            record,
            state: TaskState::Idle,
            pending: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Start a status query unless one is already running.
    ///
    /// Returns `false`, leaving the running query in place, if one was.
    pub fn refresh(&mut self, runtime: &QueryRuntime) -> bool {
        if self.pending.is_some() {
            return false;
        }

        let config = runtime.config().udp.clone();
        let address = self.record.address.clone();
        let port = self.record.port;
        self.pending = Some(runtime.spawn(async move { query_server_with(&config, &address, port).await }));
        self.record.status = ServerStatus::Querying;
        self.state = TaskState::InFlight;
        true
    }

    /// Merge a finished query into the record.
    ///
    /// Returns `true` once, when the result has been taken. A worker that
    /// died without answering marks the record `Error`.
    pub fn poll(&mut self) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };

        match pending.try_recv() {
            Ok(fresh) => self.record.merge_from(fresh),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Closed) => {
                warn!(address = %self.record.address, port = self.record.port, "{}", constants::ERR_WORKER_TERMINATED);
                self.record.status = ServerStatus::Error;
                self.record.online = false;
            }
        }

        self.pending = None;
        self.state = TaskState::Completed;
        true
    }
}

/// Poll every entry, returning how many completed on this pass.
pub fn poll_all(entries: &mut [ServerEntry]) -> usize {
    entries.iter_mut().map(ServerEntry::poll).filter(|&done| done).count()
}

/// Handle on a running master server query.
#[derive(Debug)]
pub struct MasterTask {
    pending: Option<oneshot::Receiver<MasterQueryResult>>,
}

impl MasterTask {
    /// Take the result if the query has finished.
    ///
    /// Yields `Some` exactly once.
    pub fn poll(&mut self) -> Option<MasterQueryResult> {
        let pending = self.pending.as_mut()?;
        let result = match pending.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => {
                warn!("{}", constants::ERR_WORKER_TERMINATED);
                MasterQueryResult::failure(ErrorKind::SocketError, constants::ERR_WORKER_TERMINATED)
            }
        };
        self.pending = None;
        Some(result)
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_none()
    }
}
