//! Connection pool.
//!
//! A bounded set of reusable [`Connection`]s. Leases are exclusive: a
//! [`PooledConnection`] derefs to its connection and returns it to the idle
//! set when dropped. Broken and over-age connections are discarded on
//! release and on checkout, and a background reaper closes connections that
//! sit idle past the configured threshold.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::connection::Connection;
use super::error::{DriverError, DriverResult};

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of open connections
    pub max_size: usize,
    /// Idle connections older than this are reclaimed
    pub max_idle_time: Duration,
    /// Connections older than this are not reused
    pub max_lifetime: Duration,
    /// Deadline for opening a new connection
    pub connect_timeout: Duration,
    /// Reaper cycle period
    pub reap_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            max_idle_time: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(3600),
            connect_timeout: Duration::from_secs(30),
            reap_interval: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    /// Start building a pool configuration.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// Pool configuration builder.
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set the maximum number of open connections.
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// Set the idle reclaim threshold.
    pub fn max_idle_time(mut self, duration: Duration) -> Self {
        self.config.max_idle_time = duration;
        self
    }

    /// Set the maximum connection lifetime.
    pub fn max_lifetime(mut self, duration: Duration) -> Self {
        self.config.max_lifetime = duration;
        self
    }

    /// Set the connect deadline.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = duration;
        self
    }

    /// Set the reaper cycle period.
    pub fn reap_interval(mut self, duration: Duration) -> Self {
        self.config.reap_interval = duration;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

/// An idle connection waiting for its next lease.
struct IdleEntry {
    conn: Connection,
    id: u64,
    created_at: Instant,
    idle_since: Instant,
}

impl IdleEntry {
    fn is_valid(&self, config: &PoolConfig) -> bool {
        self.conn.is_open()
            && self.idle_since.elapsed() <= config.max_idle_time
            && self.created_at.elapsed() <= config.max_lifetime
    }
}

/// Pool metrics snapshot.
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    /// Open connections (idle + leased)
    pub size: usize,
    /// Idle connections
    pub idle: usize,
    /// Leased connections
    pub in_use: usize,
    /// Total leases handed out
    pub total_acquisitions: u64,
    /// Total connections opened
    pub total_created: u64,
    /// Total connections closed or discarded
    pub total_closed: u64,
    /// Total acquire deadline failures
    pub total_timeouts: u64,
}

/// An exclusive lease on a pooled connection.
///
/// Derefs to [`Connection`]. Dropping the lease returns the connection to
/// the idle set (or discards it when broken) before the pool slot frees, so
/// a waiting acquirer always sees the returned connection.
pub struct PooledConnection {
    conn: Option<Connection>,
    id: u64,
    created_at: Instant,
    pool: Option<Arc<PoolInner>>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl PooledConnection {
    /// Connection id, stable across leases.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the underlying connection was opened.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let (Some(pool), Some(conn)) = (self.pool.take(), self.conn.take()) {
            pool.release(conn, self.id, self.created_at);
        }
        // The permit field drops after this body runs, so the connection is
        // back in the idle set before the slot frees.
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("age", &self.created_at.elapsed())
            .finish()
    }
}

/// Shared pool state.
struct PoolInner {
    /// Server address
    address: String,
    /// Pool settings
    config: PoolConfig,
    /// Idle connections
    idle: Mutex<VecDeque<IdleEntry>>,
    /// Lease slots
    semaphore: Arc<Semaphore>,
    /// Open connections (idle + leased)
    open_count: AtomicUsize,
    /// Leased connections
    in_use: AtomicUsize,
    /// Total connections opened
    total_created: AtomicU64,
    /// Total leases handed out
    total_acquisitions: AtomicU64,
    /// Total connections closed or discarded
    total_closed: AtomicU64,
    /// Total acquire deadline failures
    total_timeouts: AtomicU64,
    /// Next connection id
    next_id: AtomicU64,
    /// Pool open flag
    open: RwLock<bool>,
    /// Whether the reaper task has been spawned
    reaper_started: AtomicBool,
}

impl PoolInner {
    /// Pop the first still-valid idle connection, discarding stale ones.
    fn checkout_idle(&self) -> Option<(Connection, u64, Instant)> {
        let mut idle = self.idle.lock();
        while let Some(entry) = idle.pop_front() {
            if entry.is_valid(&self.config) {
                return Some((entry.conn, entry.id, entry.created_at));
            }
            self.open_count.fetch_sub(1, Ordering::Relaxed);
            self.total_closed.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    /// Open a fresh connection. The caller holds a lease slot.
    async fn open_connection(&self) -> DriverResult<(Connection, u64, Instant)> {
        let conn = Connection::connect(&self.address, self.config.connect_timeout).await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.open_count.fetch_add(1, Ordering::Relaxed);
        self.total_created.fetch_add(1, Ordering::Relaxed);

        Ok((conn, id, Instant::now()))
    }

    /// Return a connection from a dropped lease.
    fn release(&self, conn: Connection, id: u64, created_at: Instant) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);

        let reusable = *self.open.read()
            && conn.is_open()
            && created_at.elapsed() <= self.config.max_lifetime;

        if reusable {
            self.idle.lock().push_back(IdleEntry {
                conn,
                id,
                created_at,
                idle_since: Instant::now(),
            });
        } else {
            self.open_count.fetch_sub(1, Ordering::Relaxed);
            self.total_closed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(id, "discarding connection");
        }
    }

    /// Close idle connections past the idle threshold.
    fn reap_idle(&self) {
        let mut reaped = 0usize;
        {
            let mut idle = self.idle.lock();
            idle.retain(|entry| {
                if entry.is_valid(&self.config) {
                    true
                } else {
                    reaped += 1;
                    false
                }
            });
        }
        if reaped > 0 {
            self.open_count.fetch_sub(reaped, Ordering::Relaxed);
            self.total_closed.fetch_add(reaped as u64, Ordering::Relaxed);
            tracing::debug!(reaped, "reaped idle connections");
        }
    }
}

/// Bounded pool of server connections. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a new pool for the given server address.
    pub fn new(address: impl Into<String>, config: PoolConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size));
        Self {
            inner: Arc::new(PoolInner {
                address: address.into(),
                config,
                idle: Mutex::new(VecDeque::new()),
                semaphore,
                open_count: AtomicUsize::new(0),
                in_use: AtomicUsize::new(0),
                total_created: AtomicU64::new(0),
                total_acquisitions: AtomicU64::new(0),
                total_closed: AtomicU64::new(0),
                total_timeouts: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                open: RwLock::new(true),
                reaper_started: AtomicBool::new(false),
            }),
        }
    }

    /// Acquire an exclusive lease, waiting up to `timeout` for a slot.
    ///
    /// Fails with [`DriverError::PoolTimeout`] when the pool stays saturated
    /// past the deadline. A cancelled acquire never leaks a slot: the permit
    /// is owned by the future and released when it drops.
    pub async fn acquire(&self, timeout: Duration) -> DriverResult<PooledConnection> {
        let inner = &self.inner;
        if !*inner.open.read() {
            return Err(DriverError::pool("pool is closed"));
        }
        self.ensure_reaper();

        let permit = match tokio::time::timeout(
            timeout,
            inner.semaphore.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(DriverError::pool("pool semaphore closed")),
            Err(_) => {
                inner.total_timeouts.fetch_add(1, Ordering::Relaxed);
                return Err(DriverError::pool_timeout(format!(
                    "no connection available within {:?}",
                    timeout
                )));
            }
        };

        let (conn, id, created_at) = match inner.checkout_idle() {
            Some(entry) => entry,
            None => inner.open_connection().await?,
        };

        inner.total_acquisitions.fetch_add(1, Ordering::Relaxed);
        inner.in_use.fetch_add(1, Ordering::Relaxed);

        Ok(PooledConnection {
            conn: Some(conn),
            id,
            created_at,
            pool: Some(inner.clone()),
            _permit: Some(permit),
        })
    }

    /// Spawn the idle reaper once. The task holds only a weak reference so
    /// an abandoned pool shuts its reaper down.
    fn ensure_reaper(&self) {
        if self.inner.reaper_started.swap(true, Ordering::Relaxed) {
            return;
        }

        let weak: Weak<PoolInner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.reap_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else { break };
                if !*pool.open.read() {
                    break;
                }
                pool.reap_idle();
            }
        });
    }

    /// Close the pool: fail subsequent acquires and drain the idle set.
    /// Leased connections are discarded as their leases drop.
    pub async fn close(&self) {
        *self.inner.open.write() = false;

        let drained: Vec<IdleEntry> = self.inner.idle.lock().drain(..).collect();
        for mut entry in drained {
            entry.conn.close().await;
            self.inner.open_count.fetch_sub(1, Ordering::Relaxed);
            self.inner.total_closed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Whether the pool accepts acquires.
    pub fn is_open(&self) -> bool {
        *self.inner.open.read()
    }

    /// Open connections (idle + leased).
    pub fn size(&self) -> usize {
        self.inner.open_count.load(Ordering::Relaxed)
    }

    /// Idle connection count.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Leased connection count.
    pub fn in_use_count(&self) -> usize {
        self.inner.in_use.load(Ordering::Relaxed)
    }

    /// Metrics snapshot.
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            size: self.size(),
            idle: self.idle_count(),
            in_use: self.in_use_count(),
            total_acquisitions: self.inner.total_acquisitions.load(Ordering::Relaxed),
            total_created: self.inner.total_created.load(Ordering::Relaxed),
            total_closed: self.inner.total_closed.load(Ordering::Relaxed),
            total_timeouts: self.inner.total_timeouts.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("address", &self.inner.address)
            .field("size", &self.size())
            .field("idle", &self.idle_count())
            .field("in_use", &self.in_use_count())
            .finish()
    }
}
