//! Client handle and configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::wire::Command;

use super::collection::Collection;
use super::error::{DriverError, DriverResult};
use super::pool::{ConnectionPool, PoolConfig, PoolMetrics};

/// Default server port for URIs that omit one.
pub const DEFAULT_PORT: u16 = 6543;

/// A server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// Host name or IP
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl ServerAddress {
    /// Create a new server address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse from a `docstore://host:port` or bare `host:port` URI.
    pub fn from_uri(uri: &str) -> DriverResult<Self> {
        let uri = uri
            .trim_start_matches("docstore+tls://")
            .trim_start_matches("docstore://");

        let parts: Vec<&str> = uri.split(':').collect();
        match parts.as_slice() {
            [host] if !host.is_empty() => Ok(Self::new(*host, DEFAULT_PORT)),
            [host, port] if !host.is_empty() => {
                let port = port
                    .parse()
                    .map_err(|_| DriverError::configuration(format!("invalid port: {}", port)))?;
                Ok(Self::new(*host, port))
            }
            _ => Err(DriverError::configuration(format!(
                "invalid server address: {}",
                uri
            ))),
        }
    }

    /// Render as `host:port` for the socket layer.
    pub fn to_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address
    pub address: ServerAddress,
    /// Concurrency ceiling for the connection pool
    pub max_pool_size: usize,
    /// Idle-connection reclaim threshold
    pub max_idle_time: Duration,
    /// Per-connect deadline
    pub connect_timeout: Duration,
    /// Per-operation deadline, also bounding pool acquisition
    pub operation_timeout: Duration,
    /// Transport encryption flag, honored by the transport layer
    pub tls: bool,
}

impl ClientConfig {
    /// Create a configuration from a URI.
    ///
    /// `docstore+tls://` enables the `tls` flag.
    pub fn from_uri(uri: &str) -> DriverResult<Self> {
        let tls = uri.starts_with("docstore+tls://");
        let address = ServerAddress::from_uri(uri)?;
        Ok(Self {
            address,
            tls,
            ..Self::default()
        })
    }

    /// Start building a configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: ServerAddress::default(),
            max_pool_size: 100,
            max_idle_time: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(30),
            tls: false,
        }
    }
}

/// Client configuration builder.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the server address.
    pub fn address(mut self, address: ServerAddress) -> Self {
        self.config.address = address;
        self
    }

    /// Set host and port.
    pub fn host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.address = ServerAddress::new(host, port);
        self
    }

    /// Set the pool concurrency ceiling.
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.config.max_pool_size = size;
        self
    }

    /// Set the idle-connection reclaim threshold.
    pub fn max_idle_time(mut self, duration: Duration) -> Self {
        self.config.max_idle_time = duration;
        self
    }

    /// Set the per-connect deadline.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = duration;
        self
    }

    /// Set the per-operation deadline.
    pub fn operation_timeout(mut self, duration: Duration) -> Self {
        self.config.operation_timeout = duration;
        self
    }

    /// Enable or disable transport encryption.
    pub fn tls(mut self, tls: bool) -> Self {
        self.config.tls = tls;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Handle to a document database server.
///
/// Owns one connection pool. Handles are independent: multiple clients may
/// coexist in one process with no shared state between them.
pub struct Client {
    config: Arc<ClientConfig>,
    pool: ConnectionPool,
    open: Arc<RwLock<bool>>,
}

impl Client {
    /// Create a client from a URI.
    pub fn new(uri: &str) -> DriverResult<Self> {
        Self::with_config(ClientConfig::from_uri(uri)?)
    }

    /// Create a client from a configuration.
    pub fn with_config(config: ClientConfig) -> DriverResult<Self> {
        if config.max_pool_size == 0 {
            return Err(DriverError::configuration("max_pool_size must be positive"));
        }

        let pool_config = PoolConfig {
            max_size: config.max_pool_size,
            max_idle_time: config.max_idle_time,
            max_lifetime: Duration::from_secs(3600),
            connect_timeout: config.connect_timeout,
            reap_interval: Duration::from_secs(10),
        };
        let pool = ConnectionPool::new(config.address.to_socket_addr(), pool_config);

        Ok(Self {
            config: Arc::new(config),
            pool,
            open: Arc::new(RwLock::new(true)),
        })
    }

    /// Get a handle to a database.
    pub fn database(&self, name: impl Into<String>) -> Database {
        Database {
            name: name.into(),
            config: self.config.clone(),
            pool: self.pool.clone(),
        }
    }

    /// Check server liveness with a `ping` command.
    pub async fn ping(&self) -> DriverResult<()> {
        self.ensure_open()?;

        let mut conn = self.pool.acquire(self.config.operation_timeout).await?;
        let reply = conn
            .roundtrip(
                Command::Ping.into_document("admin"),
                self.config.operation_timeout,
            )
            .await?;

        if reply.is_ok() {
            Ok(())
        } else {
            Err(DriverError::server(
                reply.error_code(),
                reply.error_message(),
            ))
        }
    }

    /// Alias for [`Client::ping`].
    pub async fn verify_connectivity(&self) -> DriverResult<()> {
        self.ping().await
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Pool metrics snapshot.
    pub fn metrics(&self) -> PoolMetrics {
        self.pool.metrics()
    }

    /// Close the client and its pool. Idempotent.
    pub async fn close(&self) -> DriverResult<()> {
        {
            let mut open = self.open.write();
            if !*open {
                return Ok(());
            }
            *open = false;
        }
        self.pool.close().await;
        Ok(())
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if *self.open.read() {
            Ok(())
        } else {
            Err(DriverError::pool("client is closed"))
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.config.address)
            .field("open", &*self.open.read())
            .finish()
    }
}

/// Handle to a named database.
#[derive(Clone)]
pub struct Database {
    name: String,
    config: Arc<ClientConfig>,
    pool: ConnectionPool,
}

impl Database {
    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a handle to a collection.
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection::new(
            self.name.clone(),
            name.into(),
            self.config.clone(),
            self.pool.clone(),
        )
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}
