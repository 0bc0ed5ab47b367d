//! Driver module.
//!
//! The high-level client API: an explicitly lifecycled [`Client`] owning
//! one connection pool, [`Database`] and [`Collection`] handles over it,
//! and the [`Cursor`] returned by find operations.
//!
//! # Example
//!
//! ```ignore
//! use docstore_driver::{doc, Client};
//!
//! let client = Client::new("docstore://localhost:6543")?;
//! let collection = client.database("my_database").collection("my_collection");
//!
//! collection.insert_one(doc! { "nome" => "Diogo", "tipo" => "Servidor" }).await?;
//!
//! let mut cursor = collection
//!     .find(doc! { "tipo" => "Servidor" }, Default::default())
//!     .await?;
//! while let Some(document) = cursor.next().await? {
//!     println!("{:?}", document);
//! }
//!
//! client.close().await?;
//! ```

mod client;
mod collection;
mod connection;
mod cursor;
mod error;
mod pool;
mod results;

// Re-exports
pub use client::{
    Client, ClientConfig, ClientConfigBuilder, Database, ServerAddress, DEFAULT_PORT,
};
pub use collection::{Collection, FindOptions};
pub use connection::{Connection, ConnectionState};
pub use cursor::{Cursor, CursorState};
pub use error::{DriverError, DriverResult};
pub use pool::{ConnectionPool, PoolConfig, PoolConfigBuilder, PoolMetrics, PooledConnection};
pub use results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
