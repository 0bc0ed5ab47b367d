//! # DocStore Driver
//!
//! An async Rust driver for the DocStore document database.
//!
//! ## Features
//!
//! - **Async/Await** - Built on Tokio for high-performance async operations
//! - **Connection Pooling** - Bounded, self-healing pool with idle reaping
//! - **Typed Documents** - Insertion-ordered documents over a closed value type
//! - **Lazy Cursors** - Server-paginated iteration with deterministic cleanup
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docstore-driver = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use docstore_driver::{doc, Client, FindOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create client
//!     let client = Client::new("docstore://localhost:6543")?;
//!     let collection = client.database("my_database").collection("my_collection");
//!
//!     // Insert a document; `_id` is generated when absent
//!     let result = collection
//!         .insert_one(doc! { "nome" => "Diogo", "tipo" => "Servidor" })
//!         .await?;
//!     println!("inserted {:?}", result.inserted_id);
//!
//!     // Find one document
//!     let found = collection.find_one(doc! { "nome" => "Diogo" }, None).await?;
//!     println!("{:?}", found);
//!
//!     // Update with an operator document
//!     let updated = collection
//!         .update_one(
//!             doc! { "nome" => "Diogo" },
//!             doc! { "$set" => doc! { "tipo" => "Aluno" } },
//!         )
//!         .await?;
//!     assert_eq!(updated.matched_count, 1);
//!
//!     // Iterate a cursor with projection, sort and limit
//!     let options = FindOptions::new()
//!         .with_projection(doc! { "nome" => 1, "_id" => 0 })
//!         .with_sort(doc! { "nome" => 1 })
//!         .with_limit(2);
//!     let mut cursor = collection.find(doc! { "tipo" => "Aluno" }, options).await?;
//!     while let Some(document) = cursor.next().await? {
//!         println!("{:?}", document);
//!     }
//!
//!     // Clean up
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Value Types
//!
//! Documents hold a closed set of value types:
//!
//! ```rust
//! use docstore_driver::{Document, ObjectId, Value};
//!
//! let null = Value::Null;
//! let boolean = Value::Boolean(true);
//! let integer = Value::Int64(42);
//! let double = Value::Double(3.5);
//! let string = Value::String("hello".to_string());
//! let binary = Value::Binary(vec![1, 2, 3]);
//! let array = Value::Array(vec![Value::Int64(1), Value::Int64(2)]);
//! let embedded = Value::Document(Document::new());
//! let id = Value::ObjectId(ObjectId::new());
//! ```
//!
//! ## Configuration
//!
//! Customize client behavior with [`ClientConfig`]:
//!
//! ```rust
//! use docstore_driver::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .host("localhost", 6543)
//!     .max_pool_size(50)
//!     .max_idle_time(Duration::from_secs(120))
//!     .connect_timeout(Duration::from_secs(5))
//!     .operation_timeout(Duration::from_secs(10))
//!     .build();
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`DriverResult`] with a typed error taxonomy:
//!
//! ```rust,no_run
//! # use docstore_driver::{doc, Client, DriverError};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::new("docstore://localhost:6543")?;
//! # let collection = client.database("db").collection("c");
//! match collection.insert_one(doc! { "_id" => 1 }).await {
//!     Ok(result) => println!("inserted {:?}", result.inserted_id),
//!     Err(DriverError::Write { code, message }) => eprintln!("rejected: {} {}", code, message),
//!     Err(e) => eprintln!("error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Client, pool, collection operations and cursors
//! - [`document`] - Document model and identifiers
//! - [`wire`] - Low-level wire protocol implementation

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod document;
pub mod driver;
pub mod wire;

// Re-exports for convenience
pub use document::{Document, ObjectId, Value};
pub use driver::{
    Client, ClientConfig, ClientConfigBuilder, Collection, Cursor, CursorState, Database,
    DeleteResult, DriverError, DriverResult, FindOptions, InsertManyResult, InsertOneResult,
    PoolConfig, PoolMetrics, ServerAddress, UpdateResult, DEFAULT_PORT,
};
pub use wire::{DecodeError, EncodeError};
