//! # sqlx-sqlite-replica
//!
//! SQLite backend for [`sqlx_replica_router`]: a writable primary connection plus a pool of
//! read-only replica connections, wired into a [`RoutingProxy`](sqlx_replica_router::RoutingProxy).
//!
//! ## Core Types
//!
//! - **[`SqliteReplicaSet`]**: Primary pool, replica pool, pool registry and shared write tracker
//! - **[`SqliteReplicaConfig`]**: Pool sizes, idle timeout and the replica file
//! - **[`PooledConnection`]**: A primary or replica connection the router can execute on
//! - **[`SqliteReplicaPool`]**: Read-only pool implementing the router's checkout contract
//! - **[`QueryResult`]**: Rows decoded to JSON, rows affected and last insert id
//! - **[`Error`]**: Error type for database operations
//!
//! ## Architecture
//!
//! - **Single primary**: One read-write connection; every write is serialized through it
//! - **Read-only replicas**: Concurrent read-only connections, opened lazily
//! - **Graceful degradation**: A replica that cannot be opened, or a pool that stays exhausted
//!   past the checkout timeout, sends reads back to the primary
//! - **Lazy WAL mode**: Enabled the first time the primary connection is acquired
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_replica_router::{Role, connected_to};
//! use sqlx_sqlite_replica::SqliteReplicaSet;
//!
//! #[tokio::main]
//! async fn main() -> sqlx_sqlite_replica::Result<()> {
//!     let db = SqliteReplicaSet::connect("example.db", None, None).await?;
//!     let mut proxy = db.acquire_proxy().await?;
//!
//!     // Served by a replica connection
//!     let _users = proxy.exec_query("SELECT * FROM users", &[]).await?;
//!
//!     // Runs on the primary
//!     proxy
//!         .execute("INSERT INTO users (name) VALUES (?)", &[serde_json::json!("Alice")])
//!         .await?;
//!
//!     // Force the primary for a block of work
//!     connected_to(Role::writing(), async {
//!         proxy.exec_query("SELECT COUNT(*) FROM users", &[]).await
//!     })
//!     .await?;
//!
//!     drop(proxy);
//!     db.close().await?;
//!     Ok(())
//! }
//! ```
//!
mod config;
mod connection;
mod database;
mod decode;
mod error;
mod replica_pool;

pub use config::SqliteReplicaConfig;
pub use connection::{PooledConnection, QueryResult, bind_value};
pub use database::{SqliteProxy, SqliteReader, SqliteReplicaSet};
pub use decode::{JsonRow, decode_rows, to_json};
pub use error::Error;
pub use replica_pool::SqliteReplicaPool;

// Re-export sqlx migrate types for convenience
pub use sqlx::migrate::Migrator;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
