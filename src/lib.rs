//! # sqlite-replica-proxy
//!
//! Read/write splitting for SQLite. Statements issued through a [`ProxiedDatabase`] are
//! classified and sent either to the writable primary or to a pool of read-only replica
//! connections:
//!
//! - Reads go to a replica unless the database was written within the configured delay, the
//!   primary has an open transaction, or the caller pinned the writing role
//! - Writes, locking reads and unrecognized statements go to the primary
//! - Session settings (`SET ...`) are applied to both
//! - An unavailable or exhausted replica pool falls back to the primary
//!
//! [`DatabaseTasks`] runs administrative work (create, drop, purge, structure dump/load) pinned
//! to the primary.
//!
//! ## Usage
//!
//! ```no_run
//! use serde_json::json;
//! use sqlite_replica_proxy::{ProxiedDatabase, Role, connected_to};
//!
//! # async fn example() -> Result<(), sqlite_replica_proxy::Error> {
//! let db = ProxiedDatabase::connect("app.db", std::path::Path::new("/var/lib/app"), None, None)
//!    .await?;
//!
//! db.execute("INSERT INTO users (name) VALUES (?)", vec![json!("Alice")])
//!    .await?;
//!
//! // Written less than two seconds ago, so this read stays on the primary
//! let user = db
//!    .fetch_one("SELECT * FROM users WHERE name = ?", vec![json!("Alice")])
//!    .await?;
//!
//! // Force the replica for a block of reads
//! let users = connected_to(Role::reading(), db.fetch_all("SELECT * FROM users", vec![])).await?;
//! # let _ = (user, users);
//!
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod resolve;
mod tasks;
mod wrapper;

pub use error::{Error, Result};
pub use resolve::resolve_database_path;
pub use tasks::DatabaseTasks;
pub use wrapper::{ProxiedDatabase, WriteQueryResult};

// Re-export the routing and backend types callers configure and pin with
pub use sqlx_replica_router::{
   Capabilities, ProxyConfig, Role, RoutingProxy, StatementClass, classify, connected_to,
};
pub use sqlx_sqlite_replica::{
   JsonRow, Migrator, QueryResult, SqliteProxy, SqliteReplicaConfig, SqliteReplicaSet,
};
