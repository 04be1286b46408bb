//! # sqlx-replica-router
//!
//! Transparent read/write splitting for a database connection. A [`RoutingProxy`] wraps one
//! writable primary connection and, per statement, decides whether it runs there or on a
//! connection borrowed from a read replica pool.
//!
//! ## Core Types
//!
//! - **[`RoutingProxy`]**: Wraps the primary connection and routes every proxied operation
//! - **[`ReplicaReader`]**: Serves plain reads from a replica without holding the primary
//! - **[`Connection`]** / **[`ReplicaPool`]**: What a database backend provides
//! - **[`ConnectionHandler`]**: Registry of pools keyed by owner and role
//! - **[`WriteRecency`]**: Remembers the last primary write for the staleness window
//! - **[`ProxyConfig`]**: Staleness window, checkout timeout and log prefixes
//!
//! ## Routing Rules
//!
//! - Plain `SELECT` (and `WITH ... SELECT`) goes to the replica
//! - Writes, locking reads and unknown statements go to the primary
//! - Any read within `proxy_delay` of a primary write, or inside an open transaction, goes to
//!   the primary
//! - `SET` runs on the replica, then the primary; `SET LOCAL` only on the replica
//! - A role pinned with [`connected_to`] overrides all of the above
//! - An unavailable or exhausted replica pool silently falls back to the primary
//!
//! ```
//! use sqlx_replica_router::{StatementClass, classify};
//!
//! assert_eq!(classify("SELECT * FROM users"), StatementClass::PlainRead);
//! assert_eq!(classify("SELECT * FROM users FOR UPDATE"), StatementClass::LockingRead);
//! assert_eq!(classify("SET LOCAL statement_timeout = 0"), StatementClass::BroadcastExcluded);
//! ```
//!
mod checkout;
mod classifier;
mod config;
mod handler;
mod pool;
mod proxy;
mod reader;
mod recency;
mod resolver;
mod roles;

pub use checkout::ReplicaGuard;
pub use classifier::{StatementClass, classify, is_write_statement};
pub use config::ProxyConfig;
pub use handler::{BASE_OWNER, ConnectionHandler};
pub use pool::{CheckoutError, Connection, ReplicaPool};
pub use proxy::{HijackedMethod, RoutingProxy, SqlText};
pub use reader::ReplicaReader;
pub use recency::WriteRecency;
pub use resolver::{Capabilities, PrimarySignals, RoleResolver};
pub use roles::{
   READING, Role, RoleContext, TaskRoleContext, WRITING, connected_to, current_pinned_role,
};
