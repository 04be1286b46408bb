//! Configuration for the SQLite primary and replica pools

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a [`SqliteReplicaSet`](crate::SqliteReplicaSet)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_replica::SqliteReplicaConfig;
///
/// // Use defaults: replica reads come from the primary file, opened read-only
/// let config = SqliteReplicaConfig::default();
///
/// // Read from a separately maintained copy
/// let config = SqliteReplicaConfig {
///     replica_path: Some("replica.db".into()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteReplicaConfig {
   /// Maximum number of concurrent replica connections
   ///
   /// Default: 6
   pub max_replica_connections: u32,

   /// Idle timeout for both primary and replica connections (in seconds)
   ///
   /// Default: 30
   pub idle_timeout_secs: u64,

   /// Database file that replica connections open (read-only)
   ///
   /// Replica connections are opened lazily, so a missing file only surfaces when a read is
   /// routed to the replica, at which point the read falls back to the primary.
   ///
   /// Default: the primary database file
   pub replica_path: Option<PathBuf>,
}

impl Default for SqliteReplicaConfig {
   fn default() -> Self {
      Self {
         max_replica_connections: 6,
         idle_timeout_secs: 30,
         replica_path: None,
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_partial_config_uses_defaults() {
      let config: SqliteReplicaConfig =
         serde_json::from_str(r#"{ "max_replica_connections": 2 }"#).unwrap();

      assert_eq!(config.max_replica_connections, 2);
      assert_eq!(config.idle_timeout_secs, 30);
      assert_eq!(config.replica_path, None);
   }
}
