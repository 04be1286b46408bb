//! Configuration shared by every routing proxy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Routing configuration, built once at startup and shared by reference with each proxy.
///
/// # Examples
///
/// ```
/// use sqlx_replica_router::ProxyConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = ProxyConfig::default();
/// assert_eq!(config.proxy_delay(), Duration::from_secs(2));
///
/// // Override just one field
/// let config = ProxyConfig {
///     checkout_timeout_ms: 500,
///     ..Default::default()
/// };
/// assert_eq!(config.checkout_timeout(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
   /// How long after a write every read is pinned to the primary (in milliseconds)
   ///
   /// Default: 2000
   pub proxy_delay_ms: u64,

   /// Upper bound on waiting for a replica connection (in milliseconds)
   ///
   /// When it elapses the statement runs on the primary instead.
   ///
   /// Default: 2000
   pub checkout_timeout_ms: u64,

   /// Label attached to log events for statements run on the primary
   ///
   /// Default: "Primary"
   pub primary_log_prefix: String,

   /// Label attached to log events for statements run on a replica
   ///
   /// Default: "Replica"
   pub replica_log_prefix: String,
}

impl Default for ProxyConfig {
   fn default() -> Self {
      Self {
         proxy_delay_ms: 2000,
         checkout_timeout_ms: 2000,
         primary_log_prefix: "Primary".to_string(),
         replica_log_prefix: "Replica".to_string(),
      }
   }
}

impl ProxyConfig {
   pub fn proxy_delay(&self) -> Duration {
      Duration::from_millis(self.proxy_delay_ms)
   }

   pub fn checkout_timeout(&self) -> Duration {
      Duration::from_millis(self.checkout_timeout_ms)
   }
}
