//! Read-only SQLite pool serving the reading role

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use sqlx_replica_router::{CheckoutError, ReplicaPool};
use tracing::trace;

use crate::Error;
use crate::connection::PooledConnection;

// SQLITE_CANTOPEN, compared against the primary result code
const SQLITE_CANTOPEN: i64 = 14;

/// Pool of read-only connections to the replica database file.
///
/// Connections are opened lazily on checkout, so a missing or unreadable replica makes the
/// router fall back to the primary rather than failing at startup.
#[derive(Debug)]
pub struct SqliteReplicaPool {
   pool: Pool<Sqlite>,
   path: PathBuf,
}

impl SqliteReplicaPool {
   pub(crate) fn open(
      path: &Path,
      max_connections: u32,
      idle_timeout: Duration,
      acquire_timeout: Duration,
   ) -> Self {
      let options = SqliteConnectOptions::new().filename(path).read_only(true);

      let pool = SqlitePoolOptions::new()
         .max_connections(max_connections)
         .min_connections(0)
         .idle_timeout(Some(idle_timeout))
         .acquire_timeout(acquire_timeout)
         .connect_lazy_with(options);

      Self {
         pool,
         path: path.to_path_buf(),
      }
   }

   /// Database file the replica connections read from
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// The underlying sqlx pool, for reads that bypass routing
   pub fn pool(&self) -> &Pool<Sqlite> {
      &self.pool
   }

   pub(crate) async fn close(&self) {
      self.pool.close().await;
   }
}

impl ReplicaPool for SqliteReplicaPool {
   type Connection = PooledConnection;

   async fn checkout(
      &self,
      timeout: Duration,
   ) -> Result<PooledConnection, CheckoutError<Error>> {
      match tokio::time::timeout(timeout, self.pool.acquire()).await {
         Ok(Ok(conn)) => Ok(PooledConnection::new(conn)),
         Ok(Err(e)) => Err(checkout_error(e, timeout)),
         Err(_) => Err(CheckoutError::Timeout(timeout)),
      }
   }

   fn checkin(&self, connection: PooledConnection) {
      trace!(path = %self.path.display(), "Returning replica connection");
      drop(connection.into_inner());
   }
}

/// Sort a sqlx acquire failure into the router's fallback categories.
///
/// Exhaustion maps to `Timeout`. A closed pool, I/O failure, or a database file that cannot be
/// opened maps to `Unavailable`. Everything else is returned to the caller.
pub(crate) fn checkout_error(err: sqlx::Error, timeout: Duration) -> CheckoutError<Error> {
   match err {
      sqlx::Error::PoolTimedOut => CheckoutError::Timeout(timeout),
      sqlx::Error::PoolClosed => CheckoutError::Unavailable("replica pool is closed".to_string()),
      sqlx::Error::Io(e) => CheckoutError::Unavailable(e.to_string()),
      sqlx::Error::Database(db_err) if is_cant_open(db_err.code().as_deref()) => {
         CheckoutError::Unavailable(db_err.message().to_string())
      }
      other => CheckoutError::Other(Error::Sqlx(other)),
   }
}

fn is_cant_open(code: Option<&str>) -> bool {
   code
      .and_then(|code| code.parse::<i64>().ok())
      .is_some_and(|code| code & 0xff == SQLITE_CANTOPEN)
}

#[cfg(test)]
mod tests {
   use super::*;

   const TIMEOUT: Duration = Duration::from_secs(2);

   #[test]
   fn test_pool_timeout_maps_to_timeout() {
      assert!(matches!(
         checkout_error(sqlx::Error::PoolTimedOut, TIMEOUT),
         CheckoutError::Timeout(d) if d == TIMEOUT
      ));
   }

   #[test]
   fn test_closed_and_io_map_to_unavailable() {
      assert!(checkout_error(sqlx::Error::PoolClosed, TIMEOUT).is_unavailable());

      let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
      assert!(matches!(
         checkout_error(sqlx::Error::Io(io), TIMEOUT),
         CheckoutError::Unavailable(_)
      ));
   }

   #[test]
   fn test_other_errors_are_not_absorbed() {
      assert!(matches!(
         checkout_error(sqlx::Error::RowNotFound, TIMEOUT),
         CheckoutError::Other(Error::Sqlx(sqlx::Error::RowNotFound))
      ));
   }

   #[test]
   fn test_cant_open_codes() {
      assert!(is_cant_open(Some("14")));
      // SQLITE_CANTOPEN_ISDIR
      assert!(is_cant_open(Some("526")));
      assert!(!is_cant_open(Some("8")));
      assert!(!is_cant_open(None));
   }

   #[tokio::test]
   async fn test_missing_replica_file_is_unavailable() {
      let dir = tempfile::tempdir().unwrap();
      let replicas = SqliteReplicaPool::open(
         &dir.path().join("missing.db"),
         2,
         Duration::from_secs(30),
         TIMEOUT,
      );

      let err = replicas.checkout(TIMEOUT).await.unwrap_err();
      assert!(err.is_unavailable(), "unexpected error: {err}");
   }
}
