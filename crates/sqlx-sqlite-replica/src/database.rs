//! SQLite primary database with a read-only replica pool

use crate::Result;
use crate::config::SqliteReplicaConfig;
use crate::connection::PooledConnection;
use crate::error::Error;
use crate::replica_pool::SqliteReplicaPool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, Pool, Sqlite};
use sqlx_replica_router::{
   BASE_OWNER, ConnectionHandler, ProxyConfig, ReplicaReader, Role, RoutingProxy, WriteRecency,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error};

/// Routing proxy over a SQLite primary connection
pub type SqliteProxy = RoutingProxy<SqliteReplicaPool>;

/// Replica reads that do not hold the SQLite primary
pub type SqliteReader = ReplicaReader<SqliteReplicaPool>;

/// A SQLite database split into a writable primary and a read-only replica pool.
///
/// The primary is a single read-write connection, so statements on it are serialized. The
/// replica pool serves reads concurrently from `replica_path` (or the primary file itself). An
/// in-memory primary without a `replica_path` has no replica pool: a read-only connection to
/// `:memory:` would open a separate, empty database, so every statement runs on the primary.
/// Each call to [`acquire_proxy`](Self::acquire_proxy) wraps the primary in a [`RoutingProxy`]
/// that shares this database's pool registry and write tracker, so a write through one proxy
/// keeps reads through the next one on the primary for the staleness window.
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlite_replica::SqliteReplicaSet;
///
/// # async fn example() -> Result<(), sqlx_sqlite_replica::Error> {
/// let db = SqliteReplicaSet::connect("test.db", None, None).await?;
///
/// let mut proxy = db.acquire_proxy().await?;
/// proxy.execute("INSERT INTO users (name) VALUES ('Alice')", &[]).await?;
/// let users = proxy.exec_query("SELECT * FROM users", &[]).await?;
/// drop(proxy);
///
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteReplicaSet {
   /// Single read-write connection pool (max_connections=1) for the primary
   write_conn: Pool<Sqlite>,

   /// Read-only pool registered for the reading role
   replicas: Option<Arc<SqliteReplicaPool>>,

   handler: Arc<ConnectionHandler<SqliteReplicaPool>>,

   /// Shared by every proxy over this primary
   recency: Arc<WriteRecency>,

   proxy_config: Arc<ProxyConfig>,

   /// Tracks if WAL mode has been initialized (set on first primary checkout)
   wal_initialized: AtomicBool,

   closed: AtomicBool,

   path: PathBuf,
}

impl SqliteReplicaSet {
   /// Open the primary database at `path` and register its replica pool.
   ///
   /// The primary file is created if it doesn't exist. WAL mode is enabled the first time the
   /// primary connection is acquired. Every call opens new pools; nothing is cached globally.
   ///
   /// Pass `None` for either config to use its defaults.
   pub async fn connect(
      path: impl AsRef<Path>,
      custom_config: Option<SqliteReplicaConfig>,
      proxy_config: Option<ProxyConfig>,
   ) -> Result<Arc<Self>> {
      let config = custom_config.unwrap_or_default();
      let proxy_config = Arc::new(proxy_config.unwrap_or_default());
      let path = path.as_ref();

      if path.as_os_str().is_empty() {
         return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Database path cannot be empty",
         )));
      }

      // Create the file up front so the first routed statement may be a read on a read-only
      // replica connection, which cannot create it
      if !path.exists() && !is_memory_database(path) {
         let conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .read_only(false)
            .connect()
            .await?;
         drop(conn);
      }

      let idle_timeout = Duration::from_secs(config.idle_timeout_secs);

      // An in-memory database lives only as long as its connection
      let in_memory = is_memory_database(path);
      let (idle, lifetime) = if in_memory {
         (None, None)
      } else {
         (Some(idle_timeout), Some(Duration::from_secs(30 * 60)))
      };

      let write_conn = SqlitePoolOptions::new()
         .max_connections(1)
         .min_connections(0)
         .idle_timeout(idle)
         .max_lifetime(lifetime)
         .connect_with(SqliteConnectOptions::new().filename(path).read_only(false))
         .await?;

      let handler = Arc::new(ConnectionHandler::new());

      let replica_path = match config.replica_path.as_deref() {
         Some(replica_path) => Some(replica_path),
         None if in_memory => None,
         None => Some(path),
      };
      let replicas = replica_path.map(|replica_path| {
         Arc::new(SqliteReplicaPool::open(
            replica_path,
            config.max_replica_connections,
            idle_timeout,
            proxy_config.checkout_timeout(),
         ))
      });

      match &replicas {
         Some(replicas) => {
            handler.establish(BASE_OWNER, Role::reading(), Arc::clone(replicas));
            debug!(
               primary = %path.display(),
               replica = %replicas.path().display(),
               "Opened SQLite replica set"
            );
         }
         None => debug!(primary = %path.display(), "Opened in-memory SQLite primary without replicas"),
      }

      Ok(Arc::new(Self {
         write_conn,
         replicas,
         handler,
         recency: Arc::new(WriteRecency::new(proxy_config.proxy_delay())),
         proxy_config,
         wal_initialized: AtomicBool::new(false),
         closed: AtomicBool::new(false),
         path: path.to_path_buf(),
      }))
   }

   /// Acquire the primary connection, bypassing routing.
   ///
   /// Only one primary connection exists; this waits until it is free. On the first call WAL
   /// mode is enabled on the database.
   pub async fn acquire_primary(&self) -> Result<PooledConnection> {
      if self.closed.load(Ordering::SeqCst) {
         return Err(Error::DatabaseClosed);
      }

      let mut conn = self.write_conn.acquire().await?;

      // Initialize WAL mode on first use (idempotent and safe)
      if !self.wal_initialized.load(Ordering::SeqCst) {
         sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&mut *conn)
            .await?;

         // https://www.sqlite.org/wal.html#performance_considerations
         sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&mut *conn)
            .await?;

         self.wal_initialized.store(true, Ordering::SeqCst);
      }

      Ok(PooledConnection::new(conn))
   }

   /// Acquire the primary connection wrapped in a routing proxy.
   ///
   /// The primary is held until the proxy is dropped.
   pub async fn acquire_proxy(&self) -> Result<SqliteProxy> {
      let primary = self.acquire_primary().await?;

      Ok(
         RoutingProxy::new(primary, Arc::clone(&self.handler), Arc::clone(&self.proxy_config))
            .with_write_recency(Arc::clone(&self.recency)),
      )
   }

   /// Reader that serves plain reads from the replica pool without acquiring the primary.
   ///
   /// Shares this database's pool registry and write tracker with every proxy.
   pub fn replica_reader(&self) -> SqliteReader {
      ReplicaReader::new(
         Arc::clone(&self.handler),
         Arc::clone(&self.recency),
         Arc::clone(&self.proxy_config),
      )
   }

   /// Run pending migrations on the primary connection.
   pub async fn run_migrations(&self, migrator: &Migrator) -> Result<()> {
      let mut primary = self.acquire_primary().await?;
      migrator.run(&mut *primary).await?;
      Ok(())
   }

   pub fn handler(&self) -> &Arc<ConnectionHandler<SqliteReplicaPool>> {
      &self.handler
   }

   /// The replica pool, or `None` for an in-memory primary without a replica file.
   pub fn replica_pool(&self) -> Result<Option<&Arc<SqliteReplicaPool>>> {
      if self.closed.load(Ordering::SeqCst) {
         return Err(Error::DatabaseClosed);
      }
      Ok(self.replicas.as_ref())
   }

   pub fn write_recency(&self) -> &Arc<WriteRecency> {
      &self.recency
   }

   pub fn proxy_config(&self) -> &ProxyConfig {
      &self.proxy_config
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Close both pools.
   ///
   /// The replica pool is unregistered first, then the WAL is checkpointed and the primary
   /// closed. After calling close, any operations on this database return
   /// `Error::DatabaseClosed`.
   pub async fn close(self: Arc<Self>) -> Result<()> {
      self.closed.store(true, Ordering::SeqCst);

      self.handler.remove(BASE_OWNER, &Role::reading());

      // Waits for checked-out replica connections to be returned
      if let Some(replicas) = &self.replicas {
         replicas.close().await;
      }

      // Checkpoint WAL before closing the write connection to flush changes and truncate WAL file
      if self.wal_initialized.load(Ordering::SeqCst)
         && let Ok(mut conn) = self.write_conn.acquire().await
         && let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&mut *conn)
            .await
      {
         error!("Failed to checkpoint WAL on close: {}", e);
      }

      self.write_conn.close().await;

      Ok(())
   }

   /// Close the database and delete the primary database files.
   ///
   /// Deletes the database file, WAL file, and SHM file from disk. A separate replica file is
   /// left alone.
   pub async fn remove(self: Arc<Self>) -> Result<()> {
      let path = self.path.clone();

      self.close().await?;

      std::fs::remove_file(&path).map_err(Error::Io)?;

      // WAL and SHM files may not exist if WAL was never initialized
      for sidecar in [path.with_extension("db-wal"), path.with_extension("db-shm")] {
         if let Err(e) = std::fs::remove_file(&sidecar)
            && e.kind() != std::io::ErrorKind::NotFound
         {
            return Err(Error::Io(e));
         }
      }

      Ok(())
   }
}

pub(crate) fn is_memory_database(path: &Path) -> bool {
   path.to_str()
      .is_some_and(|p| p == ":memory:" || p.starts_with("file::memory:"))
}
