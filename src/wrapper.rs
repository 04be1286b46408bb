use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx_replica_router::{HijackedMethod, ProxyConfig, Role, connected_to};
use sqlx_sqlite_replica::{
   JsonRow, Migrator, QueryResult, SqliteProxy, SqliteReplicaConfig, SqliteReplicaSet,
};

use crate::Error;
use crate::resolve::resolve_database_path;
use crate::tasks::DatabaseTasks;

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Only set for INSERT operations on tables with a ROWID.
   /// Tables created with `WITHOUT ROWID` will not set this value (returns 0).
   pub last_insert_id: i64,
}

/// A SQLite database whose statements are routed between the primary and its replicas.
///
/// A plain read goes straight to a replica connection without touching the primary, so reads
/// never queue behind a held proxy. Everything else (writes, reads shortly after a write, reads
/// with the writing role pinned) acquires a routing proxy for the duration of the call.
#[derive(Clone)]
pub struct ProxiedDatabase {
   inner: Arc<SqliteReplicaSet>,
   config: SqliteReplicaConfig,
}

impl ProxiedDatabase {
   /// The underlying replica set, for direct pool access
   pub fn inner(&self) -> &Arc<SqliteReplicaSet> {
      &self.inner
   }

   /// Connect to a database at `path`, resolved relative to `base_dir`.
   pub async fn connect(
      path: &str,
      base_dir: &Path,
      custom_config: Option<SqliteReplicaConfig>,
      proxy_config: Option<ProxyConfig>,
   ) -> Result<Self, Error> {
      let abs_path = resolve_database_path(path, base_dir)?;

      Self::connect_with_path(&abs_path, custom_config, proxy_config).await
   }

   /// Connect to a SQLite database with an already resolved path.
   ///
   /// Each call opens its own primary and replica pools. Clones of the returned value share
   /// them, along with the write tracker that keeps reads on the primary after a write.
   pub async fn connect_with_path(
      abs_path: &Path,
      custom_config: Option<SqliteReplicaConfig>,
      proxy_config: Option<ProxyConfig>,
   ) -> Result<Self, Error> {
      let config = custom_config.unwrap_or_default();
      let db = SqliteReplicaSet::connect(abs_path, Some(config.clone()), proxy_config).await?;

      Ok(Self { inner: db, config })
   }

   /// Acquire a routing proxy over the primary connection.
   ///
   /// The primary is held until the proxy is dropped, so drop it before calling the helpers
   /// below from the same task.
   pub async fn acquire_proxy(&self) -> Result<SqliteProxy, Error> {
      Ok(self.inner.acquire_proxy().await?)
   }

   /// Execute a write statement
   ///
   /// # Example
   ///
   /// ```no_run
   /// # use sqlite_replica_proxy::ProxiedDatabase;
   /// # use serde_json::json;
   /// # async fn example(db: ProxiedDatabase) -> Result<(), sqlite_replica_proxy::Error> {
   /// let result = db
   ///    .execute("INSERT INTO users (name) VALUES (?)", vec![json!("Alice")])
   ///    .await?;
   /// println!("User ID: {}", result.last_insert_id);
   /// # Ok(())
   /// # }
   /// ```
   pub async fn execute(
      &self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<WriteQueryResult, Error> {
      let result = self.run(HijackedMethod::Execute, query, &values).await?;

      Ok(WriteQueryResult {
         rows_affected: result.rows_affected,
         last_insert_id: result.last_insert_id,
      })
   }

   /// Run a query and return every row
   pub async fn fetch_all(&self, query: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>, Error> {
      let result = self.run(HijackedMethod::ExecQuery, query, &values).await?;

      Ok(result.rows)
   }

   async fn run(
      &self,
      method: HijackedMethod,
      query: &str,
      values: &[JsonValue],
   ) -> Result<QueryResult, Error> {
      if let Some(result) = self
         .inner
         .replica_reader()
         .try_read(method, query, values)
         .await?
      {
         return Ok(result);
      }

      let mut proxy = self.acquire_proxy().await?;
      let result = match method {
         HijackedMethod::Execute => proxy.execute(query, values).await?,
         _ => proxy.exec_query(query, values).await?,
      };

      Ok(result)
   }

   /// Run a query returning zero or one row
   ///
   /// Returns an error if the query returns more than one row.
   pub async fn fetch_one(
      &self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<Option<JsonRow>, Error> {
      let mut rows = self.fetch_all(query, values).await?;

      match rows.len() {
         0 => Ok(None),
         1 => Ok(rows.pop()),
         count => Err(Error::MultipleRowsReturned(count)),
      }
   }

   /// Run `future` with the writing role pinned, so every statement it issues through this
   /// database goes to the primary.
   pub async fn stick_to_primary<F>(&self, future: F) -> F::Output
   where
      F: Future,
   {
      connected_to(Role::writing(), future).await
   }

   /// Run database migrations
   ///
   /// Runs all pending migrations on the primary connection with the writing role pinned.
   /// SQLx tracks applied migrations, so this is safe to call multiple times.
   pub async fn run_migrations(&self, migrator: &Migrator) -> Result<(), Error> {
      self
         .stick_to_primary(self.inner.run_migrations(migrator))
         .await?;
      Ok(())
   }

   /// Administrative tasks for this database's file
   pub fn tasks(&self) -> DatabaseTasks {
      DatabaseTasks::new(self.inner.path())
         .with_replica_config(self.config.clone())
         .with_proxy_config(self.inner.proxy_config().clone())
   }

   /// Close the database connection
   pub async fn close(self) -> Result<(), Error> {
      self.inner.close().await?;
      Ok(())
   }

   /// Close the database connection and remove all database files
   pub async fn remove(self) -> Result<(), Error> {
      self.inner.remove().await?;
      Ok(())
   }
}
