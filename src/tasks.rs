//! Administrative database tasks
//!
//! Every task pins the writing role, so each statement it issues through a routing proxy runs on
//! the primary even when the replica pool is healthy and nothing was written recently.

use std::future::Future;
use std::path::{Path, PathBuf};

use sqlx_replica_router::{ProxyConfig, Role, connected_to};
use sqlx_sqlite_replica::SqliteReplicaConfig;
use tracing::debug;

use crate::Error;
use crate::wrapper::ProxiedDatabase;

const SCHEMA_OBJECTS: &str = "SELECT type, name FROM sqlite_master \
   WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
   ORDER BY type DESC";

const SCHEMA_SQL: &str = "SELECT sql FROM sqlite_master \
   WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%' \
   ORDER BY rowid";

/// Create, drop, purge, dump and load a database file.
///
/// # Example
///
/// ```no_run
/// use sqlite_replica_proxy::DatabaseTasks;
///
/// # async fn example() -> Result<(), sqlite_replica_proxy::Error> {
/// let tasks = DatabaseTasks::new("/tmp/app.db");
/// tasks.create().await?;
/// tasks.structure_load("schema.sql").await?;
/// tasks.structure_dump("schema-out.sql").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseTasks {
   path: PathBuf,
   replica_config: Option<SqliteReplicaConfig>,
   proxy_config: Option<ProxyConfig>,
}

impl DatabaseTasks {
   pub fn new(path: impl AsRef<Path>) -> Self {
      Self {
         path: path.as_ref().to_path_buf(),
         replica_config: None,
         proxy_config: None,
      }
   }

   pub fn with_replica_config(mut self, config: SqliteReplicaConfig) -> Self {
      self.replica_config = Some(config);
      self
   }

   pub fn with_proxy_config(mut self, config: ProxyConfig) -> Self {
      self.proxy_config = Some(config);
      self
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Create the database file. An existing database is left untouched.
   pub async fn create(&self) -> Result<(), Error> {
      sticking_to_primary(async {
         debug!(path = %self.path.display(), "Creating database");
         self.open().await?.close().await
      })
      .await
   }

   /// Delete the database file along with its WAL and SHM files.
   ///
   /// Dropping a database that does not exist is a no-op.
   pub async fn drop(&self) -> Result<(), Error> {
      sticking_to_primary(async {
         if !self.path.exists() {
            return Ok(());
         }

         debug!(path = %self.path.display(), "Dropping database");
         self.open().await?.remove().await
      })
      .await
   }

   /// Drop every table and view, leaving an empty database file behind.
   pub async fn purge(&self) -> Result<(), Error> {
      sticking_to_primary(async {
         debug!(path = %self.path.display(), "Purging database");
         let db = self.open().await?;
         let result = purge_schema(&db).await;
         db.close().await?;
         result
      })
      .await
   }

   /// Write the schema (`CREATE` statements from `sqlite_master`) to `structure_path`.
   pub async fn structure_dump(&self, structure_path: impl AsRef<Path>) -> Result<(), Error> {
      let structure_path = structure_path.as_ref();

      sticking_to_primary(async {
         debug!(
            path = %self.path.display(),
            out = %structure_path.display(),
            "Dumping database structure"
         );
         let db = self.open().await?;
         let result = dump_schema(&db).await;
         db.close().await?;

         std::fs::write(structure_path, result?)?;
         Ok(())
      })
      .await
   }

   /// Execute the SQL in `structure_path` against the primary.
   pub async fn structure_load(&self, structure_path: impl AsRef<Path>) -> Result<(), Error> {
      let structure_path = structure_path.as_ref();
      let sql = std::fs::read_to_string(structure_path)?;

      sticking_to_primary(async {
         debug!(
            path = %self.path.display(),
            from = %structure_path.display(),
            "Loading database structure"
         );
         let db = self.open().await?;
         let result = load_schema(&db, &sql).await;
         db.close().await?;
         result
      })
      .await
   }

   async fn open(&self) -> Result<ProxiedDatabase, Error> {
      ProxiedDatabase::connect_with_path(
         &self.path,
         self.replica_config.clone(),
         self.proxy_config.clone(),
      )
      .await
   }
}

async fn sticking_to_primary<F, T>(future: F) -> Result<T, Error>
where
   F: Future<Output = Result<T, Error>>,
{
   connected_to(Role::writing(), future).await
}

async fn purge_schema(db: &ProxiedDatabase) -> Result<(), Error> {
   let mut proxy = db.acquire_proxy().await?;
   let objects = proxy.exec_query(SCHEMA_OBJECTS, &[]).await?.rows;

   // Tables may reference each other in any order
   proxy.execute("PRAGMA foreign_keys = OFF", &[]).await?;

   for object in &objects {
      let kind = object.get("type").and_then(|v| v.as_str());
      let name = object.get("name").and_then(|v| v.as_str());
      let (Some(kind), Some(name)) = (kind, name) else {
         continue;
      };
      let statement = format!(
         "DROP {} IF EXISTS \"{}\"",
         kind.to_uppercase(),
         name.replace('"', "\"\"")
      );
      proxy.execute(statement.as_str(), &[]).await?;
   }

   proxy.execute("PRAGMA foreign_keys = ON", &[]).await?;
   Ok(())
}

async fn dump_schema(db: &ProxiedDatabase) -> Result<String, Error> {
   let mut proxy = db.acquire_proxy().await?;
   let rows = proxy.exec_query(SCHEMA_SQL, &[]).await?.rows;

   Ok(rows
      .iter()
      .filter_map(|row| row.get("sql").and_then(|v| v.as_str()))
      .map(|sql| format!("{sql};\n"))
      .collect())
}

async fn load_schema(db: &ProxiedDatabase, sql: &str) -> Result<(), Error> {
   if sql.trim().is_empty() {
      return Ok(());
   }

   let mut proxy = db.acquire_proxy().await?;
   proxy.execute(sql, &[]).await?;
   Ok(())
}
