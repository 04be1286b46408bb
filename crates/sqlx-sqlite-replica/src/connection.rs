//! Pooled SQLite connection usable as a routing target

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection};
use sqlx_replica_router::Connection;

use crate::Error;
use crate::decode::{JsonRow, decode_rows};

/// Result of one proxied statement.
///
/// `execute` fills in `rows_affected` and `last_insert_id`; the query variants fill in `rows`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
   /// Decoded result rows
   pub rows: Vec<JsonRow>,
   /// The number of rows affected by a write
   pub rows_affected: u64,
   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Tables created with `WITHOUT ROWID` will not set this value (returns 0).
   pub last_insert_id: i64,
}

/// A connection checked out of the primary or replica pool.
///
/// Returned to its pool on drop. Derefs to `SqliteConnection` for direct use with sqlx queries.
#[derive(Debug)]
pub struct PooledConnection {
   conn: PoolConnection<Sqlite>,
}

impl PooledConnection {
   pub(crate) fn new(conn: PoolConnection<Sqlite>) -> Self {
      Self { conn }
   }

   pub fn into_inner(self) -> PoolConnection<Sqlite> {
      self.conn
   }

   async fn fetch(
      &mut self,
      sql: &str,
      binds: &[JsonValue],
      persistent: bool,
   ) -> Result<QueryResult, Error> {
      let rows = build_query(sql, binds, persistent)
         .fetch_all(&mut *self.conn)
         .await?;

      Ok(QueryResult {
         rows: decode_rows(rows)?,
         ..Default::default()
      })
   }
}

impl Deref for PooledConnection {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for PooledConnection {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}

impl Connection for PooledConnection {
   type Output = QueryResult;
   type Bind = JsonValue;
   type Error = Error;

   async fn execute(&mut self, sql: &str, binds: &[JsonValue]) -> Result<QueryResult, Error> {
      let result = build_query(sql, binds, true)
         .execute(&mut *self.conn)
         .await?;

      Ok(QueryResult {
         rows: Vec::new(),
         rows_affected: result.rows_affected(),
         last_insert_id: result.last_insert_rowid(),
      })
   }

   async fn exec_query(&mut self, sql: &str, binds: &[JsonValue]) -> Result<QueryResult, Error> {
      self.fetch(sql, binds, true).await
   }

   async fn exec_no_cache(
      &mut self,
      sql: &str,
      binds: &[JsonValue],
   ) -> Result<QueryResult, Error> {
      self.fetch(sql, binds, false).await
   }

   async fn exec_cache(&mut self, sql: &str, binds: &[JsonValue]) -> Result<QueryResult, Error> {
      self.fetch(sql, binds, true).await
   }

   async fn in_transaction(&mut self) -> Result<bool, Error> {
      let mut handle = self.conn.lock_handle().await?;

      // SAFETY: the handle stays locked, and the connection owned, for the duration of the call
      let autocommit =
         unsafe { libsqlite3_sys::sqlite3_get_autocommit(handle.as_raw_handle().as_ptr()) };

      Ok(autocommit == 0)
   }
}

fn build_query<'q>(
   sql: &'q str,
   binds: &[JsonValue],
   persistent: bool,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
   binds
      .iter()
      .fold(sqlx::query(sql).persistent(persistent), bind_value)
}

/// Bind a JSON value to a sqlx query.
///
/// Integers keep their precision as `i64` where they fit; arrays and objects are bound as JSON
/// text.
pub fn bind_value<'a>(
   query: Query<'a, Sqlite, SqliteArguments<'a>>,
   value: &JsonValue,
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
   match value {
      JsonValue::Null => query.bind(None::<JsonValue>),
      JsonValue::String(s) => query.bind(s.clone()),
      JsonValue::Bool(b) => query.bind(*b),
      JsonValue::Number(number) => {
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            // Values beyond i64 lose precision as REAL
            match i64::try_from(uint_val) {
               Ok(int_val) => query.bind(int_val),
               Err(_) => query.bind(uint_val as f64),
            }
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      JsonValue::Array(_) | JsonValue::Object(_) => query.bind(value.clone()),
   }
}
