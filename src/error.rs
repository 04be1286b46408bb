use serde::{Serialize, Serializer};

/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for callers that serialize errors.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for the proxied database.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the replica set or a proxied statement.
   #[error(transparent)]
   Replica(#[from] sqlx_sqlite_replica::Error),

   /// Error from database migrations.
   #[error(transparent)]
   Migration(#[from] sqlx::migrate::MigrateError),

   /// Invalid database path provided.
   #[error("invalid database path: {0}")]
   InvalidPath(String),

   /// I/O error when accessing database or structure files.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),

   /// Multiple rows returned from fetch_one query.
   #[error("fetch_one() query returned {0} rows, expected 0 or 1")]
   MultipleRowsReturned(usize),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// Statement failures keep SQLite's code, e.g. `SQLITE_8` for a write that reached a
   /// read-only replica.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::Replica(e) => e.error_code(),
         Error::Migration(_) => "MIGRATION_ERROR".to_string(),
         Error::InvalidPath(_) => "INVALID_PATH".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
         Error::MultipleRowsReturned(_) => "MULTIPLE_ROWS_RETURNED".to_string(),
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_replica_errors_keep_their_code() {
      let err = Error::from(sqlx_sqlite_replica::Error::DatabaseClosed);
      assert_eq!(err.error_code(), "DATABASE_CLOSED");
   }

   #[test]
   fn test_serialize_includes_code_and_message() {
      let err = Error::MultipleRowsReturned(3);
      let value = serde_json::to_value(&err).unwrap();

      assert_eq!(value["code"], "MULTIPLE_ROWS_RETURNED");
      assert_eq!(
         value["message"],
         "fetch_one() query returned 3 rows, expected 0 or 1"
      );
   }

   #[test]
   fn test_invalid_path_code() {
      let err = Error::InvalidPath("../escape.db".into());
      assert_eq!(err.error_code(), "INVALID_PATH");
      assert!(err.to_string().contains("../escape.db"));
   }
}
