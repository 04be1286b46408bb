//! SQLite rows and values as JSON

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Row, TypeInfo, Value, ValueRef};
use time::PrimitiveDateTime;

use crate::Error;

/// One result row, keyed by column name in select order
pub type JsonRow = IndexMap<String, JsonValue>;

/// Convert a SQLite value to a JSON value.
///
/// BLOB values are returned as base64-encoded strings since JSON has no native binary type.
/// Booleans are stored as INTEGER in SQLite and come back as numbers unless the column is
/// declared BOOLEAN.
pub fn to_json(value: SqliteValueRef) -> Result<JsonValue, Error> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let column_type = value.type_info();

   let result = match column_type.name() {
      // Dates and times are stored as ISO 8601 TEXT
      "TEXT" | "DATE" | "TIME" => value
         .to_owned()
         .try_decode::<String>()
         .map_or(JsonValue::Null, JsonValue::String),

      "REAL" => value
         .to_owned()
         .try_decode::<f64>()
         .map_or(JsonValue::Null, JsonValue::from),

      "INTEGER" | "NUMERIC" => value
         .to_owned()
         .try_decode::<i64>()
         .map_or(JsonValue::Null, JsonValue::from),

      "BOOLEAN" => value
         .to_owned()
         .try_decode::<bool>()
         .map_or(JsonValue::Null, JsonValue::Bool),

      "DATETIME" => {
         let owned = value.to_owned();
         if let Ok(dt) = owned.try_decode::<PrimitiveDateTime>() {
            JsonValue::String(dt.to_string())
         } else {
            owned
               .try_decode::<String>()
               .map_or(JsonValue::Null, JsonValue::String)
         }
      }

      "BLOB" => value
         .to_owned()
         .try_decode::<Vec<u8>>()
         .map_or(JsonValue::Null, |blob| JsonValue::String(base64_encode(&blob))),

      "NULL" => JsonValue::Null,

      other => match value.to_owned().try_decode::<String>() {
         Ok(text) => JsonValue::String(text),
         Err(_) => {
            return Err(Error::UnsupportedDatatype(format!(
               "Unknown SQLite type: {}",
               other
            )));
         }
      },
   };

   Ok(result)
}

/// Decode every row of a result set.
pub fn decode_rows(rows: Vec<SqliteRow>) -> Result<Vec<JsonRow>, Error> {
   let mut values = Vec::with_capacity(rows.len());
   for row in rows {
      let mut value = JsonRow::default();
      for (i, column) in row.columns().iter().enumerate() {
         let v = row.try_get_raw(i)?;
         value.insert(column.name().to_string(), to_json(v)?);
      }
      values.push(value);
   }
   Ok(values)
}

fn base64_encode(data: &[u8]) -> String {
   use base64::Engine;
   base64::engine::general_purpose::STANDARD.encode(data)
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_base64_encode() {
      assert_eq!(base64_encode(b"hello"), "aGVsbG8=");
      assert_eq!(base64_encode(&[0, 0, 0]), "AAAA");
      assert_eq!(base64_encode(&[]), "");
   }

   #[tokio::test]
   async fn test_decode_rows_preserves_column_order() {
      use sqlx::Connection;

      let mut conn = sqlx::SqliteConnection::connect("sqlite::memory:").await.unwrap();
      let rows = sqlx::query(
         "SELECT 'Alice' AS name, 30 AS age, 1.5 AS score, NULL AS nickname, x'0102' AS avatar",
      )
      .fetch_all(&mut conn)
      .await
      .unwrap();

      let decoded = decode_rows(rows).unwrap();
      assert_eq!(decoded.len(), 1);

      let row = &decoded[0];
      let columns: Vec<&str> = row.keys().map(String::as_str).collect();
      assert_eq!(columns, ["name", "age", "score", "nickname", "avatar"]);
      assert_eq!(row["name"], "Alice");
      assert_eq!(row["age"], 30);
      assert_eq!(row["score"], 1.5);
      assert_eq!(row["nickname"], JsonValue::Null);
      assert_eq!(row["avatar"], "AQI=");
   }
}
