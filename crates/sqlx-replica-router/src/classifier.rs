//! Lightweight pattern classification of SQL statements
//!
//! This is not a SQL parser. Each statement is matched against a few ordered,
//! case-insensitive pattern groups to decide whether it may be served by a replica, must run on
//! the primary, or has to be applied to every resolved connection.

use regex::{Regex, RegexSet};
use std::sync::LazyLock;

/// Routing label computed for a single SQL statement.
///
/// Derived from the SQL text alone on every call and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementClass {
   /// Data-modifying or transaction-control statement (INSERT, UPDATE, DELETE, DROP, BEGIN, COMMIT)
   Write,
   /// Read that takes locks or touches sequences, or any statement the classifier does not
   /// recognize. Routes like a write.
   LockingRead,
   /// Plain SELECT or CTE read that a replica may serve
   PlainRead,
   /// Session-wide `SET` that must reach every resolved connection
   Broadcast,
   /// `SET LOCAL`, which only makes sense on the connection it runs on
   BroadcastExcluded,
}

impl StatementClass {
   /// Whether this label alone forces the statement onto the primary.
   pub fn requires_primary(self) -> bool {
      matches!(self, StatementClass::Write | StatementClass::LockingRead)
   }
}

static PRIMARY_MATCHERS: LazyLock<RegexSet> = LazyLock::new(|| {
   RegexSet::new([
      r"(?is)\A\s*select\b.*\bfor\s+(?:no\s+key\s+)?update\b",
      r"(?is)\A\s*select\b.*\bfor\s+(?:key\s+)?share\b",
      r"(?is)\bselect\b.*\block\s+in\s+share\s+mode\b",
      r"(?i)\b(?:nextval|currval|lastval|get_lock|release_lock|pg_advisory_lock|pg_advisory_unlock)\s*\(",
   ])
   .expect("primary matchers are valid patterns")
});

static REPLICA_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"(?is)\A\s*(?:select|with\s.*\)\s*select)\s")
      .expect("replica matcher is a valid pattern")
});

static CTE_MATCHER: LazyLock<Regex> =
   LazyLock::new(|| Regex::new(r"(?i)\A\s*with\s").expect("cte matcher is a valid pattern"));

static BROADCAST_MATCHER: LazyLock<Regex> =
   LazyLock::new(|| Regex::new(r"(?i)\A\s*set\s").expect("broadcast matcher is a valid pattern"));

static BROADCAST_EXCLUDED_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"(?i)\A\s*set\s+local\s").expect("local set matcher is a valid pattern")
});

static WRITE_MATCHERS: LazyLock<RegexSet> = LazyLock::new(|| {
   RegexSet::new([
      r"(?i)\A\s*begin\b",
      r"(?i)\A\s*commit\b",
      r"(?i)insert\s+into\s",
      r"(?i)update\s",
      r"(?i)delete\s+from\s",
      r"(?i)drop\s",
   ])
   .expect("write matchers are valid patterns")
});

/// Classify a SQL statement for routing.
///
/// Broadcast detection runs first, then the primary-forcing patterns, then the replica-eligible
/// patterns. Anything left over is treated as needing the primary.
///
/// # Examples
///
/// ```
/// use sqlx_replica_router::{StatementClass, classify};
///
/// assert_eq!(classify("SELECT * FROM users"), StatementClass::PlainRead);
/// assert_eq!(classify("SELECT * FROM users FOR UPDATE"), StatementClass::LockingRead);
/// assert_eq!(classify("SET statement_timeout = 0"), StatementClass::Broadcast);
/// assert_eq!(classify("SET LOCAL statement_timeout = 0"), StatementClass::BroadcastExcluded);
/// assert_eq!(classify("INSERT INTO users (name) VALUES ('a')"), StatementClass::Write);
/// ```
pub fn classify(sql: &str) -> StatementClass {
   if BROADCAST_EXCLUDED_MATCHER.is_match(sql) {
      return StatementClass::BroadcastExcluded;
   }

   if BROADCAST_MATCHER.is_match(sql) {
      return StatementClass::Broadcast;
   }

   if PRIMARY_MATCHERS.is_match(sql) {
      return StatementClass::LockingRead;
   }

   if REPLICA_MATCHER.is_match(sql) {
      // Data-modifying CTEs (`WITH x AS (DELETE ...) SELECT ...`) still look like reads
      if CTE_MATCHER.is_match(sql) && is_write_statement(sql) {
         return StatementClass::Write;
      }
      return StatementClass::PlainRead;
   }

   if is_write_statement(sql) {
      return StatementClass::Write;
   }

   StatementClass::LockingRead
}

/// Whether a statement counts as a write for staleness tracking.
///
/// This is independent of routing: a statement matching these patterns records a write whenever
/// it runs on the primary connection, whichever role selected it.
pub fn is_write_statement(sql: &str) -> bool {
   WRITE_MATCHERS.is_match(sql)
}
