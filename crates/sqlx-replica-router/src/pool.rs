//! Interfaces the router consumes from a database backend

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// A physical connection able to run the proxied operations.
///
/// The primary connection and replica connections share this type so the router can run the
/// same operation on either. Errors are the backend's own and pass through the router unchanged.
pub trait Connection: Send {
   /// Value returned by every proxied operation
   type Output: Send;

   /// Positional bind parameter
   type Bind: Sync;

   /// Error raised by the backend driver
   type Error: std::error::Error + Send + Sync + 'static;

   /// Run a statement.
   fn execute(
      &mut self,
      sql: &str,
      binds: &[Self::Bind],
   ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;

   /// Run a statement and collect its result set.
   fn exec_query(
      &mut self,
      sql: &str,
      binds: &[Self::Bind],
   ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;

   /// Run a statement without caching its prepared form.
   fn exec_no_cache(
      &mut self,
      sql: &str,
      binds: &[Self::Bind],
   ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;

   /// Run a statement through the prepared-statement cache.
   fn exec_cache(
      &mut self,
      sql: &str,
      binds: &[Self::Bind],
   ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;

   /// Whether a transaction is currently open on this connection.
   fn in_transaction(&mut self) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}

/// Why a replica connection could not be checked out.
#[derive(Error, Debug)]
pub enum CheckoutError<E> {
   /// The pool or its database is missing, or connecting was refused
   #[error("replica pool unavailable: {0}")]
   Unavailable(String),

   /// No connection became free within the bounded wait
   #[error("timed out after {0:?} waiting for a replica connection")]
   Timeout(Duration),

   /// Any other failure. Never absorbed by the router.
   #[error(transparent)]
   Other(E),
}

impl<E> CheckoutError<E> {
   /// Whether the router may quietly fall back to the primary connection.
   ///
   /// Timeouts count as a kind of unavailability.
   pub fn is_unavailable(&self) -> bool {
      matches!(self, CheckoutError::Unavailable(_) | CheckoutError::Timeout(_))
   }
}

/// Pool of replica connections.
///
/// Pools do their own internal locking; the router only ever holds a checked-out connection for
/// the duration of one statement.
pub trait ReplicaPool: Send + Sync {
   type Connection: Connection;

   /// Take a connection, waiting at most `timeout`.
   fn checkout(
      &self,
      timeout: Duration,
   ) -> impl Future<
      Output = Result<Self::Connection, CheckoutError<<Self::Connection as Connection>::Error>>,
   > + Send;

   /// Give a connection back.
   fn checkin(&self, connection: Self::Connection);
}
