//! Guard for a checked-out replica connection

use crate::pool::ReplicaPool;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// RAII guard for a connection checked out of a replica pool
///
/// The connection is checked back in exactly once when the guard drops, on every exit path:
/// normal return, `?` propagation, panic, or the enclosing future being dropped mid-statement.
///
/// The guard derefs to the pool's connection type.
#[must_use = "if unused, the replica connection is immediately checked back in"]
pub struct ReplicaGuard<P: ReplicaPool> {
   pool: Arc<P>,
   conn: Option<P::Connection>,
}

impl<P: ReplicaPool> ReplicaGuard<P> {
   pub(crate) fn new(pool: Arc<P>, conn: P::Connection) -> Self {
      Self {
         pool,
         conn: Some(conn),
      }
   }
}

impl<P: ReplicaPool> Deref for ReplicaGuard<P> {
   type Target = P::Connection;

   fn deref(&self) -> &Self::Target {
      self.conn.as_ref().expect("connection already checked in")
   }
}

impl<P: ReplicaPool> DerefMut for ReplicaGuard<P> {
   fn deref_mut(&mut self) -> &mut Self::Target {
      self.conn.as_mut().expect("connection already checked in")
   }
}

impl<P: ReplicaPool> Drop for ReplicaGuard<P> {
   fn drop(&mut self) {
      if let Some(conn) = self.conn.take() {
         self.pool.checkin(conn);
      }
   }
}
