#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::Value;
use sqlx_replica_router::{
   BASE_OWNER, CheckoutError, Connection, ConnectionHandler, ProxyConfig, ReplicaPool, Role,
   ReplicaReader, RoutingProxy, WriteRecency, is_write_statement,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

pub const PRIMARY: &str = "primary";
pub const REPLICA: &str = "replica";

#[derive(Error, Debug, PartialEq)]
pub enum MockError {
   #[error("attempt to write a readonly database")]
   ReadOnly,
   #[error("near \"{0}\": syntax error")]
   Syntax(String),
   #[error("replica pool is broken")]
   Broken,
}

/// One statement as seen by a mock connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
   pub target: String,
   pub method: &'static str,
   pub sql: String,
}

pub type Journal = Arc<Mutex<Vec<Executed>>>;

/// Connection that records every statement into a shared journal.
///
/// Replica connections reject writes the way a read-only database would. Statements containing
/// `slow_query` sleep for a minute first, and statements containing `bogus` fail to parse.
pub struct MockConnection {
   target: String,
   read_only: bool,
   in_transaction: bool,
   journal: Journal,
}

impl MockConnection {
   pub fn primary(journal: &Journal) -> Self {
      Self::new(PRIMARY, false, journal)
   }

   pub fn replica(journal: &Journal) -> Self {
      Self::new(REPLICA, true, journal)
   }

   pub fn new(target: &str, read_only: bool, journal: &Journal) -> Self {
      Self {
         target: target.to_string(),
         read_only,
         in_transaction: false,
         journal: Arc::clone(journal),
      }
   }

   async fn run(&mut self, method: &'static str, sql: &str) -> Result<Executed, MockError> {
      if sql.contains("slow_query") {
         tokio::time::sleep(Duration::from_secs(60)).await;
      }
      if sql.contains("bogus") {
         return Err(MockError::Syntax("bogus".to_string()));
      }
      if self.read_only && is_write_statement(sql) {
         return Err(MockError::ReadOnly);
      }

      let keyword = sql.trim_start().to_ascii_uppercase();
      if keyword.starts_with("BEGIN") {
         self.in_transaction = true;
      } else if keyword.starts_with("COMMIT") || keyword.starts_with("ROLLBACK") {
         self.in_transaction = false;
      }

      let executed = Executed {
         target: self.target.clone(),
         method,
         sql: sql.to_string(),
      };
      self.journal.lock().push(executed.clone());
      Ok(executed)
   }
}

impl Connection for MockConnection {
   type Output = Executed;
   type Bind = Value;
   type Error = MockError;

   async fn execute(&mut self, sql: &str, _binds: &[Value]) -> Result<Executed, MockError> {
      self.run("execute", sql).await
   }

   async fn exec_query(&mut self, sql: &str, _binds: &[Value]) -> Result<Executed, MockError> {
      self.run("exec_query", sql).await
   }

   async fn exec_no_cache(&mut self, sql: &str, _binds: &[Value]) -> Result<Executed, MockError> {
      self.run("exec_no_cache", sql).await
   }

   async fn exec_cache(&mut self, sql: &str, _binds: &[Value]) -> Result<Executed, MockError> {
      self.run("exec_cache", sql).await
   }

   async fn in_transaction(&mut self) -> Result<bool, MockError> {
      Ok(self.in_transaction)
   }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
   Ready,
   /// Database missing or connection refused
   Unavailable,
   /// Reports its own wait timeout
   Exhausted,
   /// Never hands out a connection
   Hang,
   /// Fails with an error the router must not absorb
   Broken,
}

pub struct MockPool {
   target: String,
   mode: Mutex<PoolMode>,
   journal: Journal,
   checkouts: AtomicUsize,
   checkins: AtomicUsize,
}

impl MockPool {
   pub fn new(target: &str, journal: &Journal) -> Self {
      Self {
         target: target.to_string(),
         mode: Mutex::new(PoolMode::Ready),
         journal: Arc::clone(journal),
         checkouts: AtomicUsize::new(0),
         checkins: AtomicUsize::new(0),
      }
   }

   pub fn set_mode(&self, mode: PoolMode) {
      *self.mode.lock() = mode;
   }

   pub fn checkouts(&self) -> usize {
      self.checkouts.load(Ordering::SeqCst)
   }

   pub fn checkins(&self) -> usize {
      self.checkins.load(Ordering::SeqCst)
   }
}

impl ReplicaPool for MockPool {
   type Connection = MockConnection;

   async fn checkout(
      &self,
      timeout: Duration,
   ) -> Result<MockConnection, CheckoutError<MockError>> {
      let mode = *self.mode.lock();
      match mode {
         PoolMode::Ready => {
            self.checkouts.fetch_add(1, Ordering::SeqCst);
            Ok(MockConnection::new(&self.target, true, &self.journal))
         }
         PoolMode::Unavailable => Err(CheckoutError::Unavailable(
            "unable to open database file".to_string(),
         )),
         PoolMode::Exhausted => Err(CheckoutError::Timeout(timeout)),
         PoolMode::Hang => std::future::pending().await,
         PoolMode::Broken => Err(CheckoutError::Other(MockError::Broken)),
      }
   }

   fn checkin(&self, _connection: MockConnection) {
      self.checkins.fetch_add(1, Ordering::SeqCst);
   }
}

/// A primary connection journal plus one replica pool registered for the base owner.
pub struct Fixture {
   pub journal: Journal,
   pub pool: Arc<MockPool>,
   pub handler: Arc<ConnectionHandler<MockPool>>,
   pub config: Arc<ProxyConfig>,
}

impl Fixture {
   pub fn new() -> Self {
      let journal = Journal::default();
      let pool = Arc::new(MockPool::new(REPLICA, &journal));
      let handler = Arc::new(ConnectionHandler::new());
      handler.establish(BASE_OWNER, Role::reading(), Arc::clone(&pool));

      Self {
         journal,
         pool,
         handler,
         config: Arc::new(ProxyConfig::default()),
      }
   }

   pub fn proxy(&self) -> RoutingProxy<MockPool> {
      RoutingProxy::new(
         MockConnection::primary(&self.journal),
         Arc::clone(&self.handler),
         Arc::clone(&self.config),
      )
   }

   /// A reader and a proxy sharing one write tracker.
   pub fn reader_and_proxy(&self) -> (ReplicaReader<MockPool>, RoutingProxy<MockPool>) {
      let recency = Arc::new(WriteRecency::new(self.config.proxy_delay()));
      let reader = ReplicaReader::new(
         Arc::clone(&self.handler),
         Arc::clone(&recency),
         Arc::clone(&self.config),
      );
      (reader, self.proxy().with_write_recency(recency))
   }

   /// Targets that ran statements, in order.
   pub fn targets(&self) -> Vec<String> {
      self
         .journal
         .lock()
         .iter()
         .map(|executed| executed.target.clone())
         .collect()
   }

   pub fn clear(&self) {
      self.journal.lock().clear();
   }

   pub fn assert_balanced(&self) {
      assert_eq!(
         self.pool.checkouts(),
         self.pool.checkins(),
         "every checked-out replica connection must be checked back in"
      );
   }
}
