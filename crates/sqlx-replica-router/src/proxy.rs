//! Routing proxy wrapping one physical primary connection

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::checkout::ReplicaGuard;
use crate::classifier::{StatementClass, classify, is_write_statement};
use crate::config::ProxyConfig;
use crate::handler::{BASE_OWNER, ConnectionHandler};
use crate::pool::{CheckoutError, Connection, ReplicaPool};
use crate::recency::WriteRecency;
use crate::resolver::{Capabilities, PrimarySignals, RoleResolver};
use crate::roles::{Role, RoleContext, TaskRoleContext};

pub(crate) type Conn<P> = <P as ReplicaPool>::Connection;
pub(crate) type Output<P> = <Conn<P> as Connection>::Output;
pub(crate) type Bind<P> = <Conn<P> as Connection>::Bind;
pub(crate) type ConnError<P> = <Conn<P> as Connection>::Error;

/// Anything that can be turned into SQL text for classification.
///
/// Implemented for plain strings and for `sqlx::QueryBuilder`.
pub trait SqlText: Sync {
   fn sql_text(&self) -> Cow<'_, str>;
}

impl SqlText for str {
   fn sql_text(&self) -> Cow<'_, str> {
      Cow::Borrowed(self)
   }
}

impl SqlText for String {
   fn sql_text(&self) -> Cow<'_, str> {
      Cow::Borrowed(self.as_str())
   }
}

impl SqlText for Cow<'_, str> {
   fn sql_text(&self) -> Cow<'_, str> {
      Cow::Borrowed(self.as_ref())
   }
}

impl<DB: sqlx::Database> SqlText for sqlx::QueryBuilder<'_, DB>
where
   Self: Sync,
{
   fn sql_text(&self) -> Cow<'_, str> {
      Cow::Borrowed(self.sql())
   }
}

/// The connection operations the proxy intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HijackedMethod {
   Execute,
   ExecQuery,
   ExecNoCache,
   ExecCache,
}

impl HijackedMethod {
   pub const ALL: [HijackedMethod; 4] = [
      HijackedMethod::Execute,
      HijackedMethod::ExecQuery,
      HijackedMethod::ExecNoCache,
      HijackedMethod::ExecCache,
   ];

   pub fn name(self) -> &'static str {
      match self {
         HijackedMethod::Execute => "execute",
         HijackedMethod::ExecQuery => "exec_query",
         HijackedMethod::ExecNoCache => "exec_no_cache",
         HijackedMethod::ExecCache => "exec_cache",
      }
   }

   /// Run this operation directly on `conn`, with no routing.
   pub async fn invoke<C: Connection>(
      self,
      conn: &mut C,
      sql: &str,
      binds: &[C::Bind],
   ) -> Result<C::Output, C::Error> {
      match self {
         HijackedMethod::Execute => conn.execute(sql, binds).await,
         HijackedMethod::ExecQuery => conn.exec_query(sql, binds).await,
         HijackedMethod::ExecNoCache => conn.exec_no_cache(sql, binds).await,
         HijackedMethod::ExecCache => conn.exec_cache(sql, binds).await,
      }
   }
}

/// Wraps a primary connection and routes each statement to the primary or a replica.
///
/// Every call classifies the statement, resolves the roles it must run against, and runs it on
/// the wrapped primary (writing role, or no usable replica) or on a connection checked out of the
/// replica pool (reading role). Successful writes on the primary open the staleness window during
/// which reads stay on the primary.
///
/// The proxy implements [`Connection`] itself, so it can stand in wherever the wrapped connection
/// type is expected. [`unproxied`](Self::unproxied) reaches the primary directly.
///
/// # Example
///
/// ```no_run
/// # use sqlx_replica_router::{Connection, ConnectionHandler, ProxyConfig, ReplicaPool, RoutingProxy};
/// # use std::sync::Arc;
/// # async fn example<P: ReplicaPool>(
/// #    primary: P::Connection,
/// #    handler: Arc<ConnectionHandler<P>>,
/// # ) -> Result<(), <P::Connection as Connection>::Error> {
/// let mut proxy = RoutingProxy::new(primary, handler, Arc::new(ProxyConfig::default()));
///
/// // Served by a replica
/// proxy.exec_query("SELECT * FROM users", &[]).await?;
///
/// // Runs on the primary, then reads stay on the primary for `proxy_delay`
/// proxy.execute("INSERT INTO users (name) VALUES ('Alice')", &[]).await?;
/// # Ok(())
/// # }
/// ```
pub struct RoutingProxy<P: ReplicaPool> {
   primary: P::Connection,
   owner: String,
   handler: Arc<ConnectionHandler<P>>,
   roles: Arc<dyn RoleContext>,
   recency: Arc<WriteRecency>,
   config: Arc<ProxyConfig>,
   capabilities: Capabilities,
}

impl<P: ReplicaPool> RoutingProxy<P> {
   /// Wrap `primary`, looking up replica pools in `handler`.
   ///
   /// Defaults: owner [`BASE_OWNER`], a [`TaskRoleContext`], a fresh write tracker using the
   /// config's `proxy_delay`, and default [`Capabilities`].
   pub fn new(
      primary: P::Connection,
      handler: Arc<ConnectionHandler<P>>,
      config: Arc<ProxyConfig>,
   ) -> Self {
      Self {
         primary,
         owner: BASE_OWNER.to_string(),
         handler,
         roles: Arc::new(TaskRoleContext::default()),
         recency: Arc::new(WriteRecency::new(config.proxy_delay())),
         config,
         capabilities: Capabilities::default(),
      }
   }

   /// Prefer replica pools registered for `owner`.
   pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
      self.owner = owner.into();
      self
   }

   pub fn with_role_context(mut self, roles: Arc<dyn RoleContext>) -> Self {
      self.roles = roles;
      self
   }

   /// Share a write tracker, typically with every proxy over the same logical primary.
   pub fn with_write_recency(mut self, recency: Arc<WriteRecency>) -> Self {
      self.recency = recency;
      self
   }

   pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
      self.capabilities = capabilities;
      self
   }

   /// The wrapped primary connection, bypassing all routing.
   pub fn unproxied(&mut self) -> &mut P::Connection {
      &mut self.primary
   }

   /// Unwrap the proxy, returning the primary connection.
   pub fn into_inner(self) -> P::Connection {
      self.primary
   }

   pub fn owner(&self) -> &str {
      &self.owner
   }

   pub fn write_recency(&self) -> &Arc<WriteRecency> {
      &self.recency
   }

   pub fn config(&self) -> &ProxyConfig {
      &self.config
   }

   pub async fn execute<Q: SqlText + ?Sized>(
      &mut self,
      query: &Q,
      binds: &[Bind<P>],
   ) -> Result<Output<P>, ConnError<P>> {
      self
         .dispatch(HijackedMethod::Execute, &query.sql_text(), binds)
         .await
   }

   pub async fn exec_query<Q: SqlText + ?Sized>(
      &mut self,
      query: &Q,
      binds: &[Bind<P>],
   ) -> Result<Output<P>, ConnError<P>> {
      self
         .dispatch(HijackedMethod::ExecQuery, &query.sql_text(), binds)
         .await
   }

   pub async fn exec_no_cache<Q: SqlText + ?Sized>(
      &mut self,
      query: &Q,
      binds: &[Bind<P>],
   ) -> Result<Output<P>, ConnError<P>> {
      self
         .dispatch(HijackedMethod::ExecNoCache, &query.sql_text(), binds)
         .await
   }

   pub async fn exec_cache<Q: SqlText + ?Sized>(
      &mut self,
      query: &Q,
      binds: &[Bind<P>],
   ) -> Result<Output<P>, ConnError<P>> {
      self
         .dispatch(HijackedMethod::ExecCache, &query.sql_text(), binds)
         .await
   }

   /// Run `method` with routing; the result of the last resolved role is returned.
   pub async fn dispatch(
      &mut self,
      method: HijackedMethod,
      sql: &str,
      binds: &[Bind<P>],
   ) -> Result<Output<P>, ConnError<P>> {
      if !self.capabilities.is_hijacked(method) {
         return method.invoke(&mut self.primary, sql, binds).await;
      }

      let roles = self.resolve_roles(sql).await?;
      trace!(method = method.name(), ?roles, "Resolved roles for statement");

      let Some((last, earlier)) = roles.split_last() else {
         return method.invoke(&mut self.primary, sql, binds).await;
      };

      for role in earlier {
         self.with_connection(role, method, sql, binds).await?;
      }
      self.with_connection(last, method, sql, binds).await
   }

   /// Ordered roles `sql` would run against right now. Never empty.
   pub async fn resolve_roles(&mut self, sql: &str) -> Result<Vec<Role>, ConnError<P>> {
      let resolver = RoleResolver::new(self.roles.as_ref(), self.capabilities);
      let pinned = resolver.pinned_role();
      let class = classify(sql);

      let signals = match class {
         _ if pinned.is_some() => PrimarySignals::default(),
         StatementClass::Broadcast | StatementClass::BroadcastExcluded => PrimarySignals::default(),
         _ => {
            let recent_write = self.recency.is_recent_write();
            let in_transaction = !recent_write
               && !class.requires_primary()
               && self.primary.in_transaction().await?;
            PrimarySignals {
               recent_write,
               in_transaction,
            }
         }
      };

      Ok(resolver.resolve(class, pinned, signals))
   }

   /// Run `method` on the connection serving `role`.
   ///
   /// The writing role always uses the wrapped primary. Other roles check a connection out of
   /// the replica pool and check it back in afterwards; when no pool is registered, or the pool
   /// reports itself unavailable or times out, the primary is used instead. Execution errors are
   /// returned untouched. A write statement that ran on the primary records a write.
   pub async fn with_connection(
      &mut self,
      role: &Role,
      method: HijackedMethod,
      sql: &str,
      binds: &[Bind<P>],
   ) -> Result<Output<P>, ConnError<P>> {
      if role != self.roles.writing_role()
         && let Some(mut replica) =
            checkout_replica(&self.handler, &self.owner, role, &self.config).await?
      {
         debug!(
            instance = %self.config.replica_log_prefix,
            %role,
            method = method.name(),
            sql,
            "Executing statement"
         );
         return method.invoke(&mut *replica, sql, binds).await;
      }

      debug!(
         instance = %self.config.primary_log_prefix,
         %role,
         method = method.name(),
         sql,
         "Executing statement"
      );
      let output = method.invoke(&mut self.primary, sql, binds).await?;

      if is_write_statement(sql) {
         self.recency.record_write();
      }

      Ok(output)
   }
}

/// Check out a replica connection for `role`, or `None` when the primary should be used.
pub(crate) async fn checkout_replica<P: ReplicaPool>(
   handler: &ConnectionHandler<P>,
   owner: &str,
   role: &Role,
   config: &ProxyConfig,
) -> Result<Option<ReplicaGuard<P>>, ConnError<P>> {
   let Some(pool) = handler.retrieve_pool(owner, role) else {
      trace!(owner, %role, "No replica pool registered, using primary");
      return Ok(None);
   };

   let timeout = config.checkout_timeout();
   let checkout = tokio::time::timeout(timeout, pool.checkout(timeout))
      .await
      .unwrap_or(Err(CheckoutError::Timeout(timeout)));

   match checkout {
      Ok(conn) => Ok(Some(ReplicaGuard::new(pool, conn))),
      Err(CheckoutError::Other(e)) => Err(e),
      Err(e) => {
         warn!(owner, %role, error = %e, "Replica unavailable, falling back to primary");
         Ok(None)
      }
   }
}

impl<P: ReplicaPool> Connection for RoutingProxy<P> {
   type Output = Output<P>;
   type Bind = Bind<P>;
   type Error = ConnError<P>;

   async fn execute(&mut self, sql: &str, binds: &[Self::Bind]) -> Result<Self::Output, Self::Error> {
      self.dispatch(HijackedMethod::Execute, sql, binds).await
   }

   async fn exec_query(
      &mut self,
      sql: &str,
      binds: &[Self::Bind],
   ) -> Result<Self::Output, Self::Error> {
      self.dispatch(HijackedMethod::ExecQuery, sql, binds).await
   }

   async fn exec_no_cache(
      &mut self,
      sql: &str,
      binds: &[Self::Bind],
   ) -> Result<Self::Output, Self::Error> {
      self.dispatch(HijackedMethod::ExecNoCache, sql, binds).await
   }

   async fn exec_cache(
      &mut self,
      sql: &str,
      binds: &[Self::Bind],
   ) -> Result<Self::Output, Self::Error> {
      self.dispatch(HijackedMethod::ExecCache, sql, binds).await
   }

   async fn in_transaction(&mut self) -> Result<bool, Self::Error> {
      self.primary.in_transaction().await
   }
}
