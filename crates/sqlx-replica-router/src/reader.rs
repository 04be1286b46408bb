//! Replica reads that never touch the primary connection

use std::sync::Arc;

use tracing::{debug, trace};

use crate::classifier::classify;
use crate::config::ProxyConfig;
use crate::handler::{BASE_OWNER, ConnectionHandler};
use crate::pool::ReplicaPool;
use crate::proxy::{Bind, ConnError, HijackedMethod, Output, SqlText, checkout_replica};
use crate::recency::WriteRecency;
use crate::resolver::{Capabilities, PrimarySignals, RoleResolver};
use crate::roles::{RoleContext, TaskRoleContext};

/// Serves statements that resolve to the reading role alone, without a primary connection.
///
/// A [`RoutingProxy`](crate::RoutingProxy) owns its primary for its whole lifetime, so callers
/// that acquire one per statement serialize every read on the primary. A reader shares the
/// proxy's routing state (pool registry, write tracker, role context) and answers the common
/// case, a plain read with no recent write, straight from a replica. Everything else yields
/// `None` and the caller goes through a proxy.
///
/// A reader has no connection of its own, so it never has a transaction open. Work that needs
/// to read its own uncommitted writes must hold a proxy.
///
/// # Example
///
/// ```no_run
/// # use sqlx_replica_router::{Connection, HijackedMethod, ReplicaPool, ReplicaReader};
/// # async fn example<P: ReplicaPool>(
/// #    reader: ReplicaReader<P>,
/// # ) -> Result<(), <P::Connection as Connection>::Error> {
/// match reader.try_read(HijackedMethod::ExecQuery, "SELECT * FROM users", &[]).await? {
///    Some(_rows) => {}
///    None => { /* acquire the primary and run it through a RoutingProxy */ }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ReplicaReader<P: ReplicaPool> {
   owner: String,
   handler: Arc<ConnectionHandler<P>>,
   roles: Arc<dyn RoleContext>,
   recency: Arc<WriteRecency>,
   config: Arc<ProxyConfig>,
   capabilities: Capabilities,
}

impl<P: ReplicaPool> Clone for ReplicaReader<P> {
   fn clone(&self) -> Self {
      Self {
         owner: self.owner.clone(),
         handler: Arc::clone(&self.handler),
         roles: Arc::clone(&self.roles),
         recency: Arc::clone(&self.recency),
         config: Arc::clone(&self.config),
         capabilities: self.capabilities,
      }
   }
}

impl<P: ReplicaPool> ReplicaReader<P> {
   /// Read through pools in `handler`, staying off replicas while `recency` reports a recent
   /// write.
   pub fn new(
      handler: Arc<ConnectionHandler<P>>,
      recency: Arc<WriteRecency>,
      config: Arc<ProxyConfig>,
   ) -> Self {
      Self {
         owner: BASE_OWNER.to_string(),
         handler,
         roles: Arc::new(TaskRoleContext::default()),
         recency,
         config,
         capabilities: Capabilities::default(),
      }
   }

   pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
      self.owner = owner.into();
      self
   }

   pub fn with_role_context(mut self, roles: Arc<dyn RoleContext>) -> Self {
      self.roles = roles;
      self
   }

   pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
      self.capabilities = capabilities;
      self
   }

   /// Run `method` on a replica if the statement routes to the reading role alone.
   ///
   /// Returns `Ok(None)` without running anything when the statement needs the primary: a
   /// write or locking read, a recent write, a writing pin, a broadcast, a method that is not
   /// routed, or no usable replica pool. Execution errors on the replica are returned as-is.
   pub async fn try_read<Q: SqlText + ?Sized>(
      &self,
      method: HijackedMethod,
      query: &Q,
      binds: &[Bind<P>],
   ) -> Result<Option<Output<P>>, ConnError<P>> {
      if !self.capabilities.is_hijacked(method) {
         return Ok(None);
      }

      let sql = query.sql_text();
      let resolver = RoleResolver::new(self.roles.as_ref(), self.capabilities);
      let pinned = resolver.pinned_role();
      let signals = PrimarySignals {
         recent_write: pinned.is_none() && self.recency.is_recent_write(),
         in_transaction: false,
      };
      let roles = resolver.resolve(classify(&sql), pinned, signals);

      let [role] = roles.as_slice() else {
         return Ok(None);
      };
      if role == self.roles.writing_role() {
         return Ok(None);
      }

      let Some(mut replica) = checkout_replica(&self.handler, &self.owner, role, &self.config).await?
      else {
         return Ok(None);
      };

      trace!(method = method.name(), %role, "Serving statement without the primary");
      debug!(
         instance = %self.config.replica_log_prefix,
         %role,
         method = method.name(),
         sql = %sql,
         "Executing statement"
      );
      method.invoke(&mut *replica, &sql, binds).await.map(Some)
   }
}
