//! Registry of connection pools keyed by owner and role

use crate::roles::Role;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Owner name used for pools that serve every owner without a pool of its own.
pub const BASE_OWNER: &str = "Base";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
   owner: String,
   role: Role,
}

/// Holds the pools registered for each `(owner, role)` pair.
///
/// An owner is the logical group a connection belongs to (for example a set of models that live
/// in a separate database). Lookups prefer the owner's own pool and fall back to the pool
/// registered for [`BASE_OWNER`].
#[derive(Debug)]
pub struct ConnectionHandler<P> {
   pools: RwLock<HashMap<PoolKey, Arc<P>>>,
}

impl<P> Default for ConnectionHandler<P> {
   fn default() -> Self {
      Self {
         pools: RwLock::new(HashMap::new()),
      }
   }
}

impl<P> ConnectionHandler<P> {
   pub fn new() -> Self {
      Self::default()
   }

   /// Register `pool` for `owner` and `role`, returning any pool it replaces.
   pub fn establish(&self, owner: &str, role: Role, pool: Arc<P>) -> Option<Arc<P>> {
      debug!(owner, %role, "Registering connection pool");
      self.pools.write().insert(
         PoolKey {
            owner: owner.to_string(),
            role,
         },
         pool,
      )
   }

   /// Unregister the pool for `owner` and `role`.
   pub fn remove(&self, owner: &str, role: &Role) -> Option<Arc<P>> {
      self.pools.write().remove(&PoolKey {
         owner: owner.to_string(),
         role: role.clone(),
      })
   }

   /// The pool registered for exactly `owner` and `role`.
   pub fn specific_pool(&self, owner: &str, role: &Role) -> Option<Arc<P>> {
      self
         .pools
         .read()
         .get(&PoolKey {
            owner: owner.to_string(),
            role: role.clone(),
         })
         .cloned()
   }

   /// The owner's own pool, or the base owner's pool when it has none.
   pub fn retrieve_pool(&self, owner: &str, role: &Role) -> Option<Arc<P>> {
      self
         .specific_pool(owner, role)
         .or_else(|| self.specific_pool(BASE_OWNER, role))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_specific_pool_preferred() {
      let handler = ConnectionHandler::new();
      handler.establish(BASE_OWNER, Role::reading(), Arc::new("base"));
      handler.establish("Analytics", Role::reading(), Arc::new("analytics"));

      let pool = handler.retrieve_pool("Analytics", &Role::reading()).unwrap();
      assert_eq!(*pool, "analytics");
   }

   #[test]
   fn test_falls_back_to_base_owner() {
      let handler = ConnectionHandler::new();
      handler.establish(BASE_OWNER, Role::reading(), Arc::new("base"));

      let pool = handler.retrieve_pool("Billing", &Role::reading()).unwrap();
      assert_eq!(*pool, "base");
      assert!(handler.specific_pool("Billing", &Role::reading()).is_none());
   }

   #[test]
   fn test_roles_are_separate() {
      let handler = ConnectionHandler::new();
      handler.establish(BASE_OWNER, Role::writing(), Arc::new("primary"));

      assert!(handler.retrieve_pool(BASE_OWNER, &Role::reading()).is_none());
   }

   #[test]
   fn test_establish_replaces_and_remove_unregisters() {
      let handler = ConnectionHandler::new();
      assert!(handler.establish(BASE_OWNER, Role::reading(), Arc::new(1)).is_none());
      let replaced = handler.establish(BASE_OWNER, Role::reading(), Arc::new(2));
      assert_eq!(replaced.as_deref(), Some(&1));

      assert_eq!(
         handler.remove(BASE_OWNER, &Role::reading()).as_deref(),
         Some(&2)
      );
      assert!(handler.retrieve_pool(BASE_OWNER, &Role::reading()).is_none());
   }
}
