//! Roles and the caller-pinned role stack

use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Default identifier of the role served by replicas.
pub const READING: &str = "reading";

/// Default identifier of the role served by the primary.
pub const WRITING: &str = "writing";

/// Logical intent tag used to pick a pool, such as `"reading"` or `"writing"`.
///
/// Roles are opaque: two roles are equal when their names are equal. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role(Arc<str>);

impl Role {
   pub fn new(name: impl AsRef<str>) -> Self {
      Self(Arc::from(name.as_ref()))
   }

   pub fn reading() -> Self {
      Self::new(READING)
   }

   pub fn writing() -> Self {
      Self::new(WRITING)
   }

   pub fn as_str(&self) -> &str {
      &self.0
   }
}

impl fmt::Display for Role {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(&self.0)
   }
}

impl From<&str> for Role {
   fn from(name: &str) -> Self {
      Self::new(name)
   }
}

/// Source of role identities and of the caller's explicitly pinned role.
///
/// The transaction half of the host's context lives on [`Connection::in_transaction`], since
/// only the connection knows whether it has a transaction open.
///
/// [`Connection::in_transaction`]: crate::Connection::in_transaction
pub trait RoleContext: Send + Sync {
   /// Role whose statements may be served by a replica
   fn reading_role(&self) -> &Role;

   /// Role whose statements must run on the primary
   fn writing_role(&self) -> &Role;

   /// Role at the top of the caller's pin stack, if any
   fn pinned_role(&self) -> Option<Role>;
}

tokio::task_local! {
   static ROLE_STACK: Vec<Role>;
}

/// [`RoleContext`] backed by a task-local stack of pinned roles.
///
/// Roles are pinned with [`connected_to`], which scopes a future. Each task sees only the pins of
/// the futures it is running inside, so concurrent tasks never observe each other's pins.
#[derive(Debug, Clone)]
pub struct TaskRoleContext {
   reading: Role,
   writing: Role,
}

impl TaskRoleContext {
   /// Use custom role identifiers.
   pub fn new(reading: Role, writing: Role) -> Self {
      Self { reading, writing }
   }
}

impl Default for TaskRoleContext {
   fn default() -> Self {
      Self::new(Role::reading(), Role::writing())
   }
}

impl RoleContext for TaskRoleContext {
   fn reading_role(&self) -> &Role {
      &self.reading
   }

   fn writing_role(&self) -> &Role {
      &self.writing
   }

   fn pinned_role(&self) -> Option<Role> {
      current_pinned_role()
   }
}

/// Run `future` with `role` pinned on top of the current task's role stack.
///
/// Pins nest: the innermost pin wins, and the outer pin is visible again once the inner future
/// completes.
///
/// # Example
///
/// ```
/// use sqlx_replica_router::{Role, connected_to, current_pinned_role};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pinned = connected_to(Role::writing(), async { current_pinned_role() }).await;
/// assert_eq!(pinned, Some(Role::writing()));
/// assert_eq!(current_pinned_role(), None);
/// # }
/// ```
pub async fn connected_to<F>(role: Role, future: F) -> F::Output
where
   F: Future,
{
   let mut stack = ROLE_STACK.try_with(Clone::clone).unwrap_or_default();
   stack.push(role);
   ROLE_STACK.scope(stack, future).await
}

/// Role at the top of the current task's pin stack.
pub fn current_pinned_role() -> Option<Role> {
   ROLE_STACK
      .try_with(|stack| stack.last().cloned())
      .ok()
      .flatten()
}

#[cfg(test)]
mod tests {
   use super::*;

   #[tokio::test]
   async fn test_no_pin_outside_scope() {
      assert_eq!(current_pinned_role(), None);
      assert_eq!(TaskRoleContext::default().pinned_role(), None);
   }

   #[tokio::test]
   async fn test_nested_pins() {
      connected_to(Role::reading(), async {
         assert_eq!(current_pinned_role(), Some(Role::reading()));

         connected_to(Role::writing(), async {
            assert_eq!(current_pinned_role(), Some(Role::writing()));
         })
         .await;

         assert_eq!(current_pinned_role(), Some(Role::reading()));
      })
      .await;

      assert_eq!(current_pinned_role(), None);
   }

   #[tokio::test]
   async fn test_pins_do_not_leak_across_tasks() {
      let pinned = connected_to(Role::writing(), async {
         tokio::spawn(async { current_pinned_role() }).await.unwrap()
      })
      .await;

      assert_eq!(pinned, None);
   }

   #[test]
   fn test_custom_roles() {
      let context = TaskRoleContext::new(Role::new("replica"), Role::new("primary"));
      assert_eq!(context.reading_role().as_str(), "replica");
      assert_eq!(context.writing_role().to_string(), "primary");
      assert_eq!(Role::from("reading"), Role::reading());
   }
}
