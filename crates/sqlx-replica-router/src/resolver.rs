//! Decides which roles a statement runs against

use crate::classifier::StatementClass;
use crate::proxy::HijackedMethod;
use crate::roles::{Role, RoleContext};

/// Host-framework behaviour switches, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
   /// Route the prepared-statement variants (`exec_no_cache`, `exec_cache`) too.
   ///
   /// When false those calls always go to the primary unproxied.
   ///
   /// Default: true
   pub hijack_statement_cache_variants: bool,

   /// Let a role pinned with `connected_to` override statement classification.
   ///
   /// Default: true
   pub honor_pinned_role: bool,
}

impl Default for Capabilities {
   fn default() -> Self {
      Self {
         hijack_statement_cache_variants: true,
         honor_pinned_role: true,
      }
   }
}

impl Capabilities {
   /// Whether calls to `method` go through routing at all.
   pub fn is_hijacked(&self, method: HijackedMethod) -> bool {
      match method {
         HijackedMethod::Execute | HijackedMethod::ExecQuery => true,
         HijackedMethod::ExecNoCache | HijackedMethod::ExecCache => {
            self.hijack_statement_cache_variants
         }
      }
   }
}

/// Conditions that pin a statement to the primary regardless of how it reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimarySignals {
   /// A write landed on the primary within the staleness window
   pub recent_write: bool,
   /// The primary connection has a transaction open
   pub in_transaction: bool,
}

/// Turns a classified statement into the ordered list of roles to execute it against.
pub struct RoleResolver<'a> {
   roles: &'a dyn RoleContext,
   capabilities: Capabilities,
}

impl<'a> RoleResolver<'a> {
   pub fn new(roles: &'a dyn RoleContext, capabilities: Capabilities) -> Self {
      Self {
         roles,
         capabilities,
      }
   }

   /// The pinned role, when it is one of the two known roles and pins are honored.
   pub fn pinned_role(&self) -> Option<Role> {
      if !self.capabilities.honor_pinned_role {
         return None;
      }

      self
         .roles
         .pinned_role()
         .filter(|role| role == self.roles.reading_role() || role == self.roles.writing_role())
   }

   /// Resolve the roles for a statement. The result is never empty.
   ///
   /// - An explicit pin wins outright.
   /// - `SET` goes to reading then writing; the writing result is the one returned.
   /// - `SET LOCAL` stays on reading only.
   /// - Otherwise a recent write, an open transaction, or a primary-only statement selects
   ///   writing, and everything else selects reading.
   pub fn resolve(
      &self,
      class: StatementClass,
      pinned: Option<Role>,
      signals: PrimarySignals,
   ) -> Vec<Role> {
      if let Some(role) = pinned {
         return vec![role];
      }

      let reading = self.roles.reading_role().clone();
      let writing = self.roles.writing_role().clone();

      match class {
         StatementClass::Broadcast => vec![reading, writing],
         StatementClass::BroadcastExcluded => vec![reading],
         _ if signals.recent_write || signals.in_transaction || class.requires_primary() => {
            vec![writing]
         }
         _ => vec![reading],
      }
   }
}
