//! The services the engine consumes from its host directory server. The engine
//! never owns data: it reads entries through [`InternalSearch`] and resolves
//! group membership through [`GroupMembership`]. Both run under the host's
//! internal, unrestricted identity.

use crate::prelude::*;

pub trait InternalSearch {
    /// Fetch a single entry by DN. `Ok(None)` means the entry does not exist.
    fn search_base(&self, dn: &Dn) -> Result<Option<Arc<Entry>>, OperationError>;

    /// Return every entry at or below `base` matching `filter`.
    fn search_subtree(
        &self,
        base: &Dn,
        filter: &Filter,
    ) -> Result<Vec<Arc<Entry>>, OperationError>;

    /// If `dn` is an alternate bind DN of a configured root user, return the
    /// root user's actual DN.
    fn actual_root_bind_dn(&self, _dn: &Dn) -> Option<Dn> {
        None
    }
}

pub trait GroupMembership {
    /// Is `member` a member of `group`, directly or through nesting. An error
    /// means membership could not be determined.
    fn is_member(&self, member: &Dn, group: &Dn) -> Result<bool, OperationError>;
}
