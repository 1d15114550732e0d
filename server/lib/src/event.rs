//! The per-operation context the host passes into each access check.

use std::fmt;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Add,
    Bind,
    Compare,
    Delete,
    Extended,
    Modify,
    ModifyDn,
    Search,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Add => "add",
            OperationKind::Bind => "bind",
            OperationKind::Compare => "compare",
            OperationKind::Delete => "delete",
            OperationKind::Extended => "extended",
            OperationKind::Modify => "modify",
            OperationKind::ModifyDn => "modifydn",
            OperationKind::Search => "search",
        };
        f.write_str(s)
    }
}

/// A geteffectiverights control attached to a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetEffectiveRights {
    /// Evaluate for this DN instead of the client. `None` means the client.
    pub authz_dn: Option<Dn>,
    /// Extra attributes to report attribute level rights for, even when the entry
    /// does not hold them.
    pub attrs: Vec<AttrString>,
}

#[derive(Clone)]
pub struct OperationContext<'a> {
    pub kind: OperationKind,
    /// The identity the operation runs as. With proxied authorization this is the
    /// proxied-as identity.
    pub ident: &'a Identity,
    /// The identity that authenticated on the connection, when it differs from
    /// `ident`.
    pub orig_ident: Option<&'a Identity>,
    pub conn: &'a ConnectionInfo,
    pub directory: &'a dyn InternalSearch,
    pub groups: &'a dyn GroupMembership,
    pub ger: Option<GetEffectiveRights>,
}

impl<'a> OperationContext<'a> {
    pub fn new(
        kind: OperationKind,
        ident: &'a Identity,
        conn: &'a ConnectionInfo,
        directory: &'a dyn InternalSearch,
        groups: &'a dyn GroupMembership,
    ) -> Self {
        OperationContext {
            kind,
            ident,
            orig_ident: None,
            conn,
            directory,
            groups,
            ger: None,
        }
    }

    pub fn with_orig_ident(mut self, orig: &'a Identity) -> Self {
        self.orig_ident = Some(orig);
        self
    }

    pub fn with_ger(mut self, ger: GetEffectiveRights) -> Self {
        self.ger = Some(ger);
        self
    }

    /// The identity that originally authenticated.
    pub fn authenticated_ident(&self) -> &'a Identity {
        self.orig_ident.unwrap_or(self.ident)
    }
}
