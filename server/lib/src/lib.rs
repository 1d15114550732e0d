//! The dseecompat access control library. This implements the evaluation of DSEE
//! compatible access control instructions (ACIs) on behalf of a hosting directory
//! server: decoding ACI values, caching them along the directory tree, and deciding
//! whether an identity may perform an operation on an entry.

// #![allow(deprecated)]
#![recursion_limit = "512"]
#![warn(unused_extern_crates)]
// Enable some groups of clippy lints.
#![deny(clippy::suspicious)]
#![deny(clippy::perf)]
// Specific lints to enforce.
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::manual_let_else)]
#![allow(clippy::unreachable)]

#[macro_use]
extern crate tracing;
#[macro_use]
extern crate lazy_static;

// This has to be before 'access' so the import order works
#[macro_use]
pub mod macros;

pub mod access;
pub mod config;
pub mod directory;
pub mod dn;
pub mod entry;
pub mod event;
pub mod filter;
pub mod identity;
pub mod ldapurl;
pub mod modify;
pub mod schema;
#[cfg(test)]
pub(crate) mod testkit;

/// A prelude of imports that should be imported by all other modules to
/// help make imports cleaner.
pub mod prelude {
    pub use dseecompat_proto::constants::*;
    pub use dseecompat_proto::error::{AciError, OperationError};
    pub use sketching::{
        admin_debug, admin_error, admin_info, admin_warn, filter_error, filter_info, filter_trace,
        filter_warn, perf_trace, request_error, request_info, request_trace, request_warn,
        security_access, security_critical, security_debug, security_error, security_info,
        tagged_event, EventTag,
    };
    pub use smartstring::alias::String as AttrString;
    pub use std::str::FromStr;
    pub use std::sync::Arc;

    pub use crate::access::{
        aci::Aci, container::AciContainer, container::EvalReason, list::AciList,
        list::AciListTransaction, listener::AciListenerManager, rights::AccessType,
        rights::Rights, AciHandler, SearchAccess,
    };
    pub use crate::config::AciHandlerConfig;
    pub use crate::directory::{GroupMembership, InternalSearch};
    pub use crate::dn::{Ava, Dn, Rdn};
    pub use crate::entry::Entry;
    pub use crate::event::{GetEffectiveRights, OperationContext, OperationKind};
    pub use crate::filter::{f_and, f_eq, f_not, f_or, f_pres, f_sub, Filter, FilterComp, FC};
    pub use crate::identity::{AuthType, ConnectionInfo, Identity, Privilege};
    pub use crate::ldapurl::{LdapUrl, SearchScope};
    pub use crate::modify::{m_add, m_delete, m_increment, m_purge, m_replace, Modify, ModifyList};
    pub use crate::schema::Schema;
}
