//! The evaluation container. One is built for each access check an operation
//! makes and carries everything the target matcher and bind rules look at: the
//! operation, the client, the resource entry, the rights being asked for and the
//! attribute (and value) currently under test.
//!
//! Bookkeeping produced while evaluating, the allow and deny candidate lists, the
//! ACI that decided and why, lives in [`EvalScratch`]. It is reset at the start of
//! every access check so that rights tested in turn on the same container, as
//! geteffectiverights does, never see each other's results.

use std::fmt;

use crate::prelude::*;

/// Why the last access check came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalReason {
    /// No ACI with a matching target granted the right.
    NoAllowAcis,
    /// Candidate allow ACIs existed but none of their bind rules matched.
    NoMatchedAllowsAcis,
    EvaluatedAllowAci,
    EvaluatedDenyAci,
    /// The client bypasses access control.
    SkipAci,
    #[default]
    NoReason,
}

impl fmt::Display for EvalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvalReason::NoAllowAcis => "no acis matched the resource",
            EvalReason::NoMatchedAllowsAcis => "no acis matched the subject",
            EvalReason::EvaluatedAllowAci => "evaluated allow",
            EvalReason::EvaluatedDenyAci => "evaluated deny",
            EvalReason::SkipAci => "skip aci",
            EvalReason::NoReason => "no reason",
        };
        f.write_str(s)
    }
}

bitflags::bitflags! {
    /// What the `targetattr` keywords of READ candidates looked like. Used by
    /// search to skip per attribute checks when only wildcards were seen.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct EvalAttrs: u8 {
        const FOUND_USER_ATTR_RULE = 0b0001;
        const FOUND_OP_ATTR_RULE =   0b0010;
        const USER_ATTR_STAR_MATCHED = 0b0100;
        const OP_ATTR_PLUS_MATCHED = 0b1000;
    }
}

/// Mutable state of a single access check.
#[derive(Debug, Clone, Default)]
pub struct EvalScratch {
    pub(crate) allow_list: Vec<Arc<Aci>>,
    pub(crate) deny_list: Vec<Arc<Aci>>,
    pub(crate) deciding_aci: Option<Arc<Aci>>,
    pub(crate) reason: EvalReason,
    /// A candidate without `targetattr` or `targattrfilters` matched on the first
    /// attribute, so the entry itself must be rechecked.
    pub(crate) entry_test_rule: bool,
    /// The current candidate matched through `targattrfilters`.
    pub(crate) targ_attr_filters_match: bool,
    /// Candidates with `targattrfilters` set aside during a geteffectiverights
    /// write check that has no value to test.
    pub(crate) targ_attr_filter_acis: Vec<Arc<Aci>>,
}

impl EvalScratch {
    pub fn reset(&mut self) {
        self.allow_list.clear();
        self.deny_list.clear();
        self.deciding_aci = None;
        self.reason = EvalReason::NoReason;
        self.entry_test_rule = false;
        self.targ_attr_filters_match = false;
        self.targ_attr_filter_acis.clear();
    }

    pub fn reason(&self) -> EvalReason {
        self.reason
    }

    pub fn deciding_aci(&self) -> Option<&Arc<Aci>> {
        self.deciding_aci.as_ref()
    }

    pub fn targ_attr_filter_acis(&self) -> &[Arc<Aci>] {
        &self.targ_attr_filter_acis
    }
}

pub struct AciContainer<'a> {
    op: &'a OperationContext<'a>,
    /// Who the rules are evaluated for. Normally the operation's identity, but
    /// geteffectiverights and proxy checks substitute another.
    ident: &'a Identity,
    resource: &'a Entry,
    schema: &'a Schema,
    rights: Rights,
    current_attr: Option<AttrString>,
    current_value: Option<String>,
    is_first_attr: bool,
    control_oid: Option<String>,
    extop_oid: Option<String>,
    ger_eval: bool,
    eval_attrs: EvalAttrs,
    pub(crate) scratch: EvalScratch,
}

impl<'a> AciContainer<'a> {
    pub fn new(
        op: &'a OperationContext<'a>,
        resource: &'a Entry,
        schema: &'a Schema,
        rights: Rights,
    ) -> Self {
        AciContainer {
            op,
            ident: op.ident,
            resource,
            schema,
            rights,
            current_attr: None,
            current_value: None,
            is_first_attr: false,
            control_oid: None,
            extop_oid: None,
            ger_eval: false,
            eval_attrs: EvalAttrs::empty(),
            scratch: EvalScratch::default(),
        }
    }

    /// Evaluate as `ident` rather than the operation's identity.
    pub fn with_client(mut self, ident: &'a Identity) -> Self {
        self.ident = ident;
        self
    }

    pub fn op(&self) -> &OperationContext<'a> {
        self.op
    }

    pub fn ident(&self) -> &Identity {
        self.ident
    }

    pub fn client_dn(&self) -> Option<&Dn> {
        self.ident.get_dn()
    }

    /// The client's own entry, from the identity if the host attached it or else
    /// by an internal search. `Ok(None)` for anonymous clients and bind DNs that
    /// have no entry.
    pub fn resolve_client_entry(&self) -> Result<Option<Arc<Entry>>, OperationError> {
        if let Some(e) = self.ident.get_entry() {
            return Ok(Some(e.clone()));
        }
        match self.ident.get_dn() {
            Some(dn) => self.op.directory.search_base(dn),
            None => Ok(None),
        }
    }

    pub fn resource(&self) -> &Entry {
        self.resource
    }

    pub fn resource_dn(&self) -> &Dn {
        self.resource.get_dn()
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn directory(&self) -> &dyn InternalSearch {
        self.op.directory
    }

    pub fn groups(&self) -> &dyn GroupMembership {
        self.op.groups
    }

    pub fn conn(&self) -> &ConnectionInfo {
        self.op.conn
    }

    pub fn is_add_op(&self) -> bool {
        self.op.kind == OperationKind::Add
    }

    pub fn rights(&self) -> Rights {
        self.rights
    }

    pub fn set_rights(&mut self, rights: Rights) {
        self.rights = rights;
    }

    pub fn has_rights(&self, rights: Rights) -> bool {
        self.rights.has_rights(rights)
    }

    pub fn current_attr(&self) -> Option<&str> {
        self.current_attr.as_deref()
    }

    pub fn set_current_attr(&mut self, attr: Option<&str>) {
        self.current_attr = attr.map(|a| AttrString::from(a.to_lowercase()));
    }

    pub fn current_value(&self) -> Option<&str> {
        self.current_value.as_deref()
    }

    pub fn set_current_value(&mut self, value: Option<&str>) {
        self.current_value = value.map(str::to_string);
    }

    pub fn is_first_attr(&self) -> bool {
        self.is_first_attr
    }

    pub fn set_first_attr(&mut self, first: bool) {
        self.is_first_attr = first;
    }

    pub fn control_oid(&self) -> Option<&str> {
        self.control_oid.as_deref()
    }

    pub fn set_control_oid(&mut self, oid: Option<&str>) {
        self.control_oid = oid.map(str::to_string);
    }

    pub fn extop_oid(&self) -> Option<&str> {
        self.extop_oid.as_deref()
    }

    pub fn set_extop_oid(&mut self, oid: Option<&str>) {
        self.extop_oid = oid.map(str::to_string);
    }

    pub fn is_ger_eval(&self) -> bool {
        self.ger_eval
    }

    pub fn set_ger_eval(&mut self, ger: bool) {
        self.ger_eval = ger;
    }

    pub fn scratch(&self) -> &EvalScratch {
        &self.scratch
    }

    /// The last check was denied by a deny ACI, not by the absence of an allow.
    pub fn is_deny_eval(&self) -> bool {
        self.scratch.reason == EvalReason::EvaluatedDenyAci
    }

    pub fn has_entry_test_rule(&self) -> bool {
        self.scratch.entry_test_rule
    }

    /// Record a READ candidate's `targetattr`. An explicit list clears any
    /// earlier wildcard match for good.
    pub(crate) fn set_eval_user_attrs(&mut self, explicit: bool) {
        if self.rights != Rights::READ {
            return;
        }
        if explicit {
            self.eval_attrs |= EvalAttrs::FOUND_USER_ATTR_RULE;
            self.eval_attrs.remove(EvalAttrs::USER_ATTR_STAR_MATCHED);
        } else if !self.eval_attrs.contains(EvalAttrs::FOUND_USER_ATTR_RULE) {
            self.eval_attrs |= EvalAttrs::USER_ATTR_STAR_MATCHED;
        }
    }

    pub(crate) fn set_eval_op_attrs(&mut self, explicit: bool) {
        if self.rights != Rights::READ {
            return;
        }
        if explicit {
            self.eval_attrs |= EvalAttrs::FOUND_OP_ATTR_RULE;
            self.eval_attrs.remove(EvalAttrs::OP_ATTR_PLUS_MATCHED);
        } else if !self.eval_attrs.contains(EvalAttrs::FOUND_OP_ATTR_RULE) {
            self.eval_attrs |= EvalAttrs::OP_ATTR_PLUS_MATCHED;
        }
    }

    /// Every READ candidate reached user attributes through `targetattr="*"`.
    pub fn all_user_attrs_matched(&self) -> bool {
        self.eval_attrs.contains(EvalAttrs::USER_ATTR_STAR_MATCHED)
            && !self.eval_attrs.contains(EvalAttrs::FOUND_USER_ATTR_RULE)
    }

    /// Every READ candidate reached operational attributes through
    /// `targetattr="+"`.
    pub fn all_op_attrs_matched(&self) -> bool {
        self.eval_attrs.contains(EvalAttrs::OP_ATTR_PLUS_MATCHED)
            && !self.eval_attrs.contains(EvalAttrs::FOUND_OP_ATTR_RULE)
    }
}
