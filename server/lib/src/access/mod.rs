//! Access control. This decides, for each operation the host performs, whether
//! the requesting identity may carry it out against the entry involved.
//!
//! The rules are ACIs held in the `aci` attribute of entries, plus global ACIs on
//! the configuration entry. An ACI applies to the entry holding it and to
//! everything beneath it. Checking access is done in three steps:
//!
//! * The ACIs held at the entry and each of its ancestors are gathered from the
//!   [`AciList`] as candidates.
//! * Each candidate's targets are tested against the entry, the attribute and the
//!   rights requested. Those that apply are split into allow and deny lists.
//! * The bind rules of the deny list are evaluated first. Any deny that matches,
//!   or that can not be resolved, denies. Otherwise the first allow that matches
//!   grants access. If nothing matches, access is denied.
//!
//! The evaluation never errors. A host failure inside a bind rule leaves the rule
//! undefined, which is treated as a match for deny and a miss for allow.

use crate::access::container::AciContainer;
use crate::access::list::AciListTransaction;
use crate::filter::FilterComp;
use crate::prelude::*;
use crate::schema::base_attr_type;

pub mod aci;
pub mod bindrule;
pub mod container;
pub mod effective;
pub(crate) mod lexer;
pub mod list;
pub mod listener;
pub mod pattern;
pub mod rights;
pub mod targattrfilters;
pub mod targets;

use self::bindrule::EvalResult;

/// The outcome of [`AciHandler::may_send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchAccess {
    pub allowed: bool,
    /// Every READ candidate reached user attributes through `targetattr="*"`, so
    /// they need not be checked one at a time.
    pub all_user_attrs: bool,
    /// As `all_user_attrs`, for operational attributes and `targetattr="+"`.
    pub all_op_attrs: bool,
}

impl SearchAccess {
    fn denied() -> Self {
        SearchAccess::default()
    }

    fn bypass() -> Self {
        SearchAccess {
            allowed: true,
            all_user_attrs: true,
            all_op_attrs: true,
        }
    }
}

/// The attribute a filter component asserts on, if any.
fn filter_attr(f: &FilterComp) -> Option<&str> {
    match f {
        FilterComp::Eq(a, _)
        | FilterComp::Sub(a, _)
        | FilterComp::Pres(a)
        | FilterComp::Ge(a, _)
        | FilterComp::Le(a, _)
        | FilterComp::Approx(a, _) => Some(a.as_str()),
        FilterComp::Ext { attr, .. } => attr.as_deref(),
        FilterComp::And(_) | FilterComp::Or(_) | FilterComp::Not(_) => None,
    }
}

pub struct AciHandler {
    acis: Arc<AciList>,
    listener: AciListenerManager,
    schema: Schema,
    config_dn: Dn,
}

impl AciHandler {
    /// Build the handler from its configuration. When `log_level` is set, this
    /// also installs the engine's log subscriber, unless the host already has one.
    pub fn new(config: &AciHandlerConfig) -> Result<Self, OperationError> {
        if let Some(level) = config.log_level {
            sketching::start_logging(level);
            admin_debug!(%level, "access control logging configured");
        }
        let config_dn = config.config_dn()?;
        let acis = Arc::new(AciList::new(config_dn.clone()));

        let mut w = acis.write();
        let added = w.set_config_acis(&config.global_aci).map_err(|err| {
            admin_error!(?err, "invalid global aci in the configuration");
            OperationError::InvalidConfiguration(format!(
                "global aci could not be decoded: {}",
                err
            ))
        })?;
        w.commit();
        admin_info!(added, "global acis loaded");

        Ok(AciHandler {
            listener: AciListenerManager::new(acis.clone(), config_dn.clone()),
            acis,
            schema: config.schema(),
            config_dn,
        })
    }

    pub fn acis(&self) -> &AciList {
        &self.acis
    }

    pub fn listener(&self) -> &AciListenerManager {
        &self.listener
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config_dn(&self) -> &Dn {
        &self.config_dn
    }

    fn skip_access_check(ident: &Identity) -> bool {
        ident.has_privilege(Privilege::BYPASS_ACL)
    }

    /// Writes of a value imply write, and writing your own DN into a DN valued
    /// attribute is a selfwrite.
    fn derive_rights(&self, c: &mut AciContainer) {
        if c.has_rights(Rights::WRITE_ADD | Rights::WRITE_DELETE) {
            c.set_rights(c.rights() | Rights::WRITE);
        }
        if !c.has_rights(Rights::WRITE) {
            return;
        }
        let is_self = match (c.current_attr(), c.current_value()) {
            (Some(attr), Some(value)) if self.schema.is_dn_syntax(attr) => {
                match Dn::from_str(value) {
                    Ok(dn) => c.client_dn() == Some(&dn),
                    Err(err) => {
                        request_warn!(?err, %attr, "value of a dn attribute is not a valid dn");
                        false
                    }
                }
            }
            _ => false,
        };
        if is_self {
            c.set_rights(c.rights() | Rights::SELF_WRITE);
        }
    }

    fn create_applicable_list(&self, c: &mut AciContainer) {
        let candidates = self.acis.read().get_candidate_acis(c.resource_dn());
        let n_candidates = candidates.len();
        for aci in candidates {
            if Aci::is_applicable(&aci, c) {
                if aci.has_access_type(AccessType::Deny) {
                    c.scratch.deny_list.push(aci.clone());
                }
                if aci.has_access_type(AccessType::Allow) {
                    c.scratch.allow_list.push(aci);
                }
            }
            c.scratch.targ_attr_filters_match = false;
        }
        request_trace!(
            candidates = n_candidates,
            allow = c.scratch.allow_list.len(),
            deny = c.scratch.deny_list.len(),
            "applicable acis"
        );
    }

    fn test_applicable_lists(c: &mut AciContainer) -> bool {
        // geteffectiverights asked about write without a value. ACIs with value
        // filters can not be decided, they are reported rather than evaluated.
        let ger_taf = c.is_ger_eval()
            && !c.has_rights(Rights::SELF_WRITE)
            && !c.scratch.targ_attr_filter_acis.is_empty();
        let set_aside = |aci: &Arc<Aci>| ger_taf && aci.targets().targattrfilters().is_some();

        if c.scratch.allow_list.is_empty() && !ger_taf {
            c.scratch.reason = EvalReason::NoAllowAcis;
            security_access!(dn = %c.resource_dn(), rights = %c.rights(), "denied ❌ - no allow acis apply");
            return false;
        }

        let deny = {
            let cr: &AciContainer = c;
            cr.scratch.deny_list.iter().find(|aci| match aci.evaluate(AccessType::Deny, cr) {
                EvalResult::Fail => true,
                EvalResult::True => !set_aside(*aci),
                EvalResult::False => false,
            })
        }
        .cloned();
        if let Some(aci) = deny {
            security_access!(
                dn = %c.resource_dn(),
                rights = %c.rights(),
                aci = %aci.name(),
                "denied ❌ - deny aci matched"
            );
            c.scratch.reason = EvalReason::EvaluatedDenyAci;
            c.scratch.deciding_aci = Some(aci);
            return false;
        }

        let allow = {
            let cr: &AciContainer = c;
            cr.scratch
                .allow_list
                .iter()
                .find(|aci| aci.evaluate(AccessType::Allow, cr) == EvalResult::True && !set_aside(*aci))
        }
        .cloned();
        match allow {
            Some(aci) => {
                security_access!(
                    dn = %c.resource_dn(),
                    rights = %c.rights(),
                    aci = %aci.name(),
                    "allowed ✅ - allow aci matched"
                );
                c.scratch.reason = EvalReason::EvaluatedAllowAci;
                c.scratch.deciding_aci = Some(aci);
                true
            }
            None => {
                security_access!(dn = %c.resource_dn(), rights = %c.rights(), "denied ❌ - no allow aci matched");
                c.scratch.reason = EvalReason::NoMatchedAllowsAcis;
                false
            }
        }
    }

    /// Decide the rights in `c` for the resource, and the attribute and value
    /// under test if any. The outcome and the deciding ACI are left in the
    /// container's scratch.
    pub fn access_allowed(&self, c: &mut AciContainer) -> bool {
        c.scratch.reset();
        if Self::skip_access_check(c.ident()) {
            c.scratch.reason = EvalReason::SkipAci;
            return true;
        }
        self.derive_rights(c);
        self.create_applicable_list(c);
        Self::test_applicable_lists(c)
    }

    /// Is the right granted on any attribute of the resource.
    pub fn access_allowed_entry(&self, c: &mut AciContainer) -> bool {
        let attrs = c.resource().get_attr_names(&self.schema);
        c.set_current_value(None);
        for (i, attr) in attrs.iter().enumerate() {
            c.set_first_attr(i == 0);
            c.set_current_attr(Some(attr.as_str()));
            if self.access_allowed(c) {
                c.set_first_attr(false);
                if c.has_entry_test_rule() {
                    // Allowed by an ACI with no attribute targets, so it must
                    // also hold for the entry as a whole.
                    c.set_current_attr(None);
                    if !self.access_allowed(c) && c.is_deny_eval() {
                        return false;
                    }
                }
                return true;
            }
        }
        c.set_first_attr(false);
        false
    }

    fn test_filter(&self, c: &mut AciContainer, f: &FilterComp) -> bool {
        match f {
            FilterComp::And(l) | FilterComp::Or(l) => l.iter().all(|f| self.test_filter(c, f)),
            FilterComp::Not(f) => self.test_filter(c, f),
            f => {
                c.set_current_attr(filter_attr(f));
                c.set_current_value(None);
                self.access_allowed(c)
            }
        }
    }

    /// Every `aci` value must decode, and changing them needs `MODIFY_ACL`.
    fn verify_aci_values<'v>(
        &self,
        op: &OperationContext,
        dn: &Dn,
        values: impl Iterator<Item = &'v str>,
    ) -> Result<(), OperationError> {
        if !op.ident.has_privilege(Privilege::MODIFY_ACL) {
            security_access!(%dn, "denied ❌ - the modify-acl privilege is required to change acis");
            return Err(OperationError::MissingPrivilege("modify-acl".to_string()));
        }
        self.validate_aci_values(dn, values)
    }

    /// Check ACI values decode against `dn`, as the host does before storing them.
    pub fn validate_aci_values<'v>(
        &self,
        dn: &Dn,
        values: impl Iterator<Item = &'v str>,
    ) -> Result<(), OperationError> {
        for v in values {
            Aci::decode(v, dn).map_err(|err| {
                admin_warn!(%dn, ?err, "rejecting invalid aci value \"{}\"", v);
                OperationError::InvalidAttributeSyntax(format!(
                    "the aci value on {} could not be decoded: {}",
                    dn, err
                ))
            })?;
        }
        Ok(())
    }

    pub fn is_allowed_add(&self, op: &OperationContext, entry: &Entry) -> Result<bool, OperationError> {
        let mut c = AciContainer::new(op, entry, &self.schema, Rights::ADD);
        if !self.access_allowed(&mut c) {
            return Ok(false);
        }
        if entry.attribute_pres(ATTR_ACI) {
            self.verify_aci_values(op, entry.get_dn(), entry.get_ava_set(ATTR_ACI).into_iter())?;
        }
        Ok(true)
    }

    pub fn is_allowed_delete(&self, op: &OperationContext, entry: &Entry) -> bool {
        let mut c = AciContainer::new(op, entry, &self.schema, Rights::DELETE);
        self.access_allowed(&mut c)
    }

    pub fn is_allowed_compare(
        &self,
        op: &OperationContext,
        entry: &Entry,
        attr: &str,
        value: &str,
    ) -> bool {
        let mut c = AciContainer::new(op, entry, &self.schema, Rights::COMPARE);
        c.set_current_attr(Some(base_attr_type(attr)));
        c.set_current_value(Some(value));
        self.access_allowed(&mut c)
    }

    fn check_value(&self, c: &mut AciContainer, rights: Rights, value: &str) -> bool {
        c.set_rights(rights);
        c.set_current_value(Some(value));
        self.access_allowed(c)
    }

    /// Check a modification list against the entry as it is before the change.
    /// Replacing, incrementing or deleting all values needs `WRITE_DELETE` on
    /// every existing value. Each value added or deleted is checked on its own.
    pub fn is_allowed_modify(
        &self,
        op: &OperationContext,
        entry: &Entry,
        modlist: &ModifyList,
    ) -> Result<bool, OperationError> {
        let skip = Self::skip_access_check(op.ident);
        let mut modified: Option<Entry> = None;
        let mut c = AciContainer::new(op, entry, &self.schema, Rights::empty());

        for m in modlist {
            let attr = m.attr();
            let base = base_attr_type(attr);
            if base == ATTR_ACI && !op.ident.has_privilege(Privilege::MODIFY_ACL) {
                security_access!(dn = %entry.get_dn(), "denied ❌ - the modify-acl privilege is required to change acis");
                return Err(OperationError::MissingPrivilege("modify-acl".to_string()));
            }

            let replaces_all = match m {
                Modify::Delete(_, vs) => vs.is_empty(),
                Modify::Replace(..) | Modify::Increment(..) => true,
                Modify::Add(..) => false,
            };
            c.set_current_attr(Some(attr));
            if replaces_all && !skip {
                for v in entry.get_ava_set(attr) {
                    if !self.check_value(&mut c, Rights::WRITE_DELETE, v) {
                        return Ok(false);
                    }
                }
            }

            for v in m.values() {
                c.set_current_attr(Some(attr));
                let allowed = skip
                    || match m {
                        Modify::Add(..) | Modify::Replace(..) => {
                            self.check_value(&mut c, Rights::WRITE_ADD, v)
                        }
                        Modify::Delete(..) => self.check_value(&mut c, Rights::WRITE_DELETE, v),
                        Modify::Increment(..) => {
                            if modified.is_none() {
                                let mut e = entry.clone();
                                e.apply_modlist(modlist)?;
                                modified = Some(e);
                            }
                            modified
                                .as_ref()
                                .map(|e| e.get_ava_set(attr))
                                .unwrap_or_default()
                                .into_iter()
                                .all(|nv| self.check_value(&mut c, Rights::WRITE_ADD, nv))
                        }
                    };
                if !allowed {
                    return Ok(false);
                }

                if base == ATTR_ACI {
                    self.validate_aci_values(entry.get_dn(), std::iter::once(v.as_str()))?;
                } else if base == ATTR_GLOBAL_ACI {
                    self.validate_aci_values(&Dn::root(), std::iter::once(v.as_str()))?;
                }
            }
        }
        Ok(true)
    }

    fn check_rdn(&self, c: &mut AciContainer, rights: Rights, rdn: &Rdn) -> bool {
        rdn.avas().iter().all(|ava| {
            c.set_current_attr(Some(ava.attr()));
            self.check_value(c, rights, ava.value())
        })
    }

    /// Renaming needs `WRITE` on the entry, `WRITE_ADD` on the new rdn and, if the
    /// old rdn is removed, `WRITE_DELETE` on it. Moving it under a new superior
    /// also needs `IMPORT` there and `EXPORT` on the entry.
    pub fn is_allowed_modify_dn(
        &self,
        op: &OperationContext,
        entry: &Entry,
        new_rdn: &Rdn,
        delete_old_rdn: bool,
        new_superior: Option<&Dn>,
    ) -> bool {
        if Self::skip_access_check(op.ident) {
            return true;
        }

        if let Some(superior) = new_superior {
            let sup_entry = match op.directory.search_base(superior) {
                Ok(Some(e)) => e,
                Ok(None) => {
                    request_warn!(%superior, "new superior does not exist");
                    return false;
                }
                Err(err) => {
                    request_warn!(?err, %superior, "unable to fetch new superior");
                    return false;
                }
            };
            let mut c = AciContainer::new(op, &sup_entry, &self.schema, Rights::IMPORT);
            if !self.access_allowed(&mut c) {
                return false;
            }
        }

        let mut c = AciContainer::new(op, entry, &self.schema, Rights::WRITE);
        if !self.access_allowed(&mut c) || !self.check_rdn(&mut c, Rights::WRITE_ADD, new_rdn) {
            return false;
        }
        if delete_old_rdn {
            if let Some(old_rdn) = entry.get_dn().rdn() {
                if !self.check_rdn(&mut c, Rights::WRITE_DELETE, old_rdn) {
                    return false;
                }
            }
        }

        if new_superior.is_some() {
            c.set_rights(Rights::EXPORT);
            c.set_current_attr(None);
            c.set_current_value(None);
            return self.access_allowed(&mut c);
        }
        true
    }

    /// May a search return `entry` at all. Every attribute of the search filter
    /// needs `SEARCH`, and some attribute of the entry needs `READ`.
    pub fn may_send(&self, op: &OperationContext, entry: &Entry, filter: &Filter) -> SearchAccess {
        if Self::skip_access_check(op.ident) {
            return SearchAccess::bypass();
        }
        let mut c = AciContainer::new(op, entry, &self.schema, Rights::SEARCH);
        if !self.test_filter(&mut c, filter.to_inner()) {
            return SearchAccess::denied();
        }

        c.set_rights(Rights::READ);
        if !self.access_allowed_entry(&mut c) {
            return SearchAccess::denied();
        }
        SearchAccess {
            allowed: true,
            all_user_attrs: c.all_user_attrs_matched(),
            all_op_attrs: c.all_op_attrs_matched(),
        }
    }

    /// The copy of `entry` to return to the client, with every attribute it may
    /// not read removed. A geteffectiverights request adds its rights attributes.
    pub fn filter_entry(&self, op: &OperationContext, entry: &Entry, access: &SearchAccess) -> Entry {
        let mut filtered = entry.clone();
        if !Self::skip_access_check(op.ident) {
            let mut c = AciContainer::new(op, entry, &self.schema, Rights::READ);
            for attr in entry.get_attr_names(&self.schema) {
                let operational = self.schema.is_operational(&attr);
                if (access.all_user_attrs && !operational) || (access.all_op_attrs && operational) {
                    continue;
                }
                c.set_rights(Rights::READ);
                c.set_current_attr(Some(attr.as_str()));
                if !self.access_allowed(&mut c) {
                    filtered.purge_ava(&attr);
                }
            }
        }
        if let Some(ger) = &op.ger {
            effective::add_rights_to_entry(self, op, ger, entry, &mut filtered);
        }
        filtered
    }

    /// May a search continuation reference to `dn` be returned.
    pub fn may_send_reference(&self, op: &OperationContext, dn: &Dn, urls: &[String]) -> bool {
        let mut e = Entry::new(dn.clone());
        for u in urls {
            e.add_ava(ATTR_REF, u);
        }
        let mut c = AciContainer::new(op, &e, &self.schema, Rights::READ);
        c.set_current_attr(Some(ATTR_REF));
        self.access_allowed(&mut c)
    }

    /// Used for assertion style checks: `READ` on every attribute of the filter.
    pub fn is_allowed_filter(&self, op: &OperationContext, entry: &Entry, filter: &Filter) -> bool {
        let mut c = AciContainer::new(op, entry, &self.schema, Rights::READ);
        self.test_filter(&mut c, filter.to_inner())
    }

    pub fn is_allowed_extop(&self, op: &OperationContext, oid: &str) -> bool {
        let e = Entry::new(op.ident.get_dn().cloned().unwrap_or_else(Dn::root));
        let mut c = AciContainer::new(op, &e, &self.schema, Rights::READ | Rights::EXT_OP);
        c.set_extop_oid(Some(oid));
        self.access_allowed(&mut c)
    }

    pub fn is_allowed_control(&self, op: &OperationContext, dn: &Dn, oid: &str) -> bool {
        let e = Entry::new(dn.clone());
        let mut c = AciContainer::new(op, &e, &self.schema, Rights::READ | Rights::CONTROL);
        c.set_control_oid(Some(oid));
        self.access_allowed(&mut c)
    }

    /// May `proxy` act as the owner of `proxied`.
    pub fn may_proxy(&self, op: &OperationContext, proxy: &Identity, proxied: &Entry) -> bool {
        let mut c = AciContainer::new(op, proxied, &self.schema, Rights::PROXY).with_client(proxy);
        self.access_allowed_entry(&mut c)
    }
}
