//! geteffectiverights. For each returned entry, report which rights a subject
//! (the client, or the identity named by the control) holds on the entry and on
//! each of its attributes, along with a summary of how each decision was reached.
//!
//! ```text
//! aclRights;entryLevel: add:0,delete:0,read:1,write:0,proxy:0
//! aclRights;attributeLevel;cn: search:1,read:1,compare:1,write:0,selfwrite_add:0,selfwrite_delete:0,proxy:0
//! aclRightsInfo;logs;attributeLevel;read;cn: acl_summary(main): access allowed(read) on entry/attr(...)
//! ```

use crate::access::container::AciContainer;
use crate::access::AciHandler;
use crate::prelude::*;

const ENTRY_RIGHTS: [(&str, Rights); 5] = [
    ("add", Rights::ADD),
    ("delete", Rights::DELETE),
    ("read", Rights::READ),
    ("write", Rights::WRITE),
    ("proxy", Rights::PROXY),
];

#[derive(Clone, Copy)]
enum AttrRight {
    Plain(Rights),
    SelfWrite(Rights),
}

const ATTR_RIGHTS: [(&str, AttrRight); 7] = [
    ("search", AttrRight::Plain(Rights::SEARCH)),
    ("read", AttrRight::Plain(Rights::READ)),
    ("compare", AttrRight::Plain(Rights::COMPARE)),
    ("write", AttrRight::Plain(Rights::WRITE)),
    (
        "selfwrite_add",
        AttrRight::SelfWrite(Rights::SELF_WRITE.union(Rights::WRITE_ADD)),
    ),
    (
        "selfwrite_delete",
        AttrRight::SelfWrite(Rights::SELF_WRITE.union(Rights::WRITE_DELETE)),
    ),
    ("proxy", AttrRight::Plain(Rights::PROXY)),
];

/// The identity the rights are reported for.
fn resolve_subject(op: &OperationContext, ger: &GetEffectiveRights) -> Option<Identity> {
    let dn = ger.authz_dn.as_ref()?;
    if dn.is_root() {
        return Some(Identity::anonymous());
    }
    let ident = match op.directory.search_base(dn) {
        Ok(Some(e)) => Identity::from_entry(e, AuthType::Simple),
        Ok(None) => Identity::from_dn(dn.clone(), AuthType::Simple),
        Err(err) => {
            request_warn!(?err, %dn, "unable to fetch the geteffectiverights subject entry");
            Identity::from_dn(dn.clone(), AuthType::Simple)
        }
    };
    Some(ident)
}

/// `acl_summary(main): access allowed(read) on entry/attr(<dn>, cn) to (<subject>) (not proxied) ( reason: evaluated allow deciding_aci: "name")`
fn summary(op: &OperationContext, c: &AciContainer, allowed: bool, label: &str) -> String {
    let access = if allowed { "allowed" } else { "not allowed" };
    let right = c.rights().right_to_string().unwrap_or(label);
    let attr = c.current_attr().unwrap_or("NULL");
    let subject = c
        .client_dn()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let proxied = match (op.orig_ident, op.ident.get_dn()) {
        (Some(_), Some(dn)) => format!("(proxied as {})", dn),
        (Some(_), None) => "(proxied as anonymous)".to_string(),
        (None, _) => "(not proxied)".to_string(),
    };

    let mut s = format!(
        "acl_summary(main): access {}({}) on entry/attr({}, {}) to ({}) {} ( reason: {}",
        access,
        right,
        c.resource_dn(),
        attr,
        subject,
        proxied,
        c.scratch().reason()
    );
    if let Some(aci) = c.scratch().deciding_aci() {
        s.push_str(&format!(" deciding_aci: \"{}\"", aci.name()));
    }
    let taf = c.scratch().targ_attr_filter_acis();
    if !taf.is_empty() {
        let names: Vec<String> = taf.iter().map(|a| format!("\"{}\"", a.name())).collect();
        s.push_str(&format!(" targattrfilters_acis: {}", names.join(", ")));
    }
    s.push(')');
    s
}

/// Add the effective rights attributes to `out`, the copy of `resource` about
/// to be returned.
pub(crate) fn add_rights_to_entry(
    handler: &AciHandler,
    op: &OperationContext,
    ger: &GetEffectiveRights,
    resource: &Entry,
    out: &mut Entry,
) {
    let resolved = resolve_subject(op, ger);
    let subject = resolved.as_ref().unwrap_or(op.ident);
    let schema = handler.schema();

    let mut c = AciContainer::new(op, resource, schema, Rights::empty()).with_client(subject);
    c.set_ger_eval(true);

    let mut parts = Vec::with_capacity(ENTRY_RIGHTS.len());
    for (label, rights) in ENTRY_RIGHTS {
        c.scratch.reset();
        c.set_rights(rights);
        c.set_current_attr(None);
        c.set_current_value(None);
        let allowed = if rights == Rights::READ || rights == Rights::WRITE {
            handler.access_allowed_entry(&mut c)
        } else {
            handler.access_allowed(&mut c)
        };
        parts.push(format!("{}:{}", label, u8::from(allowed)));
        c.set_current_attr(None);
        out.add_ava(
            &format!("{};logs;entryLevel;{}", ATTR_ACL_RIGHTS_INFO, label),
            &summary(op, &c, allowed, label),
        );
    }
    out.add_ava(&format!("{};entryLevel", ATTR_ACL_RIGHTS), &parts.join(","));

    let mut attrs = resource.get_attr_names(schema);
    for a in &ger.attrs {
        let a = AttrString::from(a.to_lowercase());
        if !attrs.contains(&a) {
            attrs.push(a);
        }
    }
    let self_value = subject.get_dn().map(|d| d.to_string());

    for attr in attrs {
        let mut parts = Vec::with_capacity(ATTR_RIGHTS.len());
        for (label, right) in ATTR_RIGHTS {
            c.scratch.reset();
            c.set_current_attr(Some(attr.as_str()));
            let allowed = match right {
                AttrRight::Plain(rights) => {
                    c.set_rights(rights);
                    c.set_current_value(None);
                    handler.access_allowed(&mut c)
                }
                // Only a named subject can write itself.
                AttrRight::SelfWrite(rights) => {
                    c.set_rights(rights);
                    c.set_current_value(self_value.as_deref());
                    match &self_value {
                        Some(_) => handler.access_allowed(&mut c),
                        None => false,
                    }
                }
            };
            parts.push(format!("{}:{}", label, u8::from(allowed)));
            out.add_ava(
                &format!("{};logs;attributeLevel;{};{}", ATTR_ACL_RIGHTS_INFO, label, attr),
                &summary(op, &c, allowed, label),
            );
        }
        out.add_ava(
            &format!("{};attributeLevel;{}", ATTR_ACL_RIGHTS, attr),
            &parts.join(","),
        );
    }
    security_access!(dn = %resource.get_dn(), "geteffectiverights added to entry");
}
