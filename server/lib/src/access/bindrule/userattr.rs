//! `userattr` ties the client to a value held on the resource entry, or on one
//! of its ancestors.
//!
//! ```text
//! userattr="manager#USERDN"
//! userattr="parent[0,1].owner#GROUPDN"
//! userattr="memberurl#LDAPURL"
//! userattr="departmentnumber#1234"
//! ```

use crate::access::bindrule::groupdn::eval_attr_groups;
use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::prelude::*;
use crate::schema::is_valid_attr_description;

#[derive(Debug, Clone, PartialEq, Eq)]
enum UserAttrType {
    UserDn,
    GroupDn,
    LdapUrl,
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttr {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    attr: AttrString,
    kind: UserAttrType,
    /// The ancestor levels to test, 0 being the resource entry. `None` unless
    /// `parent[...]` was given.
    levels: Option<Vec<usize>>,
}

fn decode_levels(s: &str) -> Option<Vec<usize>> {
    let mut levels = Vec::new();
    for l in s.split(',') {
        let l = usize::from_str(l.trim())
            .ok()
            .filter(|l| *l < MAX_USERATTR_LEVELS)?;
        if !levels.contains(&l) {
            levels.push(l);
        }
    }
    Some(levels)
}

impl UserAttr {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let bad = || AciError::InvalidUserAttr(expr.to_string());
        let t = expr.trim();
        let (lhs, rhs) = t.split_once('#').ok_or_else(bad)?;
        let (lhs, rhs) = (lhs.trim(), rhs.trim());
        if rhs.is_empty() {
            return Err(bad());
        }

        let (levels, attr) = match lhs.get(..7) {
            Some(head) if head.eq_ignore_ascii_case("parent[") => {
                let (inner, attr) = lhs[7..].split_once("].").ok_or_else(bad)?;
                (Some(decode_levels(inner).ok_or_else(bad)?), attr)
            }
            _ => (None, lhs),
        };
        if !is_valid_attr_description(attr) {
            return Err(bad());
        }

        let kind = match rhs.to_uppercase().as_str() {
            "USERDN" => UserAttrType::UserDn,
            "GROUPDN" => UserAttrType::GroupDn,
            "LDAPURL" => UserAttrType::LdapUrl,
            "ROLEDN" => return Err(AciError::UnsupportedRoleDn(expr.to_string())),
            _ => UserAttrType::Value(rhs.to_string()),
        };
        // Inheritance walks DN valued attributes only.
        if levels.is_some() && !matches!(kind, UserAttrType::UserDn | UserAttrType::GroupDn) {
            return Err(bad());
        }

        Ok(UserAttr {
            op,
            expr: t.to_string(),
            attr: AttrString::from(attr.to_lowercase()),
            kind,
            levels,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        match &self.kind {
            UserAttrType::UserDn | UserAttrType::GroupDn => self.eval_dn_keywords(c),
            UserAttrType::LdapUrl => self.eval_url(c),
            UserAttrType::Value(v) => self.eval_value(c, v),
        }
    }

    fn eval_entry(&self, c: &AciContainer, entry: &Entry) -> EvalResult {
        match self.kind {
            UserAttrType::GroupDn => eval_attr_groups(c, entry, &self.attr),
            _ => match c.client_dn() {
                Some(client_dn) => EvalResult::from_bool(
                    entry.get_ava_as_dns(&self.attr).contains(client_dn),
                ),
                None => EvalResult::False,
            },
        }
    }

    fn eval_dn_keywords(&self, c: &AciContainer) -> EvalResult {
        let levels: &[usize] = self.levels.as_deref().unwrap_or(&[0]);
        let mut matched = EvalResult::False;
        let mut undefined = false;

        for level in levels {
            if *level == 0 {
                // The entry being added is not in the directory yet.
                if c.is_add_op() {
                    undefined = true;
                    continue;
                }
                matched = self.eval_entry(c, c.resource());
            } else {
                let Some(pdn) = c.resource_dn().ancestor(*level) else {
                    continue;
                };
                matched = match c.directory().search_base(&pdn) {
                    Ok(Some(parent)) => self.eval_entry(c, &parent),
                    Ok(None) => continue,
                    Err(e) => {
                        request_warn!(?e, %pdn, "unable to fetch ancestor for userattr");
                        EvalResult::Fail
                    }
                };
            }
            match matched {
                EvalResult::True => break,
                EvalResult::Fail => undefined = true,
                EvalResult::False => {}
            }
        }
        if matched == EvalResult::Fail {
            matched = EvalResult::False;
        }
        matched.get_ret(self.op, undefined)
    }

    /// Each value of the attribute on the resource is an LDAP URL, which the
    /// client must fall inside of and match the filter of.
    fn eval_url(&self, c: &AciContainer) -> EvalResult {
        let Some(client_dn) = c.client_dn() else {
            return EvalResult::False.get_ret(self.op, false);
        };
        let urls: Vec<LdapUrl> = c
            .resource()
            .get_ava_set(&self.attr)
            .into_iter()
            .filter_map(|u| match LdapUrl::from_str(u) {
                Ok(u) => Some(u),
                Err(e) => {
                    request_warn!(?e, "ignoring invalid url in userattr attribute");
                    None
                }
            })
            .filter(|u| u.in_scope(client_dn))
            .collect();
        if urls.is_empty() {
            return EvalResult::False.get_ret(self.op, false);
        }
        match c.resolve_client_entry() {
            Ok(Some(client)) => {
                let matched = urls.iter().any(|u| client.entry_match_no_index(&u.filter));
                EvalResult::from_bool(matched).get_ret(self.op, false)
            }
            Ok(None) => EvalResult::False.get_ret(self.op, true),
            Err(e) => {
                request_warn!(?e, %client_dn, "unable to fetch client entry for userattr");
                EvalResult::False.get_ret(self.op, true)
            }
        }
    }

    /// Both the client and the resource must hold the value.
    fn eval_value(&self, c: &AciContainer, value: &str) -> EvalResult {
        let client = match c.resolve_client_entry() {
            Ok(Some(client)) => client,
            Ok(None) => return EvalResult::False.get_ret(self.op, true),
            Err(e) => {
                request_warn!(?e, "unable to fetch client entry for userattr");
                return EvalResult::False.get_ret(self.op, true);
            }
        };
        let matched = client.attribute_equality(&self.attr, value)
            && c.resource().attribute_equality(&self.attr, value);
        EvalResult::from_bool(matched).get_ret(self.op, false)
    }
}
