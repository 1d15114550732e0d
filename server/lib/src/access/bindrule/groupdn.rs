//! `groupdn="ldap:///cn=admins,ou=groups,dc=example,dc=com || ldap:///cn=ops,..."`
//!
//! Membership is answered by the host's [`GroupMembership`] oracle, so static,
//! nested and dynamic groups all behave the same here.

use crate::access::bindrule::userdn::strip_ldap_prefix;
use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDn {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    groups: Vec<Dn>,
}

impl GroupDn {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let bad = || AciError::InvalidGroupDn(expr.to_string());
        let groups = expr
            .split("||")
            .map(|part| {
                strip_ldap_prefix(part)
                    .filter(|rest| !rest.is_empty())
                    .ok_or_else(bad)
                    .and_then(|rest| Dn::from_str(rest).map_err(|_| bad()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GroupDn {
            op,
            expr: expr.trim().to_string(),
            groups,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        let Some(client_dn) = c.client_dn() else {
            return EvalResult::False.get_ret(self.op, false);
        };
        let (matched, undefined) = member_of_any(c, client_dn, self.groups.iter());
        matched.get_ret(self.op, undefined)
    }
}

/// Test `member` against each group in turn. An oracle failure stops the walk
/// and marks the result undefined.
fn member_of_any<'a, I>(c: &AciContainer, member: &Dn, groups: I) -> (EvalResult, bool)
where
    I: Iterator<Item = &'a Dn>,
{
    for group in groups {
        match c.groups().is_member(member, group) {
            Ok(true) => return (EvalResult::True, false),
            Ok(false) => {}
            Err(e) => {
                request_warn!(?e, %member, %group, "group membership could not be resolved");
                return (EvalResult::Fail, true);
            }
        }
    }
    (EvalResult::False, false)
}

/// Used by `userattr="attr#GROUPDN"`: is the client a member of any group named
/// by the DN values of `attr` on `entry`.
pub(crate) fn eval_attr_groups(c: &AciContainer, entry: &Entry, attr: &str) -> EvalResult {
    let Some(client_dn) = c.client_dn() else {
        return EvalResult::False;
    };
    let groups = entry.get_ava_as_dns(attr);
    member_of_any(c, client_dn, groups.iter()).0
}
