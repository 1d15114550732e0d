//! The target part of an ACI, the parenthesised keywords before `(version 3.0;`.
//! Targets decide whether an ACI is a candidate for an entry, attribute and
//! operation at all. Each keyword may appear once and an absent keyword imposes no
//! restriction.
//!
//! ```text
//! (target="ldap:///uid=*,ou=people,dc=example,dc=com")
//! (targetattr="cn || sn || mail")
//! (targetscope="onelevel")
//! (targetfilter="(objectClass=person)")
//! (targattrfilters="add=mail:(mail=*@example.com)")
//! (targetcontrol="1.3.6.1.4.1.42.2.27.9.5.2")
//! (extop="1.3.6.1.4.1.4203.1.11.3")
//! ```

use std::fmt;

use crate::access::bindrule::userdn::strip_ldap_prefix;
use crate::access::container::AciContainer;
use crate::access::lexer::Cursor;
use crate::access::pattern::{has_wildcard, PatternDn};
use crate::access::targattrfilters::TargAttrFilters;
use crate::prelude::*;
use crate::schema::{base_attr_type, is_valid_attr_name, is_valid_oid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOperator {
    Eq,
    NotEq,
}

impl TargetOperator {
    fn decode(keyword: TargetKeyword, op: &str) -> Result<Self, AciError> {
        let op = match op {
            "=" => TargetOperator::Eq,
            "!=" => TargetOperator::NotEq,
            _ => {
                return Err(AciError::InvalidTargetOperator {
                    keyword: keyword.as_str().to_string(),
                    operator: op.to_string(),
                })
            }
        };
        if op == TargetOperator::NotEq && !keyword.allows_not_equal() {
            return Err(AciError::InvalidTargetOperator {
                keyword: keyword.as_str().to_string(),
                operator: "!=".to_string(),
            });
        }
        Ok(op)
    }

    fn as_str(self) -> &'static str {
        match self {
            TargetOperator::Eq => "=",
            TargetOperator::NotEq => "!=",
        }
    }

    /// Apply the operator to a raw match.
    fn apply(self, matched: bool) -> bool {
        match self {
            TargetOperator::Eq => matched,
            TargetOperator::NotEq => !matched,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKeyword {
    Target,
    TargetAttr,
    TargetScope,
    TargetFilter,
    TargAttrFilters,
    TargetControl,
    ExtOp,
}

impl TargetKeyword {
    pub fn decode(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "target" => Some(TargetKeyword::Target),
            "targetattr" => Some(TargetKeyword::TargetAttr),
            "targetscope" => Some(TargetKeyword::TargetScope),
            "targetfilter" => Some(TargetKeyword::TargetFilter),
            "targattrfilters" => Some(TargetKeyword::TargAttrFilters),
            "targetcontrol" => Some(TargetKeyword::TargetControl),
            "extop" => Some(TargetKeyword::ExtOp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetKeyword::Target => "target",
            TargetKeyword::TargetAttr => "targetattr",
            TargetKeyword::TargetScope => "targetscope",
            TargetKeyword::TargetFilter => "targetfilter",
            TargetKeyword::TargAttrFilters => "targattrfilters",
            TargetKeyword::TargetControl => "targetcontrol",
            TargetKeyword::ExtOp => "extop",
        }
    }

    fn allows_not_equal(self) -> bool {
        !matches!(
            self,
            TargetKeyword::TargetScope | TargetKeyword::TargAttrFilters
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TargetDn {
    Dn(Dn),
    Pattern(PatternDn),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    op: TargetOperator,
    dn: TargetDn,
    raw: String,
}

impl Target {
    fn decode(op: TargetOperator, expr: &str, aci_dn: &Dn) -> Result<Self, AciError> {
        let bad = || AciError::InvalidTarget(expr.to_string());
        let rest = strip_ldap_prefix(expr).ok_or_else(bad)?;
        if rest.trim().is_empty() {
            return Err(bad());
        }
        let dn = if has_wildcard(rest) {
            TargetDn::Pattern(PatternDn::decode(rest).map_err(|_| bad())?)
        } else {
            let dn = Dn::from_str(rest).map_err(|_| bad())?;
            if !dn.is_descendant_of(aci_dn) {
                return Err(AciError::TargetNotDescendant {
                    target: expr.to_string(),
                    aci_dn: aci_dn.to_string(),
                });
            }
            TargetDn::Dn(dn)
        };
        Ok(Target {
            op,
            dn,
            raw: expr.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAttr {
    op: TargetOperator,
    /// `*`
    all_user: bool,
    /// `+`
    all_op: bool,
    attrs: Vec<AttrString>,
    raw: String,
}

impl TargetAttr {
    fn decode(op: TargetOperator, expr: &str) -> Result<Self, AciError> {
        let bad = || AciError::InvalidTargetAttr(expr.to_string());
        let mut ta = TargetAttr {
            op,
            all_user: false,
            all_op: false,
            attrs: Vec::new(),
            raw: expr.trim().to_string(),
        };
        for part in expr.split("||") {
            match part.trim() {
                "*" => ta.all_user = true,
                "+" => ta.all_op = true,
                a if is_valid_attr_name(a) => {
                    let a = AttrString::from(a.to_lowercase());
                    if !ta.attrs.contains(&a) {
                        ta.attrs.push(a);
                    }
                }
                _ => return Err(bad()),
            }
        }
        Ok(ta)
    }

    /// Does this `targetattr` cover `attr`. Whether the match came from a wildcard
    /// or an explicit list is handed to the container, which only keeps it for
    /// READ (see `AciContainer::set_eval_user_attrs`).
    fn is_applicable(&self, attr: &str, c: &mut AciContainer) -> bool {
        let base = AttrString::from(base_attr_type(attr).to_lowercase());
        let is_op = c.schema().is_operational(&base);
        let explicit_user = self.attrs.iter().any(|a| !c.schema().is_operational(a));
        let explicit_op = self.attrs.iter().any(|a| c.schema().is_operational(a));

        match self.op {
            TargetOperator::Eq => {
                if explicit_user {
                    c.set_eval_user_attrs(true);
                } else if self.all_user {
                    c.set_eval_user_attrs(false);
                }
                if explicit_op {
                    c.set_eval_op_attrs(true);
                } else if self.all_op {
                    c.set_eval_op_attrs(false);
                }
            }
            TargetOperator::NotEq => c.set_eval_user_attrs(true),
        }

        let listed = self.attrs.contains(&base);
        match (self.op, is_op) {
            (TargetOperator::Eq, true) => self.all_op || listed,
            (TargetOperator::Eq, false) => self.all_user || listed,
            // An exclusion list only ever grants user attributes.
            (TargetOperator::NotEq, true) => false,
            (TargetOperator::NotEq, false) => !(self.all_user || listed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFilter {
    op: TargetOperator,
    filter: Filter,
    raw: String,
}

/// The value of `targetcontrol` and `extop`, a `||` separated list of OIDs or
/// `*` for any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidList {
    op: TargetOperator,
    any: bool,
    oids: Vec<String>,
    raw: String,
}

impl OidList {
    fn decode(op: TargetOperator, expr: &str) -> Result<Self, AciError> {
        let mut list = OidList {
            op,
            any: false,
            oids: Vec::new(),
            raw: expr.trim().to_string(),
        };
        for part in expr.split("||") {
            match part.trim() {
                "*" => list.any = true,
                oid if is_valid_oid(oid) => list.oids.push(oid.to_string()),
                oid => return Err(AciError::InvalidOid(oid.to_string())),
            }
        }
        Ok(list)
    }

    fn is_applicable(&self, oid: Option<&str>) -> bool {
        let Some(oid) = oid else {
            return false;
        };
        self.op
            .apply(self.any || self.oids.iter().any(|o| o == oid))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AciTargets {
    target: Option<Target>,
    targetattr: Option<TargetAttr>,
    targetscope: Option<SearchScope>,
    targetfilter: Option<TargetFilter>,
    targattrfilters: Option<TargAttrFilters>,
    targetcontrol: Option<OidList>,
    extop: Option<OidList>,
}

fn decode_scope(expr: &str) -> Result<SearchScope, AciError> {
    match expr.trim().to_lowercase().as_str() {
        "base" => Ok(SearchScope::Base),
        "onelevel" => Ok(SearchScope::OneLevel),
        "subtree" => Ok(SearchScope::Subtree),
        "subordinate" => Ok(SearchScope::Subordinate),
        _ => Err(AciError::InvalidTargetScope(expr.to_string())),
    }
}

fn scope_keyword(scope: SearchScope) -> &'static str {
    match scope {
        SearchScope::Base => "base",
        SearchScope::OneLevel => "onelevel",
        SearchScope::Subtree => "subtree",
        SearchScope::Subordinate => "subordinate",
    }
}

/// Is the next parenthesised group the start of the ACI body.
fn at_body(cur: &Cursor) -> bool {
    let rest = cur.rest();
    let Some(inner) = rest.strip_prefix('(') else {
        return true;
    };
    let inner = inner.trim_start();
    inner
        .get(..7)
        .map(|w| w.eq_ignore_ascii_case("version"))
        .unwrap_or(false)
}

impl AciTargets {
    /// Decode target keywords from the front of `cur`, stopping at the ACI body.
    pub(crate) fn decode(cur: &mut Cursor, text: &str, aci_dn: &Dn) -> Result<Self, AciError> {
        let mut targets = AciTargets::default();
        loop {
            cur.skip_ws();
            if at_body(cur) {
                break;
            }
            cur.eat('(');
            cur.skip_ws();
            let word = cur.take_while(|c| c.is_ascii_alphanumeric());
            let keyword = TargetKeyword::decode(word)
                .ok_or_else(|| AciError::InvalidTargetKeyword(word.to_string()))?;
            let op = cur
                .read_operator()
                .ok_or_else(|| AciError::InvalidSyntax(text.to_string()))?;
            let op = TargetOperator::decode(keyword, op)?;
            let expr = cur
                .read_quoted()
                .ok_or_else(|| AciError::InvalidSyntax(text.to_string()))?;
            if !cur.eat(')') {
                return Err(AciError::InvalidSyntax(text.to_string()));
            }
            targets.set(keyword, op, expr, aci_dn)?;
        }
        Ok(targets)
    }

    fn set(
        &mut self,
        keyword: TargetKeyword,
        op: TargetOperator,
        expr: &str,
        aci_dn: &Dn,
    ) -> Result<(), AciError> {
        let dup = || AciError::DuplicateTargetKeyword(keyword.as_str().to_string());
        match keyword {
            TargetKeyword::Target => {
                if self.target.is_some() {
                    return Err(dup());
                }
                self.target = Some(Target::decode(op, expr, aci_dn)?);
            }
            TargetKeyword::TargetAttr => {
                if self.targetattr.is_some() {
                    return Err(dup());
                }
                self.targetattr = Some(TargetAttr::decode(op, expr)?);
            }
            TargetKeyword::TargetScope => {
                if self.targetscope.is_some() {
                    return Err(dup());
                }
                self.targetscope = Some(decode_scope(expr)?);
            }
            TargetKeyword::TargetFilter => {
                if self.targetfilter.is_some() {
                    return Err(dup());
                }
                let filter = Filter::from_str(expr)
                    .map_err(|_| AciError::InvalidTargetFilter(expr.to_string()))?;
                self.targetfilter = Some(TargetFilter {
                    op,
                    filter,
                    raw: expr.trim().to_string(),
                });
            }
            TargetKeyword::TargAttrFilters => {
                if self.targattrfilters.is_some() {
                    return Err(dup());
                }
                self.targattrfilters = Some(TargAttrFilters::decode(expr)?);
            }
            TargetKeyword::TargetControl => {
                if self.targetcontrol.is_some() {
                    return Err(dup());
                }
                self.targetcontrol = Some(OidList::decode(op, expr)?);
            }
            TargetKeyword::ExtOp => {
                if self.extop.is_some() {
                    return Err(dup());
                }
                self.extop = Some(OidList::decode(op, expr)?);
            }
        }
        Ok(())
    }

    pub fn has_targetattr(&self) -> bool {
        self.targetattr.is_some()
    }

    pub fn targattrfilters(&self) -> Option<&TargAttrFilters> {
        self.targattrfilters.as_ref()
    }

    pub fn has_targetcontrol(&self) -> bool {
        self.targetcontrol.is_some()
    }

    pub fn has_extop(&self) -> bool {
        self.extop.is_some()
    }

    pub fn scope(&self) -> SearchScope {
        self.targetscope.unwrap_or(SearchScope::Subtree)
    }

    /// Does the ACI held at `aci_dn` reach `entry_dn` through its `target` and
    /// `targetscope`. An equality target on a plain DN moves the scope anchor
    /// to that DN.
    pub fn is_target_applicable(&self, aci_dn: &Dn, entry_dn: &Dn) -> bool {
        let anchor = match &self.target {
            Some(Target {
                op: TargetOperator::Eq,
                dn: TargetDn::Dn(dn),
                ..
            }) => dn,
            _ => aci_dn,
        };
        if !self.scope().contains(anchor, entry_dn) {
            return false;
        }
        match &self.target {
            None => true,
            Some(t) => match &t.dn {
                TargetDn::Pattern(p) => t.op.apply(p.matches_suffix(entry_dn)),
                TargetDn::Dn(dn) => match t.op {
                    TargetOperator::Eq => true,
                    TargetOperator::NotEq => !entry_dn.is_descendant_of(dn),
                },
            },
        }
    }

    pub fn is_targetfilter_applicable(&self, resource: &Entry) -> bool {
        match &self.targetfilter {
            None => true,
            Some(tf) => tf.op.apply(resource.entry_match_no_index(&tf.filter)),
        }
    }

    pub fn is_targetcontrol_applicable(&self, oid: Option<&str>) -> bool {
        self.targetcontrol
            .as_ref()
            .map(|t| t.is_applicable(oid))
            .unwrap_or(false)
    }

    pub fn is_extop_applicable(&self, oid: Option<&str>) -> bool {
        self.extop
            .as_ref()
            .map(|t| t.is_applicable(oid))
            .unwrap_or(false)
    }

    /// Decide whether the attribute under test is covered. `aci_rights` are all
    /// the rights the owning ACI grants or denies.
    pub(crate) fn is_target_attr_applicable(&self, aci_rights: Rights, c: &mut AciContainer) -> bool {
        let attr = c.current_attr().map(AttrString::from);
        match (attr, &self.targetattr) {
            (Some(attr), Some(ta)) => ta.is_applicable(&attr, c),
            (None, None) => true,
            (attr, ta) => {
                let entry_rights = Rights::ADD | Rights::DELETE | Rights::PROXY;
                if aci_rights.has_rights(entry_rights) && c.has_rights(entry_rights) {
                    return true;
                }
                match (attr, ta) {
                    (Some(attr), None) => match &self.targattrfilters {
                        Some(taf) => taf.has_attr(&attr),
                        None if c.is_first_attr() => {
                            c.scratch.entry_test_rule = true;
                            true
                        }
                        None => false,
                    },
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for AciTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(t) = &self.target {
            write!(f, "(target{}\"{}\")", t.op.as_str(), t.raw)?;
        }
        if let Some(s) = self.targetscope {
            write!(f, "(targetscope=\"{}\")", scope_keyword(s))?;
        }
        if let Some(t) = &self.targetattr {
            write!(f, "(targetattr{}\"{}\")", t.op.as_str(), t.raw)?;
        }
        if let Some(t) = &self.targetfilter {
            write!(f, "(targetfilter{}\"{}\")", t.op.as_str(), t.raw)?;
        }
        if let Some(t) = &self.targattrfilters {
            write!(f, "(targattrfilters=\"{}\")", t)?;
        }
        if let Some(t) = &self.targetcontrol {
            write!(f, "(targetcontrol{}\"{}\")", t.op.as_str(), t.raw)?;
        }
        if let Some(t) = &self.extop {
            write!(f, "(extop{}\"{}\")", t.op.as_str(), t.raw)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::AciTargets;
    use crate::access::container::AciContainer;
    use crate::access::lexer::Cursor;
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    fn targets(text: &str, aci_dn: &str) -> Result<AciTargets, AciError> {
        let mut cur = Cursor::new(text);
        AciTargets::decode(&mut cur, text, &dn!(aci_dn))
    }

    #[test]
    fn test_targets_decode() {
        let t = targets(
            "(target=\"ldap:///ou=people,dc=example,dc=com\")(targetattr = \"cn||sn\")(TargetScope=\"onelevel\")(version 3.0;",
            "dc=example,dc=com",
        )
        .unwrap();
        assert_eq!(t.scope(), SearchScope::OneLevel);
        assert!(t.has_targetattr());
        assert_eq!(
            t.to_string(),
            "(target=\"ldap:///ou=people,dc=example,dc=com\")(targetscope=\"onelevel\")(targetattr=\"cn||sn\")"
        );

        let t = targets("(version 3.0;", "dc=example,dc=com").unwrap();
        assert_eq!(t, AciTargets::default());
        assert_eq!(t.scope(), SearchScope::Subtree);
    }

    #[test]
    fn test_targets_decode_invalid() {
        let d = "dc=example,dc=com";
        assert!(matches!(
            targets("(target=\"ldap:///ou=people,dc=other,dc=com\")(version", d),
            Err(AciError::TargetNotDescendant { .. })
        ));
        // Patterns are not held to the descendant rule.
        assert!(targets("(target=\"ldap:///uid=*,dc=other,dc=com\")(version", d).is_ok());
        for bad in [
            "(target=\"ldap:///\")(version",
            "(target=\"ldap:///not a DN\")(version",
            "(target=\"ldap:///cn=\")(version",
            "(target=\"ou=people,dc=example,dc=com\")(version",
            "(targetattr=\"\")(version",
            "(targetattr=\"not an attr\")(version",
            "(targetattr=\"cn ||\")(version",
            "(targetattr=\"not/an/attr\")(version",
            "(targetattr=\"locality;lang-fr-ca\")(version",
            "(targetfilter=\"this is a bad filter\")(version",
            "(targetscope=\"sub_tree\")(version",
            "(targetscope!=\"base\")(version",
            "(targetcontrol=\"not.an.oid\")(version",
            "(extop=\"1..2\")(version",
            "(targetattr>=\"cn\")(version",
            "(targetattr=cn)(version",
            "(targetattr=\"cn\"(version",
        ] {
            assert!(targets(bad, d).is_err(), "{}", bad);
        }
        assert_eq!(
            targets("(bogus=\"x\")(version", d),
            Err(AciError::InvalidTargetKeyword("bogus".to_string()))
        );
        assert_eq!(
            targets("(targetattr=\"cn\")(targetattr=\"sn\")(version", d),
            Err(AciError::DuplicateTargetKeyword("targetattr".to_string()))
        );
    }

    #[test]
    fn test_target_scope_applicable() {
        let aci_dn = dn!("dc=example,dc=com");
        let people = dn!("ou=people,dc=example,dc=com");
        let bob = dn!("uid=bob,ou=people,dc=example,dc=com");
        let deep = dn!("cn=x,uid=bob,ou=people,dc=example,dc=com");
        let other = dn!("ou=groups,dc=example,dc=com");

        let t = targets("(version", "dc=example,dc=com").unwrap();
        assert!(t.is_target_applicable(&aci_dn, &aci_dn));
        assert!(t.is_target_applicable(&aci_dn, &deep));
        assert!(!t.is_target_applicable(&aci_dn, &dn!("dc=other,dc=com")));

        let t = targets(
            "(target=\"ldap:///ou=people,dc=example,dc=com\")(version",
            "dc=example,dc=com",
        )
        .unwrap();
        assert!(t.is_target_applicable(&aci_dn, &people));
        assert!(t.is_target_applicable(&aci_dn, &bob));
        assert!(!t.is_target_applicable(&aci_dn, &other));

        let t = targets(
            "(target=\"ldap:///ou=people,dc=example,dc=com\")(targetscope=\"onelevel\")(version",
            "dc=example,dc=com",
        )
        .unwrap();
        assert!(!t.is_target_applicable(&aci_dn, &people));
        assert!(t.is_target_applicable(&aci_dn, &bob));
        assert!(!t.is_target_applicable(&aci_dn, &deep));

        let t = targets(
            "(target=\"ldap:///ou=people,dc=example,dc=com\")(targetscope=\"subordinate\")(version",
            "dc=example,dc=com",
        )
        .unwrap();
        assert!(!t.is_target_applicable(&aci_dn, &people));
        assert!(t.is_target_applicable(&aci_dn, &deep));

        let t = targets("(targetscope=\"base\")(version", "dc=example,dc=com").unwrap();
        assert!(t.is_target_applicable(&aci_dn, &aci_dn));
        assert!(!t.is_target_applicable(&aci_dn, &people));

        let t = targets(
            "(target!=\"ldap:///ou=people,dc=example,dc=com\")(version",
            "dc=example,dc=com",
        )
        .unwrap();
        assert!(!t.is_target_applicable(&aci_dn, &bob));
        assert!(t.is_target_applicable(&aci_dn, &other));

        let t = targets(
            "(target=\"ldap:///uid=*,ou=people,dc=example,dc=com\")(version",
            "dc=example,dc=com",
        )
        .unwrap();
        assert!(t.is_target_applicable(&aci_dn, &bob));
        assert!(t.is_target_applicable(&aci_dn, &deep));
        assert!(!t.is_target_applicable(&aci_dn, &people));
    }

    #[test]
    fn test_targetattr_applicable() {
        let dir = TestDirectory::default();
        let anon = Identity::anonymous();
        let conn = ConnectionInfo::default();
        let schema = Schema::default();
        let res = entry_init!("cn=res,dc=example,dc=com", ("cn", "res"));
        let op = OperationContext::new(OperationKind::Search, &anon, &conn, &dir, &dir);

        let check = |text: &str, attr: &str| {
            let t = targets(text, "dc=example,dc=com").unwrap();
            let mut c = AciContainer::new(&op, &res, &schema, Rights::READ);
            c.set_current_attr(Some(attr));
            t.is_target_attr_applicable(Rights::READ, &mut c)
        };

        assert!(check("(targetattr=\"cn||sn\")(version", "cn"));
        assert!(check("(targetattr=\"cn||sn\")(version", "SN;lang-en"));
        assert!(!check("(targetattr=\"cn||sn\")(version", "mail"));
        assert!(check("(targetattr=\"*\")(version", "mail"));
        assert!(!check("(targetattr=\"*\")(version", "modifytimestamp"));
        assert!(check("(targetattr=\"+\")(version", "modifytimestamp"));
        assert!(check("(targetattr=\"modifytimestamp\")(version", "modifytimestamp"));
        assert!(check("(targetattr!=\"cn\")(version", "sn"));
        assert!(!check("(targetattr!=\"cn\")(version", "cn"));
        assert!(!check("(targetattr!=\"cn\")(version", "modifytimestamp"));

        // No targetattr: only the first attribute matches, as an entry test rule.
        let t = targets("(version", "dc=example,dc=com").unwrap();
        let mut c = AciContainer::new(&op, &res, &schema, Rights::READ);
        c.set_current_attr(Some("cn"));
        c.set_first_attr(true);
        assert!(t.is_target_attr_applicable(Rights::READ, &mut c));
        assert!(c.has_entry_test_rule());
        c.set_first_attr(false);
        assert!(!t.is_target_attr_applicable(Rights::READ, &mut c));

        // A targetattr without an attribute under test only passes for entry
        // level rights.
        let t = targets("(targetattr=\"cn\")(version", "dc=example,dc=com").unwrap();
        let mut c = AciContainer::new(&op, &res, &schema, Rights::READ);
        assert!(!t.is_target_attr_applicable(Rights::READ, &mut c));
        let mut c = AciContainer::new(&op, &res, &schema, Rights::ADD);
        assert!(t.is_target_attr_applicable(Rights::ADD | Rights::READ, &mut c));
    }

    #[test]
    fn test_targetfilter_and_oids() {
        let person = entry_init!("uid=a,dc=example,dc=com", ("objectclass", "person"));
        let group = entry_init!("cn=g,dc=example,dc=com", ("objectclass", "groupofnames"));

        let t = targets("(targetfilter=\"(objectclass=person)\")(version", "dc=example,dc=com")
            .unwrap();
        assert!(t.is_targetfilter_applicable(&person));
        assert!(!t.is_targetfilter_applicable(&group));
        let t = targets("(targetfilter!=\"(objectclass=person)\")(version", "dc=example,dc=com")
            .unwrap();
        assert!(!t.is_targetfilter_applicable(&person));
        assert!(t.is_targetfilter_applicable(&group));

        let t = targets(
            "(targetcontrol=\"1.2.3 || 1.2.4\")(extop!=\"1.3.6.1.4.1.4203.1.11.1\")(version",
            "dc=example,dc=com",
        )
        .unwrap();
        assert!(t.is_targetcontrol_applicable(Some("1.2.4")));
        assert!(!t.is_targetcontrol_applicable(Some("1.2.5")));
        assert!(!t.is_targetcontrol_applicable(None));
        assert!(t.is_extop_applicable(Some(OID_WHO_AM_I)));
        assert!(!t.is_extop_applicable(Some(OID_PASSWORD_MODIFY)));

        let t = targets("(extop=\"*\")(version", "dc=example,dc=com").unwrap();
        assert!(t.is_extop_applicable(Some("9.9.9")));
        assert!(!t.is_targetcontrol_applicable(Some("9.9.9")));
    }
}
