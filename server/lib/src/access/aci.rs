//! A decoded access control instruction.
//!
//! ```text
//! (targetattr="cn||sn")(version 3.0; acl "people read"; allow (read,search) userdn="ldap:///anyone";)
//! ```
//!
//! An ACI is a set of targets followed by one or more permission / bind rule
//! pairs. It is decoded once from an `aci` value and is immutable afterwards, so a
//! single [`Aci`] is shared between all concurrent evaluations through an `Arc`.

use std::fmt;

use crate::access::bindrule::{BindRule, EvalResult};
use crate::access::container::AciContainer;
use crate::access::lexer::Cursor;
use crate::access::targets::AciTargets;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermBindRulePair {
    access: AccessType,
    rights: Rights,
    bind_rule: BindRule,
}

impl PermBindRulePair {
    fn decode(cur: &mut Cursor, text: &str) -> Result<Self, AciError> {
        let syntax = || AciError::InvalidSyntax(text.to_string());
        cur.skip_ws();
        let word = cur.take_while(|c| c.is_ascii_alphabetic());
        if word.is_empty() {
            return Err(syntax());
        }
        let access = AccessType::decode(word)?;
        if !cur.eat('(') {
            return Err(syntax());
        }
        let rights = cur.take_until_unquoted(')').ok_or_else(syntax)?;
        let rights = Rights::decode_list(rights)?;
        cur.eat(')');
        let rule = cur.take_until_unquoted(';').ok_or_else(syntax)?;
        let bind_rule = BindRule::decode(rule)?;
        cur.eat(';');
        Ok(PermBindRulePair {
            access,
            rights,
            bind_rule,
        })
    }

    pub fn access(&self) -> AccessType {
        self.access
    }

    pub fn rights(&self) -> Rights {
        self.rights
    }

    pub fn bind_rule(&self) -> &BindRule {
        &self.bind_rule
    }
}

impl fmt::Display for PermBindRulePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {};", self.access, self.rights, self.bind_rule)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aci {
    name: String,
    /// The entry holding this ACI, or the root DN for global ACIs.
    dn: Dn,
    targets: AciTargets,
    pairs: Vec<PermBindRulePair>,
    /// Union of the rights of every pair.
    rights: Rights,
}

impl Aci {
    /// Decode an `aci` value held on the entry `dn`.
    pub fn decode(text: &str, dn: &Dn) -> Result<Self, AciError> {
        let input = text.trim();
        let syntax = || AciError::InvalidSyntax(input.to_string());
        let mut cur = Cursor::new(input);

        let targets = AciTargets::decode(&mut cur, input, dn)?;

        if !cur.eat('(') || !cur.eat_ci("version") {
            return Err(syntax());
        }
        cur.skip_ws();
        let version = cur.take_while(|c| c.is_ascii_digit() || c == '.');
        if version != ACI_VERSION {
            return Err(AciError::InvalidVersion(version.to_string()));
        }
        if !cur.eat(';') || !cur.eat_word_ci("acl") {
            return Err(syntax());
        }
        let name = cur.read_quoted().ok_or_else(syntax)?;
        if !cur.eat(';') {
            return Err(syntax());
        }

        let mut pairs = Vec::new();
        while !cur.eat(')') {
            if cur.is_empty() {
                return Err(syntax());
            }
            pairs.push(PermBindRulePair::decode(&mut cur, input)?);
        }
        cur.skip_ws();
        if pairs.is_empty() || !cur.is_empty() {
            return Err(syntax());
        }

        let rights = pairs
            .iter()
            .fold(Rights::empty(), |acc, p| acc | p.rights);
        Ok(Aci {
            name: name.to_string(),
            dn: dn.clone(),
            targets,
            pairs,
            rights,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn targets(&self) -> &AciTargets {
        &self.targets
    }

    pub fn pairs(&self) -> &[PermBindRulePair] {
        &self.pairs
    }

    pub fn rights(&self) -> Rights {
        self.rights
    }

    pub fn has_access_type(&self, access: AccessType) -> bool {
        self.pairs.iter().any(|p| p.access == access)
    }

    /// Is this ACI a candidate for the check described by `c`. Applicability
    /// depends only on targets and rights, never on who the client is.
    pub(crate) fn is_applicable(aci: &Arc<Aci>, c: &mut AciContainer) -> bool {
        let rights = c.rights();
        let t = &aci.targets;

        if rights.contains(Rights::EXT_OP) {
            return t.is_extop_applicable(c.extop_oid());
        }
        if rights.contains(Rights::CONTROL) {
            return t.is_targetcontrol_applicable(c.control_oid())
                && t.is_target_applicable(&aci.dn, c.resource_dn());
        }
        // extop and targetcontrol ACIs only ever speak to those checks.
        if t.has_extop() || t.has_targetcontrol() {
            return false;
        }

        if !aci.rights.has_rights(rights) {
            return false;
        }
        if !t.is_target_applicable(&aci.dn, c.resource_dn()) {
            return false;
        }
        if !t.is_targetfilter_applicable(c.resource()) {
            return false;
        }
        if let Some(taf) = t.targattrfilters() {
            if !taf.is_applicable(aci, c) {
                return false;
            }
        }
        t.is_target_attr_applicable(aci.rights, c)
    }

    /// Evaluate the bind rules of the pairs with `access` that cover the rights
    /// under test. Stops at the first pair that is not false.
    pub(crate) fn evaluate(&self, access: AccessType, c: &AciContainer) -> EvalResult {
        let mut res = EvalResult::False;
        for p in self
            .pairs
            .iter()
            .filter(|p| p.access == access && p.rights.has_rights(c.rights()))
        {
            res = p.bind_rule.evaluate(c);
            if res != EvalResult::False {
                break;
            }
        }
        res
    }
}

impl fmt::Display for Aci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(version {}; acl \"{}\";", self.targets, ACI_VERSION, self.name)?;
        for p in &self.pairs {
            write!(f, " {}", p)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use crate::access::bindrule::EvalResult;
    use crate::access::container::AciContainer;
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    macro_rules! acl_decode_ok {
        ($dn:expr, $text:expr) => {{
            let dn = dn!($dn);
            let aci = Aci::decode($text, &dn);
            debug!("{:?} <- {}", aci, $text);
            assert!(aci.is_ok(), "{:?} {}", aci, $text);
            let aci = aci.unwrap();
            // The canonical form decodes to the same rule.
            let canonical = aci.to_string();
            assert_eq!(Aci::decode(&canonical, &dn).as_ref(), Ok(&aci), "{}", canonical);
            aci
        }};
    }

    macro_rules! acl_decode_err {
        ($dn:expr, $text:expr) => {{
            let r = Aci::decode($text, &dn!($dn));
            debug!("{:?} <- {}", r, $text);
            assert!(r.is_err(), "{}", $text);
        }};
        ($dn:expr, $text:expr, $err:pat) => {{
            let r = Aci::decode($text, &dn!($dn));
            debug!("{:?} <- {}", r, $text);
            assert!(matches!(r, Err($err)), "{:?} {}", r, $text);
        }};
    }

    const BASE: &str = "dc=example,dc=com";

    #[test]
    fn test_aci_decode_valid() {
        sketching::test_init();

        let aci = acl_decode_ok!(
            BASE,
            "(targetattr=\"cn\")(version 3.0; acl \"t1\"; allow (read) userdn=\"ldap:///anyone\";)"
        );
        assert_eq!(aci.name(), "t1");
        assert_eq!(aci.dn(), &dn!(BASE));
        assert_eq!(aci.pairs().len(), 1);
        assert_eq!(aci.rights(), Rights::READ);
        assert_eq!(
            aci.to_string(),
            "(targetattr=\"cn\")(version 3.0; acl \"t1\"; allow (read) userdn=\"ldap:///anyone\";)"
        );

        let aci = acl_decode_ok!(
            BASE,
            "(target=\"ldap:///ou=people,dc=example,dc=com\")(targetattr=\"*\")(targetfilter=\"(objectclass=person)\")
             (version 3.0; acl \"self write\"; allow (write) userdn=\"ldap:///self\"; deny (write) ip=\"10.*\" and not ssf>=\"128\";)"
        );
        assert!(aci.has_access_type(AccessType::Allow));
        assert!(aci.has_access_type(AccessType::Deny));
        assert_eq!(aci.pairs().len(), 2);

        // No targets, no spaces, empty names and mixed case keywords.
        acl_decode_ok!(BASE, "(version3.0;acl\"\";allow(all)userdn=\"ldap:///all\";)");
        acl_decode_ok!(
            BASE,
            "(TargetAttr=\"cn || sn\")(VERSION 3.0; ACL \"x\"; ALLOW (Read, Search) UserDN=\"ldap:///anyone\";)"
        );
        acl_decode_ok!(
            BASE,
            "(targetscope=\"onelevel\")(version 3.0; acl \"a\"; allow (read) not authmethod=\"simple\" and not authmethod=\"ssl\";)"
        );
        acl_decode_ok!(
            BASE,
            "(targattrfilters=\"add=mail:(mail=*@example.com), del=mail:(mail=*)\")(version 3.0; acl \"f\"; allow (write) groupdn=\"ldap:///cn=admins,dc=example,dc=com\";)"
        );
        acl_decode_ok!(
            BASE,
            "(extop=\"1.3.6.1.4.1.4203.1.11.1\")(version 3.0; acl \"pwmod\"; allow (read) userdn=\"ldap:///all\";)"
        );
        acl_decode_ok!(
            BASE,
            "(targetcontrol=\"2.16.840.1.113730.3.4.18 || 1.3.6.1.4.1.42.2.27.9.5.2\")(version 3.0; acl \"ctl\"; allow (read) userdn=\"ldap:///all\";)"
        );
        // A bind rule URL may hold ; and ) inside its quotes.
        acl_decode_ok!(
            BASE,
            "(version 3.0; acl \"url\"; allow (read) userdn=\"ldap:///ou=people,dc=example,dc=com??sub?(|(cn=a;b)(cn=*admin*))\";)"
        );
        acl_decode_ok!(
            BASE,
            "(version 3.0; acl \"times\"; allow (read) (dayofweek=\"mon,tue,wed,thu,fri\" and timeofday>=\"0800\" and timeofday<\"1800\") or userattr=\"parent[0,1].manager#USERDN\";)"
        );
        // Global ACIs are held at the root and may target anything.
        acl_decode_ok!(
            "",
            "(target=\"ldap:///dc=example,dc=com\")(version 3.0; acl \"global\"; allow (read) userdn=\"ldap:///anyone\";)"
        );
    }

    #[test]
    fn test_aci_decode_invalid() {
        sketching::test_init();

        // Missing pieces.
        acl_decode_err!(BASE, "");
        acl_decode_err!(BASE, "(targetattr=\"cn\")");
        acl_decode_err!(BASE, "(version 3.0; acl \"t\";)");
        acl_decode_err!(BASE, "(version 3.0; allow (read) userdn=\"ldap:///anyone\";)");
        acl_decode_err!(BASE, "(version 3.0; acl \"t\"; allow (read) userdn=\"ldap:///anyone\")");
        acl_decode_err!(BASE, "(version 3.0; acl \"t\"; allow (read) userdn=\"ldap:///anyone\";");
        acl_decode_err!(BASE, "(version 3.0; acl \"t\"; allow read userdn=\"ldap:///anyone\";)");
        acl_decode_err!(BASE, "(version 3.0; acl t; allow (read) userdn=\"ldap:///anyone\";)");
        acl_decode_err!(BASE, "(version 3.0 acl \"t\"; allow (read) userdn=\"ldap:///anyone\";)");
        acl_decode_err!(BASE, "(version 3.0; acl \"t\"; allow (read) userdn=\"ldap:///anyone\";) junk");

        acl_decode_err!(
            BASE,
            "(version 2.0; acl \"t\"; allow (read) userdn=\"ldap:///anyone\";)",
            AciError::InvalidVersion(_)
        );
        acl_decode_err!(
            BASE,
            "(version 3.0; acl \"t\"; allows (read) userdn=\"ldap:///anyone\";)",
            AciError::InvalidPermission(_)
        );
        acl_decode_err!(
            BASE,
            "(version 3.0; acl \"t\"; allow (foo) userdn=\"ldap:///anyone\";)",
            AciError::InvalidRights(_)
        );
        acl_decode_err!(
            BASE,
            "(version 3.0; acl \"t\"; allow (read) roledn=\"ldap:///cn=r,dc=example,dc=com\";)",
            AciError::UnsupportedRoleDn(_)
        );
        acl_decode_err!(
            BASE,
            "(target=\"ldap:///dc=other,dc=com\")(version 3.0; acl \"t\"; allow (read) userdn=\"ldap:///anyone\";)",
            AciError::TargetNotDescendant { .. }
        );
        acl_decode_err!(
            BASE,
            "(targetattr=\"cn\")(targetattr=\"sn\")(version 3.0; acl \"t\"; allow (read) userdn=\"ldap:///anyone\";)",
            AciError::DuplicateTargetKeyword(_)
        );
        acl_decode_err!(
            BASE,
            "(targetbogus=\"cn\")(version 3.0; acl \"t\"; allow (read) userdn=\"ldap:///anyone\";)",
            AciError::InvalidTargetKeyword(_)
        );
        acl_decode_err!(
            BASE,
            "(version 3.0; acl \"t\"; allow (read) dns=a;)",
            AciError::InvalidBindRule(_)
        );
        acl_decode_err!(
            BASE,
            "(version 3.0; acl \"t\"; allow (read) ssf>=\"4096\";)",
            AciError::InvalidSsf(_)
        );
        acl_decode_err!(
            BASE,
            "(version 3.0; acl \"t\"; allow (read) timeofday=\"2400\";)",
            AciError::InvalidTimeOfDay(_)
        );
    }

    #[test]
    fn test_aci_decode_any_char_removed() {
        // Dropping any structural character from a valid ACI must not decode to
        // something else silently.
        let valid = "(targetattr=\"cn\")(version 3.0; acl \"\"; allow (read) userdn=\"ldap:///anyone\";)";
        assert!(Aci::decode(valid, &dn!(BASE)).is_ok());
        for (i, c) in valid.char_indices() {
            if !"()\";=".contains(c) {
                continue;
            }
            let mut broken = valid.to_string();
            broken.remove(i);
            assert!(Aci::decode(&broken, &dn!(BASE)).is_err(), "{}", broken);
        }
    }

    #[test]
    fn test_aci_is_applicable() {
        let dir = TestDirectory::default();
        let anon = Identity::anonymous();
        let conn = ConnectionInfo::default();
        let schema = Schema::default();
        let res = entry_init!("cn=res,ou=people,dc=example,dc=com", ("objectclass", "person"));
        let op = OperationContext::new(OperationKind::Search, &anon, &conn, &dir, &dir);
        let base = dn!(BASE);

        let read_cn = Arc::new(
            Aci::decode(
                "(targetattr=\"cn\")(version 3.0; acl \"r\"; allow (read) userdn=\"ldap:///anyone\";)",
                &base,
            )
            .unwrap(),
        );
        let extop = Arc::new(
            Aci::decode(
                "(extop=\"1.2.3\")(version 3.0; acl \"e\"; allow (read) userdn=\"ldap:///anyone\";)",
                &base,
            )
            .unwrap(),
        );

        let mut c = AciContainer::new(&op, &res, &schema, Rights::READ);
        c.set_current_attr(Some("cn"));
        assert!(Aci::is_applicable(&read_cn, &mut c));
        assert!(!Aci::is_applicable(&extop, &mut c));
        c.set_current_attr(Some("sn"));
        assert!(!Aci::is_applicable(&read_cn, &mut c));

        let mut c = AciContainer::new(&op, &res, &schema, Rights::WRITE);
        c.set_current_attr(Some("cn"));
        assert!(!Aci::is_applicable(&read_cn, &mut c));

        let mut c = AciContainer::new(&op, &res, &schema, Rights::READ | Rights::EXT_OP);
        c.set_extop_oid(Some("1.2.3"));
        assert!(Aci::is_applicable(&extop, &mut c));
        assert!(!Aci::is_applicable(&read_cn, &mut c));
        c.set_extop_oid(Some("1.2.4"));
        assert!(!Aci::is_applicable(&extop, &mut c));
    }

    #[test]
    fn test_aci_evaluate_pairs() {
        let dir = TestDirectory::default();
        let anon = Identity::anonymous();
        let conn = ConnectionInfo::new(Some(std::net::IpAddr::from([10, 0, 0, 1])), 0);
        let schema = Schema::default();
        let res = entry_init!("cn=res,dc=example,dc=com");
        let op = OperationContext::new(OperationKind::Search, &anon, &conn, &dir, &dir);

        let aci = Aci::decode(
            "(version 3.0; acl \"p\"; allow (read) ip=\"192.168.*\"; allow (read,search) ip=\"10.*\"; deny (write) userdn=\"ldap:///anyone\";)",
            &dn!(BASE),
        )
        .unwrap();

        let c = AciContainer::new(&op, &res, &schema, Rights::READ);
        assert_eq!(aci.evaluate(AccessType::Allow, &c), EvalResult::True);
        assert_eq!(aci.evaluate(AccessType::Deny, &c), EvalResult::False);

        let c = AciContainer::new(&op, &res, &schema, Rights::WRITE);
        assert_eq!(aci.evaluate(AccessType::Allow, &c), EvalResult::False);
        assert_eq!(aci.evaluate(AccessType::Deny, &c), EvalResult::True);
    }
}
