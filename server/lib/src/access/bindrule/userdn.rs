//! `userdn="ldap:///uid=bob,ou=people,dc=example,dc=com || ldap:///self"`

use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::access::pattern::{has_wildcard, PatternDn};
use crate::prelude::*;

const LDAP_URL_PREFIX: &str = "ldap:///";

#[derive(Debug, Clone, PartialEq, Eq)]
enum UserDnType {
    SelfDn,
    All,
    Anyone,
    Parent,
    Dn(Dn),
    Pattern(PatternDn),
    Url(LdapUrl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDn {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    urls: Vec<UserDnType>,
}

/// Strip the `ldap:///` prefix every userdn, groupdn and target value carries.
pub(crate) fn strip_ldap_prefix(s: &str) -> Option<&str> {
    let s = s.trim();
    match s.get(..LDAP_URL_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(LDAP_URL_PREFIX) => {
            Some(&s[LDAP_URL_PREFIX.len()..])
        }
        _ => None,
    }
}

impl UserDn {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let bad = || AciError::InvalidUserDn(expr.to_string());
        let mut urls = Vec::new();
        for part in expr.split("||") {
            let part = part.trim();
            let rest = strip_ldap_prefix(part).ok_or_else(bad)?;
            let kind = match rest.to_lowercase().as_str() {
                "self" => UserDnType::SelfDn,
                "all" => UserDnType::All,
                "anyone" => UserDnType::Anyone,
                "parent" => UserDnType::Parent,
                "" => return Err(bad()),
                _ if rest.contains('?') => {
                    UserDnType::Url(LdapUrl::from_str(part).map_err(|_| bad())?)
                }
                _ if has_wildcard(rest) => {
                    UserDnType::Pattern(PatternDn::decode(rest).map_err(|_| bad())?)
                }
                _ => UserDnType::Dn(Dn::from_str(rest).map_err(|_| bad())?),
            };
            urls.push(kind);
        }
        Ok(UserDn {
            op,
            expr: expr.trim().to_string(),
            urls,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        let Some(client_dn) = c.client_dn() else {
            // Only anyone applies to an unauthenticated client.
            let matched = self.urls.iter().any(|u| matches!(u, UserDnType::Anyone));
            return EvalResult::from_bool(matched).get_ret(self.op, false);
        };

        let mut matched = EvalResult::False;
        let mut undefined = false;
        for url in &self.urls {
            matched = match url {
                UserDnType::Anyone | UserDnType::All => EvalResult::True,
                UserDnType::SelfDn => EvalResult::from_bool(client_dn == c.resource_dn()),
                UserDnType::Parent => {
                    EvalResult::from_bool(c.resource_dn().parent().as_ref() == Some(client_dn))
                }
                UserDnType::Dn(dn) => {
                    let dir = c.directory();
                    let rule_dn = dir.actual_root_bind_dn(dn).unwrap_or_else(|| dn.clone());
                    let client = dir
                        .actual_root_bind_dn(client_dn)
                        .unwrap_or_else(|| client_dn.clone());
                    EvalResult::from_bool(rule_dn == client)
                }
                UserDnType::Pattern(p) => EvalResult::from_bool(p.matches(client_dn)),
                UserDnType::Url(u) => Self::evaluate_url(u, client_dn, c),
            };
            match matched {
                EvalResult::True => break,
                EvalResult::Fail => {
                    undefined = true;
                    break;
                }
                EvalResult::False => {}
            }
        }
        matched.get_ret(self.op, undefined)
    }

    fn evaluate_url(url: &LdapUrl, client_dn: &Dn, c: &AciContainer) -> EvalResult {
        if !url.in_scope(client_dn) {
            return EvalResult::False;
        }
        match c.resolve_client_entry() {
            Ok(Some(e)) => EvalResult::from_bool(e.entry_match_no_index(&url.filter)),
            Ok(None) => {
                request_trace!(%client_dn, "client entry not found for userdn url");
                EvalResult::Fail
            }
            Err(e) => {
                request_warn!(?e, %client_dn, "unable to fetch client entry for userdn url");
                EvalResult::Fail
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::access::bindrule::tests::{eval_rule, test_conn};
    use crate::access::bindrule::{BindRuleType, EvalResult};
    use crate::access::bindrule::userdn::UserDn;
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    fn setup() -> (TestDirectory, Arc<Entry>) {
        let mut dir = TestDirectory::default();
        let bob = dir.add(entry_init!(
            "uid=bob,ou=people,dc=example,dc=com",
            ("objectclass", "person"),
            ("l", "Brisbane")
        ));
        dir.add_root_alias(dn!("cn=Directory Manager"), dn!("cn=Directory Manager,cn=Root DNs,cn=config"));
        (dir, bob)
    }

    #[test]
    fn test_userdn_decode() {
        assert!(UserDn::decode("ldap:///self", BindRuleType::Eq).is_ok());
        assert!(UserDn::decode("LDAP:///Anyone || ldap:///parent", BindRuleType::Eq).is_ok());
        assert!(UserDn::decode("ldap:///uid=*,ou=people,dc=example,dc=com", BindRuleType::Eq).is_ok());
        assert!(UserDn::decode("ldap:///ou=people,dc=example,dc=com??sub?(l=brisbane)", BindRuleType::Eq).is_ok());
        assert!(UserDn::decode("uid=bob,dc=example", BindRuleType::Eq).is_err());
        assert!(UserDn::decode("ldap:///", BindRuleType::Eq).is_err());
        assert!(UserDn::decode("ldap:///not a dn", BindRuleType::Eq).is_err());
        assert!(UserDn::decode("ldap:///self ||", BindRuleType::Eq).is_err());
    }

    #[test]
    fn test_userdn_evaluate() {
        sketching::test_init();
        let (dir, bob) = setup();
        let conn = test_conn();
        let ident = Identity::from_entry(bob.clone(), AuthType::Simple);
        let people = entry_init!("ou=people,dc=example,dc=com");
        let other = entry_init!("uid=alice,ou=people,dc=example,dc=com");
        let eval = |r: &str, res: &Entry| {
            eval_rule(r, OperationKind::Search, &ident, &conn, &dir, res)
        };

        assert_eq!(eval("userdn=\"ldap:///self\"", &*bob), EvalResult::True);
        assert_eq!(eval("userdn=\"ldap:///self\"", &other), EvalResult::False);
        assert_eq!(eval("userdn!=\"ldap:///self\"", &other), EvalResult::True);
        assert_eq!(eval("userdn=\"ldap:///all\"", &other), EvalResult::True);
        assert_eq!(eval("userdn=\"ldap:///anyone\"", &other), EvalResult::True);
        assert_eq!(eval("userdn=\"ldap:///parent\"", &people), EvalResult::False);
        let child = entry_init!("cn=device,uid=bob,ou=people,dc=example,dc=com");
        assert_eq!(eval("userdn=\"ldap:///parent\"", &child), EvalResult::True);
        assert_eq!(
            eval("userdn=\"ldap:///UID=Bob, ou=People,dc=example,dc=com\"", &other),
            EvalResult::True
        );
        assert_eq!(
            eval("userdn=\"ldap:///uid=alice,ou=people,dc=example,dc=com || ldap:///uid=b*,ou=people,dc=example,dc=com\"", &other),
            EvalResult::True
        );
        assert_eq!(
            eval("userdn=\"ldap:///ou=people,dc=example,dc=com??sub?(l=brisbane)\"", &other),
            EvalResult::True
        );
        assert_eq!(
            eval("userdn=\"ldap:///ou=people,dc=example,dc=com??one?(l=sydney)\"", &other),
            EvalResult::False
        );
        assert_eq!(
            eval("userdn=\"ldap:///dc=example,dc=com??one?(l=brisbane)\"", &other),
            EvalResult::False
        );
    }

    #[test]
    fn test_userdn_anonymous_and_root_alias() {
        let (dir, _bob) = setup();
        let conn = test_conn();
        let res = entry_init!("uid=alice,ou=people,dc=example,dc=com");

        let anon = Identity::anonymous();
        let eval = |r: &str, who: &Identity| {
            eval_rule(r, OperationKind::Search, who, &conn, &dir, &res)
        };
        assert_eq!(eval("userdn=\"ldap:///anyone\"", &anon), EvalResult::True);
        assert_eq!(eval("userdn=\"ldap:///all\"", &anon), EvalResult::False);
        assert_eq!(eval("userdn=\"ldap:///uid=*,ou=people,dc=example,dc=com\"", &anon), EvalResult::False);

        let root = Identity::from_dn(
            dn!("cn=Directory Manager,cn=Root DNs,cn=config"),
            AuthType::Simple,
        );
        assert_eq!(eval("userdn=\"ldap:///cn=directory manager\"", &root), EvalResult::True);

        // A url rule for a client whose entry cannot be found is undefined.
        let ghost = Identity::from_dn(dn!("uid=ghost,ou=people,dc=example,dc=com"), AuthType::Simple);
        assert_eq!(
            eval("userdn=\"ldap:///ou=people,dc=example,dc=com??sub?(l=x)\"", &ghost),
            EvalResult::Fail
        );
        assert_eq!(
            eval("userdn!=\"ldap:///ou=people,dc=example,dc=com??sub?(l=x)\"", &ghost),
            EvalResult::Fail
        );
    }
}
