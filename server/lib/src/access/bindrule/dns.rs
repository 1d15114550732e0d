//! `dns="*.example.com, host.example.org"`
//!
//! Matched against the reverse lookup name the host supplies for the client.

use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum DnsPattern {
    Exact(String),
    /// `*.example.com`, stored as `.example.com`.
    Suffix(String),
}

impl DnsPattern {
    fn decode(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let (wild, name) = match s.strip_prefix("*.") {
            Some(rest) => (true, rest.to_string()),
            None => (false, s),
        };
        let valid = !name.is_empty()
            && name.split('.').all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
        if !valid {
            return None;
        }
        Some(if wild {
            DnsPattern::Suffix(format!(".{}", name))
        } else {
            DnsPattern::Exact(name)
        })
    }

    fn matches(&self, hostname: &str) -> bool {
        match self {
            DnsPattern::Exact(n) => n == hostname,
            DnsPattern::Suffix(s) => hostname.ends_with(s.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRule {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    patterns: Vec<DnsPattern>,
}

impl DnsRule {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let patterns = expr
            .split(',')
            .map(|p| DnsPattern::decode(p).ok_or_else(|| AciError::InvalidDns(p.trim().to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DnsRule {
            op,
            expr: expr.trim().to_string(),
            patterns,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        let conn = c.conn();
        let loopback = conn
            .remote_addr
            .map(|a| a.is_loopback())
            .unwrap_or(false);
        if loopback
            && self
                .patterns
                .iter()
                .any(|p| *p == DnsPattern::Exact("localhost".to_string()))
        {
            return EvalResult::True.get_ret(self.op, false);
        }

        match conn.hostname.as_deref() {
            Some(hostname) => {
                let hostname = hostname.trim_end_matches('.');
                let matched = self.patterns.iter().any(|p| p.matches(hostname));
                EvalResult::from_bool(matched).get_ret(self.op, false)
            }
            None => {
                request_trace!("no client hostname, dns rule is undefined");
                EvalResult::False.get_ret(self.op, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::DnsRule;
    use crate::access::bindrule::tests::eval_rule;
    use crate::access::bindrule::{BindRuleType, EvalResult};
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    #[test]
    fn test_dns_decode() {
        assert!(DnsRule::decode("*.example.com, host.Example.org", BindRuleType::Eq).is_ok());
        assert!(DnsRule::decode("localhost", BindRuleType::Eq).is_ok());
        for bad in ["", "*", "a.*.com", "bad_name.com", "a..com", "*.", "a,"] {
            assert!(DnsRule::decode(bad, BindRuleType::Eq).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_dns_evaluate() {
        let dir = TestDirectory::default();
        let res = entry_init!("cn=res,dc=example,dc=com");
        let anon = Identity::anonymous();

        let conn = ConnectionInfo::new(Some(IpAddr::from([10, 1, 1, 1])), 0)
            .with_hostname("Build01.Lab.Example.COM");
        let eval = |r: &str| eval_rule(r, OperationKind::Search, &anon, &conn, &dir, &res);
        assert_eq!(eval("dns=\"*.example.com\""), EvalResult::True);
        assert_eq!(eval("dns=\"*.lab.example.com\""), EvalResult::True);
        assert_eq!(eval("dns=\"build01.lab.example.com\""), EvalResult::True);
        assert_eq!(eval("dns=\"lab.example.com\""), EvalResult::False);
        assert_eq!(eval("dns=\"*.other.com, *.example.com\""), EvalResult::True);
        assert_eq!(eval("dns!=\"*.example.com\""), EvalResult::False);
        // example.com is not below *.example.com
        let conn2 = ConnectionInfo::new(None, 0).with_hostname("example.com");
        assert_eq!(
            eval_rule("dns=\"*.example.com\"", OperationKind::Search, &anon, &conn2, &dir, &res),
            EvalResult::False
        );

        let local = ConnectionInfo::new(Some(IpAddr::from([127, 0, 0, 1])), 0);
        assert_eq!(
            eval_rule("dns=\"localhost\"", OperationKind::Search, &anon, &local, &dir, &res),
            EvalResult::True
        );
        // No name and no loopback: cannot be decided.
        assert_eq!(
            eval_rule("dns!=\"*.example.com\"", OperationKind::Search, &anon, &local, &dir, &res),
            EvalResult::Fail
        );
    }
}
