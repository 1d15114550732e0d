//! `ip="10.0.0.*, 192.168.1.0+255.255.255.0, 172.16.0.0/12, fe80::/10"`

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum IpPattern {
    V4 { addr: u32, mask: u32 },
    V6 { addr: u128, mask: u128 },
}

impl IpPattern {
    fn matches(&self, remote: &IpAddr) -> bool {
        match (self, remote) {
            (IpPattern::V4 { addr, mask }, IpAddr::V4(r)) => u32::from(*r) & mask == addr & mask,
            (IpPattern::V4 { addr, mask }, IpAddr::V6(r)) => r
                .to_ipv4_mapped()
                .map(|r| u32::from(r) & mask == addr & mask)
                .unwrap_or(false),
            (IpPattern::V6 { addr, mask }, IpAddr::V6(r)) => u128::from(*r) & mask == addr & mask,
            (IpPattern::V6 { addr, mask }, IpAddr::V4(r)) => {
                u128::from(r.to_ipv6_mapped()) & mask == addr & mask
            }
        }
    }

    fn decode(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if s.contains(':') {
            return Self::decode_v6(s);
        }
        if let Some((addr, netmask)) = s.split_once('+') {
            let addr = Ipv4Addr::from_str(addr.trim()).ok()?;
            let mask = Ipv4Addr::from_str(netmask.trim()).ok()?;
            return Some(IpPattern::V4 {
                addr: addr.into(),
                mask: mask.into(),
            });
        }
        if let Some((addr, prefix)) = s.split_once('/') {
            let addr = Ipv4Addr::from_str(addr.trim()).ok()?;
            let prefix = u32::from_str(prefix.trim()).ok().filter(|p| *p <= 32)?;
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            return Some(IpPattern::V4 {
                addr: addr.into(),
                mask,
            });
        }

        // Dotted form, where any octet may be `*` and a trailing `*` covers the
        // remaining octets: 10.*, 10.0.*.5
        let mut parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 4 {
            return None;
        }
        if parts.len() < 4 {
            if parts.last() != Some(&"*") {
                return None;
            }
            parts.resize(4, "*");
        }
        let mut addr = 0u32;
        let mut mask = 0u32;
        for p in parts {
            addr <<= 8;
            mask <<= 8;
            if p != "*" {
                addr |= u32::from(u8::from_str(p).ok()?);
                mask |= 0xff;
            }
        }
        Some(IpPattern::V4 { addr, mask })
    }

    fn decode_v6(s: &str) -> Option<Self> {
        let (addr, prefix) = match s.split_once('/') {
            Some((a, p)) => (a, u32::from_str(p.trim()).ok().filter(|p| *p <= 128)?),
            None => (s, 128),
        };
        let addr = addr.trim().trim_start_matches('[').trim_end_matches(']');
        let addr = Ipv6Addr::from_str(addr).ok()?;
        let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
        Some(IpPattern::V6 {
            addr: addr.into(),
            mask,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRule {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    patterns: Vec<IpPattern>,
}

impl IpRule {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let patterns = expr
            .split(',')
            .map(|p| IpPattern::decode(p).ok_or_else(|| AciError::InvalidIp(p.trim().to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IpRule {
            op,
            expr: expr.trim().to_string(),
            patterns,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        let Some(remote) = c.conn().remote_addr else {
            request_trace!("no remote address, ip rule is undefined");
            return EvalResult::False.get_ret(self.op, true);
        };
        let matched = self.patterns.iter().any(|p| p.matches(&remote));
        EvalResult::from_bool(matched).get_ret(self.op, false)
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::{IpPattern, IpRule};
    use crate::access::bindrule::tests::eval_rule;
    use crate::access::bindrule::{BindRuleType, EvalResult};
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    fn ip(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    #[test]
    fn test_ip_pattern_matching() {
        let p = IpPattern::decode("10.*").unwrap();
        assert!(p.matches(&ip("10.1.2.3")));
        assert!(!p.matches(&ip("11.1.2.3")));

        let p = IpPattern::decode("10.*.0.5").unwrap();
        assert!(p.matches(&ip("10.200.0.5")));
        assert!(!p.matches(&ip("10.200.0.6")));

        let p = IpPattern::decode("192.168.1.0+255.255.255.0").unwrap();
        assert!(p.matches(&ip("192.168.1.77")));
        assert!(!p.matches(&ip("192.168.2.77")));

        let p = IpPattern::decode("172.16.0.0/12").unwrap();
        assert!(p.matches(&ip("172.31.255.1")));
        assert!(!p.matches(&ip("172.32.0.1")));

        let p = IpPattern::decode("0.0.0.0/0").unwrap();
        assert!(p.matches(&ip("8.8.8.8")));

        let p = IpPattern::decode("fe80::/10").unwrap();
        assert!(p.matches(&ip("fe80::1")));
        assert!(!p.matches(&ip("2001:db8::1")));

        let p = IpPattern::decode("::1").unwrap();
        assert!(p.matches(&ip("::1")));

        // A v4 pattern matches a v4-mapped v6 client.
        let p = IpPattern::decode("10.0.0.5").unwrap();
        assert!(p.matches(&ip("::ffff:10.0.0.5")));
    }

    #[test]
    fn test_ip_decode_invalid() {
        for bad in [
            "", "10", "10.0", "10.0.0.256", "10.0.0.0/33", "1.2.3.4.5", "10.0.0.0+255.255.0",
            "fe80::/129", "fe80:::1", "ten.*", "10.0.0.1,",
        ] {
            assert!(IpRule::decode(bad, BindRuleType::Eq).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_ip_evaluate() {
        let dir = TestDirectory::default();
        let res = entry_init!("cn=res,dc=example,dc=com");
        let anon = Identity::anonymous();

        let conn = ConnectionInfo::new(Some(ip("192.168.1.20")), 0);
        let eval = |r: &str| eval_rule(r, OperationKind::Search, &anon, &conn, &dir, &res);
        assert_eq!(eval("ip=\"10.*, 192.168.1.*\""), EvalResult::True);
        assert_eq!(eval("ip!=\"10.*, 192.168.1.*\""), EvalResult::False);
        assert_eq!(eval("ip=\"10.*\""), EvalResult::False);

        let conn = ConnectionInfo::new(None, 0);
        let eval = |r: &str| eval_rule(r, OperationKind::Search, &anon, &conn, &dir, &res);
        assert_eq!(eval("ip=\"10.*\""), EvalResult::Fail);
        assert_eq!(eval("ip!=\"10.*\""), EvalResult::Fail);
    }
}
