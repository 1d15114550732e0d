//! `ssf>="128"`, the security strength factor of the connection.

use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsfRule {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    ssf: u32,
}

impl SsfRule {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let t = expr.trim();
        let ssf = u32::from_str(t)
            .ok()
            .filter(|v| *v <= MAX_SSF)
            .ok_or_else(|| AciError::InvalidSsf(expr.to_string()))?;
        Ok(SsfRule {
            op,
            expr: t.to_string(),
            ssf,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        EvalResult::from_bool(self.op.compare(c.conn().ssf, self.ssf))
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::SsfRule;
    use crate::access::bindrule::tests::eval_rule;
    use crate::access::bindrule::{BindRuleType, EvalResult};
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    #[test]
    fn test_ssf_decode() {
        assert!(SsfRule::decode("0", BindRuleType::Eq).is_ok());
        assert!(SsfRule::decode("1024", BindRuleType::Ge).is_ok());
        for bad in ["", "1025", "-1", "high", "12.5"] {
            assert!(SsfRule::decode(bad, BindRuleType::Eq).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_ssf_evaluate() {
        let dir = TestDirectory::default();
        let res = entry_init!("cn=res,dc=example,dc=com");
        let anon = Identity::anonymous();
        let addr = Some(IpAddr::from([10, 0, 0, 5]));

        let strong = ConnectionInfo::new(addr, 256);
        let weak = ConnectionInfo::new(addr, 64);
        let eval = |r: &str, conn: &ConnectionInfo| {
            eval_rule(r, OperationKind::Search, &anon, conn, &dir, &res)
        };

        assert_eq!(eval("ssf>=\"128\"", &strong), EvalResult::True);
        assert_eq!(eval("ssf>=\"128\"", &weak), EvalResult::False);
        assert_eq!(eval("ssf<\"128\"", &weak), EvalResult::True);
        assert_eq!(eval("ssf>\"256\"", &strong), EvalResult::False);
        assert_eq!(eval("ssf<=\"256\"", &strong), EvalResult::True);
        assert_eq!(eval("ssf=\"64\"", &weak), EvalResult::True);
        assert_eq!(eval("ssf!=\"64\"", &weak), EvalResult::False);
    }
}
