//! `timeofday>="0800" and timeofday<"1800"`

use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeOfDay {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    /// As `HHMM`, so 13:45 is 1345.
    time: u16,
}

impl TimeOfDay {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let bad = || AciError::InvalidTimeOfDay(expr.to_string());
        let t = expr.trim();
        if t.len() != 4 || !t.chars().all(|c| c.is_ascii_digit()) {
            return Err(bad());
        }
        let time = u16::from_str(t).map_err(|_| bad())?;
        if time / 100 > 23 || time % 100 > 59 {
            return Err(bad());
        }
        Ok(TimeOfDay {
            op,
            expr: t.to_string(),
            time,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        let now = c.conn().now;
        let current = u16::from(now.hour()) * 100 + u16::from(now.minute());
        // The operator is applied by the comparison itself.
        EvalResult::from_bool(self.op.compare(current, self.time))
    }
}

#[cfg(test)]
mod tests {
    use super::TimeOfDay;
    use crate::access::bindrule::tests::{eval_rule, test_conn};
    use crate::access::bindrule::{BindRuleType, EvalResult};
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    #[test]
    fn test_timeofday_decode() {
        assert_eq!(TimeOfDay::decode("0000", BindRuleType::Eq).unwrap().time, 0);
        assert_eq!(TimeOfDay::decode("2359", BindRuleType::Ge).unwrap().time, 2359);
        for bad in ["", "800", "08:00", "2400", "1260", "abcd", "12345", "-100"] {
            assert!(TimeOfDay::decode(bad, BindRuleType::Eq).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_timeofday_evaluate() {
        let dir = TestDirectory::default();
        let res = entry_init!("cn=res,dc=example,dc=com");
        let anon = Identity::anonymous();
        // 13:45
        let conn = test_conn();
        let eval = |r: &str| eval_rule(r, OperationKind::Search, &anon, &conn, &dir, &res);

        assert_eq!(eval("timeofday>=\"0800\" and timeofday<\"1800\""), EvalResult::True);
        assert_eq!(eval("timeofday>\"1345\""), EvalResult::False);
        assert_eq!(eval("timeofday>=\"1345\""), EvalResult::True);
        assert_eq!(eval("timeofday<=\"1344\""), EvalResult::False);
        assert_eq!(eval("timeofday<\"1400\""), EvalResult::True);
        assert_eq!(eval("timeofday!=\"1200\""), EvalResult::True);
    }
}
