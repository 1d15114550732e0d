//! `dayofweek="mon,tue,wed,thu,fri"`

use time::Weekday;

use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOfWeek {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    days: Vec<Weekday>,
}

fn decode_day(s: &str) -> Option<Weekday> {
    match s.trim().to_lowercase().as_str() {
        "sun" => Some(Weekday::Sunday),
        "mon" => Some(Weekday::Monday),
        "tue" => Some(Weekday::Tuesday),
        "wed" => Some(Weekday::Wednesday),
        "thu" => Some(Weekday::Thursday),
        "fri" => Some(Weekday::Friday),
        "sat" => Some(Weekday::Saturday),
        _ => None,
    }
}

impl DayOfWeek {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let days = expr
            .split(',')
            .map(|d| decode_day(d).ok_or_else(|| AciError::InvalidDayOfWeek(d.trim().to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DayOfWeek {
            op,
            expr: expr.trim().to_string(),
            days,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        let today = c.conn().now.weekday();
        EvalResult::from_bool(self.days.contains(&today)).get_ret(self.op, false)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::DayOfWeek;
    use crate::access::bindrule::tests::{eval_rule, test_conn};
    use crate::access::bindrule::{BindRuleType, EvalResult};
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    #[test]
    fn test_dayofweek() {
        assert!(DayOfWeek::decode("Mon, tue,WED", BindRuleType::Eq).is_ok());
        assert!(DayOfWeek::decode("monday", BindRuleType::Eq).is_err());
        assert!(DayOfWeek::decode("mon,,tue", BindRuleType::Eq).is_err());
        assert!(DayOfWeek::decode("", BindRuleType::Eq).is_err());

        let dir = TestDirectory::default();
        let res = entry_init!("cn=res,dc=example,dc=com");
        let anon = Identity::anonymous();
        let conn = test_conn();
        let eval = |r: &str, conn: &ConnectionInfo| {
            eval_rule(r, OperationKind::Search, &anon, conn, &dir, &res)
        };
        assert_eq!(eval("dayofweek=\"mon,tue,wed,thu,fri\"", &conn), EvalResult::True);
        assert_eq!(eval("dayofweek=\"sat,sun\"", &conn), EvalResult::False);

        let saturday = test_conn().with_time(datetime!(2024-01-06 09:00 UTC));
        assert_eq!(eval("dayofweek=\"sat,sun\"", &saturday), EvalResult::True);
        assert_eq!(eval("dayofweek!=\"sat,sun\"", &saturday), EvalResult::False);
    }
}
