//! Bind rules, the guard on each permission of an ACI. A bind rule is a boolean
//! expression over facts about the client and its connection:
//!
//! ```text
//! userdn="ldap:///self" and (ip="10.0.0.0/8" or not dayofweek="sat,sun")
//! ```
//!
//! Evaluation is tri-state. `Fail` means the answer could not be determined, for
//! example because a group lookup failed, and is never turned into a grant.

use std::fmt;

use crate::access::container::AciContainer;
use crate::access::lexer::Cursor;
use crate::prelude::*;

pub mod authmethod;
pub mod dayofweek;
pub mod dns;
pub mod groupdn;
pub mod ip;
pub mod ssf;
pub mod timeofday;
pub mod userattr;
pub mod userdn;

use self::authmethod::AuthMethod;
use self::dayofweek::DayOfWeek;
use self::dns::DnsRule;
use self::groupdn::GroupDn;
use self::ip::IpRule;
use self::ssf::SsfRule;
use self::timeofday::TimeOfDay;
use self::userattr::UserAttr;
use self::userdn::UserDn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalResult {
    True,
    False,
    Fail,
}

impl EvalResult {
    pub fn negate(self) -> Self {
        match self {
            EvalResult::True => EvalResult::False,
            EvalResult::False => EvalResult::True,
            EvalResult::Fail => EvalResult::Fail,
        }
    }

    /// Apply the rule operator to a raw match result. An undefined comparison
    /// fails regardless of operator unless it already matched.
    pub fn get_ret(self, op: BindRuleType, undefined: bool) -> Self {
        if undefined && self != EvalResult::True {
            EvalResult::Fail
        } else if op == BindRuleType::NotEq {
            self.negate()
        } else {
            self
        }
    }

    pub fn from_bool(b: bool) -> Self {
        if b {
            EvalResult::True
        } else {
            EvalResult::False
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindRuleType {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BindRuleType {
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "=" => Some(BindRuleType::Eq),
            "!=" => Some(BindRuleType::NotEq),
            "<" => Some(BindRuleType::Lt),
            "<=" => Some(BindRuleType::Le),
            ">" => Some(BindRuleType::Gt),
            ">=" => Some(BindRuleType::Ge),
            _ => None,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BindRuleType::Eq | BindRuleType::NotEq)
    }

    /// Compare the observed value against the rule's value.
    pub fn compare<T: Ord>(self, observed: T, rule: T) -> bool {
        match self {
            BindRuleType::Eq => observed == rule,
            BindRuleType::NotEq => observed != rule,
            BindRuleType::Lt => observed < rule,
            BindRuleType::Le => observed <= rule,
            BindRuleType::Gt => observed > rule,
            BindRuleType::Ge => observed >= rule,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BindRuleType::Eq => "=",
            BindRuleType::NotEq => "!=",
            BindRuleType::Lt => "<",
            BindRuleType::Le => "<=",
            BindRuleType::Gt => ">",
            BindRuleType::Ge => ">=",
        }
    }
}

impl fmt::Display for BindRuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindRuleKeyword {
    UserDn,
    GroupDn,
    RoleDn,
    Ip,
    Dns,
    DayOfWeek,
    TimeOfDay,
    AuthMethod,
    UserAttr,
    Ssf,
}

impl BindRuleKeyword {
    pub fn decode(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "userdn" => Some(BindRuleKeyword::UserDn),
            "groupdn" => Some(BindRuleKeyword::GroupDn),
            "roledn" => Some(BindRuleKeyword::RoleDn),
            "ip" => Some(BindRuleKeyword::Ip),
            "dns" => Some(BindRuleKeyword::Dns),
            "dayofweek" => Some(BindRuleKeyword::DayOfWeek),
            "timeofday" => Some(BindRuleKeyword::TimeOfDay),
            "authmethod" => Some(BindRuleKeyword::AuthMethod),
            "userattr" => Some(BindRuleKeyword::UserAttr),
            "ssf" => Some(BindRuleKeyword::Ssf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BindRuleKeyword::UserDn => "userdn",
            BindRuleKeyword::GroupDn => "groupdn",
            BindRuleKeyword::RoleDn => "roledn",
            BindRuleKeyword::Ip => "ip",
            BindRuleKeyword::Dns => "dns",
            BindRuleKeyword::DayOfWeek => "dayofweek",
            BindRuleKeyword::TimeOfDay => "timeofday",
            BindRuleKeyword::AuthMethod => "authmethod",
            BindRuleKeyword::UserAttr => "userattr",
            BindRuleKeyword::Ssf => "ssf",
        }
    }

    /// Only ordered values accept the inequality operators.
    fn allows_ordering(self) -> bool {
        matches!(self, BindRuleKeyword::TimeOfDay | BindRuleKeyword::Ssf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindRulePredicate {
    UserDn(UserDn),
    GroupDn(GroupDn),
    Ip(IpRule),
    Dns(DnsRule),
    DayOfWeek(DayOfWeek),
    TimeOfDay(TimeOfDay),
    AuthMethod(AuthMethod),
    UserAttr(UserAttr),
    Ssf(SsfRule),
}

impl BindRulePredicate {
    fn decode(
        keyword: BindRuleKeyword,
        op: BindRuleType,
        expr: &str,
    ) -> Result<Self, AciError> {
        if !op.is_equality() && !keyword.allows_ordering() {
            return Err(AciError::InvalidBindRuleOperator {
                keyword: keyword.as_str().to_string(),
                operator: op.to_string(),
            });
        }
        Ok(match keyword {
            BindRuleKeyword::UserDn => BindRulePredicate::UserDn(UserDn::decode(expr, op)?),
            BindRuleKeyword::GroupDn => BindRulePredicate::GroupDn(GroupDn::decode(expr, op)?),
            BindRuleKeyword::RoleDn => return Err(AciError::UnsupportedRoleDn(expr.to_string())),
            BindRuleKeyword::Ip => BindRulePredicate::Ip(IpRule::decode(expr, op)?),
            BindRuleKeyword::Dns => BindRulePredicate::Dns(DnsRule::decode(expr, op)?),
            BindRuleKeyword::DayOfWeek => {
                BindRulePredicate::DayOfWeek(DayOfWeek::decode(expr, op)?)
            }
            BindRuleKeyword::TimeOfDay => {
                BindRulePredicate::TimeOfDay(TimeOfDay::decode(expr, op)?)
            }
            BindRuleKeyword::AuthMethod => {
                BindRulePredicate::AuthMethod(AuthMethod::decode(expr, op)?)
            }
            BindRuleKeyword::UserAttr => BindRulePredicate::UserAttr(UserAttr::decode(expr, op)?),
            BindRuleKeyword::Ssf => BindRulePredicate::Ssf(SsfRule::decode(expr, op)?),
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        match self {
            BindRulePredicate::UserDn(r) => r.evaluate(c),
            BindRulePredicate::GroupDn(r) => r.evaluate(c),
            BindRulePredicate::Ip(r) => r.evaluate(c),
            BindRulePredicate::Dns(r) => r.evaluate(c),
            BindRulePredicate::DayOfWeek(r) => r.evaluate(c),
            BindRulePredicate::TimeOfDay(r) => r.evaluate(c),
            BindRulePredicate::AuthMethod(r) => r.evaluate(c),
            BindRulePredicate::UserAttr(r) => r.evaluate(c),
            BindRulePredicate::Ssf(r) => r.evaluate(c),
        }
    }

    fn keyword(&self) -> BindRuleKeyword {
        match self {
            BindRulePredicate::UserDn(_) => BindRuleKeyword::UserDn,
            BindRulePredicate::GroupDn(_) => BindRuleKeyword::GroupDn,
            BindRulePredicate::Ip(_) => BindRuleKeyword::Ip,
            BindRulePredicate::Dns(_) => BindRuleKeyword::Dns,
            BindRulePredicate::DayOfWeek(_) => BindRuleKeyword::DayOfWeek,
            BindRulePredicate::TimeOfDay(_) => BindRuleKeyword::TimeOfDay,
            BindRulePredicate::AuthMethod(_) => BindRuleKeyword::AuthMethod,
            BindRulePredicate::UserAttr(_) => BindRuleKeyword::UserAttr,
            BindRulePredicate::Ssf(_) => BindRuleKeyword::Ssf,
        }
    }

    fn op_and_expr(&self) -> (BindRuleType, &str) {
        match self {
            BindRulePredicate::UserDn(r) => (r.op, r.expr.as_str()),
            BindRulePredicate::GroupDn(r) => (r.op, r.expr.as_str()),
            BindRulePredicate::Ip(r) => (r.op, r.expr.as_str()),
            BindRulePredicate::Dns(r) => (r.op, r.expr.as_str()),
            BindRulePredicate::DayOfWeek(r) => (r.op, r.expr.as_str()),
            BindRulePredicate::TimeOfDay(r) => (r.op, r.expr.as_str()),
            BindRulePredicate::AuthMethod(r) => (r.op, r.expr.as_str()),
            BindRulePredicate::UserAttr(r) => (r.op, r.expr.as_str()),
            BindRulePredicate::Ssf(r) => (r.op, r.expr.as_str()),
        }
    }
}

impl fmt::Display for BindRulePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (op, expr) = self.op_and_expr();
        write!(f, "{}{}\"{}\"", self.keyword().as_str(), op, expr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindRule {
    And(Vec<BindRule>),
    Or(Vec<BindRule>),
    Not(Box<BindRule>),
    Leaf(BindRulePredicate),
}

impl BindRule {
    /// Decode the bind rule text of one permission, up to but not including the
    /// terminating `;`.
    pub fn decode(text: &str) -> Result<Self, AciError> {
        let mut cur = Cursor::new(text);
        let rule = Self::parse_or(&mut cur, text)?;
        cur.skip_ws();
        if !cur.is_empty() {
            return Err(AciError::InvalidBindRule(text.to_string()));
        }
        Ok(rule)
    }

    fn parse_or(cur: &mut Cursor, text: &str) -> Result<Self, AciError> {
        let mut terms = vec![Self::parse_and(cur, text)?];
        while cur.eat_word_ci("or") {
            terms.push(Self::parse_and(cur, text)?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            BindRule::Or(terms)
        })
    }

    fn parse_and(cur: &mut Cursor, text: &str) -> Result<Self, AciError> {
        let mut terms = vec![Self::parse_not(cur, text)?];
        while cur.eat_word_ci("and") {
            terms.push(Self::parse_not(cur, text)?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            BindRule::And(terms)
        })
    }

    fn parse_not(cur: &mut Cursor, text: &str) -> Result<Self, AciError> {
        if cur.eat_word_ci("not") {
            return Ok(BindRule::Not(Box::new(Self::parse_not(cur, text)?)));
        }
        Self::parse_primary(cur, text)
    }

    fn parse_primary(cur: &mut Cursor, text: &str) -> Result<Self, AciError> {
        if cur.eat('(') {
            let inner = Self::parse_or(cur, text)?;
            if !cur.eat(')') {
                return Err(AciError::InvalidBindRule(text.to_string()));
            }
            return Ok(inner);
        }

        cur.skip_ws();
        let word = cur.take_while(|c| c.is_ascii_alphanumeric());
        if word.is_empty() {
            return Err(AciError::InvalidBindRule(text.to_string()));
        }
        let keyword = BindRuleKeyword::decode(word)
            .ok_or_else(|| AciError::InvalidBindRuleKeyword(word.to_string()))?;
        let op = cur
            .read_operator()
            .and_then(BindRuleType::decode)
            .ok_or_else(|| AciError::InvalidBindRule(text.to_string()))?;
        let expr = cur
            .read_quoted()
            .ok_or_else(|| AciError::InvalidBindRule(text.to_string()))?;
        BindRulePredicate::decode(keyword, op, expr).map(BindRule::Leaf)
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        match self {
            BindRule::Leaf(p) => p.evaluate(c),
            BindRule::And(terms) => {
                for t in terms {
                    let r = t.evaluate(c);
                    if r != EvalResult::True {
                        return r;
                    }
                }
                EvalResult::True
            }
            BindRule::Or(terms) => {
                let mut failed = false;
                for t in terms {
                    match t.evaluate(c) {
                        EvalResult::True => return EvalResult::True,
                        EvalResult::Fail => failed = true,
                        EvalResult::False => {}
                    }
                }
                if failed {
                    EvalResult::Fail
                } else {
                    EvalResult::False
                }
            }
            BindRule::Not(inner) => inner.evaluate(c).negate(),
        }
    }
}

impl fmt::Display for BindRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindRule::Leaf(p) => write!(f, "{}", p),
            BindRule::Not(inner) => write!(f, "not {}", inner),
            BindRule::And(terms) | BindRule::Or(terms) => {
                let sep = if matches!(self, BindRule::And(_)) {
                    " and "
                } else {
                    " or "
                };
                f.write_str("(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{}", t)?;
                }
                f.write_str(")")
            }
        }
    }
}
