//! `authmethod="simple"`, `authmethod="ssl"`, `authmethod="sasl DIGEST-MD5"`
//! or `authmethod="none"`.

use crate::access::bindrule::{BindRuleType, EvalResult};
use crate::access::container::AciContainer;
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Method {
    /// Any authentication method, including none.
    None,
    Simple,
    /// A TLS client certificate, presented through SASL EXTERNAL.
    Ssl,
    Sasl(AttrString),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMethod {
    pub(crate) op: BindRuleType,
    pub(crate) expr: String,
    method: Method,
}

impl AuthMethod {
    pub fn decode(expr: &str, op: BindRuleType) -> Result<Self, AciError> {
        let bad = || AciError::InvalidAuthMethod(expr.to_string());
        let t = expr.trim();
        let mut words = t.split_whitespace();
        let method = match (words.next().map(|w| w.to_lowercase()), words.next(), words.next()) {
            (Some(w), None, None) if w == "none" => Method::None,
            (Some(w), None, None) if w == "simple" => Method::Simple,
            (Some(w), None, None) if w == "ssl" => Method::Ssl,
            (Some(w), Some(mech), None) if w == "sasl" => {
                if !mech
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                {
                    return Err(bad());
                }
                if mech.eq_ignore_ascii_case("external") {
                    Method::Ssl
                } else {
                    Method::Sasl(AttrString::from(mech.to_uppercase()))
                }
            }
            _ => return Err(bad()),
        };
        Ok(AuthMethod {
            op,
            expr: t.to_string(),
            method,
        })
    }

    pub fn evaluate(&self, c: &AciContainer) -> EvalResult {
        let ident = c.ident();
        let matched = match &self.method {
            // none matches whatever the client did, for either operator.
            Method::None => return EvalResult::True,
            Method::Simple => *ident.auth_type() == AuthType::Simple,
            Method::Ssl => {
                ident.has_client_cert()
                    || matches!(ident.auth_type(), AuthType::Sasl(m) if m.eq_ignore_ascii_case("external"))
            }
            Method::Sasl(mech) => {
                matches!(ident.auth_type(), AuthType::Sasl(m) if m.eq_ignore_ascii_case(mech))
            }
        };
        EvalResult::from_bool(matched).get_ret(self.op, false)
    }
}
