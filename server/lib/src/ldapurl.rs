//! LDAP URLs as used by `userdn`, `userattr` and the `target` keyword:
//! `ldap://[host]/base?attrs?scope?filter`.

use std::fmt;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
    Subordinate,
}

impl SearchScope {
    /// Does a search rooted at `base` with this scope reach `dn`.
    pub fn contains(self, base: &Dn, dn: &Dn) -> bool {
        match self {
            SearchScope::Base => dn == base,
            SearchScope::OneLevel => dn.parent().as_ref() == Some(base),
            SearchScope::Subtree => dn.is_descendant_of(base),
            SearchScope::Subordinate => dn.is_strict_descendant_of(base),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchScope::Base => "base",
            SearchScope::OneLevel => "one",
            SearchScope::Subtree => "sub",
            SearchScope::Subordinate => "subordinate",
        }
    }
}

impl FromStr for SearchScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(SearchScope::Base),
            "one" | "onelevel" => Ok(SearchScope::OneLevel),
            "sub" | "subtree" => Ok(SearchScope::Subtree),
            "subordinate" | "subordinates" => Ok(SearchScope::Subordinate),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapUrl {
    pub host: Option<String>,
    pub base: Dn,
    pub attrs: Vec<AttrString>,
    pub scope: SearchScope,
    pub filter: Filter,
    raw: String,
}

fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

impl LdapUrl {
    /// The URL as it was written.
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    /// Does `dn` fall within the base and scope of this URL. The filter is not
    /// considered.
    pub fn in_scope(&self, dn: &Dn) -> bool {
        self.scope.contains(&self.base, dn)
    }
}

impl FromStr for LdapUrl {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |why: &str| OperationError::InvalidLdapUrl(format!("{} - {}", s, why));
        let raw = s.trim();
        let rest = if raw.len() >= 7 && raw[..7].eq_ignore_ascii_case("ldap://") {
            &raw[7..]
        } else {
            return Err(bad("missing ldap:// scheme"));
        };

        let (host, rest) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };

        let mut parts = rest.splitn(4, '?');
        let base = parts.next().unwrap_or_default();
        let attrs = parts.next().unwrap_or_default();
        let scope = parts.next().unwrap_or_default();
        let filter = parts.next().unwrap_or_default();

        let base = percent_decode(base).ok_or_else(|| bad("invalid percent encoding"))?;
        let base = Dn::from_str(&base).map_err(|_| bad("invalid base dn"))?;

        let attrs = attrs
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| AttrString::from(a.to_lowercase()))
            .collect();

        let scope = if scope.is_empty() {
            SearchScope::Base
        } else {
            SearchScope::from_str(scope).map_err(|_| bad("invalid scope"))?
        };

        let filter = if filter.is_empty() {
            Filter::all()
        } else {
            let f = percent_decode(filter).ok_or_else(|| bad("invalid percent encoding"))?;
            Filter::from_str(&f).map_err(|_| bad("invalid filter"))?
        };

        Ok(LdapUrl {
            host: if host.is_empty() {
                None
            } else {
                Some(host.to_string())
            },
            base,
            attrs,
            scope,
            filter,
            raw: raw.to_string(),
        })
    }
}

impl fmt::Display for LdapUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
