//! LDAP search filters in their string representation. These appear in ACI text as
//! `targetfilter`, inside `targattrfilters` and in the filter part of LDAP URLs used
//! by `userdn` and `userattr`. Filters are parsed once at ACI decode time and then
//! evaluated against entries with [`Entry::entry_match_no_index`].
//!
//! [`Entry::entry_match_no_index`]: ../entry/struct.Entry.html

use std::collections::BTreeSet;
use std::fmt;

use crate::prelude::*;
use crate::schema::is_valid_attr_description;

/// The parts of a substring assertion, `initial*any*any*final`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubstringFilter {
    pub initial: Option<String>,
    pub any: Vec<String>,
    pub final_: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterComp {
    And(Vec<FilterComp>),
    Or(Vec<FilterComp>),
    Not(Box<FilterComp>),
    Eq(AttrString, String),
    Sub(AttrString, SubstringFilter),
    Pres(AttrString),
    Ge(AttrString, String),
    Le(AttrString, String),
    Approx(AttrString, String),
    Ext {
        attr: Option<AttrString>,
        rule: Option<AttrString>,
        value: String,
        dn_attrs: bool,
    },
}

pub type FC = FilterComp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    inner: FilterComp,
}

pub fn f_eq(a: &str, v: &str) -> FC {
    FC::Eq(AttrString::from(a.to_lowercase()), v.to_string())
}

pub fn f_pres(a: &str) -> FC {
    FC::Pres(AttrString::from(a.to_lowercase()))
}

pub fn f_sub(a: &str, initial: Option<&str>, any: &[&str], final_: Option<&str>) -> FC {
    FC::Sub(
        AttrString::from(a.to_lowercase()),
        SubstringFilter {
            initial: initial.map(str::to_string),
            any: any.iter().map(|s| s.to_string()).collect(),
            final_: final_.map(str::to_string),
        },
    )
}

pub fn f_and(vs: Vec<FC>) -> FC {
    FC::And(vs)
}

pub fn f_or(vs: Vec<FC>) -> FC {
    FC::Or(vs)
}

pub fn f_not(fc: FC) -> FC {
    FC::Not(Box::new(fc))
}

impl Filter {
    pub fn new(inner: FilterComp) -> Self {
        Filter { inner }
    }

    /// `(objectClass=*)`, the filter that matches any entry.
    pub fn all() -> Self {
        Filter {
            inner: f_pres(ATTR_OBJECTCLASS),
        }
    }

    pub fn to_inner(&self) -> &FilterComp {
        &self.inner
    }

    /// Every attribute type this filter asserts on, lowercased.
    pub fn get_attr_set(&self) -> BTreeSet<AttrString> {
        let mut set = BTreeSet::new();
        self.inner.get_attr_set(&mut set);
        set
    }
}

impl FilterComp {
    fn get_attr_set(&self, set: &mut BTreeSet<AttrString>) {
        match self {
            FC::And(l) | FC::Or(l) => l.iter().for_each(|f| f.get_attr_set(set)),
            FC::Not(f) => f.get_attr_set(set),
            FC::Eq(a, _)
            | FC::Sub(a, _)
            | FC::Pres(a)
            | FC::Ge(a, _)
            | FC::Le(a, _)
            | FC::Approx(a, _) => {
                set.insert(a.clone());
            }
            FC::Ext { attr, .. } => {
                if let Some(a) = attr {
                    set.insert(a.clone());
                }
            }
        }
    }
}

struct Parser<'a> {
    raw: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn err(&self, why: &str) -> OperationError {
        OperationError::FilterParseError(format!("{} - {} at offset {}", self.raw, why, self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, c: char) -> Result<(), OperationError> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", c)))
        }
    }

    fn parse_filter(&mut self, depth: usize) -> Result<FilterComp, OperationError> {
        if depth > FILTER_DEPTH_MAX {
            return Err(self.err("filter nesting too deep"));
        }
        self.expect('(')?;
        let fc = match self.peek() {
            Some('&') => {
                self.pos += 1;
                FC::And(self.parse_list(depth)?)
            }
            Some('|') => {
                self.pos += 1;
                FC::Or(self.parse_list(depth)?)
            }
            Some('!') => {
                self.pos += 1;
                FC::Not(Box::new(self.parse_filter(depth + 1)?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.err("unexpected end of filter")),
        };
        self.expect(')')?;
        Ok(fc)
    }

    fn parse_list(&mut self, depth: usize) -> Result<Vec<FilterComp>, OperationError> {
        let mut list = Vec::new();
        while self.peek() == Some('(') {
            list.push(self.parse_filter(depth + 1)?);
        }
        Ok(list)
    }

    fn parse_item(&mut self) -> Result<FilterComp, OperationError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '>' | '<' | ':' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attr: String = self.chars[start..self.pos].iter().collect();

        match self.peek() {
            Some(':') => return self.parse_extensible(attr),
            Some('~') | Some('>') | Some('<') => {
                let op = self.peek();
                self.pos += 1;
                self.expect('=')?;
                let attr = self.checked_attr(&attr)?;
                let raw = self.take_value();
                let value = unescape_filter_value(self.raw, &raw)?;
                return Ok(match op {
                    Some('~') => FC::Approx(attr, value),
                    Some('>') => FC::Ge(attr, value),
                    _ => FC::Le(attr, value),
                });
            }
            Some('=') => {}
            _ => return Err(self.err("missing filter operator")),
        }
        self.pos += 1;
        let attr = self.checked_attr(&attr)?;
        let raw = self.take_value();

        if raw == "*" {
            return Ok(FC::Pres(attr));
        }

        let parts = split_unescaped_star(&raw);
        if parts.len() == 1 {
            return Ok(FC::Eq(attr, unescape_filter_value(self.raw, &raw)?));
        }

        let last = parts.len() - 1;
        let mut sub = SubstringFilter::default();
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                if i != 0 && i != last {
                    return Err(self.err("empty substring component"));
                }
                continue;
            }
            let v = unescape_filter_value(self.raw, part)?;
            if i == 0 {
                sub.initial = Some(v);
            } else if i == last {
                sub.final_ = Some(v);
            } else {
                sub.any.push(v);
            }
        }
        Ok(FC::Sub(attr, sub))
    }

    fn parse_extensible(&mut self, attr: String) -> Result<FilterComp, OperationError> {
        // attr[:dn][:rule]:=value or [:dn]:rule:=value
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '=' || c == ')' {
                break;
            }
            self.pos += 1;
        }
        let spec: String = self.chars[start..self.pos].iter().collect();
        self.expect('=')?;
        let spec = spec
            .strip_suffix(':')
            .ok_or_else(|| self.err("extensible match requires ':='"))?;

        let mut dn_attrs = false;
        let mut rule = None;
        for part in spec.split(':').skip(1) {
            if part.eq_ignore_ascii_case("dn") && rule.is_none() && !dn_attrs {
                dn_attrs = true;
            } else if !part.is_empty() && rule.is_none() {
                rule = Some(AttrString::from(part.to_lowercase()));
            } else {
                return Err(self.err("invalid extensible match"));
            }
        }

        let attr = if attr.is_empty() {
            if rule.is_none() {
                return Err(self.err("extensible match needs an attribute or a rule"));
            }
            None
        } else {
            Some(self.checked_attr(&attr)?)
        };
        let raw = self.take_value();
        let value = unescape_filter_value(self.raw, &raw)?;
        Ok(FC::Ext {
            attr,
            rule,
            value,
            dn_attrs,
        })
    }

    fn checked_attr(&self, attr: &str) -> Result<AttrString, OperationError> {
        let attr = attr.trim();
        if is_valid_attr_description(attr) {
            Ok(AttrString::from(attr.to_lowercase()))
        } else {
            Err(self.err(&format!("invalid attribute description '{}'", attr)))
        }
    }

    fn take_value(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == ')' {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}

fn split_unescaped_star(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut escaped = false;
    for c in raw.chars() {
        if escaped {
            cur.push(c);
            escaped = false;
        } else if c == '\\' {
            cur.push(c);
            escaped = true;
        } else if c == '*' {
            parts.push(std::mem::take(&mut cur));
        } else {
            cur.push(c);
        }
    }
    parts.push(cur);
    parts
}

fn unescape_filter_value(filter: &str, raw: &str) -> Result<String, OperationError> {
    let bad = || OperationError::FilterParseError(format!("{} - invalid escape in '{}'", filter, raw));
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let hex = raw.get(i + 1..i + 3).ok_or_else(bad)?;
            let b = u8::from_str_radix(hex, 16).map_err(|_| bad())?;
            out.push(b);
            i += 3;
        } else if matches!(bytes[i], b'(' | b'*') {
            return Err(bad());
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| bad())
}

fn escape_filter_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        match c {
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

impl FromStr for Filter {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(OperationError::FilterParseError("empty filter".to_string()));
        }
        // A bare item such as "cn=foo" is accepted and treated as "(cn=foo)".
        let text = if trimmed.starts_with('(') {
            trimmed.to_string()
        } else {
            format!("({})", trimmed)
        };
        let mut p = Parser {
            raw: s,
            chars: text.chars().collect(),
            pos: 0,
        };
        let inner = p.parse_filter(0)?;
        if p.pos != p.chars.len() {
            return Err(p.err("trailing characters after filter"));
        }
        Ok(Filter { inner })
    }
}

impl fmt::Display for FilterComp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FC::And(l) => {
                f.write_str("(&")?;
                l.iter().try_for_each(|x| write!(f, "{}", x))?;
                f.write_str(")")
            }
            FC::Or(l) => {
                f.write_str("(|")?;
                l.iter().try_for_each(|x| write!(f, "{}", x))?;
                f.write_str(")")
            }
            FC::Not(x) => write!(f, "(!{})", x),
            FC::Eq(a, v) => write!(f, "({}={})", a, escape_filter_value(v)),
            FC::Pres(a) => write!(f, "({}=*)", a),
            FC::Ge(a, v) => write!(f, "({}>={})", a, escape_filter_value(v)),
            FC::Le(a, v) => write!(f, "({}<={})", a, escape_filter_value(v)),
            FC::Approx(a, v) => write!(f, "({}~={})", a, escape_filter_value(v)),
            FC::Sub(a, sub) => {
                write!(f, "({}=", a)?;
                if let Some(i) = &sub.initial {
                    f.write_str(&escape_filter_value(i))?;
                }
                f.write_str("*")?;
                for any in &sub.any {
                    write!(f, "{}*", escape_filter_value(any))?;
                }
                if let Some(fin) = &sub.final_ {
                    f.write_str(&escape_filter_value(fin))?;
                }
                f.write_str(")")
            }
            FC::Ext {
                attr,
                rule,
                value,
                dn_attrs,
            } => {
                f.write_str("(")?;
                if let Some(a) = attr {
                    f.write_str(a)?;
                }
                if *dn_attrs {
                    f.write_str(":dn")?;
                }
                if let Some(r) = rule {
                    write!(f, ":{}", r)?;
                }
                write!(f, ":={})", escape_filter_value(value))
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::filter::SubstringFilter;
    use crate::prelude::*;

    #[test]
    fn test_filter_simple_parse() {
        let f = Filter::from_str("(cn=Bob)").unwrap();
        assert_eq!(f.to_inner(), &f_eq("cn", "Bob"));

        // Outer parentheses are optional.
        let f = Filter::from_str("objectClass=*").unwrap();
        assert_eq!(f.to_inner(), &f_pres("objectclass"));

        let f = Filter::from_str("(&(objectclass=person)(!(uid=admin))(|(l=x)(l=y)))").unwrap();
        assert_eq!(
            f.to_inner(),
            &f_and(vec![
                f_eq("objectclass", "person"),
                f_not(f_eq("uid", "admin")),
                f_or(vec![f_eq("l", "x"), f_eq("l", "y")]),
            ])
        );
        assert_eq!(
            f.get_attr_set(),
            btreeset![
                AttrString::from("objectclass"),
                AttrString::from("uid"),
                AttrString::from("l")
            ]
        );
    }

    #[test]
    fn test_filter_substring_and_escapes() {
        let f = Filter::from_str("(cn=a*b*c)").unwrap();
        assert_eq!(f.to_inner(), &f_sub("cn", Some("a"), &["b"], Some("c")));

        let f = Filter::from_str("(cn=*end)").unwrap();
        assert_eq!(
            f.to_inner(),
            &FC::Sub(
                AttrString::from("cn"),
                SubstringFilter {
                    initial: None,
                    any: vec![],
                    final_: Some("end".to_string())
                }
            )
        );

        let f = Filter::from_str("(cn=star\\2a\\28x\\29)").unwrap();
        assert_eq!(f.to_inner(), &f_eq("cn", "star*(x)"));
        assert_eq!(f.to_string(), "(cn=star\\2a\\28x\\29)");
    }

    #[test]
    fn test_filter_other_operators() {
        let f = Filter::from_str("(&(age>=10)(age<=20)(sn~=smyth))").unwrap();
        assert_eq!(
            f.to_inner(),
            &f_and(vec![
                FC::Ge(AttrString::from("age"), "10".to_string()),
                FC::Le(AttrString::from("age"), "20".to_string()),
                FC::Approx(AttrString::from("sn"), "smyth".to_string()),
            ])
        );

        let f = Filter::from_str("(cn:dn:caseExactMatch:=Bob)").unwrap();
        assert_eq!(
            f.to_inner(),
            &FC::Ext {
                attr: Some(AttrString::from("cn")),
                rule: Some(AttrString::from("caseexactmatch")),
                value: "Bob".to_string(),
                dn_attrs: true,
            }
        );
        assert_eq!(f.to_string(), "(cn:dn:caseexactmatch:=Bob)");
    }

    #[test]
    fn test_filter_invalid() {
        for bad in [
            "",
            "(cn=bob",
            "(cn=bob))",
            "(=bob)",
            "(cn bob)",
            "(&(cn=a)x)",
            "(cn=a\\zz)",
            "(:=x)",
            "(cn=a**b)",
        ] {
            assert!(Filter::from_str(bad).is_err(), "{} should be rejected", bad);
        }

        let deep = format!("{}(cn=a){}", "(!".repeat(20), ")".repeat(20));
        assert!(Filter::from_str(&deep).is_err());
        let shallow = format!("{}(cn=a){}", "(!".repeat(4), ")".repeat(4));
        assert!(Filter::from_str(&shallow).is_ok());
    }
}
