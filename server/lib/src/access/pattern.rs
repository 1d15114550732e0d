//! Wildcard DN patterns, as used by `userdn` and `target`.
//!
//! A pattern is a list of segments read leaf first like a [`Dn`]. Each segment is
//! either a pattern RDN or `**`, which stands for one or more whole RDNs. A
//! pattern RDN is either `*` (any single RDN) or a set of AVAs whose values may
//! hold substring wildcards, `uid=a*`, or be wholly `*`. A bare value without a
//! type, `people`, matches an AVA of any type.

use std::fmt;

use crate::dn::{normalise_value, unescape_value};
use crate::prelude::*;
use crate::schema::is_valid_attr_name;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternValue {
    Any,
    Exact(String),
    Substring {
        initial: Option<String>,
        any: Vec<String>,
        final_: Option<String>,
    },
}

impl PatternValue {
    fn matches(&self, value: &str) -> bool {
        match self {
            PatternValue::Any => true,
            PatternValue::Exact(v) => normalise_value(value) == *v,
            PatternValue::Substring {
                initial,
                any,
                final_,
            } => {
                let v = normalise_value(value);
                let mut rest = v.as_str();
                if let Some(i) = initial {
                    match rest.strip_prefix(i.as_str()) {
                        Some(r) => rest = r,
                        None => return false,
                    }
                }
                for a in any {
                    match rest.find(a.as_str()) {
                        Some(idx) => rest = &rest[idx + a.len()..],
                        None => return false,
                    }
                }
                match final_ {
                    Some(f) => rest.ends_with(f.as_str()),
                    None => true,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PatternAva {
    // None is the `*` type, or a bare value with no type.
    attr: Option<AttrString>,
    value: PatternValue,
}

impl PatternAva {
    fn matches(&self, ava: &Ava) -> bool {
        self.attr
            .as_ref()
            .map(|a| a.as_str() == ava.attr())
            .unwrap_or(true)
            && self.value.matches(ava.value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternRdn {
    Any,
    Avas(Vec<PatternAva>),
}

impl PatternRdn {
    fn matches(&self, rdn: &Rdn) -> bool {
        match self {
            PatternRdn::Any => true,
            PatternRdn::Avas(pavas) => {
                if pavas.len() != rdn.avas().len() {
                    return false;
                }
                let mut used = vec![false; pavas.len()];
                assign_avas(pavas, rdn.avas(), &mut used)
            }
        }
    }
}

/// Pair each pattern AVA with a distinct AVA of the RDN. A `*` type can take an
/// AVA a later, more specific pattern needs, so earlier choices are revisited.
fn assign_avas(pavas: &[PatternAva], avas: &[Ava], used: &mut [bool]) -> bool {
    let Some((p, rest)) = pavas.split_first() else {
        return true;
    };
    for (i, ava) in avas.iter().enumerate() {
        if used[i] || !p.matches(ava) {
            continue;
        }
        used[i] = true;
        if assign_avas(rest, avas, used) {
            return true;
        }
        used[i] = false;
    }
    false
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Rdn(PatternRdn),
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDn {
    segments: Vec<Segment>,
    raw: String,
}

/// True if `s` holds an unescaped `*`, which makes it a pattern rather than a DN.
pub(crate) fn has_wildcard(s: &str) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '*' {
            return true;
        }
    }
    false
}

/// Split on any of the unescaped `seps`.
fn split_unescaped<'a>(s: &'a str, seps: &[char]) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if seps.contains(&c) {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn decode_value(raw: &str, pattern: &str) -> Result<PatternValue, OperationError> {
    let bad = |why: &str| OperationError::InvalidDnSyntax(format!("{} - {}", pattern, why));
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(bad("empty attribute value"));
    }
    if raw == "*" {
        return Ok(PatternValue::Any);
    }
    let parts = split_unescaped(raw, &['*']);
    if parts.len() == 1 {
        return Ok(PatternValue::Exact(normalise_value(&unescape_value(raw)?)));
    }
    let last = parts.len() - 1;
    let mut initial = None;
    let mut any = Vec::new();
    let mut final_ = None;
    for (i, p) in parts.iter().enumerate() {
        if p.is_empty() {
            if i != 0 && i != last {
                return Err(bad("consecutive wildcards in value"));
            }
            continue;
        }
        let v = normalise_value(&unescape_value(p)?);
        if i == 0 {
            initial = Some(v);
        } else if i == last {
            final_ = Some(v);
        } else {
            any.push(v);
        }
    }
    Ok(PatternValue::Substring {
        initial,
        any,
        final_,
    })
}

fn decode_rdn(raw: &str, pattern: &str) -> Result<Segment, OperationError> {
    let bad = |why: &str| OperationError::InvalidDnSyntax(format!("{} - {}", pattern, why));
    let raw = raw.trim();
    match raw {
        "" => return Err(bad("empty rdn")),
        "*" => return Ok(Segment::Rdn(PatternRdn::Any)),
        "**" => return Ok(Segment::Many),
        _ => {}
    }

    let ava_strs = split_unescaped(raw, &['+']);
    let multi = ava_strs.len() > 1;
    let mut avas = Vec::with_capacity(ava_strs.len());
    for a in ava_strs {
        let a = a.trim();
        if a == "*" || a == "**" {
            return Err(bad("a whole rdn wildcard may not appear in a multi-valued rdn"));
        }
        let parts = split_unescaped(a, &['=']);
        let (attr, value) = match parts.as_slice() {
            [value] if !multi => (None, *value),
            [attr, value] => {
                let attr = attr.trim();
                if attr == "*" {
                    (None, *value)
                } else if attr.contains('*') {
                    return Err(bad("wildcards are not permitted in attribute types"));
                } else if is_valid_attr_name(attr) {
                    (Some(AttrString::from(attr.to_lowercase())), *value)
                } else {
                    return Err(bad("invalid attribute type"));
                }
            }
            _ => return Err(bad("invalid attribute value assertion")),
        };
        avas.push(PatternAva {
            attr,
            value: decode_value(value, pattern)?,
        });
    }
    Ok(Segment::Rdn(PatternRdn::Avas(avas)))
}

fn match_segments(segments: &[Segment], rdns: &[Rdn]) -> bool {
    match segments.split_first() {
        None => rdns.is_empty(),
        Some((Segment::Many, rest)) => {
            (1..=rdns.len()).any(|n| match_segments(rest, &rdns[n..]))
        }
        Some((Segment::Rdn(p), rest)) => match rdns.split_first() {
            Some((first, others)) => p.matches(first) && match_segments(rest, others),
            None => false,
        },
    }
}

impl PatternDn {
    pub fn decode(pattern: &str) -> Result<Self, OperationError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(OperationError::InvalidDnSyntax(
                "empty dn pattern".to_string(),
            ));
        }
        let segments = split_unescaped(trimmed, &[',', ';'])
            .into_iter()
            .map(|r| decode_rdn(r, pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PatternDn {
            segments,
            raw: trimmed.to_string(),
        })
    }

    /// The whole DN must match the pattern.
    pub fn matches(&self, dn: &Dn) -> bool {
        match_segments(&self.segments, dn.rdns())
    }

    /// The DN must end with something matching the pattern, so the DN is at or
    /// below a matching entry.
    pub fn matches_suffix(&self, dn: &Dn) -> bool {
        let rdns = dn.rdns();
        (0..=rdns.len()).any(|k| match_segments(&self.segments, &rdns[k..]))
    }
}

impl fmt::Display for PatternDn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
