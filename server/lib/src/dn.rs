//! Distinguished names. Values compare case-insensitively with whitespace runs
//! collapsed, which is how the access control engine needs to treat them when
//! walking the directory tree and comparing identities.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::prelude::*;
use crate::schema::is_valid_attr_name;

/// Lowercase a value and collapse any run of whitespace into a single space.
pub(crate) fn normalise_value(v: &str) -> String {
    v.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A single attribute value assertion inside an RDN.
#[derive(Debug, Clone)]
pub struct Ava {
    attr: AttrString,
    value: String,
    norm: String,
}

impl Ava {
    pub fn new(attr: &str, value: &str) -> Self {
        Ava {
            attr: AttrString::from(attr.trim().to_lowercase()),
            value: value.to_string(),
            norm: normalise_value(value),
        }
    }

    pub fn attr(&self) -> &str {
        self.attr.as_str()
    }

    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    pub fn normalised(&self) -> &str {
        self.norm.as_str()
    }
}

impl PartialEq for Ava {
    fn eq(&self, other: &Self) -> bool {
        self.attr == other.attr && self.norm == other.norm
    }
}

impl Eq for Ava {}

impl Hash for Ava {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attr.hash(state);
        self.norm.hash(state);
    }
}

impl PartialOrd for Ava {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ava {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.attr.as_str(), self.norm.as_str()).cmp(&(other.attr.as_str(), other.norm.as_str()))
    }
}

impl fmt::Display for Ava {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attr, escape_value(&self.value))
    }
}

/// A relative distinguished name, one or more AVAs joined by `+`.
#[derive(Debug, Clone)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    pub fn new(avas: Vec<Ava>) -> Self {
        Rdn { avas }
    }

    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }

    pub fn is_multi_valued(&self) -> bool {
        self.avas.len() > 1
    }

    fn sorted(&self) -> Vec<&Ava> {
        let mut s: Vec<&Ava> = self.avas.iter().collect();
        s.sort();
        s
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Self) -> bool {
        self.avas.len() == other.avas.len() && self.sorted() == other.sorted()
    }
}

impl Eq for Rdn {}

impl Hash for Rdn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order independent, a+b and b+a are the same rdn.
        self.sorted().hash(state);
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}", ava)?;
        }
        Ok(())
    }
}

impl FromStr for Rdn {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut dn = Dn::from_str(s)?;
        if dn.rdns.len() != 1 {
            return Err(OperationError::InvalidDnSyntax(format!(
                "{} is not a single rdn",
                s
            )));
        }
        dn.rdns
            .pop()
            .ok_or_else(|| OperationError::InvalidDnSyntax(s.to_string()))
    }
}

/// A distinguished name. The rdns are held leaf first, so `rdns[0]` is the
/// rdn of the entry itself and the last element is directly below the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Dn {
    rdns: Vec<Rdn>,
}

impl Dn {
    /// The root DN, the empty name. Global ACIs are keyed here.
    pub fn root() -> Self {
        Dn { rdns: Vec::new() }
    }

    pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
        Dn { rdns }
    }

    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The immediate parent. The parent of a single rdn DN is the root, and the
    /// root has no parent.
    pub fn parent(&self) -> Option<Dn> {
        self.ancestor(1)
    }

    /// Walk `levels` rdns towards the root. `ancestor(0)` is this DN.
    pub fn ancestor(&self, levels: usize) -> Option<Dn> {
        if levels > self.rdns.len() {
            None
        } else {
            Some(Dn {
                rdns: self.rdns[levels..].to_vec(),
            })
        }
    }

    pub fn child(&self, rdn: Rdn) -> Dn {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(rdn);
        rdns.extend(self.rdns.iter().cloned());
        Dn { rdns }
    }

    /// True if this DN is equal to `base` or sits anywhere beneath it.
    pub fn is_descendant_of(&self, base: &Dn) -> bool {
        if base.rdns.len() > self.rdns.len() {
            return false;
        }
        let offset = self.rdns.len() - base.rdns.len();
        self.rdns[offset..] == base.rdns[..]
    }

    /// True if this DN sits beneath `base` but is not `base` itself.
    pub fn is_strict_descendant_of(&self, base: &Dn) -> bool {
        self.rdns.len() > base.rdns.len() && self.is_descendant_of(base)
    }

    /// Replace the `old_base` suffix of this DN with `new_base`.
    pub fn rename(&self, old_base: &Dn, new_base: &Dn) -> Option<Dn> {
        if !self.is_descendant_of(old_base) {
            return None;
        }
        let keep = self.rdns.len() - old_base.rdns.len();
        let mut rdns = self.rdns[..keep].to_vec();
        rdns.extend(new_base.rdns.iter().cloned());
        Some(Dn { rdns })
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", rdn)?;
        }
        Ok(())
    }
}

impl FromStr for Dn {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Ok(Dn::root());
        }

        let bad = |why: &str| OperationError::InvalidDnSyntax(format!("{} - {}", s, why));
        let chars: Vec<char> = input.chars().collect();
        let mut pos = 0;
        let mut rdns = Vec::new();
        let mut avas = Vec::new();

        loop {
            while pos < chars.len() && chars[pos] == ' ' {
                pos += 1;
            }
            let start = pos;
            while pos < chars.len() && chars[pos] != '=' {
                pos += 1;
            }
            if pos >= chars.len() {
                return Err(bad("missing '=' in rdn"));
            }
            let attr: String = chars[start..pos].iter().collect();
            let attr = attr.trim();
            if !is_valid_attr_name(attr) {
                return Err(bad("invalid attribute type"));
            }
            // skip '='
            pos += 1;
            while pos < chars.len() && chars[pos] == ' ' {
                pos += 1;
            }

            let (value, next) = read_value(&chars, pos).map_err(|e| bad(e))?;
            if value.is_empty() {
                return Err(bad("empty attribute value"));
            }
            avas.push(Ava::new(attr, &value));
            pos = next;

            if pos >= chars.len() {
                rdns.push(Rdn::new(std::mem::take(&mut avas)));
                break;
            }
            match chars[pos] {
                '+' => {}
                ',' | ';' => rdns.push(Rdn::new(std::mem::take(&mut avas))),
                _ => return Err(bad("unexpected character after value")),
            }
            pos += 1;
            if pos >= chars.len() {
                return Err(bad("trailing separator"));
            }
        }

        Ok(Dn { rdns })
    }
}

fn hex_value(c: char) -> Option<u8> {
    c.to_digit(16).and_then(|d| u8::try_from(d).ok())
}

/// Read one attribute value starting at `pos`, returning the unescaped value and the
/// position of the separator that ended it (or the end of input).
fn read_value(chars: &[char], mut pos: usize) -> Result<(String, usize), &'static str> {
    let mut bytes: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4];

    if pos < chars.len() && chars[pos] == '"' {
        pos += 1;
        loop {
            match chars.get(pos) {
                None => return Err("unterminated quoted value"),
                Some('"') => {
                    pos += 1;
                    break;
                }
                Some('\\') => {
                    let c = chars.get(pos + 1).ok_or("dangling escape")?;
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    pos += 2;
                }
                Some(c) => {
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    pos += 1;
                }
            }
        }
        while pos < chars.len() && chars[pos] == ' ' {
            pos += 1;
        }
        let value = String::from_utf8(bytes).map_err(|_| "value is not valid utf8")?;
        return Ok((value, pos));
    }

    // Unescaped trailing spaces are not part of the value.
    let mut significant = 0;
    while pos < chars.len() {
        match chars[pos] {
            ',' | ';' | '+' => break,
            '\\' => {
                let c1 = *chars.get(pos + 1).ok_or("dangling escape")?;
                match (hex_value(c1), chars.get(pos + 2).copied().and_then(hex_value)) {
                    (Some(hi), Some(lo)) => {
                        bytes.push((hi << 4) | lo);
                        pos += 3;
                    }
                    _ => {
                        bytes.extend_from_slice(c1.encode_utf8(&mut buf).as_bytes());
                        pos += 2;
                    }
                }
                significant = bytes.len();
            }
            '"' => return Err("unescaped quote in value"),
            c => {
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                pos += 1;
                if c != ' ' {
                    significant = bytes.len();
                }
            }
        }
    }
    bytes.truncate(significant);
    let value = String::from_utf8(bytes).map_err(|_| "value is not valid utf8")?;
    Ok((value, pos))
}

/// Undo backslash escaping in a value fragment, accepting both `\,` and `\2c` forms.
pub(crate) fn unescape_value(raw: &str) -> Result<String, OperationError> {
    let chars: Vec<char> = raw.chars().collect();
    let mut bytes: Vec<u8> = Vec::with_capacity(raw.len());
    let mut buf = [0u8; 4];
    let mut pos = 0;
    while pos < chars.len() {
        if chars[pos] == '\\' {
            let c1 = *chars.get(pos + 1).ok_or_else(|| {
                OperationError::InvalidDnSyntax(format!("{} - dangling escape", raw))
            })?;
            match (hex_value(c1), chars.get(pos + 2).copied().and_then(hex_value)) {
                (Some(hi), Some(lo)) => {
                    bytes.push((hi << 4) | lo);
                    pos += 3;
                }
                _ => {
                    bytes.extend_from_slice(c1.encode_utf8(&mut buf).as_bytes());
                    pos += 2;
                }
            }
        } else {
            bytes.extend_from_slice(chars[pos].encode_utf8(&mut buf).as_bytes());
            pos += 1;
        }
    }
    String::from_utf8(bytes)
        .map_err(|_| OperationError::InvalidDnSyntax(format!("{} - not valid utf8", raw)))
}

fn escape_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    let last = v.chars().count().saturating_sub(1);
    for (i, c) in v.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' | ' ' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            ' ' if i == last => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::dn::{Dn, Rdn};
    use crate::prelude::*;

    #[test]
    fn test_dn_parse_and_normalise() {
        let a = dn!("CN=Bob  Smith, OU=People,dc=Example,dc=com");
        let b = dn!("cn=bob smith,ou=people,dc=example,dc=com");
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert_eq!(a.to_string(), "cn=Bob  Smith,ou=People,dc=Example,dc=com");

        let r = dn!("");
        assert!(r.is_root());
        assert!(r.parent().is_none());

        // Escapes, both in the named and hex pair forms.
        let e = dn!("cn=Smith\\, John,dc=example,dc=com");
        assert_eq!(e.rdn().map(|r| r.avas()[0].value()), Some("Smith, John"));
        let h = dn!("cn=Smith\\2c John,dc=example,dc=com");
        assert_eq!(e, h);
        let q = dn!("cn=\"Smith, John\",dc=example,dc=com");
        assert_eq!(e, q);
        assert_eq!(e.to_string(), "cn=Smith\\, John,dc=example,dc=com");
    }

    #[test]
    fn test_dn_parse_invalid() {
        assert!(Dn::from_str("bogus").is_err());
        assert!(Dn::from_str("cn=").is_err());
        assert!(Dn::from_str("not a DN").is_err());
        assert!(Dn::from_str("cn=a,").is_err());
        assert!(Dn::from_str("cn=a,=b").is_err());
        assert!(Dn::from_str("c n=a").is_err());
    }

    #[test]
    fn test_dn_multivalued_rdn() {
        let a = dn!("cn=a+sn=b,dc=example");
        let b = dn!("sn=B+cn=A,dc=example");
        assert_eq!(a, b);
        assert!(a.rdn().map(|r| r.is_multi_valued()).unwrap_or(false));
        let mut set = hashbrown::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_dn_hierarchy() {
        let base = dn!("dc=example,dc=com");
        let people = dn!("ou=people,dc=example,dc=com");
        let bob = dn!("uid=bob,ou=people,dc=example,dc=com");

        assert!(bob.is_descendant_of(&base));
        assert!(bob.is_descendant_of(&bob));
        assert!(!bob.is_strict_descendant_of(&bob));
        assert!(!base.is_descendant_of(&bob));
        assert!(bob.is_descendant_of(&Dn::root()));
        assert_eq!(bob.parent(), Some(people.clone()));
        assert_eq!(bob.ancestor(2), Some(base.clone()));
        assert_eq!(bob.ancestor(4), Some(Dn::root()));
        assert_eq!(bob.ancestor(5), None);
        assert_eq!(dn!("dc=com").parent(), Some(Dn::root()));

        let moved = bob.rename(&people, &dn!("ou=staff,dc=example,dc=com"));
        assert_eq!(moved, Some(dn!("uid=bob,ou=staff,dc=example,dc=com")));
        assert_eq!(base.rename(&people, &dn!("dc=other")), None);

        let rdn = Rdn::from_str("uid=alice").unwrap();
        assert_eq!(people.child(rdn), dn!("uid=alice,ou=people,dc=example,dc=com"));
        assert!(Rdn::from_str("uid=alice,dc=com").is_err());
    }
}
