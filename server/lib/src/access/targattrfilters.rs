//! `targattrfilters="add=mail:(mail=*@example.com) && cn:(cn=*), del=mail:(mail=*)"`
//!
//! Value level targeting. When a value is added (or deleted) the value must match
//! the filter given for its attribute before the ACI applies. Adding or deleting a
//! whole entry requires every value of each listed attribute to match.

use std::fmt;

use crate::access::container::AciContainer;
use crate::prelude::*;
use crate::schema::{base_attr_type, is_valid_attr_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargAttrFilterList {
    filters: Vec<(AttrString, Filter)>,
}

impl TargAttrFilterList {
    fn get(&self, attr: &str) -> Option<&Filter> {
        let base = base_attr_type(attr).to_lowercase();
        self.filters
            .iter()
            .find(|(a, _)| a.as_str() == base)
            .map(|(_, f)| f)
    }

    fn has_attr(&self, attr: &str) -> bool {
        self.get(attr).is_some()
    }

    fn value_matches(dn: &Dn, attr: &str, value: &str, filter: &Filter) -> bool {
        let mut e = Entry::new(dn.clone());
        e.add_ava(attr, value);
        e.entry_match_no_index(filter)
    }

    fn matches_value(&self, dn: &Dn, attr: &str, value: &str) -> bool {
        match self.get(attr) {
            Some(filter) => Self::value_matches(dn, attr, value, filter),
            None => false,
        }
    }

    /// Every value the entry holds for a listed attribute matches its filter.
    fn matches_entry(&self, entry: &Entry) -> bool {
        self.filters.iter().all(|(attr, filter)| {
            entry
                .get_ava_set(attr)
                .into_iter()
                .all(|v| Self::value_matches(entry.get_dn(), attr, v, filter))
        })
    }
}

impl fmt::Display for TargAttrFilterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (attr, filter)) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(" && ")?;
            }
            write!(f, "{}:{}", attr, filter)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargAttrFilters {
    add: Option<TargAttrFilterList>,
    del: Option<TargAttrFilterList>,
}

/// Split on `sep` where it is not inside parentheses.
fn split_top_level<'a>(s: &'a str, sep: &str) -> Option<Vec<&'a str>> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    let mut i = 0;
    let bytes = s.as_bytes();
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ if depth == 0 && bytes[i..].starts_with(sep.as_bytes()) => {
                parts.push(&s[start..i]);
                i += sep.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if depth != 0 {
        return None;
    }
    parts.push(&s[start..]);
    Some(parts)
}

impl TargAttrFilters {
    pub fn decode(expr: &str) -> Result<Self, AciError> {
        let bad = |why: &str| AciError::InvalidTargAttrFilters(expr.to_string(), why.to_string());
        let sections = split_top_level(expr, ",").ok_or_else(|| bad("unbalanced parentheses"))?;
        if sections.len() > 2 {
            return Err(bad("at most one add and one del list may be given"));
        }

        let mut taf = TargAttrFilters {
            add: None,
            del: None,
        };
        for section in sections {
            let (op, list) = section
                .split_once('=')
                .ok_or_else(|| bad("expected add= or del="))?;
            let slot = match op.trim().to_lowercase().as_str() {
                "add" => &mut taf.add,
                "del" => &mut taf.del,
                _ => return Err(bad("expected add= or del=")),
            };
            if slot.is_some() {
                return Err(bad("the same operation is given twice"));
            }
            *slot = Some(Self::decode_list(list, &bad)?);
        }
        Ok(taf)
    }

    fn decode_list<F>(list: &str, bad: &F) -> Result<TargAttrFilterList, AciError>
    where
        F: Fn(&str) -> AciError,
    {
        let items = split_top_level(list, "&&").ok_or_else(|| bad("unbalanced parentheses"))?;
        let mut filters = Vec::with_capacity(items.len());
        for item in items {
            let (attr, filter) = item
                .split_once(':')
                .ok_or_else(|| bad("expected attr:(filter)"))?;
            let attr = attr.trim();
            if !is_valid_attr_name(attr) {
                return Err(bad("invalid attribute name"));
            }
            let attr = AttrString::from(attr.to_lowercase());
            let filter_text = filter.trim();
            if !filter_text.starts_with('(') {
                return Err(bad("expected a parenthesised filter"));
            }
            let filter = Filter::from_str(filter_text).map_err(|_| bad("invalid filter"))?;
            if filter
                .get_attr_set()
                .iter()
                .any(|a| base_attr_type(a) != attr.as_str())
            {
                return Err(bad("a filter may only refer to its own attribute"));
            }
            if filters.iter().any(|(a, _)| *a == attr) {
                return Err(bad("an attribute is listed twice"));
            }
            filters.push((attr, filter));
        }
        Ok(TargAttrFilterList { filters })
    }

    /// The attribute is named in either list.
    pub fn has_attr(&self, attr: &str) -> bool {
        self.add.as_ref().map(|l| l.has_attr(attr)).unwrap_or(false)
            || self.del.as_ref().map(|l| l.has_attr(attr)).unwrap_or(false)
    }

    pub(crate) fn is_applicable(&self, aci: &Arc<Aci>, c: &mut AciContainer) -> bool {
        // geteffectiverights asks about write with no value to hold against the
        // filters. Set the ACI aside so the summary can report it.
        if c.is_ger_eval() && c.has_rights(Rights::WRITE) && c.current_value().is_none() {
            c.scratch.targ_attr_filter_acis.push(aci.clone());
            return true;
        }

        let rights = c.rights();
        let list = if rights.has_rights(Rights::WRITE_ADD | Rights::ADD) {
            self.add.as_ref()
        } else if rights.has_rights(Rights::WRITE_DELETE | Rights::DELETE) {
            self.del.as_ref()
        } else {
            return false;
        };
        let Some(list) = list else {
            return false;
        };

        let matched = match (c.current_attr(), c.current_value()) {
            (Some(attr), Some(value)) => list.matches_value(c.resource_dn(), attr, value),
            _ => list.matches_entry(c.resource()),
        };
        if matched {
            c.scratch.targ_attr_filters_match = true;
        }
        matched
    }
}

impl fmt::Display for TargAttrFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(add) = &self.add {
            write!(f, "add={}", add)?;
        }
        if let Some(del) = &self.del {
            if self.add.is_some() {
                f.write_str(", ")?;
            }
            write!(f, "del={}", del)?;
        }
        Ok(())
    }
}
