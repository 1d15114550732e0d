//! Entries as the access control engine sees them. An [`Entry`] is a DN plus a set
//! of attribute-value lists. The host hands these to the engine as the resource of
//! an operation, as the bound client's entry, and as the results of internal
//! searches.
//!
//! Attribute names are held lowercased with any options kept, so `cn;lang-en` is a
//! distinct key from `cn`. Assertions against a base type (`cn`) consider values of
//! all its subtypes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::dn::normalise_value;
use crate::filter::SubstringFilter;
use crate::prelude::*;
use crate::schema::base_attr_type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    dn: Dn,
    attrs: BTreeMap<AttrString, Vec<String>>,
}

impl Entry {
    pub fn new(dn: Dn) -> Self {
        Entry {
            dn,
            attrs: BTreeMap::new(),
        }
    }

    pub fn get_dn(&self) -> &Dn {
        &self.dn
    }

    pub fn set_dn(&mut self, dn: Dn) {
        self.dn = dn;
    }

    /// Add a value. Values that already exist (compared case-insensitively) are
    /// not duplicated.
    pub fn add_ava(&mut self, attr: &str, value: &str) {
        let vs = self
            .attrs
            .entry(AttrString::from(attr.to_lowercase()))
            .or_default();
        let norm = normalise_value(value);
        if !vs.iter().any(|v| normalise_value(v) == norm) {
            vs.push(value.to_string());
        }
    }

    /// The values of exactly this attribute description.
    pub fn get_ava(&self, attr: &str) -> Option<&[String]> {
        self.attrs
            .get(attr.to_lowercase().as_str())
            .map(|v| v.as_slice())
    }

    pub fn get_ava_single(&self, attr: &str) -> Option<&str> {
        self.get_ava(attr)
            .and_then(|vs| vs.first())
            .map(|v| v.as_str())
    }

    /// Values for an attribute description. A bare type also returns values held
    /// under any of its options.
    pub fn get_ava_set(&self, attr: &str) -> Vec<&str> {
        let attr = attr.to_lowercase();
        if attr.contains(';') {
            return self
                .get_ava(&attr)
                .map(|vs| vs.iter().map(|v| v.as_str()).collect())
                .unwrap_or_default();
        }
        self.attrs
            .iter()
            .filter(|(k, _)| base_attr_type(k) == attr)
            .flat_map(|(_, vs)| vs.iter().map(|v| v.as_str()))
            .collect()
    }

    /// Values of the attribute that parse as DNs. Values that do not parse are
    /// skipped.
    pub fn get_ava_as_dns(&self, attr: &str) -> Vec<Dn> {
        self.get_ava_set(attr)
            .into_iter()
            .filter_map(|v| match Dn::from_str(v) {
                Ok(dn) => Some(dn),
                Err(e) => {
                    trace!(?e, %attr, "skipping value that is not a dn");
                    None
                }
            })
            .collect()
    }

    pub fn has_object_class(&self, oc: &str) -> bool {
        self.attribute_equality(ATTR_OBJECTCLASS, oc)
    }

    pub fn attribute_pres(&self, attr: &str) -> bool {
        // Every entry has an objectclass, even when the host did not supply one.
        if base_attr_type(attr).eq_ignore_ascii_case(ATTR_OBJECTCLASS) {
            return true;
        }
        !self.get_ava_set(attr).is_empty()
    }

    pub fn attribute_equality(&self, attr: &str, value: &str) -> bool {
        let norm = normalise_value(value);
        let values = self.get_ava_set(attr);
        if values.iter().any(|v| normalise_value(v) == norm) {
            return true;
        }
        // DN values can be written with differing spacing and escaping.
        match Dn::from_str(value) {
            Ok(asserted) if !asserted.is_root() => values
                .iter()
                .any(|v| Dn::from_str(v).map(|d| d == asserted).unwrap_or(false)),
            _ => false,
        }
    }

    pub fn attribute_substring(&self, attr: &str, sub: &SubstringFilter) -> bool {
        self.get_ava_set(attr)
            .into_iter()
            .any(|v| substring_match(&normalise_value(v), sub))
    }

    fn attribute_ordering(&self, attr: &str, value: &str, accept: &[Ordering]) -> bool {
        self.get_ava_set(attr).into_iter().any(|v| {
            let ord = match (v.trim().parse::<i64>(), value.trim().parse::<i64>()) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => normalise_value(v).cmp(&normalise_value(value)),
            };
            accept.contains(&ord)
        })
    }

    pub fn attribute_greater_or_equal(&self, attr: &str, value: &str) -> bool {
        self.attribute_ordering(attr, value, &[Ordering::Greater, Ordering::Equal])
    }

    pub fn attribute_less_or_equal(&self, attr: &str, value: &str) -> bool {
        self.attribute_ordering(attr, value, &[Ordering::Less, Ordering::Equal])
    }

    pub fn attribute_approx(&self, attr: &str, value: &str) -> bool {
        let squash = |s: &str| -> String {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase()
        };
        let want = squash(value);
        self.get_ava_set(attr).into_iter().any(|v| squash(v) == want)
    }

    fn attribute_extensible(
        &self,
        attr: Option<&AttrString>,
        rule: Option<&AttrString>,
        value: &str,
        dn_attrs: bool,
    ) -> bool {
        let cmp: fn(&str, &str) -> bool = match rule.map(|r| r.as_str()) {
            None | Some("caseignorematch") | Some("2.5.13.2") => {
                |a, b| normalise_value(a) == normalise_value(b)
            }
            Some("caseexactmatch") | Some("2.5.13.5") => |a, b| a.trim() == b.trim(),
            Some(r) => {
                filter_warn!(rule = %r, "unsupported matching rule in extensible filter");
                return false;
            }
        };

        let in_values = match attr {
            Some(a) => self.get_ava_set(a).into_iter().any(|v| cmp(v, value)),
            None => self
                .attrs
                .values()
                .flat_map(|vs| vs.iter())
                .any(|v| cmp(v, value)),
        };
        if in_values {
            return true;
        }

        dn_attrs
            && self.dn.rdns().iter().flat_map(|r| r.avas()).any(|ava| {
                attr.map(|a| base_attr_type(a) == ava.attr()).unwrap_or(true)
                    && cmp(ava.value(), value)
            })
    }

    /// Test this entry against a filter, without the assistance of indexes.
    pub fn entry_match_no_index(&self, filter: &Filter) -> bool {
        self.entry_match_no_index_inner(filter.to_inner())
    }

    // This is recursive!
    fn entry_match_no_index_inner(&self, filter: &FilterComp) -> bool {
        match filter {
            FC::Eq(attr, value) => self.attribute_equality(attr, value),
            FC::Sub(attr, sub) => self.attribute_substring(attr, sub),
            FC::Pres(attr) => self.attribute_pres(attr),
            FC::Ge(attr, value) => self.attribute_greater_or_equal(attr, value),
            FC::Le(attr, value) => self.attribute_less_or_equal(attr, value),
            FC::Approx(attr, value) => self.attribute_approx(attr, value),
            FC::Ext {
                attr,
                rule,
                value,
                dn_attrs,
            } => self.attribute_extensible(attr.as_ref(), rule.as_ref(), value, *dn_attrs),
            FC::Or(l) => l.iter().any(|f| self.entry_match_no_index_inner(f)),
            FC::And(l) => l.iter().all(|f| self.entry_match_no_index_inner(f)),
            FC::Not(f) => !self.entry_match_no_index_inner(f),
        }
    }

    /// Attribute descriptions present on this entry, ordered objectclass first,
    /// then user attributes, then operational attributes.
    pub fn get_attr_names(&self, schema: &Schema) -> Vec<AttrString> {
        let mut oc = Vec::with_capacity(1);
        let mut user = Vec::new();
        let mut oper = Vec::new();
        for k in self.attrs.keys() {
            if base_attr_type(k) == ATTR_OBJECTCLASS {
                oc.push(k.clone());
            } else if schema.is_operational(k) {
                oper.push(k.clone());
            } else {
                user.push(k.clone());
            }
        }
        oc.extend(user);
        oc.extend(oper);
        oc
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&AttrString, &Vec<String>)> {
        self.attrs.iter()
    }

    /// Remove a value. Returns true if it was present.
    pub fn remove_ava(&mut self, attr: &str, value: &str) -> bool {
        let key = attr.to_lowercase();
        let norm = normalise_value(value);
        let Some(vs) = self.attrs.get_mut(key.as_str()) else {
            return false;
        };
        let before = vs.len();
        vs.retain(|v| normalise_value(v) != norm);
        let removed = vs.len() != before;
        if vs.is_empty() {
            self.attrs.remove(key.as_str());
        }
        removed
    }

    pub fn purge_ava(&mut self, attr: &str) {
        self.attrs.remove(attr.to_lowercase().as_str());
    }

    /// Apply a modification list in order, producing the entry as it would be after
    /// the operation.
    pub fn apply_modlist(&mut self, modlist: &ModifyList) -> Result<(), OperationError> {
        for m in modlist {
            match m {
                Modify::Add(a, vs) => vs.iter().for_each(|v| self.add_ava(a, v)),
                Modify::Delete(a, vs) => {
                    if vs.is_empty() {
                        self.purge_ava(a);
                    } else {
                        for v in vs {
                            self.remove_ava(a, v);
                        }
                    }
                }
                Modify::Replace(a, vs) => {
                    self.purge_ava(a);
                    vs.iter().for_each(|v| self.add_ava(a, v));
                }
                Modify::Increment(a, vs) => {
                    let inc = vs
                        .first()
                        .and_then(|v| v.trim().parse::<i64>().ok())
                        .ok_or_else(|| {
                            OperationError::InvalidAttributeSyntax(format!(
                                "increment of {} requires a single integer value",
                                a
                            ))
                        })?;
                    let current = self
                        .get_ava_single(a)
                        .map(|v| v.trim().parse::<i64>())
                        .transpose()
                        .map_err(|_| {
                            OperationError::InvalidAttributeSyntax(format!(
                                "{} does not hold an integer",
                                a
                            ))
                        })?
                        .unwrap_or(0);
                    self.purge_ava(a);
                    self.add_ava(a, &(current + inc).to_string());
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn unsafe_from_entry_str(es: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct JsonEntry {
            dn: String,
            attrs: BTreeMap<String, Vec<String>>,
        }
        // Just use serde_json to parse the test entries.
        #[allow(clippy::expect_used)]
        let je: JsonEntry = serde_json::from_str(es).expect("Invalid Test Entry");
        #[allow(clippy::expect_used)]
        let mut e = Entry::new(Dn::from_str(&je.dn).expect("Invalid Test Entry DN"));
        for (a, vs) in je.attrs {
            for v in vs {
                e.add_ava(&a, &v);
            }
        }
        e
    }
}

fn substring_match(value: &str, sub: &SubstringFilter) -> bool {
    let mut rest = value;
    if let Some(initial) = &sub.initial {
        let initial = normalise_value(initial);
        match rest.strip_prefix(initial.as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for any in &sub.any {
        let any = normalise_value(any);
        match rest.find(any.as_str()) {
            Some(i) => rest = &rest[i + any.len()..],
            None => return false,
        }
    }
    match &sub.final_ {
        Some(f) => rest.ends_with(normalise_value(f).as_str()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    fn bob() -> Entry {
        Entry::unsafe_from_entry_str(
            r#"{
                "dn": "uid=bob,ou=people,dc=example,dc=com",
                "attrs": {
                    "objectClass": ["top", "person", "inetOrgPerson"],
                    "uid": ["bob"],
                    "cn": ["Bob  Smith"],
                    "cn;lang-fr": ["Robert Smith"],
                    "employeeNumber": ["42"],
                    "manager": ["uid=alice, ou=people, dc=example, dc=com"],
                    "modifyTimestamp": ["20240101000000Z"]
                }
            }"#,
        )
    }

    #[test]
    fn test_entry_match_filters() {
        let e = bob();
        let matches = |f: &str| e.entry_match_no_index(&Filter::from_str(f).unwrap());

        assert!(matches("(cn=bob smith)"));
        assert!(matches("(cn=robert smith)"));
        assert!(!matches("(cn;lang-fr=bob smith)"));
        assert!(matches("(objectclass=inetorgperson)"));
        assert!(matches("(cn=bob*)"));
        assert!(matches("(cn=*smi*)"));
        assert!(!matches("(cn=*jones)"));
        assert!(matches("(employeeNumber>=9)"));
        assert!(!matches("(employeeNumber<=9)"));
        assert!(matches("(cn~=bobsmith)"));
        assert!(matches("(manager=uid=alice,ou=people,dc=example,dc=com)"));
        assert!(matches("(&(uid=bob)(!(uid=alice)))"));
        assert!(matches("(|(uid=alice)(uid=bob))"));
        assert!(!matches("(mail=*)"));
        assert!(matches("(uid:caseExactMatch:=bob)"));
        assert!(!matches("(uid:caseExactMatch:=BOB)"));
        assert!(matches("(ou:dn:=people)"));
        assert!(!matches("(ou=people)"));

        // objectclass presence holds for any entry.
        let empty = entry_init!("cn=empty");
        assert!(empty.entry_match_no_index(&Filter::all()));
    }

    #[test]
    fn test_entry_attr_names_and_dns() {
        let e = bob();
        let schema = Schema::default();
        let names = e.get_attr_names(&schema);
        assert_eq!(names.first().map(|a| a.as_str()), Some("objectclass"));
        assert_eq!(names.last().map(|a| a.as_str()), Some("modifytimestamp"));
        assert_eq!(names.len(), 7);

        assert_eq!(
            e.get_ava_as_dns("manager"),
            vec![dn!("uid=alice,ou=people,dc=example,dc=com")]
        );
        assert!(e.get_ava_as_dns("cn").is_empty());
    }

    #[test]
    fn test_entry_apply_modlist() {
        let mut e = bob();
        let ml = ModifyList::new_list(vec![
            m_add("mail", &["bob@example.com", "BOB@example.com"]),
            m_delete("cn", &["bob smith"]),
            m_replace("uid", &["robert"]),
            m_increment("employeeNumber", "8"),
            m_purge("manager"),
        ]);
        e.apply_modlist(&ml).unwrap();
        assert_eq!(e.get_ava("mail").map(|v| v.len()), Some(1));
        assert!(e.get_ava("cn").is_none());
        assert_eq!(e.get_ava_single("uid"), Some("robert"));
        assert_eq!(e.get_ava_single("employeenumber"), Some("50"));
        assert!(!e.attribute_pres("manager"));

        let bad = ModifyList::new_list(vec![m_increment("uid", "1")]);
        assert!(e.apply_modlist(&bad).is_err());
    }
}
