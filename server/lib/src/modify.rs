//! Modification lists, as supplied by the host for a modify operation. The engine
//! needs these to check write rights per value, and the listener needs them to
//! decide whether a modify touched the `aci` or global ACI attributes.

use std::slice;

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modify {
    // These values should exist after the change.
    Add(AttrString, Vec<String>),
    // These values should not exist. An empty list removes the attribute.
    Delete(AttrString, Vec<String>),
    // The attribute holds exactly these values, an empty list removes it.
    Replace(AttrString, Vec<String>),
    // Add the single integer value to the existing one.
    Increment(AttrString, Vec<String>),
}

fn values(vs: &[&str]) -> Vec<String> {
    vs.iter().map(|v| v.to_string()).collect()
}

pub fn m_add(attr: &str, vs: &[&str]) -> Modify {
    Modify::Add(AttrString::from(attr.to_lowercase()), values(vs))
}

pub fn m_delete(attr: &str, vs: &[&str]) -> Modify {
    Modify::Delete(AttrString::from(attr.to_lowercase()), values(vs))
}

pub fn m_replace(attr: &str, vs: &[&str]) -> Modify {
    Modify::Replace(AttrString::from(attr.to_lowercase()), values(vs))
}

pub fn m_increment(attr: &str, v: &str) -> Modify {
    Modify::Increment(AttrString::from(attr.to_lowercase()), vec![v.to_string()])
}

pub fn m_purge(attr: &str) -> Modify {
    Modify::Delete(AttrString::from(attr.to_lowercase()), Vec::with_capacity(0))
}

impl Modify {
    pub fn attr(&self) -> &str {
        match self {
            Modify::Add(a, _)
            | Modify::Delete(a, _)
            | Modify::Replace(a, _)
            | Modify::Increment(a, _) => a.as_str(),
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            Modify::Add(_, v)
            | Modify::Delete(_, v)
            | Modify::Replace(_, v)
            | Modify::Increment(_, v) => v.as_slice(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModifyList {
    // The order of this list matters. Each change must be done in order.
    mods: Vec<Modify>,
}

impl<'a> IntoIterator for &'a ModifyList {
    type IntoIter = slice::Iter<'a, Modify>;
    type Item = &'a Modify;

    fn into_iter(self) -> Self::IntoIter {
        self.mods.iter()
    }
}

impl ModifyList {
    pub fn new() -> Self {
        ModifyList {
            mods: Vec::with_capacity(0),
        }
    }

    pub fn new_list(mods: Vec<Modify>) -> Self {
        ModifyList { mods }
    }

    pub fn new_purge_and_set(attr: &str, v: &str) -> Self {
        Self::new_list(vec![m_purge(attr), m_add(attr, &[v])])
    }

    pub fn push_mod(&mut self, modify: Modify) {
        self.mods.push(modify)
    }

    pub fn iter(&self) -> slice::Iter<'_, Modify> {
        self.mods.iter()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// Does any modification in this list touch `attr`.
    pub fn touches(&self, attr: &str) -> bool {
        self.mods
            .iter()
            .any(|m| m.attr().eq_ignore_ascii_case(attr))
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn test_modlist_touches() {
        let ml = ModifyList::new_list(vec![
            m_add("description", &["a"]),
            m_replace("ACI", &["(targetattr=\"*\")(version 3.0; acl \"x\"; allow (read) userdn=\"ldap:///anyone\";)"]),
        ]);
        assert_eq!(ml.len(), 2);
        assert!(ml.touches("aci"));
        assert!(ml.touches("Description"));
        assert!(!ml.touches("cn"));

        let ml = ModifyList::new_purge_and_set("mail", "a@example.com");
        assert_eq!(
            ml.iter().cloned().collect::<Vec<_>>(),
            vec![m_purge("mail"), m_add("mail", &["a@example.com"])]
        );
        assert!(ModifyList::new().is_empty());
    }
}
