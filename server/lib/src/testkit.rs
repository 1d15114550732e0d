//! An in-memory directory for tests. It serves entries for internal searches and
//! resolves static group membership from `member` and `uniqueMember`, following
//! nested groups.

use std::cell::Cell;

use hashbrown::{HashMap, HashSet};

use crate::prelude::*;

#[derive(Default)]
pub(crate) struct TestDirectory {
    entries: HashMap<Dn, Arc<Entry>>,
    root_aliases: HashMap<Dn, Dn>,
    pub(crate) fail_search: Cell<bool>,
    pub(crate) fail_groups: Cell<bool>,
}

impl TestDirectory {
    pub(crate) fn new(entries: Vec<Entry>) -> Self {
        let mut d = TestDirectory::default();
        for e in entries {
            d.add(e);
        }
        d
    }

    pub(crate) fn add(&mut self, e: Entry) -> Arc<Entry> {
        let e = Arc::new(e);
        self.entries.insert(e.get_dn().clone(), e.clone());
        e
    }

    pub(crate) fn get(&self, dn: &Dn) -> Option<Arc<Entry>> {
        self.entries.get(dn).cloned()
    }

    pub(crate) fn add_root_alias(&mut self, alias: Dn, actual: Dn) {
        self.root_aliases.insert(alias, actual);
    }

    fn member_of(&self, member: &Dn, group: &Dn, seen: &mut HashSet<Dn>) -> bool {
        if !seen.insert(group.clone()) {
            return false;
        }
        let Some(g) = self.entries.get(group) else {
            return false;
        };
        let members: Vec<Dn> = ["member", "uniquemember"]
            .iter()
            .flat_map(|a| g.get_ava_as_dns(a))
            .collect();
        if members.contains(member) {
            return true;
        }
        members
            .iter()
            .filter(|m| self.entries.contains_key(*m))
            .any(|m| self.member_of(member, m, seen))
    }
}

impl InternalSearch for TestDirectory {
    fn search_base(&self, dn: &Dn) -> Result<Option<Arc<Entry>>, OperationError> {
        if self.fail_search.get() {
            return Err(OperationError::InternalSearch(dn.to_string()));
        }
        Ok(self.entries.get(dn).cloned())
    }

    fn search_subtree(
        &self,
        base: &Dn,
        filter: &Filter,
    ) -> Result<Vec<Arc<Entry>>, OperationError> {
        if self.fail_search.get() {
            return Err(OperationError::InternalSearch(base.to_string()));
        }
        let mut res: Vec<Arc<Entry>> = self
            .entries
            .values()
            .filter(|e| e.get_dn().is_descendant_of(base) && e.entry_match_no_index(filter))
            .cloned()
            .collect();
        // Parents first, so the order is stable between runs.
        res.sort_by_key(|e| e.get_dn().len());
        Ok(res)
    }

    fn actual_root_bind_dn(&self, dn: &Dn) -> Option<Dn> {
        self.root_aliases.get(dn).cloned()
    }
}

impl GroupMembership for TestDirectory {
    fn is_member(&self, member: &Dn, group: &Dn) -> Result<bool, OperationError> {
        if self.fail_groups.get() {
            return Err(OperationError::GroupResolution(group.to_string()));
        }
        Ok(self.member_of(member, group, &mut HashSet::new()))
    }
}
