//! Keeps the ACI cache in step with the directory. The host calls these after an
//! operation (or a replicated change) has been applied, and when a backend is
//! brought online or taken offline.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::access::list::AciListTransaction;
use crate::prelude::*;

pub struct AciListenerManager {
    acis: Arc<AciList>,
    config_dn: Dn,
    lockdown: AtomicBool,
}

impl AciListenerManager {
    pub fn new(acis: Arc<AciList>, config_dn: Dn) -> Self {
        AciListenerManager {
            acis,
            config_dn,
            lockdown: AtomicBool::new(false),
        }
    }

    /// Global ACIs are only honoured on the configuration entry.
    fn has_global_aci(&self, entry: &Entry) -> bool {
        entry.get_dn() == &self.config_dn && entry.attribute_pres(ATTR_GLOBAL_ACI)
    }

    pub fn handle_post_add(&self, entry: &Entry) {
        let has_aci = entry.attribute_pres(ATTR_ACI);
        let has_global_aci = self.has_global_aci(entry);
        if !has_aci && !has_global_aci {
            return;
        }
        let mut w = self.acis.write();
        w.add_aci_entry(entry, has_aci, has_global_aci);
        w.commit();
    }

    pub fn handle_post_delete(&self, entry: &Entry) {
        let has_aci = entry.attribute_pres(ATTR_ACI);
        let has_global_aci = self.has_global_aci(entry);
        if !has_aci && !has_global_aci {
            return;
        }
        let mut w = self.acis.write();
        w.remove_aci_entry(entry, has_aci, has_global_aci);
        w.commit();
    }

    pub fn handle_post_modify(&self, old: &Entry, new: &Entry, modlist: &ModifyList) {
        let has_aci = modlist.touches(ATTR_ACI);
        let has_global_aci = new.get_dn() == &self.config_dn && modlist.touches(ATTR_GLOBAL_ACI);
        if !has_aci && !has_global_aci {
            return;
        }
        let mut w = self.acis.write();
        w.mod_aci_old_new_entry(old, new, has_aci, has_global_aci);
        w.commit();
    }

    pub fn handle_post_modify_dn(&self, old_dn: &Dn, new_dn: &Dn) {
        let mut w = self.acis.write();
        w.rename_aci(old_dn, new_dn);
        w.commit();
    }

    /// Load every ACI held beneath the backend's base DNs. Values that fail to
    /// decode are skipped and put the server into lockdown mode.
    pub fn backend_initialize(
        &self,
        directory: &dyn InternalSearch,
        base_dns: &[Dn],
    ) -> Result<usize, OperationError> {
        let filter = Filter::new(f_or(vec![f_pres(ATTR_ACI), f_pres(ATTR_GLOBAL_ACI)]));
        let mut failed = Vec::new();
        let mut added = 0;
        let mut w = self.acis.write();
        for base in base_dns {
            let entries = directory.search_subtree(base, &filter).map_err(|err| {
                admin_error!(%base, ?err, "unable to search for acis");
                self.enter_lockdown();
                err
            })?;
            added += w.add_aci_entries(entries.iter().map(|e| e.as_ref()), &mut failed);
        }
        w.commit();

        if !failed.is_empty() {
            for msg in &failed {
                admin_warn!("{}", msg);
            }
            self.enter_lockdown();
        }
        admin_info!(added, "backend acis loaded");
        Ok(added)
    }

    pub fn backend_finalize(&self, base_dns: &[Dn]) {
        let mut w = self.acis.write();
        w.remove_aci_backend(base_dns);
        w.commit();
    }

    fn enter_lockdown(&self) {
        if !self.lockdown.swap(true, Ordering::AcqRel) {
            security_critical!("access control could not be fully loaded, entering lockdown mode");
        }
    }

    pub fn in_lockdown_mode(&self) -> bool {
        self.lockdown.load(Ordering::Acquire)
    }

    pub fn candidate_count(&self, dn: &Dn) -> usize {
        self.acis.read().get_candidate_acis(dn).len()
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use crate::testkit::TestDirectory;

    const READ_ALL: &str =
        "(targetattr=\"*\")(version 3.0; acl \"read\"; allow (read) userdn=\"ldap:///anyone\";)";

    fn manager() -> AciListenerManager {
        AciListenerManager::new(
            Arc::new(AciList::new(dn!(DEFAULT_ACI_CONFIG_DN))),
            dn!(DEFAULT_ACI_CONFIG_DN),
        )
    }

    #[test]
    fn test_listener_operation_hooks() {
        sketching::test_init();
        let m = manager();
        let leaf = dn!("uid=a,ou=people,dc=example,dc=com");

        let mut people = entry_init!("ou=people,dc=example,dc=com", (ATTR_ACI, READ_ALL));
        m.handle_post_add(&people);
        assert_eq!(m.candidate_count(&leaf), 1);

        // Entries without ACIs are ignored.
        m.handle_post_add(&entry_init!("ou=groups,dc=example,dc=com", ("ou", "groups")));
        assert_eq!(m.candidate_count(&dn!("ou=groups,dc=example,dc=com")), 0);

        let old = people.clone();
        let ml = ModifyList::new_list(vec![m_add(ATTR_ACI, &[READ_ALL.replace("read\"", "second\"").as_str()])]);
        people.apply_modlist(&ml).unwrap();
        m.handle_post_modify(&old, &people, &ml);
        assert_eq!(m.candidate_count(&leaf), 2);

        // A modification that leaves the ACIs alone does not reload them.
        let ml = ModifyList::new_list(vec![m_add("description", &["x"])]);
        m.handle_post_modify(&people, &people, &ml);
        assert_eq!(m.candidate_count(&leaf), 2);

        m.handle_post_modify_dn(
            &dn!("ou=people,dc=example,dc=com"),
            &dn!("ou=persons,dc=example,dc=com"),
        );
        assert_eq!(m.candidate_count(&leaf), 0);
        assert_eq!(m.candidate_count(&dn!("uid=a,ou=persons,dc=example,dc=com")), 2);

        people.set_dn(dn!("ou=persons,dc=example,dc=com"));
        m.handle_post_delete(&people);
        assert_eq!(m.candidate_count(&dn!("uid=a,ou=persons,dc=example,dc=com")), 0);
        assert!(!m.in_lockdown_mode());
    }

    #[test]
    fn test_listener_global_aci_on_config_only() {
        let m = manager();
        let any = dn!("dc=example,dc=com");

        m.handle_post_add(&entry_init!("cn=other,cn=config", (ATTR_GLOBAL_ACI, READ_ALL)));
        assert_eq!(m.candidate_count(&any), 0);

        let config = entry_init!(DEFAULT_ACI_CONFIG_DN, (ATTR_GLOBAL_ACI, READ_ALL));
        m.handle_post_add(&config);
        assert_eq!(m.candidate_count(&any), 1);

        m.handle_post_delete(&config);
        assert_eq!(m.candidate_count(&any), 0);
    }

    #[test]
    fn test_listener_backend_lifecycle() {
        sketching::test_init();
        let m = manager();
        let dir = TestDirectory::new(vec![
            entry_init!("dc=example,dc=com", (ATTR_ACI, READ_ALL)),
            entry_init!("ou=people,dc=example,dc=com", (ATTR_ACI, READ_ALL)),
            entry_init!("uid=a,ou=people,dc=example,dc=com", ("uid", "a")),
        ]);
        let base = dn!("dc=example,dc=com");

        assert_eq!(m.backend_initialize(&dir, &[base.clone()]), Ok(2));
        assert!(!m.in_lockdown_mode());
        assert_eq!(m.candidate_count(&dn!("uid=a,ou=people,dc=example,dc=com")), 2);

        m.backend_finalize(&[base.clone()]);
        assert_eq!(m.candidate_count(&dn!("uid=a,ou=people,dc=example,dc=com")), 0);

        // A value that does not decode is skipped and signals lockdown.
        let dir = TestDirectory::new(vec![
            entry_init!("dc=example,dc=com", (ATTR_ACI, READ_ALL)),
            entry_init!("ou=people,dc=example,dc=com", (ATTR_ACI, "(version 3.0; acl \"x\";)")),
        ]);
        assert_eq!(m.backend_initialize(&dir, &[base.clone()]), Ok(1));
        assert!(m.in_lockdown_mode());

        let m = manager();
        dir.fail_search.set(true);
        assert!(m.backend_initialize(&dir, &[base]).is_err());
        assert!(m.in_lockdown_mode());
    }
}
