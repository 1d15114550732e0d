//! The ACI cache. Decoded ACIs are keyed by the DN of the entry that holds them,
//! with the configuration entry's global ACIs keyed at the root DN. Global ACIs
//! from the handler configuration are held apart from the directory's, so changes
//! to the configuration entry never touch them. Reads take a snapshot and never
//! block, writers build a new copy and publish it on commit.

use std::ops::Deref;

use concread::cowcell::*;
use hashbrown::HashMap;

use crate::prelude::*;

#[derive(Clone, Default)]
struct AciListInner {
    acis: HashMap<Dn, Vec<Arc<Aci>>>,
    config_acis: Vec<Arc<Aci>>,
}

pub struct AciList {
    inner: CowCell<AciListInner>,
    config_dn: Dn,
}

impl AciList {
    pub fn new(config_dn: Dn) -> Self {
        AciList {
            inner: CowCell::new(AciListInner::default()),
            config_dn,
        }
    }

    pub fn read(&self) -> AciListReadTransaction {
        AciListReadTransaction {
            inner: self.inner.read(),
            config_dn: &self.config_dn,
        }
    }

    pub fn write(&self) -> AciListWriteTransaction {
        AciListWriteTransaction {
            inner: self.inner.write(),
            config_dn: &self.config_dn,
        }
    }
}

pub trait AciListTransaction {
    fn get_acis_map(&self) -> &HashMap<Dn, Vec<Arc<Aci>>>;

    /// Global ACIs given by the handler configuration rather than the directory.
    fn get_config_acis(&self) -> &[Arc<Aci>];

    fn config_dn(&self) -> &Dn;

    /// Every ACI that may govern `dn`: those held on the entry itself and on each
    /// of its ancestors. Global ACIs are only included when their own target
    /// reaches `dn`.
    fn get_candidate_acis(&self, dn: &Dn) -> Vec<Arc<Aci>> {
        let map = self.get_acis_map();
        let mut candidates = Vec::new();
        let mut next = Some(dn.clone());
        while let Some(level) = next {
            if let Some(acis) = map.get(&level) {
                if level.is_root() {
                    candidates.extend(
                        acis.iter()
                            .filter(|aci| aci.targets().is_target_applicable(aci.dn(), dn))
                            .cloned(),
                    );
                } else {
                    candidates.extend(acis.iter().cloned());
                }
            }
            next = level.parent();
        }
        candidates.extend(
            self.get_config_acis()
                .iter()
                .filter(|aci| aci.targets().is_target_applicable(aci.dn(), dn))
                .cloned(),
        );
        candidates
    }

    fn len(&self) -> usize {
        self.get_acis_map().values().map(|v| v.len()).sum::<usize>() + self.get_config_acis().len()
    }

    fn is_empty(&self) -> bool {
        self.get_acis_map().is_empty() && self.get_config_acis().is_empty()
    }
}

pub struct AciListReadTransaction<'a> {
    inner: CowCellReadTxn<AciListInner>,
    config_dn: &'a Dn,
}

impl AciListTransaction for AciListReadTransaction<'_> {
    fn get_acis_map(&self) -> &HashMap<Dn, Vec<Arc<Aci>>> {
        &self.inner.deref().acis
    }

    fn get_config_acis(&self) -> &[Arc<Aci>] {
        &self.inner.deref().config_acis
    }

    fn config_dn(&self) -> &Dn {
        self.config_dn
    }
}

pub struct AciListWriteTransaction<'a> {
    inner: CowCellWriteTxn<'a, AciListInner>,
    config_dn: &'a Dn,
}

impl AciListTransaction for AciListWriteTransaction<'_> {
    fn get_acis_map(&self) -> &HashMap<Dn, Vec<Arc<Aci>>> {
        &self.inner.deref().acis
    }

    fn get_config_acis(&self) -> &[Arc<Aci>] {
        &self.inner.deref().config_acis
    }

    fn config_dn(&self) -> &Dn {
        self.config_dn
    }
}

/// Decode each value against `dn`. Values that fail are reported into `failed`,
/// naming `source` as the entry that held them.
fn decode_values<'v>(
    values: impl Iterator<Item = &'v str>,
    dn: &Dn,
    source: &Dn,
    failed: &mut Vec<String>,
) -> Vec<Arc<Aci>> {
    let mut acis = Vec::new();
    for value in values {
        match Aci::decode(value, dn) {
            Ok(aci) => acis.push(Arc::new(aci)),
            Err(err) => {
                admin_warn!(%source, ?err, "unable to decode aci value \"{}\"", value);
                failed.push(format!(
                    "failed to decode the aci value \"{}\" on entry \"{}\": {}",
                    value, source, err
                ));
            }
        }
    }
    acis
}

impl AciListWriteTransaction<'_> {
    fn insert(&mut self, dn: Dn, acis: Vec<Arc<Aci>>) -> usize {
        let n = acis.len();
        if n > 0 {
            self.inner.acis.entry(dn).or_default().extend(acis);
        }
        n
    }

    /// Bulk load, as done when a backend is initialised. Decode failures do not
    /// abort the load. Returns the number of ACIs added.
    pub fn add_aci_entries<'e>(
        &mut self,
        entries: impl IntoIterator<Item = &'e Entry>,
        failed: &mut Vec<String>,
    ) -> usize {
        let mut added = 0;
        for e in entries {
            let dn = e.get_dn().clone();
            let acis = decode_values(e.get_ava_set(ATTR_ACI).into_iter(), &dn, &dn, failed);
            added += self.insert(dn, acis);

            if e.get_dn() == self.config_dn {
                let root = Dn::root();
                let config_dn = self.config_dn.clone();
                let acis = decode_values(
                    e.get_ava_set(ATTR_GLOBAL_ACI).into_iter(),
                    &root,
                    &config_dn,
                    failed,
                );
                added += self.insert(root, acis);
            }
        }
        admin_info!(added, failed = failed.len(), "loaded acis");
        added
    }

    /// Add the ACIs of a single entry. Returns the number added.
    pub fn add_aci_entry(&mut self, entry: &Entry, has_aci: bool, has_global_aci: bool) -> usize {
        let mut failed = Vec::new();
        let mut added = 0;
        if has_aci {
            let dn = entry.get_dn().clone();
            let acis =
                decode_values(entry.get_ava_set(ATTR_ACI).into_iter(), &dn, &dn, &mut failed);
            added += self.insert(dn, acis);
        }
        if has_global_aci {
            let acis = decode_values(
                entry.get_ava_set(ATTR_GLOBAL_ACI).into_iter(),
                &Dn::root(),
                entry.get_dn(),
                &mut failed,
            );
            added += self.insert(Dn::root(), acis);
        }
        admin_debug!(dn = %entry.get_dn(), added, "added acis");
        added
    }

    /// Replace the global ACIs given by the handler configuration. They are
    /// decoded against the root DN, and any failure leaves the set unchanged.
    pub fn set_config_acis(&mut self, values: &[String]) -> Result<usize, OperationError> {
        let root = Dn::root();
        let acis = values
            .iter()
            .map(|v| Aci::decode(v, &root).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let n = acis.len();
        self.inner.config_acis = acis;
        Ok(n)
    }

    /// Drop the ACIs held by `entry`. Returns true if any were cached.
    pub fn remove_aci_entry(&mut self, entry: &Entry, has_aci: bool, has_global_aci: bool) -> bool {
        let mut removed = false;
        if has_aci {
            removed |= self.inner.acis.remove(entry.get_dn()).is_some();
        }
        if has_global_aci {
            removed |= self.inner.acis.remove(&Dn::root()).is_some();
        }
        if removed {
            admin_debug!(dn = %entry.get_dn(), "removed acis");
        }
        removed
    }

    /// Drop every ACI held at or beneath any of the backend's base DNs.
    pub fn remove_aci_backend(&mut self, base_dns: &[Dn]) {
        let before = self.inner.acis.len();
        self.inner
            .acis
            .retain(|dn, _| !base_dns.iter().any(|base| dn.is_descendant_of(base)));
        admin_info!(removed = before - self.inner.acis.len(), "removed backend acis");
    }

    /// Replace the cached ACIs of a modified entry with those of its new state.
    pub fn mod_aci_old_new_entry(
        &mut self,
        old: &Entry,
        new: &Entry,
        has_aci: bool,
        has_global_aci: bool,
    ) -> usize {
        self.remove_aci_entry(old, has_aci, has_global_aci);
        self.add_aci_entry(new, has_aci, has_global_aci)
    }

    /// Move every ACI held at or beneath `old_dn` beneath `new_dn`. Each ACI is
    /// decoded again against its new entry; one that no longer decodes is dropped.
    pub fn rename_aci(&mut self, old_dn: &Dn, new_dn: &Dn) {
        let moved: Vec<Dn> = self
            .inner
            .acis
            .keys()
            .filter(|dn| dn.is_descendant_of(old_dn))
            .cloned()
            .collect();

        for dn in moved {
            let Some(acis) = self.inner.acis.remove(&dn) else {
                continue;
            };
            let Some(relocated) = dn.rename(old_dn, new_dn) else {
                continue;
            };
            let mut renamed = Vec::with_capacity(acis.len());
            for aci in acis {
                match Aci::decode(&aci.to_string(), &relocated) {
                    Ok(r) => renamed.push(Arc::new(r)),
                    Err(err) => {
                        admin_warn!(
                            old = %dn,
                            new = %relocated,
                            ?err,
                            "dropping aci \"{}\" that is not valid after the rename",
                            aci.name()
                        );
                    }
                }
            }
            self.insert(relocated, renamed);
        }
    }

    pub fn commit(self) {
        self.inner.commit();
    }
}
