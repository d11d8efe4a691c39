//! Verification Checklist
//!
//! One checkbox per `(pallet id, sku, location)` of the frozen pallets,
//! keyed `"{pallet_id}-{sku}-{location}"`. Deduction is allowed only when
//! every checkbox is ticked.

use std::collections::BTreeSet;

use pf_schemas::Pallet;
use uuid::Uuid;

use crate::progress_cache::ProgressCache;

pub fn item_key(pallet_id: u32, sku: &str, location: &str) -> String {
    format!("{pallet_id}-{sku}-{location}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationChecklist {
    session_id: Uuid,
    keys: BTreeSet<String>,
    checked: BTreeSet<String>,
}

impl VerificationChecklist {
    pub fn new(session_id: Uuid, pallets: &[Pallet]) -> Self {
        let keys = pallets
            .iter()
            .flat_map(|p| p.items.iter().map(move |i| item_key(p.id, &i.sku, &i.location)))
            .collect();
        Self {
            session_id,
            keys,
            checked: BTreeSet::new(),
        }
    }

    /// Build and restore saved progress. Saved keys that no longer match a
    /// pallet line are dropped.
    pub fn restore(
        session_id: Uuid,
        pallets: &[Pallet],
        cache: &dyn ProgressCache,
    ) -> anyhow::Result<Self> {
        let mut list = Self::new(session_id, pallets);
        if let Some(saved) = cache.load(session_id)? {
            list.checked = saved.intersection(&list.keys).cloned().collect();
        }
        Ok(list)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Flip `key`. Returns the new state, or `None` for an unknown key.
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        if !self.keys.contains(key) {
            return None;
        }
        if self.checked.remove(key) {
            Some(false)
        } else {
            self.checked.insert(key.to_string());
            Some(true)
        }
    }

    /// Returns `false` for an unknown key.
    pub fn set_checked(&mut self, key: &str, checked: bool) -> bool {
        if !self.keys.contains(key) {
            return false;
        }
        if checked {
            self.checked.insert(key.to_string());
        } else {
            self.checked.remove(key);
        }
        true
    }

    pub fn check_all(&mut self) {
        self.checked = self.keys.clone();
    }

    pub fn is_checked(&self, key: &str) -> bool {
        self.checked.contains(key)
    }

    pub fn checked_count(&self) -> usize {
        self.checked.len()
    }

    pub fn total_checkboxes(&self) -> usize {
        self.keys.len()
    }

    /// An empty checklist is never complete.
    pub fn is_complete(&self) -> bool {
        !self.keys.is_empty() && self.checked.len() == self.keys.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn persist(&self, cache: &dyn ProgressCache) -> anyhow::Result<()> {
        cache.store(self.session_id, &self.checked)
    }
}
