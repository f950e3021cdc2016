//! Single-writer leases
//!
//! A registry insert must hold a lease on every block it reads and every
//! group it rewrites. Acquisition is all-or-nothing and never blocks: the
//! first busy key is handed back so the caller can back off and retry.

use crate::candidates::BlockKey;
use adresx_core::RecordId;
use ahash::AHashSet;
use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LeaseKey {
    Block(BlockKey),
    /// A group, named by its lowest member id
    Group(RecordId),
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaseKey::Block(key) => write!(f, "block {}", key),
            LeaseKey::Group(id) => write!(f, "group {}", id),
        }
    }
}

#[derive(Debug, Default)]
pub struct GroupLeases {
    held: Mutex<AHashSet<LeaseKey>>,
}

impl GroupLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every key or none of them
    pub fn try_acquire(
        &self,
        keys: impl IntoIterator<Item = LeaseKey>,
    ) -> Result<LeaseGuard<'_>, LeaseKey> {
        let mut keys: Vec<LeaseKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut held = self.held.lock();
        if let Some(busy) = keys.iter().find(|k| held.contains(*k)) {
            return Err(busy.clone());
        }
        held.extend(keys.iter().cloned());

        Ok(LeaseGuard { leases: self, keys })
    }

    pub fn is_held(&self, key: &LeaseKey) -> bool {
        self.held.lock().contains(key)
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

/// Releases its keys on drop
#[derive(Debug)]
pub struct LeaseGuard<'a> {
    leases: &'a GroupLeases,
    keys: Vec<LeaseKey>,
}

impl LeaseGuard<'_> {
    pub fn keys(&self) -> &[LeaseKey] {
        &self.keys
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.leases.held.lock();
        for key in &self.keys {
            held.remove(key);
        }
    }
}
