//! Per-font cache of parsed name tables.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use log::debug;

use crate::{
    nametable::NameTable,
    runtime::{HostObject, ObjectId},
};

/// Parsed name tables keyed by the host object that owns the font.
///
/// The cache holds only the owner's [`ObjectId`], never a reference to the owner. Inserting
/// registers a drop hook on the owner that removes the entry once the owner is destroyed.
#[derive(Debug, Clone, Default)]
pub struct FontNameCache {
    tables: Arc<DashMap<ObjectId, Arc<NameTable>>>,
}

impl FontNameCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `table` with `owner`, replacing any previous table.
    pub fn insert(&self, owner: &HostObject, table: NameTable) {
        let id = owner.id();
        if self.tables.insert(id, Arc::new(table)).is_some() {
            return;
        }

        let tables: Weak<DashMap<ObjectId, Arc<NameTable>>> = Arc::downgrade(&self.tables);
        owner.on_drop(move |id| {
            if let Some(tables) = tables.upgrade() {
                tables.remove(&id);
                debug!("Evicted name table of {id:?}");
            }
        });
    }

    /// The table cached for `owner`.
    #[must_use]
    pub fn get(&self, owner: ObjectId) -> Option<Arc<NameTable>> {
        self.tables.get(&owner).map(|entry| entry.value().clone())
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no entry is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
