//! In-memory contact directory rebuilt wholesale from each directory dump.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::target::{Individual, Target};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub alias: String,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.alias.to_lowercase().contains(needle)
    }
}

impl From<&Individual> for DirectoryEntry {
    fn from(contact: &Individual) -> Self {
        DirectoryEntry::new(contact.name.clone(), contact.alias.clone().unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct DirectoryIndex {
    entries: RwLock<Vec<DirectoryEntry>>,
}

impl DirectoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole index with the result of a fresh directory dump.
    pub fn rebuild(&self, entries: Vec<DirectoryEntry>) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        *guard = entries;
    }

    pub fn rebuild_from_targets<'a>(&self, targets: impl IntoIterator<Item = &'a Target>) {
        let entries = targets
            .into_iter()
            .filter_map(|t| match t {
                Target::Individual(c) => Some(DirectoryEntry::from(c)),
                Target::Group(_) => None,
            })
            .collect();
        self.rebuild(entries);
    }

    /// Case-insensitive substring search over name and alias, in insertion order.
    pub fn search(&self, query: &str) -> Vec<DirectoryEntry> {
        let needle = query.trim().to_lowercase();
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard
            .iter()
            .filter(|entry| entry.matches(&needle))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
