//! Insertion-ordered parameter table with case-insensitive lookup.
//!
//! A [`Table`] stores `(name, value)` entries in the order the parser
//! committed them. Duplicate names are kept. Lookup folds names to ASCII
//! lowercase, so `get("SESSION")` and `get("session")` hit the same
//! entries while the entries themselves keep their original casing.
//!
//! Entries are immutable once inserted and shared between derived tables,
//! so cloning a table or building an overlay never copies parameter data.

use std::collections::HashMap;
use std::sync::Arc;

use crate::param::Param;

static NO_HITS: [usize; 0] = [];

/// Ordered multimap of parsed parameters.
///
/// Cloning produces an independent derived table: insertions into the
/// clone never affect the source. The underlying entries are shared.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<Arc<Param>>,
    index: HashMap<Vec<u8>, Vec<usize>>,
}

impl Table {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fold(name: &[u8]) -> Vec<u8> {
        name.to_ascii_lowercase()
    }

    /// Append an entry. Insertion order is preserved; duplicates are kept.
    pub fn insert(&mut self, param: Param) {
        self.insert_shared(Arc::new(param));
    }

    fn insert_shared(&mut self, param: Arc<Param>) {
        let key = Self::fold(param.name());
        let idx = self.entries.len();
        self.entries.push(param);
        self.index.entry(key).or_default().push(idx);
    }

    /// First entry whose case-folded name matches.
    #[must_use]
    pub fn first(&self, name: impl AsRef<[u8]>) -> Option<&Param> {
        let hits = self.index.get(&Self::fold(name.as_ref()))?;
        hits.first().map(|&i| self.entries[i].as_ref())
    }

    /// All entries whose case-folded name matches, in insertion order.
    pub fn all<'a>(&'a self, name: impl AsRef<[u8]>) -> impl Iterator<Item = &'a Param> + 'a {
        let hits = self
            .index
            .get(&Self::fold(name.as_ref()))
            .map_or(&NO_HITS[..], |v| v.as_slice());
        hits.iter().map(move |&i| self.entries[i].as_ref())
    }

    /// True when any entry's case-folded name matches.
    #[must_use]
    pub fn contains(&self, name: impl AsRef<[u8]>) -> bool {
        self.index.contains_key(&Self::fold(name.as_ref()))
    }

    /// Entry at a positional index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Param> {
        self.entries.get(index).map(Arc::as_ref)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.entries.iter().map(Arc::as_ref)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Produce a new table holding the entries of `self` followed by the
    /// entries of `other`, without dedup and without mutating either source.
    #[must_use]
    pub fn merge_overlay(&self, other: &Table) -> Table {
        let mut merged = Table::new();
        for param in self.entries.iter().chain(other.entries.iter()) {
            merged.insert_shared(Arc::clone(param));
        }
        merged
    }
}
