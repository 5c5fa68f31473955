//! The editable, ordered collection of records waiting to be submitted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A staged record and its correlation token. The token is generated when the record is staged
/// and is how results from the server are matched back to the record, no matter how the store
/// has been edited in the meantime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staged<R> {
    token: Uuid,
    record: R,
}

impl<R> Staged<R> {
    pub fn new(record: R) -> Self {
        Self {
            token: Uuid::new_v4(),
            record,
        }
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn record(&self) -> &R {
        &self.record
    }

    pub fn into_record(self) -> R {
        self.record
    }
}

/// An ordered sequence of staged records. The position of a record is the only identity the user
/// sees; every operation preserves the relative order of the records it leaves in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingStore<R> {
    items: Vec<Staged<R>>,
}

impl<R> Default for StagingStore<R> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<R> StagingStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the current contents and stages `records` in their given order.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = R>) {
        self.items = records.into_iter().map(Staged::new).collect();
    }

    pub fn append(&mut self, record: R) {
        self.items.push(Staged::new(record));
    }

    /// Removes the record at `index` and returns it. An index past the end does nothing.
    pub fn remove_at(&mut self, index: usize) -> Option<R> {
        if index >= self.items.len() {
            return None;
        }
        Some(self.items.remove(index).into_record())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.items.get(index).map(Staged::record)
    }

    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.items.iter().map(Staged::record)
    }

    pub fn items(&self) -> &[Staged<R>] {
        &self.items
    }

    /// Keeps only the records for which `keep` returns true, in one pass.
    pub fn retain(&mut self, mut keep: impl FnMut(&Staged<R>) -> bool) {
        self.items.retain(|item| keep(item));
    }
}
