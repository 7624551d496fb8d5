use crate::error::StoreError;
use crate::DocId;
use std::collections::VecDeque;

/// Raw document content as handed over by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub id: DocId,
    pub content: Vec<u8>,
}

impl RawDocument {
    pub fn new(id: DocId, content: impl Into<Vec<u8>>) -> Self {
        Self { id, content: content.into() }
    }
}

/// Source of documents for a build.
///
/// Documents are pulled one at a time until `Ok(None)`. An `Err` means the
/// store itself is unusable and aborts the build; content that merely fails to
/// decode is not a store error.
pub trait DocumentStore {
    fn next_document(&mut self) -> Result<Option<RawDocument>, StoreError>;
}

/// An in-memory batch of documents.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    docs: VecDeque<RawDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents numbered from 0 in order.
    pub fn from_texts<I, T>(texts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(id, text)| RawDocument::new(id as DocId, text))
            .collect()
    }

    pub fn push(&mut self, doc: RawDocument) {
        self.docs.push_back(doc);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl FromIterator<RawDocument> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = RawDocument>>(iter: I) -> Self {
        Self { docs: iter.into_iter().collect() }
    }
}

impl DocumentStore for MemoryStore {
    fn next_document(&mut self) -> Result<Option<RawDocument>, StoreError> {
        Ok(self.docs.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_yields_in_order() {
        let mut store = MemoryStore::from_texts(["a", "b"]);
        assert_eq!(store.next_document().unwrap(), Some(RawDocument::new(0, "a")));
        assert_eq!(store.next_document().unwrap(), Some(RawDocument::new(1, "b")));
        assert_eq!(store.next_document().unwrap(), None);
    }
}
