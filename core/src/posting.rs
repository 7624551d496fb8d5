//! Sorted, duplicate-free document id lists and their merge-based set algebra.
//!
//! Every binary operation walks both inputs once with two cursors: the cursor
//! at the smaller id advances, equal ids are handled once and both advance.
//! Nothing is ever re-sorted, so `union`, `intersect` and `difference` are
//! O(n + m) and `complement` is O(n + universe).

use crate::error::PostingListError;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Strictly increasing sequence of [`DocId`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<DocId>", into = "Vec<DocId>")]
pub struct PostingList {
    ids: Vec<DocId>,
}

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { ids: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_slice(&self) -> &[DocId] {
        &self.ids
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, DocId>> {
        self.ids.iter().copied()
    }

    pub fn first(&self) -> Option<DocId> {
        self.ids.first().copied()
    }

    pub fn last(&self) -> Option<DocId> {
        self.ids.last().copied()
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Insert `id`, returning `false` if it was already present.
    pub fn insert(&mut self, id: DocId) -> bool {
        match self.ids.last() {
            None => {
                self.ids.push(id);
                true
            }
            Some(&last) if id > last => {
                self.ids.push(id);
                true
            }
            _ => match self.ids.binary_search(&id) {
                Ok(_) => false,
                Err(pos) => {
                    self.ids.insert(pos, id);
                    true
                }
            },
        }
    }

    /// Remove `id`, returning `false` if it was not present.
    pub fn remove(&mut self, id: DocId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(pos) => {
                self.ids.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn union(&self, other: &PostingList) -> PostingList {
        let (a, b) = (&self.ids, &other.ids);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        PostingList { ids: out }
    }

    pub fn intersect(&self, other: &PostingList) -> PostingList {
        let (a, b) = (&self.ids, &other.ids);
        let mut out = Vec::with_capacity(a.len().min(b.len()));
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        PostingList { ids: out }
    }

    /// Ids in `self` that are not in `other`.
    pub fn difference(&self, other: &PostingList) -> PostingList {
        let (a, b) = (&self.ids, &other.ids);
        let mut out = Vec::with_capacity(a.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        PostingList { ids: out }
    }

    /// Every id in `0..universe_size` that is not in `self`.
    ///
    /// `universe_size` is a `u64` so the whole id space, `DocId::MAX + 1`, can
    /// be named; anything larger is clamped to it.
    pub fn complement(&self, universe_size: u64) -> PostingList {
        let end = universe_size.min(u64::from(DocId::MAX) + 1);
        let mut out = Vec::with_capacity((end as usize).saturating_sub(self.ids.len()));
        let mut present = self.ids.iter().copied().peekable();
        for id in (0..end).map(|id| id as DocId) {
            if present.next_if_eq(&id).is_none() {
                out.push(id);
            }
        }
        PostingList { ids: out }
    }
}

impl TryFrom<Vec<DocId>> for PostingList {
    type Error = PostingListError;

    fn try_from(ids: Vec<DocId>) -> Result<Self, Self::Error> {
        if let Some(index) = ids.windows(2).position(|w| w[0] >= w[1]) {
            return Err(PostingListError::NotSorted { index: index + 1 });
        }
        Ok(Self { ids })
    }
}

impl From<PostingList> for Vec<DocId> {
    fn from(list: PostingList) -> Self {
        list.ids
    }
}

impl FromIterator<DocId> for PostingList {
    fn from_iter<I: IntoIterator<Item = DocId>>(iter: I) -> Self {
        let mut ids: Vec<DocId> = iter.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = DocId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, DocId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for PostingList {
    type Item = DocId;
    type IntoIter = std::vec::IntoIter<DocId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}
