//! The term → posting list dictionary.
//!
//! Locking: the dictionary map sits behind one `RwLock` and every posting list
//! behind its own. Writers hold the map's read lock while they take a term's
//! write lock, so inserts into different terms run in parallel and only a
//! brand new term (or pruning an emptied one) takes the map's write lock.
//! Readers copy a posting list under its read lock and never see it mid-update.
//!
//! Each document's distinct terms are remembered so a re-index can drop stale
//! associations. That table is striped by document id; a writer holds its
//! document's stripe for the whole replacement.
//!
//! A replacement touches its terms one list at a time, so a concurrent
//! [`lookup`](InvertedIndex::lookup) of two terms may see a document with
//! some old and some new terms. Every writer also holds a shared `writers`
//! gate for its whole update; [`snapshot`](InvertedIndex::snapshot) takes that
//! gate exclusively and therefore only ever sees whole documents.

use crate::posting::PostingList;
use crate::tokenizer::Tokenizer;
use crate::DocId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;

const DOC_STRIPES: usize = 64;

pub struct InvertedIndex {
    writers: RwLock<()>,
    postings: RwLock<HashMap<String, RwLock<PostingList>>>,
    universe: RwLock<PostingList>,
    doc_terms: Vec<Mutex<HashMap<DocId, Vec<String>>>>,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InvertedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvertedIndex")
            .field("num_docs", &self.num_docs())
            .field("num_terms", &self.num_terms())
            .finish()
    }
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self {
            writers: RwLock::new(()),
            postings: RwLock::new(HashMap::new()),
            universe: RwLock::new(PostingList::new()),
            doc_terms: (0..DOC_STRIPES).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Rebuild an index from saved posting lists.
    ///
    /// Per-document term sets are recovered by inverting `postings`; any id found
    /// there but missing from `universe` is added to it.
    pub fn from_postings<I>(postings: I, mut universe: PostingList) -> Self
    where
        I: IntoIterator<Item = (String, PostingList)>,
    {
        let index = Self::new();
        {
            let mut map = index.postings.write();
            for (term, list) in postings {
                if list.is_empty() {
                    continue;
                }
                for id in &list {
                    universe.insert(id);
                    index.doc_terms[stripe_of(id)].lock().entry(id).or_default().push(term.clone());
                }
                map.insert(term, RwLock::new(list));
            }
        }
        for id in &universe {
            let mut stripe = index.doc_terms[stripe_of(id)].lock();
            let terms = stripe.entry(id).or_default();
            terms.sort_unstable();
        }
        *index.universe.write() = universe;
        index
    }

    /// Index `doc_id` under the distinct values of `terms`.
    ///
    /// If `doc_id` is already indexed its previous terms are replaced: terms it
    /// no longer has lose the id, new ones gain it.
    pub fn add_document<I>(&self, doc_id: DocId, terms: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut new_terms: Vec<String> = terms.into_iter().map(|t| t.as_ref().to_owned()).collect();
        new_terms.sort_unstable();
        new_terms.dedup();

        let _writing = self.writers.read();
        let mut stripe = self.doc_terms[stripe_of(doc_id)].lock();
        let old_terms = stripe.remove(&doc_id).unwrap_or_default();

        let (mut i, mut j) = (0, 0);
        while i < old_terms.len() || j < new_terms.len() {
            match (old_terms.get(i), new_terms.get(j)) {
                (Some(old), Some(new)) if old == new => {
                    i += 1;
                    j += 1;
                }
                (Some(old), Some(new)) if old < new => {
                    self.remove_posting(old, doc_id);
                    i += 1;
                }
                (Some(old), None) => {
                    self.remove_posting(old, doc_id);
                    i += 1;
                }
                (_, Some(new)) => {
                    self.insert_posting(new, doc_id);
                    j += 1;
                }
                (None, None) => unreachable!(),
            }
        }

        self.universe.write().insert(doc_id);
        stripe.insert(doc_id, new_terms);
    }

    /// Tokenize `text` and index it as `doc_id`.
    pub fn index_text(&self, doc_id: DocId, tokenizer: &Tokenizer, text: &str) {
        let tokens = tokenizer.tokenize(text);
        self.add_document(doc_id, tokens.iter());
    }

    /// Drop `doc_id` from every posting list and from the universe.
    pub fn remove_document(&self, doc_id: DocId) -> bool {
        let _writing = self.writers.read();
        let mut stripe = self.doc_terms[stripe_of(doc_id)].lock();
        let Some(terms) = stripe.remove(&doc_id) else {
            return false;
        };
        for term in &terms {
            self.remove_posting(term, doc_id);
        }
        self.universe.write().remove(doc_id);
        true
    }

    /// Copy of the posting list for an already normalized term, empty if unknown.
    pub fn lookup(&self, term: &str) -> PostingList {
        self.postings
            .read()
            .get(term)
            .map(|list| list.read().clone())
            .unwrap_or_default()
    }

    pub fn contains_document(&self, doc_id: DocId) -> bool {
        self.doc_terms[stripe_of(doc_id)].lock().contains_key(&doc_id)
    }

    /// Sorted distinct terms of one document.
    pub fn document_terms(&self, doc_id: DocId) -> Option<Vec<String>> {
        self.doc_terms[stripe_of(doc_id)].lock().get(&doc_id).cloned()
    }

    /// Every indexed document id.
    pub fn universe(&self) -> PostingList {
        self.universe.read().clone()
    }

    /// One past the largest indexed id: the `n` of `PostingList::complement`.
    pub fn universe_size(&self) -> u64 {
        self.universe.read().last().map_or(0, |id| u64::from(id) + 1)
    }

    pub fn num_docs(&self) -> usize {
        self.universe.read().len()
    }

    pub fn num_terms(&self) -> usize {
        self.postings.read().len()
    }

    /// Sorted list of every term with at least one document.
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.postings.read().keys().cloned().collect();
        terms.sort_unstable();
        terms
    }

    /// Copy of every posting list, sorted by term.
    pub fn postings(&self) -> Vec<(String, PostingList)> {
        let mut all: Vec<(String, PostingList)> = self
            .postings
            .read()
            .iter()
            .map(|(term, list)| (term.clone(), list.read().clone()))
            .collect();
        all.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Every posting list, sorted by term, and the universe, taken while no
    /// writer is between its first and last list update.
    pub fn snapshot(&self) -> (Vec<(String, PostingList)>, PostingList) {
        let _quiet = self.writers.write();
        (self.postings(), self.universe())
    }

    fn insert_posting(&self, term: &str, doc_id: DocId) {
        {
            let map = self.postings.read();
            if let Some(list) = map.get(term) {
                list.write().insert(doc_id);
                return;
            }
        }
        self.postings
            .write()
            .entry(term.to_owned())
            .or_default()
            .get_mut()
            .insert(doc_id);
    }

    fn remove_posting(&self, term: &str, doc_id: DocId) {
        let emptied = {
            let map = self.postings.read();
            match map.get(term) {
                Some(list) => {
                    let mut list = list.write();
                    list.remove(doc_id) && list.is_empty()
                }
                None => false,
            }
        };
        if emptied {
            let mut map = self.postings.write();
            if map.get(term).is_some_and(|list| list.read().is_empty()) {
                map.remove(term);
            }
        }
    }
}

fn stripe_of(doc_id: DocId) -> usize {
    doc_id as usize % DOC_STRIPES
}
