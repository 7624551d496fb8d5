//! Inverted index and boolean query engine.
//!
//! Documents enter through a [`DocumentStore`](store::DocumentStore), are split
//! into normalized terms by the [`Tokenizer`](tokenizer::Tokenizer) and recorded
//! in an [`InvertedIndex`](index::InvertedIndex). Queries such as
//! `(cat OR dog) AND NOT fish` are parsed into a [`QueryNode`](query::QueryNode)
//! tree and evaluated with posting list set algebra.
//!
//! ```
//! use sift_core::build::BuildConfig;
//! use sift_core::index::InvertedIndex;
//! use sift_core::query::search;
//! use sift_core::store::MemoryStore;
//! use sift_core::tokenizer::Tokenizer;
//!
//! let store = MemoryStore::from_texts(["the cat sat", "the dog sat", "cats and dogs"]);
//! let (index, report) = InvertedIndex::build(store, &BuildConfig::default()).unwrap();
//! assert!(report.is_complete());
//!
//! let hits = search(&index, &Tokenizer::default(), "sat AND NOT cat").unwrap();
//! assert_eq!(hits.as_slice(), &[1]);
//! ```

use serde::{Deserialize, Serialize};

pub mod build;
pub mod error;
pub mod index;
pub mod persist;
pub mod posting;
pub mod query;
pub mod store;
pub mod tokenizer;

pub type DocId = u32;
pub type TermId = u32;

pub use build::{BuildConfig, BuildReport};
pub use error::{DecodeError, DocumentFailure, IndexError, ParseError, ParseErrorKind, PersistError};
pub use index::InvertedIndex;
pub use posting::PostingList;
pub use query::{parse_query, search, QueryEvaluator, QueryNode, QueryParser};
pub use store::{DocumentStore, MemoryStore, RawDocument};
pub use tokenizer::{Tokenizer, TokenizerConfig, Tokens};

/// What a front end knows about a document id; the core never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Where the document came from, e.g. a path relative to the indexed root.
    pub path: String,
}
