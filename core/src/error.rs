use crate::DocId;
use thiserror::Error;

/// Failure reported by a [`DocumentStore`](crate::store::DocumentStore).
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A document's content could not be read as UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid utf-8 at byte {valid_up_to}")]
pub struct DecodeError {
    /// Length of the longest valid prefix.
    pub valid_up_to: usize,
    /// Length of the invalid sequence, `None` if the input ended mid-sequence.
    pub error_len: Option<usize>,
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self { valid_up_to: e.valid_up_to(), error_len: e.error_len() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("empty query")]
    Empty,
    #[error("unexpected end of query")]
    UnexpectedEnd,
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("unmatched '('")]
    UnmatchedOpenParen,
    #[error("unmatched ')'")]
    UnmatchedCloseParen,
    #[error("term {0:?} contains no searchable characters")]
    EmptyTerm(String),
    #[error("query nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("query has more than {0} operators")]
    TooManyClauses(usize),
}

/// Malformed query syntax. `position` is a byte offset into the query string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at position {position}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, position: usize) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingListError {
    #[error("posting list not strictly increasing at index {index}")]
    NotSorted { index: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    /// The document store itself failed; the partial index was discarded.
    #[error("index build interrupted after {indexed} documents: {source}")]
    BuildInterrupted {
        indexed: usize,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported index format version {found}, expected <= {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("postings file missing for term {term:?} (id {term_id})")]
    MissingPostings { term: String, term_id: u32 },
}

/// A document skipped during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub doc_id: DocId,
    pub error: DecodeError,
}
