//! Store → tokenizer → index pipeline.

use crate::error::{DocumentFailure, IndexError};
use crate::index::InvertedIndex;
use crate::store::{DocumentStore, RawDocument};
use crate::tokenizer::{Tokenizer, TokenizerConfig};
use crate::DocId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub tokenizer: TokenizerConfig,
    /// Documents pulled from the store before a batch is indexed.
    pub batch_size: usize,
    /// Tokenize and insert each batch on the rayon pool.
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { tokenizer: TokenizerConfig::default(), batch_size: 256, parallel: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Documents successfully tokenized and indexed.
    pub indexed: usize,
    /// Documents skipped because their content was not valid UTF-8.
    pub failures: Vec<DocumentFailure>,
    pub terms: usize,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl InvertedIndex {
    /// Build a fresh index from every document `store` yields.
    ///
    /// Undecodable documents are skipped and listed in the report. If the store
    /// itself fails, the partial index is dropped and the error returned.
    pub fn build<S: DocumentStore>(
        mut store: S,
        config: &BuildConfig,
    ) -> Result<(InvertedIndex, BuildReport), IndexError> {
        let start = Instant::now();
        let tokenizer = Tokenizer::new(config.tokenizer);
        let index = InvertedIndex::new();
        let mut report = BuildReport::default();
        let batch_size = config.batch_size.max(1);
        let mut batch: Vec<RawDocument> = Vec::with_capacity(batch_size);
        let mut batch_ids: HashSet<DocId> = HashSet::new();

        loop {
            let next = match store.next_document() {
                Ok(next) => next,
                Err(source) => {
                    tracing::error!(indexed = report.indexed, error = %source, "document store failed, discarding partial index");
                    return Err(IndexError::BuildInterrupted { indexed: report.indexed, source });
                }
            };
            let Some(doc) = next else { break };

            // A repeated id must replace the earlier version, so it cannot share
            // a batch with it.
            if !batch_ids.insert(doc.id) {
                index_batch(&index, &tokenizer, &mut batch, config.parallel, &mut report);
                batch_ids.clear();
                batch_ids.insert(doc.id);
            }
            batch.push(doc);
            if batch.len() >= batch_size {
                index_batch(&index, &tokenizer, &mut batch, config.parallel, &mut report);
                batch_ids.clear();
            }
        }
        index_batch(&index, &tokenizer, &mut batch, config.parallel, &mut report);

        report.terms = index.num_terms();
        report.elapsed = start.elapsed();
        tracing::info!(
            indexed = report.indexed,
            skipped = report.failures.len(),
            terms = report.terms,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "index build complete"
        );
        Ok((index, report))
    }
}

fn index_batch(
    index: &InvertedIndex,
    tokenizer: &Tokenizer,
    batch: &mut Vec<RawDocument>,
    parallel: bool,
    report: &mut BuildReport,
) {
    if batch.is_empty() {
        return;
    }
    let index_one = |doc: &RawDocument| -> Option<DocumentFailure> {
        match tokenizer.tokenize_bytes(&doc.content) {
            Ok(tokens) => {
                index.add_document(doc.id, tokens.iter());
                None
            }
            Err(error) => {
                tracing::warn!(doc_id = doc.id, %error, "skipping undecodable document");
                Some(DocumentFailure { doc_id: doc.id, error })
            }
        }
    };
    let failures: Vec<DocumentFailure> = if parallel {
        batch.par_iter().filter_map(index_one).collect()
    } else {
        batch.iter().filter_map(index_one).collect()
    };
    report.indexed += batch.len() - failures.len();
    report.failures.extend(failures);
    batch.clear();
}
