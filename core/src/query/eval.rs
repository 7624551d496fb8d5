//! Bottom-up evaluation of [`QueryNode`] trees against an [`InvertedIndex`].
//!
//! `NOT x` is the universe of indexed documents minus `x`. With dense ids
//! this is `x.complement(universe_size)`; it also keeps removed or skipped
//! ids out of negated results. `a AND NOT b` is computed as a difference so
//! the complement of `b` is never materialized, and an empty left operand of
//! `AND` skips its right operand.

use super::ast::QueryNode;
use super::parser::parse_query;
use crate::error::ParseError;
use crate::index::InvertedIndex;
use crate::posting::PostingList;
use crate::tokenizer::Tokenizer;
use std::sync::OnceLock;

pub struct QueryEvaluator<'a> {
    index: &'a InvertedIndex,
    universe: OnceLock<PostingList>,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(index: &'a InvertedIndex) -> Self {
        Self { index, universe: OnceLock::new() }
    }

    fn universe(&self) -> &PostingList {
        self.universe.get_or_init(|| self.index.universe())
    }

    pub fn evaluate(&self, node: &QueryNode) -> PostingList {
        match node {
            QueryNode::Term(term) => self.index.lookup(term),
            QueryNode::And(left, right) => match (&**left, &**right) {
                (_, QueryNode::Not(excluded)) => {
                    let kept = self.evaluate(left);
                    if kept.is_empty() {
                        return kept;
                    }
                    kept.difference(&self.evaluate(excluded))
                }
                (QueryNode::Not(excluded), _) => {
                    let kept = self.evaluate(right);
                    if kept.is_empty() {
                        return kept;
                    }
                    kept.difference(&self.evaluate(excluded))
                }
                _ => {
                    let l = self.evaluate(left);
                    if l.is_empty() {
                        return l;
                    }
                    l.intersect(&self.evaluate(right))
                }
            },
            QueryNode::Or(left, right) => self.evaluate(left).union(&self.evaluate(right)),
            QueryNode::Not(operand) => self.universe().difference(&self.evaluate(operand)),
        }
    }

    /// Same result as [`evaluate`](Self::evaluate), with both operands of every
    /// `AND`/`OR` evaluated concurrently on the rayon pool.
    pub fn evaluate_parallel(&self, node: &QueryNode) -> PostingList {
        match node {
            QueryNode::Term(term) => self.index.lookup(term),
            QueryNode::And(left, right) => match (&**left, &**right) {
                (_, QueryNode::Not(excluded)) | (QueryNode::Not(excluded), _) => {
                    let kept = if matches!(**right, QueryNode::Not(_)) { left } else { right };
                    let (kept, excluded) = rayon::join(
                        || self.evaluate_parallel(kept),
                        || self.evaluate_parallel(excluded),
                    );
                    kept.difference(&excluded)
                }
                _ => {
                    let (l, r) = rayon::join(
                        || self.evaluate_parallel(left),
                        || self.evaluate_parallel(right),
                    );
                    l.intersect(&r)
                }
            },
            QueryNode::Or(left, right) => {
                let (l, r) = rayon::join(
                    || self.evaluate_parallel(left),
                    || self.evaluate_parallel(right),
                );
                l.union(&r)
            }
            QueryNode::Not(operand) => self.universe().difference(&self.evaluate_parallel(operand)),
        }
    }
}

/// Parse `query` and evaluate it against `index`.
pub fn search(
    index: &InvertedIndex,
    tokenizer: &Tokenizer,
    query: &str,
) -> Result<PostingList, ParseError> {
    let node = parse_query(query, tokenizer)?;
    let hits = QueryEvaluator::new(index).evaluate(&node);
    tracing::debug!(%node, hits = hits.len(), "evaluated query");
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocId;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn corpus() -> (InvertedIndex, Tokenizer) {
        let tokenizer = Tokenizer::default();
        let index = InvertedIndex::new();
        for (id, text) in ["the cat sat", "the dog sat", "cats and dogs"].iter().enumerate() {
            index.index_text(id as DocId, &tokenizer, text);
        }
        (index, tokenizer)
    }

    fn hits(query: &str) -> Vec<DocId> {
        let (index, tokenizer) = corpus();
        search(&index, &tokenizer, query).unwrap().iter().collect()
    }

    #[test]
    fn example_queries() {
        assert_eq!(hits("cat"), vec![0]);
        assert_eq!(hits("cat OR dog"), vec![0, 1]);
        assert_eq!(hits("sat AND NOT cat"), vec![1]);
        assert_eq!(hits("(cat OR dog) AND sat"), vec![0, 1]);
        assert_eq!(hits("elephant"), Vec::<DocId>::new());
    }

    #[test]
    fn bare_not_is_complement_of_universe() {
        assert_eq!(hits("NOT sat"), vec![2]);
        assert_eq!(hits("NOT elephant"), vec![0, 1, 2]);
        assert_eq!(hits("NOT cat AND NOT dog"), vec![2]);
    }

    #[test]
    fn not_skips_ids_outside_the_index() {
        let index = InvertedIndex::new();
        index.add_document(0, ["a"]);
        index.add_document(2, ["b"]);
        let hits = search(&index, &Tokenizer::default(), "NOT a").unwrap();
        assert_eq!(hits.as_slice(), &[2]);
    }

    #[test]
    fn parse_errors_surface() {
        let (index, tokenizer) = corpus();
        let e = search(&index, &tokenizer, "cat AND").unwrap_err();
        assert_eq!(e.position, 7);
    }

    fn arb_query() -> impl Strategy<Value = QueryNode> {
        let leaf = "[a-f]".prop_map(QueryNode::Term);
        leaf.prop_recursive(5, 32, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(l, r)| QueryNode::and(l, r)),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| QueryNode::or(l, r)),
                inner.prop_map(QueryNode::not),
            ]
        })
    }

    fn reference(node: &QueryNode, docs: &[BTreeSet<String>]) -> BTreeSet<DocId> {
        match node {
            QueryNode::Term(t) => (0..docs.len() as DocId).filter(|&d| docs[d as usize].contains(t)).collect(),
            QueryNode::And(l, r) => reference(l, docs).intersection(&reference(r, docs)).copied().collect(),
            QueryNode::Or(l, r) => reference(l, docs).union(&reference(r, docs)).copied().collect(),
            QueryNode::Not(x) => {
                let inner = reference(x, docs);
                (0..docs.len() as DocId).filter(|d| !inner.contains(d)).collect()
            }
        }
    }

    proptest! {
        #[test]
        fn evaluation_matches_set_semantics(
            docs in prop::collection::vec(prop::collection::btree_set("[a-f]", 0..4), 1..16),
            query in arb_query(),
        ) {
            let index = InvertedIndex::new();
            for (id, terms) in docs.iter().enumerate() {
                index.add_document(id as DocId, terms);
            }
            let evaluator = QueryEvaluator::new(&index);
            let expected: Vec<DocId> = reference(&query, &docs).into_iter().collect();
            let sequential: Vec<DocId> = evaluator.evaluate(&query).iter().collect();
            let parallel: Vec<DocId> = evaluator.evaluate_parallel(&query).iter().collect();
            prop_assert_eq!(&sequential, &expected);
            prop_assert_eq!(&parallel, &expected);
        }
    }
}
