use std::fmt;

/// A parsed boolean query. Terms are already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    Term(String),
    And(Box<QueryNode>, Box<QueryNode>),
    Or(Box<QueryNode>, Box<QueryNode>),
    Not(Box<QueryNode>),
}

impl QueryNode {
    pub fn term(term: impl Into<String>) -> Self {
        QueryNode::Term(term.into())
    }

    pub fn and(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: QueryNode) -> Self {
        QueryNode::Not(Box::new(operand))
    }

    /// Terms in left-to-right order, duplicates included.
    pub fn terms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            QueryNode::Term(t) => out.push(t),
            QueryNode::And(l, r) | QueryNode::Or(l, r) => {
                l.collect_terms(out);
                r.collect_terms(out);
            }
            QueryNode::Not(x) => x.collect_terms(out),
        }
    }
}

/// Fully parenthesized form, e.g. `((cat OR dog) AND NOT fish)`.
impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term(t) => f.write_str(t),
            QueryNode::And(l, r) => write!(f, "({l} AND {r})"),
            QueryNode::Or(l, r) => write!(f, "({l} OR {r})"),
            QueryNode::Not(x) => write!(f, "NOT {x}"),
        }
    }
}
