//! Recursive descent parser producing [`QueryNode`] trees.
//!
//! Term text goes through the same [`Tokenizer`] as indexed documents. A term
//! that normalizes to several pieces (`cat's` → `cat`, `s`) becomes the `AND`
//! of those pieces; one that normalizes to nothing is rejected.
//!
//! Nesting (`NOT` and parentheses) is capped at [`MAX_DEPTH`] levels and the
//! number of operators at [`MAX_CLAUSES`], so both parsing and every later
//! walk of the tree stay within a small, fixed stack.

use super::ast::QueryNode;
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{ParseError, ParseErrorKind};
use crate::tokenizer::Tokenizer;

pub const MAX_DEPTH: usize = 256;
pub const MAX_CLAUSES: usize = 1024;

/// Parse `input` with the default rules (explicit operators only).
pub fn parse_query(input: &str, tokenizer: &Tokenizer) -> Result<QueryNode, ParseError> {
    QueryParser::new(tokenizer).parse(input)
}

#[derive(Debug, Clone)]
pub struct QueryParser<'t> {
    tokenizer: &'t Tokenizer,
    implicit_and: bool,
}

impl<'t> QueryParser<'t> {
    pub fn new(tokenizer: &'t Tokenizer) -> Self {
        Self { tokenizer, implicit_and: false }
    }

    /// Treat adjacent operands (`cat dog`) as `cat AND dog` instead of an error.
    pub fn with_implicit_and(mut self, implicit_and: bool) -> Self {
        self.implicit_and = implicit_and;
        self
    }

    pub fn parse(&self, input: &str) -> Result<QueryNode, ParseError> {
        if input.trim().is_empty() {
            return Err(ParseError::new(ParseErrorKind::Empty, 0));
        }
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        let mut state = ParseState {
            lexer,
            current,
            open_parens: 0,
            depth: 0,
            clauses: 0,
            tokenizer: self.tokenizer,
            implicit_and: self.implicit_and,
        };

        let query = state.parse_or_expr()?;
        match &state.current.kind {
            TokenKind::Eof => Ok(query),
            TokenKind::RightParen => Err(state.error(ParseErrorKind::UnmatchedCloseParen)),
            other => Err(state.error(ParseErrorKind::UnexpectedToken(other.to_string()))),
        }
    }
}

struct ParseState<'a, 't> {
    lexer: Lexer<'a>,
    current: Token,
    open_parens: usize,
    depth: usize,
    clauses: usize,
    tokenizer: &'t Tokenizer,
    implicit_and: bool,
}

impl ParseState<'_, '_> {
    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.current.position)
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(ParseErrorKind::TooDeep(MAX_DEPTH)));
        }
        Ok(())
    }

    fn add_clauses(&mut self, count: usize) -> Result<(), ParseError> {
        self.clauses += count;
        if self.clauses > MAX_CLAUSES {
            return Err(self.error(ParseErrorKind::TooManyClauses(MAX_CLAUSES)));
        }
        Ok(())
    }

    /// or_expr := and_expr ("OR" and_expr)*
    fn parse_or_expr(&mut self) -> Result<QueryNode, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.current.kind == TokenKind::Or {
            self.add_clauses(1)?;
            self.advance();
            let right = self.parse_and_expr()?;
            left = QueryNode::or(left, right);
        }
        Ok(left)
    }

    /// and_expr := not_expr ("AND" not_expr)*
    fn parse_and_expr(&mut self) -> Result<QueryNode, ParseError> {
        let mut left = self.parse_not_expr()?;
        loop {
            if self.current.kind == TokenKind::And {
                self.add_clauses(1)?;
                self.advance();
            } else if self.implicit_and && self.current.kind.starts_operand() {
                self.add_clauses(1)?;
            } else {
                break;
            }
            let right = self.parse_not_expr()?;
            left = QueryNode::and(left, right);
        }
        Ok(left)
    }

    /// not_expr := "NOT" not_expr | atom
    fn parse_not_expr(&mut self) -> Result<QueryNode, ParseError> {
        if self.current.kind == TokenKind::Not {
            self.add_clauses(1)?;
            self.enter()?;
            self.advance();
            let operand = self.parse_not_expr()?;
            self.depth -= 1;
            return Ok(QueryNode::not(operand));
        }
        self.parse_atom()
    }

    /// atom := TERM | "(" query ")"
    fn parse_atom(&mut self) -> Result<QueryNode, ParseError> {
        match &self.current.kind {
            TokenKind::Term(word) => {
                let word = word.clone();
                let node = self.normalize_term(&word)?;
                self.advance();
                Ok(node)
            }
            TokenKind::LeftParen => {
                let open = self.current.position;
                self.enter()?;
                self.advance();
                self.open_parens += 1;
                let inner = self.parse_or_expr()?;
                match self.current.kind {
                    TokenKind::RightParen => {
                        self.open_parens -= 1;
                        self.depth -= 1;
                        self.advance();
                        Ok(inner)
                    }
                    TokenKind::Eof => Err(ParseError::new(ParseErrorKind::UnmatchedOpenParen, open)),
                    ref other => Err(self.error(ParseErrorKind::UnexpectedToken(other.to_string()))),
                }
            }
            TokenKind::Eof => Err(self.error(ParseErrorKind::UnexpectedEnd)),
            TokenKind::RightParen if self.open_parens == 0 => {
                Err(self.error(ParseErrorKind::UnmatchedCloseParen))
            }
            other => Err(self.error(ParseErrorKind::UnexpectedToken(other.to_string()))),
        }
    }

    fn normalize_term(&mut self, word: &str) -> Result<QueryNode, ParseError> {
        let tokens = self.tokenizer.tokenize(word);
        let pieces = tokens.iter().count();
        if pieces == 0 {
            return Err(self.error(ParseErrorKind::EmptyTerm(word.to_owned())));
        }
        self.add_clauses(pieces - 1)?;
        tokens
            .iter()
            .map(QueryNode::term)
            .reduce(QueryNode::and)
            .ok_or_else(|| self.error(ParseErrorKind::EmptyTerm(word.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TokenizerConfig;
    use proptest::prelude::*;

    fn parse(input: &str) -> Result<QueryNode, ParseError> {
        parse_query(input, &Tokenizer::default())
    }

    fn t(term: &str) -> QueryNode {
        QueryNode::term(term)
    }

    fn err(input: &str) -> (ParseErrorKind, usize) {
        let e = parse(input).unwrap_err();
        (e.kind, e.position)
    }

    #[test]
    fn single_term_is_normalized() {
        assert_eq!(parse("Cat").unwrap(), t("cat"));
    }

    #[test]
    fn precedence_not_and_or() {
        assert_eq!(
            parse("a OR b AND NOT c").unwrap(),
            QueryNode::or(t("a"), QueryNode::and(t("b"), QueryNode::not(t("c"))))
        );
        assert_eq!(
            parse("NOT a AND b").unwrap(),
            QueryNode::and(QueryNode::not(t("a")), t("b"))
        );
    }

    #[test]
    fn operators_are_left_associative() {
        assert_eq!(
            parse("a AND b AND c").unwrap(),
            QueryNode::and(QueryNode::and(t("a"), t("b")), t("c"))
        );
        assert_eq!(
            parse("a OR b OR c").unwrap(),
            QueryNode::or(QueryNode::or(t("a"), t("b")), t("c"))
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            parse("(cat OR dog) AND sat").unwrap(),
            QueryNode::and(QueryNode::or(t("cat"), t("dog")), t("sat"))
        );
        assert_eq!(parse("NOT NOT ((x))").unwrap(), QueryNode::not(QueryNode::not(t("x"))));
    }

    #[test]
    fn multi_piece_term_becomes_and() {
        assert_eq!(parse("cat's").unwrap(), QueryNode::and(t("cat"), t("s")));
        let keep = Tokenizer::new(TokenizerConfig { keep_apostrophes: true, ..Default::default() });
        assert_eq!(parse_query("cat's", &keep).unwrap(), t("cat's"));
    }

    #[test]
    fn dangling_operator_reports_end_of_input() {
        assert_eq!(err("cat AND"), (ParseErrorKind::UnexpectedEnd, 7));
        assert_eq!(err("NOT"), (ParseErrorKind::UnexpectedEnd, 3));
        assert_eq!(err("cat OR "), (ParseErrorKind::UnexpectedEnd, 7));
    }

    #[test]
    fn leading_operator_is_unexpected() {
        assert_eq!(err("AND cat"), (ParseErrorKind::UnexpectedToken("'AND'".into()), 0));
        assert_eq!(err("cat OR OR dog"), (ParseErrorKind::UnexpectedToken("'OR'".into()), 7));
    }

    #[test]
    fn empty_query() {
        assert_eq!(err(""), (ParseErrorKind::Empty, 0));
        assert_eq!(err("   "), (ParseErrorKind::Empty, 0));
    }

    #[test]
    fn unmatched_parentheses() {
        assert_eq!(err("(cat AND dog"), (ParseErrorKind::UnmatchedOpenParen, 0));
        assert_eq!(err("cat AND (dog OR (x)"), (ParseErrorKind::UnmatchedOpenParen, 8));
        assert_eq!(err("cat)"), (ParseErrorKind::UnmatchedCloseParen, 3));
        assert_eq!(err(") cat"), (ParseErrorKind::UnmatchedCloseParen, 0));
        assert_eq!(err("()"), (ParseErrorKind::UnexpectedToken("')'".into()), 1));
    }

    #[test]
    fn juxtaposition_requires_opt_in() {
        assert_eq!(err("cat dog"), (ParseErrorKind::UnexpectedToken("term \"dog\"".into()), 4));
        assert_eq!(err("(cat dog)"), (ParseErrorKind::UnexpectedToken("term \"dog\"".into()), 5));

        let tokenizer = Tokenizer::default();
        let parser = QueryParser::new(&tokenizer).with_implicit_and(true);
        assert_eq!(
            parser.parse("cat dog OR NOT fish").unwrap(),
            QueryNode::or(QueryNode::and(t("cat"), t("dog")), QueryNode::not(t("fish")))
        );
    }

    #[test]
    fn punctuation_only_term_is_rejected() {
        assert_eq!(err("cat AND !!!"), (ParseErrorKind::EmptyTerm("!!!".into()), 8));
    }

    #[test]
    fn deep_parentheses_are_rejected() {
        let deep = format!("{}a{}", "(".repeat(60_000), ")".repeat(60_000));
        assert_eq!(err(&deep), (ParseErrorKind::TooDeep(MAX_DEPTH), MAX_DEPTH));

        let ok = format!("{}a{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(parse(&ok).unwrap(), t("a"));
    }

    #[test]
    fn deep_not_chain_is_rejected() {
        let deep = format!("{}a", "NOT ".repeat(30_000));
        assert_eq!(err(&deep), (ParseErrorKind::TooDeep(MAX_DEPTH), MAX_DEPTH * 4));

        let mixed = format!("{}a{}", "NOT (".repeat(200), ")".repeat(200));
        assert_eq!(err(&mixed).0, ParseErrorKind::TooDeep(MAX_DEPTH));
    }

    #[test]
    fn long_operator_chains_are_capped() {
        let chain = vec!["a"; 20_000].join(" OR ");
        assert_eq!(err(&chain).0, ParseErrorKind::TooManyClauses(MAX_CLAUSES));

        let pieces = vec!["a"; 5_000].join(".");
        assert_eq!(err(&pieces).0, ParseErrorKind::TooManyClauses(MAX_CLAUSES));

        let fits = vec!["a"; MAX_CLAUSES + 1].join(" AND ");
        assert!(parse(&fits).is_ok());
    }

    fn arb_query() -> impl Strategy<Value = QueryNode> {
        let leaf = "[a-z]{1,4}".prop_map(QueryNode::Term);
        leaf.prop_recursive(4, 24, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(l, r)| QueryNode::and(l, r)),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| QueryNode::or(l, r)),
                inner.prop_map(QueryNode::not),
            ]
        })
    }

    proptest! {
        #[test]
        fn display_parses_back_to_same_tree(query in arb_query()) {
            prop_assert_eq!(parse(&query.to_string()).unwrap(), query);
        }
    }
}
