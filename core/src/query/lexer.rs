use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Raw, not yet normalized term text.
    Term(String),
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
    Eof,
}

impl TokenKind {
    /// Whether this token can begin an operand.
    pub fn starts_operand(&self) -> bool {
        matches!(self, TokenKind::Term(_) | TokenKind::Not | TokenKind::LeftParen)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Term(t) => write!(f, "term {t:?}"),
            TokenKind::And => f.write_str("'AND'"),
            TokenKind::Or => f.write_str("'OR'"),
            TokenKind::Not => f.write_str("'NOT'"),
            TokenKind::LeftParen => f.write_str("'('"),
            TokenKind::RightParen => f.write_str("')'"),
            TokenKind::Eof => f.write_str("end of query"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token's first character.
    pub position: usize,
}

/// Splits a query string on whitespace and parentheses.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    pub fn next_token(&mut self) -> Token {
        let rest = &self.input[self.position..];
        let trimmed = rest.trim_start();
        self.position += rest.len() - trimmed.len();
        let start = self.position;

        let Some(ch) = trimmed.chars().next() else {
            return Token { kind: TokenKind::Eof, position: self.input.len() };
        };
        let kind = match ch {
            '(' => {
                self.position += 1;
                TokenKind::LeftParen
            }
            ')' => {
                self.position += 1;
                TokenKind::RightParen
            }
            _ => {
                let len = trimmed
                    .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                    .unwrap_or(trimmed.len());
                self.position += len;
                match &trimmed[..len] {
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "NOT" => TokenKind::Not,
                    word => TokenKind::Term(word.to_owned()),
                }
            }
        };
        Token { kind, position: start }
    }
}
