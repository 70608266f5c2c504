//! Tokenizer turning a rule string into atoms, operators and parentheses.
//!
//! Option groups (`slu:(0|1)`) are expanded during tokenization: every bare
//! operand inside the group becomes a full atom carrying the group's keyword
//! and comparison, and the group itself becomes a parenthesised sub-stream.

use std::fmt;

use serde::{Deserialize, Serialize};
use shot_core::errors::ShotError;

use crate::ops::{canonical_text, Comparison, Operator};
use crate::rule_error;

/// Atomic sub-predicate `keyword OP operand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Keyword resolved through the accessor.
    pub keyword: String,
    /// Comparison applied to every per-shot value.
    pub comparison: Comparison,
    /// Operand as written in the rule.
    pub operand: String,
    /// Numeric operand for numeric comparisons, or when the operand parses.
    pub number: Option<f64>,
}

impl Atom {
    fn new(
        keyword: &str,
        comparison: Comparison,
        operand: &str,
        source: &str,
        pos: usize,
    ) -> Result<Self, ShotError> {
        let number = operand.parse::<f64>().ok();
        if comparison.is_numeric() && number.is_none() {
            return Err(rule_error(
                "operand_not_numeric",
                "numeric comparison needs a numeric operand",
                source,
                operand,
                pos,
            ));
        }
        Ok(Self {
            keyword: keyword.to_string(),
            comparison,
            operand: operand.to_string(),
            number,
        })
    }

    /// Operand text used for string equality against numeric columns.
    pub(crate) fn canonical_operand(&self) -> String {
        match self.number {
            Some(value) => canonical_text(value),
            None => self.operand.clone(),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.keyword, self.comparison, self.operand)
    }
}

/// Token kinds produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Atomic sub-predicate.
    Atom(Atom),
    /// Logical operator.
    Op(Operator),
    /// `(`
    Open,
    /// `)`
    Close,
}

/// Token with the byte position it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token payload.
    pub kind: TokenKind,
    /// Byte offset in the rule string.
    pub pos: usize,
}

impl Token {
    /// Text used when reporting the token in an error.
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Atom(atom) => atom.to_string(),
            TokenKind::Op(op) => op.symbol().to_string(),
            TokenKind::Open => "(".to_string(),
            TokenKind::Close => ")".to_string(),
        }
    }
}

fn is_special(ch: char) -> bool {
    matches!(
        ch,
        '&' | '|' | '^' | '~' | '(' | ')' | ':' | ';' | '<' | '>' | '='
    ) || ch.is_whitespace()
}

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    cursor: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            cursor: 0,
        }
    }

    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.cursor).copied()
    }

    fn end_pos(&self) -> usize {
        self.source.len()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some((_, ch)) if ch.is_whitespace()) {
            self.cursor += 1;
        }
    }

    fn word(&mut self) -> (usize, &'a str) {
        let start = self.peek().map(|(pos, _)| pos).unwrap_or(self.end_pos());
        while matches!(self.peek(), Some((_, ch)) if !is_special(ch)) {
            self.cursor += 1;
        }
        let end = self.peek().map(|(pos, _)| pos).unwrap_or(self.end_pos());
        (start, &self.source[start..end])
    }

    fn error_here(&self, code: &str, message: &str) -> ShotError {
        match self.peek() {
            Some((pos, ch)) => rule_error(code, message, self.source, &ch.to_string(), pos),
            None => rule_error(code, message, self.source, "<end>", self.end_pos()),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ShotError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some((pos, ch)) = self.peek() else {
                break;
            };
            if let Some(op) = Operator::from_symbol(ch) {
                self.cursor += 1;
                tokens.push(Token {
                    kind: TokenKind::Op(op),
                    pos,
                });
            } else if ch == '(' {
                self.cursor += 1;
                tokens.push(Token {
                    kind: TokenKind::Open,
                    pos,
                });
            } else if ch == ')' {
                self.cursor += 1;
                tokens.push(Token {
                    kind: TokenKind::Close,
                    pos,
                });
            } else if Comparison::from_symbol(ch).is_some() {
                return Err(self.error_here("missing_keyword", "comparison without a keyword"));
            } else {
                self.predicate(&mut tokens)?;
            }
        }
        Ok(tokens)
    }

    fn predicate(&mut self, tokens: &mut Vec<Token>) -> Result<(), ShotError> {
        let (keyword_pos, keyword) = self.word();
        self.skip_whitespace();
        let comparison = match self.peek().and_then(|(_, ch)| Comparison::from_symbol(ch)) {
            Some(comparison) => comparison,
            None => {
                return Err(self.error_here(
                    "missing_comparison",
                    &format!("keyword '{keyword}' is not followed by a comparison"),
                ))
            }
        };
        self.cursor += 1;
        self.skip_whitespace();
        match self.peek() {
            Some((_, '(')) => self.option_group(keyword, comparison, tokens),
            _ => {
                let (operand_pos, operand) = self.word();
                if operand.is_empty() {
                    return Err(self.error_here(
                        "missing_operand",
                        &format!("keyword '{keyword}' has no operand"),
                    ));
                }
                let atom = Atom::new(keyword, comparison, operand, self.source, operand_pos)?;
                tokens.push(Token {
                    kind: TokenKind::Atom(atom),
                    pos: keyword_pos,
                });
                Ok(())
            }
        }
    }

    /// Expands `keyword OP ( a | b & ~c )` into a parenthesised token run.
    fn option_group(
        &mut self,
        keyword: &str,
        comparison: Comparison,
        tokens: &mut Vec<Token>,
    ) -> Result<(), ShotError> {
        let (open_pos, _) = self.chars[self.cursor];
        let mut depth = 0usize;
        let mut members = 0usize;
        loop {
            self.skip_whitespace();
            let Some((pos, ch)) = self.peek() else {
                return Err(rule_error(
                    "unbalanced_parenthesis",
                    "option group is never closed",
                    self.source,
                    "(",
                    open_pos,
                ));
            };
            if ch == '(' {
                depth += 1;
                self.cursor += 1;
                tokens.push(Token {
                    kind: TokenKind::Open,
                    pos,
                });
            } else if ch == ')' {
                depth -= 1;
                self.cursor += 1;
                tokens.push(Token {
                    kind: TokenKind::Close,
                    pos,
                });
                if depth == 0 {
                    break;
                }
            } else if let Some(op) = Operator::from_symbol(ch) {
                self.cursor += 1;
                tokens.push(Token {
                    kind: TokenKind::Op(op),
                    pos,
                });
            } else if Comparison::from_symbol(ch).is_some() {
                return Err(self.error_here(
                    "unexpected_token",
                    "comparison inside an option group",
                ));
            } else {
                let (operand_pos, operand) = self.word();
                let atom = Atom::new(keyword, comparison, operand, self.source, operand_pos)?;
                members += 1;
                tokens.push(Token {
                    kind: TokenKind::Atom(atom),
                    pos: operand_pos,
                });
            }
        }
        if members == 0 {
            return Err(rule_error(
                "missing_operand",
                &format!("option group of '{keyword}' is empty"),
                self.source,
                "(",
                open_pos,
            ));
        }
        Ok(())
    }
}

/// Splits a rule string into tokens, expanding option groups and inserting
/// implicit conjunctions between adjacent operands.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ShotError> {
    let raw = Lexer::new(source).run()?;
    Ok(insert_implicit_and(raw))
}

fn ends_operand(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Atom(_) | TokenKind::Close)
}

fn starts_operand(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Atom(_) | TokenKind::Open | TokenKind::Op(Operator::Not)
    )
}

fn insert_implicit_and(raw: Vec<Token>) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::with_capacity(raw.len());
    for token in raw {
        if let Some(previous) = tokens.last() {
            if ends_operand(&previous.kind) && starts_operand(&token.kind) {
                tokens.push(Token {
                    kind: TokenKind::Op(Operator::ImplicitAnd),
                    pos: token.pos,
                });
            }
        }
        tokens.push(token);
    }
    tokens
}
