//! Shunting-yard compilation of token streams into postfix predicates.

use std::fmt;

use serde::{Deserialize, Serialize};
use shot_core::errors::ShotError;

use crate::ops::Operator;
use crate::rule_error;
use crate::token::{tokenize, Atom, Token, TokenKind};

/// Entry of a compiled postfix sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostfixItem {
    /// Index into [`CompiledPredicate::atoms`].
    Atom(usize),
    /// Operator applied to the preceding operands.
    Op(Operator),
}

/// Immutable compiled form of a selection rule.
///
/// An empty (or absent) rule compiles to a predicate with no postfix items,
/// which evaluates to a constant `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPredicate {
    source: String,
    atoms: Vec<Atom>,
    postfix: Vec<PostfixItem>,
}

enum Pending {
    Open(usize),
    Op(Operator),
}

impl CompiledPredicate {
    /// Compiles an optional rule string; `None` and blank strings select everything.
    pub fn compile(rule: Option<&str>) -> Result<Self, ShotError> {
        let source = rule.unwrap_or("");
        let tokens = tokenize(source)?;
        let (atoms, postfix) = to_postfix(source, tokens)?;
        Ok(Self {
            source: source.to_string(),
            atoms,
            postfix,
        })
    }

    /// The predicate that selects every shot.
    pub fn always() -> Self {
        Self {
            source: String::new(),
            atoms: Vec::new(),
            postfix: Vec::new(),
        }
    }

    /// Rule text the predicate was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Atomic sub-predicates in order of appearance.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Postfix program.
    pub fn postfix(&self) -> &[PostfixItem] {
        &self.postfix
    }

    /// Whether the predicate is the constant `true`.
    pub fn is_trivial(&self) -> bool {
        self.postfix.is_empty()
    }

    /// Distinct keywords referenced by the rule, in order of first appearance.
    pub fn keywords(&self) -> Vec<&str> {
        let mut keywords: Vec<&str> = Vec::new();
        for atom in &self.atoms {
            if !keywords.contains(&atom.keyword.as_str()) {
                keywords.push(atom.keyword.as_str());
            }
        }
        keywords
    }
}

impl fmt::Display for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.postfix.is_empty() {
            return f.write_str("true");
        }
        for (index, item) in self.postfix.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            match item {
                PostfixItem::Atom(atom) => write!(f, "{}", self.atoms[*atom])?,
                PostfixItem::Op(op) => write!(f, "{op}")?,
            }
        }
        Ok(())
    }
}

fn token_error(code: &str, message: &str, source: &str, token: &Token) -> ShotError {
    rule_error(code, message, source, &token.text(), token.pos)
}

fn to_postfix(
    source: &str,
    tokens: Vec<Token>,
) -> Result<(Vec<Atom>, Vec<PostfixItem>), ShotError> {
    let mut atoms = Vec::new();
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Pending> = Vec::new();
    let mut expect_operand = true;
    let mut last: Option<Token> = None;

    for token in tokens {
        match &token.kind {
            TokenKind::Atom(atom) => {
                output.push(PostfixItem::Atom(atoms.len()));
                atoms.push(atom.clone());
                expect_operand = false;
            }
            TokenKind::Open => {
                stack.push(Pending::Open(token.pos));
                expect_operand = true;
            }
            TokenKind::Close => {
                if expect_operand {
                    return Err(token_error(
                        "missing_operand",
                        "expected an operand before ')'",
                        source,
                        &token,
                    ));
                }
                loop {
                    match stack.pop() {
                        Some(Pending::Op(op)) => output.push(PostfixItem::Op(op)),
                        Some(Pending::Open(_)) => break,
                        None => {
                            return Err(token_error(
                                "unbalanced_parenthesis",
                                "')' has no matching '('",
                                source,
                                &token,
                            ))
                        }
                    }
                }
            }
            TokenKind::Op(Operator::Not) => {
                stack.push(Pending::Op(Operator::Not));
                expect_operand = true;
            }
            TokenKind::Op(op) => {
                if expect_operand {
                    return Err(token_error(
                        "dangling_operator",
                        "binary operator is missing its left operand",
                        source,
                        &token,
                    ));
                }
                while let Some(Pending::Op(top)) = stack.last() {
                    if *top == Operator::Not || top.precedence() >= op.precedence() {
                        output.push(PostfixItem::Op(*top));
                        stack.pop();
                    } else {
                        break;
                    }
                }
                stack.push(Pending::Op(*op));
                expect_operand = true;
            }
        }
        last = Some(token);
    }

    if let Some(token) = last.as_ref() {
        if expect_operand {
            return Err(token_error(
                "dangling_operator",
                "rule ends without an operand",
                source,
                token,
            ));
        }
    }
    while let Some(pending) = stack.pop() {
        match pending {
            Pending::Op(op) => output.push(PostfixItem::Op(op)),
            Pending::Open(pos) => {
                return Err(rule_error(
                    "unbalanced_parenthesis",
                    "'(' is never closed",
                    source,
                    "(",
                    pos,
                ))
            }
        }
    }
    Ok((atoms, output))
}
