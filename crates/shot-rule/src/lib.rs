#![deny(missing_docs)]
#![doc = "Selection rule language: tokenizer, shunting-yard compiler and lazy postfix evaluator."]

use shot_core::errors::{ErrorInfo, ShotError};

/// Lazy evaluation over keyword accessors.
pub mod eval;
/// Operator and comparison tables.
pub mod ops;
/// Postfix compilation.
pub mod parse;
/// Rule tokenizer.
pub mod token;

pub use eval::{Accessor, Column, MapAccessor, MaskValue};
pub use ops::{canonical_text, Comparison, Operator};
pub use parse::{CompiledPredicate, PostfixItem};
pub use token::{tokenize, Atom, Token, TokenKind};

pub(crate) fn rule_error(
    code: &str,
    message: &str,
    source: &str,
    token: &str,
    pos: usize,
) -> ShotError {
    ShotError::Rule(
        ErrorInfo::new(code, message)
            .with_context("rule", source)
            .with_context("token", token)
            .with_context("position", pos.to_string()),
    )
}

/// Compiles a list of optional rule strings in order.
pub fn compile_rules(rules: &[Option<String>]) -> Result<Vec<CompiledPredicate>, ShotError> {
    rules
        .iter()
        .map(|rule| {
            let compiled = CompiledPredicate::compile(rule.as_deref())?;
            log::debug!("compiled rule '{}' -> {}", compiled.source(), compiled);
            Ok(compiled)
        })
        .collect()
}
