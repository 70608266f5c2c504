use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical operators understood by the rule language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// Unary `~`.
    Not,
    /// Inserted between adjacent operands that have no explicit operator.
    ImplicitAnd,
}

impl Operator {
    /// Maps an operator character to its operator.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '&' => Some(Operator::And),
            '|' => Some(Operator::Or),
            '^' => Some(Operator::Xor),
            '~' => Some(Operator::Not),
            _ => None,
        }
    }

    /// Binding strength used by the shunting-yard pass.
    pub const fn precedence(self) -> u8 {
        match self {
            Operator::And => 2,
            Operator::Or | Operator::Xor | Operator::Not => 1,
            Operator::ImplicitAnd => 0,
        }
    }

    /// Number of operands consumed.
    pub const fn arity(self) -> usize {
        match self {
            Operator::Not => 1,
            _ => 2,
        }
    }

    /// Textual symbol of the operator.
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::And | Operator::ImplicitAnd => "&",
            Operator::Or => "|",
            Operator::Xor => "^",
            Operator::Not => "~",
        }
    }

    pub(crate) fn apply_binary(self, left: bool, right: bool) -> bool {
        match self {
            Operator::And | Operator::ImplicitAnd => left && right,
            Operator::Or => left || right,
            Operator::Xor => left ^ right,
            Operator::Not => !left,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Comparison between a keyword's per-shot value and a literal operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    /// `:` or `;`, compares canonical text.
    StringEq,
    /// `>`
    NumGt,
    /// `<`
    NumLt,
    /// `=`
    NumEq,
}

impl Comparison {
    /// Maps a comparison character to its comparison.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            ':' | ';' => Some(Comparison::StringEq),
            '>' => Some(Comparison::NumGt),
            '<' => Some(Comparison::NumLt),
            '=' => Some(Comparison::NumEq),
            _ => None,
        }
    }

    /// Whether the comparison interprets values as numbers.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Comparison::StringEq)
    }

    /// Textual symbol of the comparison.
    pub const fn symbol(self) -> &'static str {
        match self {
            Comparison::StringEq => ":",
            Comparison::NumGt => ">",
            Comparison::NumLt => "<",
            Comparison::NumEq => "=",
        }
    }

    pub(crate) fn compare(self, value: f64, operand: f64) -> bool {
        match self {
            Comparison::NumGt => value > operand,
            Comparison::NumLt => value < operand,
            Comparison::NumEq | Comparison::StringEq => value == operand,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Canonical text of a numeric value: integral values carry no fraction.
pub fn canonical_text(value: f64) -> String {
    format!("{value}")
}
