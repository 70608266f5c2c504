//! Lazy postfix evaluation over a keyword accessor.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};

use crate::ops::{canonical_text, Comparison, Operator};
use crate::parse::{CompiledPredicate, PostfixItem};
use crate::token::Atom;

/// Per-shot values of one keyword, or a single value shared by all shots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// One number per shot.
    Numeric(Vec<f64>),
    /// One label per shot.
    Text(Vec<String>),
    /// A number that applies to every shot.
    NumericScalar(f64),
    /// A label that applies to every shot.
    TextScalar(String),
}

impl Column {
    /// Number of per-shot entries, `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Column::Numeric(values) => Some(values.len()),
            Column::Text(values) => Some(values.len()),
            Column::NumericScalar(_) | Column::TextScalar(_) => None,
        }
    }
}

/// Source of keyword columns for rule evaluation.
pub trait Accessor {
    /// Returns the column bound to `keyword`.
    fn column(&self, keyword: &str) -> Result<Column, ShotError>;
}

/// In-memory accessor backed by a keyword map.
#[derive(Debug, Clone, Default)]
pub struct MapAccessor {
    columns: BTreeMap<String, Column>,
}

impl MapAccessor {
    /// Creates an empty accessor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column, builder style.
    pub fn with(mut self, keyword: impl Into<String>, column: Column) -> Self {
        self.insert(keyword, column);
        self
    }

    /// Adds or replaces a column.
    pub fn insert(&mut self, keyword: impl Into<String>, column: Column) {
        self.columns.insert(keyword.into(), column);
    }
}

impl Accessor for MapAccessor {
    fn column(&self, keyword: &str) -> Result<Column, ShotError> {
        self.columns.get(keyword).cloned().ok_or_else(|| {
            ShotError::Rule(
                ErrorInfo::new("unknown_keyword", "keyword is not bound")
                    .with_context("keyword", keyword),
            )
        })
    }
}

/// Result of evaluating a predicate: a broadcast scalar or one flag per shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskValue {
    /// Applies to every shot.
    Scalar(bool),
    /// One flag per shot.
    Array(Vec<bool>),
}

fn length_error(left: usize, right: usize) -> ShotError {
    ShotError::Rule(
        ErrorInfo::new("mask_length", "operand masks differ in length")
            .with_context("left", left.to_string())
            .with_context("right", right.to_string()),
    )
}

impl MaskValue {
    /// Logical negation.
    pub fn not(self) -> Self {
        match self {
            MaskValue::Scalar(value) => MaskValue::Scalar(!value),
            MaskValue::Array(values) => MaskValue::Array(values.into_iter().map(|v| !v).collect()),
        }
    }

    /// Applies a binary operator element-wise, broadcasting scalars.
    pub fn combine(self, op: Operator, other: MaskValue) -> Result<Self, ShotError> {
        Ok(match (self, other) {
            (MaskValue::Scalar(a), MaskValue::Scalar(b)) => MaskValue::Scalar(op.apply_binary(a, b)),
            (MaskValue::Scalar(a), MaskValue::Array(b)) => {
                MaskValue::Array(b.into_iter().map(|b| op.apply_binary(a, b)).collect())
            }
            (MaskValue::Array(a), MaskValue::Scalar(b)) => {
                MaskValue::Array(a.into_iter().map(|a| op.apply_binary(a, b)).collect())
            }
            (MaskValue::Array(a), MaskValue::Array(b)) => {
                if a.len() != b.len() {
                    return Err(length_error(a.len(), b.len()));
                }
                MaskValue::Array(
                    a.into_iter()
                        .zip(b)
                        .map(|(a, b)| op.apply_binary(a, b))
                        .collect(),
                )
            }
        })
    }

    /// Expands into exactly `len` flags.
    pub fn into_mask(self, len: usize) -> Result<Vec<bool>, ShotError> {
        match self {
            MaskValue::Scalar(value) => Ok(vec![value; len]),
            MaskValue::Array(values) if values.len() == len => Ok(values),
            MaskValue::Array(values) => Err(length_error(values.len(), len)),
        }
    }

    /// Number of selected entries (`None` for scalars).
    pub fn count(&self) -> Option<usize> {
        match self {
            MaskValue::Scalar(_) => None,
            MaskValue::Array(values) => Some(values.iter().filter(|v| **v).count()),
        }
    }
}

fn not_numeric(atom: &Atom, value: &str) -> ShotError {
    ShotError::Rule(
        ErrorInfo::new("text_not_numeric", "numeric comparison on non-numeric text")
            .with_context("keyword", atom.keyword.clone())
            .with_context("value", value),
    )
}

fn compare_text(atom: &Atom, value: &str) -> Result<bool, ShotError> {
    match atom.comparison {
        Comparison::StringEq => Ok(value == atom.operand),
        numeric => {
            let parsed = value
                .trim()
                .parse::<f64>()
                .map_err(|_| not_numeric(atom, value))?;
            Ok(numeric.compare(parsed, atom.number.unwrap_or(f64::NAN)))
        }
    }
}

fn compare_number(atom: &Atom, operand: &str, value: f64) -> bool {
    match atom.comparison {
        Comparison::StringEq => canonical_text(value) == operand,
        numeric => numeric.compare(value, atom.number.unwrap_or(f64::NAN)),
    }
}

fn apply_atom(atom: &Atom, column: &Column) -> Result<MaskValue, ShotError> {
    Ok(match column {
        Column::Numeric(values) => {
            let operand = atom.canonical_operand();
            MaskValue::Array(
                values
                    .iter()
                    .map(|value| compare_number(atom, &operand, *value))
                    .collect(),
            )
        }
        Column::NumericScalar(value) => {
            MaskValue::Scalar(compare_number(atom, &atom.canonical_operand(), *value))
        }
        Column::Text(values) => MaskValue::Array(
            values
                .iter()
                .map(|value| compare_text(atom, value))
                .collect::<Result<_, _>>()?,
        ),
        Column::TextScalar(value) => MaskValue::Scalar(compare_text(atom, value)?),
    })
}

enum Slot {
    Pending(usize),
    Ready(MaskValue),
}

struct Evaluation<'p, 'a> {
    predicate: &'p CompiledPredicate,
    accessor: &'a dyn Accessor,
    columns: HashMap<&'p str, Column>,
}

impl<'p, 'a> Evaluation<'p, 'a> {
    fn resolve(&mut self, slot: Slot) -> Result<MaskValue, ShotError> {
        match slot {
            Slot::Ready(value) => Ok(value),
            Slot::Pending(index) => {
                let predicate = self.predicate;
                let atom = predicate.atoms().get(index).ok_or_else(stack_error)?;
                if !self.columns.contains_key(atom.keyword.as_str()) {
                    let column = self.accessor.column(&atom.keyword)?;
                    self.columns.insert(atom.keyword.as_str(), column);
                }
                match self.columns.get(atom.keyword.as_str()) {
                    Some(column) => apply_atom(atom, column),
                    None => Err(stack_error()),
                }
            }
        }
    }
}

fn stack_error() -> ShotError {
    ShotError::Rule(ErrorInfo::new(
        "stack_underflow",
        "postfix program is malformed",
    ))
}

impl CompiledPredicate {
    /// Evaluates the predicate against `accessor`.
    ///
    /// Columns are pulled only when an operator first needs an atom and each
    /// keyword is fetched at most once per call. A constant left operand
    /// short-circuits `&` and `|` without touching the right operand.
    pub fn evaluate(&self, accessor: &dyn Accessor) -> Result<MaskValue, ShotError> {
        if self.is_trivial() {
            return Ok(MaskValue::Scalar(true));
        }
        let mut eval = Evaluation {
            predicate: self,
            accessor,
            columns: HashMap::new(),
        };
        let mut stack: Vec<Slot> = Vec::new();
        for item in self.postfix() {
            match item {
                PostfixItem::Atom(index) => stack.push(Slot::Pending(*index)),
                PostfixItem::Op(Operator::Not) => {
                    let operand = stack.pop().ok_or_else(stack_error)?;
                    stack.push(Slot::Ready(eval.resolve(operand)?.not()));
                }
                PostfixItem::Op(op) => {
                    let right = stack.pop().ok_or_else(stack_error)?;
                    let left = stack.pop().ok_or_else(stack_error)?;
                    let left = eval.resolve(left)?;
                    let result = match (op, &left) {
                        (Operator::And | Operator::ImplicitAnd, MaskValue::Scalar(false)) => left,
                        (Operator::Or, MaskValue::Scalar(true)) => left,
                        _ => left.combine(*op, eval.resolve(right)?)?,
                    };
                    stack.push(Slot::Ready(result));
                }
            }
        }
        let top = stack.pop().ok_or_else(stack_error)?;
        if !stack.is_empty() {
            return Err(stack_error());
        }
        eval.resolve(top)
    }

    /// Evaluates and broadcasts into a mask over `shots` entries.
    pub fn mask(&self, accessor: &dyn Accessor, shots: usize) -> Result<Vec<bool>, ShotError> {
        self.evaluate(accessor)?.into_mask(shots)
    }
}
