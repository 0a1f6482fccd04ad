//! This is the parent module for the condition DSL: a small boolean
//! expression language that gates metadata on live game state.

pub mod evaluator;
pub mod parser;

pub use evaluator::ConditionEvaluator;
pub use parser::{Comparator, Expr, PathRegex, Predicate};
