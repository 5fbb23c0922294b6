// Aggregation query DSL parser module

pub mod ast;
pub mod lexer;
pub mod query;

// Public API re-exports
pub use ast::{AggregationSpec, Column, Direction, OrderKey, OrderTerm};
pub use query::{parse_aggregation, parse_aggregation_spec};
