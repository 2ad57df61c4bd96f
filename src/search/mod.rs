//! Search resolution: query parsing and predicate compilation.

pub mod compiler;
pub mod parser;
pub mod predicate;

pub use compiler::{CompiledSearch, PredicateCompiler, Resolution, Unresolved, UnresolvedReason};
pub use parser::{occurrences, parse_term, parse_terms, SearchTerm};
pub use predicate::{value_text, Condition, Filter, Operator, PredicateNode};
