//! Query side of the engine: filter compilation and evaluation, sorting,
//! cursor pagination and aggregation.

pub mod aggregate;
pub mod cursor;
pub mod executor;
pub mod filter;
pub mod pagination;
pub mod predicate;
pub mod sort;

pub use aggregate::{AggregateFunction, AggregateResult, AggregateSelection};
pub use cursor::Cursor;
pub use executor::{Connection, ConnectionEdge, QueryArgs, QueryExecutor};
pub use filter::{ConnectionPredicate, FilterCompiler, Predicate, Quantifier};
pub use pagination::{PageInfo, PageLimits, PageRequest};
pub use predicate::PredicateEvaluator;
pub use sort::{SortDirection, SortSpec};
