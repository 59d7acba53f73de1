//! GraphQL boundary over the generic engine.
//!
//! Filters, sorts and mutation inputs cross this boundary as JSON values and
//! are interpreted against the schema registry, so one set of resolvers
//! serves every entity type.

pub mod context;
pub mod mutations;
pub mod queries;
pub mod schema;
pub mod types;

pub use context::GraphQLContext;
pub use schema::{build_schema, ArchGraphSchema};
