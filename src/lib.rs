//! archgraph: a generic query and nested-mutation engine over a typed
//! property graph.
//!
//! The [`schema::SchemaRegistry`] describes entity types and their
//! relationships. The [`engine::GraphEngine`] interprets filter, sort,
//! aggregate and mutation inputs against that registry and runs them on a
//! [`store::GraphStore`], either in memory or on SQLite through sea-orm.

pub mod config;
pub mod database;
pub mod engine;
pub mod errors;
pub mod mutation;
pub mod query;
pub mod schema;
pub mod store;
pub mod value;

#[cfg(feature = "graphql")]
pub mod graphql;

pub use config::EngineConfig;
pub use engine::{GraphEngine, MutationResult};
pub use errors::{EngineError, EngineResult, SchemaError, StoreError};
pub use schema::SchemaRegistry;
