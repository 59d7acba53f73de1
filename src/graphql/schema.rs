use std::sync::Arc;

use async_graphql::{EmptySubscription, Schema};

use crate::engine::GraphEngine;
use crate::graphql::context::GraphQLContext;
use crate::graphql::mutations::Mutation;
use crate::graphql::queries::Query;

pub type ArchGraphSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn build_schema(engine: Arc<GraphEngine>) -> ArchGraphSchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .data(GraphQLContext::new(engine))
        .finish()
}
