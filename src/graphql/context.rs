use std::sync::Arc;

use crate::engine::GraphEngine;

#[derive(Clone)]
pub struct GraphQLContext {
    pub engine: Arc<GraphEngine>,
}

impl GraphQLContext {
    pub fn new(engine: Arc<GraphEngine>) -> Self {
        Self { engine }
    }
}
