use async_graphql::*;
use serde_json::Value;

use crate::errors::ToGraphQLError;
use crate::graphql::context::GraphQLContext;
use crate::graphql::types::{CreateResponse, DeleteInfo, UpdateResponse};

pub struct Mutation;

#[Object]
impl Mutation {
    /// Create one entity, or several when `input` is a list, including
    /// nested creates and connects
    async fn create(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] type_name: String,
        input: Value,
    ) -> Result<CreateResponse> {
        let context = ctx.data::<GraphQLContext>()?;

        let result = context
            .engine
            .create(&type_name, &input)
            .await
            .map_err(|e| e.to_graphql_error())?;

        Ok(CreateResponse {
            info: result.info.into(),
            entities: result.entities,
        })
    }

    async fn update(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] type_name: String,
        #[graphql(name = "where")] where_: Option<Value>,
        update: Option<Value>,
    ) -> Result<UpdateResponse> {
        let context = ctx.data::<GraphQLContext>()?;

        let result = context
            .engine
            .update(&type_name, where_.as_ref(), update.as_ref())
            .await
            .map_err(|e| e.to_graphql_error())?;

        Ok(UpdateResponse {
            info: result.info.into(),
            entities: result.entities,
        })
    }

    /// Delete matching entities and their touching relationships, cascading
    /// through `delete`
    async fn delete(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] type_name: String,
        #[graphql(name = "where")] where_: Option<Value>,
        delete: Option<Value>,
    ) -> Result<DeleteInfo> {
        let context = ctx.data::<GraphQLContext>()?;

        let info = context
            .engine
            .delete(&type_name, where_.as_ref(), delete.as_ref())
            .await
            .map_err(|e| e.to_graphql_error())?;

        Ok(info.into())
    }
}
