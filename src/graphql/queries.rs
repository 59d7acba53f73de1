use async_graphql::*;
use serde_json::Value;

use crate::errors::{EngineError, ToGraphQLError};
use crate::graphql::context::GraphQLContext;
use crate::graphql::types::{Aggregate, Connection, EntityTypeInfo, EnumInfo};
use crate::query::{AggregateSelection, QueryArgs};

pub struct Query;

fn count_arg(name: &str, value: Option<i32>) -> Result<Option<usize>> {
    match value {
        Some(v) if v < 0 => Err(EngineError::schema_validation(format!(
            "'{}' must not be negative, got {}",
            name, v
        ))
        .to_graphql_error()),
        Some(v) => Ok(Some(v as usize)),
        None => Ok(None),
    }
}

#[Object]
impl Query {
    /// List entities of a type, filtered and sorted, with offset paging
    async fn entities(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] type_name: String,
        #[graphql(name = "where")] where_: Option<Value>,
        sort: Option<Value>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Value>> {
        let context = ctx.data::<GraphQLContext>()?;
        let args = QueryArgs {
            where_,
            sort,
            limit: count_arg("limit", limit)?,
            offset: count_arg("offset", offset)?,
            ..QueryArgs::default()
        };

        context
            .engine
            .find(&type_name, &args)
            .await
            .map_err(|e| e.to_graphql_error())
    }

    /// Cursor paginated connection over entities of a type
    async fn connection(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] type_name: String,
        #[graphql(name = "where")] where_: Option<Value>,
        sort: Option<Value>,
        first: Option<i32>,
        after: Option<String>,
    ) -> Result<Connection> {
        let context = ctx.data::<GraphQLContext>()?;
        let args = QueryArgs {
            where_,
            sort,
            first: count_arg("first", first)?,
            after,
            ..QueryArgs::default()
        };

        let connection = context
            .engine
            .connection(&type_name, &args)
            .await
            .map_err(|e| e.to_graphql_error())?;
        Ok(connection.into())
    }

    async fn aggregate(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] type_name: String,
        #[graphql(name = "where")] where_: Option<Value>,
        node: Option<Vec<String>>,
    ) -> Result<Aggregate> {
        let context = ctx.data::<GraphQLContext>()?;
        let selection = AggregateSelection { node, edge: None };

        let result = context
            .engine
            .aggregate(&type_name, where_.as_ref(), &selection)
            .await
            .map_err(|e| e.to_graphql_error())?;
        Ok(result.into())
    }

    /// Connection over the nodes related to one entity
    #[graphql(name = "relationshipConnection")]
    #[allow(clippy::too_many_arguments)]
    async fn relationship_connection(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] type_name: String,
        id: ID,
        relationship: String,
        #[graphql(name = "where")] where_: Option<Value>,
        sort: Option<Value>,
        first: Option<i32>,
        after: Option<String>,
    ) -> Result<Connection> {
        let context = ctx.data::<GraphQLContext>()?;
        let args = QueryArgs {
            where_,
            sort,
            first: count_arg("first", first)?,
            after,
            ..QueryArgs::default()
        };

        let connection = context
            .engine
            .relationship_connection(&type_name, id.as_str(), &relationship, &args)
            .await
            .map_err(|e| e.to_graphql_error())?;
        Ok(connection.into())
    }

    #[graphql(name = "relationshipAggregate")]
    #[allow(clippy::too_many_arguments)]
    async fn relationship_aggregate(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] type_name: String,
        id: ID,
        relationship: String,
        #[graphql(name = "where")] where_: Option<Value>,
        node: Option<Vec<String>>,
        edge: Option<Vec<String>>,
    ) -> Result<Aggregate> {
        let context = ctx.data::<GraphQLContext>()?;
        let selection = AggregateSelection { node, edge };

        let result = context
            .engine
            .relationship_aggregate(
                &type_name,
                id.as_str(),
                &relationship,
                where_.as_ref(),
                &selection,
            )
            .await
            .map_err(|e| e.to_graphql_error())?;
        Ok(result.into())
    }

    /// Entity types known to the registry
    #[graphql(name = "schemaTypes")]
    async fn schema_types(&self, ctx: &Context<'_>) -> Result<Vec<EntityTypeInfo>> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context
            .engine
            .registry()
            .entity_types()
            .map(EntityTypeInfo::from)
            .collect())
    }

    #[graphql(name = "schemaEnums")]
    async fn schema_enums(&self, ctx: &Context<'_>) -> Result<Vec<EnumInfo>> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.engine.registry().enums().map(EnumInfo::from).collect())
    }
}
