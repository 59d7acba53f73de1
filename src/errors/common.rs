//! Common error utilities and GraphQL conversion
//!
//! Engine errors become GraphQL errors carrying a stable `code` extension so
//! clients can branch on the kind without parsing messages. Validation
//! failures tied to a schema location add `entity` and `field`.

#[cfg(feature = "graphql")]
use async_graphql::{Error as GraphQLError, ErrorExtensions};

#[cfg(feature = "graphql")]
use super::*;

/// Convert domain errors to GraphQL errors with error codes
#[cfg(feature = "graphql")]
pub trait ToGraphQLError {
    /// Convert to GraphQL error with structured extensions
    fn to_graphql_error(&self) -> GraphQLError;
}

#[cfg(feature = "graphql")]
impl ToGraphQLError for EngineError {
    fn to_graphql_error(&self) -> GraphQLError {
        let code = self.error_code();
        let message = self.to_string();

        GraphQLError::new(message).extend_with(|_, e| {
            e.set("code", code);
            e.set("clientError", self.is_client_error());

            match self {
                EngineError::SchemaValidation(failure) => {
                    if let Some(entity) = &failure.entity {
                        e.set("entity", entity.as_str());
                    }
                    if let Some(field) = &failure.field {
                        e.set("field", field.as_str());
                    }
                }
                EngineError::Store(store) => e.set("storeError", store.to_string()),
                _ => {}
            }
        })
    }
}

#[cfg(feature = "graphql")]
impl ToGraphQLError for SchemaError {
    fn to_graphql_error(&self) -> GraphQLError {
        GraphQLError::new(self.to_string()).extend_with(|_, e| {
            e.set("code", "SCHEMA_DEFINITION");
        })
    }
}
