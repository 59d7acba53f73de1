//! Opaque pagination cursors.
//!
//! A cursor is the base64 encoding of `{"k": [sort-key values], "i": id}`.
//! It carries the full position, so resuming with `after` needs no server
//! state and stays correct while unrelated rows are written.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::sort::{SortRow, SortSpec};
use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "k")]
    pub keys: Vec<Value>,
    #[serde(rename = "i")]
    pub id: String,
}

impl Cursor {
    pub fn for_row<R: SortRow>(row: &R, spec: &SortSpec) -> Self {
        Self {
            keys: spec.key_values(row),
            id: row.row_id().to_string(),
        }
    }

    pub fn encode(&self) -> String {
        STANDARD.encode(json!({"k": self.keys, "i": self.id}).to_string())
    }

    pub fn decode(token: &str) -> EngineResult<Self> {
        let invalid = || EngineError::schema_validation(format!("invalid cursor '{}'", token));
        let bytes = STANDARD.decode(token).map_err(|_| invalid())?;
        let cursor: Cursor = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
        debug!("Decoded cursor at id {}", cursor.id);
        Ok(cursor)
    }

    /// A cursor only resumes a result ordered by the same number of keys.
    pub fn check_against(&self, spec: &SortSpec) -> EngineResult<()> {
        if self.keys.len() != spec.keys.len() {
            return Err(EngineError::schema_validation(format!(
                "cursor was issued for {} sort keys but the request sorts by {}",
                self.keys.len(),
                spec.keys.len()
            )));
        }
        Ok(())
    }

    /// Position of a row relative to this cursor.
    pub fn compare<R: SortRow>(&self, spec: &SortSpec, row: &R) -> std::cmp::Ordering {
        spec.compare_to_position(row, &self.keys, &self.id)
    }
}
