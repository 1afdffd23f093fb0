//! Conversation records
//!
//! Rows arrive from the source as loose JSON objects. They are validated
//! into a [`Conversation`] as soon as they are pulled: the identifier, the
//! two categorical labels and the turn sequence are required, everything
//! else rides along untouched in `extra` so that re-encoding a record loses
//! nothing.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One role-tagged entry of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single conversation from the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "conversation_id")]
    pub id: String,

    /// Producing model label (tracked categorical field)
    pub model: String,

    /// Language label (tracked categorical field)
    pub language: String,

    #[serde(rename = "conversation")]
    pub turns: Vec<Turn>,

    /// Every other source field, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Conversation {
    /// Validate a raw source row. `index` is the row's position in the source.
    pub fn from_row(index: u64, row: Value) -> Result<Self> {
        if !row.is_object() {
            return Err(IngestError::malformed(
                index,
                format!("expected a JSON object, got {}", json_kind(&row)),
            ));
        }
        serde_json::from_value(row).map_err(|err| IngestError::malformed(index, err.to_string()))
    }

    pub fn message_count(&self) -> usize {
        self.turns.len()
    }

    /// Number of turns with the given role
    pub fn count_role(&self, role: &str) -> usize {
        self.turns.iter().filter(|turn| turn.role == role).count()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
