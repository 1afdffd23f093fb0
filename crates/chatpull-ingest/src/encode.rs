//! Record encodings written to the sink

use crate::record::{Conversation, Turn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a record is shaped before it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Every source field, as received
    #[default]
    Raw,
    /// Flattened view with message counts
    Clean,
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transform::Raw => f.write_str("raw"),
            Transform::Clean => f.write_str("clean"),
        }
    }
}

/// Flattened conversation written by [`Transform::Clean`]
#[derive(Debug, Serialize)]
pub struct CleanConversation<'a> {
    pub id: &'a str,
    pub model: &'a str,
    pub language: &'a str,
    pub turn_count: u64,
    pub messages: &'a [Turn],
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
}

impl<'a> From<&'a Conversation> for CleanConversation<'a> {
    fn from(conversation: &'a Conversation) -> Self {
        // Prefer the source's own turn counter; fall back to user turns.
        let turn_count = conversation
            .extra
            .get("turn")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| conversation.count_role("user") as u64);

        Self {
            id: &conversation.id,
            model: &conversation.model,
            language: &conversation.language,
            turn_count,
            messages: &conversation.turns,
            total_messages: conversation.message_count(),
            user_messages: conversation.count_role("user"),
            assistant_messages: conversation.count_role("assistant"),
        }
    }
}

/// Compact JSON for one record, terminated by `\n`
pub fn encode_line(conversation: &Conversation, transform: Transform) -> serde_json::Result<Vec<u8>> {
    let mut line = match transform {
        Transform::Raw => serde_json::to_vec(conversation)?,
        Transform::Clean => serde_json::to_vec(&CleanConversation::from(conversation))?,
    };
    line.push(b'\n');
    Ok(line)
}

/// One record as a JSON value, for array-shaped batch files
pub fn encode_value(conversation: &Conversation, transform: Transform) -> serde_json::Result<Value> {
    match transform {
        Transform::Raw => serde_json::to_value(conversation),
        Transform::Clean => serde_json::to_value(CleanConversation::from(conversation)),
    }
}
