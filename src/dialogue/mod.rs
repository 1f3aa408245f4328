pub(crate) mod sanitize;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One speaker turn of a dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(deserialize_with = "deserialize_role")]
    pub role: String,
    pub text: String,
}

#[cfg(test)]
impl Turn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    #[error("invalid dialogue JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("object has no `dialogue` key")]
    MissingDialogueKey,

    #[error("expected a list of turns or an object with a `dialogue` key, found {0}")]
    UnexpectedShape(&'static str),
}

/// Parses a dialogue file, which is either a bare list of turns or an
/// object holding the list under `dialogue`.
pub fn parse(bytes: &[u8]) -> Result<Vec<Turn>, DialogueError> {
    let turns = match serde_json::from_slice::<Value>(bytes)? {
        turns @ Value::Array(_) => turns,
        Value::Object(mut object) => object
            .remove("dialogue")
            .ok_or(DialogueError::MissingDialogueKey)?,
        other => return Err(DialogueError::UnexpectedShape(kind_of(&other))),
    };

    Ok(serde_json::from_value(turns)?)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// Speaker ids are sometimes written as bare integers.
fn deserialize_role<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Role {
        Name(String),
        Index(i64),
    }

    Ok(match Role::deserialize(deserializer)? {
        Role::Name(name) => name,
        Role::Index(index) => index.to_string(),
    })
}
