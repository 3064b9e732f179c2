use serde::{Deserialize, Serialize};

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    /// Name including the leading `@`
    pub name: String,
    pub value: serde_json::Value,
}

/// Query text plus its parameter bindings, the unit handed to the execution layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlQuerySpec {
    pub query_text: String,
    #[serde(default)]
    pub parameters: Vec<SqlParameter>,
}

impl SqlQuerySpec {
    pub fn new(query_text: impl Into<String>) -> Self {
        SqlQuerySpec {
            query_text: query_text.into(),
            parameters: Vec::new(),
        }
    }
}
