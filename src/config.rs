//! Translation options.
//!
//! Options are plain data and can be loaded from JSON:
//!
//! ```json
//! {
//!   "naming": "camel_case",
//!   "schema": { "models": { "Row": { "fields": { "Price": { "wire_name": "cost" } } } } },
//!   "parameters": [ { "name": "@minPrice", "value": { "type": "integer", "value": 100 } } ],
//!   "pretty": false
//! }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    ast::Expr,
    naming::{NamingPolicy, NamingResolver, Schema},
    value::Value,
};

/// An externally bound query parameter.
///
/// Constants equal to `value` are emitted as a reference to `name` instead of
/// an inline literal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationOptions {
    #[serde(default)]
    pub naming: NamingPolicy,
    #[serde(default)]
    pub schema: Schema,
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
    /// Render one clause per line
    #[serde(default)]
    pub pretty: bool,
}

impl TranslationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn naming(mut self, policy: NamingPolicy) -> Self {
        self.naming = policy;
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Binds `value` to the query parameter `name` (with or without the leading `@`).
    pub fn parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.push(QueryParameter {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn resolver(&self) -> NamingResolver<'_> {
        NamingResolver::new(&self.naming, &self.schema)
    }
}

/// A complete translation job, as read by the command line tool.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationRequest {
    pub expression: Expr,
    #[serde(default)]
    pub options: TranslationOptions,
    /// Static member values made available to constant folding, by `Type.Member`
    #[serde(default)]
    pub statics: IndexMap<String, Value>,
}
