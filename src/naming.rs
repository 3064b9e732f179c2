//! Member naming: how a model member is spelled on the wire.
//!
//! Naming is a pure function of the member, its registered metadata, and the
//! active [`NamingPolicy`]. The same resolver serves both the query translator
//! and [`to_wire_json`], so a filter on a member always names the exact key
//! the serialized document carries.

use indexmap::IndexMap;
use serde::Deserialize;
use std::{fmt, sync::Arc};

use crate::{
    ast::{Member, TypeTag},
    error::HostError,
    value::Value,
};

/// Maps a member to its wire name when the policy is [`NamingPolicy::Custom`].
pub trait MemberNamer: Send + Sync {
    fn wire_name(&self, member: &Member) -> String;
}

/// Rewrites a literal into the wire representation of a custom-serialized member.
pub trait LiteralConverter: Send + Sync {
    fn convert(&self, value: &serde_json::Value) -> Result<serde_json::Value, HostError>;
}

/// Case convention applied to members without an explicit wire name.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Member names are used as declared
    #[default]
    Default,
    /// Leading capitals are lower-cased (`Price` → `price`, `URLValue` → `urlValue`)
    CamelCase,
    /// Names come from an injected serializer
    #[serde(skip)]
    Custom(Arc<dyn MemberNamer>),
}

impl fmt::Debug for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingPolicy::Default => write!(f, "Default"),
            NamingPolicy::CamelCase => write!(f, "CamelCase"),
            NamingPolicy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Custom serialization attached to a member.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Converter {
    /// Enumeration stored as its variant name instead of its ordinal
    EnumAsString(IndexMap<i64, String>),
    #[serde(skip)]
    Custom(Arc<dyn LiteralConverter>),
}

impl Converter {
    pub fn convert(&self, value: &serde_json::Value) -> Result<serde_json::Value, HostError> {
        match self {
            Converter::EnumAsString(variants) => match value.as_i64() {
                Some(ordinal) => variants
                    .get(&ordinal)
                    .map(|name| serde_json::Value::String(name.clone()))
                    .ok_or_else(|| {
                        HostError::TypeError(format!("No enum variant with ordinal {}", ordinal))
                    }),
                None => Ok(value.clone()),
            },
            Converter::Custom(converter) => converter.convert(value),
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::EnumAsString(variants) => f.debug_tuple("EnumAsString").field(variants).finish(),
            Converter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Registered metadata of one model field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldMeta {
    /// Explicit wire name; overrides the naming policy
    #[serde(default)]
    pub wire_name: Option<String>,
    #[serde(default)]
    pub ty: Option<TypeTag>,
    #[serde(default)]
    pub converter: Option<Converter>,
}

impl FieldMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wire_name(mut self, name: &str) -> Self {
        self.wire_name = Some(name.to_string());
        self
    }

    pub fn typed(mut self, ty: TypeTag) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }
}

/// Registered metadata of one document model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelMeta {
    #[serde(default)]
    pub fields: IndexMap<String, FieldMeta>,
}

impl ModelMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, meta: FieldMeta) -> Self {
        self.fields.insert(name.to_string(), meta);
        self
    }
}

/// Per-field metadata table, keyed by model name then host member name.
///
/// # Examples
///
/// ```
/// use docql::naming::{FieldMeta, ModelMeta, Schema};
///
/// let schema = Schema::new().model(
///     "Row",
///     ModelMeta::new().field("price", FieldMeta::new().wire_name("p")),
/// );
/// assert!(schema.field("Row", "price").is_some());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub models: IndexMap<String, ModelMeta>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, name: &str, meta: ModelMeta) -> Self {
        self.models.insert(name.to_string(), meta);
        self
    }

    pub fn field(&self, model: &str, field: &str) -> Option<&FieldMeta> {
        self.models.get(model)?.fields.get(field)
    }
}

/// Resolves wire names and converters for members.
#[derive(Debug, Clone, Copy)]
pub struct NamingResolver<'a> {
    policy: &'a NamingPolicy,
    schema: &'a Schema,
}

impl<'a> NamingResolver<'a> {
    pub fn new(policy: &'a NamingPolicy, schema: &'a Schema) -> Self {
        NamingResolver { policy, schema }
    }

    fn meta(&self, member: &Member) -> Option<&'a FieldMeta> {
        let model = member.owner.model_name()?;
        self.schema.field(model, &member.name)
    }

    /// Wire name of a member: explicit override first, then the policy.
    pub fn wire_name(&self, member: &Member) -> String {
        if let Some(name) = self.meta(member).and_then(|m| m.wire_name.as_ref()) {
            return name.clone();
        }
        self.apply_policy(member)
    }

    fn apply_policy(&self, member: &Member) -> String {
        match self.policy {
            NamingPolicy::Default => member.name.clone(),
            NamingPolicy::CamelCase => to_camel_case(&member.name),
            NamingPolicy::Custom(namer) => namer.wire_name(member),
        }
    }

    /// Custom literal conversion registered for a member, if any
    pub fn converter(&self, member: &Member) -> Option<&'a Converter> {
        self.meta(member)?.converter.as_ref()
    }
}

/// Lower-cases the leading run of capitals, keeping the last one when it
/// starts the next word.
///
/// ```
/// use docql::naming::to_camel_case;
///
/// assert_eq!(to_camel_case("Price"), "price");
/// assert_eq!(to_camel_case("ID"), "id");
/// assert_eq!(to_camel_case("URLValue"), "urlValue");
/// assert_eq!(to_camel_case("title"), "title");
/// ```
pub fn to_camel_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len());

    for (i, c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            result.extend(chars[i..].iter());
            return result;
        }
        let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
        if i > 0 && next_is_lower {
            result.extend(chars[i..].iter());
            return result;
        }
        result.extend(c.to_lowercase());
    }
    result
}

/// Serializes a host document to its wire JSON using the same naming rules
/// the translator uses for member access.
pub fn to_wire_json(
    value: &Value,
    ty: &TypeTag,
    resolver: &NamingResolver<'_>,
) -> Result<serde_json::Value, HostError> {
    match (value, ty.underlying()) {
        (Value::Object(fields), TypeTag::Model(_)) => {
            let mut out = serde_json::Map::new();
            for (name, field_value) in fields {
                let member = Member::new(ty.underlying().clone(), name);
                let field_ty = resolver
                    .meta(&member)
                    .and_then(|m| m.ty.clone())
                    .unwrap_or(TypeTag::Object);
                let mut json = to_wire_json(field_value, &field_ty, resolver)?;
                if let Some(converter) = resolver.converter(&member) {
                    json = converter.convert(&json)?;
                }
                out.insert(resolver.wire_name(&member), json);
            }
            Ok(serde_json::Value::Object(out))
        }
        (Value::Array(items), TypeTag::Array(elem)) => Ok(serde_json::Value::Array(
            items
                .iter()
                .map(|item| to_wire_json(item, elem, resolver))
                .collect::<Result<_, _>>()?,
        )),
        (other, _) => Ok(other.to_json()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_edges() {
        assert_eq!(to_camel_case(""), "");
        assert_eq!(to_camel_case("A"), "a");
        assert_eq!(to_camel_case("IOStream"), "ioStream");
        assert_eq!(to_camel_case("already_lower"), "already_lower");
    }

    #[test]
    fn test_override_beats_policy() {
        let schema = Schema::new().model(
            "Row",
            ModelMeta::new().field("Price", FieldMeta::new().wire_name("cost")),
        );
        let policy = NamingPolicy::CamelCase;
        let resolver = NamingResolver::new(&policy, &schema);

        let price = Member::new(TypeTag::model("Row"), "Price");
        let title = Member::new(TypeTag::model("Row"), "Title");
        assert_eq!(resolver.wire_name(&price), "cost");
        assert_eq!(resolver.wire_name(&title), "title");
    }

    #[test]
    fn test_enum_as_string_converter() {
        let mut variants = IndexMap::new();
        variants.insert(0, "Draft".to_string());
        variants.insert(1, "Published".to_string());
        let converter = Converter::EnumAsString(variants);

        assert_eq!(
            converter.convert(&serde_json::json!(1)).unwrap(),
            serde_json::json!("Published")
        );
        assert!(converter.convert(&serde_json::json!(7)).is_err());
    }
}
