use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type attached to every expression node.
///
/// The translator only needs a coarse view of host types: whether a value is
/// a string (for `+` concatenation), nullable (for `.Value`/`.HasValue`), a
/// registered document model (for naming lookups), or a query root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    /// Unknown or dynamic type
    Object,
    Boolean,
    Int32,
    Int64,
    UInt64,
    Double,
    Decimal,
    Char,
    String,
    Guid,
    DateTime,

    /// Host enumeration, identified by name
    Enum(String),

    /// Nullable wrapper around a value type
    Nullable(Box<TypeTag>),

    /// In-memory sequence of elements
    Array(Box<TypeTag>),

    /// Registered document model (see [`Schema`](crate::naming::Schema))
    Model(String),

    /// Compiler-generated record type
    Anonymous,

    /// Spatial type
    Geometry,

    /// Query root / composable query over documents of the element type
    DocumentQuery(Box<TypeTag>),

    Lambda,
    Void,
}

impl TypeTag {
    pub fn nullable(inner: TypeTag) -> Self {
        TypeTag::Nullable(Box::new(inner))
    }

    pub fn array(element: TypeTag) -> Self {
        TypeTag::Array(Box::new(element))
    }

    pub fn query(element: TypeTag) -> Self {
        TypeTag::DocumentQuery(Box::new(element))
    }

    pub fn model(name: &str) -> Self {
        TypeTag::Model(name.to_string())
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeTag::Nullable(_))
    }

    /// The wrapped type for nullables, the type itself otherwise
    pub fn underlying(&self) -> &TypeTag {
        match self {
            TypeTag::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self.underlying(), TypeTag::String)
    }

    pub fn is_document_query(&self) -> bool {
        matches!(self, TypeTag::DocumentQuery(_))
    }

    /// Element type of sequences and query roots
    pub fn element_type(&self) -> Option<&TypeTag> {
        match self {
            TypeTag::Array(elem) | TypeTag::DocumentQuery(elem) => Some(elem),
            _ => None,
        }
    }

    /// Name of the registered model, looking through nullables and sequences
    pub fn model_name(&self) -> Option<&str> {
        match self {
            TypeTag::Model(name) => Some(name),
            TypeTag::Nullable(inner) => inner.model_name(),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Object => write!(f, "object"),
            TypeTag::Boolean => write!(f, "bool"),
            TypeTag::Int32 => write!(f, "int"),
            TypeTag::Int64 => write!(f, "long"),
            TypeTag::UInt64 => write!(f, "ulong"),
            TypeTag::Double => write!(f, "double"),
            TypeTag::Decimal => write!(f, "decimal"),
            TypeTag::Char => write!(f, "char"),
            TypeTag::String => write!(f, "string"),
            TypeTag::Guid => write!(f, "Guid"),
            TypeTag::DateTime => write!(f, "DateTime"),
            TypeTag::Enum(name) | TypeTag::Model(name) => write!(f, "{}", name),
            TypeTag::Nullable(inner) => write!(f, "{}?", inner),
            TypeTag::Array(elem) => write!(f, "{}[]", elem),
            TypeTag::Anonymous => write!(f, "<anonymous>"),
            TypeTag::Geometry => write!(f, "Geometry"),
            TypeTag::DocumentQuery(elem) => write!(f, "IQueryable<{}>", elem),
            TypeTag::Lambda => write!(f, "<lambda>"),
            TypeTag::Void => write!(f, "void"),
        }
    }
}
