//! Attribute trees: the compiled, walkable form of a model schema.
//!
//! A schema is an ordered list of `(field name, descriptor)` pairs. The order
//! is the serialization order of the stored document. Trees are immutable
//! once built and shared by every document of the model.
//!
//! Two ways to build one:
//! - [`SchemaBuilder`] in code
//! - [`AttributeTree::from_declaration`] from a JSON shape such as
//!   `{"title": "String", "owner": {"type": "User", "ref": "User"}}`

use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Scalar field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    /// Calendar instant, stored as ISO-8601 text with millisecond precision.
    Date,
    /// Free-form JSON, stored as given.
    Mixed,
}

impl PrimitiveKind {
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "String" | "string" => Some(PrimitiveKind::String),
            "Number" | "number" => Some(PrimitiveKind::Number),
            "Boolean" | "boolean" => Some(PrimitiveKind::Boolean),
            "Date" | "date" => Some(PrimitiveKind::Date),
            "Object" | "Mixed" | "object" | "mixed" => Some(PrimitiveKind::Mixed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::String => "String",
            PrimitiveKind::Number => "Number",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Date => "Date",
            PrimitiveKind::Mixed => "Mixed",
        }
    }
}

/// Type of one field.
///
/// `Reference` holds a model name rather than a nested descriptor, so a
/// reference can never directly wrap another reference.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeDescriptor {
    Primitive(PrimitiveKind),
    Embedded(AttributeTree),
    Array(Box<AttributeDescriptor>),
    Reference(String),
}

impl AttributeDescriptor {
    pub fn string() -> Self {
        AttributeDescriptor::Primitive(PrimitiveKind::String)
    }

    pub fn number() -> Self {
        AttributeDescriptor::Primitive(PrimitiveKind::Number)
    }

    pub fn boolean() -> Self {
        AttributeDescriptor::Primitive(PrimitiveKind::Boolean)
    }

    pub fn date() -> Self {
        AttributeDescriptor::Primitive(PrimitiveKind::Date)
    }

    pub fn mixed() -> Self {
        AttributeDescriptor::Primitive(PrimitiveKind::Mixed)
    }

    pub fn reference(model: impl Into<String>) -> Self {
        AttributeDescriptor::Reference(model.into())
    }

    pub fn array_of(element: AttributeDescriptor) -> Self {
        AttributeDescriptor::Array(Box::new(element))
    }

    /// Element descriptor of an array; `Mixed` for anything else.
    pub(crate) fn element(&self) -> &AttributeDescriptor {
        const MIXED: &AttributeDescriptor = &AttributeDescriptor::Primitive(PrimitiveKind::Mixed);
        match self {
            AttributeDescriptor::Array(element) => element,
            _ => MIXED,
        }
    }

    /// Human-readable type, e.g. `[ref Comment]`.
    pub fn describe(&self) -> String {
        match self {
            AttributeDescriptor::Primitive(kind) => kind.as_str().to_string(),
            AttributeDescriptor::Embedded(_) => "embedded object".to_string(),
            AttributeDescriptor::Array(element) => format!("[{}]", element.describe()),
            AttributeDescriptor::Reference(model) => format!("ref {model}"),
        }
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            AttributeDescriptor::Primitive(_) => {}
            AttributeDescriptor::Embedded(tree) => {
                for attr in tree.iter() {
                    attr.descriptor.collect_references(out);
                }
            }
            AttributeDescriptor::Array(element) => element.collect_references(out),
            AttributeDescriptor::Reference(model) => out.push(model),
        }
    }
}

/// One named field of a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub descriptor: AttributeDescriptor,
}

/// Ordered field-name → descriptor mapping for one model (or embedded shape).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeTree {
    fields: Vec<Attribute>,
}

impl AttributeTree {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Compile a JSON shape declaration.
    ///
    /// Markers:
    /// - `"String" | "Number" | "Boolean" | "Date" | "Object" | "Mixed"`
    /// - `[marker]` for arrays (`[]` is an array of `Mixed`)
    /// - `{"type": "<Model>", "ref": "<Model>"}` for references
    /// - `{"type": "<primitive marker>"}` for a primitive
    /// - any other object is an embedded shape
    pub fn from_declaration(declaration: &Value) -> Result<Self, SchemaError> {
        let shape = declaration
            .as_object()
            .ok_or_else(|| SchemaError::InvalidDeclaration {
                field: String::new(),
                reason: "schema declaration must be an object".to_string(),
            })?;
        Self::from_shape(shape)
    }

    fn from_shape(shape: &Map<String, Value>) -> Result<Self, SchemaError> {
        let mut builder = SchemaBuilder::default();
        for (name, marker) in shape {
            builder = builder.field(name.as_str(), parse_marker(name, marker)?);
        }
        builder.build()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.fields
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|attr| attr.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every model name referenced anywhere in this tree, in field order.
    pub fn referenced_models(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for attr in &self.fields {
            attr.descriptor.collect_references(&mut out);
        }
        out
    }
}

fn parse_marker(field: &str, marker: &Value) -> Result<AttributeDescriptor, SchemaError> {
    match marker {
        Value::String(name) => PrimitiveKind::from_marker(name)
            .map(AttributeDescriptor::Primitive)
            .ok_or_else(|| SchemaError::UnknownTypeMarker {
                field: field.to_string(),
                marker: name.clone(),
            }),
        Value::Array(items) => match items.as_slice() {
            [] => Ok(AttributeDescriptor::array_of(AttributeDescriptor::mixed())),
            [element] => Ok(AttributeDescriptor::array_of(parse_marker(field, element)?)),
            _ => Err(SchemaError::InvalidDeclaration {
                field: field.to_string(),
                reason: "array marker must hold exactly one element type".to_string(),
            }),
        },
        Value::Object(shape) => {
            if let Some(target) = shape.get("ref") {
                let target = target
                    .as_str()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| SchemaError::InvalidDeclaration {
                        field: field.to_string(),
                        reason: "ref must name a model".to_string(),
                    })?;
                return Ok(AttributeDescriptor::reference(target));
            }
            if let Some(Value::String(kind)) = shape.get("type") {
                if shape.len() == 1 {
                    return parse_marker(field, &Value::String(kind.clone()));
                }
            }
            Ok(AttributeDescriptor::Embedded(AttributeTree::from_shape(shape)?))
        }
        other => Err(SchemaError::InvalidDeclaration {
            field: field.to_string(),
            reason: format!("unsupported type marker {other}"),
        }),
    }
}

/// Fluent schema construction. The first error is kept and reported by
/// [`SchemaBuilder::build`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<Attribute>,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, descriptor: AttributeDescriptor) -> Self {
        if self.error.is_some() {
            return self;
        }
        let name = name.into();
        if name.is_empty() {
            self.error = Some(SchemaError::EmptyFieldName);
        } else if self.fields.iter().any(|attr| attr.name == name) {
            self.error = Some(SchemaError::DuplicateField { field: name });
        } else {
            self.fields.push(Attribute { name, descriptor });
        }
        self
    }

    pub fn string(self, name: impl Into<String>) -> Self {
        self.field(name, AttributeDescriptor::string())
    }

    pub fn number(self, name: impl Into<String>) -> Self {
        self.field(name, AttributeDescriptor::number())
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field(name, AttributeDescriptor::boolean())
    }

    pub fn date(self, name: impl Into<String>) -> Self {
        self.field(name, AttributeDescriptor::date())
    }

    pub fn mixed(self, name: impl Into<String>) -> Self {
        self.field(name, AttributeDescriptor::mixed())
    }

    pub fn embedded(self, name: impl Into<String>, tree: AttributeTree) -> Self {
        self.field(name, AttributeDescriptor::Embedded(tree))
    }

    pub fn array(self, name: impl Into<String>, element: AttributeDescriptor) -> Self {
        self.field(name, AttributeDescriptor::array_of(element))
    }

    pub fn reference(self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.field(name, AttributeDescriptor::reference(model))
    }

    pub fn reference_array(self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.array(name, AttributeDescriptor::reference(model))
    }

    pub fn build(self) -> Result<AttributeTree, SchemaError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(AttributeTree {
                fields: self.fields,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declaration_preserves_field_order() {
        let tree = AttributeTree::from_declaration(&json!({
            "title": "String",
            "content": "String",
            "date": "Date",
            "owner": {"type": "User", "ref": "User"}
        }))
        .unwrap();

        let names: Vec<&str> = tree.field_names().collect();
        assert_eq!(names, vec!["title", "content", "date", "owner"]);
        assert_eq!(tree.get("owner"), Some(&AttributeDescriptor::reference("User")));
    }

    #[test]
    fn declaration_compiles_arrays_and_embedded_shapes() {
        let tree = AttributeTree::from_declaration(&json!({
            "favourites": ["String"],
            "comments": [{"type": "Comment", "ref": "Comment"}],
            "address": {"street": "String", "zip": {"type": "Number"}},
            "tags": []
        }))
        .unwrap();

        assert_eq!(
            tree.get("favourites"),
            Some(&AttributeDescriptor::array_of(AttributeDescriptor::string()))
        );
        assert_eq!(
            tree.get("comments"),
            Some(&AttributeDescriptor::array_of(AttributeDescriptor::reference("Comment")))
        );
        let Some(AttributeDescriptor::Embedded(address)) = tree.get("address") else {
            panic!("address should be embedded");
        };
        assert_eq!(address.get("zip"), Some(&AttributeDescriptor::number()));
        assert_eq!(
            tree.get("tags"),
            Some(&AttributeDescriptor::array_of(AttributeDescriptor::mixed()))
        );
        assert_eq!(tree.referenced_models(), vec!["Comment"]);
    }

    #[test]
    fn unknown_marker_is_rejected() {
        let err = AttributeTree::from_declaration(&json!({"age": "Integer"})).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownTypeMarker {
                field: "age".to_string(),
                marker: "Integer".to_string()
            }
        );
    }

    #[test]
    fn builder_rejects_duplicates() {
        let err = AttributeTree::builder()
            .string("email")
            .number("age")
            .string("email")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                field: "email".to_string()
            }
        );
    }

    #[test]
    fn multi_element_array_marker_is_rejected() {
        let err =
            AttributeTree::from_declaration(&json!({"pair": ["String", "Number"]})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDeclaration { .. }));
    }
}
