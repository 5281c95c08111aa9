//! Validation run before any document of a save reaches the store.
//!
//! Two layers: structural conformance of every field value to its
//! descriptor, then the model's own [`Validator`]s in registration order.

use crate::document::Document;
use crate::error::ValidationError;
use crate::schema::{AttributeDescriptor, AttributeTree, PrimitiveKind};
use crate::value::{FieldValue, Fields, Reference};

/// Custom per-model rule.
pub trait Validator: Send + Sync {
    fn validate(&self, document: &Document) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(&Document) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, document: &Document) -> Result<(), ValidationError> {
        self(document)
    }
}

/// Check one document (not its references).
pub fn validate(document: &Document) -> Result<(), ValidationError> {
    let model = document.model();
    let fields = document.fields();
    check_fields(model.name(), "", model.tree(), &fields)?;
    for validator in model.validators() {
        validator.validate(document)?;
    }
    Ok(())
}

pub(crate) fn check_fields(
    model: &str,
    prefix: &str,
    tree: &AttributeTree,
    fields: &Fields,
) -> Result<(), ValidationError> {
    for attr in tree.iter() {
        if let Some(value) = fields.get(&attr.name) {
            let path = if prefix.is_empty() {
                attr.name.clone()
            } else {
                format!("{prefix}.{}", attr.name)
            };
            check_value(model, &path, &attr.descriptor, value)?;
        }
    }
    Ok(())
}

fn check_value(
    model: &str,
    path: &str,
    descriptor: &AttributeDescriptor,
    value: &FieldValue,
) -> Result<(), ValidationError> {
    use AttributeDescriptor as D;

    let conforms = match (descriptor, value) {
        (_, FieldValue::Null) => true,
        (D::Primitive(kind), value) => matches!(
            (kind, value),
            (PrimitiveKind::String, FieldValue::String(_))
                | (PrimitiveKind::Number, FieldValue::Number(_))
                | (PrimitiveKind::Boolean, FieldValue::Bool(_))
                | (PrimitiveKind::Date, FieldValue::Date(_))
                | (PrimitiveKind::Mixed, FieldValue::Mixed(_))
        ),
        (D::Embedded(tree), FieldValue::Embedded(fields)) => {
            return check_fields(model, path, tree, fields);
        }
        (D::Array(element), FieldValue::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_value(model, &format!("{path}[{i}]"), element, item)?;
            }
            return Ok(());
        }
        (D::Reference(_), FieldValue::Ref(Reference::Unloaded(_))) => true,
        (D::Reference(target), FieldValue::Ref(Reference::Loaded(doc))) => {
            if doc.model().name() != target {
                return Err(ValidationError::TypeMismatch {
                    model: model.to_string(),
                    field: path.to_string(),
                    expected: descriptor.describe(),
                    found: format!("ref {}", doc.model().name()),
                });
            }
            true
        }
        _ => false,
    };

    if conforms {
        Ok(())
    } else {
        Err(ValidationError::TypeMismatch {
            model: model.to_string(),
            field: path.to_string(),
            expected: descriptor.describe(),
            found: value.kind().to_string(),
        })
    }
}
