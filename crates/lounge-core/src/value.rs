//! In-memory field values and their coercion against descriptors.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Number, Value};

use crate::document::Document;
use crate::schema::{AttributeDescriptor, AttributeTree, PrimitiveKind};

/// Field storage of a document or embedded object.
pub type Fields = BTreeMap<String, FieldValue>;

/// A reference field's value: either a live document or just its key.
#[derive(Debug, Clone)]
pub enum Reference {
    /// Placeholder left by lazy or depth-limited population.
    Unloaded(String),
    Loaded(Document),
}

impl Reference {
    pub fn key(&self) -> String {
        match self {
            Reference::Unloaded(key) => key.clone(),
            Reference::Loaded(doc) => doc.key(),
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Reference::Loaded(doc) => Some(doc),
            Reference::Unloaded(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Reference::Loaded(_))
    }
}

/// Current value of one field.
///
/// Equality compares dates by instant and references by key.
#[derive(Debug, Clone, Default)]
pub enum FieldValue {
    #[default]
    Null,
    String(String),
    Number(Number),
    Bool(bool),
    Date(DateTime<Utc>),
    Mixed(Value),
    Embedded(Fields),
    Array(Vec<FieldValue>),
    Ref(Reference),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Short name of the held kind, used in validation messages. Untyped
    /// JSON reports its own kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::String(_) => "String",
            FieldValue::Number(_) => "Number",
            FieldValue::Bool(_) => "Boolean",
            FieldValue::Date(_) => "Date",
            FieldValue::Mixed(value) => match value {
                Value::Null => "null",
                Value::Bool(_) => "Boolean",
                Value::Number(_) => "Number",
                Value::String(_) => "String",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            },
            FieldValue::Embedded(_) => "embedded object",
            FieldValue::Array(_) => "array",
            FieldValue::Ref(_) => "reference",
        }
    }

    /// Zero value for a descriptor: empty array for arrays, an empty
    /// embedded object for shapes, null for everything else.
    pub fn zero(descriptor: &AttributeDescriptor) -> Self {
        match descriptor {
            AttributeDescriptor::Array(_) => FieldValue::Array(Vec::new()),
            AttributeDescriptor::Embedded(tree) => FieldValue::Embedded(zero_fields(tree)),
            AttributeDescriptor::Primitive(_) | AttributeDescriptor::Reference(_) => {
                FieldValue::Null
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            FieldValue::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_embedded(&self) -> Option<&Fields> {
        match self {
            FieldValue::Embedded(fields) => Some(fields),
            _ => None,
        }
    }

    /// Plain JSON form, if the value holds no references.
    pub fn to_plain_json(&self) -> Option<Value> {
        Some(match self {
            FieldValue::Null => Value::Null,
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Number(n) => Value::Number(n.clone()),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Date(d) => Value::String(format_date(d)),
            FieldValue::Mixed(v) => v.clone(),
            FieldValue::Embedded(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| v.to_plain_json().map(|v| (k.clone(), v)))
                    .collect::<Option<_>>()?,
            ),
            FieldValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(FieldValue::to_plain_json)
                    .collect::<Option<_>>()?,
            ),
            FieldValue::Ref(_) => return None,
        })
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Number(a), FieldValue::Number(b)) => a.as_f64() == b.as_f64(),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            (FieldValue::Mixed(a), FieldValue::Mixed(b)) => a == b,
            (FieldValue::Embedded(a), FieldValue::Embedded(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => a == b,
            (FieldValue::Ref(a), FieldValue::Ref(b)) => a.key() == b.key(),
            _ => false,
        }
    }
}

pub(crate) fn zero_fields(tree: &AttributeTree) -> Fields {
    tree.iter()
        .map(|attr| (attr.name.clone(), FieldValue::zero(&attr.descriptor)))
        .collect()
}

/// Canonical stored form of a date: `1990-03-03T03:30:00.000Z`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse date text. RFC-3339 with an offset is exact; a date-time or date
/// without an offset is read as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn date_from_millis(n: &Number) -> Option<DateTime<Utc>> {
    n.as_i64()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Coerce an assigned value towards its field descriptor.
///
/// Values that cannot be coerced are returned unchanged; validation reports
/// them before any save.
pub fn coerce(descriptor: &AttributeDescriptor, value: FieldValue) -> FieldValue {
    use AttributeDescriptor as D;

    match (descriptor, value) {
        (D::Array(_), FieldValue::Null) | (D::Array(_), FieldValue::Mixed(Value::Null)) => {
            FieldValue::Array(Vec::new())
        }
        (_, FieldValue::Mixed(Value::Null)) => FieldValue::Null,
        (_, FieldValue::Null) => FieldValue::Null,

        (D::Primitive(kind), value) => coerce_primitive(*kind, value),

        (D::Embedded(tree), FieldValue::Embedded(fields)) => {
            FieldValue::Embedded(coerce_fields(tree, fields))
        }
        (D::Embedded(tree), FieldValue::Mixed(Value::Object(map))) => FieldValue::Embedded(
            coerce_fields(
                tree,
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::Mixed(v)))
                    .collect(),
            ),
        ),

        (D::Array(element), FieldValue::Array(items)) => FieldValue::Array(
            items
                .into_iter()
                .map(|item| coerce(element, item))
                .collect(),
        ),
        (D::Array(element), FieldValue::Mixed(Value::Array(items))) => FieldValue::Array(
            items
                .into_iter()
                .map(|item| coerce(element, FieldValue::Mixed(item)))
                .collect(),
        ),

        (D::Reference(_), FieldValue::Mixed(Value::Object(map))) => {
            let key = map.get("id").and_then(Value::as_str).map(str::to_string);
            match key {
                Some(key) => FieldValue::Ref(Reference::Unloaded(key)),
                None => FieldValue::Mixed(Value::Object(map)),
            }
        }
        (D::Reference(_), FieldValue::Mixed(Value::String(key)))
        | (D::Reference(_), FieldValue::String(key)) => {
            FieldValue::Ref(Reference::Unloaded(key))
        }

        (_, value) => value,
    }
}

fn coerce_primitive(kind: PrimitiveKind, value: FieldValue) -> FieldValue {
    match (kind, value) {
        (PrimitiveKind::String, FieldValue::Mixed(Value::String(s))) => FieldValue::String(s),
        (PrimitiveKind::Number, FieldValue::Mixed(Value::Number(n))) => FieldValue::Number(n),
        (PrimitiveKind::Boolean, FieldValue::Mixed(Value::Bool(b))) => FieldValue::Bool(b),
        (PrimitiveKind::Date, FieldValue::String(s))
        | (PrimitiveKind::Date, FieldValue::Mixed(Value::String(s))) => match parse_date(&s) {
            Some(date) => FieldValue::Date(date),
            None => FieldValue::String(s),
        },
        (PrimitiveKind::Date, FieldValue::Number(n))
        | (PrimitiveKind::Date, FieldValue::Mixed(Value::Number(n))) => {
            match date_from_millis(&n) {
                Some(date) => FieldValue::Date(date),
                None => FieldValue::Number(n),
            }
        }
        (PrimitiveKind::Mixed, FieldValue::Mixed(v)) => FieldValue::Mixed(v),
        (PrimitiveKind::Mixed, value) => match value.to_plain_json() {
            Some(json) => FieldValue::Mixed(json),
            None => value,
        },
        (_, value) => value,
    }
}

/// Coerce a field map against a tree, dropping names the tree does not know
/// and filling missing names with zero values.
pub(crate) fn coerce_fields(tree: &AttributeTree, mut fields: Fields) -> Fields {
    tree.iter()
        .map(|attr| {
            let value = match fields.remove(&attr.name) {
                Some(value) => coerce(&attr.descriptor, value),
                None => FieldValue::zero(&attr.descriptor),
            };
            (attr.name.clone(), value)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<f64> for FieldValue {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n)
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Null)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::Date(d)
    }
}

impl From<Document> for FieldValue {
    fn from(doc: Document) -> Self {
        FieldValue::Ref(Reference::Loaded(doc))
    }
}

impl From<&Document> for FieldValue {
    fn from(doc: &Document) -> Self {
        FieldValue::Ref(Reference::Loaded(doc.clone()))
    }
}

impl From<Reference> for FieldValue {
    fn from(r: Reference) -> Self {
        FieldValue::Ref(r)
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Mixed(v)
    }
}

impl From<Fields> for FieldValue {
    fn from(fields: Fields) -> Self {
        FieldValue::Embedded(fields)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
