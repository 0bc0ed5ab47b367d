//! Document and value types.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::ObjectId;

/// A value that can be stored in a [`Document`] field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit IEEE 754 floating point
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Byte sequence
    Binary(Vec<u8>),
    /// UTC timestamp with millisecond precision
    DateTime(DateTime<Utc>),
    /// Embedded document
    Document(Document),
    /// Array of values
    Array(Vec<Value>),
    /// Document identifier
    ObjectId(ObjectId),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float. Integers widen losslessly.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as timestamp.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Try to get as embedded document reference.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Try to get as array reference.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to get as object id.
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    /// Get the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Int64(_) => "Int64",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::Binary(_) => "Binary",
            Value::DateTime(_) => "DateTime",
            Value::Document(_) => "Document",
            Value::Array(_) => "Array",
            Value::ObjectId(_) => "ObjectId",
        }
    }
}

// Conversion traits
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

/// An insertion-ordered mapping from field names to [`Value`]s.
///
/// Field names are unique: inserting an existing name replaces its value in
/// place without changing its position. Field order is preserved through
/// encoding, which matters for operator documents where the server may be
/// order-sensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Insert a field, returning the previous value if the name existed.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a string field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Get an integer field.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Get a float field. Integers widen losslessly.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Get a boolean field.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Get an embedded document field.
    pub fn get_document(&self, name: &str) -> Option<&Document> {
        self.get(name).and_then(Value::as_document)
    }

    /// Get an array field.
    pub fn get_array(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_array)
    }

    /// Get an object id field.
    pub fn get_object_id(&self, name: &str) -> Option<ObjectId> {
        self.get(name).and_then(Value::as_object_id)
    }

    /// Remove a field, returning its value if it existed.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// Check whether a field exists.
    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Iterate field names in insertion order.
    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Value> {
        self.fields.keys()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_null() {
        let v = Value::Null;
        assert!(v.is_null());
        assert_eq!(v.type_name(), "Null");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
        assert_eq!(Value::Int64(42).as_i64(), Some(42));
        assert_eq!(Value::Int64(42).as_f64(), Some(42.0));
        assert_eq!(Value::Double(3.5).as_f64(), Some(3.5));
        assert_eq!(Value::Double(3.5).as_i64(), None);
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Binary(vec![1, 2, 3]).as_bytes(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_from_conversions() {
        let _: Value = true.into();
        let _: Value = 42i64.into();
        let _: Value = 42i32.into();
        let _: Value = 3.5f64.into();
        let _: Value = "hello".into();
        let _: Value = String::from("hello").into();
        let _: Value = vec![1u8, 2, 3].into();
        let _: Value = vec![Value::Int64(1)].into();
        let _: Value = Document::new().into();
        let _: Value = ObjectId::new().into();
    }

    #[test]
    fn test_document_insertion_order() {
        let mut doc = Document::new();
        doc.insert("z", 1);
        doc.insert("a", 2);
        doc.insert("m", 3);

        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_document_replace_keeps_position() {
        let mut doc = Document::new();
        doc.insert("a", 1);
        doc.insert("b", 2);

        let previous = doc.insert("a", 10);
        assert_eq!(previous, Some(Value::Int64(1)));

        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(doc.get_i64("a"), Some(10));
    }

    #[test]
    fn test_document_typed_getters() {
        let doc = doc! {
            "name" => "Diogo",
            "age" => 38,
            "active" => true,
            "score" => 9.5,
        };

        assert_eq!(doc.get_str("name"), Some("Diogo"));
        assert_eq!(doc.get_i64("age"), Some(38));
        assert_eq!(doc.get_bool("active"), Some(true));
        assert_eq!(doc.get_f64("score"), Some(9.5));
        assert_eq!(doc.get_str("missing"), None);
        assert_eq!(doc.get_str("age"), None);
    }

    #[test]
    fn test_document_remove() {
        let mut doc = doc! { "a" => 1, "b" => 2 };
        assert_eq!(doc.remove("a"), Some(Value::Int64(1)));
        assert_eq!(doc.remove("a"), None);
        assert_eq!(doc.len(), 1);
        assert!(doc.contains_key("b"));
    }

    #[test]
    fn test_doc_macro_nested() {
        let doc = doc! {
            "filter" => doc! { "tipo" => "Estudante" },
            "tags" => vec![Value::from("a"), Value::from("b")],
        };

        let filter = doc.get_document("filter").unwrap();
        assert_eq!(filter.get_str("tipo"), Some("Estudante"));
        assert_eq!(doc.get_array("tags").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_doc_macro() {
        let doc = doc! {};
        assert!(doc.is_empty());
        assert_eq!(doc.len(), 0);
    }
}
