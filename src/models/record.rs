//! Records of the primary store as seen by the search layer

use serde_json::{Map, Value};

use crate::error::Result;

/// A record of the primary store.
///
/// `attribute` returns `None` when the record has no such attribute and
/// `Some(Value::Null)` when it has one without a value. `related` returns
/// `None` for a null relation.
pub trait Record: Send + Sync {
    fn record_type(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<Value>;

    fn related(&self, relation: &str) -> Option<Box<dyn Record + '_>>;
}

/// Record backed by a JSON object; nested objects act as relations
#[derive(Clone, Debug, PartialEq)]
pub struct JsonRecord {
    record_type: String,
    fields: Map<String, Value>,
}

impl JsonRecord {
    pub fn new(record_type: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            record_type: record_type.into(),
            fields,
        }
    }

    /// Build from an arbitrary JSON value, which must be an object
    pub fn from_value(record_type: impl Into<String>, value: Value) -> Result<Self> {
        let fields: Map<String, Value> = serde_json::from_value(value)?;
        Ok(Self::new(record_type, fields))
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl Record for JsonRecord {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn related(&self, relation: &str) -> Option<Box<dyn Record + '_>> {
        related_object(&self.fields, relation)
    }
}

/// Borrowed view of a nested JSON object
struct JsonObject<'a> {
    record_type: &'a str,
    fields: &'a Map<String, Value>,
}

impl Record for JsonObject<'_> {
    fn record_type(&self) -> &str {
        self.record_type
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn related(&self, relation: &str) -> Option<Box<dyn Record + '_>> {
        related_object(self.fields, relation)
    }
}

fn related_object<'a>(
    fields: &'a Map<String, Value>,
    relation: &str,
) -> Option<Box<dyn Record + 'a>> {
    let (name, value) = fields.get_key_value(relation)?;
    match value {
        Value::Object(fields) => Some(Box::new(JsonObject {
            record_type: name.as_str(),
            fields,
        })),
        _ => None,
    }
}

/// Render an attribute value the way it is indexed.
///
/// Strings verbatim, numbers in decimal, booleans as `true`/`false`, null
/// as the empty string, arrays and objects as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&json!(null)), "");
        assert_eq!(stringify(&json!("cs101-2024")), "cs101-2024");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&json!(2.5)), "2.5");
        assert_eq!(stringify(&json!(["a", 1])), r#"["a",1]"#);
        assert_eq!(stringify(&json!({"k": "v"})), r#"{"k":"v"}"#);
    }

    #[test]
    fn test_json_record_attributes() {
        let record = JsonRecord::from_value(
            "users",
            json!({ "id": 1, "username": "bob", "bio": null }),
        )
        .unwrap();

        assert_eq!(record.record_type(), "users");
        assert_eq!(record.attribute("username"), Some(json!("bob")));
        assert_eq!(record.attribute("bio"), Some(Value::Null));
        assert_eq!(record.attribute("email"), None);
    }

    #[test]
    fn test_nested_relations() {
        let record = JsonRecord::from_value(
            "posts",
            json!({
                "id": 3,
                "author": { "username": "alice", "team": { "name": "core" } },
                "editor": null
            }),
        )
        .unwrap();

        let author = record.related("author").unwrap();
        assert_eq!(author.attribute("username"), Some(json!("alice")));
        let team = author.related("team").unwrap();
        assert_eq!(team.record_type(), "team");
        assert_eq!(team.attribute("name"), Some(json!("core")));

        assert!(record.related("editor").is_none());
        assert!(record.related("reviewer").is_none());
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(JsonRecord::from_value("users", json!([1, 2])).is_err());
    }
}
