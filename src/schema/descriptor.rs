//! Record type descriptors
//!
//! A descriptor states what the search layer needs to know about a record
//! type of the primary store: its name, primary key, the attributes it
//! exposes with their value types, the relations it can follow, and which
//! attributes are searchable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Underlying value type of a stored column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Other,
}

/// How an attribute's value is obtained
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum AttributeKind {
    /// Persisted column with a declared value type
    Column { value_type: ValueType },
    /// Derived value; the hint names its type (`date`, `datetime`,
    /// `boolean`, `integer`, `float`)
    Computed {
        #[serde(default)]
        type_hint: Option<String>,
    },
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Schema description of one record type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    /// Record type name; also the index directory name
    pub name: String,

    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Declared searchable fields, dotted paths allowed
    #[serde(default)]
    pub searchable: Vec<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeKind>,

    #[serde(default)]
    pub relations: BTreeMap<String, RecordDescriptor>,
}

impl RecordDescriptor {
    /// Descriptor with an integer `id` primary key
    pub fn new(name: impl Into<String>) -> Self {
        let primary_key = default_primary_key();
        let mut attributes = BTreeMap::new();
        attributes.insert(
            primary_key.clone(),
            AttributeKind::Column {
                value_type: ValueType::Integer,
            },
        );
        Self {
            name: name.into(),
            primary_key,
            searchable: Vec::new(),
            attributes,
            relations: BTreeMap::new(),
        }
    }

    /// Use a different primary key column
    pub fn with_primary_key(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        let old = std::mem::replace(&mut self.primary_key, name.into());
        self.attributes.remove(&old);
        self.attributes
            .insert(self.primary_key.clone(), AttributeKind::Column { value_type });
        self
    }

    pub fn column(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.attributes
            .insert(name.into(), AttributeKind::Column { value_type });
        self
    }

    pub fn computed(mut self, name: impl Into<String>, type_hint: Option<&str>) -> Self {
        self.attributes.insert(
            name.into(),
            AttributeKind::Computed {
                type_hint: type_hint.map(str::to_string),
            },
        );
        self
    }

    pub fn relation(mut self, name: impl Into<String>, related: RecordDescriptor) -> Self {
        self.relations.insert(name.into(), related);
        self
    }

    /// Declare the searchable fields
    pub fn searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeKind> {
        self.attributes.get(name)
    }

    pub fn related(&self, relation: &str) -> Option<&RecordDescriptor> {
        self.relations.get(relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let descriptor = RecordDescriptor::new("user_profiles")
            .column("username", ValueType::String)
            .computed("course_name_and_year", None)
            .searchable(["username", "course_name_and_year"]);

        assert_eq!(descriptor.primary_key, "id");
        assert_eq!(
            descriptor.attribute("id"),
            Some(&AttributeKind::Column {
                value_type: ValueType::Integer
            })
        );
        assert_eq!(descriptor.searchable.len(), 2);
    }

    #[test]
    fn test_with_primary_key_replaces_default() {
        let descriptor =
            RecordDescriptor::new("courses").with_primary_key("code", ValueType::String);
        assert!(descriptor.attribute("id").is_none());
        assert!(descriptor.attribute("code").is_some());
        assert_eq!(descriptor.primary_key, "code");
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{
            "name": "posts",
            "searchable": ["title", "author.username"],
            "attributes": {
                "id": { "source": "column", "value_type": "integer" },
                "title": { "source": "column", "value_type": "text" },
                "score": { "source": "computed", "type_hint": "float" }
            },
            "relations": {
                "author": {
                    "name": "users",
                    "attributes": {
                        "username": { "source": "column", "value_type": "string" }
                    }
                }
            }
        }"#;
        let descriptor: RecordDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(descriptor.primary_key, "id");
        assert_eq!(
            descriptor.attribute("score"),
            Some(&AttributeKind::Computed {
                type_hint: Some("float".to_string())
            })
        );
        assert!(descriptor
            .related("author")
            .and_then(|d| d.attribute("username"))
            .is_some());
    }
}
