//! Search schema of one record type

use super::field_type::FieldKind;
use serde::{Deserialize, Serialize};

/// One field of a search schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    /// Original value kept with the document
    #[serde(default = "default_true")]
    pub stored: bool,
    /// At most one live document per value
    #[serde(default)]
    pub unique: bool,
}

fn default_true() -> bool {
    true
}

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let unique = kind.is_identifier();
        Self {
            name: name.into(),
            kind,
            stored: true,
            unique,
        }
    }
}

/// Ordered field layout of an index.
///
/// The first field is always the Identifier field. A schema is immutable
/// once built and persisted next to the index it describes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSchema {
    pub record_type: String,
    fields: Vec<SchemaField>,
}

impl SearchSchema {
    /// Start a schema with its Identifier field
    pub(crate) fn with_identifier(
        record_type: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            fields: vec![SchemaField::new(identifier, FieldKind::Identifier)],
        }
    }

    /// Append a field; returns false when the name is already taken
    pub(crate) fn push(&mut self, field: SchemaField) -> bool {
        if self.has_field(&field.name) {
            return false;
        }
        self.fields.push(field);
        true
    }

    pub fn identifier_field(&self) -> &SchemaField {
        &self.fields[0]
    }

    pub fn identifier_name(&self) -> &str {
        &self.fields[0].name
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn kind(&self, name: &str) -> Option<&FieldKind> {
        self.field(name).map(|f| &f.kind)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Fields searched when a query names none: everything but the Identifier
    pub fn default_query_fields(&self) -> Vec<String> {
        self.fields[1..].iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SearchSchema {
        let mut schema = SearchSchema::with_identifier("user_profiles", "id");
        schema.push(SchemaField::new("username", FieldKind::Text));
        schema.push(SchemaField::new("joined", FieldKind::datetime()));
        schema
    }

    #[test]
    fn test_identifier_first_and_unique() {
        let schema = schema();
        let id = schema.identifier_field();
        assert_eq!(id.name, "id");
        assert!(id.unique);
        assert!(id.stored);
        assert_eq!(schema.identifier_name(), "id");
    }

    #[test]
    fn test_push_rejects_duplicates() {
        let mut schema = schema();
        assert!(!schema.push(SchemaField::new("username", FieldKind::Boolean)));
        assert_eq!(schema.kind("username"), Some(&FieldKind::Text));
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_default_query_fields() {
        assert_eq!(schema().default_query_fields(), vec!["username", "joined"]);
    }

    #[test]
    fn test_json_round_trip_preserves_equality() {
        let schema = schema();
        let json = serde_json::to_string(&schema).unwrap();
        let back: SearchSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, back);
    }
}
