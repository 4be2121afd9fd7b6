//! Projection of store records into index documents

use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::models::{stringify, Document, Record};
use crate::schema::SearchSchema;

/// The record's identifier as indexed: its primary key value, stringified.
///
/// A missing or null primary key is an error.
pub fn identifier(record: &dyn Record, schema: &SearchSchema) -> Result<String> {
    match record.attribute(schema.identifier_name()) {
        Some(Value::Null) | None => {
            Err(SyncError::MissingIdentifier(record.record_type().to_string()).into())
        }
        Some(value) => {
            let id = stringify(&value);
            if id.is_empty() {
                return Err(SyncError::MissingIdentifier(record.record_type().to_string()).into());
            }
            Ok(id)
        }
    }
}

/// Build the document for a record: one stringified value per schema field,
/// in schema order, relation paths followed through related records.
///
/// A null relation along a path yields an empty value; an attribute the
/// record does not have is an error.
pub fn project(record: &dyn Record, schema: &SearchSchema) -> Result<Document> {
    let mut document = Document::new();
    document.insert(schema.identifier_name(), identifier(record, schema)?);

    for field in schema.fields().iter().skip(1) {
        let value = resolve_path(record, &field.name)?;
        document.insert(field.name.clone(), value);
    }
    Ok(document)
}

fn resolve_path(record: &dyn Record, path: &str) -> Result<String> {
    match path.split_once('.') {
        Some((relation, rest)) => match record.related(relation) {
            Some(related) => resolve_path(related.as_ref(), rest),
            None => Ok(String::new()),
        },
        None => match record.attribute(path) {
            Some(value) => Ok(stringify(&value)),
            None => Err(SyncError::MissingAttribute {
                record_type: record.record_type().to_string(),
                attribute: path.to_string(),
            }
            .into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchSyncError;
    use crate::models::JsonRecord;
    use crate::schema::{RecordDescriptor, SchemaBuilder, ValueType};
    use serde_json::json;

    fn schema() -> SearchSchema {
        let course = RecordDescriptor::new("courses")
            .column("name", ValueType::String)
            .column("year", ValueType::Integer);
        let user = RecordDescriptor::new("users").column("username", ValueType::String);
        let descriptor = RecordDescriptor::new("user_profiles")
            .column("bio", ValueType::Text)
            .column("active", ValueType::Boolean)
            .relation("user", user)
            .relation("course", course)
            .searchable(["user.username", "bio", "course.name", "active"]);
        SchemaBuilder::new(&descriptor).build().unwrap()
    }

    fn record(value: serde_json::Value) -> JsonRecord {
        JsonRecord::from_value("user_profiles", value).unwrap()
    }

    #[test]
    fn test_project_follows_relations() {
        let profile = record(json!({
            "id": 7,
            "bio": "likes haskell",
            "active": true,
            "user": { "id": 1, "username": "alice" },
            "course": { "id": 3, "name": "CS101", "year": 2024 }
        }));

        let doc = project(&profile, &schema()).unwrap();
        assert_eq!(doc.get("id"), Some("7"));
        assert_eq!(doc.get("user.username"), Some("alice"));
        assert_eq!(doc.get("course.name"), Some("CS101"));
        assert_eq!(doc.get("active"), Some("true"));
        assert_eq!(doc.len(), 5);
    }

    #[test]
    fn test_null_relation_and_null_attribute_are_empty() {
        let profile = record(json!({
            "id": 8,
            "bio": null,
            "active": false,
            "user": null
        }));

        let doc = project(&profile, &schema()).unwrap();
        assert_eq!(doc.get("user.username"), Some(""));
        assert_eq!(doc.get("course.name"), Some(""));
        assert_eq!(doc.get("bio"), Some(""));
    }

    #[test]
    fn test_missing_attribute_is_an_error() {
        let profile = record(json!({ "id": 9, "active": true }));
        let err = project(&profile, &schema()).unwrap_err();
        assert!(matches!(
            err,
            SearchSyncError::Sync(SyncError::MissingAttribute { ref attribute, .. }) if attribute == "bio"
        ));
    }

    #[test]
    fn test_missing_identifier() {
        for value in [json!({ "bio": "x" }), json!({ "id": null }), json!({ "id": "" })] {
            let err = identifier(&record(value), &schema()).unwrap_err();
            assert!(matches!(
                err,
                SearchSyncError::Sync(SyncError::MissingIdentifier(_))
            ));
        }
    }

    #[test]
    fn test_string_identifier_verbatim() {
        let profile = record(json!({ "id": "cs101-2024" }));
        assert_eq!(identifier(&profile, &schema()).unwrap(), "cs101-2024");
    }
}
