//! Search schema derivation from record descriptors

use super::descriptor::{AttributeKind, RecordDescriptor, ValueType};
use super::field_type::FieldKind;
use super::mapping::{SchemaField, SearchSchema};
use crate::error::{Result, SchemaError};

/// Derives the [`SearchSchema`] of a record type
pub struct SchemaBuilder<'a> {
    descriptor: &'a RecordDescriptor,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(descriptor: &'a RecordDescriptor) -> Self {
        Self { descriptor }
    }

    /// Build the schema.
    ///
    /// The Identifier field comes first and carries the primary key's name.
    /// Declared fields follow in declaration order, duplicates collapsed.
    pub fn build(&self) -> Result<SearchSchema> {
        let descriptor = self.descriptor;
        if descriptor.attribute(&descriptor.primary_key).is_none() {
            return Err(SchemaError::MissingPrimaryKey(
                descriptor.name.clone(),
                descriptor.primary_key.clone(),
            )
            .into());
        }

        let mut schema = SearchSchema::with_identifier(&descriptor.name, &descriptor.primary_key);
        for path in &descriptor.searchable {
            let kind = resolve_kind(descriptor, path)?;
            if path == &descriptor.primary_key {
                continue;
            }
            if !schema.push(SchemaField::new(path.as_str(), kind)) {
                tracing::debug!(record_type = %descriptor.name, field = %path, "duplicate searchable field ignored");
            }
        }

        tracing::debug!(
            record_type = %descriptor.name,
            fields = schema.len(),
            "search schema built"
        );
        Ok(schema)
    }
}

/// Resolve a possibly dotted field path to the kind of its terminal attribute
fn resolve_kind(descriptor: &RecordDescriptor, path: &str) -> Result<FieldKind> {
    match path.split_once('.') {
        Some((relation, rest)) => {
            let related =
                descriptor
                    .related(relation)
                    .ok_or_else(|| SchemaError::UnknownRelation {
                        record_type: descriptor.name.clone(),
                        relation: relation.to_string(),
                    })?;
            resolve_kind(related, rest)
        }
        None => {
            let attribute =
                descriptor
                    .attribute(path)
                    .ok_or_else(|| SchemaError::UnknownAttribute {
                        record_type: descriptor.name.clone(),
                        field: path.to_string(),
                    })?;
            Ok(kind_of(attribute))
        }
    }
}

fn kind_of(attribute: &AttributeKind) -> FieldKind {
    match attribute {
        AttributeKind::Column { value_type } => match value_type {
            ValueType::Date | ValueType::DateTime => FieldKind::datetime(),
            ValueType::Integer => FieldKind::int(),
            ValueType::Float => FieldKind::float(),
            ValueType::Boolean => FieldKind::Boolean,
            ValueType::String | ValueType::Text | ValueType::Other => FieldKind::Text,
        },
        AttributeKind::Computed { type_hint } => {
            match type_hint.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("date") | Some("datetime") => FieldKind::datetime(),
                Some("integer") => FieldKind::int(),
                Some("float") => FieldKind::float(),
                Some("boolean") => FieldKind::Boolean,
                _ => FieldKind::Text,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchSyncError;

    fn users() -> RecordDescriptor {
        RecordDescriptor::new("users")
            .column("username", ValueType::String)
            .column("joined", ValueType::DateTime)
            .column("karma", ValueType::Integer)
            .column("rating", ValueType::Float)
            .column("active", ValueType::Boolean)
            .computed("course_name_and_year", None)
            .computed("birthday", Some("Date"))
            .computed("verified", Some("boolean"))
            .computed("nickname", Some("json"))
    }

    #[test]
    fn test_identifier_is_primary_key() {
        let schema = SchemaBuilder::new(&users()).build().unwrap();
        let id = schema.identifier_field();
        assert_eq!(id.name, "id");
        assert_eq!(id.kind, FieldKind::Identifier);
        assert!(id.unique && id.stored);
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_value_type_mapping() {
        let descriptor = users().searchable([
            "username",
            "joined",
            "karma",
            "rating",
            "active",
            "course_name_and_year",
            "birthday",
            "verified",
            "nickname",
        ]);
        let schema = SchemaBuilder::new(&descriptor).build().unwrap();

        assert_eq!(schema.kind("username"), Some(&FieldKind::Text));
        assert_eq!(schema.kind("joined"), Some(&FieldKind::datetime()));
        assert_eq!(schema.kind("karma"), Some(&FieldKind::int()));
        assert_eq!(schema.kind("rating"), Some(&FieldKind::float()));
        assert_eq!(schema.kind("active"), Some(&FieldKind::Boolean));
        assert_eq!(schema.kind("course_name_and_year"), Some(&FieldKind::Text));
        assert_eq!(schema.kind("birthday"), Some(&FieldKind::datetime()));
        assert_eq!(schema.kind("verified"), Some(&FieldKind::Boolean));
        assert_eq!(schema.kind("nickname"), Some(&FieldKind::Text));
        assert!(schema.fields().iter().all(|f| f.stored));
    }

    #[test]
    fn test_declaration_order_and_duplicates() {
        let descriptor = users().searchable(["karma", "username", "karma"]);
        let schema = SchemaBuilder::new(&descriptor).build().unwrap();
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, vec!["id", "karma", "username"]);
    }

    #[test]
    fn test_searchable_primary_key_collapses() {
        let descriptor = users().searchable(["id", "username"]);
        let schema = SchemaBuilder::new(&descriptor).build().unwrap();
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, vec!["id", "username"]);
        assert_eq!(schema.kind("id"), Some(&FieldKind::Identifier));
    }

    #[test]
    fn test_relation_paths() {
        let courses = RecordDescriptor::new("courses")
            .column("title", ValueType::Text)
            .column("starts", ValueType::Date);
        let profile = RecordDescriptor::new("profiles")
            .relation("user", users().relation("course", courses))
            .searchable(["user.username", "user.course.starts"]);
        let schema = SchemaBuilder::new(&profile).build().unwrap();

        assert_eq!(schema.kind("user.username"), Some(&FieldKind::Text));
        assert_eq!(schema.kind("user.course.starts"), Some(&FieldKind::datetime()));
    }

    #[test]
    fn test_unknown_attribute_and_relation() {
        let err = SchemaBuilder::new(&users().searchable(["email"]))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SearchSyncError::Schema(SchemaError::UnknownAttribute { ref field, .. }) if field == "email"
        ));

        let err = SchemaBuilder::new(&users().searchable(["team.name"]))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SearchSyncError::Schema(SchemaError::UnknownRelation { ref relation, .. }) if relation == "team"
        ));
    }

    #[test]
    fn test_custom_primary_key() {
        let descriptor = RecordDescriptor::new("courses")
            .with_primary_key("code", ValueType::String)
            .column("title", ValueType::Text)
            .searchable(["title"]);
        let schema = SchemaBuilder::new(&descriptor).build().unwrap();
        assert_eq!(schema.identifier_name(), "code");
    }

    #[test]
    fn test_missing_primary_key() {
        let mut descriptor = users();
        descriptor.attributes.remove("id");
        let err = SchemaBuilder::new(&descriptor).build().unwrap_err();
        assert!(err.is_fatal());
    }
}
