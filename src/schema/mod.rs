//! Schema system
//!
//! - Record descriptors: what a record type exposes to the search layer
//! - Field kinds (Identifier, Text, Numeric, Boolean, DateTime)
//! - Search schemas and their derivation from descriptors
//! - Parsing of stringified structured values

mod builder;
mod descriptor;
mod field_type;
mod mapping;
pub mod values;

pub use builder::SchemaBuilder;
pub use descriptor::{AttributeKind, RecordDescriptor, ValueType};
pub use field_type::{FieldKind, NumericKind};
pub use mapping::{SchemaField, SearchSchema};
