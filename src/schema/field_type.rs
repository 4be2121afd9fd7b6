//! Field kinds of a search schema
//!
//! Decides how a stringified attribute value is indexed and how query terms
//! against the field are interpreted.

use serde::{Deserialize, Serialize};

/// Numeric flavour of a Numeric field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    Int,
    Float,
}

/// Field kind
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    /// Primary key of the record. Indexed as a single verbatim term.
    Identifier,

    /// Full-text field, analyzed with the registry's stemming analyzer
    #[default]
    Text,

    /// Integer or floating point value, matched by value and by range
    Numeric { numeric: NumericKind },

    /// Boolean value, indexed as the term `true` or `false`
    Boolean,

    /// Date/time value, kept as epoch milliseconds
    DateTime {
        #[serde(default = "default_true")]
        sortable: bool,
    },
}

fn default_true() -> bool {
    true
}

impl FieldKind {
    pub fn int() -> Self {
        FieldKind::Numeric {
            numeric: NumericKind::Int,
        }
    }

    pub fn float() -> Self {
        FieldKind::Numeric {
            numeric: NumericKind::Float,
        }
    }

    pub fn datetime() -> Self {
        FieldKind::DateTime { sortable: true }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FieldKind::Text)
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self, FieldKind::Identifier)
    }

    /// Numeric and DateTime fields answer range queries
    pub fn supports_range(&self) -> bool {
        matches!(self, FieldKind::Numeric { .. } | FieldKind::DateTime { .. })
    }

    /// Text fields keep term positions for phrase queries
    pub fn has_positions(&self) -> bool {
        self.is_text()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Identifier => "identifier",
            FieldKind::Text => "text",
            FieldKind::Numeric {
                numeric: NumericKind::Int,
            } => "int",
            FieldKind::Numeric {
                numeric: NumericKind::Float,
            } => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::DateTime { .. } => "datetime",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}
