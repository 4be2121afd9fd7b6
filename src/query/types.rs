//! Core types for the query system

use serde::{Deserialize, Serialize};

/// How the clauses of a query are combined
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every non-empty clause must match
    #[default]
    And,
    /// At least one clause must match
    Or,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::And => "and",
            Combinator::Or => "or",
        }
    }
}

/// Numeric interval on a Numeric or DateTime field.
///
/// DateTime bounds are epoch milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub include_lower: bool,
    pub include_upper: bool,
}

impl Default for RangeBounds {
    fn default() -> Self {
        Self {
            lower: None,
            upper: None,
            include_lower: true,
            include_upper: true,
        }
    }
}

impl RangeBounds {
    /// Single value
    pub fn exact(value: f64) -> Self {
        Self {
            lower: Some(value),
            upper: Some(value),
            ..Default::default()
        }
    }

    /// `[start, end)`
    pub fn half_open(start: f64, end: f64) -> Self {
        Self {
            lower: Some(start),
            upper: Some(end),
            include_lower: true,
            include_upper: false,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = match self.lower {
            Some(lower) if self.include_lower => value >= lower,
            Some(lower) => value > lower,
            None => true,
        };
        let below = match self.upper {
            Some(upper) if self.include_upper => value <= upper,
            Some(upper) => value < upper,
            None => true,
        };
        above && below
    }

    /// True when no value can satisfy the bounds
    pub fn is_empty(&self) -> bool {
        match (self.lower, self.upper) {
            (Some(lower), Some(upper)) => {
                lower > upper || (lower == upper && !(self.include_lower && self.include_upper))
            }
            _ => false,
        }
    }
}

/// Statistics from query execution
#[derive(Clone, Debug, Default)]
pub struct QueryStats {
    /// Live documents matched
    pub docs_matched: u64,
    pub execution_time_us: u64,
}
