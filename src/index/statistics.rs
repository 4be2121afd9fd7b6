//! BM25 scoring parameters and formula

use serde::{Deserialize, Serialize};

/// BM25+ parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f32,
    /// Length normalization
    pub b: f32,
    /// Lower bound added to every matching term
    pub delta: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            delta: 1.0,
        }
    }
}

impl Bm25Params {
    /// Robertson-Sparck-Jones IDF, always positive
    pub fn idf(&self, doc_frequency: u64, total_docs: u64) -> f32 {
        let n = total_docs as f32;
        let df = doc_frequency as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Score of one term occurrence set in one field of one document
    pub fn score(
        &self,
        term_frequency: u32,
        doc_frequency: u64,
        total_docs: u64,
        field_length: u32,
        avg_field_length: f32,
    ) -> f32 {
        if total_docs == 0 || term_frequency == 0 {
            return 0.0;
        }
        let tf = term_frequency as f32;
        let avgdl = avg_field_length.max(1.0);
        let norm = 1.0 - self.b + self.b * (field_length as f32 / avgdl);
        let tf_component = (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm);
        self.idf(doc_frequency, total_docs) * (tf_component + self.delta)
    }
}
