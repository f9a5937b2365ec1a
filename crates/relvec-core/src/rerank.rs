//! Result fusion for hybrid search.
//!
//! Merges the ranked output of a vector-similarity search and a full-text
//! search into one list. Two scored strategies are supported:
//!
//! - **Reciprocal Rank Fusion (RRF)**: each item at 1-based rank `r`
//!   contributes `1 / (rank_constant + r)`; contributions are summed across
//!   both lists, so items the two retrievers agree on rise to the top.
//! - **Weighted rank fusion**: each item's rank is mapped through
//!   [`arctan_normalize`] (smaller rank, higher score) and scaled by the
//!   per-list weight before summing.
//!
//! Raw retrieval scores are deliberately ignored: a distance and a
//! relevance score are not comparable, so rank position is the only signal
//! either strategy consumes. Ordering is deterministic: ties keep the order
//! in which items were first seen (first list, then second).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Default RRF rank constant, the common choice from the RRF literature.
pub const DEFAULT_RANK_CONSTANT: u32 = 60;

/// Fusion strategy for [`rerank`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rerank_type")]
pub enum RerankOption {
    /// Reciprocal Rank Fusion with the given rank constant.
    #[serde(rename = "RRF")]
    Rrf {
        /// Constant added to the 1-based rank; larger values flatten the
        /// score gap between adjacent ranks.
        #[serde(default = "default_rank_constant")]
        rank_constant: u32,
    },

    /// Weighted normalized-score fusion. `weights[0]` scales the first
    /// (vector) list, `weights[1]` the second (full-text) list.
    WeightedRank {
        /// Exactly two weights, one per source list.
        weights: Vec<f64>,
    },

    /// No scoring: deduplicated union of both lists in first-seen order.
    Union,
}

fn default_rank_constant() -> u32 {
    DEFAULT_RANK_CONSTANT
}

impl Default for RerankOption {
    /// RRF with rank constant 60.
    fn default() -> Self {
        Self::Rrf {
            rank_constant: DEFAULT_RANK_CONSTANT,
        }
    }
}

/// A fused result: item plus its accumulated fusion score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedItem {
    /// Accumulated fusion score (higher is better; 0 for the union fallback).
    pub score: f64,

    /// The fused item, typically a document text or identifier.
    pub document: String,
}

/// Map any real number into the open interval (0, 1).
///
/// `normalize(x) = (1/π)·atan(x) + 0.5`. Monotonically increasing, with
/// `normalize(0) = 0.5`. Used to turn a negated rank into a similarity-like
/// score for weighted fusion.
pub fn arctan_normalize(score: f64) -> f64 {
    std::f64::consts::FRAC_1_PI * score.atan() + 0.5
}

/// Fuse two ranked lists according to `option`, returning at most `k` items.
///
/// Items appearing in both lists accumulate contributions from both, which
/// is what rewards cross-retriever agreement. Ties are broken by first-seen
/// order, so repeated runs over identical input produce identical output.
pub fn rerank(
    vector_hits: &[String],
    full_text_hits: &[String],
    k: usize,
    option: &RerankOption,
) -> Result<Vec<RerankedItem>> {
    match option {
        RerankOption::Rrf { rank_constant } => {
            Ok(rrf_rerank(vector_hits, full_text_hits, k, *rank_constant))
        }
        RerankOption::WeightedRank { weights } => {
            if weights.len() != 2 {
                return Err(Error::config(format!(
                    "WeightedRank requires exactly 2 weights (one per source list), got {}",
                    weights.len()
                )));
            }
            Ok(weighted_rank(
                vector_hits,
                full_text_hits,
                k,
                [weights[0], weights[1]],
            ))
        }
        RerankOption::Union => Ok(union_fallback(vector_hits, full_text_hits, k)),
    }
}

/// Reciprocal Rank Fusion over two ranked lists.
///
/// Each item at 1-based rank `r` contributes `1 / (rank_constant + r)`;
/// contributions are summed per unique item across both lists.
pub fn rrf_rerank(
    vector_hits: &[String],
    full_text_hits: &[String],
    k: usize,
    rank_constant: u32,
) -> Vec<RerankedItem> {
    fuse(vector_hits, full_text_hits, k, |rank, _list| {
        1.0 / (rank_constant as f64 + rank as f64)
    })
}

/// Weighted normalized-score fusion over two ranked lists.
///
/// The 1-based rank is used as a pseudo-distance: `arctan_normalize(-rank)`
/// maps rank 1 to the highest normalized score, scaled by the list's weight.
pub fn weighted_rank(
    vector_hits: &[String],
    full_text_hits: &[String],
    k: usize,
    weights: [f64; 2],
) -> Vec<RerankedItem> {
    fuse(vector_hits, full_text_hits, k, |rank, list| {
        arctan_normalize(-(rank as f64)) * weights[list]
    })
}

/// Shared accumulate-sort-truncate skeleton for the scored strategies.
///
/// `contribution(rank, list)` receives the 1-based rank and the source list
/// index (0 = vector, 1 = full-text). Accumulation is plain addition.
fn fuse(
    vector_hits: &[String],
    full_text_hits: &[String],
    k: usize,
    contribution: impl Fn(usize, usize) -> f64,
) -> Vec<RerankedItem> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();

    for (list, hits) in [vector_hits, full_text_hits].into_iter().enumerate() {
        for (index, document) in hits.iter().enumerate() {
            let score = contribution(index + 1, list);
            match scores.get_mut(document.as_str()) {
                Some(total) => *total += score,
                None => {
                    scores.insert(document.as_str(), score);
                    first_seen.push(document.as_str());
                }
            }
        }
    }

    // Stable sort: equal scores keep first-seen order.
    let mut fused: Vec<RerankedItem> = first_seen
        .into_iter()
        .map(|document| RerankedItem {
            score: scores.get(document).copied().unwrap_or(0.0),
            document: document.to_string(),
        })
        .collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(k);
    fused
}

/// Unscored fallback: deduplicated union in first-seen order, capped at `k`.
fn union_fallback(
    vector_hits: &[String],
    full_text_hits: &[String],
    k: usize,
) -> Vec<RerankedItem> {
    let mut seen: Vec<&str> = Vec::new();
    for document in vector_hits.iter().chain(full_text_hits) {
        if !seen.contains(&document.as_str()) {
            seen.push(document.as_str());
        }
    }
    seen.truncate(k);
    seen.into_iter()
        .map(|document| RerankedItem {
            score: 0.0,
            document: document.to_string(),
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
