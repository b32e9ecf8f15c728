//! Scoring adapter boundary: the external classifier seen as a ranked-list function.
//!
//! The engine never touches model weights or embeddings. Everything it knows
//! about the classifier comes through the [`Scorer`] trait: one utterance in,
//! a descending ranked list of [`ScoredCandidate`]s out. A fixed model
//! snapshot is expected to be deterministic for a given utterance.
//!
//! # Design Philosophy: Parse, Don't Validate
//!
//! Scores are parsed once at the boundary into the [`Score`] witness type,
//! which guarantees membership in `[0, 1]`. Downstream threshold comparisons
//! rely on that invariant without re-checking.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A classifier score bounded to [0.0, 1.0].
///
/// This is a "witness type": its existence proves the value is valid, so
/// threshold arithmetic never has to guard against NaN or out-of-range input.
///
/// # Construction
///
/// - [`Score::new`]: returns `None` if out of range (strict parsing)
/// - [`Score::saturating`]: clamps to [0, 1] (lenient, never fails)
///
/// # Example
///
/// ```rust
/// use inteval::Score;
///
/// assert!(Score::new(0.85).is_some());
/// assert!(Score::new(1.5).is_none());
/// assert_eq!(Score::saturating(1.5).get(), 1.0);
/// ```
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    /// The minimum valid score.
    pub const MIN: Self = Self(0.0);

    /// The maximum valid score.
    pub const MAX: Self = Self(1.0);

    /// Create a score, returning `None` if out of range or NaN.
    #[must_use]
    #[inline]
    pub fn new(value: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&value) && !value.is_nan() {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create a score, clamping to [0.0, 1.0]. NaN is treated as 0.0.
    #[must_use]
    #[inline]
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Get the inner value (guaranteed to be in [0.0, 1.0]).
    #[must_use]
    #[inline]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Score({:.4})", self.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// One (label, score) candidate produced by the scoring adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// Predicted label.
    pub label: String,
    /// Classifier score for the label.
    pub score: Score,
}

impl ScoredCandidate {
    /// Create a candidate, clamping the score to [0.0, 1.0].
    #[must_use]
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score: Score::saturating(score),
        }
    }
}

/// Sort candidates descending by score, preserving adapter order on ties.
///
/// Adapters promise descending order, but the engine re-sorts defensively
/// rather than trusting the contract blindly. `Score` excludes NaN, so the
/// comparison is total in practice.
pub fn sort_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// The external classifier, reduced to a ranked-list function.
///
/// Implementations wrap whatever inference stack actually scores utterances.
/// The returned list must contain every label the classifier can emit for the
/// utterance, descending by score. `Send + Sync` so evaluation can fan out
/// across worker threads; the trait is deliberately open so callers can plug
/// in their own inference backend.
pub trait Scorer: Send + Sync {
    /// Score one utterance, returning candidates descending by score.
    fn score(&self, utterance: &str) -> Result<Vec<ScoredCandidate>>;

    /// Adapter name for diagnostics and log lines.
    fn name(&self) -> &'static str {
        "scorer"
    }
}

/// A mock scoring adapter for testing.
///
/// Holds a fixed candidate table keyed by utterance, with optional failure
/// injection, so tests can exercise the evaluation pipeline without a model.
///
/// # Example
///
/// ```rust
/// use inteval::{MockScorer, Scorer, ScoredCandidate};
///
/// let scorer = MockScorer::new("test-mock")
///     .with_candidates("book a flight", vec![
///         ScoredCandidate::new("travel", 0.91),
///         ScoredCandidate::new("schedule", 0.88),
///     ]);
///
/// let candidates = scorer.score("book a flight").unwrap();
/// assert_eq!(candidates[0].label, "travel");
/// ```
#[derive(Clone, Default)]
pub struct MockScorer {
    name: &'static str,
    table: HashMap<String, Vec<ScoredCandidate>>,
    failures: Vec<String>,
}

impl MockScorer {
    /// Create a new mock scorer.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            table: HashMap::new(),
            failures: Vec::new(),
        }
    }

    /// Set the candidates returned for an utterance.
    #[must_use]
    pub fn with_candidates(
        mut self,
        utterance: impl Into<String>,
        candidates: Vec<ScoredCandidate>,
    ) -> Self {
        self.table.insert(utterance.into(), candidates);
        self
    }

    /// Make scoring fail for an utterance.
    #[must_use]
    pub fn failing_on(mut self, utterance: impl Into<String>) -> Self {
        self.failures.push(utterance.into());
        self
    }
}

impl Scorer for MockScorer {
    fn score(&self, utterance: &str) -> Result<Vec<ScoredCandidate>> {
        if self.failures.iter().any(|u| u == utterance) {
            return Err(Error::scoring(format!(
                "injected failure for utterance: {utterance}"
            )));
        }
        Ok(self.table.get(utterance).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
