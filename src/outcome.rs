//! Per-utterance outcome classification under the four threshold policies.
//!
//! [`classify`] compares one utterance's ground truth against its scored
//! candidates and produces an immutable [`PredictionOutcome`]: per-label
//! TP/FP/FN/TN cells plus four independent boolean facets (ambiguous,
//! low-confidence, multi-label, unknown). An utterance can satisfy several
//! facets at once, so they are plain fields on one record, not a hierarchy.
//!
//! Classification is pure and side-effect free; distinct utterances can be
//! classified concurrently against the same frozen vocabulary.

use crate::error::{Error, Result};
use crate::scoring::{sort_candidates, Score, ScoredCandidate};
use crate::vocab::LabelVocabulary;
use serde::{Deserialize, Serialize};

/// The four threshold policies driving outcome categorization.
///
/// All values live in [0, 1]; [`Thresholds::validate`] rejects anything else.
///
/// | Field | Default | Meaning |
/// |-------|---------|---------|
/// | `ambiguous_closeness` | 0.2 | top1 − top2 margin below which a prediction is ambiguous |
/// | `low_confidence_score` | 0.5 | top1 score below which a prediction is low-confidence |
/// | `multi_label_prediction` | 1.0 | score a candidate must *exceed* to join the predicted set (1.0 disables multi-label prediction) |
/// | `unknown_label_prediction` | 0.3 | top1 score below which an unknown-truth utterance counts as correctly unknown |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Margin between the top two scores below which a prediction is ambiguous.
    pub ambiguous_closeness: f64,
    /// Top score below which a prediction is low-confidence.
    pub low_confidence_score: f64,
    /// Score a candidate must exceed to enter the predicted label set.
    pub multi_label_prediction: f64,
    /// Top score below which an unknown-truth utterance is flagged unknown.
    pub unknown_label_prediction: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ambiguous_closeness: 0.2,
            low_confidence_score: 0.5,
            multi_label_prediction: 1.0,
            unknown_label_prediction: 0.3,
        }
    }
}

impl Thresholds {
    /// Reject thresholds outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ambiguous_closeness", self.ambiguous_closeness),
            ("low_confidence_score", self.low_confidence_score),
            ("multi_label_prediction", self.multi_label_prediction),
            ("unknown_label_prediction", self.unknown_label_prediction),
        ] {
            if Score::new(value).is_none() {
                return Err(Error::config(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Which confusion-matrix cell a label landed in for one utterance.
///
/// Exactly one cell per (utterance, label) pair; the aggregator relies on
/// this to keep per-label cell totals equal to the utterance count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelCell {
    /// Label in ground truth and predicted.
    TruePositive,
    /// Label predicted but not in ground truth.
    FalsePositive,
    /// Label in ground truth but not predicted.
    FalseNegative,
    /// Label in neither set.
    TrueNegative,
}

/// Immutable per-utterance evaluation record.
///
/// Created once at classification time and never mutated. Labels are carried
/// as vocabulary indexes; the raw candidate list is kept for score-dump rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutcome {
    /// The utterance text.
    pub utterance: String,
    /// Ground-truth label indexes, vocabulary order of first appearance.
    pub truth: Vec<usize>,
    /// Predicted label indexes.
    pub predicted: Vec<usize>,
    /// Full candidate list, descending by score.
    pub candidates: Vec<ScoredCandidate>,
    /// One cell per vocabulary slot.
    pub cells: Vec<LabelCell>,
    /// Top two scores were closer than the ambiguity margin.
    pub ambiguous: bool,
    /// Top score fell below the confidence floor.
    pub low_confidence: bool,
    /// More than one label cleared the multi-label threshold.
    pub multi_label: bool,
    /// Unknown-truth utterance whose top score stayed under the unknown threshold.
    pub unknown: bool,
    /// Any label landed in FP or FN for this utterance.
    pub misclassified: bool,
}

impl PredictionOutcome {
    /// Top candidate score.
    #[must_use]
    pub fn top_score(&self) -> f64 {
        self.candidates.first().map_or(0.0, |c| c.score.get())
    }

    /// Margin between the top two scores, if a second candidate exists.
    #[must_use]
    pub fn margin(&self) -> Option<f64> {
        match (self.candidates.first(), self.candidates.get(1)) {
            (Some(a), Some(b)) => Some(a.score.get() - b.score.get()),
            _ => None,
        }
    }
}

/// Classify one utterance's prediction against its ground truth.
///
/// `truth_labels` must already be reconciled against `vocabulary` (unknown
/// labels rewritten to the sentinel); a label outside the vocabulary here is
/// an evaluation bug, not a data condition.
///
/// # Errors
///
/// - [`Error::Scoring`] for an empty candidate list or a candidate label the
///   vocabulary does not know — both are malformed adapter responses, handled
///   per-utterance by the caller.
/// - [`Error::Evaluation`] for an unreconciled ground-truth label.
pub fn classify(
    utterance: &str,
    truth_labels: &[String],
    mut candidates: Vec<ScoredCandidate>,
    vocabulary: &LabelVocabulary,
    thresholds: &Thresholds,
) -> Result<PredictionOutcome> {
    if candidates.is_empty() {
        return Err(Error::scoring(format!(
            "no candidates returned for utterance: {utterance}"
        )));
    }
    sort_candidates(&mut candidates);

    let mut truth: Vec<usize> = Vec::with_capacity(truth_labels.len());
    for label in truth_labels {
        let index = vocabulary.index_of(label).ok_or_else(|| {
            Error::evaluation(format!("ground-truth label not reconciled: {label}"))
        })?;
        if !truth.contains(&index) {
            truth.push(index);
        }
    }

    let mut candidate_indexes: Vec<usize> = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let index = vocabulary.index_of(&candidate.label).ok_or_else(|| {
            Error::scoring(format!(
                "candidate label not in vocabulary: {}",
                candidate.label
            ))
        })?;
        candidate_indexes.push(index);
    }

    let top1 = candidates[0].score.get();
    let top2 = candidates.get(1).map(|c| c.score.get());

    let ambiguous = top2.is_some_and(|t2| top1 - t2 < thresholds.ambiguous_closeness);
    let low_confidence = top1 < thresholds.low_confidence_score;

    let mut predicted: Vec<usize> = Vec::new();
    for (candidate, &index) in candidates.iter().zip(&candidate_indexes) {
        if candidate.score.get() > thresholds.multi_label_prediction && !predicted.contains(&index)
        {
            predicted.push(index);
        }
    }
    if predicted.is_empty() {
        // Baseline single-label prediction: fall back to the top candidate.
        predicted.push(candidate_indexes[0]);
    }
    let multi_label = predicted.len() > 1;

    let unknown = vocabulary
        .unknown_index()
        .is_some_and(|u| truth.contains(&u))
        && top1 < thresholds.unknown_label_prediction;

    let mut cells: Vec<LabelCell> = Vec::with_capacity(vocabulary.len());
    let mut misclassified = false;
    for index in 0..vocabulary.len() {
        let in_truth = truth.contains(&index);
        let in_predicted = predicted.contains(&index);
        let cell = match (in_truth, in_predicted) {
            (true, true) => LabelCell::TruePositive,
            (false, true) => LabelCell::FalsePositive,
            (true, false) => LabelCell::FalseNegative,
            (false, false) => LabelCell::TrueNegative,
        };
        if matches!(cell, LabelCell::FalsePositive | LabelCell::FalseNegative) {
            misclassified = true;
        }
        cells.push(cell);
    }

    Ok(PredictionOutcome {
        utterance: utterance.to_string(),
        truth,
        predicted,
        candidates,
        cells,
        ambiguous,
        low_confidence,
        multi_label,
        unknown,
        misclassified,
    })
}
