//! Multi-label confusion matrix: commutative accumulation and derived metrics.
//!
//! One [`LabelCounts`] cell set per vocabulary slot, accumulated by index so
//! the hot path is array arithmetic, not string hashing. Accumulation is
//! commutative and associative: partial matrices built by independent workers
//! merge by component-wise summation into the same result as a single pass
//! over the combined outcome stream.

use crate::outcome::{LabelCell, PredictionOutcome};
use crate::vocab::LabelVocabulary;
use serde::{Deserialize, Serialize};

/// Running TP/FP/FN/TN counts for one label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    /// True positives.
    pub tp: usize,
    /// False positives.
    pub fp: usize,
    /// False negatives.
    #[serde(rename = "fn")]
    pub fn_: usize,
    /// True negatives.
    pub tn: usize,
}

impl LabelCounts {
    /// Record one cell.
    pub fn record(&mut self, cell: LabelCell) {
        match cell {
            LabelCell::TruePositive => self.tp += 1,
            LabelCell::FalsePositive => self.fp += 1,
            LabelCell::FalseNegative => self.fn_ += 1,
            LabelCell::TrueNegative => self.tn += 1,
        }
    }

    /// Component-wise sum with another cell set.
    pub fn merge(&mut self, other: &LabelCounts) {
        self.tp += other.tp;
        self.fp += other.fp;
        self.fn_ += other.fn_;
        self.tn += other.tn;
    }

    /// All four cells summed; equals the evaluated utterance count.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    /// Ground-truth occurrences of the label (TP + FN).
    #[must_use]
    pub fn support(&self) -> usize {
        self.tp + self.fn_
    }
}

/// Per-label confusion matrix over a stream of prediction outcomes.
///
/// # Example
///
/// ```rust
/// use inteval::{ConfusionMatrix, LabeledCorpus, LabelVocabulary, Thresholds};
/// use inteval::{classify, ScoredCandidate};
///
/// let mut corpus = LabeledCorpus::new();
/// corpus.add_labels("fly to denver", ["travel"]);
/// let vocab = LabelVocabulary::from_corpus(&corpus).unwrap();
///
/// let outcome = classify(
///     "fly to denver",
///     &["travel".to_string()],
///     vec![ScoredCandidate::new("travel", 0.9)],
///     &vocab,
///     &Thresholds::default(),
/// ).unwrap();
///
/// let mut matrix = ConfusionMatrix::new(vocab.len());
/// matrix.accumulate(&outcome);
/// assert_eq!(matrix.counts(0).unwrap().tp, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    per_label: Vec<LabelCounts>,
    evaluated: usize,
}

impl ConfusionMatrix {
    /// Create a zeroed matrix with one cell set per vocabulary slot.
    #[must_use]
    pub fn new(n_labels: usize) -> Self {
        Self {
            per_label: vec![LabelCounts::default(); n_labels],
            evaluated: 0,
        }
    }

    /// Fold one outcome's cells into the running totals.
    ///
    /// The outcome must have been classified against the same vocabulary
    /// this matrix was sized for.
    pub fn accumulate(&mut self, outcome: &PredictionOutcome) {
        assert_eq!(
            outcome.cells.len(),
            self.per_label.len(),
            "outcome classified against a different vocabulary"
        );
        for (counts, &cell) in self.per_label.iter_mut().zip(&outcome.cells) {
            counts.record(cell);
        }
        self.evaluated += 1;
    }

    /// Merge a partial matrix built over a disjoint outcome subset.
    pub fn merge(&mut self, other: &ConfusionMatrix) {
        assert_eq!(
            other.per_label.len(),
            self.per_label.len(),
            "matrices sized for different vocabularies"
        );
        for (counts, partial) in self.per_label.iter_mut().zip(&other.per_label) {
            counts.merge(partial);
        }
        self.evaluated += other.evaluated;
    }

    /// Cell counts for one vocabulary slot.
    #[must_use]
    pub fn counts(&self, index: usize) -> Option<&LabelCounts> {
        self.per_label.get(index)
    }

    /// Number of vocabulary slots.
    #[must_use]
    pub fn n_labels(&self) -> usize {
        self.per_label.len()
    }

    /// Number of outcomes folded in.
    #[must_use]
    pub fn evaluated(&self) -> usize {
        self.evaluated
    }

    /// Derive per-label and averaged metrics.
    ///
    /// The vocabulary must be the one the accumulated outcomes were
    /// classified against; it supplies the label text for each row.
    #[must_use]
    pub fn metrics(&self, vocabulary: &LabelVocabulary) -> MatrixMetrics {
        let per_label: Vec<LabelMetrics> = self
            .per_label
            .iter()
            .enumerate()
            .map(|(index, counts)| {
                let label = vocabulary.label(index).unwrap_or_default().to_string();
                LabelMetrics::from_counts(label, index, *counts)
            })
            .collect();
        MatrixMetrics::from_rows(per_label, self.evaluated)
    }
}

/// Derived precision/recall/F1 for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMetrics {
    /// Label text.
    pub label: String,
    /// Vocabulary index.
    pub index: usize,
    /// Raw cell counts.
    pub counts: LabelCounts,
    /// TP / (TP + FP), 0 when the denominator is 0.
    pub precision: f64,
    /// TP / (TP + FN), 0 when the denominator is 0.
    pub recall: f64,
    /// Harmonic mean of precision and recall, 0 when their sum is 0.
    pub f1: f64,
    /// Ground-truth occurrences (TP + FN).
    pub support: usize,
}

impl LabelMetrics {
    fn from_counts(label: String, index: usize, counts: LabelCounts) -> Self {
        let (precision, recall, f1) = derive_prf(counts.tp, counts.fp, counts.fn_);
        Self {
            label,
            index,
            support: counts.support(),
            counts,
            precision,
            recall,
            f1,
        }
    }
}

/// Averaged metrics across labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    /// Averaged precision.
    pub precision: f64,
    /// Averaged recall.
    pub recall: f64,
    /// Averaged F1.
    pub f1: f64,
}

/// Per-label rows plus macro/micro averages for a (sub)set of labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixMetrics {
    /// One row per included label, vocabulary index order.
    pub per_label: Vec<LabelMetrics>,
    /// Unweighted mean of the per-label metrics.
    pub macro_avg: AverageMetrics,
    /// Metrics computed from cell counts summed across included labels.
    pub micro_avg: AverageMetrics,
    /// Outcomes folded into the underlying matrix.
    pub evaluated: usize,
}

impl MatrixMetrics {
    fn from_rows(per_label: Vec<LabelMetrics>, evaluated: usize) -> Self {
        let n = per_label.len();
        let macro_avg = if n == 0 {
            AverageMetrics::default()
        } else {
            AverageMetrics {
                precision: per_label.iter().map(|m| m.precision).sum::<f64>() / n as f64,
                recall: per_label.iter().map(|m| m.recall).sum::<f64>() / n as f64,
                f1: per_label.iter().map(|m| m.f1).sum::<f64>() / n as f64,
            }
        };

        let (tp, fp, fn_) = per_label.iter().fold((0, 0, 0), |(tp, fp, fn_), m| {
            (tp + m.counts.tp, fp + m.counts.fp, fn_ + m.counts.fn_)
        });
        let (precision, recall, f1) = derive_prf(tp, fp, fn_);
        let micro_avg = AverageMetrics {
            precision,
            recall,
            f1,
        };

        Self {
            per_label,
            macro_avg,
            micro_avg,
            evaluated,
        }
    }

    /// Restrict rows to labels whose support exceeds `min_support` and
    /// recompute both averages over the kept rows.
    #[must_use]
    pub fn subset(&self, min_support: usize) -> MatrixMetrics {
        let kept: Vec<LabelMetrics> = self
            .per_label
            .iter()
            .filter(|m| m.support > min_support)
            .cloned()
            .collect();
        MatrixMetrics::from_rows(kept, self.evaluated)
    }
}

fn derive_prf(tp: usize, fp: usize, fn_: usize) -> (f64, f64, f64) {
    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::LabeledCorpus;
    use crate::outcome::{classify, Thresholds};
    use crate::scoring::ScoredCandidate;

    fn vocab() -> LabelVocabulary {
        let mut corpus = LabeledCorpus::new();
        corpus.add_labels("u1", ["travel"]);
        corpus.add_labels("u2", ["schedule"]);
        LabelVocabulary::from_corpus(&corpus).unwrap()
    }

    fn outcome(truth: &str, predicted_label: &str, score: f64) -> PredictionOutcome {
        classify(
            "u",
            &[truth.to_string()],
            vec![ScoredCandidate::new(predicted_label, score)],
            &vocab(),
            &Thresholds::default(),
        )
        .unwrap()
    }

    #[test]
    fn cell_totals_equal_evaluated_count() {
        let v = vocab();
        let mut matrix = ConfusionMatrix::new(v.len());
        matrix.accumulate(&outcome("travel", "travel", 0.9));
        matrix.accumulate(&outcome("travel", "schedule", 0.8));
        matrix.accumulate(&outcome("schedule", "schedule", 0.7));

        for index in 0..v.len() {
            assert_eq!(matrix.counts(index).unwrap().total(), matrix.evaluated());
        }
    }

    #[test]
    fn merge_equals_single_pass() {
        let v = vocab();
        let outcomes = vec![
            outcome("travel", "travel", 0.9),
            outcome("travel", "schedule", 0.8),
            outcome("schedule", "schedule", 0.7),
            outcome("schedule", "travel", 0.6),
        ];

        let mut single = ConfusionMatrix::new(v.len());
        for o in &outcomes {
            single.accumulate(o);
        }

        let mut left = ConfusionMatrix::new(v.len());
        let mut right = ConfusionMatrix::new(v.len());
        left.accumulate(&outcomes[0]);
        left.accumulate(&outcomes[3]);
        right.accumulate(&outcomes[1]);
        right.accumulate(&outcomes[2]);

        let mut merged = ConfusionMatrix::new(v.len());
        merged.merge(&right);
        merged.merge(&left);

        assert_eq!(merged, single);
    }

    #[test]
    fn zero_denominator_metrics_are_zero() {
        let v = vocab();
        let matrix = ConfusionMatrix::new(v.len());
        let metrics = matrix.metrics(&v);
        for row in &metrics.per_label {
            assert_eq!(row.precision, 0.0);
            assert_eq!(row.recall, 0.0);
            assert_eq!(row.f1, 0.0);
        }
        assert_eq!(metrics.macro_avg.f1, 0.0);
        assert_eq!(metrics.micro_avg.f1, 0.0);
    }

    #[test]
    fn perfect_predictions_derive_unit_metrics() {
        let v = vocab();
        let mut matrix = ConfusionMatrix::new(v.len());
        matrix.accumulate(&outcome("travel", "travel", 0.9));
        matrix.accumulate(&outcome("schedule", "schedule", 0.9));
        let metrics = matrix.metrics(&v);
        assert_eq!(metrics.macro_avg.f1, 1.0);
        assert_eq!(metrics.micro_avg.precision, 1.0);
        assert_eq!(metrics.micro_avg.recall, 1.0);
    }

    #[test]
    fn micro_average_uses_summed_counts() {
        let v = vocab();
        let mut matrix = ConfusionMatrix::new(v.len());
        // travel: 1 TP; schedule: 1 FP + 1 FN (one miss each way).
        matrix.accumulate(&outcome("travel", "travel", 0.9));
        matrix.accumulate(&outcome("travel", "schedule", 0.9));
        let metrics = matrix.metrics(&v);

        // Summed: TP=1, FP=1, FN=1 -> micro P = R = 0.5.
        assert!((metrics.micro_avg.precision - 0.5).abs() < 1e-12);
        assert!((metrics.micro_avg.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn subset_filters_by_support() {
        let v = vocab();
        let mut matrix = ConfusionMatrix::new(v.len());
        matrix.accumulate(&outcome("travel", "travel", 0.9));
        matrix.accumulate(&outcome("travel", "travel", 0.9));
        matrix.accumulate(&outcome("schedule", "schedule", 0.9));

        let metrics = matrix.metrics(&v);
        assert_eq!(metrics.per_label.len(), 2);

        let subset = metrics.subset(1);
        assert_eq!(subset.per_label.len(), 1);
        assert_eq!(subset.per_label[0].label, "travel");
        assert_eq!(subset.evaluated, 3);
    }
}
