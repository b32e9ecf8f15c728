//! Report assembly: projecting a finished run into ordered row-sets.
//!
//! Rendering (HTML, text tables) is somebody else's job. This module owns the
//! shape of the data handed to that sink: field names and row ordering are
//! the contract, markup is not. Everything serializes with serde so a sink
//! can also just take the JSON.

use crate::corpus::LabeledCorpus;
use crate::matrix::MatrixMetrics;
use crate::outcome::{PredictionOutcome, Thresholds};
use crate::vocab::LabelVocabulary;
use serde::{Deserialize, Serialize};

/// One vocabulary listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyRow {
    /// Stable vocabulary index.
    pub index: usize,
    /// Label text.
    pub label: String,
}

/// Per-label corpus statistics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelStatRow {
    /// Label text.
    pub label: String,
    /// Vocabulary index.
    pub index: usize,
    /// Utterances carrying this label.
    pub utterances: usize,
    /// Share of all utterances carrying this label.
    pub ratio: f64,
}

/// Labels-per-utterance histogram row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtteranceStatRow {
    /// Number of labels per utterance (the bucket).
    pub label_count: usize,
    /// Utterances in the bucket.
    pub utterances: usize,
}

/// One utterance with its full label set (multi-label and duplicate rows).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtteranceLabelsRow {
    /// Utterance text.
    pub utterance: String,
    /// Associated labels.
    pub labels: Vec<String>,
}

/// Raw per-utterance score dump row: every vocabulary label's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    /// Utterance text.
    pub utterance: String,
    /// Ground-truth labels.
    pub truth: Vec<String>,
    /// Predicted labels.
    pub predicted: Vec<String>,
    /// Scores in vocabulary index order; 0.0 for labels the adapter did not
    /// score.
    pub scores: Vec<f64>,
}

/// One categorized outcome row (ambiguous / misclassified / low-confidence /
/// unknown subsets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRow {
    /// Utterance text.
    pub utterance: String,
    /// Ground-truth labels.
    pub truth: Vec<String>,
    /// Predicted labels.
    pub predicted: Vec<String>,
    /// Top candidate score.
    pub top_score: f64,
    /// Margin between the top two scores, when a second candidate exists.
    pub margin: Option<f64>,
}

/// Run metadata attached to every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// RFC3339 timestamp of report assembly.
    pub generated_at: String,
    /// Engine version that produced the report.
    pub engine_version: String,
    /// Thresholds the run was evaluated under.
    pub thresholds: Thresholds,
    /// Non-fatal problems collected during the run, submission order.
    pub warnings: Vec<String>,
}

/// The assembled diagnostic report.
///
/// Row-sets are ordered: vocabulary and label statistics by vocabulary index,
/// utterance-keyed rows by test-corpus first-seen order, duplicates sorted by
/// utterance. A rendering sink can consume the rows directly or serialize the
/// whole report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    /// Run metadata.
    pub meta: ReportMeta,
    /// Vocabulary listing.
    pub vocabulary: Vec<VocabularyRow>,
    /// Per-label corpus statistics.
    pub label_stats: Vec<LabelStatRow>,
    /// Labels-per-utterance histogram.
    pub utterance_stats: Vec<UtteranceStatRow>,
    /// Test utterances holding more than one ground-truth label.
    pub multi_label: Vec<UtteranceLabelsRow>,
    /// Duplicate/conflict registry rows.
    pub duplicates: Vec<UtteranceLabelsRow>,
    /// Raw score dump, one row per evaluated utterance.
    pub scores: Vec<ScoreRow>,
    /// Outcomes with a close top-two margin.
    pub ambiguous: Vec<OutcomeRow>,
    /// Outcomes with any false positive or false negative.
    pub misclassified: Vec<OutcomeRow>,
    /// Outcomes whose top score fell below the confidence floor.
    pub low_confidence: Vec<OutcomeRow>,
    /// Unknown-truth outcomes under the unknown threshold.
    pub unknown: Vec<OutcomeRow>,
    /// Full confusion-matrix metrics, every vocabulary label.
    pub matrix: MatrixMetrics,
    /// Support-cutoff subset of the matrix metrics.
    pub matrix_subset: MatrixMetrics,
}

impl EvalReport {
    /// Project a finished run into the report row-sets.
    ///
    /// `test` must be the reconciled test corpus the outcomes were evaluated
    /// against; `outcomes` must be in submission order (the evaluator
    /// restores it after parallel scoring).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        vocabulary: &LabelVocabulary,
        test: &LabeledCorpus,
        outcomes: &[PredictionOutcome],
        matrix: MatrixMetrics,
        matrix_subset: MatrixMetrics,
        thresholds: Thresholds,
        warnings: Vec<String>,
    ) -> Self {
        let vocabulary_rows: Vec<VocabularyRow> = vocabulary
            .iter()
            .enumerate()
            .map(|(index, label)| VocabularyRow {
                index,
                label: label.to_string(),
            })
            .collect();

        let total_utterances = test.len();
        let label_stats: Vec<LabelStatRow> = {
            let mut rows: Vec<LabelStatRow> = test
                .label_utterance_counts()
                .into_iter()
                .filter_map(|(label, count)| {
                    vocabulary.index_of(&label).map(|index| LabelStatRow {
                        ratio: count as f64 / total_utterances as f64,
                        label,
                        index,
                        utterances: count,
                    })
                })
                .collect();
            rows.sort_by_key(|r| r.index);
            rows
        };

        let utterance_stats: Vec<UtteranceStatRow> = test
            .label_histogram()
            .into_iter()
            .map(|(label_count, utterances)| UtteranceStatRow {
                label_count,
                utterances,
            })
            .collect();

        let multi_label: Vec<UtteranceLabelsRow> = test
            .multi_label_utterances()
            .into_iter()
            .map(|(utterance, labels)| UtteranceLabelsRow {
                utterance: utterance.to_string(),
                labels: labels.to_vec(),
            })
            .collect();

        let duplicates: Vec<UtteranceLabelsRow> = test
            .duplicates()
            .iter()
            .map(|(utterance, labels)| UtteranceLabelsRow {
                utterance: utterance.to_string(),
                labels: labels.iter().cloned().collect(),
            })
            .collect();

        let scores: Vec<ScoreRow> = outcomes
            .iter()
            .map(|o| score_row(o, vocabulary))
            .collect();

        let subset_rows = |predicate: fn(&PredictionOutcome) -> bool| -> Vec<OutcomeRow> {
            outcomes
                .iter()
                .filter(|o| predicate(o))
                .map(|o| outcome_row(o, vocabulary))
                .collect()
        };

        Self {
            meta: ReportMeta {
                generated_at: chrono::Utc::now().to_rfc3339(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                thresholds,
                warnings,
            },
            vocabulary: vocabulary_rows,
            label_stats,
            utterance_stats,
            multi_label,
            duplicates,
            scores,
            ambiguous: subset_rows(|o| o.ambiguous),
            misclassified: subset_rows(|o| o.misclassified),
            low_confidence: subset_rows(|o| o.low_confidence),
            unknown: subset_rows(|o| o.unknown),
            matrix,
            matrix_subset,
        }
    }

    /// Serialize the whole report as pretty JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Short human-readable summary for logs and smoke checks.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "evaluated {} utterances over {} labels: \
             micro F1 {:.4}, macro F1 {:.4}; \
             {} ambiguous, {} misclassified, {} low-confidence, {} unknown, {} warnings",
            self.matrix.evaluated,
            self.vocabulary.len(),
            self.matrix.micro_avg.f1,
            self.matrix.macro_avg.f1,
            self.ambiguous.len(),
            self.misclassified.len(),
            self.low_confidence.len(),
            self.unknown.len(),
            self.meta.warnings.len(),
        )
    }
}

fn labels_for(indexes: &[usize], vocabulary: &LabelVocabulary) -> Vec<String> {
    indexes
        .iter()
        .filter_map(|&i| vocabulary.label(i).map(str::to_string))
        .collect()
}

fn score_row(outcome: &PredictionOutcome, vocabulary: &LabelVocabulary) -> ScoreRow {
    let mut scores = vec![0.0; vocabulary.len()];
    for candidate in &outcome.candidates {
        if let Some(index) = vocabulary.index_of(&candidate.label) {
            scores[index] = candidate.score.get();
        }
    }
    ScoreRow {
        utterance: outcome.utterance.clone(),
        truth: labels_for(&outcome.truth, vocabulary),
        predicted: labels_for(&outcome.predicted, vocabulary),
        scores,
    }
}

fn outcome_row(outcome: &PredictionOutcome, vocabulary: &LabelVocabulary) -> OutcomeRow {
    OutcomeRow {
        utterance: outcome.utterance.clone(),
        truth: labels_for(&outcome.truth, vocabulary),
        predicted: labels_for(&outcome.predicted, vocabulary),
        top_score: outcome.top_score(),
        margin: outcome.margin(),
    }
}
