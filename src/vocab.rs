//! Label universe tracking: stable vocabulary indexes and unknown-label reconciliation.
//!
//! The vocabulary is built once from the training corpus and frozen before
//! any classification happens. Label identity downstream is a vocabulary
//! index, not a string, so confusion-matrix accumulation is an indexed array
//! operation instead of dictionary churn.

use crate::corpus::LabeledCorpus;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved sentinel for test-set labels absent from the training vocabulary.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Ordered unique label sequence observed in training, first-seen order.
///
/// `label → index` is stable for the lifetime of a report run. The unknown
/// sentinel, when present, occupies a dedicated slot appended after all
/// trained labels so unknown-truth utterances still participate in per-label
/// counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelVocabulary {
    labels: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    unknown_slot: Option<usize>,
}

impl LabelVocabulary {
    /// Build the vocabulary from a training corpus, labels in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyLabelSet`] when the corpus yields no labels at
    /// all — an empty or corrupted training input.
    pub fn from_corpus(corpus: &LabeledCorpus) -> Result<Self> {
        let mut labels: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (_, utterance_labels) in corpus.iter() {
            for label in utterance_labels {
                if !index.contains_key(label) {
                    index.insert(label.clone(), labels.len());
                    labels.push(label.clone());
                }
            }
        }
        if labels.is_empty() {
            return Err(Error::empty_label_set(
                "training corpus produced no labels",
            ));
        }
        Ok(Self {
            labels,
            index,
            unknown_slot: None,
        })
    }

    /// Append the reserved unknown slot after all trained labels. Idempotent.
    ///
    /// A training corpus may already carry the sentinel string as an ordinary
    /// label; that slot is reused rather than duplicated, since the name is
    /// reserved across the whole pipeline.
    #[must_use]
    pub fn with_unknown(mut self) -> Self {
        if self.unknown_slot.is_none() {
            let slot = match self.index.get(UNKNOWN_LABEL) {
                Some(&existing) => existing,
                None => {
                    let slot = self.labels.len();
                    self.labels.push(UNKNOWN_LABEL.to_string());
                    self.index.insert(UNKNOWN_LABEL.to_string(), slot);
                    slot
                }
            };
            self.unknown_slot = Some(slot);
        }
        self
    }

    /// Stable index of a label, if it is in the vocabulary.
    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Label at a vocabulary index.
    #[must_use]
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Whether the label is in the vocabulary.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Index of the unknown sentinel, if the slot was appended.
    #[must_use]
    pub fn unknown_index(&self) -> Option<usize> {
        self.unknown_slot
    }

    /// Number of vocabulary slots (sentinel included when present).
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the vocabulary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate labels in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Rebuild the index map after deserialization.
    ///
    /// `index` is `#[serde(skip)]`; a vocabulary read back from JSON must be
    /// passed through this before lookups.
    #[must_use]
    pub fn reindexed(mut self) -> Self {
        self.index = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        self
    }
}

/// What unknown-label reconciliation did to the test corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Utterances that had at least one label rewritten to the sentinel.
    pub rewritten_utterances: usize,
    /// Total labels rewritten to the sentinel.
    pub rewritten_labels: usize,
}

/// Rewrite test labels absent from the vocabulary to the unknown sentinel.
///
/// Rewrites deduplicate within an utterance (two unseen labels collapse to
/// one sentinel entry) while preserving the order of surviving labels.
///
/// # Errors
///
/// Returns [`Error::EmptyCorpus`] for an empty test corpus and
/// [`Error::EmptyLabelSet`] when reconciliation leaves no labels at all —
/// both signal a corrupted or empty test file.
pub fn reconcile_unknown_labels(
    test: &mut LabeledCorpus,
    vocabulary: &LabelVocabulary,
) -> Result<ReconcileSummary> {
    if test.is_empty() {
        return Err(Error::empty_corpus("test corpus has no utterances"));
    }

    let mut summary = ReconcileSummary::default();
    let utterances: Vec<String> = test.utterances().map(str::to_string).collect();
    for utterance in &utterances {
        let Some(labels) = test.get(utterance) else {
            continue;
        };
        if labels.iter().all(|l| vocabulary.contains(l)) {
            continue;
        }
        let mut rewritten: Vec<String> = Vec::with_capacity(labels.len());
        let mut rewrites_here = 0usize;
        for label in labels {
            let resolved = if vocabulary.contains(label) {
                label.as_str()
            } else {
                rewrites_here += 1;
                UNKNOWN_LABEL
            };
            if !rewritten.iter().any(|l| l == resolved) {
                rewritten.push(resolved.to_string());
            }
        }
        summary.rewritten_utterances += 1;
        summary.rewritten_labels += rewrites_here;
        test.replace_labels(utterance, rewritten);
    }

    if test.total_labels() == 0 {
        return Err(Error::empty_label_set(
            "test corpus has no labels after unknown reconciliation",
        ));
    }

    if summary.rewritten_labels > 0 {
        log::info!(
            "unknown-label reconciliation rewrote {} labels across {} utterances",
            summary.rewritten_labels,
            summary.rewritten_utterances
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Assignment;

    fn training_corpus() -> LabeledCorpus {
        let mut corpus = LabeledCorpus::new();
        corpus.add_assignment(&Assignment::new("book a flight", "travel"));
        corpus.add_assignment(&Assignment::new("when is my meeting", "schedule"));
        corpus.add_assignment(&Assignment::new("fly me to denver", "travel"));
        corpus
    }

    #[test]
    fn vocabulary_is_first_seen_ordered_and_unique() {
        let vocab = LabelVocabulary::from_corpus(&training_corpus()).unwrap();
        let labels: Vec<&str> = vocab.iter().collect();
        assert_eq!(labels, ["travel", "schedule"]);
        assert_eq!(vocab.index_of("travel"), Some(0));
        assert_eq!(vocab.index_of("schedule"), Some(1));
        assert_eq!(vocab.index_of("UNKNOWN"), None);
    }

    #[test]
    fn empty_corpus_yields_empty_label_set_error() {
        let corpus = LabeledCorpus::new();
        assert!(matches!(
            LabelVocabulary::from_corpus(&corpus),
            Err(Error::EmptyLabelSet(_))
        ));
    }

    #[test]
    fn unknown_slot_is_appended_and_idempotent() {
        let vocab = LabelVocabulary::from_corpus(&training_corpus())
            .unwrap()
            .with_unknown()
            .with_unknown();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.unknown_index(), Some(2));
        assert_eq!(vocab.label(2), Some(UNKNOWN_LABEL));
    }

    #[test]
    fn trained_sentinel_label_reuses_its_slot() {
        // The sentinel string is a reserved name; a corpus that trains it
        // directly must not produce a second UNKNOWN row.
        let mut corpus = LabeledCorpus::new();
        corpus.add_labels("no clue what this is", [UNKNOWN_LABEL]);
        corpus.add_labels("fly me to denver", ["travel"]);

        let vocab = LabelVocabulary::from_corpus(&corpus).unwrap().with_unknown();
        let labels: Vec<&str> = vocab.iter().collect();
        assert_eq!(labels, [UNKNOWN_LABEL, "travel"]);
        assert_eq!(vocab.unknown_index(), Some(0));
        assert_eq!(vocab.index_of(UNKNOWN_LABEL), Some(0));
    }

    #[test]
    fn reconcile_rewrites_unseen_labels_to_sentinel() {
        let vocab = LabelVocabulary::from_corpus(&training_corpus())
            .unwrap()
            .with_unknown();

        let mut test = LabeledCorpus::new();
        test.add_labels("ring the doorbell", ["doorbell"]);
        test.add_labels("fly me to miami", ["travel"]);

        let summary = reconcile_unknown_labels(&mut test, &vocab).unwrap();
        assert_eq!(summary.rewritten_utterances, 1);
        assert_eq!(summary.rewritten_labels, 1);
        assert_eq!(test.get("ring the doorbell").unwrap(), [UNKNOWN_LABEL]);
        assert_eq!(test.get("fly me to miami").unwrap(), ["travel"]);
    }

    #[test]
    fn reconcile_collapses_multiple_unseen_labels() {
        let vocab = LabelVocabulary::from_corpus(&training_corpus())
            .unwrap()
            .with_unknown();

        let mut test = LabeledCorpus::new();
        test.add_labels("do the thing", ["doorbell", "travel", "lights"]);

        let summary = reconcile_unknown_labels(&mut test, &vocab).unwrap();
        assert_eq!(summary.rewritten_labels, 2);
        assert_eq!(test.get("do the thing").unwrap(), [UNKNOWN_LABEL, "travel"]);
    }

    #[test]
    fn reconcile_rejects_empty_test_corpus() {
        let vocab = LabelVocabulary::from_corpus(&training_corpus()).unwrap();
        let mut test = LabeledCorpus::new();
        assert!(matches!(
            reconcile_unknown_labels(&mut test, &vocab),
            Err(Error::EmptyCorpus(_))
        ));
    }

    #[test]
    fn reindexed_restores_lookups() {
        let vocab = LabelVocabulary::from_corpus(&training_corpus())
            .unwrap()
            .with_unknown();
        let json = serde_json::to_string(&vocab).unwrap();
        let restored: LabelVocabulary = serde_json::from_str(&json).unwrap();
        let restored = restored.reindexed();
        assert_eq!(restored.index_of("schedule"), Some(1));
        assert_eq!(restored.unknown_index(), Some(2));
    }
}
