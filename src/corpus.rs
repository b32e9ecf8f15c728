//! Corpus normalization: utterance → label-set mapping with conflict tracking.
//!
//! Parsers (out of scope here) reduce every supported input format to a
//! stream of [`Assignment`]s. This module folds that stream into a
//! [`LabeledCorpus`]: one entry per utterance, labels unique and in
//! first-seen order, with conflicting re-assignments routed to a
//! [`DuplicateRegistry`] instead of being silently dropped or silently
//! duplicated.
//!
//! Merging several sources goes through an explicit [`NormalizeContext`]
//! rather than process-wide state, so two concurrent normalization runs can
//! never observe each other's ingest history.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// One (utterance, label) pair from a corpus source.
///
/// The hierarchical override carries the file-name-derived label some source
/// formats supply; when present it replaces the plain label entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// The utterance text (trimmed, non-empty per the source contract).
    pub utterance: String,
    /// The plain label from the source.
    pub label: String,
    /// Optional hierarchical label that overrides `label` when present.
    pub hierarchical_override: Option<String>,
}

impl Assignment {
    /// Create an assignment with no hierarchical override.
    #[must_use]
    pub fn new(utterance: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            label: label.into(),
            hierarchical_override: None,
        }
    }

    /// Set the hierarchical override label.
    #[must_use]
    pub fn with_override(mut self, hierarchical: impl Into<String>) -> Self {
        self.hierarchical_override = Some(hierarchical.into());
        self
    }

    /// The label this assignment actually carries: the override if non-empty,
    /// else the plain label.
    #[must_use]
    pub fn resolved_label(&self) -> &str {
        match &self.hierarchical_override {
            Some(h) if !h.is_empty() => h,
            _ => &self.label,
        }
    }
}

/// Registry of labels that conflicted with an already-recorded assignment.
///
/// Keys and label sets iterate in sorted order so report rows are
/// deterministic regardless of ingest order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRegistry {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl DuplicateRegistry {
    /// Record one conflicting label for an utterance.
    pub fn record(&mut self, utterance: &str, label: &str) {
        self.entries
            .entry(utterance.to_string())
            .or_default()
            .insert(label.to_string());
    }

    /// Labels recorded as conflicting for an utterance.
    #[must_use]
    pub fn get(&self, utterance: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(utterance)
    }

    /// Number of utterances with at least one conflict.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any conflict was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate (utterance, conflicting labels) in sorted utterance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(u, s)| (u.as_str(), s))
    }
}

/// Explicit ingest context threaded through multi-source normalization.
///
/// Tracks source ids that were already folded in, so shared sub-resources
/// (a file imported by two .lu sources, say) are ingested once per run, not
/// once per process. Two contexts never share state, which keeps the engine
/// reentrant.
#[derive(Debug, Default)]
pub struct NormalizeContext {
    ingested: HashSet<String>,
}

impl NormalizeContext {
    /// Create a fresh context with no ingest history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a source as ingested. Returns `false` if it was already seen.
    pub fn mark_ingested(&mut self, source_id: &str) -> bool {
        self.ingested.insert(source_id.to_string())
    }

    /// Whether a source was already ingested through this context.
    #[must_use]
    pub fn was_ingested(&self, source_id: &str) -> bool {
        self.ingested.contains(source_id)
    }
}

/// Normalized corpus: utterance → ordered unique label list.
///
/// Utterances and labels both keep first-seen order, so downstream vocabulary
/// construction and report rows are stable for a given ingest sequence.
///
/// # Duplicate policy
///
/// Re-assigning an utterance a label it already holds is a no-op. Assigning
/// it a *different* label does not extend the active set; the conflict is
/// recorded in the [`DuplicateRegistry`] together with the labels the
/// utterance already holds. Multi-label entries enter through
/// [`LabeledCorpus::add_labels`], which records a full label set in one call.
///
/// # Example
///
/// ```rust
/// use inteval::{Assignment, LabeledCorpus};
///
/// let mut corpus = LabeledCorpus::new();
/// corpus.add_assignment(&Assignment::new("book a flight", "travel"));
/// corpus.add_assignment(&Assignment::new("book a flight", "travel")); // no-op
/// corpus.add_assignment(&Assignment::new("book a flight", "schedule")); // conflict
///
/// assert_eq!(corpus.get("book a flight").unwrap(), ["travel"]);
/// assert_eq!(corpus.duplicates().len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabeledCorpus {
    labels: HashMap<String, Vec<String>>,
    order: Vec<String>,
    duplicates: DuplicateRegistry,
}

impl LabeledCorpus {
    /// Create an empty corpus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one assignment into the corpus under the duplicate policy above.
    pub fn add_assignment(&mut self, assignment: &Assignment) {
        let utterance = assignment.utterance.as_str();
        let label = assignment.resolved_label();
        if utterance.is_empty() || label.is_empty() {
            return;
        }
        match self.labels.get_mut(utterance) {
            Some(existing) => {
                if existing.iter().any(|l| l == label) {
                    return;
                }
                // Conflict: keep the active set intact, register the incoming
                // label alongside everything the utterance already holds.
                for held in existing.iter() {
                    self.duplicates.record(utterance, held);
                }
                self.duplicates.record(utterance, label);
            }
            None => {
                self.order.push(utterance.to_string());
                self.labels
                    .insert(utterance.to_string(), vec![label.to_string()]);
            }
        }
    }

    /// Record a full label set for an utterance in one call.
    ///
    /// This is the entry point for snapshot-style sources whose rows carry
    /// several labels at once; on first sight the whole (deduplicated) set is
    /// accepted as the utterance's ground truth. Later calls go through the
    /// per-label conflict policy.
    pub fn add_labels<I, S>(&mut self, utterance: &str, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if utterance.is_empty() {
            return;
        }
        if self.labels.contains_key(utterance) {
            for label in labels {
                self.add_assignment(&Assignment::new(utterance, label.as_ref()));
            }
            return;
        }
        let mut unique: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            if !label.is_empty() && !unique.iter().any(|l| l == label) {
                unique.push(label.to_string());
            }
        }
        if unique.is_empty() {
            return;
        }
        self.order.push(utterance.to_string());
        self.labels.insert(utterance.to_string(), unique);
    }

    /// Fold a stream of assignments from one source, at most once per context.
    ///
    /// Returns `false` (without touching the corpus) when the source id was
    /// already ingested through `ctx`.
    pub fn extend_from_source<I>(
        &mut self,
        ctx: &mut NormalizeContext,
        source_id: &str,
        assignments: I,
    ) -> bool
    where
        I: IntoIterator<Item = Assignment>,
    {
        if !ctx.mark_ingested(source_id) {
            log::info!("source already ingested, skipping: {source_id}");
            return false;
        }
        for assignment in assignments {
            self.add_assignment(&assignment);
        }
        true
    }

    /// Labels held by an utterance, in first-seen order.
    #[must_use]
    pub fn get(&self, utterance: &str) -> Option<&[String]> {
        self.labels.get(utterance).map(Vec::as_slice)
    }

    /// Replace an utterance's label list wholesale.
    ///
    /// Used by unknown-label reconciliation; not a general mutation path.
    pub(crate) fn replace_labels(&mut self, utterance: &str, labels: Vec<String>) {
        if let Some(existing) = self.labels.get_mut(utterance) {
            *existing = labels;
        }
    }

    /// Number of distinct utterances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the corpus holds no utterances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate (utterance, labels) in first-seen utterance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.order.iter().map(move |u| {
            (
                u.as_str(),
                self.labels
                    .get(u)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
            )
        })
    }

    /// Utterances in first-seen order.
    pub fn utterances(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// The conflict registry accumulated during normalization.
    #[must_use]
    pub fn duplicates(&self) -> &DuplicateRegistry {
        &self.duplicates
    }

    /// Total number of (utterance, label) pairs held.
    #[must_use]
    pub fn total_labels(&self) -> usize {
        self.labels.values().map(Vec::len).sum()
    }

    /// Histogram of labels-per-utterance: bucket → utterance count.
    #[must_use]
    pub fn label_histogram(&self) -> BTreeMap<usize, usize> {
        let mut histogram = BTreeMap::new();
        for labels in self.labels.values() {
            *histogram.entry(labels.len()).or_insert(0) += 1;
        }
        histogram
    }

    /// Per-label utterance counts, labels in first-seen order across the corpus.
    #[must_use]
    pub fn label_utterance_counts(&self) -> Vec<(String, usize)> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for utterance in &self.order {
            if let Some(labels) = self.labels.get(utterance) {
                for label in labels {
                    if !counts.contains_key(label) {
                        order.push(label.clone());
                    }
                    *counts.entry(label.clone()).or_insert(0) += 1;
                }
            }
        }
        order
            .into_iter()
            .map(|label| {
                let count = counts.get(&label).copied().unwrap_or(0);
                (label, count)
            })
            .collect()
    }

    /// Utterances holding more than one label, in first-seen order.
    #[must_use]
    pub fn multi_label_utterances(&self) -> Vec<(&str, &[String])> {
        self.iter().filter(|(_, labels)| labels.len() > 1).collect()
    }
}
