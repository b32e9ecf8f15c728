//! # inteval
//!
//! Multi-label intent classification evaluation for Rust.
//!
//! Takes (a) a normalized corpus of utterance→label assignments and (b)
//! per-utterance scored predictions from an external classifier, and produces
//! a structured diagnostic report: a multi-label confusion matrix plus
//! threshold-driven categorizations (ambiguous, misclassified,
//! low-confidence, unknown-label, multi-label).
//!
//! ## Pipeline
//!
//! | Stage | Type | Role |
//! |-------|------|------|
//! | Normalize | [`LabeledCorpus`] | utterance → label set, conflicts to [`DuplicateRegistry`] |
//! | Freeze | [`LabelVocabulary`] | stable label → index map, unknown sentinel |
//! | Score | [`Scorer`] | external classifier as a ranked-list function |
//! | Classify | [`classify`] → [`PredictionOutcome`] | per-label TP/FP/FN/TN + threshold facets |
//! | Aggregate | [`ConfusionMatrix`] | commutative accumulation, macro/micro metrics |
//! | Assemble | [`EvalReport`] | ordered row-sets for a rendering sink |
//!
//! ## Quick Start
//!
//! ```rust
//! use inteval::{EvalConfig, Evaluator, LabeledCorpus, MockScorer, ScoredCandidate};
//!
//! let mut training = LabeledCorpus::new();
//! training.add_labels("book a flight to denver", ["travel"]);
//! training.add_labels("when is my next meeting", ["schedule"]);
//!
//! let mut test = LabeledCorpus::new();
//! test.add_labels("book a flight to miami", ["travel"]);
//!
//! // Any inference stack plugs in behind the Scorer trait; the mock
//! // stands in for it here.
//! let scorer = MockScorer::new("snapshot").with_candidates(
//!     "book a flight to miami",
//!     vec![
//!         ScoredCandidate::new("travel", 0.91),
//!         ScoredCandidate::new("schedule", 0.88),
//!     ],
//! );
//!
//! let report = Evaluator::new(EvalConfig::default())
//!     .unwrap()
//!     .run(&training, test, &scorer)
//!     .unwrap();
//!
//! assert_eq!(report.ambiguous.len(), 1); // 0.91 vs 0.88 is a close call
//! assert!(report.misclassified.is_empty());
//! println!("{}", report.summary());
//! ```
//!
//! ## Design Philosophy
//!
//! - **Set arithmetic, not accuracy**: every utterance contributes one
//!   TP/FP/FN/TN cell to *every* label — genuine multi-label scoring, not
//!   mutually exclusive single-label accuracy.
//! - **Indexes, not strings**: label identity is a frozen vocabulary index,
//!   so aggregation is array arithmetic.
//! - **Order-free aggregation**: partial matrices merge commutatively, which
//!   is what makes bounded parallel scoring safe.
//! - **Facets, not hierarchies**: ambiguous / misclassified / low-confidence
//!   / unknown are independent booleans on one immutable record; an
//!   utterance can satisfy several at once.
//! - **Conflicts are data**: duplicate label assignments land in a registry
//!   and a report table, never on the floor.

#![warn(missing_docs)]

pub mod corpus;
mod error;
pub mod evaluator;
pub mod matrix;
pub mod outcome;
pub mod report;
pub mod scoring;
pub mod vocab;

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use inteval::prelude::*;
    //!
    //! let mut corpus = LabeledCorpus::new();
    //! corpus.add_labels("turn the lights on", ["home"]);
    //! assert_eq!(corpus.len(), 1);
    //! ```
    pub use crate::corpus::{Assignment, DuplicateRegistry, LabeledCorpus, NormalizeContext};
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{EvalConfig, Evaluator};
    pub use crate::matrix::{ConfusionMatrix, LabelCounts, MatrixMetrics};
    pub use crate::outcome::{classify, LabelCell, PredictionOutcome, Thresholds};
    pub use crate::report::EvalReport;
    pub use crate::scoring::{MockScorer, Score, ScoredCandidate, Scorer};
    pub use crate::vocab::{LabelVocabulary, UNKNOWN_LABEL};
}

// Re-exports
pub use corpus::{Assignment, DuplicateRegistry, LabeledCorpus, NormalizeContext};
pub use error::{Error, Result};
pub use evaluator::{EvalConfig, Evaluator};
pub use matrix::{AverageMetrics, ConfusionMatrix, LabelCounts, LabelMetrics, MatrixMetrics};
pub use outcome::{classify, LabelCell, PredictionOutcome, Thresholds};
pub use report::{
    EvalReport, LabelStatRow, OutcomeRow, ReportMeta, ScoreRow, UtteranceLabelsRow,
    UtteranceStatRow, VocabularyRow,
};
pub use scoring::{sort_candidates, MockScorer, Score, ScoredCandidate, Scorer};
pub use vocab::{
    reconcile_unknown_labels, LabelVocabulary, ReconcileSummary, UNKNOWN_LABEL,
};
