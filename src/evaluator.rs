//! Run orchestration: corpus in, scored outcomes out, report assembled.
//!
//! The evaluator owns the run lifecycle: freeze the vocabulary from the
//! training corpus, reconcile the test corpus against it, drive the scoring
//! adapter over every test utterance, aggregate outcomes into a confusion
//! matrix, and assemble the report.
//!
//! Scoring is the only blocking operation (external inference), so it fans
//! out over a bounded worker pool when configured. Each worker accumulates a
//! private partial matrix, merged by commutative summation at the end; no
//! shared counters, no locks on the hot path. Outcomes are keyed back to
//! submission order before report assembly, so the report is identical
//! whatever order workers finish in.

use crate::corpus::LabeledCorpus;
use crate::error::{Error, Result};
use crate::matrix::ConfusionMatrix;
use crate::outcome::{classify, PredictionOutcome, Thresholds};
use crate::report::EvalReport;
use crate::scoring::Scorer;
use crate::vocab::{reconcile_unknown_labels, LabelVocabulary};
use crossbeam_channel::bounded;
use std::thread;

/// Configuration for an evaluation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalConfig {
    /// The four threshold policies.
    pub thresholds: Thresholds,
    /// Abort the whole run on the first per-utterance scoring failure
    /// instead of excluding the utterance with a warning.
    pub strict: bool,
    /// Scoring worker threads; values <= 1 run sequentially.
    pub workers: usize,
    /// Support cutoff for the subset matrix view (labels kept when
    /// support > `min_support`).
    pub min_support: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            strict: false,
            workers: 1,
            min_support: 1,
        }
    }
}

/// Multi-label classification evaluation engine.
///
/// # Example
///
/// ```rust
/// use inteval::{Evaluator, EvalConfig, LabeledCorpus, MockScorer, ScoredCandidate};
///
/// let mut training = LabeledCorpus::new();
/// training.add_labels("fly to denver", ["travel"]);
/// training.add_labels("set up a meeting", ["schedule"]);
///
/// let mut test = LabeledCorpus::new();
/// test.add_labels("fly to miami", ["travel"]);
///
/// let scorer = MockScorer::new("mock").with_candidates(
///     "fly to miami",
///     vec![
///         ScoredCandidate::new("travel", 0.9),
///         ScoredCandidate::new("schedule", 0.1),
///     ],
/// );
///
/// let report = Evaluator::new(EvalConfig::default())
///     .unwrap()
///     .run(&training, test, &scorer)
///     .unwrap();
/// assert_eq!(report.matrix.evaluated, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvalConfig,
}

struct Job {
    index: usize,
    utterance: String,
    truth: Vec<String>,
}

impl Evaluator {
    /// Create an evaluator, validating the configuration.
    pub fn new(config: EvalConfig) -> Result<Self> {
        config.thresholds.validate()?;
        Ok(Self { config })
    }

    /// Evaluate a test corpus against a training corpus with the given scorer.
    ///
    /// Consumes the test corpus because unknown-label reconciliation rewrites
    /// it in place.
    ///
    /// # Errors
    ///
    /// Fatal conditions per the error design: empty training corpus, empty
    /// test corpus, empty label set after reconciliation, and — in strict
    /// mode only — any per-utterance scoring failure.
    pub fn run(
        &self,
        training: &LabeledCorpus,
        mut test: LabeledCorpus,
        scorer: &dyn Scorer,
    ) -> Result<EvalReport> {
        if training.is_empty() {
            return Err(Error::empty_corpus("training corpus has no utterances"));
        }
        let vocabulary = LabelVocabulary::from_corpus(training)?.with_unknown();
        log::info!(
            "vocabulary frozen: {} labels (unknown slot included)",
            vocabulary.len()
        );

        let reconciled = reconcile_unknown_labels(&mut test, &vocabulary)?;
        log::info!(
            "evaluating {} test utterances with scorer '{}' ({} rewritten to {})",
            test.len(),
            scorer.name(),
            reconciled.rewritten_labels,
            crate::vocab::UNKNOWN_LABEL
        );

        let jobs: Vec<Job> = test
            .iter()
            .enumerate()
            .map(|(index, (utterance, labels))| Job {
                index,
                utterance: utterance.to_string(),
                truth: labels.to_vec(),
            })
            .collect();

        let (outcomes, matrix, warnings) = if self.config.workers <= 1 {
            self.score_sequential(jobs, scorer, &vocabulary)?
        } else {
            self.score_parallel(jobs, scorer, &vocabulary)?
        };

        for warning in &warnings {
            log::warn!("{warning}");
        }

        let metrics = matrix.metrics(&vocabulary);
        let subset = metrics.subset(self.config.min_support);
        let report = EvalReport::assemble(
            &vocabulary,
            &test,
            &outcomes,
            metrics,
            subset,
            self.config.thresholds,
            warnings,
        );
        log::info!("{}", report.summary());
        Ok(report)
    }

    fn score_sequential(
        &self,
        jobs: Vec<Job>,
        scorer: &dyn Scorer,
        vocabulary: &LabelVocabulary,
    ) -> Result<(Vec<PredictionOutcome>, ConfusionMatrix, Vec<String>)> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        let mut matrix = ConfusionMatrix::new(vocabulary.len());
        let mut warnings = Vec::new();
        for job in jobs {
            match self.score_one(&job, scorer, vocabulary) {
                Ok(outcome) => {
                    matrix.accumulate(&outcome);
                    outcomes.push(outcome);
                }
                Err(err) if self.config.strict => return Err(err),
                Err(err) => warnings.push(exclusion_warning(&job.utterance, &err)),
            }
        }
        Ok((outcomes, matrix, warnings))
    }

    /// Bounded fan-out over `workers` threads.
    ///
    /// A feeder thread pushes jobs into a bounded channel while the caller
    /// thread drains results, so neither side can deadlock against the
    /// bounded queues. Workers stop early when the result receiver is gone
    /// (strict-mode abort).
    fn score_parallel(
        &self,
        jobs: Vec<Job>,
        scorer: &dyn Scorer,
        vocabulary: &LabelVocabulary,
    ) -> Result<(Vec<PredictionOutcome>, ConfusionMatrix, Vec<String>)> {
        let workers = self.config.workers;
        let n_jobs = jobs.len();
        let (job_tx, job_rx) = bounded::<Job>(workers * 2);
        let (result_tx, result_rx) = bounded::<(usize, String, Result<PredictionOutcome>)>(workers * 2);

        let mut slots: Vec<Option<PredictionOutcome>> = (0..n_jobs).map(|_| None).collect();
        let mut failures: Vec<(usize, String, Error)> = Vec::new();
        let mut matrix = ConfusionMatrix::new(vocabulary.len());
        let mut first_error: Option<Error> = None;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                handles.push(scope.spawn(move || {
                    let mut partial = ConfusionMatrix::new(vocabulary.len());
                    for job in job_rx.iter() {
                        let result = self.score_one(&job, scorer, vocabulary);
                        if let Ok(outcome) = &result {
                            partial.accumulate(outcome);
                        }
                        if result_tx.send((job.index, job.utterance, result)).is_err() {
                            break;
                        }
                    }
                    partial
                }));
            }
            drop(job_rx);
            drop(result_tx);

            scope.spawn(move || {
                for job in jobs {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            for (index, utterance, result) in result_rx.iter() {
                match result {
                    Ok(outcome) => slots[index] = Some(outcome),
                    Err(err) => {
                        if self.config.strict {
                            first_error = Some(err);
                            break;
                        }
                        failures.push((index, utterance, err));
                    }
                }
            }
            // Receiver dropped here on early break; workers unblock via the
            // failed send and wind down before the scope joins them.
            drop(result_rx);

            for handle in handles {
                if let Ok(partial) = handle.join() {
                    matrix.merge(&partial);
                }
            }
        });

        if let Some(err) = first_error {
            return Err(err);
        }

        // Completion order is arbitrary; submission order is the contract.
        failures.sort_by_key(|(index, _, _)| *index);
        let warnings = failures
            .iter()
            .map(|(_, utterance, err)| exclusion_warning(utterance, err))
            .collect();
        let outcomes = slots.into_iter().flatten().collect();
        Ok((outcomes, matrix, warnings))
    }

    fn score_one(
        &self,
        job: &Job,
        scorer: &dyn Scorer,
        vocabulary: &LabelVocabulary,
    ) -> Result<PredictionOutcome> {
        let candidates = scorer.score(&job.utterance)?;
        classify(
            &job.utterance,
            &job.truth,
            candidates,
            vocabulary,
            &self.config.thresholds,
        )
    }
}

fn exclusion_warning(utterance: &str, err: &Error) -> String {
    format!("excluded utterance from aggregate: {utterance}: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{MockScorer, ScoredCandidate};

    fn training() -> LabeledCorpus {
        let mut corpus = LabeledCorpus::new();
        corpus.add_labels("fly to denver", ["travel"]);
        corpus.add_labels("set up a meeting", ["schedule"]);
        corpus
    }

    fn test_corpus() -> LabeledCorpus {
        let mut corpus = LabeledCorpus::new();
        corpus.add_labels("fly to miami", ["travel"]);
        corpus.add_labels("book a room for standup", ["schedule"]);
        corpus
    }

    fn scorer() -> MockScorer {
        MockScorer::new("mock")
            .with_candidates(
                "fly to miami",
                vec![
                    ScoredCandidate::new("travel", 0.9),
                    ScoredCandidate::new("schedule", 0.1),
                ],
            )
            .with_candidates(
                "book a room for standup",
                vec![
                    ScoredCandidate::new("schedule", 0.8),
                    ScoredCandidate::new("travel", 0.3),
                ],
            )
    }

    #[test]
    fn empty_training_corpus_is_fatal() {
        let evaluator = Evaluator::new(EvalConfig::default()).unwrap();
        let result = evaluator.run(&LabeledCorpus::new(), test_corpus(), &scorer());
        assert!(matches!(result, Err(Error::EmptyCorpus(_))));
    }

    #[test]
    fn empty_test_corpus_is_fatal() {
        let evaluator = Evaluator::new(EvalConfig::default()).unwrap();
        let result = evaluator.run(&training(), LabeledCorpus::new(), &scorer());
        assert!(matches!(result, Err(Error::EmptyCorpus(_))));
    }

    #[test]
    fn invalid_thresholds_rejected_at_construction() {
        let config = EvalConfig {
            thresholds: Thresholds {
                low_confidence_score: -0.5,
                ..Thresholds::default()
            },
            ..EvalConfig::default()
        };
        assert!(matches!(Evaluator::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn scoring_failure_is_excluded_with_warning() {
        let scorer = scorer().failing_on("fly to miami");
        let evaluator = Evaluator::new(EvalConfig::default()).unwrap();
        let report = evaluator.run(&training(), test_corpus(), &scorer).unwrap();

        assert_eq!(report.matrix.evaluated, 1);
        assert_eq!(report.meta.warnings.len(), 1);
        assert!(report.meta.warnings[0].contains("fly to miami"));
    }

    #[test]
    fn strict_mode_aborts_on_scoring_failure() {
        let scorer = scorer().failing_on("fly to miami");
        let config = EvalConfig {
            strict: true,
            ..EvalConfig::default()
        };
        let evaluator = Evaluator::new(config).unwrap();
        assert!(evaluator.run(&training(), test_corpus(), &scorer).is_err());
    }

    #[test]
    fn parallel_matches_sequential() {
        let sequential = Evaluator::new(EvalConfig::default())
            .unwrap()
            .run(&training(), test_corpus(), &scorer())
            .unwrap();
        let parallel = Evaluator::new(EvalConfig {
            workers: 4,
            ..EvalConfig::default()
        })
        .unwrap()
        .run(&training(), test_corpus(), &scorer())
        .unwrap();

        assert_eq!(sequential.matrix, parallel.matrix);
        assert_eq!(sequential.scores, parallel.scores);
        assert_eq!(sequential.misclassified, parallel.misclassified);
    }

    #[test]
    fn strict_mode_aborts_in_parallel_too() {
        let scorer = scorer().failing_on("book a room for standup");
        let config = EvalConfig {
            strict: true,
            workers: 2,
            ..EvalConfig::default()
        };
        let evaluator = Evaluator::new(config).unwrap();
        assert!(evaluator.run(&training(), test_corpus(), &scorer).is_err());
    }
}
