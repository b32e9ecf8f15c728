//! End-to-end evaluator tests with the mock scoring adapter.

use inteval::{
    EvalConfig, Evaluator, LabeledCorpus, MockScorer, ScoredCandidate, Thresholds, UNKNOWN_LABEL,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn training() -> LabeledCorpus {
    let mut corpus = LabeledCorpus::new();
    corpus.add_labels("book a flight to denver", ["travel"]);
    corpus.add_labels("schedule a meeting for friday", ["schedule"]);
    corpus.add_labels("will it rain tomorrow", ["weather"]);
    corpus
}

fn test_corpus() -> LabeledCorpus {
    let mut corpus = LabeledCorpus::new();
    corpus.add_labels("book a flight to miami.", ["travel"]);
    corpus.add_labels("move my standup to noon", ["schedule"]);
    corpus.add_labels("is it sunny in lisbon", ["weather"]);
    corpus.add_labels("feed the giraffe", ["zoo-keeping"]); // unknown label
    corpus
}

fn scorer() -> MockScorer {
    MockScorer::new("snapshot")
        .with_candidates(
            "book a flight to miami.",
            vec![
                ScoredCandidate::new("travel", 0.91),
                ScoredCandidate::new("schedule", 0.88),
                ScoredCandidate::new("weather", 0.02),
            ],
        )
        .with_candidates(
            "move my standup to noon",
            vec![
                ScoredCandidate::new("schedule", 0.85),
                ScoredCandidate::new("travel", 0.1),
            ],
        )
        .with_candidates(
            "is it sunny in lisbon",
            vec![
                ScoredCandidate::new("weather", 0.45),
                ScoredCandidate::new("travel", 0.1),
            ],
        )
        .with_candidates(
            "feed the giraffe",
            vec![
                ScoredCandidate::new("weather", 0.2),
                ScoredCandidate::new("travel", 0.15),
            ],
        )
}

#[test]
fn end_to_end_report_categorizes_outcomes() {
    init_logs();
    let evaluator = Evaluator::new(EvalConfig::default()).unwrap();
    let report = evaluator.run(&training(), test_corpus(), &scorer()).unwrap();

    assert_eq!(report.matrix.evaluated, 4);
    // Vocabulary: travel, schedule, weather + UNKNOWN slot.
    assert_eq!(report.vocabulary.len(), 4);
    assert_eq!(report.vocabulary[3].label, UNKNOWN_LABEL);

    // 0.91 vs 0.88 margin is under the default 0.2 closeness.
    assert!(report
        .ambiguous
        .iter()
        .any(|r| r.utterance == "book a flight to miami."));

    // Weather prediction at 0.45 sits under the 0.5 confidence floor.
    assert!(report
        .low_confidence
        .iter()
        .any(|r| r.utterance == "is it sunny in lisbon"));

    // The giraffe utterance has unknown truth and a 0.2 top score, under the
    // 0.3 unknown threshold.
    assert!(report
        .unknown
        .iter()
        .any(|r| r.utterance == "feed the giraffe"));
    // Its top-1 prediction (weather) is wrong against unknown truth.
    assert!(report
        .misclassified
        .iter()
        .any(|r| r.utterance == "feed the giraffe"));

    // Correct single-label predictions are not misclassified.
    assert!(!report
        .misclassified
        .iter()
        .any(|r| r.utterance == "move my standup to noon"));
}

#[test]
fn score_dump_covers_every_evaluated_utterance() {
    let evaluator = Evaluator::new(EvalConfig::default()).unwrap();
    let report = evaluator.run(&training(), test_corpus(), &scorer()).unwrap();

    assert_eq!(report.scores.len(), 4);
    // Rows follow test-corpus first-seen order.
    assert_eq!(report.scores[0].utterance, "book a flight to miami.");
    assert_eq!(report.scores[3].utterance, "feed the giraffe");
    for row in &report.scores {
        assert_eq!(row.scores.len(), report.vocabulary.len());
    }
}

#[test]
fn unknown_truth_reaches_the_matrix_sentinel_row() {
    let evaluator = Evaluator::new(EvalConfig::default()).unwrap();
    let report = evaluator.run(&training(), test_corpus(), &scorer()).unwrap();

    let sentinel = report
        .matrix
        .per_label
        .iter()
        .find(|m| m.label == UNKNOWN_LABEL)
        .unwrap();
    // The giraffe utterance's truth was rewritten to the sentinel and its
    // prediction missed it.
    assert_eq!(sentinel.support, 1);
    assert_eq!(sentinel.counts.fn_, 1);
}

#[test]
fn subset_view_respects_min_support() {
    let config = EvalConfig {
        min_support: 0,
        ..EvalConfig::default()
    };
    let report = Evaluator::new(config)
        .unwrap()
        .run(&training(), test_corpus(), &scorer())
        .unwrap();

    // Every label in this fixture has support 1 > 0.
    assert_eq!(report.matrix_subset.per_label.len(), 4);
    assert_eq!(report.matrix.per_label.len(), 4);

    let strict_subset = report.matrix.subset(1);
    assert!(strict_subset.per_label.is_empty());
}

#[test]
fn parallel_run_is_deterministic() {
    init_logs();
    let baseline = Evaluator::new(EvalConfig::default())
        .unwrap()
        .run(&training(), test_corpus(), &scorer())
        .unwrap();

    for workers in [2, 4, 8] {
        let parallel = Evaluator::new(EvalConfig {
            workers,
            ..EvalConfig::default()
        })
        .unwrap()
        .run(&training(), test_corpus(), &scorer())
        .unwrap();

        assert_eq!(parallel.matrix, baseline.matrix, "workers={workers}");
        assert_eq!(parallel.scores, baseline.scores, "workers={workers}");
        assert_eq!(parallel.ambiguous, baseline.ambiguous);
        assert_eq!(parallel.unknown, baseline.unknown);
    }
}

#[test]
fn scoring_failures_warn_and_exclude_in_parallel_runs() {
    let scorer = scorer().failing_on("move my standup to noon");
    let config = EvalConfig {
        workers: 4,
        ..EvalConfig::default()
    };
    let report = Evaluator::new(config)
        .unwrap()
        .run(&training(), test_corpus(), &scorer)
        .unwrap();

    assert_eq!(report.matrix.evaluated, 3);
    assert_eq!(report.scores.len(), 3);
    assert_eq!(report.meta.warnings.len(), 1);
    assert!(report.meta.warnings[0].contains("move my standup to noon"));
}

#[test]
fn adapter_returning_no_candidates_is_a_per_utterance_failure() {
    // "is it sunny in lisbon" gets an empty candidate list.
    let scorer = MockScorer::new("sparse")
        .with_candidates(
            "book a flight to miami.",
            vec![ScoredCandidate::new("travel", 0.9)],
        )
        .with_candidates(
            "move my standup to noon",
            vec![ScoredCandidate::new("schedule", 0.9)],
        )
        .with_candidates(
            "feed the giraffe",
            vec![ScoredCandidate::new("weather", 0.1)],
        );

    let report = Evaluator::new(EvalConfig::default())
        .unwrap()
        .run(&training(), test_corpus(), &scorer)
        .unwrap();
    assert_eq!(report.matrix.evaluated, 3);
    assert_eq!(report.meta.warnings.len(), 1);
    assert!(report.meta.warnings[0].contains("is it sunny in lisbon"));
}

#[test]
fn duplicate_conflicts_surface_in_the_report() {
    let mut test = test_corpus();
    // A second source disagrees about the standup utterance's label.
    test.add_labels("move my standup to noon", ["travel"]);

    let report = Evaluator::new(EvalConfig::default())
        .unwrap()
        .run(&training(), test, &scorer())
        .unwrap();

    assert_eq!(report.duplicates.len(), 1);
    let row = &report.duplicates[0];
    assert_eq!(row.utterance, "move my standup to noon");
    assert!(row.labels.contains(&"schedule".to_string()));
    assert!(row.labels.contains(&"travel".to_string()));
}

#[test]
fn multi_label_thresholds_flow_through_the_run() {
    let mut test = LabeledCorpus::new();
    test.add_labels("plan a work trip", ["travel", "schedule"]);

    let scorer = MockScorer::new("multi").with_candidates(
        "plan a work trip",
        vec![
            ScoredCandidate::new("travel", 0.9),
            ScoredCandidate::new("schedule", 0.8),
            ScoredCandidate::new("weather", 0.1),
        ],
    );

    let config = EvalConfig {
        thresholds: Thresholds {
            multi_label_prediction: 0.5,
            ..Thresholds::default()
        },
        ..EvalConfig::default()
    };
    let report = Evaluator::new(config)
        .unwrap()
        .run(&training(), test, &scorer)
        .unwrap();

    assert!(report.misclassified.is_empty());
    assert_eq!(report.scores[0].predicted.len(), 2);
    assert_eq!(report.matrix.micro_avg.f1, 1.0);
}
