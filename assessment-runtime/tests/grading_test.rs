use assessment_runtime::feedback::parse_essay_feedback;
use assessment_runtime::grading::{extract_understanding_score, package_choice, score_choices};
use assessment_runtime::extractor::split_choices;
use assessment_runtime::types::{InteractionDefinition, InteractionKind};
use std::collections::BTreeSet;

fn set(indices: &[usize]) -> BTreeSet<usize> {
    indices.iter().copied().collect()
}

#[test]
fn test_score_stays_in_range_for_every_selection() {
    // Every non-empty selection over five options against a few answer keys.
    let keys = [set(&[0]), set(&[1, 3]), set(&[0, 2, 4]), set(&[0, 1, 2, 3, 4])];
    for correct in &keys {
        for mask in 1u32..32 {
            let selected: BTreeSet<usize> = (0..5).filter(|bit| mask & (1 << bit) != 0).collect();
            let score = score_choices(&selected, correct).expect("non-empty selection is scored");
            assert!(
                (0.0..=100.0).contains(&score.percent_correct),
                "{:?} against {:?} gave {}",
                selected,
                correct,
                score.percent_correct
            );
            assert!(score.matched <= correct.len());
        }
    }
}

#[test]
fn test_exact_answer_scores_full_marks() {
    let correct = set(&[0, 2]);
    let score = score_choices(&correct, &correct).expect("scored");
    assert_eq!(score.percent_correct, 100.0);
    assert_eq!(score.matched, 2);
}

#[test]
fn test_complement_scores_zero() {
    let score = score_choices(&set(&[1, 3]), &set(&[0, 2])).expect("scored");
    assert_eq!(score.percent_correct, 0.0);
    assert_eq!(score.matched, 0);
}

#[test]
fn test_wrong_picks_cancel_right_picks() {
    // 3 right, 1 wrong out of 4 correct: (3 - 1) / 4
    let score = score_choices(&set(&[0, 1, 2, 5]), &set(&[0, 1, 2, 3])).expect("scored");
    assert_eq!(score.matched, 2);
    assert_eq!(score.percent_correct, 50.0);

    // More wrong than right clamps at zero rather than going negative.
    let score = score_choices(&set(&[0, 4, 5, 6]), &set(&[0, 1])).expect("scored");
    assert_eq!(score.matched, 0);
    assert_eq!(score.percent_correct, 0.0);
}

#[test]
fn test_percent_is_rounded() {
    let score = score_choices(&set(&[0]), &set(&[0, 1, 2])).expect("scored");
    assert_eq!(score.percent_correct, 33.0);
}

#[test]
fn test_empty_selection_is_not_scored() {
    assert!(score_choices(&BTreeSet::new(), &set(&[0])).is_none());
}

#[test]
fn test_choice_payload_lists_texts() {
    let definition = InteractionDefinition::new(
        "q",
        InteractionKind::MultipleSelect,
        "Which are Rust keywords?\n- [x] fn\n- [ ] func\n- [x] impl",
    )
    .with_title("Keywords");
    let choices = split_choices(&definition.body);
    let request = package_choice(&definition, &choices, &set(&[0, 1]), 0.0);

    assert_eq!(request.title, "Keywords");
    assert_eq!(request.kind, "multiple-select");
    assert_eq!(request.question, "Which are Rust keywords?");
    assert_eq!(request.choices, vec!["fn", "func", "impl"]);
    assert_eq!(request.answers, vec!["fn", "func"]);
    assert_eq!(request.correct_answers, vec!["fn", "impl"]);
}

#[test]
fn test_essay_feedback_fragment() {
    let (percent, text) = parse_essay_feedback("{\"percentCorrect\": 92} Good work on the borrow rules.");
    assert_eq!(percent, Some(92.0));
    assert_eq!(text, "Good work on the borrow rules.");
}

#[test]
fn test_essay_feedback_without_fragment() {
    let (percent, text) = parse_essay_feedback("  Needs more detail.  ");
    assert_eq!(percent, None);
    assert_eq!(text, "Needs more detail.");
}

#[test]
fn test_essay_feedback_with_broken_fragment() {
    let raw = "{\"percentCorrect\": 92 Good work";
    let (percent, text) = parse_essay_feedback(raw);
    assert_eq!(percent, None);
    assert_eq!(text, raw);
}

#[test]
fn test_understanding_score() {
    assert_eq!(
        extract_understanding_score("Thanks, I get it now!\n\n**Understanding Score:** 85/100"),
        Some(85.0)
    );
    assert_eq!(
        extract_understanding_score("Understanding score: 40. Later... Understanding Score - 70"),
        Some(70.0)
    );
    assert_eq!(extract_understanding_score("understanding score: 250"), Some(100.0));
    assert_eq!(extract_understanding_score("What is an understanding score of 10?"), None);
    assert_eq!(extract_understanding_score("Can you explain that again?"), None);
}
