use assessment_runtime::progress_store::{CompletionView, ProgressStore};
use assessment_runtime::types::{InteractionKind, ProgressRecord, QuizProgress};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn answered(kind: InteractionKind, percent: Option<f64>) -> ProgressRecord {
    ProgressRecord::new(kind).with_feedback("ok").with_percent_correct(percent)
}

#[test]
fn test_set_then_get_returns_same_record() {
    let store = ProgressStore::new();
    let stored = store.set("q1", answered(InteractionKind::Essay, Some(70.0)));

    let fetched = store.get("q1").expect("record stored");
    assert!(Arc::ptr_eq(&stored, &fetched));
    assert_eq!(fetched.percent_correct, Some(70.0));
    assert!(store.get("q2").is_none());
}

#[test]
fn test_each_set_notifies_each_listener_once() {
    let store = ProgressStore::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let counter = calls.clone();
    let ids = seen.clone();
    let _subscription = store.subscribe(move |id, record| {
        counter.fetch_add(1, Ordering::SeqCst);
        ids.lock().unwrap().push((id.to_string(), record.percent_correct));
    });

    store.set("q1", answered(InteractionKind::MultipleChoice, Some(100.0)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    store.set("q2", answered(InteractionKind::MultipleChoice, Some(0.0)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("q1".to_string(), Some(100.0)), ("q2".to_string(), Some(0.0))]
    );
}

#[test]
fn test_dropped_subscription_stops_notifications() {
    let store = ProgressStore::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let subscription = store.subscribe(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    store.set("q1", answered(InteractionKind::Essay, None));
    subscription.unsubscribe();
    store.set("q1", answered(InteractionKind::Essay, None));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_can_read_the_store() {
    let store = ProgressStore::new();
    let observed = Arc::new(AtomicUsize::new(0));

    let reader = store.clone();
    let target = observed.clone();
    let _subscription = store.subscribe(move |_, _| {
        target.store(reader.len(), Ordering::SeqCst);
    });

    store.set("a", answered(InteractionKind::Essay, None));
    store.set("b", answered(InteractionKind::Essay, None));
    assert_eq!(observed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_clones_share_records() {
    let store = ProgressStore::new();
    let other = store.clone();
    other.set("q1", answered(InteractionKind::Survey, None));

    assert!(store.contains("q1"));
    assert_eq!(store.ids(), vec!["q1".to_string()]);

    store.reset();
    assert!(other.is_empty());
}

#[test]
fn test_rehydrate_skips_unreadable_details() {
    let store = ProgressStore::new();
    let mut progress = HashMap::new();
    progress.insert(
        "q1".to_string(),
        QuizProgress {
            details: json!({"type": "multiple-choice", "feedback": "Correct!", "percentCorrect": 100.0, "selected": [1]}),
        },
    );
    progress.insert(
        "q2".to_string(),
        QuizProgress {
            details: json!("not a record"),
        },
    );

    assert_eq!(store.rehydrate(progress), 1);
    let record = store.get("q1").expect("rehydrated");
    assert_eq!(record.kind, InteractionKind::MultipleChoice);
    assert_eq!(record.selected, Some(vec![1]));
    assert!(record.is_graded());
    assert!(!store.contains("q2"));
}

#[test]
fn test_completion_view_tracks_watched_ids() {
    let store = ProgressStore::new();
    let ids = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
    store.set("a", answered(InteractionKind::Essay, None));

    let view = CompletionView::new(&store, ids.clone());
    assert_eq!(view.percent(), 25);

    store.set("b", answered(InteractionKind::Essay, None));
    assert_eq!(view.percent(), 50);

    // Ids outside the view do not move it.
    store.set("zzz", answered(InteractionKind::Essay, None));
    assert_eq!(view.percent(), 50);
    assert_eq!(store.percent_complete(&ids), 50);
    assert_eq!(store.percent_complete(&[]), 0);
}

#[test]
fn test_reset_clears_completion_view() {
    let store = ProgressStore::new();
    let view = CompletionView::new(&store, vec!["a".to_string()]);

    store.set("a", answered(InteractionKind::MultipleChoice, Some(100.0)));
    assert_eq!(view.percent(), 100);

    let resets = Arc::new(AtomicUsize::new(0));
    let counter = resets.clone();
    let _subscription = store.on_reset(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store.reset();
    assert!(store.is_empty());
    assert_eq!(view.percent(), 0);
    assert_eq!(resets.load(Ordering::SeqCst), 1);

    // Listeners survive a reset.
    store.set("a", answered(InteractionKind::MultipleChoice, Some(100.0)));
    assert_eq!(view.percent(), 100);
}
