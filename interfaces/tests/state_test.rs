use interfaces::defs::{EventType, ProgressCollaborator};
use interfaces::state::SqliteProgressService;
use serde_json::json;

async fn open(user: &str) -> anyhow::Result<SqliteProgressService> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    Ok(SqliteProgressService::connect("sqlite::memory:").await?.for_user(user))
}

#[tokio::test]
async fn test_quiz_progress_keeps_latest_submission_per_interaction() -> anyhow::Result<()> {
    let service = open("alice").await?;

    service
        .add_progress(Some("alice"), Some("q1"), EventType::QuizSubmit, 12, json!({"type": "essay", "percentCorrect": 40}))
        .await?;
    service
        .add_progress(Some("alice"), Some("q1"), EventType::QuizSubmit, 30, json!({"type": "essay", "percentCorrect": 90}))
        .await?;
    service
        .add_progress(Some("bob"), Some("q2"), EventType::QuizSubmit, 5, json!({"type": "essay"}))
        .await?;
    service
        .add_progress(Some("alice"), None, EventType::Exam, 0, json!({"state": "inProgress"}))
        .await?;

    let progress = service.get_quiz_progress().await?;
    assert_eq!(progress.len(), 1, "only alice's quiz submissions are returned");
    assert_eq!(progress["q1"].details["percentCorrect"], json!(90));

    let events = service.events().await?;
    assert_eq!(events.len(), 4);
    assert_eq!(events[3].event_type, EventType::Exam);
    assert_eq!(events[3].interaction_id, None);
    Ok(())
}

#[tokio::test]
async fn test_survey_summary_counts_each_users_latest_vote() -> anyhow::Result<()> {
    let service = open("alice").await?;

    service
        .add_progress(Some("alice"), Some("poll"), EventType::QuizSubmit, 1, json!({"type": "survey", "selected": [0]}))
        .await?;
    // alice changes her mind; only the latest vote counts
    service
        .add_progress(Some("alice"), Some("poll"), EventType::QuizSubmit, 1, json!({"type": "survey", "selected": [2]}))
        .await?;
    service
        .add_progress(Some("bob"), Some("poll"), EventType::QuizSubmit, 1, json!({"type": "survey", "selected": [1, 2]}))
        .await?;
    service
        .add_progress(Some("carol"), Some("other-poll"), EventType::QuizSubmit, 1, json!({"type": "survey", "selected": [0]}))
        .await?;

    let summary = service.get_survey_summary("poll").await?;
    assert_eq!(summary.voters, 2);
    assert_eq!(summary.votes.get(&0), None);
    assert_eq!(summary.votes.get(&1), Some(&1));
    assert_eq!(summary.votes.get(&2), Some(&2));
    assert_eq!(summary.total_votes(), 3);
    Ok(())
}

#[tokio::test]
async fn test_survey_summary_for_unknown_interaction_is_empty() -> anyhow::Result<()> {
    let service = open("alice").await?;

    let summary = service.get_survey_summary("missing").await?;
    assert_eq!(summary.voters, 0);
    assert!(summary.votes.is_empty());
    Ok(())
}
