use assessment_runtime::collaborators::{FsContentSource, HttpCollaborator, InMemoryProgress, MockGenerativeText};
use assessment_runtime::config::{HttpConfig, RuntimeConfig};
use assessment_runtime::pipeline::LessonRuntime;
use assessment_runtime::registry::Dispatcher;
use assessment_runtime::types::{
    ContentSource, EventType, GradeSignal, InteractionKind, Mode, ProgressCollaborator, Response, RuntimeError,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const LESSON: &str = r#"# Ownership

Every value has a single owner.

```interaction
{"id": "q1", "title": "Owners", "type": "multiple-choice"}
How many owners can a value have at once?
- [x] One
- [ ] Two
- [ ] Any number
```

```interaction
{"id": "e1", "title": "Moves", "type": "essay"}
What happens to the source of a move?
```

```interaction
{"id": "h1", "type": "hotspot"}
Not something this runtime renders.
```

```interaction
Quick check without a header
- [x] ok
```
"#;

struct StaticContent(&'static str);

#[async_trait]
impl ContentSource for StaticContent {
    async fn fetch_document(&self, _topic: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

fn runtime(progress: Arc<InMemoryProgress>) -> LessonRuntime {
    LessonRuntime::new(
        Arc::new(StaticContent(LESSON)),
        progress,
        Arc::new(MockGenerativeText::new()),
    )
    .with_config(RuntimeConfig {
        user_id: Some("learner-1".to_string()),
        ..RuntimeConfig::default()
    })
}

#[tokio::test]
async fn test_open_topic_renders_known_blocks() {
    init_tracing();
    let progress = Arc::new(InMemoryProgress::new());
    let mut lesson = runtime(progress).open_topic("ownership").await.expect("topic opens");

    assert_eq!(lesson.topic(), "ownership");
    assert_eq!(lesson.definitions().len(), 4);
    assert_eq!(lesson.interaction_ids(), vec!["q1", "e1", "h1"]);

    // The unknown block renders nothing; the header-less one is a transient
    // multiple choice.
    let handlers = lesson.render(None, None).await;
    let kinds: Vec<InteractionKind> = handlers.iter().map(|handler| handler.kind().clone()).collect();
    assert_eq!(
        kinds,
        vec![
            InteractionKind::MultipleChoice,
            InteractionKind::Essay,
            InteractionKind::MultipleChoice
        ]
    );
    assert!(handlers.iter().all(|handler| handler.mode() == Mode::Learning));
    assert!(lesson.handler("h1").is_none());
    info!("Rendered {} handlers", handlers.len());
}

#[tokio::test]
async fn test_open_topic_restores_previous_answers() {
    init_tracing();
    let progress = Arc::new(InMemoryProgress::new().with_quiz_progress(
        "q1",
        json!({"type": "multiple-choice", "feedback": "Correct!", "percentCorrect": 100.0, "selected": [0]}),
    ));
    let mut lesson = runtime(progress).open_topic("ownership").await.expect("topic opens");

    let completion = lesson.completion();
    assert_eq!(completion.percent(), 33);

    lesson.render(Some(Mode::Learning), None).await;
    let q1 = lesson.handler("q1").expect("rendered");
    assert_eq!(q1.signal(), Some(GradeSignal::Graded(100.0)));

    let e1 = lesson.handler("e1").expect("rendered");
    assert!(e1.submit(Response::text("It can no longer be used.")).await.is_accepted());
    assert_eq!(completion.percent(), 67);
}

#[tokio::test]
async fn test_progress_load_failure_opens_blank_lesson() {
    let progress = Arc::new(InMemoryProgress::new());
    progress.set_failing(true);

    let lesson = runtime(progress).open_topic("ownership").await.expect("topic opens");
    assert!(lesson.store().is_empty());
}

#[tokio::test]
async fn test_content_failure_is_an_error() {
    let directory = std::env::temp_dir().join(format!("lessons-{}", Uuid::new_v4()));
    let runtime = LessonRuntime::new(
        Arc::new(FsContentSource::new(&directory)),
        Arc::new(InMemoryProgress::new()),
        Arc::new(MockGenerativeText::new()),
    );

    let result = runtime.open_topic("missing").await;
    assert!(matches!(result, Err(RuntimeError::Collaborator(_))));
}

#[tokio::test]
async fn test_record_note() {
    let progress = Arc::new(InMemoryProgress::new());
    let lesson = runtime(progress.clone()).open_document("ownership", LESSON);

    lesson.record_note("e1", "Revisit moves").await.expect("note recorded");
    let notes = progress.events_of(EventType::Note);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].interaction_id.as_deref(), Some("e1"));
    assert_eq!(notes[0].user_id.as_deref(), Some("learner-1"));
    assert_eq!(notes[0].details["note"], "Revisit moves");

    assert!(matches!(
        lesson.record_note("nope", "x").await,
        Err(RuntimeError::InteractionNotFound { .. })
    ));
    assert!(lesson.record_note("", "x").await.is_err());
}

#[tokio::test]
async fn test_custom_dispatcher_and_fence_tag() {
    let mut dispatcher = Dispatcher::default();
    dispatcher.unregister(&InteractionKind::Essay);

    let mut lesson = LessonRuntime::new(
        Arc::new(StaticContent("```quiz\n{\"id\":\"e\",\"type\":\"essay\"}\nWhy?\n```")),
        Arc::new(InMemoryProgress::new()),
        Arc::new(MockGenerativeText::new()),
    )
    .with_dispatcher(dispatcher)
    .with_config(RuntimeConfig {
        fence_tag: "quiz".to_string(),
        ..RuntimeConfig::default()
    })
    .open_topic("t")
    .await
    .expect("topic opens");

    assert_eq!(lesson.definitions().len(), 1);
    assert!(lesson.render(Some(Mode::Preview), None).await.is_empty());
}

#[tokio::test]
async fn test_fs_content_source_reads_topic_files() {
    let directory = std::env::temp_dir().join(format!("lessons-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&directory).await.expect("temp dir");
    tokio::fs::write(directory.join("ownership.md"), LESSON).await.expect("write lesson");

    let source = FsContentSource::new(&directory);
    let document = source.fetch_document("ownership").await.expect("read");
    assert_eq!(document, LESSON);

    assert!(source.fetch_document("../ownership").await.is_err());
    assert!(source.fetch_document(".hidden").await.is_err());
    assert!(source.fetch_document("").await.is_err());

    tokio::fs::remove_dir_all(&directory).await.expect("cleanup");
}

#[test]
fn test_http_endpoints_resolve_under_base_path() {
    let collaborator = HttpCollaborator::new(HttpConfig {
        base_url: "http://localhost:8080/api".to_string(),
        ..HttpConfig::default()
    })
    .expect("client builds");

    assert_eq!(
        collaborator.endpoint(&["progress", "quiz"]).expect("url").as_str(),
        "http://localhost:8080/api/progress/quiz"
    );
    assert_eq!(
        collaborator.endpoint(&["surveys", "a b", "summary"]).expect("url").as_str(),
        "http://localhost:8080/api/surveys/a%20b/summary"
    );

    let trailing = HttpCollaborator::new(HttpConfig::default()).expect("client builds");
    assert_eq!(
        trailing.endpoint(&["progress"]).expect("url").as_str(),
        "http://localhost:8080/api/progress"
    );
}

#[test]
fn test_http_rejects_unusable_base_urls() {
    let relative = HttpCollaborator::new(HttpConfig {
        base_url: "not a url".to_string(),
        ..HttpConfig::default()
    });
    assert!(matches!(relative, Err(RuntimeError::InvalidUrl(_))));

    let opaque = HttpCollaborator::new(HttpConfig {
        base_url: "mailto:someone@example.com".to_string(),
        ..HttpConfig::default()
    });
    assert!(matches!(opaque, Err(RuntimeError::Config(_))));
}

#[tokio::test]
async fn test_http_gives_up_after_retries() {
    init_tracing();
    let collaborator = HttpCollaborator::new(HttpConfig {
        base_url: "http://127.0.0.1:9/api/".to_string(),
        timeout_seconds: 2,
        max_retries: 1,
        retry_delay_ms: 1,
        ..HttpConfig::default()
    })
    .expect("client builds");

    assert!(collaborator.get_survey_summary("s1").await.is_err());
}
