use assessment_runtime::cli::{self, Cli, Command};
use assessment_runtime::types::RuntimeError;
use clap::Parser;

const DOCUMENT: &str = r#"
```interaction
{"id": "q1", "title": "Primes", "type": "multiple-select"}
Which are prime?
- [x] 2
- [x] 3
- [ ] 4
- [x] 5
```

```interaction
{"id": "q2", "type": "multiple-choice"}
Pick one
- [x] a
- [x] b
```

```interaction
{"id": "q1", "type": "essay"}
Duplicate id
```

```interaction
{"id": "x", "type": "hotspot"}
```

```interaction
{"id": "broken"
- [x] a
```
"#;

#[test]
fn test_inspect_lists_blocks() {
    let definitions = cli::extract(DOCUMENT, "interaction");
    let lines = cli::inspect(&definitions);

    assert_eq!(lines.len(), 5);
    assert!(lines[0].contains("q1"));
    assert!(lines[0].contains("multiple-select"));
    assert!(lines[0].contains("[4 options, 3 correct]"));
    assert!(lines[4].contains("<no id>"));
}

#[test]
fn test_check_reports_authoring_problems() {
    let definitions = cli::extract(DOCUMENT, "interaction");
    let findings = cli::check(&definitions);
    let messages: Vec<String> = findings.iter().map(ToString::to_string).collect();

    assert!(messages.iter().any(|m| m.starts_with("block 2 (q2)") && m.contains("one correct option, found 2")));
    assert!(messages.iter().any(|m| m.starts_with("block 3 (q1)") && m.contains("duplicate id")));
    assert!(messages.iter().any(|m| m.starts_with("block 4 (x)") && m.contains("unknown type 'hotspot'")));
    assert!(messages.iter().any(|m| m.starts_with("block 5 (<no id>)") && m.contains("not a valid JSON object")));
    assert!(!messages.iter().any(|m| m.starts_with("block 1 ")));
}

#[test]
fn test_grade_scores_selection() {
    let definitions = cli::extract(DOCUMENT, "interaction");

    assert_eq!(
        cli::grade(&definitions, "q1", &[0, 1, 3]).expect("graded"),
        "q1: 100% correct (Correct!)"
    );
    assert_eq!(cli::grade(&definitions, "q1", &[0, 2]).expect("graded"), "q1: 0% correct");
    assert!(matches!(
        cli::grade(&definitions, "missing", &[0]),
        Err(RuntimeError::InteractionNotFound { .. })
    ));
    assert!(cli::grade(&definitions, "q1", &[9]).is_err());
    assert!(cli::grade(&definitions, "q1", &[]).is_err());
}

#[test]
fn test_cli_arguments() {
    let cli = Cli::try_parse_from(["assessment-runtime", "grade", "lesson.md", "--id", "q1", "--select", "0,2"])
        .expect("arguments parse");
    assert!(cli.fence_tag.is_none());
    match cli.command {
        Command::Grade { file, id, select } => {
            assert_eq!(file.to_str(), Some("lesson.md"));
            assert_eq!(id, "q1");
            assert_eq!(select, vec![0, 2]);
        }
        _ => panic!("expected grade"),
    }

    let cli = Cli::try_parse_from(["assessment-runtime", "check", "lesson.md", "--fence-tag", "quiz"])
        .expect("arguments parse");
    assert_eq!(cli.fence_tag.as_deref(), Some("quiz"));
    assert!(matches!(cli.command, Command::Check { .. }));
}
