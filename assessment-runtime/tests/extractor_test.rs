use assessment_runtime::extractor::{extract_block, parse_option_line, split_choices, BlockExtractor};
use assessment_runtime::types::{HeaderStatus, InteractionKind};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[test]
fn test_header_type_is_case_insensitive() {
    init_tracing();

    let definition = extract_block("{\"id\":\"x\",\"type\":\"ESSAY\"}\nExplain ownership.");
    assert_eq!(definition.kind, InteractionKind::Essay);
    assert_eq!(definition.id, "x");
    assert_eq!(definition.header, HeaderStatus::Parsed);
    assert_eq!(definition.body, "Explain ownership.");
}

#[test]
fn test_header_fields_and_body() {
    let block = "{\"id\": \"q1\", \"title\": \"Arithmetic\", \"type\": \"multiple-choice\"}\nWhat is 2+2?\n- [ ] 3\n- [x] 4";
    let definition = extract_block(block);

    assert_eq!(definition.id, "q1");
    assert_eq!(definition.title, "Arithmetic");
    assert_eq!(definition.kind, InteractionKind::MultipleChoice);
    assert_eq!(definition.body, "What is 2+2?\n- [ ] 3\n- [x] 4");
}

#[test]
fn test_unterminated_header_falls_back_to_defaults() {
    init_tracing();

    let block = "{\"id\":\"x\",\"type\":\"essay\"\nWhat went wrong?";
    let definition = extract_block(block);

    assert_eq!(definition.header, HeaderStatus::Malformed);
    assert_eq!(definition.kind, InteractionKind::MultipleChoice);
    assert!(definition.id.is_empty());
    assert_eq!(definition.body, block);
}

#[test]
fn test_non_object_header_is_malformed() {
    let block = "{not json at all}\n- [x] yes";
    let definition = extract_block(block);

    assert_eq!(definition.header, HeaderStatus::Malformed);
    assert_eq!(definition.body, block);
}

#[test]
fn test_block_without_header_keeps_whole_body() {
    let block = "Pick one\n- [x] a\n- [ ] b";
    let definition = extract_block(block);

    assert_eq!(definition.header, HeaderStatus::Missing);
    assert_eq!(definition.kind, InteractionKind::MultipleChoice);
    assert!(definition.is_transient());
    assert_eq!(definition.body, block);
}

#[test]
fn test_unknown_type_is_preserved() {
    let definition = extract_block("{\"id\":\"h\",\"type\":\"hotspot\"}\nClick the thing");
    assert_eq!(definition.kind, InteractionKind::Unknown("hotspot".to_string()));
    assert!(!definition.kind.is_known());
}

#[test]
fn test_numeric_id_is_accepted() {
    let definition = extract_block("{\"id\": 42, \"type\": \"survey\"}\n- [ ] yes");
    assert_eq!(definition.id, "42");
    assert_eq!(definition.kind, InteractionKind::Survey);
}

#[test]
fn test_option_lines() {
    let unchecked = parse_option_line("- [ ] Borrowing").expect("unchecked option");
    assert_eq!(unchecked.text, "Borrowing");
    assert!(!unchecked.correct);

    let checked = parse_option_line("- [X]   Ownership  ").expect("checked option");
    assert_eq!(checked.text, "Ownership");
    assert!(checked.correct);

    // Nested bullets are not options.
    assert!(parse_option_line("  - [x] Indented").is_none());

    assert!(parse_option_line("- [?] Maybe").is_none());
    assert!(parse_option_line("* [x] Wrong bullet").is_none());
    assert!(parse_option_line("Plain prose").is_none());
}

#[test]
fn test_split_choices_ignores_indented_bullets() {
    let choices = split_choices("Consider:\n  - [x] a nested note\n- [ ] first\n- [x] second\n");

    assert_eq!(choices.prompt, "Consider:\n  - [x] a nested note");
    assert_eq!(choices.len(), 2);
    assert_eq!(choices.correct_indices().into_iter().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_split_choices_separates_prompt() {
    let choices = split_choices("Which are primes?\nPick all.\n- [x] 2\n- [x] 3\n- [ ] 4\n");

    assert_eq!(choices.prompt, "Which are primes?\nPick all.");
    assert_eq!(choices.len(), 3);
    assert_eq!(choices.correct_indices().into_iter().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn test_extract_document_finds_tagged_fences() {
    init_tracing();

    let document = r#"# Lesson

Some prose.

```rust
fn not_an_interaction() {}
```

```interaction
{"id": "a", "type": "essay"}
Describe a lifetime.
```

More prose.

```interaction
{"id": "b", "type": "multiple-select"}
Pick the traits.
- [x] Send
- [x] Sync
- [ ] Struct
"#;

    let definitions = BlockExtractor::new().extract_document(document);
    assert_eq!(definitions.len(), 2);
    assert_eq!(definitions[0].id, "a");
    assert_eq!(definitions[0].body, "Describe a lifetime.");
    // The second fence is never closed and runs to the end of the document.
    assert_eq!(definitions[1].id, "b");
    assert_eq!(definitions[1].kind, InteractionKind::MultipleSelect);
    assert_eq!(split_choices(&definitions[1].body).len(), 3);
}

#[test]
fn test_custom_fence_tag() {
    let document = "```quiz\n{\"id\":\"q\",\"type\":\"prompt\"}\nAsk away\n```\n```interaction\n{\"id\":\"ignored\"}\n```";
    let definitions = BlockExtractor::with_fence_tag("quiz").extract_document(document);

    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].id, "q");
    assert_eq!(definitions[0].kind, InteractionKind::Prompt);
}
