use crate::config::DEFAULT_FENCE_TAG;
use crate::types::{Choice, ChoiceSet, HeaderStatus, InteractionDefinition, InteractionKind};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

const FENCE: &str = "```";

/// Pulls interaction blocks out of lesson documents.
pub struct BlockExtractor {
    fence_tag: String,
    seen_ids: HashSet<String>,
}

impl BlockExtractor {
    pub fn new() -> Self {
        Self::with_fence_tag(DEFAULT_FENCE_TAG)
    }

    pub fn with_fence_tag(fence_tag: impl Into<String>) -> Self {
        Self {
            fence_tag: fence_tag.into(),
            seen_ids: HashSet::new(),
        }
    }

    /// Every fenced interaction block in document order.
    pub fn extract_document(&mut self, document: &str) -> Vec<InteractionDefinition> {
        self.seen_ids.clear();

        let blocks = fenced_blocks(document, &self.fence_tag);
        let mut definitions = Vec::with_capacity(blocks.len());

        for block in blocks {
            let definition = extract_block(&block);
            if !definition.id.is_empty() && !self.seen_ids.insert(definition.id.clone()) {
                warn!("Duplicate interaction id '{}' in document", definition.id);
            }
            definitions.push(definition);
        }

        debug!("Extracted {} interaction blocks", definitions.len());
        definitions
    }
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one block into a definition. Never fails: a missing or broken header
/// leaves the defaults in place and the whole block becomes the body.
pub fn extract_block(block: &str) -> InteractionDefinition {
    let mut definition = InteractionDefinition {
        id: String::new(),
        title: String::new(),
        kind: InteractionKind::MultipleChoice,
        body: block.to_string(),
        header: HeaderStatus::Missing,
    };

    let trimmed = block.trim_start();
    if !trimmed.starts_with('{') {
        return definition;
    }
    let header_start = block.len() - trimmed.len();

    let mut stream = serde_json::Deserializer::from_str(trimmed).into_iter::<Value>();
    let header = match stream.next() {
        Some(Ok(Value::Object(header))) => header,
        Some(Ok(_)) | Some(Err(_)) | None => {
            debug!("Malformed interaction header, using defaults");
            definition.header = HeaderStatus::Malformed;
            return definition;
        }
    };
    let header_end = header_start + stream.byte_offset();

    apply_header(&mut definition, &header);
    definition.header = HeaderStatus::Parsed;
    definition.body = strip_header_line_end(&block[header_end..]).to_string();
    definition
}

fn apply_header(definition: &mut InteractionDefinition, header: &Map<String, Value>) {
    if let Some(id) = header.get("id").and_then(scalar_string) {
        definition.id = id;
    }
    if let Some(title) = header.get("title").and_then(scalar_string) {
        definition.title = title;
    }
    if let Some(kind) = header.get("type").and_then(Value::as_str) {
        definition.kind = InteractionKind::parse(kind);
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Drop whitespace left on the header line and the line break after it.
fn strip_header_line_end(rest: &str) -> &str {
    let rest = rest.trim_start_matches([' ', '\t']);
    rest.strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest)
}

/// Split a choice or survey body into prompt prose and option lines.
pub fn split_choices(body: &str) -> ChoiceSet {
    let mut prompt_lines = Vec::new();
    let mut choices = Vec::new();

    for line in body.lines() {
        match parse_option_line(line) {
            Some(choice) => choices.push(choice),
            None if choices.is_empty() => prompt_lines.push(line),
            None => {}
        }
    }

    ChoiceSet {
        prompt: prompt_lines.join("\n").trim().to_string(),
        choices,
    }
}

/// `- [ ] text` or `- [x] text` (either case of x), starting in the first
/// column. Indented bullets are prose.
pub fn parse_option_line(line: &str) -> Option<Choice> {
    let rest = line.strip_prefix("- [")?;
    let mut chars = rest.chars();
    let correct = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let text = chars.as_str().strip_prefix(']')?;
    Some(Choice {
        text: text.trim().to_string(),
        correct,
    })
}

/// Bodies of the fenced regions tagged with `tag`. An unterminated fence runs
/// to the end of the document.
fn fenced_blocks(document: &str, tag: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in document.lines() {
        let trimmed = line.trim();
        match current.as_mut() {
            None => {
                if let Some(info) = trimmed.strip_prefix(FENCE) {
                    if info.trim().eq_ignore_ascii_case(tag) {
                        current = Some(Vec::new());
                    }
                }
            }
            Some(lines) => {
                if trimmed == FENCE {
                    blocks.push(lines.join("\n"));
                    current = None;
                } else {
                    lines.push(line);
                }
            }
        }
    }

    if let Some(lines) = current {
        warn!("Unterminated interaction fence, taking the rest of the document");
        blocks.push(lines.join("\n"));
    }

    blocks
}
