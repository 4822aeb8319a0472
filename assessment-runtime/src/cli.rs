use crate::extractor::{split_choices, BlockExtractor};
use crate::feedback::CORRECT_FEEDBACK;
use crate::grading::score_choices;
use crate::types::{HeaderStatus, InteractionDefinition, InteractionKind, Result, RuntimeError};
use clap::{Parser, Subcommand};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Inspect and grade lesson interaction blocks", long_about = None)]
pub struct Cli {
    /// Info string marking interaction fences (defaults to ASSESSMENT_FENCE_TAG or "interaction")
    #[arg(long, global = true)]
    pub fence_tag: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every interaction block in a document
    Inspect { file: PathBuf },
    /// Report authoring problems; fails when any are found
    Check { file: PathBuf },
    /// Score a selection against a choice block's answer key
    Grade {
        file: PathBuf,
        /// Interaction id
        #[arg(long)]
        id: String,
        /// Zero-based option indices, comma separated
        #[arg(long, value_delimiter = ',')]
        select: Vec<usize>,
    },
}

/// One authoring problem found by `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Position of the block in the document
    pub block: usize,
    pub id: String,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = if self.id.is_empty() { "<no id>" } else { &self.id };
        write!(f, "block {} ({}): {}", self.block + 1, id, self.message)
    }
}

pub fn extract(document: &str, fence_tag: &str) -> Vec<InteractionDefinition> {
    BlockExtractor::with_fence_tag(fence_tag).extract_document(document)
}

/// One line per block: position, id, kind, title and option count.
pub fn inspect(definitions: &[InteractionDefinition]) -> Vec<String> {
    definitions
        .iter()
        .enumerate()
        .map(|(index, definition)| {
            let id = if definition.is_transient() { "<no id>" } else { definition.id.as_str() };
            let mut line = format!(
                "{:>3}  {:<38} {:<16} {}",
                index + 1,
                id,
                definition.kind.as_str(),
                definition.title
            );
            if definition.kind.has_options() {
                let choices = split_choices(&definition.body);
                line.push_str(&format!(
                    " [{} options, {} correct]",
                    choices.len(),
                    choices.correct_indices().len()
                ));
            }
            line
        })
        .collect()
}

pub fn check(definitions: &[InteractionDefinition]) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut seen = HashSet::new();

    for (block, definition) in definitions.iter().enumerate() {
        let mut report = |message: String| {
            findings.push(Finding {
                block,
                id: definition.id.clone(),
                message,
            })
        };

        match definition.header {
            HeaderStatus::Malformed => report("header is not a valid JSON object".to_string()),
            HeaderStatus::Missing => report("no header; treated as multiple choice".to_string()),
            HeaderStatus::Parsed => {}
        }
        if definition.is_transient() {
            report("no id; answers will not be saved".to_string());
        } else if !seen.insert(definition.id.as_str()) {
            report("duplicate id".to_string());
        }
        if !definition.kind.is_known() {
            report(format!("unknown type '{}'; block will not render", definition.kind));
            continue;
        }
        if !definition.kind.has_options() {
            continue;
        }

        let choices = split_choices(&definition.body);
        let correct = choices.correct_indices().len();
        if choices.is_empty() {
            report("no options".to_string());
        } else if definition.kind == InteractionKind::MultipleChoice && correct != 1 {
            report(format!("multiple choice should have one correct option, found {}", correct));
        } else if definition.kind == InteractionKind::MultipleSelect && correct == 0 {
            report("multiple select has no correct options".to_string());
        }
    }

    findings
}

/// Score `selected` for the choice block `id`.
pub fn grade(definitions: &[InteractionDefinition], id: &str, selected: &[usize]) -> Result<String> {
    let definition = definitions
        .iter()
        .find(|definition| definition.id == id)
        .ok_or_else(|| RuntimeError::InteractionNotFound { id: id.to_string() })?;
    if !definition.kind.is_choice() {
        return Err(RuntimeError::General(format!(
            "'{}' is a {} block and cannot be graded here",
            id, definition.kind
        )));
    }

    let choices = split_choices(&definition.body);
    let selected: BTreeSet<usize> = selected.iter().copied().collect();
    if let Some(index) = selected.iter().find(|index| **index >= choices.len()) {
        return Err(RuntimeError::General(format!(
            "option {} out of range ({} options)",
            index,
            choices.len()
        )));
    }

    let score = score_choices(&selected, &choices.correct_indices())
        .ok_or_else(|| RuntimeError::General("nothing selected".to_string()))?;
    let mut summary = format!("{}: {}% correct", id, score.percent_correct);
    if score.percent_correct >= 100.0 {
        summary.push_str(&format!(" ({})", CORRECT_FEEDBACK));
    }
    Ok(summary)
}
