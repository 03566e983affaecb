use anyhow::Result;
use crossterm::style::Stylize;
use regex::Regex;
use std::sync::LazyLock;

use crate::{Terminal, Tone, paint};

static SHELL_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:bash|sh|shell)?\n(.*?)```").expect("valid fence regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSegment {
    Prose(String),
    Command(String),
}

/// Split an answer into prose and fenced shell commands, in source order.
/// Segments are trimmed and empty ones dropped.
pub fn split_answer(text: &str) -> Vec<AnswerSegment> {
    let mut segments = Vec::new();
    let mut push = |raw: &str, command: bool| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        segments.push(if command {
            AnswerSegment::Command(trimmed.to_string())
        } else {
            AnswerSegment::Prose(trimmed.to_string())
        });
    };

    let mut cursor = 0;
    for caps in SHELL_FENCE.captures_iter(text) {
        let (Some(fence), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push(&text[cursor..fence.start()], false);
        push(body.as_str(), true);
        cursor = fence.end();
    }
    push(&text[cursor..], false);
    segments
}

/// Print the answer under a `DAFT:` header and return the proposed
/// commands in order.
pub fn render_answer(term: &mut dyn Terminal, text: &str) -> Result<Vec<String>> {
    let header = if term.styled() {
        "DAFT:".red().bold().underlined().to_string()
    } else {
        "DAFT:".to_string()
    };
    term.write_line(&header)?;

    let mut proposed = Vec::new();
    for segment in split_answer(text) {
        match segment {
            AnswerSegment::Prose(prose) => term.write_line(&prose)?,
            AnswerSegment::Command(command) => {
                let label = paint(term, "BASH:", Tone::Command);
                term.write_line(&label)?;
                for line in command.split('\n') {
                    let marked = paint(term, &format!("> {line}"), Tone::Command);
                    term.write_line(&marked)?;
                }
                proposed.push(command);
            }
        }
    }
    Ok(proposed)
}
