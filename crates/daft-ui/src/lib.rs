mod render;

use anyhow::Result;
use crossterm::style::{StyledContent, Stylize};
use daft_policy::Approval;
use std::io::{self, BufRead, IsTerminal, Write};

pub use render::{AnswerSegment, render_answer, split_answer};

/// Line-oriented interactive surface. Everything the assistant prints or
/// asks goes through here so tests can script it.
pub trait Terminal {
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read one line. `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Whether ANSI styling should be emitted.
    fn styled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StdioTerminal {
    styled: bool,
}

impl StdioTerminal {
    /// Styling is on when stdout is a terminal and `NO_COLOR` is unset.
    pub fn new() -> Self {
        let styled = io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self { styled }
    }
}

impl Default for StdioTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for StdioTerminal {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut input = String::new();
        let read = io::stdin().lock().read_line(&mut input)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(input))
    }

    fn styled(&self) -> bool {
        self.styled
    }
}

/// Colors used for the assistant's own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Answer header and danger warnings.
    Alert,
    /// Tool permission prompts.
    Notice,
    /// Proposed commands.
    Command,
    /// Bold without color.
    Strong,
}

pub fn paint(term: &dyn Terminal, text: &str, tone: Tone) -> String {
    if !term.styled() {
        return text.to_string();
    }
    let styled: StyledContent<&str> = match tone {
        Tone::Alert => text.red().bold(),
        Tone::Notice => text.yellow().bold(),
        Tone::Command => text.cyan().bold(),
        Tone::Strong => text.bold(),
    };
    styled.to_string()
}

/// The `DAFT:` prefix used on tool permission lines.
pub fn notice_prefix(term: &dyn Terminal) -> String {
    paint(term, "DAFT:", Tone::Notice)
}

/// Print `question` and read one answer. Only `Y`/`y` approves; empty
/// input and end of input deny.
pub fn confirm(term: &mut dyn Terminal, question: &str) -> Result<Approval> {
    term.write_line(question)?;
    Ok(match term.read_line()? {
        Some(answer) => Approval::from_answer(&answer),
        None => Approval::Denied,
    })
}

/// Print `question` and return the raw answer with its line ending removed.
/// End of input reads as an empty answer.
pub fn ask_line(term: &mut dyn Terminal, question: &str) -> Result<String> {
    term.write_line(question)?;
    Ok(term
        .read_line()?
        .map(|answer| answer.trim_end_matches(['\r', '\n']).to_string())
        .unwrap_or_default())
}
