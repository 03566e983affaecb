use serde::Serialize;

/// Why a question was refused before anything was sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionError {
    #[error("Please provide a question to ask.")]
    Empty,
    #[error("Your question is too long. Please limit it to {limit} characters.")]
    TooLong { limit: usize },
}

/// Length is counted in characters, not bytes.
pub fn validate_question(question: &str, max_chars: usize) -> Result<(), QuestionError> {
    if question.trim().is_empty() {
        return Err(QuestionError::Empty);
    }
    if question.chars().count() > max_chars {
        return Err(QuestionError::TooLong { limit: max_chars });
    }
    Ok(())
}

/// Answer to the large-memory question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryChoice {
    KeepAll,
    KeepTail,
    Drop,
    Invalid,
}

impl MemoryChoice {
    /// `K`, `L` or `N` in either case.
    pub fn from_answer(answer: &str) -> Self {
        match answer
            .trim_end_matches(['\r', '\n'])
            .to_ascii_uppercase()
            .as_str()
        {
            "K" => Self::KeepAll,
            "L" => Self::KeepTail,
            "N" => Self::Drop,
            _ => Self::Invalid,
        }
    }

    /// The memory to keep. `KeepTail` keeps the last `tail_chars`
    /// characters of the raw text, cutting through blocks if needed.
    pub fn apply(self, memory: &str, tail_chars: usize) -> Option<String> {
        match self {
            Self::KeepAll => Some(memory.to_string()),
            Self::KeepTail => Some(last_chars(memory, tail_chars).to_string()),
            Self::Drop | Self::Invalid => None,
        }
    }
}

pub fn large_memory_question(tail_chars: usize) -> String {
    format!("Keep All(K) / Keep {tail_chars} last characters(L) / Dont keep any(N) ? ")
}

pub fn needs_memory_choice(memory: &str, threshold_chars: usize) -> bool {
    memory.chars().count() > threshold_chars
}

fn last_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    let skip = total - count;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

pub fn memory_context(memory: &str) -> String {
    format!("Here is some context from the current shell session:\n{memory}\n")
}

/// The question alone, or the question framed by whatever context exists.
/// `listing` is the already formatted directory block.
pub fn assemble_prompt(question: &str, memory: Option<&str>, listing: Option<&str>) -> String {
    let mem = memory.map(memory_context).unwrap_or_default();
    let list = listing.unwrap_or_default();
    if mem.is_empty() && list.is_empty() {
        return question.to_string();
    }
    format!(
        "{mem}\n{list}\nBased on this context, answer the following question concisely:\n{question}"
    )
}
