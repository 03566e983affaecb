use daft_core::PolicyConfig;
use serde::{Deserialize, Serialize};

/// The user's answer at a `[Y/n]` gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    Approved,
    Denied,
}

impl Approval {
    /// Only `Y` (either case) approves. Empty input, EOF and anything else
    /// deny.
    pub fn from_answer(answer: &str) -> Self {
        let answer = answer.trim_end_matches(['\r', '\n']);
        if answer.eq_ignore_ascii_case("y") {
            Self::Approved
        } else {
            Self::Denied
        }
    }

    pub fn is_approved(self) -> bool {
        self == Self::Approved
    }
}

/// Flags shell commands containing any of the configured destructive
/// substrings. Literal substring matching only.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    dangerous_keywords: Vec<String>,
}

impl PolicyEngine {
    pub fn new(cfg: &PolicyConfig) -> Self {
        // An empty keyword would match every command.
        let dangerous_keywords = cfg
            .dangerous_keywords
            .iter()
            .filter(|keyword| !keyword.is_empty())
            .cloned()
            .collect();
        Self { dangerous_keywords }
    }

    /// The first configured keyword found in `command`.
    pub fn dangerous_match(&self, command: &str) -> Option<&str> {
        self.dangerous_keywords
            .iter()
            .find(|keyword| command.contains(keyword.as_str()))
            .map(String::as_str)
    }

    pub fn is_dangerous(&self, command: &str) -> bool {
        self.dangerous_match(command).is_some()
    }

    pub fn keywords(&self) -> &[String] {
        &self.dangerous_keywords
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(&PolicyConfig::default())
    }
}
