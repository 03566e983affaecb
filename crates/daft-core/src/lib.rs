use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type Result<T> = anyhow::Result<T>;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_HISTORY_FILE_ENV: &str = "DAFT_HISTORY_FILE";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are DAFT, an integrated assistant for a Bash shell. \
Your goal is to be helpful, accurate, and concise. \
When you suggest a shell command, write it between ```bash ... ```. \
Keep answers as short as possible, but **accuracy is more important than brevity**. \
Avoid unnecessary explanations. \
You can use the 'read_file' tool to get more context if the user's file list or memory is not enough. \
You can use the 'exec_command' tool to run shell commands and get their output.";

/// Substrings that mark a shell command as destructive.
pub const DEFAULT_DANGEROUS_KEYWORDS: &[&str] =
    &["rm ", "mv ", "dd ", "> /dev", "mkfs", ":(){ :|:& };:"];

/// Per-user state directory (`~/.daft`).
pub fn state_dir() -> Option<PathBuf> {
    let home = std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())?;
    Some(Path::new(&home).join(".daft"))
}

/// Expand a leading `~` against `$HOME`.
pub fn resolve_home_path(raw: &str) -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        if raw == "~" {
            return PathBuf::from(home);
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(raw)
}

/// The closed set of tools the model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ReadFile,
    ExecCommand,
}

impl ToolKind {
    pub const ALL: &'static [ToolKind] = &[ToolKind::ReadFile, ToolKind::ExecCommand];

    /// Parse the function name used on the wire. Unknown names yield `None`.
    #[must_use]
    pub fn from_api_name(name: &str) -> Option<Self> {
        match name {
            "read_file" => Some(Self::ReadFile),
            "exec_command" => Some(Self::ExecCommand),
            _ => None,
        }
    }

    pub fn as_api_name(&self) -> &'static str {
        match self {
            Self::ReadFile => "read_file",
            Self::ExecCommand => "exec_command",
        }
    }

    /// Name of the single string argument the tool takes.
    pub fn argument_name(&self) -> &'static str {
        match self {
            Self::ReadFile => "filename",
            Self::ExecCommand => "command",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One part of a model candidate, in the order the agent inspects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePart {
    Text { text: String },
    ToolCall { call: LlmToolCall },
    /// A candidate that carried neither text nor tool calls.
    Unrecognized { finish_reason: String },
}

fn default_finish_reason() -> String {
    "stop".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Empty when the provider returned no candidate at all.
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: String,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ResponsePart::Text { text: text.into() }],
            finish_reason: default_finish_reason(),
        }
    }

    pub fn tool_calls(calls: Vec<LlmToolCall>) -> Self {
        Self {
            parts: calls
                .into_iter()
                .map(|call| ResponsePart::ToolCall { call })
                .collect(),
            finish_reason: "tool_calls".to_string(),
        }
    }

    pub fn has_candidate(&self) -> bool {
        !self.parts.is_empty()
    }

    pub fn first_part(&self) -> Option<&ResponsePart> {
        self.parts.first()
    }

    /// Text parts of the candidate joined together, if there are any.
    pub fn text_content(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|part| match part {
                ResponsePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    /// All tool calls of the candidate, in order.
    pub fn requested_tool_calls(&self) -> Vec<&LlmToolCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ResponsePart::ToolCall { call } => Some(call),
                _ => None,
            })
            .collect()
    }
}

/// A message in the chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum ChatMessage {
    #[serde(rename = "system")]
    System { content: String },
    #[serde(rename = "user")]
    User { content: String },
    #[serde(rename = "assistant")]
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        tool_calls: Vec<LlmToolCall>,
    },
    #[serde(rename = "tool")]
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// A tool (function) definition sent to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Controls how the model picks tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// "none", "auto", or "required"
    Mode(String),
}

impl ToolChoice {
    pub fn auto() -> Self {
        Self::Mode("auto".to_string())
    }
}

/// Request for the chat-with-tools API.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub seq_no: u64,
    pub at: DateTime<Utc>,
    pub session_id: Uuid,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventKind {
    SessionStartedV1 {
        model: String,
    },
    ModelTurnV1 {
        turn: usize,
        finish_reason: String,
        parts: usize,
    },
    ToolProposedV1 {
        tool: ToolKind,
        argument: String,
        dangerous: bool,
    },
    ToolApprovedV1 {
        tool: ToolKind,
    },
    ToolDeniedV1 {
        tool: ToolKind,
    },
    ToolResultV1 {
        tool: ToolKind,
        success: bool,
    },
    AnswerRenderedV1 {
        proposed_commands: usize,
    },
    CommandExecutedV1 {
        command: String,
        exit_code: Option<i32>,
    },
    CommandSkippedV1 {
        command: String,
    },
    CommandFailedV1 {
        command: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub history: HistoryConfig,
    pub agent: AgentConfig,
    pub policy: PolicyConfig,
    pub observe: ObserveConfig,
}

impl AppConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        state_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load defaults, then `~/.daft/settings.json`, then `extra` (if any),
    /// then environment overrides.
    pub fn load(extra: Option<&Path>) -> Result<Self> {
        let mut paths = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            paths.push(user);
        }
        if let Some(extra) = extra {
            if !extra.exists() {
                return Err(anyhow::anyhow!(
                    "settings file not found: {}",
                    extra.display()
                ));
            }
            paths.push(extra.to_path_buf());
        }
        let mut cfg = Self::load_layers(&paths)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Merge the JSON settings files in order over the defaults. Missing files
    /// are skipped.
    pub fn load_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;
        for path in paths {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw).map_err(|err| {
                anyhow::anyhow!("invalid configuration in {}: {err}", path.display())
            })?;
            merge_json_value(&mut merged, &value);
        }
        Ok(serde_json::from_value(merged)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(model) = non_empty_env("DAFT_MODEL") {
            self.llm.model = model;
        }
        if let Some(endpoint) = non_empty_env("DAFT_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub max_retries: u8,
    pub retry_base_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: None,
            max_tokens: 8192,
            timeout_seconds: 120,
            max_retries: 3,
            retry_base_ms: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Environment variable holding the transcript path.
    pub file_env: String,
    /// Memory larger than this (in characters) triggers the keep/trim prompt.
    pub large_memory_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file_env: DEFAULT_HISTORY_FILE_ENV.to_string(),
            large_memory_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub max_question_chars: usize,
    pub max_turns: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_question_chars: 150,
            max_turns: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub dangerous_keywords: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dangerous_keywords: DEFAULT_DANGEROUS_KEYWORDS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveConfig {
    pub log_file: String,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            log_file: "~/.daft/observe.log".to_string(),
        }
    }
}
