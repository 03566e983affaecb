//! Confirmation-gated conversation with the model.
//!
//! Each `run` opens a fresh chat session, sends the prompt, and keeps
//! answering tool calls until the model replies with text. Nothing the model
//! asks for runs without an explicit `Y` at the terminal.

use daft_core::{AppConfig, ChatMessage, ChatRequest, EventKind, ResponsePart, ToolChoice, ToolKind};
use daft_llm::LlmClient;
use daft_policy::PolicyEngine;
use daft_tools::{ToolHost, ToolInvocation, tool_definitions};
use daft_ui::{Terminal, Tone, confirm, notice_prefix, paint, render_answer};
use std::sync::Arc;

/// Sent as the tool response when the user refuses a tool call.
pub const DENIAL_MESSAGE: &str = "User denied permission.";

pub type EventCallback = Arc<dyn Fn(EventKind) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("AI request failed: {0:#}")]
    Model(anyhow::Error),
    #[error("unknown tool requested by the model: {name}")]
    UnknownTool { name: String },
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("AI returned an unexpected response type")]
    UnexpectedResponse,
    #[error("turn limit of {max_turns} model calls reached without a final answer")]
    TurnLimit { max_turns: usize },
    #[error("terminal I/O failed: {0:#}")]
    Terminal(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model answered in text; these are the fenced commands it proposed.
    Answered { proposed: Vec<String>, turns: usize },
    /// The provider returned no candidate.
    NoResponse,
}

impl AgentOutcome {
    pub fn proposed(&self) -> &[String] {
        match self {
            Self::Answered { proposed, .. } => proposed,
            Self::NoResponse => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub max_turns: usize,
}

impl AgentLoopConfig {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            model: cfg.llm.model.clone(),
            system_prompt: cfg.agent.system_prompt.clone(),
            max_tokens: cfg.llm.max_tokens,
            temperature: cfg.llm.temperature,
            max_turns: cfg.agent.max_turns,
        }
    }
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct AgentLoop<'a> {
    llm: &'a (dyn LlmClient + Send + Sync),
    tool_host: Arc<dyn ToolHost + Send + Sync>,
    policy: PolicyEngine,
    config: AgentLoopConfig,
    event_cb: Option<EventCallback>,
}

impl<'a> AgentLoop<'a> {
    pub fn new(
        llm: &'a (dyn LlmClient + Send + Sync),
        tool_host: Arc<dyn ToolHost + Send + Sync>,
        policy: PolicyEngine,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            llm,
            tool_host,
            policy,
            config,
            event_cb: None,
        }
    }

    /// Set the event callback for logging model turns and tool decisions.
    pub fn set_event_callback(&mut self, cb: EventCallback) {
        self.event_cb = Some(cb);
    }

    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    /// Run one chat session for `prompt`.
    pub fn run(&self, term: &mut dyn Terminal, prompt: &str) -> Result<AgentOutcome, AgentError> {
        let mut messages = vec![
            ChatMessage::System {
                content: self.config.system_prompt.clone(),
            },
            ChatMessage::User {
                content: prompt.to_string(),
            },
        ];
        let tools = tool_definitions();

        for turn in 1..=self.config.max_turns {
            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                tool_choice: ToolChoice::auto(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };
            let response = self
                .llm
                .complete_chat(&request)
                .map_err(AgentError::Model)?;
            self.emit(EventKind::ModelTurnV1 {
                turn,
                finish_reason: response.finish_reason.clone(),
                parts: response.parts.len(),
            });

            match response.first_part() {
                None => {
                    term.write_line("DAFT: No response from AI.")
                        .map_err(AgentError::Terminal)?;
                    return Ok(AgentOutcome::NoResponse);
                }
                Some(ResponsePart::Text { text }) => {
                    let proposed = render_answer(term, text).map_err(AgentError::Terminal)?;
                    self.emit(EventKind::AnswerRenderedV1 {
                        proposed_commands: proposed.len(),
                    });
                    return Ok(AgentOutcome::Answered { proposed, turns: turn });
                }
                Some(ResponsePart::Unrecognized { .. }) => {
                    return Err(AgentError::UnexpectedResponse);
                }
                Some(ResponsePart::ToolCall { .. }) => {
                    let calls: Vec<_> = response.requested_tool_calls().into_iter().cloned().collect();
                    // Validate the whole batch before asking about any of it.
                    let invocations = calls
                        .iter()
                        .map(|call| {
                            let kind = ToolKind::from_api_name(&call.name).ok_or_else(|| {
                                AgentError::UnknownTool {
                                    name: call.name.clone(),
                                }
                            })?;
                            ToolInvocation::parse(kind, &call.arguments).map_err(|err| {
                                AgentError::InvalidArguments {
                                    tool: call.name.clone(),
                                    reason: err.to_string(),
                                }
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;

                    messages.push(ChatMessage::Assistant {
                        content: response.text_content(),
                        tool_calls: calls.clone(),
                    });
                    for (call, invocation) in calls.iter().zip(&invocations) {
                        let content = self.answer_tool_call(term, invocation)?;
                        messages.push(ChatMessage::Tool {
                            tool_call_id: call.id.clone(),
                            content,
                        });
                    }
                }
            }
        }

        Err(AgentError::TurnLimit {
            max_turns: self.config.max_turns,
        })
    }

    /// Ask the user about one tool call and produce the tool message body.
    fn answer_tool_call(
        &self,
        term: &mut dyn Terminal,
        invocation: &ToolInvocation,
    ) -> Result<String, AgentError> {
        let tool = invocation.kind();
        let argument = invocation.argument();
        let dangerous = tool == ToolKind::ExecCommand && self.policy.is_dangerous(argument);
        self.emit(EventKind::ToolProposedV1 {
            tool,
            argument: argument.to_string(),
            dangerous,
        });

        let prefix = notice_prefix(term);
        let shown = paint(term, argument, Tone::Strong);
        let question = match tool {
            ToolKind::ReadFile => format!("{prefix} Asked to read {shown}. Allow? [Y/n]"),
            ToolKind::ExecCommand => {
                if dangerous {
                    let warning = paint(term, "WARNING: DANGEROUS COMMAND DETECTED", Tone::Alert);
                    term.write_line(&warning).map_err(AgentError::Terminal)?;
                }
                term.write_line(&format!("{prefix} Wants to run: {shown}"))
                    .map_err(AgentError::Terminal)?;
                format!("{prefix} Asked to execute {shown}. Allow? [Y/n]")
            }
        };

        let approval = confirm(term, &question).map_err(AgentError::Terminal)?;
        if !approval.is_approved() {
            self.emit(EventKind::ToolDeniedV1 { tool });
            return Ok(DENIAL_MESSAGE.to_string());
        }

        self.emit(EventKind::ToolApprovedV1 { tool });
        let outcome = self.tool_host.invoke(invocation);
        self.emit(EventKind::ToolResultV1 {
            tool,
            success: outcome.is_success(),
        });
        Ok(outcome.to_payload().to_string())
    }

    fn emit(&self, kind: EventKind) {
        if let Some(cb) = &self.event_cb {
            cb(kind);
        }
    }
}
