//! Scripted stand-ins for the model, the terminal, and the shell, shared by
//! integration tests across the workspace.

use anyhow::{Result, anyhow};
use daft_core::{ChatMessage, ChatRequest, LlmResponse, LlmToolCall};
use daft_llm::LlmClient;
use daft_tools::{ShellRunResult, ShellRunner, ToolHost, ToolInvocation, ToolOutcome};
use daft_ui::Terminal;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned responses in order and records every request.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<LlmResponse, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// `Err(message)` entries fail that call with `message`.
    pub fn with_results(results: Vec<Result<LlmResponse, String>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(results)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Messages of the most recent request.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.requests()
            .last()
            .map(|req| req.messages.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|queue| queue.len()).unwrap_or(0)
    }
}

impl LlmClient for ScriptedLlm {
    fn complete_chat(&self, req: &ChatRequest) -> Result<LlmResponse> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("scripted llm poisoned"))?
            .push(req.clone());
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow!("scripted llm poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow!("scripted llm exhausted"))?;
        next.map_err(|message| anyhow!(message))
    }
}

pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> LlmToolCall {
    LlmToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

pub fn tool_response(calls: Vec<LlmToolCall>) -> LlmResponse {
    LlmResponse::tool_calls(calls)
}

pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse::text(text)
}

/// Feeds scripted answers to prompts and captures every printed line.
/// Runs out of answers the way stdin hits end of input.
#[derive(Debug, Default)]
pub struct ScriptedTerminal {
    answers: VecDeque<String>,
    output: Vec<String>,
}

impl ScriptedTerminal {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|answer| format!("{answer}\n")).collect(),
            output: Vec::new(),
        }
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn transcript(&self) -> String {
        self.output.join("\n")
    }

    pub fn unanswered(&self) -> usize {
        self.answers.len()
    }
}

impl Terminal for ScriptedTerminal {
    fn write_line(&mut self, line: &str) -> Result<()> {
        self.output.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.answers.pop_front())
    }
}

/// Records invocations and answers each with a fixed outcome.
pub struct RecordingToolHost {
    outcome: ToolOutcome,
    invocations: Mutex<Vec<ToolInvocation>>,
}

impl RecordingToolHost {
    pub fn new(outcome: ToolOutcome) -> Self {
        Self {
            outcome,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations
            .lock()
            .map(|invocations| invocations.clone())
            .unwrap_or_default()
    }
}

impl ToolHost for RecordingToolHost {
    fn invoke(&self, invocation: &ToolInvocation) -> ToolOutcome {
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(invocation.clone());
        }
        self.outcome.clone()
    }
}

/// Shell runner that never spawns anything.
#[derive(Default)]
pub struct RecordingRunner {
    attached: Mutex<Vec<String>>,
    fail_attached: bool,
}

impl RecordingRunner {
    /// Every `run_attached` call fails as if the interpreter were missing.
    pub fn failing() -> Self {
        Self {
            fail_attached: true,
            ..Self::default()
        }
    }

    pub fn attached(&self) -> Vec<String> {
        self.attached
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

impl ShellRunner for RecordingRunner {
    fn capture(&self, cmd: &str) -> Result<ShellRunResult> {
        Ok(ShellRunResult {
            status: Some(0),
            stdout: format!("ran {cmd}\n"),
        })
    }

    fn run_attached(&self, cmd: &str) -> Result<Option<i32>> {
        self.attached
            .lock()
            .map_err(|_| anyhow!("recording runner poisoned"))?
            .push(cmd.to_string());
        if self.fail_attached {
            return Err(anyhow!("failed to spawn command '{cmd}': sh: not found"));
        }
        Ok(Some(0))
    }
}
