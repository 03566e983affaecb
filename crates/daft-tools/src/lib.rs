mod listing;
mod shell;

use anyhow::{Result, anyhow};
use daft_core::{FunctionDefinition, ToolDefinition, ToolKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::sync::Arc;

pub use listing::{DirectoryListing, directory_listing};
pub use shell::{PlatformShellRunner, ShellRunResult, ShellRunner};

/// Result of a tool handler. Failures are data sent back to the model,
/// never errors raised to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Output(String),
    Error(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Output(_))
    }

    /// `{"output": ...}` or `{"error": ...}`.
    pub fn to_payload(&self) -> serde_json::Value {
        match self {
            Self::Output(text) => json!({ "output": text }),
            Self::Error(text) => json!({ "error": text }),
        }
    }
}

/// Full contents of `filename`, relative to the process working directory.
pub fn read_file(filename: &str) -> ToolOutcome {
    match fs::read_to_string(filename) {
        Ok(contents) => ToolOutcome::Output(contents),
        Err(err) => ToolOutcome::Error(format!("Error reading file: {err}")),
    }
}

/// Standard output of `command`. The exit status is ignored.
pub fn exec_command(runner: &dyn ShellRunner, command: &str) -> ToolOutcome {
    match runner.capture(command) {
        Ok(result) => ToolOutcome::Output(result.stdout),
        Err(err) => ToolOutcome::Error(format!("Error executing command: {err}")),
    }
}

/// A tool call with its argument already extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    ReadFile { filename: String },
    ExecCommand { command: String },
}

impl ToolInvocation {
    /// Parse the JSON argument object sent by the model for `kind`.
    pub fn parse(kind: ToolKind, raw_arguments: &str) -> Result<Self> {
        let raw = if raw_arguments.trim().is_empty() {
            "{}"
        } else {
            raw_arguments
        };
        let args: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| anyhow!("arguments for {} are not valid JSON: {err}", kind.as_api_name()))?;
        let field = kind.argument_name();
        let value = args
            .get(field)
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                anyhow!(
                    "{} requires a string argument '{field}'",
                    kind.as_api_name()
                )
            })?
            .to_string();
        Ok(match kind {
            ToolKind::ReadFile => Self::ReadFile { filename: value },
            ToolKind::ExecCommand => Self::ExecCommand { command: value },
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::ReadFile { .. } => ToolKind::ReadFile,
            Self::ExecCommand { .. } => ToolKind::ExecCommand,
        }
    }

    /// The filename or command string.
    pub fn argument(&self) -> &str {
        match self {
            Self::ReadFile { filename } => filename,
            Self::ExecCommand { command } => command,
        }
    }
}

/// Executes approved tool invocations.
pub trait ToolHost {
    fn invoke(&self, invocation: &ToolInvocation) -> ToolOutcome;
}

pub struct LocalToolHost {
    runner: Arc<dyn ShellRunner + Send + Sync>,
}

impl LocalToolHost {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(PlatformShellRunner))
    }

    pub fn with_runner(runner: Arc<dyn ShellRunner + Send + Sync>) -> Self {
        Self { runner }
    }
}

impl Default for LocalToolHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolHost for LocalToolHost {
    fn invoke(&self, invocation: &ToolInvocation) -> ToolOutcome {
        match invocation {
            ToolInvocation::ReadFile { filename } => read_file(filename),
            ToolInvocation::ExecCommand { command } => exec_command(self.runner.as_ref(), command),
        }
    }
}

/// Function declarations for both tools, in `ToolKind::ALL` order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.iter().map(|kind| tool_definition(*kind)).collect()
}

fn tool_definition(kind: ToolKind) -> ToolDefinition {
    let (description, argument_description) = match kind {
        ToolKind::ReadFile => (
            "Read the contents of a specific file to get more context.",
            "Path of the file to read, relative to the current directory.",
        ),
        ToolKind::ExecCommand => (
            "Execute a shell command and return the output.",
            "The shell command to run.",
        ),
    };
    let field = kind.argument_name();
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: kind.as_api_name().to_string(),
            description: description.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    field: {
                        "type": "string",
                        "description": argument_description,
                    }
                },
                "required": [field],
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        commands: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ShellRunner for RecordingRunner {
        fn capture(&self, cmd: &str) -> Result<ShellRunResult> {
            self.commands
                .lock()
                .expect("commands")
                .push(cmd.to_string());
            if self.fail {
                return Err(anyhow!("no interpreter available"));
            }
            Ok(ShellRunResult {
                status: Some(1),
                stdout: "captured\n".to_string(),
            })
        }

        fn run_attached(&self, _cmd: &str) -> Result<Option<i32>> {
            Ok(Some(0))
        }
    }

    #[test]
    fn read_file_returns_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        fs::write(&path, "line one\nline two\n").expect("seed");
        let outcome = read_file(path.to_str().expect("utf8 path"));
        assert_eq!(outcome, ToolOutcome::Output("line one\nline two\n".to_string()));
        assert_eq!(outcome.to_payload(), json!({"output": "line one\nline two\n"}));
    }

    #[test]
    fn read_file_failure_is_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = read_file(dir.path().join("absent.txt").to_str().expect("utf8 path"));
        let ToolOutcome::Error(message) = &outcome else {
            panic!("expected error outcome, got {outcome:?}");
        };
        assert!(message.starts_with("Error reading file: "));
        assert!(outcome.to_payload().get("error").is_some());
    }

    #[test]
    fn exec_command_keeps_stdout_of_failing_command() {
        let runner = RecordingRunner::default();
        let outcome = exec_command(&runner, "false; echo captured");
        assert_eq!(outcome, ToolOutcome::Output("captured\n".to_string()));
    }

    #[test]
    fn exec_command_spawn_failure_is_data() {
        let runner = RecordingRunner {
            fail: true,
            ..RecordingRunner::default()
        };
        let outcome = exec_command(&runner, "ls");
        assert_eq!(
            outcome,
            ToolOutcome::Error("Error executing command: no interpreter available".to_string())
        );
    }

    #[test]
    fn host_routes_invocations_to_handlers() {
        let runner = Arc::new(RecordingRunner::default());
        let host = LocalToolHost::with_runner(runner.clone());
        let outcome = host.invoke(&ToolInvocation::ExecCommand {
            command: "uname -a".to_string(),
        });
        assert!(outcome.is_success());
        assert_eq!(
            runner.commands.lock().expect("commands").as_slice(),
            ["uname -a".to_string()]
        );
    }

    #[test]
    fn parses_arguments_for_each_tool() {
        let read = ToolInvocation::parse(ToolKind::ReadFile, r#"{"filename":"Cargo.toml"}"#)
            .expect("read args");
        assert_eq!(read.kind(), ToolKind::ReadFile);
        assert_eq!(read.argument(), "Cargo.toml");

        let exec = ToolInvocation::parse(ToolKind::ExecCommand, r#"{"command":"ls -la"}"#)
            .expect("exec args");
        assert_eq!(
            exec,
            ToolInvocation::ExecCommand {
                command: "ls -la".to_string()
            }
        );
    }

    #[test]
    fn rejects_missing_or_malformed_arguments() {
        let err = ToolInvocation::parse(ToolKind::ReadFile, "{}").expect_err("missing");
        assert!(err.to_string().contains("'filename'"));
        let err = ToolInvocation::parse(ToolKind::ExecCommand, r#"{"command": 7}"#)
            .expect_err("wrong type");
        assert!(err.to_string().contains("'command'"));
        assert!(ToolInvocation::parse(ToolKind::ExecCommand, "{not json").is_err());
        assert!(ToolInvocation::parse(ToolKind::ExecCommand, "").is_err());
    }

    #[test]
    fn declares_both_tools_as_functions() {
        let defs = tool_definitions();
        let names: Vec<_> = defs.iter().map(|def| def.function.name.as_str()).collect();
        assert_eq!(names, ["read_file", "exec_command"]);
        assert!(defs.iter().all(|def| def.tool_type == "function"));
        assert_eq!(defs[0].function.parameters["required"], json!(["filename"]));
        assert_eq!(
            defs[1].function.parameters["properties"]["command"]["type"],
            json!("string")
        );
    }
}
