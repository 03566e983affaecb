use anyhow::Result;
use daft_core::EventKind;
use daft_tools::ShellRunner;
use daft_ui::{Terminal, confirm};
use serde::Serialize;

use crate::agent_loop::EventCallback;

const SEPARATOR: &str = "-----------------------------------------------------";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandStatus {
    Executed { exit_code: Option<i32> },
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    pub command: String,
    #[serde(flatten)]
    pub status: CommandStatus,
}

/// Offers each proposed command in order and runs the approved ones in the
/// user's terminal.
pub struct CommandExecutor<'a> {
    runner: &'a dyn ShellRunner,
    event_cb: Option<EventCallback>,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(runner: &'a dyn ShellRunner) -> Self {
        Self {
            runner,
            event_cb: None,
        }
    }

    pub fn set_event_callback(&mut self, cb: EventCallback) {
        self.event_cb = Some(cb);
    }

    /// A command that fails to start is reported and the rest still run.
    pub fn run(&self, term: &mut dyn Terminal, commands: &[String]) -> Result<Vec<CommandReport>> {
        let mut reports = Vec::with_capacity(commands.len());
        for command in commands {
            term.write_line(SEPARATOR)?;
            term.write_line(&format!("DAFT proposed this command: {command}"))?;
            let status = if confirm(term, "do you want to execute it [Y/n] :")?.is_approved() {
                match self.runner.run_attached(command) {
                    Ok(exit_code) => {
                        self.emit(EventKind::CommandExecutedV1 {
                            command: command.clone(),
                            exit_code,
                        });
                        CommandStatus::Executed { exit_code }
                    }
                    Err(err) => {
                        let error = format!("{err:#}");
                        term.write_line(&format!("DAFT: Failed to run command: {error}"))?;
                        self.emit(EventKind::CommandFailedV1 {
                            command: command.clone(),
                            error: error.clone(),
                        });
                        CommandStatus::Failed { error }
                    }
                }
            } else {
                term.write_line("Skipping...")?;
                self.emit(EventKind::CommandSkippedV1 {
                    command: command.clone(),
                });
                CommandStatus::Skipped
            };
            reports.push(CommandReport {
                command: command.clone(),
                status,
            });
        }
        Ok(reports)
    }

    fn emit(&self, kind: EventKind) {
        if let Some(cb) = &self.event_cb {
            cb(kind);
        }
    }
}
