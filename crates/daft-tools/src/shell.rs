use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellRunResult {
    pub status: Option<i32>,
    pub stdout: String,
}

/// Runs command strings through the platform command interpreter.
pub trait ShellRunner {
    /// Run `cmd` and capture its standard output. Standard error is
    /// discarded and a non-zero exit status is not an error.
    fn capture(&self, cmd: &str) -> Result<ShellRunResult>;

    /// Run `cmd` attached to the current terminal and wait for it.
    fn run_attached(&self, cmd: &str) -> Result<Option<i32>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformShellRunner;

impl ShellRunner for PlatformShellRunner {
    fn capture(&self, cmd: &str) -> Result<ShellRunResult> {
        let output = spawn_first(cmd, |command| {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null());
            command.output()
        })?;
        Ok(ShellRunResult {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        })
    }

    fn run_attached(&self, cmd: &str) -> Result<Option<i32>> {
        let status = spawn_first(cmd, |command| command.status())?;
        Ok(status.code())
    }
}

/// Try each interpreter in turn; the first one that spawns wins.
fn spawn_first<T>(
    cmd: &str,
    mut run: impl FnMut(&mut Command) -> std::io::Result<T>,
) -> Result<T> {
    let mut errors = Vec::new();
    for mut command in candidate_commands(cmd) {
        let program = command.get_program().to_string_lossy().to_string();
        match run(&mut command) {
            Ok(value) => return Ok(value),
            Err(err) => errors.push(format!("{program}: {err}")),
        }
    }
    Err(anyhow!(
        "failed to spawn command '{cmd}': {}",
        errors.join(" | ")
    ))
}

#[cfg(target_os = "windows")]
fn candidate_commands(cmd: &str) -> Vec<Command> {
    let mut cmd_shell = Command::new("cmd");
    cmd_shell.arg("/C").arg(cmd);

    let mut ps_shell = Command::new("powershell");
    ps_shell
        .arg("-NoLogo")
        .arg("-NoProfile")
        .arg("-Command")
        .arg(cmd);

    vec![cmd_shell, ps_shell]
}

#[cfg(not(target_os = "windows"))]
fn candidate_commands(cmd: &str) -> Vec<Command> {
    let mut sh_shell = Command::new("sh");
    sh_shell.arg("-c").arg(cmd);

    let mut bash_shell = Command::new("bash");
    bash_shell.arg("-c").arg(cmd);

    vec![sh_shell, bash_shell]
}
