use anyhow::{Result, anyhow};
use std::path::Path;
use std::process::{Command, Stdio};

/// Output of `pwd` and `ls -l -a` for the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    pub pwd: String,
    pub files: String,
}

impl DirectoryListing {
    pub fn to_prompt(&self) -> String {
        format!(
            "The current directory is:\n{}\nThe files in that directory are:\n{}\n",
            self.pwd, self.files
        )
    }
}

/// Run `ls -l -a` and `pwd` in `cwd` as argument vectors. Either one failing
/// fails the whole listing.
pub fn directory_listing(cwd: &Path) -> Result<DirectoryListing> {
    let files = run_checked(cwd, "ls", &["-l", "-a"])?;
    let pwd = run_checked(cwd, "pwd", &[])?;
    Ok(DirectoryListing { pwd, files })
}

fn run_checked(cwd: &Path, program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|err| anyhow!("failed to run {program}: {err}"))?;
    if !output.status.success() {
        return Err(anyhow!(
            "{program} exited with {}: {}",
            output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string()),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
