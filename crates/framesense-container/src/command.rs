//! Foreground subprocess execution with captured output.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::{Error, Result};

/// Output captured from a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Runs finished argument vectors and turns non-zero exits into
/// [`Error::CommandFailed`].
///
/// With `debug` set every command line is logged at info level, otherwise at
/// debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRunner {
    debug: bool,
}

impl CommandRunner {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Log a command line the way every engine call is logged.
    pub fn trace(&self, program: &Path, args: &[String]) {
        let line = format_command(program, args);
        if self.debug {
            tracing::info!("$ {line}");
        } else {
            tracing::debug!("$ {line}");
        }
    }

    /// Run `program` with `args` to completion.
    ///
    /// # Errors
    ///
    /// - [`Error::Spawn`] if the program cannot be started.
    /// - [`Error::CommandFailed`] on a non-zero exit; carries the full stderr.
    pub async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        let output = self.output(program, args).await?;

        if !output.status.success() {
            return Err(Error::command_failed(
                format_command(program, args),
                output.status.code(),
                output.stderr,
            ));
        }

        if !output.stdout.trim().is_empty() {
            tracing::trace!("stdout: {}", output.stdout.trim_end());
        }
        Ok(output)
    }

    /// Run `program` and report only whether it exited successfully.
    pub async fn succeeds(&self, program: &Path, args: &[String]) -> bool {
        match self.output(program, args).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                tracing::debug!("{e}");
                false
            }
        }
    }

    /// Run `program` and return its output whatever the exit status.
    pub async fn output(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        self.trace(program, args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::spawn(program.display().to_string(), e))?;

        Ok(CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Render a command line for logs and error messages, quoting arguments that
/// contain whitespace.
pub fn format_command(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '\'') {
            line.push('\'');
            line.push_str(&arg.replace('\'', r"'\''"));
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::path::PathBuf;

    #[test]
    fn test_format_command_quotes() {
        let args = vec![
            "run".to_string(),
            "a b".to_string(),
            String::new(),
            "it's".to_string(),
        ];
        assert_eq!(
            format_command(Path::new("docker"), &args),
            r"docker run 'a b' '' 'it'\''s'"
        );
    }

    #[tokio::test]
    async fn test_run_nonexistent_program() {
        let result = CommandRunner::default()
            .run(&PathBuf::from("nonexistent_tool_xyz_12345"), &[])
            .await;
        assert_matches!(result, Err(Error::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stderr_on_failure() {
        let args = vec!["-c".to_string(), "echo oops >&2; exit 3".to_string()];
        let err = CommandRunner::new(true)
            .run(Path::new("sh"), &args)
            .await
            .unwrap_err();

        assert_matches!(err, Error::CommandFailed { code: Some(3), ref stderr, .. } if stderr.trim() == "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_succeeds() {
        let runner = CommandRunner::default();
        assert!(runner.succeeds(Path::new("sh"), &["-c".into(), "exit 0".into()]).await);
        assert!(!runner.succeeds(Path::new("sh"), &["-c".into(), "exit 1".into()]).await);
    }
}
