//! Bounded invocation of external automation tools.
//!
//! Every call is raced against a timeout and the child is killed if the
//! timeout wins. Output is classified into the two `AutomationError` kinds.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::AutomationError;

/// Script dialect accepted by `osascript -l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLanguage {
    AppleScript,
    JavaScript,
}

impl ScriptLanguage {
    fn as_arg(&self) -> &'static str {
        match self {
            ScriptLanguage::AppleScript => "AppleScript",
            ScriptLanguage::JavaScript => "JavaScript",
        }
    }
}

/// Run `osascript` with an inline script and return its trimmed stdout.
///
/// Compile errors count as `Unavailable` since the script never ran;
/// runtime errors and timeouts count as `Execution`.
pub async fn run_osascript(
    language: ScriptLanguage,
    source: &str,
    timeout: Duration,
) -> Result<String, AutomationError> {
    if !cfg!(target_os = "macos") {
        return Err(AutomationError::Unavailable(
            "osascript is only available on macOS".into(),
        ));
    }

    let output = run_command("osascript", &["-l", language.as_arg(), "-e", source], timeout).await?;
    match output {
        CommandOutput::Success(stdout) => Ok(stdout),
        CommandOutput::Failed { code, stderr } => Err(classify_failure(code, stderr)),
    }
}

/// Map a non-zero `osascript` exit to an error kind.
///
/// A compile error means the script never ran, so it is `Unavailable`.
/// Anything else happened while running and is `Execution`.
fn classify_failure(code: Option<i32>, stderr: String) -> AutomationError {
    if stderr.contains("syntax error") {
        AutomationError::Unavailable(stderr)
    } else if stderr.is_empty() {
        AutomationError::Execution(format!(
            "osascript exited with status {}",
            code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
        ))
    } else {
        AutomationError::Execution(stderr)
    }
}

/// Result of a command that was spawned and finished within its timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Success(String),
    Failed { code: Option<i32>, stderr: String },
}

/// Spawn `program` with `args` and wait for it, at most `timeout`.
pub async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, AutomationError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AutomationError::Unavailable(format!("Failed to spawn {}: {}", program, e)))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(AutomationError::Execution(format!(
                "Failed to wait for {}: {}",
                program, e
            )))
        }
        Err(_) => {
            tracing::debug!(program, timeout_ms = timeout.as_millis() as u64, "Command timed out");
            return Err(AutomationError::Execution(format!(
                "{} timed out after {}ms",
                program,
                timeout.as_millis()
            )));
        }
    };

    let stdout = strip_trailing_newline(&String::from_utf8_lossy(&output.stdout));
    if output.status.success() {
        Ok(CommandOutput::Success(stdout))
    } else {
        Ok(CommandOutput::Failed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Drop the single line terminator tools append, keeping any other whitespace.
fn strip_trailing_newline(s: &str) -> String {
    let s = s.strip_suffix('\n').unwrap_or(s);
    s.strip_suffix('\r').unwrap_or(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_trailing_newline() {
        assert_eq!(strip_trailing_newline("hello\n"), "hello");
        assert_eq!(strip_trailing_newline("hello\r\n"), "hello");
        assert_eq!(strip_trailing_newline("  spaced  \n"), "  spaced  ");
        assert_eq!(strip_trailing_newline("two\n\n"), "two\n");
        assert_eq!(strip_trailing_newline(""), "");
    }

    #[test]
    fn test_script_language_arg() {
        assert_eq!(ScriptLanguage::AppleScript.as_arg(), "AppleScript");
        assert_eq!(ScriptLanguage::JavaScript.as_arg(), "JavaScript");
    }

    #[test]
    fn test_classify_syntax_error_is_unavailable() {
        let stderr = "0:5: syntax error: Expected end of line but found identifier. (-2741)";
        assert_eq!(
            classify_failure(Some(1), stderr.to_string()),
            AutomationError::Unavailable(stderr.to_string())
        );
    }

    #[test]
    fn test_classify_runtime_error_is_execution() {
        let stderr = "execution error: VoiceOver got an error: Can't get last phrase. (-1728)";
        assert_eq!(
            classify_failure(Some(1), stderr.to_string()),
            AutomationError::Execution(stderr.to_string())
        );
    }

    #[test]
    fn test_classify_silent_failure_reports_exit_code() {
        assert_eq!(
            classify_failure(Some(7), String::new()),
            AutomationError::Execution("osascript exited with status 7".to_string())
        );
        assert_eq!(
            classify_failure(None, String::new()),
            AutomationError::Execution("osascript exited with status unknown".to_string())
        );
    }

    #[tokio::test]
    async fn test_run_command_missing_program_is_unavailable() {
        let result = run_command(
            "vobridge-definitely-not-a-real-program",
            &[],
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(AutomationError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_success_and_failure() {
        let ok = run_command("sh", &["-c", "echo hi"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(ok, CommandOutput::Success("hi".to_string()));

        let failed = run_command("sh", &["-c", "echo oops >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            failed,
            CommandOutput::Failed {
                code: Some(3),
                stderr: "oops".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_timeout_is_execution_error() {
        let result = run_command("sleep", &["5"], Duration::from_millis(50)).await;
        match result {
            Err(AutomationError::Execution(msg)) => assert!(msg.contains("timed out")),
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn test_osascript_unavailable_off_macos() {
        let result = run_osascript(ScriptLanguage::AppleScript, "return 1", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AutomationError::Unavailable(_))));
    }
}
