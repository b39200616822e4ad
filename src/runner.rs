use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command and capture output
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Run a command with extra environment and `input` written to its stdin
///
/// Keeps secrets off the argument list, where other processes could read them.
pub fn run_with_input(
    cmd: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    input: &str,
) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .with_context(|| format!("Failed to write to {cmd}"))?;
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to wait for {cmd}"))?;

    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_capture() {
        assert_eq!(run_capture("echo", &["hello"]).unwrap(), "hello");
        assert!(run_capture("false", &[]).is_err());
    }

    #[test]
    fn test_run_with_input_feeds_stdin_and_env() {
        let output = run_with_input(
            "sh",
            &["-c", "cat; printf \" $GK_RUNNER_TEST\""],
            &[("GK_RUNNER_TEST", "ok")],
            "select 1",
        )
        .unwrap();

        assert!(output.success);
        assert_eq!(output.stdout, "select 1 ok");
    }

    #[test]
    fn test_run_with_input_reports_failure() {
        let output = run_with_input("sh", &["-c", "echo denied >&2; exit 1"], &[], "").unwrap();
        assert!(!output.success);
        assert_eq!(output.stderr, "denied");
    }

    #[test]
    fn test_command_exists() {
        assert!(command_exists("sh"));
        assert!(!command_exists("gatekeeper-no-such-command-12345"));
    }
}
