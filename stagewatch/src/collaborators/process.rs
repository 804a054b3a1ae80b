//! Child process execution.

use crate::cancellation::CancellationToken;
use crate::errors::{Result, StagewatchError};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Non-empty lines of stdout followed by stderr.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
    }
}

/// Runs `argv` followed by `args` in `root`.
///
/// Returns `Ok(None)` when `token` is cancelled first; the child is killed
/// as soon as its future is dropped. An empty `argv` is a caller bug and is
/// reported as a collaborator error.
pub async fn run_command<I, S>(
    name: &str,
    argv: &[String],
    args: I,
    root: &Path,
    env: &BTreeMap<String, String>,
    token: &CancellationToken,
) -> Result<Option<CommandOutput>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let Some((program, base_args)) = argv.split_first() else {
        return Err(StagewatchError::collaborator(name, "no command configured"));
    };

    let mut command = Command::new(program);
    command
        .args(base_args)
        .args(args)
        .current_dir(root)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(collaborator = name, %program, "Spawning");
    let child = command
        .spawn()
        .map_err(|e| StagewatchError::collaborator(name, format!("failed to start {program}: {e}")))?;

    tokio::select! {
        output = child.wait_with_output() => {
            let output = output
                .map_err(|e| StagewatchError::collaborator(name, format!("{program} failed: {e}")))?;
            if !output.status.success() {
                debug!(collaborator = name, status = %output.status, "Exited unsuccessfully");
            }
            Ok(Some(CommandOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }))
        }
        () = token.cancelled() => {
            warn!(collaborator = name, reason = ?token.reason(), "Cancelled, terminating child");
            Ok(None)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_command(
            "echo",
            &argv(&["sh", "-c", "echo out; echo err >&2"]),
            std::iter::empty::<&str>(),
            dir.path(),
            &BTreeMap::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(output.success);
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["out", "err"]);
    }

    #[tokio::test]
    async fn test_appends_args_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("STAGEWATCH_TEST".to_string(), "set".to_string());

        let output = run_command(
            "sh",
            &argv(&["sh", "-c", "echo $STAGEWATCH_TEST $0 $1"]),
            ["a.ts", "b.ts"],
            dir.path(),
            &env,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(output.stdout.trim(), "set a.ts b.ts");
    }

    #[tokio::test]
    async fn test_failure_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_command(
            "false",
            &argv(&["sh", "-c", "exit 3"]),
            std::iter::empty::<&str>(),
            dir.path(),
            &BTreeMap::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_cancel_stops_child() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let sleep = argv(&["sleep", "30"]);
        let env = BTreeMap::new();
        let canceller = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            token.cancel("newer change");
        };

        let (output, ()) = tokio::join!(
            run_command(
                "sleep",
                &sleep,
                std::iter::empty::<&str>(),
                dir.path(),
                &env,
                &token,
            ),
            canceller
        );

        assert_eq!(output.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_command(
            "ghost",
            &argv(&["stagewatch-no-such-program"]),
            std::iter::empty::<&str>(),
            dir.path(),
            &BTreeMap::new(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(StagewatchError::Collaborator { .. })));
    }

    #[tokio::test]
    async fn test_empty_argv_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_command(
            "nothing",
            &[],
            std::iter::empty::<&str>(),
            dir.path(),
            &BTreeMap::new(),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
    }
}
