//! Shell command execution with piped stdin.

use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Maximum stderr bytes carried in an error
const MAX_STDERR_BYTES: usize = 2 * 1024;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with code {code:?}: {stderr}")]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// `sh -c <command>` (or `cmd /C` on Windows)
fn shell(command: &str) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    };

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Linux: the child gets SIGTERM if we die without dropping it.
    #[cfg(target_os = "linux")]
    unsafe {
        cmd.pre_exec(|| {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
            Ok(())
        });
    }

    cmd
}

/// Run `command` with `input` on stdin and return its stdout.
///
/// Dropping the future kills the child.
pub async fn run_with_input(
    command: &str,
    input: &str,
    env: &[(&str, &str)],
) -> Result<String, CommandError> {
    let mut cmd = shell(command);
    for (key, value) in env {
        cmd.env(key, value);
    }

    debug!(command, input_bytes = input.len(), "Spawning command");
    let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
        command: command.to_string(),
        source,
    })?;

    // Feed stdin from its own task so a chatty child cannot deadlock us
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.as_bytes().to_vec();
        tokio::spawn(async move {
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        })
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| CommandError::Io {
            command: command.to_string(),
            source,
        })?;
    if let Some(writer) = writer {
        let _ = writer.await;
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::Exit {
            command: command.to_string(),
            code: output.status.code(),
            stderr: council_domain::core::string::truncate(stderr.trim(), MAX_STDERR_BYTES),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdin_reaches_command() {
        let out = run_with_input("cat", "hello council", &[]).await.unwrap();
        assert_eq!(out, "hello council");
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let out = run_with_input("printf '%s' \"$GREETING\"", "", &[("GREETING", "hi")])
            .await
            .unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let err = run_with_input("echo broken >&2; exit 3", "", &[])
            .await
            .unwrap_err();
        match err {
            CommandError::Exit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
