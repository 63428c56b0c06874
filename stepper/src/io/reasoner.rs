//! Reasoner abstraction for computing a single agent step.
//!
//! The [`Reasoner`] trait is the seam to the inference engine. The agent runner
//! owns task bookkeeping and asks a reasoner for one step at a time.
//! [`CommandReasoner`] spawns a configured command per step; tests use
//! scripted reasoners that return predetermined outputs without spawning
//! processes.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{StepOutput, Task, TaskStep};
use crate::io::config::ReasonerConfig;

/// Everything a reasoner needs to compute the next step of a task.
#[derive(Debug, Clone)]
pub struct ReasonRequest {
    pub task: Task,
    pub step: TaskStep,
    /// Outputs of the task's earlier steps, oldest first.
    pub previous: Vec<StepOutput>,
    pub system_prompt: Option<String>,
}

impl ReasonRequest {
    /// Render the prompt fed to a text-in/text-out reasoner.
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();
        if let Some(system) = &self.system_prompt {
            prompt.push_str(system.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str("Task: ");
        prompt.push_str(self.task.input.trim());
        prompt.push('\n');

        if !self.previous.is_empty() {
            prompt.push_str("\nPrevious steps:\n");
            for (i, prev) in self.previous.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, prev.output.trim()));
            }
        }

        prompt.push_str(&format!("\nStep {}: ", self.step.index + 1));
        match &self.step.input {
            Some(input) => prompt.push_str(input.trim()),
            None => prompt.push_str("Continue working on the task."),
        }
        prompt.push_str(
            "\n\nReply with the result of this step. If the task is not finished yet, end \
             with a single JSON line: {\"output\": \"<step result>\", \"is_last\": false}\n",
        );
        prompt
    }
}

/// Result of one reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reasoning {
    pub output: String,
    #[serde(default)]
    pub is_last: bool,
}

/// Abstraction over reasoning backends.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn reason(&self, request: &ReasonRequest) -> Result<Reasoning>;
}

/// Reasoner that spawns an external command per step.
pub struct CommandReasoner {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandReasoner {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }

    pub fn from_config(cfg: &ReasonerConfig) -> Self {
        Self::new(
            cfg.command.clone(),
            Duration::from_secs(cfg.timeout_secs),
            cfg.output_limit_bytes,
        )
    }
}

#[async_trait]
impl Reasoner for CommandReasoner {
    #[instrument(skip_all, fields(task_id = %request.task.task_id, step = request.step.index, timeout_secs = self.timeout.as_secs()))]
    async fn reason(&self, request: &ReasonRequest) -> Result<Reasoning> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("reasoner command is empty"))?;
        info!(program = %program, "starting reasoner");

        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_command(
            cmd,
            request.render_prompt().into_bytes(),
            self.timeout,
            self.output_limit_bytes,
        )
        .await
        .context("run reasoner")?;

        if output.stdout_truncated > 0 {
            warn!(truncated = output.stdout_truncated, "reasoner stdout truncated");
        }
        if !output.success {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(exit_code = ?output.exit_code, "reasoner failed");
            return Err(anyhow!(
                "reasoner exited with status {:?}: {}",
                output.exit_code,
                stderr.trim()
            ));
        }

        let reasoning = parse_reasoning(&String::from_utf8_lossy(&output.stdout))?;
        debug!(is_last = reasoning.is_last, "reasoner completed");
        Ok(reasoning)
    }
}

/// Interpret reasoner stdout.
///
/// A last line holding `{"output": ..., "is_last": ...}` is taken as the step
/// result. Anything else is a plain-text answer and ends the task.
pub fn parse_reasoning(stdout: &str) -> Result<Reasoning> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("reasoner produced no output"));
    }
    let last_line = trimmed.lines().rev().find(|l| !l.trim().is_empty());
    if let Some(line) = last_line
        && let Ok(reasoning) = serde_json::from_str::<Reasoning>(line.trim())
    {
        return Ok(reasoning);
    }
    Ok(Reasoning {
        output: trimmed.to_string(),
        is_last: true,
    })
}

#[derive(Debug)]
struct CommandOutput {
    success: bool,
    exit_code: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    stdout_truncated: usize,
}

/// Run a command with a timeout, feeding `stdin` and capturing bounded output.
///
/// stdin is written while stdout/stderr are drained so a chatty child cannot
/// deadlock on a full pipe. The child is killed when the timeout elapses.
async fn run_command(
    mut cmd: Command,
    stdin: Vec<u8>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("spawn command")?;
    let child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let waited = tokio::time::timeout(timeout, async {
        tokio::join!(
            write_stdin(child_stdin, stdin),
            read_limited(stdout, output_limit_bytes),
            read_limited(stderr, output_limit_bytes),
            child.wait(),
        )
    })
    .await;

    let Ok((written, stdout, stderr, status)) = waited else {
        warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
        child.kill().await.context("kill command")?;
        return Err(anyhow!("command timed out after {timeout:?}"));
    };

    written.context("write stdin")?;
    let (stdout, stdout_truncated) = stdout.context("read stdout")?;
    let (stderr, _) = stderr.context("read stderr")?;
    let status = status.context("wait for command")?;

    Ok(CommandOutput {
        success: status.success(),
        exit_code: status.code(),
        stdout,
        stderr,
        stdout_truncated,
    })
}

async fn write_stdin(mut stdin: ChildStdin, input: Vec<u8>) -> std::io::Result<()> {
    match stdin.write_all(&input).await {
        // The child may exit without reading its input.
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

async fn read_limited<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
) -> std::io::Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let take = limit.saturating_sub(kept.len()).min(n);
        kept.extend_from_slice(&buf[..take]);
        dropped += n - take;
    }
    Ok((kept, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(previous: Vec<StepOutput>, index: u32) -> ReasonRequest {
        let task = Task {
            task_id: "t-1".to_string(),
            input: "summarize the docs".to_string(),
        };
        ReasonRequest {
            step: TaskStep {
                task_id: task.task_id.clone(),
                step_id: format!("s-{index}"),
                index,
                input: (index == 0).then(|| task.input.clone()),
            },
            task,
            previous,
            system_prompt: Some("You are terse.".to_string()),
        }
    }

    #[test]
    fn parse_json_last_line() {
        let reasoning =
            parse_reasoning("thinking...\n{\"output\": \"half done\", \"is_last\": false}\n")
                .expect("parse");
        assert_eq!(reasoning.output, "half done");
        assert!(!reasoning.is_last);
    }

    #[test]
    fn parse_plain_text_finishes_task() {
        let reasoning = parse_reasoning("  The answer is 42.\n").expect("parse");
        assert_eq!(reasoning.output, "The answer is 42.");
        assert!(reasoning.is_last);
    }

    #[test]
    fn parse_empty_is_an_error() {
        let err = parse_reasoning(" \n\n").unwrap_err();
        assert!(err.to_string().contains("no output"));
    }

    #[test]
    fn prompt_includes_system_task_and_history() {
        let prev = request(Vec::new(), 0);
        let previous = vec![StepOutput {
            output: "read chapter one".to_string(),
            is_last: false,
            task_step: prev.step.clone(),
        }];
        let prompt = request(previous, 1).render_prompt();
        assert!(prompt.starts_with("You are terse.\n\nTask: summarize the docs\n"));
        assert!(prompt.contains("Previous steps:\n1. read chapter one\n"));
        assert!(prompt.contains("Step 2: Continue working on the task."));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_reasoner_reads_json_step() {
        let reasoner = CommandReasoner::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "cat >/dev/null; echo '{\"output\": \"step done\", \"is_last\": false}'"
                    .to_string(),
            ],
            Duration::from_secs(10),
            1000,
        );
        let reasoning = reasoner
            .reason(&request(Vec::new(), 0))
            .await
            .expect("reason");
        assert_eq!(
            reasoning,
            Reasoning {
                output: "step done".to_string(),
                is_last: false,
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_reasoner_reports_non_zero_exit() {
        let reasoner = CommandReasoner::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo model unavailable >&2; exit 3".to_string(),
            ],
            Duration::from_secs(10),
            1000,
        );
        let err = reasoner.reason(&request(Vec::new(), 0)).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Some(3)"), "{message}");
        assert!(message.contains("model unavailable"), "{message}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_reasoner_times_out() {
        let reasoner = CommandReasoner::new(
            vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(100),
            1000,
        );
        let err = reasoner.reason(&request(Vec::new(), 0)).await.unwrap_err();
        assert!(format!("{err:#}").contains("timed out"));
    }
}
