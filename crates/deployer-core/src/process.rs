//! Subprocess execution with timeouts and output capture
//!
//! All external tools (version probes, the build toolchain, simulator queries,
//! virtualenv setup) go through the [`CommandRunner`] trait so the pipeline can
//! be driven by a scripted runner in tests.

use async_trait::async_trait;
use colored::Colorize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Grace period for reaping a child after its output streams close
const WAIT_GRACE: Duration = Duration::from_secs(5);

/// A single subprocess invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
    /// Echo output lines to the terminal while the process runs
    pub stream: bool,
    /// Number of trailing output lines kept for diagnostics
    pub tail_lines: usize,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout,
            stream: false,
            tail_lines: 40,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines;
        self
    }

    /// Shell-like rendering for log messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Last lines of combined stdout/stderr in arrival order
    pub tail: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr, for tools that print versions to either
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Why a subprocess produced no exit status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error("{program} is not installed or not on PATH")]
    NotFound { program: String },

    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut {
        program: String,
        timeout: Duration,
        tail: Vec<String>,
    },

    #[error("{program}: {message}")]
    Io { program: String, message: String },
}

/// Runs subprocesses on behalf of the pipeline
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError>;
}

/// [`CommandRunner`] backed by real OS processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Bounded buffer of the most recent output lines
struct Tail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Tail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    fn push(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn into_vec(self) -> Vec<String> {
        self.lines.into_iter().collect()
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        let program = invocation.program.clone();
        tracing::debug!(command = %invocation.command_line(), "spawning");

        let mut cmd = TokioCommand::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProcessError::NotFound {
                program: program.clone(),
            },
            _ => ProcessError::Io {
                program: program.clone(),
                message: e.to_string(),
            },
        })?;

        let stdout = child.stdout.take().ok_or_else(|| ProcessError::Io {
            program: program.clone(),
            message: "stdout was not captured".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ProcessError::Io {
            program: program.clone(),
            message: "stderr was not captured".to_string(),
        })?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();

        let mut out_buf = String::new();
        let mut err_buf = String::new();
        let mut tail = Tail::new(invocation.tail_lines);
        let stream = invocation.stream;

        let output_task = async {
            let mut stdout_open = true;
            let mut stderr_open = true;
            while stdout_open || stderr_open {
                tokio::select! {
                    line = stdout_reader.next_line(), if stdout_open => {
                        match line {
                            Ok(Some(line)) => {
                                if stream {
                                    println!("  {}", line);
                                }
                                tail.push(&line);
                                out_buf.push_str(&line);
                                out_buf.push('\n');
                            }
                            Ok(None) => stdout_open = false,
                            Err(e) => {
                                tracing::warn!("error reading stdout of {}: {}", program, e);
                                stdout_open = false;
                            }
                        }
                    }
                    line = stderr_reader.next_line(), if stderr_open => {
                        match line {
                            Ok(Some(line)) => {
                                if stream {
                                    eprintln!("  {}", line.yellow());
                                }
                                tail.push(&line);
                                err_buf.push_str(&line);
                                err_buf.push('\n');
                            }
                            Ok(None) => stderr_open = false,
                            Err(e) => {
                                tracing::warn!("error reading stderr of {}: {}", program, e);
                                stderr_open = false;
                            }
                        }
                    }
                }
            }
        };

        if timeout(invocation.timeout, output_task).await.is_err() {
            let _ = child.kill().await;
            return Err(ProcessError::TimedOut {
                program,
                timeout: invocation.timeout,
                tail: tail.into_vec(),
            });
        }

        let status = match timeout(WAIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ProcessError::Io {
                    program,
                    message: format!("failed to wait for process: {}", e),
                })
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(ProcessError::TimedOut {
                    program,
                    timeout: invocation.timeout,
                    tail: tail.into_vec(),
                });
            }
        };

        tracing::debug!(command = %invocation.command_line(), code = ?status.code(), "finished");

        Ok(ProcessOutput {
            code: status.code(),
            stdout: out_buf,
            stderr: err_buf,
            tail: tail.into_vec(),
        })
    }
}
