//! Engine backed by an agent CLI streaming JSON lines on stdout.
//!
//! The prompt is written to the child's stdin. Stdout is read line by line on
//! a reader thread and handed to the consumer through a channel, so the
//! consumer can enforce the per-call deadline while waiting for the next event.
//! Stderr is drained concurrently to avoid pipe deadlocks.

use std::cell::Cell;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::engine::event::Event;
use crate::engine::{Engine, EngineConfig, EventStream};
use crate::error::EngineError;

/// Bytes of agent stderr kept for error reports.
const STDERR_LIMIT_BYTES: usize = 64 * 1024;
/// How long to wait for the process to exit after stdout closes.
const EXIT_GRACE: Duration = Duration::from_secs(10);

/// Engine that spawns the configured agent command once per call.
pub struct CliEngine {
    /// Program followed by fixed leading arguments (e.g. `["claude"]`).
    command: Vec<String>,
    /// Wall-clock budget for a single call.
    timeout: Duration,
    /// When set, every raw stdout line is appended to `call-NNN.jsonl` here.
    stream_log_dir: Option<PathBuf>,
    calls: Cell<u32>,
}

impl CliEngine {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self> {
        if command.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(anyhow!("agent command must be non-empty"));
        }
        Ok(Self {
            command,
            timeout,
            stream_log_dir: None,
            calls: Cell::new(0),
        })
    }

    pub fn with_stream_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.stream_log_dir = dir;
        self
    }

    fn program(&self) -> &str {
        &self.command[0]
    }

    fn open_stream_log(&self, call: u32) -> Result<Option<BufWriter<File>>> {
        let Some(dir) = &self.stream_log_dir else {
            return Ok(None);
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("create stream log dir {}", dir.display()))?;
        let path = dir.join(format!("call-{call:03}.jsonl"));
        let file = File::create(&path)
            .with_context(|| format!("create stream log {}", path.display()))?;
        debug!(path = %path.display(), "teeing engine stream");
        Ok(Some(BufWriter::new(file)))
    }
}

impl Engine for CliEngine {
    #[instrument(skip_all, fields(program = %self.program(), timeout_secs = self.timeout.as_secs()))]
    fn submit(&self, prompt: &str, config: &EngineConfig) -> Result<EventStream> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        let tee = self.open_stream_log(call)?;

        let mut cmd = Command::new(self.program());
        cmd.args(&self.command[1..])
            .args(agent_args(config))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &config.working_directory {
            cmd.current_dir(dir);
        }

        info!(call, "starting agent");
        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|err| EngineError::new(format!("spawn {}: {err}", self.program())))?;

        let stdin_result = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(prompt.as_bytes()),
            None => Err(io::Error::other("stdin was not piped")),
        };
        if let Err(err) = stdin_result {
            kill_quietly(&mut child);
            return Err(EngineError::new(format!("write prompt to agent: {err}")).into());
        }

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            kill_quietly(&mut child);
            return Err(EngineError::new("agent output was not piped").into());
        };

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || pump_lines(stdout, tx, tee));
        let stderr_handle = thread::spawn(move || read_stream_limited(stderr, STDERR_LIMIT_BYTES));

        Ok(Box::new(CliEventStream {
            child,
            lines: rx,
            stderr: Some(stderr_handle),
            deadline: started + self.timeout,
            timeout: self.timeout,
            finished: false,
        }))
    }
}

/// Flags for the agent CLI's non-interactive streaming mode.
pub fn agent_args(config: &EngineConfig) -> Vec<String> {
    let mut args = vec![
        "--print".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
        "--permission-mode".to_string(),
        config.permission_mode.as_str().to_string(),
    ];
    if let Some(model) = &config.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if !config.allowed_tools.is_empty() {
        args.push("--allowedTools".to_string());
        args.push(config.allowed_tools.join(","));
    }
    if let Some(max_turns) = config.max_turns {
        args.push("--max-turns".to_string());
        args.push(max_turns.to_string());
    }
    if !config.system_prompt_append.trim().is_empty() {
        args.push("--append-system-prompt".to_string());
        args.push(config.system_prompt_append.clone());
    }
    args
}

struct CliEventStream {
    child: Child,
    lines: Receiver<io::Result<String>>,
    stderr: Option<thread::JoinHandle<Result<(Vec<u8>, usize)>>>,
    deadline: Instant,
    timeout: Duration,
    finished: bool,
}

impl CliEventStream {
    fn fail(&mut self, message: String) -> anyhow::Error {
        self.finished = true;
        kill_quietly(&mut self.child);
        warn!(%message, "agent stream failed");
        EngineError::new(message).into()
    }

    /// Stdout closed: wait for the process and check how it exited.
    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let grace = self
            .deadline
            .saturating_duration_since(Instant::now())
            .max(EXIT_GRACE);
        let status = match self.child.wait_timeout(grace) {
            Ok(Some(status)) => status,
            Ok(None) => {
                kill_quietly(&mut self.child);
                return Err(EngineError::new("agent did not exit after closing its output").into());
            }
            Err(err) => return Err(EngineError::new(format!("wait for agent: {err}")).into()),
        };

        let stderr = self.stderr_tail();
        debug!(exit_code = ?status.code(), "agent exited");
        if !status.success() {
            let detail = if stderr.is_empty() {
                String::new()
            } else {
                format!(": {stderr}")
            };
            return Err(EngineError::new(format!(
                "agent exited with status {:?}{detail}",
                status.code()
            ))
            .into());
        }
        if !stderr.is_empty() {
            debug!(stderr = %stderr, "agent stderr");
        }
        Ok(())
    }

    fn stderr_tail(&mut self) -> String {
        let Some(handle) = self.stderr.take() else {
            return String::new();
        };
        match handle.join() {
            Ok(Ok((bytes, truncated))) => {
                let mut text = String::from_utf8_lossy(&bytes).trim().to_string();
                if truncated > 0 {
                    text.push_str(&format!("\n[stderr truncated {truncated} bytes]"));
                }
                text
            }
            Ok(Err(err)) => format!("[failed to read stderr: {err}]"),
            Err(_) => "[stderr reader thread panicked]".to_string(),
        }
    }
}

impl Iterator for CliEventStream {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(Ok(line)) => {
                    if let Some(event) = Event::decode_line(&line) {
                        return Some(Ok(event));
                    }
                }
                Ok(Err(err)) => return Some(Err(self.fail(format!("read agent output: {err}")))),
                Err(RecvTimeoutError::Timeout) => {
                    let message = format!("agent timed out after {:?}", self.timeout);
                    return Some(Err(self.fail(message)));
                }
                Err(RecvTimeoutError::Disconnected) => return self.finish().err().map(Err),
            }
        }
    }
}

impl Drop for CliEventStream {
    fn drop(&mut self) {
        if !self.finished {
            kill_quietly(&mut self.child);
        }
    }
}

fn kill_quietly(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(err = %err, "kill agent");
    }
    if let Err(err) = child.wait() {
        debug!(err = %err, "reap agent");
    }
}

/// Forward stdout lines to the consumer, tee-ing them to the stream log.
fn pump_lines<R: Read>(
    reader: R,
    tx: Sender<io::Result<String>>,
    mut tee: Option<BufWriter<File>>,
) {
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if let Some(writer) = tee.as_mut() {
                    // Flush per line so the log is useful while the agent runs.
                    if let Err(err) = writer.write_all(&line) {
                        warn!(err = %err, "failed to write stream log");
                    } else if let Err(err) = writer.flush() {
                        warn!(err = %err, "failed to flush stream log");
                    }
                }
                let text = String::from_utf8_lossy(&line).into_owned();
                if tx.send(Ok(text)).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(Err(err));
                break;
            }
        }
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
