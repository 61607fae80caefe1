//! Piped child-process backend.
//!
//! The child's stdin is kept as a writer; stdout and (optionally) stderr are
//! each drained by a reader task into one bounded channel, so a slow consumer
//! never blocks the child on a full pipe for longer than the channel allows
//! and the session can await output, exit and its deadline together.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{SessionConfig, StderrMode};
use crate::error::{ExpectError, Result, SpawnError};
use crate::session::Signal;

/// Size of a single read from a child stream.
const READ_CHUNK: usize = 8 * 1024;

/// Number of chunks that may be queued before readers wait.
const CHANNEL_CAPACITY: usize = 256;

/// Which child stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// A chunk of bytes read from the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Source stream.
    pub stream: StreamKind,
    /// The bytes read.
    pub data: Vec<u8>,
}

/// Something observed while waiting on a child.
#[derive(Debug)]
pub enum ProcessEvent {
    /// A chunk of output arrived.
    Output(OutputChunk),
    /// Every captured stream has closed.
    Closed,
    /// The child exited and has been reaped.
    Exited(std::io::Result<ExitStatus>),
    /// The wait deadline passed with nothing to report.
    Idle,
}

/// Starts child processes described by a [`SessionConfig`].
#[derive(Debug)]
pub struct ProcessSpawner<'a> {
    config: &'a SessionConfig,
}

impl<'a> ProcessSpawner<'a> {
    /// Create a spawner for the given configuration.
    #[must_use]
    pub const fn new(config: &'a SessionConfig) -> Self {
        Self { config }
    }

    /// Validate the configuration and start the child.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(&self) -> Result<ProcessHandle> {
        let config = self.config;
        validate(config)?;

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(match config.stderr {
                StderrMode::Merge | StderrMode::Separate => Stdio::piped(),
                StderrMode::Inherit => Stdio::inherit(),
                StderrMode::Discard => Stdio::null(),
            })
            .kill_on_drop(true);

        if !config.inherit_env {
            cmd.env_clear();
        }
        cmd.envs(&config.env);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_spawn_io(&config.command, e))?;
        let pid = child.id();

        tracing::debug!(
            command = %config.command_line(),
            pid = ?pid,
            stderr = ?config.stderr,
            "spawned child process"
        );

        let stdin = child.stdin.take();
        let (tx, output) = mpsc::channel(CHANNEL_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump(stdout, StreamKind::Stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump(stderr, StreamKind::Stderr, tx.clone())));
        }

        Ok(ProcessHandle {
            child,
            stdin,
            output,
            readers,
            pid,
        })
    }
}

fn validate(config: &SessionConfig) -> Result<()> {
    if config.command.trim().is_empty() {
        return Err(SpawnError::invalid_argument("command", "command is empty").into());
    }
    if config.command.contains('\0') {
        return Err(SpawnError::invalid_argument("command", "command contains a NUL byte").into());
    }
    if let Some(idx) = config.args.iter().position(|a| a.contains('\0')) {
        return Err(SpawnError::invalid_argument(
            format!("argument[{idx}]"),
            "argument contains a NUL byte",
        )
        .into());
    }
    if let Some(dir) = &config.working_dir {
        check_working_dir(dir)?;
    }
    Ok(())
}

fn check_working_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(SpawnError::invalid_working_dir(dir.display().to_string()).into())
    }
}

/// Copy one child stream into the shared channel until it closes.
async fn pump<R>(mut reader: R, stream: StreamKind, tx: mpsc::Sender<OutputChunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::trace!(?stream, "child stream closed");
                break;
            }
            Ok(n) => {
                let chunk = OutputChunk {
                    stream,
                    data: buf[..n].to_vec(),
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::debug!(?stream, error = %e, "child stream read failed");
                break;
            }
        }
    }
}

/// A running child with its piped streams.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    output: mpsc::Receiver<OutputChunk>,
    readers: Vec<JoinHandle<()>>,
    pid: Option<u32>,
}

impl ProcessHandle {
    /// OS process id, captured at spawn time.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The child's input stream, unless it has been closed.
    pub fn stdin(&mut self) -> Option<&mut ChildStdin> {
        self.stdin.as_mut()
    }

    /// Close the child's input stream. Returns `false` if it was already closed.
    pub fn close_stdin(&mut self) -> bool {
        self.stdin.take().is_some()
    }

    /// Receive the next output chunk; `None` once every stream has closed.
    pub async fn recv(&mut self) -> Option<OutputChunk> {
        self.output.recv().await
    }

    /// Take the output chunks already queued, without waiting.
    ///
    /// At most one channel's worth is returned so a chatty child cannot
    /// keep the caller here.
    pub fn ready_output(&mut self) -> Vec<OutputChunk> {
        let mut chunks = Vec::new();
        while chunks.len() < CHANNEL_CAPACITY {
            match self.output.try_recv() {
                Ok(chunk) => chunks.push(chunk),
                Err(_) => break,
            }
        }
        chunks
    }

    /// Wait for whichever comes first: output, child exit, or `until`.
    ///
    /// Output is preferred when several are ready. Sources whose flag is
    /// `false` are not polled; with both off this is a plain sleep.
    pub async fn next_event(
        &mut self,
        until: Instant,
        watch_output: bool,
        watch_exit: bool,
    ) -> ProcessEvent {
        tokio::select! {
            biased;
            chunk = self.output.recv(), if watch_output => {
                chunk.map_or(ProcessEvent::Closed, ProcessEvent::Output)
            }
            status = self.child.wait(), if watch_exit => ProcessEvent::Exited(status),
            () = tokio::time::sleep_until(until) => ProcessEvent::Idle,
        }
    }

    /// Wait for the child to exit and reap it.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Reap the child if it has exited.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Forcefully kill the child without waiting.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    /// Deliver `signal` to the child.
    pub fn signal(&mut self, signal: Signal) -> Result<()> {
        if signal == Signal::Kill {
            return self
                .start_kill()
                .map_err(|e| ExpectError::signal(format!("killing process: {e}")));
        }
        match self.pid {
            Some(pid) => send_signal(pid, signal),
            None => Err(ExpectError::signal("process has already been reaped")),
        }
    }

    /// Stop the reader tasks and drop any queued output.
    pub fn stop_readers(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        self.output.close();
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.stop_readers();
    }
}

/// Send `signal` to the process with the given id.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    use rustix::process::{Pid, Signal as RawSignal, kill_process};

    let raw_pid = i32::try_from(pid)
        .ok()
        .and_then(Pid::from_raw)
        .ok_or_else(|| ExpectError::signal(format!("invalid pid {pid}")))?;
    let raw_signal = RawSignal::from_named_raw(signal.as_signal_number())
        .ok_or_else(|| ExpectError::signal(format!("unsupported signal {signal}")))?;

    tracing::debug!(pid, %signal, "sending signal");
    kill_process(raw_pid, raw_signal).map_err(|e| {
        ExpectError::signal(format!(
            "sending {signal} to {pid}: {}",
            std::io::Error::from_raw_os_error(e.raw_os_error())
        ))
    })
}

/// Send `signal` to the process with the given id.
#[cfg(not(unix))]
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    Err(ExpectError::signal(format!(
        "cannot deliver {signal} to {pid} on this platform"
    )))
}
