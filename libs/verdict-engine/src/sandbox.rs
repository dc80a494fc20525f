/// Process Sandbox - One OS Process Per Execution
///
/// **Core Responsibility:**
/// Turn source text + stdin + constraints into one completed child process and
/// report how it ended. Every language executor goes through this module, so
/// the resource-safety guarantees live here exactly once.
///
/// **Guarantees:**
/// - Each run gets a private directory holding its source file; the child
///   runs there and the directory is removed on every exit path (explicit
///   close, or the `TempDir` drop guard on early return and cancellation)
/// - The child runs in its own process group; the group is killed on
///   timeout, after a normal exit, and when the run future is dropped
/// - stdout and stderr share a single pipe, captured up to `MAX_OUTPUT_BYTES`
/// - Output of a timed-out process is discarded, never partially returned
///
/// A descendant that leaves the group (`setsid`) escapes the group kill. Its
/// copy of the output pipe is abandoned after `OUTPUT_DRAIN_GRACE` and the run
/// is classified from the exit status and the output captured so far.
///
/// **Command construction:**
/// Without constraints the interpreter is spawned directly. With a timeout or
/// memory cap the invocation is wrapped in `sh -c` applying `ulimit` before
/// `exec`-ing the interpreter, so the caps are inherited and cannot be shed by
/// the child. `shell_quote` is the only place untrusted text meets the shell.

use anyhow::{anyhow, bail, Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::Write;
use std::os::fd::OwnedFd;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::process::Command;
use tokio::task::AbortHandle;
use tracing::{debug, error, instrument, warn};
use verdict_common::types::{ExecutionRequest, ExecutionResult, ValidationResult};

/// Wall-clock bound when the request does not carry one
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Bound for syntax checks
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Safety limits to prevent pathological inputs from reaching a process
const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
const MAX_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB
const MAX_OUTPUT_BYTES: usize = 1024 * 1024; // 1MB

/// How long to wait for the output pipe to close once the process group is gone
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

const SOURCE_PREFIX: &str = "code_";
const RUN_DIR_PREFIX: &str = "run_";

/// The program that runs a source file, e.g. `python3` or `node`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: String,
    /// Arguments placed before the source path
    pub args: Vec<String>,
}

impl Interpreter {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// OS-level caps applied by the shell wrapper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    /// `ulimit -t`
    pub cpu_seconds: Option<u64>,
    /// `ulimit -v`, in KiB
    pub address_space_kb: Option<u64>,
}

impl ResourceLimits {
    /// CPU cap from the requested timeout, address-space cap from the
    /// requested memory
    pub fn from_request(request: &ExecutionRequest) -> Self {
        Self {
            cpu_seconds: request.timeout_seconds(),
            address_space_kb: request.max_memory_mb().map(|mb| mb.saturating_mul(1024)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cpu_seconds.is_none() && self.address_space_kb.is_none()
    }
}

/// A fully-built command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Direct { program: String, args: Vec<String> },
    Shell { script: String },
}

impl Invocation {
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Invocation::Shell { .. })
    }

    fn command(&self) -> Command {
        match self {
            Invocation::Direct { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            Invocation::Shell { script } => {
                let mut cmd = Command::new("/bin/sh");
                cmd.arg("-c").arg(script);
                cmd
            }
        }
    }
}

/// Quote `word` for a POSIX shell: wrap in single quotes and turn each
/// embedded `'` into `'\''`.
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', "'\\''"))
}

/// Build the command that runs `source` under `interpreter`.
pub fn build_invocation(
    interpreter: &Interpreter,
    source: &Path,
    limits: &ResourceLimits,
) -> Invocation {
    let source = source.to_string_lossy().into_owned();

    if limits.is_empty() {
        let mut args = interpreter.args.clone();
        args.push(source);
        return Invocation::Direct {
            program: interpreter.program.clone(),
            args,
        };
    }

    let mut steps = Vec::new();
    if let Some(cpu) = limits.cpu_seconds {
        steps.push(format!("ulimit -t {}", cpu));
    }
    if let Some(kb) = limits.address_space_kb {
        steps.push(format!("ulimit -v {}", kb));
    }

    let mut exec = String::from("exec");
    for word in std::iter::once(&interpreter.program)
        .chain(interpreter.args.iter())
        .chain(std::iter::once(&source))
    {
        exec.push(' ');
        exec.push_str(&shell_quote(word));
    }
    steps.push(exec);

    // && so a failed ulimit never runs the program uncapped
    Invocation::Shell {
        script: steps.join(" && "),
    }
}

/// A source file inside its own run directory. Dropping it removes both.
#[derive(Debug)]
pub struct StagedSource {
    // field order matters: the file goes before its directory
    file: NamedTempFile,
    dir: TempDir,
}

impl StagedSource {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Private working directory for the run
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the file and everything the run left in its directory
    pub fn close(self) -> std::io::Result<()> {
        self.file.close()?;
        self.dir.close()
    }
}

/// Write `code` to a uniquely named file in a fresh directory under `work_dir`.
///
/// Concurrent runs never share a directory, so one submission cannot list or
/// read another's source.
pub fn write_source(work_dir: &Path, extension: &str, code: &str) -> Result<StagedSource> {
    std::fs::create_dir_all(work_dir)
        .with_context(|| format!("Failed to create work dir {}", work_dir.display()))?;

    let dir = tempfile::Builder::new()
        .prefix(RUN_DIR_PREFIX)
        .tempdir_in(work_dir)
        .context("Failed to create run directory")?;

    let mut file = tempfile::Builder::new()
        .prefix(SOURCE_PREFIX)
        .suffix(extension)
        .tempfile_in(dir.path())
        .context("Failed to create temp source file")?;

    file.write_all(code.as_bytes())
        .context("Failed to write temp source file")?;
    file.flush().context("Failed to flush temp source file")?;

    Ok(StagedSource { file, dir })
}

/// How a process run ended
#[derive(Debug)]
pub enum ProcessOutcome {
    Exited {
        status: ExitStatus,
        /// Merged stdout/stderr
        output: String,
        elapsed: Duration,
    },
    TimedOut {
        elapsed: Duration,
    },
}

/// Spawn `invocation`, feed it `stdin`, and wait at most `timeout` for exit.
///
/// Errors are infrastructure faults only: pipe setup, spawn or wait failure.
#[instrument(
    skip_all,
    fields(wrapped = invocation.is_wrapped(), timeout_ms = timeout.as_millis() as u64)
)]
pub async fn run_process(
    invocation: &Invocation,
    working_dir: Option<&Path>,
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<ProcessOutcome> {
    let input = stdin.unwrap_or_default();
    if input.len() > MAX_INPUT_BYTES {
        bail!("Input exceeds maximum size of {} bytes", MAX_INPUT_BYTES);
    }

    let (reader, writer) = std::io::pipe().context("Failed to create output pipe")?;
    let stderr_writer = writer
        .try_clone()
        .context("Failed to duplicate output pipe")?;
    let receiver = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
        .context("Failed to register output pipe")?;

    let start = Instant::now();

    // The Command owns our copies of the pipe's write end; it must be
    // dropped right after spawn so the reader sees EOF when the child exits.
    let mut child = {
        let mut cmd = invocation.command();
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(writer)
            .stderr(stderr_writer)
            .process_group(0)
            .kill_on_drop(true);
        cmd.spawn().context("Failed to spawn process")?
    };

    let captured = Arc::new(Mutex::new(CapturedOutput::new(MAX_OUTPUT_BYTES)));
    let mut collector = tokio::spawn(collect_output(receiver, captured.clone()));

    // Declared after `child` so it drops first, while the group leader is
    // still unreaped
    let mut group = GroupGuard {
        pgid: child
            .id()
            .and_then(|pid| i32::try_from(pid).ok())
            .map(Pid::from_raw),
        collector: collector.abort_handle(),
    };

    debug!(pid = ?group.pgid.map(|p| p.as_raw()), "Process started");

    if let Some(mut pipe) = child.stdin.take() {
        let bytes = input.as_bytes().to_vec();
        tokio::spawn(async move {
            if !bytes.is_empty() {
                if let Err(e) = pipe.write_all(&bytes).await {
                    debug!(error = %e, "stdin closed before input was fully written");
                }
            }
            // dropping the handle closes the child's stdin
        });
    }

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            group.kill();
            return Err(e).context("Failed to wait for process");
        }
        Err(_) => {
            // HARD TIMEOUT: kill the whole tree, drop whatever it printed
            group.kill();
            if let Err(e) = child.kill().await {
                debug!(error = %e, "Process already gone after group kill");
            }
            let elapsed = start.elapsed();
            warn!(elapsed_ms = elapsed.as_millis() as u64, "Process timed out - killed");
            return Ok(ProcessOutcome::TimedOut { elapsed });
        }
    };
    let elapsed = start.elapsed();

    // Descendants may still hold the pipe open
    group.kill();

    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut collector).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => return Err(e).context("Failed to read process output"),
        Ok(Err(e)) => return Err(anyhow!("Output reader task failed: {}", e)),
        Err(_) => {
            collector.abort();
            warn!("Output pipe held open by a process outside the group - keeping captured output");
        }
    }

    let output = lock(&captured).take_string();

    debug!(
        exit_code = ?status.code(),
        signal = ?status.signal(),
        elapsed_ms = elapsed.as_millis() as u64,
        output_bytes = output.len(),
        "Process exited"
    );

    Ok(ProcessOutcome::Exited {
        status,
        output,
        elapsed,
    })
}

/// Kills the child's process group on drop unless `kill` already ran, and
/// stops the output reader with it.
struct GroupGuard {
    pgid: Option<Pid>,
    collector: AbortHandle,
}

impl GroupGuard {
    fn kill(&mut self) {
        kill_group(self.pgid.take());
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.pgid.is_some() {
            debug!("Run dropped before completion - killing process group");
        }
        self.kill();
        self.collector.abort();
    }
}

fn kill_group(group: Option<Pid>) {
    let Some(pgid) = group else {
        return;
    };
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = pgid.as_raw(), error = %e, "Failed to kill process group"),
    }
}

/// Output kept up to a byte limit; the excess is counted, not stored
#[derive(Debug)]
struct CapturedOutput {
    kept: Vec<u8>,
    dropped: usize,
    limit: usize,
}

impl CapturedOutput {
    fn new(limit: usize) -> Self {
        Self {
            kept: Vec::new(),
            dropped: 0,
            limit,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.kept.len());
        let take = chunk.len().min(room);
        self.kept.extend_from_slice(&chunk[..take]);
        self.dropped += chunk.len() - take;
    }

    fn take_string(&mut self) -> String {
        let mut output = String::from_utf8_lossy(&std::mem::take(&mut self.kept)).into_owned();
        if self.dropped > 0 {
            output.push_str(&format!("\n[output truncated: {} bytes discarded]", self.dropped));
        }
        output
    }
}

fn lock(captured: &Mutex<CapturedOutput>) -> MutexGuard<'_, CapturedOutput> {
    captured.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read the pipe to EOF into `captured`, draining past the limit
async fn collect_output(
    mut pipe: pipe::Receiver,
    captured: Arc<Mutex<CapturedOutput>>,
) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        lock(&captured).push(&chunk[..n]);
    }
}

/// Map a finished process onto the execution status taxonomy:
/// exit 0 is `COMPLETED`, the CPU-time cap (`SIGXCPU`) and the wall clock
/// are `TIMEOUT`, anything else is `RUNTIME_ERROR`.
pub fn classify(outcome: ProcessOutcome) -> ExecutionResult {
    match outcome {
        ProcessOutcome::TimedOut { elapsed } => {
            ExecutionResult::timeout().with_execution_time(millis(elapsed))
        }
        ProcessOutcome::Exited {
            status,
            output,
            elapsed,
        } => {
            let ms = millis(elapsed);

            if status.success() {
                return ExecutionResult::success(output, ms);
            }

            if status.signal() == Some(Signal::SIGXCPU as i32) {
                return ExecutionResult::timeout().with_execution_time(ms);
            }

            let exit_code = status
                .code()
                .or_else(|| status.signal().map(|sig| 128 + sig))
                .unwrap_or(-1);
            let summary = if output.trim().is_empty() {
                describe_exit(&status)
            } else {
                output.clone()
            };

            ExecutionResult::runtime_error(summary, output)
                .with_exit_code(exit_code)
                .with_execution_time(ms)
        }
    }
}

fn describe_exit(status: &ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("Process exited with code {}", code),
        (None, Some(sig)) => format!("Process killed by signal {}", sig),
        (None, None) => "Process exited abnormally".to_string(),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// The shared body of every executor's `execute`.
///
/// Writes the source, runs it, removes the source, classifies the outcome.
/// Never fails: infrastructure faults come back as `INTERNAL_ERROR`.
#[instrument(skip_all, fields(program = %interpreter.program, language = %request.language))]
pub async fn execute_source(
    work_dir: &Path,
    extension: &str,
    interpreter: &Interpreter,
    limits: ResourceLimits,
    request: &ExecutionRequest,
) -> ExecutionResult {
    if request.code.len() > MAX_SOURCE_CODE_BYTES {
        return ExecutionResult::internal_error(format!(
            "Source code exceeds maximum size of {} bytes",
            MAX_SOURCE_CODE_BYTES
        ));
    }

    let source = match write_source(work_dir, extension, &request.code) {
        Ok(file) => file,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to prepare source file");
            return ExecutionResult::internal_error(format!("Failed to execute: {:#}", e));
        }
    };

    let timeout_seconds = request
        .timeout_seconds()
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
    let invocation = build_invocation(interpreter, source.path(), &limits);

    debug!(
        source = %source.path().display(),
        wrapped = invocation.is_wrapped(),
        timeout_seconds,
        source_size = request.code.len(),
        "Executing source"
    );

    let outcome = run_process(
        &invocation,
        Some(source.dir()),
        request.input.as_deref(),
        Duration::from_secs(timeout_seconds),
    )
    .await;

    if let Err(e) = source.close() {
        warn!(error = %e, "Failed to remove run directory");
    }

    match outcome {
        Ok(outcome) => classify(outcome),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Process execution failed");
            ExecutionResult::internal_error(format!("Failed to execute: {:#}", e))
        }
    }
}

/// Run a syntax-check command with `code` on stdin.
///
/// Advisory: if the checker cannot run or times out, the code is reported
/// valid and errors will surface at execution time instead.
pub async fn check_syntax(program: &str, args: &[&str], code: &str) -> ValidationResult {
    let invocation = Invocation::Direct {
        program: program.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
    };

    match run_process(&invocation, None, Some(code), VALIDATION_TIMEOUT).await {
        Ok(ProcessOutcome::Exited { status, .. }) if status.success() => {
            ValidationResult::success()
        }
        Ok(ProcessOutcome::Exited { status, output, .. }) => {
            let diagnostic = output.trim();
            if diagnostic.is_empty() {
                ValidationResult::failure(describe_exit(&status))
            } else {
                ValidationResult::failure(diagnostic)
            }
        }
        Ok(ProcessOutcome::TimedOut { .. }) => {
            warn!(program, "Syntax check timed out");
            ValidationResult::success()
                .with_warning("Syntax check timed out; errors will surface at execution time")
        }
        Err(e) => {
            warn!(program, error = %format!("{:#}", e), "Syntax check unavailable");
            ValidationResult::success().with_warning(format!("Syntax check unavailable: {:#}", e))
        }
    }
}
