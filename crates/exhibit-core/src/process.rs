// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blocking invocation of external programs with a structured result.
//!
//! The build tool and the renderer are both run through a [`ProcessRunner`].
//! The runner streams each output line to the log at `debug` level while it
//! keeps the tail for error reports, and enforces an optional timeout by
//! killing the child.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Number of trailing output lines kept per stream.
const MAX_CAPTURED_LINES: usize = 256;

/// Interval between liveness checks while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long output readers may lag behind the end of the process.
const READER_GRACE: Duration = Duration::from_secs(2);

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Everything needed to start one external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// The executable.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// Working directory, or the parent's when `None`.
    pub current_dir: Option<PathBuf>,
    /// Variables added to the inherited environment.
    pub env: Vec<(OsString, OsString)>,
    /// Kill the process if it runs longer than this.
    pub timeout: Option<Duration>,
    /// Short name used to prefix forwarded output lines.
    pub label: String,
}

impl ProcessSpec {
    /// Starts a spec for `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let label = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            program,
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            timeout: None,
            label,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Arms or disarms the timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the log label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// The command as a single display string.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// The structured result of a finished (or killed) process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal or by the timeout.
    pub exit_code: Option<i32>,
    /// Whether the process reported success.
    pub success: bool,
    /// Whether the process was killed because the timeout elapsed.
    pub timed_out: bool,
    /// Human readable exit status.
    pub status: String,
    /// Trailing stdout lines.
    pub stdout: String,
    /// Trailing stderr lines.
    pub stderr: String,
    /// Wall-clock time from spawn to exit.
    pub elapsed: Duration,
}

impl ProcessOutput {
    /// The last `lines` lines of stderr, for error messages.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Runs external programs to completion.
///
/// [`SystemRunner`] spawns real processes; tests substitute fakes.
pub trait ProcessRunner {
    /// Runs `spec` and blocks until the process exits or is killed.
    ///
    /// # Errors
    /// Returns the I/O error when the process cannot be spawned or waited on.
    /// A process that runs and fails is *not* an error; inspect
    /// [`ProcessOutput::success`].
    fn run(&self, spec: &ProcessSpec) -> io::Result<ProcessOutput>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for &T {
    fn run(&self, spec: &ProcessSpec) -> io::Result<ProcessOutput> {
        (**self).run(spec)
    }
}

/// Spawns real child processes with `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &ProcessSpec) -> io::Result<ProcessOutput> {
        log::debug!("Spawning: {}", spec.command_line());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        configure_command(&mut command);

        let start = Instant::now();
        let mut child = command.spawn()?;

        let stdout = match child.stdout.take() {
            Some(pipe) => Some(forward_lines(pipe, format!("{}:out", spec.label))?),
            None => None,
        };
        let stderr = match child.stderr.take() {
            Some(pipe) => Some(forward_lines(pipe, format!("{}:err", spec.label))?),
            None => None,
        };

        let waited = wait_with_timeout(&mut child, spec.timeout);
        let elapsed = start.elapsed();

        // A descendant that outlived the child can hold the pipes open, so
        // the readers get a bounded grace period after the child is gone.
        let grace_deadline = Instant::now() + READER_GRACE;
        let stdout = stdout
            .map(|c| c.collect(grace_deadline))
            .unwrap_or_default();
        let stderr = stderr
            .map(|c| c.collect(grace_deadline))
            .unwrap_or_default();

        let output = match waited? {
            Some(status) => ProcessOutput {
                exit_code: status.code(),
                success: status.success(),
                timed_out: false,
                status: status.to_string(),
                stdout,
                stderr,
                elapsed,
            },
            None => ProcessOutput {
                exit_code: None,
                success: false,
                timed_out: true,
                status: "timed out".to_string(),
                stdout,
                stderr,
                elapsed,
            },
        };
        log::debug!(
            "'{}' finished with {} in {:.2}s",
            spec.label,
            output.status,
            elapsed.as_secs_f64()
        );
        Ok(output)
    }
}

/// Waits for `child`, killing it and its process group once `timeout`
/// elapses.
///
/// Returns `None` when the child was killed.
fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            log::warn!(
                "Process {} exceeded its {:.1}s timeout, killing it",
                child.id(),
                timeout.as_secs_f64()
            );
            kill_tree(child);
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills the child together with every process it started.
///
/// On unix the child leads its own process group (see
/// [`configure_command`]), so the whole group is signalled.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill(2) has no memory-safety preconditions; a negative
            // pid addresses the process group led by the child.
            let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
            if rc != 0 {
                log::debug!(
                    "killpg({pgid}) failed: {}",
                    io::Error::last_os_error()
                );
            }
        }
    }
    // The child may have exited between the two calls.
    if let Err(e) = child.kill() {
        log::debug!("kill() failed: {e}");
    }
}

/// A reader thread and the tail of the lines it has seen so far.
struct Captured {
    tail: Arc<Mutex<VecDeque<String>>>,
    handle: JoinHandle<()>,
}

impl Captured {
    /// Joins the reader if it finishes before `deadline`, then returns the
    /// captured tail. A reader still blocked on an inherited pipe is left
    /// detached.
    fn collect(self, deadline: Instant) -> String {
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
        if self.handle.is_finished() {
            let _ = self.handle.join();
        } else {
            log::warn!("Output pipe still open after the process ended, detaching its reader");
        }

        let tail = match self.tail.lock() {
            Ok(tail) => tail,
            Err(poisoned) => poisoned.into_inner(),
        };
        tail.iter().fold(String::new(), |mut acc, line| {
            acc.push_str(line);
            acc.push('\n');
            acc
        })
    }
}

fn forward_lines<R>(pipe: R, label: String) -> io::Result<Captured>
where
    R: Read + Send + 'static,
{
    let tail = Arc::new(Mutex::new(VecDeque::with_capacity(MAX_CAPTURED_LINES)));
    let sink = Arc::clone(&tail);
    let handle = thread::Builder::new()
        .name(format!("{label}-pipe"))
        .spawn(move || {
            for line in BufReader::new(pipe).lines() {
                let Ok(line) = line else { break };
                log::debug!("[{label}] {line}");
                let mut tail = match sink.lock() {
                    Ok(tail) => tail,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if tail.len() == MAX_CAPTURED_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        })?;
    Ok(Captured { tail, handle })
}

/// Applies platform-specific flags to a child command.
fn configure_command(command: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_joins_arguments() {
        let spec = ProcessSpec::new("cargo").args(["build", "--release"]);
        assert_eq!(spec.command_line(), "cargo build --release");
        assert_eq!(spec.label, "cargo");
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let output = ProcessOutput {
            stderr: "one\ntwo\nthree\n".to_string(),
            ..ProcessOutput::default()
        };
        assert_eq!(output.stderr_tail(2), "two\nthree");
        assert_eq!(output.stderr_tail(10), "one\ntwo\nthree");
    }

    #[test]
    fn test_resolve_against_keeps_absolute_paths() {
        let base = Path::new("/work");
        assert_eq!(
            resolve_against(base, Path::new("examples/a.toml")),
            PathBuf::from("/work/examples/a.toml")
        );
        #[cfg(unix)]
        assert_eq!(
            resolve_against(base, Path::new("/abs/a.toml")),
            PathBuf::from("/abs/a.toml")
        );
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let spec = ProcessSpec::new("definitely-not-a-real-program-7c1f");
        assert!(SystemRunner.run(&spec).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output_and_status() {
        let spec = ProcessSpec::new("sh")
            .args(["-c", "echo hello; echo oops >&2; exit 3"])
            .env("EXHIBIT_TEST", "1");
        let output = SystemRunner.run(&spec).unwrap();

        assert!(!output.success);
        assert!(!output.timed_out);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr_tail(1), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn test_env_and_working_dir_reach_child() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec::new("sh")
            .args(["-c", "echo \"$EXHIBIT_VALUE\" > marker.txt"])
            .env("EXHIBIT_VALUE", "42")
            .current_dir(dir.path());
        let output = SystemRunner.run(&spec).unwrap();

        assert!(output.success);
        let marker = std::fs::read_to_string(dir.path().join("marker.txt")).unwrap();
        assert_eq!(marker.trim(), "42");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_background_descendants() {
        // `sleep` runs as a grandchild that inherits both pipes.
        let spec = ProcessSpec::new("sh")
            .args(["-c", "sleep 30; echo done"])
            .timeout(Some(Duration::from_millis(200)));
        let started = Instant::now();
        let output = SystemRunner.run(&spec).unwrap();

        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_lingering_descendant_does_not_block_capture() {
        // The child exits at once; the detached grandchild keeps stdout open.
        let spec = ProcessSpec::new("sh").args(["-c", "echo started; sleep 30 &"]);
        let started = Instant::now();
        let output = SystemRunner.run(&spec).unwrap();

        assert!(output.success);
        assert_eq!(output.stdout, "started\n");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let spec = ProcessSpec::new("sh")
            .args(["-c", "exec sleep 30"])
            .timeout(Some(Duration::from_millis(200)));
        let output = SystemRunner.run(&spec).unwrap();

        assert!(output.timed_out);
        assert!(!output.success);
        assert!(output.elapsed < Duration::from_secs(10));
    }
}
