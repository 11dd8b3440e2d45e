//! External translator invocation.
//!
//! The merged document is handed to the external translator (`butane`) over
//! stdin; its stdout is the final machine-readable artifact. A version probe
//! runs first, and the main invocation is held to a bounded wait: on timeout
//! the child is killed and the run fails. A drop guard reaps the child on
//! every exit path so no translator process outlives the run.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Errors for translator invocations
#[derive(Debug, thiserror::Error)]
pub enum ExternalToolError {
    #[error("translator {program} could not be started: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("translator {program} did not report a recognizable version (got {output:?})")]
    UnrecognizedVersion { program: PathBuf, output: String },

    #[error("translator exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("translator timed out after {seconds}s and was killed")]
    Timeout { seconds: u64 },

    #[error("failed to talk to translator: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle for the external translator binary.
#[derive(Debug, Clone)]
pub struct Translator {
    program: PathBuf,
    args: Vec<String>,
    files_dir: PathBuf,
    timeout: Duration,
}

impl Translator {
    /// `files_dir` is the directory the translator resolves embedded local
    /// file references against (the project root).
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        files_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            files_dir: files_dir.into(),
            timeout,
        }
    }

    /// Probe `--version` and return the reported version line.
    ///
    /// The output must look like a version report (some word plus a digit);
    /// anything else means the configured program is not the translator we
    /// expect, and the run must not proceed to translation.
    pub fn check_version(&self) -> Result<String, ExternalToolError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|source| ExternalToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.lines().next().unwrap_or("").trim();
        if !output.status.success() || !looks_like_version(first_line) {
            return Err(ExternalToolError::UnrecognizedVersion {
                program: self.program.clone(),
                output: first_line.to_string(),
            });
        }

        tracing::debug!(program = %self.program.display(), version = first_line, "translator version check passed");
        Ok(first_line.to_string())
    }

    /// Translate a document, returning the translator's stdout verbatim.
    pub fn translate(&self, document_yaml: &str) -> Result<Vec<u8>, ExternalToolError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg("--files-dir")
            .arg(&self.files_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExternalToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let mut child = ChildGuard::new(child);

        // drain output on threads first so the translator can never block
        // on a full pipe while we are still feeding it
        let stdout_handle = drain(child.stdout());
        let stderr_handle = drain(child.stderr());

        // feed the document and close stdin so the translator sees EOF
        if let Some(mut stdin) = child.stdin() {
            if let Err(error) = stdin.write_all(document_yaml.as_bytes()) {
                if error.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(error.into());
                }
                // the translator exited before reading everything; its exit
                // status and stderr carry the real diagnostic
            }
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    drop(child); // kills and reaps
                    return Err(ExternalToolError::Timeout {
                        seconds: self.timeout.as_secs(),
                    });
                }
                None => std::thread::sleep(Duration::from_millis(50)),
            }
        };

        let stdout = stdout_handle
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();
        let stderr = stderr_handle
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();

        if !status.success() {
            return Err(ExternalToolError::Failed {
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

/// A version line names something and carries a number.
fn looks_like_version(line: &str) -> bool {
    line.chars().any(|c| c.is_ascii_digit()) && line.chars().any(|c| c.is_alphabetic())
}

fn drain<R: Read + Send + 'static>(
    reader: Option<R>,
) -> Option<std::thread::JoinHandle<Vec<u8>>> {
    reader.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            buffer
        })
    })
}

/// Kills and reaps the wrapped child on drop if it is still running.
struct ChildGuard {
    child: Child,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child }
    }

    fn stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    fn stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    fn stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return; // already exited and reaped
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
