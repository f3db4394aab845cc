//! Runs the TLS grading engine against one domain and turns whatever happens
//! into a [`ScanOutcome`].
//!
//! - The engine writes a flat JSON report to an artifact file unique to each run.
//! - A hard wall-clock timeout kills the engine's whole process group.
//! - The artifact is removed on every path by [`OutputArtifact`]'s `Drop`.
//! - No error leaves [`ScanExecutor::scan`]; failures become `"ERR"` outcomes.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ::time::OffsetDateTime;
use tokio::process::{Child, Command};
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ScanError;
use crate::report::{parse_report, summarize, ReportSummary};
use crate::types::{ScanOutcome, GRADE_ERR};

#[derive(Debug, Clone)]
pub struct ScanExecutor {
    shell: PathBuf,
    engine: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
}

impl ScanExecutor {
    pub fn new(config: &Config) -> Self {
        Self {
            shell: config.engine_shell.clone(),
            engine: config.engine_path.clone(),
            work_dir: config.work_dir.clone(),
            timeout: config.scan_timeout,
        }
    }

    /// Scan `domain` and always produce an outcome, stamped with the start time.
    pub async fn scan(&self, domain: &str) -> ScanOutcome {
        info!(domain, "Scanning");
        let scanned_at = OffsetDateTime::now_utc();

        let summary = match self.run(domain).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(domain, error = %err, "Scan did not produce a grade");
                ReportSummary {
                    grade: GRADE_ERR.to_string(),
                    findings_summary: err.to_string(),
                }
            }
        };

        ScanOutcome {
            grade: summary.grade,
            findings_summary: summary.findings_summary,
            scanned_at,
        }
    }

    async fn run(&self, domain: &str) -> Result<ReportSummary, ScanError> {
        let artifact = OutputArtifact::prepare(artifact_path(&self.work_dir, domain))?;

        let status = self.run_engine(domain, artifact.path()).await?;
        debug!(domain, %status, "Engine exited");

        // The engine exits non-zero when it finds problems, so only the report counts.
        let bytes = match tokio::fs::read(artifact.path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ScanError::OutputMissing),
            Err(e) => return Err(e.into()),
        };
        let records = parse_report(&bytes)?;
        Ok(summarize(&records))
    }

    async fn run_engine(&self, domain: &str, output: &Path) -> Result<ExitStatus, ScanError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.engine)
            .arg("--jsonfile")
            .arg(output)
            .args(["--quiet", "--warnings", "off"])
            .arg(domain)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        // Own group, so a timeout can reach the engine's openssl children too.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            ScanError::Execution(format!(
                "failed to launch {} {}: {e}",
                self.shell.display(),
                self.engine.display()
            ))
        })?;

        let waited = time::timeout(self.timeout, child.wait()).await;
        match waited {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!(domain, timeout_secs = self.timeout.as_secs_f64(), "Scan timed out");
                kill_engine(&mut child, domain).await;
                Err(ScanError::Timeout(self.timeout))
            }
        }
    }
}

async fn kill_engine(child: &mut Child, domain: &str) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                warn!(domain, pid, error = %e, "Failed to kill engine process group");
            }
        }
    }
    if let Err(e) = child.kill().await {
        warn!(domain, error = %e, "Failed to kill timed-out engine");
    }
}

static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fresh artifact location for one run against `domain`:
/// `temp_<domain>_<pid>-<seq>.json`. Anything outside `[A-Za-z0-9.-_]` in the
/// domain is replaced so the name stays inside `work_dir`, and no two calls
/// return the same path, even for the same domain.
pub fn artifact_path(work_dir: &Path, domain: &str) -> PathBuf {
    let safe: String = domain
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    work_dir.join(format!("temp_{safe}_{}-{seq}.json", std::process::id()))
}

/// Engine report file that is removed when dropped.
#[derive(Debug)]
struct OutputArtifact {
    path: PathBuf,
}

impl OutputArtifact {
    /// Clears any stale report first; the engine refuses to overwrite one.
    fn prepare(path: PathBuf) -> Result<Self, ScanError> {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed stale report"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ScanError::Execution(format!(
                    "cannot clear stale report {}: {e}",
                    path.display()
                )))
            }
        }
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed report"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove report"),
        }
    }
}
