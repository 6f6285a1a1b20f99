//! Running one job: the runner seam and the default external-process runner.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::job::{JobDescriptor, JobError, ToolLocation};

/// Executes a single job to a terminal state.
///
/// Implementations write the job's trajectory under its output directory;
/// nothing but success or failure flows back to the pool.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: JobDescriptor) -> Result<(), JobError>;
}

/// Launches the external optimizer as a child process, one per job.
///
/// The process is started with `--scenario-file <path> --seed <seed>`. The
/// optimizer's own memory ceiling becomes `-Xmx` on the JVM launcher and
/// `SMAC_MEMORY` for launcher scripts; its wall-clock ceiling kills the child.
/// On Unix each run gets its own process group and the whole group is killed,
/// so a JVM started by a launcher script goes down with it.
#[derive(Debug, Clone, Default)]
pub struct SmacProcessRunner;

impl SmacProcessRunner {
    pub fn new() -> Self {
        Self
    }

    pub fn command(&self, job: &JobDescriptor) -> Command {
        let mut cmd = match &job.tool {
            ToolLocation::Jvm {
                java,
                classpath,
                main_class,
            } => {
                let mut cmd = Command::new(java);
                if let Some(mb) = job.tool_limits.memory_mb {
                    cmd.arg(format!("-Xmx{mb}m"));
                }
                cmd.arg("-cp").arg(classpath).arg(main_class);
                cmd
            }
            ToolLocation::Executable(path) => {
                let mut cmd = Command::new(path);
                if let Some(mb) = job.tool_limits.memory_mb {
                    cmd.env("SMAC_MEMORY", mb.to_string());
                }
                cmd
            }
        };

        cmd.arg("--scenario-file")
            .arg(&job.scenario_file)
            .arg("--seed")
            .arg(job.seed.to_string());

        // Per-evaluation limit maps onto the optimizer's cutoff.
        if let Some(seconds) = job.function_limits.time_s {
            cmd.arg("--cutoff-time").arg(seconds.to_string());
        }

        if let Some(dir) = job.scenario_file.parent() {
            cmd.current_dir(dir);
        }

        let (stdout, stderr) = if job.debug {
            (Stdio::inherit(), Stdio::inherit())
        } else {
            (Stdio::null(), Stdio::null())
        };
        cmd.stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
async fn kill_process_group(pid: u32) {
    let killed = Command::new("kill")
        .args(["-s", "KILL", "--", &format!("-{pid}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match killed {
        Ok(status) if status.success() => debug!("Killed process group {}", pid),
        Ok(status) => warn!("kill for process group {} exited with {}", pid, status),
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: u32) {}

#[async_trait]
impl JobRunner for SmacProcessRunner {
    async fn run(&self, job: JobDescriptor) -> Result<(), JobError> {
        let mut child = self.command(&job).spawn().map_err(|e| JobError::Spawn {
            message: e.to_string(),
        })?;
        info!("Started optimizer run {} (pid {:?})", job.seed, child.id());

        let waited = match job.tool_limits.time_s {
            Some(seconds) => {
                match tokio::time::timeout(Duration::from_secs(seconds), child.wait()).await {
                    Ok(waited) => waited,
                    Err(_) => {
                        warn!("Run {} hit its wall-clock limit of {} s, killing", job.seed, seconds);
                        if let Some(pid) = child.id() {
                            kill_process_group(pid).await;
                        }
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill run {}: {}", job.seed, e);
                        }
                        return Err(JobError::TimedOut { seconds });
                    }
                }
            }
            None => child.wait().await,
        };

        let status = waited.map_err(|e| JobError::Runner {
            message: e.to_string(),
        })?;
        debug!("Run {} exited with {}", job.seed, status);

        if status.success() {
            Ok(())
        } else {
            Err(JobError::ExitStatus {
                code: status.code(),
            })
        }
    }
}
