//! Supervised-loop and handoff execution of the managed process

use super::{RestartAction, RestartStrategy, SupervisionOutcome};
use crate::error::{StokerError, StokerResult};
use crate::settings::LaunchConfig;
use crate::shutdown::ShutdownSignal;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

/// Delay between a restart request and the relaunch
const RESTART_DELAY: Duration = Duration::from_secs(2);

/// How long a signalled child gets to exit before SIGKILL
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// One launchable managed-process instance.
///
/// `launch_and_wait` must not return until the process has fully exited;
/// the supervisor relies on that to guarantee a single running instance
/// (overlapping instances double-bind the port and race on the database).
#[async_trait]
pub trait ManagedProcess: Send {
    async fn launch_and_wait(&mut self, shutdown: &mut ShutdownSignal) -> StokerResult<i32>;
}

/// Hook the supervisor calls on a rebuild-and-restart request
#[async_trait]
pub trait Rebuilder: Send {
    async fn rebuild(&mut self) -> StokerResult<()>;
}

/// The real managed process: `<app_exec> start` in the application directory
pub struct AppProcess {
    exec: PathBuf,
    app_dir: PathBuf,
    grace: Duration,
}

impl AppProcess {
    pub fn new(config: &LaunchConfig) -> Self {
        Self {
            exec: config.app_exec.clone(),
            app_dir: config.app_dir.clone(),
            grace: SHUTDOWN_GRACE,
        }
    }
}

#[async_trait]
impl ManagedProcess for AppProcess {
    async fn launch_and_wait(&mut self, shutdown: &mut ShutdownSignal) -> StokerResult<i32> {
        info!("Starting managed process: {} start", self.exec.display());

        let mut child = Command::new(&self.exec)
            .arg("start")
            .current_dir(&self.app_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                StokerError::command_failed(format!("{} start", self.exec.display()), e)
            })?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| {
                    StokerError::command_failed(format!("{} start", self.exec.display()), e)
                })?;
                Ok(status.code().unwrap_or(1))
            }
            _ = shutdown.recv() => {
                info!("Forwarding SIGTERM to managed process");
                if let Some(pid) = child.id() {
                    // SAFETY: pid comes from a live child we own.
                    unsafe { libc::kill(pid as i32, libc::SIGTERM); }
                }
                if timeout(self.grace, child.wait()).await.is_err() {
                    warn!("Managed process ignored SIGTERM for {}s, killing", self.grace.as_secs());
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
                Err(StokerError::Interrupted)
            }
        }
    }
}

/// Exit-code driven relaunch loop.
///
/// Exactly one managed-process instance runs at a time; the loop waits for
/// full exit before classifying the code and deciding.
pub struct Supervisor {
    process: Box<dyn ManagedProcess>,
    rebuilder: Box<dyn Rebuilder>,
    strategy: Box<dyn RestartStrategy>,
    delay: Duration,
}

impl Supervisor {
    pub fn new(
        process: Box<dyn ManagedProcess>,
        rebuilder: Box<dyn Rebuilder>,
        strategy: Box<dyn RestartStrategy>,
    ) -> Self {
        Self {
            process,
            rebuilder,
            strategy,
            delay: RESTART_DELAY,
        }
    }

    #[cfg(test)]
    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run the loop until a fatal exit code or a detaching restart.
    ///
    /// Returns the exit code the orchestrator itself should exit with: a
    /// fatal child code is propagated verbatim, a detaching remote
    /// redeploy yields 0.
    pub async fn run(&mut self, shutdown: &mut ShutdownSignal) -> StokerResult<i32> {
        loop {
            if shutdown.is_triggered() {
                return Err(StokerError::Interrupted);
            }

            let code = self.process.launch_and_wait(shutdown).await?;

            match SupervisionOutcome::classify(code) {
                SupervisionOutcome::Fatal(code) => {
                    error!("Managed process exited fatally with code {}", code);
                    return Ok(code);
                }
                SupervisionOutcome::CleanRestart => {
                    info!("Managed process requested a clean restart");
                    if self.strategy.restart().await? == RestartAction::Detach {
                        return Ok(0);
                    }
                }
                SupervisionOutcome::RebuildRestart => {
                    info!("Managed process requested rebuild-and-restart");
                    // A failed rebuild must not abort the loop: the last
                    // good build is still on disk and can serve traffic.
                    if let Err(e) = self.rebuilder.rebuild().await {
                        warn!("Rebuild failed, restarting on existing assets: {}", e);
                    }
                }
            }

            tokio::select! {
                _ = sleep(self.delay) => {}
                _ = shutdown.recv() => return Err(StokerError::Interrupted),
            }
        }
    }
}

/// Handoff mode: replace the orchestrator's process image with the managed
/// process. Only returns on failure.
#[cfg(unix)]
pub fn handoff(config: &LaunchConfig) -> StokerError {
    use std::os::unix::process::CommandExt;

    info!("Handing off to {} start", config.app_exec.display());
    let err = std::process::Command::new(&config.app_exec)
        .arg("start")
        .current_dir(&config.app_dir)
        .exec();

    StokerError::HandoffFailed {
        command: format!("{} start", config.app_exec.display()),
        source: err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedProcess {
        codes: VecDeque<i32>,
        launches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ManagedProcess for ScriptedProcess {
        async fn launch_and_wait(&mut self, _shutdown: &mut ShutdownSignal) -> StokerResult<i32> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(self.codes.pop_front().expect("script exhausted"))
        }
    }

    struct CountingRebuilder {
        rebuilds: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Rebuilder for CountingRebuilder {
        async fn rebuild(&mut self) -> StokerResult<()> {
            self.rebuilds.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StokerError::BuildFailed {
                    step: "build",
                    code: 1,
                    stderr: "rebuild broke".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct DetachingStrategy;

    #[async_trait]
    impl RestartStrategy for DetachingStrategy {
        async fn restart(&self) -> StokerResult<RestartAction> {
            Ok(RestartAction::Detach)
        }

        fn name(&self) -> &'static str {
            "detaching"
        }
    }

    fn supervisor_for(
        codes: &[i32],
        fail_rebuild: bool,
    ) -> (Supervisor, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let launches = Arc::new(AtomicUsize::new(0));
        let rebuilds = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::new(
            Box::new(ScriptedProcess {
                codes: codes.iter().copied().collect(),
                launches: launches.clone(),
            }),
            Box::new(CountingRebuilder {
                rebuilds: rebuilds.clone(),
                fail: fail_rebuild,
            }),
            Box::new(crate::supervise::LocalExit),
        )
        .with_delay(Duration::ZERO);
        (supervisor, launches, rebuilds)
    }

    #[tokio::test]
    async fn clean_then_rebuild_then_fatal_scenario() {
        // Exit 0, then 200, then 17: two restarts (one with a rebuild),
        // then the loop terminates with 17.
        let (mut supervisor, launches, rebuilds) = supervisor_for(&[0, 200, 17], false);
        let mut shutdown = ShutdownSignal::never();

        let code = supervisor.run(&mut shutdown).await.unwrap();

        assert_eq!(code, 17);
        assert_eq!(launches.load(Ordering::SeqCst), 3);
        assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_code_propagated_without_relaunch() {
        let (mut supervisor, launches, rebuilds) = supervisor_for(&[3], false);
        let mut shutdown = ShutdownSignal::never();

        assert_eq!(supervisor.run(&mut shutdown).await.unwrap(), 3);
        assert_eq!(launches.load(Ordering::SeqCst), 1);
        assert_eq!(rebuilds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rebuild_failure_does_not_abort_loop() {
        let (mut supervisor, launches, rebuilds) = supervisor_for(&[200, 9], true);
        let mut shutdown = ShutdownSignal::never();

        assert_eq!(supervisor.run(&mut shutdown).await.unwrap(), 9);
        assert_eq!(launches.load(Ordering::SeqCst), 2);
        assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn detaching_strategy_ends_loop_with_zero() {
        let launches = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(
            Box::new(ScriptedProcess {
                codes: [0].into_iter().collect(),
                launches: launches.clone(),
            }),
            Box::new(CountingRebuilder {
                rebuilds: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }),
            Box::new(DetachingStrategy),
        )
        .with_delay(Duration::ZERO);
        let mut shutdown = ShutdownSignal::never();

        assert_eq!(supervisor.run(&mut shutdown).await.unwrap(), 0);
        assert_eq!(launches.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn app_process_reports_exit_code() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::TempDir::new().unwrap();
        let exec = dir.path().join("forum");
        std::fs::write(&exec, "#!/bin/sh\nexit 42\n").unwrap();
        std::fs::set_permissions(&exec, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut process = AppProcess {
            exec,
            app_dir: dir.path().to_path_buf(),
            grace: Duration::from_secs(1),
        };
        let mut shutdown = ShutdownSignal::never();

        assert_eq!(process.launch_and_wait(&mut shutdown).await.unwrap(), 42);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn app_process_terminated_on_shutdown() {
        use crate::shutdown::ShutdownController;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let exec = dir.path().join("forum");
        std::fs::write(&exec, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&exec, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut process = AppProcess {
            exec,
            app_dir: dir.path().to_path_buf(),
            grace: Duration::from_secs(2),
        };
        let (controller, mut shutdown) = ShutdownController::new();

        let handle = tokio::spawn(async move {
            process.launch_and_wait(&mut shutdown).await
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        controller.trigger();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, StokerError::Interrupted));
    }
}
