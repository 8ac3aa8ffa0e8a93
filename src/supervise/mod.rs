//! Process supervision
//!
//! Launches the managed application and interprets its exit code as a
//! control signal. Two modes: handoff (replace the orchestrator's process
//! image, no loop) and supervised-loop (stay resident and relaunch based
//! on the exit code). Both interpret exit codes identically.

pub mod restart;
mod supervisor;

pub use restart::{build_strategy, LocalExit, RemoteRedeploy, RestartAction, RestartStrategy};
pub use supervisor::{handoff, AppProcess, ManagedProcess, Rebuilder, Supervisor};

/// Exit code by which the managed process requests a rebuild-and-restart
pub const REBUILD_EXIT_CODE: i32 = 200;

/// Classification of a managed-process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionOutcome {
    /// Exit 0: clean restart requested
    CleanRestart,
    /// Exit 200: rebuild, then restart
    RebuildRestart,
    /// Any other code: fatal, propagated verbatim
    Fatal(i32),
}

impl SupervisionOutcome {
    pub fn classify(code: i32) -> Self {
        match code {
            0 => Self::CleanRestart,
            REBUILD_EXIT_CODE => Self::RebuildRestart,
            other => Self::Fatal(other),
        }
    }
}
