pub mod command;
#[cfg(unix)]
pub mod fork;

use std::fmt::{self, Debug};
use std::io;

use crate::worker::WorkerJob;

pub use command::CommandLauncher;
#[cfg(unix)]
pub use fork::ForkLauncher;

/// Exit code a worker reports when its task panicked.
pub const PANIC_EXIT_CODE: i32 = 101;

/// How a worker process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Exited with status 0.
    Success,
    /// Exited with a non-zero status.
    Failed(i32),
    /// Killed by a signal.
    Signaled(i32),
}

impl WorkerExit {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkerExit::Success)
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Success => write!(f, "exited normally"),
            WorkerExit::Failed(code) => write!(f, "exited with status {code}"),
            WorkerExit::Signaled(signal) => write!(f, "killed by signal {signal}"),
        }
    }
}

/// Trait for the ways a worker can be started (forked child, spawned
/// executable, ...).
///
/// `launch` must return as soon as the worker is running; it must not wait
/// for the computation. The engine calls `launch` once per tile range and
/// later waits on every handle it got back.
pub trait WorkerLauncher: Send + Sync + Debug {
    /// Returns the name of this launcher (e.g. "fork", "command").
    fn name(&self) -> &str;

    /// Start a worker for `job`.
    fn launch(&self, job: &WorkerJob<'_>) -> io::Result<Box<dyn WorkerHandle>>;
}

/// A running worker that can be waited on exactly once.
pub trait WorkerHandle {
    /// OS process id, for logs and reports.
    fn id(&self) -> u32;

    /// Block until the worker terminates.
    fn wait(self: Box<Self>) -> io::Result<WorkerExit>;
}

/// The launcher the engine uses when none is given.
#[cfg(unix)]
pub fn default_launcher() -> Box<dyn WorkerLauncher> {
    Box::new(ForkLauncher::new())
}

/// The launcher the engine uses when none is given.
#[cfg(not(unix))]
pub fn default_launcher() -> Box<dyn WorkerLauncher> {
    Box::new(CommandLauncher::current_exe().unwrap_or_else(|_| CommandLauncher::new("tilemul")))
}
