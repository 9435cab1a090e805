use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::launcher::{WorkerExit, WorkerHandle, WorkerLauncher};
use crate::worker::WorkerJob;

/// Launches each worker as a separate executable that attaches to the
/// shared segments by name (see [`crate::worker::run_attached`]).
///
/// The program is invoked as `<program> <prefix args...> <worker flags...>`;
/// with the default prefix that is `tilemul worker --index ...`.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
    prefix: Vec<OsString>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandLauncher {
            program: program.into(),
            prefix: vec![OsString::from("worker")],
        }
    }

    /// Re-invoke the running executable as the worker.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Replace the arguments placed before the worker flags.
    pub fn with_prefix<I, S>(mut self, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.prefix = prefix.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl WorkerLauncher for CommandLauncher {
    fn name(&self) -> &str {
        "command"
    }

    fn launch(&self, job: &WorkerJob<'_>) -> io::Result<Box<dyn WorkerHandle>> {
        let child = Command::new(&self.program)
            .args(&self.prefix)
            .args(job.args().to_args())
            .stdin(Stdio::null())
            .spawn()?;
        Ok(Box::new(ChildWorker { child }))
    }
}

/// A spawned worker executable.
#[derive(Debug)]
pub struct ChildWorker {
    child: Child,
}

impl WorkerHandle for ChildWorker {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn wait(mut self: Box<Self>) -> io::Result<WorkerExit> {
        let status = self.child.wait()?;
        Ok(classify(status))
    }
}

fn classify(status: ExitStatus) -> WorkerExit {
    match status.code() {
        Some(0) => WorkerExit::Success,
        Some(code) => WorkerExit::Failed(code),
        None => signal_of(status),
    }
}

#[cfg(unix)]
fn signal_of(status: ExitStatus) -> WorkerExit {
    use std::os::unix::process::ExitStatusExt;
    status
        .signal()
        .map(WorkerExit::Signaled)
        .unwrap_or(WorkerExit::Failed(-1))
}

#[cfg(not(unix))]
fn signal_of(_status: ExitStatus) -> WorkerExit {
    WorkerExit::Failed(-1)
}
