//! Workers as forked children running a task closure.
//!
//! The child inherits the parent's shared mappings, so it computes directly
//! through the same base addresses. It never returns from [`spawn_task`]:
//! once the task finishes, the child calls `_exit`, skipping destructors
//! (the parent's `SharedSegment` handles must not unlink anything from the
//! child) and any code after the dispatch loop.

use std::io;
use std::panic::{self, AssertUnwindSafe};

use crate::launcher::{WorkerExit, WorkerHandle, WorkerLauncher, PANIC_EXIT_CODE};
use crate::worker::WorkerJob;

/// Exit code for a task that returned an error.
pub const TASK_ERROR_EXIT_CODE: i32 = 2;

/// Launches each worker as a `fork()`ed child of the calling process.
#[derive(Debug, Clone, Default)]
pub struct ForkLauncher;

impl ForkLauncher {
    pub fn new() -> Self {
        ForkLauncher
    }
}

impl WorkerLauncher for ForkLauncher {
    fn name(&self) -> &str {
        "fork"
    }

    fn launch(&self, job: &WorkerJob<'_>) -> io::Result<Box<dyn WorkerHandle>> {
        let pid = spawn_task(|| {
            // SAFETY: the child has its own address space and this is the
            // only view of C in it.
            match unsafe { job.run_in_place() } {
                Ok(()) => 0,
                Err(_) => TASK_ERROR_EXIT_CODE,
            }
        })?;
        Ok(Box::new(ForkedWorker { pid }))
    }
}

/// Fork a child that runs `task` and exits with the code it returns.
///
/// Returns the child's pid in the parent. A panic in the task exits the
/// child with [`PANIC_EXIT_CODE`] without reporting it, since the default
/// hook takes the stderr lock. The task should not allocate or take locks:
/// other threads of the parent do not exist in the child.
pub fn spawn_task<F>(task: F) -> io::Result<libc::pid_t>
where
    F: FnOnce() -> i32,
{
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => run_child(task),
        pid => Ok(pid),
    }
}

fn run_child<F>(task: F) -> !
where
    F: FnOnce() -> i32,
{
    panic::set_hook(Box::new(|_| {}));
    let code = panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or(PANIC_EXIT_CODE);
    unsafe { libc::_exit(code) }
}

/// A forked child awaiting `waitpid`.
#[derive(Debug)]
pub struct ForkedWorker {
    pid: libc::pid_t,
}

impl ForkedWorker {
    /// Wrap a pid obtained from [`spawn_task`].
    pub fn from_pid(pid: libc::pid_t) -> Self {
        ForkedWorker { pid }
    }
}

impl WorkerHandle for ForkedWorker {
    fn id(&self) -> u32 {
        self.pid as u32
    }

    fn wait(self: Box<Self>) -> io::Result<WorkerExit> {
        let mut status: libc::c_int = 0;
        loop {
            let reaped = unsafe { libc::waitpid(self.pid, &mut status, 0) };
            if reaped == self.pid {
                return Ok(decode_status(status));
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

fn decode_status(status: libc::c_int) -> WorkerExit {
    if libc::WIFEXITED(status) {
        match libc::WEXITSTATUS(status) {
            0 => WorkerExit::Success,
            code => WorkerExit::Failed(code),
        }
    } else if libc::WIFSIGNALED(status) {
        WorkerExit::Signaled(libc::WTERMSIG(status))
    } else {
        WorkerExit::Failed(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait(pid: libc::pid_t) -> WorkerExit {
        Box::new(ForkedWorker::from_pid(pid)).wait().unwrap()
    }

    #[test]
    fn test_child_success() {
        let pid = spawn_task(|| 0).unwrap();
        assert!(pid > 0);
        assert_eq!(wait(pid), WorkerExit::Success);
    }

    #[test]
    fn test_child_exit_code() {
        let pid = spawn_task(|| 7).unwrap();
        assert_eq!(wait(pid), WorkerExit::Failed(7));
    }

    #[test]
    fn test_child_panic_is_reported() {
        let pid = spawn_task(|| panic!("worker blew up")).unwrap();
        assert_eq!(wait(pid), WorkerExit::Failed(PANIC_EXIT_CODE));
    }

    #[test]
    fn test_child_panic_leaves_parent_hook_alone() {
        let first = spawn_task(|| panic!("first")).unwrap();
        let second = spawn_task(|| panic!("second")).unwrap();
        assert_eq!(wait(first), WorkerExit::Failed(PANIC_EXIT_CODE));
        assert_eq!(wait(second), WorkerExit::Failed(PANIC_EXIT_CODE));
        // The silent hook was installed in the children only.
        let caught = panic::catch_unwind(|| panic!("parent"));
        assert!(caught.is_err());
    }

    #[test]
    fn test_child_killed_by_signal() {
        let pid = spawn_task(|| {
            unsafe { libc::raise(libc::SIGKILL) };
            0
        })
        .unwrap();
        assert_eq!(wait(pid), WorkerExit::Signaled(libc::SIGKILL));
    }

    #[test]
    fn test_child_does_not_return_to_caller() {
        // Only the parent reaches the code after spawn_task; a child that
        // fell through would exit 0 from the test harness instead of 42.
        let pid = spawn_task(|| 42).unwrap();
        assert_eq!(wait(pid), WorkerExit::Failed(42));
    }

    #[test]
    fn test_wait_unknown_pid_fails() {
        let pid = spawn_task(|| 0).unwrap();
        assert_eq!(wait(pid), WorkerExit::Success);
        assert!(Box::new(ForkedWorker::from_pid(pid)).wait().is_err());
    }
}
