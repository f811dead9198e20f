//! Child process ownership for toolchain runs.

use tokio::process::{Child, Command};

/// RAII guard that kills a child process (and its process group on Unix) on drop.
///
/// Wrap a spawned child immediately after `spawn()` so that a dropped
/// invocation future (task aborted, server shutting down) never leaves a
/// toolchain process behind. Call `disarm()` once the process has exited.
pub(crate) struct ChildGuard {
    child: Child,
    armed: bool,
}

impl ChildGuard {
    pub(crate) fn new(child: Child) -> Self {
        Self { child, armed: true }
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    /// Best-effort SIGKILL of the child's process group (the child alone
    /// elsewhere). Must run before the child is reaped, while its pid is known.
    pub(crate) fn kill_group(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                // SAFETY: killpg has no memory-safety preconditions; a stale pid
                // only yields ESRCH.
                unsafe {
                    if libc::killpg(pid as i32, libc::SIGKILL) == -1 {
                        let _ = self.child.start_kill();
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.armed {
            self.kill_group();
            let _ = self.child.try_wait();
        }
    }
}

/// Put the child in its own session so the whole process group can be killed.
#[cfg(unix)]
pub(crate) fn set_new_session(cmd: &mut Command) {
    use std::io;
    use std::os::unix::process::CommandExt;

    // SAFETY: only async-signal-safe libc calls run between fork and exec.
    unsafe {
        cmd.as_std_mut().pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            // Linux-only: the toolchain dies with the server instead of lingering.
            #[cfg(target_os = "linux")]
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(crate) fn set_new_session(_cmd: &mut Command) {}
