// src/capture/redirect.rs

//! Redirection of the process-wide stdout/stderr file descriptors.
//!
//! [`GlobalStreamSlot`] owns the swap of fds 1 and 2 and guarantees they are
//! put back exactly once, on `restore` or on drop. [`StreamRedirector`] builds
//! on it: one pipe per stream, one drain thread per pipe, and a join barrier
//! on deactivation so the sink holds every byte before anyone reads it.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::unistd::{dup2, pipe};
use tracing::{debug, warn};

use crate::capture::sink::SharedSink;
use crate::errors::{ClapLambdaError, Result};

/// Set while some `GlobalStreamSlot` has fds 1 and 2 swapped.
static SLOT_HELD: AtomicBool = AtomicBool::new(false);

/// Exclusive, scoped ownership of the process's stdout/stderr descriptors.
///
/// Only one slot can exist at a time; a second `swap` while one is live
/// fails with [`ClapLambdaError::StreamsBusy`].
#[derive(Debug)]
pub struct GlobalStreamSlot {
    saved_stdout: OwnedFd,
    saved_stderr: OwnedFd,
    restored: bool,
}

impl GlobalStreamSlot {
    /// Point fds 1 and 2 at the given targets, remembering the originals.
    pub fn swap(stdout_target: &OwnedFd, stderr_target: &OwnedFd) -> Result<Self> {
        if SLOT_HELD
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClapLambdaError::StreamsBusy);
        }

        match Self::swap_claimed(stdout_target, stderr_target) {
            Ok(slot) => Ok(slot),
            Err(err) => {
                SLOT_HELD.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    fn swap_claimed(stdout_target: &OwnedFd, stderr_target: &OwnedFd) -> Result<Self> {
        flush_std_streams();

        let saved_stdout = io::stdout()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| ClapLambdaError::PipeSetupFailed(format!("saving stdout: {e}")))?;
        let saved_stderr = io::stderr()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| ClapLambdaError::PipeSetupFailed(format!("saving stderr: {e}")))?;

        dup2(stdout_target.as_raw_fd(), io::stdout().as_raw_fd())
            .map_err(|e| ClapLambdaError::PipeSetupFailed(format!("redirecting stdout: {e}")))?;

        if let Err(e) = dup2(stderr_target.as_raw_fd(), io::stderr().as_raw_fd()) {
            // Leave nothing half-swapped.
            let _ = dup2(saved_stdout.as_raw_fd(), io::stdout().as_raw_fd());
            return Err(ClapLambdaError::PipeSetupFailed(format!(
                "redirecting stderr: {e}"
            )));
        }

        Ok(Self {
            saved_stdout,
            saved_stderr,
            restored: false,
        })
    }

    /// Whether any slot is currently holding the streams.
    pub fn is_held() -> bool {
        SLOT_HELD.load(Ordering::Acquire)
    }

    pub fn saved_stdout(&self) -> &OwnedFd {
        &self.saved_stdout
    }

    pub fn saved_stderr(&self) -> &OwnedFd {
        &self.saved_stderr
    }

    /// Put the original descriptors back and release the slot.
    pub fn restore(mut self) {
        self.restore_once();
    }

    fn restore_once(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;

        flush_std_streams();

        let stdout_res = dup2(self.saved_stdout.as_raw_fd(), io::stdout().as_raw_fd());
        let stderr_res = dup2(self.saved_stderr.as_raw_fd(), io::stderr().as_raw_fd());
        SLOT_HELD.store(false, Ordering::Release);

        // Only log once stderr is ours again.
        if let Err(e) = stdout_res {
            warn!(error = %e, "failed to restore stdout");
        }
        if let Err(e) = stderr_res {
            warn!(error = %e, "failed to restore stderr");
        }
    }
}

impl Drop for GlobalStreamSlot {
    fn drop(&mut self) {
        self.restore_once();
    }
}

/// An active capture window: fds 1/2 redirected into pipes that two drain
/// threads copy into a [`SharedSink`].
///
/// Dropping the redirector deactivates it, so an unwinding panic between
/// `activate` and `deactivate` still restores the streams.
#[derive(Debug)]
pub struct StreamRedirector {
    slot: Option<GlobalStreamSlot>,
    write_ends: Vec<OwnedFd>,
    drains: Vec<JoinHandle<u64>>,
}

impl StreamRedirector {
    /// Redirect stdout and stderr into `sink`.
    ///
    /// With `tee_to_original`, drained bytes are also written to the stream
    /// they were taken from.
    pub fn activate(sink: &SharedSink, tee_to_original: bool) -> Result<Self> {
        let (stdout_read, stdout_write) = new_pipe("stdout")?;
        let (stderr_read, stderr_write) = new_pipe("stderr")?;

        let slot = GlobalStreamSlot::swap(&stdout_write, &stderr_write)?;

        let (stdout_tee, stderr_tee) = if tee_to_original {
            (
                Some(clone_as_file(slot.saved_stdout())?),
                Some(clone_as_file(slot.saved_stderr())?),
            )
        } else {
            (None, None)
        };

        let mut redirector = Self {
            slot: Some(slot),
            write_ends: vec![stdout_write, stderr_write],
            drains: Vec::with_capacity(2),
        };

        // From here on, an early return drops `redirector`, which restores.
        redirector
            .drains
            .push(spawn_drain("capture-stdout", stdout_read, sink.clone(), stdout_tee)?);
        redirector
            .drains
            .push(spawn_drain("capture-stderr", stderr_read, sink.clone(), stderr_tee)?);

        Ok(redirector)
    }

    /// End the capture window and return the number of bytes drained.
    ///
    /// Restores fds 1/2 (dropping their pipe copies), closes the remaining
    /// write ends, then joins both drain threads.
    pub fn deactivate(mut self) -> u64 {
        self.finish()
    }

    fn finish(&mut self) -> u64 {
        if let Some(slot) = self.slot.take() {
            slot.restore();
        }

        // Last write-end references; drains see EOF once these are gone.
        self.write_ends.clear();

        let mut total = 0;
        for handle in self.drains.drain(..) {
            match handle.join() {
                Ok(bytes) => total += bytes,
                Err(_) => warn!("capture drain thread panicked"),
            }
        }
        total
    }
}

impl Drop for StreamRedirector {
    fn drop(&mut self) {
        if self.slot.is_some() || !self.drains.is_empty() {
            let bytes = self.finish();
            debug!(bytes, "capture window closed during unwind or early return");
        }
    }
}

fn new_pipe(stream: &str) -> Result<(OwnedFd, OwnedFd)> {
    let (read_end, write_end) = pipe()
        .map_err(|e| ClapLambdaError::PipeSetupFailed(format!("{stream} pipe: {e}")))?;

    // Subprocesses started by the program inherit fds 1/2, never the raw ends.
    for fd in [&read_end, &write_end] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .map_err(|e| ClapLambdaError::PipeSetupFailed(format!("{stream} pipe flags: {e}")))?;
    }

    Ok((read_end, write_end))
}

fn clone_as_file(fd: &OwnedFd) -> Result<File> {
    let owned = fd
        .try_clone()
        .map_err(|e| ClapLambdaError::PipeSetupFailed(format!("duplicating stream: {e}")))?;
    Ok(File::from(owned))
}

fn spawn_drain(
    name: &str,
    read_end: OwnedFd,
    sink: SharedSink,
    tee: Option<File>,
) -> Result<JoinHandle<u64>> {
    let mut reader = File::from(read_end);

    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let mut target = DrainTarget { sink, tee };
            io::copy(&mut reader, &mut target).unwrap_or(0)
        })
        .map_err(|e| ClapLambdaError::PipeSetupFailed(format!("spawning {name}: {e}")))
}

/// Writer behind each drain: the sink, plus optionally the original stream.
struct DrainTarget {
    sink: SharedSink,
    tee: Option<File>,
}

impl Write for DrainTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.sink.append(buf);
        if let Some(tee) = self.tee.as_mut() {
            if tee.write_all(buf).is_err() {
                // Stop teeing; capture itself must not fail.
                self.tee = None;
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(tee) = self.tee.as_mut() {
            let _ = tee.flush();
        }
        Ok(())
    }
}

fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}
