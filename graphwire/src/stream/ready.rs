//! Readiness multiplexing over file descriptors.
use {
    crate::error::{invalid_handle, multiplex_fault, Result},
    core::time::Duration,
    nix::{
        errno::Errno,
        poll::{poll, PollFd, PollFlags, PollTimeout},
    },
    std::{
        os::fd::{AsRawFd, BorrowedFd},
        time::Instant,
    },
    tracing::trace,
};

/// Which direction of readiness to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    fn poll_flags(self) -> PollFlags {
        match self {
            Interest::Read => PollFlags::POLLIN,
            Interest::Write => PollFlags::POLLOUT,
        }
    }
}

/// Wait until at least one of `handles` is ready for `interest`, or until
/// `timeout` elapses.
///
/// Returns the indices (into `handles`) of every ready handle, or an empty
/// vector once the timeout has expired. A zero timeout polls once without
/// waiting. Interrupted waits are retried with the remaining time. A handle
/// the kernel reports as invalid raises [`Error::InvalidHandle`](crate::Error::InvalidHandle).
///
/// Hang-up and error conditions count as ready: the following read or write
/// on that handle reports end-of-stream or the fault itself.
pub fn wait_ready(
    timeout: Duration,
    handles: &[BorrowedFd<'_>],
    interest: Interest,
) -> Result<Vec<usize>> {
    let events = interest.poll_flags();
    let mut fds: Vec<PollFd<'_>> = handles.iter().map(|fd| PollFd::new(*fd, events)).collect();
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let remaining = deadline.map_or(Duration::MAX, |deadline| {
            deadline.saturating_duration_since(Instant::now())
        });
        match poll(&mut fds, poll_timeout(remaining)) {
            Ok(0) => {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    return Ok(Vec::new());
                }
                // The wait was capped to one slice or woke early; wait out the rest.
            }
            Ok(_) => return collect_ready(&fds, handles, events),
            Err(Errno::EINTR) => {
                trace!(?remaining, "readiness wait interrupted, retrying");
            }
            Err(errno) => return Err(multiplex_fault(errno)),
        }
    }
}

/// Convert the remaining time to one poll slice in whole milliseconds,
/// rounding up so sub-millisecond remainders still wait.
fn poll_timeout(remaining: Duration) -> PollTimeout {
    let millis = remaining.as_micros().div_ceil(1000);
    PollTimeout::from(u16::try_from(millis).unwrap_or(u16::MAX))
}

fn collect_ready(
    fds: &[PollFd<'_>],
    handles: &[BorrowedFd<'_>],
    events: PollFlags,
) -> Result<Vec<usize>> {
    let wanted = events | PollFlags::POLLERR | PollFlags::POLLHUP;
    let mut ready = Vec::new();
    for (index, (fd, handle)) in fds.iter().zip(handles).enumerate() {
        let revents = fd.revents().unwrap_or(PollFlags::empty());
        if revents.contains(PollFlags::POLLNVAL) {
            return Err(invalid_handle(handle.as_raw_fd()));
        }
        if revents.intersects(wanted) {
            ready.push(index);
        }
    }
    Ok(ready)
}
