//! Readiness polling for the single-threaded dispatch loop.
//!
//! One control thread interleaves input, subprocess output, and cooperative
//! deadlines through a single `poll(2)` cycle. There is no timer thread:
//! every wake-up recomputes the earliest pending deadline and passes it as
//! the poll timeout.

use std::os::fd::BorrowedFd;
use std::time::{Duration, Instant};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::error::LauncherError;

/// Which cooperative deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// A feedback evaluation exceeded its ceiling.
    FeedbackCeiling,
    /// The loading indicator is due for its next frame.
    LoadingFrame,
    /// The calculator's quiet period elapsed.
    CalcDebounce,
}

/// Pending deadlines, recomputed before every poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadlines {
    pub feedback_kill: Option<Instant>,
    pub loading_frame: Option<Instant>,
    pub calc_debounce: Option<Instant>,
}

impl Deadlines {
    /// The soonest pending deadline, if any.
    pub fn earliest(&self) -> Option<(Instant, TimeoutKind)> {
        let candidates = [
            (self.feedback_kill, TimeoutKind::FeedbackCeiling),
            (self.loading_frame, TimeoutKind::LoadingFrame),
            (self.calc_debounce, TimeoutKind::CalcDebounce),
        ];
        candidates
            .into_iter()
            .filter_map(|(instant, kind)| instant.map(|i| (i, kind)))
            .min_by_key(|(instant, _)| *instant)
    }

    /// Deadlines at or before `now`, in no particular order. The caller
    /// must handle all of them on each wake-up, including wake-ups caused
    /// purely by expiry.
    pub fn expired(&self, now: Instant) -> Vec<TimeoutKind> {
        let mut fired = Vec::new();
        if self.feedback_kill.is_some_and(|d| now >= d) {
            fired.push(TimeoutKind::FeedbackCeiling);
        }
        if self.loading_frame.is_some_and(|d| now >= d) {
            fired.push(TimeoutKind::LoadingFrame);
        }
        if self.calc_debounce.is_some_and(|d| now >= d) {
            fired.push(TimeoutKind::CalcDebounce);
        }
        fired
    }
}

/// What a poll cycle observed. Input readiness is reported before process
/// readiness so input handling always precedes any redraw within a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub input: bool,
    pub process: bool,
    pub timed_out: bool,
}

/// Block until the input source or the subprocess pipe is readable, or the
/// timeout expires. Either fd may be absent.
pub fn wait_next(
    input: Option<BorrowedFd>,
    process: Option<BorrowedFd>,
    timeout: Option<Duration>,
) -> Result<Readiness, LauncherError> {
    let mut fds = Vec::with_capacity(2);
    let mut input_idx = None;
    let mut process_idx = None;

    if let Some(fd) = input {
        input_idx = Some(fds.len());
        fds.push(PollFd::new(fd, PollFlags::POLLIN));
    }
    if let Some(fd) = process {
        process_idx = Some(fds.len());
        fds.push(PollFd::new(fd, PollFlags::POLLIN));
    }

    let poll_timeout = match timeout {
        Some(duration) => {
            let millis = duration.as_millis().min(i32::MAX as u128) as i32;
            PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX)
        }
        None => PollTimeout::NONE,
    };

    let ready = poll(&mut fds, poll_timeout)?;
    if ready == 0 {
        return Ok(Readiness {
            timed_out: true,
            ..Default::default()
        });
    }

    let is_ready = |idx: Option<usize>| {
        idx.and_then(|i| fds[i].revents())
            .map(|revents| {
                revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
            })
            .unwrap_or(false)
    };

    Ok(Readiness {
        input: is_ready(input_idx),
        process: is_ready(process_idx),
        timed_out: false,
    })
}

/// Poll timeout for the next cycle: time until the earliest deadline, or
/// `None` to block indefinitely.
pub fn timeout_until(deadlines: &Deadlines, now: Instant) -> Option<Duration> {
    deadlines
        .earliest()
        .map(|(instant, _)| instant.saturating_duration_since(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    #[test]
    fn earliest_picks_soonest_deadline() {
        let now = Instant::now();
        let deadlines = Deadlines {
            feedback_kill: Some(now + Duration::from_secs(60)),
            loading_frame: Some(now + Duration::from_millis(400)),
            calc_debounce: Some(now + Duration::from_millis(900)),
        };
        let (_, kind) = deadlines.earliest().unwrap();
        assert_eq!(kind, TimeoutKind::LoadingFrame);
    }

    #[test]
    fn no_deadlines_means_block_forever() {
        let deadlines = Deadlines::default();
        assert!(deadlines.earliest().is_none());
        assert!(timeout_until(&deadlines, Instant::now()).is_none());
    }

    #[test]
    fn expired_reports_all_due() {
        let now = Instant::now();
        let deadlines = Deadlines {
            feedback_kill: Some(now - Duration::from_secs(1)),
            loading_frame: Some(now + Duration::from_secs(1)),
            calc_debounce: Some(now),
        };
        let fired = deadlines.expired(now);
        assert!(fired.contains(&TimeoutKind::FeedbackCeiling));
        assert!(fired.contains(&TimeoutKind::CalcDebounce));
        assert!(!fired.contains(&TimeoutKind::LoadingFrame));
    }

    #[test]
    fn poll_times_out_with_no_fds() {
        let ready = wait_next(None, None, Some(Duration::from_millis(5))).unwrap();
        assert!(ready.timed_out);
        assert!(!ready.input);
        assert!(!ready.process);
    }

    #[test]
    fn poll_reports_readable_pipe() {
        let (read_end, write_end) = nix::unistd::pipe().unwrap();
        nix::unistd::write(&write_end, b"x").unwrap();

        let ready = wait_next(
            None,
            Some(read_end.as_fd()),
            Some(Duration::from_millis(100)),
        )
        .unwrap();
        assert!(ready.process);
        assert!(!ready.timed_out);
    }

    #[test]
    fn poll_reports_hangup_as_readable() {
        let (read_end, write_end) = nix::unistd::pipe().unwrap();
        drop(write_end);

        let ready = wait_next(
            None,
            Some(read_end.as_fd()),
            Some(Duration::from_millis(100)),
        )
        .unwrap();
        assert!(ready.process);
    }
}
