use crate::reactor::event::{Interest, PollEvent};

use libc::EINTR;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Instant;

/// Outcome of a single readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The descriptor satisfies the requested direction.
    Ready,
    /// The deadline elapsed first.
    TimedOut,
    /// The wait itself failed with the contained `errno`.
    Error(i32),
}

/// Blocks until one descriptor is ready in one direction, or a deadline passes.
///
/// This is the only blocking call in the crate. Implementations watch only the
/// descriptor they are handed and must not keep a wait set between calls.
pub trait Multiplexer {
    fn wait(&mut self, file_descriptor: RawFd, interest: Interest, deadline: Instant) -> Readiness;
}

/// [`Multiplexer`] backed by `poll(2)`.
#[derive(Debug, Default)]
pub struct Poller {
    waits: u64,
}

impl Poller {
    pub fn new() -> Self {
        Self { waits: 0 }
    }

    /// Number of waits issued so far.
    pub fn waits(&self) -> u64 {
        self.waits
    }
}

impl Multiplexer for Poller {
    fn wait(&mut self, file_descriptor: RawFd, interest: Interest, deadline: Instant) -> Readiness {
        self.waits += 1;

        loop {
            let mut event = PollEvent::new(file_descriptor, interest);
            let n_events = event.wait(remaining_ms(deadline));

            if n_events < 0 {
                let err = io::Error::last_os_error().raw_os_error().unwrap_or(0);
                if err == EINTR {
                    continue;
                }

                return Readiness::Error(err);
            }

            if n_events == 0 {
                return Readiness::TimedOut;
            }

            if event.is_ready() {
                return Readiness::Ready;
            }
        }
    }
}

/// Milliseconds left until `deadline`, rounded up so a wait never returns
/// just before the deadline and then polls again with zero.
fn remaining_ms(deadline: Instant) -> i32 {
    let remaining = deadline.saturating_duration_since(Instant::now());
    let ms = remaining.as_micros().div_ceil(1000);

    ms.min(i32::MAX as u128) as i32
}
