//! Re-entrant step functions with an explicit resumption point.
//!
//! A [`Resumable`] value holds everything that must survive a suspension. Its
//! [`Resumable::step`] is entered with the point where the previous call
//! stopped and runs until it either needs socket readiness or is done.
//! [`Coroutine`] owns the point and the data, and guarantees that:
//!
//! - `step` is never called again once it returned [`Step::Terminated`]
//! - [`Resumable::release`] runs exactly once, on whichever path ends the coroutine
//!
//! # Example
//!
//! ```
//! use nbtls::coroutine::{Coroutine, Resumable, Step};
//! use nbtls::reactor::event::Interest;
//!
//! struct Countdown(u32);
//!
//! impl Resumable for Countdown {
//!     type Point = u32;
//!     type Output = &'static str;
//!
//!     fn step(&mut self, point: &mut u32) -> Step<&'static str> {
//!         if *point == self.0 {
//!             return Step::Terminated("done");
//!         }
//!         *point += 1;
//!         Step::Suspended(Interest::Read)
//!     }
//! }
//!
//! let mut coroutine = Coroutine::new(Countdown(2));
//! assert_eq!(coroutine.resume(), Step::Suspended(Interest::Read));
//! assert_eq!(coroutine.resume(), Step::Suspended(Interest::Read));
//! assert_eq!(coroutine.resume(), Step::Terminated("done"));
//! ```

use crate::reactor::event::Interest;

use std::fmt;

/// What a single step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// Wait for the given direction, then resume.
    Suspended(Interest),
    /// Finished; the coroutine will not run again.
    Terminated(T),
}

/// Data driven by a [`Coroutine`].
pub trait Resumable {
    /// Where execution left off. `Default` is the starting point.
    type Point: Default + Copy + fmt::Debug;
    /// Terminal status, handed out again on every resume after termination.
    type Output: Clone;

    /// Continues from `point` until a suspension or termination.
    ///
    /// Must leave `point` at the location the next call has to resume from.
    fn step(&mut self, point: &mut Self::Point) -> Step<Self::Output>;

    /// Releases held resources. Called once when the coroutine ends.
    fn release(&mut self) {}

    /// Clears per-run state for an explicit [`Coroutine::restart`].
    fn reset(&mut self) {}
}

/// Owner of a [`Resumable`] and its resumption point.
pub struct Coroutine<R: Resumable> {
    point: R::Point,
    data: R,
    outcome: Option<R::Output>,
    resumptions: u64,
}

impl<R: Resumable> Coroutine<R> {
    pub fn new(data: R) -> Self {
        Self {
            point: R::Point::default(),
            data,
            outcome: None,
            resumptions: 0,
        }
    }

    /// Runs the next step, or returns the cached outcome if already terminated.
    pub fn resume(&mut self) -> Step<R::Output> {
        if let Some(outcome) = &self.outcome {
            return Step::Terminated(outcome.clone());
        }

        self.resumptions += 1;

        match self.data.step(&mut self.point) {
            Step::Suspended(interest) => Step::Suspended(interest),
            Step::Terminated(outcome) => {
                self.finish(outcome.clone());
                Step::Terminated(outcome)
            }
        }
    }

    /// Ends the coroutine from outside, e.g. when a readiness wait failed.
    ///
    /// Returns the outcome that now stands: `outcome`, or the earlier one if
    /// the coroutine had already terminated.
    pub fn terminate(&mut self, outcome: R::Output) -> R::Output {
        if let Some(existing) = &self.outcome {
            return existing.clone();
        }

        self.finish(outcome.clone());
        outcome
    }

    /// Moves the point back to the start and clears per-run state.
    ///
    /// Has no effect on a terminated coroutine and returns `false` then.
    pub fn restart(&mut self) -> bool {
        if self.outcome.is_some() {
            return false;
        }

        self.point = R::Point::default();
        self.data.reset();

        true
    }

    pub fn point(&self) -> R::Point {
        self.point
    }

    pub fn is_terminated(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&R::Output> {
        self.outcome.as_ref()
    }

    /// Read-only view of the data between steps.
    pub fn data(&self) -> &R {
        &self.data
    }

    /// Number of times `step` was entered.
    pub fn resumptions(&self) -> u64 {
        self.resumptions
    }

    fn finish(&mut self, outcome: R::Output) {
        self.outcome = Some(outcome);
        self.data.release();
    }
}

impl<R: Resumable> Drop for Coroutine<R> {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            self.data.release();
        }
    }
}

impl<R: Resumable + fmt::Debug> fmt::Debug for Coroutine<R>
where
    R::Output: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("point", &self.point)
            .field("data", &self.data)
            .field("outcome", &self.outcome)
            .finish()
    }
}
