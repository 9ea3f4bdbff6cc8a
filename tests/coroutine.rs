use nbtls::{Coroutine, Interest, Resumable, Step};

use std::cell::Cell;
use std::rc::Rc;

/// Suspends `rounds` times, alternating directions, then finishes with the
/// number of steps it took.
struct Alternating {
    rounds: u32,
    steps: u32,
    releases: Rc<Cell<u32>>,
    resets: u32,
}

impl Alternating {
    fn new(rounds: u32, releases: Rc<Cell<u32>>) -> Self {
        Self {
            rounds,
            steps: 0,
            releases,
            resets: 0,
        }
    }
}

impl Resumable for Alternating {
    type Point = u32;
    type Output = u32;

    fn step(&mut self, point: &mut u32) -> Step<u32> {
        self.steps += 1;

        if *point == self.rounds {
            return Step::Terminated(self.steps);
        }

        *point += 1;
        if *point % 2 == 1 {
            Step::Suspended(Interest::Read)
        } else {
            Step::Suspended(Interest::Write)
        }
    }

    fn release(&mut self) {
        self.releases.set(self.releases.get() + 1);
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

#[test]
fn resumes_from_the_last_suspension_point() {
    let releases = Rc::new(Cell::new(0));
    let mut coroutine = Coroutine::new(Alternating::new(3, releases.clone()));

    assert_eq!(coroutine.point(), 0);
    assert_eq!(coroutine.resume(), Step::Suspended(Interest::Read));
    assert_eq!(coroutine.point(), 1);
    assert_eq!(coroutine.resume(), Step::Suspended(Interest::Write));
    assert_eq!(coroutine.resume(), Step::Suspended(Interest::Read));
    assert_eq!(coroutine.resume(), Step::Terminated(4));
    assert_eq!(coroutine.resumptions(), 4);
    assert_eq!(releases.get(), 1);
}

#[test]
fn terminated_coroutine_never_steps_again() {
    let releases = Rc::new(Cell::new(0));
    let mut coroutine = Coroutine::new(Alternating::new(0, releases.clone()));

    assert_eq!(coroutine.resume(), Step::Terminated(1));
    assert_eq!(coroutine.resume(), Step::Terminated(1));
    assert_eq!(coroutine.resume(), Step::Terminated(1));

    assert!(coroutine.is_terminated());
    assert_eq!(coroutine.outcome(), Some(&1));
    assert_eq!(coroutine.resumptions(), 1);
    assert_eq!(coroutine.data().steps, 1);
    assert_eq!(releases.get(), 1);

    drop(coroutine);
    assert_eq!(releases.get(), 1);
}

#[test]
fn external_termination_releases_once() {
    let releases = Rc::new(Cell::new(0));
    let mut coroutine = Coroutine::new(Alternating::new(10, releases.clone()));

    assert_eq!(coroutine.resume(), Step::Suspended(Interest::Read));
    assert_eq!(coroutine.terminate(99), 99);
    assert_eq!(coroutine.terminate(7), 99);
    assert_eq!(coroutine.resume(), Step::Terminated(99));
    assert_eq!(releases.get(), 1);

    drop(coroutine);
    assert_eq!(releases.get(), 1);
}

#[test]
fn dropping_an_unfinished_coroutine_releases() {
    let releases = Rc::new(Cell::new(0));
    let mut coroutine = Coroutine::new(Alternating::new(10, releases.clone()));

    coroutine.resume();
    drop(coroutine);

    assert_eq!(releases.get(), 1);
}

#[test]
fn restart_returns_to_the_start() {
    let releases = Rc::new(Cell::new(0));
    let mut coroutine = Coroutine::new(Alternating::new(2, releases));

    coroutine.resume();
    coroutine.resume();
    assert_eq!(coroutine.point(), 2);

    assert!(coroutine.restart());
    assert_eq!(coroutine.point(), 0);
    assert_eq!(coroutine.data().resets, 1);
    assert_eq!(coroutine.resume(), Step::Suspended(Interest::Read));

    while !coroutine.is_terminated() {
        coroutine.resume();
    }
    assert!(!coroutine.restart());
}
