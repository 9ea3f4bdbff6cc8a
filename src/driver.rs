//! Outer loop driving one session to termination.
//!
//! Alternates between resuming the session and waiting for the readiness it
//! asked for. The wait is bounded by a deadline fixed per exchange: it is armed
//! when the driver starts and re-armed each time an exchange completes.

use crate::coroutine::Step;
use crate::error::SessionError;
use crate::reactor::poller::{Multiplexer, Readiness};
use crate::session::Session;
use crate::transport::Transport;

use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Deadline for one exchange unless configured otherwise.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3 * 60);

/// Summary of a successfully terminated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Report {
    pub exchanges: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Owns a session and the multiplexer it waits on.
pub struct Driver<T: Transport, M: Multiplexer> {
    session: Session<T>,
    multiplexer: M,
    deadline: Duration,
    suspensions: u64,
}

impl<T: Transport, M: Multiplexer> Driver<T, M> {
    pub fn new(session: Session<T>, multiplexer: M) -> Self {
        Self {
            session,
            multiplexer,
            deadline: DEFAULT_DEADLINE,
            suspensions: 0,
        }
    }

    /// Time allowed for one exchange, from connect to the end of the response.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn multiplexer(&self) -> &M {
        &self.multiplexer
    }

    /// Number of readiness waits requested by the session so far.
    pub fn suspensions(&self) -> u64 {
        self.suspensions
    }

    /// Runs the session until it terminates.
    ///
    /// # Returns
    /// A [`Report`] when every configured exchange completed, otherwise the
    /// error that ended the session. The transport has been released in both
    /// cases.
    pub fn run(&mut self) -> Result<Report, SessionError> {
        let mut exchange = self.session.data().exchanges_completed();
        let mut deadline = Instant::now() + self.deadline;

        loop {
            let interest = match self.session.resume() {
                Step::Terminated(outcome) => {
                    return outcome.map(|()| self.report());
                }
                Step::Suspended(interest) => interest,
            };

            let completed = self.session.data().exchanges_completed();
            if completed != exchange {
                exchange = completed;
                deadline = Instant::now() + self.deadline;
                debug!(exchange, "deadline re-armed");
            }

            self.suspensions += 1;
            let file_descriptor = self.session.data().transport().as_raw_fd();
            trace!(file_descriptor, %interest, "waiting for readiness");

            match self.multiplexer.wait(file_descriptor, interest, deadline) {
                Readiness::Ready => {}
                Readiness::TimedOut => return Err(self.abort(SessionError::Timeout { interest })),
                Readiness::Error(os) => return Err(self.abort(SessionError::Multiplexer { os })),
            }
        }
    }

    fn abort(&mut self, err: SessionError) -> SessionError {
        warn!(%err, point = ?self.session.point(), "session aborted");

        self.session.terminate(Err(err.clone())).err().unwrap_or(err)
    }

    fn report(&self) -> Report {
        let context = self.session.data();

        Report {
            exchanges: context.exchanges_completed(),
            bytes_sent: context.total_sent(),
            bytes_received: context.total_received(),
        }
    }
}
