//! Property-based tests for the session state machine.
//!
//! - partial writes always add up to the payload, in order
//! - only a short chunk ends a message
//! - suspensions follow the direction the transport reported

mod common;

use common::{Call, MockTransport, count};
use nbtls::transport::TransportResult::{self, Success, WouldBlockRead, WouldBlockWrite};
use nbtls::{Interest, Phase, SessionBuilder, Step};

use proptest::prelude::*;

// Sizes of the partial writes, each optionally preceded by a blocked attempt
fn write_plan_strategy() -> impl Strategy<Value = Vec<(usize, bool)>> {
    prop::collection::vec((1usize..=200, any::<bool>()), 1..40)
}

// Blocked handshake attempts: true for read, false for write
fn direction_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..30)
}

#[test]
fn prop_partial_writes_cover_the_payload() {
    proptest!(|(plan in write_plan_strategy())| {
        let total: usize = plan.iter().map(|(size, _)| size).sum();
        let mut script = Vec::new();
        for &(size, blocked) in &plan {
            if blocked {
                script.push(WouldBlockWrite);
            }
            script.push(Success(size));
        }

        let transport = MockTransport::new().writes(script);
        let log = transport.log();
        let mut session = SessionBuilder::new()
            .payload(vec![7u8; total])
            .build(transport)
            .expect("valid configuration");

        let mut sent = 0;
        let outcome = loop {
            match session.resume() {
                Step::Suspended(interest) => {
                    prop_assert_eq!(interest, Interest::Write);
                    prop_assert_eq!(session.point(), Phase::Sending);
                    prop_assert!(session.data().bytes_sent() >= sent);
                    sent = session.data().bytes_sent();
                }
                Step::Terminated(outcome) => break outcome,
            }
        };

        prop_assert_eq!(outcome, Ok(()));
        prop_assert_eq!(session.data().bytes_sent(), total);
        prop_assert_eq!(session.data().total_sent(), total as u64);

        let blocked = plan.iter().filter(|(_, blocked)| *blocked).count();
        prop_assert_eq!(count(&log, |call| matches!(call, Call::Write(_))), plan.len() + blocked);

        // Each attempt offers exactly the bytes not yet accepted; a blocked
        // attempt is retried with the same slice.
        let mut offers = log
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Write(offered) => Some(*offered),
                _ => None,
            })
            .collect::<Vec<_>>();
        offers.dedup();
        prop_assert_eq!(offers.len(), plan.len());

        let mut remaining = total;
        for (offer, &(size, _)) in offers.iter().zip(&plan) {
            prop_assert_eq!(*offer, remaining);
            remaining -= size;
        }
        prop_assert_eq!(remaining, 0);
    });
}

#[test]
fn prop_only_a_short_chunk_ends_the_message() {
    proptest!(|(capacity in 1usize..=64, full_chunks in 0usize..20, tail in 0usize..64)| {
        let tail = tail % capacity;
        let mut script = vec![Success(capacity); full_chunks];
        script.push(Success(tail));

        let transport = MockTransport::new().reads(script);
        let log = transport.log();
        let mut session = SessionBuilder::new()
            .payload(b"request".to_vec())
            .receive_capacity(capacity)
            .build(transport)
            .expect("valid configuration");

        prop_assert_eq!(session.resume(), Step::Terminated(Ok(())));
        prop_assert_eq!(count(&log, |call| matches!(call, Call::Read(_))), full_chunks + 1);
        prop_assert_eq!(session.data().response().len(), full_chunks * capacity + tail);
        prop_assert_eq!(session.data().last_chunk(), tail);
        prop_assert_eq!(session.data().exchanges_completed(), 1);
    });
}

#[test]
fn prop_suspension_follows_the_reported_direction() {
    proptest!(|(directions in direction_strategy())| {
        let script: Vec<TransportResult> = directions
            .iter()
            .map(|&read| if read { WouldBlockRead } else { WouldBlockWrite })
            .collect();

        let transport = MockTransport::new().handshakes(script);
        let mut session = SessionBuilder::new()
            .payload(b"request".to_vec())
            .build(transport)
            .expect("valid configuration");

        let mut observed = Vec::new();
        let outcome = loop {
            match session.resume() {
                Step::Suspended(interest) => {
                    prop_assert_eq!(session.point(), Phase::Handshaking);
                    observed.push(interest == Interest::Read);
                }
                Step::Terminated(outcome) => break outcome,
            }
        };

        prop_assert_eq!(outcome, Ok(()));
        prop_assert_eq!(observed, directions);
    });
}
