//! Property tests for the verification gate state machine.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use burngate::gate::{BeginOutcome, MarkOutcome};
use burngate::{GateError, MemoryStore, SubPath, TokenStatus, VerificationGate};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Begin,
    MarkFirst,
    MarkSecond,
    Cancel,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Add),
        Just(Op::Begin),
        Just(Op::MarkFirst),
        Just(Op::MarkSecond),
        Just(Op::Cancel),
    ]
}

/// Random spellings of the same hash.
fn spelling() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("abc123"), Just("0xABC123"), Just("0xabc123"), Just("ABC123")]
}

proptest! {
    #[test]
    fn gate_transitions_stay_legal(ops in prop::collection::vec((op(), spelling()), 1..40)) {
        let gate = VerificationGate::new(Arc::new(MemoryStore::new()));
        let mut used = false;

        for (op, hash) in ops {
            let before = gate.status(hash);
            let details_before = gate.details(hash);

            match op {
                Op::Add => {
                    let result = gate.add_verified_hash(hash, "owner");
                    prop_assert_eq!(result.is_err(), used);
                }
                Op::Begin => {
                    let result = gate.begin_gated_operation(hash);
                    match before {
                        TokenStatus::Unknown => {
                            prop_assert!(matches!(result, Err(GateError::NotVerified(_))));
                        }
                        TokenStatus::Verified => prop_assert_eq!(result, Ok(BeginOutcome::Locked)),
                        TokenStatus::Locked => prop_assert_eq!(result, Ok(BeginOutcome::Joined)),
                        TokenStatus::Used => {
                            prop_assert!(matches!(result, Err(GateError::AlreadyUsed(_))));
                            prop_assert_eq!(gate.details(hash), details_before);
                        }
                    }
                }
                Op::MarkFirst | Op::MarkSecond => {
                    let which = if matches!(op, Op::MarkFirst) { SubPath::First } else { SubPath::Second };
                    let outcome = gate.mark_sub_path(hash, which);
                    if before != TokenStatus::Locked {
                        prop_assert_eq!(outcome, MarkOutcome::NotTracked);
                    }
                }
                Op::Cancel => {
                    let released = gate.cancel_gated_operation(hash);
                    prop_assert_eq!(released, before == TokenStatus::Locked);
                }
            }

            let after = gate.status(hash);
            if after == TokenStatus::Used && before != TokenStatus::Used {
                prop_assert_eq!(before, TokenStatus::Locked);
                used = true;
            }
            if used {
                prop_assert_eq!(after, TokenStatus::Used);
                prop_assert!(gate.is_used(hash));
            }
        }
    }

    #[test]
    fn paired_session_consumes_in_either_order(first_then_second in any::<bool>()) {
        let gate = VerificationGate::new(Arc::new(MemoryStore::new()));
        gate.add_verified_hash("h", "owner").unwrap();
        gate.begin_gated_operation("h").unwrap();

        let (a, b) = if first_then_second {
            (SubPath::First, SubPath::Second)
        } else {
            (SubPath::Second, SubPath::First)
        };
        prop_assert_eq!(gate.mark_sub_path("h", a), MarkOutcome::Pending);
        prop_assert_eq!(gate.mark_sub_path("h", a), MarkOutcome::Pending);
        prop_assert_eq!(gate.mark_sub_path("h", b), MarkOutcome::Consumed);
        prop_assert_eq!(gate.status("h"), TokenStatus::Used);
    }
}
