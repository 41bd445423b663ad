//! Turn Queue Semantics Suite
//!
//! Exercises the deferred-work contract on manually pumped queues:
//!   - Escalation: unobserved errors become panics on a later turn (001-005)
//!   - Isolation: listener panics re-raise without losing siblings (001-003)
//!
//! Every thunk here runs on a private queue so escalation timing is under
//! test control.

#![allow(clippy::redundant_clone)]

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thunklet::test_utils::{init_test_logging, pending_pair_on, test_queue};
use thunklet::{test_complete, test_phase, OriginCapture, Thunk};

fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload.downcast_ref::<String>().cloned().unwrap_or_else(|| {
        payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .unwrap_or_default()
    })
}

// =============================================================================
// Escalation (001-005)
// =============================================================================

/// ESCALATE-001: An unobserved error settlement panics when its queue turn
/// runs, not inside the settling call.
#[test]
fn escalate_001_unobserved_error_panics_on_later_turn() {
    init_test("escalate_001_unobserved_error_panics_on_later_turn");

    let queue = test_queue();
    let (_thunk, settle) = pending_pair_on::<i32, String>(&queue);
    assert!(settle.err("nobody listened".into()));
    assert_eq!(queue.pending(), 1);

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    let message = panic_message(outcome.unwrap_err().as_ref());
    assert!(message.contains("unobserved thunk error"));
    assert!(message.contains("nobody listened"));
    assert!(queue.is_idle());
    test_complete!("escalate_001_unobserved_error_panics_on_later_turn");
}

/// ESCALATE-002: A listener attached before settlement suppresses
/// escalation entirely.
#[test]
fn escalate_002_prior_listener_schedules_nothing() {
    init_test("escalate_002_prior_listener_schedules_nothing");

    let queue = test_queue();
    let (thunk, settle) = pending_pair_on::<i32, String>(&queue);
    thunk.observe(|_| {}).unwrap();
    assert!(settle.err("handled".into()));
    assert!(queue.is_idle());
    test_complete!("escalate_002_prior_listener_schedules_nothing");
}

/// ESCALATE-003: Attaching between settlement and the queue turn defuses
/// the already scheduled escalation.
#[test]
fn escalate_003_late_listener_defuses_pending_escalation() {
    init_test("escalate_003_late_listener_defuses_pending_escalation");

    let queue = test_queue();
    let (thunk, settle) = pending_pair_on::<i32, String>(&queue);
    assert!(settle.err("caught in time".into()));
    assert_eq!(queue.pending(), 1);

    thunk.observe(|_| {}).unwrap();
    queue.run_turn();
    assert!(queue.is_idle());
    test_complete!("escalate_003_late_listener_defuses_pending_escalation");
}

/// ESCALATE-004: Value and error accessors are not observation; only a
/// listener silences escalation.
#[test]
fn escalate_004_accessors_do_not_observe() {
    init_test("escalate_004_accessors_do_not_observe");

    let queue = test_queue();
    let (thunk, settle) = pending_pair_on::<i32, String>(&queue);
    assert!(settle.err("peeked at".into()));
    assert_eq!(thunk.error(), Some("peeked at".into()));
    assert_eq!(thunk.value(), None);
    assert!(thunk.outcome().is_some());

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    assert!(panic_message(outcome.unwrap_err().as_ref()).contains("peeked at"));
    test_complete!("escalate_004_accessors_do_not_observe");
}

/// ESCALATE-005: Escalations fire in settlement order, one per turn.
#[test]
fn escalate_005_escalations_follow_settlement_order() {
    init_test("escalate_005_escalations_follow_settlement_order");

    let queue = test_queue();
    let (_first, settle_first) = pending_pair_on::<i32, String>(&queue);
    let (_second, settle_second) = pending_pair_on::<i32, String>(&queue);
    assert!(settle_first.err("first failure".into()));
    assert!(settle_second.err("second failure".into()));
    assert_eq!(queue.pending(), 2);

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    assert!(panic_message(outcome.unwrap_err().as_ref()).contains("first failure"));
    assert_eq!(queue.pending(), 1);

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    assert!(panic_message(outcome.unwrap_err().as_ref()).contains("second failure"));
    assert!(queue.is_idle());
    test_complete!("escalate_005_escalations_follow_settlement_order");
}

/// ESCALATE-006: Success settlements never touch the queue.
#[test]
fn escalate_006_success_schedules_nothing() {
    init_test("escalate_006_success_schedules_nothing");

    let queue = test_queue();
    let (thunk, settle) = pending_pair_on::<i32, String>(&queue);
    assert!(settle.ok(1));
    assert!(queue.is_idle());
    assert_eq!(thunk.value(), Some(1));
    test_complete!("escalate_006_success_schedules_nothing");
}

/// ESCALATE-007: With origin capture enabled the escalation message names
/// the construction site.
#[test]
fn escalate_007_escalation_carries_origin() {
    init_test("escalate_007_escalation_carries_origin");

    let queue = test_queue();
    let thunk: Thunk<i32, String> = Thunk::<i32, String>::builder()
        .queue(Arc::clone(&queue))
        .origin_capture(OriginCapture::Full)
        .spawn(|settle| {
            settle.err("traced failure".into());
        });
    assert!(thunk.origin().is_some());

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    let message = panic_message(outcome.unwrap_err().as_ref());
    assert!(message.contains("traced failure"));
    assert!(message.contains("origin:"));
    test_complete!("escalate_007_escalation_carries_origin");
}

// =============================================================================
// Listener Panic Isolation (001-003)
// =============================================================================

/// ISOLATE-001: A panicking listener does not stop the drain; its panic
/// resurfaces on the next queue turn.
#[test]
fn isolate_001_listener_panic_deferred_not_swallowed() {
    init_test("isolate_001_listener_panic_deferred_not_swallowed");

    let queue = test_queue();
    let (thunk, settle) = pending_pair_on::<i32, String>(&queue);
    let survivors = Arc::new(AtomicUsize::new(0));
    thunk.observe(|_| panic!("listener boom")).unwrap();
    let s = Arc::clone(&survivors);
    thunk
        .observe(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(settle.ok(5));
    assert_eq!(survivors.load(Ordering::SeqCst), 1);
    assert_eq!(queue.pending(), 1);

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    assert_eq!(panic_message(outcome.unwrap_err().as_ref()), "listener boom");
    test_complete!("isolate_001_listener_panic_deferred_not_swallowed");
}

/// ISOLATE-002: Several panicking listeners re-raise in registration
/// order, one per turn.
#[test]
fn isolate_002_panics_resurface_in_order() {
    init_test("isolate_002_panics_resurface_in_order");

    let queue = test_queue();
    let (thunk, settle) = pending_pair_on::<i32, String>(&queue);
    thunk.observe(|_| panic!("first boom")).unwrap();
    let mid = Arc::new(AtomicUsize::new(0));
    let m = Arc::clone(&mid);
    thunk
        .observe(move |_| {
            m.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    thunk.observe(|_| panic!("second boom")).unwrap();

    assert!(settle.ok(7));
    assert_eq!(mid.load(Ordering::SeqCst), 1);
    assert_eq!(queue.pending(), 2);

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    assert_eq!(panic_message(outcome.unwrap_err().as_ref()), "first boom");
    assert_eq!(queue.pending(), 1);

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    assert_eq!(panic_message(outcome.unwrap_err().as_ref()), "second boom");
    assert!(queue.is_idle());
    test_complete!("isolate_002_panics_resurface_in_order");
}

/// ISOLATE-003: An inline delivery that panics defers the payload the same
/// way a drain does.
#[test]
fn isolate_003_inline_delivery_panic_is_deferred() {
    init_test("isolate_003_inline_delivery_panic_is_deferred");

    let queue = test_queue();
    let thunk: Thunk<i32, String> = Thunk::<i32, String>::builder()
        .queue(Arc::clone(&queue))
        .spawn(|settle| {
            settle.ok(11);
        });
    thunk.observe(|_| panic!("late boom")).unwrap();
    assert_eq!(queue.pending(), 1);

    let outcome = catch_unwind(AssertUnwindSafe(|| queue.run_turn()));
    assert_eq!(panic_message(outcome.unwrap_err().as_ref()), "late boom");
    test_complete!("isolate_003_inline_delivery_panic_is_deferred");
}
