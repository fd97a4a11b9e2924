//! End-to-end dispatch scenarios on virtual time
//!
//! Each test builds a dispatcher on a `ManualClock`, drives the scheduler
//! tick by tick, and observes completed calls through a recording sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use call_center::{
    CallStatus, Cdr, CdrSink, Clock, Dispatcher, ManualClock, Scheduler,
};
use parking_lot::Mutex;

/// Collects every completed CDR for inspection
#[derive(Default)]
struct RecordingSink {
    completed: Mutex<Vec<Cdr>>,
}

impl RecordingSink {
    fn completed(&self) -> Vec<Cdr> {
        self.completed.lock().clone()
    }
}

impl CdrSink for RecordingSink {
    fn consume(&self, cdr: &Cdr) {
        self.completed.lock().push(cdr.clone());
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    sink: Arc<RecordingSink>,
    dispatcher: Arc<Dispatcher>,
    scheduler: Scheduler,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new());
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Arc::new(Dispatcher::new(clock.clone(), sink.clone()));
    let scheduler = Scheduler::new(Arc::clone(&dispatcher));
    Harness {
        clock,
        sink,
        dispatcher,
        scheduler,
    }
}

impl Harness {
    fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    fn enqueue(&self, phone: &str) -> Cdr {
        self.dispatcher.enqueue(Cdr::new(phone, self.clock.now()))
    }
}

#[test]
fn basic_dispatch() {
    let mut h = harness();
    h.dispatcher.set_min_max_response_time(1, 1).unwrap();
    h.dispatcher.set_min_max_call_duration(2, 2).unwrap();
    h.dispatcher.set_n_operators(1).unwrap();
    h.dispatcher.set_max_queue_size(4).unwrap();
    h.dispatcher.set_reject_repeated_calls(true);

    let t0 = h.clock.now();
    let admitted = h.enqueue("A");
    assert_eq!(admitted.status, CallStatus::Ok);
    assert_ne!(admitted.call_id, 0);

    // Still inside the minimum response window: the call only ages.
    h.scheduler.step();
    assert!(h.scheduler.has_pending());
    assert_eq!(h.scheduler.in_flight_len(), 0);

    // At the window boundary the single operator picks it up.
    h.advance(1);
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 1);
    assert_eq!(h.dispatcher.free_operators(), 0);
    assert!(!h.scheduler.has_pending());

    // Completion is due at receive + duration = t0 + 2s.
    h.advance(1);
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 0);
    assert_eq!(h.dispatcher.free_operators(), 1);

    let completed = h.sink.completed();
    assert_eq!(completed.len(), 1);
    let cdr = &completed[0];
    assert_eq!(cdr.status, CallStatus::Ok);
    assert_eq!(cdr.operator_id, Some(1));
    assert_eq!(cdr.call_duration, Some(Duration::from_secs(2)));
    assert_eq!(cdr.response_dt, Some(t0 + Duration::from_secs(1)));
    assert_eq!(cdr.end_dt, Some(t0 + Duration::from_secs(2)));
}

#[test]
fn overload_rejects_third_call() {
    let h = harness();
    h.dispatcher.set_max_queue_size(2).unwrap();

    assert_eq!(h.enqueue("A").status, CallStatus::Ok);
    assert_eq!(h.enqueue("B").status, CallStatus::Ok);
    assert_eq!(h.enqueue("C").status, CallStatus::Overload);
    assert_eq!(h.dispatcher.queue_len(), 2);
}

#[test]
fn duplicate_rejected_under_reject_policy() {
    let h = harness();
    h.dispatcher.set_max_queue_size(4).unwrap();
    h.dispatcher.set_reject_repeated_calls(true);

    assert_eq!(h.enqueue("A").status, CallStatus::Ok);
    assert_eq!(h.enqueue("A").status, CallStatus::AlreadyInQueue);
    assert_eq!(h.dispatcher.queue_len(), 1);
}

#[test]
fn duplicate_replaced_under_replace_policy() {
    let mut h = harness();
    h.dispatcher.set_max_queue_size(4).unwrap();
    h.dispatcher.set_reject_repeated_calls(false);

    let first = h.enqueue("A");
    let second = h.enqueue("A");
    assert_eq!(second.status, CallStatus::Ok);
    assert_eq!(h.dispatcher.queue_len(), 1);

    // The replacement is what reaches the scheduler.
    h.scheduler.step();
    let pending = h.scheduler.pending().unwrap();
    assert_eq!(pending.call_id, second.call_id);
    assert_ne!(pending.call_id, first.call_id);
}

#[test]
fn timeout_without_operators() {
    let mut h = harness();
    h.dispatcher.set_min_max_response_time(1, 2).unwrap();
    h.dispatcher.set_max_queue_size(4).unwrap();

    let t0 = h.clock.now();
    h.enqueue("A");
    h.scheduler.step();
    assert!(h.scheduler.has_pending());

    h.advance(3);
    h.scheduler.step();
    assert!(!h.scheduler.has_pending());

    let completed = h.sink.completed();
    assert_eq!(completed.len(), 1);
    let cdr = &completed[0];
    assert_eq!(cdr.status, CallStatus::Timeout);
    assert_eq!(cdr.end_dt, Some(t0 + Duration::from_secs(3)));
    assert!(cdr.end_dt.unwrap() >= t0 + Duration::from_secs(2));
    assert_eq!(cdr.operator_id, None);
    assert_eq!(cdr.call_duration, None);
}

#[test]
fn queued_call_behind_busy_operator_times_out() {
    let mut h = harness();
    h.dispatcher.set_min_max_response_time(0, 2).unwrap();
    h.dispatcher.set_min_max_call_duration(100, 100).unwrap();
    h.dispatcher.set_n_operators(1).unwrap();
    h.dispatcher.set_max_queue_size(4).unwrap();

    h.enqueue("A");
    h.enqueue("B");
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 1);

    // B holds the pending slot while the only operator is busy.
    h.scheduler.step();
    assert!(h.scheduler.has_pending());

    h.advance(3);
    h.scheduler.step();
    let completed = h.sink.completed();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].phone_number, "B");
    assert_eq!(completed[0].status, CallStatus::Timeout);
}

#[test]
fn shrink_during_service_drops_late_release() {
    let mut h = harness();
    h.dispatcher.set_min_max_response_time(0, 10).unwrap();
    h.dispatcher.set_min_max_call_duration(5, 5).unwrap();
    h.dispatcher.set_n_operators(3).unwrap();
    h.dispatcher.set_max_queue_size(4).unwrap();

    h.enqueue("A");
    h.enqueue("B");
    h.enqueue("C");
    h.scheduler.step();
    h.scheduler.step();
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 3);
    assert_eq!(h.dispatcher.free_operators(), 0);

    h.dispatcher.set_n_operators(2).unwrap();
    assert_eq!(h.dispatcher.n_operators(), 2);

    h.advance(5);
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 0);

    // Operator 3's release was dropped; 1 and 2 returned.
    assert_eq!(h.dispatcher.free_operators(), 2);
    assert_eq!(h.dispatcher.n_operators(), 2);

    let served: Vec<_> = h.sink.completed();
    assert_eq!(served.len(), 3);
    let operators: Vec<_> = served.iter().filter_map(|c| c.operator_id).collect();
    assert!(operators.contains(&3));
}

#[test]
fn completion_is_anchored_to_ingress_instant() {
    let mut h = harness();
    h.dispatcher.set_min_max_response_time(0, 100).unwrap();
    h.dispatcher.set_min_max_call_duration(10, 10).unwrap();
    h.dispatcher.set_n_operators(1).unwrap();
    h.dispatcher.set_max_queue_size(4).unwrap();

    let t0 = h.clock.now();
    h.enqueue("A");
    h.enqueue("B");
    h.scheduler.step();
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 1);
    assert!(h.scheduler.has_pending());

    // A finishes at t0 + 10; B answers on the same tick, but its own
    // completion is still due at its ingress instant + duration, which has
    // already arrived.
    h.advance(10);
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 1);
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 0);

    let completed = h.sink.completed();
    assert_eq!(completed.len(), 2);
    let b = &completed[1];
    assert_eq!(b.phone_number, "B");
    assert_eq!(b.response_dt, Some(t0 + Duration::from_secs(10)));
    assert_eq!(b.end_dt, Some(t0 + Duration::from_secs(10)));
}

#[test]
fn operators_are_conserved_across_a_burst() {
    let mut h = harness();
    h.dispatcher.set_min_max_response_time(0, 100).unwrap();
    h.dispatcher.set_min_max_call_duration(1, 3).unwrap();
    h.dispatcher.set_n_operators(2).unwrap();
    h.dispatcher.set_max_queue_size(8).unwrap();

    for phone in ["A", "B", "C", "D", "E"] {
        h.enqueue(phone);
    }
    for _ in 0..40 {
        h.scheduler.step();
        assert_eq!(
            h.dispatcher.free_operators() + h.scheduler.in_flight_len(),
            h.dispatcher.n_operators()
        );
        h.advance(1);
    }
    assert_eq!(h.sink.completed().len(), 5);
    assert_eq!(h.dispatcher.free_operators(), 2);
}

#[test]
fn setters_enforce_window_constraints() {
    let h = harness();
    h.dispatcher.set_min_max_response_time(2, 6).unwrap();
    h.dispatcher.set_min_max_call_duration(2, 6).unwrap();

    assert!(h.dispatcher.set_min_response_time(7).is_err());
    assert!(h.dispatcher.set_max_response_time(1).is_err());
    assert!(h.dispatcher.set_min_call_duration(0).is_err());
    assert!(h.dispatcher.set_min_call_duration(7).is_err());
    assert!(h.dispatcher.set_max_call_duration(1).is_err());
    assert!(h.dispatcher.set_min_max_response_time(5, 3).is_err());
    assert!(h.dispatcher.set_min_max_call_duration(0, 3).is_err());
    assert!(h.dispatcher.set_n_operators(0).is_err());
    assert!(h.dispatcher.set_max_queue_size(0).is_err());

    // Rejected setters left every value untouched.
    assert_eq!(h.dispatcher.min_response_time(), 2);
    assert_eq!(h.dispatcher.max_response_time(), 6);
    assert_eq!(h.dispatcher.min_call_duration(), 2);
    assert_eq!(h.dispatcher.max_call_duration(), 6);

    assert!(h.dispatcher.set_min_response_time(3).is_ok());
    assert!(h.dispatcher.set_max_response_time(4).is_ok());
    assert_eq!(h.dispatcher.min_response_time(), 3);
    assert_eq!(h.dispatcher.max_response_time(), 4);
}

#[test]
fn equal_end_instants_complete_in_stable_order() {
    let mut h = harness();
    h.dispatcher.set_min_max_response_time(0, 100).unwrap();
    h.dispatcher.set_min_max_call_duration(5, 5).unwrap();
    h.dispatcher.set_n_operators(2).unwrap();
    h.dispatcher.set_max_queue_size(4).unwrap();

    // Same ingress instant and fixed duration: identical completion times.
    h.enqueue("A");
    h.enqueue("B");
    h.scheduler.step();
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 2);

    h.advance(5);
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 0);
    assert_eq!(h.sink.completed().len(), 2);
    assert_eq!(h.dispatcher.free_operators(), 2);
}

#[test]
fn reconfiguration_under_load_keeps_serving() {
    let mut h = harness();
    h.dispatcher.set_min_max_response_time(0, 100).unwrap();
    h.dispatcher.set_min_max_call_duration(2, 2).unwrap();
    h.dispatcher.set_n_operators(1).unwrap();
    h.dispatcher.set_max_queue_size(2).unwrap();

    h.enqueue("A");
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 1);

    // Widen everything mid-flight.
    h.dispatcher.set_n_operators(4).unwrap();
    h.dispatcher.set_max_queue_size(8).unwrap();
    h.enqueue("B");
    h.enqueue("C");
    h.enqueue("D");
    h.scheduler.step();
    h.scheduler.step();
    h.scheduler.step();
    assert_eq!(h.scheduler.in_flight_len(), 4);

    h.advance(2);
    h.scheduler.step();
    assert_eq!(h.sink.completed().len(), 4);
    assert_eq!(h.dispatcher.free_operators(), 4);
}

/// `Instant` arithmetic sanity for the fields the engine reports
#[test]
fn admitted_cdr_reports_ingress_instant() {
    let h = harness();
    h.dispatcher.set_max_queue_size(4).unwrap();
    let before: Instant = h.clock.now();
    let cdr = h.enqueue("A");
    assert_eq!(cdr.receive_dt, before);
    assert_eq!(cdr.response_dt, None);
    assert_eq!(cdr.end_dt, None);
}
