//! Dispatch engine
//!
//! The [`Dispatcher`] owns the admission queue, the operator pool, and the
//! runtime tunables, and exposes two interfaces: `enqueue` for producers and
//! the setter family for the configuration reloader. The [`Scheduler`] is
//! the single-threaded loop that couples the queue to the pool, ages calls
//! through the response-time window, and completes them on schedule.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cdr::{CallId, CallStatus, Cdr, OperatorId};
use crate::clock::Clock;
use crate::error::{CallCenterError, CallCenterResult};
use crate::pool::OperatorPool;
use crate::queue::{PushOutcome, UniqueQueue};
use crate::rng;
use crate::sink::CdrSink;

/// Upper bound on one scheduler sleep, so fresh enqueues are noticed
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runtime tunables guarded by the configuration lock
///
/// Both windows hold `min <= max` across every setter; the paired setters
/// commit both ends under one write lock.
#[derive(Debug, Clone, Copy)]
struct Tunables {
    min_response_time: Duration,
    max_response_time: Duration,
    min_call_duration: Duration,
    max_call_duration: Duration,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            min_response_time: Duration::from_secs(1),
            max_response_time: Duration::from_secs(1),
            min_call_duration: Duration::from_secs(1),
            max_call_duration: Duration::from_secs(1),
        }
    }
}

/// Call-center dispatch engine
///
/// Construct one per process, share it behind an `Arc` with the ingress and
/// the configuration reloader, and hand it to a [`Scheduler`] for the
/// dispatch loop.
pub struct Dispatcher {
    config: RwLock<Tunables>,
    queue: UniqueQueue<Cdr>,
    pool: Mutex<OperatorPool>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn CdrSink>,
}

impl Dispatcher {
    /// New engine with no operators, a single queue slot, and one-second
    /// response and duration windows; apply a configuration to size it.
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn CdrSink>) -> Self {
        Self {
            config: RwLock::new(Tunables::default()),
            queue: UniqueQueue::new(1),
            pool: Mutex::new(OperatorPool::new(0)),
            clock,
            sink,
        }
    }

    // --- ingress interface ---

    /// Admit a call: assign its id, push it, and report the admission status
    /// back on the returned CDR.
    pub fn enqueue(&self, mut cdr: Cdr) -> Cdr {
        cdr.call_id = rng::call_id();
        cdr.status = match self.queue.push(cdr.clone()) {
            PushOutcome::Inserted | PushOutcome::Reassigned => {
                info!(
                    call_id = cdr.call_id,
                    phone_number = %cdr.phone_number,
                    "pushed call"
                );
                CallStatus::Ok
            }
            PushOutcome::Overload => {
                info!(call_id = cdr.call_id, "call queue overloaded");
                CallStatus::Overload
            }
            PushOutcome::AlreadyInQueue => {
                info!(call_id = cdr.call_id, "call already in queue");
                CallStatus::AlreadyInQueue
            }
        };
        cdr
    }

    // --- configuration interface ---

    pub fn set_min_response_time(&self, secs: u64) -> CallCenterResult<()> {
        let mut tunables = self.config.write();
        let value = Duration::from_secs(secs);
        if value > tunables.max_response_time {
            debug!(min_response_time = secs, "rejected parameter update");
            return Err(CallCenterError::InvalidParam(format!(
                "minResponseTime: {secs}"
            )));
        }
        tunables.min_response_time = value;
        debug!(min_response_time = secs, "parameter updated");
        Ok(())
    }

    pub fn set_max_response_time(&self, secs: u64) -> CallCenterResult<()> {
        let mut tunables = self.config.write();
        let value = Duration::from_secs(secs);
        if value < tunables.min_response_time {
            debug!(max_response_time = secs, "rejected parameter update");
            return Err(CallCenterError::InvalidParam(format!(
                "maxResponseTime: {secs}"
            )));
        }
        tunables.max_response_time = value;
        debug!(max_response_time = secs, "parameter updated");
        Ok(())
    }

    /// Commit both ends of the response window atomically
    pub fn set_min_max_response_time(&self, min: u64, max: u64) -> CallCenterResult<()> {
        let mut tunables = self.config.write();
        if min > max {
            debug!(min_response_time = min, max_response_time = max, "rejected parameter update");
            return Err(CallCenterError::InvalidParam(format!(
                "minMaxResponseTime: min {min} max {max}"
            )));
        }
        tunables.min_response_time = Duration::from_secs(min);
        tunables.max_response_time = Duration::from_secs(max);
        debug!(min_response_time = min, max_response_time = max, "parameter updated");
        Ok(())
    }

    pub fn set_min_call_duration(&self, secs: u64) -> CallCenterResult<()> {
        let mut tunables = self.config.write();
        let value = Duration::from_secs(secs);
        if secs < 1 || value > tunables.max_call_duration {
            debug!(min_call_duration = secs, "rejected parameter update");
            return Err(CallCenterError::InvalidParam(format!(
                "minCallDuration: {secs}"
            )));
        }
        tunables.min_call_duration = value;
        debug!(min_call_duration = secs, "parameter updated");
        Ok(())
    }

    pub fn set_max_call_duration(&self, secs: u64) -> CallCenterResult<()> {
        let mut tunables = self.config.write();
        let value = Duration::from_secs(secs);
        if secs < 1 || value < tunables.min_call_duration {
            debug!(max_call_duration = secs, "rejected parameter update");
            return Err(CallCenterError::InvalidParam(format!(
                "maxCallDuration: {secs}"
            )));
        }
        tunables.max_call_duration = value;
        debug!(max_call_duration = secs, "parameter updated");
        Ok(())
    }

    /// Commit both ends of the duration window atomically
    pub fn set_min_max_call_duration(&self, min: u64, max: u64) -> CallCenterResult<()> {
        let mut tunables = self.config.write();
        if min < 1 || min > max {
            debug!(min_call_duration = min, max_call_duration = max, "rejected parameter update");
            return Err(CallCenterError::InvalidParam(format!(
                "minMaxCallDuration: min {min} max {max}"
            )));
        }
        tunables.min_call_duration = Duration::from_secs(min);
        tunables.max_call_duration = Duration::from_secs(max);
        debug!(min_call_duration = min, max_call_duration = max, "parameter updated");
        Ok(())
    }

    /// Resize the operator pool; in-flight calls on removed operators finish
    /// normally and their release is dropped.
    pub fn set_n_operators(&self, n_operators: usize) -> CallCenterResult<()> {
        let _config = self.config.write();
        if n_operators < 1 {
            debug!(n_operators, "rejected parameter update");
            return Err(CallCenterError::InvalidParam(format!(
                "nOperators: {n_operators}"
            )));
        }
        self.pool.lock().resize(n_operators);
        debug!(n_operators, "parameter updated");
        Ok(())
    }

    pub fn set_max_queue_size(&self, max_size: usize) -> CallCenterResult<()> {
        let _config = self.config.write();
        let result = self.queue.set_max_size(max_size);
        match &result {
            Ok(()) => debug!(max_queue_size = max_size, "parameter updated"),
            Err(_) => debug!(max_queue_size = max_size, "rejected parameter update"),
        }
        result
    }

    pub fn set_reject_repeated_calls(&self, reject: bool) {
        debug!(
            old = self.queue.reject_repeated(),
            new = reject,
            "updating repeat-call policy"
        );
        self.queue.set_reject_repeated(reject);
    }

    pub fn reject_repeated_calls(&self) -> bool {
        self.queue.reject_repeated()
    }

    // --- scalar getters ---

    pub fn min_response_time(&self) -> u64 {
        self.config.read().min_response_time.as_secs()
    }

    pub fn max_response_time(&self) -> u64 {
        self.config.read().max_response_time.as_secs()
    }

    pub fn min_call_duration(&self) -> u64 {
        self.config.read().min_call_duration.as_secs()
    }

    pub fn max_call_duration(&self) -> u64 {
        self.config.read().max_call_duration.as_secs()
    }

    pub fn n_operators(&self) -> usize {
        self.pool.lock().capacity()
    }

    pub fn free_operators(&self) -> usize {
        self.pool.lock().available()
    }

    pub fn max_queue_size(&self) -> usize {
        self.queue.max_size()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    // --- internals shared with the scheduler ---

    fn tunables(&self) -> Tunables {
        *self.config.read()
    }

    fn acquire_operator(&self) -> Option<OperatorId> {
        self.pool.lock().try_acquire()
    }

    fn release_operator(&self, operator_id: OperatorId) {
        info!(operator_id, "releasing operator");
        self.pool.lock().release(operator_id);
    }
}

/// Ordering key for the in-flight set: completion instant first, call id as
/// the stable tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FlightKey {
    end_dt: Instant,
    call_id: CallId,
}

/// The dispatch loop state: one held CDR aging toward dispatch and the
/// time-ordered set of calls currently with operators.
///
/// Single-threaded by construction; `run` owns it on a dedicated thread,
/// tests drive `step` directly.
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    pending: Option<Cdr>,
    in_flight: BTreeMap<FlightKey, Cdr>,
}

impl Scheduler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            pending: None,
            in_flight: BTreeMap::new(),
        }
    }

    /// One tick: complete due calls, refill the pending slot, age or
    /// dispatch the pending call.
    pub fn step(&mut self) {
        let now = self.dispatcher.clock.now();
        self.reap_completed(now);
        if self.pending.is_none() {
            self.pending = self.dispatcher.queue.try_pop();
        }
        self.evaluate_pending(now);
    }

    /// Run ticks forever, sleeping until the next deadline between them
    pub fn run(mut self) {
        info!("call center dispatch loop running");
        loop {
            self.step();
            let now = self.dispatcher.clock.now();
            let sleep_for = self
                .next_deadline(now)
                .map_or(POLL_INTERVAL, |deadline| {
                    deadline.saturating_duration_since(now).min(POLL_INTERVAL)
                });
            if sleep_for.is_zero() {
                std::thread::yield_now();
            } else {
                self.dispatcher.clock.sleep(sleep_for);
            }
        }
    }

    /// End every in-flight call whose completion instant has passed
    fn reap_completed(&mut self, now: Instant) {
        while let Some(entry) = self.in_flight.first_entry() {
            if entry.key().end_dt > now {
                break;
            }
            let cdr = entry.remove();
            info!(call_id = cdr.call_id, "call ended");
            if let Some(operator_id) = cdr.operator_id {
                self.dispatcher.release_operator(operator_id);
            }
            self.dispatcher.sink.consume(&cdr);
        }
    }

    fn evaluate_pending(&mut self, now: Instant) {
        let Some(mut cdr) = self.pending.take() else {
            return;
        };
        let tunables = self.dispatcher.tunables();
        let elapsed = now.saturating_duration_since(cdr.receive_dt);

        if elapsed > tunables.max_response_time {
            cdr.status = CallStatus::Timeout;
            cdr.end_dt = Some(now);
            info!(
                call_id = cdr.call_id,
                elapsed_secs = elapsed.as_secs(),
                max_response_time = tunables.max_response_time.as_secs(),
                "call ended by timeout"
            );
            self.dispatcher.sink.consume(&cdr);
            return;
        }

        if elapsed >= tunables.min_response_time {
            if let Some(operator_id) = self.dispatcher.acquire_operator() {
                let call_duration = Duration::from_secs(rng::uniform(
                    tunables.min_call_duration.as_secs(),
                    tunables.max_call_duration.as_secs(),
                ));
                cdr.status = CallStatus::Ok;
                cdr.operator_id = Some(operator_id);
                cdr.response_dt = Some(now);
                cdr.call_duration = Some(call_duration);
                // Completion is anchored to the ingress instant, not the
                // answer instant: an operator's effective service time is
                // call_duration minus the response wait.
                let end_dt = cdr.receive_dt + call_duration;
                cdr.end_dt = Some(end_dt);
                info!(
                    call_id = cdr.call_id,
                    operator_id,
                    call_duration_secs = call_duration.as_secs(),
                    "call serving started"
                );
                self.in_flight.insert(
                    FlightKey {
                        end_dt,
                        call_id: cdr.call_id,
                    },
                    cdr,
                );
                return;
            }
            debug!("all operators are busy");
        }

        // Still aging toward the minimum response time, or no free operator.
        self.pending = Some(cdr);
    }

    /// Earliest instant at which the next tick has work to do
    fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let mut deadline = self.in_flight.keys().next().map(|key| key.end_dt);
        if let Some(cdr) = &self.pending {
            let tunables = self.dispatcher.tunables();
            let dispatch_due = cdr.receive_dt + tunables.min_response_time;
            let timeout_due = cdr.receive_dt + tunables.max_response_time;
            let pending_due = if dispatch_due > now {
                dispatch_due
            } else {
                timeout_due
            };
            deadline = Some(deadline.map_or(pending_due, |d| d.min(pending_due)));
        }
        deadline
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&Cdr> {
        self.pending.as_ref()
    }
}
