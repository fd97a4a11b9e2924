//! Call Detail Records
//!
//! A [`Cdr`] tracks one call through its lifetime: ingress, admission,
//! dispatch to an operator (or timeout while waiting), and completion.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::queue::Keyed;

/// Unique numeric call identifier, assigned at admission
pub type CallId = u64;

/// Operator identifier, `1..=n_operators`
pub type OperatorId = usize;

/// Terminal or admission status of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallStatus {
    /// Admitted, or served to completion
    Ok,
    /// Rejected at admission: queue full
    Overload,
    /// Rejected at admission: subscriber already queued
    AlreadyInQueue,
    /// Reserved for external collaborators; never produced by the core
    CallDuplication,
    /// Aged past the maximum response time before dispatch
    Timeout,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ok => "ok",
            CallStatus::Overload => "overload",
            CallStatus::AlreadyInQueue => "alreadyInQueue",
            CallStatus::CallDuplication => "callDuplication",
            CallStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call Detail Record
///
/// Timestamps are monotonic instants from the injected [`crate::clock::Clock`].
/// Fields that are unset until dispatch are `None` until the scheduler fills
/// them in.
#[derive(Debug, Clone)]
pub struct Cdr {
    /// Subscriber number; also the deduplication key
    pub phone_number: String,
    /// Assigned at admission, random in `[1, u64::MAX]`
    pub call_id: CallId,
    /// Instant of ingress, stamped by the producer before enqueue
    pub receive_dt: Instant,
    /// Instant an operator answered; `None` until dispatch
    pub response_dt: Option<Instant>,
    /// Instant the call completed; `None` until dispatch or timeout
    pub end_dt: Option<Instant>,
    /// Operator service time; `None` unless the call was served
    pub call_duration: Option<Duration>,
    /// Assigned operator; `None` unless the call was served
    pub operator_id: Option<OperatorId>,
    pub status: CallStatus,
}

impl Cdr {
    pub fn new(phone_number: impl Into<String>, receive_dt: Instant) -> Self {
        Self {
            phone_number: phone_number.into(),
            call_id: 0,
            receive_dt,
            response_dt: None,
            end_dt: None,
            call_duration: None,
            operator_id: None,
            status: CallStatus::Ok,
        }
    }
}

impl Keyed for Cdr {
    type Key = String;

    fn key(&self) -> String {
        self.phone_number.clone()
    }
}
