//! Call-center dispatch engine
//!
//! This crate provides a call-center dispatch engine that:
//! - Admits telephone-call events through a bounded, deduplicating FIFO queue
//! - Ages admitted calls through a configurable response-time window
//! - Assigns calls to a fixed pool of operators for randomized durations
//! - Times out calls that wait past the maximum response time
//! - Supports live reconfiguration of every tunable under concurrent ingress
//! - Exposes an HTTP ingress returning the call id and admission status

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod api;
pub mod cdr;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pool;
pub mod queue;
pub mod rng;
pub mod sink;

pub use api::RestApiServer;
pub use cdr::{CallId, CallStatus, Cdr, OperatorId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CallCenterConfig, ConfigLoader};
pub use dispatcher::{Dispatcher, Scheduler};
pub use error::{CallCenterError, CallCenterResult};
pub use pool::OperatorPool;
pub use queue::{Keyed, PushOutcome, UniqueQueue};
pub use sink::{CdrSink, LoggingSink};
