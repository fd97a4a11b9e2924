//! Completed-CDR sink
//!
//! Every call that leaves the engine, served or timed out, is handed to the
//! sink for logging or billing.

use tracing::info;

use crate::cdr::Cdr;

/// Consumer of completed CDRs
pub trait CdrSink: Send + Sync {
    fn consume(&self, cdr: &Cdr);
}

/// Writes one structured log line per completed call
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl CdrSink for LoggingSink {
    fn consume(&self, cdr: &Cdr) {
        info!(
            call_id = cdr.call_id,
            phone_number = %cdr.phone_number,
            status = %cdr.status,
            operator_id = cdr.operator_id,
            call_duration_secs = cdr.call_duration.map(|d| d.as_secs()),
            "call record completed"
        );
    }
}
