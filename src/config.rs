//! Configuration loading and application
//!
//! Configuration lives in two JSON files: a required defaults file and an
//! optional user file merged over it. Fields are applied through the
//! dispatcher setters one by one; a rejected field is logged and skipped
//! while the rest proceed. A reload thread can re-apply the files
//! periodically so the engine is tuned without restarts.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::dispatcher::Dispatcher;
use crate::error::{CallCenterError, CallCenterResult};

/// Engine configuration, one field per dispatcher tunable
///
/// JSON keys are camelCase: `minResponseTime`, `maxResponseTime`,
/// `minCallDuration`, `maxCallDuration`, `nOperators`, `maxCallQueueSize`,
/// `rejectRepeatedCalls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallCenterConfig {
    /// Seconds a call must age before dispatch
    pub min_response_time: u64,
    /// Seconds after which an undispatched call times out
    pub max_response_time: u64,
    /// Minimum operator service time, seconds
    pub min_call_duration: u64,
    /// Maximum operator service time, seconds
    pub max_call_duration: u64,
    /// Operator pool size
    pub n_operators: usize,
    /// Admission queue capacity
    pub max_call_queue_size: usize,
    /// Reject (true) or replace (false) a repeated subscriber number
    pub reject_repeated_calls: bool,
}

impl Default for CallCenterConfig {
    fn default() -> Self {
        Self {
            min_response_time: 1,
            max_response_time: 5,
            min_call_duration: 2,
            max_call_duration: 10,
            n_operators: 4,
            max_call_queue_size: 16,
            reject_repeated_calls: true,
        }
    }
}

/// Reads the defaults file and merges the user file over it
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    default_path: PathBuf,
    user_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(default_path: impl Into<PathBuf>, user_path: Option<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
            user_path,
        }
    }

    /// Load the merged configuration
    ///
    /// A missing or malformed defaults file is an error (fatal at startup);
    /// a missing or malformed user file logs and falls back to the defaults
    /// alone.
    pub fn load(&self) -> CallCenterResult<CallCenterConfig> {
        let mut merged = Self::read_json(&self.default_path)?;
        if let Some(user_path) = &self.user_path {
            match Self::read_json(user_path) {
                Ok(overlay) => {
                    debug!(path = %user_path.display(), "merging user configuration");
                    merge_patch(&mut merged, overlay);
                }
                Err(err) => {
                    error!(path = %user_path.display(), %err, "can't read user configuration, using defaults");
                }
            }
        }
        serde_json::from_value(merged).map_err(|err| CallCenterError::ConfigParse(err.to_string()))
    }

    fn read_json(path: &PathBuf) -> CallCenterResult<Value> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            CallCenterError::ConfigIo(format!("{}: {err}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|err| {
            CallCenterError::ConfigParse(format!("{}: {err}", path.display()))
        })
    }
}

/// Recursive JSON object merge; overlay scalars and arrays win
fn merge_patch(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.entry(key) {
                    serde_json::map::Entry::Occupied(mut existing) => {
                        merge_patch(existing.get_mut(), value);
                    }
                    serde_json::map::Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Apply a configuration field by field
///
/// Each min/max pair commits through its paired setter. A rejected field is
/// logged and skipped; the remaining fields still apply.
pub fn apply(config: &CallCenterConfig, dispatcher: &Dispatcher) {
    info!("applying configuration");
    if let Err(err) =
        dispatcher.set_min_max_response_time(config.min_response_time, config.max_response_time)
    {
        error!(%err, "response-time window not applied");
    }
    if let Err(err) =
        dispatcher.set_min_max_call_duration(config.min_call_duration, config.max_call_duration)
    {
        error!(%err, "call-duration window not applied");
    }
    if let Err(err) = dispatcher.set_n_operators(config.n_operators) {
        error!(%err, "operator count not applied");
    }
    dispatcher.set_reject_repeated_calls(config.reject_repeated_calls);
    if let Err(err) = dispatcher.set_max_queue_size(config.max_call_queue_size) {
        error!(%err, "queue size not applied");
    }
}

/// Reload and re-apply the configuration every `interval`, forever
pub fn spawn_reload(
    loader: ConfigLoader,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        thread::sleep(interval);
        match loader.load() {
            Ok(config) => apply(&config, &dispatcher),
            Err(err) => error!(%err, "configuration reload failed, keeping current parameters"),
        }
    })
}
