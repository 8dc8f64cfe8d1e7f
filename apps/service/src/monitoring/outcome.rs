use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::alerts::AlertDispatch;
use crate::logs::AuditLog;
use crate::store::records::{Check, now_ms};
use crate::store::{CHECKS, RecordStore};

use super::types::{CheckState, LogEntry, Outcome};

/// Folds a probe outcome into persisted state and fires alerts on up/down
/// transitions.
pub struct OutcomeProcessor {
    store: Arc<dyn RecordStore>,
    logs: Arc<AuditLog>,
    alerts: Arc<dyn AlertDispatch>,
}

impl OutcomeProcessor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        logs: Arc<AuditLog>,
        alerts: Arc<dyn AlertDispatch>,
    ) -> Self {
        Self { store, logs, alerts }
    }

    /// Process one probe outcome: append the log entry, persist the new
    /// state, and dispatch an alert when the state flipped.
    ///
    /// Persistence and dispatch failures are logged and swallowed so one
    /// broken check cannot stall the sweep; nothing is rolled back.
    pub async fn process(&self, check: &Check, outcome: &Outcome) {
        let state = derive_state(check, outcome);
        // A check that has never been probed must not alert on its first
        // result, whatever that result turns out to be.
        let alert = check.last_checked != 0 && state != check.state;
        let time = now_ms();

        let entry = LogEntry {
            check: check.clone(),
            outcome: outcome.clone(),
            state,
            alert,
            time,
        };
        match serde_json::to_string(&entry) {
            Ok(line) => {
                if let Err(err) = self.logs.append(&check.id, &line).await {
                    warn!(check = %check.id, "failed to append log entry: {err}");
                }
            }
            Err(err) => warn!(check = %check.id, "failed to encode log entry: {err}"),
        }

        let patch = json!({ "state": state, "lastChecked": time });
        if let Err(err) = self.store.update(CHECKS, &check.id, patch).await {
            warn!(check = %check.id, "failed to persist outcome: {err}");
        }

        if alert {
            let message = format!(
                "Alert: your check for {} {}://{} is currently {}",
                check.method.as_str().to_uppercase(),
                check.protocol,
                check.url,
                state
            );
            info!(check = %check.id, state = %state, "state transition, dispatching alert");
            if let Err(err) = self.alerts.send(&check.phone, &message).await {
                warn!(check = %check.id, "alert dispatch failed: {err}");
            }
        }
    }
}

/// `up` iff the probe got a response and its code is one the owner expects.
pub fn derive_state(check: &Check, outcome: &Outcome) -> CheckState {
    let matched = outcome.error.is_none()
        && outcome.response_code.map(|code| check.success_codes.contains(&code)).unwrap_or(false);
    if matched { CheckState::Up } else { CheckState::Down }
}
