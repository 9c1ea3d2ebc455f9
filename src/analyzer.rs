//! Interprets the JSON emitted by the `ansible.posix.json` callback.
//!
//! Playbooks signal the install status of their app with a `debug` task whose message is
//! one of the sentinel strings below.
use crate::models::AnsibleRunResult;
use serde_json::Value;

pub const SIGNAL_INSTALLED: &str = "ANSIBLE_SELF_SERVICE_STATUS_INSTALLED";
pub const SIGNAL_NOT_INSTALLED: &str = "ANSIBLE_SELF_SERVICE_STATUS_NOT_INSTALLED";

const TARGET_HOST: &str = "localhost";

pub trait ResultAnalyzer: Send + Sync {
    fn signaling_installed(&self, result: &AnsibleRunResult) -> bool;
    fn signaling_not_installed(&self, result: &AnsibleRunResult) -> bool;
    fn has_changes(&self, result: &AnsibleRunResult) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResultAnalyzer;

impl JsonResultAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Counts tasks across all plays whose `hosts.localhost.msg` equals `msg`.
    fn count_tasks_with_message(&self, data: &Value, msg: &str) -> usize {
        let Some(plays) = data.get("plays").and_then(Value::as_array) else {
            return 0;
        };

        plays
            .iter()
            .filter_map(|play| play.get("tasks").and_then(Value::as_array))
            .flatten()
            .filter(|task| {
                task.get("hosts")
                    .and_then(|hosts| hosts.get(TARGET_HOST))
                    .and_then(|host| host.get("msg"))
                    .and_then(Value::as_str)
                    == Some(msg)
            })
            .count()
    }
}

impl ResultAnalyzer for JsonResultAnalyzer {
    fn signaling_installed(&self, result: &AnsibleRunResult) -> bool {
        self.count_tasks_with_message(result.data(), SIGNAL_INSTALLED) > 0
    }

    fn signaling_not_installed(&self, result: &AnsibleRunResult) -> bool {
        self.count_tasks_with_message(result.data(), SIGNAL_NOT_INSTALLED) > 0
    }

    fn has_changes(&self, result: &AnsibleRunResult) -> bool {
        let changed = result
            .data()
            .get("stats")
            .and_then(|stats| stats.get(TARGET_HOST))
            .and_then(|host| host.get("changed"));

        match changed.and_then(coerce_to_int) {
            Some(count) => count > 0,
            None => {
                log::warn!(
                    "Could not read stats.{}.changed from ansible result (found {:?})",
                    TARGET_HOST,
                    changed
                );
                false
            }
        }
    }
}

fn coerce_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}
