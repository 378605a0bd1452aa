//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Structured recovery results and sub-step accounting."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form JSON object handed to an executor.
pub type RecoveryContext = Map<String, Value>;

/// Outcome of a single named sub-step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Structured result returned by every executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub details: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
    /// Key/value observations merged into the persisted system health map.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub observations: Map<String, Value>,
}

impl RecoveryResult {
    /// Construct a success result helper.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: Value::Null,
            steps: Vec::new(),
            observations: Map::new(),
        }
    }

    /// Construct a failure result helper.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_steps(mut self, steps: Vec<StepOutcome>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_observation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.observations.insert(key.into(), value.into());
        self
    }
}

/// Accumulates sub-step outcomes; the overall result is the AND of all steps.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    steps: Vec<StepOutcome>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step and return its success so callers can stop early.
    pub fn record(&mut self, name: impl Into<String>, success: bool, message: impl Into<String>) -> bool {
        self.steps.push(StepOutcome {
            name: name.into(),
            success,
            message: message.into(),
        });
        success
    }

    pub fn pass(&mut self, name: impl Into<String>, message: impl Into<String>) -> bool {
        self.record(name, true, message)
    }

    pub fn fail(&mut self, name: impl Into<String>, message: impl Into<String>) -> bool {
        self.record(name, false, message)
    }

    /// True when every recorded step succeeded. An empty log is not a success.
    pub fn all_succeeded(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|step| step.success)
    }

    /// The first failing step, if any.
    pub fn first_failure(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|step| !step.success)
    }

    pub fn steps(&self) -> &[StepOutcome] {
        &self.steps
    }

    /// Fold the log into a result: success/failure follows the steps, and the
    /// message names the first failing step when there is one.
    pub fn finish(self, success_message: impl Into<String>) -> RecoveryResult {
        let result = if self.all_succeeded() {
            RecoveryResult::success(success_message)
        } else {
            let message = match self.first_failure() {
                Some(step) if step.message.is_empty() => format!("step '{}' failed", step.name),
                Some(step) => format!("step '{}' failed: {}", step.name, step.message),
                None => String::from("no recovery steps were executed"),
            };
            RecoveryResult::failure(message)
        };
        result.with_steps(self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_log_is_conjunction_of_steps() {
        let mut log = StepLog::new();
        assert!(log.pass("probe", "site answered 503"));
        assert!(!log.fail("restart", "service unit missing"));
        assert!(!log.all_succeeded());

        let result = log.finish("recovered");
        assert!(!result.success);
        assert_eq!(result.message, "step 'restart' failed: service unit missing");
        assert_eq!(result.steps.len(), 2);
    }

    #[test]
    fn empty_step_log_is_not_success() {
        let result = StepLog::new().finish("nothing to do");
        assert!(!result.success);
        assert!(result.steps.is_empty());
    }

    #[test]
    fn builders_populate_fields() {
        let result = RecoveryResult::success("ok")
            .with_details(json!({ "status": 200 }))
            .with_observation("last_selected_credential", "github.token");
        assert!(result.success);
        assert_eq!(result.details["status"], 200);
        assert_eq!(
            result.observations.get("last_selected_credential"),
            Some(&json!("github.token"))
        );
    }

    #[test]
    fn results_deserialize_with_missing_optional_fields() {
        let result: RecoveryResult =
            serde_json::from_value(json!({ "success": false, "message": "disk full" })).unwrap();
        assert!(!result.success);
        assert!(result.steps.is_empty());
        assert_eq!(result.details, Value::Null);
    }
}
