use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result envelope returned by every task
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse<T: Serialize> {
    /// Whether the task completed; "not enough data" still counts as success
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Task payload (present on success when there is something to report)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error cause (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> TaskResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Success without payload, e.g. when there was nothing to train on
    pub fn no_op(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(message: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }

    /// Attach a payload, e.g. partial results of a failed run
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let response = TaskResponse::success("done", 42);
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_failure_serialization_omits_data() {
        let response = TaskResponse::<()>::failure("training failed", "data collinear");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "data collinear");
        assert!(json.get("data").is_none());
    }
}
