use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Long-running operation returned by mutating VPC API calls
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,

    /// Whether the operation has finished, successfully or not
    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// Set when the operation finished with an error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,

    /// Set when the operation finished successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

/// Terminal error of an operation (google.rpc.Status)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Value>,
}

impl Operation {
    /// Finished with an error
    pub fn failed(&self) -> bool {
        self.done && self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_operation() {
        let op: Operation = serde_json::from_value(json!({
            "id": "enpop1",
            "description": "Update route table",
            "createdAt": "2024-03-01T10:00:00Z",
            "createdBy": "ajeservice",
            "modifiedAt": "2024-03-01T10:00:00Z",
            "metadata": {"routeTableId": "enpabc"}
        }))
        .unwrap();

        assert_eq!(op.id, "enpop1");
        assert!(!op.done);
        assert!(!op.failed());
    }

    #[test]
    fn test_failed_operation() {
        let op: Operation = serde_json::from_value(json!({
            "id": "enpop2",
            "done": true,
            "error": {"code": 9, "message": "route table is busy"}
        }))
        .unwrap();

        assert!(op.failed());
        let error = op.error.unwrap();
        assert_eq!(error.code, 9);
        assert_eq!(error.message, "route table is busy");
        assert!(error.details.is_empty());
    }
}
