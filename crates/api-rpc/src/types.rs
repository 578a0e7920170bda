//! RPC Request/Response Types
//!
//! Method parameters and results. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use promptrelay_core::application::{BatchReport, JobResult};

/// prompt.submit.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub service: String,
    pub prompt: String,
}

/// prompt.batch.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub service: String,
    pub prompts: Vec<String>,
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: bool,
    pub results: Vec<JobResult>,
    pub success_count: usize,
    pub fail_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_by: Option<String>,
}

impl From<BatchReport> for BatchResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            success: report.success(),
            success_count: report.success_count,
            fail_count: report.fail_count,
            halted_by: report.halted_by,
            results: report.results,
        }
    }
}

/// session.status.v1 and session.close.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResponse {
    pub service: String,
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_request_accepts_camel_case_and_default_delay() {
        let req: BatchRequest =
            serde_json::from_value(json!({ "service": "ideogram", "prompts": ["a", "b"], "delayMs": 1500 }))
                .unwrap();
        assert_eq!(req.delay_ms, 1500);

        let req: BatchRequest =
            serde_json::from_value(json!({ "service": "ideogram", "prompts": ["a"] })).unwrap();
        assert_eq!(req.delay_ms, 0);
    }

    #[test]
    fn test_batch_response_wire_shape() {
        let response = BatchResponse {
            success: true,
            results: Vec::new(),
            success_count: 0,
            fail_count: 0,
            halted_by: None,
        };
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(
            wire,
            json!({ "success": true, "results": [], "successCount": 0, "failCount": 0 })
        );
    }
}
