// Relay wire protocol
// JSON text frames discriminated by `type`; field names are camelCase.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use promptrelay_core::application::JobResult;

use crate::error::BridgeError;

/// `clientType` announced in the auth handshake
pub const CLIENT_TYPE: &str = "promptrelay";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    #[serde(rename_all = "camelCase")]
    Auth { token: String, client_type: String },

    AuthSuccess,

    #[serde(rename_all = "camelCase")]
    SubmitPrompt {
        message_id: String,
        service: String,
        prompt: String,
    },

    #[serde(rename_all = "camelCase")]
    PromptResult {
        message_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    SubmitBatch {
        message_id: String,
        service: String,
        prompts: Vec<String>,
        #[serde(default)]
        delay_ms: u64,
    },

    #[serde(rename_all = "camelCase")]
    BatchResult {
        message_id: String,
        success: bool,
        results: Vec<JobResult>,
        success_count: usize,
        fail_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    Ping,
    Pong,
}

const KNOWN_TYPES: &[&str] = &[
    "auth",
    "auth_success",
    "submit_prompt",
    "prompt_result",
    "submit_batch",
    "batch_result",
    "ping",
    "pong",
];

impl BridgeMessage {
    pub fn auth(token: &str) -> Self {
        BridgeMessage::Auth {
            token: token.to_string(),
            client_type: CLIENT_TYPE.to_string(),
        }
    }

    /// Wire form
    pub fn encode(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A decoded frame; unknown types are surfaced so the caller can log and skip them
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Message(BridgeMessage),
    Unknown(String),
}

/// Decode one text frame
///
/// # Errors
/// - BridgeError::Protocol if the frame has no `type`
/// - BridgeError::Serialization if a known type carries malformed fields
pub fn decode(text: &str) -> Result<Incoming, BridgeError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::Protocol("frame without a type".to_string()))?;

    if !KNOWN_TYPES.contains(&kind) {
        return Ok(Incoming::Unknown(kind.to_string()));
    }
    Ok(Incoming::Message(serde_json::from_value(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use serde_json::json;

    #[test]
    fn test_auth_wire_shape() {
        let wire: Value = serde_json::from_str(&BridgeMessage::auth("s3cret").encode().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({ "type": "auth", "token": "s3cret", "clientType": "promptrelay" })
        );
    }

    #[test]
    fn test_decode_submit_batch() {
        let frame = r#"{"type":"submit_batch","messageId":"m-9","service":"leonardo",
                        "prompts":["a fox","a heron"],"delayMs":2000}"#;
        assert_eq!(
            assert_ok!(decode(frame)),
            Incoming::Message(BridgeMessage::SubmitBatch {
                message_id: "m-9".to_string(),
                service: "leonardo".to_string(),
                prompts: vec!["a fox".to_string(), "a heron".to_string()],
                delay_ms: 2000,
            })
        );
    }

    #[test]
    fn test_prompt_result_omits_absent_error() {
        let ok = BridgeMessage::PromptResult {
            message_id: "m-1".to_string(),
            success: true,
            error: None,
        };
        let wire: Value = serde_json::from_str(&ok.encode().unwrap()).unwrap();
        assert_eq!(wire, json!({ "type": "prompt_result", "messageId": "m-1", "success": true }));
    }

    #[test]
    fn test_batch_result_counts_are_camel_case() {
        let msg = BridgeMessage::BatchResult {
            message_id: "m-2".to_string(),
            success: false,
            results: Vec::new(),
            success_count: 1,
            fail_count: 2,
            error: None,
        };
        let wire: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(wire["successCount"], 1);
        assert_eq!(wire["failCount"], 2);
        assert_eq!(wire["type"], "batch_result");
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        assert_eq!(
            decode(r#"{"type":"tab_update","tabId":4}"#).unwrap(),
            Incoming::Unknown("tab_update".to_string())
        );
    }

    #[test]
    fn test_missing_type_is_protocol_error() {
        assert!(matches!(
            decode(r#"{"messageId":"x"}"#),
            Err(BridgeError::Protocol(_))
        ));
        assert!(matches!(decode("not json"), Err(BridgeError::Serialization(_))));
    }
}
