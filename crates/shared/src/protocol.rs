use serde::{Deserialize, Serialize};

use crate::domain::{CounterSnapshot, SendMode};

/// Operation names understood by a node's `/api` endpoint.
pub mod operation {
    pub const GET_COUNTERS: &str = "get_counters";
    pub const PING_HTTP: &str = "ping_http";
    pub const SEND_MESSAGE: &str = "send_message";
}

/// Envelope posted to `/api`. Every variant carries the JSON-encoded request
/// body of the operation as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiRequest {
    GetCounters(String),
    PingHttp(String),
    SendMessage(String),
}

impl ApiRequest {
    pub fn from_operation(operation: &str, request_body: String) -> Option<Self> {
        match operation {
            operation::GET_COUNTERS => Some(Self::GetCounters(request_body)),
            operation::PING_HTTP => Some(Self::PingHttp(request_body)),
            operation::SEND_MESSAGE => Some(Self::SendMessage(request_body)),
            _ => None,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::GetCounters(_) => operation::GET_COUNTERS,
            Self::PingHttp(_) => operation::PING_HTTP,
            Self::SendMessage(_) => operation::SEND_MESSAGE,
        }
    }
}

/// Successful `/api` responses wrap the outcome as `{"Ok": ..}` or `{"Err": ..}`.
pub type ApiResult = Result<CounterSnapshot, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub mode: SendMode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node: Option<String>,
}

/// Requests one node sends to another on `/remote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteRequest {
    Deliver { from: String, message: String },
}

/// A variant shaped for a handler that neither `/api` nor `/remote` serves.
/// Mismatch flows send it on purpose to exercise the unexpected-input path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MismatchRequest {
    PingLocal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_envelope_uses_variant_name_as_key() {
        let request = ApiRequest::from_operation(operation::PING_HTTP, "{\"message\":\"hi\"}".into())
            .expect("known operation");
        assert_eq!(
            serde_json::to_value(&request).expect("json"),
            serde_json::json!({ "PingHttp": "{\"message\":\"hi\"}" })
        );
        assert!(ApiRequest::from_operation("ping_local", String::new()).is_none());
    }

    #[test]
    fn mismatch_request_is_rejected_by_api_envelope() {
        let body = serde_json::to_string(&MismatchRequest::PingLocal("x".into())).expect("json");
        assert_eq!(body, "{\"PingLocal\":\"x\"}");
        assert!(serde_json::from_str::<ApiRequest>(&body).is_err());
        assert!(serde_json::from_str::<RemoteRequest>(&body).is_err());
    }

    #[test]
    fn send_message_request_omits_missing_target() {
        let local = SendMessageRequest {
            mode: SendMode::Local,
            message: "hi".into(),
            target_node: None,
        };
        assert_eq!(
            serde_json::to_value(&local).expect("json"),
            serde_json::json!({ "mode": "local", "message": "hi" })
        );

        let parsed: SendMessageRequest = serde_json::from_str(
            r#"{"mode":"remote-mismatch","message":"m","target_node":"bob.os"}"#,
        )
        .expect("parse");
        assert_eq!(parsed.mode, SendMode::RemoteMismatch);
        assert_eq!(parsed.target_node.as_deref(), Some("bob.os"));
    }

    #[test]
    fn api_result_is_externally_tagged() {
        let ok: ApiResult = Ok(CounterSnapshot::default());
        let value = serde_json::to_value(&ok).expect("json");
        assert!(value.get("Ok").is_some());

        let err: ApiResult = serde_json::from_str(r#"{"Err":"nope"}"#).expect("parse");
        assert_eq!(err, Err("nope".to_string()));
    }

    #[test]
    fn send_mode_parses_cli_spellings() {
        assert_eq!("Remote".parse::<SendMode>(), Ok(SendMode::Remote));
        assert_eq!("remote_mismatch".parse::<SendMode>(), Ok(SendMode::RemoteMismatch));
        assert!("broadcast".parse::<SendMode>().is_err());
    }
}
