// Chat gateway module
//
// The seam between virtual users and the endpoint under test.
// Uses the ChatGateway trait for testability; the production
// implementation speaks JSON over HTTP via reqwest.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::LoadTestError;

/// A successful reply from the chat endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub status: u16,
    pub content: String,
}

/// Classified failure of a single chat request. Every variant is data
/// for the aggregator, not a reason to abort the run.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl GatewayError {
    /// Stable label used as the error_kind key in aggregated statistics.
    pub fn kind(&self) -> String {
        match self {
            GatewayError::Timeout => "timeout".to_string(),
            GatewayError::Connect(_) => "connect".to_string(),
            GatewayError::Status(code) => format!("status_{}", code),
            GatewayError::InvalidBody(_) => "invalid_body".to_string(),
        }
    }
}

/// Abstraction over the chat endpoint a virtual user drives.
pub trait ChatGateway: Send + Sync {
    fn send_chat<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ChatReply, GatewayError>> + Send + 'a>>;
}

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    content: String,
}

/// HTTP implementation of ChatGateway. POSTs `{"message": ...}` to the
/// target URL and expects 200 with a JSON `{"content": ...}` body.
pub struct HttpChatGateway {
    client: reqwest::Client,
    target_url: String,
}

impl HttpChatGateway {
    /// Build a gateway with a fixed per-request timeout. Failure to
    /// construct the client is a run-fatal error: no run can start.
    pub fn new(target_url: String, request_timeout: Duration) -> Result<Self, LoadTestError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LoadTestError::RunAborted(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, target_url })
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }
}

impl ChatGateway for HttpChatGateway {
    fn send_chat<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ChatReply, GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.target_url)
                .json(&ChatPayload { message })
                .send()
                .await
                .map_err(classify_request_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(GatewayError::Status(status.as_u16()));
            }

            let body: ChatContent = response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidBody(e.to_string()))?;

            if body.content.is_empty() {
                return Err(GatewayError::InvalidBody("empty content field".to_string()));
            }

            Ok(ChatReply {
                status: status.as_u16(),
                content: body.content,
            })
        })
    }
}

/// Map a reqwest transport error onto the gateway taxonomy.
fn classify_request_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_connect() {
        GatewayError::Connect(err.to_string())
    } else {
        GatewayError::InvalidBody(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kind() {
        assert_eq!(GatewayError::Timeout.kind(), "timeout");
    }

    #[test]
    fn test_connect_kind() {
        let err = GatewayError::Connect("refused".to_string());
        assert_eq!(err.kind(), "connect");
    }

    #[test]
    fn test_status_kind_includes_code() {
        assert_eq!(GatewayError::Status(500).kind(), "status_500");
        assert_eq!(GatewayError::Status(404).kind(), "status_404");
    }

    #[test]
    fn test_invalid_body_kind() {
        let err = GatewayError::InvalidBody("missing content".to_string());
        assert_eq!(err.kind(), "invalid_body");
    }

    #[test]
    fn test_gateway_error_display() {
        assert_eq!(GatewayError::Timeout.to_string(), "request timed out");
        assert_eq!(
            GatewayError::Status(503).to_string(),
            "unexpected status: 503"
        );
    }

    #[test]
    fn test_chat_payload_serialization() {
        let payload = ChatPayload { message: "hello" };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"message":"hello"}"#);
    }

    #[test]
    fn test_chat_content_deserialization() {
        let body: ChatContent = serde_json::from_str(r#"{"content":"hi there"}"#).unwrap();
        assert_eq!(body.content, "hi there");
    }

    #[test]
    fn test_chat_content_rejects_missing_field() {
        let result: Result<ChatContent, _> = serde_json::from_str(r#"{"reply":"hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_http_gateway_construction() {
        let gateway =
            HttpChatGateway::new("http://127.0.0.1:1/api/chat".to_string(), Duration::from_secs(1))
                .unwrap();
        assert_eq!(gateway.target_url(), "http://127.0.0.1:1/api/chat");
    }

    #[tokio::test]
    async fn test_http_gateway_connect_error_is_classified() {
        // Port 1 on localhost is not listening; the request must come back
        // as a classified failure, never a panic.
        let gateway =
            HttpChatGateway::new("http://127.0.0.1:1/api/chat".to_string(), Duration::from_secs(2))
                .unwrap();
        let err = gateway.send_chat("hello").await.unwrap_err();
        match err {
            GatewayError::Connect(_) | GatewayError::Timeout => {}
            other => panic!("Expected Connect or Timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_gateway_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatewayError>();
    }
}
