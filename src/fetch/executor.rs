use super::transport::{Transport, TransportError};
use crate::feed::FeedPayload;
use thiserror::Error;

/// Errors surfaced to fetch-failed subscribers.
///
/// Malformed bodies land here too: a bad payload fails the current cycle
/// and polling carries on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// Classified result of one retrieval attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(FeedPayload),
    /// Endpoint unreachable; the caller decides whether a fallback applies.
    /// Carries the transport's detail (address, OS error).
    ConnectionRefused(String),
    OtherError(FetchError),
}

/// Issues one request and classifies the outcome.
///
/// Touches nothing but the transport: timers and caches belong to the caller.
/// Unlike a status-blind client, non-2xx responses are rejected without
/// parsing the body.
pub async fn attempt_fetch(transport: &dyn Transport, endpoint: &str) -> FetchOutcome {
    let response = match transport.get(endpoint).await {
        Ok(response) => response,
        Err(TransportError::ConnectionRefused(detail)) => {
            tracing::debug!(url = %endpoint, detail = %detail, "Connection refused");
            return FetchOutcome::ConnectionRefused(detail);
        }
        Err(e) => return FetchOutcome::OtherError(FetchError::Transport(e)),
    };

    if !response.is_success() {
        return FetchOutcome::OtherError(FetchError::HttpStatus(response.status));
    }

    match FeedPayload::from_response_body(&response.body) {
        Ok(payload) => FetchOutcome::Success(payload),
        Err(e) => FetchOutcome::OtherError(FetchError::MalformedPayload(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{ScriptedTransport, Step};

    const BODY: &str = r#"{"data": [{"center_city": "X", "center_name": "Y",
        "events_at_center": [{"events_list": [{"title": "Concert"}]}]}]}"#;

    #[tokio::test]
    async fn test_success_parses_data_field() {
        let transport = ScriptedTransport::new(vec![Step::ok(BODY)]);
        match attempt_fetch(&transport, "http://feed").await {
            FetchOutcome::Success(payload) => {
                assert_eq!(payload.centers.len(), 1);
                assert_eq!(payload.centers[0].city(), "X");
            }
            other => panic!("Expected Success, got {:?}", other),
        }
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.endpoints(), vec!["http://feed".to_string()]);
    }

    #[tokio::test]
    async fn test_refused_is_classified_separately() {
        let transport = ScriptedTransport::new(vec![Step::Refused]);
        match attempt_fetch(&transport, "http://feed").await {
            FetchOutcome::ConnectionRefused(detail) => assert_eq!(detail, "scripted"),
            other => panic!("Expected ConnectionRefused, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_transport_error() {
        let transport = ScriptedTransport::new(vec![Step::Fail("reset by peer".into())]);
        match attempt_fetch(&transport, "http://feed").await {
            FetchOutcome::OtherError(FetchError::Transport(TransportError::Other(msg))) => {
                assert_eq!(msg, "reset by peer");
            }
            other => panic!("Expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let transport = ScriptedTransport::new(vec![Step::Status(404, "missing".into())]);
        assert!(matches!(
            attempt_fetch(&transport, "http://feed").await,
            FetchOutcome::OtherError(FetchError::HttpStatus(404))
        ));
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let transport = ScriptedTransport::new(vec![Step::ok("not json")]);
        assert!(matches!(
            attempt_fetch(&transport, "http://feed").await,
            FetchOutcome::OtherError(FetchError::MalformedPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_data_field_is_malformed() {
        let transport = ScriptedTransport::new(vec![Step::ok(r#"{"status": "ok"}"#)]);
        match attempt_fetch(&transport, "http://feed").await {
            FetchOutcome::OtherError(FetchError::MalformedPayload(detail)) => {
                assert!(detail.contains("data"), "detail: {detail}");
            }
            other => panic!("Expected MalformedPayload, got {:?}", other),
        }
    }
}
