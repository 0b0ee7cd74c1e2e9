use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use automata_core::error::{AutomataError, Result};
use automata_core::payload::Payload;
use automata_core::traits::Classifier;

use crate::{failure_detail, http_client};

/// Classifier backed by an HTTP decision endpoint.
///
/// Posts `{prompt, data}` and expects `{success, result, error}`. The
/// verdict text is returned as-is; whether it is a valid `TRUE`/`FALSE` is
/// for the caller to judge.
pub struct HttpClassifier {
    http: Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout_secs: Option<u64>) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Serialize)]
struct DecisionRequest<'a> {
    prompt: &'a str,
    data: &'a Payload,
}

#[derive(Deserialize)]
struct DecisionResponse {
    #[serde(default)]
    success: bool,
    result: Option<String>,
    error: Option<String>,
}

/// Extract the verdict from a decision endpoint response body.
pub fn parse_decision(body: &str) -> Result<String> {
    let response: DecisionResponse = serde_json::from_str(body)
        .map_err(|e| AutomataError::ClassifierRequest(format!("malformed response: {}", e)))?;

    if !response.success {
        let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
        return Err(AutomataError::ClassifierRequest(reason));
    }
    response
        .result
        .ok_or_else(|| AutomataError::ClassifierRequest("response has no result".to_string()))
}

impl Classifier for HttpClassifier {
    fn classify(&self, prompt: String, data: Payload) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            debug!(url = %self.url, prompt = %prompt, "Posting decision request");
            let response = self
                .http
                .post(&self.url)
                .json(&DecisionRequest {
                    prompt: &prompt,
                    data: &data,
                })
                .send()
                .await
                .map_err(|e| AutomataError::ClassifierRequest(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| AutomataError::ClassifierRequest(e.to_string()))?;

            if !status.is_success() {
                return Err(AutomataError::ClassifierRequest(failure_detail(status, &body)));
            }
            parse_decision(&body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decision_returns_raw_verdict() {
        assert_eq!(
            parse_decision(r#"{"success":true,"result":"TRUE"}"#).unwrap(),
            "TRUE"
        );
        // Contract checking happens in the engine.
        assert_eq!(
            parse_decision(r#"{"success":true,"result":"maybe"}"#).unwrap(),
            "maybe"
        );
    }

    #[test]
    fn test_parse_decision_failures() {
        let err = parse_decision(
            r#"{"success":false,"error":"AI returned an invalid format","details":"PERHAPS"}"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, AutomataError::ClassifierRequest(ref m) if m == "AI returned an invalid format")
        );

        assert!(parse_decision(r#"{"success":true}"#).is_err());
        assert!(parse_decision("<html>").is_err());
    }

    #[test]
    fn test_request_wire_shape() {
        let mut data = Payload::new();
        data.set_str("to", "0xABC");
        let body = serde_json::to_value(DecisionRequest {
            prompt: "Is the amount large",
            data: &data,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"prompt": "Is the amount large", "data": {"to": "0xABC"}})
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_request_error() {
        let classifier = HttpClassifier::new("http://127.0.0.1:9/decide", Some(2)).unwrap();
        let err = classifier
            .classify("q".into(), Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AutomataError::ClassifierRequest(_)));
    }
}
