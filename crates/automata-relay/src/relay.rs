use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use automata_core::error::{AutomataError, Result};
use automata_core::traits::Relay;
use automata_core::types::{RelayAction, TxReceipt};

use crate::{failure_detail, http_client};

/// Relay backed by an HTTP endpoint that signs and submits transactions.
///
/// Posts `{action, params}` and expects `{success, txHash, error}`.
pub struct HttpRelay {
    http: Client,
    url: String,
}

impl HttpRelay {
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

#[derive(Deserialize)]
struct RelayResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "txHash")]
    tx_hash: Option<String>,
    error: Option<String>,
}

/// Reject actions the relay endpoint would refuse anyway.
pub fn validate(action: &RelayAction) -> Result<()> {
    match action {
        RelayAction::SendToken { to, amount } => {
            if to.trim().is_empty() || amount.trim().is_empty() {
                return Err(AutomataError::RelayFailure(
                    "missing 'to' or 'amount' for sendToken".to_string(),
                ));
            }
        }
        RelayAction::MintBadge { to } => {
            if to.trim().is_empty() {
                return Err(AutomataError::RelayFailure(
                    "missing 'to' for mintBadge".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Extract the receipt from a relay response body.
pub fn parse_receipt(body: &str) -> Result<TxReceipt> {
    let response: RelayResponse = serde_json::from_str(body)
        .map_err(|e| AutomataError::RelayFailure(format!("malformed response: {}", e)))?;
    if !response.success {
        let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
        return Err(AutomataError::RelayFailure(reason));
    }
    Ok(TxReceipt {
        tx_hash: response.tx_hash,
    })
}

impl Relay for HttpRelay {
    fn submit(&self, action: RelayAction) -> BoxFuture<'_, Result<TxReceipt>> {
        Box::pin(async move {
            validate(&action)?;

            debug!(url = %self.url, action = action.name(), "Posting relay request");
            let response = self
                .http
                .post(&self.url)
                .json(&action)
                .send()
                .await
                .map_err(|e| AutomataError::RelayFailure(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| AutomataError::RelayFailure(e.to_string()))?;

            if !status.is_success() {
                return Err(AutomataError::RelayFailure(failure_detail(status, &body)));
            }
            let receipt = parse_receipt(&body)?;
            info!(
                action = action.name(),
                tx_hash = receipt.tx_hash.as_deref().unwrap_or("-"),
                "Relay transaction confirmed"
            );
            Ok(receipt)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate(&RelayAction::SendToken {
            to: "0x1".into(),
            amount: "5".into()
        })
        .is_ok());
        assert!(validate(&RelayAction::SendToken {
            to: "".into(),
            amount: "5".into()
        })
        .is_err());
        assert!(validate(&RelayAction::SendToken {
            to: "0x1".into(),
            amount: " ".into()
        })
        .is_err());
        assert!(validate(&RelayAction::MintBadge { to: "0x1".into() }).is_ok());
        assert!(validate(&RelayAction::MintBadge { to: "".into() }).is_err());
    }

    #[test]
    fn test_parse_receipt() {
        let receipt = parse_receipt(r#"{"success":true,"txHash":"0xdead"}"#).unwrap();
        assert_eq!(receipt.tx_hash.as_deref(), Some("0xdead"));

        let err = parse_receipt(r#"{"success":false,"error":"nonce too low"}"#).unwrap_err();
        assert!(matches!(err, AutomataError::RelayFailure(ref m) if m == "nonce too low"));

        assert!(parse_receipt("not json").is_err());
    }

    #[test]
    fn test_request_wire_shape() {
        let body = serde_json::to_value(RelayAction::SendToken {
            to: "0xABC".into(),
            amount: "10".into(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"action": "sendToken", "params": {"to": "0xABC", "amount": "10"}})
        );
    }

    #[tokio::test]
    async fn test_invalid_action_fails_without_request() {
        // Nothing listens here; validation must fail first.
        let relay = HttpRelay::new("http://127.0.0.1:9/relay", None).unwrap();
        let err = relay
            .submit(RelayAction::MintBadge { to: String::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, AutomataError::RelayFailure(ref m) if m.contains("mintBadge")));
    }
}
