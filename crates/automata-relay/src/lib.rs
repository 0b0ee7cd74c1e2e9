pub mod classifier;
pub mod relay;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use automata_core::config::AppConfig;
use automata_core::error::{AutomataError, Result};
use automata_core::traits::{Classifier, Relay};

pub use classifier::HttpClassifier;
pub use relay::HttpRelay;

/// Create the HTTP classifier and relay described by the configuration.
pub fn create_collaborators(config: &AppConfig) -> Result<(Arc<dyn Classifier>, Arc<dyn Relay>)> {
    let classifier = HttpClassifier::new(&config.classifier.url, config.classifier.timeout_secs)?;
    let relay = HttpRelay::new(&config.relay.url, config.relay.timeout_secs)?;
    Ok((Arc::new(classifier), Arc::new(relay)))
}

pub(crate) fn http_client(timeout_secs: Option<u64>) -> Result<Client> {
    let Some(secs) = timeout_secs else {
        return Ok(Client::new());
    };
    Client::builder()
        .timeout(Duration::from_secs(secs))
        .build()
        .map_err(|e| AutomataError::Config(format!("failed to build HTTP client: {}", e)))
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Describe a non-2xx response, preferring the service's own `error` field.
pub(crate) fn failure_detail(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(error) }) => format!("HTTP {}: {}", status, error),
        _ if body.trim().is_empty() => format!("HTTP {}", status),
        _ => format!("HTTP {}: {}", status, body.trim()),
    }
}
