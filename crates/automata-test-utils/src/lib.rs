//! Mocks and fixtures shared by Automata tests.
//!
//! The mocks are deterministic: a `ScriptedClassifier` answers from a
//! script, a `RecordingRelay` accepts (or rejects) every submission and
//! remembers it. Both can write to a shared `Journal` so tests can assert
//! the global order and virtual-clock timing of collaborator calls.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use automata_core::error::{AutomataError, Result};
use automata_core::payload::Payload;
use automata_core::traits::{Classifier, Relay};
use automata_core::types::{RelayAction, TxReceipt};

/// Build a payload carrying a recipient in its `to` field.
pub fn payload_to(to: &str) -> Payload {
    let mut payload = Payload::new();
    payload.set_str("to", to);
    payload
}

/// One collaborator call, stamped with the (possibly virtual) clock.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub label: String,
    pub at: Instant,
}

/// Ordered record of collaborator calls across several mocks.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, label: impl Into<String>) {
        self.entries.lock().unwrap().push(JournalEntry {
            label: label.into(),
            at: Instant::now(),
        });
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.label).collect()
    }

    /// When the first entry with `label` was recorded.
    pub fn at(&self, label: &str) -> Option<Instant> {
        self.entries().into_iter().find(|e| e.label == label).map(|e| e.at)
    }
}

/// A classifier that answers from a script.
///
/// Verdicts are taken per prompt if one was registered, else from the
/// queue, else the default. An `Err` entry fails the call with
/// `ClassifierRequest`.
pub struct ScriptedClassifier {
    default: std::result::Result<String, String>,
    queue: Mutex<VecDeque<std::result::Result<String, String>>>,
    by_prompt: HashMap<String, String>,
    delay: Duration,
    journal: Option<Arc<Journal>>,
    calls: Mutex<Vec<(String, Payload)>>,
}

impl ScriptedClassifier {
    /// Answer every question with `verdict`.
    pub fn always(verdict: &str) -> Self {
        Self {
            default: Ok(verdict.to_string()),
            queue: Mutex::new(VecDeque::new()),
            by_prompt: HashMap::new(),
            delay: Duration::ZERO,
            journal: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call as if the service were unreachable.
    pub fn failing(message: &str) -> Self {
        Self {
            default: Err(message.to_string()),
            ..Self::always("")
        }
    }

    /// Answer the queued verdicts in order, then `fallback`.
    pub fn sequence(verdicts: &[&str], fallback: &str) -> Self {
        let classifier = Self::always(fallback);
        classifier
            .queue
            .lock()
            .unwrap()
            .extend(verdicts.iter().map(|v| Ok(v.to_string())));
        classifier
    }

    /// Answer `prompt` with `verdict`, regardless of the queue.
    pub fn with_verdict(mut self, prompt: &str, verdict: &str) -> Self {
        self.by_prompt.insert(prompt.to_string(), verdict.to_string());
        self
    }

    /// Take `delay` (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Every `(prompt, data)` pair received, in order.
    pub fn calls(&self) -> Vec<(String, Payload)> {
        self.calls.lock().unwrap().clone()
    }

    fn next_verdict(&self, prompt: &str) -> std::result::Result<String, String> {
        if let Some(v) = self.by_prompt.get(prompt) {
            return Ok(v.clone());
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, prompt: String, data: Payload) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            if let Some(ref journal) = self.journal {
                journal.record(format!("classify:{}", prompt));
            }
            self.calls.lock().unwrap().push((prompt.clone(), data));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.next_verdict(&prompt)
                .map_err(AutomataError::ClassifierRequest)
        })
    }
}

/// A relay that records every submission.
pub struct RecordingRelay {
    failure: Option<String>,
    delay: Duration,
    journal: Option<Arc<Journal>>,
    actions: Mutex<Vec<RelayAction>>,
    counter: AtomicU64,
}

impl RecordingRelay {
    /// Accept everything, handing out sequential fake transaction hashes.
    pub fn new() -> Self {
        Self {
            failure: None,
            delay: Duration::ZERO,
            journal: None,
            actions: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Reject everything with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Every action submitted, in order.
    pub fn actions(&self) -> Vec<RelayAction> {
        self.actions.lock().unwrap().clone()
    }
}

impl Default for RecordingRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay for RecordingRelay {
    fn submit(&self, action: RelayAction) -> BoxFuture<'_, Result<TxReceipt>> {
        Box::pin(async move {
            if let Some(ref journal) = self.journal {
                journal.record(format!("{}:{}", action.name(), action.recipient()));
            }
            self.actions.lock().unwrap().push(action);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(ref message) = self.failure {
                return Err(AutomataError::RelayFailure(message.clone()));
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TxReceipt {
                tx_hash: Some(format!("0x{:064x}", n)),
            })
        })
    }
}
