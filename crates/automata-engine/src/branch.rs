use serde::{Deserialize, Serialize};

use automata_core::error::{AutomataError, Result};
use automata_core::payload::Payload;

use crate::graph::Edge;

/// Which output port of a decision node fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchResult {
    True,
    False,
}

impl BranchResult {
    /// Parse a classifier verdict. Only the exact strings `"TRUE"` and
    /// `"FALSE"` honour the classifier contract.
    pub fn from_verdict(verdict: &str) -> Result<Self> {
        match verdict {
            "TRUE" => Ok(Self::True),
            "FALSE" => Ok(Self::False),
            other => Err(AutomataError::ClassifierContractViolation(other.to_string())),
        }
    }

    /// The lower-cased result, which is also the source handle it selects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
        }
    }
}

impl std::fmt::Display for BranchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision node's result wrapped around the payload it judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub result: BranchResult,
    pub original_data: Payload,
}

impl DecisionOutcome {
    pub fn new(result: BranchResult, original_data: Payload) -> Self {
        Self {
            result,
            original_data,
        }
    }

    /// Unwrap the payload to forward to the selected branch.
    pub fn into_payload(self) -> Payload {
        self.original_data
    }
}

/// Select the outgoing edges whose source handle equals the decision result.
///
/// Order follows the graph model. An empty result means the branch is a dead
/// end; callers log it and stop, it is not an error.
pub fn resolve(result: BranchResult, outgoing: Vec<Edge>) -> Vec<Edge> {
    outgoing
        .into_iter()
        .filter(|e| e.source_handle.as_deref() == Some(result.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_verdicts() {
        assert_eq!(BranchResult::from_verdict("TRUE").unwrap(), BranchResult::True);
        assert_eq!(BranchResult::from_verdict("FALSE").unwrap(), BranchResult::False);

        for bad in ["true", "Yes", "TRUE.", " TRUE", "", "MAYBE"] {
            let err = BranchResult::from_verdict(bad).unwrap_err();
            assert!(
                matches!(err, AutomataError::ClassifierContractViolation(_)),
                "verdict {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_resolve_matches_handle_in_order() {
        let outgoing = vec![
            Edge::branch("g", "true", "a"),
            Edge::branch("g", "false", "b"),
            Edge::branch("g", "true", "c"),
            Edge::new("g", "d"),
        ];

        let taken = resolve(BranchResult::True, outgoing.clone());
        let targets: Vec<&str> = taken.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["a", "c"]);

        let taken = resolve(BranchResult::False, outgoing);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].target, "b");
    }

    #[test]
    fn test_resolve_unmatched_is_empty() {
        let outgoing = vec![Edge::branch("g", "true", "a")];
        assert!(resolve(BranchResult::False, outgoing).is_empty());
        assert!(resolve(BranchResult::True, vec![]).is_empty());
    }

    #[test]
    fn test_outcome_wire_shape() {
        let mut data = Payload::new();
        data.set_str("to", "0xABC");
        let outcome = DecisionOutcome::new(BranchResult::True, data.clone());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"result": "true", "originalData": {"to": "0xABC"}})
        );
        assert_eq!(outcome.into_payload(), data);
    }
}
