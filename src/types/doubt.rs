//! Transaction doubts.
//!
//! A doubt is a flagged anomaly in a fully-built parameter set. The list
//! produced by verification is never mutated afterwards; acknowledgement is a
//! separate gate tracked by the caller, not a removal of doubts.

use serde::{Deserialize, Serialize};

/// Severity of a doubt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DoubtSeverity {
    /// Review suggested before submitting.
    Warning,
    /// Explicit risk acknowledgement required before submitting.
    Critical,
}

/// A flagged anomaly in transaction parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDoubt {
    /// Severity of the anomaly.
    pub severity: DoubtSeverity,
    /// Human-readable message.
    pub message: String,
    /// Name of the offending field, if attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    /// Technical note for debugging, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TransactionDoubt {
    /// Creates a warning doubt.
    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: DoubtSeverity::Warning, message: message.into(), field: None, note: None }
    }

    /// Creates a critical doubt.
    pub fn critical(message: impl Into<String>) -> Self {
        Self { severity: DoubtSeverity::Critical, message: message.into(), field: None, note: None }
    }

    /// Attributes the doubt to a field.
    pub fn on(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    /// Attaches a technical note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// The caller's acknowledgement of a doubt list.
///
/// Ordered by strength: a stronger acknowledgement satisfies any weaker
/// requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Acknowledgement {
    /// No acknowledgement. Sufficient only for an empty doubt list.
    #[default]
    None,
    /// The caller reviewed the warnings.
    Reviewed,
    /// The caller explicitly accepted the flagged risk.
    RiskAccepted,
}

/// Returns the acknowledgement level a doubt list requires before submission
/// is allowed.
pub fn required_acknowledgement(doubts: &[TransactionDoubt]) -> Acknowledgement {
    if doubts.iter().any(|doubt| doubt.severity == DoubtSeverity::Critical) {
        Acknowledgement::RiskAccepted
    } else if doubts.is_empty() {
        Acknowledgement::None
    } else {
        Acknowledgement::Reviewed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acknowledgement_requirements() {
        assert_eq!(required_acknowledgement(&[]), Acknowledgement::None);
        assert_eq!(
            required_acknowledgement(&[TransactionDoubt::warning("w")]),
            Acknowledgement::Reviewed
        );
        assert_eq!(
            required_acknowledgement(&[
                TransactionDoubt::warning("w"),
                TransactionDoubt::critical("c")
            ]),
            Acknowledgement::RiskAccepted
        );
    }

    #[test]
    fn stronger_acknowledgement_satisfies_weaker() {
        assert!(Acknowledgement::RiskAccepted >= Acknowledgement::Reviewed);
        assert!(Acknowledgement::Reviewed >= Acknowledgement::None);
    }
}
