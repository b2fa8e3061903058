//! Reason codes for every pipeline outcome
//!
//! R1xx success, R2xx extraction, R3xx gating, R4xx write

use serde::{Deserialize, Serialize};

/// Reason codes for cycle outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R1xx: Success
    // =========================================================================
    /// Score written into the story point field
    R100_SCORE_COMMITTED,
    /// Score derived, no write requested
    R101_SCORE_DERIVED,

    // =========================================================================
    // R2xx: Extraction
    // =========================================================================
    /// No duration could be located or parsed
    R201_DURATION_UNAVAILABLE,
    /// No valid complexity rating could be located
    R202_COMPLEXITY_UNAVAILABLE,

    // =========================================================================
    // R3xx: Gating
    // =========================================================================
    /// Calculator is inactive, trigger ignored
    R300_INACTIVE,
    /// Log-time dialog is open, run suppressed
    R301_MODAL_OPEN,
    /// Poll found nothing changed since the last run
    R302_UNCHANGED,

    // =========================================================================
    // R4xx: Write
    // =========================================================================
    /// No story point control could be found
    R401_TARGET_NOT_FOUND,
    /// Edit view did not render before the timeout
    R402_RACE_LOST,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R100_SCORE_COMMITTED => "R100_SCORE_COMMITTED",
            Self::R101_SCORE_DERIVED => "R101_SCORE_DERIVED",
            Self::R201_DURATION_UNAVAILABLE => "R201_DURATION_UNAVAILABLE",
            Self::R202_COMPLEXITY_UNAVAILABLE => "R202_COMPLEXITY_UNAVAILABLE",
            Self::R300_INACTIVE => "R300_INACTIVE",
            Self::R301_MODAL_OPEN => "R301_MODAL_OPEN",
            Self::R302_UNCHANGED => "R302_UNCHANGED",
            Self::R401_TARGET_NOT_FOUND => "R401_TARGET_NOT_FOUND",
            Self::R402_RACE_LOST => "R402_RACE_LOST",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R100_SCORE_COMMITTED => "Story points written",
            Self::R101_SCORE_DERIVED => "Story points derived",
            Self::R201_DURATION_UNAVAILABLE => "Time tracking unavailable",
            Self::R202_COMPLEXITY_UNAVAILABLE => "Complexity unavailable",
            Self::R300_INACTIVE => "Calculator inactive",
            Self::R301_MODAL_OPEN => "Log time dialog open",
            Self::R302_UNCHANGED => "Fields unchanged",
            Self::R401_TARGET_NOT_FOUND => "Story point field not found",
            Self::R402_RACE_LOST => "Edit view did not appear in time",
        }
    }

    /// Did the cycle produce a score?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::R100_SCORE_COMMITTED | Self::R101_SCORE_DERIVED)
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_description() {
        let text = ReasonCode::R402_RACE_LOST.to_string();
        assert_eq!(text, "R402_RACE_LOST: Edit view did not appear in time");
    }

    #[test]
    fn test_serde_uses_code_name() {
        let json = serde_json::to_string(&ReasonCode::R301_MODAL_OPEN).unwrap();
        assert_eq!(json, "\"R301_MODAL_OPEN\"");
    }

    #[test]
    fn test_success_codes() {
        assert!(ReasonCode::R100_SCORE_COMMITTED.is_success());
        assert!(!ReasonCode::R302_UNCHANGED.is_success());
    }
}
