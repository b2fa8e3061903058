//! Output structures for one pipeline cycle

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use colored::Colorize;
use crate::types::{DerivedScore, FieldReading, ReasonCode, Trigger};

/// How the score reached the story point field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePath {
    /// Input already present in the primary container
    Direct,
    /// Primary container needed the edit button first
    EditMode,
    /// Matched through an alternative selector
    Alternative,
    /// Alternative placeholder needed the edit button first
    AlternativeEditMode,
    /// Located by its "Add story points" placeholder text
    Placeholder,
}

impl std::fmt::Display for WritePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WritePath::Direct => "direct",
            WritePath::EditMode => "edit-mode",
            WritePath::Alternative => "alternative",
            WritePath::AlternativeEditMode => "alternative-edit-mode",
            WritePath::Placeholder => "placeholder",
        };
        f.write_str(name)
    }
}

/// Result of one trigger → extract → derive → write cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutput {
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// What started the cycle
    pub trigger: Trigger,
    /// Values read from the page (empty when gated)
    pub reading: FieldReading,
    /// Derived score, if both operands were available
    pub score: Option<DerivedScore>,
    /// Where the score was written
    pub write_path: Option<WritePath>,
    /// Why the cycle ended the way it did
    pub reason: ReasonCode,
}

impl CycleOutput {
    /// Create new output
    pub fn new(trigger: Trigger, reading: FieldReading, reason: ReasonCode) -> Self {
        Self {
            timestamp: Utc::now(),
            trigger,
            reading,
            score: None,
            write_path: None,
            reason,
        }
    }

    /// Cycle that never looked at the page
    pub fn gated(trigger: Trigger, reason: ReasonCode) -> Self {
        Self::new(trigger, FieldReading::default(), reason)
    }

    pub fn with_score(mut self, score: DerivedScore) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_write_path(mut self, path: WritePath) -> Self {
        self.write_path = Some(path);
        self
    }

    /// Did this cycle write to the page?
    pub fn committed(&self) -> bool {
        self.reason == ReasonCode::R100_SCORE_COMMITTED
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "time={} | complexity={} | priority={} | points={} | reason={}",
            display_opt(&self.reading.duration),
            display_opt(&self.reading.complexity),
            display_opt(&self.reading.priority),
            display_opt(&self.score),
            self.reason.code()
        )
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let points = display_opt(&self.score);
        let points = if self.reason.is_success() {
            points.green().bold()
        } else {
            points.yellow()
        };
        let reason = if self.reason.is_success() {
            self.reason.code().green()
        } else {
            self.reason.code().red()
        };
        format!(
            "{} time={} complexity={} priority={} → points={} | {}",
            "▸".cyan(),
            display_opt(&self.reading.duration),
            display_opt(&self.reading.complexity),
            display_opt(&self.reading.priority),
            points,
            reason
        )
    }
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComplexityRating, Hours};

    #[test]
    fn test_parseable_format() {
        let reading = FieldReading {
            duration: Hours::new(2.0),
            complexity: ComplexityRating::new(0.2),
            priority: None,
        };
        let output = CycleOutput::new(Trigger::Manual, reading, ReasonCode::R100_SCORE_COMMITTED)
            .with_score(DerivedScore::rounded(0.63))
            .with_write_path(WritePath::Direct);

        assert_eq!(
            output.to_parseable_string(),
            "time=2h | complexity=0.2 | priority=- | points=0.63 | reason=R100_SCORE_COMMITTED"
        );
        assert!(output.committed());
    }

    #[test]
    fn test_gated_has_empty_reading() {
        let output = CycleOutput::gated(Trigger::Poll, ReasonCode::R300_INACTIVE);
        assert_eq!(output.reading, FieldReading::default());
        assert!(output.score.is_none());
        assert!(!output.committed());
    }

    #[test]
    fn test_json_roundtrip_keeps_reason() {
        let output = CycleOutput::gated(Trigger::Load, ReasonCode::R301_MODAL_OPEN);
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"reason\":\"R301_MODAL_OPEN\""));
        let back: CycleOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.reason, ReasonCode::R301_MODAL_OPEN);
    }
}
