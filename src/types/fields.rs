//! Normalized field values read from the host page

use serde::{Deserialize, Serialize};
use crate::{COMPLEXITY_RATINGS, SCORE_DECIMALS, URGENT_PRIORITY};

/// Time tracking total in hours (never negative)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hours(f64);

impl Hours {
    /// Wrap an hour count. Negative or non-finite values are rejected.
    pub fn new(hours: f64) -> Option<Self> {
        (hours.is_finite() && hours >= 0.0).then_some(Self(hours))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl std::ops::Add for Hours {
    type Output = Hours;

    fn add(self, rhs: Hours) -> Hours {
        Hours(self.0 + rhs.0)
    }
}

impl std::fmt::Display for Hours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h", self.0)
    }
}

/// One of the seven complexity ratings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ComplexityRating(f64);

impl ComplexityRating {
    /// Accept only exact members of the rating set
    pub fn new(value: f64) -> Option<Self> {
        COMPLEXITY_RATINGS
            .iter()
            .any(|r| *r == value)
            .then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ComplexityRating {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("{} is not a complexity rating", value))
    }
}

impl From<ComplexityRating> for f64 {
    fn from(rating: ComplexityRating) -> f64 {
        rating.0
    }
}

impl std::fmt::Display for ComplexityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Free-text priority label as shown on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityLabel(String);

impl PriorityLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact, case-sensitive match on the urgent label
    pub fn is_urgent(&self) -> bool {
        self.0 == URGENT_PRIORITY
    }
}

impl std::fmt::Display for PriorityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Score written back to the story point field
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedScore(f64);

impl DerivedScore {
    /// Round to the score precision (half away from zero)
    pub fn rounded(value: f64) -> Self {
        Self(round_to(value, SCORE_DECIMALS))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for DerivedScore {
    /// Shortest form, the way the field shows it: `2`, `0.63`, `2.23`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Everything one extraction pass read from the page
///
/// Equality is what the poller compares between ticks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldReading {
    pub duration: Option<Hours>,
    pub complexity: Option<ComplexityRating>,
    pub priority: Option<PriorityLabel>,
}

impl FieldReading {
    /// Both derivation operands present?
    pub fn is_complete(&self) -> bool {
        self.duration.is_some() && self.complexity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_rejects_negative() {
        assert!(Hours::new(-1.0).is_none());
        assert!(Hours::new(f64::NAN).is_none());
        assert_eq!(Hours::new(0.0).map(|h| h.value()), Some(0.0));
    }

    #[test]
    fn test_complexity_set_membership() {
        for rating in COMPLEXITY_RATINGS {
            assert!(ComplexityRating::new(rating).is_some(), "{} should be accepted", rating);
        }
        assert!(ComplexityRating::new(0.5).is_none());
        assert!(ComplexityRating::new(3.0).is_none());
    }

    #[test]
    fn test_complexity_deserialize_validates() {
        let ok: ComplexityRating = serde_json::from_str("1.5").unwrap();
        assert_eq!(ok.value(), 1.5);
        assert!(serde_json::from_str::<ComplexityRating>("0.4").is_err());
    }

    #[test]
    fn test_urgent_is_exact() {
        assert!(PriorityLabel::new("Urgent").is_urgent());
        assert!(!PriorityLabel::new("urgent").is_urgent());
        assert!(!PriorityLabel::new("Urgent ").is_urgent());
    }

    #[test]
    fn test_score_display_shortest() {
        assert_eq!(DerivedScore::rounded(2.0).to_string(), "2");
        assert_eq!(DerivedScore::rounded(0.632455).to_string(), "0.63");
        assert_eq!(DerivedScore::rounded(2.23).to_string(), "2.23");
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to(0.125, 1), 0.1);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
    }

    #[test]
    fn test_reading_completeness() {
        let mut reading = FieldReading::default();
        assert!(!reading.is_complete());
        reading.duration = Hours::new(2.0);
        reading.complexity = ComplexityRating::new(0.2);
        assert!(reading.is_complete());
    }
}
