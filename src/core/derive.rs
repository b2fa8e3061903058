//! Score derivation

use crate::types::{round_to, ComplexityRating, DerivedScore, Hours, PriorityLabel};
use crate::{SCORE_DECIMALS, URGENT_BONUS};

/// `round2(sqrt(hours * complexity))`, plus the urgency bonus.
///
/// The bonus is added after rounding and the sum is rounded again so float
/// noise never shows up in the field (`1.73 + 0.5` is `2.23`).
pub fn derive(
    hours: Hours,
    complexity: ComplexityRating,
    priority: Option<&PriorityLabel>,
) -> DerivedScore {
    let base = round_to((hours.value() * complexity.value()).sqrt(), SCORE_DECIMALS);
    with_bonus(base, priority)
}

/// Plain product `hours * complexity`, shown next to the real score in
/// verbose output
pub fn derive_linear(
    hours: Hours,
    complexity: ComplexityRating,
    priority: Option<&PriorityLabel>,
) -> DerivedScore {
    let base = round_to(hours.value() * complexity.value(), SCORE_DECIMALS);
    with_bonus(base, priority)
}

fn with_bonus(base: f64, priority: Option<&PriorityLabel>) -> DerivedScore {
    match priority {
        Some(label) if label.is_urgent() => DerivedScore::rounded(base + URGENT_BONUS),
        _ => DerivedScore::rounded(base),
    }
}
