//! Storypoint: derives a story point estimate from an issue page
//!
//! Pipeline: HostDocument → Locator → Normalizer → derive → Writer

pub mod config;
pub mod core;
pub mod dom;
pub mod error;
pub mod logging;
pub mod types;

// =============================================================================
// DURATION GRAMMAR
// =============================================================================

/// Hours in one tracker workday (`1d`)
pub const WORKDAY_HOURS: f64 = 8.0;

// =============================================================================
// COMPLEXITY RATINGS
// =============================================================================

/// The closed set of complexity ratings the tracker offers
pub const COMPLEXITY_RATINGS: [f64; 7] = [0.1, 0.2, 0.3, 0.6, 1.0, 1.5, 2.0];

// =============================================================================
// DERIVATION
// =============================================================================

/// Priority label that earns the urgency bonus (exact match)
pub const URGENT_PRIORITY: &str = "Urgent";

/// Bonus added to the score for urgent issues
pub const URGENT_BONUS: f64 = 0.5;

/// Decimal places kept in the derived score
pub const SCORE_DECIMALS: i32 = 2;

// =============================================================================
// TIMING
// =============================================================================

/// Quiet period before a debounced input run (milliseconds)
pub const DEBOUNCE_MS: u64 = 200;

/// Interval of the change-detection poll (milliseconds)
pub const POLL_INTERVAL_MS: u64 = 2000;

/// Step between re-queries after clicking an edit trigger (milliseconds)
pub const EDIT_POLL_MS: u64 = 50;

/// Give up on the edit view after this long (milliseconds)
/// The host usually re-renders within 200-300 ms
pub const EDIT_TIMEOUT_MS: u64 = 1000;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
