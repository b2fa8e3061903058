//! Normalizer: turns raw page text into validated field values
//!
//! Durations use the tracker's `1d 2h 30m` notation where one day is a
//! workday of 8 hours.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Field, PipelineError};
use crate::types::{ComplexityRating, Hours, PriorityLabel};
use crate::WORKDAY_HOURS;

lazy_static! {
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    // =========================================================================
    // Duration grammar, anchored. Digits are ASCII only. Days are whole
    // numbers, hours and minutes may carry decimals.
    // =========================================================================
    static ref RE_DAYS: Regex = Regex::new(r"(?i)^([0-9]+)d$").unwrap();
    static ref RE_DAYS_HOURS: Regex =
        Regex::new(r"(?i)^([0-9]+)d ([0-9]+(?:\.[0-9]+)?)h$").unwrap();
    static ref RE_DAYS_MINUTES: Regex =
        Regex::new(r"(?i)^([0-9]+)d ([0-9]+(?:\.[0-9]+)?)m$").unwrap();
    static ref RE_DAYS_HOURS_MINUTES: Regex =
        Regex::new(r"(?i)^([0-9]+)d ([0-9]+(?:\.[0-9]+)?)h ([0-9]+(?:\.[0-9]+)?)m$").unwrap();
    static ref RE_HOURS_MINUTES: Regex =
        Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)h ([0-9]+(?:\.[0-9]+)?)m$").unwrap();
    static ref RE_HOURS: Regex = Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)h$").unwrap();
    static ref RE_MINUTES: Regex = Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)m$").unwrap();
    static ref RE_BARE: Regex = Regex::new(r"^([0-9]+(?:\.[0-9]+)?)$").unwrap();

    // =========================================================================
    // Free-text phrases shown in the time tracking summary
    // =========================================================================
    static ref RE_LOGGED_PHRASE: Regex =
        Regex::new(r"([0-9]+(?:\.[0-9]+)?)h logged").unwrap();
    static ref RE_REMAINING_PHRASE: Regex =
        Regex::new(r"([0-9]+(?:\.[0-9]+)?)m remaining").unwrap();

    // Leading decimal number, the way a browser's parseFloat reads text
    static ref RE_LEADING_NUMBER: Regex =
        Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)").unwrap();
}

/// Which grammar a duration matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationForm {
    Days,
    DaysHours,
    DaysMinutes,
    DaysHoursMinutes,
    HoursMinutes,
    Hours,
    Minutes,
    Bare,
}

/// Grammars in match order
const DURATION_FORMS: [DurationForm; 8] = [
    DurationForm::Days,
    DurationForm::DaysHours,
    DurationForm::DaysMinutes,
    DurationForm::DaysHoursMinutes,
    DurationForm::HoursMinutes,
    DurationForm::Hours,
    DurationForm::Minutes,
    DurationForm::Bare,
];

fn grammar(form: DurationForm) -> &'static Regex {
    match form {
        DurationForm::Days => &*RE_DAYS,
        DurationForm::DaysHours => &*RE_DAYS_HOURS,
        DurationForm::DaysMinutes => &*RE_DAYS_MINUTES,
        DurationForm::DaysHoursMinutes => &*RE_DAYS_HOURS_MINUTES,
        DurationForm::HoursMinutes => &*RE_HOURS_MINUTES,
        DurationForm::Hours => &*RE_HOURS,
        DurationForm::Minutes => &*RE_MINUTES,
        DurationForm::Bare => &*RE_BARE,
    }
}

/// Parse tracker duration text into hours.
///
/// The first matching grammar wins; anything else is unavailable, never a
/// guessed default.
pub fn parse_duration(raw: &str) -> Result<Hours, PipelineError> {
    let text = RE_WHITESPACE.replace_all(raw.trim(), " ");
    for form in DURATION_FORMS {
        let Some(caps) = grammar(form).captures(&text) else {
            continue;
        };
        let numbers: Option<Vec<f64>> = caps
            .iter()
            .skip(1)
            .map(|m| m.and_then(|m| m.as_str().parse::<f64>().ok()))
            .collect();
        let Some(numbers) = numbers else {
            return Err(PipelineError::Unavailable(Field::Duration));
        };
        let hours = match (form, numbers.as_slice()) {
            (DurationForm::Days, [d]) => d * WORKDAY_HOURS,
            (DurationForm::DaysHours, [d, h]) => d * WORKDAY_HOURS + h,
            (DurationForm::DaysMinutes, [d, m]) => d * WORKDAY_HOURS + m / 60.0,
            (DurationForm::DaysHoursMinutes, [d, h, m]) => d * WORKDAY_HOURS + h + m / 60.0,
            (DurationForm::HoursMinutes, [h, m]) => h + m / 60.0,
            (DurationForm::Hours, [h]) | (DurationForm::Bare, [h]) => *h,
            (DurationForm::Minutes, [m]) => m / 60.0,
            _ => return Err(PipelineError::Unavailable(Field::Duration)),
        };
        return Hours::new(hours).ok_or(PipelineError::Unavailable(Field::Duration));
    }
    Err(PipelineError::Unavailable(Field::Duration))
}

/// Total of logged and remaining time; either alone when only one is known
pub fn combine_durations(
    logged: Option<Hours>,
    remaining: Option<Hours>,
) -> Result<Hours, PipelineError> {
    match (logged, remaining) {
        (Some(logged), Some(remaining)) => Ok(logged + remaining),
        (Some(one), None) | (None, Some(one)) => Ok(one),
        (None, None) => Err(PipelineError::Unavailable(Field::Duration)),
    }
}

/// Scan summary text like `"3h logged, 30m remaining"`.
///
/// A remaining phrase only counts alongside a logged phrase.
pub fn parse_time_summary(text: &str) -> Option<Hours> {
    let logged = RE_LOGGED_PHRASE
        .captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok())?;
    let remaining_minutes = RE_REMAINING_PHRASE
        .captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok());
    Hours::new(logged + remaining_minutes.map_or(0.0, |m| m / 60.0))
}

/// Leading decimal number of `raw`, or `None` when it starts with anything else
pub fn leading_number(raw: &str) -> Option<f64> {
    RE_LEADING_NUMBER
        .find(raw.trim())
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Validate a complexity rating against the closed rating set
pub fn parse_complexity(raw: &str) -> Result<ComplexityRating, PipelineError> {
    leading_number(raw)
        .and_then(ComplexityRating::new)
        .ok_or(PipelineError::Unavailable(Field::Complexity))
}

/// Trimmed, non-empty priority label
pub fn parse_priority(raw: &str) -> Option<PriorityLabel> {
    let label = raw.trim();
    (!label.is_empty()).then(|| PriorityLabel::new(label))
}
