//! Derived prospect metrics. Both functions are pure over [`ProspectFields`].

use crate::core::pipeline::{ProspectKind, ProspectStatus, Timeline};
use crate::core::store::types::ProspectFields;

const BASE_SCORE: i64 = 50;
const MOTIVATION_MIN_CHARS: usize = 50;
const BUDGET_STEP: f64 = 100_000.0;
const BUDGET_BONUS_CAP: i64 = 10;
const EXCLUSIVE_MULTIPLIER: f64 = 1.2;

pub fn status_delta(status: ProspectStatus) -> i64 {
    match status {
        ProspectStatus::New => 0,
        ProspectStatus::Contacted => 5,
        ProspectStatus::Qualified => 10,
        ProspectStatus::MeetingSet => 15,
        ProspectStatus::MandateSigned => 20,
        ProspectStatus::Won => 25,
        ProspectStatus::Lost => -40,
    }
}

/// Closing probability used to weight the expected commission.
pub fn probability(status: ProspectStatus) -> f64 {
    match status {
        ProspectStatus::New => 0.05,
        ProspectStatus::Contacted => 0.10,
        ProspectStatus::Qualified => 0.25,
        ProspectStatus::MeetingSet => 0.40,
        ProspectStatus::MandateSigned => 0.70,
        ProspectStatus::Won => 1.0,
        ProspectStatus::Lost => 0.0,
    }
}

fn budget_bonus(budget: Option<f64>) -> i64 {
    match budget {
        Some(b) if b.is_finite() && b >= 0.0 => {
            ((b / BUDGET_STEP).floor() as i64).min(BUDGET_BONUS_CAP)
        }
        _ => 0,
    }
}

/// Priority score in `0..=100`.
pub fn score(p: &ProspectFields) -> i64 {
    let mut total = BASE_SCORE;
    if p.kind == ProspectKind::Seller {
        total += 10;
    }
    if p.timeline == Some(Timeline::Urgent) {
        total += 10;
    }
    if p
        .motivation
        .as_deref()
        .is_some_and(|m| m.trim().chars().count() > MOTIVATION_MIN_CHARS)
    {
        total += 5;
    }
    if p.consent {
        total += 5;
    }
    total += status_delta(p.status);
    total += budget_bonus(p.budget);
    total.clamp(0, 100)
}

/// Probability-weighted commission, rounded to cents. Missing price or rate yields 0.
pub fn expected_value(p: &ProspectFields) -> f64 {
    let (Some(price), Some(rate)) = (p.estimated_price, p.fee_rate) else {
        return 0.0;
    };
    let multiplier = if p.exclusive { EXCLUSIVE_MULTIPLIER } else { 1.0 };
    let raw = price * rate * probability(p.status) * multiplier;
    if !raw.is_finite() {
        return 0.0;
    }
    (raw * 100.0).round() / 100.0
}
