use serde::{Deserialize, Serialize};
use std::fmt;

/// ROI percentage above which a page is Profitable (exclusive).
pub const PROFITABLE_ROI: f64 = 40.0;
/// ROI percentage below which a page should be turned off (exclusive).
pub const TURN_OFF_ROI: f64 = -40.0;
/// Sentinel ROI for revenue with zero spend. Downstream display logic
/// special-cases `roi > 900` to mean "unbounded", so this stays a literal
/// constant rather than an actual infinity.
pub const UNBOUNDED_ROI: f64 = 999.0;

/// Profitability category of a reconciled page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Status {
    Profitable,
    Improving,
    Losing,
    TurnOff,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Profitable => "Profitable",
            Status::Improving => "Improving",
            Status::Losing => "Losing",
            Status::TurnOff => "TurnOff",
        };
        write!(f, "{}", s)
    }
}

/// Return on investment as a percentage of converted spend.
///
/// Zero spend with revenue yields the [`UNBOUNDED_ROI`] sentinel; zero spend
/// with zero revenue yields 0.
pub fn roi_percent(spend_target: f64, revenue: f64) -> f64 {
    if spend_target > 0.0 {
        (revenue - spend_target) / spend_target * 100.0
    } else if revenue > 0.0 {
        UNBOUNDED_ROI
    } else {
        0.0
    }
}

/// Maps (converted spend, revenue) to a profitability category.
///
/// The boundaries are deliberately asymmetric and inclusive on the Improving
/// and Losing sides: roi of exactly 40 is Improving, roi of exactly -40 is
/// Losing. A page with no spend and no revenue yet is Improving.
pub fn classify(spend_target: f64, revenue: f64) -> Status {
    if spend_target == 0.0 && revenue == 0.0 {
        return Status::Improving;
    }

    let roi = roi_percent(spend_target, revenue);
    if roi > PROFITABLE_ROI {
        Status::Profitable
    } else if roi >= 0.0 {
        Status::Improving
    } else if roi < TURN_OFF_ROI {
        Status::TurnOff
    } else {
        Status::Losing
    }
}
