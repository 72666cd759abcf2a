//! Underwriting math.
//!
//! `calculator` holds the closed-form offer formulas (MAO, 70% rule,
//! buy-box, profit/ROI). `formula` is the small expression language that
//! lets underwriters save their own formulas over the same variables.

pub mod calculator;
pub mod formula;

pub use calculator::{
    buy_box_offer, evaluate, max_allowable_offer, profit_and_roi, seventy_percent_rule,
    ProfitAndRoi, UnderwritingError, UnderwritingInputs, UnderwritingResult, VARIABLE_NAMES,
};
pub use formula::{Formula, FormulaError};
