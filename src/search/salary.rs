// src/search/salary.rs
//! Best-effort parsing of the free-form pay strings platforms display.

use regex::Regex;
use std::sync::LazyLock;

static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([kK])?").unwrap());

const HOURS_PER_YEAR: f64 = 2080.0;
const WEEKS_PER_YEAR: f64 = 52.0;
const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPeriod {
    Hour,
    Week,
    Month,
    Year,
    /// No period stated, e.g. a fixed budget or a bare range.
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalaryRange {
    pub min: f64,
    pub max: f64,
    pub period: PayPeriod,
}

impl SalaryRange {
    /// Yearly equivalent of the range, when the period allows it.
    pub fn annualized(&self) -> Option<(f64, f64)> {
        let factor = match self.period {
            PayPeriod::Hour => HOURS_PER_YEAR,
            PayPeriod::Week => WEEKS_PER_YEAR,
            PayPeriod::Month => MONTHS_PER_YEAR,
            PayPeriod::Year => 1.0,
            PayPeriod::Unspecified => return None,
        };
        Some((self.min * factor, self.max * factor))
    }
}

fn detect_period(lower: &str) -> Option<PayPeriod> {
    if ["hour", "/hr", " hr", "hourly", "p/h"].iter().any(|p| lower.contains(p)) {
        Some(PayPeriod::Hour)
    } else if lower.contains("week") || lower.contains("/wk") {
        Some(PayPeriod::Week)
    } else if lower.contains("month") || lower.contains("/mo") {
        Some(PayPeriod::Month)
    } else if ["year", "annum", "annual", "/yr"].iter().any(|p| lower.contains(p)) {
        Some(PayPeriod::Year)
    } else {
        None
    }
}

/// Parse `$80,000 - $120,000 a year`, `$45.50/hr`, `$40-$60`, `80k` and
/// similar. A single amount gives `min == max`. Returns `None` when the text
/// holds no amount.
pub fn parse_salary(text: &str) -> Option<SalaryRange> {
    let lower = text.to_lowercase();
    let mut amounts = AMOUNT.captures_iter(&lower).filter_map(|caps| {
        let value: f64 = caps[1].replace(',', "").parse().ok()?;
        let thousands = caps.get(2).is_some();
        Some((if thousands { value * 1000.0 } else { value }, thousands))
    });

    let (first, first_k) = amounts.next()?;
    let (second, second_k) = amounts.next().unwrap_or((first, first_k));
    let (min, max) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };

    let period = detect_period(&lower).unwrap_or(if first_k || second_k || min >= 10_000.0 {
        PayPeriod::Year
    } else {
        PayPeriod::Unspecified
    });

    Some(SalaryRange { min, max, period })
}
