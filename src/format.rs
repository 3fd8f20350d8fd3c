use chrono::NaiveDate;
use serde::Serialize;

use crate::models::DividendEvent;

pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%b %-d, %Y").to_string(),
        None => "-".to_string(),
    }
}

/// US dollars with two to four fraction digits. Missing and zero amounts
/// render as `-`.
pub fn format_currency(amount: Option<f64>) -> String {
    let amount = match amount {
        Some(a) if a != 0.0 && a.is_finite() => a,
        _ => return "-".to_string(),
    };

    let fixed = format!("{:.4}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let mut frac = frac.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, group_thousands(whole), frac)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn frequency_badge(frequency: Option<&str>) -> &'static str {
    match frequency {
        Some("monthly") => "badge-monthly",
        Some("annual") => "badge-annual",
        Some("special") => "badge-special",
        _ => "badge-quarterly",
    }
}

/// A dividend row with display strings alongside the raw values.
#[derive(Debug, Clone, Serialize)]
pub struct DividendRow {
    #[serde(flatten)]
    pub event: DividendEvent,
    pub ex_dividend_display: String,
    pub payment_display: String,
    pub amount_display: String,
    pub frequency_label: String,
    pub frequency_badge: &'static str,
}

impl From<DividendEvent> for DividendRow {
    fn from(event: DividendEvent) -> Self {
        Self {
            ex_dividend_display: format_date(event.ex_dividend_date),
            payment_display: format_date(event.payment_date),
            amount_display: format_currency(event.amount),
            frequency_label: event.frequency.clone().unwrap_or_else(|| "N/A".to_string()),
            frequency_badge: frequency_badge(event.frequency.as_deref()),
            event,
        }
    }
}
