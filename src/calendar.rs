use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::DashboardError;
use crate::format::{format_date, DividendRow};
use crate::models::DividendEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl CalendarRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, DashboardError> {
        if start_date > end_date {
            return Err(DashboardError::BadRequest(format!(
                "start_date {} is after end_date {}",
                start_date, end_date
            )));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    pub fn around(today: NaiveDate, lookback_days: i64, lookahead_days: i64) -> Self {
        Self {
            start_date: today - Duration::days(lookback_days),
            end_date: today + Duration::days(lookahead_days),
        }
    }

    /// Parses the requested bounds, falling back to the default range for
    /// any bound that was not supplied.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        default: CalendarRange,
    ) -> Result<Self, DashboardError> {
        let start_date = parse_bound("start_date", start)?.unwrap_or(default.start_date);
        let end_date = parse_bound("end_date", end)?.unwrap_or(default.end_date);
        Self::new(start_date, end_date)
    }
}

fn parse_bound(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, DashboardError> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|_| DashboardError::BadRequest(format!("{} must be YYYY-MM-DD, got {}", name, v))),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub label: String,
    pub dividends: Vec<DividendRow>,
}

/// Groups rows by ex-dividend date, earliest day first. Rows keep their
/// upstream order within a day; rows without an ex-dividend date are
/// dropped.
pub fn group_by_ex_date(rows: Vec<DividendEvent>) -> Vec<CalendarDay> {
    let mut days: BTreeMap<NaiveDate, Vec<DividendRow>> = BTreeMap::new();
    for row in rows {
        if let Some(date) = row.ex_dividend_date {
            days.entry(date).or_default().push(DividendRow::from(row));
        }
    }

    days.into_iter()
        .map(|(date, dividends)| CalendarDay {
            date,
            label: format_date(Some(date)),
            dividends,
        })
        .collect()
}
