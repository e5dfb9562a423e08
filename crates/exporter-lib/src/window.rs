//! Billing window computation
//!
//! The billing source aggregates cost per calendar month. A window is the
//! half-open date range `[first day of month, first day of next month)`.

use chrono::{Datelike, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format understood by the billing API
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Half-open, date-only billing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingWindow {
    /// Window of the calendar month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let end = start
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX);

        Self { start, end }
    }

    /// Window of the current month in the local calendar
    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// Inclusive start date as `YYYY-MM-DD`
    pub fn start_date(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    /// Exclusive end date as `YYYY-MM-DD`
    pub fn end_date(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for BillingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_date(), self.end_date())
    }
}
