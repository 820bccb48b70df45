//! Calendar date windows.
//!
//! Dates are `NaiveDate`: a calendar day with no timezone attached, so the same
//! value parses and prints identically regardless of the server's zone.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Inclusive date window; either bound may be open.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Build a window, rejecting `start > end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> DomainResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(DomainError::validation(format!(
                    "start date {s} is after end date {e}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// The unbounded window.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }

    /// The last day strictly before the window, if the window has a start.
    pub fn day_before_start(&self) -> Option<NaiveDate> {
        self.start.and_then(|s| s.pred_opt())
    }
}
