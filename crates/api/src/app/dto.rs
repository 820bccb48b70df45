use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use finken_accounting::EntryStatus;
use finken_core::{ActorId, DateRange};
use finken_events::{ActionType, AuditEntity, EventLogFilter, Pagination};
use finken_infra::JournalFilter;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RejectEntryRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReverseEntryRequest {
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListAccountsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    pub as_of: Option<NaiveDate>,
}

impl AsOfQuery {
    /// Statements default to today when no date is given.
    pub fn date_or_today(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JournalListQuery {
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: Option<ActorId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventLogQuery {
    pub entity: Option<String>,
    pub record_id: Option<String>,
    pub actor: Option<ActorId>,
    pub action: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -------------------------
// Mapping helpers
// -------------------------

/// Unwrap a JSON body, answering malformed input with a 400 in the usual shape.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| errors::validation(e.body_text()))
}

pub fn path<T>(extracted: Result<Path<T>, PathRejection>) -> Result<T, axum::response::Response> {
    extracted
        .map(|Path(v)| v)
        .map_err(|e| errors::validation(e.body_text()))
}

pub fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, axum::response::Response> {
    extracted
        .map(|Query(v)| v)
        .map_err(|e| errors::validation(e.body_text()))
}

pub fn date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<DateRange, axum::response::Response> {
    DateRange::new(start, end).map_err(|e| errors::validation(e.to_string()))
}

impl JournalListQuery {
    pub fn into_filter(self) -> Result<JournalFilter, axum::response::Response> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<EntryStatus>)
            .transpose()
            .map_err(|e| errors::validation(e.to_string()))?;
        Ok(JournalFilter {
            status,
            start_date: self.start_date,
            end_date: self.end_date,
            created_by: self.created_by,
        })
    }
}

impl EventLogQuery {
    pub fn into_parts(self) -> Result<(EventLogFilter, Pagination), axum::response::Response> {
        let entity = self
            .entity
            .as_deref()
            .map(str::parse::<AuditEntity>)
            .transpose()
            .map_err(errors::validation)?;
        let action = self
            .action
            .as_deref()
            .map(str::parse::<ActionType>)
            .transpose()
            .map_err(errors::validation)?;
        let filter = EventLogFilter {
            entity,
            record_id: self.record_id,
            actor: self.actor,
            action,
            since: self.since,
            until: self.until,
        };
        Ok((filter, Pagination::new(self.limit, self.offset)))
    }
}
