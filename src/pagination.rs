// src/pagination.rs
//! Page/limit normalisation, date filters and a small WHERE-clause builder
//! whose parameters are bound through sqlx (never interpolated).

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;
use crate::error::ApiError;

// ==================== PAGE / LIMIT ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// `page` is clamped to >= 1, `limit` to `1..=max_limit`.
    /// Offsets past `i64::MAX` saturate, which simply yields an empty page.
    pub fn normalize(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        let offset = (page - 1).saturating_mul(limit);
        Self { page, limit, offset }
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

// ==================== DATES ====================

/// Half-open time window `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

fn parse_date_only(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// A whole UTC day given as `YYYY-MM-DD`.
pub fn day_range(value: &str) -> Result<TimeRange, ApiError> {
    let date = parse_date_only(value.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", value)))?;
    let from = start_of(date);
    Ok(TimeRange { from, to: from + Duration::days(1) })
}

/// Inclusive `start`/`end` bounds. Each may be a date (`YYYY-MM-DD`) or an
/// RFC 3339 instant; a date-only `end` covers that whole day.
pub fn inclusive_range(start: &str, end: &str) -> Result<TimeRange, ApiError> {
    let (start, end) = (start.trim(), end.trim());

    let from = parse_date_only(start)
        .map(start_of)
        .or_else(|| parse_instant(start))
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid startDate '{}'", start)))?;

    let to = match parse_date_only(end) {
        Some(date) => start_of(date) + Duration::days(1),
        None => parse_instant(end)
            .map(|t| t + Duration::nanoseconds(1))
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid endDate '{}'", end)))?,
    };

    if to <= from {
        return Err(ApiError::bad_request("endDate must not be before startDate"));
    }

    Ok(TimeRange { from, to })
}

// ==================== FILTER BUILDER ====================

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Time(DateTime<Utc>),
}

/// Escapes LIKE wildcards; pair with `ESCAPE '\'`.
pub fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(Debug, Default, Clone)]
pub struct FilterBuilder {
    conditions: Vec<String>,
    params: Vec<SqlParam>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_condition(&mut self, condition: &str, param: SqlParam) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.params.push(param);
        self
    }

    pub fn add_exact(&mut self, column: &str, value: &str) -> &mut Self {
        self.add_condition(&format!("{} = ?", column), SqlParam::Text(value.to_string()))
    }

    /// Case-insensitive substring match
    pub fn add_contains(&mut self, column: &str, needle: &str) -> &mut Self {
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
        self.add_condition(
            &format!("LOWER({}) LIKE ? ESCAPE '\\'", column),
            SqlParam::Text(pattern),
        )
    }

    pub fn add_time_range(&mut self, column: &str, range: TimeRange) -> &mut Self {
        self.conditions.push(format!("{} >= ? AND {} < ?", column, column));
        self.params.push(SqlParam::Time(range.from));
        self.params.push(SqlParam::Time(range.to));
        self
    }

    /// Raw condition with its own parameters, e.g. an EXISTS sub-query
    pub fn add_raw(&mut self, condition: &str, params: Vec<SqlParam>) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.params.extend(params);
        self
    }

    /// `" WHERE a AND b"`, or an empty string without conditions
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }
}

pub fn bind_query_as<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Time(t) => query.bind(*t),
        };
    }
    query
}

pub fn bind_scalar<'q, O>(
    mut query: QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Time(t) => query.bind(*t),
        };
    }
    query
}
