//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table family. Functions take a borrowed
//! `Connection` so callers decide the transaction boundary.

mod access_token;
mod alert;
mod appointment;
mod audit;
mod medical_record;
mod notification;
mod preference;
mod profile;
mod task;
mod user;
mod vital_sign;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::ToSql;
use uuid::Uuid;

use super::{conversion_error, DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};

// Re-export all public items from sub-modules
pub use access_token::*;
pub use alert::*;
pub use appointment::*;
pub use audit::*;
pub use medical_record::*;
pub use notification::*;
pub use preference::*;
pub use profile::*;
pub use task::*;
pub use user::*;
pub use vital_sign::*;

// ── Row decoding helpers ─────────────────────────────────

pub(crate) fn uuid_at(row: &rusqlite::Row, idx: usize) -> Result<Uuid, rusqlite::Error> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_uuid_at(row: &rusqlite::Row, idx: usize) -> Result<Option<Uuid>, rusqlite::Error> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn date_at(row: &rusqlite::Row, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_date_at(row: &rusqlite::Row, idx: usize) -> Result<Option<NaiveDate>, rusqlite::Error> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn time_at(row: &rusqlite::Row, idx: usize) -> Result<NaiveTime, rusqlite::Error> {
    let s: String = row.get(idx)?;
    NaiveTime::parse_from_str(&s, TIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn datetime_at(row: &rusqlite::Row, idx: usize) -> Result<NaiveDateTime, rusqlite::Error> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_datetime_at(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<NaiveDateTime>, rusqlite::Error> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn enum_at<T>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = super::DatabaseError>,
{
    let s: String = row.get(idx)?;
    T::from_str(&s).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn fmt_time(t: &NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

pub(crate) fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Current local time truncated to whole seconds, the precision stored.
pub fn now() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    NaiveDateTime::parse_from_str(&fmt_datetime(&now), DATETIME_FORMAT).unwrap_or(now)
}

// ── Dynamic WHERE clauses ────────────────────────────────

/// Accumulates `AND` conditions with numbered placeholders.
#[derive(Default)]
pub(crate) struct Conditions {
    sql: String,
    params: Vec<Box<dyn ToSql>>,
}

impl Conditions {
    /// `clause` is the left-hand side including the operator, e.g. `"a.status ="`.
    pub(crate) fn push<T: ToSql + 'static>(&mut self, clause: &str, value: T) {
        self.params.push(Box::new(value));
        self.sql
            .push_str(&format!(" AND {clause} ?{}", self.params.len()));
    }

    /// A condition with no bound value, e.g. `"n.is_read = 0"`.
    pub(crate) fn push_raw(&mut self, clause: &str) {
        self.sql.push_str(&format!(" AND {clause}"));
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind index for the next parameter appended after the conditions.
    pub(crate) fn next_index(&self) -> usize {
        self.params.len() + 1
    }

    pub(crate) fn params_with<'a>(&'a self, extra: &'a [&'a dyn ToSql]) -> Vec<&'a dyn ToSql> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &dyn ToSql)
            .chain(extra.iter().copied())
            .collect()
    }
}
