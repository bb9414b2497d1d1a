//! Merged per-day, per-store, per-family sales records

use crate::{AlignError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Day type used when the holiday calendar has no entry for a date
pub const DEFAULT_DAY_TYPE: &str = "Regular Day";
/// Promotion count assumed for a request that omits it
pub const DEFAULT_ONPROMOTION: f64 = 0.0;
/// Oil price assumed for a request that omits it
pub const DEFAULT_OIL_PRICE: f64 = 50.0;
/// Transaction count assumed for a request that omits it
pub const DEFAULT_TRANSACTIONS: f64 = 1000.0;
/// Store cluster assumed for a request that omits it
pub const DEFAULT_CLUSTER: i64 = 1;

/// One denormalized row: a (date, store, family) triple with its context
///
/// Field names follow the merged CSV layout, so `store_type` and `day_type`
/// serialize as `type_x` and `type_y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    /// Row id of the source table, kept for submissions
    #[serde(default)]
    pub id: Option<i64>,
    /// Calendar day
    pub date: NaiveDate,
    /// Store number
    pub store_nbr: i64,
    /// Product family
    pub family: String,
    /// Units sold; absent for rows that are to be scored
    #[serde(default)]
    pub sales: Option<f64>,
    /// Number of promoted items in the family
    pub onpromotion: f64,
    /// Store city
    pub city: String,
    /// Store state
    pub state: String,
    /// Store type
    #[serde(rename = "type_x")]
    pub store_type: String,
    /// Store cluster
    pub cluster: i64,
    /// Store transactions on that day
    #[serde(default)]
    pub transactions: Option<f64>,
    /// Oil price on that day
    #[serde(default)]
    pub dcoilwtico: Option<f64>,
    /// Holiday calendar day type
    #[serde(rename = "type_y", default)]
    pub day_type: Option<String>,
}

impl SalesRecord {
    /// Check that every categorical field carries a value
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("family", &self.family),
            ("city", &self.city),
            ("state", &self.state),
            ("type_x", &self.store_type),
        ] {
            if value.trim().is_empty() {
                return Err(AlignError::MalformedInput(format!(
                    "required field '{}' is empty for store {} on {}",
                    name, self.store_nbr, self.date
                )));
            }
        }

        if !self.onpromotion.is_finite() {
            return Err(AlignError::MalformedInput(format!(
                "onpromotion must be finite, got {}",
                self.onpromotion
            )));
        }

        Ok(())
    }

    /// Day type, falling back to a regular day
    pub fn day_type_or_default(&self) -> &str {
        self.day_type.as_deref().unwrap_or(DEFAULT_DAY_TYPE)
    }
}

/// A single prediction request as it arrives on the wire
///
/// Every field is optional so that missing required fields are reported as
/// [`AlignError::MalformedInput`] instead of a deserializer error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordInput {
    pub date: Option<String>,
    pub family: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub type_x: Option<String>,
    pub type_y: Option<String>,
    pub onpromotion: Option<f64>,
    pub dcoilwtico: Option<f64>,
    pub transactions: Option<f64>,
    pub store_nbr: Option<i64>,
    pub cluster: Option<i64>,
}

impl RecordInput {
    /// Validate the request and fill the documented defaults
    pub fn into_record(self) -> Result<SalesRecord> {
        let date = parse_date(&required("date", self.date)?)?;
        let store_nbr = self
            .store_nbr
            .ok_or_else(|| AlignError::MalformedInput("missing required field 'store_nbr'".to_string()))?;

        let record = SalesRecord {
            id: None,
            date,
            store_nbr,
            family: required("family", self.family)?,
            sales: None,
            onpromotion: self.onpromotion.unwrap_or(DEFAULT_ONPROMOTION),
            city: required("city", self.city)?,
            state: required("state", self.state)?,
            store_type: required("type_x", self.type_x)?,
            cluster: self.cluster.unwrap_or(DEFAULT_CLUSTER),
            transactions: Some(self.transactions.unwrap_or(DEFAULT_TRANSACTIONS)),
            dcoilwtico: Some(self.dcoilwtico.unwrap_or(DEFAULT_OIL_PRICE)),
            day_type: Some(
                self.type_y
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_DAY_TYPE.to_string()),
            ),
        };
        record.validate()?;
        Ok(record)
    }
}

fn required(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AlignError::MalformedInput(format!(
            "missing required field '{}'",
            name
        ))),
    }
}

/// Parse an ISO date, accepting a full timestamp and keeping its date part
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.date_naive());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ts.date());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.date());
    }

    Err(AlignError::MalformedInput(format!(
        "unparsable date '{}'",
        value
    )))
}
