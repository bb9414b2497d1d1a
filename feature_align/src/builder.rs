//! Feature derivation from merged sales records
//!
//! The builder turns [`SalesRecord`]s into a numeric [`FeatureFrame`]:
//! - calendar parts of the date (year, month, day, weekday, ...)
//! - sine/cosine encodings of month and weekday
//! - the promotion × day-of-year interaction
//! - one-hot indicators for the categorical context
//!
//! Batch builds drop the first sorted level of each category. Single-record
//! builds emit the indicator of the level that is present and leave the rest
//! to the [`crate::ColumnAligner`], which zero-fills every schema column the
//! row did not produce and discards indicators the schema does not know.

use crate::frame::{FeatureFrame, FeatureTable};
use crate::history::HistoryConfig;
use crate::record::{SalesRecord, DEFAULT_DAY_TYPE};
use crate::{AlignError, Result};
use chrono::{Datelike, Days, NaiveDate};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use tracing::debug;

/// Categorical fields expanded into indicator columns, in column order
pub const CATEGORICAL_COLUMNS: [&str; 5] = ["family", "state", "city", "type_x", "type_y"];

/// Numeric columns every frame starts with, in column order
pub const BASE_COLUMNS: [&str; 18] = [
    "store_nbr",
    "onpromotion",
    "cluster",
    "transactions",
    "dcoilwtico",
    "year",
    "month",
    "day",
    "day_of_week",
    "is_weekend",
    "day_of_year",
    "is_month_start",
    "is_month_end",
    "month_sin",
    "month_cos",
    "day_of_week_sin",
    "day_of_week_cos",
    "onpromotion_trend",
];

/// How categorical levels are expanded into indicator columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// One column per observed level except the first sorted one
    DropFirst,
    /// One column per observed level
    PresentLevels,
}

/// Calendar parts of a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub day_of_year: u32,
    pub is_month_start: bool,
    pub is_month_end: bool,
}

impl CalendarFeatures {
    pub fn from_date(date: NaiveDate) -> Self {
        let day_of_week = date.weekday().num_days_from_monday();
        let is_month_end = date
            .checked_add_days(Days::new(1))
            .map_or(true, |next| next.month() != date.month());

        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            day_of_week,
            is_weekend: day_of_week >= 5,
            day_of_year: date.ordinal(),
            is_month_start: date.day() == 1,
            is_month_end,
        }
    }
}

/// Sine/cosine pair of a periodic value
pub fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

/// Builds feature frames from sales records
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    history: HistoryConfig,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add lag/rolling/expanding sales features to batch builds
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    pub fn history(&self) -> &HistoryConfig {
        &self.history
    }

    /// Build the frame for a batch of records, dropping reference levels
    pub fn build(&self, records: &[SalesRecord]) -> Result<FeatureFrame> {
        let mut columns = self.numeric_columns(records)?;
        columns.extend(self.history.compute(records));
        columns.extend(expand_categoricals(records, Expansion::DropFirst));

        debug!(rows = records.len(), columns = columns.len(), "built feature frame");
        FeatureFrame::from_columns(columns)
    }

    /// Build the frame for a single record
    ///
    /// Historical sales features are never produced here.
    pub fn build_one(&self, record: &SalesRecord) -> Result<FeatureFrame> {
        let records = std::slice::from_ref(record);
        let mut columns = self.numeric_columns(records)?;
        columns.extend(expand_categoricals(records, Expansion::PresentLevels));

        FeatureFrame::from_columns(columns)
    }

    /// Build a batch frame together with the row keys
    pub fn build_table(&self, records: &[SalesRecord]) -> Result<FeatureTable> {
        let frame = self.build(records)?;

        Ok(FeatureTable {
            frame,
            dates: records.iter().map(|r| r.date).collect(),
            ids: records.iter().map(|r| r.id).collect(),
            targets: records.iter().map(|r| r.sales).collect(),
        })
    }

    fn numeric_columns(&self, records: &[SalesRecord]) -> Result<Vec<(String, Vec<f64>)>> {
        let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(records.len()); BASE_COLUMNS.len()];

        for record in records {
            record.validate()?;
            let transactions = record.transactions.ok_or_else(|| missing("transactions", record))?;
            let oil = record.dcoilwtico.ok_or_else(|| missing("dcoilwtico", record))?;

            let calendar = CalendarFeatures::from_date(record.date);
            let (month_sin, month_cos) = cyclical(calendar.month as f64, 12.0);
            let (dow_sin, dow_cos) = cyclical(calendar.day_of_week as f64, 7.0);

            let row = [
                record.store_nbr as f64,
                record.onpromotion,
                record.cluster as f64,
                transactions,
                oil,
                calendar.year as f64,
                calendar.month as f64,
                calendar.day as f64,
                calendar.day_of_week as f64,
                flag(calendar.is_weekend),
                calendar.day_of_year as f64,
                flag(calendar.is_month_start),
                flag(calendar.is_month_end),
                month_sin,
                month_cos,
                dow_sin,
                dow_cos,
                record.onpromotion * calendar.day_of_year as f64,
            ];
            for (column, value) in values.iter_mut().zip(row) {
                column.push(value);
            }
        }

        Ok(BASE_COLUMNS
            .iter()
            .map(|name| name.to_string())
            .zip(values)
            .collect())
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn missing(field: &str, record: &SalesRecord) -> AlignError {
    AlignError::MalformedInput(format!(
        "field '{}' is missing for store {} on {} and has no default",
        field, record.store_nbr, record.date
    ))
}

fn categorical_value<'a>(record: &'a SalesRecord, column: &str) -> &'a str {
    match column {
        "family" => record.family.as_str(),
        "state" => record.state.as_str(),
        "city" => record.city.as_str(),
        "type_x" => record.store_type.as_str(),
        _ => record.day_type_or_default(),
    }
}

/// One-hot encode the categorical context of `records`
///
/// Levels are ordered lexicographically within each category and columns are
/// named `<category>_<level>`.
pub fn expand_categoricals(records: &[SalesRecord], expansion: Expansion) -> Vec<(String, Vec<f64>)> {
    let mut columns = Vec::new();

    for category in CATEGORICAL_COLUMNS {
        let levels: BTreeSet<&str> = records
            .iter()
            .map(|r| categorical_value(r, category))
            .collect();
        let skip = match expansion {
            Expansion::DropFirst => 1,
            Expansion::PresentLevels => 0,
        };

        for level in levels.into_iter().skip(skip) {
            let indicator = records
                .iter()
                .map(|r| flag(categorical_value(r, category) == level))
                .collect();
            columns.push((format!("{}_{}", category, level), indicator));
        }
    }

    columns
}

/// Fill the gaps the merge leaves behind
///
/// Day type defaults to a regular day and transactions to zero. Oil prices
/// are back-filled from the next known price in row order, and trailing gaps
/// take the last known price.
pub fn fill_missing(mut records: Vec<SalesRecord>) -> Vec<SalesRecord> {
    let mut next_oil: Option<f64> = None;
    for record in records.iter_mut().rev() {
        match record.dcoilwtico {
            Some(price) => next_oil = Some(price),
            None => record.dcoilwtico = next_oil,
        }
    }

    let mut last_oil: Option<f64> = None;
    for record in records.iter_mut() {
        match record.dcoilwtico {
            Some(price) => last_oil = Some(price),
            None => record.dcoilwtico = last_oil,
        }
        if record.day_type.is_none() {
            record.day_type = Some(DEFAULT_DAY_TYPE.to_string());
        }
        if record.transactions.is_none() {
            record.transactions = Some(0.0);
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn record(date: &str, family: &str) -> SalesRecord {
        SalesRecord {
            id: None,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            store_nbr: 1,
            family: family.to_string(),
            sales: Some(3.0),
            onpromotion: 2.0,
            city: "Quito".to_string(),
            state: "Pichincha".to_string(),
            store_type: "D".to_string(),
            cluster: 13,
            transactions: Some(1500.0),
            dcoilwtico: Some(47.5),
            day_type: None,
        }
    }

    #[test]
    fn test_calendar_features() {
        let cal = CalendarFeatures::from_date(NaiveDate::from_ymd_opt(2016, 2, 29).unwrap());
        assert_eq!(cal.year, 2016);
        assert_eq!(cal.month, 2);
        assert_eq!(cal.day_of_week, 0);
        assert!(!cal.is_weekend);
        assert_eq!(cal.day_of_year, 60);
        assert!(!cal.is_month_start);
        assert!(cal.is_month_end);

        let cal = CalendarFeatures::from_date(NaiveDate::from_ymd_opt(2017, 1, 1).unwrap());
        assert_eq!(cal.day_of_week, 6);
        assert!(cal.is_weekend);
        assert!(cal.is_month_start);
        assert!(!cal.is_month_end);
    }

    #[test]
    fn test_interaction_term() {
        let frame = FeatureBuilder::new()
            .build_one(&record("2017-01-10", "BEVERAGES"))
            .unwrap();
        assert_abs_diff_eq!(frame.column("onpromotion_trend").unwrap()[0], 20.0);
    }

    #[test]
    fn test_build_one_keeps_present_level() {
        let frame = FeatureBuilder::new()
            .build_one(&record("2017-01-10", "BEVERAGES"))
            .unwrap();
        assert_eq!(frame.column("family_BEVERAGES").unwrap(), vec![1.0]);
        assert_eq!(frame.column("type_y_Regular Day").unwrap(), vec![1.0]);
        assert_eq!(frame.width(), BASE_COLUMNS.len() + CATEGORICAL_COLUMNS.len());
    }

    #[test]
    fn test_missing_oil_without_default_fails() {
        let mut r = record("2017-01-10", "BEVERAGES");
        r.dcoilwtico = None;
        assert!(matches!(
            FeatureBuilder::new().build_one(&r),
            Err(AlignError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_fill_missing_backfills_oil() {
        let mut rows = vec![
            record("2017-01-01", "A"),
            record("2017-01-02", "A"),
            record("2017-01-03", "A"),
            record("2017-01-04", "A"),
        ];
        rows[0].dcoilwtico = None;
        rows[1].dcoilwtico = Some(51.0);
        rows[2].dcoilwtico = None;
        rows[3].dcoilwtico = None;
        rows[3].transactions = None;

        let filled = fill_missing(rows);
        let oil: Vec<Option<f64>> = filled.iter().map(|r| r.dcoilwtico).collect();
        assert_eq!(oil, vec![Some(51.0), Some(51.0), Some(51.0), Some(51.0)]);
        assert_eq!(filled[3].transactions, Some(0.0));
        assert_eq!(filled[0].day_type.as_deref(), Some(DEFAULT_DAY_TYPE));
    }
}
