//! Loading and merging the raw sales tables
//!
//! The raw inputs are six CSV files: the train and test sales tables plus
//! stores, transactions, oil prices and the holiday calendar. The merge
//! denormalizes them into one [`SalesRecord`] per (date, store, family).

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use feature_align::SalesRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info, warn};

/// File names of the raw tables inside the data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFiles {
    pub train: String,
    pub test: String,
    pub stores: String,
    pub transactions: String,
    pub oil: String,
    pub holidays: String,
}

impl Default for DataFiles {
    fn default() -> Self {
        Self {
            train: "train.csv".to_string(),
            test: "test.csv".to_string(),
            stores: "stores.csv".to_string(),
            transactions: "transactions.csv".to_string(),
            oil: "oil.csv".to_string(),
            holidays: "holidays_events.csv".to_string(),
        }
    }
}

/// A row of the train or test sales table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRow {
    pub id: i64,
    pub date: NaiveDate,
    pub store_nbr: i64,
    pub family: String,
    /// Missing from the test table
    #[serde(default)]
    pub sales: Option<f64>,
    pub onpromotion: f64,
}

/// A row of the stores table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRow {
    pub store_nbr: i64,
    pub city: String,
    pub state: String,
    #[serde(rename = "type")]
    pub store_type: String,
    pub cluster: i64,
}

/// A row of the transactions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub date: NaiveDate,
    pub store_nbr: i64,
    pub transactions: f64,
}

/// A row of the daily oil price table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OilRow {
    pub date: NaiveDate,
    #[serde(default)]
    pub dcoilwtico: Option<f64>,
}

/// A row of the holiday calendar
///
/// Only the date and its day type take part in the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayRow {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub day_type: String,
}

/// The six raw tables as read from disk
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub train: Vec<SalesRow>,
    pub test: Vec<SalesRow>,
    pub stores: Vec<StoreRow>,
    pub transactions: Vec<TransactionRow>,
    pub oil: Vec<OilRow>,
    pub holidays: Vec<HolidayRow>,
}

impl RawTables {
    /// Read every table from `dir`
    pub fn load<P: AsRef<Path>>(dir: P, files: &DataFiles) -> Result<Self> {
        let dir = dir.as_ref();
        let tables = Self {
            train: read_csv(&dir.join(&files.train))?,
            test: read_csv(&dir.join(&files.test))?,
            stores: read_csv(&dir.join(&files.stores))?,
            transactions: read_csv(&dir.join(&files.transactions))?,
            oil: read_csv(&dir.join(&files.oil))?,
            holidays: read_csv(&dir.join(&files.holidays))?,
        };
        info!(
            train = tables.train.len(),
            test = tables.test.len(),
            stores = tables.stores.len(),
            "loaded raw tables"
        );
        Ok(tables)
    }
}

/// Deserialize every row of a headed CSV file
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(ForecastError::DataError(format!(
            "input table '{}' does not exist",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    debug!(path = %path.display(), rows = rows.len(), "read table");
    Ok(rows)
}

/// Write records as a headed CSV file, creating parent directories
pub fn write_records<P: AsRef<Path>>(path: P, records: &[SalesRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read records written by [`write_records`]
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<SalesRecord>> {
    read_csv(path.as_ref())
}

/// Daily oil prices with linear interpolation between known quotes
///
/// Dates before the first quote have no price. Dates after the last quote
/// carry the last price forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OilCurve {
    quotes: Vec<(NaiveDate, f64)>,
}

impl OilCurve {
    pub fn new(rows: &[OilRow]) -> Self {
        let mut quotes: Vec<(NaiveDate, f64)> = rows
            .iter()
            .filter_map(|row| row.dcoilwtico.map(|price| (row.date, price)))
            .filter(|(_, price)| price.is_finite())
            .collect();
        quotes.sort_by_key(|(date, _)| *date);
        quotes.dedup_by_key(|(date, _)| *date);
        Self { quotes }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Price on `date`
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        match self.quotes.binary_search_by_key(&date, |(d, _)| *d) {
            Ok(idx) => Some(self.quotes[idx].1),
            Err(0) => None,
            Err(idx) if idx == self.quotes.len() => self.quotes.last().map(|(_, p)| *p),
            Err(idx) => {
                let (d0, p0) = self.quotes[idx - 1];
                let (d1, p1) = self.quotes[idx];
                let span = (d1 - d0).num_days() as f64;
                let offset = (date - d0).num_days() as f64;
                Some(p0 + (p1 - p0) * offset / span)
            }
        }
    }
}

/// Joins sales rows with the store, transaction, holiday and oil tables
#[derive(Debug, Clone)]
pub struct RawDataMerger {
    stores: HashMap<i64, StoreRow>,
    transactions: HashMap<(i64, NaiveDate), f64>,
    day_types: HashMap<NaiveDate, String>,
    oil: OilCurve,
}

impl RawDataMerger {
    pub fn new(tables: &RawTables) -> Self {
        let stores = tables
            .stores
            .iter()
            .map(|s| (s.store_nbr, s.clone()))
            .collect();
        let transactions = tables
            .transactions
            .iter()
            .map(|t| ((t.store_nbr, t.date), t.transactions))
            .collect();

        // The first calendar event of a day wins
        let mut day_types = HashMap::new();
        for holiday in &tables.holidays {
            day_types
                .entry(holiday.date)
                .or_insert_with(|| holiday.day_type.clone());
        }

        Self {
            stores,
            transactions,
            day_types,
            oil: OilCurve::new(&tables.oil),
        }
    }

    /// Denormalize `rows`, dropping repeated (date, store, family) keys
    ///
    /// A row whose store is absent from the stores table is a data error.
    pub fn merge(&self, rows: &[SalesRow]) -> Result<Vec<SalesRecord>> {
        let mut seen = HashSet::with_capacity(rows.len());
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            if !seen.insert((row.date, row.store_nbr, row.family.as_str())) {
                continue;
            }
            let store = self.stores.get(&row.store_nbr).ok_or_else(|| {
                ForecastError::DataError(format!(
                    "store {} on {} is not in the stores table",
                    row.store_nbr, row.date
                ))
            })?;

            records.push(SalesRecord {
                id: Some(row.id),
                date: row.date,
                store_nbr: row.store_nbr,
                family: row.family.clone(),
                sales: row.sales,
                onpromotion: row.onpromotion,
                city: store.city.clone(),
                state: store.state.clone(),
                store_type: store.store_type.clone(),
                cluster: store.cluster,
                transactions: self.transactions.get(&(row.store_nbr, row.date)).copied(),
                dcoilwtico: self.oil.price_on(row.date),
                day_type: self.day_types.get(&row.date).cloned(),
            });
        }

        let duplicates = rows.len() - records.len();
        if duplicates > 0 {
            warn!(duplicates, "dropped repeated (date, store, family) rows");
        }
        Ok(records)
    }

    /// Merge the train and test tables
    pub fn merge_all(&self, tables: &RawTables) -> Result<(Vec<SalesRecord>, Vec<SalesRecord>)> {
        let train = self.merge(&tables.train)?;
        let test = self.merge(&tables.test)?;
        info!(train = train.len(), test = test.len(), "merged sales tables");
        Ok((train, test))
    }
}
