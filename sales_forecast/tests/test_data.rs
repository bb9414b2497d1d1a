mod common;

use approx::assert_abs_diff_eq;
use common::{date, write_raw_tables};
use pretty_assertions::assert_eq;
use sales_forecast::data::{read_records, write_records, DataFiles, SalesRow};
use sales_forecast::{ForecastError, RawDataMerger, RawTables};
use tempfile::tempdir;

fn merged() -> (Vec<feature_align::SalesRecord>, Vec<feature_align::SalesRecord>) {
    let dir = tempdir().unwrap();
    write_raw_tables(dir.path());
    let tables = RawTables::load(dir.path(), &DataFiles::default()).unwrap();
    RawDataMerger::new(&tables).merge_all(&tables).unwrap()
}

#[test]
fn test_load_raw_tables() {
    let dir = tempdir().unwrap();
    write_raw_tables(dir.path());
    let tables = RawTables::load(dir.path(), &DataFiles::default()).unwrap();

    assert_eq!(tables.train.len(), 22 * 4);
    assert_eq!(tables.test.len(), 2 * 4);
    assert_eq!(tables.stores.len(), 2);
    assert!(tables.test.iter().all(|row| row.sales.is_none()));
    assert!(tables.oil.iter().any(|row| row.dcoilwtico.is_none()));
}

#[test]
fn test_missing_table_is_a_data_error() {
    let dir = tempdir().unwrap();
    let result = RawTables::load(dir.path(), &DataFiles::default());
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[test]
fn test_merge_joins_store_attributes() {
    let (train, test) = merged();
    assert_eq!(train.len(), 88);
    assert_eq!(test.len(), 8);

    let first = &train[0];
    assert_eq!(first.city, "Quito");
    assert_eq!(first.state, "Pichincha");
    assert_eq!(first.store_type, "D");
    assert_eq!(first.cluster, 13);
    assert_eq!(first.id, Some(0));
}

#[test]
fn test_merge_left_joins_transactions() {
    let (train, _) = merged();
    let store_two_first_day = train
        .iter()
        .find(|r| r.store_nbr == 2 && r.date == date("2016-12-20"))
        .unwrap();
    assert_eq!(store_two_first_day.transactions, None);

    let store_one_first_day = train
        .iter()
        .find(|r| r.store_nbr == 1 && r.date == date("2016-12-20"))
        .unwrap();
    assert_eq!(store_one_first_day.transactions, Some(1100.0));
}

#[test]
fn test_merge_attaches_day_type_and_oil() {
    let (train, _) = merged();

    let christmas = train.iter().find(|r| r.date == date("2016-12-25")).unwrap();
    assert_eq!(christmas.day_type.as_deref(), Some("Holiday"));
    let new_year = train.iter().find(|r| r.date == date("2017-01-01")).unwrap();
    assert_eq!(new_year.day_type.as_deref(), Some("Holiday"));
    let regular = train.iter().find(|r| r.date == date("2016-12-27")).unwrap();
    assert_eq!(regular.day_type, None);

    // No quote before the first oil date
    let first = train.iter().find(|r| r.date == date("2016-12-20")).unwrap();
    assert_eq!(first.dcoilwtico, None);

    // Friday 2016-12-23 quotes 52, Monday 2016-12-26 quotes 55
    let saturday = train.iter().find(|r| r.date == date("2016-12-24")).unwrap();
    assert_abs_diff_eq!(saturday.dcoilwtico.unwrap(), 53.0, epsilon = 1e-9);
}

#[test]
fn test_unknown_store_is_rejected() {
    let dir = tempdir().unwrap();
    write_raw_tables(dir.path());
    let mut tables = RawTables::load(dir.path(), &DataFiles::default()).unwrap();
    tables.train.push(SalesRow {
        id: 999,
        date: date("2017-01-02"),
        store_nbr: 54,
        family: "BEVERAGES".to_string(),
        sales: Some(1.0),
        onpromotion: 0.0,
    });

    let result = RawDataMerger::new(&tables).merge(&tables.train);
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[test]
fn test_repeated_rows_are_dropped() {
    let dir = tempdir().unwrap();
    write_raw_tables(dir.path());
    let mut tables = RawTables::load(dir.path(), &DataFiles::default()).unwrap();
    let repeated = tables.train[0].clone();
    tables.train.push(repeated);

    let records = RawDataMerger::new(&tables).merge(&tables.train).unwrap();
    assert_eq!(records.len(), 88);
}

#[test]
fn test_merged_records_round_trip_through_csv() {
    let (train, _) = merged();
    let dir = tempdir().unwrap();
    let path = dir.path().join("merged").join("train.csv");

    write_records(&path, &train).unwrap();
    let header = std::fs::read_to_string(&path).unwrap();
    assert!(header.starts_with("id,date,store_nbr,family,sales,onpromotion,city,state,type_x,cluster,transactions,dcoilwtico,type_y"));
    assert_eq!(read_records(&path).unwrap(), train);
}
