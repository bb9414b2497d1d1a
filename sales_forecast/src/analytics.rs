//! Descriptive aggregations over merged sales records
//!
//! Rows without a sales value are ignored by every aggregation.

use chrono::{Datelike, Weekday};
use feature_align::SalesRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::RangeInclusive;

/// How to reduce the sales of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Sum,
    Mean,
}

/// Headline figures of a sales table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub total_sales: f64,
    /// Mean over rows, not over days
    pub average_sales: f64,
    pub records: usize,
    pub stores: usize,
    pub families: usize,
}

fn with_sales(records: &[SalesRecord]) -> impl Iterator<Item = (&SalesRecord, f64)> {
    records
        .iter()
        .filter_map(|r| r.sales.map(|sales| (r, sales)))
}

fn in_promotion_range(record: &SalesRecord, range: Option<&RangeInclusive<f64>>) -> bool {
    range.map_or(true, |r| r.contains(&record.onpromotion))
}

pub fn summary(records: &[SalesRecord]) -> SalesSummary {
    let mut total = 0.0;
    let mut count = 0usize;
    let mut stores = HashSet::new();
    let mut families = HashSet::new();
    for (record, sales) in with_sales(records) {
        total += sales;
        count += 1;
        stores.insert(record.store_nbr);
        families.insert(record.family.as_str());
    }

    SalesSummary {
        total_sales: total,
        average_sales: if count == 0 { 0.0 } else { total / count as f64 },
        records: count,
        stores: stores.len(),
        families: families.len(),
    }
}

/// Reduce sales grouped by `key`, sorted by key
fn group_by<K, F>(
    records: &[SalesRecord],
    aggregate: Aggregate,
    filter: impl Fn(&SalesRecord) -> bool,
    key: F,
) -> Vec<(K, f64)>
where
    K: Ord,
    F: Fn(&SalesRecord) -> K,
{
    let mut groups: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for (record, sales) in with_sales(records).filter(|(r, _)| filter(r)) {
        let entry = groups.entry(key(record)).or_insert((0.0, 0));
        entry.0 += sales;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|(k, (sum, n))| match aggregate {
            Aggregate::Sum => (k, sum),
            Aggregate::Mean => (k, sum / n as f64),
        })
        .collect()
}

/// Largest `n` groups, ties broken by name
fn top_n(mut groups: Vec<(String, f64)>, n: usize) -> Vec<(String, f64)> {
    groups.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    groups.truncate(n);
    groups
}

/// The `n` product families with the highest total or mean sales
pub fn top_families(records: &[SalesRecord], n: usize, aggregate: Aggregate) -> Vec<(String, f64)> {
    top_n(
        group_by(records, aggregate, |_| true, |r| r.family.clone()),
        n,
    )
}

/// The `n` cities with the highest total sales
pub fn top_cities(records: &[SalesRecord], n: usize) -> Vec<(String, f64)> {
    top_n(
        group_by(records, Aggregate::Sum, |_| true, |r| r.city.clone()),
        n,
    )
}

/// Total sales per state, optionally restricted to a promotion range
pub fn sales_by_state(
    records: &[SalesRecord],
    promotion: Option<RangeInclusive<f64>>,
) -> Vec<(String, f64)> {
    group_by(
        records,
        Aggregate::Sum,
        |r| in_promotion_range(r, promotion.as_ref()),
        |r| r.state.clone(),
    )
}

/// Total sales per store type; an empty `types` keeps every type
pub fn sales_by_store_type(records: &[SalesRecord], types: &[String]) -> Vec<(String, f64)> {
    group_by(
        records,
        Aggregate::Sum,
        |r| types.is_empty() || types.contains(&r.store_type),
        |r| r.store_type.clone(),
    )
}

/// Total sales per store cluster within `clusters`
pub fn sales_by_cluster(records: &[SalesRecord], clusters: RangeInclusive<i64>) -> Vec<(i64, f64)> {
    group_by(
        records,
        Aggregate::Sum,
        |r| clusters.contains(&r.cluster),
        |r| r.cluster,
    )
}

/// Total sales per weekday, Monday first, every weekday present
pub fn sales_by_day_of_week(
    records: &[SalesRecord],
    promotion: Option<RangeInclusive<f64>>,
) -> Vec<(Weekday, f64)> {
    let mut totals: HashMap<u32, f64> = HashMap::new();
    for (record, sales) in with_sales(records) {
        if in_promotion_range(record, promotion.as_ref()) {
            *totals
                .entry(record.date.weekday().num_days_from_monday())
                .or_insert(0.0) += sales;
        }
    }

    let mut day = Weekday::Mon;
    let mut week = Vec::with_capacity(7);
    for _ in 0..7 {
        let total = totals
            .get(&day.num_days_from_monday())
            .copied()
            .unwrap_or(0.0);
        week.push((day, total));
        day = day.succ();
    }
    week
}

/// Total sales per (year, month) for the given years; empty `years` keeps all
pub fn monthly_sales(records: &[SalesRecord], years: &[i32]) -> Vec<((i32, u32), f64)> {
    group_by(
        records,
        Aggregate::Sum,
        |r| years.is_empty() || years.contains(&r.date.year()),
        |r| (r.date.year(), r.date.month()),
    )
}

/// (onpromotion, sales) pairs within a promotion range
pub fn promotion_points(
    records: &[SalesRecord],
    promotion: RangeInclusive<f64>,
    limit: usize,
) -> Vec<(f64, f64)> {
    with_sales(records)
        .filter(|(r, _)| promotion.contains(&r.onpromotion))
        .map(|(r, sales)| (r.onpromotion, sales))
        .take(limit)
        .collect()
}
