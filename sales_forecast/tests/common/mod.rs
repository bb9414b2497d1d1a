#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const FAMILIES: [&str; 2] = ["BEVERAGES", "GROCERY I"];
pub const STORES: [i64; 2] = [1, 2];

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn days(start: &str, count: i64) -> Vec<NaiveDate> {
    (0..count).map(|i| date(start) + Duration::days(i)).collect()
}

/// Sales of a (store, family) on a date
pub fn sales_for(store: i64, family_idx: usize, day: NaiveDate) -> f64 {
    (store * 10 + family_idx as i64 * 5) as f64 + day.weekday().num_days_from_monday() as f64
}

/// Write the six raw tables: 22 training days spanning 2016/2017 and two
/// scoring days
pub fn write_raw_tables(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    let train_days = days("2016-12-20", 22);
    let test_days = days("2017-01-11", 2);

    let mut train = String::from("id,date,store_nbr,family,sales,onpromotion\n");
    let mut id = 0;
    for day in &train_days {
        for store in STORES {
            for (f, family) in FAMILIES.iter().enumerate() {
                writeln!(
                    train,
                    "{},{},{},{},{},{}",
                    id,
                    day,
                    store,
                    family,
                    sales_for(store, f, *day),
                    (id % 3)
                )
                .unwrap();
                id += 1;
            }
        }
    }
    fs::write(dir.join("train.csv"), train).unwrap();

    let mut test = String::from("id,date,store_nbr,family,onpromotion\n");
    for day in &test_days {
        for store in STORES {
            for family in FAMILIES {
                writeln!(test, "{},{},{},{},{}", id, day, store, family, 1).unwrap();
                id += 1;
            }
        }
    }
    fs::write(dir.join("test.csv"), test).unwrap();

    fs::write(
        dir.join("stores.csv"),
        "store_nbr,city,state,type,cluster\n1,Quito,Pichincha,D,13\n2,Guayaquil,Guayas,A,8\n",
    )
    .unwrap();

    let mut transactions = String::from("date,store_nbr,transactions\n");
    for day in train_days.iter().chain(test_days.iter()) {
        for store in STORES {
            // Store 2 has no count on the first day
            if store == 2 && *day == train_days[0] {
                continue;
            }
            writeln!(transactions, "{},{},{}", day, store, 1000 + store * 100).unwrap();
        }
    }
    fs::write(dir.join("transactions.csv"), transactions).unwrap();

    let mut oil = String::from("date,dcoilwtico\n");
    for (i, day) in days("2016-12-21", 23).iter().enumerate() {
        if day.weekday().num_days_from_monday() >= 5 {
            continue;
        }
        // Tuesday 2016-12-27 has no quote
        if i == 6 {
            writeln!(oil, "{},", day).unwrap();
        } else {
            writeln!(oil, "{},{}", day, 50.0 + i as f64).unwrap();
        }
    }
    fs::write(dir.join("oil.csv"), oil).unwrap();

    fs::write(
        dir.join("holidays_events.csv"),
        "date,type,locale,locale_name,description,transferred\n\
         2016-12-25,Holiday,National,Ecuador,Navidad,False\n\
         2017-01-01,Holiday,National,Ecuador,Primer dia del ano,False\n\
         2017-01-01,Event,National,Ecuador,Evento,False\n",
    )
    .unwrap();
}
