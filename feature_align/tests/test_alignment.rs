use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use feature_align::builder::cyclical;
use feature_align::{
    AlignError, ColumnAligner, FeatureBuilder, FeatureFrame, HistoryConfig, MinMaxScaler,
    RecordInput, SalesRecord, Schema,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn record(date: &str, family: &str, state: &str, sales: f64) -> SalesRecord {
    SalesRecord {
        id: None,
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        store_nbr: 1,
        family: family.to_string(),
        sales: Some(sales),
        onpromotion: 3.0,
        city: "Quito".to_string(),
        state: state.to_string(),
        store_type: "D".to_string(),
        cluster: 13,
        transactions: Some(1200.0),
        dcoilwtico: Some(52.0),
        day_type: Some("Holiday".to_string()),
    }
}

fn training_records() -> Vec<SalesRecord> {
    vec![
        record("2016-01-01", "A", "X", 10.0),
        record("2016-01-02", "B", "Y", 12.0),
        record("2016-01-03", "A", "Y", 8.0),
        record("2016-01-04", "B", "X", 15.0),
    ]
}

fn request(family: &str, state: &str) -> SalesRecord {
    RecordInput {
        date: Some("2017-08-16".to_string()),
        family: Some(family.to_string()),
        state: Some(state.to_string()),
        city: Some("Quito".to_string()),
        type_x: Some("D".to_string()),
        store_nbr: Some(1),
        ..RecordInput::default()
    }
    .into_record()
    .unwrap()
}

#[test]
fn test_reference_levels_are_dropped() {
    let frame = FeatureBuilder::new().build(&training_records()).unwrap();
    let columns = frame.column_names();

    assert!(columns.contains(&"family_B".to_string()));
    assert!(columns.contains(&"state_Y".to_string()));
    assert!(!columns.contains(&"family_A".to_string()));
    assert!(!columns.contains(&"state_X".to_string()));
    // Single-level categories produce no indicator at all
    assert!(!columns.iter().any(|c| c.starts_with("city_")));
    assert!(!columns.iter().any(|c| c.starts_with("type_y_")));
}

#[rstest]
#[case("A", 0.0)]
#[case("B", 1.0)]
fn test_serving_indicator_after_alignment(#[case] family: &str, #[case] expected: f64) {
    let builder = FeatureBuilder::new();
    let (aligner, _) = ColumnAligner::fit(&builder.build(&training_records()).unwrap()).unwrap();

    let aligned = aligner
        .align(builder.build_one(&request(family, "X")).unwrap())
        .unwrap();
    assert_eq!(aligned.column("family_B").unwrap(), vec![expected]);
    assert_eq!(aligned.column("state_Y").unwrap(), vec![0.0]);
}

#[test]
fn test_schema_closure_for_unseen_categories() {
    let builder = FeatureBuilder::new();
    let (aligner, _) = ColumnAligner::fit(&builder.build(&training_records()).unwrap()).unwrap();

    let aligned = aligner
        .align(builder.build_one(&request("NEVER SEEN", "Elsewhere")).unwrap())
        .unwrap();
    assert_eq!(aligned.column_names(), aligner.schema().expected_columns());
    assert_eq!(aligned.height(), 1);
}

#[test]
fn test_default_fill_for_absent_columns() {
    let builder = FeatureBuilder::new();
    let (aligner, _) = ColumnAligner::fit(&builder.build(&training_records()).unwrap()).unwrap();

    let raw = builder.build_one(&request("A", "X")).unwrap();
    let raw_columns = raw.column_names();
    let aligned = aligner.reindex(&raw).unwrap();

    for column in aligner.schema().expected_columns() {
        if !raw_columns.contains(column) {
            assert_eq!(aligned.column(column).unwrap(), vec![0.0], "column {}", column);
        }
    }
}

#[test]
fn test_alignment_is_idempotent() {
    let builder = FeatureBuilder::new();
    let (aligner, _) = ColumnAligner::fit(&builder.build(&training_records()).unwrap()).unwrap();

    let once = aligner.align(builder.build_one(&request("B", "Y")).unwrap()).unwrap();
    let twice = aligner.align(once.clone()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.rows().unwrap(), twice.rows().unwrap());
}

#[test]
fn test_frame_aligned_elsewhere_is_rejected() {
    let builder = FeatureBuilder::new();
    let (aligner, _) = ColumnAligner::fit(&builder.build(&training_records()).unwrap()).unwrap();
    let (other, _) = ColumnAligner::fit(&builder.build(&training_records()[..1]).unwrap()).unwrap();

    let aligned = other.align(builder.build_one(&request("B", "Y")).unwrap()).unwrap();
    assert!(matches!(
        aligner.align(aligned),
        Err(AlignError::SchemaMismatch(_))
    ));
}

#[test]
fn test_scale_column_drift_is_rejected() {
    // Persisted artifacts that scale nothing, although `transactions` matches a scale pattern
    let names = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    let schema = Schema::new(names(&["year", "transactions"]), Vec::new()).unwrap();
    let frame = FeatureFrame::from_columns(vec![
        ("year".to_string(), vec![2017.0]),
        ("transactions".to_string(), vec![900.0]),
    ])
    .unwrap();
    let scaler = MinMaxScaler::fit(&frame, &[]).unwrap();
    let aligner = ColumnAligner::new(schema, scaler).unwrap();

    assert!(matches!(
        aligner.align(frame),
        Err(AlignError::SchemaMismatch(_))
    ));
}

#[test]
fn test_scaler_uses_training_range_only() {
    let builder = FeatureBuilder::new();
    let (aligner, scaled_train) =
        ColumnAligner::fit(&builder.build(&training_records()).unwrap()).unwrap();

    // All training rows share onpromotion = 3, so the interaction spans 3..12
    let trend = scaled_train.column("onpromotion_trend").unwrap();
    assert_abs_diff_eq!(trend[0], 0.0);
    assert_abs_diff_eq!(trend[3], 1.0);

    // The request carries no promotions, below the training minimum of 3
    let aligned = aligner.align(builder.build_one(&request("A", "X")).unwrap()).unwrap();
    let expected = (0.0 - 3.0) / 9.0;
    assert_abs_diff_eq!(aligned.column("onpromotion_trend").unwrap()[0], expected, epsilon = 1e-9);
}

#[test]
fn test_missing_history_is_zero_then_scaled() {
    let history = HistoryConfig {
        lags: vec![1],
        rolling_windows: vec![2],
        expanding_mean: false,
    };
    let builder = FeatureBuilder::new().with_history(history);
    let mut records = training_records();
    for r in records.iter_mut() {
        r.family = "A".to_string();
    }
    let (aligner, _) = ColumnAligner::fit(&builder.build(&records).unwrap()).unwrap();
    assert!(aligner
        .schema()
        .scale_columns()
        .contains(&"sales_lag_1".to_string()));

    let aligned = aligner.align(builder.build_one(&request("A", "X")).unwrap()).unwrap();
    let scaler = aligner.scaler();
    for name in ["sales_lag_1", "sales_roll_mean_2"] {
        let idx = scaler.columns().iter().position(|c| c == name).unwrap();
        let value = aligned.column(name).unwrap()[0];
        assert_abs_diff_eq!(value, scaler.transform_value(idx, 0.0));
    }
}

#[test]
fn test_cyclical_month_continuity() {
    let distance = |a: f64, b: f64| {
        let (sa, ca) = cyclical(a, 12.0);
        let (sb, cb) = cyclical(b, 12.0);
        ((sa - sb).powi(2) + (ca - cb).powi(2)).sqrt()
    };
    assert!(distance(12.0, 1.0) < distance(1.0, 6.0));
    assert_abs_diff_eq!(distance(12.0, 1.0), distance(1.0, 2.0), epsilon = 1e-12);
}

#[test]
fn test_malformed_request_date() {
    let input = RecordInput {
        date: Some("16/08/2017".to_string()),
        family: Some("A".to_string()),
        state: Some("X".to_string()),
        city: Some("Quito".to_string()),
        type_x: Some("D".to_string()),
        store_nbr: Some(1),
        ..RecordInput::default()
    };
    assert!(matches!(
        input.into_record(),
        Err(AlignError::MalformedInput(_))
    ));
}
