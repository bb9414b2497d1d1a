use approx::assert_abs_diff_eq;
use sales_forecast::metrics::{
    mean_absolute_error, mean_squared_error, root_mean_squared_error,
    root_mean_squared_log_error, EvaluationMetrics,
};
use sales_forecast::ForecastError;

#[test]
fn test_regression_metrics() {
    let actual = vec![10.0, 20.0, 30.0, 40.0, 50.0];
    let predicted = vec![12.0, 18.0, 33.0, 37.0, 52.0];

    assert_abs_diff_eq!(mean_absolute_error(&actual, &predicted), 2.4, epsilon = 1e-9);
    assert_abs_diff_eq!(mean_squared_error(&actual, &predicted), 6.0, epsilon = 1e-9);
    assert_abs_diff_eq!(
        root_mean_squared_error(&actual, &predicted),
        6.0_f64.sqrt(),
        epsilon = 1e-9
    );
}

#[test]
fn test_rmsle_clips_negative_predictions() {
    let actual = vec![0.0, 0.0];
    let predicted = vec![-5.0, -0.5];
    assert_abs_diff_eq!(root_mean_squared_log_error(&actual, &predicted), 0.0);

    let actual = vec![std::f64::consts::E - 1.0];
    let predicted = vec![0.0];
    assert_abs_diff_eq!(root_mean_squared_log_error(&actual, &predicted), 1.0, epsilon = 1e-12);
}

#[test]
fn test_mismatched_lengths() {
    assert!(mean_absolute_error(&[1.0], &[1.0, 2.0]).is_nan());
    assert!(root_mean_squared_error(&[], &[]).is_nan());
    assert!(matches!(
        EvaluationMetrics::evaluate(&[1.0], &[]),
        Err(ForecastError::DataError(_))
    ));
}

#[test]
fn test_evaluate_and_display() {
    let metrics = EvaluationMetrics::evaluate(&[1.0, 3.0], &[1.0, 1.0]).unwrap();
    assert_abs_diff_eq!(metrics.mae, 1.0);
    assert_abs_diff_eq!(metrics.rmse, 2.0_f64.sqrt(), epsilon = 1e-12);

    let text = metrics.to_string();
    assert!(text.contains("RMSE"));
    assert!(text.contains("RMSLE"));
}

#[test]
fn test_metrics_round_trip_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    let metrics = EvaluationMetrics {
        rmse: 1.5,
        mae: 1.0,
        rmsle: 0.25,
    };
    metrics.save(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["rmse"], 1.5);
    assert_eq!(json["rmsle"], 0.25);
}
