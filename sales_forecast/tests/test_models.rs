use approx::assert_abs_diff_eq;
use feature_align::{AlignError, FeatureFrame};
use rstest::rstest;
use sales_forecast::models::{
    GradientBoosting, GradientBoostingParams, LinearParams, LinearRegression, ModelArtifact,
};
use sales_forecast::{ForecastError, Regressor, TrainedRegressor};
use tempfile::tempdir;

fn frame() -> (FeatureFrame, Vec<f64>) {
    let x1: Vec<f64> = (0..40).map(|i| (i % 10) as f64).collect();
    let x2: Vec<f64> = (0..40).map(|i| (i / 10) as f64).collect();
    let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 3.0 * a + 2.0 * b + 1.0).collect();
    let frame = FeatureFrame::from_columns(vec![
        ("x1".to_string(), x1),
        ("x2".to_string(), x2),
    ])
    .unwrap();
    (frame, y)
}

fn booster() -> GradientBoosting {
    GradientBoosting::new(GradientBoostingParams {
        n_estimators: 200,
        learning_rate: 0.2,
        max_depth: 4,
        subsample: 0.8,
        colsample_bytree: 1.0,
        random_state: 7,
        ..GradientBoostingParams::default()
    })
    .unwrap()
}

#[test]
fn test_boosting_fits_training_data() {
    let (frame, y) = frame();
    let model = booster().fit(&frame, &y).unwrap();
    let predictions = model.predict(&frame).unwrap();

    let mae = sales_forecast::metrics::mean_absolute_error(&y, &predictions);
    assert!(mae < 0.5, "mae {}", mae);
    assert_eq!(model.feature_names(), &["x1".to_string(), "x2".to_string()]);
}

#[test]
fn test_boosting_is_deterministic_for_a_seed() {
    let (frame, y) = frame();
    let first = booster().fit(&frame, &y).unwrap();
    let second = booster().fit(&frame, &y).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_constant_target_predicts_constant() {
    let (frame, _) = frame();
    let y = vec![4.5; frame.height()];
    let model = booster().fit(&frame, &y).unwrap();
    for p in model.predict(&frame).unwrap() {
        assert_abs_diff_eq!(p, 4.5, epsilon = 1e-9);
    }
}

#[test]
fn test_target_length_mismatch() {
    let (frame, y) = frame();
    let result = booster().fit(&frame, &y[..10]);
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[rstest]
#[case::reordered(vec!["x2", "x1"])]
#[case::missing(vec!["x1"])]
fn test_predict_rejects_foreign_layout(#[case] columns: Vec<&str>) {
    let (frame, y) = frame();
    let model = booster().fit(&frame, &y).unwrap();

    let foreign = FeatureFrame::from_columns(
        columns
            .into_iter()
            .map(|c| (c.to_string(), vec![1.0]))
            .collect(),
    )
    .unwrap();
    let err = model.predict(&foreign).unwrap_err();
    assert!(matches!(
        err.as_align_error(),
        Some(AlignError::SchemaMismatch(_))
    ));
}

#[test]
fn test_linear_regression_recovers_plane() {
    let (frame, y) = frame();
    let model = LinearRegression::new(LinearParams {
        alpha: 0.0,
        fit_intercept: true,
    })
    .unwrap()
    .fit(&frame, &y)
    .unwrap();

    assert_abs_diff_eq!(model.coefficients()[0], 3.0, epsilon = 1e-8);
    assert_abs_diff_eq!(model.coefficients()[1], 2.0, epsilon = 1e-8);
    assert_abs_diff_eq!(model.intercept(), 1.0, epsilon = 1e-8);
}

#[test]
fn test_model_artifact_round_trip() {
    let (frame, y) = frame();
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.json");

    let artifact: ModelArtifact = booster().fit(&frame, &y).unwrap().into();
    artifact.save(&path).unwrap();
    let loaded = ModelArtifact::load(&path).unwrap();
    assert_eq!(loaded, artifact);

    let shared = loaded.into_shared();
    let expected = artifact.as_regressor().predict(&frame).unwrap();
    assert_eq!(shared.predict(&frame).unwrap(), expected);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["kind"], "gradient_boosting");
}

#[test]
fn test_missing_model_artifact() {
    let dir = tempdir().unwrap();
    let err = ModelArtifact::load(dir.path().join("model.json")).unwrap_err();
    assert!(matches!(
        err.as_align_error(),
        Some(AlignError::ArtifactMissing(_))
    ));
}
