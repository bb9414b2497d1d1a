//! Ridge regression solved in closed form

use crate::error::{ForecastError, Result};
use crate::models::{feature_rows, Regressor, TrainedRegressor};
use feature_align::FeatureFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Ridge hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    /// L2 penalty on the coefficients
    pub alpha: f64,
    pub fit_intercept: bool,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_intercept: true,
        }
    }
}

/// Ridge linear regression
#[derive(Debug, Clone)]
pub struct LinearRegression {
    name: String,
    params: LinearParams,
}

impl LinearRegression {
    pub fn new(params: LinearParams) -> Result<Self> {
        if !(params.alpha >= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "alpha must be non-negative, got {}",
                params.alpha
            )));
        }
        Ok(Self {
            name: format!("Linear Regression (alpha={})", params.alpha),
            params,
        })
    }
}

impl Regressor for LinearRegression {
    type Trained = TrainedLinearRegression;

    fn fit(&self, features: &FeatureFrame, target: &[f64]) -> Result<Self::Trained> {
        let n_rows = features.height();
        if n_rows == 0 || target.len() != n_rows {
            return Err(ForecastError::DataError(format!(
                "cannot fit {} targets on a frame of {} rows",
                target.len(),
                n_rows
            )));
        }

        let feature_names = features.column_names();
        let rows = feature_rows(&feature_names, features)?;
        let d = feature_names.len();

        let (x_mean, y_mean) = if self.params.fit_intercept {
            let mut x_mean = vec![0.0; d];
            for row in &rows {
                for (m, v) in x_mean.iter_mut().zip(row) {
                    *m += v;
                }
            }
            x_mean.iter_mut().for_each(|m| *m /= n_rows as f64);
            (x_mean, target.iter().sum::<f64>() / n_rows as f64)
        } else {
            (vec![0.0; d], 0.0)
        };

        // Normal equations on centered data: (X'X + alpha I) b = X'y
        let mut gram = vec![vec![0.0; d]; d];
        let mut moment = vec![0.0; d];
        for (row, y) in rows.iter().zip(target) {
            let centered: Vec<f64> = row.iter().zip(&x_mean).map(|(v, m)| v - m).collect();
            let yc = y - y_mean;
            for i in 0..d {
                moment[i] += centered[i] * yc;
                for j in i..d {
                    gram[i][j] += centered[i] * centered[j];
                }
            }
        }
        for i in 0..d {
            gram[i][i] += self.params.alpha;
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
        }

        let coefficients = solve_symmetric(gram, moment);
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(c, m)| c * m)
                .sum::<f64>();

        info!(rows = n_rows, features = d, "fitted linear model");
        Ok(TrainedLinearRegression {
            name: self.name.clone(),
            params: self.params.clone(),
            feature_names,
            coefficients,
            intercept,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Gaussian elimination with partial pivoting
///
/// Directions with a vanishing pivot are left at a zero coefficient.
fn solve_symmetric(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    let mut pivot_of_row = vec![None; n];
    let mut row = 0;

    for col in 0..n {
        if row == n {
            break;
        }
        let best = (row..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(row);
        if a[best][col].abs() < 1e-10 {
            continue;
        }
        a.swap(row, best);
        b.swap(row, best);

        for r in 0..n {
            if r != row {
                let factor = a[r][col] / a[row][col];
                if factor != 0.0 {
                    for c in col..n {
                        a[r][c] -= factor * a[row][c];
                    }
                    b[r] -= factor * b[row];
                }
            }
        }
        pivot_of_row[row] = Some(col);
        row += 1;
    }

    let mut solution = vec![0.0; n];
    for (r, pivot) in pivot_of_row.iter().enumerate() {
        if let Some(col) = pivot {
            solution[*col] = b[r] / a[r][*col];
        }
    }
    solution
}

/// Fitted ridge model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedLinearRegression {
    name: String,
    params: LinearParams,
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl TrainedLinearRegression {
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl TrainedRegressor for TrainedLinearRegression {
    fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>> {
        let rows = feature_rows(&self.feature_names, features)?;
        Ok(rows
            .iter()
            .map(|row| {
                self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(v, c)| v * c)
                        .sum::<f64>()
            })
            .collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_recovers_exact_line() {
        let frame = FeatureFrame::from_columns(vec![
            ("a".to_string(), vec![0.0, 1.0, 2.0, 3.0]),
            ("b".to_string(), vec![1.0, 0.0, 1.0, 0.0]),
        ])
        .unwrap();
        let target = vec![5.0, 3.0, 9.0, 7.0]; // 1 + 2a + 4b

        let model = LinearRegression::new(LinearParams {
            alpha: 0.0,
            fit_intercept: true,
        })
        .unwrap()
        .fit(&frame, &target)
        .unwrap();

        assert_abs_diff_eq!(model.intercept(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.coefficients()[0], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.coefficients()[1], 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_column_gets_zero_weight() {
        let frame = FeatureFrame::from_columns(vec![
            ("x".to_string(), vec![1.0, 2.0, 3.0]),
            ("flat".to_string(), vec![5.0, 5.0, 5.0]),
        ])
        .unwrap();
        let model = LinearRegression::new(LinearParams {
            alpha: 0.0,
            fit_intercept: true,
        })
        .unwrap()
        .fit(&frame, &[2.0, 4.0, 6.0])
        .unwrap();

        assert_abs_diff_eq!(model.coefficients()[1], 0.0);
        let predictions = model.predict(&frame).unwrap();
        assert_abs_diff_eq!(predictions[2], 6.0, epsilon = 1e-9);
    }
}
