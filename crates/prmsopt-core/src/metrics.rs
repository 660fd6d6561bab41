//! Goodness-of-fit measures used to rank calibration trials.
//!
//! All metrics take aligned observed and simulated slices and return a
//! scalar. Inputs shorter than two points, mismatched lengths, or
//! degenerate denominators yield NaN; callers rank NaN last.
use prmsopt_macros::Columns;

/// Nash-Sutcliffe Efficiency. Range: (-inf, 1], 1 = perfect.
pub fn nse(observed: &[f64], simulated: &[f64]) -> f64 {
    if !comparable(observed, simulated) {
        return f64::NAN;
    }
    let mean_obs = mean(observed);
    let numerator: f64 = observed
        .iter()
        .zip(simulated)
        .map(|(o, s)| (o - s).powi(2))
        .sum();
    let denominator: f64 = observed.iter().map(|o| (o - mean_obs).powi(2)).sum();
    if denominator == 0.0 {
        return f64::NAN;
    }
    1.0 - numerator / denominator
}

/// Root Mean Square Error. Range: [0, inf), 0 = perfect.
pub fn rmse(observed: &[f64], simulated: &[f64]) -> f64 {
    if !comparable(observed, simulated) {
        return f64::NAN;
    }
    let mse: f64 = observed
        .iter()
        .zip(simulated)
        .map(|(o, s)| (o - s).powi(2))
        .sum::<f64>()
        / observed.len() as f64;
    mse.sqrt()
}

/// Percent Bias. Optimal = 0. Positive = overestimation.
pub fn pbias(observed: &[f64], simulated: &[f64]) -> f64 {
    if !comparable(observed, simulated) {
        return f64::NAN;
    }
    let sum_obs: f64 = observed.iter().sum();
    if sum_obs == 0.0 {
        return f64::NAN;
    }
    let diff_sum: f64 = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| s - o)
        .sum();
    100.0 * diff_sum / sum_obs
}

/// Coefficient of determination as the squared Pearson correlation.
pub fn r_squared(observed: &[f64], simulated: &[f64]) -> f64 {
    if !comparable(observed, simulated) {
        return f64::NAN;
    }
    let mean_o = mean(observed);
    let mean_s = mean(simulated);
    let mut cov = 0.0;
    let mut var_o = 0.0;
    let mut var_s = 0.0;
    for (o, s) in observed.iter().zip(simulated) {
        let (do_, ds) = (o - mean_o, s - mean_s);
        cov += do_ * ds;
        var_o += do_ * do_;
        var_s += ds * ds;
    }
    if var_o == 0.0 || var_s == 0.0 {
        return f64::NAN;
    }
    let r = cov / (var_o * var_s).sqrt();
    r * r
}

/// Scores of one trial against the reference series.
#[derive(Debug, Clone, Copy, PartialEq, Columns)]
#[columns(name = "ScoreColumns")]
pub struct ScoreRecord {
    #[column(label = "NSE", rank = 1, order = "desc")]
    pub nse: f64,
    #[column(label = "RMSE", rank = 2)]
    pub rmse: f64,
    #[column(label = "PBIAS")]
    pub pbias: f64,
    #[column(label = "COEF_DET", rank = 4, order = "desc")]
    pub r_squared: f64,
    #[column(label = "ABS(PBIAS)", rank = 3)]
    pub abs_pbias: f64,
}

impl ScoreRecord {
    /// Compute every measure for one aligned pair of series.
    pub fn compute(observed: &[f64], simulated: &[f64]) -> Self {
        let pbias = pbias(observed, simulated);
        Self {
            nse: nse(observed, simulated),
            rmse: rmse(observed, simulated),
            pbias,
            r_squared: r_squared(observed, simulated),
            abs_pbias: pbias.abs(),
        }
    }

    /// Returns `true` when every measure is finite.
    pub fn is_finite(&self) -> bool {
        self.nse.is_finite()
            && self.rmse.is_finite()
            && self.pbias.is_finite()
            && self.r_squared.is_finite()
    }
}

fn comparable(observed: &[f64], simulated: &[f64]) -> bool {
    observed.len() == simulated.len() && observed.len() >= 2
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // --- NSE tests ---

    #[test]
    fn nse_perfect_match() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(nse(&obs, &obs), 1.0);
    }

    #[test]
    fn nse_mean_simulation_gives_zero() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [3.0; 5];
        assert_relative_eq!(nse(&obs, &sim), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn nse_constant_observed_is_nan() {
        let obs = [5.0; 5];
        let sim = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(nse(&obs, &sim).is_nan());
    }

    #[test]
    fn nse_known_value() {
        // num = 0.01+0.04+0.04+0.01+0.01 = 0.11, den = 10
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [1.1, 2.2, 2.8, 4.1, 4.9];
        assert_relative_eq!(nse(&obs, &sim), 0.989, epsilon = 1e-10);
    }

    #[test]
    fn nse_poor_simulation_negative() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!(nse(&obs, &sim) < 0.0);
    }

    // --- RMSE tests ---

    #[test]
    fn rmse_perfect_match() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(rmse(&obs, &obs), 0.0);
    }

    #[test]
    fn rmse_constant_error() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [2.0, 3.0, 4.0, 5.0, 6.0];
        assert_relative_eq!(rmse(&obs, &sim), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn rmse_known_value() {
        let obs = [1.0, 2.0, 3.0];
        let sim = [1.0, 2.0, 4.0];
        assert_relative_eq!(rmse(&obs, &sim), (1.0_f64 / 3.0).sqrt(), epsilon = 1e-10);
    }

    // --- PBIAS tests ---

    #[test]
    fn pbias_perfect_match() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(pbias(&obs, &obs), 0.0);
    }

    #[test]
    fn pbias_sign() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let high = [2.0, 3.0, 4.0, 5.0, 6.0];
        let low = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert!(pbias(&obs, &high) > 0.0);
        assert!(pbias(&obs, &low) < 0.0);
    }

    #[test]
    fn pbias_known_value() {
        // diff = 2 + 2 - 2 = 2, sum_obs = 60
        let obs = [10.0, 20.0, 30.0];
        let sim = [12.0, 22.0, 28.0];
        assert_relative_eq!(pbias(&obs, &sim), 100.0 * 2.0 / 60.0, epsilon = 1e-10);
    }

    #[test]
    fn pbias_zero_observed_is_nan() {
        let obs = [0.0; 5];
        let sim = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(pbias(&obs, &sim).is_nan());
    }

    // --- R² tests ---

    #[test]
    fn r_squared_linear_relation_is_one() {
        let obs = [1.0, 2.0, 3.0, 4.0];
        let sim = [3.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(r_squared(&obs, &sim), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn r_squared_known_value() {
        // r = 0.8 for this pair
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [2.0, 1.0, 4.0, 3.0, 5.0];
        assert_relative_eq!(r_squared(&obs, &sim), 0.64, epsilon = 1e-12);
    }

    #[test]
    fn r_squared_constant_series_is_nan() {
        let obs = [1.0, 2.0, 3.0];
        assert!(r_squared(&obs, &[2.0; 3]).is_nan());
        assert!(r_squared(&[2.0; 3], &obs).is_nan());
    }

    // --- Degenerate input ---

    #[test]
    fn fewer_than_two_points_is_nan() {
        assert!(nse(&[1.0], &[1.0]).is_nan());
        assert!(rmse(&[], &[]).is_nan());
        assert!(pbias(&[1.0], &[2.0]).is_nan());
        assert!(r_squared(&[1.0], &[1.0]).is_nan());
    }

    #[test]
    fn mismatched_lengths_are_nan() {
        assert!(nse(&[1.0, 2.0, 3.0], &[1.0, 2.0]).is_nan());
    }

    // --- ScoreRecord ---

    #[test]
    fn record_for_identical_series() {
        let obs = [3.0, 1.0, 4.0, 1.0, 5.0];
        let rec = ScoreRecord::compute(&obs, &obs);
        assert_eq!(rec.nse, 1.0);
        assert_eq!(rec.rmse, 0.0);
        assert_eq!(rec.pbias, 0.0);
        assert_eq!(rec.abs_pbias, 0.0);
        assert_relative_eq!(rec.r_squared, 1.0, epsilon = 1e-12);
        assert!(rec.is_finite());
    }

    #[test]
    fn record_abs_pbias() {
        let rec = ScoreRecord::compute(&[10.0, 20.0, 30.0], &[8.0, 18.0, 28.0]);
        assert!(rec.pbias < 0.0);
        assert_eq!(rec.abs_pbias, -rec.pbias);
    }

    #[test]
    fn record_columns() {
        let mut cols = ScoreColumns::with_capacity(2);
        cols.push(&ScoreRecord::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]));
        cols.push(&ScoreRecord::compute(&[1.0, 2.0, 3.0], &[2.0, 3.0, 4.0]));
        assert_eq!(cols.len(), 2);
        assert_eq!(cols.nse[0], 1.0);
        assert_eq!(cols.column("rmse").unwrap()[1], 1.0);
        assert_eq!(
            ScoreRecord::field_names(),
            &["nse", "rmse", "pbias", "r_squared", "abs_pbias"]
        );
        assert_eq!(
            ScoreRecord::column_labels(),
            &["NSE", "RMSE", "PBIAS", "COEF_DET", "ABS(PBIAS)"]
        );
    }

    #[test]
    fn rank_cmp_follows_key_priority() {
        use std::cmp::Ordering;
        let rec = |nse, rmse, pbias: f64, r_squared| ScoreRecord {
            nse,
            rmse,
            pbias,
            r_squared,
            abs_pbias: pbias.abs(),
        };
        // r_squared is declared before abs_pbias but ranks after it
        let a = rec(0.8, 1.0, -2.0, 0.5);
        let b = rec(0.8, 1.0, 3.0, 0.9);
        assert_eq!(a.rank_cmp(&b), Ordering::Less);
        // NaN loses to any number, even a bad one
        let nan = rec(f64::NAN, 0.0, 0.0, 1.0);
        let poor = rec(-5.0, 9.0, 50.0, 0.0);
        assert_eq!(nan.rank_cmp(&poor), Ordering::Greater);
        assert_eq!(poor.values(), [-5.0, 9.0, 50.0, 0.0, 50.0]);
    }
}
