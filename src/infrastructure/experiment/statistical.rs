//! Statistical functions for content A/B testing
//!
//! Rate metrics are compared with a two-proportion z-test, sum and average
//! metrics with Welch's t-test.

/// Two-tailed critical z value at alpha = 0.05
pub const Z_CRITICAL_95: f64 = 1.959964;

/// Outcome of Welch's t-test, candidate minus control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchResult {
    pub t: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

/// Two-proportion z statistic of the candidate rate against the control rate
///
/// Returns `None` when either side has no samples or the pooled standard
/// error is zero (both rates 0 or both 1).
pub fn two_proportion_z_test(
    control_successes: u64,
    control_total: u64,
    candidate_successes: u64,
    candidate_total: u64,
) -> Option<f64> {
    if control_total == 0 || candidate_total == 0 {
        return None;
    }

    let n_c = control_total as f64;
    let n_v = candidate_total as f64;
    let s_c = control_successes as f64;
    let s_v = candidate_successes as f64;

    let pooled = (s_c + s_v) / (n_c + n_v);
    let se = (pooled * (1.0 - pooled) * (1.0 / n_c + 1.0 / n_v)).sqrt();

    if se == 0.0 || !se.is_finite() {
        return None;
    }

    Some((s_v / n_v - s_c / n_c) / se)
}

/// Welch's t-test for two independent samples with possibly unequal variances
///
/// Returns `None` if either sample has fewer than 2 elements or the standard
/// error is zero.
pub fn welch_t_test(control: &[f64], candidate: &[f64]) -> Option<WelchResult> {
    if control.len() < 2 || candidate.len() < 2 {
        return None;
    }

    let n1 = control.len() as f64;
    let n2 = candidate.len() as f64;

    let var1 = variance(control);
    let var2 = variance(candidate);

    let se = ((var1 / n1) + (var2 / n2)).sqrt();

    if se == 0.0 {
        return None;
    }

    let t = (mean(candidate) - mean(control)) / se;

    // Welch-Satterthwaite degrees of freedom
    let df_num = (var1 / n1 + var2 / n2).powi(2);
    let df_denom = ((var1 / n1).powi(2) / (n1 - 1.0)) + ((var2 / n2).powi(2) / (n2 - 1.0));

    if df_denom == 0.0 {
        return None;
    }

    let df = df_num / df_denom;

    Some(WelchResult {
        t,
        degrees_of_freedom: df,
        p_value: approximate_t_p_value(t.abs(), df),
    })
}

/// Calculate mean of a sample
pub fn mean(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    sample.iter().sum::<f64>() / sample.len() as f64
}

/// Calculate variance of a sample (sample variance, n-1 denominator)
pub fn variance(sample: &[f64]) -> f64 {
    if sample.len() < 2 {
        return 0.0;
    }

    let m = mean(sample);
    let n = sample.len() as f64;
    sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1.0)
}

/// Calculate standard deviation of a sample
pub fn std_dev(sample: &[f64]) -> f64 {
    variance(sample).sqrt()
}

/// Two-tailed critical z for a significance level
pub fn critical_z(alpha: f64) -> f64 {
    if (alpha - 0.05).abs() < 1e-12 {
        return Z_CRITICAL_95;
    }
    inverse_normal_cdf(1.0 - alpha / 2.0)
}

/// Two-tailed p-value of a z statistic
pub fn two_tailed_p_value(z: f64) -> f64 {
    (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0)
}

/// Margin of error of a proportion `p` over `n` samples
pub fn proportion_margin(p: f64, n: u64, z: f64) -> Option<f64> {
    if n == 0 {
        return None;
    }
    Some(z * (p * (1.0 - p) / n as f64).sqrt())
}

/// Margin of error of a mean with sample standard deviation `sd` over `n` samples
///
/// Normal approximation; not exact for small samples.
pub fn mean_margin(sd: f64, n: u64, z: f64) -> Option<f64> {
    if n == 0 {
        return None;
    }
    Some(z * sd / (n as f64).sqrt())
}

/// Approximate two-tailed p-value from t-statistic and degrees of freedom
///
/// Normal approximation for large df, with a variance correction below 30.
fn approximate_t_p_value(t: f64, df: f64) -> f64 {
    if df > 30.0 {
        two_tailed_p_value(t)
    } else {
        let correction = 1.0 - 1.0 / (4.0 * df);
        two_tailed_p_value(t * correction.max(0.0).sqrt())
    }
}

/// Standard normal cumulative distribution function
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Inverse of the standard normal CDF (Acklam's rational approximation)
///
/// Relative error below 1.2e-9 on (0, 1). Returns infinities at the bounds.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Error function approximation (Abramowitz and Stegun 7.1.26)
///
/// Accurate to about 1.5e-7.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;

    mod descriptive {
        use super::*;

        #[test]
        fn test_mean() {
            assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0);
            assert_eq!(mean(&[]), 0.0);
            assert_eq!(mean(&[42.0]), 42.0);
        }

        #[test]
        fn test_variance_and_std_dev() {
            let var = variance(&[1.0, 2.0, 3.0, 4.0, 5.0]);
            assert!((var - 2.5).abs() < 0.001);
            assert_eq!(variance(&[42.0]), 0.0);

            let sd = std_dev(&[1.0, 2.0, 3.0, 4.0, 5.0]);
            assert!((sd - 1.5811).abs() < 0.001);
        }
    }

    mod z_test {
        use super::*;

        #[test]
        fn test_clear_lift_is_significant() {
            // 10% vs 25% over 100 users each
            let z = two_proportion_z_test(10, 100, 25, 100).unwrap();
            assert!((z - 2.7915).abs() < 0.001, "z = {}", z);
            assert!(z.abs() >= Z_CRITICAL_95);
        }

        #[test]
        fn test_small_difference_is_not_significant() {
            let z = two_proportion_z_test(10, 100, 12, 100).unwrap();
            assert!(z.abs() < Z_CRITICAL_95);
        }

        #[test]
        fn test_sign_follows_candidate() {
            let z = two_proportion_z_test(25, 100, 10, 100).unwrap();
            assert!(z < 0.0);
        }

        #[test]
        fn test_zero_standard_error_is_guarded() {
            assert!(two_proportion_z_test(0, 100, 0, 100).is_none());
            assert!(two_proportion_z_test(100, 100, 50, 50).is_none());
        }

        #[test]
        fn test_empty_side_is_guarded() {
            assert!(two_proportion_z_test(0, 0, 5, 10).is_none());
            assert!(two_proportion_z_test(5, 10, 0, 0).is_none());
        }

        #[test]
        fn test_p_value() {
            let p = two_tailed_p_value(2.7915);
            assert!((p - 0.00525).abs() < 0.0002, "p = {}", p);
            assert!((two_tailed_p_value(0.0) - 1.0).abs() < 1e-6);
            assert!((two_tailed_p_value(Z_CRITICAL_95) - 0.05).abs() < 0.001);
        }
    }

    mod welch {
        use super::*;

        #[test]
        fn test_insufficient_samples() {
            assert!(welch_t_test(&[], &[1.0, 2.0]).is_none());
            assert!(welch_t_test(&[1.0], &[1.0, 2.0]).is_none());
            assert!(welch_t_test(&[1.0, 2.0], &[1.0]).is_none());
        }

        #[test]
        fn test_zero_variance_is_guarded() {
            assert!(welch_t_test(&[3.0, 3.0, 3.0], &[3.0, 3.0]).is_none());
        }

        #[test]
        fn test_significantly_different() {
            let control = vec![100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 101.0, 99.0, 100.0, 100.0];
            let candidate = vec![
                150.0, 152.0, 148.0, 151.0, 149.0, 150.0, 151.0, 149.0, 150.0, 150.0,
            ];

            let result = welch_t_test(&control, &candidate).unwrap();
            assert!(result.t > 0.0);
            assert!(
                result.p_value < 0.01,
                "Significantly different samples should have low p-value, got {}",
                result.p_value
            );
        }

        #[test]
        fn test_similar_samples() {
            let control = vec![100.0, 102.0, 98.0, 101.0, 99.0];
            let candidate = vec![101.0, 99.0, 100.0, 102.0, 98.0];

            let result = welch_t_test(&control, &candidate).unwrap();
            assert!(
                result.p_value > 0.5,
                "Similar samples should have high p-value, got {}",
                result.p_value
            );
        }
    }

    mod intervals {
        use super::*;

        #[test]
        fn test_proportion_margin() {
            let margin = proportion_margin(0.2, 100, Z_CRITICAL_95).unwrap();
            assert!((margin - 0.0784).abs() < 0.0001, "margin = {}", margin);
            assert!(proportion_margin(0.2, 0, Z_CRITICAL_95).is_none());
        }

        #[test]
        fn test_mean_margin() {
            let margin = mean_margin(10.0, 100, Z_CRITICAL_95).unwrap();
            assert!((margin - 1.959964).abs() < 1e-9);
        }

        #[test]
        fn test_critical_z() {
            assert_eq!(critical_z(0.05), Z_CRITICAL_95);
            assert!((critical_z(0.01) - 2.5758).abs() < 0.001);
            assert!((critical_z(0.10) - 1.6449).abs() < 0.001);
        }

        #[test]
        fn test_inverse_normal_cdf() {
            assert!(inverse_normal_cdf(0.5).abs() < 1e-9);
            assert!((inverse_normal_cdf(0.975) - 1.959964).abs() < 1e-5);
            assert!((inverse_normal_cdf(0.01) + 2.326348).abs() < 1e-5);
            assert!((inverse_normal_cdf(0.999) - 3.090232).abs() < 1e-5);
            assert_eq!(inverse_normal_cdf(0.0), f64::NEG_INFINITY);
        }

        #[test]
        fn test_normal_cdf() {
            assert!((normal_cdf(0.0) - 0.5).abs() < 0.001);
            assert!(normal_cdf(3.0) > 0.998);
            assert!(normal_cdf(-3.0) < 0.002);
        }
    }
}
