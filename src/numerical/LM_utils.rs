use nalgebra::{DMatrix, DVector};
use num_traits::Float;

/// robust euclidean norm of the residual vector (scaled to avoid overflow)
pub fn enorm(v: &DVector<f64>) -> f64 {
    let max = v.iter().fold(0.0f64, |acc, x| Float::max(acc, x.abs()));
    if max == 0.0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for x in v.iter() {
        let scaled = x / max;
        sum += scaled * scaled;
    }
    max * sum.sqrt()
}

/// sum of squared residuals between prediction and data
pub fn sse(y_pred: &DVector<f64>, y_data: &DVector<f64>) -> f64 {
    let norm = enorm(&(y_pred - y_data));
    norm * norm
}

pub fn r_squared(y_data: &DVector<f64>, y_pred: &DVector<f64>) -> f64 {
    let y_mean = y_data.iter().sum::<f64>() / y_data.len() as f64;
    let ss_tot = y_data.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>();
    let ss_res = y_data
        .iter()
        .zip(y_pred.iter())
        .map(|(y, y_pred)| (y - y_pred).powi(2))
        .sum::<f64>();
    1.0 - ss_res / ss_tot
}

/// Forward finite-difference jacobian of a simulation model with respect to its
/// parameters. The step size is relative to each parameter magnitude; at the upper
/// bound the step flips backward so the perturbed point stays feasible.
pub fn fd_jacobian<F>(
    model: &F,
    a: &DVector<f64>,
    y_hat: &DVector<f64>,
    upper: &DVector<f64>,
    dp_rel: f64,
) -> Result<DMatrix<f64>, String>
where
    F: Fn(&DVector<f64>) -> Option<DVector<f64>>,
{
    let n = a.len();
    let m = y_hat.len();
    let mut jacobian = DMatrix::zeros(m, n);
    for j in 0..n {
        let mut dp = dp_rel * (1.0 + a[j].abs());
        let mut a_perturbed = a.clone();
        if a[j] + dp > upper[j] {
            dp = -dp;
        }
        a_perturbed[j] = a[j] + dp;
        let y_perturbed = model(&a_perturbed)
            .ok_or_else(|| format!("model evaluation failed while perturbing parameter {}", j))?;
        if y_perturbed.len() != m {
            return Err("model changed the length of its output".to_string());
        }
        for i in 0..m {
            jacobian[(i, j)] = (y_perturbed[i] - y_hat[i]) / dp;
        }
    }
    Ok(jacobian)
}

#[cfg(test)]
mod tests_lm_utils {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_enorm_matches_naive_norm() {
        let v = DVector::from_vec(vec![3.0, 4.0]);
        assert_relative_eq!(enorm(&v), 5.0, epsilon = 1e-14);
        let zero = DVector::from_vec(vec![0.0, 0.0]);
        assert_relative_eq!(enorm(&zero), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_r_squared_perfect_fit() {
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(r_squared(&y, &y), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_fd_jacobian_of_linear_model() {
        // model y_i = a0 * x_i + a1 has jacobian [x_i, 1]
        let x = [0.0, 1.0, 2.0];
        let model = |p: &DVector<f64>| {
            Some(DVector::from_vec(
                x.iter().map(|xi| p[0] * xi + p[1]).collect(),
            ))
        };
        let a = DVector::from_vec(vec![2.0, -1.0]);
        let y_hat = model(&a).unwrap();
        let upper = DVector::from_vec(vec![100.0, 100.0]);

        let jacobian = fd_jacobian(&model, &a, &y_hat, &upper, 1e-7).unwrap();
        for (i, xi) in x.iter().enumerate() {
            assert_relative_eq!(jacobian[(i, 0)], *xi, epsilon = 1e-5);
            assert_relative_eq!(jacobian[(i, 1)], 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_fd_jacobian_steps_backward_at_upper_bound() {
        let model = |p: &DVector<f64>| Some(DVector::from_vec(vec![p[0] * p[0]]));
        let a = DVector::from_vec(vec![1.0]);
        let y_hat = model(&a).unwrap();
        // the parameter sits exactly on its upper bound
        let upper = DVector::from_vec(vec![1.0]);
        let jacobian = fd_jacobian(&model, &a, &y_hat, &upper, 1e-7).unwrap();
        assert_relative_eq!(jacobian[(0, 0)], 2.0, epsilon = 1e-5);
    }
}
