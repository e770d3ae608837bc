use crate::numerical::LM_utils::{fd_jacobian, r_squared, sse};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use simplelog::*;

/// Levenberg-Marquardt curve fitting for models that are simulations: the model
/// maps a parameter vector to the predicted observation vector (running an ODE
/// integration inside) and the jacobian is taken by forward finite differences.
/// Marquardt damping with a multiplicative lambda schedule; steps are clamped to
/// the parameter bounds, and a model that returns None (diverged integration) is
/// treated as a rejected step.
#[derive(Debug, Clone)]
pub struct CurveFit {
    // 0 means "choose from the problem size"
    pub max_evals: usize,
    // convergence tolerance for the gradient
    pub eps_grad: f64,
    // convergence tolerance for the relative coefficient change
    pub eps_coeff: f64,
    // convergence tolerance for the reduced chi-square
    pub eps_chi: f64,
    // acceptance threshold for the gain ratio of an L-M step
    pub eps_lm: f64,
    // initial value of the L-M damping parameter
    pub lambda_0: f64,
    pub lambda_up_fac: f64,
    pub lambda_dn_fac: f64,
    // relative step of the finite-difference jacobian
    pub dp_rel: f64,
    pub loglevel: Option<String>,
}

impl Default for CurveFit {
    fn default() -> Self {
        CurveFit {
            max_evals: 0,
            eps_grad: 1e-8,
            eps_coeff: 1e-9,
            eps_chi: 1e-12,
            eps_lm: 1e-2,
            lambda_0: 1e-3,
            lambda_up_fac: 11.0,
            lambda_dn_fac: 9.0,
            dp_rel: 1e-6,
            loglevel: Some("info".to_string()),
        }
    }
}

pub struct FitResult {
    pub params: DVector<f64>,
    pub red_chi2: f64,
    // asymptotic standard errors of the parameters, from the curvature matrix
    pub sigma_params: Option<DVector<f64>>,
    pub r_squared: f64,
    pub iterations: usize,
    pub func_calls: usize,
    pub converged: bool,
}

impl CurveFit {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_evals(self, max_evals: usize) -> Self {
        assert!(max_evals > 0, "max_evals must be positive");
        Self { max_evals, ..self }
    }
    #[must_use]
    pub fn with_eps_grad(self, eps_grad: f64) -> Self {
        assert!(eps_grad > 0.0, "eps_grad must be positive");
        Self { eps_grad, ..self }
    }
    #[must_use]
    pub fn with_eps_coeff(self, eps_coeff: f64) -> Self {
        assert!(eps_coeff > 0.0, "eps_coeff must be positive");
        Self { eps_coeff, ..self }
    }
    #[must_use]
    pub fn with_loglevel(self, loglevel: &str) -> Self {
        Self {
            loglevel: Some(loglevel.to_string()),
            ..self
        }
    }

    // wrapper around solver function to implement logging
    pub fn fit<F>(
        &self,
        model: F,
        y_data: &DVector<f64>,
        initial_guess: DVector<f64>,
        lower: &DVector<f64>,
        upper: &DVector<f64>,
    ) -> Result<FitResult, String>
    where
        F: Fn(&DVector<f64>) -> Option<DVector<f64>>,
    {
        let is_logging_disabled = self
            .loglevel
            .as_ref()
            .map(|level| level == "off" || level == "none")
            .unwrap_or(false);

        if is_logging_disabled {
            self.solver(model, y_data, initial_guess, lower, upper)
        } else {
            let log_option = if let Some(level) = self.loglevel.clone() {
                match level.as_str() {
                    "debug" => LevelFilter::Debug,
                    "info" => LevelFilter::Info,
                    "warn" => LevelFilter::Warn,
                    "error" => LevelFilter::Error,
                    _ => panic!("loglevel must be debug, info, warn or error"),
                }
            } else {
                LevelFilter::Info
            };
            let _ = CombinedLogger::init(vec![TermLogger::new(
                log_option,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )]);
            let res = self.solver(model, y_data, initial_guess, lower, upper);
            if let Ok(fit) = &res {
                info!(
                    "curve fit finished: reduced chi-square {:.6e}, R^2 {:.6}, {} function calls",
                    fit.red_chi2, fit.r_squared, fit.func_calls
                );
            }
            res
        }
    }

    fn solver<F>(
        &self,
        model: F,
        y_data: &DVector<f64>,
        initial_guess: DVector<f64>,
        lower: &DVector<f64>,
        upper: &DVector<f64>,
    ) -> Result<FitResult, String>
    where
        F: Fn(&DVector<f64>) -> Option<DVector<f64>>,
    {
        let n = initial_guess.len();
        let m = y_data.len();
        if n == 0 {
            return Err("no parameters to fit".to_string());
        }
        if m <= n {
            return Err(format!(
                "need more data points ({}) than parameters ({})",
                m, n
            ));
        }
        if lower.len() != n || upper.len() != n {
            return Err("bounds must have the same length as the parameter vector".to_string());
        }
        let dof = (m - n) as f64;
        let max_evals = if self.max_evals == 0 {
            200 * (n + 1)
        } else {
            self.max_evals
        };

        let mut a = initial_guess;
        clamp(&mut a, lower, upper);

        let mut func_calls = 0;
        let mut y_hat = model(&a).ok_or("model evaluation failed at the initial guess")?;
        func_calls += 1;
        if y_hat.len() != m {
            return Err(format!(
                "model returned {} values for {} data points",
                y_hat.len(),
                m
            ));
        }
        let mut chi2 = sse(&y_hat, y_data);

        let mut jacobian = fd_jacobian(&model, &a, &y_hat, upper, self.dp_rel)?;
        func_calls += n;
        let mut jtj = jacobian.transpose() * &jacobian;
        let mut jtdy = jacobian.transpose() * (y_data - &y_hat);

        let mut lambda = self.lambda_0;
        let mut iteration = 0;
        let mut converged = jtdy.amax() < self.eps_grad;

        while !converged && func_calls < max_evals {
            iteration += 1;

            // damped normal equations (Marquardt scaling of the diagonal)
            let mut a_mat = jtj.clone();
            for i in 0..n {
                a_mat[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }
            let h = a_mat
                .lu()
                .solve(&jtdy)
                .ok_or("singular normal equations in L-M step")?;

            let mut a_try = &a + &h;
            clamp(&mut a_try, lower, upper);

            let y_try = model(&a_try);
            func_calls += 1;
            let accepted = match y_try {
                None => false,
                Some(y_try) => {
                    let chi2_try = sse(&y_try, y_data);
                    let lambda_diag =
                        DVector::from_fn(n, |i, _| lambda * jtj[(i, i)].max(1e-12) * h[i]);
                    let denominator = (h.dot(&lambda_diag) + h.dot(&jtdy)).abs().max(f64::MIN_POSITIVE);
                    let rho = (chi2 - chi2_try) / denominator;

                    if rho > self.eps_lm {
                        a = a_try;
                        y_hat = y_try;
                        chi2 = chi2_try;
                        true
                    } else {
                        false
                    }
                }
            };

            if accepted {
                jacobian = fd_jacobian(&model, &a, &y_hat, upper, self.dp_rel)?;
                func_calls += n;
                jtj = jacobian.transpose() * &jacobian;
                jtdy = jacobian.transpose() * (y_data - &y_hat);
                lambda = (lambda / self.lambda_dn_fac).max(1e-7);

                debug!(
                    ">{:3}:{:3} | chi_sq={:10.3e} | lambda={:8.1e} | a={:?}",
                    iteration,
                    func_calls,
                    chi2 / dof,
                    lambda,
                    a.as_slice()
                );

                if jtdy.amax() < self.eps_grad && iteration > 2 {
                    converged = true;
                }
                let max_rel_change = h
                    .iter()
                    .zip(a.iter())
                    .map(|(h_i, a_i)| (h_i / (a_i.abs() + 1e-12)).abs())
                    .fold(0.0, f64::max);
                if max_rel_change < self.eps_coeff && iteration > 2 {
                    converged = true;
                }
                if chi2 / dof < self.eps_chi && iteration > 2 {
                    converged = true;
                }
            } else {
                lambda = (lambda * self.lambda_up_fac).min(1e7);
            }
        }

        let red_chi2 = chi2 / dof;
        let sigma_params = jtj.clone().try_inverse().map(|covariance| {
            DVector::from_fn(n, |i, _| (red_chi2 * covariance[(i, i)]).abs().sqrt())
        });
        let r_sq = r_squared(y_data, &y_hat);

        Ok(FitResult {
            params: a,
            red_chi2,
            sigma_params,
            r_squared: r_sq,
            iterations: iteration,
            func_calls,
            converged,
        })
    }
}

fn clamp(a: &mut DVector<f64>, lower: &DVector<f64>, upper: &DVector<f64>) {
    for j in 0..a.len() {
        a[j] = a[j].max(lower[j]).min(upper[j]);
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          TESTS
///////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests_curve_fit {
    use super::*;
    use approx::assert_relative_eq;

    fn wide_bounds(n: usize) -> (DVector<f64>, DVector<f64>) {
        (
            DVector::from_element(n, -100.0),
            DVector::from_element(n, 100.0),
        )
    }

    #[test]
    fn test_linear_fit() {
        // y = 5*x + 2
        let x_data: Vec<f64> = (0..50).map(|x| x as f64 * 0.1).collect();
        let y_data = DVector::from_vec(x_data.iter().map(|x| 5.0 * x + 2.0).collect());

        let x_for_model = x_data.clone();
        let model = move |p: &DVector<f64>| {
            Some(DVector::from_vec(
                x_for_model.iter().map(|x| p[0] * x + p[1]).collect(),
            ))
        };

        let (lower, upper) = wide_bounds(2);
        let fit = CurveFit::new()
            .with_loglevel("off")
            .fit(
                model,
                &y_data,
                DVector::from_vec(vec![1.0, 1.0]),
                &lower,
                &upper,
            )
            .unwrap();

        assert_relative_eq!(fit.params[0], 5.0, epsilon = 1e-5);
        assert_relative_eq!(fit.params[1], 2.0, epsilon = 1e-5);
        assert!(fit.converged);
        assert!(fit.r_squared > 0.999999);
    }

    #[test]
    fn test_exponential_fit() {
        // y = 2 * exp(0.5 * x)
        let x_data: Vec<f64> = (0..40).map(|x| x as f64 * 0.1).collect();
        let y_data = DVector::from_vec(x_data.iter().map(|x| 2.0 * (0.5 * x).exp()).collect());

        let x_for_model = x_data.clone();
        let model = move |p: &DVector<f64>| {
            Some(DVector::from_vec(
                x_for_model.iter().map(|x| p[0] * (p[1] * x).exp()).collect(),
            ))
        };

        let (lower, upper) = wide_bounds(2);
        let fit = CurveFit::new()
            .with_loglevel("off")
            .fit(
                model,
                &y_data,
                DVector::from_vec(vec![1.0, 1.0]),
                &lower,
                &upper,
            )
            .unwrap();

        assert_relative_eq!(fit.params[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(fit.params[1], 0.5, epsilon = 1e-4);
        assert!(fit.converged);
    }

    #[test]
    fn test_noisy_quadratic_fit_reports_uncertainty() {
        // y = 3*x^2 - x + 4 with small deterministic perturbations
        let x_data: Vec<f64> = (0..60).map(|x| x as f64 * 0.1 - 3.0).collect();
        let y_data = DVector::from_vec(
            x_data
                .iter()
                .enumerate()
                .map(|(k, x)| 3.0 * x * x - x + 4.0 + 0.01 * ((k as f64) * 2.7).sin())
                .collect(),
        );

        let x_for_model = x_data.clone();
        let model = move |p: &DVector<f64>| {
            Some(DVector::from_vec(
                x_for_model
                    .iter()
                    .map(|x| p[0] * x * x + p[1] * x + p[2])
                    .collect(),
            ))
        };

        let (lower, upper) = wide_bounds(3);
        let fit = CurveFit::new()
            .with_loglevel("off")
            .fit(
                model,
                &y_data,
                DVector::from_vec(vec![1.0, 1.0, 1.0]),
                &lower,
                &upper,
            )
            .unwrap();

        assert_relative_eq!(fit.params[0], 3.0, epsilon = 1e-2);
        assert_relative_eq!(fit.params[1], -1.0, epsilon = 1e-2);
        assert_relative_eq!(fit.params[2], 4.0, epsilon = 1e-2);
        let sigma = fit.sigma_params.expect("curvature matrix must be invertible");
        for j in 0..3 {
            assert!(sigma[j] >= 0.0);
            assert!(sigma[j] < 0.1);
        }
    }

    #[test]
    fn test_fit_respects_bounds() {
        // unconstrained optimum at p = 5, but the upper bound caps it at 3
        let y_data = DVector::from_vec(vec![5.0, 5.0, 5.0, 5.0]);
        let model =
            |p: &DVector<f64>| Some(DVector::from_vec(vec![p[0], p[0], p[0], p[0]]));

        let lower = DVector::from_vec(vec![0.0]);
        let upper = DVector::from_vec(vec![3.0]);
        let fit = CurveFit::new()
            .with_loglevel("off")
            .fit(model, &y_data, DVector::from_vec(vec![1.0]), &lower, &upper)
            .unwrap();

        assert!(fit.params[0] <= 3.0 + 1e-12);
        assert_relative_eq!(fit.params[0], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fit_fails_cleanly_when_model_cannot_start() {
        let model = |_p: &DVector<f64>| -> Option<DVector<f64>> { None };
        let y_data = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let (lower, upper) = wide_bounds(1);
        let result = CurveFit::new().with_loglevel("off").fit(
            model,
            &y_data,
            DVector::from_vec(vec![1.0]),
            &lower,
            &upper,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_fit_rejects_underdetermined_problem() {
        let model = |p: &DVector<f64>| Some(DVector::from_vec(vec![p[0] + p[1]]));
        let y_data = DVector::from_vec(vec![1.0]);
        let (lower, upper) = wide_bounds(2);
        let result = CurveFit::new().with_loglevel("off").fit(
            model,
            &y_data,
            DVector::from_vec(vec![0.0, 0.0]),
            &lower,
            &upper,
        );
        assert!(result.is_err());
    }
}
