use crate::Utils::logger::{save_history_csv, save_matrix_to_csv};
use crate::Utils::plots::{FitSeries, plot_fit};
use crate::estimation::report::print_comparison;
use crate::estimation::synthetic::{
    GridSpec, SyntheticData, add_gaussian_noise, flatten_columns, make_observations,
};
use crate::models::pendulum::ForcedPendulum;
use crate::numerical::GA::{GAOptimizer, GAResult};
use crate::numerical::LM_fitting::{CurveFit, FitResult};
use crate::numerical::RK_api::odeIntegrator;
use nalgebra::{DMatrix, DVector};

/// Full estimation pipeline for the forced damped pendulum: simulate with the
/// true parameters, corrupt the angle observations with gaussian noise, then
/// recover [b, a, omega_d] independently with a genetic algorithm and with
/// Levenberg-Marquardt curve fitting.
pub struct PendulumEstimation {
    // [b, a, omega_d]
    pub true_params: DVector<f64>,
    pub y0: DVector<f64>,
    pub grid: GridSpec,
    pub noise_sigma: f64,
    pub seed: u64,
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
    // starting point of the curve fit, independent of the GA
    pub initial_guess: DVector<f64>,
    pub ga: GAOptimizer,
    pub lm: CurveFit,
    pub data: Option<SyntheticData>,
    pub ga_result: Option<GAResult>,
    pub lm_result: Option<FitResult>,
}

impl PendulumEstimation {
    pub fn new() -> Self {
        PendulumEstimation {
            true_params: DVector::from_vec(vec![0.35, 1.2, 0.667]),
            y0: DVector::from_vec(vec![0.2, 0.0]),
            grid: GridSpec {
                t0: 0.0,
                h: 0.01,
                substeps: 10,
                n_out: 101,
            },
            noise_sigma: 0.02,
            seed: 42,
            lower: DVector::from_vec(vec![0.0, 0.0, 0.1]),
            upper: DVector::from_vec(vec![1.5, 3.0, 2.0]),
            initial_guess: DVector::from_vec(vec![0.45, 1.0, 0.75]),
            ga: GAOptimizer::new().with_seed(42),
            lm: CurveFit::new(),
            data: None,
            ga_result: None,
            lm_result: None,
        }
    }

    // only the angle is observed
    fn observed_cols() -> &'static [usize] {
        &[0]
    }

    fn param_names() -> &'static [&'static str] {
        &["b", "a", "omega_d"]
    }

    fn observed_matrix(&self, p: &DVector<f64>) -> Option<DMatrix<f64>> {
        let model = ForcedPendulum::from_params(p);
        let (_t, obs) = make_observations(
            |t, y| model.rhs(t, y),
            &self.y0,
            &self.grid,
            Self::observed_cols(),
        )?;
        Some(obs)
    }

    /// candidate parameters -> predicted observation vector (runs the integration)
    pub fn model_observations(&self, p: &DVector<f64>) -> Option<DVector<f64>> {
        self.observed_matrix(p).map(|obs| flatten_columns(&obs))
    }

    pub fn generate_data(&mut self) {
        let model = ForcedPendulum::from_params(&self.true_params);
        let (t, clean) = make_observations(
            |t, y| model.rhs(t, y),
            &self.y0,
            &self.grid,
            Self::observed_cols(),
        )
        .expect("reference pendulum simulation must stay finite");
        let noisy = add_gaussian_noise(&clean, self.noise_sigma, self.seed);
        self.data = Some(SyntheticData { t, clean, noisy });
    }

    pub fn run_ga(&mut self) {
        let data = self
            .data
            .as_ref()
            .expect("generate_data must be called before run_ga");
        let y_obs = flatten_columns(&data.noisy);
        let fitness = |p: &DVector<f64>| match self.model_observations(p) {
            Some(y_hat) => (y_hat - &y_obs).norm_squared(),
            None => f64::INFINITY,
        };
        let result = self.ga.solve(fitness, &self.lower, &self.upper);
        self.ga_result = Some(result);
    }

    pub fn run_curve_fit(&mut self) -> Result<(), String> {
        let data = self
            .data
            .as_ref()
            .ok_or("generate_data must be called before run_curve_fit")?;
        let y_obs = flatten_columns(&data.noisy);
        let result = self.lm.fit(
            |p| self.model_observations(p),
            &y_obs,
            self.initial_guess.clone(),
            &self.lower,
            &self.upper,
        )?;
        self.lm_result = Some(result);
        Ok(())
    }

    pub fn report(&self) {
        print_comparison(
            "forced damped pendulum",
            Self::param_names(),
            &self.true_params,
            self.ga_result.as_ref(),
            self.lm_result.as_ref(),
        );
    }

    pub fn plot_result(&self) {
        let data = self
            .data
            .as_ref()
            .expect("generate_data must be called before plot_result");

        // dense true-parameter trajectory for the overlay
        let model = ForcedPendulum::from_params(&self.true_params);
        let mut solver = odeIntegrator::new(
            Box::new(move |t, y| model.rhs(t, y)),
            vec!["theta".to_string(), "omega".to_string()],
            "t".to_string(),
            "RK4".to_string(),
            self.grid.t0,
            self.y0.clone(),
            self.grid.t_end(),
            self.grid.h,
        );
        solver.solve();
        let (t_dense, y_dense) = solver.get_result();

        let mut curves = vec![FitSeries {
            name: "true parameters".to_string(),
            t: t_dense,
            y: y_dense.column(0).clone_owned(),
        }];
        if let Some(ga) = &self.ga_result {
            if let Some(y_ga) = self.model_observations(&ga.best_params) {
                curves.push(FitSeries {
                    name: "GA fit".to_string(),
                    t: data.t.clone(),
                    y: y_ga,
                });
            }
        }
        if let Some(lm) = &self.lm_result {
            if let Some(y_lm) = self.model_observations(&lm.params) {
                curves.push(FitSeries {
                    name: "LM fit".to_string(),
                    t: data.t.clone(),
                    y: y_lm,
                });
            }
        }
        plot_fit(
            "pendulum_fit.png",
            "forced damped pendulum",
            "t",
            "theta",
            &data.t,
            &data.noisy.column(0).clone_owned(),
            &curves,
        );
    }

    pub fn save_result(&self) -> Result<(), Box<dyn std::error::Error>> {
        let data = self
            .data
            .as_ref()
            .ok_or("generate_data must be called before save_result")?;

        let mut columns: Vec<DVector<f64>> = vec![
            data.noisy.column(0).clone_owned(),
            data.clean.column(0).clone_owned(),
        ];
        let mut headers = vec!["theta_noisy".to_string(), "theta_clean".to_string()];
        if let Some(ga) = &self.ga_result {
            if let Some(y_ga) = self.model_observations(&ga.best_params) {
                columns.push(y_ga);
                headers.push("theta_ga".to_string());
            }
        }
        if let Some(lm) = &self.lm_result {
            if let Some(y_lm) = self.model_observations(&lm.params) {
                columns.push(y_lm);
                headers.push("theta_lm".to_string());
            }
        }
        let mut table = DMatrix::zeros(data.t.len(), columns.len());
        for (j, col) in columns.iter().enumerate() {
            table.set_column(j, col);
        }
        save_matrix_to_csv(&table, &headers, "pendulum_fit.csv", &data.t, "t")?;

        if let Some(ga) = &self.ga_result {
            save_history_csv(&ga.history, "pendulum_ga_history.csv")?;
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<(), String> {
        self.generate_data();
        self.run_ga();
        self.run_curve_fit()?;
        self.report();
        self.plot_result();
        self.save_result().map_err(|e| e.to_string())?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          TESTS
///////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests_pendulum_fit {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_generate_data_shapes() {
        let mut task = PendulumEstimation::new();
        task.generate_data();
        let data = task.data.as_ref().unwrap();
        assert_eq!(data.t.len(), task.grid.n_out);
        assert_eq!(data.clean.nrows(), task.grid.n_out);
        assert_eq!(data.clean.ncols(), 1);
        assert_eq!(data.noisy.nrows(), task.grid.n_out);
        // the corruption actually changed the data
        assert!((&data.noisy - &data.clean).norm() > 0.0);
    }

    #[test]
    fn test_lm_recovers_parameters_from_clean_data() {
        let mut task = PendulumEstimation::new();
        task.noise_sigma = 0.0;
        task.lm = CurveFit::new().with_loglevel("off");
        task.generate_data();
        task.run_curve_fit().unwrap();

        let fit = task.lm_result.as_ref().unwrap();
        assert_relative_eq!(fit.params[0], 0.35, epsilon = 1e-2);
        assert_relative_eq!(fit.params[1], 1.2, epsilon = 1e-2);
        assert_relative_eq!(fit.params[2], 0.667, epsilon = 1e-2);
        assert!(fit.r_squared > 0.999);
    }

    #[test]
    fn test_fitness_is_zero_at_true_parameters_without_noise() {
        let mut task = PendulumEstimation::new();
        task.noise_sigma = 0.0;
        task.generate_data();

        let data = task.data.as_ref().unwrap();
        let y_obs = flatten_columns(&data.noisy);
        let y_hat = task.model_observations(&task.true_params).unwrap();
        assert_relative_eq!((y_hat - y_obs).norm(), 0.0, epsilon = 1e-12);
    }
}
