use crate::Utils::logger::{save_history_csv, save_matrix_to_csv};
use crate::Utils::plots::{FitSeries, plot_fit};
use crate::estimation::report::print_comparison;
use crate::estimation::synthetic::{
    GridSpec, SyntheticData, add_gaussian_noise, flatten_columns, make_observations,
};
use crate::models::double_pendulum::DoublePendulum;
use crate::numerical::GA::{GAOptimizer, GAResult};
use crate::numerical::LM_fitting::{CurveFit, FitResult};
use crate::numerical::RK_api::odeIntegrator;
use nalgebra::{DMatrix, DVector};

/// Estimation pipeline for the double pendulum: both angles are observed and the
/// two rod lengths [l1, l2] are recovered. The initial condition keeps the motion
/// in the regular regime; in the chaotic regime trajectories decorrelate from the
/// data faster than any optimizer can follow.
pub struct DoublePendulumEstimation {
    // [l1, l2]
    pub true_params: DVector<f64>,
    pub y0: DVector<f64>,
    pub grid: GridSpec,
    pub noise_sigma: f64,
    pub seed: u64,
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
    pub initial_guess: DVector<f64>,
    pub ga: GAOptimizer,
    pub lm: CurveFit,
    pub data: Option<SyntheticData>,
    pub ga_result: Option<GAResult>,
    pub lm_result: Option<FitResult>,
}

impl DoublePendulumEstimation {
    pub fn new() -> Self {
        DoublePendulumEstimation {
            true_params: DVector::from_vec(vec![1.0, 0.7]),
            y0: DVector::from_vec(vec![0.25, 0.0, 0.35, 0.0]),
            grid: GridSpec {
                t0: 0.0,
                h: 0.005,
                substeps: 8,
                n_out: 121,
            },
            noise_sigma: 0.01,
            seed: 42,
            lower: DVector::from_vec(vec![0.2, 0.2]),
            upper: DVector::from_vec(vec![2.0, 2.0]),
            // perturbed truth; a longer window or a farther guess lets the fast
            // normal mode slip a full cycle and strands the fit in a local minimum
            initial_guess: DVector::from_vec(vec![0.9, 0.8]),
            ga: GAOptimizer::new().with_seed(42),
            lm: CurveFit::new(),
            data: None,
            ga_result: None,
            lm_result: None,
        }
    }

    // both angles are observed
    fn observed_cols() -> &'static [usize] {
        &[0, 2]
    }

    fn param_names() -> &'static [&'static str] {
        &["l1", "l2"]
    }

    fn observed_matrix(&self, p: &DVector<f64>) -> Option<DMatrix<f64>> {
        let model = DoublePendulum::from_params(p);
        let (_t, obs) = make_observations(
            |t, y| model.rhs(t, y),
            &self.y0,
            &self.grid,
            Self::observed_cols(),
        )?;
        Some(obs)
    }

    /// candidate parameters -> predicted observation vector, both angle columns
    /// stacked (theta1 first)
    pub fn model_observations(&self, p: &DVector<f64>) -> Option<DVector<f64>> {
        self.observed_matrix(p).map(|obs| flatten_columns(&obs))
    }

    pub fn generate_data(&mut self) {
        let model = DoublePendulum::from_params(&self.true_params);
        let (t, clean) = make_observations(
            |t, y| model.rhs(t, y),
            &self.y0,
            &self.grid,
            Self::observed_cols(),
        )
        .expect("reference double pendulum simulation must stay finite");
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
            "double pendulum",
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

        let model = DoublePendulum::from_params(&self.true_params);
        let mut solver = odeIntegrator::new(
            Box::new(move |t, y| model.rhs(t, y)),
            vec![
                "theta1".to_string(),
                "omega1".to_string(),
                "theta2".to_string(),
                "omega2".to_string(),
            ],
            "t".to_string(),
            "RK4".to_string(),
            self.grid.t0,
            self.y0.clone(),
            self.grid.t_end(),
            self.grid.h,
        );
        solver.solve();
        let (t_dense, y_dense) = solver.get_result();

        let ga_obs = self
            .ga_result
            .as_ref()
            .and_then(|ga| self.observed_matrix(&ga.best_params));
        let lm_obs = self
            .lm_result
            .as_ref()
            .and_then(|lm| self.observed_matrix(&lm.params));

        // one overlay per observed angle
        for (jj, (varname, state_col)) in [("theta1", 0usize), ("theta2", 2usize)]
            .iter()
            .enumerate()
        {
            let mut curves = vec![FitSeries {
                name: "true parameters".to_string(),
                t: t_dense.clone(),
                y: y_dense.column(*state_col).clone_owned(),
            }];
            if let Some(obs) = &ga_obs {
                curves.push(FitSeries {
                    name: "GA fit".to_string(),
                    t: data.t.clone(),
                    y: obs.column(jj).clone_owned(),
                });
            }
            if let Some(obs) = &lm_obs {
                curves.push(FitSeries {
                    name: "LM fit".to_string(),
                    t: data.t.clone(),
                    y: obs.column(jj).clone_owned(),
                });
            }
            let filename = format!("double_pendulum_{}_fit.png", varname);
            plot_fit(
                &filename,
                "double pendulum",
                "t",
                varname,
                &data.t,
                &data.noisy.column(jj).clone_owned(),
                &curves,
            );
        }
    }

    pub fn save_result(&self) -> Result<(), Box<dyn std::error::Error>> {
        let data = self
            .data
            .as_ref()
            .ok_or("generate_data must be called before save_result")?;

        let mut columns: Vec<DVector<f64>> = vec![
            data.noisy.column(0).clone_owned(),
            data.noisy.column(1).clone_owned(),
            data.clean.column(0).clone_owned(),
            data.clean.column(1).clone_owned(),
        ];
        let mut headers = vec![
            "theta1_noisy".to_string(),
            "theta2_noisy".to_string(),
            "theta1_clean".to_string(),
            "theta2_clean".to_string(),
        ];
        if let Some(obs) = self
            .ga_result
            .as_ref()
            .and_then(|ga| self.observed_matrix(&ga.best_params))
        {
            columns.push(obs.column(0).clone_owned());
            columns.push(obs.column(1).clone_owned());
            headers.push("theta1_ga".to_string());
            headers.push("theta2_ga".to_string());
        }
        if let Some(obs) = self
            .lm_result
            .as_ref()
            .and_then(|lm| self.observed_matrix(&lm.params))
        {
            columns.push(obs.column(0).clone_owned());
            columns.push(obs.column(1).clone_owned());
            headers.push("theta1_lm".to_string());
            headers.push("theta2_lm".to_string());
        }
        let mut table = DMatrix::zeros(data.t.len(), columns.len());
        for (j, col) in columns.iter().enumerate() {
            table.set_column(j, col);
        }
        save_matrix_to_csv(&table, &headers, "double_pendulum_fit.csv", &data.t, "t")?;

        if let Some(ga) = &self.ga_result {
            save_history_csv(&ga.history, "double_pendulum_ga_history.csv")?;
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
