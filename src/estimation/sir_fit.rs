use crate::Utils::logger::{save_history_csv, save_matrix_to_csv};
use crate::Utils::plots::{FitSeries, plot_fit};
use crate::estimation::report::print_comparison;
use crate::estimation::synthetic::{
    GridSpec, SyntheticData, add_gaussian_noise, flatten_columns, make_observations,
};
use crate::models::sir::SirModel;
use crate::numerical::GA::{GAOptimizer, GAResult};
use crate::numerical::LM_fitting::{CurveFit, FitResult};
use crate::numerical::RK_api::odeIntegrator;
use nalgebra::{DMatrix, DVector};

/// Estimation pipeline for the SIR epidemic model: the infected fraction is
/// observed and the rates [beta, gamma] are recovered.
pub struct SirEstimation {
    // [beta, gamma]
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

impl SirEstimation {
    pub fn new() -> Self {
        SirEstimation {
            true_params: DVector::from_vec(vec![0.3, 0.1]),
            y0: DVector::from_vec(vec![0.997, 0.003, 0.0]),
            grid: GridSpec {
                t0: 0.0,
                h: 0.2,
                substeps: 5,
                n_out: 161,
            },
            noise_sigma: 0.004,
            seed: 42,
            lower: DVector::from_vec(vec![0.05, 0.01]),
            upper: DVector::from_vec(vec![1.0, 0.5]),
            initial_guess: DVector::from_vec(vec![0.4, 0.15]),
            ga: GAOptimizer::new().with_seed(42),
            lm: CurveFit::new(),
            data: None,
            ga_result: None,
            lm_result: None,
        }
    }

    // only the infected fraction is observed
    fn observed_cols() -> &'static [usize] {
        &[1]
    }

    fn param_names() -> &'static [&'static str] {
        &["beta", "gamma"]
    }

    fn observed_matrix(&self, p: &DVector<f64>) -> Option<DMatrix<f64>> {
        let model = SirModel::from_params(p);
        let (_t, obs) = make_observations(
            |t, y| model.rhs(t, y),
            &self.y0,
            &self.grid,
            Self::observed_cols(),
        )?;
        Some(obs)
    }

    /// candidate parameters -> predicted infected-fraction curve
    pub fn model_observations(&self, p: &DVector<f64>) -> Option<DVector<f64>> {
        self.observed_matrix(p).map(|obs| flatten_columns(&obs))
    }

    pub fn generate_data(&mut self) {
        let model = SirModel::from_params(&self.true_params);
        let (t, clean) = make_observations(
            |t, y| model.rhs(t, y),
            &self.y0,
            &self.grid,
            Self::observed_cols(),
        )
        .expect("reference SIR simulation must stay finite");
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
            "SIR epidemic",
            Self::param_names(),
            &self.true_params,
            self.ga_result.as_ref(),
            self.lm_result.as_ref(),
        );
        if let Some(lm) = &self.lm_result {
            let fitted = SirModel::from_params(&lm.params);
            println!(" LM basic reproduction number R0 = {:.4}", fitted.r0());
        }
    }

    pub fn plot_result(&self) {
        let data = self
            .data
            .as_ref()
            .expect("generate_data must be called before plot_result");

        let model = SirModel::from_params(&self.true_params);
        let mut solver = odeIntegrator::new(
            Box::new(move |t, y| model.rhs(t, y)),
            vec!["s".to_string(), "i".to_string(), "r".to_string()],
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
            y: y_dense.column(1).clone_owned(),
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
            "sir_fit.png",
            "SIR epidemic, infected fraction",
            "t",
            "i",
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
        let mut headers = vec!["i_noisy".to_string(), "i_clean".to_string()];
        if let Some(ga) = &self.ga_result {
            if let Some(y_ga) = self.model_observations(&ga.best_params) {
                columns.push(y_ga);
                headers.push("i_ga".to_string());
            }
        }
        if let Some(lm) = &self.lm_result {
            if let Some(y_lm) = self.model_observations(&lm.params) {
                columns.push(y_lm);
                headers.push("i_lm".to_string());
            }
        }
        let mut table = DMatrix::zeros(data.t.len(), columns.len());
        for (j, col) in columns.iter().enumerate() {
            table.set_column(j, col);
        }
        save_matrix_to_csv(&table, &headers, "sir_fit.csv", &data.t, "t")?;

        if let Some(ga) = &self.ga_result {
            save_history_csv(&ga.history, "sir_ga_history.csv")?;
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
