use crate::Utils::logger::save_matrix_to_csv;
use crate::Utils::plots::plots;
use nalgebra::{DMatrix, DVector};
use std::time::Instant;

/// right-hand side of an ODE system: f(t, y) -> dy/dt
pub type RhsFn = Box<dyn Fn(f64, &DVector<f64>) -> DVector<f64>>;

pub struct odeIntegrator {
    values: Vec<String>,
    arg: String,
    method: String,
    t0: f64,
    y0: DVector<f64>,
    t_bound: f64,
    h_step: f64,
    solver_instance: Solvers,
    status: String,
    message: Option<String>,
    t_result: DVector<f64>,
    y_result: DMatrix<f64>,
}

pub enum Solvers {
    RK4(RK4),
    RKF45(RKF45),
}

impl Solvers {
    pub fn new(name: &str) -> Solvers {
        match name {
            "RK4" => Solvers::RK4(RK4::new()),
            "RKF45" => Solvers::RKF45(RKF45::new()),
            _ => panic!("Unknown solver name"),
        }
    }
}

trait Solver {
    fn step(&mut self, t_bound: f64, status: &mut String, message: &mut Option<String>);
}

impl Solver for RK4 {
    fn step(&mut self, t_bound: f64, status: &mut String, _message: &mut Option<String>) {
        let t = self.t;
        if t == t_bound {
            *status = "finished".to_string();
        } else {
            let success = self._step_impl();

            if !success {
                *status = "failed".to_string();
            } else {
                *status = "running".to_string();
                if (self.t - t_bound) >= 0.0 {
                    *status = "finished".to_string();
                }
            }
        }
    }
}

impl Solver for RKF45 {
    fn step(&mut self, t_bound: f64, status: &mut String, _message: &mut Option<String>) {
        let t = self.t;
        if t == t_bound {
            *status = "finished".to_string();
        } else {
            let success = self._step_impl();

            if !success {
                *status = "failed".to_string();
            } else {
                *status = "running".to_string();
                if (self.t - t_bound) >= 0.0 {
                    *status = "finished".to_string();
                }
            }
        }
    }
}

impl odeIntegrator {
    pub fn new(
        rhs: RhsFn,
        values: Vec<String>,
        arg: String,
        method: String,
        // start point
        t0: f64,
        // initial condition
        y0: DVector<f64>,
        t_bound: f64,
        h_step: f64,
    ) -> Self {
        let mut solver_instance = Solvers::new(&method);
        match &mut solver_instance {
            Solvers::RK4(rk4) => rk4.set_initial(rhs, y0.clone(), t0, h_step),
            Solvers::RKF45(rkf45) => rkf45.set_initial(rhs, y0.clone(), t0, h_step),
        }
        odeIntegrator {
            values,
            arg,
            method,
            t0,
            y0,
            t_bound,
            h_step,
            status: "running".to_string(),
            solver_instance,
            message: None,
            t_result: DVector::zeros(1),
            y_result: DMatrix::zeros(1, 1),
        }
    }

    pub fn main_loop(&mut self) {
        let start = Instant::now();
        let mut integr_status: Option<i8> = None;
        let mut y: Vec<DVector<f64>> = Vec::new();
        let mut t: Vec<f64> = Vec::new();

        t.push(self.t0);
        y.push(self.y0.clone());

        while integr_status.is_none() {
            match &mut self.solver_instance {
                Solvers::RK4(rk4) => {
                    rk4.step(self.t_bound, &mut self.status, &mut self.message);
                }
                Solvers::RKF45(rkf45) => {
                    rkf45.step(self.t_bound, &mut self.status, &mut self.message);
                }
            };

            if self.status == "finished" {
                integr_status = Some(0);
            } else if self.status == "failed" {
                integr_status = Some(-1);
                break;
            }

            match &self.solver_instance {
                Solvers::RK4(rk4) => {
                    t.push(rk4.t);
                    y.push(rk4.y.clone());
                }
                Solvers::RKF45(rkf45) => {
                    t.push(rkf45.t);
                    y.push(rkf45.y.clone());
                }
            }
        }
        let rows = y.len();
        let cols = y[0].len();
        let mut flat_vec: Vec<f64> = Vec::new();
        for vector in y.iter() {
            flat_vec.extend(vector.iter());
        }
        let y_res: DMatrix<f64> = DMatrix::from_vec(cols, rows, flat_vec).transpose();
        let t_res = DVector::from_vec(t);
        let duration = start.elapsed();
        log::debug!(
            "{} integration took {} milliseconds",
            self.method,
            duration.as_millis()
        );

        self.t_result = t_res;
        self.y_result = y_res;
    }

    pub fn solve(&mut self) {
        self.main_loop();
    }

    pub fn plot_result(&self) {
        plots(
            self.arg.clone(),
            self.values.clone(),
            self.t_result.clone(),
            self.y_result.clone(),
        );
        println!("result plotted");
    }

    pub fn get_result(&self) -> (DVector<f64>, DMatrix<f64>) {
        (self.t_result.clone(), self.y_result.clone())
    }

    pub fn save_result(&self, filename: &str) -> Result<(), Box<dyn std::error::Error>> {
        save_matrix_to_csv(
            &self.y_result,
            &self.values,
            filename,
            &self.t_result,
            &self.arg,
        )?;
        println!("result saved");
        Ok(())
    }
}

/// one classic Runge-Kutta 4 step
pub fn rk4_step<F>(f: &F, t: f64, y: &DVector<f64>, h: f64) -> DVector<f64>
where
    F: Fn(f64, &DVector<f64>) -> DVector<f64>,
{
    let k1 = h * f(t, y);
    let k2 = h * f(t + h / 2.0, &(y + &k1 / 2.0));
    let k3 = h * f(t + h / 2.0, &(y + &k2 / 2.0));
    let k4 = h * f(t + h, &(y + &k3));

    y + (&k1 + 2.0 * &k2 + 2.0 * &k3 + &k4) / 6.0
}

/// Integrate with internal step h and record every substeps-th point, so that row k
/// of the output corresponds exactly to t0 + k*h*substeps. This is the workhorse of
/// the estimation loop: observation grids are aligned by construction, without
/// interpolation. Returns None when the state leaves the finite range, which happens
/// for divergent candidate parameters.
pub fn solve_on_grid<F>(
    rhs: F,
    y0: &DVector<f64>,
    t0: f64,
    h: f64,
    n_out: usize,
    substeps: usize,
) -> Option<(DVector<f64>, DMatrix<f64>)>
where
    F: Fn(f64, &DVector<f64>) -> DVector<f64>,
{
    assert!(n_out > 0, "output grid must contain at least one point");
    assert!(substeps > 0, "substeps must be positive");
    let dim = y0.len();
    let mut y = y0.clone();
    let mut t = t0;
    let mut t_out = DVector::zeros(n_out);
    let mut y_out = DMatrix::zeros(n_out, dim);

    t_out[0] = t;
    for j in 0..dim {
        y_out[(0, j)] = y[j];
    }
    for k in 1..n_out {
        for _ in 0..substeps {
            y = rk4_step(&rhs, t, &y, h);
            t += h;
        }
        if !y.iter().all(|v| v.is_finite()) {
            return None;
        }
        t_out[k] = t;
        for j in 0..dim {
            y_out[(k, j)] = y[j];
        }
    }
    Some((t_out, y_out))
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////
pub struct RK4 {
    f: RhsFn,
    y0: DVector<f64>,
    t0: f64,
    pub t: f64,
    pub y: DVector<f64>,
    h: f64,
}

impl RK4 {
    pub fn new() -> RK4 {
        RK4 {
            f: Box::new(|_t, y| {
                let mut dydt = DVector::zeros(y.len());
                dydt[0] = y[1];
                dydt[1] = -y[0];
                dydt
            }),
            y0: DVector::from_vec(vec![1.0, 0.0]),
            t0: 0.0,
            t: 0.0,
            y: DVector::from_vec(vec![1.0, 0.0]),
            h: 0.1,
        }
    }

    pub fn set_initial(&mut self, f: RhsFn, y0: DVector<f64>, t0: f64, h: f64) {
        self.f = f;
        self.y0 = y0.clone();
        self.t0 = t0;
        self.h = h;
        self.y = y0;
        self.t = t0;
    }

    pub fn _step_impl(&mut self) -> bool {
        self.y = rk4_step(&self.f, self.t, &self.y, self.h);
        self.t += self.h;
        self.y.iter().all(|v| v.is_finite())
    }
}

pub struct RKF45 {
    f: RhsFn,
    y0: DVector<f64>,
    t0: f64,
    pub t: f64,
    pub y: DVector<f64>,
    h: f64,
}

impl RKF45 {
    pub fn new() -> RKF45 {
        RKF45 {
            f: Box::new(|_t, y| {
                let mut dydt = DVector::zeros(y.len());
                dydt[0] = y[1];
                dydt[1] = -y[0];
                dydt
            }),
            y0: DVector::from_vec(vec![1.0, 0.0]),
            t0: 0.0,
            t: 0.0,
            y: DVector::from_vec(vec![1.0, 0.0]),
            h: 0.1,
        }
    }

    pub fn set_initial(&mut self, f: RhsFn, y0: DVector<f64>, t0: f64, h: f64) {
        self.f = f;
        self.y0 = y0.clone();
        self.t0 = t0;
        self.h = h;
        self.y = y0;
        self.t = t0;
    }

    pub fn _step_impl(&mut self) -> bool {
        // Butcher tableau coefficients for the Fehlberg method, 5th order weights
        let a: [[f64; 6]; 6] = [
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [1.0 / 4.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0, 0.0],
            [
                1932.0 / 2197.0,
                -7200.0 / 2197.0,
                7296.0 / 2197.0,
                0.0,
                0.0,
                0.0,
            ],
            [
                439.0 / 216.0,
                -8.0,
                3680.0 / 513.0,
                -845.0 / 4104.0,
                0.0,
                0.0,
            ],
            [
                -8.0 / 27.0,
                2.0,
                -3544.0 / 2565.0,
                1859.0 / 4104.0,
                -11.0 / 40.0,
                0.0,
            ],
        ];
        let c = [0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0];
        let b = [
            16.0 / 135.0,
            0.0,
            6656.0 / 12825.0,
            28561.0 / 56430.0,
            -9.0 / 50.0,
            2.0 / 55.0,
        ];

        let t = self.t;
        let y = &self.y;
        let f = &self.f;
        let h = self.h;

        let mut k = vec![DVector::zeros(y.len()); 6];

        k[0] = h * f(t, y);
        for i in 1..6 {
            let mut y_temp = y.clone();
            for j in 0..i {
                y_temp += a[i][j] * &k[j];
            }
            k[i] = h * f(t + c[i] * h, &y_temp);
        }

        let mut y_next = y.clone();
        for i in 0..6 {
            y_next += b[i] * &k[i];
        }

        self.t = t + h;
        self.y = y_next;
        self.y.iter().all(|v| v.is_finite())
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          TESTS
///////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests_rk_api {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    #[test]
    fn test_RK4_api_simple_linear_ode() {
        // Test: y' = -y, y(0) = 1
        // Exact solution: y(t) = exp(-t)
        let rhs: RhsFn = Box::new(|_t, y| DVector::from_vec(vec![-y[0]]));
        let y0 = DVector::from_vec(vec![1.0]);

        let mut solver = odeIntegrator::new(
            rhs,
            vec!["y".to_string()],
            "t".to_string(),
            "RK4".to_string(),
            0.0,
            y0,
            1.0,
            1e-3,
        );
        solver.solve();
        let (t_result, y_result) = solver.get_result();

        assert!(t_result.len() > 0);
        assert!(y_result.nrows() > 0);

        let final_y = y_result[(y_result.nrows() - 1, 0)];
        let expected = (-1.0_f64).exp();
        assert_relative_eq!(final_y, expected, epsilon = 1e-2);
    }

    #[test]
    fn test_RKF45_api_harmonic_oscillator() {
        // Test: y1' = y2, y2' = -y1 (harmonic oscillator)
        // Exact solution: y1(t) = cos(t), y2(t) = -sin(t)
        let rhs: RhsFn = Box::new(|_t, y| DVector::from_vec(vec![y[1], -y[0]]));
        let y0 = DVector::from_vec(vec![1.0, 0.0]);

        let mut solver = odeIntegrator::new(
            rhs,
            vec!["y1".to_string(), "y2".to_string()],
            "t".to_string(),
            "RKF45".to_string(),
            0.0,
            y0,
            std::f64::consts::PI / 2.0,
            1e-3,
        );
        solver.solve();
        let (t_result, y_result) = solver.get_result();

        // compare with the exact solution throughout the integration
        for (t, y_row) in t_result.iter().zip(y_result.row_iter()) {
            assert_relative_eq!(y_row[0], t.cos(), epsilon = 1e-2);
            assert_relative_eq!(y_row[1], -t.sin(), epsilon = 1e-2);
        }
    }

    #[test]
    fn test_solve_on_grid_exponential_growth() {
        // Test: y' = y, y(0) = 1; exact solution y(t) = exp(t)
        let (t, y) = solve_on_grid(
            |_t, y: &DVector<f64>| DVector::from_vec(vec![y[0]]),
            &DVector::from_vec(vec![1.0]),
            0.0,
            1e-3,
            11,
            50,
        )
        .unwrap();

        assert_eq!(t.len(), 11);
        assert_eq!(y.nrows(), 11);
        for k in 0..11 {
            assert_relative_eq!(t[k], 0.05 * k as f64, epsilon = 1e-10);
            assert_relative_eq!(y[(k, 0)], t[k].exp(), epsilon = 1e-8);
        }
    }

    #[test]
    fn test_solve_on_grid_detects_divergence() {
        // y' = y^2, y(0) = 1 blows up at t = 1
        let result = solve_on_grid(
            |_t, y: &DVector<f64>| DVector::from_vec(vec![y[0] * y[0]]),
            &DVector::from_vec(vec![1.0]),
            0.0,
            0.01,
            300,
            1,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_rk4_step_matches_rkf45() {
        // both schemes should agree to high order on a smooth problem
        let rhs = |_t: f64, y: &DVector<f64>| DVector::from_vec(vec![y[1], -y[0]]);
        let y0 = DVector::from_vec(vec![1.0, 0.0]);

        let y_rk4 = rk4_step(&rhs, 0.0, &y0, 0.01);

        let mut rkf45 = RKF45::new();
        rkf45.set_initial(
            Box::new(|_t, y| DVector::from_vec(vec![y[1], -y[0]])),
            y0,
            0.0,
            0.01,
        );
        rkf45._step_impl();

        assert_relative_eq!(y_rk4[0], rkf45.y[0], epsilon = 1e-9);
        assert_relative_eq!(y_rk4[1], rkf45.y[1], epsilon = 1e-9);
    }
}
