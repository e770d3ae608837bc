use crate::numerical::RK_api::solve_on_grid;
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// observation grid of an estimation experiment: the integrator runs with internal
/// step h and records every substeps-th point, so observations sit at
/// t_k = t0 + k*h*substeps, k = 0..n_out-1
#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    pub t0: f64,
    pub h: f64,
    pub substeps: usize,
    pub n_out: usize,
}

impl GridSpec {
    /// spacing of the observation grid
    pub fn dt(&self) -> f64 {
        self.h * self.substeps as f64
    }
    pub fn t_end(&self) -> f64 {
        self.t0 + self.dt() * (self.n_out - 1) as f64
    }
}

/// reference data of one experiment: clean simulated observations and their
/// noise-corrupted copy, both restricted to the observed state components
pub struct SyntheticData {
    pub t: DVector<f64>,
    pub clean: DMatrix<f64>,
    pub noisy: DMatrix<f64>,
}

/// simulate the model on the observation grid and keep only the observed columns
pub fn make_observations<F>(
    rhs: F,
    y0: &DVector<f64>,
    grid: &GridSpec,
    observed: &[usize],
) -> Option<(DVector<f64>, DMatrix<f64>)>
where
    F: Fn(f64, &DVector<f64>) -> DVector<f64>,
{
    let (t, y_full) = solve_on_grid(rhs, y0, grid.t0, grid.h, grid.n_out, grid.substeps)?;
    Some((t, select_columns(&y_full, observed)))
}

pub fn select_columns(matrix: &DMatrix<f64>, columns: &[usize]) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(matrix.nrows(), columns.len());
    for (jj, &j) in columns.iter().enumerate() {
        for i in 0..matrix.nrows() {
            out[(i, jj)] = matrix[(i, j)];
        }
    }
    out
}

/// stack the columns of an observation matrix into one residual-shaped vector
pub fn flatten_columns(matrix: &DMatrix<f64>) -> DVector<f64> {
    let mut out = DVector::zeros(matrix.nrows() * matrix.ncols());
    let mut k = 0;
    for j in 0..matrix.ncols() {
        for i in 0..matrix.nrows() {
            out[k] = matrix[(i, j)];
            k += 1;
        }
    }
    out
}

/// add i.i.d. gaussian noise N(0, sigma^2) to every entry; a fixed seed makes the
/// corruption reproducible
pub fn add_gaussian_noise(clean: &DMatrix<f64>, sigma: f64, seed: u64) -> DMatrix<f64> {
    assert!(
        sigma >= 0.0 && sigma.is_finite(),
        "noise sigma must be non-negative and finite"
    );
    if sigma == 0.0 {
        return clean.clone();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).expect("gaussian noise distribution");
    clean.map(|v| v + normal.sample(&mut rng))
}

#[cfg(test)]
mod tests_synthetic {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_spec_spacing() {
        let grid = GridSpec {
            t0: 0.0,
            h: 0.01,
            substeps: 10,
            n_out: 201,
        };
        assert_relative_eq!(grid.dt(), 0.1, epsilon = 1e-14);
        assert_relative_eq!(grid.t_end(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_select_and_flatten_columns() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let picked = select_columns(&m, &[0, 2]);
        assert_eq!(picked.nrows(), 2);
        assert_eq!(picked.ncols(), 2);
        assert_relative_eq!(picked[(1, 1)], 6.0, epsilon = 1e-14);

        let flat = flatten_columns(&picked);
        assert_eq!(flat.len(), 4);
        // column-stacked: first column first
        assert_relative_eq!(flat[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(flat[1], 4.0, epsilon = 1e-14);
        assert_relative_eq!(flat[2], 3.0, epsilon = 1e-14);
        assert_relative_eq!(flat[3], 6.0, epsilon = 1e-14);
    }

    #[test]
    fn test_noise_is_reproducible_and_unbiased() {
        let clean = DMatrix::zeros(500, 2);
        let noisy1 = add_gaussian_noise(&clean, 0.1, 42);
        let noisy2 = add_gaussian_noise(&clean, 0.1, 42);
        assert_eq!(noisy1, noisy2);

        let n = (noisy1.nrows() * noisy1.ncols()) as f64;
        let mean = noisy1.iter().sum::<f64>() / n;
        let var = noisy1.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.02);
        assert!((var.sqrt() - 0.1).abs() < 0.02);
    }

    #[test]
    fn test_zero_sigma_returns_clean_data() {
        let clean = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let noisy = add_gaussian_noise(&clean, 0.0, 1);
        assert_eq!(noisy, clean);
    }
}
