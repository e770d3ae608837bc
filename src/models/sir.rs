use nalgebra::DVector;

/// SIR compartmental epidemic model in population fractions
/// s' = -beta*s*i
/// i' =  beta*s*i - gamma*i
/// r' =  gamma*i
/// state vector y = [s, i, r]; s + i + r is conserved by the dynamics.
///
/// both rates are unknown and recovered from data.
#[derive(Debug, Clone, Copy)]
pub struct SirModel {
    pub beta: f64,
    pub gamma: f64,
}

impl SirModel {
    pub fn new(beta: f64, gamma: f64) -> Self {
        SirModel { beta, gamma }
    }
    /// candidate parameter vector [beta, gamma]
    pub fn from_params(p: &DVector<f64>) -> Self {
        SirModel::new(p[0], p[1])
    }

    pub fn params(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.beta, self.gamma])
    }

    /// basic reproduction number
    pub fn r0(&self) -> f64 {
        self.beta / self.gamma
    }

    pub fn rhs(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
        let s = y[0];
        let i = y[1];
        let infection = self.beta * s * i;
        let recovery = self.gamma * i;
        DVector::from_vec(vec![-infection, infection - recovery, recovery])
    }
}

#[cfg(test)]
mod tests_sir {
    use super::*;
    use crate::numerical::RK_api::solve_on_grid;
    use approx::assert_relative_eq;

    #[test]
    fn test_population_is_conserved() {
        let model = SirModel::new(0.3, 0.1);
        let y0 = DVector::from_vec(vec![0.997, 0.003, 0.0]);
        let (_t, y) = solve_on_grid(|t, y| model.rhs(t, y), &y0, 0.0, 0.1, 161, 10)
            .expect("SIR trajectory must stay finite");
        for k in 0..y.nrows() {
            let total = y[(k, 0)] + y[(k, 1)] + y[(k, 2)];
            assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_epidemic_grows_when_r0_above_one() {
        let model = SirModel::new(0.3, 0.1);
        assert_relative_eq!(model.r0(), 3.0, epsilon = 1e-12);

        let y0 = DVector::from_vec(vec![0.997, 0.003, 0.0]);
        let (_t, y) = solve_on_grid(|t, y| model.rhs(t, y), &y0, 0.0, 0.1, 161, 10)
            .expect("SIR trajectory must stay finite");

        // infected fraction rises above its initial value, peaks, then decays
        let i_max = (0..y.nrows()).map(|k| y[(k, 1)]).fold(0.0, f64::max);
        assert!(i_max > 0.1);
        let i_end = y[(y.nrows() - 1, 1)];
        assert!(i_end < i_max / 2.0);
    }

    #[test]
    fn test_epidemic_dies_out_when_r0_below_one() {
        let model = SirModel::new(0.05, 0.1);
        let y0 = DVector::from_vec(vec![0.95, 0.05, 0.0]);
        let (_t, y) = solve_on_grid(|t, y| model.rhs(t, y), &y0, 0.0, 0.1, 161, 10)
            .expect("SIR trajectory must stay finite");
        // infected fraction decays monotonically
        for k in 1..y.nrows() {
            assert!(y[(k, 1)] <= y[(k - 1, 1)] + 1e-12);
        }
    }
}
