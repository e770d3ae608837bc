use nalgebra::DVector;

/// Forced damped pendulum
/// theta'' = -(g/l)*sin(theta) - b*theta' + a*cos(omega_d*t)
/// state vector y = [theta, omega]
///
/// g and l are known constants of the experiment; the unknowns recovered from
/// data are the damping b, the drive amplitude a and the drive frequency omega_d.
#[derive(Debug, Clone, Copy)]
pub struct ForcedPendulum {
    pub g: f64,
    pub l: f64,
    pub b: f64,
    pub a: f64,
    pub omega_d: f64,
}

impl ForcedPendulum {
    pub fn new(b: f64, a: f64, omega_d: f64) -> Self {
        ForcedPendulum {
            g: 9.81,
            l: 1.0,
            b,
            a,
            omega_d,
        }
    }
    /// candidate parameter vector [b, a, omega_d], known g and l kept
    pub fn from_params(p: &DVector<f64>) -> Self {
        ForcedPendulum::new(p[0], p[1], p[2])
    }

    pub fn params(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.b, self.a, self.omega_d])
    }

    pub fn rhs(&self, t: f64, y: &DVector<f64>) -> DVector<f64> {
        let theta = y[0];
        let omega = y[1];
        let domega =
            -(self.g / self.l) * theta.sin() - self.b * omega + self.a * (self.omega_d * t).cos();
        DVector::from_vec(vec![omega, domega])
    }

    /// total energy per unit mass of the conservative part (b = 0, a = 0);
    /// constant along trajectories of the unforced, undamped pendulum
    pub fn energy(&self, y: &DVector<f64>) -> f64 {
        let theta = y[0];
        let omega = y[1];
        0.5 * self.l * self.l * omega * omega - self.g * self.l * theta.cos()
    }
}

#[cfg(test)]
mod tests_pendulum {
    use super::*;
    use crate::numerical::RK_api::solve_on_grid;
    use approx::assert_relative_eq;

    #[test]
    fn test_unforced_undamped_conserves_energy() {
        // b = 0, a = 0: the pendulum is conservative
        let model = ForcedPendulum::new(0.0, 0.0, 1.0);
        let y0 = DVector::from_vec(vec![0.7, 0.0]);
        let e0 = model.energy(&y0);

        let (_t, y) = solve_on_grid(|t, y| model.rhs(t, y), &y0, 0.0, 1e-3, 101, 50)
            .expect("pendulum trajectory must stay finite");
        for k in 0..y.nrows() {
            let yk = DVector::from_vec(vec![y[(k, 0)], y[(k, 1)]]);
            assert_relative_eq!(model.energy(&yk), e0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_small_angle_period() {
        // for small amplitudes the period approaches 2*pi*sqrt(l/g)
        let model = ForcedPendulum::new(0.0, 0.0, 1.0);
        let y0 = DVector::from_vec(vec![0.01, 0.0]);
        let period = 2.0 * std::f64::consts::PI * (model.l / model.g).sqrt();

        // integrate exactly one period and come back to the start
        let n_out = 201;
        let h = period / ((n_out - 1) as f64 * 10.0);
        let (_t, y) = solve_on_grid(|t, y| model.rhs(t, y), &y0, 0.0, h, n_out, 10)
            .expect("pendulum trajectory must stay finite");
        let theta_end = y[(n_out - 1, 0)];
        assert_relative_eq!(theta_end, y0[0], epsilon = 1e-5);
    }

    #[test]
    fn test_damping_removes_energy() {
        let model = ForcedPendulum::new(0.5, 0.0, 1.0);
        let y0 = DVector::from_vec(vec![0.7, 0.0]);
        let e0 = model.energy(&y0);

        let (_t, y) = solve_on_grid(|t, y| model.rhs(t, y), &y0, 0.0, 1e-3, 11, 500)
            .expect("pendulum trajectory must stay finite");
        let y_end = DVector::from_vec(vec![y[(10, 0)], y[(10, 1)]]);
        assert!(model.energy(&y_end) < e0);
    }
}
