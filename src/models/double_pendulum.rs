use nalgebra::DVector;

/// Double pendulum: two point masses m1, m2 on rigid massless rods l1, l2.
/// state vector y = [theta1, omega1, theta2, omega2], angles measured from the
/// downward vertical.
///
/// m1, m2 and g are known; the unknowns recovered from data are l1 and l2.
/// Small initial angles keep the motion in the regular regime, where the
/// estimation problem is well posed.
#[derive(Debug, Clone, Copy)]
pub struct DoublePendulum {
    pub m1: f64,
    pub m2: f64,
    pub l1: f64,
    pub l2: f64,
    pub g: f64,
}

impl DoublePendulum {
    pub fn new(l1: f64, l2: f64) -> Self {
        DoublePendulum {
            m1: 1.5,
            m2: 1.0,
            l1,
            l2,
            g: 9.81,
        }
    }
    /// candidate parameter vector [l1, l2], known masses and g kept
    pub fn from_params(p: &DVector<f64>) -> Self {
        DoublePendulum::new(p[0], p[1])
    }

    pub fn params(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.l1, self.l2])
    }

    pub fn rhs(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
        let (m1, m2, l1, l2, g) = (self.m1, self.m2, self.l1, self.l2, self.g);
        let theta1 = y[0];
        let omega1 = y[1];
        let theta2 = y[2];
        let omega2 = y[3];

        let d = theta1 - theta2;
        let den = 2.0 * m1 + m2 - m2 * (2.0 * d).cos();

        let domega1 = (-g * (2.0 * m1 + m2) * theta1.sin()
            - m2 * g * (theta1 - 2.0 * theta2).sin()
            - 2.0 * d.sin() * m2 * (omega2 * omega2 * l2 + omega1 * omega1 * l1 * d.cos()))
            / (l1 * den);

        let domega2 = (2.0
            * d.sin()
            * (omega1 * omega1 * l1 * (m1 + m2)
                + g * (m1 + m2) * theta1.cos()
                + omega2 * omega2 * l2 * m2 * d.cos()))
            / (l2 * den);

        DVector::from_vec(vec![omega1, domega1, omega2, domega2])
    }

    /// total mechanical energy; constant along trajectories
    pub fn energy(&self, y: &DVector<f64>) -> f64 {
        let (m1, m2, l1, l2, g) = (self.m1, self.m2, self.l1, self.l2, self.g);
        let theta1 = y[0];
        let omega1 = y[1];
        let theta2 = y[2];
        let omega2 = y[3];

        let kinetic = 0.5 * m1 * l1 * l1 * omega1 * omega1
            + 0.5
                * m2
                * (l1 * l1 * omega1 * omega1
                    + l2 * l2 * omega2 * omega2
                    + 2.0 * l1 * l2 * omega1 * omega2 * (theta1 - theta2).cos());
        let potential = -(m1 + m2) * g * l1 * theta1.cos() - m2 * g * l2 * theta2.cos();
        kinetic + potential
    }
}
