/// Fixed-step explicit Runge-Kutta solvers (RK4 and Fehlberg RKF45) with a common
/// integrator api
/// Example#1
/// ```
///    use RustedDynFit::numerical::RK_api::odeIntegrator;
///    use nalgebra::DVector;
///    // y' = -y, y(0) = 1
///    let rhs = Box::new(|_t: f64, y: &DVector<f64>| DVector::from_vec(vec![-y[0]]));
///    let mut solver = odeIntegrator::new(
///        rhs,
///        vec!["y".to_string()],
///        "t".to_string(),
///        "RK4".to_string(),
///        0.0,
///        DVector::from_vec(vec![1.0]),
///        1.0,
///        1e-3,
///    );
///    solver.solve();
///    let (_t, y) = solver.get_result();
///    assert!((y[(y.nrows() - 1, 0)] - (-1.0f64).exp()).abs() < 1e-2);
/// ```
pub mod RK_api;
/// real-coded genetic algorithm: tournament selection, blend crossover, gaussian
/// mutation, elitism; fitness evaluation is parallel over the population
pub mod GA;
/// Levenberg-Marquardt curve fitting with finite-difference jacobian, for models
/// that are simulations rather than closed-form expressions
pub mod LM_fitting;
/// shared helpers of the fitting modules: residual norms, finite differences, R^2
pub mod LM_utils;
