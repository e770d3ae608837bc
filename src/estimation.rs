//! the three parameter-estimation pipelines and their shared plumbing:
//! reference data generation, noise injection, comparison reporting
/// synthetic observations: simulate with true parameters, add gaussian noise
pub mod synthetic;
/// pretty-printed comparison of true vs estimated parameters
pub mod report;
/// forced damped pendulum: recover damping, drive amplitude and drive frequency
pub mod pendulum_fit;
/// double pendulum: recover both rod lengths
pub mod double_pendulum_fit;
/// SIR epidemic: recover infection and recovery rates
pub mod sir_fit;
