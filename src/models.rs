//! ODE models whose parameters are recovered from noisy observations.
/// forced damped pendulum: one angle, viscous damping, harmonic drive
pub mod pendulum;
/// double pendulum: two bobs, full nonlinear equations of motion
pub mod double_pendulum;
/// SIR compartmental epidemic model
pub mod sir;
