use nalgebra::RealField;

/// Calculus helper traits and numerical differentiation
pub mod calculus;
/// Newton solver with convergence criteria and line search strategies
pub mod newton;

pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
