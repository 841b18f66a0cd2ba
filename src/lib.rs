//! Nonlinear evolution problems of small strain solid mechanics, discretized by finite elements.
//!
//! A [`NonLinearEvolutionProblem`](problem::NonLinearEvolutionProblem) couples a
//! [`FiniteElementDiscretization`](discretization::FiniteElementDiscretization) with behaviours
//! attached to the material regions of the mesh. Each time step is solved by Newton's method,
//! integrating the behaviours on every integration point at every iteration.
pub mod behaviour_factory;
pub mod behaviour_integrator;
pub mod boundary;
pub mod context;
pub mod discretization;
pub mod element;
pub mod linear_solver;
pub mod material;
pub mod mesh;
pub mod multi_material;
pub mod parameters;
pub mod post_processing;
pub mod problem;
pub mod quadrature;
pub mod quadrature_space;
pub mod runtime;

pub mod behaviour {
    pub use nlfem_behaviour::*;
}

pub mod optimize {
    pub use nlfem_optimize::*;
}

pub mod sparse {
    pub use nlfem_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
