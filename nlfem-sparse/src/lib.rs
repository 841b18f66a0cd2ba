//! Sparse matrix functionality and linear solvers for `nlfem`.
pub mod cg;
pub mod dirichlet;
pub mod pattern;
pub mod solvers;

pub use nalgebra_sparse;
pub use nalgebra_sparse::pattern::SparsityPattern;
pub use nalgebra_sparse::CsrMatrix;
