use crate::discretization::FiniteElementDiscretization;
use nalgebra::DVector;
use std::fmt;
use std::fmt::Debug;

/// A condition imposing the values of some degrees of freedom.
pub trait DirichletBoundaryCondition: Debug + Send {
    /// The constrained degrees of freedom.
    fn degrees_of_freedom(&self) -> &[usize];

    /// Writes the imposed values at time `t` into the constrained entries of `u`.
    fn update_imposed_values(&self, u: &mut DVector<f64>, t: f64);
}

/// Imposes the same time-dependent value on one component of all the nodes of a boundary.
pub struct UniformDirichletBoundaryCondition {
    dofs: Vec<usize>,
    value: Box<dyn Fn(f64) -> f64 + Send>,
}

impl Debug for UniformDirichletBoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformDirichletBoundaryCondition")
            .field("dofs", &self.dofs)
            .finish_non_exhaustive()
    }
}

impl UniformDirichletBoundaryCondition {
    /// Imposes `value(t)` on the given component of the nodes of `boundary`.
    pub fn new(
        fed: &FiniteElementDiscretization,
        boundary: usize,
        component: usize,
        value: impl Fn(f64) -> f64 + Send + 'static,
    ) -> eyre::Result<Self> {
        Ok(Self {
            dofs: fed.boundary_dofs(boundary, component)?,
            value: Box::new(value),
        })
    }

    pub fn with_value(fed: &FiniteElementDiscretization, boundary: usize, component: usize, value: f64) -> eyre::Result<Self> {
        Self::new(fed, boundary, component, move |_| value)
    }

    /// Fixes the component to zero.
    pub fn fixed(fed: &FiniteElementDiscretization, boundary: usize, component: usize) -> eyre::Result<Self> {
        Self::with_value(fed, boundary, component, 0.0)
    }
}

impl DirichletBoundaryCondition for UniformDirichletBoundaryCondition {
    fn degrees_of_freedom(&self) -> &[usize] {
        &self.dofs
    }

    fn update_imposed_values(&self, u: &mut DVector<f64>, t: f64) {
        let value = (self.value)(t);
        for &dof in &self.dofs {
            u[dof] = value;
        }
    }
}
