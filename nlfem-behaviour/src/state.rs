//! Storage of the state of a behaviour on a set of integration points.

/// Per-point values of a behaviour, stored contiguously point after point.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialStateManager {
    n: usize,
    gradients_stride: usize,
    thermodynamic_forces_stride: usize,
    internal_state_variables_stride: usize,
    /// Gradients (the strain for mechanical behaviours).
    pub gradients: Vec<f64>,
    /// Thermodynamic forces (the stress for mechanical behaviours).
    pub thermodynamic_forces: Vec<f64>,
    pub internal_state_variables: Vec<f64>,
}

impl MaterialStateManager {
    pub fn new(
        number_of_integration_points: usize,
        gradients_stride: usize,
        thermodynamic_forces_stride: usize,
        internal_state_variables_stride: usize,
    ) -> Self {
        let n = number_of_integration_points;
        Self {
            n,
            gradients_stride,
            thermodynamic_forces_stride,
            internal_state_variables_stride,
            gradients: vec![0.0; n * gradients_stride],
            thermodynamic_forces: vec![0.0; n * thermodynamic_forces_stride],
            internal_state_variables: vec![0.0; n * internal_state_variables_stride],
        }
    }

    pub fn number_of_integration_points(&self) -> usize {
        self.n
    }

    pub fn gradients_stride(&self) -> usize {
        self.gradients_stride
    }

    pub fn thermodynamic_forces_stride(&self) -> usize {
        self.thermodynamic_forces_stride
    }

    pub fn internal_state_variables_stride(&self) -> usize {
        self.internal_state_variables_stride
    }

    pub fn gradients_at(&self, ip: usize) -> &[f64] {
        let s = self.gradients_stride;
        &self.gradients[ip * s..(ip + 1) * s]
    }

    pub fn gradients_at_mut(&mut self, ip: usize) -> &mut [f64] {
        let s = self.gradients_stride;
        &mut self.gradients[ip * s..(ip + 1) * s]
    }

    pub fn thermodynamic_forces_at(&self, ip: usize) -> &[f64] {
        let s = self.thermodynamic_forces_stride;
        &self.thermodynamic_forces[ip * s..(ip + 1) * s]
    }

    pub fn internal_state_variables_at(&self, ip: usize) -> &[f64] {
        let s = self.internal_state_variables_stride;
        &self.internal_state_variables[ip * s..(ip + 1) * s]
    }

    /// Borrows the values of a single integration point.
    pub fn point(&self, ip: usize) -> PointState<'_> {
        assert!(ip < self.n, "integration point {} out of range ({} points)", ip, self.n);
        PointState {
            gradients: self.gradients_at(ip),
            thermodynamic_forces: self.thermodynamic_forces_at(ip),
            internal_state_variables: self.internal_state_variables_at(ip),
        }
    }

    /// Mutably borrows the values of a single integration point.
    pub fn point_mut(&mut self, ip: usize) -> PointStateMut<'_> {
        assert!(ip < self.n, "integration point {} out of range ({} points)", ip, self.n);
        let (g, f, v) = (
            self.gradients_stride,
            self.thermodynamic_forces_stride,
            self.internal_state_variables_stride,
        );
        PointStateMut {
            gradients: &mut self.gradients[ip * g..(ip + 1) * g],
            thermodynamic_forces: &mut self.thermodynamic_forces[ip * f..(ip + 1) * f],
            internal_state_variables: &mut self.internal_state_variables[ip * v..(ip + 1) * v],
        }
    }

    /// Copies all values of `other` into `self`. Both managers must have the same layout.
    pub fn copy_from(&mut self, other: &MaterialStateManager) {
        assert_eq!(self.n, other.n);
        self.gradients.copy_from_slice(&other.gradients);
        self.thermodynamic_forces
            .copy_from_slice(&other.thermodynamic_forces);
        self.internal_state_variables
            .copy_from_slice(&other.internal_state_variables);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PointState<'a> {
    pub gradients: &'a [f64],
    pub thermodynamic_forces: &'a [f64],
    pub internal_state_variables: &'a [f64],
}

#[derive(Debug)]
pub struct PointStateMut<'a> {
    pub gradients: &'a mut [f64],
    pub thermodynamic_forces: &'a mut [f64],
    pub internal_state_variables: &'a mut [f64],
}
