//! Dispatch of the integration over the material regions of a discretization.
use crate::behaviour_integrator::{BehaviourIntegrator, BehaviourIntegratorFactory};
use crate::context::ExecutionContext;
use crate::discretization::FiniteElementDiscretization;
use crate::material::Material;
use crate::quadrature_space::PartialQuadratureSpace;
use eyre::eyre;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use nlfem_behaviour::{Behaviour, Hypothesis, IntegrationFailure, IntegrationType};
use nlfem_sparse::pattern::{add_element_matrix_to_csr, assemble_pattern, zeros_with_pattern};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Global residual and Jacobian of the discrete equilibrium.
///
/// The sparsity pattern of the Jacobian couples the degrees of freedom of every element of the
/// mesh, whatever the partition, so that all partitions share the same pattern.
#[derive(Debug, Clone)]
pub struct LinearizedSystem {
    pub residual: DVector<f64>,
    pub jacobian: CsrMatrix<f64>,
}

impl LinearizedSystem {
    pub fn new(fed: &FiniteElementDiscretization) -> eyre::Result<Self> {
        let n = fed.number_of_dofs();
        let element_dofs: Vec<Vec<usize>> = (0..fed.mesh().number_of_cells())
            .map(|e| fed.element_dofs(e))
            .collect();
        let pattern = assemble_pattern(n, element_dofs.iter().map(Vec::as_slice))
            .map_err(|err| eyre!("failed to build the sparsity pattern: {}", err))?;
        Ok(Self {
            residual: DVector::zeros(n),
            jacobian: zeros_with_pattern(pattern),
        })
    }

    pub fn number_of_dofs(&self) -> usize {
        self.residual.len()
    }

    /// Sets the residual and all stored Jacobian values to zero.
    pub fn clear(&mut self) {
        self.residual.fill(0.0);
        self.jacobian.values_mut().fill(0.0);
    }
}

/// Owns one behaviour integrator per material region and integrates them element by element.
#[derive(Debug)]
pub struct MultiMaterialNonLinearIntegrator {
    fed: Arc<FiniteElementDiscretization>,
    hypothesis: Hypothesis,
    context: Arc<dyn ExecutionContext>,
    integrators: BTreeMap<usize, Box<dyn BehaviourIntegrator>>,
    ue: DVector<f64>,
    fe: DVector<f64>,
    ke: DMatrix<f64>,
    dofs: Vec<usize>,
}

impl MultiMaterialNonLinearIntegrator {
    pub fn new(
        fed: Arc<FiniteElementDiscretization>,
        hypothesis: Hypothesis,
        context: Arc<dyn ExecutionContext>,
    ) -> Self {
        Self {
            fed,
            hypothesis,
            context,
            integrators: BTreeMap::new(),
            ue: DVector::zeros(0),
            fe: DVector::zeros(0),
            ke: DMatrix::zeros(0, 0),
            dofs: Vec::new(),
        }
    }

    pub fn finite_element_discretization(&self) -> &Arc<FiniteElementDiscretization> {
        &self.fed
    }

    pub fn hypothesis(&self) -> Hypothesis {
        self.hypothesis
    }

    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    /// Creates the integrator named `name` for the material region `material_id`.
    ///
    /// Fails if the region already has an integrator, if no integrator has this name or if the
    /// behaviour does not match the modelling hypothesis.
    pub fn add_behaviour_integrator(
        &mut self,
        name: &str,
        material_id: usize,
        behaviour: Box<dyn Behaviour>,
    ) -> eyre::Result<()> {
        if self.integrators.contains_key(&material_id) {
            return Err(eyre!("a behaviour integrator is already defined for material {}", material_id));
        }
        if behaviour.hypothesis() != self.hypothesis {
            return Err(eyre!(
                "behaviour '{}' is defined for the hypothesis '{}', but the hypothesis '{}' is required",
                behaviour.name(),
                behaviour.hypothesis(),
                self.hypothesis
            ));
        }
        let quadrature_space = Arc::new(PartialQuadratureSpace::with_default_rules(&self.fed, material_id));
        debug!(
            "Material {}: {} elements, {} integration points on partition {}",
            material_id,
            quadrature_space.number_of_elements(),
            quadrature_space.number_of_integration_points(),
            self.context.rank()
        );
        let material = Material::new(quadrature_space, behaviour);
        let integrator =
            BehaviourIntegratorFactory::global().generate(name, Arc::clone(&self.fed), self.hypothesis, material)?;
        integrator.check_hypotheses(self.hypothesis)?;
        self.integrators.insert(material_id, integrator);
        Ok(())
    }

    pub fn has_behaviour_integrator(&self, material_id: usize) -> bool {
        self.integrators.contains_key(&material_id)
    }

    /// Identifiers of the materials with an integrator, in increasing order.
    pub fn material_identifiers(&self) -> impl Iterator<Item = usize> + '_ {
        self.integrators.keys().copied()
    }

    /// Attributes of the elements of this partition whose material has no integrator, in
    /// increasing order. Such elements contribute nothing to the assembled system.
    pub fn materials_without_integrator(&self) -> Vec<usize> {
        self.fed
            .elements()
            .map(|element| self.fed.material_attribute(element))
            .filter(|material_id| !self.integrators.contains_key(material_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn behaviour_integrator(&self, material_id: usize) -> Option<&dyn BehaviourIntegrator> {
        self.integrators
            .get(&material_id)
            .map(|integrator| integrator.as_ref())
    }

    pub fn material(&self, material_id: usize) -> Option<&Material> {
        self.integrators
            .get(&material_id)
            .map(|integrator| integrator.material())
    }

    pub fn material_mut(&mut self, material_id: usize) -> Option<&mut Material> {
        self.integrators
            .get_mut(&material_id)
            .map(|integrator| integrator.material_mut())
    }

    pub fn set_time_increment(&mut self, dt: f64) {
        for integrator in self.integrators.values_mut() {
            integrator.set_time_increment(dt);
        }
    }

    pub fn update(&mut self) {
        for integrator in self.integrators.values_mut() {
            integrator.update();
        }
    }

    pub fn revert(&mut self) {
        for integrator in self.integrators.values_mut() {
            integrator.revert();
        }
    }

    /// Integrates all behaviours for the unknowns `u` and assembles the residual, and the
    /// Jacobian if `integration_type` requires a tangent operator, into `system`.
    ///
    /// Returns `true` only if the integration succeeded on every partition. The assembled
    /// quantities are summed over the partitions only in that case; otherwise `system` is left in
    /// an unspecified state.
    pub fn integrate(
        &mut self,
        u: &DVector<f64>,
        integration_type: IntegrationType,
        system: &mut LinearizedSystem,
    ) -> bool {
        system.clear();
        if self.integrators.is_empty() {
            return true;
        }

        let local_success = match self.integrate_local(u, integration_type, system) {
            Ok(()) => true,
            Err(failure) => {
                warn!("Partition {}: {}", self.context.rank(), failure);
                false
            }
        };
        let success = self.context.all_reduce_and(local_success);
        if success && self.context.size() > 1 {
            self.context.all_reduce_sum(system.residual.as_mut_slice());
            if integration_type.requires_tangent_operator() {
                self.context.all_reduce_sum(system.jacobian.values_mut());
            }
        }
        success
    }

    fn integrate_local(
        &mut self,
        u: &DVector<f64>,
        integration_type: IntegrationType,
        system: &mut LinearizedSystem,
    ) -> Result<(), IntegrationFailure> {
        let with_tangent = integration_type.requires_tangent_operator();
        for element in self.fed.elements() {
            let Some(integrator) = self.integrators.get_mut(&self.fed.material_attribute(element)) else {
                continue;
            };
            self.fed.restrict(element, u, &mut self.ue);
            integrator.integrate(element, &self.ue, integration_type)?;
            integrator.compute_inner_forces(element, &mut self.fe)?;
            self.fed.populate_element_dofs(element, &mut self.dofs);
            for (&dof, &f) in self.dofs.iter().zip(self.fe.iter()) {
                system.residual[dof] += f;
            }
            if with_tangent {
                integrator.compute_stiffness_matrix(element, &mut self.ke)?;
                add_element_matrix_to_csr(&mut system.jacobian, &self.dofs, &self.ke);
            }
        }
        Ok(())
    }
}
