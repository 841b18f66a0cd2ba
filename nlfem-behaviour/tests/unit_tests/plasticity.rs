use super::{integrate_point, single_point_state};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nlfem_behaviour::elasticity::{LameParameters, YoungPoisson};
use nlfem_behaviour::nalgebra::{DMatrix, DVector, DVectorView};
use nlfem_behaviour::plasticity::IsotropicLinearHardeningPlasticity;
use nlfem_behaviour::stensor::{deviator, von_mises_equivalent};
use nlfem_behaviour::{Behaviour, Hypothesis, IntegrationType};

fn behaviour() -> IsotropicLinearHardeningPlasticity {
    let young_poisson = YoungPoisson {
        young: 200e3,
        poisson: 0.3,
    };
    IsotropicLinearHardeningPlasticity::new(Hypothesis::Tridimensional, young_poisson, 200.0, 10e3)
}

#[test]
fn small_strain_stays_elastic() {
    let b = behaviour();
    let s0 = single_point_state(&b);
    let strain = [1e-4, 0.0, 0.0, 0.0, 0.0, 0.0];
    let (s1, tangent) =
        integrate_point(&b, &s0, &strain, IntegrationType::IntegrationWithConsistentTangentOperator).unwrap();

    assert_eq!(s1.internal_state_variables_at(0)[b.equivalent_plastic_strain_index()], 0.0);
    let lame = LameParameters::from(YoungPoisson {
        young: 200e3,
        poisson: 0.3,
    });
    let expected = lame.elastic_operator(6);
    assert_matrix_eq!(DMatrix::from_column_slice(6, 6, &tangent), expected, comp = abs, tol = 1e-6);
}

#[test]
fn plastic_state_lies_on_the_hardened_yield_surface() {
    let b = behaviour();
    let s0 = single_point_state(&b);
    let strain = [5e-3, -1e-3, -1e-3, 0.0, 0.0, 0.0];
    let (s1, _) = integrate_point(&b, &s0, &strain, IntegrationType::IntegrationWithConsistentTangentOperator).unwrap();

    let p = s1.internal_state_variables_at(0)[b.equivalent_plastic_strain_index()];
    assert!(p > 0.0);
    let sig = DVector::from_column_slice(s1.thermodynamic_forces_at(0));
    let seq = von_mises_equivalent(&deviator(&DVectorView::from(&sig)));
    assert_scalar_eq!(seq, b.yield_strength() + b.hardening_slope() * p, comp = abs, tol = 1e-8);
}

#[test]
fn consistent_tangent_matches_finite_differences() {
    let b = behaviour();
    let s0 = single_point_state(&b);
    let strain = [4e-3, -5e-4, -1e-3, 1e-3, 0.0, 2e-4];
    let (_, tangent) =
        integrate_point(&b, &s0, &strain, IntegrationType::IntegrationWithConsistentTangentOperator).unwrap();
    let tangent = DMatrix::from_column_slice(6, 6, &tangent);

    let h = 1e-8;
    let mut approx = DMatrix::zeros(6, 6);
    for j in 0..6 {
        let mut plus = strain;
        plus[j] += h;
        let mut minus = strain;
        minus[j] -= h;
        let (sp, _) = integrate_point(&b, &s0, &plus, IntegrationType::IntegrationWithoutTangentOperator).unwrap();
        let (sm, _) = integrate_point(&b, &s0, &minus, IntegrationType::IntegrationWithoutTangentOperator).unwrap();
        for i in 0..6 {
            approx[(i, j)] = (sp.thermodynamic_forces_at(0)[i] - sm.thermodynamic_forces_at(0)[i]) / (2.0 * h);
        }
    }
    let relative_error = (&tangent - &approx).norm() / tangent.norm();
    assert!(relative_error < 1e-5, "relative error {}", relative_error);
}

#[test]
fn integration_is_a_pure_function_of_the_inputs() {
    let b = behaviour();
    let s0 = single_point_state(&b);
    let strain = [5e-3, -1e-3, -1e-3, 0.0, 0.0, 0.0];
    let it = IntegrationType::IntegrationWithConsistentTangentOperator;
    let (first, k1) = integrate_point(&b, &s0, &strain, it).unwrap();
    let (second, k2) = integrate_point(&b, &s0, &strain, it).unwrap();
    assert_eq!(first, second);
    assert_eq!(k1, k2);
}

#[test]
fn internal_state_layout() {
    let b = behaviour();
    assert_eq!(b.internal_state_variables_size(), 7);
    assert_eq!(b.name(), "Plasticity");
}
