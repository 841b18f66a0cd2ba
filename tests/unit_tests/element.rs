use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use nlfem::element::{evaluate_basis_at, ElementType};
use nlfem::quadrature::default_rule;

const ELEMENT_TYPES: [ElementType; 4] = [ElementType::Tri3, ElementType::Quad4, ElementType::Tet4, ElementType::Hex8];

#[test]
fn basis_is_a_partition_of_unity() {
    for element_type in ELEMENT_TYPES {
        let rule = default_rule(element_type);
        let xi = rule.point(0);
        let values = element_type.evaluate_basis(xi);
        assert_eq!(values.len(), element_type.number_of_nodes());
        assert_scalar_eq!(values.sum(), 1.0, comp = abs, tol = 1e-14);

        let gradients = element_type.gradients(xi);
        assert_eq!(gradients.nrows(), element_type.reference_dimension());
        assert_eq!(gradients.ncols(), element_type.number_of_nodes());
        for row in gradients.row_iter() {
            assert_scalar_eq!(row.sum(), 0.0, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn quad4_basis_is_nodal() {
    let vertices = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
    for (i, xi) in vertices.iter().enumerate() {
        let values = ElementType::Quad4.evaluate_basis(xi);
        let mut expected = DVector::zeros(4);
        expected[i] = 1.0;
        assert_matrix_eq!(values, expected, comp = abs, tol = 1e-14);
    }
}

#[test]
fn physical_gradients_of_scaled_quad() {
    // Rectangle [0, 2] x [0, 1]
    #[rustfmt::skip]
    let x = DMatrix::from_row_slice(2, 4, &[0.0, 2.0, 2.0, 0.0,
                                            0.0, 0.0, 1.0, 1.0]);
    let evaluation = evaluate_basis_at(ElementType::Quad4, &x, &[0.0, 0.0]).unwrap();
    assert_scalar_eq!(evaluation.jacobian_determinant, 0.5, comp = abs, tol = 1e-14);
    assert_matrix_eq!(evaluation.position, DVector::from_column_slice(&[1.0, 0.5]), comp = abs, tol = 1e-14);

    // The gradient of the interpolant of u(x, y) = 3x - y is exact
    let u = DVector::from_iterator(4, x.column_iter().map(|p| 3.0 * p[0] - p[1]));
    let grad = &evaluation.gradients * u;
    assert_matrix_eq!(grad, DVector::from_column_slice(&[3.0, -1.0]), comp = abs, tol = 1e-13);
}

#[test]
fn inverted_element_is_rejected() {
    // Clockwise ordering
    #[rustfmt::skip]
    let x = DMatrix::from_row_slice(2, 4, &[0.0, 0.0, 1.0, 1.0,
                                            0.0, 1.0, 1.0, 0.0]);
    assert!(evaluate_basis_at(ElementType::Quad4, &x, &[0.0, 0.0]).is_none());
}

#[test]
fn hex8_volume() {
    let x = DMatrix::from_fn(3, 8, |i, j| {
        let corners = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 2.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 3.0],
            [1.0, 0.0, 3.0],
            [1.0, 2.0, 3.0],
            [0.0, 2.0, 3.0],
        ];
        corners[j][i]
    });
    let rule = default_rule(ElementType::Hex8);
    let volume: f64 = (0..rule.number_of_points())
        .map(|q| {
            let evaluation = evaluate_basis_at(ElementType::Hex8, &x, rule.point(q)).unwrap();
            rule.weight(q) * evaluation.jacobian_determinant
        })
        .sum();
    assert_scalar_eq!(volume, 6.0, comp = abs, tol = 1e-13);
}
