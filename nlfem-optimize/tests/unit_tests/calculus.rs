use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nlfem_optimize::calculus::*;
use std::error::Error;

#[test]
fn approximate_jacobian_simple_function() {
    let function = ClosureFunction::new(
        2,
        |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            let (x1, x2) = (x[0], x[1]);
            f[0] = x1 * x2 + 3.0;
            f[1] = x1 * x1 + x2 * x2 + x1 + 5.0;
            Ok(())
        },
    );

    let h = 1e-6;
    let x = DVector::from_column_slice(&[3.0, 4.0]);
    let j = approximate_jacobian(function, &x, &h).unwrap();

    // J = [   x2           x1 ]
    //     [ 2*x1 + 1     2*x2 ]
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(2, 2,
                                           &[4.0, 3.0,
                                             7.0, 8.0]);

    assert_matrix_eq!(j, expected, comp = abs, tol = 1e-6);
}

#[test]
fn approximate_jacobian_propagates_evaluation_failure() {
    let function = ClosureFunction::new(
        1,
        |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            if x[0] > 1.0 {
                return Err("outside of domain".into());
            }
            f[0] = x[0];
            Ok(())
        },
    );

    let x = DVector::from_column_slice(&[1.0]);
    assert!(approximate_jacobian(function, &x, &1e-3).is_err());
}

#[test]
fn default_prediction_leaves_point_untouched() {
    let mut function = ClosureFunction::new(
        2,
        |f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            f.copy_from(x);
            Ok(())
        },
    )
    .with_jacobian_solver(
        |sol: &mut DVectorViewMut<f64>, _x: &DVectorView<f64>, rhs: &DVectorView<f64>| -> Result<(), Box<dyn Error>> {
            sol.copy_from(rhs);
            Ok(())
        },
    );

    let mut x = DVector::from_column_slice(&[1.0, 2.0]);
    let predicted = function
        .predict(&mut DVectorViewMut::from(&mut x))
        .unwrap();
    assert!(!predicted);
    assert_eq!(x, DVector::from_column_slice(&[1.0, 2.0]));
}
