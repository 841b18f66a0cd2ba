//! Elimination of imposed degrees of freedom from linear systems.
use nalgebra::DVectorViewMut;
use nalgebra_sparse::CsrMatrix;

/// Zeroes the rows and columns of `matrix` associated with `dofs`.
///
/// The diagonal entries of the eliminated rows are set to the magnitude of the first non-zero
/// diagonal entry of `matrix` (1 if there is none), so that they remain of the same order as
/// the rest of the operator. Diagonal entries missing from the pattern are not inserted.
pub fn apply_dirichlet_elimination_csr(matrix: &mut CsrMatrix<f64>, dofs: &[usize]) {
    let scale = matrix
        .diagonal_as_csr()
        .values()
        .iter()
        .find(|&&d| d != 0.0)
        .map_or(1.0, |d| d.abs());

    let mut constrained = vec![false; matrix.nrows()];
    for &dof in dofs {
        constrained[dof] = true;
    }

    for (i, mut row) in matrix.row_iter_mut().enumerate() {
        let (cols, values) = row.cols_and_values_mut();
        if constrained[i] {
            for (&j, a_ij) in cols.iter().zip(values) {
                *a_ij = if i == j { scale } else { 0.0 };
            }
        } else {
            for (&j, a_ij) in cols.iter().zip(values) {
                if constrained[j] {
                    *a_ij = 0.0;
                }
            }
        }
    }
}

/// Zeroes the entries of `rhs` associated with `dofs`.
pub fn apply_dirichlet_elimination_rhs<'a>(rhs: impl Into<DVectorViewMut<'a, f64>>, dofs: &[usize]) {
    let mut rhs = rhs.into();
    for &dof in dofs {
        rhs[dof] = 0.0;
    }
}
