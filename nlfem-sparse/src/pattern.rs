use nalgebra::{DMatrix, RealField};
use nalgebra_sparse::pattern::{SparsityPattern, SparsityPatternFormatError};
use nalgebra_sparse::CsrMatrix;
use std::collections::BTreeSet;

/// Builds the sparsity pattern coupling every pair of degrees of freedom that share an element.
///
/// `element_dofs` yields the global degrees of freedom of each element.
pub fn assemble_pattern<'a>(
    num_dofs: usize,
    element_dofs: impl IntoIterator<Item = &'a [usize]>,
) -> Result<SparsityPattern, SparsityPatternFormatError> {
    // Collecting into a BTreeSet stores each matrix entry exactly once, already sorted by row
    // and then by column.
    let mut matrix_entries = BTreeSet::new();
    for dofs in element_dofs {
        for &i in dofs {
            for &j in dofs {
                matrix_entries.insert((i, j));
            }
        }
    }

    let mut offsets = Vec::with_capacity(num_dofs + 1);
    let mut column_indices = Vec::with_capacity(matrix_entries.len());

    offsets.push(0);
    for (i, j) in matrix_entries {
        while i + 1 > offsets.len() {
            // Run in a loop to correctly handle consecutive empty rows
            offsets.push(column_indices.len());
        }
        column_indices.push(j);
    }

    // Fill out the remaining offsets if the last rows are empty
    while offsets.len() < (num_dofs + 1) {
        offsets.push(column_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(num_dofs, num_dofs, offsets, column_indices)
}

/// Creates a CSR matrix with the given pattern and all stored values set to zero.
pub fn zeros_with_pattern<T: RealField + Copy>(pattern: SparsityPattern) -> CsrMatrix<T> {
    let nnz = pattern.nnz();
    CsrMatrix::try_from_pattern_and_values(pattern, vec![T::zero(); nnz])
        .expect("Number of values always matches the pattern")
}

/// Adds the element matrix `local` to the rows and columns `dofs` of `matrix`.
///
/// Panics if an entry is missing from the sparsity pattern of `matrix`.
pub fn add_element_matrix_to_csr<T: RealField + Copy>(matrix: &mut CsrMatrix<T>, dofs: &[usize], local: &DMatrix<T>) {
    assert_eq!(local.nrows(), dofs.len());
    assert_eq!(local.ncols(), dofs.len());
    for (local_row, &global_row) in dofs.iter().enumerate() {
        let mut row = matrix.row_mut(global_row);
        let (cols, values) = row.cols_and_values_mut();
        for (local_col, &global_col) in dofs.iter().enumerate() {
            let idx = cols
                .binary_search(&global_col)
                .expect("Could not find column index associated with dof in CSR row");
            values[idx] += local[(local_row, local_col)];
        }
    }
}
