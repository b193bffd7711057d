//! Fill-reducing orderings for the sparse KKT matrix.
//!
//! The KKT matrix is permuted once at setup; the permutation is then baked
//! into the data maps so every numeric factorization runs on the reordered
//! matrix without further index work.

use faer::dyn_stack::{MemBuffer, MemStack};
use faer::sparse::linalg::amd;
use faer::sparse::SymbolicSparseColMatRef;
use sprs::{CsMat, TriMat};

use crate::settings::KktOrdering;

/// Symmetric permutation of a square matrix.
///
/// `perm[new] = old` and `perm_inv[old] = new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    pub perm: Vec<usize>,
    pub perm_inv: Vec<usize>,
}

impl Permutation {
    /// Identity permutation of size n.
    pub fn identity(n: usize) -> Self {
        Self { perm: (0..n).collect(), perm_inv: (0..n).collect() }
    }

    /// Size of the permutation.
    pub fn len(&self) -> usize {
        self.perm.len()
    }

    /// True for the empty permutation.
    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }
}

/// Compute an ordering for a symmetric matrix given the coordinates of its
/// upper triangle.
pub fn compute_ordering(
    n: usize,
    upper_entries: &[(usize, usize)],
    method: KktOrdering,
) -> Permutation {
    if n == 0 {
        return Permutation::identity(0);
    }
    match method {
        KktOrdering::Natural => Permutation::identity(n),
        KktOrdering::Amd => approximate_minimum_degree(n, upper_entries),
        KktOrdering::ReverseCuthillMckee => reverse_cuthill_mckee(n, upper_entries),
    }
}

fn approximate_minimum_degree(n: usize, upper_entries: &[(usize, usize)]) -> Permutation {
    let mut tri = TriMat::new((n, n));
    for i in 0..n {
        tri.add_triplet(i, i, 1.0);
    }
    for &(r, c) in upper_entries {
        tri.add_triplet(r.min(c), r.max(c), 1.0);
    }
    let pattern: CsMat<f64> = tri.to_csc();

    // Keep indptr alive
    let indptr = pattern.indptr();
    let col_ptr = indptr.raw_storage();
    let row_idx = pattern.indices();
    let symbolic = SymbolicSparseColMatRef::new_checked(n, n, col_ptr, None, row_idx);

    let mut perm = vec![0usize; n];
    let mut perm_inv = vec![0usize; n];
    let mut mem = MemBuffer::new(amd::order_scratch::<usize>(n, row_idx.len()));
    match amd::order(
        &mut perm,
        &mut perm_inv,
        symbolic,
        amd::Control::default(),
        MemStack::new(&mut mem),
    ) {
        Ok(_) => Permutation { perm, perm_inv },
        Err(e) => {
            log::warn!("AMD ordering failed ({:?}), using natural order", e);
            Permutation::identity(n)
        }
    }
}

fn reverse_cuthill_mckee(n: usize, upper_entries: &[(usize, usize)]) -> Permutation {
    // RCM needs the full symmetric pattern.
    let mut tri = TriMat::new((n, n));
    for i in 0..n {
        tri.add_triplet(i, i, 1.0);
    }
    for &(r, c) in upper_entries {
        if r != c {
            tri.add_triplet(r, c, 1.0);
            tri.add_triplet(c, r, 1.0);
        }
    }
    let pattern: CsMat<f64> = tri.to_csc();
    let ordering = sprs::linalg::reverse_cuthill_mckee(pattern.view());
    let perm = ordering.perm.vec();
    let perm_inv = ordering.perm.inv_vec();
    Permutation { perm, perm_inv }
}
