//! Primal-dual iterate and search direction.

use super::residuals::Metrics;
use crate::linalg::{dot, inf_norm};
use crate::problem::{has_lower, has_upper, INF};
use crate::result::SolveResult;

/// Variables with a finite lower or upper bound.
///
/// Box pair k of the lower family belongs to variable `lb[k]`, and likewise
/// for the upper family. Unbounded sides have no pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxIndex {
    pub lb: Vec<usize>,
    pub ub: Vec<usize>,
}

impl BoxIndex {
    pub fn from_bounds(x_lb: &[f64], x_ub: &[f64]) -> Self {
        Self {
            lb: (0..x_lb.len()).filter(|&i| has_lower(x_lb[i])).collect(),
            ub: (0..x_ub.len()).filter(|&i| has_upper(x_ub[i])).collect(),
        }
    }

    pub fn n_lb(&self) -> usize {
        self.lb.len()
    }

    pub fn n_ub(&self) -> usize {
        self.ub.len()
    }
}

/// Interior-point iterate.
#[derive(Debug, Clone, PartialEq)]
pub struct Iterate {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub s: Vec<f64>,
    pub z_lb: Vec<f64>,
    pub s_lb: Vec<f64>,
    pub z_ub: Vec<f64>,
    pub s_ub: Vec<f64>,
}

/// Newton direction; same layout as the iterate.
pub type Direction = Iterate;

impl Iterate {
    /// All-zero iterate.
    pub fn zeros(n: usize, p: usize, m: usize, boxes: &BoxIndex) -> Self {
        Self {
            x: vec![0.0; n],
            y: vec![0.0; p],
            z: vec![0.0; m],
            s: vec![0.0; m],
            z_lb: vec![0.0; boxes.n_lb()],
            s_lb: vec![0.0; boxes.n_lb()],
            z_ub: vec![0.0; boxes.n_ub()],
            s_ub: vec![0.0; boxes.n_ub()],
        }
    }

    /// Number of complementarity pairs.
    pub fn pair_count(&self) -> usize {
        self.s.len() + self.s_lb.len() + self.s_ub.len()
    }

    fn pairs(&self) -> [(&[f64], &[f64]); 3] {
        [
            (self.s.as_slice(), self.z.as_slice()),
            (self.s_lb.as_slice(), self.z_lb.as_slice()),
            (self.s_ub.as_slice(), self.z_ub.as_slice()),
        ]
    }

    /// Average complementarity; 0 without inequality or box pairs.
    pub fn mu(&self) -> f64 {
        let count = self.pair_count();
        if count == 0 {
            return 0.0;
        }
        self.pairs().iter().map(|(s, z)| dot(s, z)).sum::<f64>() / count as f64
    }

    /// Average complementarity after a step of length `alpha` along `dir`.
    pub fn mu_after_step(&self, dir: &Direction, alpha: f64) -> f64 {
        let count = self.pair_count();
        if count == 0 {
            return 0.0;
        }
        let mut total = 0.0;
        for ((s, z), (ds, dz)) in self.pairs().iter().zip(dir.pairs().iter()) {
            for i in 0..s.len() {
                total += (s[i] + alpha * ds[i]) * (z[i] + alpha * dz[i]);
            }
        }
        total / count as f64
    }

    /// Largest step in [0, 1] keeping every slack and dual nonnegative.
    pub fn max_step(&self, dir: &Direction) -> f64 {
        let mut alpha = 1.0_f64;
        let families = [
            (&self.s, &dir.s),
            (&self.z, &dir.z),
            (&self.s_lb, &dir.s_lb),
            (&self.z_lb, &dir.z_lb),
            (&self.s_ub, &dir.s_ub),
            (&self.z_ub, &dir.z_ub),
        ];
        for (v, dv) in families {
            for (&vi, &dvi) in v.iter().zip(dv.iter()) {
                if dvi < 0.0 {
                    alpha = alpha.min(-vi / dvi);
                }
            }
        }
        alpha.max(0.0)
    }

    /// self += alpha * dir
    pub fn axpy(&mut self, alpha: f64, dir: &Direction) {
        for (v, dv) in self.fields_mut().into_iter().zip(dir.fields()) {
            for (vi, &dvi) in v.iter_mut().zip(dv.iter()) {
                *vi += alpha * dvi;
            }
        }
    }

    pub fn copy_from(&mut self, other: &Iterate) {
        for (v, o) in self.fields_mut().into_iter().zip(other.fields()) {
            v.copy_from_slice(o);
        }
    }

    pub fn all_finite(&self) -> bool {
        self.fields().iter().all(|v| v.iter().all(|x| x.is_finite()))
    }

    /// Largest magnitude over all blocks.
    pub fn inf_norm(&self) -> f64 {
        self.fields().iter().fold(0.0_f64, |acc, v| acc.max(inf_norm(v)))
    }

    fn fields(&self) -> [&Vec<f64>; 8] {
        [&self.x, &self.y, &self.z, &self.s, &self.z_lb, &self.s_lb, &self.z_ub, &self.s_ub]
    }

    fn fields_mut(&mut self) -> [&mut Vec<f64>; 8] {
        [
            &mut self.x,
            &mut self.y,
            &mut self.z,
            &mut self.s,
            &mut self.z_lb,
            &mut self.s_lb,
            &mut self.z_ub,
            &mut self.s_ub,
        ]
    }

    /// Re-key box pairs after bound finiteness changed.
    ///
    /// Pairs of sides that stay finite keep their values; new pairs start
    /// at (s, z) = (1, 1).
    pub fn remap_boxes(&mut self, old: &BoxIndex, new: &BoxIndex) {
        fn remap(old_idx: &[usize], new_idx: &[usize], s: &mut Vec<f64>, z: &mut Vec<f64>) {
            let mut new_s = vec![1.0; new_idx.len()];
            let mut new_z = vec![1.0; new_idx.len()];
            let mut k = 0;
            for (j, &var) in new_idx.iter().enumerate() {
                while k < old_idx.len() && old_idx[k] < var {
                    k += 1;
                }
                if k < old_idx.len() && old_idx[k] == var {
                    new_s[j] = s[k];
                    new_z[j] = z[k];
                }
            }
            *s = new_s;
            *z = new_z;
        }
        remap(&old.lb, &new.lb, &mut self.s_lb, &mut self.z_lb);
        remap(&old.ub, &new.ub, &mut self.s_ub, &mut self.z_ub);
    }

    /// Copy the iterate into `result`, expanding box pairs to length n.
    pub fn export(&self, boxes: &BoxIndex, result: &mut SolveResult) {
        let n = self.x.len();
        result.x.clone_from(&self.x);
        result.y.clone_from(&self.y);
        result.z.clone_from(&self.z);
        result.s.clone_from(&self.s);

        result.z_lb = vec![0.0; n];
        result.s_lb = vec![INF; n];
        for (k, &i) in boxes.lb.iter().enumerate() {
            result.z_lb[i] = self.z_lb[k];
            result.s_lb[i] = self.s_lb[k];
        }

        result.z_ub = vec![0.0; n];
        result.s_ub = vec![INF; n];
        for (k, &i) in boxes.ub.iter().enumerate() {
            result.z_ub[i] = self.z_ub[k];
            result.s_ub[i] = self.s_ub[k];
        }
    }
}

/// Iterate with the lowest [`Metrics::merit`] seen during one solve.
#[derive(Debug, Clone)]
pub struct BestIterate {
    iterate: Iterate,
    metrics: Metrics,
    merit: f64,
}

impl BestIterate {
    pub fn new(n: usize, p: usize, m: usize, boxes: &BoxIndex) -> Self {
        Self { iterate: Iterate::zeros(n, p, m, boxes), metrics: Metrics::default(), merit: f64::INFINITY }
    }

    /// Forget the iterates of a previous solve.
    pub fn reset(&mut self) {
        self.merit = f64::INFINITY;
    }

    /// Keep `it` if it improves on the best merit so far. Non-finite
    /// metrics never qualify.
    pub fn consider(&mut self, it: &Iterate, metrics: &Metrics) -> bool {
        let merit = metrics.merit();
        if !merit.is_finite() || merit >= self.merit {
            return false;
        }
        self.iterate.copy_from(it);
        self.metrics = *metrics;
        self.merit = merit;
        true
    }

    /// Overwrite `it` with the best iterate and return its metrics, or
    /// `None` if nothing was recorded.
    pub fn restore(&self, it: &mut Iterate) -> Option<Metrics> {
        if !self.merit.is_finite() {
            return None;
        }
        it.copy_from(&self.iterate);
        Some(self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes() -> BoxIndex {
        BoxIndex::from_bounds(&[-INF, -1.0, 0.0], &[INF, 1.0, f64::INFINITY])
    }

    #[test]
    fn test_box_index_skips_infinite_sides() {
        let b = boxes();
        assert_eq!(b.lb, vec![1, 2]);
        assert_eq!(b.ub, vec![1]);
    }

    #[test]
    fn test_max_step_and_mu() {
        let b = boxes();
        let mut it = Iterate::zeros(3, 0, 1, &b);
        it.s = vec![1.0];
        it.z = vec![2.0];
        it.s_lb = vec![1.0, 1.0];
        it.z_lb = vec![1.0, 1.0];
        it.s_ub = vec![4.0];
        it.z_ub = vec![1.0];
        // (2 + 1 + 1 + 4) / 4
        assert!((it.mu() - 2.0).abs() < 1e-15);

        let mut dir = Iterate::zeros(3, 0, 1, &b);
        dir.s = vec![-4.0];
        dir.z_ub = vec![-0.5];
        assert!((it.max_step(&dir) - 0.25).abs() < 1e-15);

        let mu_full = it.mu_after_step(&dir, 0.25);
        // s becomes 0, z_ub becomes 0.875
        assert!((mu_full - (0.0 + 1.0 + 1.0 + 4.0 * 0.875) / 4.0).abs() < 1e-15);
    }

    #[test]
    fn test_no_pairs_gives_zero_mu_and_full_step() {
        let it = Iterate::zeros(2, 1, 0, &BoxIndex::default());
        assert_eq!(it.pair_count(), 0);
        assert_eq!(it.mu(), 0.0);
        assert_eq!(it.max_step(&it.clone()), 1.0);
    }

    #[test]
    fn test_remap_keeps_surviving_pairs() {
        let old = boxes();
        let mut it = Iterate::zeros(3, 0, 0, &old);
        it.s_lb = vec![5.0, 6.0];
        it.z_lb = vec![0.5, 0.6];

        // Variable 1 loses its lower bound, variable 0 gains one.
        let new = BoxIndex::from_bounds(&[0.0, -INF, 0.0], &[INF, 1.0, INF]);
        it.remap_boxes(&old, &new);
        assert_eq!(it.s_lb, vec![1.0, 6.0]);
        assert_eq!(it.z_lb, vec![1.0, 0.6]);
        assert_eq!(it.s_ub.len(), 1);
    }

    #[test]
    fn test_best_iterate_keeps_lowest_merit() {
        let b = BoxIndex::default();
        let mut best = BestIterate::new(1, 0, 0, &b);
        let mut it = Iterate::zeros(1, 0, 0, &b);
        assert!(best.restore(&mut it).is_none());

        for (x, rel) in [(1.0, 3.0), (2.0, 0.5), (3.0, 2.0), (4.0, f64::NAN)] {
            it.x[0] = x;
            let metrics = Metrics { primal_rel: rel, dual_rel: rel, gap_rel: 0.0, ..Metrics::default() };
            best.consider(&it, &metrics);
        }

        let metrics = best.restore(&mut it).unwrap();
        assert_eq!(it.x[0], 2.0);
        assert_eq!(metrics.merit(), 1.0);

        best.reset();
        assert!(best.restore(&mut it).is_none());
    }

    #[test]
    fn test_export_expands_boxes() {
        let b = boxes();
        let mut it = Iterate::zeros(3, 0, 0, &b);
        it.z_lb = vec![0.1, 0.2];
        it.s_lb = vec![1.0, 2.0];
        it.z_ub = vec![0.3];
        it.s_ub = vec![3.0];
        let mut result = SolveResult::default();
        it.export(&b, &mut result);
        assert_eq!(result.z_lb, vec![0.0, 0.1, 0.2]);
        assert_eq!(result.s_lb, vec![INF, 1.0, 2.0]);
        assert_eq!(result.z_ub, vec![0.0, 0.3, 0.0]);
        assert_eq!(result.s_ub, vec![INF, 3.0, INF]);
    }
}
