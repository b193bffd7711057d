//! Wall-clock accounting of the KKT work in one solve.
//!
//! Only factorizations and KKT solves are timed; they are the two figures
//! reported in [`SolveInfo`](crate::SolveInfo).

use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PerfSection {
    Factorization,
    Solve,
}

#[derive(Debug, Default, Clone)]
pub struct PerfTimers {
    pub factorization: Duration,
    pub solve: Duration,
}

impl PerfTimers {
    /// Run `f` and charge its wall time to `section`.
    pub fn time<T>(&mut self, section: PerfSection, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        let slot = match section {
            PerfSection::Factorization => &mut self.factorization,
            PerfSection::Solve => &mut self.solve,
        };
        *slot += start.elapsed();
        out
    }
}
