use crate::settings::SolverSettings;

/// Proximal weight schedule.
///
/// ρ and δ shrink with every step in proportion to the step length and are
/// never allowed below `lower_limit`. A failed factorization multiplies both
/// by `bump_factor`.
#[derive(Debug, Clone)]
pub struct RegularizationPolicy {
    pub rho_init: f64,
    pub delta_init: f64,
    pub lower_limit: f64,
    pub bump_factor: f64,
    pub max_retries: usize,
}

#[derive(Debug, Copy, Clone)]
pub struct RegularizationState {
    pub rho: f64,
    pub delta: f64,
    /// Bumps over the whole solve
    pub retries: usize,
}

impl RegularizationPolicy {
    pub fn from_settings(settings: &SolverSettings) -> Self {
        Self {
            rho_init: settings.rho_init,
            delta_init: settings.delta_init,
            lower_limit: settings.reg_lower_limit,
            bump_factor: settings.reg_bump_factor,
            max_retries: settings.max_factor_retries,
        }
    }

    pub fn init_state(&self) -> RegularizationState {
        RegularizationState { rho: self.rho_init, delta: self.delta_init, retries: 0 }
    }

    /// Shrink after a step of length `alpha`.
    #[inline]
    pub fn advance(&self, st: &mut RegularizationState, alpha: f64) {
        let keep = (1.0 - alpha).clamp(0.0, 1.0);
        st.rho = (keep * st.rho).max(self.lower_limit);
        st.delta = (keep * st.delta).max(self.lower_limit);
    }

    /// Grow after a failed factorization.
    #[inline]
    pub fn bump(&self, st: &mut RegularizationState) {
        st.rho *= self.bump_factor;
        st.delta *= self.bump_factor;
        st.retries += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_respects_floor() {
        let policy = RegularizationPolicy::from_settings(&SolverSettings::default());
        let mut st = policy.init_state();
        policy.advance(&mut st, 0.5);
        assert!((st.rho - 0.5e-6).abs() < 1e-20);
        assert!((st.delta - 0.5e-4).abs() < 1e-18);

        policy.advance(&mut st, 1.0);
        assert_eq!(st.rho, 1e-10);
        assert_eq!(st.delta, 1e-10);
    }

    #[test]
    fn test_bump_counts_retries() {
        let policy = RegularizationPolicy::from_settings(&SolverSettings::default());
        let mut st = policy.init_state();
        policy.bump(&mut st);
        policy.bump(&mut st);
        assert_eq!(st.retries, 2);
        assert!((st.rho - 1e-2).abs() < 1e-15);
    }
}
