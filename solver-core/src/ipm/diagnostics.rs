//! Debug records of the iteration, switched on from the environment.

use std::env;

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub every: usize,
}

impl DiagnosticsConfig {
    /// `PROXIP_DIAGNOSTICS` turns debug records on, `PROXIP_DIAGNOSTICS_EVERY`
    /// thins them out.
    pub fn from_env() -> Self {
        let enabled = match env::var("PROXIP_DIAGNOSTICS") {
            Ok(v) => v != "0" && v.to_lowercase() != "false",
            Err(_) => false,
        };

        let every = env::var("PROXIP_DIAGNOSTICS_EVERY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(1);

        Self { enabled, every }
    }

    #[inline]
    pub fn should_log(&self, iter: usize) -> bool {
        self.enabled && (iter % self.every == 0)
    }
}
