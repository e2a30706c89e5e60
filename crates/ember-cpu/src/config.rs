use std::env;

/// Configuration for the CPU engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuConfig {
    /// Seed for `random` and `permute`; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Element count at which element-wise kernels move onto the rayon pool.
    pub parallel_threshold: usize,
    /// Materialize every node as soon as it is constructed.
    pub eager: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            seed: None,
            parallel_threshold: 1 << 15,
            eager: false,
        }
    }
}

impl CpuConfig {
    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }

    pub fn parallel_threshold(mut self, n: usize) -> Self {
        self.parallel_threshold = n;
        self
    }

    pub fn eager(mut self, e: bool) -> Self {
        self.eager = e;
        self
    }

    /// Defaults overridden by `EMBER_SEED`, `EMBER_PARALLEL_THRESHOLD` and
    /// `EMBER_EAGER`. Absent or unparsable variables keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(seed) = lookup("EMBER_SEED").and_then(|v| v.trim().parse().ok()) {
            config.seed = Some(seed);
        }
        if let Some(n) = lookup("EMBER_PARALLEL_THRESHOLD").and_then(|v| v.trim().parse().ok()) {
            config.parallel_threshold = n;
        }
        if let Some(v) = lookup("EMBER_EAGER") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.eager = true,
                "0" | "false" | "no" | "off" => config.eager = false,
                other => log::warn!("ignoring EMBER_EAGER={other}"),
            }
        }
        config
    }
}
