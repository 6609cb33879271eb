use serde::Deserialize;

/// every tunable the engine honors, with defaults matching the crate
/// constants. loaded from an optional TOML file so a run can be
/// re-tuned without recompiling; anything unspecified falls back to
/// the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    // candidate generation
    pub next_len: usize,
    pub min_nexts: usize,
    pub max_nexts: usize,
    pub backfill_count: usize,

    // futures population
    pub min_futures: usize,
    pub max_futures: usize,
    pub min_future_length: usize,
    pub max_future_length: usize,
    pub drop_futures: usize,
    pub mutate_futures: usize,
    pub nfutures_step_frac: f64,
    pub desired_length_step_frac: f64,

    // motif reweighting
    pub motif_alpha: f64,
    pub motif_min_frac: f64,
    pub motif_max_frac: f64,

    // backtracking
    pub try_backtrack_every: usize,
    pub min_backtrack_distance: usize,
    pub stuck_threshold_frac: f64,

    // persistence
    pub checkpoint_every: usize,
    pub watermark: usize,

    // distributed helpers
    pub helper_host: String,
    pub helper_ports: Vec<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            next_len: crate::NEXT_LEN,
            min_nexts: crate::MIN_NEXTS,
            max_nexts: crate::MAX_NEXTS,
            backfill_count: crate::BACKFILL_COUNT,
            min_futures: crate::MIN_FUTURES,
            max_futures: crate::MAX_FUTURES,
            min_future_length: crate::MIN_FUTURE_LENGTH,
            max_future_length: crate::MAX_FUTURE_LENGTH,
            drop_futures: crate::DROP_FUTURES,
            mutate_futures: crate::MUTATE_FUTURES,
            nfutures_step_frac: crate::NFUTURES_STEP_FRAC,
            desired_length_step_frac: crate::DESIRED_LENGTH_STEP_FRAC,
            motif_alpha: crate::MOTIF_ALPHA,
            motif_min_frac: crate::MOTIF_MIN_FRAC,
            motif_max_frac: crate::MOTIF_MAX_FRAC,
            try_backtrack_every: crate::TRY_BACKTRACK_EVERY,
            min_backtrack_distance: crate::MIN_BACKTRACK_DISTANCE,
            stuck_threshold_frac: crate::STUCK_THRESHOLD_FRAC,
            checkpoint_every: crate::CHECKPOINT_EVERY,
            watermark: 0,
            helper_host: String::from("127.0.0.1"),
            helper_ports: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// sanity bounds that would otherwise surface as confusing panics
    /// deep inside the search
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.min_nexts <= self.max_nexts, "min_nexts > max_nexts");
        anyhow::ensure!(self.min_futures <= self.max_futures, "min_futures > max_futures");
        anyhow::ensure!(
            self.min_future_length <= self.max_future_length,
            "min_future_length > max_future_length"
        );
        anyhow::ensure!(self.next_len > 0, "next_len must be positive");
        anyhow::ensure!(self.checkpoint_every > 0, "checkpoint_every must be positive");
        anyhow::ensure!(
            0. < self.motif_alpha && self.motif_alpha < 1.,
            "motif_alpha must lie in (0, 1)"
        );
        anyhow::ensure!(
            0. <= self.motif_min_frac && self.motif_min_frac < self.motif_max_frac,
            "motif fraction band is inverted"
        );
        anyhow::ensure!(self.try_backtrack_every > 0, "try_backtrack_every must be positive");
        Ok(())
    }
}
