//! Mixer configuration
//!
//! All tunables of the rate detector and the drift tracker live here, along
//! with the gains applied at start-up. Everything has a default so a partial
//! YAML file is enough:
//!
//! ```yaml
//! lock_windows: 3
//! drift:
//!   latency_frames: 30.0
//! gains: [1.0, 0.8, 0.5]
//! ```

mod io;
mod paths;

pub use io::{load_config, load_mixer_config, save_config};
pub use paths::{default_config_dir, default_config_path};

use serde::{Deserialize, Serialize};

use crate::error::{MixerError, MixerResult};
use crate::mixer::detection::expected_count;
use crate::types::{
    SampleRate, DEFAULT_LATENCY_FRAMES, DETECTION_WINDOW, NUM_CHANNELS, RING_CAPACITY, RX_BURST,
};

/// Drift tracker tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Per-frame EMA coefficient blending the correction into the drift factor
    pub smoothing: f64,
    /// Proportional gain applied to the normalized buffer-age error
    pub correction_gain: f64,
    /// Maximum correction as a fraction of the nominal factor
    pub clamp: f64,
    /// Read margin behind the write head, also the target buffer age (frames)
    pub latency_frames: f64,
    /// Output frames folded into the read origin at each rebase
    pub rebase_interval: u32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            smoothing: 5e-6,
            correction_gain: 0.05,
            clamp: 0.5,
            latency_frames: DEFAULT_LATENCY_FRAMES,
            rebase_interval: 20_000,
        }
    }
}

/// Top-level mixer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Output frames per rate-detection window
    pub detection_window: u32,
    /// Half-width of the accepted band around each expected count (inclusive)
    pub rate_tolerance: u32,
    /// Consecutive matching windows needed before a new rate is trusted
    pub lock_windows: u32,
    /// Recognise 88.2kHz sources
    pub detect_88200: bool,
    pub drift: DriftConfig,
    /// Initial per-input gains
    pub gains: [f32; NUM_CHANNELS],
    pub master_gain: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            detection_window: DETECTION_WINDOW,
            rate_tolerance: RX_BURST as u32,
            lock_windows: 2,
            detect_88200: true,
            drift: DriftConfig::default(),
            gains: [1.0; NUM_CHANNELS],
            master_gain: 1.0,
        }
    }
}

impl MixerConfig {
    /// Rates the detector is allowed to report with this configuration
    pub fn lockable_rates(&self) -> impl Iterator<Item = SampleRate> + '_ {
        SampleRate::LOCKABLE
            .into_iter()
            .filter(move |rate| self.detect_88200 || *rate != SampleRate::Sr88200)
    }

    /// Check every tunable against the range the mixer can work with
    pub fn validate(&self) -> MixerResult<()> {
        let invalid = |msg: String| Err(MixerError::InvalidConfig(msg));

        if self.detection_window == 0 {
            return invalid("detection_window must be at least 1 frame".into());
        }
        if self.lock_windows == 0 {
            return invalid("lock_windows must be at least 1".into());
        }

        // Neighbouring acceptance bands must not touch
        let mut counts: Vec<u32> = self
            .lockable_rates()
            .map(|rate| expected_count(self.detection_window, rate))
            .collect();
        counts.sort_unstable();
        if let Some(gap) = counts.windows(2).map(|w| w[1] - w[0]).min() {
            if 2 * self.rate_tolerance >= gap {
                return invalid(format!(
                    "rate_tolerance {} overlaps neighbouring rates (closest expected counts are {} apart)",
                    self.rate_tolerance, gap
                ));
            }
        }

        let drift = &self.drift;
        if !(drift.smoothing > 0.0 && drift.smoothing <= 1.0) {
            return invalid(format!("drift.smoothing {} not in (0, 1]", drift.smoothing));
        }
        if !(drift.clamp > 0.0 && drift.clamp < 1.0) {
            return invalid(format!("drift.clamp {} not in (0, 1)", drift.clamp));
        }
        if !drift.correction_gain.is_finite() || drift.correction_gain < 0.0 {
            return invalid(format!(
                "drift.correction_gain {} must be finite and non-negative",
                drift.correction_gain
            ));
        }
        let half_ring = (RING_CAPACITY / 2) as f64;
        if !(drift.latency_frames > 0.0 && drift.latency_frames < half_ring) {
            return invalid(format!(
                "drift.latency_frames {} not in (0, {})",
                drift.latency_frames, half_ring
            ));
        }
        if drift.rebase_interval == 0 {
            return invalid("drift.rebase_interval must be at least 1 frame".into());
        }

        if self.gains.iter().chain([&self.master_gain]).any(|g| !g.is_finite()) {
            return invalid("gains must be finite".into());
        }

        Ok(())
    }
}
