// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pre-send pacing computation.
//!
//! Every send waits out a delay composed of four independent terms:
//! a volume-indexed warm-up band, an occasional long strategic pause at
//! fixed cumulative thresholds, a small-probability micro-pause, and a
//! content-length surcharge. The sum is awaited synchronously inside the
//! send task — pacing is observed per message, never amortized across a
//! batch.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use volley_config::model::{PacingConfig, PhaseBand, StrategicPause};

/// The four pacing terms for one send, plus their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPlan {
    /// Warm-up phase delay for the current volume band.
    pub phase: Duration,
    /// Long break when a strategic threshold was crossed, else zero.
    pub strategic: Duration,
    /// Occasional short hesitation, else zero.
    pub micro: Duration,
    /// Content-length surcharge.
    pub content: Duration,
}

impl PacingPlan {
    pub fn total(&self) -> Duration {
        self.phase + self.strategic + self.micro + self.content
    }
}

/// Computes the pacing delay before each send from cumulative volume,
/// content size, and randomized human-like variance.
pub struct PacingPlanner {
    config: PacingConfig,
}

impl PacingPlanner {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    /// Plan the delay for the next send, given how many messages went out
    /// today before it and how long the content is.
    pub fn plan(&self, sent_today: u64, content_len: usize) -> PacingPlan {
        self.plan_with_rng(sent_today, content_len, &mut rand::thread_rng())
    }

    /// Deterministic variant for tests: inject the RNG.
    pub fn plan_with_rng<R: Rng>(
        &self,
        sent_today: u64,
        content_len: usize,
        rng: &mut R,
    ) -> PacingPlan {
        let band = self.phase_band(sent_today);
        let phase = Duration::from_secs(rng.gen_range(band.min_secs..=band.max_secs));

        let strategic = match self.strategic_for(sent_today) {
            Some(pause) => {
                let mins = rng.gen_range(pause.min_mins..=pause.max_mins);
                debug!(
                    sent_today,
                    pause_mins = mins,
                    "strategic pause threshold crossed"
                );
                Duration::from_secs(mins * 60)
            }
            None => Duration::ZERO,
        };

        let micro = if rng.gen_bool(self.config.micro_pause_probability) {
            Duration::from_secs(rng.gen_range(
                self.config.micro_pause_min_secs..=self.config.micro_pause_max_secs,
            ))
        } else {
            Duration::ZERO
        };

        PacingPlan {
            phase,
            strategic,
            micro,
            content: self.content_delay(content_len),
        }
    }

    /// The emergency pause applied after a ban-risk provider error.
    pub fn emergency_pause(&self) -> Duration {
        Duration::from_secs(self.config.emergency_pause_mins * 60)
    }

    /// The warm-up band covering a cumulative count: the last phase whose
    /// `from` is at or below it. Validation guarantees a phase at 0.
    fn phase_band(&self, sent_today: u64) -> &PhaseBand {
        self.config
            .warm_up
            .iter()
            .rev()
            .find(|band| band.from <= sent_today)
            .unwrap_or(&self.config.warm_up[0])
    }

    /// A strategic pause triggers on exact equality with its threshold:
    /// the counter advances one send at a time, so each crossing fires at
    /// most once.
    fn strategic_for(&self, sent_today: u64) -> Option<&StrategicPause> {
        self.config
            .strategic_pauses
            .iter()
            .find(|pause| pause.at == sent_today)
    }

    /// Content-length surcharge: first band whose `max_len` covers the
    /// content, capped at the configured maximum.
    fn content_delay(&self, content_len: usize) -> Duration {
        let secs = self
            .config
            .content_bands
            .iter()
            .find(|band| content_len <= band.max_len)
            .map(|band| band.delay_secs)
            .unwrap_or(self.config.content_delay_cap_secs);
        Duration::from_secs(secs.min(self.config.content_delay_cap_secs))
    }
}
