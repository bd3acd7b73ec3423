//! Acoustic Associations
//!
//! An association is the weighted list of cues a surface offers for one
//! event type. Associations are built when a registry generation is
//! constructed and shared read-only as `Arc`s afterwards.

use ff_core::{FfError, FfResult};
use std::sync::Arc;

/// Single playable cue with its selection weight
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticCue {
    /// Cue name understood by the audio sink (e.g. "step.stone")
    pub name: Arc<str>,
    /// Selection weight (>= 1)
    pub weight: u32,
    /// Base volume multiplier
    pub volume: f32,
    /// Base pitch multiplier
    pub pitch: f32,
    /// Delay before playback (ms)
    pub delay_ms: u32,
}

impl AcousticCue {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            weight: 1,
            volume: 1.0,
            pitch: 1.0,
            delay_ms: 0,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Weighted cue list for one (surface, event) pair
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AcousticAssociation {
    cues: Vec<AcousticCue>,
    total_weight: u64,
}

impl AcousticAssociation {
    /// Build an association, rejecting empty lists and a zero total weight.
    ///
    /// Individual cues may weigh 0; they are kept but never selected.
    pub fn new(cues: Vec<AcousticCue>) -> FfResult<Self> {
        if cues.is_empty() {
            return Err(FfError::config("Acoustic association has no cues"));
        }

        let total_weight: u64 = cues.iter().map(|c| c.weight as u64).sum();
        if total_weight == 0 {
            return Err(FfError::config(format!(
                "Cues have a total weight of zero ({} cues)",
                cues.len()
            )));
        }
        Ok(Self { cues, total_weight })
    }

    /// The association that plays nothing
    pub fn silent() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_silent(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn cues(&self) -> &[AcousticCue] {
        &self.cues
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Pick a cue for a draw in `[0, 1)`.
    ///
    /// The draw is scaled to an index in `[0, total_weight)`; the first cue
    /// whose cumulative weight exceeds the index wins.
    pub fn select(&self, draw: f32) -> Option<&AcousticCue> {
        if self.cues.is_empty() {
            return None;
        }

        let draw = if draw.is_finite() { draw.clamp(0.0, 1.0) } else { 0.0 };
        let index = ((draw as f64 * self.total_weight as f64).floor() as u64)
            .min(self.total_weight - 1);

        let mut cumulative = 0u64;
        for cue in &self.cues {
            cumulative += cue.weight as u64;
            if cumulative > index {
                return Some(cue);
            }
        }
        self.cues.last()
    }
}
