//! Playback Dispatcher
//!
//! Turns a step emission plus its resolved association into playback
//! requests. The dispatcher never touches audio itself; requests go to an
//! [`AudioSink`] supplied by the host.

use crate::association::AcousticAssociation;
use crate::classifier::StepEmission;
use crate::variator::VariatorConfig;
use ff_core::{AgentId, EventCategory, EventType, Foot, SurfaceIdentity, Tick};
use std::collections::HashSet;
use std::sync::Arc;

/// Lowest pitch multiplier a request can carry
pub const MIN_PITCH: f32 = 0.05;

/// A single cue to be played by the host's audio system
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub agent: AgentId,
    pub cue: Arc<str>,
    pub event: EventType,
    pub surface: SurfaceIdentity,
    pub foot: Foot,
    pub volume: f32,
    pub pitch: f32,
    pub delay_ms: u32,
    pub position: [f32; 3],
    pub tick: Tick,
}

/// Receiver of playback requests (the host's sound engine)
pub trait AudioSink {
    fn play(&mut self, request: &PlaybackRequest);
}

impl AudioSink for Vec<PlaybackRequest> {
    fn play(&mut self, request: &PlaybackRequest) {
        self.push(request.clone());
    }
}

/// Scale `base` by a uniform factor in `[1 - amount, 1 + amount]`
#[inline]
fn jitter(base: f32, amount: f32, draw: f32) -> f32 {
    base * (1.0 + (draw * 2.0 - 1.0) * amount)
}

/// Per-tick deduplicating request builder
#[derive(Debug, Default)]
pub struct PlaybackDispatcher {
    current_tick: Option<Tick>,
    dispatched: HashSet<(AgentId, EventCategory)>,
    suppressed: u64,
}

impl PlaybackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests dropped by deduplication so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Forget the current tick's dedup set
    pub fn reset(&mut self) {
        self.current_tick = None;
        self.dispatched.clear();
    }

    /// Build the requests for one emission.
    ///
    /// Returns an empty list for the silent association, and for a second
    /// emission of the same agent and event category within one tick.
    pub fn dispatch(
        &mut self,
        emission: &StepEmission,
        association: &AcousticAssociation,
        variator: &VariatorConfig,
        position: [f32; 3],
        rng: &mut impl FnMut() -> f32,
    ) -> Vec<PlaybackRequest> {
        let mut out = Vec::with_capacity(1);
        self.dispatch_into(emission, association, variator, position, rng, &mut out);
        out
    }

    /// As [`dispatch`](Self::dispatch), appending to `out`. Returns the
    /// number of requests added.
    pub fn dispatch_into(
        &mut self,
        emission: &StepEmission,
        association: &AcousticAssociation,
        variator: &VariatorConfig,
        position: [f32; 3],
        rng: &mut impl FnMut() -> f32,
        out: &mut Vec<PlaybackRequest>,
    ) -> usize {
        if self.current_tick != Some(emission.tick) {
            self.current_tick = Some(emission.tick);
            self.dispatched.clear();
        }

        if association.is_silent() {
            return 0;
        }

        let key = (emission.agent, emission.event.category());
        if !self.dispatched.insert(key) {
            self.suppressed += 1;
            return 0;
        }

        let Some(cue) = association.select(rng()) else {
            return 0;
        };

        let volume = jitter(
            cue.volume * variator.volume_scale,
            variator.volume_jitter,
            rng(),
        )
        .max(0.0);
        let pitch = jitter(cue.pitch, variator.pitch_jitter, rng()).max(MIN_PITCH);

        out.push(PlaybackRequest {
            agent: emission.agent,
            cue: Arc::clone(&cue.name),
            event: emission.event,
            surface: emission.surface,
            foot: emission.foot,
            volume,
            pitch,
            delay_ms: cue.delay_ms,
            position,
            tick: emission.tick,
        });
        1
    }
}
