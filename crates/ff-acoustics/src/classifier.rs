//! Event Classification
//!
//! Turns per-tick contact samples into step emissions. Each agent owns one
//! [`AgentFootstepState`]; only the tick thread mutates it.
//!
//! A sample is classified in this order:
//! 1. Airborne: jump on take-off, accumulate fall distance
//! 2. Touch-down: landing if the fall was hard enough; the sample's
//!    horizontal distance restarts the stride count without a step
//! 3. Immobile: count ticks, go idle (optional wander shuffle)
//! 4. Moving: pick swim / climb / stairs / run / walk, accumulate distance,
//!    fire one emission per stride

use crate::registry::AcousticRegistry;
use crate::variator::VariatorConfig;
use ff_core::{AgentId, EventType, EventTypeTable, Foot, SurfaceIdentity, Tick};
use std::sync::{Arc, Weak};

/// Movement below this (per axis, per tick) counts as standing still
pub const MOVEMENT_EPSILON: f32 = 1e-4;

/// Upper bound on emissions from a single sample (teleports, lag spikes)
pub const MAX_EMISSIONS_PER_SAMPLE: usize = 16;

/// What the host reports about one agent for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSample {
    pub agent: AgentId,
    pub surface: SurfaceIdentity,
    /// Position change since the previous tick (x, y up, z)
    pub delta: [f32; 3],
    /// World position, forwarded to playback requests
    pub position: [f32; 3],
    pub on_ground: bool,
    pub in_liquid: bool,
    pub on_ladder: bool,
    pub on_stairs: bool,
}

impl ContactSample {
    /// Grounded, motionless sample
    pub fn new(agent: AgentId, surface: SurfaceIdentity) -> Self {
        Self {
            agent,
            surface,
            delta: [0.0; 3],
            position: [0.0; 3],
            on_ground: true,
            in_liquid: false,
            on_ladder: false,
            on_stairs: false,
        }
    }

    pub fn with_delta(mut self, dx: f32, dy: f32, dz: f32) -> Self {
        self.delta = [dx, dy, dz];
        self
    }

    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn airborne(mut self) -> Self {
        self.on_ground = false;
        self
    }

    pub fn in_liquid(mut self) -> Self {
        self.in_liquid = true;
        self
    }

    pub fn on_ladder(mut self) -> Self {
        self.on_ladder = true;
        self
    }

    pub fn on_stairs(mut self) -> Self {
        self.on_stairs = true;
        self
    }

    #[inline]
    pub fn horizontal_distance(&self) -> f32 {
        let [dx, _, dz] = self.delta;
        (dx * dx + dz * dz).sqrt()
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.horizontal_distance() > MOVEMENT_EPSILON || self.delta[1].abs() > MOVEMENT_EPSILON
    }

    /// Supported by something other than air
    #[inline]
    fn is_supported(&self) -> bool {
        self.on_ground || self.in_liquid || self.on_ladder
    }
}

/// One footstep-worthy event produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEmission {
    pub agent: AgentId,
    pub event: EventType,
    pub surface: SurfaceIdentity,
    pub tick: Tick,
    pub foot: Foot,
    /// Whether an external renderer should leave a print for this step
    pub footprint: bool,
}

/// Per-agent mutable footstep state
#[derive(Debug, Clone)]
pub struct AgentFootstepState {
    agent: AgentId,
    class: String,
    variator: Weak<VariatorConfig>,
    variator_generation: u64,

    /// Surface of the most recent sample
    pub last_surface: SurfaceIdentity,
    /// Distance walked since the last emission
    pub distance_accumulator: f32,
    /// Tick of the most recent emission
    pub last_event_tick: Option<Tick>,
    /// Event type of the current gait
    pub current: EventType,
    /// Agent has been still for at least `immobile_duration` ticks
    pub idle: bool,

    immobile_ticks: u32,
    airborne: bool,
    fall_distance: f32,
    next_foot: Foot,
}

impl AgentFootstepState {
    pub fn new(agent: AgentId, class: &str) -> Self {
        Self {
            agent,
            class: class.to_string(),
            variator: Weak::new(),
            variator_generation: 0,
            last_surface: SurfaceIdentity::UNKNOWN,
            distance_accumulator: 0.0,
            last_event_tick: None,
            current: EventType::Walk,
            idle: false,
            immobile_ticks: 0,
            airborne: false,
            fall_distance: 0.0,
            next_foot: Foot::Left,
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    /// Variator for this agent's class in the given generation.
    ///
    /// The agent only keeps a weak reference; it is re-bound whenever the
    /// generation changes or the old config has been dropped.
    pub fn bind_variator(&mut self, registry: &AcousticRegistry) -> Arc<VariatorConfig> {
        if self.variator_generation == registry.generation() {
            if let Some(config) = self.variator.upgrade() {
                return config;
            }
        }

        let config = Arc::clone(registry.variator(&self.class));
        self.variator = Arc::downgrade(&config);
        self.variator_generation = registry.generation();
        config
    }

    /// Forget gait state (keeps class binding)
    pub fn reset(&mut self) {
        let agent = self.agent;
        let class = std::mem::take(&mut self.class);
        *self = Self::new(agent, &class);
    }

    /// Classify one sample, returning the emissions it produced
    pub fn classify(
        &mut self,
        sample: &ContactSample,
        variator: &VariatorConfig,
        table: &EventTypeTable,
        tick: Tick,
    ) -> Vec<StepEmission> {
        let mut out = Vec::new();
        self.classify_into(sample, variator, table, tick, &mut out);
        out
    }

    /// Classify one sample, appending emissions to `out`
    pub fn classify_into(
        &mut self,
        sample: &ContactSample,
        variator: &VariatorConfig,
        table: &EventTypeTable,
        tick: Tick,
        out: &mut Vec<StepEmission>,
    ) {
        self.last_surface = sample.surface;
        let dy = sample.delta[1];

        // 1. Airborne
        if !sample.is_supported() {
            if !self.airborne {
                self.airborne = true;
                self.fall_distance = 0.0;
                if dy > MOVEMENT_EPSILON && variator.event_on_jump {
                    self.emit(EventType::Jump, sample, variator, tick, out);
                }
            }
            if dy < 0.0 {
                self.fall_distance -= dy;
            }
            self.immobile_ticks = 0;
            self.idle = false;
            return;
        }

        let horizontal = sample.horizontal_distance();
        let running = horizontal > variator.speed_to_run;

        // 2. Touch-down
        if self.airborne {
            self.airborne = false;
            let fall = std::mem::take(&mut self.fall_distance);
            if sample.on_ground && fall > variator.land_hard_distance_min {
                self.emit(EventType::Land, sample, variator, tick, out);
                self.distance_accumulator = horizontal;
                self.current = Self::gait_after_landing(table, running);
                self.immobile_ticks = 0;
                self.idle = false;
                return;
            }
        }

        // 3. Immobile
        if !sample.is_moving() {
            self.immobile_ticks = self.immobile_ticks.saturating_add(1);
            if !self.idle && self.immobile_ticks >= variator.immobile_duration {
                self.idle = true;
                self.distance_accumulator = 0.0;
                if variator.play_wander {
                    self.emit(EventType::Wander, sample, variator, tick, out);
                }
            }
            return;
        }
        self.immobile_ticks = 0;
        self.idle = false;

        // 4. Moving
        let (event, distance, base_stride) = if sample.in_liquid {
            (EventType::Swim, horizontal + dy.abs(), variator.stride)
        } else if sample.on_ladder {
            let event = if dy.abs() > variator.speed_to_run {
                EventType::ClimbRun
            } else {
                EventType::Climb
            };
            (event, dy.abs(), variator.stride_ladder)
        } else if sample.on_stairs && dy.abs() > MOVEMENT_EPSILON {
            let event = match (dy > 0.0, running) {
                (true, false) => EventType::Up,
                (true, true) => EventType::UpRun,
                (false, false) => EventType::Down,
                (false, true) => EventType::DownRun,
            };
            (event, horizontal, variator.stride_stair)
        } else if running {
            (EventType::Run, horizontal, variator.stride)
        } else {
            (EventType::Walk, horizontal, variator.stride)
        };

        self.current = event;
        self.distance_accumulator += distance;

        let stride = variator.effective_stride(base_stride);
        let mut fired = 0;
        while self.distance_accumulator >= stride {
            if fired == MAX_EMISSIONS_PER_SAMPLE {
                log::trace!(
                    "Agent {} moved {:.2} in one tick, dropping excess steps",
                    self.agent,
                    distance
                );
                self.distance_accumulator = 0.0;
                break;
            }
            self.distance_accumulator -= stride;
            self.emit(event, sample, variator, tick, out);
            fired += 1;
        }
    }

    /// Gait after a hard landing: the table's target for `Land`, stepping
    /// down once more when the agent is not fast enough to keep running.
    fn gait_after_landing(table: &EventTypeTable, running: bool) -> EventType {
        let fallback = if running { EventType::Run } else { EventType::Walk };
        let Ok(next) = table.transition_target(EventType::Land) else {
            return fallback;
        };
        if !running && next == EventType::Run {
            return table.transition_target(next).unwrap_or(fallback);
        }
        next
    }

    fn emit(
        &mut self,
        event: EventType,
        sample: &ContactSample,
        variator: &VariatorConfig,
        tick: Tick,
        out: &mut Vec<StepEmission>,
    ) {
        out.push(StepEmission {
            agent: self.agent,
            event,
            surface: sample.surface,
            tick,
            foot: self.next_foot,
            footprint: variator.footprints && !sample.in_liquid && !sample.on_ladder,
        });
        self.next_foot = self.next_foot.other();
        self.last_event_tick = Some(tick);
    }
}
