//! Footstep Engine
//!
//! Tick loop tying the classifier, resolver and dispatcher together. The
//! engine owns every agent's state and is driven from a single thread; other
//! threads talk to it through a [`FootstepEngineHandle`] (lock-free command
//! queue for lifecycle events, shared [`RegistryHandle`] for reloads).

use crate::classifier::{AgentFootstepState, ContactSample, StepEmission};
use crate::dispatcher::{AudioSink, PlaybackDispatcher, PlaybackRequest};
use crate::profile::AcousticProfile;
use crate::registry::RegistryHandle;
use crate::COMMAND_QUEUE_CAPACITY;
use ff_core::{AgentId, FfResult, Tick};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rtrb::{Consumer, Producer, RingBuffer};
use std::collections::HashMap;

/// Commands from host threads to the tick thread
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Start tracking an agent of the given entity class
    SpawnAgent { agent: AgentId, class: String },
    /// Stop tracking an agent
    DespawnAgent { agent: AgentId },
    /// Forget all gait state (agents stay spawned)
    Reset,
}

/// Running totals since the engine was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub ticks: u64,
    pub samples: u64,
    /// Samples for agents that were never spawned
    pub skipped_samples: u64,
    pub emissions: u64,
    pub requests: u64,
    /// Requests dropped by per-tick deduplication
    pub suppressed: u64,
}

/// Host-side handle: lifecycle notifications and registry reloads
pub struct FootstepEngineHandle {
    command_tx: Producer<EngineCommand>,
    registry: RegistryHandle,
}

impl FootstepEngineHandle {
    /// Queue a command. Returns false if the queue is full.
    pub fn send(&mut self, command: EngineCommand) -> bool {
        match self.command_tx.push(command) {
            Ok(()) => true,
            Err(rtrb::PushError::Full(command)) => {
                log::warn!("Engine command queue full, dropping {:?}", command);
                false
            }
        }
    }

    pub fn spawn_agent(&mut self, agent: AgentId, class: &str) -> bool {
        self.send(EngineCommand::SpawnAgent {
            agent,
            class: class.to_string(),
        })
    }

    pub fn despawn_agent(&mut self, agent: AgentId) -> bool {
        self.send(EngineCommand::DespawnAgent { agent })
    }

    pub fn reset(&mut self) -> bool {
        self.send(EngineCommand::Reset)
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Build a generation from `profile` and install it.
    ///
    /// On error the current generation stays active.
    pub fn reload(&self, profile: &AcousticProfile) -> FfResult<u64> {
        self.registry.reload_with(|| profile.to_registry())
    }
}

/// Tick-thread side of the engine
pub struct FootstepEngine {
    registry: RegistryHandle,
    agents: HashMap<AgentId, AgentFootstepState>,
    dispatcher: PlaybackDispatcher,
    command_rx: Consumer<EngineCommand>,
    rng: ChaCha8Rng,
    tick: Tick,
    generation: u64,
    emissions: Vec<StepEmission>,
    stats: EngineStats,
}

impl FootstepEngine {
    /// Create an engine and its host handle sharing `registry`.
    ///
    /// With a seed, cue selection and jitter are reproducible.
    pub fn create(registry: RegistryHandle, seed: Option<u64>) -> (Self, FootstepEngineHandle) {
        let (command_tx, command_rx) = RingBuffer::new(COMMAND_QUEUE_CAPACITY);
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };

        let engine = Self {
            registry: registry.clone(),
            agents: HashMap::new(),
            dispatcher: PlaybackDispatcher::new(),
            command_rx,
            rng,
            tick: 0,
            generation: 0,
            emissions: Vec::with_capacity(crate::classifier::MAX_EMISSIONS_PER_SAMPLE),
            stats: EngineStats::default(),
        };
        let handle = FootstepEngineHandle {
            command_tx,
            registry,
        };
        (engine, handle)
    }

    /// Start tracking an agent directly (tick thread only)
    pub fn spawn_agent(&mut self, agent: AgentId, class: &str) {
        if self
            .agents
            .insert(agent, AgentFootstepState::new(agent, class))
            .is_some()
        {
            log::debug!("Agent {} respawned as '{}'", agent, class);
        } else {
            log::debug!("Agent {} spawned as '{}'", agent, class);
        }
    }

    pub fn despawn_agent(&mut self, agent: AgentId) {
        if self.agents.remove(&agent).is_none() {
            log::trace!("Despawn of unknown agent {}", agent);
        }
    }

    /// Reset every agent's gait state
    pub fn reset(&mut self) {
        for state in self.agents.values_mut() {
            state.reset();
        }
        self.dispatcher.reset();
        log::debug!("Engine reset ({} agents)", self.agents.len());
    }

    fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.pop() {
            match command {
                EngineCommand::SpawnAgent { agent, class } => self.spawn_agent(agent, &class),
                EngineCommand::DespawnAgent { agent } => self.despawn_agent(agent),
                EngineCommand::Reset => self.reset(),
            }
        }
    }

    /// Run one tick over the host's samples and return the playback requests
    pub fn tick(&mut self, samples: &[ContactSample]) -> Vec<PlaybackRequest> {
        let mut requests = Vec::new();
        self.tick_collect(samples, &mut requests);
        requests
    }

    /// Run one tick, handing each request to `sink`. Returns the request count.
    pub fn tick_into(&mut self, samples: &[ContactSample], sink: &mut impl AudioSink) -> usize {
        let requests = self.tick(samples);
        for request in &requests {
            sink.play(request);
        }
        requests.len()
    }

    fn tick_collect(&mut self, samples: &[ContactSample], requests: &mut Vec<PlaybackRequest>) {
        self.process_commands();

        // One generation for the whole tick
        let registry = self.registry.snapshot();
        if registry.generation() != self.generation {
            log::debug!(
                "Tick {} now using registry '{}' generation {}",
                self.tick,
                registry.name(),
                registry.generation()
            );
            self.generation = registry.generation();
        }

        let tick = self.tick;
        let rng = &mut self.rng;
        let mut draw = || rng.random::<f32>();
        let before = requests.len();

        for sample in samples {
            let Some(state) = self.agents.get_mut(&sample.agent) else {
                log::trace!("Skipping sample for unknown agent {}", sample.agent);
                self.stats.skipped_samples += 1;
                continue;
            };

            let variator = state.bind_variator(&registry);
            self.emissions.clear();
            state.classify_into(sample, &variator, registry.event_table(), tick, &mut self.emissions);

            for emission in &self.emissions {
                let association = registry.resolve(emission.surface, emission.event);
                self.dispatcher.dispatch_into(
                    emission,
                    &association,
                    &variator,
                    sample.position,
                    &mut draw,
                    requests,
                );
            }

            self.stats.samples += 1;
            self.stats.emissions += self.emissions.len() as u64;
        }

        self.stats.requests += (requests.len() - before) as u64;
        self.stats.suppressed = self.dispatcher.suppressed();
        self.stats.ticks += 1;
        self.tick += 1;
    }

    pub fn agent_state(&self, agent: AgentId) -> Option<&AgentFootstepState> {
        self.agents.get(&agent)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Tick the next call to [`tick`](Self::tick) will run
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Registry generation used by the most recent tick (0 before the first)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::AcousticCue;
    use crate::registry::RegistryBuilder;
    use crate::variator::VariatorConfig;
    use ff_core::{EventType, SurfaceIdentity};

    fn registry(stride: f32) -> RegistryHandle {
        let registry = RegistryBuilder::new("engine")
            .acoustics("stone", EventType::Walk, vec![AcousticCue::new("stone.walk")])
            .unwrap()
            .variator(
                "player",
                VariatorConfig {
                    stride,
                    ..Default::default()
                },
            )
            .build()
            .unwrap();
        RegistryHandle::new(registry)
    }

    fn walk(agent: AgentId, distance: f32) -> ContactSample {
        ContactSample::new(agent, SurfaceIdentity::named("stone")).with_delta(distance, 0.0, 0.0)
    }

    #[test]
    fn test_spawn_through_handle() {
        let (mut engine, mut handle) = FootstepEngine::create(registry(0.75), Some(1));
        assert!(handle.spawn_agent(7, "player"));
        assert_eq!(engine.agent_count(), 0);

        let requests = engine.tick(&[walk(7, 0.8)]);
        assert_eq!(engine.agent_count(), 1);
        assert_eq!(requests.len(), 1);
        assert_eq!(&*requests[0].cue, "stone.walk");
        assert_eq!(requests[0].tick, 0);
        assert_eq!(engine.current_tick(), 1);
    }

    #[test]
    fn test_unknown_agent_skipped() {
        let (mut engine, _handle) = FootstepEngine::create(registry(0.75), Some(1));
        let requests = engine.tick(&[walk(99, 5.0)]);
        assert!(requests.is_empty());
        assert_eq!(engine.stats().skipped_samples, 1);
        assert_eq!(engine.stats().samples, 0);
    }

    #[test]
    fn test_despawn_and_reset() {
        let (mut engine, mut handle) = FootstepEngine::create(registry(0.75), Some(1));
        engine.spawn_agent(1, "player");
        engine.spawn_agent(2, "player");
        engine.tick(&[walk(1, 0.5), walk(2, 0.5)]);
        assert!(engine.agent_state(1).unwrap().distance_accumulator > 0.0);

        handle.reset();
        handle.despawn_agent(2);
        engine.tick(&[]);
        assert_eq!(engine.agent_count(), 1);
        assert_eq!(engine.agent_state(1).unwrap().distance_accumulator, 0.0);
        assert_eq!(engine.agent_state(1).unwrap().class(), "player");
    }

    #[test]
    fn test_generation_change_rebinds_variator() {
        let (mut engine, handle) = FootstepEngine::create(registry(0.75), Some(1));
        engine.spawn_agent(1, "player");

        engine.tick(&[walk(1, 0.5)]);
        assert_eq!(engine.stats().emissions, 0);
        let first = engine.generation();

        let shorter = RegistryBuilder::new("short")
            .variator(
                "player",
                VariatorConfig {
                    stride: 0.1,
                    ..Default::default()
                },
            )
            .build()
            .unwrap();
        handle.registry().install(shorter);

        // accumulator 0.5 + 0.1 = 0.6 -> six strides of 0.1 (modulo rounding)
        engine.tick(&[walk(1, 0.1)]);
        assert_ne!(engine.generation(), first);
        assert!(engine.stats().emissions >= 5);
    }

    #[test]
    fn test_tick_into_sink() {
        let (mut engine, _handle) = FootstepEngine::create(registry(0.75), Some(3));
        engine.spawn_agent(1, "player");
        engine.spawn_agent(2, "player");

        let mut sink: Vec<PlaybackRequest> = Vec::new();
        let count = engine.tick_into(&[walk(1, 1.0), walk(2, 1.0)], &mut sink);
        assert_eq!(count, 2);
        assert_eq!(sink.len(), 2);
        assert_eq!(engine.stats().requests, 2);
    }

    #[test]
    fn test_full_queue() {
        let (_engine, mut handle) = FootstepEngine::create(registry(0.75), None);
        for i in 0..COMMAND_QUEUE_CAPACITY as u64 {
            assert!(handle.despawn_agent(i));
        }
        assert!(!handle.reset());
    }
}
