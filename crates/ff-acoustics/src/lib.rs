//! # Footfall Acoustics
//!
//! Decides, per simulation tick, which footstep sounds an agent should make
//! and hands the resulting playback requests to the host's audio system.
//!
//! ## Architecture
//!
//! - **Variators**: Per entity-class stride and threshold tuning
//! - **Associations**: Weighted cue lists bound to (surface, event type)
//! - **Registry**: Immutable generations of surfaces, aliases and variators,
//!   swapped atomically on reload
//! - **Classifier**: Contact samples -> step emissions
//! - **Dispatcher**: Step emissions -> deduplicated playback requests
//! - **Profile**: Versioned JSON configuration
//! - **Engine**: Tick loop and host handle
//!
//! ## Threading
//!
//! One tick thread owns all agent state. Lifecycle events arrive through a
//! lock-free queue (rtrb); reloads build a whole registry generation off the
//! tick path and install it in one swap.

pub mod association;
pub mod classifier;
pub mod dispatcher;
pub mod engine;
pub mod profile;
pub mod registry;
pub mod variator;

pub use association::*;
pub use classifier::*;
pub use dispatcher::*;
pub use engine::*;
pub use profile::*;
pub use registry::*;
pub use variator::*;

pub use ff_core::{
    AgentId, EventCategory, EventType, EventTypeTable, FfError, FfResult, Foot,
    SurfaceCapability, SurfaceIdentity, Tick,
};

/// Capacity of the host -> engine command queue
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;
