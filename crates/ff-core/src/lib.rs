//! ff-core: Shared types for Footfall
//!
//! Surface identities, the motion event graph and the error taxonomy used by
//! every Footfall crate.

mod error;
mod event_type;
mod surface;

pub use error::*;
pub use event_type::*;
pub use surface::*;

/// Opaque agent handle supplied by the host
pub type AgentId = u64;

/// Simulation tick counter
pub type Tick = u64;

/// Which foot produced a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Foot {
    #[default]
    Left,
    Right,
}

impl Foot {
    #[inline]
    pub fn other(self) -> Self {
        match self {
            Foot::Left => Foot::Right,
            Foot::Right => Foot::Left,
        }
    }
}
