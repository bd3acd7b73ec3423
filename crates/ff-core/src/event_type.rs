//! Event Type Table
//!
//! Motion events form a small directed graph. Terminal types (walk, wander,
//! swim) have no target; every other type points at exactly one "simpler"
//! type, which is what the resolver falls back to when a surface has no
//! acoustics for the original event.
//!
//! ```text
//!   land ──▶ run ──▶ walk ◀── climb / up / down
//!   climb_run / up_run / down_run ──▶ run
//!   jump ──▶ wander
//!   swim
//! ```

use crate::error::{FfError, FfResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a motion event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventType {
    Walk = 0,
    Wander = 1,
    Swim = 2,
    Run = 3,
    Jump = 4,
    Land = 5,
    Climb = 6,
    ClimbRun = 7,
    Down = 8,
    DownRun = 9,
    Up = 10,
    UpRun = 11,
}

impl EventType {
    pub const COUNT: usize = 12;

    pub const ALL: [EventType; Self::COUNT] = [
        EventType::Walk,
        EventType::Wander,
        EventType::Swim,
        EventType::Run,
        EventType::Jump,
        EventType::Land,
        EventType::Climb,
        EventType::ClimbRun,
        EventType::Down,
        EventType::DownRun,
        EventType::Up,
        EventType::UpRun,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            EventType::Walk => "walk",
            EventType::Wander => "wander",
            EventType::Swim => "swim",
            EventType::Run => "run",
            EventType::Jump => "jump",
            EventType::Land => "land",
            EventType::Climb => "climb",
            EventType::ClimbRun => "climb_run",
            EventType::Down => "down",
            EventType::DownRun => "down_run",
            EventType::Up => "up",
            EventType::UpRun => "up_run",
        }
    }

    /// Dedup class used by the dispatcher
    pub fn category(self) -> EventCategory {
        match self {
            EventType::Jump => EventCategory::Jump,
            EventType::Land => EventCategory::Land,
            EventType::Swim => EventCategory::Swim,
            _ => EventCategory::Step,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventType {
    type Err = FfError;

    fn from_str(s: &str) -> FfResult<Self> {
        EventType::ALL
            .iter()
            .copied()
            .find(|e| e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FfError::config(format!("Unknown event type: {}", s)))
    }
}

/// At most one playback request per agent and category per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Step,
    Jump,
    Land,
    Swim,
}

/// Validated transition graph over [`EventType`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypeTable {
    targets: [Option<EventType>; EventType::COUNT],
}

impl EventTypeTable {
    /// Build a table from explicit edges. Types without an edge are terminal.
    pub fn new(edges: impl IntoIterator<Item = (EventType, EventType)>) -> FfResult<Self> {
        let mut targets = [None; EventType::COUNT];
        for (from, to) in edges {
            if let Some(existing) = targets[from.index()] {
                if existing != to {
                    return Err(FfError::config(format!(
                        "Event type '{}' has two transition targets ('{}', '{}')",
                        from, existing, to
                    )));
                }
            }
            targets[from.index()] = Some(to);
        }

        let table = Self { targets };
        table.validate()?;
        Ok(table)
    }

    /// The reference graph
    pub fn builtin() -> Self {
        Self {
            targets: [
                None,                    // walk
                None,                    // wander
                None,                    // swim
                Some(EventType::Walk),   // run
                Some(EventType::Wander), // jump
                Some(EventType::Run),    // land
                Some(EventType::Walk),   // climb
                Some(EventType::Run),    // climb_run
                Some(EventType::Walk),   // down
                Some(EventType::Run),    // down_run
                Some(EventType::Walk),   // up
                Some(EventType::Run),    // up_run
            ],
        }
    }

    /// Copy of this table with some edges replaced. `None` makes a type terminal.
    pub fn with_overrides(
        &self,
        overrides: impl IntoIterator<Item = (EventType, Option<EventType>)>,
    ) -> FfResult<Self> {
        let mut table = self.clone();
        for (from, to) in overrides {
            log::debug!("Transition override: {} -> {:?}", from, to);
            table.targets[from.index()] = to;
        }
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> FfResult<()> {
        for event in EventType::ALL {
            if self.targets[event.index()] == Some(event) {
                return Err(FfError::config(format!(
                    "Event type '{}' transitions to itself",
                    event
                )));
            }

            let mut current = event;
            let mut hops = 0;
            while let Some(next) = self.targets[current.index()] {
                hops += 1;
                if hops > EventType::COUNT {
                    return Err(FfError::config(format!(
                        "Transition chain from '{}' does not terminate",
                        event
                    )));
                }
                current = next;
            }
        }
        Ok(())
    }

    #[inline]
    pub fn can_transition(&self, event: EventType) -> bool {
        self.targets[event.index()].is_some()
    }

    /// Next type in the chain. Terminal types have none.
    pub fn transition_target(&self, event: EventType) -> FfResult<EventType> {
        self.targets[event.index()].ok_or_else(|| {
            FfError::InvalidState(format!("Event type '{}' is terminal", event))
        })
    }

    /// Follow the chain to its terminal type
    pub fn final_form(&self, event: EventType) -> EventType {
        self.chain(event).last().unwrap_or(event)
    }

    /// The event itself followed by every type reachable from it
    pub fn chain(&self, event: EventType) -> impl Iterator<Item = EventType> + '_ {
        std::iter::successors(Some(event), move |e| self.targets[e.index()])
    }

    /// Current edges, terminal types omitted
    pub fn edges(&self) -> impl Iterator<Item = (EventType, EventType)> + '_ {
        EventType::ALL
            .iter()
            .filter_map(move |e| self.targets[e.index()].map(|t| (*e, t)))
    }
}

impl Default for EventTypeTable {
    fn default() -> Self {
        Self::builtin()
    }
}
