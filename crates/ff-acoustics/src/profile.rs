//! Profile System
//!
//! Load and save acoustic profiles (surfaces, aliases, transitions and
//! variators) from/to JSON and turn them into registry generations.
//!
//! Loading is lenient about shape: a surface, cue list or variator that does
//! not parse is logged and skipped. Semantic problems (cyclic transitions,
//! negative or zero weights, an unknown default surface) are fatal.

use crate::association::AcousticCue;
use crate::registry::{AcousticRegistry, RegistryBuilder};
use crate::variator::VariatorConfig;
use ff_core::{EventType, EventTypeTable, FfError, FfResult, SurfaceCapability, SurfaceIdentity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Profile format version
pub const PROFILE_VERSION: &str = "1.0";

/// Cue entry as written in a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueDef {
    /// Cue name passed to the audio sink
    pub cue: String,
    /// Selection weight; must be positive
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default = "default_one")]
    pub volume: f32,
    #[serde(default = "default_one")]
    pub pitch: f32,
    #[serde(default)]
    pub delay_ms: u32,
}

fn default_weight() -> i64 {
    1
}
fn default_one() -> f32 {
    1.0
}

impl CueDef {
    pub fn new(cue: &str, weight: i64) -> Self {
        Self {
            cue: cue.to_string(),
            weight,
            volume: 1.0,
            pitch: 1.0,
            delay_ms: 0,
        }
    }

    fn to_cue(&self) -> FfResult<AcousticCue> {
        if self.weight < 0 || self.weight > u32::MAX as i64 {
            return Err(FfError::config(format!(
                "Cue '{}' has invalid weight {}",
                self.cue, self.weight
            )));
        }
        Ok(AcousticCue::new(&self.cue)
            .with_weight(self.weight as u32)
            .with_volume(self.volume)
            .with_pitch(self.pitch)
            .with_delay(self.delay_ms))
    }
}

/// Surface entry as written in a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceDef {
    #[serde(default)]
    pub capability: SurfaceCapability,
    #[serde(default)]
    pub acoustics: BTreeMap<EventType, Vec<CueDef>>,
}

/// Complete acoustic profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticProfile {
    /// Profile format version
    pub version: String,
    #[serde(default)]
    pub name: String,
    /// Surface used when nothing more specific matches
    #[serde(default)]
    pub default_surface: Option<String>,
    /// Event graph overrides; `null` makes an event terminal
    #[serde(default)]
    pub transitions: BTreeMap<EventType, Option<EventType>>,
    /// Surface name -> surface it sounds like
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub surfaces: BTreeMap<String, SurfaceDef>,
    /// Entity class -> variator
    #[serde(default)]
    pub variators: BTreeMap<String, VariatorConfig>,
}

impl Default for AcousticProfile {
    fn default() -> Self {
        Self {
            version: PROFILE_VERSION.to_string(),
            name: String::new(),
            default_surface: None,
            transitions: BTreeMap::new(),
            aliases: BTreeMap::new(),
            surfaces: BTreeMap::new(),
            variators: BTreeMap::new(),
        }
    }
}

impl AcousticProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load profile from JSON string
    pub fn from_json(json: &str) -> FfResult<Self> {
        let raw: Value = serde_json::from_str(json)?;
        if !raw.is_object() {
            return Err(FfError::config("Profile must be a JSON object"));
        }

        let version = raw["version"].as_str().unwrap_or(PROFILE_VERSION);
        if version != PROFILE_VERSION {
            return Err(FfError::config(format!(
                "Unknown profile version: {}",
                version
            )));
        }

        let transitions = match raw.get("transitions") {
            Some(v) if !v.is_null() => serde_json::from_value(v.clone()).map_err(|e| {
                FfError::config(format!("Invalid transitions table: {}", e))
            })?,
            _ => BTreeMap::new(),
        };

        let mut aliases = BTreeMap::new();
        for (from, to) in object_entries(&raw, "aliases") {
            match to.as_str() {
                Some(to) => {
                    aliases.insert(from.clone(), to.to_string());
                }
                None => log::warn!("Skipping alias '{}': target is not a string", from),
            }
        }

        let surfaces = object_entries(&raw, "surfaces")
            .filter_map(|(name, value)| Some((name.clone(), parse_surface(name, value)?)))
            .collect();

        let variators = object_entries(&raw, "variators")
            .filter_map(|(class, value)| {
                match serde_json::from_value::<VariatorConfig>(value.clone()) {
                    Ok(config) => match config.validate() {
                        Ok(()) => Some((class.clone(), config)),
                        Err(e) => {
                            log::warn!("Skipping variator '{}': {}", class, e);
                            None
                        }
                    },
                    Err(e) => {
                        log::warn!("Skipping malformed variator '{}': {}", class, e);
                        None
                    }
                }
            })
            .collect();

        Ok(Self {
            version: version.to_string(),
            name: raw["name"].as_str().unwrap_or_default().to_string(),
            default_surface: raw["default_surface"].as_str().map(str::to_string),
            transitions,
            aliases,
            surfaces,
            variators,
        })
    }

    /// Load profile from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> FfResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Save profile to JSON string
    pub fn to_json(&self) -> FfResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Event table with this profile's overrides applied
    pub fn event_table(&self) -> FfResult<EventTypeTable> {
        EventTypeTable::builtin().with_overrides(self.transitions.iter().map(|(k, v)| (*k, *v)))
    }

    /// Build a registry generation from this profile
    pub fn to_registry(&self) -> FfResult<AcousticRegistry> {
        let name = if self.name.is_empty() { "profile" } else { self.name.as_str() };
        let mut builder = RegistryBuilder::new(name).event_table(self.event_table()?);

        for (surface, def) in &self.surfaces {
            builder = builder.surface(surface, def.capability);
            for (event, cues) in &def.acoustics {
                let cues = cues.iter().map(CueDef::to_cue).collect::<FfResult<Vec<_>>>()?;
                builder = builder.acoustics(surface, *event, cues)?;
            }
        }

        for (from, to) in &self.aliases {
            builder = builder.alias(from, to);
        }

        if let Some(default_surface) = &self.default_surface {
            builder = builder.default_surface(default_surface);
        }

        for (class, config) in &self.variators {
            builder = builder.variator(class, config.clone());
        }

        builder.build()
    }

    /// Collect every problem instead of stopping at the first
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.event_table() {
            errors.push(reason(e));
        }

        for (surface, def) in &self.surfaces {
            for (event, cues) in &def.acoustics {
                if cues.is_empty() {
                    errors.push(format!("Surface '{}' event '{}' has no cues", surface, event));
                    continue;
                }
                for cue in cues.iter().filter(|c| c.weight < 0 || c.weight > u32::MAX as i64) {
                    errors.push(format!(
                        "Surface '{}' event '{}': cue '{}' has weight {}",
                        surface, event, cue.cue, cue.weight
                    ));
                }
                if cues.iter().all(|c| c.weight <= 0) {
                    errors.push(format!(
                        "Surface '{}' event '{}': cues have a total weight of zero",
                        surface, event
                    ));
                }
            }
        }

        let mut names: HashMap<SurfaceIdentity, &str> = HashMap::new();
        for name in self.surfaces.keys().chain(self.aliases.keys()) {
            if let Some(known) = names.insert(SurfaceIdentity::named(name), name) {
                if known != name.as_str() {
                    errors.push(format!("Surface '{}' collides with '{}'", name, known));
                }
            }
        }

        if let Some(default_surface) = &self.default_surface {
            if !self.surfaces.contains_key(default_surface) {
                errors.push(format!("Default surface '{}' is not defined", default_surface));
            }
        }

        for (from, to) in &self.aliases {
            if self.surfaces.contains_key(from) {
                errors.push(format!("Alias '{}' shadows a defined surface", from));
            }

            let mut target = to;
            let mut hops = 0;
            while let Some(next) = self.aliases.get(target) {
                hops += 1;
                if hops > self.aliases.len() {
                    break;
                }
                target = next;
            }
            if hops > self.aliases.len() {
                errors.push(format!("Alias chain from '{}' is cyclic", from));
            } else if !self.surfaces.contains_key(target) {
                errors.push(format!(
                    "Alias '{}' does not lead to a defined surface ('{}' is unknown)",
                    from, target
                ));
            }
        }

        for (class, config) in &self.variators {
            if let Err(e) = config.validate() {
                errors.push(format!("Variator '{}': {}", class, reason(e)));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn variator_count(&self) -> usize {
        self.variators.len()
    }
}

/// Error text without the variant prefix
fn reason(error: FfError) -> String {
    match error {
        FfError::Configuration(msg) => msg,
        other => other.to_string(),
    }
}

fn object_entries<'a>(raw: &'a Value, key: &str) -> impl Iterator<Item = (&'a String, &'a Value)> {
    let map = match raw.get(key) {
        Some(Value::Object(map)) => Some(map),
        Some(Value::Null) | None => None,
        Some(_) => {
            log::warn!("Ignoring '{}': expected an object", key);
            None
        }
    };
    map.into_iter().flat_map(|m| m.iter())
}

/// Parse one surface, dropping cue lists that do not parse
fn parse_surface(name: &str, value: &Value) -> Option<SurfaceDef> {
    let Value::Object(fields) = value else {
        log::warn!("Skipping surface '{}': expected an object", name);
        return None;
    };

    let capability = match fields.get("capability") {
        None | Some(Value::Null) => SurfaceCapability::default(),
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(capability) => capability,
            Err(e) => {
                log::warn!("Skipping surface '{}': bad capability: {}", name, e);
                return None;
            }
        },
    };

    let mut acoustics = BTreeMap::new();
    if let Some(Value::Object(events)) = fields.get("acoustics") {
        for (event_name, cues) in events {
            let event = match event_name.parse::<EventType>() {
                Ok(event) => event,
                Err(_) => {
                    log::warn!("Skipping '{}' on surface '{}': unknown event type", event_name, name);
                    continue;
                }
            };
            match serde_json::from_value::<Vec<CueDef>>(cues.clone()) {
                Ok(cues) => {
                    acoustics.insert(event, cues);
                }
                Err(e) => {
                    log::warn!("Skipping '{}' on surface '{}': {}", event_name, name, e);
                }
            }
        }
    }

    Some(SurfaceDef { capability, acoustics })
}

/// Profile builder for fluent API
pub struct ProfileBuilder {
    profile: AcousticProfile,
}

impl ProfileBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            profile: AcousticProfile {
                name: name.to_string(),
                ..AcousticProfile::new()
            },
        }
    }

    pub fn surface(mut self, name: &str, capability: SurfaceCapability) -> Self {
        self.profile
            .surfaces
            .entry(name.to_string())
            .or_default()
            .capability = capability;
        self
    }

    pub fn cues(mut self, surface: &str, event: EventType, cues: Vec<CueDef>) -> Self {
        self.profile
            .surfaces
            .entry(surface.to_string())
            .or_default()
            .acoustics
            .insert(event, cues);
        self
    }

    pub fn alias(mut self, from: &str, to: &str) -> Self {
        self.profile.aliases.insert(from.to_string(), to.to_string());
        self
    }

    pub fn transition(mut self, from: EventType, to: Option<EventType>) -> Self {
        self.profile.transitions.insert(from, to);
        self
    }

    pub fn default_surface(mut self, name: &str) -> Self {
        self.profile.default_surface = Some(name.to_string());
        self
    }

    pub fn variator(mut self, class: &str, config: VariatorConfig) -> Self {
        self.profile.variators.insert(class.to_string(), config);
        self
    }

    pub fn build(self) -> AcousticProfile {
        self.profile
    }
}
