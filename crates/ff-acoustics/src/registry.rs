//! Registry Generations
//!
//! A registry generation is an immutable snapshot of everything derived from
//! configuration: the event type table, per-surface acoustics, aliases and
//! variators. Reloading builds a complete new generation off the tick path
//! and swaps it in through a [`RegistryHandle`]; readers clone the `Arc`
//! once per tick and never see a half-built registry.
//!
//! Resolution results for every registered surface and event type are
//! materialised when the generation is built, so `resolve` on the tick path
//! is one hash lookup and returns the same `Arc` every time.

use crate::association::{AcousticAssociation, AcousticCue};
use crate::variator::{VariatorConfig, VariatorRegistry};
use ff_core::{EventType, EventTypeTable, FfError, FfResult, SurfaceCapability, SurfaceIdentity};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global generation counter
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

type Row = [Arc<AcousticAssociation>; EventType::COUNT];

/// Per-surface acoustics as configured
#[derive(Debug, Clone)]
struct SurfaceEntry {
    name: String,
    capability: SurfaceCapability,
    acoustics: [Option<Arc<AcousticAssociation>>; EventType::COUNT],
}

impl SurfaceEntry {
    fn new(name: &str, capability: SurfaceCapability) -> Self {
        Self {
            name: name.to_string(),
            capability,
            acoustics: Default::default(),
        }
    }

    /// Direct hit, then each simpler event along the transition chain
    fn walk_chain(
        &self,
        table: &EventTypeTable,
        event: EventType,
    ) -> Option<&Arc<AcousticAssociation>> {
        table
            .chain(event)
            .find_map(|e| self.acoustics[e.index()].as_ref())
    }
}

/// Immutable registry generation
#[derive(Debug)]
pub struct AcousticRegistry {
    generation: u64,
    name: String,
    table: EventTypeTable,
    surfaces: HashMap<SurfaceIdentity, SurfaceEntry>,
    aliases: HashMap<SurfaceIdentity, SurfaceIdentity>,
    default_surface: Option<SurfaceIdentity>,
    variators: VariatorRegistry,
    resolved: HashMap<SurfaceIdentity, Row>,
    fallback_row: Row,
    silent: Arc<AcousticAssociation>,
}

impl AcousticRegistry {
    /// Registry with no surfaces: everything resolves to silence
    pub fn empty() -> Self {
        RegistryBuilder::new("empty")
            .build()
            .unwrap_or_else(|_| unreachable!("an empty registry is always valid"))
    }

    pub fn builder(name: &str) -> RegistryBuilder {
        RegistryBuilder::new(name)
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_table(&self) -> &EventTypeTable {
        &self.table
    }

    pub fn variators(&self) -> &VariatorRegistry {
        &self.variators
    }

    /// Variator for an entity class (falls back to the default class)
    pub fn variator(&self, class: &str) -> &Arc<VariatorConfig> {
        self.variators.get(class)
    }

    pub fn default_surface(&self) -> Option<SurfaceIdentity> {
        self.default_surface
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Number of configured (surface, event) entries
    pub fn association_count(&self) -> usize {
        self.surfaces
            .values()
            .map(|s| s.acoustics.iter().filter(|a| a.is_some()).count())
            .sum()
    }

    pub fn surface_name(&self, surface: SurfaceIdentity) -> Option<&str> {
        self.surfaces.get(&surface).map(|s| s.name.as_str())
    }

    /// Capability of a surface after alias resolution
    pub fn capability(&self, surface: SurfaceIdentity) -> SurfaceCapability {
        self.surfaces
            .get(&self.canonical(surface))
            .map(|s| s.capability)
            .unwrap_or_default()
    }

    /// Follow aliases to the surface that actually carries acoustics
    pub fn canonical(&self, surface: SurfaceIdentity) -> SurfaceIdentity {
        self.aliases.get(&surface).copied().unwrap_or(surface)
    }

    pub fn silent(&self) -> &Arc<AcousticAssociation> {
        &self.silent
    }

    /// Resolve the acoustics for a surface and event. Never fails: misses
    /// fall back along the event chain, then to the default surface, then to
    /// silence.
    #[inline]
    pub fn resolve(&self, surface: SurfaceIdentity, event: EventType) -> Arc<AcousticAssociation> {
        let row = self.resolved.get(&surface).unwrap_or(&self.fallback_row);
        Arc::clone(&row[event.index()])
    }

    /// Resolution without the materialised cache
    fn resolve_uncached(&self, surface: SurfaceIdentity, event: EventType) -> Arc<AcousticAssociation> {
        let surface = self.canonical(surface);

        if let Some(entry) = self.surfaces.get(&surface) {
            if !entry.capability.emits() {
                return Arc::clone(&self.silent);
            }
            if let Some(found) = entry.walk_chain(&self.table, event) {
                return Arc::clone(found);
            }
            log::trace!("Lookup miss: '{}' has no '{}' acoustics", entry.name, event);
        }

        if let Some(found) = self
            .default_surface
            .and_then(|d| self.surfaces.get(&d))
            .and_then(|d| d.walk_chain(&self.table, event))
        {
            return Arc::clone(found);
        }

        Arc::clone(&self.silent)
    }

    fn row_for(&self, surface: SurfaceIdentity) -> Row {
        std::array::from_fn(|i| self.resolve_uncached(surface, EventType::ALL[i]))
    }

    fn materialise(&mut self) {
        let mut keys: Vec<SurfaceIdentity> = self.surfaces.keys().copied().collect();
        keys.extend(self.aliases.keys().copied());

        let resolved = keys
            .into_iter()
            .map(|surface| (surface, self.row_for(surface)))
            .collect();
        self.fallback_row = self.row_for(SurfaceIdentity::UNKNOWN);
        self.resolved = resolved;
    }
}

/// Builder for a registry generation
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    name: String,
    table: EventTypeTable,
    surfaces: HashMap<SurfaceIdentity, SurfaceEntry>,
    aliases: HashMap<SurfaceIdentity, AliasEntry>,
    default_surface: Option<String>,
    variators: VariatorRegistry,
    collisions: Vec<String>,
}

#[derive(Debug, Clone)]
struct AliasEntry {
    name: String,
    target_name: String,
    target: SurfaceIdentity,
}

impl RegistryBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: EventTypeTable::builtin(),
            surfaces: HashMap::new(),
            aliases: HashMap::new(),
            default_surface: None,
            variators: VariatorRegistry::new(),
            collisions: Vec::new(),
        }
    }

    /// Identity for `name`, noting a hash clash with a different name
    fn identify(&mut self, name: &str) -> SurfaceIdentity {
        let id = SurfaceIdentity::named(name);
        let known = self
            .surfaces
            .get(&id)
            .map(|s| &s.name)
            .or_else(|| self.aliases.get(&id).map(|a| &a.name));
        if let Some(known) = known.filter(|k| k.as_str() != name) {
            let message = format!("Surface '{}' collides with '{}'", name, known);
            self.collisions.push(message);
        }
        id
    }

    pub fn event_table(mut self, table: EventTypeTable) -> Self {
        self.table = table;
        self
    }

    /// Declare a surface (idempotent; a later call updates the capability)
    pub fn surface(mut self, name: &str, capability: SurfaceCapability) -> Self {
        let id = self.identify(name);
        self.surfaces
            .entry(id)
            .and_modify(|s| s.capability = capability)
            .or_insert_with(|| SurfaceEntry::new(name, capability));
        self
    }

    /// Attach acoustics for one event type, declaring the surface if needed
    pub fn acoustics(
        mut self,
        surface: &str,
        event: EventType,
        cues: Vec<AcousticCue>,
    ) -> FfResult<Self> {
        let association = AcousticAssociation::new(cues).map_err(|e| match e {
            FfError::Configuration(msg) => {
                FfError::config(format!("Surface '{}' event '{}': {}", surface, event, msg))
            }
            other => other,
        })?;
        let id = self.identify(surface);
        let entry = self
            .surfaces
            .entry(id)
            .or_insert_with(|| SurfaceEntry::new(surface, SurfaceCapability::Normal));
        entry.acoustics[event.index()] = Some(Arc::new(association));
        Ok(self)
    }

    /// Make `from` sound exactly like `to`
    pub fn alias(mut self, from: &str, to: &str) -> Self {
        let id = self.identify(from);
        self.aliases.insert(
            id,
            AliasEntry {
                name: from.to_string(),
                target_name: to.to_string(),
                target: SurfaceIdentity::named(to),
            },
        );
        self
    }

    pub fn default_surface(mut self, name: &str) -> Self {
        self.default_surface = Some(name.to_string());
        self
    }

    pub fn variator(mut self, class: &str, config: VariatorConfig) -> Self {
        self.variators.register(class, config);
        self
    }

    /// Validate and freeze into a new generation
    pub fn build(self) -> FfResult<AcousticRegistry> {
        if let Some(collision) = self.collisions.first() {
            return Err(FfError::config(collision.clone()));
        }
        for alias in self.aliases.values() {
            Self::check_name(&self.surfaces, alias.target, &alias.target_name)?;
        }

        let default_surface = match &self.default_surface {
            Some(name) => {
                let id = SurfaceIdentity::named(name);
                if !self.surfaces.contains_key(&id) {
                    return Err(FfError::config(format!(
                        "Default surface '{}' is not registered",
                        name
                    )));
                }
                Self::check_name(&self.surfaces, id, name)?;
                Some(id)
            }
            None => None,
        };

        let aliases = Self::flatten_aliases(&self.aliases, &self.surfaces)?;

        let silent = Arc::new(AcousticAssociation::silent());
        let mut registry = AcousticRegistry {
            generation: next_generation(),
            name: self.name,
            table: self.table,
            surfaces: self.surfaces,
            aliases,
            default_surface,
            variators: self.variators,
            resolved: HashMap::new(),
            fallback_row: std::array::from_fn(|_| Arc::clone(&silent)),
            silent,
        };
        registry.materialise();

        log::debug!(
            "Built registry '{}' generation {} ({} surfaces, {} aliases, {} variators)",
            registry.name,
            registry.generation,
            registry.surfaces.len(),
            registry.aliases.len(),
            registry.variators.len()
        );
        Ok(registry)
    }

    /// A registered surface under `id` must carry `name`
    fn check_name(
        surfaces: &HashMap<SurfaceIdentity, SurfaceEntry>,
        id: SurfaceIdentity,
        name: &str,
    ) -> FfResult<()> {
        match surfaces.get(&id) {
            Some(entry) if entry.name != name => Err(FfError::config(format!(
                "Surface '{}' collides with '{}'",
                name, entry.name
            ))),
            _ => Ok(()),
        }
    }

    fn flatten_aliases(
        aliases: &HashMap<SurfaceIdentity, AliasEntry>,
        surfaces: &HashMap<SurfaceIdentity, SurfaceEntry>,
    ) -> FfResult<HashMap<SurfaceIdentity, SurfaceIdentity>> {
        let mut flat = HashMap::with_capacity(aliases.len());

        for (from, alias) in aliases {
            let name = &alias.name;
            if surfaces.contains_key(from) {
                return Err(FfError::config(format!(
                    "Surface '{}' is both an alias and has its own acoustics",
                    name
                )));
            }

            let mut target = alias.target;
            let mut hops = 0;
            while let Some(next) = aliases.get(&target) {
                hops += 1;
                if hops > aliases.len() {
                    return Err(FfError::config(format!(
                        "Alias chain from '{}' is cyclic",
                        name
                    )));
                }
                target = next.target;
            }
            if target == *from {
                return Err(FfError::config(format!("Surface '{}' aliases itself", name)));
            }
            if !surfaces.contains_key(&target) {
                return Err(FfError::config(format!(
                    "Alias '{}' does not lead to a registered surface",
                    name
                )));
            }
            flat.insert(*from, target);
        }

        Ok(flat)
    }
}

/// Shared handle to the current registry generation
///
/// Cloning the handle shares the slot. `install` swaps in a complete
/// generation; `snapshot` hands out the current one.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<AcousticRegistry>>>,
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new(AcousticRegistry::empty())
    }
}

impl RegistryHandle {
    pub fn new(registry: AcousticRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Current generation
    #[inline]
    pub fn snapshot(&self) -> Arc<AcousticRegistry> {
        let current = self.current.read();
        Arc::clone(&*current)
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation()
    }

    /// Replace the current generation, returning the previous one
    pub fn install(&self, registry: AcousticRegistry) -> Arc<AcousticRegistry> {
        let registry = Arc::new(registry);
        let previous = std::mem::replace(&mut *self.current.write(), registry);
        log::debug!(
            "Registry generation {} replaced generation {}",
            self.generation(),
            previous.generation()
        );
        previous
    }

    /// Build a generation and install it. On error the current one stays.
    pub fn reload_with(
        &self,
        build: impl FnOnce() -> FfResult<AcousticRegistry>,
    ) -> FfResult<u64> {
        match build() {
            Ok(registry) => {
                let generation = registry.generation();
                self.install(registry);
                Ok(generation)
            }
            Err(e) => {
                log::warn!(
                    "Registry reload failed, keeping generation {}: {}",
                    self.generation(),
                    e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues(names: &[(&str, u32)]) -> Vec<AcousticCue> {
        names
            .iter()
            .map(|(n, w)| AcousticCue::new(n).with_weight(*w))
            .collect()
    }

    fn sample_registry() -> AcousticRegistry {
        RegistryBuilder::new("test")
            .acoustics("stone", EventType::Walk, cues(&[("stone.walk", 1)]))
            .unwrap()
            .acoustics("stone", EventType::Run, cues(&[("stone.run", 1)]))
            .unwrap()
            .acoustics("default", EventType::Walk, cues(&[("default.walk", 1)]))
            .unwrap()
            .acoustics("default", EventType::Swim, cues(&[("default.swim", 1)]))
            .unwrap()
            .surface("air", SurfaceCapability::NotEmitter)
            .alias("cobblestone", "stone")
            .default_surface("default")
            .build()
            .unwrap()
    }

    fn first_cue(assoc: &AcousticAssociation) -> &str {
        &assoc.cues()[0].name
    }

    #[test]
    fn test_direct_hit() {
        let registry = sample_registry();
        let stone = SurfaceIdentity::named("stone");
        assert_eq!(first_cue(&registry.resolve(stone, EventType::Run)), "stone.run");
    }

    #[test]
    fn test_chain_walk_before_default() {
        let registry = sample_registry();
        let stone = SurfaceIdentity::named("stone");
        // land -> run on the same surface
        assert_eq!(first_cue(&registry.resolve(stone, EventType::Land)), "stone.run");
        // climb -> walk
        assert_eq!(first_cue(&registry.resolve(stone, EventType::Climb)), "stone.walk");
    }

    #[test]
    fn test_default_surface_fallback() {
        let registry = sample_registry();
        let stone = SurfaceIdentity::named("stone");
        assert_eq!(first_cue(&registry.resolve(stone, EventType::Swim)), "default.swim");

        let unregistered = SurfaceIdentity::named("marble");
        assert_eq!(first_cue(&registry.resolve(unregistered, EventType::Run)), "default.walk");
        assert_eq!(
            first_cue(&registry.resolve(SurfaceIdentity::UNKNOWN, EventType::Walk)),
            "default.walk"
        );
    }

    #[test]
    fn test_silent_when_nothing_matches() {
        let registry = sample_registry();
        // jump -> wander, neither on stone nor default
        assert!(registry.resolve(SurfaceIdentity::named("stone"), EventType::Jump).is_silent());
        assert!(registry.resolve(SurfaceIdentity::named("air"), EventType::Walk).is_silent());
    }

    #[test]
    fn test_alias() {
        let registry = sample_registry();
        let cobble = SurfaceIdentity::named("cobblestone");
        assert_eq!(registry.canonical(cobble), SurfaceIdentity::named("stone"));
        assert_eq!(first_cue(&registry.resolve(cobble, EventType::Walk)), "stone.walk");
    }

    #[test]
    fn test_resolve_returns_same_arc() {
        let registry = sample_registry();
        let stone = SurfaceIdentity::named("stone");
        let a = registry.resolve(stone, EventType::Land);
        let b = registry.resolve(stone, EventType::Land);
        assert!(Arc::ptr_eq(&a, &b));

        let x = registry.resolve(SurfaceIdentity::named("nowhere"), EventType::Walk);
        let y = registry.resolve(SurfaceIdentity::named("elsewhere"), EventType::Walk);
        assert!(Arc::ptr_eq(&x, &y));
    }

    #[test]
    fn test_no_default_is_silent() {
        let registry = RegistryBuilder::new("bare")
            .acoustics("stone", EventType::Walk, cues(&[("stone.walk", 1)]))
            .unwrap()
            .build()
            .unwrap();
        assert!(registry.resolve(SurfaceIdentity::named("sand"), EventType::Walk).is_silent());
        assert!(AcousticRegistry::empty().resolve(SurfaceIdentity::UNKNOWN, EventType::Run).is_silent());
    }

    #[test]
    fn test_unknown_default_rejected() {
        let result = RegistryBuilder::new("bad").default_surface("missing").build();
        assert!(matches!(result, Err(FfError::Configuration(_))));
    }

    #[test]
    fn test_cyclic_alias_rejected() {
        let result = RegistryBuilder::new("bad")
            .alias("a", "b")
            .alias("b", "a")
            .build();
        assert!(matches!(result, Err(FfError::Configuration(_))));
    }

    #[test]
    fn test_alias_chain_flattened() {
        let registry = RegistryBuilder::new("chain")
            .acoustics("stone", EventType::Walk, cues(&[("stone.walk", 1)]))
            .unwrap()
            .alias("mossy_cobble", "cobble")
            .alias("cobble", "stone")
            .build()
            .unwrap();
        assert_eq!(
            registry.canonical(SurfaceIdentity::named("mossy_cobble")),
            SurfaceIdentity::named("stone")
        );
    }

    #[test]
    fn test_zero_weight_rejected() {
        let result = RegistryBuilder::new("bad").acoustics("stone", EventType::Walk, cues(&[("x", 0)]));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("Surface 'stone' event 'walk'"));
        assert_eq!(message.matches("Configuration error").count(), 1);
    }

    #[test]
    fn test_zero_weight_cue_accepted_with_positive_total() {
        let registry = RegistryBuilder::new("mixed")
            .acoustics("stone", EventType::Walk, cues(&[("never", 0), ("always", 3)]))
            .unwrap()
            .build()
            .unwrap();
        let assoc = registry.resolve(SurfaceIdentity::named("stone"), EventType::Walk);
        assert_eq!(assoc.total_weight(), 3);
        assert_eq!(&*assoc.select(0.0).unwrap().name, "always");
    }

    #[test]
    fn test_hash_collision_rejected() {
        // Both names hash to 0xc14f2d96
        assert_eq!(
            SurfaceIdentity::named("b382@biome19"),
            SurfaceIdentity::named("b897@biome100")
        );

        let result = RegistryBuilder::new("clash")
            .acoustics("b382@biome19", EventType::Walk, cues(&[("snow.walk", 1)]))
            .unwrap()
            .acoustics("b897@biome100", EventType::Walk, cues(&[("sand.walk", 1)]))
            .unwrap()
            .build();
        match result {
            Err(FfError::Configuration(msg)) => {
                assert!(msg.contains("b897@biome100"));
                assert!(msg.contains("b382@biome19"));
            }
            other => panic!("expected a collision error, got {:?}", other.map(|r| r.name().to_string())),
        }
    }

    #[test]
    fn test_alias_hash_collision_rejected() {
        let alias_clash = RegistryBuilder::new("clash")
            .acoustics("b382@biome19", EventType::Walk, cues(&[("snow.walk", 1)]))
            .unwrap()
            .alias("b897@biome100", "b382@biome19")
            .build();
        assert!(matches!(alias_clash, Err(FfError::Configuration(_))));

        let target_clash = RegistryBuilder::new("clash")
            .acoustics("b382@biome19", EventType::Walk, cues(&[("snow.walk", 1)]))
            .unwrap()
            .alias("gravel", "b897@biome100")
            .build();
        assert!(matches!(target_clash, Err(FfError::Configuration(_))));
    }

    #[test]
    fn test_alias_to_unknown_surface_rejected() {
        let result = RegistryBuilder::new("bad")
            .acoustics("stone", EventType::Walk, cues(&[("stone.walk", 1)]))
            .unwrap()
            .alias("gravel", "nowhere")
            .build();
        assert!(matches!(result, Err(FfError::Configuration(_))));
    }

    #[test]
    fn test_generations_increase() {
        let a = sample_registry();
        let b = sample_registry();
        assert!(b.generation() > a.generation());
    }

    #[test]
    fn test_handle_reload_keeps_old_on_error() {
        let handle = RegistryHandle::new(sample_registry());
        let before = handle.generation();

        let result = handle.reload_with(|| RegistryBuilder::new("bad").default_surface("nope").build());
        assert!(result.is_err());
        assert_eq!(handle.generation(), before);

        let new_generation = handle.reload_with(|| Ok(sample_registry())).unwrap();
        assert_eq!(handle.generation(), new_generation);
        assert_ne!(new_generation, before);
    }

    #[test]
    fn test_snapshot_survives_install() {
        let handle = RegistryHandle::new(sample_registry());
        let old = handle.snapshot();
        handle.install(AcousticRegistry::empty());

        // Old snapshot still resolves against its own generation
        assert!(!old.resolve(SurfaceIdentity::named("stone"), EventType::Walk).is_silent());
        assert!(handle.snapshot().resolve(SurfaceIdentity::named("stone"), EventType::Walk).is_silent());
    }
}
