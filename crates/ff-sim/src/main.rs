//! Footfall Simulator
//!
//! Usage:
//!   ff-sim validate <profile>                    - Check a profile and print counts
//!   ff-sim replay <profile> <trace> [--seed N]   - Replay a movement trace
//!   ff-sim resolve <profile> <surface> <event>   - Show what a lookup resolves to

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;

use ff_acoustics::{AcousticProfile, ContactSample, FootstepEngine, RegistryHandle};
use ff_core::{AgentId, EventType, SurfaceIdentity};

#[derive(Parser)]
#[command(name = "ff-sim", about = "Footfall acoustic profile tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a profile and report what it defines
    Validate {
        /// Profile JSON file
        profile: PathBuf,
    },
    /// Replay a movement trace and print one JSON line per playback request
    Replay {
        profile: PathBuf,
        /// Trace JSON file (list of tick frames)
        trace: PathBuf,
        /// RNG seed for cue selection and jitter
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
    },
    /// Resolve a surface/event pair against a profile
    Resolve {
        profile: PathBuf,
        surface: String,
        event: String,
    },
}

/// One tick of a recorded trace
#[derive(Debug, Default, Deserialize)]
struct TraceFrame {
    #[serde(default)]
    spawn: Vec<SpawnRecord>,
    #[serde(default)]
    despawn: Vec<AgentId>,
    #[serde(default)]
    samples: Vec<SampleRecord>,
}

#[derive(Debug, Deserialize)]
struct SpawnRecord {
    agent: AgentId,
    #[serde(default = "default_class")]
    class: String,
}

fn default_class() -> String {
    ff_acoustics::DEFAULT_VARIATOR_CLASS.to_string()
}

#[derive(Debug, Deserialize)]
struct SampleRecord {
    agent: AgentId,
    surface: String,
    #[serde(default)]
    delta: [f32; 3],
    #[serde(default)]
    position: [f32; 3],
    #[serde(default = "default_true")]
    on_ground: bool,
    #[serde(default)]
    in_liquid: bool,
    #[serde(default)]
    on_ladder: bool,
    #[serde(default)]
    on_stairs: bool,
}

fn default_true() -> bool {
    true
}

impl SampleRecord {
    fn to_sample(&self) -> ContactSample {
        ContactSample {
            agent: self.agent,
            surface: SurfaceIdentity::named(&self.surface),
            delta: self.delta,
            position: self.position,
            on_ground: self.on_ground,
            in_liquid: self.in_liquid,
            on_ladder: self.on_ladder,
            on_stairs: self.on_stairs,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Validate { profile } => validate(&profile, &mut out),
        Commands::Replay {
            profile,
            trace,
            seed,
        } => replay(&profile, &trace, seed, &mut out),
        Commands::Resolve {
            profile,
            surface,
            event,
        } => resolve(&profile, &surface, &event, &mut out),
    }
}

fn load_profile(path: &Path) -> Result<AcousticProfile> {
    AcousticProfile::from_file(path)
        .with_context(|| format!("Failed to load profile {}", path.display()))
}

fn validate(path: &Path, out: &mut impl Write) -> Result<()> {
    let profile = load_profile(path)?;

    if let Err(errors) = profile.validate() {
        for error in &errors {
            writeln!(out, "error: {}", error)?;
        }
        bail!("{} has {} problem(s)", path.display(), errors.len());
    }

    let registry = profile
        .to_registry()
        .with_context(|| format!("Failed to build registry from {}", path.display()))?;

    writeln!(out, "profile:      {}", registry.name())?;
    writeln!(out, "surfaces:     {}", registry.surface_count())?;
    writeln!(out, "aliases:      {}", registry.alias_count())?;
    writeln!(out, "associations: {}", registry.association_count())?;
    writeln!(out, "variators:    {}", registry.variators().len())?;
    Ok(())
}

fn replay(profile: &Path, trace: &Path, seed: u64, out: &mut impl Write) -> Result<()> {
    let profile = load_profile(profile)?;
    let registry = profile.to_registry().context("Failed to build registry")?;
    let names = registry_names(&profile);

    let json = std::fs::read_to_string(trace)
        .with_context(|| format!("Failed to read trace {}", trace.display()))?;
    let frames: Vec<TraceFrame> =
        serde_json::from_str(&json).with_context(|| format!("Invalid trace {}", trace.display()))?;

    let (mut engine, _handle) = FootstepEngine::create(RegistryHandle::new(registry), Some(seed));

    for frame in &frames {
        for spawn in &frame.spawn {
            engine.spawn_agent(spawn.agent, &spawn.class);
        }
        for agent in &frame.despawn {
            engine.despawn_agent(*agent);
        }

        let samples: Vec<ContactSample> = frame.samples.iter().map(SampleRecord::to_sample).collect();
        for request in engine.tick(&samples) {
            let surface = names
                .iter()
                .find(|(id, _)| *id == request.surface)
                .map(|(_, name)| name.as_str());
            let line = json!({
                "tick": request.tick,
                "agent": request.agent,
                "event": request.event,
                "surface": surface,
                "foot": request.foot,
                "cue": &*request.cue,
                "volume": request.volume,
                "pitch": request.pitch,
                "delay_ms": request.delay_ms,
                "position": request.position,
            });
            writeln!(out, "{}", line)?;
        }
    }

    let stats = engine.stats();
    log::info!(
        "Replayed {} ticks: {} emissions, {} requests, {} suppressed, {} skipped samples",
        stats.ticks,
        stats.emissions,
        stats.requests,
        stats.suppressed,
        stats.skipped_samples
    );
    Ok(())
}

/// Surface and alias names known to the profile, for readable output
fn registry_names(profile: &AcousticProfile) -> Vec<(SurfaceIdentity, String)> {
    profile
        .surfaces
        .keys()
        .chain(profile.aliases.keys())
        .map(|name| (SurfaceIdentity::named(name), name.clone()))
        .collect()
}

fn resolve(profile: &Path, surface: &str, event: &str, out: &mut impl Write) -> Result<()> {
    let registry = load_profile(profile)?
        .to_registry()
        .context("Failed to build registry")?;
    let event: EventType = event.parse()?;

    let association = registry.resolve(SurfaceIdentity::named(surface), event);
    if association.is_silent() {
        writeln!(out, "{} / {}: silent", surface, event)?;
        return Ok(());
    }

    writeln!(
        out,
        "{} / {}: {} cue(s), total weight {}",
        surface,
        event,
        association.cues().len(),
        association.total_weight()
    )?;
    for cue in association.cues() {
        writeln!(
            out,
            "  {:<32} weight {:>4}  volume {:.2}  pitch {:.2}  delay {}ms",
            cue.name, cue.weight, cue.volume, cue.pitch, cue.delay_ms
        )?;
    }
    Ok(())
}
