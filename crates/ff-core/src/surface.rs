//! Surface identities
//!
//! A surface is whatever an agent stands on or in. The host hands us an
//! opaque key per sample; names are hashed once so the tick path only ever
//! compares integers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used for composite (base + modifier) surface names
pub const COMPOSITE_SEPARATOR: char = '@';

/// Hash a surface name (FNV-1a, 32 bit)
#[inline]
pub fn hash_surface_name(name: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in name.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    // 0 is reserved for UNKNOWN
    if hash == 0 { 1 } else { hash }
}

/// Opaque key identifying a contact surface. Defaults to [`SurfaceIdentity::UNKNOWN`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceIdentity(u32);

impl SurfaceIdentity {
    /// Reserved sentinel for "nothing known about this surface"
    pub const UNKNOWN: SurfaceIdentity = SurfaceIdentity(0);

    /// Identity of a named surface
    pub fn named(name: &str) -> Self {
        Self(hash_surface_name(name))
    }

    /// Identity of a composite surface, e.g. a block inside a biome
    pub fn composite(base: &str, modifier: &str) -> Self {
        Self::named(&composite_name(base, modifier))
    }

    /// Wrap a raw key produced by the host
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SurfaceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "surface:unknown")
        } else {
            write!(f, "surface:{:08x}", self.0)
        }
    }
}

/// Build the canonical name of a composite surface
pub fn composite_name(base: &str, modifier: &str) -> String {
    format!("{}{}{}", base, COMPOSITE_SEPARATOR, modifier)
}

/// Capability tag, resolved once when a registry generation is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum SurfaceCapability {
    /// Ordinary solid ground
    #[default]
    Normal,
    /// Never produces sound (air, barriers, decorations)
    NotEmitter,
    /// Water and other fluids
    Liquid,
    /// Climbable
    Ladder,
    /// Stairs and slabs
    Stair,
    /// Soft overlay such as grass or leaves
    Foliage,
}

impl SurfaceCapability {
    #[inline]
    pub fn emits(self) -> bool {
        !matches!(self, SurfaceCapability::NotEmitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_hash_stable() {
        assert_eq!(SurfaceIdentity::named("stone"), SurfaceIdentity::named("stone"));
        assert_ne!(SurfaceIdentity::named("stone"), SurfaceIdentity::named("sand"));
    }

    #[test]
    fn test_named_never_unknown() {
        assert!(!SurfaceIdentity::named("").is_unknown());
        assert!(SurfaceIdentity::UNKNOWN.is_unknown());
    }

    #[test]
    fn test_composite_matches_named() {
        assert_eq!(
            SurfaceIdentity::composite("grass", "snowy_plains"),
            SurfaceIdentity::named("grass@snowy_plains")
        );
    }

    #[test]
    fn test_not_emitter() {
        assert!(!SurfaceCapability::NotEmitter.emits());
        assert!(SurfaceCapability::Foliage.emits());
    }
}
