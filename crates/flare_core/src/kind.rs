//! Particle kinds and per-kind lookup tables
//!
//! A particle's kind is both its behavioural role and its lifecycle state.
//! `Dead` is the initial and terminal state; every other kind is "live" and
//! owns a compacted index list, a budget, and a draw-arguments record.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Number of live (non-`Dead`) kinds.
pub const LIVE_KIND_COUNT: usize = 6;

/// Discriminants are ordered so that every legal transition moves to a
/// larger value. They are shared with the WGSL kernels.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ParticleKind {
    #[default]
    Dead = 0,
    /// Ascending shell before detonation.
    Shell = 1,
    /// Post-burst ballistic spark.
    Spark = 2,
    /// Flickering spark used for finale cones.
    FinaleSpark = 3,
    Smoke = 4,
    /// Short bright flash emitted by a spark whose crackle delay fired.
    Crackle = 5,
    PopFlash = 6,
}

/// Blend pass a kind is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendPass {
    Additive,
    Alpha,
}

impl ParticleKind {
    pub const LIVE: [ParticleKind; LIVE_KIND_COUNT] = [
        ParticleKind::Shell,
        ParticleKind::Spark,
        ParticleKind::FinaleSpark,
        ParticleKind::Smoke,
        ParticleKind::Crackle,
        ParticleKind::PopFlash,
    ];

    /// Decode a raw record tag. Unknown tags yield `None`.
    #[inline]
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Dead),
            1 => Some(Self::Shell),
            2 => Some(Self::Spark),
            3 => Some(Self::FinaleSpark),
            4 => Some(Self::Smoke),
            5 => Some(Self::Crackle),
            6 => Some(Self::PopFlash),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn is_live(self) -> bool {
        self != Self::Dead
    }

    /// Position in per-kind tables, `None` for `Dead`.
    #[inline]
    pub fn live_index(self) -> Option<usize> {
        (self as usize).checked_sub(1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dead => "dead",
            Self::Shell => "shell",
            Self::Spark => "spark",
            Self::Smoke => "smoke",
            Self::Crackle => "crackle",
            Self::PopFlash => "pop_flash",
            Self::FinaleSpark => "finale_spark",
        }
    }

    pub fn blend_pass(self) -> BlendPass {
        match self {
            Self::Smoke => BlendPass::Alpha,
            _ => BlendPass::Additive,
        }
    }

    /// Whether the update kernel may move a particle from `self` to `next`.
    ///
    /// Spawning (`Dead -> X`) is not an update transition and returns false.
    pub fn can_become(self, next: ParticleKind) -> bool {
        use ParticleKind::*;
        match (self, next) {
            (Dead, _) => false,
            (_, Dead) => true,
            (a, b) if a == b => true,
            (Shell, Smoke) => true,
            (Spark, Crackle) | (FinaleSpark, Crackle) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size table with one entry per live kind.
///
/// Indexing with `ParticleKind::Dead` panics; dead slots own no resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerKind<T>(pub [T; LIVE_KIND_COUNT]);

impl<T> PerKind<T> {
    pub fn from_fn(mut f: impl FnMut(ParticleKind) -> T) -> Self {
        Self(std::array::from_fn(|i| f(ParticleKind::LIVE[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticleKind, &T)> {
        ParticleKind::LIVE.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ParticleKind, &mut T)> {
        ParticleKind::LIVE.into_iter().zip(self.0.iter_mut())
    }

    pub fn map<U>(&self, mut f: impl FnMut(ParticleKind, &T) -> U) -> PerKind<U> {
        PerKind::from_fn(|kind| f(kind, &self[kind]))
    }
}

impl<T> Index<ParticleKind> for PerKind<T> {
    type Output = T;

    fn index(&self, kind: ParticleKind) -> &T {
        let idx = kind
            .live_index()
            .unwrap_or_else(|| panic!("dead particles have no per-kind entry"));
        &self.0[idx]
    }
}

impl<T> IndexMut<ParticleKind> for PerKind<T> {
    fn index_mut(&mut self, kind: ParticleKind) -> &mut T {
        let idx = kind
            .live_index()
            .unwrap_or_else(|| panic!("dead particles have no per-kind entry"));
        &mut self.0[idx]
    }
}

/// Per-kind compacted list capacities, as they appear in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindBudgets {
    pub shell: u32,
    pub spark: u32,
    pub smoke: u32,
    pub crackle: u32,
    pub pop_flash: u32,
    pub finale_spark: u32,
}

impl KindBudgets {
    /// Same budget for every kind.
    pub fn uniform(budget: u32) -> Self {
        Self {
            shell: budget,
            spark: budget,
            smoke: budget,
            crackle: budget,
            pop_flash: budget,
            finale_spark: budget,
        }
    }

    pub fn get(&self, kind: ParticleKind) -> u32 {
        match kind {
            ParticleKind::Dead => 0,
            ParticleKind::Shell => self.shell,
            ParticleKind::Spark => self.spark,
            ParticleKind::Smoke => self.smoke,
            ParticleKind::Crackle => self.crackle,
            ParticleKind::PopFlash => self.pop_flash,
            ParticleKind::FinaleSpark => self.finale_spark,
        }
    }

    pub fn with(mut self, kind: ParticleKind, budget: u32) -> Self {
        match kind {
            ParticleKind::Dead => {}
            ParticleKind::Shell => self.shell = budget,
            ParticleKind::Spark => self.spark = budget,
            ParticleKind::Smoke => self.smoke = budget,
            ParticleKind::Crackle => self.crackle = budget,
            ParticleKind::PopFlash => self.pop_flash = budget,
            ParticleKind::FinaleSpark => self.finale_spark = budget,
        }
        self
    }

    pub fn table(&self) -> PerKind<u32> {
        PerKind::from_fn(|kind| self.get(kind))
    }
}

impl Default for KindBudgets {
    fn default() -> Self {
        Self {
            shell: 256,
            spark: 32_768,
            smoke: 8_192,
            crackle: 8_192,
            pop_flash: 1_024,
            finale_spark: 16_384,
        }
    }
}
