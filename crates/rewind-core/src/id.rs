//! Strongly-typed identifiers and small enumerations shared across crates.

use std::fmt;

/// Opaque handle to a live object in the host engine.
///
/// The engine never dereferences this; it only hands it back to the
/// [`SceneHost`](crate::scene::SceneHost) or
/// [`ScriptBridge`](crate::bridge::ScriptBridge) that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Whether a binding tracks a free-standing value or a per-object value.
///
/// The discriminants match the integers accepted by the
/// `registerRewindable` script call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// One value per scene object whose datablock name equals the
    /// binding namespace. Captured during the mission walk.
    SceneObject = 0,
    /// A single global value.
    Variable = 1,
}

impl BindingKind {
    /// Decode the script-level integer tag.
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::SceneObject),
            1 => Some(Self::Variable),
            _ => None,
        }
    }
}

/// Storage type of a binding's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// `i32`.
    Int = 0,
    /// `f32`.
    Float = 1,
    /// `bool`.
    Bool = 2,
    /// `String`.
    String = 3,
}

impl StorageKind {
    /// Decode the script-level integer tag.
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::Int),
            1 => Some(Self::Float),
            2 => Some(Self::Bool),
            3 => Some(Self::String),
            _ => None,
        }
    }
}

/// Which game build a replay belongs to.
///
/// The two builds share a file format but MBP carries an extra block of
/// teleport and easter-egg fields and writes a higher format version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GameFlavor {
    /// Marble Blast Platinum.
    #[default]
    Mbp,
    /// Marble Blast Gold.
    Mbg,
}

impl GameFlavor {
    /// Tag written into the replay header (format v10+).
    pub fn tag(self) -> &'static str {
        match self {
            Self::Mbp => "MBP",
            Self::Mbg => "MBG",
        }
    }

    /// Format version this flavor writes.
    pub fn format_version(self) -> u8 {
        match self {
            Self::Mbp => 12,
            Self::Mbg => 11,
        }
    }

    /// Parse a header tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "MBP" => Some(Self::Mbp),
            "MBG" => Some(Self::Mbg),
            _ => None,
        }
    }

    /// True for the build with teleports, checkpoints, and easter eggs.
    pub fn is_platinum(self) -> bool {
        matches!(self, Self::Mbp)
    }
}

impl fmt::Display for GameFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
