//! The per-frame field table shared by the encoder and decoder.
//!
//! Every format version from 1 to 12 is described by one ordered table,
//! [`FRAME_SCHEMA`]. Each row names a [`Field`] of the frame, its wire
//! [`Encoding`], the versions in which it is present, and whether only the
//! MBP build carries it. A field whose encoding changed between versions
//! appears once per encoding with disjoint version ranges, so at any given
//! version the rows that apply read as the exact on-disk field order.
//!
//! Decoding walks the table at the file's version; encoding walks it at
//! the writer's version. Adding a format version means appending or
//! re-ranging rows here and nothing else.

use glam::DVec3;
use rewind_core::{BindingStates, Frame, GameFlavor, RewindableState, StateValue};

use crate::error::ReplayError;
use crate::legacy;
use crate::stream::MemoryStream;

/// A frame field, in on-disk order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    /// In-session clock.
    Ms,
    /// Duration covered by the frame.
    DeltaMs,
    /// Marble position.
    Position,
    /// Marble velocity.
    Velocity,
    /// Marble angular velocity.
    Spin,
    /// Held powerup.
    Powerup,
    /// Remaining time bonus.
    Timebonus,
    /// Moving-platform states.
    MpStates,
    /// Gem counter.
    Gemcount,
    /// Gem visibility.
    GemStates,
    /// Time-travel visibility.
    TtStates,
    /// Powerup respawn timers.
    PowerupStates,
    /// Game phase name.
    Gamestate,
    /// Explosive reset timers.
    LmStates,
    /// Time until the next game phase.
    NextStateTime,
    /// Active powerup countdowns.
    ActivePowerupStates,
    /// Gravity direction.
    GravityDir,
    /// Trapdoor thread directions.
    TrapdoorDirs,
    /// Trapdoor open timers.
    TrapdoorOpen,
    /// Trapdoor close timers.
    TrapdoorClose,
    /// Trapdoor thread positions.
    TrapdoorPos,
    /// Pending teleport delay.
    TeleportDelay,
    /// Pending teleport destination.
    TeleportDestination,
    /// Completed teleport counter.
    TeleportCounter,
    /// Easter egg visibility.
    EggState,
    /// Two retired integers present only in version 10.
    Retired,
    /// Variable-binding states.
    VariableBindings,
    /// Scene-object-binding states.
    ObjectBindings,
}

/// How a field is laid out on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// Little-endian `i32`.
    I32,
    /// One byte, nonzero true.
    Bool,
    /// Length-prefixed string.
    Str,
    /// Three `f64`.
    Vec3,
    /// `"[p,t;p,t]"` text.
    MpText,
    /// `i32` count followed by `i32` elements.
    IntVector,
    /// Bracketed integer text with the given delimiter.
    IntList(char),
    /// `i32` count followed by `f32` elements.
    FloatVector,
    /// Bracketed float text with the given delimiter.
    FloatList(char),
    /// Two `i32` that are read and discarded; written as zeros.
    Skip2xI32,
    /// Four `(namespace, value)` vectors: int, float, bool, string.
    BindingVectors,
}

/// Inclusive range of format versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionRange {
    /// First version carrying the field.
    pub min: u8,
    /// Last version carrying the field, or `None` if still current.
    pub max: Option<u8>,
}

impl VersionRange {
    /// Every version.
    pub const ALL: Self = Self::since(1);

    /// `min` and every later version.
    pub const fn since(min: u8) -> Self {
        Self { min, max: None }
    }

    /// `min..=max`.
    pub const fn between(min: u8, max: u8) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Whether `version` falls in the range.
    pub fn contains(&self, version: u8) -> bool {
        version >= self.min && self.max.is_none_or(|max| version <= max)
    }
}

/// Which game builds carry a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlavorGate {
    /// Both builds.
    Any,
    /// MBP only.
    Platinum,
}

/// One row of the frame layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// Frame field.
    pub field: Field,
    /// Wire layout.
    pub encoding: Encoding,
    /// Versions that carry the row.
    pub versions: VersionRange,
    /// Builds that carry the row.
    pub flavor: FlavorGate,
}

impl FieldSpec {
    const fn new(field: Field, encoding: Encoding, versions: VersionRange) -> Self {
        Self {
            field,
            encoding,
            versions,
            flavor: FlavorGate::Any,
        }
    }

    const fn platinum(field: Field, encoding: Encoding, versions: VersionRange) -> Self {
        Self {
            field,
            encoding,
            versions,
            flavor: FlavorGate::Platinum,
        }
    }

    /// Whether the row is on the wire for this version and build.
    pub fn applies(&self, version: u8, flavor: GameFlavor) -> bool {
        self.versions.contains(version)
            && (self.flavor == FlavorGate::Any || flavor.is_platinum())
    }
}

const LEGACY: VersionRange = VersionRange::between(1, 6);
const VECTORS: VersionRange = VersionRange::since(7);

/// The frame layout across all versions.
pub const FRAME_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new(Field::Ms, Encoding::I32, VersionRange::ALL),
    FieldSpec::new(Field::DeltaMs, Encoding::I32, VersionRange::ALL),
    FieldSpec::new(Field::Position, Encoding::Vec3, VersionRange::ALL),
    FieldSpec::new(Field::Velocity, Encoding::Vec3, VersionRange::ALL),
    FieldSpec::new(Field::Spin, Encoding::Vec3, VersionRange::ALL),
    FieldSpec::new(Field::Powerup, Encoding::I32, VersionRange::ALL),
    FieldSpec::new(Field::Timebonus, Encoding::I32, VersionRange::ALL),
    FieldSpec::new(Field::MpStates, Encoding::MpText, VersionRange::ALL),
    FieldSpec::new(Field::Gemcount, Encoding::I32, VersionRange::ALL),
    FieldSpec::new(Field::GemStates, Encoding::IntList(','), LEGACY),
    FieldSpec::new(Field::GemStates, Encoding::IntVector, VECTORS),
    FieldSpec::new(Field::TtStates, Encoding::IntList(','), LEGACY),
    FieldSpec::new(Field::TtStates, Encoding::IntVector, VECTORS),
    FieldSpec::new(Field::PowerupStates, Encoding::IntList(','), LEGACY),
    FieldSpec::new(Field::PowerupStates, Encoding::IntVector, VECTORS),
    FieldSpec::new(Field::Gamestate, Encoding::Str, VersionRange::ALL),
    FieldSpec::new(Field::LmStates, Encoding::IntList(','), LEGACY),
    FieldSpec::new(Field::LmStates, Encoding::IntVector, VECTORS),
    FieldSpec::new(Field::NextStateTime, Encoding::I32, VersionRange::ALL),
    FieldSpec::new(Field::ActivePowerupStates, Encoding::IntList(';'), LEGACY),
    FieldSpec::new(Field::ActivePowerupStates, Encoding::IntVector, VECTORS),
    FieldSpec::new(Field::GravityDir, Encoding::Str, VersionRange::ALL),
    FieldSpec::new(Field::TrapdoorDirs, Encoding::IntList(','), VersionRange::between(5, 6)),
    FieldSpec::new(Field::TrapdoorDirs, Encoding::IntVector, VECTORS),
    FieldSpec::new(Field::TrapdoorOpen, Encoding::IntList(','), VersionRange::between(5, 6)),
    FieldSpec::new(Field::TrapdoorOpen, Encoding::IntVector, VECTORS),
    FieldSpec::new(Field::TrapdoorClose, Encoding::IntList(','), VersionRange::between(5, 6)),
    FieldSpec::new(Field::TrapdoorClose, Encoding::IntVector, VECTORS),
    FieldSpec::new(Field::TrapdoorPos, Encoding::FloatList(','), VersionRange::between(6, 6)),
    FieldSpec::new(Field::TrapdoorPos, Encoding::FloatVector, VECTORS),
    FieldSpec::platinum(Field::TeleportDelay, Encoding::I32, VersionRange::since(8)),
    FieldSpec::platinum(Field::TeleportDestination, Encoding::Str, VersionRange::since(8)),
    FieldSpec::platinum(Field::TeleportCounter, Encoding::I32, VersionRange::since(9)),
    FieldSpec::platinum(Field::EggState, Encoding::Bool, VersionRange::since(12)),
    FieldSpec::new(Field::Retired, Encoding::Skip2xI32, VersionRange::between(10, 10)),
    FieldSpec::new(Field::VariableBindings, Encoding::BindingVectors, VersionRange::since(11)),
    FieldSpec::new(Field::ObjectBindings, Encoding::BindingVectors, VersionRange::since(11)),
];

/// The rows present at `version` for `flavor`, in wire order.
pub fn plan(version: u8, flavor: GameFlavor) -> impl Iterator<Item = &'static FieldSpec> {
    FRAME_SCHEMA
        .iter()
        .filter(move |spec| spec.applies(version, flavor))
}

// ── Wire values ─────────────────────────────────────────────────

/// A binding value type with a fixed wire layout.
pub trait WireValue: StateValue {
    /// Decode one value.
    fn read(m: &mut MemoryStream) -> Result<Self, ReplayError>;
    /// Encode one value.
    fn write(&self, m: &mut MemoryStream);
}

impl WireValue for i32 {
    fn read(m: &mut MemoryStream) -> Result<Self, ReplayError> {
        m.read_i32()
    }
    fn write(&self, m: &mut MemoryStream) {
        m.write_i32(*self);
    }
}

impl WireValue for f32 {
    fn read(m: &mut MemoryStream) -> Result<Self, ReplayError> {
        m.read_f32()
    }
    fn write(&self, m: &mut MemoryStream) {
        m.write_f32(*self);
    }
}

impl WireValue for bool {
    fn read(m: &mut MemoryStream) -> Result<Self, ReplayError> {
        m.read_bool()
    }
    fn write(&self, m: &mut MemoryStream) {
        m.write_bool(*self);
    }
}

impl WireValue for String {
    fn read(m: &mut MemoryStream) -> Result<Self, ReplayError> {
        m.read_string()
    }
    fn write(&self, m: &mut MemoryStream) {
        m.write_string(self);
    }
}

/// Read an `i32`-counted vector. Negative counts read as empty.
pub fn read_vector<T>(
    m: &mut MemoryStream,
    mut read_one: impl FnMut(&mut MemoryStream) -> Result<T, ReplayError>,
) -> Result<Vec<T>, ReplayError> {
    let count = m.read_i32()?;
    let mut out = Vec::new();
    for _ in 0..count.max(0) {
        out.push(read_one(m)?);
    }
    Ok(out)
}

/// Write an `i32`-counted vector.
pub fn write_vector<T>(m: &mut MemoryStream, items: &[T], mut write_one: impl FnMut(&mut MemoryStream, &T)) {
    m.write_i32(items.len() as i32);
    for item in items {
        write_one(m, item);
    }
}

fn read_states<T: WireValue>(m: &mut MemoryStream) -> Result<Vec<RewindableState<T>>, ReplayError> {
    read_vector(m, |m| {
        let namespace = m.read_string()?;
        let value = T::read(m)?;
        Ok(RewindableState { namespace, value })
    })
}

fn write_states<T: WireValue>(m: &mut MemoryStream, states: &[RewindableState<T>]) {
    write_vector(m, states, |m, s| {
        m.write_string(&s.namespace);
        s.value.write(m);
    });
}

/// Read the four typed binding vectors.
pub fn read_binding_states(m: &mut MemoryStream) -> Result<BindingStates, ReplayError> {
    Ok(BindingStates {
        ints: read_states(m)?,
        floats: read_states(m)?,
        bools: read_states(m)?,
        strings: read_states(m)?,
    })
}

/// Write the four typed binding vectors.
pub fn write_binding_states(m: &mut MemoryStream, states: &BindingStates) {
    write_states(m, &states.ints);
    write_states(m, &states.floats);
    write_states(m, &states.bools);
    write_states(m, &states.strings);
}

// ── Field codecs ────────────────────────────────────────────────

fn mismatch(spec: &FieldSpec) -> ReplayError {
    ReplayError::MalformedFrame {
        detail: format!("{:?} cannot use {:?} encoding", spec.field, spec.encoding),
    }
}

fn read_vec3(m: &mut MemoryStream) -> Result<DVec3, ReplayError> {
    Ok(DVec3::new(m.read_f64()?, m.read_f64()?, m.read_f64()?))
}

fn write_vec3(m: &mut MemoryStream, v: DVec3) {
    m.write_f64(v.x);
    m.write_f64(v.y);
    m.write_f64(v.z);
}

fn read_ints(m: &mut MemoryStream, spec: &FieldSpec) -> Result<Vec<i32>, ReplayError> {
    match spec.encoding {
        Encoding::IntVector => read_vector(m, MemoryStream::read_i32),
        Encoding::IntList(delim) => Ok(legacy::parse_int_list(&m.read_string()?, delim)),
        _ => Err(mismatch(spec)),
    }
}

fn write_ints(m: &mut MemoryStream, spec: &FieldSpec, values: &[i32]) -> Result<(), ReplayError> {
    match spec.encoding {
        Encoding::IntVector => write_vector(m, values, |m, v| m.write_i32(*v)),
        Encoding::IntList(delim) => m.write_string(&legacy::format_int_list(values, delim)),
        _ => return Err(mismatch(spec)),
    }
    Ok(())
}

fn read_scalar_i32(m: &mut MemoryStream, spec: &FieldSpec) -> Result<i32, ReplayError> {
    match spec.encoding {
        Encoding::I32 => m.read_i32(),
        _ => Err(mismatch(spec)),
    }
}

fn read_str(m: &mut MemoryStream, spec: &FieldSpec) -> Result<String, ReplayError> {
    match spec.encoding {
        Encoding::Str => m.read_string(),
        _ => Err(mismatch(spec)),
    }
}

/// Decode one row into `frame`.
pub fn decode_field(m: &mut MemoryStream, spec: &FieldSpec, frame: &mut Frame) -> Result<(), ReplayError> {
    match spec.field {
        Field::Ms => frame.ms = read_scalar_i32(m, spec)?,
        Field::DeltaMs => frame.delta_ms = read_scalar_i32(m, spec)?,
        Field::Position => frame.position = read_vec3(m)?,
        Field::Velocity => frame.velocity = read_vec3(m)?,
        Field::Spin => frame.spin = read_vec3(m)?,
        Field::Powerup => frame.powerup = read_scalar_i32(m, spec)?,
        Field::Timebonus => frame.timebonus = read_scalar_i32(m, spec)?,
        Field::MpStates => frame.mp_states = legacy::read_list_mp_states(m)?,
        Field::Gemcount => frame.gemcount = read_scalar_i32(m, spec)?,
        Field::GemStates => frame.gem_states = read_ints(m, spec)?,
        Field::TtStates => frame.tt_states = read_ints(m, spec)?,
        Field::PowerupStates => frame.powerup_states = read_ints(m, spec)?,
        Field::Gamestate => frame.gamestate = read_str(m, spec)?,
        Field::LmStates => frame.lm_states = read_ints(m, spec)?,
        Field::NextStateTime => frame.nextstatetime = read_scalar_i32(m, spec)?,
        Field::ActivePowerupStates => {
            frame.active_powerup_states = read_ints(m, spec)?.into_iter().collect();
        }
        Field::GravityDir => frame.gravity_dir = read_str(m, spec)?,
        Field::TrapdoorDirs => frame.trapdoor_dirs = read_ints(m, spec)?,
        Field::TrapdoorOpen => frame.trapdoor_open = read_ints(m, spec)?,
        Field::TrapdoorClose => frame.trapdoor_close = read_ints(m, spec)?,
        Field::TrapdoorPos => {
            frame.trapdoor_pos = match spec.encoding {
                Encoding::FloatVector => read_vector(m, MemoryStream::read_f32)?,
                Encoding::FloatList(delim) => legacy::parse_float_list(&m.read_string()?, delim),
                _ => return Err(mismatch(spec)),
            }
        }
        Field::TeleportDelay => frame.teleport.delay = read_scalar_i32(m, spec)?,
        Field::TeleportDestination => frame.teleport.destination = read_str(m, spec)?,
        Field::TeleportCounter => frame.teleport.counter = read_scalar_i32(m, spec)?,
        Field::EggState => frame.egg_state = m.read_bool()?,
        Field::Retired => {
            m.read_i32()?;
            m.read_i32()?;
        }
        Field::VariableBindings => frame.variable_states = read_binding_states(m)?,
        Field::ObjectBindings => frame.object_states = read_binding_states(m)?,
    }
    Ok(())
}

/// Encode one row from `frame`.
pub fn encode_field(m: &mut MemoryStream, spec: &FieldSpec, frame: &Frame) -> Result<(), ReplayError> {
    match spec.field {
        Field::Ms => m.write_i32(frame.ms),
        Field::DeltaMs => m.write_i32(frame.delta_ms),
        Field::Position => write_vec3(m, frame.position),
        Field::Velocity => write_vec3(m, frame.velocity),
        Field::Spin => write_vec3(m, frame.spin),
        Field::Powerup => m.write_i32(frame.powerup),
        Field::Timebonus => m.write_i32(frame.timebonus),
        Field::MpStates => legacy::write_list_mp_states(m, &frame.mp_states),
        Field::Gemcount => m.write_i32(frame.gemcount),
        Field::GemStates => write_ints(m, spec, &frame.gem_states)?,
        Field::TtStates => write_ints(m, spec, &frame.tt_states)?,
        Field::PowerupStates => write_ints(m, spec, &frame.powerup_states)?,
        Field::Gamestate => m.write_string(&frame.gamestate),
        Field::LmStates => write_ints(m, spec, &frame.lm_states)?,
        Field::NextStateTime => m.write_i32(frame.nextstatetime),
        Field::ActivePowerupStates => write_ints(m, spec, &frame.active_powerup_states)?,
        Field::GravityDir => m.write_string(&frame.gravity_dir),
        Field::TrapdoorDirs => write_ints(m, spec, &frame.trapdoor_dirs)?,
        Field::TrapdoorOpen => write_ints(m, spec, &frame.trapdoor_open)?,
        Field::TrapdoorClose => write_ints(m, spec, &frame.trapdoor_close)?,
        Field::TrapdoorPos => match spec.encoding {
            Encoding::FloatVector => write_vector(m, &frame.trapdoor_pos, |m, v| m.write_f32(*v)),
            Encoding::FloatList(delim) => {
                m.write_string(&legacy::format_float_list(&frame.trapdoor_pos, delim));
            }
            _ => return Err(mismatch(spec)),
        },
        Field::TeleportDelay => m.write_i32(frame.teleport.delay),
        Field::TeleportDestination => m.write_string(&frame.teleport.destination),
        Field::TeleportCounter => m.write_i32(frame.teleport.counter),
        Field::EggState => m.write_bool(frame.egg_state),
        Field::Retired => {
            m.write_i32(0);
            m.write_i32(0);
        }
        Field::VariableBindings => write_binding_states(m, &frame.variable_states),
        Field::ObjectBindings => write_binding_states(m, &frame.object_states),
    }
    Ok(())
}

/// Decode a whole frame at `version`.
pub fn decode_frame(m: &mut MemoryStream, version: u8, flavor: GameFlavor) -> Result<Frame, ReplayError> {
    let mut frame = Frame::default();
    for spec in plan(version, flavor) {
        decode_field(m, spec, &mut frame)?;
    }
    Ok(frame)
}

/// Encode a whole frame at `version`.
pub fn encode_frame(
    m: &mut MemoryStream,
    frame: &Frame,
    version: u8,
    flavor: GameFlavor,
) -> Result<(), ReplayError> {
    for spec in plan(version, flavor) {
        encode_field(m, spec, frame)?;
    }
    Ok(())
}
