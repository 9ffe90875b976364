//! Capture and restore of per-object mission state.
//!
//! The mission tree is walked depth-first in pre-order. Every list in
//! [`MissionState`] is parallel to that walk: entry `i` of `gem_states`
//! belongs to the `i`-th gem visited. Applying a state walks the same
//! tree and consumes the lists front to back through [`StateCursor`]s,
//! so a frame captured on a different tree fails with
//! [`MissionError::Desync`] instead of indexing past the end.

use rewind_core::{
    format_float, parse_leading_int, BindingRegistry, BindingStates, EntityId, Frame,
    GameFlavor, ItemKind, MpState, RewindableBinding, RewindableState, SceneHost, SceneNode,
    ShapeKind, StateValue, StorageKind,
};

use crate::error::MissionError;

// ── StateCursor ────────────────────────────────────────────────────

/// Front-to-back reader over one captured list.
#[derive(Debug)]
pub struct StateCursor<'a, T> {
    list: &'static str,
    items: &'a [T],
    next: usize,
}

impl<'a, T> StateCursor<'a, T> {
    /// A cursor over `items`, reported as `list` in errors.
    pub fn new(list: &'static str, items: &'a [T]) -> Self {
        Self {
            list,
            items,
            next: 0,
        }
    }

    /// Take the next entry.
    pub fn next(&mut self) -> Result<&'a T, MissionError> {
        let item = self.items.get(self.next).ok_or(MissionError::Desync {
            list: self.list,
            index: self.next,
        })?;
        self.next += 1;
        Ok(item)
    }

    /// Entries not yet taken.
    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.next)
    }
}

// ── MissionState ───────────────────────────────────────────────────

/// The mission-tree part of a [`Frame`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MissionState {
    /// Moving platforms.
    pub mp_states: Vec<MpState>,
    /// Gem hidden flags.
    pub gem_states: Vec<i32>,
    /// Time-travel hidden flags.
    pub tt_states: Vec<i32>,
    /// Powerup respawn timers.
    pub powerup_states: Vec<i32>,
    /// Explosive reset timers.
    pub lm_states: Vec<i32>,
    /// Trapdoor animation positions.
    pub trapdoor_pos: Vec<f32>,
    /// Trapdoor animation directions.
    pub trapdoor_dirs: Vec<i32>,
    /// Trapdoor open timers.
    pub trapdoor_open: Vec<i32>,
    /// Trapdoor close timers.
    pub trapdoor_close: Vec<i32>,
    /// Easter egg hidden flag.
    pub egg_state: bool,
    /// Scene-object binding values.
    pub object_states: BindingStates,
}

impl MissionState {
    /// Copy the mission lists out of `frame`.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            mp_states: frame.mp_states.clone(),
            gem_states: frame.gem_states.clone(),
            tt_states: frame.tt_states.clone(),
            powerup_states: frame.powerup_states.clone(),
            lm_states: frame.lm_states.clone(),
            trapdoor_pos: frame.trapdoor_pos.clone(),
            trapdoor_dirs: frame.trapdoor_dirs.clone(),
            trapdoor_open: frame.trapdoor_open.clone(),
            trapdoor_close: frame.trapdoor_close.clone(),
            egg_state: frame.egg_state,
            object_states: frame.object_states.clone(),
        }
    }

    /// Move the mission lists into `frame`.
    pub fn write_into(self, frame: &mut Frame) {
        frame.mp_states = self.mp_states;
        frame.gem_states = self.gem_states;
        frame.tt_states = self.tt_states;
        frame.powerup_states = self.powerup_states;
        frame.lm_states = self.lm_states;
        frame.trapdoor_pos = self.trapdoor_pos;
        frame.trapdoor_dirs = self.trapdoor_dirs;
        frame.trapdoor_open = self.trapdoor_open;
        frame.trapdoor_close = self.trapdoor_close;
        frame.egg_state = self.egg_state;
        frame.object_states = self.object_states;
    }
}

// ── Walk ───────────────────────────────────────────────────────────

/// Classified non-group nodes under `root`, in pre-order.
pub fn walk_mission<H: SceneHost + ?Sized>(
    host: &H,
    root: EntityId,
    flavor: GameFlavor,
) -> Vec<(EntityId, SceneNode)> {
    let mut out = Vec::new();
    let mut stack: Vec<EntityId> = host.children(root).into_iter().rev().collect();
    while let Some(obj) = stack.pop() {
        match SceneNode::classify(host, obj, flavor) {
            SceneNode::Group => stack.extend(host.children(obj).into_iter().rev()),
            node => out.push((obj, node)),
        }
    }
    out
}

/// Total path time of every moving platform under `root`, in walk order.
pub fn path_durations<H: SceneHost + ?Sized>(
    host: &H,
    root: EntityId,
    flavor: GameFlavor,
) -> Vec<f64> {
    walk_mission(host, root, flavor)
        .into_iter()
        .filter(|(_, node)| *node == SceneNode::PathedInterior)
        .map(|(obj, _)| host.path_total_time(obj))
        .collect()
}

fn int_field<H: SceneHost + ?Sized>(host: &H, obj: EntityId, name: &str) -> i32 {
    parse_leading_int(&host.field(obj, name))
}

// ── Capture ────────────────────────────────────────────────────────

fn capture_value<T: StateValue + Default, H: SceneHost>(
    host: &mut H,
    binding: &RewindableBinding,
    object: Option<EntityId>,
    states: &mut BindingStates,
) {
    let value = binding.get_state::<T>(host, object).unwrap_or_else(|e| {
        log::error!("cannot capture {}: {e}", binding.namespace());
        T::default()
    });
    T::list_mut(states).push(RewindableState::new(binding.namespace(), value));
}

/// Append the current value of `binding` to the typed list it stores into.
///
/// A failed read is logged and captured as the type's default so the
/// list stays parallel to the walk.
pub(crate) fn capture_binding<H: SceneHost>(
    host: &mut H,
    binding: &RewindableBinding,
    object: Option<EntityId>,
    states: &mut BindingStates,
) {
    match binding.storage() {
        StorageKind::Int => capture_value::<i32, _>(host, binding, object, states),
        StorageKind::Float => capture_value::<f32, _>(host, binding, object, states),
        StorageKind::Bool => capture_value::<bool, _>(host, binding, object, states),
        StorageKind::String => capture_value::<String, _>(host, binding, object, states),
    }
}

/// Read the state of every tracked object under `root`.
pub fn capture_mission_state<H: SceneHost>(
    host: &mut H,
    root: EntityId,
    registry: &BindingRegistry,
    flavor: GameFlavor,
) -> MissionState {
    let mut state = MissionState::default();
    for (obj, node) in walk_mission(host, root, flavor) {
        match node {
            SceneNode::PathedInterior => state.mp_states.push(MpState::new(
                host.path_position(obj).unwrap_or(0.0),
                host.target_position(obj),
            )),
            SceneNode::Item(ItemKind::Gem) => state.gem_states.push(i32::from(host.is_hidden(obj))),
            SceneNode::Item(ItemKind::TimeTravel) => {
                state.tt_states.push(i32::from(host.is_hidden(obj)))
            }
            SceneNode::Item(ItemKind::Powerup) => {
                state.powerup_states.push(int_field(host, obj, "respawnTime"))
            }
            SceneNode::Item(ItemKind::EasterEgg) => state.egg_state = host.is_hidden(obj),
            SceneNode::StaticShape(ShapeKind::Explosive) => {
                state.lm_states.push(int_field(host, obj, "resetClock"))
            }
            SceneNode::StaticShape(ShapeKind::TrapDoor) => {
                state.trapdoor_pos.push(host.thread_position(obj));
                state.trapdoor_dirs.push(host.thread_forward(obj));
                state.trapdoor_open.push(int_field(host, obj, "openTime"));
                state.trapdoor_close.push(int_field(host, obj, "closeTime"));
            }
            _ => {}
        }

        if node.is_rewindable() {
            let datablock = host.datablock_name(obj);
            for binding in registry.matching(&datablock) {
                capture_binding(host, binding, Some(obj), &mut state.object_states);
            }
        }
    }
    state
}

// ── Apply ──────────────────────────────────────────────────────────

/// Cursors over the four typed lists of one [`BindingStates`].
pub(crate) struct BindingCursors<'a> {
    ints: StateCursor<'a, RewindableState<i32>>,
    floats: StateCursor<'a, RewindableState<f32>>,
    bools: StateCursor<'a, RewindableState<bool>>,
    strings: StateCursor<'a, RewindableState<String>>,
}

impl<'a> BindingCursors<'a> {
    /// Cursors over scene-object binding values.
    pub(crate) fn objects(states: &'a BindingStates) -> Self {
        Self {
            ints: StateCursor::new("object_states.ints", &states.ints),
            floats: StateCursor::new("object_states.floats", &states.floats),
            bools: StateCursor::new("object_states.bools", &states.bools),
            strings: StateCursor::new("object_states.strings", &states.strings),
        }
    }

    /// Cursors over variable binding values.
    pub(crate) fn variables(states: &'a BindingStates) -> Self {
        Self {
            ints: StateCursor::new("variable_states.ints", &states.ints),
            floats: StateCursor::new("variable_states.floats", &states.floats),
            bools: StateCursor::new("variable_states.bools", &states.bools),
            strings: StateCursor::new("variable_states.strings", &states.strings),
        }
    }

    /// Take the next value for `binding` and write it through the bridge.
    ///
    /// Bridge failures are logged; only running out of values is an error.
    pub(crate) fn restore<H: SceneHost>(
        &mut self,
        host: &mut H,
        binding: &RewindableBinding,
        object: Option<EntityId>,
    ) -> Result<(), MissionError> {
        match binding.storage() {
            StorageKind::Int => restore_value(host, binding, object, &mut self.ints),
            StorageKind::Float => restore_value(host, binding, object, &mut self.floats),
            StorageKind::Bool => restore_value(host, binding, object, &mut self.bools),
            StorageKind::String => restore_value(host, binding, object, &mut self.strings),
        }
    }
}

fn restore_value<T: StateValue, H: SceneHost>(
    host: &mut H,
    binding: &RewindableBinding,
    object: Option<EntityId>,
    cursor: &mut StateCursor<'_, RewindableState<T>>,
) -> Result<(), MissionError> {
    let state = cursor.next()?;
    if let Err(e) = binding.set_state(host, &state.value, object) {
        log::error!("cannot restore {}: {e}", binding.namespace());
    }
    Ok(())
}

fn call<H: SceneHost>(host: &mut H, obj: EntityId, method: &str, args: &[&str]) {
    if let Err(e) = host.call_method(obj, method, args) {
        log::error!("{method} on object {obj} failed: {e}");
    }
}

fn cancel_scheduled<H: SceneHost>(host: &mut H, obj: EntityId, field: &str) {
    let event = int_field(host, obj, field);
    if event != 0 {
        host.cancel_event(event);
    }
}

fn apply_powerup<H: SceneHost>(host: &mut H, obj: EntityId, respawn: i32) {
    cancel_scheduled(host, obj, "respawnSchedule");
    cancel_scheduled(host, obj, "respawnSchedule2");
    if respawn > 0 {
        host.set_hidden(obj, true);
        call(host, obj, "startFade", &["0", "0", "1"]);
        let unhide = host.schedule_method(obj, respawn, "hide", &["false"]);
        host.set_field(obj, "respawnSchedule", &unhide.to_string());
        let fade = host.schedule_method(obj, respawn + 100, "startFade", &["1000", "0", "false"]);
        host.set_field(obj, "respawnSchedule2", &fade.to_string());
    } else {
        host.set_hidden(obj, false);
        call(host, obj, "startFade", &["0", "0", "0"]);
    }
    host.set_field(obj, "respawnTime", &respawn.max(0).to_string());
}

fn apply_explosive<H: SceneHost>(host: &mut H, obj: EntityId, reset: i32) {
    cancel_scheduled(host, obj, "resetSchedule");
    cancel_scheduled(host, obj, "resetSchedule2");
    if reset > 0 {
        host.set_hidden(obj, true);
        call(host, obj, "startFade", &["0", "0", "1"]);
        let enable = host.schedule_method(obj, reset, "setDamageState", &["Enabled"]);
        host.set_field(obj, "resetSchedule", &enable.to_string());
        let fade = host.schedule_method(obj, reset, "startFade", &["1000", "0", "false"]);
        host.set_field(obj, "resetSchedule2", &fade.to_string());
    } else {
        host.set_hidden(obj, false);
        call(host, obj, "startFade", &["0", "0", "0"]);
        call(host, obj, "setDamageState", &["Enabled"]);
    }
    host.set_field(obj, "resetClock", &reset.max(0).to_string());
}

fn apply_trapdoor_timers<H: SceneHost>(host: &mut H, obj: EntityId, open: i32, close: i32) {
    let id = obj.to_string();

    cancel_scheduled(host, obj, "openSchedule");
    host.set_field(obj, "openTime", &open.max(0).to_string());
    if open > 0 {
        host.set_field(obj, "open", "1");
        let event = host.schedule_function(open, "Trapdoor_open", &[&id]);
        host.set_field(obj, "openSchedule", &event.to_string());
    }

    cancel_scheduled(host, obj, "closeSchedule");
    if close > 0 {
        let event = host.schedule_function(close, "Trapdoor_close", &[&id]);
        host.set_field(obj, "closeSchedule", &event.to_string());
        host.set_field(obj, "closeTime", &close.to_string());
    } else {
        host.set_field(obj, "open", "0");
        host.set_field(obj, "openTime", "0");
    }
}

/// Push `state` into the live tree under `root`.
///
/// `prev` is the live state captured just before; objects whose
/// visibility or trapdoor position already match are left alone.
/// Platforms and trapdoors are restored only while `state` has entries
/// for them. Every other list must cover every object of its kind.
pub fn apply_mission_state<H: SceneHost>(
    host: &mut H,
    root: EntityId,
    registry: &BindingRegistry,
    flavor: GameFlavor,
    state: &MissionState,
    prev: &MissionState,
) -> Result<(), MissionError> {
    let mut mp = StateCursor::new("mp_states", &state.mp_states);
    let mut gems = StateCursor::new("gem_states", &state.gem_states);
    let mut prev_gems = StateCursor::new("gem_states", &prev.gem_states);
    let mut tts = StateCursor::new("tt_states", &state.tt_states);
    let mut prev_tts = StateCursor::new("tt_states", &prev.tt_states);
    let mut powerups = StateCursor::new("powerup_states", &state.powerup_states);
    let mut mines = StateCursor::new("lm_states", &state.lm_states);
    let mut td_pos = StateCursor::new("trapdoor_pos", &state.trapdoor_pos);
    let mut prev_td_pos = StateCursor::new("trapdoor_pos", &prev.trapdoor_pos);
    let mut td_dirs = StateCursor::new("trapdoor_dirs", &state.trapdoor_dirs);
    let mut td_open = StateCursor::new("trapdoor_open", &state.trapdoor_open);
    let mut td_close = StateCursor::new("trapdoor_close", &state.trapdoor_close);
    let mut objects = BindingCursors::objects(&state.object_states);

    for (obj, node) in walk_mission(host, root, flavor) {
        match node {
            SceneNode::PathedInterior if mp.remaining() > 0 => {
                let s = mp.next()?;
                host.set_path_position(obj, s.path_position as i32);
                host.set_field(obj, "pathPos", &format_float(f64::from(s.path_position)));
                host.set_field(obj, "targetPos", &format_float(f64::from(s.target_position)));
            }
            SceneNode::Item(ItemKind::Gem) => {
                let hidden = *gems.next()?;
                if prev_gems.next().ok() != Some(&hidden) {
                    host.set_hidden(obj, hidden != 0);
                }
            }
            SceneNode::Item(ItemKind::TimeTravel) => {
                let hidden = *tts.next()?;
                if prev_tts.next().ok() != Some(&hidden) {
                    host.set_hidden(obj, hidden != 0);
                }
            }
            SceneNode::Item(ItemKind::Powerup) => apply_powerup(host, obj, *powerups.next()?),
            SceneNode::Item(ItemKind::EasterEgg) => host.set_hidden(obj, state.egg_state),
            SceneNode::StaticShape(ShapeKind::Explosive) => {
                apply_explosive(host, obj, *mines.next()?)
            }
            SceneNode::StaticShape(ShapeKind::TrapDoor) if td_pos.remaining() > 0 => {
                let pos = *td_pos.next()?;
                if prev_td_pos.next().ok() != Some(&pos) {
                    let id = obj.to_string();
                    let p = format_float(f64::from(pos));
                    if let Err(e) = host.call_function("SetTrapdoorThreadPos", &[&id, &p]) {
                        log::error!("cannot move trapdoor {obj}: {e}");
                    }
                }
                let dir = td_dirs.next()?.to_string();
                call(host, obj, "setThreadDir", &["0", &dir]);
                call(host, obj, "playThread", &["0"]);
                let open = *td_open.next()?;
                let close = *td_close.next()?;
                apply_trapdoor_timers(host, obj, open, close);
            }
            _ => {}
        }

        if node.is_rewindable() {
            let datablock = host.datablock_name(obj);
            for binding in registry.matching(&datablock) {
                objects.restore(host, binding, Some(obj))?;
            }
        }
    }
    Ok(())
}
