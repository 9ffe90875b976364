//! Test utilities for rewind development.
//!
//! [`MockBridge`] stands in for the script runtime and [`MockScene`] for
//! the live mission tree. Both record every call so tests can assert on
//! what the engine asked of the host.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::{DQuat, DVec3};
use rewind_core::{format_float, BridgeError, EntityId, SceneHost, ScriptBridge};

/// Who a recorded call was addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallTarget {
    /// `Namespace::method(...)`.
    Namespace(String),
    /// A free function.
    Function,
    /// `%obj.method(...)`.
    Object(EntityId),
}

/// One recorded script call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub target: CallTarget,
    pub name: String,
    pub args: Vec<String>,
}

impl Call {
    fn new(target: CallTarget, name: &str, args: &[&str]) -> Self {
        Self {
            target,
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// In-memory script runtime.
///
/// Every namespace resolves unless it was marked with
/// [`fail_namespace`](Self::fail_namespace). The binding protocol
/// (`getState`, `setState`, `interpolateState`) is backed by a value
/// store so captured states survive a set/get cycle. `interpolateState`
/// blends numeric arguments linearly and picks text by ratio.
#[derive(Debug, Default)]
pub struct MockBridge {
    variables: HashMap<String, String>,
    failing: HashSet<String>,
    global_state: HashMap<String, String>,
    object_state: HashMap<(String, String), String>,
    function_results: HashMap<String, String>,
    pub calls: Vec<Call>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call into `namespace` fail as unresolved.
    pub fn fail_namespace(&mut self, namespace: &str) {
        self.failing.insert(namespace.to_string());
    }

    /// Value returned by the free function `name`.
    pub fn set_function_result(&mut self, name: &str, value: impl Into<String>) {
        self.function_results.insert(name.to_string(), value.into());
    }

    /// Seed the value `ns::getState()` returns.
    pub fn set_global_state(&mut self, namespace: &str, value: impl Into<String>) {
        self.global_state.insert(namespace.to_string(), value.into());
    }

    /// Seed the value `ns::getState(obj)` returns.
    pub fn set_object_state(&mut self, namespace: &str, obj: EntityId, value: impl Into<String>) {
        self.object_state
            .insert((namespace.to_string(), obj.to_string()), value.into());
    }

    /// Last value written by `ns::setState(v)`, or seeded.
    pub fn global_state(&self, namespace: &str) -> Option<&str> {
        self.global_state.get(namespace).map(String::as_str)
    }

    /// Last value written by `ns::setState(obj, v)`, or seeded.
    pub fn object_state(&self, namespace: &str, obj: EntityId) -> Option<&str> {
        self.object_state
            .get(&(namespace.to_string(), obj.to_string()))
            .map(String::as_str)
    }

    /// Recorded calls with the given name, in call order.
    pub fn calls_named(&self, name: &str) -> Vec<&Call> {
        self.calls.iter().filter(|c| c.name == name).collect()
    }

    /// Recorded calls to `namespace::method`.
    pub fn namespaced_calls(&self, namespace: &str, method: &str) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| c.name == method && c.target == CallTarget::Namespace(namespace.to_string()))
            .collect()
    }

    /// Recorded calls of `method` on `obj`.
    pub fn object_calls(&self, obj: EntityId, method: &str) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| c.name == method && c.target == CallTarget::Object(obj))
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

fn blend(a: &str, b: &str, ratio: f64) -> String {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => format_float(x + (y - x) * ratio),
        _ => {
            if ratio > 0.5 {
                b.to_string()
            } else {
                a.to_string()
            }
        }
    }
}

impl ScriptBridge for MockBridge {
    fn call_namespaced(
        &mut self,
        namespace: &str,
        method: &str,
        args: &[&str],
    ) -> Result<String, BridgeError> {
        self.calls
            .push(Call::new(CallTarget::Namespace(namespace.to_string()), method, args));
        if self.failing.contains(namespace) {
            return Err(BridgeError::UnresolvedMethod {
                namespace: namespace.to_string(),
                method: method.to_string(),
            });
        }
        let ns = namespace.to_string();
        Ok(match (method, args) {
            ("getState", []) => self.global_state.get(&ns).cloned().unwrap_or_default(),
            ("getState", [obj]) => self
                .object_state
                .get(&(ns, obj.to_string()))
                .cloned()
                .unwrap_or_default(),
            ("setState", [v]) => {
                self.global_state.insert(ns, v.to_string());
                String::new()
            }
            ("setState", [obj, v]) => {
                self.object_state.insert((ns, obj.to_string()), v.to_string());
                String::new()
            }
            ("interpolateState", [a, b, r, _]) => {
                blend(a, b, r.trim().parse::<f64>().unwrap_or(0.0))
            }
            _ => String::new(),
        })
    }

    fn call_function(&mut self, name: &str, args: &[&str]) -> Result<String, BridgeError> {
        self.calls.push(Call::new(CallTarget::Function, name, args));
        Ok(self.function_results.get(name).cloned().unwrap_or_default())
    }

    fn call_method(
        &mut self,
        object: EntityId,
        method: &str,
        args: &[&str],
    ) -> Result<String, BridgeError> {
        self.calls.push(Call::new(CallTarget::Object(object), method, args));
        Ok(String::new())
    }

    fn variable(&self, name: &str) -> String {
        self.variables.get(name).cloned().unwrap_or_default()
    }

    fn set_variable(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }
}

/// One object in a [`MockScene`].
#[derive(Clone, Debug, Default)]
pub struct MockObject {
    pub name: Option<String>,
    pub class: String,
    pub datablock: String,
    pub datablock_class: String,
    pub fields: HashMap<String, String>,
    pub hidden: bool,
    pub children: Vec<EntityId>,
    /// Client-side path position; `None` for objects without a ghost.
    pub path_position: Option<f32>,
    pub target_position: f32,
    pub path_total_time: f64,
    pub thread_position: f32,
    pub thread_forward: i32,
    pub position: DVec3,
    pub rotation: DQuat,
    pub velocity: DVec3,
    pub spin: DVec3,
}

/// A scheduled event recorded by [`MockScene`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub id: i32,
    pub delay_ms: i32,
    /// `None` for a free-function event.
    pub target: Option<EntityId>,
    pub name: String,
    pub args: Vec<String>,
}

/// In-memory mission tree and script runtime.
///
/// A handful of object methods have side effects so a capture after an
/// apply observes what was applied: `setPowerup`/`getPowerup` go through
/// the `powerup` field, `setTime` writes `elapsedTime`, `setOOB` writes
/// `oob`, and `setGemCount` writes `gemCount`.
#[derive(Debug)]
pub struct MockScene {
    pub bridge: MockBridge,
    objects: BTreeMap<EntityId, MockObject>,
    next_id: u32,
    pub events: Vec<ScheduledEvent>,
    pub cancelled: Vec<i32>,
    next_event: i32,
}

impl MockScene {
    pub fn new() -> Self {
        Self {
            bridge: MockBridge::new(),
            objects: BTreeMap::new(),
            next_id: 1000,
            events: Vec::new(),
            cancelled: Vec::new(),
            next_event: 1,
        }
    }

    /// Add an object under `parent` (or unparented) and return its id.
    pub fn add(&mut self, parent: Option<EntityId>, object: MockObject) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, object);
        if let Some(p) = parent {
            if let Some(group) = self.objects.get_mut(&p) {
                group.children.push(id);
            }
        }
        id
    }

    pub fn add_group(&mut self, parent: Option<EntityId>, name: &str) -> EntityId {
        self.add(
            parent,
            MockObject {
                name: Some(name.to_string()),
                class: "SimGroup".into(),
                ..MockObject::default()
            },
        )
    }

    /// Add a named non-mission object such as `PlayGui`.
    pub fn add_named(&mut self, name: &str, class: &str) -> EntityId {
        self.add(
            None,
            MockObject {
                name: Some(name.to_string()),
                class: class.into(),
                ..MockObject::default()
            },
        )
    }

    pub fn add_item(
        &mut self,
        parent: EntityId,
        datablock: &str,
        datablock_class: &str,
    ) -> EntityId {
        self.add(
            Some(parent),
            MockObject {
                class: "Item".into(),
                datablock: datablock.into(),
                datablock_class: datablock_class.into(),
                ..MockObject::default()
            },
        )
    }

    pub fn add_gem(&mut self, parent: EntityId) -> EntityId {
        self.add_item(parent, "GemItem", "Gem")
    }

    pub fn add_time_travel(&mut self, parent: EntityId) -> EntityId {
        self.add_item(parent, "TimeTravelItem", "TimeTravel")
    }

    pub fn add_powerup(&mut self, parent: EntityId, datablock: &str) -> EntityId {
        self.add_item(parent, datablock, "PowerUp")
    }

    pub fn add_egg(&mut self, parent: EntityId) -> EntityId {
        self.add_item(parent, "EasterEgg", "EasterEgg")
    }

    pub fn add_shape(
        &mut self,
        parent: EntityId,
        datablock: &str,
        datablock_class: &str,
    ) -> EntityId {
        self.add(
            Some(parent),
            MockObject {
                class: "StaticShape".into(),
                datablock: datablock.into(),
                datablock_class: datablock_class.into(),
                ..MockObject::default()
            },
        )
    }

    pub fn add_mine(&mut self, parent: EntityId) -> EntityId {
        self.add_shape(parent, "LandMine", "Explosive")
    }

    pub fn add_trapdoor(&mut self, parent: EntityId) -> EntityId {
        let id = self.add_shape(parent, "TrapDoor", "TrapDoorClass");
        if let Some(o) = self.objects.get_mut(&id) {
            o.thread_forward = 1;
        }
        id
    }

    pub fn add_trigger(&mut self, parent: EntityId, datablock: &str) -> EntityId {
        self.add(
            Some(parent),
            MockObject {
                class: "Trigger".into(),
                datablock: datablock.into(),
                datablock_class: "TriggerData".into(),
                ..MockObject::default()
            },
        )
    }

    /// A moving platform with a client ghost at position 0.
    pub fn add_platform(&mut self, parent: EntityId, total_time: f64) -> EntityId {
        self.add(
            Some(parent),
            MockObject {
                class: "PathedInterior".into(),
                path_position: Some(0.0),
                path_total_time: total_time,
                ..MockObject::default()
            },
        )
    }

    /// # Panics
    ///
    /// Panics if `id` was not created by this scene.
    pub fn object(&self, id: EntityId) -> &MockObject {
        &self.objects[&id]
    }

    /// # Panics
    ///
    /// Panics if `id` was not created by this scene.
    pub fn object_mut(&mut self, id: EntityId) -> &mut MockObject {
        self.objects.get_mut(&id).expect("unknown mock object")
    }

    /// Events scheduled with the given method or function name.
    pub fn events_named(&self, name: &str) -> Vec<&ScheduledEvent> {
        self.events.iter().filter(|e| e.name == name).collect()
    }

    fn schedule(
        &mut self,
        target: Option<EntityId>,
        delay_ms: i32,
        name: &str,
        args: &[&str],
    ) -> i32 {
        let id = self.next_event;
        self.next_event += 1;
        self.events.push(ScheduledEvent {
            id,
            delay_ms,
            target,
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        id
    }
}

impl Default for MockScene {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptBridge for MockScene {
    fn call_namespaced(
        &mut self,
        namespace: &str,
        method: &str,
        args: &[&str],
    ) -> Result<String, BridgeError> {
        self.bridge.call_namespaced(namespace, method, args)
    }

    fn call_function(&mut self, name: &str, args: &[&str]) -> Result<String, BridgeError> {
        self.bridge.call_function(name, args)
    }

    fn call_method(
        &mut self,
        object: EntityId,
        method: &str,
        args: &[&str],
    ) -> Result<String, BridgeError> {
        self.bridge.call_method(object, method, args)?;
        let Some(o) = self.objects.get_mut(&object) else {
            return Err(BridgeError::UnknownObject { object });
        };
        let first = args.first().map(|a| a.to_string()).unwrap_or_default();
        Ok(match method {
            "getPowerup" => o.fields.get("powerup").cloned().unwrap_or_default(),
            "setPowerup" => {
                o.fields.insert("powerup".into(), first);
                String::new()
            }
            "setTime" => {
                o.fields.insert("elapsedTime".into(), first);
                String::new()
            }
            "setOOB" => {
                o.fields.insert("oob".into(), first);
                String::new()
            }
            "setGemCount" => {
                o.fields.insert("gemCount".into(), first);
                String::new()
            }
            _ => String::new(),
        })
    }

    fn variable(&self, name: &str) -> String {
        self.bridge.variable(name)
    }

    fn set_variable(&mut self, name: &str, value: &str) {
        self.bridge.set_variable(name, value)
    }
}

impl SceneHost for MockScene {
    fn find_object(&self, name: &str) -> Option<EntityId> {
        if let Ok(n) = name.trim().parse::<u32>() {
            let id = EntityId(n);
            return self.objects.contains_key(&id).then_some(id);
        }
        self.objects
            .iter()
            .find(|(_, o)| o.name.as_deref() == Some(name))
            .map(|(id, _)| *id)
    }

    fn children(&self, group: EntityId) -> Vec<EntityId> {
        self.objects
            .get(&group)
            .map(|o| o.children.clone())
            .unwrap_or_default()
    }

    fn class_name(&self, obj: EntityId) -> String {
        self.objects.get(&obj).map(|o| o.class.clone()).unwrap_or_default()
    }

    fn datablock_name(&self, obj: EntityId) -> String {
        self.objects
            .get(&obj)
            .map(|o| o.datablock.clone())
            .unwrap_or_default()
    }

    fn datablock_class(&self, obj: EntityId) -> String {
        self.objects
            .get(&obj)
            .map(|o| o.datablock_class.clone())
            .unwrap_or_default()
    }

    fn field(&self, obj: EntityId, name: &str) -> String {
        self.objects
            .get(&obj)
            .and_then(|o| o.fields.get(name).cloned())
            .unwrap_or_default()
    }

    fn set_field(&mut self, obj: EntityId, name: &str, value: &str) {
        if let Some(o) = self.objects.get_mut(&obj) {
            o.fields.insert(name.to_string(), value.to_string());
        }
    }

    fn is_hidden(&self, obj: EntityId) -> bool {
        self.objects.get(&obj).is_some_and(|o| o.hidden)
    }

    fn set_hidden(&mut self, obj: EntityId, hidden: bool) {
        if let Some(o) = self.objects.get_mut(&obj) {
            o.hidden = hidden;
        }
    }

    fn cancel_event(&mut self, event: i32) {
        self.cancelled.push(event);
    }

    fn schedule_method(
        &mut self,
        obj: EntityId,
        delay_ms: i32,
        method: &str,
        args: &[&str],
    ) -> i32 {
        self.schedule(Some(obj), delay_ms, method, args)
    }

    fn schedule_function(&mut self, delay_ms: i32, function: &str, args: &[&str]) -> i32 {
        self.schedule(None, delay_ms, function, args)
    }

    fn path_position(&self, obj: EntityId) -> Option<f32> {
        self.objects.get(&obj).and_then(|o| o.path_position)
    }

    fn target_position(&self, obj: EntityId) -> f32 {
        self.objects.get(&obj).map_or(0.0, |o| o.target_position)
    }

    fn set_path_position(&mut self, obj: EntityId, pos: i32) {
        if let Some(o) = self.objects.get_mut(&obj) {
            o.path_position = Some(pos as f32);
        }
    }

    fn path_total_time(&self, obj: EntityId) -> f64 {
        self.objects.get(&obj).map_or(0.0, |o| o.path_total_time)
    }

    fn thread_position(&self, obj: EntityId) -> f32 {
        self.objects.get(&obj).map_or(0.0, |o| o.thread_position)
    }

    fn thread_forward(&self, obj: EntityId) -> i32 {
        self.objects.get(&obj).map_or(0, |o| o.thread_forward)
    }

    fn transform(&self, obj: EntityId) -> (DVec3, DQuat) {
        self.objects
            .get(&obj)
            .map_or((DVec3::ZERO, DQuat::IDENTITY), |o| (o.position, o.rotation))
    }

    fn set_transform(&mut self, obj: EntityId, position: DVec3, rotation: DQuat) {
        if let Some(o) = self.objects.get_mut(&obj) {
            o.position = position;
            o.rotation = rotation;
        }
    }

    fn velocity(&self, obj: EntityId) -> DVec3 {
        self.objects.get(&obj).map_or(DVec3::ZERO, |o| o.velocity)
    }

    fn set_velocity(&mut self, obj: EntityId, velocity: DVec3) {
        if let Some(o) = self.objects.get_mut(&obj) {
            o.velocity = velocity;
        }
    }

    fn angular_velocity(&self, obj: EntityId) -> DVec3 {
        self.objects.get(&obj).map_or(DVec3::ZERO, |o| o.spin)
    }

    fn set_angular_velocity(&mut self, obj: EntityId, spin: DVec3) {
        if let Some(o) = self.objects.get_mut(&obj) {
            o.spin = spin;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_protocol_round_trips() {
        let mut b = MockBridge::new();
        b.call_namespaced("Score", "setState", &["42"]).unwrap();
        assert_eq!(b.call_namespaced("Score", "getState", &[]).unwrap(), "42");
        b.call_namespaced("Door", "setState", &["7", "1"]).unwrap();
        assert_eq!(b.object_state("Door", EntityId(7)), Some("1"));
    }

    #[test]
    fn interpolate_blends_numbers_and_picks_text() {
        let mut b = MockBridge::new();
        let r = b
            .call_namespaced("X", "interpolateState", &["0", "10", "0.25", "16"])
            .unwrap();
        assert_eq!(r, "2.500000");
        let r = b
            .call_namespaced("X", "interpolateState", &["a", "b", "0.75", "16"])
            .unwrap();
        assert_eq!(r, "b");
    }

    #[test]
    fn failing_namespace_is_unresolved() {
        let mut b = MockBridge::new();
        b.fail_namespace("Broken");
        assert!(b.call_namespaced("Broken", "getState", &[]).is_err());
        assert_eq!(b.calls.len(), 1);
    }

    #[test]
    fn find_by_name_or_id() {
        let mut s = MockScene::new();
        let g = s.add_group(None, "MissionGroup");
        let gem = s.add_gem(g);
        assert_eq!(s.find_object("MissionGroup"), Some(g));
        assert_eq!(s.find_object(&gem.to_string()), Some(gem));
        assert_eq!(s.find_object("0"), None);
        assert_eq!(s.children(g), vec![gem]);
    }

    #[test]
    fn events_get_fresh_ids() {
        let mut s = MockScene::new();
        let g = s.add_group(None, "G");
        let a = s.schedule_method(g, 100, "hide", &["false"]);
        let b = s.schedule_function(200, "Trapdoor_open", &["5"]);
        assert_ne!(a, b);
        assert_eq!(s.events_named("Trapdoor_open")[0].delay_ms, 200);
    }
}
