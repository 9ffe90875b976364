//! The host's live scene graph, seen through opaque entity ids.
//!
//! [`SceneHost`] is the narrow surface the mission walker, capture, and
//! apply paths need from the game engine. [`SceneNode`] is the closed
//! classification of a mission-tree node, computed once per visit so the
//! walkers dispatch on an enum instead of comparing class and datablock
//! strings at each step.

use glam::{DQuat, DVec3};

use crate::bridge::ScriptBridge;
use crate::id::{EntityId, GameFlavor};

/// Access to the host engine's object model.
///
/// Object-taking methods assume `obj` is live; hosts report stale handles
/// however they see fit (typically by returning defaults).
pub trait SceneHost: ScriptBridge {
    /// Resolve an object by name or numeric id string.
    fn find_object(&self, name: &str) -> Option<EntityId>;

    /// Direct children of a group, in group order.
    fn children(&self, group: EntityId) -> Vec<EntityId>;

    /// Engine class name (`"SimGroup"`, `"Item"`, `"StaticShape"`, …).
    fn class_name(&self, obj: EntityId) -> String;

    /// Name of the object's datablock, or `""` if it has none.
    fn datablock_name(&self, obj: EntityId) -> String;

    /// The `className` field of the object's datablock.
    fn datablock_class(&self, obj: EntityId) -> String;

    /// Read a dynamic field. Unset fields read as `""`.
    fn field(&self, obj: EntityId, name: &str) -> String;

    /// Write a dynamic field.
    fn set_field(&mut self, obj: EntityId, name: &str, value: &str);

    /// Whether a shape is hidden.
    fn is_hidden(&self, obj: EntityId) -> bool;

    /// Hide or show a shape.
    fn set_hidden(&mut self, obj: EntityId, hidden: bool);

    /// Cancel a pending scheduled event. Unknown ids are ignored.
    fn cancel_event(&mut self, event: i32);

    /// Schedule `obj.method(args)` after `delay_ms`; returns the event id.
    fn schedule_method(&mut self, obj: EntityId, delay_ms: i32, method: &str, args: &[&str])
        -> i32;

    /// Schedule a free function call after `delay_ms`; returns the event id.
    fn schedule_function(&mut self, delay_ms: i32, function: &str, args: &[&str]) -> i32;

    /// Path position of the client-side copy of a moving platform, if the
    /// client copy exists.
    fn path_position(&self, obj: EntityId) -> Option<f32>;

    /// Target position of a moving platform.
    fn target_position(&self, obj: EntityId) -> f32;

    /// Move a platform (server and client copies) to `pos`, clamped by the
    /// host to the path's range.
    fn set_path_position(&mut self, obj: EntityId, pos: i32);

    /// Total duration of a platform's path, in milliseconds.
    fn path_total_time(&self, obj: EntityId) -> f64;

    /// Animation position of a shape's primary thread.
    fn thread_position(&self, obj: EntityId) -> f32;

    /// Direction of a shape's primary thread, 1 forward and 0 backward.
    fn thread_forward(&self, obj: EntityId) -> i32;

    /// Position and rotation.
    fn transform(&self, obj: EntityId) -> (DVec3, DQuat);

    /// Set position and rotation.
    fn set_transform(&mut self, obj: EntityId, position: DVec3, rotation: DQuat);

    /// Linear velocity.
    fn velocity(&self, obj: EntityId) -> DVec3;

    /// Set linear velocity.
    fn set_velocity(&mut self, obj: EntityId, velocity: DVec3);

    /// Angular velocity.
    fn angular_velocity(&self, obj: EntityId) -> DVec3;

    /// Set angular velocity.
    fn set_angular_velocity(&mut self, obj: EntityId, spin: DVec3);
}

/// Flavors of pickup item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Datablock class `Gem`.
    Gem,
    /// Datablock `TimeTravelItem`.
    TimeTravel,
    /// Datablock `EasterEgg` (MBP only).
    EasterEgg,
    /// Every other item.
    Powerup,
}

/// Flavors of static shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Datablock class `Explosive`.
    Explosive,
    /// Datablock `TrapDoor`.
    TrapDoor,
    /// Any other static shape.
    Plain,
}

/// Classification of one mission-tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneNode {
    /// `SimGroup`; the walk descends into it.
    Group,
    /// A moving platform.
    PathedInterior,
    /// A pickup.
    Item(ItemKind),
    /// A static shape.
    StaticShape(ShapeKind),
    /// A trigger volume.
    Trigger,
    /// Anything the engine does not track.
    Other,
}

impl SceneNode {
    /// Classify `obj` by class name and datablock.
    pub fn classify<H: SceneHost + ?Sized>(host: &H, obj: EntityId, flavor: GameFlavor) -> Self {
        match host.class_name(obj).as_str() {
            "SimGroup" => Self::Group,
            "PathedInterior" => Self::PathedInterior,
            "Trigger" => Self::Trigger,
            "Item" => {
                let kind = if host.datablock_class(obj) == "Gem" {
                    ItemKind::Gem
                } else {
                    match host.datablock_name(obj).as_str() {
                        "TimeTravelItem" => ItemKind::TimeTravel,
                        "EasterEgg" if flavor.is_platinum() => ItemKind::EasterEgg,
                        _ => ItemKind::Powerup,
                    }
                };
                Self::Item(kind)
            }
            "StaticShape" => {
                let kind = if host.datablock_class(obj) == "Explosive" {
                    ShapeKind::Explosive
                } else if host.datablock_name(obj) == "TrapDoor" {
                    ShapeKind::TrapDoor
                } else {
                    ShapeKind::Plain
                };
                Self::StaticShape(kind)
            }
            _ => Self::Other,
        }
    }

    /// True for nodes that scene-object bindings can attach to.
    pub fn is_rewindable(self) -> bool {
        matches!(self, Self::Item(_) | Self::StaticShape(_) | Self::Trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewindable_kinds() {
        assert!(SceneNode::Trigger.is_rewindable());
        assert!(SceneNode::Item(ItemKind::Gem).is_rewindable());
        assert!(SceneNode::StaticShape(ShapeKind::Plain).is_rewindable());
        assert!(!SceneNode::Group.is_rewindable());
        assert!(!SceneNode::PathedInterior.is_rewindable());
        assert!(!SceneNode::Other.is_rewindable());
    }
}
