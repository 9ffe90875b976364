//! Ordered registry of rewindable bindings.

use indexmap::IndexMap;

use crate::binding::RewindableBinding;
use crate::id::BindingKind;

/// All bindings known to a session, keyed by namespace.
///
/// Iteration follows registration order, which is also the order in which
/// variable-binding states are captured into and restored from a
/// [`Frame`](crate::frame::Frame). Re-registering a namespace replaces the
/// binding in place and keeps its position.
#[derive(Clone, Debug, Default)]
pub struct BindingRegistry {
    bindings: IndexMap<String, RewindableBinding>,
}

impl BindingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding. Returns the binding it replaced, if any.
    pub fn register(&mut self, binding: RewindableBinding) -> Option<RewindableBinding> {
        let namespace = binding.namespace().to_string();
        let previous = self.bindings.insert(namespace, binding);
        if let Some(prev) = &previous {
            log::warn!(
                "rewindable binding {} registered twice, replacing",
                prev.namespace()
            );
        }
        previous
    }

    /// Remove a binding, preserving the order of the rest.
    pub fn unregister(&mut self, namespace: &str) -> Option<RewindableBinding> {
        self.bindings.shift_remove(namespace)
    }

    /// Look up a binding by namespace.
    pub fn get(&self, namespace: &str) -> Option<&RewindableBinding> {
        self.bindings.get(namespace)
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RewindableBinding> {
        self.bindings.values()
    }

    /// Variable bindings in registration order.
    pub fn variables(&self) -> impl Iterator<Item = &RewindableBinding> {
        self.iter().filter(|b| b.kind() == BindingKind::Variable)
    }

    /// Scene-object bindings in registration order.
    pub fn scene_objects(&self) -> impl Iterator<Item = &RewindableBinding> {
        self.iter().filter(|b| b.kind() == BindingKind::SceneObject)
    }

    /// Scene-object bindings attached to objects of `datablock`.
    pub fn matching<'a>(
        &'a self,
        datablock: &'a str,
    ) -> impl Iterator<Item = &'a RewindableBinding> + 'a {
        self.scene_objects().filter(move |b| b.namespace() == datablock)
    }
}
