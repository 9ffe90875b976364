//! Rewindable bindings: script-defined state the engine captures blindly.
//!
//! Game scripts register a namespace plus a binding kind and storage
//! kind. The engine then calls back into that namespace to read, write,
//! and blend values, never looking at what they mean:
//!
//! | Operation | Variable binding | Scene-object binding |
//! |-----------|------------------|----------------------|
//! | read | `ns::getState()` | `ns::getState(%obj)` |
//! | write | `ns::setState(%v)` | `ns::setState(%obj, %v)` |
//! | blend | `ns::interpolateState(%a, %b, %ratio, %delta)` | same |
//! | notify | `ns::onRewind()` | `ns::onRewind(%obj)` |

use crate::bridge::ScriptBridge;
use crate::error::BindingError;
use crate::frame::RewindableState;
use crate::id::{BindingKind, EntityId, StorageKind};
use crate::registry::BindingRegistry;
use crate::value::{format_float, StateValue};

/// A registered adapter over one script namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewindableBinding {
    namespace: String,
    kind: BindingKind,
    storage: StorageKind,
}

impl RewindableBinding {
    /// Create a binding. Registration happens through
    /// [`BindingRegistry::register`].
    pub fn new(namespace: impl Into<String>, kind: BindingKind, storage: StorageKind) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            storage,
        }
    }

    /// Script namespace, also the datablock name for scene-object bindings.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Variable or scene-object.
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    /// Value type.
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    fn check<T: StateValue>(&self) -> Result<(), BindingError> {
        if T::STORAGE == self.storage {
            Ok(())
        } else {
            Err(BindingError::StorageMismatch {
                namespace: self.namespace.clone(),
                expected: T::STORAGE,
                found: self.storage,
            })
        }
    }

    /// Read the current value, globally or for `object`.
    pub fn get_state<T: StateValue>(
        &self,
        bridge: &mut dyn ScriptBridge,
        object: Option<EntityId>,
    ) -> Result<T, BindingError> {
        self.check::<T>()?;
        let result = match object {
            Some(obj) => {
                let id = obj.to_string();
                bridge.call_namespaced(&self.namespace, "getState", &[&id])?
            }
            None => bridge.call_namespaced(&self.namespace, "getState", &[])?,
        };
        Ok(T::from_result(&result))
    }

    /// Write a value, globally or for `object`.
    pub fn set_state<T: StateValue>(
        &self,
        bridge: &mut dyn ScriptBridge,
        value: &T,
        object: Option<EntityId>,
    ) -> Result<(), BindingError> {
        self.check::<T>()?;
        let arg = value.to_arg();
        match object {
            Some(obj) => {
                let id = obj.to_string();
                bridge.call_namespaced(&self.namespace, "setState", &[&id, &arg])?;
            }
            None => {
                bridge.call_namespaced(&self.namespace, "setState", &[&arg])?;
            }
        }
        Ok(())
    }

    /// Ask the script to blend two captured values.
    pub fn interpolate_state<T: StateValue>(
        &self,
        bridge: &mut dyn ScriptBridge,
        one: &T,
        two: &T,
        ratio: f64,
        delta: f64,
    ) -> Result<T, BindingError> {
        self.check::<T>()?;
        let (a, b) = (one.to_arg(), two.to_arg());
        let (r, d) = (format_float(ratio), format_float(delta));
        let result = bridge.call_namespaced(&self.namespace, "interpolateState", &[&a, &b, &r, &d])?;
        Ok(T::from_result(&result))
    }

    /// Fire the `onRewind` notification.
    pub fn on_rewind(
        &self,
        bridge: &mut dyn ScriptBridge,
        object: Option<EntityId>,
    ) -> Result<(), BindingError> {
        match object {
            Some(obj) => {
                let id = obj.to_string();
                bridge.call_namespaced(&self.namespace, "onRewind", &[&id])?;
            }
            None => {
                bridge.call_namespaced(&self.namespace, "onRewind", &[])?;
            }
        }
        Ok(())
    }
}

/// Registry plus bridge, lent to the engine for one operation.
///
/// Interpolation of binding states needs both: the registry to find the
/// binding by namespace, and the bridge to run its script callback.
pub struct BindingContext<'a> {
    /// Registered bindings.
    pub registry: &'a BindingRegistry,
    /// Script runtime used for callbacks.
    pub bridge: &'a mut dyn ScriptBridge,
}

impl<'a> BindingContext<'a> {
    /// Bundle a registry and a bridge.
    pub fn new(registry: &'a BindingRegistry, bridge: &'a mut dyn ScriptBridge) -> Self {
        Self { registry, bridge }
    }

    /// Blend two tagged states through the binding named by `one`.
    ///
    /// An unknown namespace or failed callback is logged and the value is
    /// picked by ratio instead, so one broken script cannot stall playback.
    pub fn interpolate<T: StateValue>(
        &mut self,
        one: &RewindableState<T>,
        two: &RewindableState<T>,
        ratio: f64,
        delta: f64,
    ) -> RewindableState<T> {
        let result = match self.registry.get(&one.namespace) {
            Some(binding) => {
                binding.interpolate_state(&mut *self.bridge, &one.value, &two.value, ratio, delta)
            }
            None => Err(BindingError::UnknownNamespace {
                namespace: one.namespace.clone(),
            }),
        };
        let value = match result {
            Ok(v) => v,
            Err(e) => {
                log::error!("cannot interpolate rewindable state: {e}");
                if ratio > 0.5 {
                    two.value.clone()
                } else {
                    one.value.clone()
                }
            }
        };
        RewindableState::new(one.namespace.clone(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    /// Records calls and answers every call with a fixed string.
    struct Echo {
        calls: Vec<(String, String, Vec<String>)>,
        reply: String,
        known: Vec<String>,
    }

    impl Echo {
        fn new(reply: &str, known: &[&str]) -> Self {
            Self {
                calls: Vec::new(),
                reply: reply.to_string(),
                known: known.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl ScriptBridge for Echo {
        fn call_namespaced(
            &mut self,
            namespace: &str,
            method: &str,
            args: &[&str],
        ) -> Result<String, BridgeError> {
            if !self.known.iter().any(|k| k == namespace) {
                return Err(BridgeError::UnresolvedMethod {
                    namespace: namespace.to_string(),
                    method: method.to_string(),
                });
            }
            self.calls.push((
                namespace.to_string(),
                method.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            ));
            Ok(self.reply.clone())
        }

        fn call_function(&mut self, name: &str, _args: &[&str]) -> Result<String, BridgeError> {
            Err(BridgeError::UnresolvedFunction {
                name: name.to_string(),
            })
        }

        fn call_method(
            &mut self,
            object: EntityId,
            _method: &str,
            _args: &[&str],
        ) -> Result<String, BridgeError> {
            Err(BridgeError::UnknownObject { object })
        }

        fn variable(&self, _name: &str) -> String {
            String::new()
        }

        fn set_variable(&mut self, _name: &str, _value: &str) {}
    }

    // ── Call shapes ─────────────────────────────────────────────

    #[test]
    fn object_set_state_passes_object_first() {
        let mut bridge = Echo::new("", &["Door"]);
        let b = RewindableBinding::new("Door", BindingKind::SceneObject, StorageKind::Int);
        b.set_state(&mut bridge, &5, Some(EntityId(77))).unwrap();
        assert_eq!(bridge.calls[0].1, "setState");
        assert_eq!(bridge.calls[0].2, vec!["77".to_string(), "5".to_string()]);
    }

    #[test]
    fn interpolate_formats_ratio_and_delta() {
        let mut bridge = Echo::new("2.5", &["Fan"]);
        let b = RewindableBinding::new("Fan", BindingKind::Variable, StorageKind::Float);
        let v: f32 = b
            .interpolate_state(&mut bridge, &1.0, &4.0, 0.5, 16.0)
            .unwrap();
        assert_eq!(v, 2.5);
        assert_eq!(
            bridge.calls[0].2,
            vec!["1.000000", "4.000000", "0.500000", "16.000000"]
        );
    }

    #[test]
    fn get_state_without_object_has_no_args() {
        let mut bridge = Echo::new("1", &["Flag"]);
        let b = RewindableBinding::new("Flag", BindingKind::Variable, StorageKind::Bool);
        let v: bool = b.get_state(&mut bridge, None).unwrap();
        assert!(v);
        assert!(bridge.calls[0].2.is_empty());
    }

    #[test]
    fn storage_mismatch_is_rejected_before_calling() {
        let mut bridge = Echo::new("1", &["Flag"]);
        let b = RewindableBinding::new("Flag", BindingKind::Variable, StorageKind::Bool);
        let err = b.get_state::<i32>(&mut bridge, None).unwrap_err();
        assert!(matches!(err, BindingError::StorageMismatch { .. }));
        assert!(bridge.calls.is_empty());
    }

    // ── Context fallback ────────────────────────────────────────

    #[test]
    fn unknown_namespace_falls_back_by_ratio() {
        let registry = BindingRegistry::new();
        let mut bridge = Echo::new("", &[]);
        let mut cx = BindingContext::new(&registry, &mut bridge);
        let a = RewindableState::new("Ghost", 1);
        let b = RewindableState::new("Ghost", 9);
        assert_eq!(cx.interpolate(&a, &b, 0.3, 0.0).value, 1);
        assert_eq!(cx.interpolate(&a, &b, 0.7, 0.0).value, 9);
    }

    #[test]
    fn registered_binding_is_called() {
        let mut registry = BindingRegistry::new();
        registry.register(RewindableBinding::new(
            "Score",
            BindingKind::Variable,
            StorageKind::Int,
        ));
        let mut bridge = Echo::new("42", &["Score"]);
        let mut cx = BindingContext::new(&registry, &mut bridge);
        let out = cx.interpolate(
            &RewindableState::new("Score", 0),
            &RewindableState::new("Score", 100),
            0.5,
            10.0,
        );
        assert_eq!(out, RewindableState::new("Score", 42));
    }
}
