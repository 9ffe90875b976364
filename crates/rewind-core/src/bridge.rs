//! The string-marshaling boundary to the host's script runtime.
//!
//! Everything the engine asks of game scripts goes through
//! [`ScriptBridge`]: arguments are already rendered to strings and results
//! come back as strings. Typed conversion lives in
//! [`StateValue`](crate::value::StateValue), so nothing above this trait
//! builds argument strings by hand.

use crate::error::BridgeError;
use crate::id::EntityId;

/// Calls into the host's script runtime.
///
/// All methods take `&mut self` for calls because script code may mutate
/// arbitrary game state.
pub trait ScriptBridge {
    /// Invoke `namespace::method(args...)` and return its result.
    ///
    /// Fails with [`BridgeError::UnresolvedMethod`] if the method is not
    /// defined for that namespace.
    fn call_namespaced(
        &mut self,
        namespace: &str,
        method: &str,
        args: &[&str],
    ) -> Result<String, BridgeError>;

    /// Invoke a free script function.
    fn call_function(&mut self, name: &str, args: &[&str]) -> Result<String, BridgeError>;

    /// Invoke a method on a live object (`%obj.method(args...)`).
    fn call_method(
        &mut self,
        object: EntityId,
        method: &str,
        args: &[&str],
    ) -> Result<String, BridgeError>;

    /// Read a global script variable. Undefined variables read as `""`.
    fn variable(&self, name: &str) -> String;

    /// Write a global script variable.
    fn set_variable(&mut self, name: &str, value: &str);
}
