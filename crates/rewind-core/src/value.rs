//! Typed marshaling between binding values and script strings.
//!
//! The host script runtime only speaks strings. [`StateValue`] fixes, for
//! each of the four storage kinds, how a value is rendered as a call
//! argument and how a call result is parsed back. Parsing follows the C
//! library conventions the scripts were written against: leading-integer
//! and leading-float scans where trailing garbage is ignored and an
//! unparsable string reads as zero.

use std::fmt::Debug;

use crate::frame::{BindingStates, RewindableState};
use crate::id::StorageKind;

/// A value type that a rewindable binding can store.
///
/// Implemented for exactly `i32`, `f32`, `bool`, and `String`, matching
/// [`StorageKind`].
pub trait StateValue: Clone + Debug + PartialEq + Send + 'static {
    /// Storage kind tag for this type.
    const STORAGE: StorageKind;

    /// Render as a script call argument.
    fn to_arg(&self) -> String;

    /// Parse a script call result.
    fn from_result(result: &str) -> Self;

    /// Select this type's list from a set of binding states.
    fn list(states: &BindingStates) -> &Vec<RewindableState<Self>>;

    /// Select this type's list from a set of binding states, mutably.
    fn list_mut(states: &mut BindingStates) -> &mut Vec<RewindableState<Self>>;
}

impl StateValue for i32 {
    const STORAGE: StorageKind = StorageKind::Int;

    fn to_arg(&self) -> String {
        self.to_string()
    }

    fn from_result(result: &str) -> Self {
        parse_leading_int(result)
    }

    fn list(states: &BindingStates) -> &Vec<RewindableState<Self>> {
        &states.ints
    }

    fn list_mut(states: &mut BindingStates) -> &mut Vec<RewindableState<Self>> {
        &mut states.ints
    }
}

impl StateValue for f32 {
    const STORAGE: StorageKind = StorageKind::Float;

    fn to_arg(&self) -> String {
        format_float(f64::from(*self))
    }

    fn from_result(result: &str) -> Self {
        parse_leading_float(result) as f32
    }

    fn list(states: &BindingStates) -> &Vec<RewindableState<Self>> {
        &states.floats
    }

    fn list_mut(states: &mut BindingStates) -> &mut Vec<RewindableState<Self>> {
        &mut states.floats
    }
}

impl StateValue for bool {
    const STORAGE: StorageKind = StorageKind::Bool;

    fn to_arg(&self) -> String {
        if *self { "1" } else { "0" }.to_string()
    }

    fn from_result(result: &str) -> Self {
        let trimmed = result.trim();
        trimmed.eq_ignore_ascii_case("true") || parse_leading_float(trimmed) != 0.0
    }

    fn list(states: &BindingStates) -> &Vec<RewindableState<Self>> {
        &states.bools
    }

    fn list_mut(states: &mut BindingStates) -> &mut Vec<RewindableState<Self>> {
        &mut states.bools
    }
}

impl StateValue for String {
    const STORAGE: StorageKind = StorageKind::String;

    fn to_arg(&self) -> String {
        self.clone()
    }

    fn from_result(result: &str) -> Self {
        result.to_string()
    }

    fn list(states: &BindingStates) -> &Vec<RewindableState<Self>> {
        &states.strings
    }

    fn list_mut(states: &mut BindingStates) -> &mut Vec<RewindableState<Self>> {
        &mut states.strings
    }
}

/// Render a float with six fixed decimals (`%f`).
pub fn format_float(v: f64) -> String {
    format!("{v:.6}")
}

/// Parse the longest leading integer of `s`, ignoring leading whitespace.
///
/// Returns 0 when no digits are present. Out-of-range values saturate.
pub fn parse_leading_int(s: &str) -> i32 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut idx = 0;
    let mut negative = false;
    if let Some(&sign) = bytes.first() {
        if sign == b'-' || sign == b'+' {
            negative = sign == b'-';
            idx = 1;
        }
    }
    let mut acc: i64 = 0;
    while let Some(&b) = bytes.get(idx) {
        if !b.is_ascii_digit() {
            break;
        }
        acc = acc.saturating_mul(10).saturating_add(i64::from(b - b'0'));
        idx += 1;
    }
    if negative {
        acc = -acc;
    }
    acc.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Parse the longest leading decimal float of `s`, ignoring leading
/// whitespace. Returns 0.0 when nothing parses.
pub fn parse_leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-') | Some(b'+')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().unwrap_or(0.0)
}
