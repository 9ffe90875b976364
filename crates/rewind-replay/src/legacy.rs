//! Bracketed text lists used by early format versions.
//!
//! Before version 7, per-object lists were stored as strings such as
//! `"[1,0,0]"`. Moving-platform states still are, in every version, as
//! `"[p,t;p,t]"` with six-decimal floats. Parsing strips the first and
//! last character, splits on the delimiter while skipping empty tokens,
//! and scans each token as a leading number, so `"[]"` and `"[,]"` both
//! decode to an empty list and garbage tokens decode to zero.

use rewind_core::{format_float, parse_leading_float, parse_leading_int, MpState};

use crate::error::ReplayError;
use crate::stream::MemoryStream;

fn strip_brackets(text: &str) -> &str {
    let mut chars = text.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

fn tokens(text: &str, delim: char) -> impl Iterator<Item = &str> {
    strip_brackets(text).split(delim).filter(|t| !t.is_empty())
}

/// Parse `"[a<d>b<d>c]"` as integers.
pub fn parse_int_list(text: &str, delim: char) -> Vec<i32> {
    tokens(text, delim).map(parse_leading_int).collect()
}

/// Parse `"[a<d>b<d>c]"` as floats.
pub fn parse_float_list(text: &str, delim: char) -> Vec<f32> {
    tokens(text, delim)
        .map(|t| parse_leading_float(t) as f32)
        .collect()
}

/// Parse `"[p,t;p,t]"` moving-platform states. A missing component reads
/// as zero.
pub fn parse_mp_states(text: &str) -> Vec<MpState> {
    tokens(text, ';')
        .map(|pair| {
            let mut parts = pair.splitn(2, ',');
            let path = parts.next().map_or(0.0, parse_leading_float);
            let target = parts.next().map_or(0.0, parse_leading_float);
            MpState::new(path as f32, target as f32)
        })
        .collect()
}

/// Render integers as `"[a<d>b]"`.
pub fn format_int_list(values: &[i32], delim: char) -> String {
    let body: Vec<String> = values.iter().map(i32::to_string).collect();
    format!("[{}]", body.join(&delim.to_string()))
}

/// Render floats as `"[a<d>b]"` with six decimals.
pub fn format_float_list(values: &[f32], delim: char) -> String {
    let body: Vec<String> = values
        .iter()
        .map(|v| format_float(f64::from(*v)))
        .collect();
    format!("[{}]", body.join(&delim.to_string()))
}

/// Render moving-platform states as `"[p,t;p,t]"`.
pub fn format_mp_states(states: &[MpState]) -> String {
    let body: Vec<String> = states
        .iter()
        .map(|s| {
            format!(
                "{},{}",
                format_float(f64::from(s.path_position)),
                format_float(f64::from(s.target_position))
            )
        })
        .collect();
    format!("[{}]", body.join(";"))
}

/// Read a comma-separated integer list.
pub fn read_list_int(m: &mut MemoryStream) -> Result<Vec<i32>, ReplayError> {
    Ok(parse_int_list(&m.read_string()?, ','))
}

/// Read the semicolon-separated active-powerup list.
pub fn read_list_powerup_states(m: &mut MemoryStream) -> Result<Vec<i32>, ReplayError> {
    Ok(parse_int_list(&m.read_string()?, ';'))
}

/// Read a comma-separated float list.
pub fn read_list_float(m: &mut MemoryStream) -> Result<Vec<f32>, ReplayError> {
    Ok(parse_float_list(&m.read_string()?, ','))
}

/// Read moving-platform states.
pub fn read_list_mp_states(m: &mut MemoryStream) -> Result<Vec<MpState>, ReplayError> {
    Ok(parse_mp_states(&m.read_string()?))
}

/// Write moving-platform states.
pub fn write_list_mp_states(m: &mut MemoryStream, states: &[MpState]) {
    m.write_string(&format_mp_states(states));
}
