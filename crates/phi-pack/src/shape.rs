//! Argument shaping and result normalization

use serde_json::Value;

/// Decimal places kept for linear velocity
pub const LINEAR_PRECISION: u32 = 2;
/// Decimal places kept for angular velocity
pub const ANGULAR_PRECISION: u32 = 2;
/// Decimal places kept for head pose axes
pub const POSE_PRECISION: u32 = 1;
/// Magnitudes below this are floating-point noise
pub const SNAP_THRESHOLD: f64 = 0.001;

/// Round to `decimals` places and snap near-zero values to exactly 0
///
/// Non-finite input is treated as 0.
pub fn shape(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }

    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    // Too large to carry a fractional part at this precision
    if !scaled.is_finite() {
        return value;
    }
    let rounded = scaled.round() / factor;

    if rounded.abs() < SNAP_THRESHOLD {
        0.0
    } else {
        rounded
    }
}

/// Truthiness of an RPC result as the robots report it
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `name(arg, arg)` as shown in operator messages
pub fn describe_call(name: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(display_arg).collect();
    format!("{}({})", name, args.join(", "))
}

fn display_arg(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                display_float(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => s.clone(),
        // Nested lists print flat, without spaces
        Value::Array(items) => items.iter().map(display_arg).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Whole floats print without a fractional part: `3`, not `3.0`
fn display_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// Uppercase the first character
pub(crate) fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
