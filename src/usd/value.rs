//! Typed attribute values and their text encoding.

use std::fmt::{self, Write};

use crate::util::{DQuat, DVec3};

/// Attribute value. Each variant maps to one scene-description value type.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    Token(String),
    String(String),
    Asset(String),
    Float3([f32; 3]),
    Double3([f64; 3]),
    Point3f([f32; 3]),
    Color3f([f32; 3]),
    Vector3f([f32; 3]),
    Float4([f32; 4]),
    /// Stored as `(w, x, y, z)`.
    Quatf([f32; 4]),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    TokenArray(Vec<String>),
    Float3Array(Vec<[f32; 3]>),
    Point3fArray(Vec<[f32; 3]>),
    Normal3fArray(Vec<[f32; 3]>),
    Color3fArray(Vec<[f32; 3]>),
    TexCoord2fArray(Vec<[f32; 2]>),
}

impl Value {
    /// Scene-description type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Token(_) => "token",
            Value::String(_) => "string",
            Value::Asset(_) => "asset",
            Value::Float3(_) => "float3",
            Value::Double3(_) => "double3",
            Value::Point3f(_) => "point3f",
            Value::Color3f(_) => "color3f",
            Value::Vector3f(_) => "vector3f",
            Value::Float4(_) => "float4",
            Value::Quatf(_) => "quatf",
            Value::IntArray(_) => "int[]",
            Value::FloatArray(_) => "float[]",
            Value::DoubleArray(_) => "double[]",
            Value::TokenArray(_) => "token[]",
            Value::Float3Array(_) => "float3[]",
            Value::Point3fArray(_) => "point3f[]",
            Value::Normal3fArray(_) => "normal3f[]",
            Value::Color3fArray(_) => "color3f[]",
            Value::TexCoord2fArray(_) => "texCoord2f[]",
        }
    }

    pub fn token(s: impl Into<String>) -> Self {
        Value::Token(s.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn point3f(v: DVec3) -> Self {
        Value::Point3f(v.as_vec3().to_array())
    }

    pub fn float3(v: DVec3) -> Self {
        Value::Float3(v.as_vec3().to_array())
    }

    pub fn vector3f(v: DVec3) -> Self {
        Value::Vector3f(v.as_vec3().to_array())
    }

    pub fn quatf(q: DQuat) -> Self {
        Value::Quatf([q.w as f32, q.x as f32, q.y as f32, q.z as f32])
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Any scalar float value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Token, string or asset text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Token(s) | Value::String(s) | Value::Asset(s) => Some(s),
            _ => None,
        }
    }

    /// Any 3-component value widened to `f64`.
    pub fn as_vec3(&self) -> Option<DVec3> {
        match self {
            Value::Float3(v) | Value::Point3f(v) | Value::Color3f(v) | Value::Vector3f(v) => {
                Some(DVec3::new(v[0] as f64, v[1] as f64, v[2] as f64))
            }
            Value::Double3(v) => Some(DVec3::from_array(*v)),
            _ => None,
        }
    }

    pub fn as_quat(&self) -> Option<DQuat> {
        match self {
            Value::Quatf(q) => Some(DQuat::from_xyzw(q[1] as f64, q[2] as f64, q[3] as f64, q[0] as f64)),
            _ => None,
        }
    }

    pub fn as_f64_array(&self) -> Option<Vec<f64>> {
        match self {
            Value::DoubleArray(v) => Some(v.clone()),
            Value::FloatArray(v) => Some(v.iter().map(|x| *x as f64).collect()),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Value::IntArray(v) => Some(v),
            _ => None,
        }
    }

    /// Encode into `out` using the text syntax.
    pub fn write_to(&self, out: &mut String) {
        match self {
            Value::Bool(b) => out.push_str(if *b { "1" } else { "0" }),
            Value::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Value::Float(v) => out.push_str(&format_f32(*v)),
            Value::Double(v) => out.push_str(&format_f64(*v)),
            Value::Token(s) | Value::String(s) => write_quoted(out, s),
            Value::Asset(s) => {
                let _ = write!(out, "@{s}@");
            }
            Value::Float3(v) | Value::Point3f(v) | Value::Color3f(v) | Value::Vector3f(v) => {
                write_tuple_f32(out, v)
            }
            Value::Double3(v) => {
                let parts: Vec<String> = v.iter().map(|x| format_f64(*x)).collect();
                let _ = write!(out, "({})", parts.join(", "));
            }
            Value::Float4(v) | Value::Quatf(v) => write_tuple_f32(out, v),
            Value::IntArray(v) => write_array(out, v, |o, x| {
                let _ = write!(o, "{x}");
            }),
            Value::FloatArray(v) => write_array(out, v, |o, x| o.push_str(&format_f32(*x))),
            Value::DoubleArray(v) => write_array(out, v, |o, x| o.push_str(&format_f64(*x))),
            Value::TokenArray(v) => write_array(out, v, |o, x| write_quoted(o, x)),
            Value::Float3Array(v)
            | Value::Point3fArray(v)
            | Value::Normal3fArray(v)
            | Value::Color3fArray(v) => write_array(out, v, |o, x| write_tuple_f32(o, x)),
            Value::TexCoord2fArray(v) => write_array(out, v, |o, x| write_tuple_f32(o, x)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        self.write_to(&mut s);
        f.write_str(&s)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Token(v.to_string())
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Value::Double3(v)
    }
}

impl From<[f32; 4]> for Value {
    fn from(v: [f32; 4]) -> Self {
        Value::Float4(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::DoubleArray(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntArray(v)
    }
}

/// Shortest round-trip text for a double.
pub fn format_f64(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{v}")
    }
}

/// Shortest round-trip text for a float.
pub fn format_f32(v: f32) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{v}")
    }
}

/// Quote and escape a string literal.
pub fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_tuple_f32(out: &mut String, v: &[f32]) {
    out.push('(');
    for (i, x) in v.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format_f32(*x));
    }
    out.push(')');
}

fn write_array<T>(out: &mut String, items: &[T], mut each: impl FnMut(&mut String, &T)) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        each(out, item);
    }
    out.push(']');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_text() {
        assert_eq!(Value::Bool(true).to_string(), "1");
        assert_eq!(Value::Double(0.002).to_string(), "0.002");
        assert_eq!(Value::Float(1.0).to_string(), "1");
        assert_eq!(Value::Double(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(Value::token("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Value::Asset("./Geometry.usda".into()).to_string(), "@./Geometry.usda@");
    }

    #[test]
    fn test_compound_text() {
        assert_eq!(Value::Quatf([1.0, 0.0, 0.0, 0.0]).to_string(), "(1, 0, 0, 0)");
        assert_eq!(Value::IntArray(vec![3, 3]).to_string(), "[3, 3]");
        assert_eq!(
            Value::Float3Array(vec![[-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]]).to_string(),
            "[(-1, -1, -1), (1, 1, 1)]"
        );
        assert_eq!(Value::TokenArray(vec!["xformOp:translate".into()]).to_string(), "[\"xformOp:translate\"]");
    }

    #[test]
    fn test_quat_roundtrip() {
        let q = DQuat::from_rotation_z(0.5);
        let back = Value::quatf(q).as_quat().unwrap();
        assert!(back.angle_between(q) < 1e-6);
        assert_eq!(Value::quatf(q).type_name(), "quatf");
    }
}
