//! Attribute authoring helpers shared by every converter.
//!
//! Schema-backed attributes go through [`author`], which writes a value
//! only when it differs from the schema fallback.

use crate::mjcf::TriState;
use crate::usd::{Prim, Value};
use crate::util::{DQuat, DVec3, Transform};

pub const XFORM_OP_TRANSLATE: &str = "xformOp:translate";
pub const XFORM_OP_ORIENT: &str = "xformOp:orient";
pub const XFORM_OP_SCALE: &str = "xformOp:scale";
pub const XFORM_OP_ORDER: &str = "xformOpOrder";

/// Author `name = value` unless `value == default`. Returns whether a
/// value was written.
pub fn author<T: PartialEq + Into<Value>>(prim: &mut Prim, name: &str, value: T, default: T) -> bool {
    if value == default {
        return false;
    }
    prim.set_attribute(name, value);
    true
}

/// [`author`] for `uniform` attributes.
pub fn author_uniform<T: PartialEq + Into<Value>>(prim: &mut Prim, name: &str, value: T, default: T) -> bool {
    if value == default {
        return false;
    }
    prim.set_uniform(name, value);
    true
}

/// Double arrays compared element-wise.
pub fn author_array(prim: &mut Prim, name: &str, value: &[f64], default: &[f64]) -> bool {
    author(prim, name, value.to_vec(), default.to_vec())
}

pub fn author_tristate(prim: &mut Prim, name: &str, value: TriState) -> bool {
    author(prim, name, value.token(), TriState::Auto.token())
}

/// `min`/`max` pair authored as `<name>:min` and `<name>:max`.
pub fn author_range(prim: &mut Prim, name: &str, range: [f64; 2], default: [f64; 2]) {
    author(prim, &format!("{name}:min"), range[0], default[0]);
    author(prim, &format!("{name}:max"), range[1], default[1]);
}

pub fn author_point(prim: &mut Prim, name: &str, value: DVec3) -> bool {
    author(prim, name, Value::point3f(value), Value::point3f(DVec3::ZERO))
}

pub fn author_quat(prim: &mut Prim, name: &str, value: DQuat) -> bool {
    author(prim, name, Value::quatf(value), Value::quatf(DQuat::IDENTITY))
}

/// Set `displayName` when the authored name differs from the source.
pub fn display_name(prim: &mut Prim, source: Option<&str>, authored: &str) {
    if let Some(source) = source {
        if source != authored {
            prim.set_display_name(source);
        }
    }
}

pub fn rgb(rgba: [f64; 4]) -> [f32; 3] {
    [rgba[0] as f32, rgba[1] as f32, rgba[2] as f32]
}

pub fn rgba_f32(rgba: [f64; 4]) -> [f32; 4] {
    [rgba[0] as f32, rgba[1] as f32, rgba[2] as f32, rgba[3] as f32]
}

/// Author translate + orient (+ scale when non-unit) ops and their order.
pub fn set_local_transform(prim: &mut Prim, xf: &Transform) {
    prim.set_attribute(XFORM_OP_TRANSLATE, xf.translation.to_array());
    prim.set_attribute(XFORM_OP_ORIENT, Value::quatf(xf.rotation));
    let mut order = vec![XFORM_OP_TRANSLATE.to_string(), XFORM_OP_ORIENT.to_string()];
    if xf.scale != DVec3::ONE {
        prim.set_attribute(XFORM_OP_SCALE, Value::float3(xf.scale));
        order.push(XFORM_OP_SCALE.to_string());
    }
    prim.set_uniform(XFORM_OP_ORDER, Value::TokenArray(order));
}
