//! Joints between a body and its parent.
//!
//! Joints live in the physics layer as children of the body's override.
//! Hinge and slide joints use the schema's X axis; the source axis is
//! carried by the local rotations on both sides.

use super::author::{author, author_array, author_point, author_quat, author_range, author_tristate};
use super::context::{ConversionContext, LayerToken, RefKind};
use super::coords::align_vector_to_axis;
use crate::mjcf::{AngleUnit, Body, Joint, JointKind, TriState, DEFAULT_SOLIMP, DEFAULT_SOLREF};
use crate::usd::{Prim, PrimPath};
use crate::util::{DQuat, DVec3, Result, Transform};

pub const FIXED_JOINT: &str = "PhysicsFixedJoint";

fn joint_type(kind: JointKind) -> Option<&'static str> {
    match kind {
        JointKind::Hinge => Some("PhysicsRevoluteJoint"),
        JointKind::Slide => Some("PhysicsPrismaticJoint"),
        JointKind::Ball => Some("PhysicsSphericalJoint"),
        JointKind::Free => None,
    }
}

/// Author the joints of `body` at `body_path`. `body0` is the parent
/// body, or the default prim for bodies directly under the world.
pub fn convert_joints(
    ctx: &mut ConversionContext,
    body_path: &PrimPath,
    body0: &PrimPath,
    body_local: &Transform,
    body: &Body,
) -> Result<()> {
    if body.joints.is_empty() {
        let name = ctx.names.get_name(body_path, FIXED_JOINT, FIXED_JOINT);
        let prim = ctx.define(LayerToken::Physics, &body_path.child(&name), FIXED_JOINT)?;
        set_bodies(prim, body0, body_path);
        author_point(prim, "physics:localPos0", body_local.translation);
        author_quat(prim, "physics:localRot0", body_local.rotation);
        return Ok(());
    }
    for joint in &body.joints {
        convert_joint(ctx, body_path, body0, body_local, joint)?;
    }
    Ok(())
}

pub(crate) fn set_bodies(prim: &mut Prim, body0: &PrimPath, body1: &PrimPath) {
    prim.set_relationship("physics:body0", vec![body0.clone()]);
    prim.set_relationship("physics:body1", vec![body1.clone()]);
}

/// Whether a joint's range is enforced.
pub fn is_limited(limited: TriState, range: [f64; 2], autolimits: bool) -> bool {
    match limited {
        TriState::True => true,
        TriState::False => false,
        TriState::Auto => autolimits && range[0] != range[1],
    }
}

fn convert_joint(
    ctx: &mut ConversionContext,
    body_path: &PrimPath,
    body0: &PrimPath,
    body_local: &Transform,
    joint: &Joint,
) -> Result<Option<PrimPath>> {
    let Some(type_name) = joint_type(joint.kind) else {
        return Ok(None);
    };
    let model = ctx.model;
    let compiler = &model.compiler;
    let to_degrees = |v: f64| match compiler.angle {
        AngleUnit::Degree => v,
        AngleUnit::Radian => v.to_degrees(),
    };
    let limited = is_limited(joint.limited, joint.range, compiler.autolimits);
    let range = joint.range;
    let (lower, upper) = match joint.kind {
        JointKind::Hinge | JointKind::Ball => (to_degrees(range[0]), to_degrees(range[1])),
        _ => (range[0], range[1]),
    };

    let name = ctx.names.get_name(body_path, joint.name.as_deref().unwrap_or(""), type_name);
    let path = body_path.child(&name);
    let prim = ctx.define(LayerToken::Physics, &path, type_name)?;
    set_bodies(prim, body0, body_path);

    let local_rot1 = match joint.kind {
        JointKind::Ball => DQuat::IDENTITY,
        _ => align_vector_to_axis(DVec3::X, joint.axis),
    };
    author_point(prim, "physics:localPos0", body_local.transform_point(joint.pos));
    author_quat(prim, "physics:localRot0", (body_local.rotation * local_rot1).normalize());
    author_point(prim, "physics:localPos1", joint.pos);
    author_quat(prim, "physics:localRot1", local_rot1);

    if limited {
        match joint.kind {
            JointKind::Ball => {
                prim.set_attribute("physics:coneAngle0Limit", upper as f32);
                prim.set_attribute("physics:coneAngle1Limit", upper as f32);
            }
            _ => {
                prim.set_attribute("physics:lowerLimit", lower as f32);
                prim.set_attribute("physics:upperLimit", upper as f32);
            }
        }
    }

    prim.apply_api("MjcJointAPI");
    author(prim, "mjc:armature", joint.armature, 0.0);
    author(prim, "mjc:damping", joint.damping, 0.0);
    author(prim, "mjc:frictionloss", joint.frictionloss, 0.0);
    author(prim, "mjc:margin", joint.margin, 0.0);
    author(prim, "mjc:ref", joint.ref_position, 0.0);
    author(prim, "mjc:springref", joint.springref, 0.0);
    author(prim, "mjc:stiffness", joint.stiffness, 0.0);
    author_array(prim, "mjc:solreflimit", &joint.solreflimit, &DEFAULT_SOLREF);
    author_array(prim, "mjc:solimplimit", &joint.solimplimit, &DEFAULT_SOLIMP);
    author_array(prim, "mjc:solreffriction", &joint.solreffriction, &DEFAULT_SOLREF);
    author_array(prim, "mjc:solimpfriction", &joint.solimpfriction, &DEFAULT_SOLIMP);
    author_array(prim, "mjc:springdamper", &joint.springdamper, &[0.0, 0.0]);
    author_tristate(prim, "mjc:actuatorfrclimited", joint.actuatorfrclimited);
    author_range(prim, "mjc:actuatorfrcrange", joint.actuatorfrcrange, [0.0, 0.0]);
    author(prim, "mjc:actuatorgravcomp", joint.actuatorgravcomp, false);
    author(prim, "mjc:group", joint.group, 0);

    ctx.register(RefKind::Joints, joint.name.as_deref(), &path);
    Ok(Some(path))
}
