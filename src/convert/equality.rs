//! Equality constraints.
//!
//! Welds and connects become joints under the physics scope, excluded from
//! articulations. Joint couplings decorate the existing joint prim.

use super::author::{author, author_array, author_point, author_quat, display_name};
use super::context::{ConversionContext, LayerToken, RefKind};
use super::joint::set_bodies;
use crate::mjcf::{Equality, EqualityKind, DEFAULT_SOLIMP, DEFAULT_SOLREF};
use crate::usd::{Prim, PrimPath};
use crate::util::{DQuat, DVec3, Result, Transform};

const POLYCOEF_DEFAULTS: [f64; 5] = [0.0, 1.0, 0.0, 0.0, 0.0];

pub fn convert_equalities(ctx: &mut ConversionContext) -> Result<()> {
    let model = ctx.model;
    for equality in &model.equalities {
        match &equality.kind {
            EqualityKind::Weld { anchor, relpose, torquescale } => {
                convert_weld(ctx, equality, *anchor, relpose, *torquescale)?;
            }
            EqualityKind::Connect { anchor } => convert_connect(ctx, equality, *anchor)?,
            EqualityKind::Joint { polycoef } => convert_joint_coupling(ctx, equality, polycoef)?,
            EqualityKind::Unsupported(kind) => {
                ctx.warn_unsupported(format!(
                    "{kind} equality '{}'",
                    equality.name.as_deref().unwrap_or("")
                ));
            }
        }
    }
    Ok(())
}

/// Constrained objects as `(path, world transform)` pairs. The second
/// object defaults to the world.
type Endpoints = ((PrimPath, Transform), (PrimPath, Transform));

fn resolve_endpoints(ctx: &mut ConversionContext, equality: &Equality) -> Option<Endpoints> {
    let (kind, label) = if equality.on_sites { (RefKind::Sites, "site") } else { (RefKind::Bodies, "body") };
    let eq_name = equality.name.as_deref().unwrap_or("");
    let Some(name1) = equality.obj1.as_deref() else {
        ctx.warn_unresolved(format!("equality '{eq_name}' names no {label}"));
        return None;
    };
    let Some(first) = lookup_object(ctx, kind, name1) else {
        ctx.warn_unresolved(format!("{label} '{name1}' for equality '{eq_name}'"));
        return None;
    };
    let second = match equality.obj2.as_deref() {
        Some(name2) => match lookup_object(ctx, kind, name2) {
            Some(path) => path,
            None => {
                ctx.warn_unresolved(format!("{label} '{name2}' for equality '{eq_name}'"));
                return None;
            }
        },
        None => ctx.root_path(),
    };
    let w1 = ctx.world_transform(&first);
    let w2 = ctx.world_transform(&second);
    Some(((first, w1), (second, w2)))
}

fn lookup_object(ctx: &ConversionContext, kind: RefKind, name: &str) -> Option<PrimPath> {
    match kind {
        RefKind::Bodies => ctx.lookup_body(name),
        _ => ctx.lookup(kind, name),
    }
}

/// Define the constraint joint prim under the physics scope.
fn define_constraint<'c>(
    ctx: &'c mut ConversionContext,
    equality: &Equality,
    type_name: &str,
    body0: &PrimPath,
    body1: &PrimPath,
) -> Result<&'c mut Prim> {
    let scope = ctx.physics_scope()?;
    let source = equality.name.as_deref();
    let name = ctx.names.get_name(&scope, source.unwrap_or(""), "Equality");
    let prim = ctx.define(LayerToken::Physics, &scope.child(&name), type_name)?;
    display_name(prim, source, &name);
    set_bodies(prim, body0, body1);
    prim.set_attribute("physics:excludeFromArticulation", true);
    author(prim, "physics:jointEnabled", equality.active, true);
    Ok(prim)
}

fn author_solver(prim: &mut Prim, equality: &Equality) {
    author_array(prim, "mjc:solref", &equality.solref, &DEFAULT_SOLREF);
    author_array(prim, "mjc:solimp", &equality.solimp, &DEFAULT_SOLIMP);
}

/// Relative pose of a weld: explicit, or the reference configuration when
/// the quaternion part is all zeros.
pub fn weld_relpose(relpose: &[f64; 7], w1: &Transform, w2: &Transform) -> Transform {
    let [px, py, pz, qw, qx, qy, qz] = *relpose;
    let q = DQuat::from_xyzw(qx, qy, qz, qw);
    if q.length() == 0.0 {
        w1.inverse_rigid().mul_rigid(w2)
    } else {
        Transform::new(DVec3::new(px, py, pz), q.normalize())
    }
}

fn convert_weld(
    ctx: &mut ConversionContext,
    equality: &Equality,
    anchor: DVec3,
    relpose: &[f64; 7],
    torquescale: f64,
) -> Result<()> {
    let Some(((p1, w1), (p2, w2))) = resolve_endpoints(ctx, equality) else {
        return Ok(());
    };
    let prim = define_constraint(ctx, equality, "PhysicsFixedJoint", &p1, &p2)?;
    if !equality.on_sites {
        let rel = weld_relpose(relpose, &w1, &w2);
        author_point(prim, "physics:localPos0", rel.transform_point(anchor));
        author_quat(prim, "physics:localRot0", rel.rotation);
        author_point(prim, "physics:localPos1", anchor);
    }
    prim.apply_api("MjcEqualityWeldAPI");
    author_solver(prim, equality);
    author(prim, "mjc:torqueScale", torquescale, 1.0);
    Ok(())
}

fn convert_connect(ctx: &mut ConversionContext, equality: &Equality, anchor: DVec3) -> Result<()> {
    let Some(((p1, w1), (p2, w2))) = resolve_endpoints(ctx, equality) else {
        return Ok(());
    };
    let prim = define_constraint(ctx, equality, "PhysicsSphericalJoint", &p1, &p2)?;
    if !equality.on_sites {
        let world_anchor = w1.transform_point(anchor);
        author_point(prim, "physics:localPos0", anchor);
        author_point(prim, "physics:localPos1", w2.inverse_rigid().transform_point(world_anchor));
    }
    prim.apply_api("MjcEqualityConnectAPI");
    author_solver(prim, equality);
    Ok(())
}

fn convert_joint_coupling(ctx: &mut ConversionContext, equality: &Equality, polycoef: &[f64; 5]) -> Result<()> {
    let eq_name = equality.name.as_deref().unwrap_or("");
    let joint1 = equality.obj1.as_deref().unwrap_or("");
    let Some(path) = ctx.lookup(RefKind::Joints, joint1) else {
        ctx.warn_unresolved(format!("joint '{joint1}' for equality '{eq_name}'"));
        return Ok(());
    };
    let joint2 = equality.obj2.as_deref().unwrap_or("");
    let Some(target) = ctx.lookup(RefKind::Joints, joint2) else {
        ctx.warn_unresolved(format!("joint '{joint2}' for equality '{eq_name}'"));
        return Ok(());
    };
    let prim = ctx.overlay(LayerToken::Physics, &path)?;
    prim.apply_api("MjcEqualityJointAPI");
    for (i, (coef, default)) in polycoef.iter().zip(POLYCOEF_DEFAULTS).enumerate() {
        author(prim, &format!("mjc:coef{i}"), *coef, default);
    }
    prim.set_relationship("mjc:target", vec![target]);
    author_solver(prim, equality);
    author(prim, "physics:jointEnabled", equality.active, true);
    Ok(())
}
