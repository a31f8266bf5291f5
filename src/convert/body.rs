//! Kinematic tree.
//!
//! Bodies become `Xform`s nested under the geometry scope in source order.
//! Rigid-body, articulation, kinematic and inertia data are physics-layer
//! overrides at the same paths.

use tracing::debug;

use super::author::{author, author_quat, display_name, set_local_transform};
use super::context::{ConversionContext, LayerToken, RefKind};
use super::coords::{local_transform, resolve_orientation, symmetric_eigen};
use super::geometry::{convert_geom, convert_site};
use super::joint::convert_joints;
use crate::mjcf::{Body, Compiler, Inertial};
use crate::usd::{Prim, PrimPath, Value};
use crate::util::{DMat3, DQuat, DVec3, Result, Transform};

/// Parent of a body in the tree.
struct Parent<'p> {
    path: &'p PrimPath,
    /// Target of the parent side of joints.
    body0: &'p PrimPath,
    world: Transform,
    is_world: bool,
    kinematic: bool,
}

/// Convert the world body: top-level bodies first, then world geoms and sites.
pub fn convert_bodies(ctx: &mut ConversionContext) -> Result<()> {
    let model = ctx.model;
    let scope = ctx.geometry_scope();
    ctx.define(LayerToken::Geometry, &scope, "Scope")?;
    let root = ctx.root_path();
    let world = &model.worldbody;

    let parent = Parent {
        path: &scope,
        body0: &root,
        world: Transform::IDENTITY,
        is_world: true,
        kinematic: false,
    };
    for body in &world.children {
        convert_body(ctx, &parent, body)?;
    }
    for geom in &world.geoms {
        convert_geom(ctx, &scope, &Transform::IDENTITY, geom)?;
    }
    for site in &world.sites {
        convert_site(ctx, &scope, &Transform::IDENTITY, site)?;
    }
    Ok(())
}

fn convert_body(ctx: &mut ConversionContext, parent: &Parent, body: &Body) -> Result<PrimPath> {
    let model = ctx.model;
    let source = body.name.as_deref();
    let name = ctx.names.get_name(parent.path, source.unwrap_or(""), "Body");
    let path = parent.path.child(&name);
    let local = local_transform(body.pos, body.orientation.as_ref(), &body.frames, &model.compiler);
    let world = parent.world.mul_rigid(&local);

    let prim = ctx.define(LayerToken::Geometry, &path, "Xform")?;
    set_local_transform(prim, &local);
    display_name(prim, source, &name);
    ctx.world.insert(path.clone(), world);
    ctx.register(RefKind::Bodies, source, &path);
    debug!("Body {}", path);

    for geom in &body.geoms {
        convert_geom(ctx, &path, &world, geom)?;
    }
    for site in &body.sites {
        convert_site(ctx, &path, &world, site)?;
    }

    let kinematic = parent.kinematic || body.mocap;
    let over = ctx.overlay(LayerToken::Physics, &path)?;
    over.apply_api("PhysicsRigidBodyAPI");
    if parent.is_world {
        over.apply_api("PhysicsArticulationRootAPI");
    }
    if kinematic {
        over.set_attribute("physics:kinematicEnabled", true);
    }
    if body.gravcomp != 0.0 {
        over.apply_api("MjcBodyAPI");
        over.set_attribute("mjc:body:gravcomp", body.gravcomp);
    }
    if let Some(inertial) = &body.inertial {
        author_inertial(over, inertial, &model.compiler);
    }

    convert_joints(ctx, &path, parent.body0, &local, body)?;

    let child_parent = Parent {
        path: &path,
        body0: &path,
        world,
        is_world: false,
        kinematic,
    };
    for child in &body.children {
        convert_body(ctx, &child_parent, child)?;
    }
    Ok(path)
}

/// Principal moments and axes of an inertial, in the body frame.
pub fn principal_inertia(inertial: &Inertial, frame: DQuat) -> Option<(DVec3, DQuat)> {
    if let Some(diag) = inertial.diaginertia {
        return Some((diag, frame));
    }
    let [ixx, iyy, izz, ixy, ixz, iyz] = inertial.fullinertia?;
    let m = DMat3::from_cols_array(&[ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz]);
    let (values, axes) = symmetric_eigen(m);
    Some((values, (frame * axes).normalize()))
}

fn author_inertial(prim: &mut Prim, inertial: &Inertial, compiler: &Compiler) {
    prim.apply_api("PhysicsMassAPI");
    author(prim, "physics:mass", inertial.mass as f32, 0.0);
    prim.set_attribute("physics:centerOfMass", Value::point3f(inertial.pos));
    let frame = resolve_orientation(inertial.orientation.as_ref(), compiler);
    if let Some((moments, axes)) = principal_inertia(inertial, frame) {
        prim.set_attribute("physics:diagonalInertia", Value::float3(moments));
        author_quat(prim, "physics:principalAxes", axes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;
    use crate::mjcf::{parse_str, Model};

    fn convert<'a>(model: &'a Model, options: &'a ConvertOptions) -> ConversionContext<'a> {
        let mut ctx = ConversionContext::new(model, options);
        ctx.add_content_layer(LayerToken::Geometry);
        ctx.add_content_layer(LayerToken::Physics);
        convert_bodies(&mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_tree_and_articulation_roots() {
        let model = parse_str(
            r#"<mujoco><worldbody>
                <geom name="floor" type="plane" size="1 1 0.1"/>
                <body name="base" pos="0 0 1">
                    <joint name="slide" type="slide"/>
                    <body name="arm" pos="0 0 0.5" euler="0 0 90">
                        <joint type="hinge"/>
                    </body>
                </body>
            </worldbody></mujoco>"#,
            "",
        )
        .unwrap();
        let options = ConvertOptions::default();
        let ctx = convert(&model, &options);
        let base = ctx.lookup(RefKind::Bodies, "base").unwrap();
        let arm = ctx.lookup(RefKind::Bodies, "arm").unwrap();
        assert_eq!(arm, base.child("arm"));
        assert!(ctx.lookup(RefKind::Geoms, "floor").is_some());

        let physics = ctx.layer(LayerToken::Physics).unwrap();
        assert!(physics.prim(&base).unwrap().has_api("PhysicsArticulationRootAPI"));
        assert!(!physics.prim(&arm).unwrap().has_api("PhysicsArticulationRootAPI"));
        assert!(physics.prim(&arm).unwrap().has_api("PhysicsRigidBodyAPI"));
        assert!(physics.prim(&arm.child("PhysicsRevoluteJoint")).is_some());

        let world = ctx.world_transform(&arm);
        assert!((world.translation - DVec3::new(0.0, 0.0, 1.5)).length() < 1e-12);

        let geometry = ctx.layer(LayerToken::Geometry).unwrap();
        assert!(!geometry.prim(&base).unwrap().has_api("PhysicsRigidBodyAPI"));
    }

    #[test]
    fn test_kinematic_propagates_down() {
        let model = parse_str(
            r#"<mujoco><worldbody>
                <body name="target" mocap="true">
                    <body name="child"><body name="grandchild"/></body>
                </body>
                <body name="free"><freejoint/></body>
            </worldbody></mujoco>"#,
            "",
        )
        .unwrap();
        let options = ConvertOptions::default();
        let ctx = convert(&model, &options);
        let physics = ctx.layer(LayerToken::Physics).unwrap();
        for name in ["target", "child", "grandchild"] {
            let path = ctx.lookup(RefKind::Bodies, name).unwrap();
            let prim = physics.prim(&path).unwrap();
            assert_eq!(prim.value("physics:kinematicEnabled"), Some(&Value::Bool(true)), "{name}");
        }
        let free = ctx.lookup(RefKind::Bodies, "free").unwrap();
        assert!(!physics.prim(&free).unwrap().has_property("physics:kinematicEnabled"));

        let grandchild = ctx.lookup(RefKind::Bodies, "grandchild").unwrap();
        let weld = physics.prim(&grandchild.child("PhysicsFixedJoint")).unwrap();
        let child = ctx.lookup(RefKind::Bodies, "child").unwrap();
        assert_eq!(weld.relationship("physics:body0").unwrap().targets, vec![child]);
    }

    #[test]
    fn test_full_inertia_diagonalized() {
        let inertial = Inertial {
            pos: DVec3::ZERO,
            orientation: None,
            mass: 2.0,
            diaginertia: None,
            fullinertia: Some([2.0, 2.0, 5.0, 1.0, 0.0, 0.0]),
        };
        let (moments, axes) = principal_inertia(&inertial, DQuat::IDENTITY).unwrap();
        let mut sorted = moments.to_array();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((sorted[0] - 1.0).abs() < 1e-9 && (sorted[2] - 5.0).abs() < 1e-9);
        let r = DMat3::from_quat(axes);
        let back = r * DMat3::from_diagonal(moments) * r.transpose();
        assert!((back.x_axis.y - 1.0).abs() < 1e-9);

        let mut prim = Prim::over("body");
        author_inertial(&mut prim, &inertial, &Compiler::default());
        assert_eq!(prim.value("physics:mass"), Some(&Value::Float(2.0)));
        assert!(prim.has_property("physics:diagonalInertia"));
    }
}
