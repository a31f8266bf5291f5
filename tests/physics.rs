//! Physics authoring checked on the composed stage.

use mjcf_usd::prelude::*;

fn stage(xml: &str) -> (Layer, Vec<Warning>) {
    let model = parse_str(xml, "").unwrap();
    let asset = Converter::default().convert_model(&model).unwrap();
    (asset.stage().unwrap(), asset.warnings)
}

fn prim<'l>(stage: &'l Layer, path: &str) -> &'l Prim {
    stage
        .prim(&PrimPath::new(path))
        .unwrap_or_else(|| panic!("no prim at {path}"))
}

fn targets(prim: &Prim, rel: &str) -> Vec<String> {
    prim.relationship(rel)
        .map(|r| r.targets.iter().map(|t| t.as_str().to_string()).collect())
        .unwrap_or_default()
}

#[test]
fn test_hinge_about_y_uses_local_rotations() {
    let (stage, _) = stage(
        r#"<mujoco model="m"><worldbody>
            <body name="a" pos="0 0 1">
                <joint name="j" axis="0 1 0" pos="0 0 0.25" range="-45 45"/>
                <geom type="sphere" size="0.1"/>
            </body>
        </worldbody></mujoco>"#,
    );
    let joint = prim(&stage, "/m/Geometry/a/j");
    assert_eq!(joint.type_name.as_deref(), Some("PhysicsRevoluteJoint"));
    assert!(!joint.has_property("physics:axis"));
    let rot1 = joint.value("physics:localRot1").and_then(Value::as_quat).unwrap();
    let rot0 = joint.value("physics:localRot0").and_then(Value::as_quat).unwrap();
    let x = mjcf_usd::util::DVec3::X;
    assert!((rot1 * x - mjcf_usd::util::DVec3::Y).length() < 1e-6);
    assert!((rot0 * x - mjcf_usd::util::DVec3::Y).length() < 1e-6);
    let pos0 = joint.value("physics:localPos0").and_then(Value::as_vec3).unwrap();
    assert!((pos0.z - 1.25).abs() < 1e-6);
    assert_eq!(joint.value("physics:lowerLimit"), Some(&Value::Float(-45.0)));
    assert_eq!(targets(joint, "physics:body0"), vec!["/m"]);
    assert_eq!(targets(joint, "physics:body1"), vec!["/m/Geometry/a"]);
}

#[test]
fn test_implicit_welds_between_jointless_bodies() {
    let (stage, _) = stage(
        r#"<mujoco model="m"><worldbody>
            <body name="base"><freejoint/>
                <body name="sensor" pos="0.1 0 0" euler="0 0 90"/>
            </body>
        </worldbody></mujoco>"#,
    );
    let weld = prim(&stage, "/m/Geometry/base/sensor/PhysicsFixedJoint");
    assert_eq!(targets(weld, "physics:body0"), vec!["/m/Geometry/base"]);
    assert_eq!(targets(weld, "physics:body1"), vec!["/m/Geometry/base/sensor"]);
    assert_eq!(weld.value("physics:localPos0"), Some(&Value::Point3f([0.1, 0.0, 0.0])));
    assert!(weld.has_property("physics:localRot0"));
    assert!(prim(&stage, "/m/Geometry/base").child("PhysicsFixedJoint").is_none());
}

#[test]
fn test_physics_materials_shared_by_friction() {
    let (stage, _) = stage(
        r#"<mujoco model="m"><worldbody>
            <geom name="a" type="sphere" size="0.1"/>
            <geom name="b" type="sphere" size="0.1" pos="1 0 0"/>
            <geom name="c" type="sphere" size="0.1" pos="2 0 0" friction="0.5"/>
            <geom name="ghost" type="sphere" size="0.1" contype="0" conaffinity="0"/>
        </worldbody></mujoco>"#,
    );
    let a = targets(prim(&stage, "/m/Geometry/a"), "material:binding:physics");
    let b = targets(prim(&stage, "/m/Geometry/b"), "material:binding:physics");
    let c = targets(prim(&stage, "/m/Geometry/c"), "material:binding:physics");
    assert_eq!(a, vec!["/m/Physics/PhysicsMaterial"]);
    assert_eq!(a, b);
    assert_eq!(c, vec!["/m/Physics/PhysicsMaterial_1"]);
    let ghost = prim(&stage, "/m/Geometry/ghost");
    assert!(!ghost.has_api("PhysicsCollisionAPI"));

    let material = prim(&stage, "/m/Physics/PhysicsMaterial_1");
    let friction = material.value("physics:dynamicFriction").and_then(Value::as_f64).unwrap();
    assert!((friction - 0.5).abs() < 1e-6);
}

#[test]
fn test_equalities_tendons_and_excludes() {
    let (stage, warnings) = stage(
        r#"<mujoco model="m">
            <worldbody>
                <body name="a"><joint name="ja"/><site name="sa"/>
                    <geom type="sphere" size="0.1"/></body>
                <body name="b" pos="1 0 0"><joint name="jb"/><site name="sb"/>
                    <geom type="sphere" size="0.1"/></body>
            </worldbody>
            <tendon>
                <spatial name="rope"><site site="sa"/><site site="sb"/></spatial>
            </tendon>
            <equality>
                <weld name="glue" body1="a" body2="b"/>
                <connect body1="b" anchor="0 0 1"/>
                <joint joint1="ja" joint2="jb"/>
                <tendon tendon1="rope"/>
            </equality>
            <contact><exclude body1="a" body2="b"/></contact>
            <actuator><general tendon="rope"/></actuator>
        </mujoco>"#,
    );
    assert_eq!(warnings.len(), 1);
    assert!(matches!(&warnings[0], Warning::UnsupportedFeature(_)));

    let glue = prim(&stage, "/m/Physics/glue");
    assert_eq!(glue.type_name.as_deref(), Some("PhysicsFixedJoint"));
    assert_eq!(glue.value("physics:excludeFromArticulation"), Some(&Value::Bool(true)));
    assert_eq!(glue.value("physics:localPos0"), Some(&Value::Point3f([1.0, 0.0, 0.0])));

    let connect = prim(&stage, "/m/Physics/Equality");
    assert_eq!(connect.type_name.as_deref(), Some("PhysicsSphericalJoint"));
    assert_eq!(targets(connect, "physics:body1"), vec!["/m"]);
    assert_eq!(connect.value("physics:localPos1"), Some(&Value::Point3f([1.0, 0.0, 1.0])));

    let ja = prim(&stage, "/m/Geometry/a/ja");
    assert!(ja.has_api("MjcEqualityJointAPI"));
    assert_eq!(targets(ja, "mjc:target"), vec!["/m/Geometry/b/jb"]);

    let rope = prim(&stage, "/m/Physics/rope");
    assert_eq!(targets(rope, "mjc:path"), vec!["/m/Geometry/a/sa", "/m/Geometry/b/sb"]);
    let actuator = prim(&stage, "/m/Physics/Actuator_0");
    assert_eq!(targets(actuator, "mjc:target"), vec!["/m/Physics/rope"]);

    let a = prim(&stage, "/m/Geometry/a");
    assert_eq!(targets(a, "physics:filteredPairs"), vec!["/m/Geometry/b"]);
}
