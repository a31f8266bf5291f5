//! Physics scene: gravity, solver settings, simulation options and
//! compiler settings, each suppressed at its default.

use super::author::{author, author_array, author_tristate};
use super::context::{ConversionContext, LayerToken, SCENE_NAME};
use crate::mjcf::{AngleUnit, Compiler, SimOption, DEFAULT_SOLIMP, DEFAULT_SOLREF};
use crate::usd::{Prim, PrimPath, Value};
use crate::util::Result;

/// Flags that are off unless enabled.
const ENABLE_FLAGS: [&str; 5] = ["energy", "fwdinv", "invdiscrete", "multiccd", "override"];

pub fn convert_scene(ctx: &mut ConversionContext) -> Result<Option<PrimPath>> {
    if !ctx.options.scene {
        return Ok(None);
    }
    let model = ctx.model;
    let path = ctx.root_path().child(SCENE_NAME);
    let prim = ctx.define(LayerToken::Physics, &path, "PhysicsScene")?;
    author_gravity(prim, &model.option);

    prim.apply_api("NewtonSceneAPI");
    author(prim, "newton:maxSolverIterations", model.option.iterations, -1);
    author(prim, "newton:timeStepsPerSecond", steps_per_second(model.option.timestep), 1000);
    author(prim, "newton:gravityEnabled", gravity_enabled(&model.option), true);

    prim.apply_api("MjcSceneAPI");
    author_options(prim, &model.option);
    author_flags(prim, &model.option);
    author_compiler(prim, &model.compiler);
    Ok(Some(path))
}

fn steps_per_second(timestep: f64) -> i32 {
    if timestep > 0.0 {
        (1.0 / timestep).round() as i32
    } else {
        1000
    }
}

fn gravity_enabled(option: &SimOption) -> bool {
    option.flags.get("gravity").copied().unwrap_or(true) && option.gravity.length() > 0.0
}

fn author_gravity(prim: &mut Prim, option: &SimOption) {
    let magnitude = option.gravity.length();
    if magnitude > 0.0 {
        prim.set_attribute("physics:gravityDirection", Value::vector3f(option.gravity / magnitude));
        prim.set_attribute("physics:gravityMagnitude", magnitude as f32);
    }
}

fn author_options(prim: &mut Prim, option: &SimOption) {
    let d = SimOption::default();
    author(prim, "mjc:option:timestep", option.timestep, d.timestep);
    author(prim, "mjc:option:wind", option.wind.to_array(), d.wind.to_array());
    author(prim, "mjc:option:magnetic", option.magnetic.to_array(), d.magnetic.to_array());
    author(prim, "mjc:option:density", option.density, d.density);
    author(prim, "mjc:option:viscosity", option.viscosity, d.viscosity);
    author(prim, "mjc:option:impratio", option.impratio, d.impratio);
    author(prim, "mjc:option:o_margin", option.o_margin, d.o_margin);
    author_array(prim, "mjc:option:o_solref", &option.o_solref, &DEFAULT_SOLREF);
    author_array(prim, "mjc:option:o_solimp", &option.o_solimp, &DEFAULT_SOLIMP);
    author_array(prim, "mjc:option:o_friction", &option.o_friction, &d.o_friction);
    author(prim, "mjc:option:integrator", option.integrator.as_str(), d.integrator.as_str());
    author(prim, "mjc:option:cone", option.cone.as_str(), d.cone.as_str());
    author(prim, "mjc:option:jacobian", option.jacobian.as_str(), d.jacobian.as_str());
    author(prim, "mjc:option:solver", option.solver.as_str(), d.solver.as_str());
    author(prim, "mjc:option:iterations", option.iterations, d.iterations);
    author(prim, "mjc:option:tolerance", option.tolerance, d.tolerance);
    author(prim, "mjc:option:ls_iterations", option.ls_iterations, d.ls_iterations);
    author(prim, "mjc:option:ls_tolerance", option.ls_tolerance, d.ls_tolerance);
    author(prim, "mjc:option:noslip_iterations", option.noslip_iterations, d.noslip_iterations);
    author(prim, "mjc:option:noslip_tolerance", option.noslip_tolerance, d.noslip_tolerance);
    author(prim, "mjc:option:ccd_iterations", option.ccd_iterations, d.ccd_iterations);
    author(prim, "mjc:option:ccd_tolerance", option.ccd_tolerance, d.ccd_tolerance);
    author(prim, "mjc:option:sdf_iterations", option.sdf_iterations, d.sdf_iterations);
    author(prim, "mjc:option:sdf_initpoints", option.sdf_initpoints, d.sdf_initpoints);
    author(
        prim,
        "mjc:option:actuatorgroupdisable",
        option.actuatorgroupdisable.clone(),
        Vec::new(),
    );
}

fn author_flags(prim: &mut Prim, option: &SimOption) {
    for (flag, enabled) in &option.flags {
        let default = !ENABLE_FLAGS.contains(&flag.as_str());
        author(prim, &format!("mjc:flag:{flag}"), *enabled, default);
    }
}

fn author_compiler(prim: &mut Prim, compiler: &Compiler) {
    let d = Compiler::default();
    let angle = match compiler.angle {
        AngleUnit::Degree => "degree",
        AngleUnit::Radian => "radian",
    };
    author(prim, "mjc:compiler:alignFree", compiler.align_free, d.align_free);
    author(prim, "mjc:compiler:angle", angle, "degree");
    author(prim, "mjc:compiler:autoLimits", compiler.autolimits, d.autolimits);
    author(prim, "mjc:compiler:balanceInertia", compiler.balance_inertia, d.balance_inertia);
    author(prim, "mjc:compiler:boundInertia", compiler.bound_inertia, d.bound_inertia);
    author(prim, "mjc:compiler:boundMass", compiler.bound_mass, d.bound_mass);
    author(prim, "mjc:compiler:fitAABB", compiler.fit_aabb, d.fit_aabb);
    author(prim, "mjc:compiler:fuseStatic", compiler.fuse_static, d.fuse_static);
    author_tristate(prim, "mjc:compiler:inertiaFromGeom", compiler.inertia_from_geom);
    author(prim, "mjc:compiler:inertiaGroupRange:min", compiler.inertia_group_range[0], 0);
    author(prim, "mjc:compiler:inertiaGroupRange:max", compiler.inertia_group_range[1], 5);
    author(prim, "mjc:compiler:saveInertial", compiler.save_inertial, d.save_inertial);
    author(prim, "mjc:compiler:setTotalMass", compiler.set_total_mass, d.set_total_mass);
    author(prim, "mjc:compiler:useThread", compiler.use_thread, d.use_thread);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;
    use crate::mjcf::{parse_str, Model};

    fn scene(model: &Model, options: &ConvertOptions) -> Option<Prim> {
        let mut ctx = ConversionContext::new(model, options);
        ctx.add_content_layer(LayerToken::Physics);
        let path = convert_scene(&mut ctx).unwrap()?;
        ctx.layer(LayerToken::Physics).unwrap().prim(&path).cloned()
    }

    #[test]
    fn test_default_scene() {
        let model = Model::default();
        let prim = scene(&model, &ConvertOptions::default()).unwrap();
        assert_eq!(prim.type_name.as_deref(), Some("PhysicsScene"));
        assert_eq!(prim.value("physics:gravityDirection"), Some(&Value::Vector3f([0.0, 0.0, -1.0])));
        let magnitude = prim.value("physics:gravityMagnitude").and_then(Value::as_f64).unwrap();
        assert!((magnitude - 9.81).abs() < 1e-5);
        assert_eq!(prim.value("newton:timeStepsPerSecond"), Some(&Value::Int(500)));
        assert_eq!(prim.value("newton:maxSolverIterations"), Some(&Value::Int(100)));
        assert!(!prim.has_property("newton:gravityEnabled"));
        assert!(prim.has_api("MjcSceneAPI"));
        assert!(!prim.property_names().any(|n| n.starts_with("mjc:")));
    }

    #[test]
    fn test_options_flags_and_compiler() {
        let model = parse_str(
            r#"<mujoco>
                <compiler angle="radian" autolimits="false"/>
                <option timestep="0.01" integrator="RK4" gravity="0 0 0">
                    <flag gravity="disable" energy="enable" contact="enable"/>
                </option>
            </mujoco>"#,
            "",
        )
        .unwrap();
        let prim = scene(&model, &ConvertOptions::default()).unwrap();
        assert!(!prim.has_property("physics:gravityDirection"));
        assert_eq!(prim.value("newton:gravityEnabled"), Some(&Value::Bool(false)));
        assert_eq!(prim.value("newton:timeStepsPerSecond"), Some(&Value::Int(100)));
        assert_eq!(prim.value("mjc:option:timestep"), Some(&Value::Double(0.01)));
        assert_eq!(prim.value("mjc:option:integrator"), Some(&Value::token("RK4")));
        assert_eq!(prim.value("mjc:flag:gravity"), Some(&Value::Bool(false)));
        assert_eq!(prim.value("mjc:flag:energy"), Some(&Value::Bool(true)));
        assert!(!prim.has_property("mjc:flag:contact"));
        assert_eq!(prim.value("mjc:compiler:angle"), Some(&Value::token("radian")));
        assert_eq!(prim.value("mjc:compiler:autoLimits"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_scene_disabled() {
        let model = Model::default();
        let options = ConvertOptions {
            scene: false,
            ..Default::default()
        };
        assert!(scene(&model, &options).is_none());
    }
}
