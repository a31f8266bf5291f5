//! Actuators as `MjcActuator` prims under the physics scope.
//!
//! Every shortcut arrives expanded to the general dyn/gain/bias form, so
//! one authoring path covers all of them. Unresolved targets leave the
//! relationship empty.

use tracing::debug;

use super::author::{author, author_array, author_range, author_tristate, display_name};
use super::context::{ConversionContext, LayerToken, RefKind};
use crate::mjcf::{
    Actuator, BiasType, DynType, GainType, Transmission, DEFAULT_BIASPRM, DEFAULT_DYNPRM, DEFAULT_GAINPRM,
    DEFAULT_GEAR,
};
use crate::usd::{Prim, PrimPath};
use crate::util::Result;

pub fn convert_actuators(ctx: &mut ConversionContext) -> Result<()> {
    let model = ctx.model;
    if model.actuators.is_empty() {
        return Ok(());
    }
    let scope = ctx.physics_scope()?;
    for (i, actuator) in model.actuators.iter().enumerate() {
        let fallback = format!("Actuator_{i}");
        let source = actuator.name.as_deref();
        let name = ctx.names.get_name(&scope, source.unwrap_or(&fallback), &fallback);
        let path = scope.child(&name);

        let target = resolve_target(ctx, actuator, &name);
        let refsite = resolve_site(ctx, actuator.refsite.as_deref(), "refsite", &name);
        let slidersite = match &actuator.transmission {
            Some(Transmission::SliderCrank { slidersite, .. }) => {
                resolve_site(ctx, slidersite.as_deref(), "slidersite", &name)
            }
            _ => None,
        };

        let prim = ctx.define(LayerToken::Physics, &path, "MjcActuator")?;
        display_name(prim, source, &name);
        prim.set_relationship("mjc:target", target.into_iter().collect());
        if let Some(refsite) = refsite {
            prim.set_relationship("mjc:refSite", refsite.into_iter().collect());
        }
        if let Some(slidersite) = slidersite {
            prim.set_relationship("mjc:sliderSite", slidersite.into_iter().collect());
        }
        author_actuator(prim, actuator);
        debug!("Actuator {} ({})", path, actuator.shortcut);
    }
    Ok(())
}

fn resolve_target(ctx: &mut ConversionContext, actuator: &Actuator, name: &str) -> Option<PrimPath> {
    let Some(transmission) = &actuator.transmission else {
        ctx.warn_unresolved(format!("actuator '{name}' has no transmission target"));
        return None;
    };
    let target = transmission.target_name();
    let path = match transmission {
        Transmission::Joint(_) | Transmission::JointInParent(_) => ctx.lookup(RefKind::Joints, target),
        Transmission::Tendon(_) => ctx.lookup(RefKind::Tendons, target),
        Transmission::Site(_) | Transmission::SliderCrank { .. } => ctx.lookup(RefKind::Sites, target),
        Transmission::Body(_) => ctx.lookup_body(target),
    };
    if path.is_none() {
        ctx.warn_unresolved(format!("target '{target}' for actuator '{name}'"));
    }
    path
}

/// `None` when the site is not named; `Some(None)` when it is named but
/// cannot be found.
fn resolve_site(
    ctx: &mut ConversionContext,
    site: Option<&str>,
    role: &str,
    name: &str,
) -> Option<Option<PrimPath>> {
    let site = site?;
    let path = ctx.lookup(RefKind::Sites, site);
    if path.is_none() {
        ctx.warn_unresolved(format!("{role} '{site}' for actuator '{name}'"));
    }
    Some(path)
}

fn author_actuator(prim: &mut Prim, actuator: &Actuator) {
    author_array(prim, "mjc:gear", &actuator.gear, &DEFAULT_GEAR);
    author(prim, "mjc:group", actuator.group, 0);
    author_tristate(prim, "mjc:ctrlLimited", actuator.ctrllimited);
    author_range(prim, "mjc:ctrlRange", actuator.ctrlrange, [0.0, 0.0]);
    author_tristate(prim, "mjc:forceLimited", actuator.forcelimited);
    author_range(prim, "mjc:forceRange", actuator.forcerange, [0.0, 0.0]);
    author_tristate(prim, "mjc:actLimited", actuator.actlimited);
    author_range(prim, "mjc:actRange", actuator.actrange, [0.0, 0.0]);
    author_range(prim, "mjc:lengthRange", actuator.lengthrange, [0.0, 0.0]);
    author(prim, "mjc:actDim", actuator.actdim, -1);
    author(prim, "mjc:actEarly", actuator.actearly, false);
    author(prim, "mjc:inheritRange", actuator.inheritrange, 0.0);
    author(prim, "mjc:crankLength", actuator.cranklength, 0.0);

    author(prim, "mjc:dynType", actuator.dyntype.token(), DynType::None.token());
    author(prim, "mjc:gainType", actuator.gaintype.token(), GainType::Fixed.token());
    author(prim, "mjc:biasType", actuator.biastype.token(), BiasType::None.token());
    author_array(prim, "mjc:dynPrm", &actuator.dynprm, &DEFAULT_DYNPRM);
    author_array(prim, "mjc:gainPrm", &actuator.gainprm, &DEFAULT_GAINPRM);
    author_array(prim, "mjc:biasPrm", &actuator.biasprm, &DEFAULT_BIASPRM);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;
    use crate::convert::body::convert_bodies;
    use crate::convert::tendon::convert_tendons;
    use crate::mjcf::{parse_str, Model};
    use crate::usd::Value;

    const MODEL: &str = r#"<worldbody>
        <body name="arm"><joint name="shoulder"/><site name="tip"/><site name="ref"/></body>
    </worldbody>
    <tendon><fixed name="t"><joint joint="shoulder"/></fixed></tendon>"#;

    fn convert(model: &Model, options: &ConvertOptions) -> (PrimPath, Vec<Prim>, usize) {
        let mut ctx = ConversionContext::new(model, options);
        ctx.add_content_layer(LayerToken::Geometry);
        ctx.add_content_layer(LayerToken::Physics);
        convert_bodies(&mut ctx).unwrap();
        convert_tendons(&mut ctx).unwrap();
        convert_actuators(&mut ctx).unwrap();
        let scope = ctx.physics_scope_path();
        let layer = ctx.layer(LayerToken::Physics).unwrap();
        let prims = layer.prim(&scope).unwrap().children.clone();
        (ctx.geometry_scope(), prims, ctx.warnings.len())
    }

    fn model(actuators: &str) -> Model {
        parse_str(&format!("<mujoco>{MODEL}<actuator>{actuators}</actuator></mujoco>"), "").unwrap()
    }

    fn find<'p>(prims: &'p [Prim], name: &str) -> &'p Prim {
        prims.iter().find(|p| p.name == name).unwrap()
    }

    #[test]
    fn test_motor_on_joint() {
        let model = model(r#"<motor name="m" joint="shoulder" gear="100" ctrlrange="-1 1" ctrllimited="true" group="1"/>"#);
        let options = ConvertOptions::default();
        let (geometry, prims, warnings) = convert(&model, &options);
        assert_eq!(warnings, 0);
        let motor = find(&prims, "m");
        assert_eq!(motor.type_name.as_deref(), Some("MjcActuator"));
        let target = &motor.relationship("mjc:target").unwrap().targets;
        assert_eq!(target, &vec![geometry.child("arm").child("shoulder")]);
        assert_eq!(motor.value("mjc:gear"), Some(&Value::DoubleArray(vec![100.0, 0.0, 0.0, 0.0, 0.0, 0.0])));
        assert_eq!(motor.value("mjc:ctrlLimited"), Some(&Value::token("true")));
        assert_eq!(motor.value("mjc:ctrlRange:min"), Some(&Value::Double(-1.0)));
        assert_eq!(motor.value("mjc:group"), Some(&Value::Int(1)));
        assert!(!motor.has_property("mjc:gainType"));
    }

    #[test]
    fn test_position_shortcut_and_tendon_target() {
        let model = model(r#"<position tendon="t" kp="5"/><general site="tip" refsite="ref" dyntype="integrator"/>"#);
        let options = ConvertOptions::default();
        let (geometry, prims, _) = convert(&model, &options);
        let position = find(&prims, "Actuator_0");
        assert_eq!(position.relationship("mjc:target").unwrap().targets[0].name(), "t");
        assert_eq!(position.value("mjc:biasType"), Some(&Value::token("affine")));
        assert_eq!(
            position.value("mjc:biasPrm"),
            Some(&Value::DoubleArray(vec![0.0, -5.0, -0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]))
        );

        let general = find(&prims, "Actuator_1");
        assert_eq!(general.value("mjc:dynType"), Some(&Value::token("integrator")));
        let refsite = &general.relationship("mjc:refSite").unwrap().targets;
        assert_eq!(refsite, &vec![geometry.child("arm").child("ref")]);
    }

    #[test]
    fn test_missing_targets_leave_empty_relationships() {
        let model = model(
            r#"<motor name="lost" joint="nope"/>
               <general name="crank" cranksite="tip" slidersite="gone" cranklength="0.1"/>"#,
        );
        let options = ConvertOptions::default();
        let (_, prims, warnings) = convert(&model, &options);
        assert_eq!(warnings, 2);
        assert!(find(&prims, "lost").relationship("mjc:target").unwrap().targets.is_empty());
        let crank = find(&prims, "crank");
        assert_eq!(crank.relationship("mjc:target").unwrap().targets[0].name(), "tip");
        assert!(crank.relationship("mjc:sliderSite").unwrap().targets.is_empty());
        assert_eq!(crank.value("mjc:crankLength"), Some(&Value::Double(0.1)));
    }
}
