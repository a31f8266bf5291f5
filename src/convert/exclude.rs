//! Contact excludes as filtered pairs on the first body.

use super::context::{ConversionContext, LayerToken};
use crate::util::Result;

pub fn convert_excludes(ctx: &mut ConversionContext) -> Result<()> {
    let model = ctx.model;
    for exclude in &model.excludes {
        let (Some(body1), Some(body2)) = (ctx.lookup_body(&exclude.body1), ctx.lookup_body(&exclude.body2)) else {
            ctx.warn_unresolved(format!(
                "body '{}' or '{}' for contact exclude",
                exclude.body1, exclude.body2
            ));
            continue;
        };
        let prim = ctx.overlay(LayerToken::Physics, &body1)?;
        prim.apply_api("PhysicsFilteredPairsAPI");
        prim.add_target("physics:filteredPairs", body2);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;
    use crate::convert::body::convert_bodies;
    use crate::convert::context::RefKind;
    use crate::mjcf::parse_str;

    #[test]
    fn test_filtered_pairs() {
        let model = parse_str(
            r#"<mujoco>
                <worldbody>
                    <body name="a"><body name="b"/></body>
                    <body name="c"/>
                </worldbody>
                <contact>
                    <exclude body1="a" body2="b"/>
                    <exclude body1="a" body2="c"/>
                    <exclude body1="a" body2="c"/>
                    <exclude body1="c" body2="world"/>
                    <exclude body1="a" body2="ghost"/>
                </contact>
            </mujoco>"#,
            "",
        )
        .unwrap();
        let options = ConvertOptions::default();
        let mut ctx = ConversionContext::new(&model, &options);
        ctx.add_content_layer(LayerToken::Geometry);
        ctx.add_content_layer(LayerToken::Physics);
        convert_bodies(&mut ctx).unwrap();
        convert_excludes(&mut ctx).unwrap();

        assert_eq!(ctx.warnings.len(), 1);
        let a = ctx.lookup(RefKind::Bodies, "a").unwrap();
        let b = ctx.lookup(RefKind::Bodies, "b").unwrap();
        let c = ctx.lookup(RefKind::Bodies, "c").unwrap();
        let physics = ctx.layer(LayerToken::Physics).unwrap();
        let prim = physics.prim(&a).unwrap();
        assert!(prim.has_api("PhysicsFilteredPairsAPI"));
        assert_eq!(prim.relationship("physics:filteredPairs").unwrap().targets, vec![b.clone(), c.clone()]);
        let world = physics.prim(&c).unwrap().relationship("physics:filteredPairs").unwrap();
        assert_eq!(world.targets, vec![ctx.root_path()]);
        assert!(!physics.prim(&b).unwrap().has_api("PhysicsFilteredPairsAPI"));
    }
}
