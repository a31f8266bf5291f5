//! Tendons as `MjcTendon` prims under the physics scope.

use tracing::debug;

use super::author::{author, author_array, author_range, author_tristate, display_name, rgba_f32};
use super::context::{ConversionContext, LayerToken, RefKind};
use crate::mjcf::{Tendon, TendonKind, TendonWrap, DEFAULT_RGBA, DEFAULT_SOLIMP, DEFAULT_SOLREF};
use crate::usd::{Prim, PrimPath, Value};
use crate::util::Result;

pub fn convert_tendons(ctx: &mut ConversionContext) -> Result<()> {
    let model = ctx.model;
    if model.tendons.is_empty() {
        return Ok(());
    }
    let scope = ctx.physics_scope()?;
    for (i, tendon) in model.tendons.iter().enumerate() {
        let fallback = format!("Tendon_{i}");
        let source = tendon.name.as_deref();
        let name = ctx.names.get_name(&scope, source.unwrap_or(&fallback), &fallback);
        let path = scope.child(&name);
        let wrap = resolve_path(ctx, tendon, &name);

        let prim = ctx.define(LayerToken::Physics, &path, "MjcTendon")?;
        display_name(prim, source, &name);
        author_tendon(prim, tendon);
        if let Some(wrap) = wrap {
            wrap.author(prim, tendon.kind);
        }
        ctx.register(RefKind::Tendons, source, &path);
        debug!("Tendon {}", path);
    }
    Ok(())
}

fn author_tendon(prim: &mut Prim, tendon: &Tendon) {
    let kind = match tendon.kind {
        TendonKind::Fixed => "fixed",
        TendonKind::Spatial => "spatial",
    };
    prim.set_uniform("mjc:type", Value::token(kind));
    author(prim, "mjc:stiffness", tendon.stiffness, 0.0);
    author_array(prim, "mjc:springlength", &tendon.springlength, &[-1.0, -1.0]);
    author(prim, "mjc:damping", tendon.damping, 0.0);
    author(prim, "mjc:frictionloss", tendon.frictionloss, 0.0);
    author_array(prim, "mjc:solreffriction", &tendon.solreffriction, &DEFAULT_SOLREF);
    author_array(prim, "mjc:solimpfriction", &tendon.solimpfriction, &DEFAULT_SOLIMP);
    author(prim, "mjc:armature", tendon.armature, 0.0);
    author_tristate(prim, "mjc:limited", tendon.limited);
    author_tristate(prim, "mjc:actuatorfrclimited", tendon.actuatorfrclimited);
    author_range(prim, "mjc:range", tendon.range, [0.0, 0.0]);
    author_range(prim, "mjc:actuatorfrcrange", tendon.actuatorfrcrange, [0.0, 0.0]);
    author(prim, "mjc:margin", tendon.margin, 0.0);
    author_array(prim, "mjc:solreflimit", &tendon.solreflimit, &DEFAULT_SOLREF);
    author_array(prim, "mjc:solimplimit", &tendon.solimplimit, &DEFAULT_SOLIMP);
    author(prim, "mjc:rgba", rgba_f32(tendon.rgba), rgba_f32(DEFAULT_RGBA));
    author(prim, "mjc:width", tendon.width, 0.003);
    author(prim, "mjc:group", tendon.group, 0);
}

/// Resolved tendon path. Targets are deduplicated; `indices` maps each
/// path element to its target.
#[derive(Debug, Default, PartialEq)]
struct WrapPath {
    targets: Vec<PrimPath>,
    indices: Vec<i32>,
    coefs: Vec<f64>,
    segments: Vec<i32>,
    divisors: Vec<f64>,
    side_sites: Vec<PrimPath>,
    side_indices: Vec<i32>,
}

fn index_of(list: &mut Vec<PrimPath>, path: PrimPath) -> i32 {
    let i = match list.iter().position(|p| *p == path) {
        Some(i) => i,
        None => {
            list.push(path);
            list.len() - 1
        }
    };
    i as i32
}

/// Walk the wrap list. Any unresolved target drops the whole path.
fn resolve_path(ctx: &mut ConversionContext, tendon: &Tendon, name: &str) -> Option<WrapPath> {
    let mut wrap = WrapPath {
        divisors: vec![1.0],
        ..Default::default()
    };
    let mut segment = 0;
    for (i, element) in tendon.path.iter().enumerate() {
        let (kind, target, sidesite) = match element {
            TendonWrap::Pulley { divisor } => {
                if i == 0 {
                    wrap.divisors[0] = *divisor;
                } else {
                    segment += 1;
                    wrap.divisors.push(*divisor);
                }
                continue;
            }
            TendonWrap::Joint { joint, coef } => {
                wrap.coefs.push(*coef);
                (RefKind::Joints, joint, None)
            }
            TendonWrap::Site { site } => (RefKind::Sites, site, None),
            TendonWrap::Geom { geom, sidesite } => (RefKind::Geoms, geom, sidesite.as_ref()),
        };
        let Some(path) = ctx.lookup(kind, target) else {
            ctx.warn_unresolved(format!("target '{target}' for tendon '{name}'"));
            return None;
        };
        wrap.segments.push(segment);
        let index = index_of(&mut wrap.targets, path);
        wrap.indices.push(index);
        match sidesite {
            Some(site) => {
                let Some(path) = ctx.lookup(RefKind::Sites, site) else {
                    ctx.warn_unresolved(format!("sidesite '{site}' for tendon '{name}'"));
                    return None;
                };
                let index = index_of(&mut wrap.side_sites, path);
                wrap.side_indices.push(index);
            }
            None => wrap.side_indices.push(-1),
        }
    }
    Some(wrap)
}

impl WrapPath {
    fn author(self, prim: &mut Prim, kind: TendonKind) {
        if self.targets.is_empty() {
            return;
        }
        prim.set_relationship("mjc:path", self.targets);
        prim.set_attribute("mjc:path:indices", self.indices);
        match kind {
            TendonKind::Fixed => {
                prim.set_attribute("mjc:path:coef", self.coefs);
            }
            TendonKind::Spatial => {
                prim.set_attribute("mjc:path:segments", self.segments);
                author_array(prim, "mjc:path:divisors", &self.divisors, &[1.0]);
                if !self.side_sites.is_empty() {
                    prim.set_relationship("mjc:sideSites", self.side_sites);
                    prim.set_attribute("mjc:sideSites:indices", self.side_indices);
                }
            }
        }
    }
}
