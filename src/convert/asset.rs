//! The converted asset: its layers, the interface layer and writing to disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::context::{ConversionContext, Extents, LayerToken, TextureCopy, Warning};
use crate::usd::{self, Layer, Reference, Value};
use crate::util::{BBox3d, Error, Result};

/// Filler for `extentsHint` purpose slots without geometry.
const EMPTY_EXTENT: [[f32; 3]; 2] = [[f32::MAX; 3], [-f32::MAX; 3]];

/// Result of one conversion, ready to write or inspect.
#[derive(Debug)]
pub struct Asset {
    /// Identifier of the interface layer, e.g. `robot.usda`.
    pub interface: String,
    /// Every layer by root-relative identifier, interface included.
    pub layers: BTreeMap<String, Layer>,
    /// Write the layers as authored rather than one flattened file.
    pub layer_structure: bool,
    pub textures: Vec<TextureCopy>,
    pub warnings: Vec<Warning>,
}

impl Asset {
    pub fn layer(&self, identifier: &str) -> Option<&Layer> {
        self.layers.get(identifier)
    }

    /// The composed stage as one layer.
    pub fn stage(&self) -> Result<Layer> {
        usd::flatten(&self.interface, &self.layers)
    }

    /// Write into `dir` and return the interface file path.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        if dir.exists() && !dir.is_dir() {
            return Err(Error::UserInput(format!(
                "output location {} exists and is not a directory",
                dir.display()
            )));
        }
        std::fs::create_dir_all(dir)?;

        let path = if self.layer_structure {
            for layer in self.layers.values() {
                usd::save_layer(layer, dir)?;
            }
            dir.join(&self.interface)
        } else {
            usd::save_layer(&self.stage()?, dir)?
        };

        for texture in &self.textures {
            if !texture.source.is_file() {
                return Err(Error::InputNotFound(texture.source.clone()));
            }
            let target = dir.join(&texture.target);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&texture.source, &target)?;
            debug!("Copied texture {} -> {}", texture.source.display(), target.display());
        }
        info!("Wrote {}", path.display());
        Ok(path)
    }
}

/// `Payload/Contents.usda`: the payload root stacking the content layers.
pub fn build_contents(ctx: &ConversionContext) -> Result<Layer> {
    let identifier = LayerToken::Contents.identifier(&ctx.asset_name);
    let mut layer = ctx.new_layer(identifier.clone());
    layer.default_prim = Some(ctx.asset_name.clone());
    for token in [LayerToken::Physics, LayerToken::Materials, LayerToken::Geometry] {
        if ctx.has_layer(token) {
            let sublayer = usd::relative_asset_path(&identifier, &token.identifier(&ctx.asset_name));
            layer.sublayers.push(sublayer);
        }
    }
    layer.define_prim(&ctx.root_path(), "Xform")?;
    Ok(layer)
}

/// The interface layer: a component whose payload is the contents layer.
pub fn build_interface(ctx: &ConversionContext) -> Result<Layer> {
    let identifier = LayerToken::Asset.identifier(&ctx.asset_name);
    let mut layer = ctx.new_layer(identifier.clone());
    layer.default_prim = Some(ctx.asset_name.clone());
    let contents = usd::relative_asset_path(&identifier, &LayerToken::Contents.identifier(&ctx.asset_name));

    let prim = layer.define_prim(&ctx.root_path(), "Xform")?;
    prim.set_kind("component");
    prim.asset_info.set("name", Value::string(ctx.asset_name.clone()));
    if !ctx.model.name.is_empty() && ctx.model.name != ctx.asset_name {
        prim.set_display_name(&ctx.model.name);
    }
    if let Some(hint) = extents_hint(&ctx.extents) {
        prim.apply_api("GeomModelAPI");
        prim.set_attribute("extentsHint", Value::Float3Array(hint));
    }
    prim.add_payload(Reference::new(contents, None));
    Ok(layer)
}

/// Purpose-ordered bounds: default, render, proxy, guide. Only the default
/// slot is written unless guide geometry exists.
pub fn extents_hint(extents: &Extents) -> Option<Vec<[f32; 3]>> {
    let slot = |b: &BBox3d| if b.is_empty() { EMPTY_EXTENT } else { b.as_f32() };
    let slots = if !extents.guide.is_empty() {
        vec![slot(&extents.default), EMPTY_EXTENT, EMPTY_EXTENT, slot(&extents.guide)]
    } else if !extents.default.is_empty() {
        vec![slot(&extents.default)]
    } else {
        return None;
    };
    Some(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::DVec3;

    #[test]
    fn test_extents_hint_slots() {
        let mut extents = Extents::default();
        assert!(extents_hint(&extents).is_none());
        extents.default = BBox3d::symmetric(DVec3::ONE);
        assert_eq!(extents_hint(&extents).unwrap(), vec![[-1.0; 3], [1.0; 3]]);
        extents.guide = BBox3d::symmetric(DVec3::splat(2.0));
        let hint = extents_hint(&extents).unwrap();
        assert_eq!(hint.len(), 8);
        assert_eq!(hint[2], [f32::MAX; 3]);
        assert_eq!(hint[7], [2.0; 3]);
    }

    #[test]
    fn test_write_rejects_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, "x").unwrap();
        let asset = Asset {
            interface: "a.usda".into(),
            layers: BTreeMap::new(),
            layer_structure: true,
            textures: Vec::new(),
            warnings: Vec::new(),
        };
        let err = asset.write(&file).unwrap_err();
        assert!(matches!(err, Error::UserInput(_)));
        assert!(err.is_user_input());
    }
}
