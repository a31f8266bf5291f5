//! MJCF to layered USD conversion.
//!
//! [`Converter`] drives the passes in dependency order:
//!
//! 1. content layers and the default prim
//! 2. mesh and material libraries
//! 3. the kinematic tree (bodies, geoms, sites, joints)
//! 4. tendons, equalities, actuators, contact excludes
//! 5. the physics scene
//! 6. the contents payload and the interface layer
//!
//! Later passes resolve source names through the context's reference
//! tables, so the order is fixed.

mod author;
mod coords;
mod names;

pub mod actuator;
pub mod asset;
pub mod body;
pub mod context;
pub mod equality;
pub mod exclude;
pub mod geometry;
pub mod joint;
pub mod material;
pub mod scene;
pub mod tendon;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, info_span};

pub use asset::Asset;
pub use context::{ConversionContext, LayerToken, RefKind, TextureCopy, Warning};
pub use coords::{align_vector_to_axis, vector_to_quaternion};
pub use names::NameCache;

use crate::config::ConvertOptions;
use crate::mjcf::{self, Model};
use crate::util::{Error, Result};

/// Converts MJCF models with one set of options.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Read `input`, convert it and write the asset into `output_dir`.
    /// Returns the path of the interface file.
    pub fn convert(&self, input: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();
        if !input.is_file() {
            return Err(Error::InputNotFound(input.to_path_buf()));
        }
        if output_dir.exists() && !output_dir.is_dir() {
            return Err(Error::UserInput(format!(
                "output location {} exists and is not a directory",
                output_dir.display()
            )));
        }
        let model = mjcf::load(input)?;
        let asset = self.convert_model(&model)?;
        asset.write(output_dir)
    }

    /// Convert a parsed model into an in-memory asset.
    pub fn convert_model(&self, model: &Model) -> Result<Asset> {
        let _span = info_span!("convert", model = %model.name).entered();
        let mut ctx = ConversionContext::new(model, &self.options);

        let root = ctx.root_path();
        ctx.add_content_layer(LayerToken::Geometry);
        ctx.define(LayerToken::Geometry, &root, "Xform")?;
        if !model.materials.is_empty() {
            ctx.add_content_layer(LayerToken::Materials);
        }
        ctx.add_content_layer(LayerToken::Physics);

        geometry::build_mesh_library(&mut ctx)?;
        material::build_material_library(&mut ctx)?;
        body::convert_bodies(&mut ctx)?;
        tendon::convert_tendons(&mut ctx)?;
        equality::convert_equalities(&mut ctx)?;
        actuator::convert_actuators(&mut ctx)?;
        exclude::convert_excludes(&mut ctx)?;
        scene::convert_scene(&mut ctx)?;

        let contents = asset::build_contents(&ctx)?;
        let interface = asset::build_interface(&ctx)?;
        let interface_id = interface.identifier.clone();

        let mut layers = BTreeMap::new();
        for layer in [interface, contents]
            .into_iter()
            .chain(std::mem::take(&mut ctx.content).into_values())
            .chain(std::mem::take(&mut ctx.libraries).into_values())
        {
            layers.insert(layer.identifier.clone(), layer);
        }

        if !ctx.warnings.is_empty() {
            info!("{} conversion warning(s)", ctx.warnings.len());
        }
        Ok(Asset {
            interface: interface_id,
            layers,
            layer_structure: self.options.layer_structure,
            textures: ctx.textures,
            warnings: ctx.warnings,
        })
    }
}

/// Convert `input` into `output_dir` with `options`.
pub fn convert(input: impl AsRef<Path>, output_dir: impl AsRef<Path>, options: ConvertOptions) -> Result<PathBuf> {
    Converter::new(options).convert(input, output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mjcf::parse_str;
    use crate::usd::{PrimPath, Value};

    const PENDULUM: &str = r#"<mujoco model="pendulum">
        <worldbody>
            <geom name="floor" type="plane" size="1 1 0.1"/>
            <body name="pole" pos="0 0 1">
                <joint name="hinge" axis="0 1 0"/>
                <geom type="capsule" fromto="0 0 0 0 0 -0.5" size="0.02"/>
            </body>
        </worldbody>
        <actuator><motor joint="hinge"/></actuator>
    </mujoco>"#;

    #[test]
    fn test_layer_set_and_sublayer_order() {
        let model = parse_str(PENDULUM, "").unwrap();
        let asset = Converter::default().convert_model(&model).unwrap();
        let ids: Vec<&str> = asset.layers.keys().map(String::as_str).collect();
        assert_eq!(
            ids,
            vec!["Payload/Contents.usda", "Payload/Geometry.usda", "Payload/Physics.usda", "pendulum.usda"]
        );
        let contents = asset.layer("Payload/Contents.usda").unwrap();
        assert_eq!(contents.sublayers, vec!["./Physics.usda", "./Geometry.usda"]);
        assert_eq!(asset.interface, "pendulum.usda");
        assert!(asset.warnings.is_empty());
    }

    #[test]
    fn test_interface_prim() {
        let model = parse_str(PENDULUM, "").unwrap();
        let asset = Converter::default().convert_model(&model).unwrap();
        let interface = asset.layer(&asset.interface).unwrap();
        let prim = interface.root_prim("pendulum").unwrap();
        assert_eq!(prim.kind(), Some("component"));
        assert!(prim.display_name().is_none());
        assert_eq!(prim.payloads[0].asset, "./Payload/Contents.usda");
        assert!(prim.has_api("GeomModelAPI"));
        let hint = prim.value("extentsHint").unwrap();
        assert!(matches!(hint, Value::Float3Array(v) if v.len() == 2));
    }

    #[test]
    fn test_flattened_stage_composes_physics_over_geometry() {
        let model = parse_str(PENDULUM, "").unwrap();
        let asset = Converter::default().convert_model(&model).unwrap();
        let stage = asset.stage().unwrap();
        let pole = stage.prim(&PrimPath::new("/pendulum/Geometry/pole")).unwrap();
        assert_eq!(pole.type_name.as_deref(), Some("Xform"));
        assert!(pole.has_api("PhysicsRigidBodyAPI"));
        assert!(stage.prim(&PrimPath::new("/pendulum/PhysicsScene")).is_some());
    }
}
