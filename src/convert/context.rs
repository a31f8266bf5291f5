//! Per-conversion state.
//!
//! One [`ConversionContext`] owns every layer, lookup table and the name
//! cache for a single conversion. Nothing in it outlives the call.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use tracing::warn;

use super::names::NameCache;
use crate::config::ConvertOptions;
use crate::mjcf::Model;
use crate::usd::{Layer, MetaData, Prim, PrimPath};
use crate::util::{BBox3d, Error, Result, Transform};

pub const PAYLOAD_DIR: &str = "Payload";
pub const GEOMETRY_SCOPE: &str = "Geometry";
pub const MATERIALS_SCOPE: &str = "Materials";
pub const PHYSICS_SCOPE: &str = "Physics";
pub const SCENE_NAME: &str = "PhysicsScene";
pub const GEOMETRY_LIBRARY: &str = "Payload/GeometryLibrary.usda";
pub const MATERIALS_LIBRARY: &str = "Payload/MaterialsLibrary.usda";

/// Logical layers of the layered asset.
///
/// Shared libraries have no token of their own: they are keyed by the content
/// layer they back (see [`LayerToken::library_identifier`]). The payload is the
/// [`LayerToken::Contents`] layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerToken {
    Asset,
    Contents,
    Geometry,
    Materials,
    Physics,
}

impl LayerToken {
    /// Root-relative identifier of the content layer.
    pub fn identifier(self, asset_name: &str) -> String {
        match self {
            LayerToken::Asset => format!("{asset_name}.usda"),
            LayerToken::Contents => format!("{PAYLOAD_DIR}/Contents.usda"),
            LayerToken::Geometry => format!("{PAYLOAD_DIR}/Geometry.usda"),
            LayerToken::Materials => format!("{PAYLOAD_DIR}/Materials.usda"),
            LayerToken::Physics => format!("{PAYLOAD_DIR}/Physics.usda"),
        }
    }

    /// Identifier of the shared library backing this layer, if any.
    pub fn library_identifier(self) -> Option<&'static str> {
        match self {
            LayerToken::Geometry => Some(GEOMETRY_LIBRARY),
            LayerToken::Materials => Some(MATERIALS_LIBRARY),
            _ => None,
        }
    }
}

/// Kinds of source names later passes resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefKind {
    Materials,
    Bodies,
    Joints,
    Geoms,
    Sites,
    Tendons,
}

/// Recoverable problems; conversion continues without the offending node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    UnsupportedFeature(String),
    UnresolvedReference(String),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnsupportedFeature(msg) => write!(f, "Unsupported feature: {msg}"),
            Warning::UnresolvedReference(msg) => write!(f, "Unresolved reference: {msg}"),
        }
    }
}

/// A texture file to copy next to the written asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureCopy {
    pub source: PathBuf,
    /// Root-relative destination identifier.
    pub target: String,
}

/// Mesh library entry.
#[derive(Clone, Debug)]
pub struct MeshEntry {
    pub path: PrimPath,
    /// Asset frame authored on the library prim.
    pub frame: Transform,
    /// Bounds of the raw vertices.
    pub bounds: BBox3d,
}

/// World bounds of authored gprims per purpose.
#[derive(Clone, Debug, Default)]
pub struct Extents {
    pub default: BBox3d,
    pub guide: BBox3d,
}

pub struct ConversionContext<'a> {
    pub model: &'a Model,
    pub options: &'a ConvertOptions,
    /// Sanitized name of the asset's default prim.
    pub asset_name: String,
    pub content: BTreeMap<LayerToken, Layer>,
    pub libraries: BTreeMap<LayerToken, Layer>,
    pub references: BTreeMap<RefKind, BTreeMap<String, PrimPath>>,
    pub names: NameCache,
    /// Mesh library entries by source mesh name.
    pub meshes: BTreeMap<String, MeshEntry>,
    /// World transforms of authored bodies and sites, by geometry path.
    pub world: HashMap<PrimPath, Transform>,
    /// Physics materials keyed by friction tuple, in creation order.
    pub physics_materials: Vec<([f64; 3], PrimPath)>,
    pub extents: Extents,
    pub textures: Vec<TextureCopy>,
    pub warnings: Vec<Warning>,
}

impl<'a> ConversionContext<'a> {
    pub fn new(model: &'a Model, options: &'a ConvertOptions) -> Self {
        let mut names = NameCache::new();
        let asset_name = names.get_name(&PrimPath::root(), &model.name, "Asset");
        Self {
            model,
            options,
            asset_name,
            content: BTreeMap::new(),
            libraries: BTreeMap::new(),
            references: BTreeMap::new(),
            names,
            meshes: BTreeMap::new(),
            world: HashMap::new(),
            physics_materials: Vec::new(),
            extents: Extents::default(),
            textures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// `/<asset>`
    pub fn root_path(&self) -> PrimPath {
        PrimPath::root().child(&self.asset_name)
    }

    pub fn geometry_scope(&self) -> PrimPath {
        self.root_path().child(GEOMETRY_SCOPE)
    }

    pub fn materials_scope(&self) -> PrimPath {
        self.root_path().child(MATERIALS_SCOPE)
    }

    pub fn physics_scope_path(&self) -> PrimPath {
        self.root_path().child(PHYSICS_SCOPE)
    }

    /// Layer with the shared stage metadata applied.
    pub fn new_layer(&self, identifier: String) -> Layer {
        let mut layer = Layer::new(identifier);
        layer.up_axis = Some("Z".to_string());
        layer.meters_per_unit = Some(1.0);
        layer.kilograms_per_unit = Some(1.0);
        if !self.options.comment.is_empty() {
            layer.doc = Some(self.options.comment.clone());
        }
        let mut custom = MetaData::new();
        custom.set("creator", crate::usd::Value::string(format!("MJCF USD Converter v{}", crate::VERSION)));
        layer.custom_data = custom;
        layer
    }

    pub fn add_content_layer(&mut self, token: LayerToken) -> &mut Layer {
        let mut layer = self.new_layer(token.identifier(&self.asset_name));
        layer.default_prim = Some(self.asset_name.clone());
        self.content.entry(token).or_insert(layer)
    }

    pub fn has_layer(&self, token: LayerToken) -> bool {
        self.content.contains_key(&token)
    }

    pub fn layer(&self, token: LayerToken) -> Result<&Layer> {
        self.content
            .get(&token)
            .ok_or_else(|| Error::integrity(format!("{token:?} layer has not been created")))
    }

    pub fn layer_mut(&mut self, token: LayerToken) -> Result<&mut Layer> {
        self.content
            .get_mut(&token)
            .ok_or_else(|| Error::integrity(format!("{token:?} layer has not been created")))
    }

    pub fn library_mut(&mut self, token: LayerToken) -> Result<&mut Layer> {
        self.libraries
            .get_mut(&token)
            .ok_or_else(|| Error::integrity(format!("{token:?} library has not been created")))
    }

    /// `def` in a content layer.
    pub fn define(&mut self, token: LayerToken, path: &PrimPath, type_name: &str) -> Result<&mut Prim> {
        self.layer_mut(token)?.define_prim(path, type_name)
    }

    /// `over` in a content layer.
    pub fn overlay(&mut self, token: LayerToken, path: &PrimPath) -> Result<&mut Prim> {
        self.layer_mut(token)?.override_prim(path)
    }

    /// The `Physics` scope in the physics layer, defined on first use.
    pub fn physics_scope(&mut self) -> Result<PrimPath> {
        let path = self.physics_scope_path();
        self.define(LayerToken::Physics, &path, "Scope")?;
        Ok(path)
    }

    /// Record a source name. The first registration wins.
    pub fn register(&mut self, kind: RefKind, source: Option<&str>, path: &PrimPath) {
        let Some(source) = source else {
            return;
        };
        self.references
            .entry(kind)
            .or_default()
            .entry(source.to_string())
            .or_insert_with(|| path.clone());
    }

    pub fn lookup(&self, kind: RefKind, source: &str) -> Option<PrimPath> {
        self.references.get(&kind).and_then(|t| t.get(source)).cloned()
    }

    /// Body lookup where `world` names the default prim.
    pub fn lookup_body(&self, source: &str) -> Option<PrimPath> {
        if source == "world" {
            return Some(self.root_path());
        }
        self.lookup(RefKind::Bodies, source)
    }

    /// World transform of a registered xformable; the default prim is the origin.
    pub fn world_transform(&self, path: &PrimPath) -> Transform {
        self.world.get(path).copied().unwrap_or(Transform::IDENTITY)
    }

    pub fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warn_unsupported(&mut self, msg: impl Into<String>) {
        self.warn(Warning::UnsupportedFeature(msg.into()));
    }

    pub fn warn_unresolved(&mut self, msg: impl Into<String>) {
        self.warn(Warning::UnresolvedReference(msg.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_identifiers() {
        assert_eq!(LayerToken::Asset.identifier("robot"), "robot.usda");
        assert_eq!(LayerToken::Physics.identifier("robot"), "Payload/Physics.usda");
        assert_eq!(LayerToken::Geometry.library_identifier().unwrap(), "Payload/GeometryLibrary.usda");
        assert_eq!(LayerToken::Materials.library_identifier().unwrap(), "Payload/MaterialsLibrary.usda");
        assert_eq!(LayerToken::Physics.library_identifier(), None);
        assert_eq!(LayerToken::Contents.identifier("robot"), "Payload/Contents.usda");
    }

    #[test]
    fn test_missing_layer_is_integrity_error() {
        let model = Model::default();
        let options = ConvertOptions::default();
        let mut ctx = ConversionContext::new(&model, &options);
        assert_eq!(ctx.asset_name, "tn__MuJoCo_20_Model");
        assert!(matches!(ctx.layer(LayerToken::Physics), Err(Error::Integrity(_))));
        ctx.add_content_layer(LayerToken::Physics);
        let scope = ctx.physics_scope().unwrap();
        assert_eq!(scope.as_str(), "/tn__MuJoCo_20_Model/Physics");
        let layer = ctx.layer(LayerToken::Physics).unwrap();
        assert_eq!(layer.default_prim.as_deref(), Some("tn__MuJoCo_20_Model"));
        assert_eq!(layer.up_axis.as_deref(), Some("Z"));
    }

    #[test]
    fn test_register_first_wins() {
        let model = Model::default();
        let options = ConvertOptions::default();
        let mut ctx = ConversionContext::new(&model, &options);
        ctx.register(RefKind::Bodies, Some("arm"), &PrimPath::new("/a"));
        ctx.register(RefKind::Bodies, Some("arm"), &PrimPath::new("/b"));
        ctx.register(RefKind::Bodies, None, &PrimPath::new("/c"));
        assert_eq!(ctx.lookup(RefKind::Bodies, "arm"), Some(PrimPath::new("/a")));
        assert_eq!(ctx.lookup_body("world"), Some(ctx.root_path()));
        ctx.warn_unresolved("body 'x'");
        assert_eq!(ctx.warnings.len(), 1);
    }
}
