//! Layers: one document of prim specs plus stage metadata.

use super::{MetaData, Prim, PrimPath, Specifier};
use crate::util::{Error, Result};

/// One scene-description document.
///
/// `identifier` is the layer's path relative to the asset root, using `/`
/// separators (e.g. `Payload/Geometry.usda`). Sublayer and reference asset
/// paths inside the layer are relative to the layer's own directory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layer {
    pub identifier: String,
    pub default_prim: Option<String>,
    pub up_axis: Option<String>,
    pub meters_per_unit: Option<f64>,
    pub kilograms_per_unit: Option<f64>,
    pub doc: Option<String>,
    pub custom_data: MetaData,
    pub sublayers: Vec<String>,
    pub root_prims: Vec<Prim>,
}

impl Layer {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), ..Default::default() }
    }

    /// Directory part of the identifier, empty at the asset root.
    pub fn directory(&self) -> &str {
        match self.identifier.rfind('/') {
            Some(i) => &self.identifier[..i],
            None => "",
        }
    }

    /// Copy up axis, units, doc and custom data from another layer.
    pub fn copy_stage_metadata(&mut self, other: &Layer) {
        self.up_axis = other.up_axis.clone();
        self.meters_per_unit = other.meters_per_unit;
        self.kilograms_per_unit = other.kilograms_per_unit;
        self.doc = other.doc.clone();
        self.custom_data = other.custom_data.clone();
    }

    pub fn default_prim_path(&self) -> Option<PrimPath> {
        self.default_prim.as_deref().map(|n| PrimPath::root().child(n))
    }

    pub fn root_prim(&self, name: &str) -> Option<&Prim> {
        self.root_prims.iter().find(|p| p.name == name)
    }

    pub fn prim(&self, path: &PrimPath) -> Option<&Prim> {
        let mut segments = path.segments();
        let mut prim = self.root_prim(segments.next()?)?;
        for seg in segments {
            prim = prim.child(seg)?;
        }
        Some(prim)
    }

    pub fn prim_mut(&mut self, path: &PrimPath) -> Option<&mut Prim> {
        let mut segments = path.segments();
        let first = segments.next()?;
        let mut prim = self.root_prims.iter_mut().find(|p| p.name == first)?;
        for seg in segments {
            prim = prim.child_mut(seg)?;
        }
        Some(prim)
    }

    fn spec_at(&mut self, path: &PrimPath) -> Result<&mut Prim> {
        let segments: Vec<&str> = path.segments().collect();
        let Some((first, rest)) = segments.split_first() else {
            return Err(Error::integrity("cannot author a spec at the pseudo-root"));
        };
        let idx = match self.root_prims.iter().position(|p| p.name == *first) {
            Some(i) => i,
            None => {
                self.root_prims.push(Prim::over(*first));
                self.root_prims.len() - 1
            }
        };
        let mut prim = &mut self.root_prims[idx];
        for seg in rest {
            prim = prim.override_child(seg);
        }
        Ok(prim)
    }

    /// Get or create a `def` at `path`; missing ancestors become `over`s.
    pub fn define_prim(&mut self, path: &PrimPath, type_name: &str) -> Result<&mut Prim> {
        let prim = self.spec_at(path)?;
        if prim.specifier == Specifier::Over {
            prim.specifier = Specifier::Def;
        }
        if !type_name.is_empty() {
            prim.type_name = Some(type_name.to_string());
        }
        Ok(prim)
    }

    /// Get or create a `class` at `path`.
    pub fn define_class(&mut self, path: &PrimPath, type_name: &str) -> Result<&mut Prim> {
        let prim = self.spec_at(path)?;
        prim.specifier = Specifier::Class;
        prim.type_name = Some(type_name.to_string());
        Ok(prim)
    }

    /// Get or create an `over` at `path`. Existing specs keep their specifier.
    pub fn override_prim(&mut self, path: &PrimPath) -> Result<&mut Prim> {
        self.spec_at(path)
    }

    /// Every spec in depth-first order with its path.
    pub fn traverse(&self) -> Vec<(PrimPath, &Prim)> {
        let mut out = Vec::new();
        for root in &self.root_prims {
            root.walk(&PrimPath::root().child(&root.name), &mut |path, prim| {
                out.push((path.clone(), prim));
            });
        }
        out
    }
}

/// Resolve an asset path authored in the layer `anchor` into an identifier
/// relative to the asset root.
pub fn resolve_asset_path(anchor: &Layer, asset: &str) -> String {
    if asset.starts_with('/') {
        return normalize(asset);
    }
    let dir = anchor.directory();
    if dir.is_empty() {
        normalize(asset)
    } else {
        normalize(&format!("{dir}/{asset}"))
    }
}

/// Express the root-relative identifier `target` relative to the directory
/// of the root-relative identifier `from_layer`, `./`-prefixed.
pub fn relative_asset_path(from_layer: &str, target: &str) -> String {
    let from_dir: Vec<&str> = match from_layer.rfind('/') {
        Some(i) => from_layer[..i].split('/').collect(),
        None => Vec::new(),
    };
    let target_parts: Vec<&str> = target.split('/').collect();
    let common = from_dir
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        parts.push("..");
    }
    parts.extend(&target_parts[common..]);
    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            p => out.push(p),
        }
    }
    out.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_creates_overs_for_ancestors() {
        let mut layer = Layer::new("Payload/Physics.usda");
        layer
            .define_prim(&PrimPath::new("/robot/Geometry/body/hinge"), "PhysicsRevoluteJoint")
            .unwrap();
        let body = layer.prim(&PrimPath::new("/robot/Geometry/body")).unwrap();
        assert_eq!(body.specifier, Specifier::Over);
        let joint = layer.prim(&PrimPath::new("/robot/Geometry/body/hinge")).unwrap();
        assert_eq!(joint.specifier, Specifier::Def);
        assert_eq!(layer.traverse().len(), 4);
        assert!(layer.define_prim(&PrimPath::root(), "Xform").is_err());
    }

    #[test]
    fn test_asset_paths() {
        let contents = Layer::new("Payload/Contents.usda");
        assert_eq!(resolve_asset_path(&contents, "./Geometry.usda"), "Payload/Geometry.usda");
        let root = Layer::new("robot.usda");
        assert_eq!(resolve_asset_path(&root, "./Payload/Contents.usda"), "Payload/Contents.usda");
        assert_eq!(resolve_asset_path(&contents, "../Textures/a.png"), "Textures/a.png");

        assert_eq!(relative_asset_path("Payload/MaterialsLibrary.usda", "Payload/Textures/a.png"), "./Textures/a.png");
        assert_eq!(relative_asset_path("Payload/MaterialsLibrary.usda", "Textures/a.png"), "../Textures/a.png");
        assert_eq!(relative_asset_path("robot.usda", "Payload/Textures/a.png"), "./Payload/Textures/a.png");
    }
}
