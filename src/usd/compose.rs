//! Layer-stack composition.
//!
//! [`flatten`] collapses a root layer, its sublayers and every reference and
//! payload arc reachable from it into one self-contained layer. Strength
//! order: a layer is stronger than its sublayers, earlier sublayers are
//! stronger than later ones, and local opinions are stronger than anything
//! brought in through an arc. Paths authored inside referenced prims are
//! remapped into the referencing namespace; asset paths are re-anchored to
//! the flattened layer.

use std::collections::BTreeMap;

use tracing::debug;

use super::layer::{relative_asset_path, resolve_asset_path};
use super::{Attribute, Layer, Prim, PrimPath, Property, Reference, Relationship, Specifier, Value};
use crate::util::{Error, Result};

/// Maximum arc / sublayer nesting before composition is treated as cyclic.
const MAX_DEPTH: usize = 32;

/// Flatten the layer `root` from `layers` (keyed by identifier).
pub fn flatten(root: &str, layers: &BTreeMap<String, Layer>) -> Result<Layer> {
    let composer = Composer { layers, output: root };
    let root_layer = composer.layer(root)?;

    let mut out = Layer::new(root);
    out.copy_stage_metadata(root_layer);
    out.default_prim = root_layer.default_prim.clone();

    let stack = composer.layer_stack(root, 0)?;
    for name in child_names(stack.iter().map(|l| l.root_prims.as_slice())) {
        let path = PrimPath::root().child(&name);
        let opinions: Vec<Opinion> = stack
            .iter()
            .copied()
            .filter_map(|l| l.root_prim(&name).map(|p| Opinion::local(p, l)))
            .collect();
        if opinions.iter().all(|o| o.prim.specifier == Specifier::Class) {
            continue;
        }
        out.root_prims.push(composer.compose(&path, opinions, 0)?);
    }
    debug!("Flattened {} ({} root prims)", root, out.root_prims.len());
    Ok(out)
}

#[derive(Clone)]
struct Opinion<'a> {
    prim: &'a Prim,
    layer: &'a Layer,
    source_root: PrimPath,
    target_root: PrimPath,
}

impl<'a> Opinion<'a> {
    fn local(prim: &'a Prim, layer: &'a Layer) -> Self {
        Self { prim, layer, source_root: PrimPath::root(), target_root: PrimPath::root() }
    }

    fn with_prim(&self, prim: &'a Prim) -> Self {
        Self { prim, ..self.clone() }
    }

    fn map_path(&self, path: &PrimPath) -> PrimPath {
        path.replace_prefix(&self.source_root, &self.target_root)
            .unwrap_or_else(|| path.clone())
    }
}

struct Composer<'a> {
    layers: &'a BTreeMap<String, Layer>,
    output: &'a str,
}

impl<'a> Composer<'a> {
    fn layer(&self, id: &str) -> Result<&'a Layer> {
        self.layers
            .get(id)
            .ok_or_else(|| Error::integrity(format!("layer '{id}' is not part of the asset")))
    }

    /// The layer followed by its sublayers, strongest first.
    fn layer_stack(&self, id: &str, depth: usize) -> Result<Vec<&'a Layer>> {
        if depth > MAX_DEPTH {
            return Err(Error::integrity(format!("sublayer cycle through '{id}'")));
        }
        let layer = self.layer(id)?;
        let mut stack = vec![layer];
        for sub in &layer.sublayers {
            let sub_id = resolve_asset_path(layer, sub);
            stack.extend(self.layer_stack(&sub_id, depth + 1)?);
        }
        Ok(stack)
    }

    /// Opinions contributed by one reference or payload arc.
    fn arc_opinions(&self, from: &Opinion<'a>, arc: &Reference, target: &PrimPath) -> Result<Vec<Opinion<'a>>> {
        let layer_id = if arc.asset.is_empty() {
            from.layer.identifier.clone()
        } else {
            resolve_asset_path(from.layer, &arc.asset)
        };
        let stack = self.layer_stack(&layer_id, 0)?;
        let source = match &arc.prim {
            Some(p) => p.clone(),
            None => stack
                .first()
                .and_then(|l| l.default_prim_path())
                .ok_or_else(|| Error::integrity(format!("'{layer_id}' has no default prim to reference")))?,
        };
        let found: Vec<Opinion> = stack
            .iter()
            .copied()
            .filter_map(|l| {
                l.prim(&source).map(|p| Opinion {
                    prim: p,
                    layer: l,
                    source_root: source.clone(),
                    target_root: target.clone(),
                })
            })
            .collect();
        if found.is_empty() {
            return Err(Error::integrity(format!("'{layer_id}' has no prim at {source}")));
        }
        Ok(found)
    }

    fn compose(&self, path: &PrimPath, mut opinions: Vec<Opinion<'a>>, depth: usize) -> Result<Prim> {
        if depth > MAX_DEPTH * 8 {
            return Err(Error::integrity(format!("namespace too deep at {path}")));
        }

        // Arcs are weaker than every opinion that introduces them.
        let mut i = 0;
        while i < opinions.len() {
            if opinions.len() > MAX_DEPTH * 4 {
                return Err(Error::integrity(format!("reference cycle at {path}")));
            }
            let op = opinions[i].clone();
            for arc in op.prim.references.iter().chain(op.prim.payloads.iter()) {
                let found = self.arc_opinions(&op, arc, path)?;
                opinions.extend(found);
            }
            i += 1;
        }

        let specifier = if opinions.iter().any(|o| o.prim.specifier == Specifier::Def) {
            Specifier::Def
        } else if opinions.iter().any(|o| o.prim.specifier == Specifier::Class) {
            Specifier::Class
        } else {
            Specifier::Over
        };
        let type_name = opinions.iter().find_map(|o| o.prim.type_name.as_deref());
        let mut out = Prim::new(specifier, path.name(), type_name);

        for op in &opinions {
            for schema in &op.prim.api_schemas {
                out.apply_api(schema);
            }
        }
        for op in opinions.iter().rev() {
            out.metadata.merge_from(&op.prim.metadata);
            out.asset_info.merge_from(&op.prim.asset_info);
            for property in &op.prim.properties {
                let mapped = self.map_property(op, property);
                match mapped {
                    Property::Attribute(a) => {
                        out.put_attribute(a);
                    }
                    Property::Relationship(r) => {
                        let custom = r.custom;
                        out.set_relationship(&r.name, r.targets).custom = custom;
                    }
                }
            }
        }

        for name in child_names(opinions.iter().map(|o| o.prim.children.as_slice())) {
            let child_ops: Vec<Opinion> = opinions
                .iter()
                .filter_map(|o| o.prim.child(&name).map(|c| o.with_prim(c)))
                .collect();
            out.children.push(self.compose(&path.child(&name), child_ops, depth + 1)?);
        }
        Ok(out)
    }

    fn map_property(&self, op: &Opinion<'a>, property: &Property) -> Property {
        match property {
            Property::Attribute(a) => {
                let mut attr: Attribute = a.clone();
                for c in &mut attr.connections {
                    c.prim = op.map_path(&c.prim);
                }
                if let Some(Value::Asset(asset)) = &attr.value {
                    let resolved = resolve_asset_path(op.layer, asset);
                    attr.value = Some(Value::Asset(relative_asset_path(self.output, &resolved)));
                }
                Property::Attribute(attr)
            }
            Property::Relationship(r) => Property::Relationship(Relationship {
                name: r.name.clone(),
                targets: r.targets.iter().map(|t| op.map_path(t)).collect(),
                custom: r.custom,
            }),
        }
    }
}

/// Child names in order of first appearance, weakest opinion first.
fn child_names<'p>(levels: impl DoubleEndedIterator<Item = &'p [Prim]>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for children in levels.rev() {
        for child in children {
            if !names.iter().any(|n| *n == child.name) {
                names.push(child.name.clone());
            }
        }
    }
    names
}
