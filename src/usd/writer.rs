//! Text (`.usda`) serialization of layers.
//!
//! Output is fully deterministic: specs, properties and metadata are written
//! in authored order and floats use their shortest round-trip form.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::value::write_quoted;
use super::{Attribute, Layer, MetaData, Prim, Property, Reference, Relationship, Value};
use crate::util::Result;

const INDENT: &str = "    ";

/// Serialize a layer to text.
pub fn write_layer(layer: &Layer) -> String {
    let mut out = String::from("#usda 1.0\n");
    write_layer_metadata(&mut out, layer);
    for prim in &layer.root_prims {
        out.push('\n');
        write_prim(&mut out, prim, 0);
    }
    out
}

/// Serialize a layer into `root_dir/<identifier>`, creating directories.
pub fn save_layer(layer: &Layer, root_dir: &Path) -> Result<PathBuf> {
    let path = root_dir.join(&layer.identifier);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, write_layer(layer))?;
    debug!("Wrote layer {}", path.display());
    Ok(path)
}

fn write_layer_metadata(out: &mut String, layer: &Layer) {
    let mut lines: Vec<String> = Vec::new();
    if let Some(doc) = &layer.doc {
        lines.push(format!("doc = {}", doc_literal(doc)));
    }
    if !layer.custom_data.is_empty() {
        let mut s = String::from("customLayerData = ");
        write_dictionary(&mut s, &layer.custom_data, 1);
        lines.push(s);
    }
    if let Some(name) = &layer.default_prim {
        let mut s = String::from("defaultPrim = ");
        write_quoted(&mut s, name);
        lines.push(s);
    }
    if let Some(v) = layer.kilograms_per_unit {
        lines.push(format!("kilogramsPerUnit = {}", Value::Double(v)));
    }
    if let Some(v) = layer.meters_per_unit {
        lines.push(format!("metersPerUnit = {}", Value::Double(v)));
    }
    if !layer.sublayers.is_empty() {
        let mut s = String::from("subLayers = [\n");
        for (i, sub) in layer.sublayers.iter().enumerate() {
            let sep = if i + 1 < layer.sublayers.len() { "," } else { "" };
            let _ = writeln!(s, "{INDENT}{INDENT}@{sub}@{sep}");
        }
        s.push_str(INDENT);
        s.push(']');
        lines.push(s);
    }
    if let Some(axis) = &layer.up_axis {
        let mut s = String::from("upAxis = ");
        write_quoted(&mut s, axis);
        lines.push(s);
    }
    if lines.is_empty() {
        return;
    }
    out.push_str("(\n");
    for line in lines {
        let _ = writeln!(out, "{INDENT}{line}");
    }
    out.push_str(")\n");
}

fn doc_literal(doc: &str) -> String {
    if doc.contains('\n') {
        format!("\"\"\"{}\"\"\"", doc.replace("\"\"\"", "\\\"\\\"\\\""))
    } else {
        let mut s = String::new();
        write_quoted(&mut s, doc);
        s
    }
}

fn pad(level: usize) -> String {
    INDENT.repeat(level)
}

fn write_dictionary(out: &mut String, dict: &MetaData, level: usize) {
    out.push_str("{\n");
    for (key, value) in dict.iter() {
        let _ = write!(out, "{}{} {} = ", pad(level + 1), dictionary_type(value), key);
        value.write_to(out);
        out.push('\n');
    }
    let _ = write!(out, "{}}}", pad(level));
}

fn dictionary_type(value: &Value) -> &'static str {
    match value {
        Value::Token(_) => "string",
        other => other.type_name(),
    }
}

fn write_arcs(out: &mut String, keyword: &str, arcs: &[Reference], level: usize) {
    if arcs.is_empty() {
        return;
    }
    let _ = write!(out, "{}prepend {keyword} = ", pad(level));
    if arcs.len() > 1 {
        out.push('[');
    }
    for (i, arc) in arcs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if !arc.asset.is_empty() {
            let _ = write!(out, "@{}@", arc.asset);
        }
        if let Some(prim) = &arc.prim {
            let _ = write!(out, "<{prim}>");
        }
    }
    if arcs.len() > 1 {
        out.push(']');
    }
    out.push('\n');
}

fn write_prim_metadata(out: &mut String, prim: &Prim, level: usize) -> bool {
    let has_meta = !prim.api_schemas.is_empty()
        || !prim.metadata.is_empty()
        || !prim.asset_info.is_empty()
        || !prim.references.is_empty()
        || !prim.payloads.is_empty();
    if !has_meta {
        return false;
    }
    out.push_str(" (\n");
    let inner = level + 1;
    if !prim.api_schemas.is_empty() {
        let schemas = Value::TokenArray(prim.api_schemas.clone());
        let _ = writeln!(out, "{}prepend apiSchemas = {schemas}", pad(inner));
    }
    if !prim.asset_info.is_empty() {
        let _ = write!(out, "{}assetInfo = ", pad(inner));
        write_dictionary(out, &prim.asset_info, inner);
        out.push('\n');
    }
    for (key, value) in prim.metadata.iter() {
        let _ = write!(out, "{}{key} = ", pad(inner));
        write_metadata_value(out, value);
        out.push('\n');
    }
    write_arcs(out, "payload", &prim.payloads, inner);
    write_arcs(out, "references", &prim.references, inner);
    let _ = write!(out, "{})", pad(level));
    true
}

fn write_metadata_value(out: &mut String, value: &Value) {
    match value {
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        other => other.write_to(out),
    }
}

fn write_prim(out: &mut String, prim: &Prim, level: usize) {
    let _ = write!(out, "{}{} ", pad(level), prim.specifier.keyword());
    if let Some(ty) = &prim.type_name {
        let _ = write!(out, "{ty} ");
    }
    write_quoted(out, &prim.name);
    write_prim_metadata(out, prim, level);
    let _ = writeln!(out, "\n{}{{", pad(level));
    for property in &prim.properties {
        match property {
            Property::Attribute(attr) => write_attribute(out, attr, level + 1),
            Property::Relationship(rel) => write_relationship(out, rel, level + 1),
        }
    }
    for (i, child) in prim.children.iter().enumerate() {
        if i > 0 || !prim.properties.is_empty() {
            out.push('\n');
        }
        write_prim(out, child, level + 1);
    }
    let _ = writeln!(out, "{}}}", pad(level));
}

fn attribute_decl(attr: &Attribute) -> String {
    let mut s = String::new();
    if attr.custom {
        s.push_str("custom ");
    }
    if attr.uniform {
        s.push_str("uniform ");
    }
    let _ = write!(s, "{} {}", attr.type_name, attr.name);
    s
}

fn write_attribute(out: &mut String, attr: &Attribute, level: usize) {
    let decl = attribute_decl(attr);
    if attr.value.is_some() || attr.connections.is_empty() {
        let _ = write!(out, "{}{decl}", pad(level));
        if let Some(value) = &attr.value {
            out.push_str(" = ");
            value.write_to(out);
        }
        if !attr.metadata.is_empty() {
            out.push_str(" (\n");
            for (key, value) in attr.metadata.iter() {
                let _ = write!(out, "{}{key} = ", pad(level + 1));
                write_metadata_value(out, value);
                out.push('\n');
            }
            let _ = write!(out, "{})", pad(level));
        }
        out.push('\n');
    }
    if !attr.connections.is_empty() {
        let _ = write!(out, "{}{decl}.connect = ", pad(level));
        if attr.connections.len() == 1 {
            let _ = write!(out, "<{}>", attr.connections[0]);
        } else {
            let targets: Vec<String> = attr.connections.iter().map(|c| format!("<{c}>")).collect();
            let _ = write!(out, "[{}]", targets.join(", "));
        }
        out.push('\n');
    }
}

fn write_relationship(out: &mut String, rel: &Relationship, level: usize) {
    let custom = if rel.custom { "custom " } else { "" };
    let _ = write!(out, "{}{custom}rel {}", pad(level), rel.name);
    match rel.targets.len() {
        0 => {}
        1 => {
            let _ = write!(out, " = <{}>", rel.targets[0]);
        }
        _ => {
            let targets: Vec<String> = rel.targets.iter().map(|t| format!("<{t}>")).collect();
            let _ = write!(out, " = [{}]", targets.join(", "));
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usd::{PrimPath, PropertyPath};

    fn sample_layer() -> Layer {
        let mut layer = Layer::new("Payload/Contents.usda");
        layer.default_prim = Some("robot".into());
        layer.up_axis = Some("Z".into());
        layer.meters_per_unit = Some(1.0);
        layer.sublayers = vec!["./Physics.usda".into(), "./Geometry.usda".into()];
        layer.custom_data.set("creator", Value::string("test"));
        let robot = layer.define_prim(&PrimPath::new("/robot"), "Xform").unwrap();
        robot.set_kind("component");
        robot.set_attribute("xformOp:translate", [0.0, 0.0, 1.0]);
        robot.set_relationship("physics:body0", vec![PrimPath::new("/robot/a")]);
        layer
    }

    #[test]
    fn test_layer_header_and_prim() {
        let text = write_layer(&sample_layer());
        assert!(text.starts_with("#usda 1.0\n(\n"));
        assert!(text.contains("defaultPrim = \"robot\""));
        assert!(text.contains("string creator = \"test\""));
        assert!(text.contains("@./Physics.usda@,\n"));
        assert!(text.contains("def Xform \"robot\" (\n    kind = \"component\"\n)\n{"));
        assert!(text.contains("double3 xformOp:translate = (0, 0, 1)"));
        assert!(text.contains("rel physics:body0 = </robot/a>"));
    }

    #[test]
    fn test_connections_and_interpolation() {
        let mut prim = Prim::def("red", "Material");
        prim.put_attribute(
            Attribute::declared("outputs:surface", "token")
                .connected_to(PropertyPath::new(PrimPath::new("/Materials/red/Shader"), "outputs:surface")),
        );
        prim.put_attribute(
            Attribute::new("primvars:displayColor", Value::Color3fArray(vec![[1.0, 0.0, 0.0]]))
                .with_interpolation("constant"),
        );
        let mut out = String::new();
        write_prim(&mut out, &prim, 0);
        assert!(out.contains("token outputs:surface.connect = </Materials/red/Shader.outputs:surface>"));
        assert!(!out.contains("token outputs:surface\n"));
        assert!(out.contains("color3f[] primvars:displayColor = [(1, 0, 0)] (\n        interpolation = \"constant\"\n    )"));
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_layer(&sample_layer(), dir.path()).unwrap();
        assert!(path.ends_with("Payload/Contents.usda"));
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, write_layer(&sample_layer()));
    }
}
