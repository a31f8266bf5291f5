//! Visual and physics materials.
//!
//! Visual materials become preview-surface networks in
//! `MaterialsLibrary.usda`; the content layer references them and geoms
//! bind to them. Physics materials are deduplicated by friction.

use std::path::Path;

use tracing::debug;

use super::author::{author, display_name, rgb};
use super::context::{ConversionContext, LayerToken, RefKind, TextureCopy, MATERIALS_LIBRARY, MATERIALS_SCOPE, PAYLOAD_DIR};
use crate::mjcf::Material;
use crate::usd::{relative_asset_path, Attribute, Layer, PrimPath, PropertyPath, Reference, Value};
use crate::util::Result;

const SURFACE_SHADER: &str = "PreviewSurface";
const TEXTURE_SHADER: &str = "DiffuseTexture";
const TEXCOORD_READER: &str = "TexCoordReader";
const TEXTURES_DIR: &str = "Textures";

const DIFFUSE_FALLBACK: [f32; 3] = [0.18, 0.18, 0.18];

/// Default friction per component of a physics material.
const TORSIONAL_FALLBACK: f64 = 0.005;
const ROLLING_FALLBACK: f64 = 0.0001;

/// Root of the materials library.
pub fn library_root() -> PrimPath {
    PrimPath::root().child(MATERIALS_SCOPE)
}

/// Author every visual material into the library and the content layer.
pub fn build_material_library(ctx: &mut ConversionContext) -> Result<()> {
    let model = ctx.model;
    if model.materials.is_empty() {
        return Ok(());
    }
    let root = library_root();
    let mut lib = ctx.new_layer(MATERIALS_LIBRARY.to_string());
    lib.default_prim = Some(MATERIALS_SCOPE.to_string());
    lib.define_class(&root, "Scope")?;

    let scope = ctx.materials_scope();
    ctx.define(LayerToken::Materials, &scope, "Scope")?;
    let materials_id = LayerToken::Materials.identifier(&ctx.asset_name);
    let library_asset = relative_asset_path(&materials_id, MATERIALS_LIBRARY);

    for material in &model.materials {
        let source = material.name.as_deref();
        let name = ctx.names.get_name(&root, source.unwrap_or(""), "Material");
        let lib_path = root.child(&name);
        author_preview_surface(ctx, &mut lib, &lib_path, material)?;
        if let Some(prim) = lib.prim_mut(&lib_path) {
            display_name(prim, source, &name);
        }

        let path = scope.child(&name);
        let prim = ctx.define(LayerToken::Materials, &path, "Material")?;
        prim.add_reference(Reference::new(library_asset.clone(), Some(lib_path)));
        ctx.register(RefKind::Materials, source, &path);
        debug!("Material {}", path);
    }
    ctx.libraries.insert(LayerToken::Materials, lib);
    Ok(())
}

fn author_preview_surface(ctx: &mut ConversionContext, lib: &mut Layer, path: &PrimPath, material: &Material) -> Result<()> {
    let shader_path = path.child(SURFACE_SHADER);
    let prim = lib.define_prim(path, "Material")?;
    prim.put_attribute(
        Attribute::declared("outputs:surface", "token")
            .connected_to(PropertyPath::new(shader_path.clone(), "outputs:surface")),
    );

    let texture = material
        .texture
        .as_deref()
        .and_then(|name| texture_asset(ctx, &material.name, name));

    let rgba = material.rgba;
    let shader = lib.define_prim(&shader_path, "Shader")?;
    shader.set_uniform("info:id", "UsdPreviewSurface");
    match &texture {
        Some(_) => {
            shader.put_attribute(
                Attribute::declared("inputs:diffuseColor", "color3f")
                    .connected_to(PropertyPath::new(path.child(TEXTURE_SHADER), "outputs:rgb")),
            );
        }
        None => {
            author(shader, "inputs:diffuseColor", Value::Color3f(rgb(rgba)), Value::Color3f(DIFFUSE_FALLBACK));
        }
    }
    author(shader, "inputs:opacity", rgba[3] as f32, 1.0);
    let emissive = rgb(rgba).map(|c| c * material.emission as f32);
    author(shader, "inputs:emissiveColor", Value::Color3f(emissive), Value::Color3f([0.0; 3]));
    let roughness = material.roughness.unwrap_or(1.0 - material.shininess);
    author(shader, "inputs:roughness", roughness as f32, 0.5);
    match (material.metallic, material.specular) {
        (Some(metallic), _) => {
            author(shader, "inputs:metallic", metallic as f32, 0.0);
        }
        (None, Some(specular)) => {
            let s = specular as f32;
            shader.set_attribute("inputs:useSpecularWorkflow", 1);
            shader.set_attribute("inputs:specularColor", Value::Color3f([s, s, s]));
        }
        (None, None) => {}
    }
    shader.put_attribute(Attribute::declared("outputs:surface", "token"));

    if let Some(file) = texture {
        let reader_path = path.child(TEXCOORD_READER);
        let reader = lib.define_prim(&reader_path, "Shader")?;
        reader.set_uniform("info:id", "UsdPrimvarReader_float2");
        reader.set_attribute("inputs:varname", Value::string("st"));
        reader.put_attribute(Attribute::declared("outputs:result", "float2"));

        let tex = lib.define_prim(&path.child(TEXTURE_SHADER), "Shader")?;
        tex.set_uniform("info:id", "UsdUVTexture");
        tex.set_attribute("inputs:file", Value::Asset(file));
        tex.put_attribute(
            Attribute::declared("inputs:st", "float2")
                .connected_to(PropertyPath::new(reader_path, "outputs:result")),
        );
        let [r, g, b, a] = rgba;
        if rgba != [1.0; 4] {
            tex.set_attribute("inputs:scale", [r as f32, g as f32, b as f32, a as f32]);
        }
        tex.put_attribute(Attribute::declared("outputs:rgb", "float3"));
    }
    Ok(())
}

/// Schedule a texture copy and return its path relative to the library.
fn texture_asset(ctx: &mut ConversionContext, material: &Option<String>, texture: &str) -> Option<String> {
    let model = ctx.model;
    let owner = material.as_deref().unwrap_or("");
    let Some(tex) = model.texture(texture) else {
        ctx.warn_unresolved(format!("texture '{texture}' of material '{owner}'"));
        return None;
    };
    let source = match (&tex.builtin, model.texture_path(tex)) {
        (None, Some(source)) => source,
        _ => {
            ctx.warn_unsupported(format!("builtin texture '{texture}' of material '{owner}'"));
            return None;
        }
    };
    let file_name = Path::new(&source).file_name()?.to_string_lossy().into_owned();
    let target = if ctx.options.layer_structure {
        format!("{PAYLOAD_DIR}/{TEXTURES_DIR}/{file_name}")
    } else {
        format!("{TEXTURES_DIR}/{file_name}")
    };
    if !ctx.textures.iter().any(|t| t.target == target) {
        ctx.textures.push(TextureCopy { source, target: target.clone() });
    }
    Some(relative_asset_path(MATERIALS_LIBRARY, &target))
}

/// Bind the visual material named `material` to the gprim at `path`.
pub fn bind_visual(ctx: &mut ConversionContext, path: &PrimPath, material: &str) -> Result<()> {
    let Some(target) = ctx.lookup(RefKind::Materials, material) else {
        ctx.warn_unresolved(format!("material '{material}' bound to {path}"));
        return Ok(());
    };
    let prim = ctx.overlay(LayerToken::Materials, path)?;
    prim.apply_api("MaterialBindingAPI");
    prim.set_relationship("material:binding", vec![target]);
    Ok(())
}

/// Physics material for a friction triple, shared by equal triples.
pub fn physics_material(ctx: &mut ConversionContext, friction: [f64; 3]) -> Result<PrimPath> {
    if let Some((_, path)) = ctx.physics_materials.iter().find(|(f, _)| *f == friction) {
        return Ok(path.clone());
    }
    let scope = ctx.physics_scope()?;
    let name = ctx.names.get_name(&scope, "PhysicsMaterial", "PhysicsMaterial");
    let path = scope.child(&name);
    let prim = ctx.define(LayerToken::Physics, &path, "Material")?;
    prim.apply_api("PhysicsMaterialAPI");
    prim.apply_api("MjcMaterialAPI");
    let [sliding, torsional, rolling] = friction;
    author(prim, "physics:dynamicFriction", sliding as f32, 0.0);
    author(prim, "mjc:friction:torsional", torsional, TORSIONAL_FALLBACK);
    author(prim, "mjc:friction:rolling", rolling, ROLLING_FALLBACK);
    ctx.physics_materials.push((friction, path.clone()));
    Ok(path)
}
