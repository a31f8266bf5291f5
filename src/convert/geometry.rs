//! Geometry library and per-geom / per-site authoring.
//!
//! Mesh assets are authored once into `GeometryLibrary.usda` under a
//! `class` scope; geoms reference them. Primitive geoms are authored
//! directly as USD gprims. Physics data for geoms goes to the physics
//! layer as overrides at the same path.

use tracing::debug;

use super::author::{
    author, author_array, author_uniform, display_name, rgb, set_local_transform,
};
use super::context::{
    ConversionContext, LayerToken, MeshEntry, RefKind, GEOMETRY_LIBRARY, GEOMETRY_SCOPE,
};
use super::coords::{compose_frame, fromto_transform, frame_transform, local_transform};
use super::material;
use crate::mesh::{self, MeshData};
use crate::mjcf::{
    Compiler, Frame, Geom, GeomKind, Mesh, Orientation, Site, DEFAULT_RGBA, DEFAULT_SOLIMP,
    DEFAULT_SOLREF,
};
use crate::usd::{relative_asset_path, Attribute, Prim, PrimPath, Reference, Value};
use crate::util::{BBox3d, DQuat, DVec3, Error, Result, Transform};

/// Visual size of an infinite plane, in stage units.
const PLANE_VISUAL_EXTENT: f64 = 10.0;

/// Density MuJoCo assumes when a geom does not set one.
const DEFAULT_DENSITY: f64 = 1000.0;

/// Root of the geometry library.
pub fn library_root() -> PrimPath {
    PrimPath::root().child(GEOMETRY_SCOPE)
}

// === Mesh library ===

/// Asset frame of a mesh: vertices map as `R⁻¹(s∘v − p)`.
pub fn mesh_frame(mesh: &Mesh) -> Transform {
    let [w, x, y, z] = mesh.refquat;
    let q = DQuat::from_xyzw(x, y, z, w);
    let r = if q.length() > 0.0 { q.normalize() } else { DQuat::IDENTITY };
    let inv = r.inverse();
    Transform::new(-(inv * mesh.refpos), inv).with_scale(mesh.scale)
}

/// Decode and author every mesh asset once.
pub fn build_mesh_library(ctx: &mut ConversionContext) -> Result<()> {
    let model = ctx.model;
    if model.meshes.is_empty() {
        return Ok(());
    }
    let root = library_root();
    let mut lib = ctx.new_layer(GEOMETRY_LIBRARY.to_string());
    lib.default_prim = Some(GEOMETRY_SCOPE.to_string());
    lib.define_class(&root, "Scope")?;

    for mesh in &model.meshes {
        let source = mesh.name.as_deref();
        let Some(file) = model.mesh_path(mesh) else {
            ctx.warn_unsupported(format!("mesh '{}' has no file", source.unwrap_or("")));
            continue;
        };
        let data = mesh::load(&file, mesh.content_type.as_deref())?;
        let name = ctx.names.get_name(&root, source.unwrap_or(""), "Mesh");
        let path = root.child(&name);
        let frame = mesh_frame(mesh);

        let prim = lib.define_prim(&path, "Mesh")?;
        author_mesh_data(prim, &data);
        set_local_transform(prim, &frame);
        display_name(prim, source, &name);
        debug!("Library mesh {} <- {}", path, file.display());

        if let Some(source) = source {
            ctx.meshes
                .entry(source.to_string())
                .or_insert(MeshEntry { path, frame, bounds: data.bounds() });
        }
    }
    ctx.libraries.insert(LayerToken::Geometry, lib);
    Ok(())
}

fn author_mesh_data(prim: &mut Prim, data: &MeshData) {
    prim.set_attribute("points", Value::Point3fArray(data.points.clone()));
    prim.set_attribute("faceVertexCounts", Value::IntArray(data.face_vertex_counts.clone()));
    prim.set_attribute("faceVertexIndices", Value::IntArray(data.face_vertex_indices.clone()));
    if let Some(normals) = &data.normals {
        prim.put_attribute(
            Attribute::new("primvars:normals", Value::Normal3fArray(normals.values.clone()))
                .with_interpolation(normals.interpolation.token()),
        );
        prim.set_attribute("primvars:normals:indices", Value::IntArray(normals.indices.clone()));
    }
    if let Some(uvs) = &data.uvs {
        prim.put_attribute(
            Attribute::new("primvars:st", Value::TexCoord2fArray(uvs.values.clone()))
                .with_interpolation(uvs.interpolation.token()),
        );
        prim.set_attribute("primvars:st:indices", Value::IntArray(uvs.indices.clone()));
    }
    let bounds = data.bounds();
    if !bounds.is_empty() {
        prim.set_attribute("extent", Value::Float3Array(bounds.as_f32().to_vec()));
    }
    prim.set_uniform("subdivisionScheme", "none");
}

// === Shapes ===

/// Placement and size of one geom or site.
struct Shape<'s> {
    kind: GeomKind,
    size: [f64; 3],
    pos: DVec3,
    orientation: Option<&'s Orientation>,
    frames: &'s [Frame],
    fromto: Option<&'s [f64; 6]>,
    mesh: Option<&'s str>,
}

impl<'s> Shape<'s> {
    fn of_geom(g: &'s Geom) -> Self {
        Self {
            kind: g.kind,
            size: g.size,
            pos: g.pos,
            orientation: g.orientation.as_ref(),
            frames: &g.frames,
            fromto: g.fromto.as_ref(),
            mesh: g.mesh.as_deref(),
        }
    }

    fn of_site(s: &'s Site) -> Self {
        Self {
            kind: s.kind,
            size: s.size,
            pos: s.pos,
            orientation: s.orientation.as_ref(),
            frames: &s.frames,
            fromto: s.fromto.as_ref(),
            mesh: None,
        }
    }

    /// Rigid placement in the parent body frame plus the fromto length.
    fn placement(&self, compiler: &Compiler) -> (Transform, Option<f64>) {
        let outer = local_transform(DVec3::ZERO, None, self.frames, compiler);
        let (own, length) = match self.fromto {
            Some(ft) => {
                let (xf, len) = fromto_transform(ft);
                (xf, Some(len))
            }
            None => (frame_transform(self.pos, self.orientation, compiler), None),
        };
        (compose_frame(&outer, &own, false), length)
    }
}

/// USD type authored for a geom kind; `None` when unsupported.
fn gprim_type(kind: GeomKind) -> Option<&'static str> {
    match kind {
        GeomKind::Plane => Some("Plane"),
        GeomKind::Sphere => Some("Sphere"),
        GeomKind::Box => Some("Cube"),
        GeomKind::Cylinder => Some("Cylinder"),
        GeomKind::Capsule => Some("Capsule"),
        GeomKind::Mesh => Some("Mesh"),
        GeomKind::Ellipsoid | GeomKind::HField | GeomKind::Sdf => None,
    }
}

/// Author the gprim at `path` in the geometry layer. Returns the authored
/// local transform (with scale) and bounds in the prim's own space.
fn author_shape(ctx: &mut ConversionContext, path: &PrimPath, shape: &Shape) -> Result<(Transform, BBox3d)> {
    let Some(type_name) = gprim_type(shape.kind) else {
        return Err(Error::integrity(format!("no gprim type for {:?}", shape.kind)));
    };
    let (mut xf, length) = shape.placement(&ctx.model.compiler);
    let mut reference = None;
    let size = shape.size;
    let mut attrs: Vec<(&str, f64, f64)> = Vec::new();

    let bounds = match shape.kind {
        GeomKind::Plane => {
            let extent = |half: f64| if half > 0.0 { 2.0 * half } else { PLANE_VISUAL_EXTENT };
            let (width, len) = (extent(size[0]), extent(size[1]));
            attrs.push(("width", width, 2.0));
            attrs.push(("length", len, 2.0));
            BBox3d::symmetric(DVec3::new(width / 2.0, len / 2.0, 0.0))
        }
        GeomKind::Sphere => {
            attrs.push(("radius", size[0], 1.0));
            BBox3d::symmetric(DVec3::splat(size[0]))
        }
        GeomKind::Box => {
            let half = match length {
                Some(len) => DVec3::new(size[0], size[0], len / 2.0),
                None => DVec3::from_array(size),
            };
            xf = xf.with_scale(half);
            BBox3d::symmetric(DVec3::ONE)
        }
        GeomKind::Cylinder | GeomKind::Capsule => {
            let radius = size[0];
            let height = length.unwrap_or(2.0 * size[1]);
            let (radius_default, height_default, cap) = if shape.kind == GeomKind::Capsule {
                (0.5, 1.0, radius)
            } else {
                (1.0, 2.0, 0.0)
            };
            attrs.push(("radius", radius, radius_default));
            attrs.push(("height", height, height_default));
            BBox3d::symmetric(DVec3::new(radius, radius, height / 2.0 + cap))
        }
        GeomKind::Mesh => {
            let Some(mesh_name) = shape.mesh else {
                return Err(Error::integrity(format!("mesh geom {path} names no mesh")));
            };
            let entry = ctx
                .meshes
                .get(mesh_name)
                .cloned()
                .ok_or_else(|| Error::integrity(format!("mesh '{mesh_name}' missing from the geometry library")))?;
            xf = compose_frame(&xf, &entry.frame, true);
            reference = Some(entry.path);
            entry.bounds
        }
        GeomKind::Ellipsoid | GeomKind::HField | GeomKind::Sdf => BBox3d::EMPTY,
    };

    let geometry_id = LayerToken::Geometry.identifier(&ctx.asset_name);
    let prim = ctx.define(LayerToken::Geometry, path, type_name)?;
    if let Some(lib_path) = reference {
        prim.add_reference(Reference::new(relative_asset_path(&geometry_id, GEOMETRY_LIBRARY), Some(lib_path)));
    }
    set_local_transform(prim, &xf);
    for (name, value, default) in attrs {
        author(prim, name, value, default);
    }
    Ok((xf, bounds))
}

fn author_display_color(prim: &mut Prim, rgba: [f64; 4], default: [f64; 4]) {
    if rgb(rgba) != rgb(default) {
        prim.put_attribute(
            Attribute::new("primvars:displayColor", Value::Color3fArray(vec![rgb(rgba)]))
                .with_interpolation("constant"),
        );
    }
    if rgba[3] != default[3] {
        prim.put_attribute(
            Attribute::new("primvars:displayOpacity", Value::FloatArray(vec![rgba[3] as f32]))
                .with_interpolation("constant"),
        );
    }
}

fn accumulate_extent(ctx: &mut ConversionContext, parent_world: &Transform, xf: &Transform, bounds: &BBox3d, guide: bool) {
    if bounds.is_empty() {
        return;
    }
    let world = parent_world.to_affine() * xf.to_affine();
    let bb = bounds.transformed(&world);
    if guide {
        ctx.extents.guide.expand_by_box(&bb);
    } else {
        ctx.extents.default.expand_by_box(&bb);
    }
}

fn is_visible_group(group: i32) -> bool {
    (0..=2).contains(&group)
}

// === Geoms ===

/// Convert one geom under `parent`. Unsupported kinds warn and return `None`.
pub fn convert_geom(
    ctx: &mut ConversionContext,
    parent: &PrimPath,
    parent_world: &Transform,
    geom: &Geom,
) -> Result<Option<PrimPath>> {
    if gprim_type(geom.kind).is_none() {
        ctx.warn_unsupported(format!(
            "{} geom '{}' is not converted",
            geom.kind.label().to_lowercase(),
            geom.name.as_deref().unwrap_or("")
        ));
        return Ok(None);
    }
    if let Some(mesh) = geom.mesh.as_deref().filter(|_| geom.kind != GeomKind::Mesh) {
        ctx.warn_unsupported(format!(
            "fitting {} geom '{}' to mesh '{mesh}'; authored with its own size",
            geom.kind.label().to_lowercase(),
            geom.name.as_deref().unwrap_or("")
        ));
    }
    let fallback = match (geom.kind, geom.mesh.as_deref()) {
        (GeomKind::Mesh, Some(mesh)) => mesh,
        (kind, _) => kind.label(),
    };
    let source = geom.name.as_deref();
    let name = ctx.names.get_name(parent, source.unwrap_or(""), fallback);
    let path = parent.child(&name);
    let shape = Shape::of_geom(geom);
    let (xf, bounds) = author_shape(ctx, &path, &shape)?;

    let guide = !is_visible_group(geom.group);
    let default_rgba = ctx.model.default_rgba;
    let prim = ctx.define(LayerToken::Geometry, &path, "")?;
    display_name(prim, source, &name);
    if !prim.references.is_empty() && prim.display_name().is_none() {
        prim.block_display_name();
    }
    if guide {
        author_uniform(prim, "purpose", "guide", "default");
    }
    if geom.material.is_none() {
        author_display_color(prim, geom.rgba, default_rgba);
    }

    if let Some(material) = geom.material.as_deref() {
        material::bind_visual(ctx, &path, material)?;
    }
    author_geom_physics(ctx, &path, geom)?;
    accumulate_extent(ctx, parent_world, &xf, &bounds, guide);
    ctx.register(RefKind::Geoms, source, &path);
    Ok(Some(path))
}

fn author_geom_physics(ctx: &mut ConversionContext, path: &PrimPath, geom: &Geom) -> Result<()> {
    let collidable = geom.is_collidable();
    let has_mass = geom.mass.is_some() || geom.density != DEFAULT_DENSITY;
    if !collidable && !has_mass {
        return Ok(());
    }
    let physics_material = if collidable {
        Some(material::physics_material(ctx, geom.friction)?)
    } else {
        None
    };
    let prim = ctx.overlay(LayerToken::Physics, path)?;
    if let Some(material) = physics_material {
        prim.apply_api("PhysicsCollisionAPI");
        if geom.kind == GeomKind::Mesh {
            prim.apply_api("PhysicsMeshCollisionAPI");
            prim.set_uniform("physics:approximation", "convexHull");
        }
        prim.apply_api("MjcCollisionAPI");
        author(prim, "mjc:condim", geom.condim, 3);
        author(prim, "mjc:priority", geom.priority, 0);
        author(prim, "mjc:solmix", geom.solmix, 1.0);
        author_array(prim, "mjc:solref", &geom.solref, &DEFAULT_SOLREF);
        author_array(prim, "mjc:solimp", &geom.solimp, &DEFAULT_SOLIMP);
        author(prim, "mjc:margin", geom.margin, 0.0);
        author(prim, "mjc:gap", geom.gap, 0.0);
        prim.apply_api("MaterialBindingAPI");
        prim.set_relationship("material:binding:physics", vec![material]);
    }
    if has_mass {
        prim.apply_api("PhysicsMassAPI");
        match geom.mass {
            Some(mass) => {
                prim.set_attribute("physics:mass", mass as f32);
            }
            None => {
                author(prim, "physics:density", geom.density as f32, 0.0);
            }
        }
    }
    Ok(())
}

// === Sites ===

/// Convert one site under `parent` as a guide gprim.
pub fn convert_site(
    ctx: &mut ConversionContext,
    parent: &PrimPath,
    parent_world: &Transform,
    site: &Site,
) -> Result<Option<PrimPath>> {
    let supported = matches!(
        site.kind,
        GeomKind::Sphere | GeomKind::Box | GeomKind::Capsule | GeomKind::Cylinder
    );
    if !supported {
        ctx.warn_unsupported(format!(
            "{} site '{}' is not converted",
            site.kind.label().to_lowercase(),
            site.name.as_deref().unwrap_or("")
        ));
        return Ok(None);
    }
    let source = site.name.as_deref();
    let name = ctx.names.get_name(parent, source.unwrap_or(""), "Site");
    let path = parent.child(&name);
    let (xf, bounds) = author_shape(ctx, &path, &Shape::of_site(site))?;

    let prim = ctx.define(LayerToken::Geometry, &path, "")?;
    display_name(prim, source, &name);
    prim.set_uniform("purpose", "guide");
    if site.material.is_none() {
        author_display_color(prim, site.rgba, DEFAULT_RGBA);
    }
    if let Some(material) = site.material.as_deref() {
        material::bind_visual(ctx, &path, material)?;
    }

    let rigid = Transform::new(xf.translation, xf.rotation);
    ctx.world.insert(path.clone(), parent_world.mul_rigid(&rigid));
    accumulate_extent(ctx, parent_world, &xf, &bounds, true);
    ctx.register(RefKind::Sites, source, &path);
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;
    use crate::convert::Warning;
    use crate::mjcf::{parse_str, Model};

    fn context<'a>(model: &'a Model, options: &'a ConvertOptions) -> ConversionContext<'a> {
        let mut ctx = ConversionContext::new(model, options);
        ctx.add_content_layer(LayerToken::Geometry);
        ctx.add_content_layer(LayerToken::Physics);
        ctx
    }

    fn geom(xml: &str) -> Geom {
        let doc = format!("<mujoco><worldbody>{xml}</worldbody></mujoco>");
        parse_str(&doc, "").unwrap().worldbody.geoms.remove(0)
    }

    #[test]
    fn test_mesh_frame_inverts_reference_pose() {
        let mesh = Mesh {
            refpos: DVec3::new(1.0, 0.0, 0.0),
            refquat: [0.0, 0.0, 0.0, 1.0],
            scale: DVec3::splat(2.0),
            ..Default::default()
        };
        let frame = mesh_frame(&mesh);
        let v = DVec3::new(1.0, 1.0, 0.0);
        let mapped = frame.to_affine().transform_point3(v);
        let expected = DQuat::from_rotation_z(std::f64::consts::PI).inverse() * (v * 2.0 - mesh.refpos);
        assert!((mapped - expected).length() < 1e-9);
    }

    #[test]
    fn test_box_fromto_and_infinite_plane() {
        let model = Model::default();
        let options = ConvertOptions::default();
        let mut ctx = context(&model, &options);
        let scope = ctx.geometry_scope();

        let b = geom(r#"<geom type="box" size="0.1" fromto="0 0 0 0 0 1"/>"#);
        let path = convert_geom(&mut ctx, &scope, &Transform::IDENTITY, &b).unwrap().unwrap();
        assert_eq!(path.name(), "Box");
        let layer = ctx.layer(LayerToken::Geometry).unwrap();
        let prim = layer.prim(&path).unwrap();
        assert_eq!(prim.type_name.as_deref(), Some("Cube"));
        let scale = prim.value("xformOp:scale").and_then(Value::as_vec3).unwrap();
        assert!((scale - DVec3::new(0.1, 0.1, 0.5)).length() < 1e-6);
        assert!(!prim.has_property("size"));

        let plane = geom(r#"<geom type="plane" size="0 0 1" contype="0" conaffinity="0"/>"#);
        let path = convert_geom(&mut ctx, &scope, &Transform::IDENTITY, &plane).unwrap().unwrap();
        let prim = ctx.layer(LayerToken::Geometry).unwrap().prim(&path).unwrap();
        assert_eq!(prim.value("width"), Some(&Value::Double(10.0)));
        assert!(ctx.layer(LayerToken::Physics).unwrap().prim(&path).is_none());
    }

    #[test]
    fn test_unsupported_kind_warns_without_node() {
        let model = Model::default();
        let options = ConvertOptions::default();
        let mut ctx = context(&model, &options);
        let scope = ctx.geometry_scope();
        let e = geom(r#"<geom name="egg" type="ellipsoid" size="1 2 3"/>"#);
        assert!(convert_geom(&mut ctx, &scope, &Transform::IDENTITY, &e).unwrap().is_none());
        assert_eq!(ctx.warnings.len(), 1);
        assert!(!ctx.names.is_reserved(&scope, "egg"));
    }

    #[test]
    fn test_group_and_color() {
        let model = parse_str("<mujoco/>", "").unwrap();
        let options = ConvertOptions::default();
        let mut ctx = context(&model, &options);
        let scope = ctx.geometry_scope();
        let g = geom(r#"<geom name="hidden part" size="0.2" group="3" rgba="1 0 0 0.5" contype="0" conaffinity="0"/>"#);
        let path = convert_geom(&mut ctx, &scope, &Transform::IDENTITY, &g).unwrap().unwrap();
        assert_eq!(path.name(), "tn__hidden_20_part");
        let prim = ctx.layer(LayerToken::Geometry).unwrap().prim(&path).unwrap();
        assert_eq!(prim.display_name(), Some("hidden part"));
        assert_eq!(prim.value("purpose"), Some(&Value::token("guide")));
        assert!(prim.has_property("primvars:displayColor"));
        assert!(prim.has_property("primvars:displayOpacity"));
        assert!(ctx.extents.default.is_empty());
        assert!(!ctx.extents.guide.is_empty());
    }

    #[test]
    fn test_primitive_with_mesh_warns_about_fitting() {
        let model = Model::default();
        let options = ConvertOptions::default();
        let mut ctx = context(&model, &options);
        let scope = ctx.geometry_scope();
        let g = geom(r#"<geom name="hull" type="box" mesh="cube" size="0.1 0.2 0.3"/>"#);
        let path = convert_geom(&mut ctx, &scope, &Transform::IDENTITY, &g).unwrap().unwrap();
        assert_eq!(ctx.warnings.len(), 1);
        assert!(matches!(&ctx.warnings[0], Warning::UnsupportedFeature(msg) if msg.contains("fitting")));
        let prim = ctx.layer(LayerToken::Geometry).unwrap().prim(&path).unwrap();
        assert_eq!(prim.type_name.as_deref(), Some("Cube"));
        assert!(prim.references.is_empty());
    }

    #[test]
    fn test_site_records_world_transform() {
        let model = Model::default();
        let options = ConvertOptions::default();
        let mut ctx = context(&model, &options);
        let scope = ctx.geometry_scope();
        let site = Site { name: Some("tip".into()), pos: DVec3::new(0.0, 0.0, 1.0), ..Default::default() };
        let parent = Transform::new(DVec3::X, DQuat::IDENTITY);
        let path = convert_site(&mut ctx, &scope, &parent, &site).unwrap().unwrap();
        assert_eq!(ctx.world_transform(&path).translation, DVec3::new(1.0, 0.0, 1.0));
        assert_eq!(ctx.lookup(RefKind::Sites, "tip"), Some(path));
    }
}
