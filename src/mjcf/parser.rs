//! MJCF interpretation: default classes, compiler/option blocks, assets,
//! the body tree, tendons, equalities, actuators and contact excludes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::model::*;
use super::xml::{parse_document, Element};
use crate::util::{DVec3, Error, Result};

/// Read and parse an MJCF file.
pub fn load(path: impl AsRef<Path>) -> Result<Model> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let model = parse_str(&text, dir)?;
    debug!("Parsed {} from {}", model.name, path.display());
    Ok(model)
}

/// Parse MJCF text. `source_dir` anchors relative asset paths.
pub fn parse_str(xml: &str, source_dir: impl Into<PathBuf>) -> Result<Model> {
    let root = parse_document(xml)?;
    if root.name != "mujoco" {
        return Err(Error::parse(format!("expected <mujoco> root element, found <{}>", root.name)));
    }
    Parser::default().parse(&root, source_dir.into())
}

/// Attribute set after default-class resolution.
struct Attrs {
    element: String,
    values: Vec<(String, String)>,
}

impl Attrs {
    /// The element's own attributes, no class resolution.
    fn own(el: &Element) -> Self {
        Self { element: el.name.clone(), values: el.attrs.clone() }
    }

    fn overlay(&mut self, attrs: &[(String, String)]) {
        for (k, v) in attrs {
            if k == "class" || k == "childclass" {
                continue;
            }
            match self.values.iter_mut().find(|(ek, _)| ek == k) {
                Some(slot) => slot.1 = v.clone(),
                None => self.values.push((k.clone(), v.clone())),
            }
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    fn invalid(&self, key: &str, value: &str, msg: &str) -> Error {
        Error::parse(format!("<{}> {}=\"{}\": {}", self.element, key, value, msg))
    }

    fn floats(&self, key: &str) -> Result<Option<Vec<f64>>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.split_whitespace()
            .map(|t| t.parse::<f64>().map_err(|_| self.invalid(key, raw, "expected numbers")))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn f64_opt(&self, key: &str) -> Result<Option<f64>> {
        match self.floats(key)? {
            None => Ok(None),
            Some(v) if v.len() == 1 => Ok(Some(v[0])),
            Some(_) => Err(self.invalid(key, self.get(key).unwrap_or(""), "expected one number")),
        }
    }

    fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.f64_opt(key)?.unwrap_or(default))
    }

    fn i32_or(&self, key: &str, default: i32) -> Result<i32> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| self.invalid(key, raw, "expected an integer")),
        }
    }

    fn ints(&self, key: &str) -> Result<Option<Vec<i32>>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.split_whitespace()
            .map(|t| t.parse::<i32>().map_err(|_| self.invalid(key, raw, "expected integers")))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Up to `N` values; missing trailing values keep their defaults.
    fn array_or<const N: usize>(&self, key: &str, default: [f64; N]) -> Result<[f64; N]> {
        let Some(values) = self.floats(key)? else {
            return Ok(default);
        };
        if values.is_empty() || values.len() > N {
            return Err(self.invalid(key, self.get(key).unwrap_or(""), &format!("expected up to {N} numbers")));
        }
        let mut out = default;
        out[..values.len()].copy_from_slice(&values);
        Ok(out)
    }

    /// Exactly `N` values.
    fn exact<const N: usize>(&self, key: &str) -> Result<Option<[f64; N]>> {
        let Some(values) = self.floats(key)? else {
            return Ok(None);
        };
        let arr: [f64; N] = values
            .try_into()
            .map_err(|_| self.invalid(key, self.get(key).unwrap_or(""), &format!("expected {N} numbers")))?;
        Ok(Some(arr))
    }

    fn vec3_or(&self, key: &str, default: DVec3) -> Result<DVec3> {
        Ok(self.exact::<3>(key)?.map(DVec3::from_array).unwrap_or(default))
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(raw) => Err(self.invalid(key, raw, "expected true or false")),
        }
    }

    fn tristate(&self, key: &str) -> Result<TriState> {
        match self.get(key) {
            None | Some("auto") => Ok(TriState::Auto),
            Some("true") => Ok(TriState::True),
            Some("false") => Ok(TriState::False),
            Some(raw) => Err(self.invalid(key, raw, "expected true, false or auto")),
        }
    }

    fn orientation(&self) -> Result<Option<Orientation>> {
        if let Some(q) = self.exact::<4>("quat")? {
            return Ok(Some(Orientation::Quat(q)));
        }
        if let Some(a) = self.exact::<4>("axisangle")? {
            return Ok(Some(Orientation::AxisAngle(a)));
        }
        if let Some(x) = self.exact::<6>("xyaxes")? {
            return Ok(Some(Orientation::XyAxes(x)));
        }
        if let Some(z) = self.exact::<3>("zaxis")? {
            return Ok(Some(Orientation::ZAxis(z)));
        }
        if let Some(e) = self.exact::<3>("euler")? {
            return Ok(Some(Orientation::Euler(e)));
        }
        Ok(None)
    }
}

struct DefaultClass {
    parent: Option<usize>,
    elements: HashMap<String, Vec<(String, String)>>,
}

#[derive(Default)]
struct Parser {
    classes: Vec<DefaultClass>,
    class_index: HashMap<String, usize>,
}

impl Parser {
    fn parse(&mut self, root: &Element, source_dir: PathBuf) -> Result<Model> {
        let mut model = Model {
            name: root.attr("model").unwrap_or("MuJoCo Model").to_string(),
            source_dir,
            ..Default::default()
        };

        for el in root.children_named("compiler") {
            parse_compiler(el, &mut model.compiler)?;
        }
        for el in root.children_named("default") {
            self.parse_default(el, None)?;
        }
        model.default_rgba = self.resolve_class("geom", "main")?.array_or("rgba", DEFAULT_RGBA)?;

        for child in &root.children {
            match child.name.as_str() {
                "compiler" | "default" => {}
                "option" => parse_option(child, &mut model.option)?,
                "asset" => self.parse_assets(child, &mut model)?,
                "worldbody" => {
                    let mut world = std::mem::take(&mut model.worldbody);
                    self.parse_body_contents(child, &mut world, None, &[])?;
                    model.worldbody = world;
                }
                "tendon" => self.parse_tendons(child, &mut model)?,
                "equality" => self.parse_equalities(child, &mut model)?,
                "actuator" => self.parse_actuators(child, &mut model)?,
                "contact" => parse_contact(child, &mut model)?,
                "include" | "extension" | "deformable" => {
                    warn!("Unsupported MJCF section <{}> ignored", child.name)
                }
                other => debug!("Skipping <{other}>"),
            }
        }
        Ok(model)
    }

    // === Default classes ===

    fn parse_default(&mut self, el: &Element, parent: Option<usize>) -> Result<()> {
        let name = match (el.attr("class"), parent) {
            (Some(name), _) => name.to_string(),
            (None, None) => "main".to_string(),
            (None, Some(_)) => return Err(Error::parse("nested <default> requires a class attribute")),
        };
        let mut elements: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for child in el.children.iter().filter(|c| c.name != "default") {
            let slot = elements.entry(child.name.clone()).or_default();
            slot.extend(child.attrs.iter().cloned());
        }
        let idx = self.classes.len();
        self.classes.push(DefaultClass { parent, elements });
        self.class_index.insert(name, idx);
        for nested in el.children_named("default") {
            self.parse_default(nested, Some(idx))?;
        }
        Ok(())
    }

    /// Attributes a class chain assigns to `tag`, root class first.
    fn resolve_class(&self, tag: &str, class: &str) -> Result<Attrs> {
        let mut attrs = Attrs { element: tag.to_string(), values: Vec::new() };
        let Some(&idx) = self.class_index.get(class) else {
            if class == "main" {
                return Ok(attrs);
            }
            return Err(Error::parse(format!("<{tag}> uses unknown default class '{class}'")));
        };
        let mut chain = vec![idx];
        let mut cur = idx;
        while let Some(parent) = self.classes[cur].parent {
            chain.push(parent);
            cur = parent;
        }
        for &c in chain.iter().rev() {
            if let Some(values) = self.classes[c].elements.get(tag) {
                attrs.overlay(values);
            }
        }
        Ok(attrs)
    }

    /// Class attributes overlaid with the element's own.
    fn resolve(&self, el: &Element, tag: &str, childclass: Option<&str>) -> Result<Attrs> {
        let class = el.attr("class").or(childclass).unwrap_or("main");
        let mut attrs = self.resolve_class(tag, class)?;
        attrs.overlay(&el.attrs);
        Ok(attrs)
    }

    // === Assets ===

    fn parse_assets(&self, el: &Element, model: &mut Model) -> Result<()> {
        for child in &el.children {
            match child.name.as_str() {
                "mesh" => {
                    let a = self.resolve(child, "mesh", None)?;
                    let file = a.string("file");
                    let name = a.string("name").or_else(|| {
                        file.as_deref()
                            .and_then(|f| Path::new(f).file_stem())
                            .map(|s| s.to_string_lossy().into_owned())
                    });
                    model.meshes.push(Mesh {
                        name,
                        file,
                        content_type: a.string("content_type"),
                        scale: a.vec3_or("scale", DVec3::ONE)?,
                        refpos: a.vec3_or("refpos", DVec3::ZERO)?,
                        refquat: a.exact::<4>("refquat")?.unwrap_or([1.0, 0.0, 0.0, 0.0]),
                    });
                }
                "material" => {
                    let a = self.resolve(child, "material", None)?;
                    model.materials.push(Material {
                        name: a.string("name"),
                        rgba: a.array_or("rgba", [1.0, 1.0, 1.0, 1.0])?,
                        emission: a.f64_or("emission", 0.0)?,
                        specular: a.f64_opt("specular")?,
                        shininess: a.f64_or("shininess", 0.5)?,
                        reflectance: a.f64_or("reflectance", 0.0)?,
                        metallic: a.f64_opt("metallic")?,
                        roughness: a.f64_opt("roughness")?,
                        texture: a.string("texture"),
                    });
                }
                "texture" => {
                    let a = self.resolve(child, "texture", None)?;
                    let file = a.string("file");
                    let name = a.string("name").or_else(|| {
                        file.as_deref()
                            .and_then(|f| Path::new(f).file_stem())
                            .map(|s| s.to_string_lossy().into_owned())
                    });
                    model.textures.push(Texture {
                        name,
                        kind: a.get("type").unwrap_or("cube").to_string(),
                        file,
                        builtin: a.string("builtin"),
                    });
                }
                other => debug!("Skipping asset <{other}>"),
            }
        }
        Ok(())
    }

    // === Body tree ===

    fn parse_body_contents(
        &self,
        el: &Element,
        body: &mut Body,
        childclass: Option<&str>,
        frames: &[Frame],
    ) -> Result<()> {
        for child in &el.children {
            match child.name.as_str() {
                "body" => body.children.push(self.parse_body(child, childclass, frames)?),
                "geom" => {
                    let mut geom = self.parse_geom(child, childclass)?;
                    geom.frames = frames.to_vec();
                    body.geoms.push(geom);
                }
                "site" => {
                    let mut site = self.parse_site(child, childclass)?;
                    site.frames = frames.to_vec();
                    body.sites.push(site);
                }
                "joint" => body.joints.push(self.parse_joint(child, childclass)?),
                "freejoint" => body.joints.push(Joint {
                    name: child.attr("name").map(str::to_string),
                    kind: JointKind::Free,
                    ..Default::default()
                }),
                "inertial" => body.inertial = Some(parse_inertial(child)?),
                "frame" => {
                    let a = Attrs::own(child);
                    let mut nested = frames.to_vec();
                    nested.push(Frame { pos: a.vec3_or("pos", DVec3::ZERO)?, orientation: a.orientation()? });
                    let cc = child.attr("childclass").or(childclass);
                    self.parse_body_contents(child, body, cc, &nested)?;
                }
                "composite" | "flexcomp" | "replicate" | "include" => {
                    warn!("Unsupported element <{}> ignored", child.name)
                }
                other => debug!("Skipping <{other}> in body"),
            }
        }
        Ok(())
    }

    fn parse_body(&self, el: &Element, childclass: Option<&str>, frames: &[Frame]) -> Result<Body> {
        let a = Attrs::own(el);
        let mut body = Body {
            name: a.string("name"),
            pos: a.vec3_or("pos", DVec3::ZERO)?,
            orientation: a.orientation()?,
            frames: frames.to_vec(),
            mocap: a.bool_or("mocap", false)?,
            gravcomp: a.f64_or("gravcomp", 0.0)?,
            ..Default::default()
        };
        let cc = el.attr("childclass").or(childclass);
        self.parse_body_contents(el, &mut body, cc, &[])?;
        Ok(body)
    }

    fn parse_joint(&self, el: &Element, childclass: Option<&str>) -> Result<Joint> {
        let a = self.resolve(el, "joint", childclass)?;
        let kind = match a.get("type").unwrap_or("hinge") {
            "hinge" => JointKind::Hinge,
            "slide" => JointKind::Slide,
            "ball" => JointKind::Ball,
            "free" => JointKind::Free,
            other => return Err(a.invalid("type", other, "unknown joint type")),
        };
        let d = Joint::default();
        let axis = a.vec3_or("axis", d.axis)?;
        if matches!(kind, JointKind::Hinge | JointKind::Slide) && axis.length() < 1e-10 {
            return Err(a.invalid("axis", a.get("axis").unwrap_or(""), "joint axis cannot be zero"));
        }
        Ok(Joint {
            name: a.string("name"),
            kind,
            pos: a.vec3_or("pos", d.pos)?,
            axis,
            range: a.array_or("range", d.range)?,
            limited: a.tristate("limited")?,
            group: a.i32_or("group", 0)?,
            damping: a.f64_or("damping", 0.0)?,
            stiffness: a.f64_or("stiffness", 0.0)?,
            armature: a.f64_or("armature", 0.0)?,
            frictionloss: a.f64_or("frictionloss", 0.0)?,
            margin: a.f64_or("margin", 0.0)?,
            ref_position: a.f64_or("ref", 0.0)?,
            springref: a.f64_or("springref", 0.0)?,
            solreflimit: a.array_or("solreflimit", DEFAULT_SOLREF)?,
            solimplimit: a.array_or("solimplimit", DEFAULT_SOLIMP)?,
            solreffriction: a.array_or("solreffriction", DEFAULT_SOLREF)?,
            solimpfriction: a.array_or("solimpfriction", DEFAULT_SOLIMP)?,
            springdamper: a.array_or("springdamper", [0.0, 0.0])?,
            actuatorfrclimited: a.tristate("actuatorfrclimited")?,
            actuatorfrcrange: a.array_or("actuatorfrcrange", [0.0, 0.0])?,
            actuatorgravcomp: a.bool_or("actuatorgravcomp", false)?,
        })
    }

    fn parse_geom(&self, el: &Element, childclass: Option<&str>) -> Result<Geom> {
        let a = self.resolve(el, "geom", childclass)?;
        let d = Geom::default();
        Ok(Geom {
            name: a.string("name"),
            kind: geom_kind(&a)?,
            size: a.array_or("size", d.size)?,
            pos: a.vec3_or("pos", DVec3::ZERO)?,
            orientation: a.orientation()?,
            frames: Vec::new(),
            fromto: a.exact::<6>("fromto")?,
            mesh: a.string("mesh"),
            material: a.string("material"),
            rgba: a.array_or("rgba", d.rgba)?,
            group: a.i32_or("group", 0)?,
            friction: a.array_or("friction", d.friction)?,
            contype: a.i32_or("contype", d.contype)?,
            conaffinity: a.i32_or("conaffinity", d.conaffinity)?,
            condim: a.i32_or("condim", d.condim)?,
            priority: a.i32_or("priority", 0)?,
            solmix: a.f64_or("solmix", d.solmix)?,
            solref: a.array_or("solref", d.solref)?,
            solimp: a.array_or("solimp", d.solimp)?,
            margin: a.f64_or("margin", 0.0)?,
            gap: a.f64_or("gap", 0.0)?,
            mass: a.f64_opt("mass")?,
            density: a.f64_or("density", d.density)?,
        })
    }

    fn parse_site(&self, el: &Element, childclass: Option<&str>) -> Result<Site> {
        let a = self.resolve(el, "site", childclass)?;
        let d = Site::default();
        Ok(Site {
            name: a.string("name"),
            kind: geom_kind(&a)?,
            size: a.array_or("size", d.size)?,
            pos: a.vec3_or("pos", DVec3::ZERO)?,
            orientation: a.orientation()?,
            frames: Vec::new(),
            fromto: a.exact::<6>("fromto")?,
            group: a.i32_or("group", 0)?,
            rgba: a.array_or("rgba", d.rgba)?,
            material: a.string("material"),
        })
    }

    // === Tendons, equalities, actuators ===

    fn parse_tendons(&self, el: &Element, model: &mut Model) -> Result<()> {
        for child in &el.children {
            let kind = match child.name.as_str() {
                "fixed" => TendonKind::Fixed,
                "spatial" => TendonKind::Spatial,
                other => {
                    debug!("Skipping tendon <{other}>");
                    continue;
                }
            };
            let a = self.resolve(child, "tendon", None)?;
            let mut tendon = Tendon::new(kind);
            tendon.name = a.string("name");
            tendon.stiffness = a.f64_or("stiffness", 0.0)?;
            tendon.springlength = match a.floats("springlength")?.as_deref() {
                None => [-1.0, -1.0],
                Some([v]) => [*v, *v],
                Some(_) => a.array_or("springlength", [-1.0, -1.0])?,
            };
            tendon.damping = a.f64_or("damping", 0.0)?;
            tendon.frictionloss = a.f64_or("frictionloss", 0.0)?;
            tendon.solreffriction = a.array_or("solreffriction", DEFAULT_SOLREF)?;
            tendon.solimpfriction = a.array_or("solimpfriction", DEFAULT_SOLIMP)?;
            tendon.armature = a.f64_or("armature", 0.0)?;
            tendon.limited = a.tristate("limited")?;
            tendon.actuatorfrclimited = a.tristate("actuatorfrclimited")?;
            tendon.range = a.array_or("range", [0.0, 0.0])?;
            tendon.actuatorfrcrange = a.array_or("actuatorfrcrange", [0.0, 0.0])?;
            tendon.margin = a.f64_or("margin", 0.0)?;
            tendon.solreflimit = a.array_or("solreflimit", DEFAULT_SOLREF)?;
            tendon.solimplimit = a.array_or("solimplimit", DEFAULT_SOLIMP)?;
            tendon.rgba = a.array_or("rgba", DEFAULT_RGBA)?;
            tendon.width = a.f64_or("width", 0.003)?;
            tendon.group = a.i32_or("group", 0)?;

            for wrap in &child.children {
                let w = Attrs::own(wrap);
                let required = |key: &str| {
                    w.string(key)
                        .ok_or_else(|| Error::parse(format!("tendon <{}> requires '{key}'", wrap.name)))
                };
                let entry = match (kind, wrap.name.as_str()) {
                    (TendonKind::Fixed, "joint") => TendonWrap::Joint {
                        joint: required("joint")?,
                        coef: w.f64_or("coef", 1.0)?,
                    },
                    (TendonKind::Spatial, "site") => TendonWrap::Site { site: required("site")? },
                    (TendonKind::Spatial, "geom") => TendonWrap::Geom {
                        geom: required("geom")?,
                        sidesite: w.string("sidesite"),
                    },
                    (TendonKind::Spatial, "pulley") => TendonWrap::Pulley { divisor: w.f64_or("divisor", 1.0)? },
                    (_, other) => {
                        return Err(Error::parse(format!("<{other}> is not valid inside <{}>", child.name)));
                    }
                };
                tendon.path.push(entry);
            }
            model.tendons.push(tendon);
        }
        Ok(())
    }

    fn parse_equalities(&self, el: &Element, model: &mut Model) -> Result<()> {
        for child in &el.children {
            let a = self.resolve(child, "equality", None)?;
            let (kind, obj1, obj2, on_sites) = match child.name.as_str() {
                "connect" | "weld" => {
                    let on_sites = a.get("site1").is_some();
                    let (k1, k2) = if on_sites { ("site1", "site2") } else { ("body1", "body2") };
                    let kind = if child.name == "connect" {
                        EqualityKind::Connect { anchor: a.vec3_or("anchor", DVec3::ZERO)? }
                    } else {
                        EqualityKind::Weld {
                            anchor: a.vec3_or("anchor", DVec3::ZERO)?,
                            relpose: a.exact::<7>("relpose")?.unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
                            torquescale: a.f64_or("torquescale", 1.0)?,
                        }
                    };
                    (kind, a.string(k1), a.string(k2), on_sites)
                }
                "joint" => (
                    EqualityKind::Joint {
                        polycoef: a.array_or("polycoef", [0.0, 1.0, 0.0, 0.0, 0.0])?,
                    },
                    a.string("joint1"),
                    a.string("joint2"),
                    false,
                ),
                "tendon" => (
                    EqualityKind::Unsupported("tendon".into()),
                    a.string("tendon1"),
                    a.string("tendon2"),
                    false,
                ),
                "flex" => (EqualityKind::Unsupported("flex".into()), a.string("flex"), None, false),
                other => {
                    debug!("Skipping equality <{other}>");
                    continue;
                }
            };
            let mut eq = Equality::new(kind);
            eq.name = a.string("name");
            eq.obj1 = obj1;
            eq.obj2 = obj2;
            eq.on_sites = on_sites;
            eq.active = a.bool_or("active", true)?;
            eq.solref = a.array_or("solref", DEFAULT_SOLREF)?;
            eq.solimp = a.array_or("solimp", DEFAULT_SOLIMP)?;
            model.equalities.push(eq);
        }
        Ok(())
    }

    fn parse_actuators(&self, el: &Element, model: &mut Model) -> Result<()> {
        for child in &el.children {
            let tag = child.name.as_str();
            if !ACTUATOR_TAGS.contains(&tag) {
                warn!("Unsupported actuator <{tag}> ignored");
                continue;
            }
            let a = self.resolve(child, tag, None)?;
            let mut act = Actuator {
                name: a.string("name"),
                shortcut: tag.to_string(),
                transmission: transmission(&a),
                refsite: a.string("refsite"),
                gear: a.array_or("gear", DEFAULT_GEAR)?,
                group: a.i32_or("group", 0)?,
                ctrllimited: a.tristate("ctrllimited")?,
                ctrlrange: a.array_or("ctrlrange", [0.0, 0.0])?,
                forcelimited: a.tristate("forcelimited")?,
                forcerange: a.array_or("forcerange", [0.0, 0.0])?,
                actlimited: a.tristate("actlimited")?,
                actrange: a.array_or("actrange", [0.0, 0.0])?,
                lengthrange: a.array_or("lengthrange", [0.0, 0.0])?,
                actdim: a.i32_or("actdim", -1)?,
                actearly: a.bool_or("actearly", false)?,
                cranklength: a.f64_or("cranklength", 0.0)?,
                ..Default::default()
            };
            expand_shortcut(tag, &a, &mut act)?;
            model.actuators.push(act);
        }
        Ok(())
    }
}

const ACTUATOR_TAGS: [&str; 9] = [
    "general",
    "motor",
    "position",
    "velocity",
    "intvelocity",
    "damper",
    "cylinder",
    "muscle",
    "adhesion",
];

fn transmission(a: &Attrs) -> Option<Transmission> {
    if let Some(j) = a.string("joint") {
        Some(Transmission::Joint(j))
    } else if let Some(j) = a.string("jointinparent") {
        Some(Transmission::JointInParent(j))
    } else if let Some(t) = a.string("tendon") {
        Some(Transmission::Tendon(t))
    } else if let Some(c) = a.string("cranksite") {
        Some(Transmission::SliderCrank { cranksite: c, slidersite: a.string("slidersite") })
    } else if let Some(s) = a.string("site") {
        Some(Transmission::Site(s))
    } else {
        a.string("body").map(Transmission::Body)
    }
}

/// Rewrite a shortcut actuator into its general dyn/gain/bias form.
fn expand_shortcut(tag: &str, a: &Attrs, act: &mut Actuator) -> Result<()> {
    match tag {
        "general" => {
            act.dyntype = match a.get("dyntype").unwrap_or("none") {
                "none" => DynType::None,
                "integrator" => DynType::Integrator,
                "filter" => DynType::Filter,
                "filterexact" => DynType::FilterExact,
                "muscle" => DynType::Muscle,
                "user" => DynType::User,
                other => return Err(a.invalid("dyntype", other, "unknown dynamics type")),
            };
            act.gaintype = match a.get("gaintype").unwrap_or("fixed") {
                "fixed" => GainType::Fixed,
                "affine" => GainType::Affine,
                "muscle" => GainType::Muscle,
                "user" => GainType::User,
                other => return Err(a.invalid("gaintype", other, "unknown gain type")),
            };
            act.biastype = match a.get("biastype").unwrap_or("none") {
                "none" => BiasType::None,
                "affine" => BiasType::Affine,
                "muscle" => BiasType::Muscle,
                "user" => BiasType::User,
                other => return Err(a.invalid("biastype", other, "unknown bias type")),
            };
            act.dynprm = a.array_or("dynprm", DEFAULT_DYNPRM)?;
            act.gainprm = a.array_or("gainprm", DEFAULT_GAINPRM)?;
            act.biasprm = a.array_or("biasprm", DEFAULT_BIASPRM)?;
        }
        "motor" => {}
        "position" => {
            let kp = a.f64_or("kp", 1.0)?;
            let kv = a.f64_or("kv", 0.0)?;
            let dampratio = a.f64_or("dampratio", 0.0)?;
            let timeconst = a.f64_or("timeconst", 0.0)?;
            act.gainprm[0] = kp;
            act.biastype = BiasType::Affine;
            act.biasprm[1] = -kp;
            act.biasprm[2] = if dampratio > 0.0 { dampratio } else { -kv };
            if timeconst > 0.0 {
                act.dyntype = DynType::FilterExact;
                act.dynprm[0] = timeconst;
            }
            act.inheritrange = a.f64_or("inheritrange", 0.0)?;
        }
        "velocity" => {
            let kv = a.f64_or("kv", 1.0)?;
            act.gainprm[0] = kv;
            act.biastype = BiasType::Affine;
            act.biasprm[2] = -kv;
        }
        "intvelocity" => {
            let kp = a.f64_or("kp", 1.0)?;
            let kv = a.f64_or("kv", 0.0)?;
            let dampratio = a.f64_or("dampratio", 0.0)?;
            act.dyntype = DynType::Integrator;
            act.gainprm[0] = kp;
            act.biastype = BiasType::Affine;
            act.biasprm[1] = -kp;
            act.biasprm[2] = if dampratio > 0.0 { dampratio } else { -kv };
            act.actlimited = TriState::True;
            act.inheritrange = a.f64_or("inheritrange", 0.0)?;
        }
        "damper" => {
            let kv = a.f64_or("kv", 0.0)?;
            act.gaintype = GainType::Affine;
            act.gainprm = [0.0; 10];
            act.gainprm[2] = -kv;
            act.ctrllimited = TriState::True;
        }
        "cylinder" => {
            let timeconst = a.f64_or("timeconst", 1.0)?;
            let area = match a.f64_opt("diameter")? {
                Some(d) => std::f64::consts::PI / 4.0 * d * d,
                None => a.f64_or("area", 1.0)?,
            };
            let bias = a.array_or("bias", [0.0; 3])?;
            act.dyntype = DynType::Filter;
            act.dynprm[0] = timeconst;
            act.gainprm[0] = area;
            act.biastype = BiasType::Affine;
            act.biasprm[..3].copy_from_slice(&bias);
        }
        "muscle" => {
            let timeconst = a.array_or("timeconst", [0.01, 0.04])?;
            let range = a.array_or("range", [0.75, 1.05])?;
            let prm = [
                range[0],
                range[1],
                a.f64_or("force", -1.0)?,
                a.f64_or("scale", 200.0)?,
                a.f64_or("lmin", 0.5)?,
                a.f64_or("lmax", 1.6)?,
                a.f64_or("vmax", 1.5)?,
                a.f64_or("fpmax", 1.3)?,
                a.f64_or("fvmax", 1.2)?,
                0.0,
            ];
            act.dyntype = DynType::Muscle;
            act.dynprm = [0.0; 10];
            act.dynprm[0] = timeconst[0];
            act.dynprm[1] = timeconst[1];
            act.dynprm[2] = a.f64_or("tausmooth", 0.0)?;
            act.gaintype = GainType::Muscle;
            act.gainprm = prm;
            act.biastype = BiasType::Muscle;
            act.biasprm = prm;
        }
        "adhesion" => {
            act.gainprm[0] = a.f64_or("gain", 1.0)?;
            act.ctrllimited = TriState::True;
        }
        _ => {}
    }
    Ok(())
}

fn geom_kind(a: &Attrs) -> Result<GeomKind> {
    Ok(match a.get("type").unwrap_or("sphere") {
        "plane" => GeomKind::Plane,
        "hfield" => GeomKind::HField,
        "sphere" => GeomKind::Sphere,
        "capsule" => GeomKind::Capsule,
        "ellipsoid" => GeomKind::Ellipsoid,
        "cylinder" => GeomKind::Cylinder,
        "box" => GeomKind::Box,
        "mesh" => GeomKind::Mesh,
        "sdf" => GeomKind::Sdf,
        other => return Err(a.invalid("type", other, "unknown geom type")),
    })
}

fn parse_inertial(el: &Element) -> Result<Inertial> {
    let a = Attrs::own(el);
    Ok(Inertial {
        pos: a.vec3_or("pos", DVec3::ZERO)?,
        orientation: a.orientation()?,
        mass: a.f64_or("mass", 0.0)?,
        diaginertia: a.exact::<3>("diaginertia")?.map(DVec3::from_array),
        fullinertia: a.exact::<6>("fullinertia")?,
    })
}

fn parse_compiler(el: &Element, c: &mut Compiler) -> Result<()> {
    let a = Attrs::own(el);
    if let Some(angle) = a.get("angle") {
        c.angle = match angle {
            "degree" => AngleUnit::Degree,
            "radian" => AngleUnit::Radian,
            other => return Err(a.invalid("angle", other, "expected degree or radian")),
        };
    }
    if let Some(seq) = a.get("eulerseq") {
        let valid = seq.len() == 3 && seq.chars().all(|ch| "xyzXYZ".contains(ch));
        if !valid {
            return Err(a.invalid("eulerseq", seq, "expected three of xyzXYZ"));
        }
        c.eulerseq = seq.to_string();
    }
    c.meshdir = a.string("meshdir").or(c.meshdir.take());
    c.texturedir = a.string("texturedir").or(c.texturedir.take());
    c.assetdir = a.string("assetdir").or(c.assetdir.take());
    c.autolimits = a.bool_or("autolimits", c.autolimits)?;
    c.align_free = a.bool_or("alignfree", c.align_free)?;
    c.balance_inertia = a.bool_or("balanceinertia", c.balance_inertia)?;
    c.bound_inertia = a.f64_or("boundinertia", c.bound_inertia)?;
    c.bound_mass = a.f64_or("boundmass", c.bound_mass)?;
    c.fit_aabb = a.bool_or("fitaabb", c.fit_aabb)?;
    c.fuse_static = a.bool_or("fusestatic", c.fuse_static)?;
    if a.get("inertiafromgeom").is_some() {
        c.inertia_from_geom = a.tristate("inertiafromgeom")?;
    }
    if let Some(range) = a.ints("inertiagrouprange")? {
        let [lo, hi] = range.as_slice() else {
            return Err(a.invalid("inertiagrouprange", a.get("inertiagrouprange").unwrap_or(""), "expected two integers"));
        };
        c.inertia_group_range = [*lo, *hi];
    }
    c.save_inertial = a.bool_or("saveinertial", c.save_inertial)?;
    c.set_total_mass = a.f64_or("settotalmass", c.set_total_mass)?;
    c.use_thread = a.bool_or("usethread", c.use_thread)?;
    Ok(())
}

fn parse_option(el: &Element, o: &mut SimOption) -> Result<()> {
    let a = Attrs::own(el);
    o.timestep = a.f64_or("timestep", o.timestep)?;
    if o.timestep.is_nan() || o.timestep <= 0.0 {
        return Err(a.invalid("timestep", a.get("timestep").unwrap_or(""), "must be positive"));
    }
    o.gravity = a.vec3_or("gravity", o.gravity)?;
    o.wind = a.vec3_or("wind", o.wind)?;
    o.magnetic = a.vec3_or("magnetic", o.magnetic)?;
    o.density = a.f64_or("density", o.density)?;
    o.viscosity = a.f64_or("viscosity", o.viscosity)?;
    o.impratio = a.f64_or("impratio", o.impratio)?;
    o.o_margin = a.f64_or("o_margin", o.o_margin)?;
    o.o_solref = a.array_or("o_solref", o.o_solref)?;
    o.o_solimp = a.array_or("o_solimp", o.o_solimp)?;
    o.o_friction = a.array_or("o_friction", o.o_friction)?;
    let token = |key: &str, current: &str, allowed: &[&str]| -> Result<String> {
        match a.get(key) {
            None => Ok(current.to_string()),
            Some(raw) => {
                let lower = raw.to_ascii_lowercase();
                if allowed.contains(&lower.as_str()) {
                    Ok(lower)
                } else {
                    Err(a.invalid(key, raw, &format!("expected one of {}", allowed.join(", "))))
                }
            }
        }
    };
    o.integrator = token("integrator", &o.integrator, &["euler", "rk4", "implicit", "implicitfast"])?;
    o.cone = token("cone", &o.cone, &["pyramidal", "elliptic"])?;
    o.jacobian = token("jacobian", &o.jacobian, &["dense", "sparse", "auto"])?;
    o.solver = token("solver", &o.solver, &["pgs", "cg", "newton"])?;
    o.iterations = a.i32_or("iterations", o.iterations)?;
    o.tolerance = a.f64_or("tolerance", o.tolerance)?;
    o.ls_iterations = a.i32_or("ls_iterations", o.ls_iterations)?;
    o.ls_tolerance = a.f64_or("ls_tolerance", o.ls_tolerance)?;
    o.noslip_iterations = a.i32_or("noslip_iterations", o.noslip_iterations)?;
    o.noslip_tolerance = a.f64_or("noslip_tolerance", o.noslip_tolerance)?;
    o.ccd_iterations = a.i32_or("ccd_iterations", o.ccd_iterations)?;
    o.ccd_tolerance = a.f64_or("ccd_tolerance", o.ccd_tolerance)?;
    o.sdf_iterations = a.i32_or("sdf_iterations", o.sdf_iterations)?;
    o.sdf_initpoints = a.i32_or("sdf_initpoints", o.sdf_initpoints)?;
    if let Some(groups) = a.ints("actuatorgroupdisable")? {
        o.actuatorgroupdisable = groups;
    }
    for flag in el.children_named("flag") {
        for (key, value) in &flag.attrs {
            let enabled = match value.as_str() {
                "enable" => true,
                "disable" => false,
                other => return Err(Error::parse(format!("<flag> {key}=\"{other}\": expected enable or disable"))),
            };
            o.flags.insert(key.clone(), enabled);
        }
    }
    Ok(())
}

fn parse_contact(el: &Element, model: &mut Model) -> Result<()> {
    for child in &el.children {
        match child.name.as_str() {
            "exclude" => {
                let a = Attrs::own(child);
                let (Some(body1), Some(body2)) = (a.string("body1"), a.string("body2")) else {
                    return Err(Error::parse("<exclude> requires body1 and body2"));
                };
                model.excludes.push(Exclude { name: a.string("name"), body1, body2 });
            }
            other => debug!("Skipping contact <{other}>"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Model {
        parse_str(xml, "/models").unwrap()
    }

    #[test]
    fn test_default_classes_and_childclass() {
        let model = parse(
            r#"<mujoco model="arm">
                <default>
                    <geom rgba="0 1 0 1" friction="0.7"/>
                    <default class="link">
                        <joint damping="2" range="-10 10"/>
                        <geom contype="0" conaffinity="0"/>
                    </default>
                </default>
                <worldbody>
                    <body name="upper" childclass="link">
                        <joint name="shoulder" axis="0 1 0"/>
                        <geom name="g" size="0.1"/>
                        <geom name="h" class="main" size="0.1"/>
                    </body>
                </worldbody>
            </mujoco>"#,
        );
        assert_eq!(model.default_rgba, [0.0, 1.0, 0.0, 1.0]);
        let upper = &model.worldbody.children[0];
        let joint = &upper.joints[0];
        assert_eq!(joint.damping, 2.0);
        assert_eq!(joint.range, [-10.0, 10.0]);
        assert_eq!(joint.axis, DVec3::Y);
        let g = &upper.geoms[0];
        assert_eq!(g.friction, [0.7, 0.005, 0.0001]);
        assert!(!g.is_collidable());
        assert_eq!(g.rgba, [0.0, 1.0, 0.0, 1.0]);
        assert!(upper.geoms[1].is_collidable());
    }

    #[test]
    fn test_frames_and_orientations() {
        let model = parse(
            r#"<mujoco>
                <compiler angle="radian" eulerseq="XYZ"/>
                <worldbody>
                    <frame pos="1 0 0" euler="0 0 1.5">
                        <body name="b" quat="1 0 0 0">
                            <geom type="box" size="1 2 3" axisangle="0 0 1 0.5"/>
                            <freejoint/>
                        </body>
                    </frame>
                </worldbody>
            </mujoco>"#,
        );
        assert_eq!(model.compiler.angle, AngleUnit::Radian);
        assert_eq!(model.compiler.eulerseq, "XYZ");
        let b = &model.worldbody.children[0];
        assert_eq!(b.frames.len(), 1);
        assert_eq!(b.frames[0].orientation, Some(Orientation::Euler([0.0, 0.0, 1.5])));
        assert_eq!(b.orientation, Some(Orientation::Quat([1.0, 0.0, 0.0, 0.0])));
        assert_eq!(b.geoms[0].orientation, Some(Orientation::AxisAngle([0.0, 0.0, 1.0, 0.5])));
        assert!(b.geoms[0].frames.is_empty());
        assert_eq!(b.joints[0].kind, JointKind::Free);
    }

    #[test]
    fn test_actuator_shortcuts() {
        let model = parse(
            r#"<mujoco>
                <actuator>
                    <position name="p" joint="j" kp="50" kv="2"/>
                    <velocity joint="j" kv="3"/>
                    <cylinder tendon="t" diameter="2"/>
                    <general site="s" dyntype="filter" gainprm="5 1" biastype="affine"/>
                    <plugin/>
                </actuator>
            </mujoco>"#,
        );
        assert_eq!(model.actuators.len(), 4);
        let p = &model.actuators[0];
        assert_eq!(p.gainprm[0], 50.0);
        assert_eq!(p.biastype, BiasType::Affine);
        assert_eq!(&p.biasprm[..3], &[0.0, -50.0, -2.0]);
        assert_eq!(p.transmission, Some(Transmission::Joint("j".into())));
        assert_eq!(model.actuators[1].biasprm[2], -3.0);
        let c = &model.actuators[2];
        assert_eq!(c.dyntype, DynType::Filter);
        assert!((c.gainprm[0] - std::f64::consts::PI).abs() < 1e-12);
        let g = &model.actuators[3];
        assert_eq!(&g.gainprm[..3], &[5.0, 1.0, 0.0]);
        assert_eq!(g.transmission, Some(Transmission::Site("s".into())));
    }

    #[test]
    fn test_equalities_tendons_contact() {
        let model = parse(
            r#"<mujoco>
                <tendon>
                    <spatial name="rope" springlength="0.3">
                        <site site="a"/><geom geom="wheel" sidesite="side"/><pulley divisor="2"/><site site="b"/>
                    </spatial>
                    <fixed><joint joint="j1" coef="0.5"/><joint joint="j2"/></fixed>
                </tendon>
                <equality>
                    <weld body1="a" relpose="0 0 1 1 0 0 0"/>
                    <connect site1="s1" site2="s2" active="false"/>
                    <joint joint1="j1" joint2="j2" polycoef="0 2"/>
                    <tendon tendon1="rope"/>
                </equality>
                <contact><exclude body1="a" body2="b"/><pair geom1="x" geom2="y"/></contact>
            </mujoco>"#,
        );
        let rope = &model.tendons[0];
        assert_eq!(rope.springlength, [0.3, 0.3]);
        assert_eq!(rope.path.len(), 4);
        assert_eq!(rope.path[2], TendonWrap::Pulley { divisor: 2.0 });
        assert_eq!(model.tendons[1].path[1], TendonWrap::Joint { joint: "j2".into(), coef: 1.0 });

        assert!(matches!(
            model.equalities[0].kind,
            EqualityKind::Weld { relpose, .. } if relpose[3] == 1.0
        ));
        assert!(model.equalities[1].on_sites);
        assert!(!model.equalities[1].active);
        assert!(matches!(
            model.equalities[2].kind,
            EqualityKind::Joint { polycoef } if polycoef == [0.0, 2.0, 0.0, 0.0, 0.0]
        ));
        assert_eq!(model.equalities[3].kind, EqualityKind::Unsupported("tendon".into()));
        assert_eq!(model.excludes.len(), 1);
    }

    #[test]
    fn test_weld_default_relpose_is_sentinel() {
        let model = parse(r#"<mujoco><equality><weld body1="a" body2="b"/></equality></mujoco>"#);
        let EqualityKind::Weld { relpose, torquescale, .. } = model.equalities[0].kind else {
            panic!("expected weld");
        };
        assert_eq!(&relpose[3..], &[0.0; 4]);
        assert_eq!(torquescale, 1.0);
    }

    #[test]
    fn test_option_and_assets() {
        let model = parse(
            r#"<mujoco>
                <compiler meshdir="meshes"/>
                <option timestep="0.01" integrator="RK4" gravity="0 0 -5"><flag gravity="disable" energy="enable"/></option>
                <asset>
                    <mesh file="parts/arm.stl" scale="2 2 2"/>
                    <material name="red" rgba="1 0 0 1" specular="0.3"/>
                </asset>
            </mujoco>"#,
        );
        assert_eq!(model.option.integrator, "rk4");
        assert_eq!(model.option.flags.get("gravity"), Some(&false));
        assert_eq!(model.option.flags.get("energy"), Some(&true));
        let mesh = &model.meshes[0];
        assert_eq!(mesh.name.as_deref(), Some("arm"));
        assert_eq!(model.mesh_path(mesh).unwrap(), PathBuf::from("/models/meshes/parts/arm.stl"));
        assert_eq!(model.material("red").unwrap().specular, Some(0.3));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_str("<robot/>", ""), Err(Error::Parse(_))));
        let bad = r#"<mujoco><worldbody><geom type="blob"/></worldbody></mujoco>"#;
        assert!(parse_str(bad, "").unwrap_err().is_user_input());
        let bad = r#"<mujoco><worldbody><body pos="1 2"/></worldbody></mujoco>"#;
        assert!(parse_str(bad, "").is_err());
        let bad = r#"<mujoco><worldbody><geom class="missing"/></worldbody></mujoco>"#;
        assert!(parse_str(bad, "").is_err());
        assert!(matches!(load("/definitely/not/here.xml"), Err(Error::InputNotFound(_))));
    }

    #[test]
    fn test_compiler_and_option_values_rejected() {
        for bad in [
            r#"<mujoco><compiler eulerseq="xyw"/></mujoco>"#,
            r#"<mujoco><compiler eulerseq="xy"/></mujoco>"#,
            r#"<mujoco><option timestep="0"/></mujoco>"#,
            r#"<mujoco><option timestep="-0.002"/></mujoco>"#,
        ] {
            let err = parse_str(bad, "").unwrap_err();
            assert!(matches!(err, Error::Parse(_)), "{bad}: {err}");
        }
        let model = parse(r#"<mujoco><compiler eulerseq="ZYX"/><option timestep="0.004"/></mujoco>"#);
        assert_eq!(model.compiler.eulerseq, "ZYX");
        assert_eq!(model.option.timestep, 0.004);
    }
}
