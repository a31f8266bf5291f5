//! Parsed MJCF object graph.
//!
//! Every field carries its MuJoCo default after parsing, so the converter
//! never has to consult default classes. Orientations stay unresolved until
//! conversion because their meaning depends on the compiler settings.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::util::DVec3;

/// Three-way switch used by `limited`-style attributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TriState {
    False,
    True,
    #[default]
    Auto,
}

impl TriState {
    pub fn token(self) -> &'static str {
        match self {
            TriState::False => "false",
            TriState::True => "true",
            TriState::Auto => "auto",
        }
    }
}

/// Rotation as written in the source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Orientation {
    /// `(w, x, y, z)`
    Quat([f64; 4]),
    /// Axis then angle (degrees unless the compiler says radians).
    AxisAngle([f64; 4]),
    /// First two frame axes.
    XyAxes([f64; 6]),
    /// Frame z axis only.
    ZAxis([f64; 3]),
    /// Angles applied in the compiler's `eulerseq`.
    Euler([f64; 3]),
}

/// Nested `<frame>` offset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub pos: DVec3,
    pub orientation: Option<Orientation>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AngleUnit {
    #[default]
    Degree,
    Radian,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Compiler {
    pub angle: AngleUnit,
    /// Three of `xyzXYZ`, checked when parsed.
    pub eulerseq: String,
    pub meshdir: Option<String>,
    pub texturedir: Option<String>,
    pub assetdir: Option<String>,
    pub autolimits: bool,
    pub align_free: bool,
    pub balance_inertia: bool,
    pub bound_inertia: f64,
    pub bound_mass: f64,
    pub fit_aabb: bool,
    pub fuse_static: bool,
    pub inertia_from_geom: TriState,
    pub inertia_group_range: [i32; 2],
    pub save_inertial: bool,
    pub set_total_mass: f64,
    pub use_thread: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            angle: AngleUnit::Degree,
            eulerseq: "xyz".to_string(),
            meshdir: None,
            texturedir: None,
            assetdir: None,
            autolimits: true,
            align_free: false,
            balance_inertia: false,
            bound_inertia: 0.0,
            bound_mass: 0.0,
            fit_aabb: false,
            fuse_static: false,
            inertia_from_geom: TriState::Auto,
            inertia_group_range: [0, 5],
            save_inertial: false,
            set_total_mass: -1.0,
            use_thread: true,
        }
    }
}

/// `<option>` plus its `<flag>` child.
#[derive(Clone, Debug, PartialEq)]
pub struct SimOption {
    pub timestep: f64,
    pub gravity: DVec3,
    pub wind: DVec3,
    pub magnetic: DVec3,
    pub density: f64,
    pub viscosity: f64,
    pub impratio: f64,
    pub o_margin: f64,
    pub o_solref: [f64; 2],
    pub o_solimp: [f64; 5],
    pub o_friction: [f64; 5],
    pub integrator: String,
    pub cone: String,
    pub jacobian: String,
    pub solver: String,
    pub iterations: i32,
    pub tolerance: f64,
    pub ls_iterations: i32,
    pub ls_tolerance: f64,
    pub noslip_iterations: i32,
    pub noslip_tolerance: f64,
    pub ccd_iterations: i32,
    pub ccd_tolerance: f64,
    pub sdf_iterations: i32,
    pub sdf_initpoints: i32,
    pub actuatorgroupdisable: Vec<i32>,
    /// Flags set explicitly, `true` for `enable`.
    pub flags: BTreeMap<String, bool>,
}

impl Default for SimOption {
    fn default() -> Self {
        Self {
            timestep: 0.002,
            gravity: DVec3::new(0.0, 0.0, -9.81),
            wind: DVec3::ZERO,
            magnetic: DVec3::new(0.0, -0.5, 0.0),
            density: 0.0,
            viscosity: 0.0,
            impratio: 1.0,
            o_margin: 0.0,
            o_solref: DEFAULT_SOLREF,
            o_solimp: DEFAULT_SOLIMP,
            o_friction: [1.0, 1.0, 0.005, 0.0001, 0.0001],
            integrator: "euler".to_string(),
            cone: "pyramidal".to_string(),
            jacobian: "auto".to_string(),
            solver: "newton".to_string(),
            iterations: 100,
            tolerance: 1e-8,
            ls_iterations: 50,
            ls_tolerance: 0.01,
            noslip_iterations: 0,
            noslip_tolerance: 1e-6,
            ccd_iterations: 35,
            ccd_tolerance: 1e-6,
            sdf_iterations: 10,
            sdf_initpoints: 40,
            actuatorgroupdisable: Vec::new(),
            flags: BTreeMap::new(),
        }
    }
}

pub const DEFAULT_SOLREF: [f64; 2] = [0.02, 1.0];
pub const DEFAULT_SOLIMP: [f64; 5] = [0.9, 0.95, 0.001, 0.5, 2.0];
pub const DEFAULT_RGBA: [f64; 4] = [0.5, 0.5, 0.5, 1.0];
pub const DEFAULT_FRICTION: [f64; 3] = [1.0, 0.005, 0.0001];

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub file: Option<String>,
    pub content_type: Option<String>,
    pub scale: DVec3,
    pub refpos: DVec3,
    pub refquat: [f64; 4],
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            name: None,
            file: None,
            content_type: None,
            scale: DVec3::ONE,
            refpos: DVec3::ZERO,
            refquat: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub rgba: [f64; 4],
    pub emission: f64,
    pub specular: Option<f64>,
    pub shininess: f64,
    pub reflectance: f64,
    pub metallic: Option<f64>,
    pub roughness: Option<f64>,
    pub texture: Option<String>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            rgba: [1.0, 1.0, 1.0, 1.0],
            emission: 0.0,
            specular: None,
            shininess: 0.5,
            reflectance: 0.0,
            metallic: None,
            roughness: None,
            texture: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Texture {
    pub name: Option<String>,
    /// `2d`, `cube` or `skybox`.
    pub kind: String,
    pub file: Option<String>,
    pub builtin: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Inertial {
    pub pos: DVec3,
    pub orientation: Option<Orientation>,
    pub mass: f64,
    pub diaginertia: Option<DVec3>,
    /// `ixx iyy izz ixy ixz iyz`
    pub fullinertia: Option<[f64; 6]>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JointKind {
    #[default]
    Hinge,
    Slide,
    Ball,
    Free,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    pub name: Option<String>,
    pub kind: JointKind,
    pub pos: DVec3,
    pub axis: DVec3,
    pub range: [f64; 2],
    pub limited: TriState,
    pub group: i32,
    pub damping: f64,
    pub stiffness: f64,
    pub armature: f64,
    pub frictionloss: f64,
    pub margin: f64,
    pub ref_position: f64,
    pub springref: f64,
    pub solreflimit: [f64; 2],
    pub solimplimit: [f64; 5],
    pub solreffriction: [f64; 2],
    pub solimpfriction: [f64; 5],
    pub springdamper: [f64; 2],
    pub actuatorfrclimited: TriState,
    pub actuatorfrcrange: [f64; 2],
    pub actuatorgravcomp: bool,
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            name: None,
            kind: JointKind::Hinge,
            pos: DVec3::ZERO,
            axis: DVec3::Z,
            range: [0.0, 0.0],
            limited: TriState::Auto,
            group: 0,
            damping: 0.0,
            stiffness: 0.0,
            armature: 0.0,
            frictionloss: 0.0,
            margin: 0.0,
            ref_position: 0.0,
            springref: 0.0,
            solreflimit: DEFAULT_SOLREF,
            solimplimit: DEFAULT_SOLIMP,
            solreffriction: DEFAULT_SOLREF,
            solimpfriction: DEFAULT_SOLIMP,
            springdamper: [0.0, 0.0],
            actuatorfrclimited: TriState::Auto,
            actuatorfrcrange: [0.0, 0.0],
            actuatorgravcomp: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GeomKind {
    Plane,
    HField,
    #[default]
    Sphere,
    Capsule,
    Ellipsoid,
    Cylinder,
    Box,
    Mesh,
    Sdf,
}

impl GeomKind {
    /// Fallback node name for unnamed geoms.
    pub fn label(self) -> &'static str {
        match self {
            GeomKind::Plane => "Plane",
            GeomKind::HField => "HField",
            GeomKind::Sphere => "Sphere",
            GeomKind::Capsule => "Capsule",
            GeomKind::Ellipsoid => "Ellipsoid",
            GeomKind::Cylinder => "Cylinder",
            GeomKind::Box => "Box",
            GeomKind::Mesh => "Mesh",
            GeomKind::Sdf => "SDF",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geom {
    pub name: Option<String>,
    pub kind: GeomKind,
    pub size: [f64; 3],
    pub pos: DVec3,
    pub orientation: Option<Orientation>,
    pub frames: Vec<Frame>,
    pub fromto: Option<[f64; 6]>,
    pub mesh: Option<String>,
    pub material: Option<String>,
    pub rgba: [f64; 4],
    pub group: i32,
    pub friction: [f64; 3],
    pub contype: i32,
    pub conaffinity: i32,
    pub condim: i32,
    pub priority: i32,
    pub solmix: f64,
    pub solref: [f64; 2],
    pub solimp: [f64; 5],
    pub margin: f64,
    pub gap: f64,
    pub mass: Option<f64>,
    pub density: f64,
}

impl Default for Geom {
    fn default() -> Self {
        Self {
            name: None,
            kind: GeomKind::Sphere,
            size: [0.0; 3],
            pos: DVec3::ZERO,
            orientation: None,
            frames: Vec::new(),
            fromto: None,
            mesh: None,
            material: None,
            rgba: DEFAULT_RGBA,
            group: 0,
            friction: DEFAULT_FRICTION,
            contype: 1,
            conaffinity: 1,
            condim: 3,
            priority: 0,
            solmix: 1.0,
            solref: DEFAULT_SOLREF,
            solimp: DEFAULT_SOLIMP,
            margin: 0.0,
            gap: 0.0,
            mass: None,
            density: 1000.0,
        }
    }
}

impl Geom {
    pub fn is_collidable(&self) -> bool {
        self.contype != 0 || self.conaffinity != 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Site {
    pub name: Option<String>,
    pub kind: GeomKind,
    pub size: [f64; 3],
    pub pos: DVec3,
    pub orientation: Option<Orientation>,
    pub frames: Vec<Frame>,
    pub fromto: Option<[f64; 6]>,
    pub group: i32,
    pub rgba: [f64; 4],
    pub material: Option<String>,
}

impl Default for Site {
    fn default() -> Self {
        Self {
            name: None,
            kind: GeomKind::Sphere,
            size: [0.005; 3],
            pos: DVec3::ZERO,
            orientation: None,
            frames: Vec::new(),
            fromto: None,
            group: 0,
            rgba: DEFAULT_RGBA,
            material: None,
        }
    }
}

/// Body. The world body is the root of the tree with `name = "world"`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Body {
    pub name: Option<String>,
    pub pos: DVec3,
    pub orientation: Option<Orientation>,
    pub frames: Vec<Frame>,
    pub mocap: bool,
    pub gravcomp: f64,
    pub inertial: Option<Inertial>,
    pub joints: Vec<Joint>,
    pub geoms: Vec<Geom>,
    pub sites: Vec<Site>,
    pub children: Vec<Body>,
}

impl Body {
    /// Depth-first iterator over this body and all descendants.
    pub fn descendants(&self) -> Vec<&Body> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            let body = out[i];
            out.extend(body.children.iter());
            i += 1;
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TendonKind {
    Fixed,
    Spatial,
}

/// One element of a tendon path.
#[derive(Clone, Debug, PartialEq)]
pub enum TendonWrap {
    Joint { joint: String, coef: f64 },
    Site { site: String },
    Geom { geom: String, sidesite: Option<String> },
    Pulley { divisor: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tendon {
    pub name: Option<String>,
    pub kind: TendonKind,
    pub path: Vec<TendonWrap>,
    pub stiffness: f64,
    pub springlength: [f64; 2],
    pub damping: f64,
    pub frictionloss: f64,
    pub solreffriction: [f64; 2],
    pub solimpfriction: [f64; 5],
    pub armature: f64,
    pub limited: TriState,
    pub actuatorfrclimited: TriState,
    pub range: [f64; 2],
    pub actuatorfrcrange: [f64; 2],
    pub margin: f64,
    pub solreflimit: [f64; 2],
    pub solimplimit: [f64; 5],
    pub rgba: [f64; 4],
    pub width: f64,
    pub group: i32,
}

impl Tendon {
    pub fn new(kind: TendonKind) -> Self {
        Self {
            name: None,
            kind,
            path: Vec::new(),
            stiffness: 0.0,
            springlength: [-1.0, -1.0],
            damping: 0.0,
            frictionloss: 0.0,
            solreffriction: DEFAULT_SOLREF,
            solimpfriction: DEFAULT_SOLIMP,
            armature: 0.0,
            limited: TriState::Auto,
            actuatorfrclimited: TriState::Auto,
            range: [0.0, 0.0],
            actuatorfrcrange: [0.0, 0.0],
            margin: 0.0,
            solreflimit: DEFAULT_SOLREF,
            solimplimit: DEFAULT_SOLIMP,
            rgba: DEFAULT_RGBA,
            width: 0.003,
            group: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EqualityKind {
    Connect { anchor: DVec3 },
    /// `relpose` is position then `(w, x, y, z)`; an all-zero quaternion
    /// means "use the reference configuration".
    Weld { anchor: DVec3, relpose: [f64; 7], torquescale: f64 },
    Joint { polycoef: [f64; 5] },
    /// Kinds the converter does not author (`tendon`, `flex`).
    Unsupported(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Equality {
    pub name: Option<String>,
    pub kind: EqualityKind,
    /// First constrained object (body, site or joint depending on kind).
    pub obj1: Option<String>,
    pub obj2: Option<String>,
    /// Objects are sites rather than bodies.
    pub on_sites: bool,
    pub active: bool,
    pub solref: [f64; 2],
    pub solimp: [f64; 5],
}

impl Equality {
    pub fn new(kind: EqualityKind) -> Self {
        Self {
            name: None,
            kind,
            obj1: None,
            obj2: None,
            on_sites: false,
            active: true,
            solref: DEFAULT_SOLREF,
            solimp: DEFAULT_SOLIMP,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DynType {
    #[default]
    None,
    Integrator,
    Filter,
    FilterExact,
    Muscle,
    User,
}

impl DynType {
    pub fn token(self) -> &'static str {
        match self {
            DynType::None => "none",
            DynType::Integrator => "integrator",
            DynType::Filter => "filter",
            DynType::FilterExact => "filterexact",
            DynType::Muscle => "muscle",
            DynType::User => "user",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GainType {
    #[default]
    Fixed,
    Affine,
    Muscle,
    User,
}

impl GainType {
    pub fn token(self) -> &'static str {
        match self {
            GainType::Fixed => "fixed",
            GainType::Affine => "affine",
            GainType::Muscle => "muscle",
            GainType::User => "user",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BiasType {
    #[default]
    None,
    Affine,
    Muscle,
    User,
}

impl BiasType {
    pub fn token(self) -> &'static str {
        match self {
            BiasType::None => "none",
            BiasType::Affine => "affine",
            BiasType::Muscle => "muscle",
            BiasType::User => "user",
        }
    }
}

/// What an actuator transmits force to.
#[derive(Clone, Debug, PartialEq)]
pub enum Transmission {
    Joint(String),
    JointInParent(String),
    Tendon(String),
    Site(String),
    Body(String),
    SliderCrank { cranksite: String, slidersite: Option<String> },
}

impl Transmission {
    pub fn target_name(&self) -> &str {
        match self {
            Transmission::Joint(n)
            | Transmission::JointInParent(n)
            | Transmission::Tendon(n)
            | Transmission::Site(n)
            | Transmission::Body(n) => n,
            Transmission::SliderCrank { cranksite, .. } => cranksite,
        }
    }
}

/// Actuator expanded to the general dyn/gain/bias form.
#[derive(Clone, Debug, PartialEq)]
pub struct Actuator {
    pub name: Option<String>,
    /// Source element (`general`, `motor`, `position`, ...).
    pub shortcut: String,
    pub transmission: Option<Transmission>,
    pub refsite: Option<String>,
    pub gear: [f64; 6],
    pub group: i32,
    pub ctrllimited: TriState,
    pub ctrlrange: [f64; 2],
    pub forcelimited: TriState,
    pub forcerange: [f64; 2],
    pub actlimited: TriState,
    pub actrange: [f64; 2],
    pub lengthrange: [f64; 2],
    pub actdim: i32,
    pub actearly: bool,
    pub inheritrange: f64,
    pub cranklength: f64,
    pub dyntype: DynType,
    pub gaintype: GainType,
    pub biastype: BiasType,
    pub dynprm: [f64; 10],
    pub gainprm: [f64; 10],
    pub biasprm: [f64; 10],
}

pub const DEFAULT_DYNPRM: [f64; 10] = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
pub const DEFAULT_GAINPRM: [f64; 10] = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
pub const DEFAULT_BIASPRM: [f64; 10] = [0.0; 10];
pub const DEFAULT_GEAR: [f64; 6] = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];

impl Default for Actuator {
    fn default() -> Self {
        Self {
            name: None,
            shortcut: "general".to_string(),
            transmission: None,
            refsite: None,
            gear: DEFAULT_GEAR,
            group: 0,
            ctrllimited: TriState::Auto,
            ctrlrange: [0.0, 0.0],
            forcelimited: TriState::Auto,
            forcerange: [0.0, 0.0],
            actlimited: TriState::Auto,
            actrange: [0.0, 0.0],
            lengthrange: [0.0, 0.0],
            actdim: -1,
            actearly: false,
            inheritrange: 0.0,
            cranklength: 0.0,
            dyntype: DynType::None,
            gaintype: GainType::Fixed,
            biastype: BiasType::None,
            dynprm: DEFAULT_DYNPRM,
            gainprm: DEFAULT_GAINPRM,
            biasprm: DEFAULT_BIASPRM,
        }
    }
}

/// `<contact><exclude>` pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Exclude {
    pub name: Option<String>,
    pub body1: String,
    pub body2: String,
}

/// Complete parsed model.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub name: String,
    /// Directory the MJCF file was read from; asset paths resolve against it.
    pub source_dir: PathBuf,
    pub compiler: Compiler,
    pub option: SimOption,
    /// Geom color of the `main` default class.
    pub default_rgba: [f64; 4],
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub worldbody: Body,
    pub tendons: Vec<Tendon>,
    pub equalities: Vec<Equality>,
    pub actuators: Vec<Actuator>,
    pub excludes: Vec<Exclude>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            name: "MuJoCo Model".to_string(),
            source_dir: PathBuf::new(),
            compiler: Compiler::default(),
            option: SimOption::default(),
            default_rgba: DEFAULT_RGBA,
            meshes: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            worldbody: Body { name: Some("world".to_string()), ..Default::default() },
            tendons: Vec::new(),
            equalities: Vec::new(),
            actuators: Vec::new(),
            excludes: Vec::new(),
        }
    }
}

impl Model {
    fn asset_dir(&self, specific: &Option<String>) -> PathBuf {
        match specific.as_ref().or(self.compiler.assetdir.as_ref()) {
            Some(dir) => self.source_dir.join(dir),
            None => self.source_dir.clone(),
        }
    }

    /// On-disk location of a mesh file.
    pub fn mesh_path(&self, mesh: &Mesh) -> Option<PathBuf> {
        mesh.file.as_ref().map(|f| self.asset_dir(&self.compiler.meshdir).join(f))
    }

    /// On-disk location of a texture file.
    pub fn texture_path(&self, texture: &Texture) -> Option<PathBuf> {
        texture.file.as_ref().map(|f| self.asset_dir(&self.compiler.texturedir).join(f))
    }

    pub fn mesh(&self, name: &str) -> Option<&Mesh> {
        self.meshes.iter().find(|m| m.name.as_deref() == Some(name))
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name.as_deref() == Some(name))
    }

    pub fn texture(&self, name: &str) -> Option<&Texture> {
        self.textures.iter().find(|t| t.name.as_deref() == Some(name))
    }
}
