//! Mesh asset decoding.
//!
//! Meshes are read into [`MeshData`]: welded points, polygon topology and
//! optional indexed normal / texture-coordinate primvars. Primvar values are
//! deduplicated independently of the position indices.

mod obj;
mod stl;

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::util::{BBox3d, DVec3, Error, Result};

/// Primvar interpolation over a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    /// One value per face.
    Uniform,
    /// One value per point.
    Vertex,
    /// One value per face corner.
    FaceVarying,
}

impl Interpolation {
    pub fn token(self) -> &'static str {
        match self {
            Interpolation::Uniform => "uniform",
            Interpolation::Vertex => "vertex",
            Interpolation::FaceVarying => "faceVarying",
        }
    }
}

/// Indexed primvar with `N` float components per value.
#[derive(Clone, Debug, PartialEq)]
pub struct Primvar<const N: usize> {
    pub values: Vec<[f32; N]>,
    pub indices: Vec<i32>,
    pub interpolation: Interpolation,
}

impl<const N: usize> Primvar<N> {
    /// Build from one value per element, deduplicated.
    pub fn from_expanded(values: &[[f32; N]], interpolation: Interpolation) -> Self {
        let identity: Vec<i32> = (0..values.len() as i32).collect();
        Self { values: values.to_vec(), indices: identity, interpolation }.reindexed()
    }

    /// Copy with bit-identical values merged and indices rebuilt.
    pub fn reindexed(&self) -> Self {
        let (values, remap) = dedup(&self.values);
        let indices = self
            .indices
            .iter()
            .map(|&i| usize::try_from(i).ok().and_then(|i| remap.get(i).copied()).unwrap_or(0))
            .collect();
        Self { values, indices, interpolation: self.interpolation }
    }
}

/// Unique values in first-seen order plus the old → new index map.
pub(crate) fn dedup<const N: usize>(values: &[[f32; N]]) -> (Vec<[f32; N]>, Vec<i32>) {
    let mut seen: HashMap<[u32; N], i32> = HashMap::with_capacity(values.len());
    let mut unique = Vec::new();
    let mut remap = Vec::with_capacity(values.len());
    for v in values {
        let key = v.map(f32::to_bits);
        let idx = *seen.entry(key).or_insert_with(|| {
            unique.push(*v);
            unique.len() as i32 - 1
        });
        remap.push(idx);
    }
    (unique, remap)
}

/// Decoded polygon mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub points: Vec<[f32; 3]>,
    pub face_vertex_counts: Vec<i32>,
    pub face_vertex_indices: Vec<i32>,
    pub normals: Option<Primvar<3>>,
    pub uvs: Option<Primvar<2>>,
}

impl MeshData {
    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }

    pub fn bounds(&self) -> BBox3d {
        let mut bb = BBox3d::EMPTY;
        for p in &self.points {
            bb.expand_by_point(DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64));
        }
        bb
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Stl,
    Obj,
}

fn detect_format(path: &Path, content_type: Option<&str>) -> Result<Format> {
    if let Some(ct) = content_type {
        return match ct {
            "model/stl" => Ok(Format::Stl),
            "model/obj" => Ok(Format::Obj),
            other => Err(Error::mesh(path, format!("unsupported content type '{other}'"))),
        };
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "stl" => Ok(Format::Stl),
        "obj" => Ok(Format::Obj),
        "" => Err(Error::mesh(path, "file has no extension and no content type")),
        other => Err(Error::mesh(path, format!("unsupported mesh format '.{other}'"))),
    }
}

/// Decode a mesh file, dispatching on `content_type` or the file extension.
pub fn load(path: &Path, content_type: Option<&str>) -> Result<MeshData> {
    let format = detect_format(path, content_type)?;
    if !path.is_file() {
        return Err(Error::mesh(path, "file not found"));
    }
    let mesh = match format {
        Format::Stl => {
            let bytes = std::fs::read(path)?;
            stl::decode(&bytes).map_err(|msg| Error::mesh(path, msg))?
        }
        Format::Obj => {
            let text = std::fs::read_to_string(path)?;
            obj::decode(&text).map_err(|msg| Error::mesh(path, msg))?
        }
    };
    debug!(
        "Decoded {} ({} points, {} faces)",
        path.display(),
        mesh.points.len(),
        mesh.face_count()
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindex_merges_duplicates() {
        let pv = Primvar::<2> {
            values: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0], [1.0, 0.0]],
            indices: vec![0, 1, 2, 3, 2],
            interpolation: Interpolation::FaceVarying,
        };
        let r = pv.reindexed();
        assert_eq!(r.values, vec![[0.0, 0.0], [1.0, 0.0]]);
        assert_eq!(r.indices, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_from_expanded() {
        let pv = Primvar::from_expanded(&[[0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]], Interpolation::Uniform);
        assert_eq!(pv.values.len(), 2);
        assert_eq!(pv.indices, vec![0, 0, 1]);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("a/b.STL"), None).unwrap(), Format::Stl);
        assert_eq!(detect_format(Path::new("x.bin"), Some("model/obj")).unwrap(), Format::Obj);
        assert!(matches!(detect_format(Path::new("a.msh"), None), Err(Error::Mesh { .. })));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mesh = load(&path, None).unwrap();
        assert_eq!(mesh.face_vertex_counts, vec![3]);
        assert_eq!(mesh.bounds().max, DVec3::new(1.0, 1.0, 0.0));
        assert!(matches!(load(&dir.path().join("none.stl"), None), Err(Error::Mesh { .. })));
    }
}
