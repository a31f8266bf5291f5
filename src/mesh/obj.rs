//! Wavefront OBJ decoding through `tobj`.
//!
//! Faces keep their arity. Normals and texture coordinates keep their own
//! index streams and become face-varying primvars.

use super::{Interpolation, MeshData, Primvar};

pub(super) fn decode(text: &str) -> Result<MeshData, String> {
    let opts = tobj::LoadOptions { triangulate: false, single_index: false, ..Default::default() };
    let (models, _materials) = tobj::load_obj_buf(&mut text.as_bytes(), &opts, |_| {
        Ok((Vec::new(), Default::default()))
    })
    .map_err(|e| format!("OBJ parse failed: {e}"))?;
    if models.is_empty() {
        return Err("OBJ contains no geometry".to_string());
    }

    let mut out = MeshData::default();
    let mut normal_values: Vec<[f32; 3]> = Vec::new();
    let mut normal_indices: Vec<i32> = Vec::new();
    let mut uv_values: Vec<[f32; 2]> = Vec::new();
    let mut uv_indices: Vec<i32> = Vec::new();
    let all_normals = models.iter().all(|m| !m.mesh.normal_indices.is_empty());
    let all_uvs = models.iter().all(|m| !m.mesh.texcoord_indices.is_empty());

    for model in &models {
        let mesh = &model.mesh;
        let point_base = out.points.len() as i32;
        out.points.extend(mesh.positions.chunks_exact(3).map(|c| [c[0], c[1], c[2]]));
        out.face_vertex_indices.extend(mesh.indices.iter().map(|&i| point_base + i as i32));
        if mesh.face_arities.is_empty() {
            out.face_vertex_counts.extend(std::iter::repeat(3).take(mesh.indices.len() / 3));
        } else {
            out.face_vertex_counts.extend(mesh.face_arities.iter().map(|&n| n as i32));
        }

        if all_normals {
            let base = normal_values.len() as i32;
            normal_values.extend(mesh.normals.chunks_exact(3).map(|c| [c[0], c[1], c[2]]));
            normal_indices.extend(mesh.normal_indices.iter().map(|&i| base + i as i32));
        }
        if all_uvs {
            let base = uv_values.len() as i32;
            uv_values.extend(mesh.texcoords.chunks_exact(2).map(|c| [c[0], c[1]]));
            uv_indices.extend(mesh.texcoord_indices.iter().map(|&i| base + i as i32));
        }
    }

    let corners = out.face_vertex_indices.len();
    if all_normals && normal_indices.len() == corners {
        out.normals = Some(
            Primvar { values: normal_values, indices: normal_indices, interpolation: Interpolation::FaceVarying }
                .reindexed(),
        );
    }
    if all_uvs && uv_indices.len() == corners {
        out.uvs = Some(
            Primvar { values: uv_values, indices: uv_indices, interpolation: Interpolation::FaceVarying }
                .reindexed(),
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_quad_keeps_arity_and_indexed_primvars() {
        let mesh = decode(QUAD).unwrap();
        assert_eq!(mesh.face_vertex_counts, vec![4]);
        assert_eq!(mesh.face_vertex_indices, vec![0, 1, 2, 3]);
        let normals = mesh.normals.unwrap();
        assert_eq!(normals.values, vec![[0.0, 0.0, 1.0]]);
        assert_eq!(normals.indices, vec![0, 0, 0, 0]);
        let uvs = mesh.uvs.unwrap();
        assert_eq!(uvs.values.len(), 4);
        assert_eq!(uvs.interpolation, Interpolation::FaceVarying);
    }

    #[test]
    fn test_positions_only() {
        let mesh = decode("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert!(mesh.normals.is_none());
        assert!(mesh.uvs.is_none());
        assert_eq!(mesh.face_vertex_counts, vec![3]);
    }

    #[test]
    fn test_empty_obj() {
        assert!(decode("# nothing\n").is_err());
    }
}
