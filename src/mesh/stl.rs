//! STL decoding, binary and ASCII.
//!
//! Binary layout: 80-byte header, `u32` triangle count, then per triangle a
//! normal, three vertices (all `f32` triples) and a `u16` attribute count.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use super::{dedup, Interpolation, MeshData, Primvar};

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

pub(super) fn decode(bytes: &[u8]) -> Result<MeshData, String> {
    if is_binary(bytes) {
        decode_binary(bytes)
    } else if bytes.trim_ascii_start().starts_with(b"solid") {
        let text = std::str::from_utf8(bytes).map_err(|e| format!("ASCII STL is not UTF-8: {e}"))?;
        decode_ascii(text)
    } else {
        decode_binary(bytes)
    }
}

/// Binary when the size matches the declared triangle count exactly.
fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE + 4 {
        return false;
    }
    let mut cur = Cursor::new(&bytes[HEADER_SIZE..]);
    match cur.read_u32::<LittleEndian>() {
        Ok(count) => HEADER_SIZE + 4 + count as usize * TRIANGLE_SIZE == bytes.len(),
        Err(_) => false,
    }
}

fn read_vec3(cur: &mut Cursor<&[u8]>) -> std::io::Result<[f32; 3]> {
    Ok([
        cur.read_f32::<LittleEndian>()?,
        cur.read_f32::<LittleEndian>()?,
        cur.read_f32::<LittleEndian>()?,
    ])
}

fn decode_binary(bytes: &[u8]) -> Result<MeshData, String> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(format!("binary STL too short ({} bytes)", bytes.len()));
    }
    let mut cur = Cursor::new(&bytes[HEADER_SIZE..]);
    let count = cur.read_u32::<LittleEndian>().map_err(|e| e.to_string())? as usize;
    let available = (bytes.len() - HEADER_SIZE - 4) / TRIANGLE_SIZE;
    if count > available {
        return Err(format!(
            "binary STL truncated: header declares {count} triangles, data holds {available}"
        ));
    }
    let mut normals = Vec::with_capacity(count);
    let mut corners = Vec::with_capacity(count * 3);
    for i in 0..count {
        let tri = (|| -> std::io::Result<()> {
            normals.push(read_vec3(&mut cur)?);
            for _ in 0..3 {
                corners.push(read_vec3(&mut cur)?);
            }
            cur.read_u16::<LittleEndian>()?;
            Ok(())
        })();
        tri.map_err(|_| format!("binary STL truncated at triangle {i} of {count}"))?;
    }
    Ok(assemble(&corners, &normals))
}

fn decode_ascii(text: &str) -> Result<MeshData, String> {
    let mut normals = Vec::new();
    let mut corners = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("facet") => {
                if tokens.next() != Some("normal") {
                    return Err(format!("line {}: expected 'facet normal'", line_no + 1));
                }
                normals.push(parse_triple(tokens, line_no)?);
            }
            Some("vertex") => corners.push(parse_triple(tokens, line_no)?),
            _ => {}
        }
    }
    if corners.len() != normals.len() * 3 {
        return Err(format!(
            "ASCII STL has {} vertices for {} facets",
            corners.len(),
            normals.len()
        ));
    }
    Ok(assemble(&corners, &normals))
}

fn parse_triple<'a>(tokens: impl Iterator<Item = &'a str>, line_no: usize) -> Result<[f32; 3], String> {
    let values: Vec<f32> = tokens
        .map(|t| t.parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("line {}: {e}", line_no + 1))?;
    values
        .try_into()
        .map_err(|_| format!("line {}: expected three numbers", line_no + 1))
}

/// Weld corners into shared points; facet normals become a uniform primvar.
fn assemble(corners: &[[f32; 3]], normals: &[[f32; 3]]) -> MeshData {
    let (points, indices) = dedup(corners);
    let has_normals = normals.iter().any(|n| n.iter().any(|c| *c != 0.0));
    MeshData {
        points,
        face_vertex_counts: vec![3; normals.len()],
        face_vertex_indices: indices,
        normals: has_normals.then(|| Primvar::from_expanded(normals, Interpolation::Uniform)),
        uvs: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn binary_stl(tris: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_SIZE];
        out.write_u32::<LittleEndian>(tris.len() as u32).unwrap();
        for tri in tris {
            for c in [0.0f32, 0.0, 1.0] {
                out.write_f32::<LittleEndian>(c).unwrap();
            }
            for v in tri {
                for c in v {
                    out.write_f32::<LittleEndian>(*c).unwrap();
                }
            }
            out.write_u16::<LittleEndian>(0).unwrap();
        }
        out
    }

    #[test]
    fn test_binary_welds_shared_corners() {
        let quad = [
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]],
            [[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
        ];
        let mesh = decode(&binary_stl(&quad)).unwrap();
        assert_eq!(mesh.points.len(), 4);
        assert_eq!(mesh.face_vertex_indices, vec![0, 1, 2, 0, 2, 3]);
        let normals = mesh.normals.unwrap();
        assert_eq!(normals.values, vec![[0.0, 0.0, 1.0]]);
        assert_eq!(normals.indices, vec![0, 0]);
        assert_eq!(normals.interpolation, Interpolation::Uniform);
    }

    #[test]
    fn test_binary_header_starting_with_solid() {
        let mut bytes = binary_stl(&[[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]]);
        bytes[..5].copy_from_slice(b"solid");
        assert_eq!(decode(&bytes).unwrap().face_count(), 1);
    }

    #[test]
    fn test_ascii() {
        let text = "solid t\n facet normal 0 0 1\n  outer loop\n   vertex 0 0 0\n   vertex 1 0 0\n   vertex 0 1 0\n  endloop\n endfacet\nendsolid t\n";
        let mesh = decode(text.as_bytes()).unwrap();
        assert_eq!(mesh.points.len(), 3);
        assert_eq!(mesh.face_vertex_counts, vec![3]);
    }

    #[test]
    fn test_corrupt_triangle_count() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.write_u32::<LittleEndian>(u32::MAX).unwrap();
        bytes.extend_from_slice(&[0u8; 10]);
        let err = decode(&bytes).unwrap_err();
        assert!(err.contains("truncated"), "{err}");
    }

    #[test]
    fn test_truncated_binary() {
        let mut bytes = binary_stl(&[[[0.0; 3]; 3]]);
        bytes.truncate(100);
        assert!(decode(&bytes).unwrap_err().contains("truncated"));
    }
}
