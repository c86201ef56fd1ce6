//! Wavefront OBJ + MTL support.
//!
//! The writer emits one `v`, `vt` and `vn` line per vertex, so every face
//! corner uses the same index for all three:
//!
//! ```text
//! mtllib model.mtl
//! v x y z
//! vt u v
//! vn nx ny nz
//! usemtl material0
//! f a/a/a b/b/b c/c/c
//! ```
//!
//! `vt` and `vn` are written only when every vertex carries a UV or a
//! normal. The material file points `map_Kd` at the texture image.
//!
//! The loader reads `v`, `vt`, `vn` and `f` lines. Face corners may be
//! `v`, `v/vt`, `v//vn` or `v/vt/vn`, indices may be negative (relative to
//! the end of the list so far), and polygons are fan triangulated.
//! Attributes are per position, so the first corner that references a
//! position decides its UV and normal.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Point3, Vector3, Vertex};
use tracing::debug;

use crate::error::{IoError, IoResult};

/// Name of the single material written to the MTL file.
pub const MATERIAL_NAME: &str = "material0";

/// Write a mesh as OBJ plus its MTL material file.
///
/// `texture_file_name` is written verbatim into `map_Kd`, so it should be
/// relative to the MTL file's directory. The OBJ references the MTL by file
/// name.
///
/// # Errors
///
/// Returns an error if a face index is out of range or a file cannot be
/// written.
///
/// # Example
///
/// ```no_run
/// use mesh_io::write_obj_mtl;
/// use mesh_types::{IndexedMesh, Point3};
///
/// let mesh = IndexedMesh::from_positions(
///     vec![Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0), Point3::new(0.0, 1.0, 1.0)],
///     vec![[0, 1, 2]],
/// );
/// write_obj_mtl(&mesh, "texture.png", "out/model.obj", "out/model.mtl").unwrap();
/// ```
pub fn write_obj_mtl<P: AsRef<Path>, Q: AsRef<Path>>(
    mesh: &IndexedMesh,
    texture_file_name: &str,
    obj_path: P,
    mtl_path: Q,
) -> IoResult<()> {
    crate::check_indices(mesh)?;
    let obj_path = obj_path.as_ref();
    let mtl_path = mtl_path.as_ref();

    let mtl_name = mtl_path
        .file_name()
        .map_or_else(|| "model.mtl".to_string(), |n| n.to_string_lossy().into_owned());

    let mut mtl = BufWriter::new(File::create(mtl_path)?);
    write_mtl(&mut mtl, texture_file_name)?;
    mtl.flush()?;

    let mut obj = BufWriter::new(File::create(obj_path)?);
    write_obj(&mut obj, mesh, &mtl_name)?;
    obj.flush()?;

    debug!(
        path = %obj_path.display(),
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Wrote OBJ"
    );
    Ok(())
}

fn write_mtl<W: Write>(writer: &mut W, texture_file_name: &str) -> IoResult<()> {
    writeln!(writer, "newmtl {MATERIAL_NAME}")?;
    writeln!(writer, "Ka 1.000000 1.000000 1.000000")?;
    writeln!(writer, "Kd 1.000000 1.000000 1.000000")?;
    writeln!(writer, "Ks 0.000000 0.000000 0.000000")?;
    writeln!(writer, "d 1.0")?;
    writeln!(writer, "illum 1")?;
    writeln!(writer, "map_Kd {texture_file_name}")?;
    Ok(())
}

fn write_obj<W: Write>(writer: &mut W, mesh: &IndexedMesh, mtl_name: &str) -> IoResult<()> {
    let uvs = mesh.uvs();
    let normals = mesh.normals();

    writeln!(writer, "mtllib {mtl_name}")?;
    for v in &mesh.vertices {
        let p = v.position;
        writeln!(writer, "v {:.8} {:.8} {:.8}", p.x, p.y, p.z)?;
    }
    if let Some(uvs) = &uvs {
        for (u, v) in uvs {
            writeln!(writer, "vt {u:.6} {v:.6}")?;
        }
    }
    if let Some(normals) = &normals {
        for n in normals {
            writeln!(writer, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z)?;
        }
    }

    writeln!(writer, "usemtl {MATERIAL_NAME}")?;
    for face in &mesh.faces {
        write!(writer, "f")?;
        for &i in face {
            let k = u64::from(i) + 1;
            match (uvs.is_some(), normals.is_some()) {
                (true, true) => write!(writer, " {k}/{k}/{k}")?,
                (true, false) => write!(writer, " {k}/{k}")?,
                (false, true) => write!(writer, " {k}//{k}")?,
                (false, false) => write!(writer, " {k}")?,
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Load a mesh from an OBJ file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - A line has malformed numbers
/// - A face references a missing vertex, UV or normal
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_obj;
///
/// let mesh = load_obj("out/model.obj").unwrap();
/// println!("Loaded {} faces", mesh.faces.len());
/// ```
pub fn load_obj<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::from_open(path, e))?;
    parse_obj(BufReader::new(file))
}

/// Parse OBJ text from a reader.
pub(crate) fn parse_obj<R: BufRead>(reader: R) -> IoResult<IndexedMesh> {
    let mut mesh = IndexedMesh::new();
    let mut uvs: Vec<(f32, f32)> = Vec::new();
    let mut normals: Vec<Vector3<f64>> = Vec::new();
    let mut corners: Vec<Corner> = Vec::with_capacity(4);

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = n + 1;
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let [x, y, z] = parse_floats::<3>(&mut parts, line_no)?;
                mesh.vertices.push(Vertex::new(Point3::new(x, y, z)));
            }
            "vt" => {
                let [u, v] = parse_floats::<2>(&mut parts, line_no)?;
                #[allow(clippy::cast_possible_truncation)]
                uvs.push((u as f32, v as f32));
            }
            "vn" => {
                let [x, y, z] = parse_floats::<3>(&mut parts, line_no)?;
                normals.push(Vector3::new(x, y, z));
            }
            "f" => {
                corners.clear();
                for token in parts {
                    corners.push(parse_corner(
                        token,
                        line_no,
                        mesh.vertices.len(),
                        uvs.len(),
                        normals.len(),
                    )?);
                }
                if corners.len() < 3 {
                    return Err(IoError::invalid_content(
                        line_no,
                        format!("face has {} corners, need at least 3", corners.len()),
                    ));
                }
                for c in &corners {
                    let attributes = &mut mesh.vertices[c.position].attributes;
                    if attributes.uv.is_none() {
                        attributes.uv = c.uv.map(|i| uvs[i]);
                    }
                    if attributes.normal.is_none() {
                        attributes.normal = c.normal.map(|i| normals[i]);
                    }
                }
                for k in 1..corners.len() - 1 {
                    #[allow(clippy::cast_possible_truncation)]
                    mesh.faces.push([
                        corners[0].position as u32,
                        corners[k].position as u32,
                        corners[k + 1].position as u32,
                    ]);
                }
            }
            // Groups, objects, smoothing and material statements carry no geometry
            _ => {}
        }
    }

    Ok(mesh)
}

/// Zero-based indices of one face corner.
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> IoResult<[f64; N]> {
    let mut out = [0.0; N];
    for slot in &mut out {
        let token = parts
            .next()
            .ok_or_else(|| IoError::invalid_content(line, format!("expected {N} numbers")))?;
        *slot = token.parse()?;
    }
    Ok(out)
}

fn parse_corner(
    token: &str,
    line: usize,
    positions: usize,
    uvs: usize,
    normals: usize,
) -> IoResult<Corner> {
    let mut fields = token.split('/');
    let position = fields
        .next()
        .ok_or_else(|| IoError::invalid_content(line, "empty face corner"))?;
    let position = resolve_index(position, positions, line, "vertex")?;
    let uv = match fields.next() {
        Some(s) if !s.is_empty() => Some(resolve_index(s, uvs, line, "texture coordinate")?),
        _ => None,
    };
    let normal = match fields.next() {
        Some(s) if !s.is_empty() => Some(resolve_index(s, normals, line, "normal")?),
        _ => None,
    };
    Ok(Corner {
        position,
        uv,
        normal,
    })
}

/// Turn a one-based or negative OBJ index into a zero-based index.
fn resolve_index(token: &str, len: usize, line: usize, what: &str) -> IoResult<usize> {
    let raw: i64 = token.parse()?;
    let len_i = i64::try_from(len).map_err(|_| IoError::TooLarge { what: "index" })?;
    let resolved = match raw {
        r if r > 0 => r - 1,
        r if r < 0 => len_i + r,
        _ => -1,
    };
    if (0..len_i).contains(&resolved) {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        Ok(resolved as usize)
    } else {
        Err(IoError::invalid_content(
            line,
            format!("{what} index {raw} out of range ({len} defined)"),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn textured_quad() -> IndexedMesh {
        let mut mesh = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(0.0, 1.0, 1.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        mesh.set_uvs(&[(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)])
            .unwrap();
        for v in &mut mesh.vertices {
            v.attributes.normal = Some(-Vector3::z());
        }
        mesh
    }

    #[test]
    fn writes_full_corners() {
        let mut out = Vec::new();
        write_obj(&mut out, &textured_quad(), "model.mtl").unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("mtllib model.mtl\n"));
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 4);
        assert_eq!(text.lines().filter(|l| l.starts_with("vt ")).count(), 4);
        assert_eq!(text.lines().filter(|l| l.starts_with("vn ")).count(), 4);
        assert!(text.contains("usemtl material0\n"));
        assert!(text.contains("f 1/1/1 2/2/2 3/3/3\n"));
    }

    #[test]
    fn writes_positions_only() {
        let mut mesh = textured_quad();
        for v in &mut mesh.vertices {
            v.attributes = mesh_types::VertexAttributes::default();
        }
        let mut out = Vec::new();
        write_obj(&mut out, &mesh, "model.mtl").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("vt "));
        assert!(text.contains("f 1 3 4\n"));
    }

    #[test]
    fn mtl_points_at_texture() {
        let mut out = Vec::new();
        write_mtl(&mut out, "texture.png").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("newmtl material0\n"));
        assert!(text.contains("map_Kd texture.png\n"));
    }

    #[test]
    fn parse_round_trip() {
        let original = textured_quad();
        let mut out = Vec::new();
        write_obj(&mut out, &original, "model.mtl").unwrap();
        let loaded = parse_obj(BufReader::new(&out[..])).unwrap();

        assert_eq!(loaded.faces, original.faces);
        assert_eq!(loaded.vertices.len(), 4);
        assert_eq!(loaded.uvs().unwrap(), original.uvs().unwrap());
        assert_relative_eq!(loaded.vertices[2].position, original.vertices[2].position);
    }

    #[test]
    fn parse_negative_indices_and_polygons() {
        let text = b"v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf -4 -3 -2 -1\n";
        let mesh = parse_obj(BufReader::new(&text[..])).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn parse_mixed_corner_forms() {
        let text = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvt 0.5 0.5\nf 1//1 2/1 3\n";
        let mesh = parse_obj(BufReader::new(&text[..])).unwrap();
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.vertices[0].attributes.normal, Some(Vector3::z()));
        assert_eq!(mesh.vertices[1].attributes.uv, Some((0.5, 0.5)));
        assert_eq!(mesh.vertices[2].attributes.uv, None);
    }

    #[test]
    fn parse_rejects_bad_index() {
        let text = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n";
        let err = parse_obj(BufReader::new(&text[..])).unwrap_err();
        assert!(matches!(err, IoError::InvalidContent { line: 4, .. }));
    }

    #[test]
    fn parse_rejects_zero_index() {
        let text = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n";
        assert!(parse_obj(BufReader::new(&text[..])).is_err());
    }

    #[test]
    fn parse_rejects_short_face() {
        let text = b"v 0 0 0\nv 1 0 0\nf 1 2\n";
        assert!(parse_obj(BufReader::new(&text[..])).is_err());
    }

    #[test]
    fn parse_skips_comments_and_groups() {
        let text = b"# comment\no thing\ng group\ns off\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(BufReader::new(&text[..])).unwrap();
        assert_eq!(mesh.faces.len(), 1);
    }

    #[test]
    fn load_nonexistent_file() {
        let result = load_obj("nonexistent_file_12345.obj");
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }
}
