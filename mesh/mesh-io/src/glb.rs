//! Binary glTF 2.0 (GLB) export.
//!
//! # Layout
//!
//! ```text
//! UINT32  magic    0x46546C67 ("glTF")
//! UINT32  version  2
//! UINT32  length   total file size
//! chunk 0: UINT32 length, UINT32 type "JSON", JSON padded with spaces
//! chunk 1: UINT32 length, UINT32 type "BIN\0", buffer padded with zeros
//! ```
//!
//! The binary buffer holds, in order: positions, normals, texture
//! coordinates (all `f32`), `u32` triangle indices and the PNG texture.
//! Every buffer view starts on a 4-byte boundary.
//!
//! glTF puts the texture origin at the top-left corner, so `v` is flipped
//! back from the bottom-left convention the mesh UVs use.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mesh_types::IndexedMesh;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{IoError, IoResult};

/// `glTF` in little-endian.
pub const GLB_MAGIC: u32 = 0x4654_6C67;
/// Container version written in the header.
pub const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const MODE_TRIANGLES: u32 = 4;

/// Write a mesh as a single-primitive GLB file.
///
/// Normals and texture coordinates are included when every vertex has
/// them. The texture, when given, must be PNG data; it is embedded in the
/// binary chunk and bound as the base colour of a PBR material.
///
/// # Errors
///
/// Returns an error if the mesh has no faces, a face index is out of range,
/// or the file cannot be written.
///
/// # Example
///
/// ```no_run
/// use mesh_io::write_glb;
/// use mesh_types::{IndexedMesh, Point3};
///
/// let mesh = IndexedMesh::from_positions(
///     vec![Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0), Point3::new(0.0, 1.0, 1.0)],
///     vec![[0, 1, 2]],
/// );
/// write_glb(&mesh, None, "out/model.glb").unwrap();
/// ```
pub fn write_glb<P: AsRef<Path>>(
    mesh: &IndexedMesh,
    texture_png: Option<&[u8]>,
    path: P,
) -> IoResult<()> {
    let path = path.as_ref();
    let bytes = encode_glb(mesh, texture_png)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote GLB");
    Ok(())
}

/// Encode a mesh as GLB bytes. See [`write_glb`].
///
/// # Errors
///
/// Returns an error if the mesh has no faces, a face index is out of range,
/// or the result would exceed the 4 GiB container limit.
pub fn encode_glb(mesh: &IndexedMesh, texture_png: Option<&[u8]>) -> IoResult<Vec<u8>> {
    if mesh.faces.is_empty() {
        return Err(IoError::invalid_content(0, "cannot export a mesh with no faces"));
    }
    crate::check_indices(mesh)?;

    let mut buffer = BinaryBuffer::default();
    let mut accessors = Vec::new();
    let mut attributes = serde_json::Map::new();
    let vertex_count = mesh.vertices.len();

    #[allow(clippy::cast_possible_truncation)]
    let positions: Vec<[f32; 3]> = mesh
        .vertices
        .iter()
        .map(|v| [v.position.x as f32, v.position.y as f32, v.position.z as f32])
        .collect();
    let (min, max) = float_bounds(&positions);
    let view = buffer.push(bytemuck::cast_slice(&positions), Some(ARRAY_BUFFER));
    attributes.insert("POSITION".into(), json!(accessors.len()));
    accessors.push(json!({
        "bufferView": view,
        "componentType": COMPONENT_FLOAT,
        "count": vertex_count,
        "type": "VEC3",
        "min": min,
        "max": max,
    }));

    if let Some(normals) = mesh.normals() {
        #[allow(clippy::cast_possible_truncation)]
        let normals: Vec<[f32; 3]> = normals
            .iter()
            .map(|n| [n.x as f32, n.y as f32, n.z as f32])
            .collect();
        let view = buffer.push(bytemuck::cast_slice(&normals), Some(ARRAY_BUFFER));
        attributes.insert("NORMAL".into(), json!(accessors.len()));
        accessors.push(json!({
            "bufferView": view,
            "componentType": COMPONENT_FLOAT,
            "count": vertex_count,
            "type": "VEC3",
        }));
    }

    if let Some(uvs) = mesh.uvs() {
        let uvs: Vec<[f32; 2]> = uvs.iter().map(|&(u, v)| [u, 1.0 - v]).collect();
        let view = buffer.push(bytemuck::cast_slice(&uvs), Some(ARRAY_BUFFER));
        attributes.insert("TEXCOORD_0".into(), json!(accessors.len()));
        accessors.push(json!({
            "bufferView": view,
            "componentType": COMPONENT_FLOAT,
            "count": vertex_count,
            "type": "VEC2",
        }));
    }

    let view = buffer.push(
        bytemuck::cast_slice(mesh.faces.as_slice()),
        Some(ELEMENT_ARRAY_BUFFER),
    );
    let indices_accessor = accessors.len();
    accessors.push(json!({
        "bufferView": view,
        "componentType": COMPONENT_UNSIGNED_INT,
        "count": mesh.faces.len() * 3,
        "type": "SCALAR",
    }));

    let mut material = json!({
        "name": crate::obj::MATERIAL_NAME,
        "pbrMetallicRoughness": {
            "baseColorFactor": [1.0, 1.0, 1.0, 1.0],
            "metallicFactor": 0.0,
            "roughnessFactor": 1.0,
        },
        "doubleSided": true,
    });

    let mut document = json!({
        "asset": { "version": "2.0", "generator": "mesh-io" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": Value::Object(attributes),
                "indices": indices_accessor,
                "material": 0,
                "mode": MODE_TRIANGLES,
            }],
        }],
    });

    if let Some(png) = texture_png {
        let view = buffer.push(png, None);
        material["pbrMetallicRoughness"]["baseColorTexture"] = json!({ "index": 0 });
        document["samplers"] = json!([{ "magFilter": 9729, "minFilter": 9987, "wrapS": 33071, "wrapT": 33071 }]);
        document["images"] = json!([{ "bufferView": view, "mimeType": "image/png" }]);
        document["textures"] = json!([{ "sampler": 0, "source": 0 }]);
    }

    document["materials"] = json!([material]);
    document["accessors"] = Value::Array(accessors);
    document["bufferViews"] = Value::Array(buffer.views);
    document["buffers"] = json!([{ "byteLength": buffer.data.len() }]);

    let mut json_bytes = serde_json::to_vec(&document)?;
    pad_to_four(&mut json_bytes, b' ');
    let mut bin = buffer.data;
    pad_to_four(&mut bin, 0);

    let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
    let total_u32 = u32::try_from(total).map_err(|_| IoError::TooLarge { what: "GLB file" })?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_u32.to_le_bytes());
    write_chunk(&mut out, CHUNK_JSON, &json_bytes)?;
    write_chunk(&mut out, CHUNK_BIN, &bin)?;
    Ok(out)
}

/// Accumulates buffer views in one binary buffer.
#[derive(Default)]
struct BinaryBuffer {
    data: Vec<u8>,
    views: Vec<Value>,
}

impl BinaryBuffer {
    /// Append `bytes` at the next 4-byte boundary and return its view index.
    fn push(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        pad_to_four(&mut self.data, 0);
        let offset = self.data.len();
        if target.is_some() {
            push_le(&mut self.data, bytes);
        } else {
            self.data.extend_from_slice(bytes);
        }

        let mut view = json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.views.push(view);
        self.views.len() - 1
    }
}

/// Append native 4-byte scalars as little-endian words.
fn push_le(data: &mut Vec<u8>, bytes: &[u8]) {
    if cfg!(target_endian = "little") {
        data.extend_from_slice(bytes);
    } else {
        for word in bytes.chunks(4) {
            data.extend(word.iter().rev());
        }
    }
}

fn pad_to_four(data: &mut Vec<u8>, fill: u8) {
    while data.len() % 4 != 0 {
        data.push(fill);
    }
}

fn write_chunk(out: &mut Vec<u8>, kind: u32, payload: &[u8]) -> IoResult<()> {
    let len = u32::try_from(payload.len()).map_err(|_| IoError::TooLarge { what: "GLB chunk" })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

fn float_bounds(points: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in points {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (min, max)
}
