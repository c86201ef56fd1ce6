//! Export of textured meshes.
//!
//! This crate writes the artifacts of a reconstruction run:
//!
//! - **OBJ + MTL** (Wavefront) - ASCII, with UVs, normals and a textured material
//! - **GLB** (binary glTF 2.0) - Single primitive with the texture embedded
//! - **PNG** - The texture image
//! - **stats.json** - Vertex count, face count and bounding box
//!
//! Bundles are staged in a hidden directory and renamed into place once
//! every file is written, so an interrupted run leaves no partial files. OBJ files can also
//! be loaded back, which is how exports are verified.
//!
//! # Example
//!
//! ```no_run
//! use image::RgbImage;
//! use mesh_io::export_bundle;
//! use mesh_types::{IndexedMesh, Point3};
//!
//! let mesh = IndexedMesh::from_positions(
//!     vec![Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0), Point3::new(0.0, 1.0, 1.0)],
//!     vec![[0, 1, 2]],
//! );
//! let paths = export_bundle(&mesh, &RgbImage::new(4, 4), "out").unwrap();
//! println!("{}", paths.glb.display());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod glb;
mod obj;
mod stats;
mod texture;

pub use error::{IoError, IoResult};
pub use glb::{GLB_MAGIC, GLB_VERSION, encode_glb, write_glb};
pub use obj::{MATERIAL_NAME, load_obj, write_obj_mtl};
pub use stats::{read_stats, write_stats};
pub use texture::{encode_png, write_texture};

use std::path::{Path, PathBuf};

use image::RgbImage;
use mesh_types::{IndexedMesh, MeshStats};
use tempfile::TempDir;
use tracing::{debug, info};

/// File name of the OBJ geometry.
pub const OBJ_FILE: &str = "model.obj";
/// File name of the OBJ material library.
pub const MTL_FILE: &str = "model.mtl";
/// File name of the texture image.
pub const TEXTURE_FILE: &str = "texture.png";
/// File name of the binary glTF.
pub const GLB_FILE: &str = "model.glb";
/// File name of the statistics document.
pub const STATS_FILE: &str = "stats.json";

/// Paths of every file written by [`export_bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// OBJ geometry.
    pub obj: PathBuf,
    /// MTL material library.
    pub mtl: PathBuf,
    /// PNG texture.
    pub texture: PathBuf,
    /// Binary glTF.
    pub glb: PathBuf,
    /// Statistics document.
    pub stats: PathBuf,
}

impl ExportPaths {
    /// Standard file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            obj: dir.join(OBJ_FILE),
            mtl: dir.join(MTL_FILE),
            texture: dir.join(TEXTURE_FILE),
            glb: dir.join(GLB_FILE),
            stats: dir.join(STATS_FILE),
        }
    }
}

/// Write the texture, OBJ + MTL, GLB and stats of a mesh into `dir`.
///
/// The directory is created if needed. The mesh is validated before any
/// file is written. Equivalent to [`stage_bundle`] followed by
/// [`StagedBundle::commit`].
///
/// # Errors
///
/// Returns an error if the mesh has no faces or invalid indices, or if any
/// file cannot be written.
pub fn export_bundle<P: AsRef<Path>>(
    mesh: &IndexedMesh,
    texture: &RgbImage,
    dir: P,
) -> IoResult<ExportPaths> {
    stage_bundle(mesh, texture, dir)?.commit()
}

/// A fully written bundle waiting in a hidden staging directory.
///
/// Nothing is visible under the standard file names until
/// [`commit`](Self::commit). Dropping the bundle deletes the staged files.
#[derive(Debug)]
pub struct StagedBundle {
    staging: TempDir,
    dir: PathBuf,
    stats: MeshStats,
}

impl StagedBundle {
    /// Statistics of the staged mesh.
    #[must_use]
    pub const fn stats(&self) -> &MeshStats {
        &self.stats
    }

    /// Move the staged files to their final names.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be renamed.
    pub fn commit(self) -> IoResult<ExportPaths> {
        let staged = ExportPaths::in_dir(self.staging.path());
        let paths = ExportPaths::in_dir(&self.dir);
        // stats.json last, so its presence marks a finished bundle
        for (from, to) in [
            (&staged.texture, &paths.texture),
            (&staged.mtl, &paths.mtl),
            (&staged.obj, &paths.obj),
            (&staged.glb, &paths.glb),
            (&staged.stats, &paths.stats),
        ] {
            std::fs::rename(from, to)?;
        }

        info!(
            dir = %self.dir.display(),
            vertices = self.stats.vertices,
            faces = self.stats.faces,
            "Exported mesh bundle"
        );
        Ok(paths)
    }
}

/// Write every file of a bundle into a staging directory inside `dir`.
///
/// # Errors
///
/// Returns an error if the mesh has no faces or invalid indices, or if any
/// file cannot be written.
pub fn stage_bundle<P: AsRef<Path>>(
    mesh: &IndexedMesh,
    texture: &RgbImage,
    dir: P,
) -> IoResult<StagedBundle> {
    if mesh.faces.is_empty() {
        return Err(IoError::invalid_content(0, "cannot export a mesh with no faces"));
    }
    check_indices(mesh)?;

    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let staging = tempfile::Builder::new().prefix(".staging-").tempdir_in(dir)?;
    let paths = ExportPaths::in_dir(staging.path());

    let png = encode_png(texture)?;
    std::fs::write(&paths.texture, &png)?;
    write_obj_mtl(mesh, TEXTURE_FILE, &paths.obj, &paths.mtl)?;
    write_glb(mesh, Some(&png), &paths.glb)?;
    let stats = MeshStats::from_mesh(mesh);
    write_stats(&stats, &paths.stats)?;
    debug!(staging = %staging.path().display(), "Staged mesh bundle");

    Ok(StagedBundle {
        staging,
        dir: dir.to_path_buf(),
        stats,
    })
}

/// Check that every face index refers to an existing vertex.
pub(crate) fn check_indices(mesh: &IndexedMesh) -> IoResult<()> {
    let vertex_count = mesh.vertices.len();
    for (face, indices) in mesh.faces.iter().enumerate() {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(IoError::IndexOutOfRange {
                face,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}
