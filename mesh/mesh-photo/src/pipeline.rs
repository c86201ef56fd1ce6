//! Single image to textured mesh.
//!
//! Stages, in order:
//!
//! 1. Decode the image and estimate depth once
//! 2. Normalise and smooth depth, infer intrinsics, back-project
//! 3. Downsample, remove outliers, estimate and orient normals
//! 4. Poisson reconstruction, optional low-density trim
//! 5. Crop to the cloud bounds, repair, smooth, decimate, vertex normals
//! 6. Project texture coordinates from the camera
//! 7. Export OBJ + MTL, GLB, texture and stats
//!
//! Nothing is written until the geometry has succeeded.

use std::path::Path;

use image::RgbImage;
use mesh_decimate::decimate_to_budget;
use mesh_depth::{
    DepthEstimator, DepthMap, Intrinsics, ModelVariant, backproject, postprocess_depth,
    project_uvs,
};
use mesh_io::{ExportPaths, stage_bundle};
use mesh_repair::{
    compute_vertex_normals, crop_to_aabb, remove_unreferenced_vertices, repair_mesh, smooth_simple,
};
use mesh_scan::{clean_point_cloud, reconstruct_poisson, remove_low_density_vertices};
use mesh_types::{IndexedMesh, MeshStats};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::timeout::Cancellation;

/// Image file extensions accepted as input.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// In-memory result of [`reconstruct`].
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Camera used for back-projection and texture coordinates.
    pub intrinsics: Intrinsics,
    /// Points handed to surface reconstruction.
    pub cloud_points: usize,
    /// Final mesh with normals and texture coordinates.
    pub mesh: IndexedMesh,
}

/// Files and figures of a finished run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Written files.
    pub paths: ExportPaths,
    /// Statistics of the exported mesh.
    pub stats: MeshStats,
    /// Points handed to surface reconstruction.
    pub cloud_points: usize,
    /// Depth network used, when depth was estimated by this run.
    pub variant: Option<ModelVariant>,
}

/// Reconstruct a textured mesh from one image file.
///
/// # Errors
///
/// Returns [`PipelineError::Input`] for a missing, unsupported or empty
/// image, [`PipelineError::ModelUnavailable`] if no depth variant works,
/// [`PipelineError::DegenerateGeometry`] if a stage comes up empty, and
/// stage errors otherwise.
pub fn run_single_image(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    estimator: &dyn DepthEstimator,
) -> PipelineResult<PipelineOutput> {
    run_single_image_cancellable(input, output_dir, config, estimator, &Cancellation::new())
}

/// [`run_single_image`] that gives up, writing nothing, once `cancel` is
/// raised.
///
/// # Errors
///
/// As [`run_single_image`], plus [`PipelineError::Cancelled`].
pub fn run_single_image_cancellable(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    estimator: &dyn DepthEstimator,
    cancel: &Cancellation,
) -> PipelineResult<PipelineOutput> {
    config.validate()?;
    let image = load_image(input)?;
    info!(
        input = %input.display(),
        width = image.width(),
        height = image.height(),
        device = %config.device,
        "Loaded image"
    );

    let estimate = estimator.estimate(&image)?;
    let mut output =
        run_with_images_cancellable(&image, &estimate.depth, output_dir, config, cancel)?;
    output.variant = Some(estimate.variant);
    Ok(output)
}

/// Reconstruct and export, given the image and its raw depth.
///
/// Depth at another resolution is resampled to the image.
///
/// # Errors
///
/// See [`reconstruct`]; export failures are returned as
/// [`PipelineError::Io`].
pub fn run_with_images(
    image: &RgbImage,
    depth_raw: &DepthMap,
    output_dir: &Path,
    config: &PipelineConfig,
) -> PipelineResult<PipelineOutput> {
    run_with_images_cancellable(image, depth_raw, output_dir, config, &Cancellation::new())
}

/// [`run_with_images`] that gives up, writing nothing, once `cancel` is
/// raised.
///
/// The flag is checked before reconstruction and before any file is
/// staged. The staged files are moved into `output_dir` under
/// [`Cancellation::commit`], so a cancel either lands first or waits for
/// the whole bundle.
///
/// # Errors
///
/// As [`run_with_images`], plus [`PipelineError::Cancelled`].
pub fn run_with_images_cancellable(
    image: &RgbImage,
    depth_raw: &DepthMap,
    output_dir: &Path,
    config: &PipelineConfig,
    cancel: &Cancellation,
) -> PipelineResult<PipelineOutput> {
    ensure_live(cancel)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::input("<image>", "image has no pixels"));
    }
    let depth_raw = if depth_raw.width() == width && depth_raw.height() == height {
        depth_raw.clone()
    } else {
        debug!(
            from = ?depth_raw.shape(),
            to = ?(height, width),
            "Resampling depth to image size"
        );
        depth_raw.resize_bilinear(width, height)?
    };

    let reconstruction = reconstruct(&depth_raw, width, height, config)?;
    ensure_live(cancel)?;
    let staged = stage_bundle(&reconstruction.mesh, image, output_dir)?;
    let stats = *staged.stats();
    let paths = cancel.commit(|| Ok(staged.commit()?))?;
    info!(
        obj = %paths.obj.display(),
        glb = %paths.glb.display(),
        stats = %paths.stats.display(),
        "Wrote outputs"
    );

    Ok(PipelineOutput {
        paths,
        stats,
        cloud_points: reconstruction.cloud_points,
        variant: None,
    })
}

fn ensure_live(cancel: &Cancellation) -> PipelineResult<()> {
    if cancel.is_cancelled() {
        info!("Run cancelled, discarding results");
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

/// Depth to textured mesh, without any file I/O.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateGeometry`] when back-projection or
/// cleanup leaves no points, or when reconstruction, repair or decimation
/// leaves no triangles.
pub fn reconstruct(
    depth_raw: &DepthMap,
    width: u32,
    height: u32,
    config: &PipelineConfig,
) -> PipelineResult<Reconstruction> {
    config.validate()?;

    let depth = postprocess_depth(depth_raw, &config.postprocess)?;
    let (min, max) = depth.finite_range().unwrap_or((0.0, 0.0));
    info!(
        shape = ?depth.shape(),
        min = f64::from(min),
        max = f64::from(max),
        "Depth ready"
    );

    let intrinsics = Intrinsics::infer(width, height, config.focal);
    debug!(
        fx = intrinsics.fx,
        fy = intrinsics.fy,
        cx = intrinsics.cx,
        cy = intrinsics.cy,
        "Inferred intrinsics"
    );

    let cloud = backproject(&depth, &intrinsics, &config.backproject);
    info!(points = cloud.len(), "Back-projected point cloud");
    if cloud.is_empty() {
        return Err(PipelineError::DegenerateGeometry {
            stage: "back-projection",
        });
    }

    let cleaned = clean_point_cloud(&cloud, &config.cleanup)?.cloud;
    info!(points = cleaned.len(), "Cleaned point cloud");
    let Some(bounds) = cleaned.bounds() else {
        return Err(PipelineError::DegenerateGeometry {
            stage: "point cleanup",
        });
    };

    let poisson = reconstruct_poisson(&cleaned, &config.poisson)?;
    let mut mesh = poisson.mesh;
    info!(
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Poisson surface"
    );
    if let Some(quantile) = config.density_quantile {
        remove_low_density_vertices(&mut mesh, &poisson.densities, quantile)?;
    }
    if mesh.faces.is_empty() {
        return Err(PipelineError::DegenerateGeometry {
            stage: "surface reconstruction",
        });
    }

    let cropped = crop_to_aabb(&mut mesh, &bounds);
    let summary = repair_mesh(&mut mesh, &config.repair);
    debug!(cropped, %summary, "Repaired mesh");
    if mesh.faces.is_empty() {
        return Err(PipelineError::DegenerateGeometry { stage: "repair" });
    }
    let displacement = smooth_simple(&mut mesh, config.smooth_iterations);
    debug!(displacement, "Smoothed mesh");

    let decimated = decimate_to_budget(&mesh, config.max_triangles)?;
    debug!(
        before = decimated.original_triangles,
        after = decimated.final_triangles,
        "Decimated mesh"
    );
    let mut mesh = decimated.mesh;
    remove_unreferenced_vertices(&mut mesh);
    debug_assert!(mesh.faces.len() <= config.max_triangles);
    if mesh.faces.is_empty() {
        return Err(PipelineError::DegenerateGeometry {
            stage: "decimation",
        });
    }
    compute_vertex_normals(&mut mesh);

    let uvs = project_uvs(&mesh.vertices, &intrinsics, width, height);
    mesh.set_uvs(&uvs)?;
    info!(
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Final mesh"
    );

    Ok(Reconstruction {
        intrinsics,
        cloud_points: cleaned.len(),
        mesh,
    })
}

/// Decode an input image as RGB, checking its extension and size.
///
/// # Errors
///
/// Returns [`PipelineError::Input`] if the extension is not supported, the
/// file cannot be decoded, or the image has no pixels.
pub fn load_image(path: &Path) -> PipelineResult<RgbImage> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(PipelineError::input(
            path,
            format!(
                "unsupported extension '{extension}', expected one of {}",
                SUPPORTED_EXTENSIONS.join(", ")
            ),
        ));
    }

    let image = image::open(path)
        .map_err(|e| PipelineError::input(path, e.to_string()))?
        .into_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::input(path, "image has no pixels"));
    }
    Ok(image)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_extension() {
        let err = load_image(Path::new("photo.gif")).unwrap_err();
        assert!(matches!(err, PipelineError::Input { .. }));
        assert!(err.to_string().contains("unsupported extension 'gif'"));
    }

    #[test]
    fn rejects_missing_file() {
        let err = load_image(Path::new("no_such_photo.JPG")).unwrap_err();
        assert!(matches!(err, PipelineError::Input { .. }));
    }

    #[test]
    fn flat_zero_depth_is_degenerate() {
        let depth = DepthMap::new(16, 16, vec![0.0; 256]).unwrap();
        let err = reconstruct(&depth, 16, 16, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DegenerateGeometry {
                stage: "back-projection"
            }
        ));
    }

    #[test]
    fn cancelled_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let depth = DepthMap::new(8, 8, vec![0.5; 64]).unwrap();
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = run_with_images_cancellable(
            &RgbImage::new(8, 8),
            &depth,
            dir.path(),
            &PipelineConfig::default(),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn invalid_config_fails_before_work() {
        let depth = DepthMap::new(4, 4, vec![0.5; 16]).unwrap();
        let config = PipelineConfig::default().with_max_triangles(0);
        assert!(matches!(
            reconstruct(&depth, 4, 4, &config),
            Err(PipelineError::Config { .. })
        ));
    }
}
