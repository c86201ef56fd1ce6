//! Screened-free Poisson surface reconstruction on cascadic grids.
//!
//! Oriented samples are splatted into a vector field `V`. The indicator
//! function `χ` solves `Δχ = ∇·V`, so `∇χ` follows the sample normals. The
//! surface is the level set of `χ` at its mean value over the samples.
//!
//! The solve runs coarse to fine. The coarsest level covers the whole cube
//! densely with zero boundary values. Every finer level only keeps a band of
//! cells around the samples; its initial guess and its boundary values are
//! interpolated from the level below.

use mesh_types::IndexedMesh;
use nalgebra::{DVector, Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info};

use super::grid::{Domain, FACE_NEIGHBORS, Level, offset};
use super::solver::{FIXED, StencilSystem};
use super::surface_nets;
use crate::error::{ScanError, ScanResult};
use crate::pointcloud::PointCloud;

/// Deepest octree level accepted by [`reconstruct_poisson`].
pub const MAX_DEPTH: u32 = 12;

/// Deepest level that may be solved on a dense grid.
pub const MAX_FULL_DEPTH: u32 = 8;

/// Parameters for Poisson reconstruction.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoissonParams {
    /// Finest level; the grid has `2^depth` cells per axis. Default: 8.
    pub depth: u32,

    /// Levels up to this depth are solved densely. Default: 5.
    pub full_depth: u32,

    /// Ratio between the reconstruction cube and the cloud's largest
    /// extent. Default: 1.1.
    pub scale: f64,

    /// Half-width, in cells, of the active band around samples on sparse
    /// levels. Default: 2.
    pub band: u32,

    /// Conjugate gradient iteration cap per level. Default: 200.
    pub cg_max_iterations: usize,

    /// Relative residual at which a level counts as solved. Default: 1e-6.
    pub cg_tolerance: f64,
}

impl Default for PoissonParams {
    fn default() -> Self {
        Self {
            depth: 8,
            full_depth: 5,
            scale: 1.1,
            band: 2,
            cg_max_iterations: 200,
            cg_tolerance: 1e-6,
        }
    }
}

impl PoissonParams {
    /// Creates new parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the finest depth.
    #[must_use]
    pub const fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Sets the depth up to which levels are dense.
    #[must_use]
    pub const fn with_full_depth(mut self, full_depth: u32) -> Self {
        self.full_depth = full_depth;
        self
    }

    /// Sets the domain scale.
    #[must_use]
    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the band half-width.
    #[must_use]
    pub const fn with_band(mut self, band: u32) -> Self {
        self.band = band;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidParameter`] describing the first bad value.
    pub fn validate(&self) -> ScanResult<()> {
        let fail = |reason: String| Err(ScanError::InvalidParameter { reason });
        if !(1..=MAX_DEPTH).contains(&self.depth) {
            return fail(format!(
                "poisson depth must be in 1..={MAX_DEPTH}, got {}",
                self.depth
            ));
        }
        if self.coarsest_depth() > MAX_FULL_DEPTH {
            return fail(format!(
                "dense poisson levels are limited to depth {MAX_FULL_DEPTH}, got {}",
                self.coarsest_depth()
            ));
        }
        if !(self.scale.is_finite() && self.scale >= 1.0) {
            return fail(format!("poisson scale must be >= 1, got {}", self.scale));
        }
        if self.band == 0 {
            return fail("poisson band must be at least 1 cell".to_string());
        }
        if self.cg_max_iterations == 0 {
            return fail("cg_max_iterations must be greater than 0".to_string());
        }
        if !(self.cg_tolerance.is_finite() && self.cg_tolerance > 0.0) {
            return fail(format!(
                "cg_tolerance must be positive, got {}",
                self.cg_tolerance
            ));
        }
        Ok(())
    }

    fn coarsest_depth(&self) -> u32 {
        self.full_depth.min(self.depth)
    }
}

/// Output of Poisson reconstruction.
#[derive(Debug, Clone)]
pub struct PoissonResult {
    /// The extracted surface. Vertices carry positions only.
    pub mesh: IndexedMesh,

    /// Sample density at each vertex, parallel to `mesh.vertices`.
    pub densities: Vec<f64>,

    /// Iso-value the surface was extracted at.
    pub iso_value: f64,

    /// Per-level solver statistics, coarsest first.
    pub levels: Vec<LevelStats>,
}

/// Solver statistics for one level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelStats {
    /// Depth of the level.
    pub depth: u32,
    /// Number of unknowns.
    pub active_cells: usize,
    /// Conjugate gradient iterations used.
    pub iterations: usize,
    /// Final relative residual.
    pub relative_residual: f64,
}

impl std::fmt::Display for PoissonResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Poisson: {} vertices, {} faces over {} levels (iso {:.4})",
            self.mesh.vertices.len(),
            self.mesh.faces.len(),
            self.levels.len(),
            self.iso_value
        )
    }
}

/// Reconstructs a surface from an oriented point cloud.
///
/// Faces are wound so their normals follow the sample normals. The result
/// may contain no faces at all, for example when every sample lies in one
/// plane with opposing normals; callers decide whether that is an error.
///
/// # Errors
///
/// - [`ScanError::EmptyPointCloud`] for an empty cloud
/// - [`ScanError::MissingNormals`] when any point lacks a normal
/// - [`ScanError::InvalidParameter`] for out-of-range parameters
/// - [`ScanError::ReconstructionFailed`] when the cloud has no extent
///
/// # Example
///
/// ```
/// use mesh_scan::pointcloud::PointCloud;
/// use mesh_scan::reconstruct::{reconstruct_poisson, PoissonParams};
/// use nalgebra::{Point3, Vector3};
///
/// // Oriented samples on a unit sphere
/// let mut cloud = PointCloud::new();
/// for i in 0..40 {
///     for j in 0..80 {
///         let theta = std::f64::consts::PI * (f64::from(i) + 0.5) / 40.0;
///         let phi = std::f64::consts::PI * 2.0 * f64::from(j) / 80.0;
///         let n = Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
///         cloud.add_point_with_normal(Point3::from(n), n);
///     }
/// }
///
/// let params = PoissonParams::default().with_depth(5).with_full_depth(4);
/// let result = reconstruct_poisson(&cloud, &params).unwrap();
/// assert!(!result.mesh.faces.is_empty());
/// assert_eq!(result.densities.len(), result.mesh.vertices.len());
/// ```
pub fn reconstruct_poisson(cloud: &PointCloud, params: &PoissonParams) -> ScanResult<PoissonResult> {
    params.validate()?;
    if cloud.is_empty() {
        return Err(ScanError::EmptyPointCloud);
    }
    let missing = cloud.missing_normals();
    if missing > 0 {
        return Err(ScanError::MissingNormals {
            missing,
            total: cloud.len(),
        });
    }

    let samples: Vec<(Point3<f64>, Vector3<f64>)> = cloud
        .points
        .iter()
        .filter_map(|p| {
            let n = p.normal?.try_normalize(1e-12)?;
            p.position
                .iter()
                .all(|v| v.is_finite())
                .then_some((p.position, n))
        })
        .collect();
    if samples.is_empty() {
        return Err(ScanError::ReconstructionFailed {
            reason: "no finite samples with non-zero normals".to_string(),
        });
    }
    let positions: Vec<Point3<f64>> = samples.iter().map(|(p, _)| *p).collect();

    let bounds = mesh_types::Aabb::from_points(positions.iter());
    let domain = Domain::around(&bounds, params.scale).ok_or_else(|| {
        ScanError::ReconstructionFailed {
            reason: "point cloud has zero extent".to_string(),
        }
    })?;

    info!(
        samples = samples.len(),
        depth = params.depth,
        full_depth = params.coarsest_depth(),
        domain = domain.size,
        "Starting Poisson reconstruction"
    );

    // Band widths never exceed the grid, so the cast cannot wrap
    #[allow(clippy::cast_possible_wrap)]
    let band = params.band.min(1 << MAX_DEPTH) as i32;

    let mut levels: Vec<Level> = Vec::new();
    let mut stats = Vec::new();
    for depth in params.coarsest_depth()..=params.depth {
        let mut level = if levels.is_empty() {
            Level::dense(depth, &domain)
        } else {
            Level::banded(depth, &domain, &positions, band)
        };
        level.splat(&domain, &samples);

        let level_stats = solve_level(&levels, &mut level, &domain, params);
        debug!(
            depth,
            active = level_stats.active_cells,
            iterations = level_stats.iterations,
            residual = level_stats.relative_residual,
            "Solved Poisson level"
        );
        stats.push(level_stats);
        levels.push(level);
    }

    let Some(finest) = levels.last() else {
        return Err(ScanError::ReconstructionFailed {
            reason: "no solver levels".to_string(),
        });
    };

    #[allow(clippy::cast_precision_loss)]
    let iso_value = positions
        .iter()
        .map(|p| sample_chi(&levels, &domain, p))
        .sum::<f64>()
        / positions.len() as f64;

    let mesh = surface_nets::extract(finest, &domain, iso_value);
    let densities: Vec<f64> = mesh
        .vertices
        .par_iter()
        .map(|v| finest.weight_at(&domain, &v.position))
        .collect();

    info!(
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        iso = iso_value,
        "Poisson reconstruction complete"
    );

    Ok(PoissonResult {
        mesh,
        densities,
        iso_value,
        levels: stats,
    })
}

/// Builds and solves the stencil system of `level`.
///
/// Neighbours outside the active set take their value from the coarser
/// levels, and neighbours outside the grid are zero.
fn solve_level(coarser: &[Level], level: &mut Level, domain: &Domain, params: &PoissonParams) -> LevelStats {
    let h = level.cell_size;
    let lvl: &Level = level;

    let rows: Vec<([u32; 6], f64, f64)> = lvl
        .cells
        .par_iter()
        .map(|&cell| {
            let mut neighbors = [FIXED; 6];
            let mut divergence = 0.0;
            let mut fixed_sum = 0.0;

            for (slot, step) in FACE_NEIGHBORS.iter().enumerate() {
                let nb = offset(cell, *step);
                match lvl.index_of(nb) {
                    Some(j) => {
                        // Unknown counts fit u32 for supported depths
                        #[allow(clippy::cast_possible_truncation)]
                        {
                            neighbors[slot] = j as u32;
                        }
                        let axis = slot / 2;
                        let sign = if slot % 2 == 0 { -1.0 } else { 1.0 };
                        divergence += sign * lvl.field[j][axis];
                    }
                    None if lvl.in_grid(nb) => {
                        fixed_sum += sample_chi(coarser, domain, &lvl.cell_center(domain, nb));
                    }
                    None => {}
                }
            }

            let guess = sample_chi(coarser, domain, &lvl.cell_center(domain, cell));
            let rhs = -(divergence / (2.0 * h)) * h * h + fixed_sum;
            (neighbors, rhs, guess)
        })
        .collect();

    let mut neighbors = Vec::with_capacity(rows.len());
    let mut rhs = Vec::with_capacity(rows.len());
    let mut guess = Vec::with_capacity(rows.len());
    for (n, b, x) in rows {
        neighbors.push(n);
        rhs.push(b);
        guess.push(x);
    }

    let system = StencilSystem {
        neighbors,
        rhs: DVector::from_vec(rhs),
    };
    let mut x = DVector::from_vec(guess);
    let report = system.solve(&mut x, params.cg_max_iterations, params.cg_tolerance);

    level.chi = x.as_slice().to_vec();
    LevelStats {
        depth: level.depth,
        active_cells: level.len(),
        iterations: report.iterations,
        relative_residual: report.relative_residual,
    }
}

/// Trilinear sample of `χ` on the finest of `levels`.
///
/// Corners outside that level's active set fall back to the next coarser
/// level. Corners outside the grid, and positions sampled with no levels at
/// all, read zero.
fn sample_chi(levels: &[Level], domain: &Domain, p: &Point3<f64>) -> f64 {
    let Some((level, coarser)) = levels.split_last() else {
        return 0.0;
    };
    level
        .stencil(domain, p)
        .corners()
        .map(|(cell, w)| {
            let value = if let Some(i) = level.index_of(cell) {
                level.chi[i]
            } else if level.in_grid(cell) {
                sample_chi(coarser, domain, &level.cell_center(domain, cell))
            } else {
                0.0
            };
            w * value
        })
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use mesh_repair::MeshAdjacency;

    fn sphere_cloud(radius: f64, rings: u32, segments: u32) -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..rings {
            for j in 0..segments {
                let theta = std::f64::consts::PI * (f64::from(i) + 0.5) / f64::from(rings);
                let phi = std::f64::consts::TAU * f64::from(j) / f64::from(segments);
                let n = Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
                cloud.add_point_with_normal(Point3::new(0.0, 0.0, 3.0) + n * radius, n);
            }
        }
        cloud
    }

    fn small_params() -> PoissonParams {
        PoissonParams::default().with_depth(5).with_full_depth(4)
    }

    #[test]
    fn test_default_params() {
        let params = PoissonParams::default();
        assert_eq!(params.depth, 8);
        assert_eq!(params.full_depth, 5);
        assert!((params.scale - 1.1).abs() < f64::EPSILON);
        assert_eq!(params.band, 2);
        assert_eq!(params.cg_max_iterations, 200);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        assert!(PoissonParams::default().with_depth(0).validate().is_err());
        assert!(PoissonParams::default().with_depth(13).validate().is_err());
        let dense = PoissonParams::default().with_depth(12).with_full_depth(12);
        assert!(dense.validate().is_err());
        assert!(dense.with_full_depth(8).validate().is_ok());
        assert!(PoissonParams::default().with_scale(0.5).validate().is_err());
        assert!(PoissonParams::default().with_band(0).validate().is_err());
    }

    #[test]
    fn test_empty_cloud() {
        let result = reconstruct_poisson(&PointCloud::new(), &small_params());
        assert!(matches!(result, Err(ScanError::EmptyPointCloud)));
    }

    #[test]
    fn test_missing_normals() {
        let cloud = PointCloud::from_positions(&[Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
        let result = reconstruct_poisson(&cloud, &small_params());
        assert!(matches!(result, Err(ScanError::MissingNormals { .. })));
    }

    #[test]
    fn test_single_point_has_no_extent() {
        let mut cloud = PointCloud::new();
        cloud.add_point_with_normal(Point3::new(0.0, 0.0, 1.0), Vector3::z());
        let result = reconstruct_poisson(&cloud, &small_params());
        assert!(matches!(result, Err(ScanError::ReconstructionFailed { .. })));
    }

    #[test]
    fn test_sphere_reconstruction() {
        let radius = 0.5;
        let cloud = sphere_cloud(radius, 40, 80);
        let result = reconstruct_poisson(&cloud, &small_params()).unwrap();

        assert!(!result.mesh.faces.is_empty());
        assert!(result.mesh.has_valid_indices());
        assert_eq!(result.densities.len(), result.mesh.vertices.len());
        assert_eq!(result.levels.len(), 2);
        assert_eq!(result.levels[0].active_cells, 16 * 16 * 16);

        let center = Point3::new(0.0, 0.0, 3.0);
        let mean_radius = result
            .mesh
            .vertices
            .iter()
            .map(|v| (v.position - center).norm())
            .sum::<f64>()
            / result.mesh.vertices.len() as f64;
        assert!((mean_radius - radius).abs() < 0.1 * radius);
    }

    #[test]
    fn test_sphere_faces_point_outward() {
        let cloud = sphere_cloud(0.5, 30, 60);
        let result = reconstruct_poisson(&cloud, &small_params()).unwrap();
        let center = Point3::new(0.0, 0.0, 3.0);
        let mesh = &result.mesh;

        let outward = mesh
            .faces
            .iter()
            .filter(|f| {
                let [a, b, c] = f.map(|i| mesh.vertices[i as usize].position);
                let n = (b - a).cross(&(c - a));
                let mid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
                n.dot(&(mid - center)) > 0.0
            })
            .count();
        assert!(outward as f64 > 0.95 * mesh.faces.len() as f64);
    }

    #[test]
    fn test_sphere_is_mostly_closed() {
        let cloud = sphere_cloud(0.5, 30, 60);
        let result = reconstruct_poisson(&cloud, &small_params()).unwrap();
        let adjacency = MeshAdjacency::build(&result.mesh.faces);
        assert!(adjacency.boundary_edge_count() * 50 < result.mesh.faces.len());
    }

    #[test]
    fn test_densities_are_positive_near_samples() {
        let cloud = sphere_cloud(0.5, 30, 60);
        let result = reconstruct_poisson(&cloud, &small_params()).unwrap();
        let positive = result.densities.iter().filter(|d| **d > 0.0).count();
        assert!(positive as f64 > 0.9 * result.densities.len() as f64);
        assert!(result.densities.iter().all(|d| *d >= 0.0));
    }

    #[test]
    fn test_reconstruction_is_deterministic() {
        let cloud = sphere_cloud(0.5, 20, 40);
        let a = reconstruct_poisson(&cloud, &small_params()).unwrap();
        let b = reconstruct_poisson(&cloud, &small_params()).unwrap();
        assert_eq!(a.mesh, b.mesh);
        assert_eq!(a.densities, b.densities);
    }

    #[test]
    fn test_full_depth_above_depth_is_single_dense_level() {
        let cloud = sphere_cloud(0.5, 20, 40);
        let params = PoissonParams::default().with_depth(4).with_full_depth(6);
        let result = reconstruct_poisson(&cloud, &params).unwrap();
        assert_eq!(result.levels.len(), 1);
        assert_eq!(result.levels[0].depth, 4);
    }
}
