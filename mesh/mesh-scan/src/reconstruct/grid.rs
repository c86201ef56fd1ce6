//! Cell-centred grid levels for the Poisson solver.
//!
//! A level at depth `L` divides the cubic domain into `2^L` cells per axis.
//! Only active cells are stored: every cell for the coarse dense level, and
//! a band around the samples for the finer levels. Values live at cell
//! centres, so grid coordinate `g = (p - origin) / h - 0.5` puts cell
//! `(i, j, k)` at integer `g`.

// Grid indices stay far below i32::MAX for the supported depths
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use hashbrown::{HashMap, HashSet};
use mesh_types::Aabb;
use nalgebra::{Point3, Vector3};

/// Integer cell coordinates.
pub(crate) type Cell = [i32; 3];

/// The six face-neighbour offsets, `-x, +x, -y, +y, -z, +z`.
pub(crate) const FACE_NEIGHBORS: [Cell; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Packs non-negative cell coordinates into a sortable key.
///
/// Keys order cells by `x`, then `y`, then `z`.
#[allow(clippy::cast_sign_loss)]
pub(crate) const fn pack(c: Cell) -> u64 {
    ((c[0] as u64) << 42) | ((c[1] as u64) << 21) | (c[2] as u64)
}

pub(crate) const fn offset(c: Cell, d: Cell) -> Cell {
    [c[0] + d[0], c[1] + d[1], c[2] + d[2]]
}

/// Cubic reconstruction domain.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Domain {
    pub origin: Point3<f64>,
    pub size: f64,
}

impl Domain {
    /// Cube centred on `bounds`, with side `max_extent * scale`.
    ///
    /// Returns `None` when the bounds have no extent.
    pub fn around(bounds: &Aabb, scale: f64) -> Option<Self> {
        let size = bounds.max_extent() * scale;
        if !(size.is_finite() && size > 0.0) {
            return None;
        }
        let half = Vector3::repeat(size * 0.5);
        Some(Self {
            origin: bounds.center() - half,
            size,
        })
    }
}

/// Trilinear stencil: the base cell and the fractional offsets from it.
pub(crate) struct Stencil {
    base: Cell,
    frac: [f64; 3],
}

impl Stencil {
    /// The eight corner cells with their weights. Zero weights are skipped.
    pub fn corners(&self) -> impl Iterator<Item = (Cell, f64)> + '_ {
        (0..8).filter_map(move |corner| {
            let mut cell = self.base;
            let mut weight = 1.0;
            for axis in 0..3 {
                if corner >> axis & 1 == 1 {
                    cell[axis] += 1;
                    weight *= self.frac[axis];
                } else {
                    weight *= 1.0 - self.frac[axis];
                }
            }
            (weight > 0.0).then_some((cell, weight))
        })
    }
}

/// One resolution level of the solver.
#[derive(Debug, Clone)]
pub(crate) struct Level {
    pub depth: u32,
    /// Cells per axis.
    pub resolution: i32,
    /// Cell edge length.
    pub cell_size: f64,
    /// Active cells, sorted by key.
    pub cells: Vec<Cell>,
    lookup: HashMap<u64, u32>,
    /// Splatted normal field per active cell, per unit volume.
    pub field: Vec<Vector3<f64>>,
    /// Splatted sample weight per active cell.
    pub weight: Vec<f64>,
    /// Solved indicator function per active cell.
    pub chi: Vec<f64>,
}

impl Level {
    fn with_cells(depth: u32, domain: &Domain, cells: Vec<Cell>) -> Self {
        let resolution = 1i32 << depth;
        let lookup = cells
            .iter()
            .enumerate()
            .map(|(i, c)| (pack(*c), i as u32))
            .collect();
        let n = cells.len();
        Self {
            depth,
            resolution,
            cell_size: domain.size / f64::from(resolution),
            cells,
            lookup,
            field: vec![Vector3::zeros(); n],
            weight: vec![0.0; n],
            chi: vec![0.0; n],
        }
    }

    /// Level where every cell is active.
    pub fn dense(depth: u32, domain: &Domain) -> Self {
        let n = 1i32 << depth;
        let mut cells = Vec::with_capacity((n as usize).pow(3));
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    cells.push([i, j, k]);
                }
            }
        }
        Self::with_cells(depth, domain, cells)
    }

    /// Level whose active cells lie within `band` cells (Chebyshev distance)
    /// of a cell containing a sample.
    pub fn banded(depth: u32, domain: &Domain, samples: &[Point3<f64>], band: i32) -> Self {
        let n = 1i32 << depth;
        let h = domain.size / f64::from(n);

        let occupied: HashSet<Cell> = samples
            .iter()
            .map(|p| {
                let g = (p - domain.origin) / h;
                [
                    (g.x.floor() as i32).clamp(0, n - 1),
                    (g.y.floor() as i32).clamp(0, n - 1),
                    (g.z.floor() as i32).clamp(0, n - 1),
                ]
            })
            .collect();

        let mut active: HashSet<Cell> = HashSet::with_capacity(occupied.len() * 8);
        for c in &occupied {
            for di in -band..=band {
                for dj in -band..=band {
                    for dk in -band..=band {
                        let cell = offset(*c, [di, dj, dk]);
                        if cell.iter().all(|&v| (0..n).contains(&v)) {
                            active.insert(cell);
                        }
                    }
                }
            }
        }

        let mut cells: Vec<Cell> = active.into_iter().collect();
        cells.sort_unstable_by_key(|c| pack(*c));
        Self::with_cells(depth, domain, cells)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn in_grid(&self, c: Cell) -> bool {
        c.iter().all(|&v| (0..self.resolution).contains(&v))
    }

    pub fn index_of(&self, c: Cell) -> Option<usize> {
        if !self.in_grid(c) {
            return None;
        }
        self.lookup.get(&pack(c)).map(|&i| i as usize)
    }

    pub fn cell_center(&self, domain: &Domain, c: Cell) -> Point3<f64> {
        domain.origin
            + Vector3::new(
                f64::from(c[0]) + 0.5,
                f64::from(c[1]) + 0.5,
                f64::from(c[2]) + 0.5,
            ) * self.cell_size
    }

    pub fn stencil(&self, domain: &Domain, p: &Point3<f64>) -> Stencil {
        let g = (p - domain.origin) / self.cell_size - Vector3::repeat(0.5);
        let base = [
            g.x.floor() as i32,
            g.y.floor() as i32,
            g.z.floor() as i32,
        ];
        Stencil {
            base,
            frac: [
                g.x - f64::from(base[0]),
                g.y - f64::from(base[1]),
                g.z - f64::from(base[2]),
            ],
        }
    }

    /// Distributes each oriented sample over its eight surrounding cells.
    ///
    /// Corners outside the active set drop their share.
    pub fn splat(&mut self, domain: &Domain, samples: &[(Point3<f64>, Vector3<f64>)]) {
        let inv_volume = 1.0 / self.cell_size.powi(3);
        for (position, normal) in samples {
            let stencil = self.stencil(domain, position);
            for (cell, w) in stencil.corners() {
                if let Some(i) = self.index_of(cell) {
                    self.field[i] += normal * (w * inv_volume);
                    self.weight[i] += w;
                }
            }
        }
    }

    /// Trilinearly interpolated splat weight at `p`.
    pub fn weight_at(&self, domain: &Domain, p: &Point3<f64>) -> f64 {
        self.stencil(domain, p)
            .corners()
            .filter_map(|(cell, w)| self.index_of(cell).map(|i| w * self.weight[i]))
            .sum()
    }
}
