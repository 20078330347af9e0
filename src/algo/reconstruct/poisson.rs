//! Multi-level Poisson solve for the indicator function.
//!
//! Sample normals are splatted trilinearly onto the nodes of a regular grid,
//! giving a discrete vector field `V`. The indicator `χ` solves `Δχ = ∇·V`
//! with the 7-point Laplacian and central-difference divergence, and `χ = 0`
//! on the faces of the root cube. With outward normals `χ` ends up lower
//! inside the surface than outside.
//!
//! The coarsest level is solved on the full grid. Every finer level solves
//! only for the nodes of cells within a band around occupied cells; nodes
//! just outside the band are held at values interpolated from the coarser
//! solution, which also seeds the conjugate gradient iteration.

use hashbrown::{HashMap, HashSet};
use nalgebra::{DVector, Point3, Vector3};
use rayon::prelude::*;

use super::octree::{CellKey, Octree};
use super::sparse::{conjugate_gradient, CsrMatrix};

/// Knobs of the linear solves.
#[derive(Debug, Clone, Copy)]
pub(super) struct SolverSettings {
    pub band: u32,
    pub max_iterations: usize,
    pub tolerance: f64,
}

/// Node values of one grid level.
#[derive(Debug, Clone)]
struct LevelSolution {
    cells: u32,
    h: f64,
    values: HashMap<CellKey, f64>,
}

impl LevelSolution {
    /// Trilinear interpolation at `p`, or `None` when a weighted corner has
    /// no value at this level.
    fn interpolate(&self, origin: &Point3<f64>, p: &Point3<f64>) -> Option<f64> {
        let n = f64::from(self.cells);
        let mut base = [0u32; 3];
        let mut t = [0.0f64; 3];
        for axis in 0..3 {
            let g = ((p[axis] - origin[axis]) / self.h).clamp(0.0, n);
            let c = g.floor().min(n - 1.0);
            base[axis] = c as u32;
            t[axis] = g - c;
        }

        let mut value = 0.0;
        for bits in 0..8u32 {
            let mut w = 1.0;
            let mut node = base;
            for axis in 0..3 {
                if bits >> axis & 1 == 1 {
                    w *= t[axis];
                    node[axis] += 1;
                } else {
                    w *= 1.0 - t[axis];
                }
            }
            if w == 0.0 {
                continue;
            }
            let v = if is_boundary(&node, self.cells) {
                0.0
            } else {
                *self.values.get(&node)?
            };
            value += w * v;
        }
        Some(value)
    }
}

/// The solved indicator function across all levels.
#[derive(Debug, Clone)]
pub(super) struct IndicatorField {
    origin: Point3<f64>,
    size: f64,
    levels: Vec<LevelSolution>,
}

impl IndicatorField {
    /// Value at an arbitrary point, from the finest level that covers it.
    pub fn value_at(&self, p: &Point3<f64>) -> f64 {
        self.levels
            .iter()
            .rev()
            .find_map(|level| level.interpolate(&self.origin, p))
            .unwrap_or(0.0)
    }

    /// Cells per axis of the finest level.
    pub fn finest_cells(&self) -> u32 {
        self.levels.last().map(|l| l.cells).unwrap_or(1)
    }

    /// Cell size of the finest level.
    pub fn finest_cell_size(&self) -> f64 {
        self.size / f64::from(self.finest_cells())
    }

    /// Position of a node of the finest level.
    pub fn node_position(&self, node: &CellKey) -> Point3<f64> {
        node_position(&self.origin, self.finest_cell_size(), node)
    }

    /// Value at a node of the finest level.
    pub fn node_value(&self, node: &CellKey) -> f64 {
        let Some(finest) = self.levels.last() else {
            return 0.0;
        };
        if is_boundary(node, finest.cells) {
            return 0.0;
        }
        match finest.values.get(node) {
            Some(&v) => v,
            None => self.value_at(&self.node_position(node)),
        }
    }
}

/// Solve every level from `base_depth` to `depth`.
///
/// Returns the field and the cells of the finest level to extract from.
pub(super) fn solve(
    octree: &Octree,
    positions: &[Point3<f64>],
    normals: &[Vector3<f64>],
    depth: usize,
    base_depth: usize,
    settings: SolverSettings,
) -> (IndicatorField, Vec<CellKey>) {
    let base = base_depth.min(depth);
    let mut field = IndicatorField {
        origin: octree.origin(),
        size: octree.size(),
        levels: Vec::with_capacity(depth - base + 1),
    };

    let n = 1u32 << base;
    let interior: Vec<CellKey> = grid_keys(1, n - 1);
    let level = solve_level(&field, positions, normals, base, interior, settings);
    field.levels.push(level);

    let mut cells = grid_keys(0, n - 1);
    for d in base + 1..=depth {
        let band = band_cells(octree.occupied(d).keys(), settings.band, 1 << d);
        let unknowns = corner_nodes(&band, 1 << d);
        let level = solve_level(&field, positions, normals, d, unknowns, settings);
        field.levels.push(level);
        cells = band;
    }

    (field, cells)
}

/// Assemble and solve the system for one level.
fn solve_level(
    field: &IndicatorField,
    positions: &[Point3<f64>],
    normals: &[Vector3<f64>],
    depth: usize,
    unknowns: Vec<CellKey>,
    settings: SolverSettings,
) -> LevelSolution {
    let cells = 1u32 << depth;
    let h = field.size / f64::from(cells);
    let splat = splat_normals(&field.origin, h, cells, positions, normals);
    let index: HashMap<CellKey, usize> = unknowns.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    let coarse = |node: &CellKey| -> f64 {
        if is_boundary(node, cells) || field.levels.is_empty() {
            0.0
        } else {
            field.value_at(&node_position(&field.origin, h, node))
        }
    };

    let rows: Vec<(Vec<(usize, usize, f64)>, f64, f64)> = unknowns
        .par_iter()
        .enumerate()
        .map(|(row, node)| {
            let mut entries = Vec::with_capacity(7);
            entries.push((row, row, 6.0));
            let mut rhs = -divergence(&splat, node, h);

            for axis in 0..3 {
                for step in [-1i64, 1] {
                    let mut nb = *node;
                    nb[axis] = (i64::from(nb[axis]) + step) as u32;
                    match index.get(&nb) {
                        Some(&col) => entries.push((row, col, -1.0)),
                        None => rhs += coarse(&nb),
                    }
                }
            }
            (entries, rhs, coarse(node))
        })
        .collect();

    let n = unknowns.len();
    let mut triplets = Vec::with_capacity(7 * n);
    let mut rhs = Vec::with_capacity(n);
    let mut guess = Vec::with_capacity(n);
    for (entries, b, x0) in rows {
        triplets.extend(entries);
        rhs.push(b);
        guess.push(x0);
    }

    let a = CsrMatrix::from_triplets(n, n, triplets);
    let solution = conjugate_gradient(
        &a,
        &DVector::from_vec(rhs),
        Some(&DVector::from_vec(guess)),
        settings.max_iterations,
        settings.tolerance,
    );

    if solution.converged {
        log::debug!(
            "level {}: {} unknowns, {} CG iterations (residual {:.2e})",
            depth,
            n,
            solution.iterations,
            solution.relative_residual
        );
    } else {
        log::warn!(
            "level {}: CG stopped after {} iterations with residual {:.2e}",
            depth,
            solution.iterations,
            solution.relative_residual
        );
    }

    LevelSolution {
        cells,
        h,
        values: unknowns.into_iter().zip(solution.x.iter().copied()).collect(),
    }
}

/// Trilinearly splat the normals onto grid nodes.
fn splat_normals(
    origin: &Point3<f64>,
    h: f64,
    cells: u32,
    positions: &[Point3<f64>],
    normals: &[Vector3<f64>],
) -> HashMap<CellKey, Vector3<f64>> {
    let n = f64::from(cells);
    let mut splat: HashMap<CellKey, Vector3<f64>> = HashMap::with_capacity(positions.len() * 2);

    for (p, normal) in positions.iter().zip(normals) {
        let mut base = [0u32; 3];
        let mut t = [0.0f64; 3];
        for axis in 0..3 {
            let g = ((p[axis] - origin[axis]) / h).clamp(0.0, n);
            let c = g.floor().min(n - 1.0);
            base[axis] = c as u32;
            t[axis] = g - c;
        }

        for bits in 0..8u32 {
            let mut w = 1.0;
            let mut node = base;
            for axis in 0..3 {
                if bits >> axis & 1 == 1 {
                    w *= t[axis];
                    node[axis] += 1;
                } else {
                    w *= 1.0 - t[axis];
                }
            }
            if w > 0.0 {
                *splat.entry(node).or_insert_with(Vector3::zeros) += normal * w;
            }
        }
    }

    splat
}

/// Central-difference divergence of the splatted field, divided by `h`.
fn divergence(splat: &HashMap<CellKey, Vector3<f64>>, node: &CellKey, h: f64) -> f64 {
    let component = |key: CellKey, axis: usize| splat.get(&key).map(|v| v[axis]).unwrap_or(0.0);
    let mut sum = 0.0;
    for axis in 0..3 {
        let mut forward = *node;
        forward[axis] += 1;
        let mut backward = *node;
        backward[axis] -= 1;
        sum += component(forward, axis) - component(backward, axis);
    }
    sum / (2.0 * h * h)
}

/// Cells within Chebyshev distance `band` of an occupied cell, sorted.
fn band_cells<'a>(occupied: impl Iterator<Item = &'a CellKey>, band: u32, cells: u32) -> Vec<CellKey> {
    let band = i64::from(band);
    let limit = i64::from(cells);
    let mut set: HashSet<CellKey> = HashSet::new();
    for cell in occupied {
        for dz in -band..=band {
            for dy in -band..=band {
                for dx in -band..=band {
                    let key = [
                        i64::from(cell[0]) + dx,
                        i64::from(cell[1]) + dy,
                        i64::from(cell[2]) + dz,
                    ];
                    if key.iter().all(|&c| c >= 0 && c < limit) {
                        set.insert([key[0] as u32, key[1] as u32, key[2] as u32]);
                    }
                }
            }
        }
    }
    let mut sorted: Vec<CellKey> = set.into_iter().collect();
    sorted.sort_unstable();
    sorted
}

/// Interior corner nodes of a set of cells, sorted.
fn corner_nodes(cells: &[CellKey], grid: u32) -> Vec<CellKey> {
    let mut set: HashSet<CellKey> = HashSet::with_capacity(cells.len() * 2);
    for cell in cells {
        for bits in 0..8u32 {
            let node = [
                cell[0] + (bits & 1),
                cell[1] + (bits >> 1 & 1),
                cell[2] + (bits >> 2 & 1),
            ];
            if !is_boundary(&node, grid) {
                set.insert(node);
            }
        }
    }
    let mut sorted: Vec<CellKey> = set.into_iter().collect();
    sorted.sort_unstable();
    sorted
}

/// All keys with every coordinate in `lo..=hi`, sorted.
fn grid_keys(lo: u32, hi: u32) -> Vec<CellKey> {
    let mut keys = Vec::new();
    for x in lo..=hi {
        for y in lo..=hi {
            for z in lo..=hi {
                keys.push([x, y, z]);
            }
        }
    }
    keys
}

fn is_boundary(node: &CellKey, cells: u32) -> bool {
    node.iter().any(|&c| c == 0 || c >= cells)
}

fn node_position(origin: &Point3<f64>, h: f64, node: &CellKey) -> Point3<f64> {
    origin + Vector3::new(f64::from(node[0]), f64::from(node[1]), f64::from(node[2])) * h
}
