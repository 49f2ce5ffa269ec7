//! Precomputed uniform-grid signed distance evaluator.

use mesh_types::{Aabb, IndexedMesh};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::info;

use crate::build::{build_triangle_data, BuildReport};
use crate::error::{SdfError, SdfResult};
use crate::exact::nearest_signed_distance;

/// Signed distance field sampled on a dense uniform grid.
///
/// Every grid node is evaluated against the full triangle set once at
/// construction (O(T·G)); queries then cost O(1) via trilinear
/// interpolation of the 8 surrounding nodes.
///
/// Values are stored in a flat row-major array with X varying fastest,
/// then Y, then Z.
///
/// # Example
///
/// ```
/// use mesh_sdf::GridSdf;
/// use mesh_types::{unit_cube, Point3};
///
/// let mesh = unit_cube();
/// let grid = GridSdf::new(&mesh, mesh.bounds(), 0.25)?;
///
/// let d = grid.distance(Point3::new(0.5, 0.5, 0.5))?;
/// assert!(d < 0.0); // inside
/// # Ok::<(), mesh_sdf::SdfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GridSdf {
    /// Node values, row-major with X fastest-varying.
    values: Vec<f64>,
    /// Node counts (nx, ny, nz).
    dimensions: (usize, usize, usize),
    /// Grid-aligned box actually covered by the nodes.
    bounds: Aabb,
    /// Spacing between adjacent nodes.
    cell_size: f64,
    report: BuildReport,
}

impl GridSdf {
    /// Build the grid by sampling the exact field at every node.
    ///
    /// Node counts per axis are `ceil(extent / cell_size) + 1`, with a
    /// minimum of 2 nodes so every contained point has a full cell around
    /// it. The stored box is recomputed grid-aligned from the requested
    /// minimum corner and may extend slightly beyond the requested maximum.
    ///
    /// # Errors
    ///
    /// Returns [`SdfError::InvalidCellSize`] unless `cell_size` is positive
    /// and finite, and [`SdfError::EmptyMesh`] if the mesh has no faces.
    pub fn new(mesh: &IndexedMesh, bounds: Aabb, cell_size: f64) -> SdfResult<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(SdfError::InvalidCellSize(cell_size));
        }
        let (triangles, report) = build_triangle_data(mesh)?;

        let extent = bounds.size();
        // Extents are non-negative and finite here, so the cast is exact.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nodes = |e: f64| ((e / cell_size).ceil() as usize).max(1) + 1;
        let (nx, ny, nz) = (nodes(extent.x), nodes(extent.y), nodes(extent.z));
        info!(nx, ny, nz, "uniform grid dimensions");

        let min = bounds.min;
        #[allow(clippy::cast_precision_loss)]
        let max = min
            + Vector3::new(
                cell_size * (nx - 1) as f64,
                cell_size * (ny - 1) as f64,
                cell_size * (nz - 1) as f64,
            );
        let bounds = Aabb::new(min, max);

        let mut values = vec![0.0; nx * ny * nz];
        values
            .par_chunks_mut(nx * ny)
            .enumerate()
            .for_each(|(z, slab)| {
                for y in 0..ny {
                    for x in 0..nx {
                        #[allow(clippy::cast_precision_loss)]
                        let node = Point3::new(
                            min.x + x as f64 * cell_size,
                            min.y + y as f64 * cell_size,
                            min.z + z as f64 * cell_size,
                        );
                        slab[y * nx + x] = nearest_signed_distance(&triangles, node);
                    }
                }
            });

        Ok(Self {
            values,
            dimensions: (nx, ny, nz),
            bounds,
            cell_size,
            report,
        })
    }

    /// Signed distance at `point` by trilinear interpolation.
    ///
    /// # Errors
    ///
    /// Returns [`SdfError::OutOfBounds`] when `point` lies outside the
    /// grid-aligned box (boundary inclusive).
    pub fn distance(&self, point: Point3<f64>) -> SdfResult<f64> {
        let (nx, ny, nz) = self.dimensions;
        let frac = (point - self.bounds.min) / self.cell_size;

        #[allow(clippy::cast_precision_loss)]
        let in_range = (0.0..=(nx - 1) as f64).contains(&frac.x)
            && (0.0..=(ny - 1) as f64).contains(&frac.y)
            && (0.0..=(nz - 1) as f64).contains(&frac.z);
        if !in_range {
            return Err(SdfError::OutOfBounds {
                x: point.x,
                y: point.y,
                z: point.z,
            });
        }

        // Clamp to the last cell so the max corner stays sampleable.
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let cell = |f: f64, n: usize| {
            let i = (f.floor() as usize).min(n - 2);
            (i, f - i as f64)
        };
        let (ix, tx) = cell(frac.x, nx);
        let (iy, ty) = cell(frac.y, ny);
        let (iz, tz) = cell(frac.z, nz);

        let v = |x: usize, y: usize, z: usize| self.values[x + y * nx + z * nx * ny];

        // Interpolate along X, then Y, then Z.
        let d00 = v(ix, iy, iz) * (1.0 - tx) + v(ix + 1, iy, iz) * tx;
        let d01 = v(ix, iy + 1, iz) * (1.0 - tx) + v(ix + 1, iy + 1, iz) * tx;
        let d10 = v(ix, iy, iz + 1) * (1.0 - tx) + v(ix + 1, iy, iz + 1) * tx;
        let d11 = v(ix, iy + 1, iz + 1) * (1.0 - tx) + v(ix + 1, iy + 1, iz + 1) * tx;

        let d0 = d00 * (1.0 - ty) + d01 * ty;
        let d1 = d10 * (1.0 - ty) + d11 * ty;

        Ok(d0 * (1.0 - tz) + d1 * tz)
    }

    /// Node counts per axis (nx, ny, nz).
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize, usize) {
        self.dimensions
    }

    /// The grid-aligned box covered by the stored nodes.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Spacing between adjacent grid nodes.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Stored value at node coordinates, or `None` out of range.
    #[must_use]
    pub fn get(&self, ix: usize, iy: usize, iz: usize) -> Option<f64> {
        let (nx, ny, nz) = self.dimensions;
        if ix < nx && iy < ny && iz < nz {
            Some(self.values[ix + iy * nx + iz * nx * ny])
        } else {
            None
        }
    }

    /// Defect counts from precomputation.
    #[must_use]
    pub fn report(&self) -> &BuildReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::unit_cube;

    fn cube_grid(cell_size: f64) -> GridSdf {
        let mesh = unit_cube();
        let bounds = mesh.bounds();
        GridSdf::new(&mesh, bounds, cell_size).unwrap()
    }

    #[test]
    fn rejects_bad_cell_size() {
        let mesh = unit_cube();
        let bounds = mesh.bounds();
        assert!(matches!(
            GridSdf::new(&mesh, bounds, 0.0),
            Err(SdfError::InvalidCellSize(_))
        ));
        assert!(matches!(
            GridSdf::new(&mesh, bounds, -1.0),
            Err(SdfError::InvalidCellSize(_))
        ));
        assert!(matches!(
            GridSdf::new(&mesh, bounds, f64::NAN),
            Err(SdfError::InvalidCellSize(_))
        ));
    }

    #[test]
    fn rejects_empty_mesh() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(matches!(
            GridSdf::new(&IndexedMesh::new(), bounds, 0.25),
            Err(SdfError::EmptyMesh)
        ));
    }

    #[test]
    fn unit_cube_dimensions() {
        let grid = cube_grid(0.25);
        assert_eq!(grid.dimensions(), (5, 5, 5));
        assert_relative_eq!(grid.bounds().max.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn bounds_are_grid_aligned() {
        // 1.0 / 0.3 -> 4 cells -> 5 nodes spanning 1.2: the stored box
        // extends past the requested one
        let grid = cube_grid(0.3);
        assert_eq!(grid.dimensions(), (5, 5, 5));
        assert_relative_eq!(grid.bounds().max.x, 1.2, epsilon = 1e-12);
        assert_relative_eq!(grid.bounds().min.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn node_values_match_exact_search() {
        let grid = cube_grid(0.5);
        // Node (1,1,1) sits at the cube center
        assert_relative_eq!(grid.get(1, 1, 1).unwrap(), -0.5, epsilon = 1e-12);
        // Corner node on the surface
        assert!(grid.get(0, 0, 0).unwrap().abs() < 1e-12);
    }

    #[test]
    fn query_at_node_returns_node_value() {
        let grid = cube_grid(0.25);
        let d = grid.distance(Point3::new(0.5, 0.5, 0.5)).unwrap();
        assert_relative_eq!(d, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn query_interpolates_between_nodes() {
        let grid = cube_grid(0.25);
        // Halfway between nodes at x = 0.25 (-0.25) and x = 0.5 (-0.5)
        let d = grid.distance(Point3::new(0.375, 0.5, 0.5)).unwrap();
        assert_relative_eq!(d, -0.375, epsilon = 1e-12);
    }

    #[test]
    fn max_corner_is_sampleable() {
        let grid = cube_grid(0.25);
        let d = grid.distance(Point3::new(1.0, 1.0, 1.0)).unwrap();
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let grid = cube_grid(0.25);
        assert!(matches!(
            grid.distance(Point3::new(2.0, 0.5, 0.5)),
            Err(SdfError::OutOfBounds { .. })
        ));
        assert!(matches!(
            grid.distance(Point3::new(0.5, -0.1, 0.5)),
            Err(SdfError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn get_out_of_range_is_none() {
        let grid = cube_grid(0.5);
        assert!(grid.get(10, 0, 0).is_none());
    }

    #[test]
    fn zero_extent_box_still_samples() {
        let mesh = unit_cube();
        let center = Point3::new(0.5, 0.5, 0.5);
        let grid = GridSdf::new(&mesh, Aabb::new(center, center), 0.25).unwrap();
        assert_eq!(grid.dimensions(), (2, 2, 2));
        let d = grid.distance(center).unwrap();
        assert_relative_eq!(d, -0.5, epsilon = 1e-12);
    }
}
