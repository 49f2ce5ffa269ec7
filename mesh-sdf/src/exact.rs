//! Exact brute-force signed distance evaluator.

use mesh_types::IndexedMesh;
use nalgebra::Point3;

use crate::build::{build_triangle_data, BuildReport};
use crate::error::SdfResult;
use crate::triangle::TriangleData;

/// Exact signed distance field over a triangle mesh.
///
/// Precomputes pseudonormal data once, then answers each query with a
/// linear scan over all triangles: O(T) per query, no extra memory.
/// For dense sampling prefer [`crate::GridSdf`].
///
/// # Example
///
/// ```
/// use mesh_sdf::ExactSdf;
/// use mesh_types::{unit_cube, Point3};
///
/// let sdf = ExactSdf::new(&unit_cube())?;
/// assert!(sdf.distance(Point3::new(0.5, 0.5, 0.5)) < 0.0); // inside
/// assert!(sdf.distance(Point3::new(2.0, 0.5, 0.5)) > 0.0); // outside
/// # Ok::<(), mesh_sdf::SdfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ExactSdf {
    triangles: Vec<TriangleData>,
    report: BuildReport,
}

impl ExactSdf {
    /// Build the evaluator from a mesh.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SdfError::EmptyMesh`] if the mesh has no faces.
    pub fn new(mesh: &IndexedMesh) -> SdfResult<Self> {
        let (triangles, report) = build_triangle_data(mesh)?;
        Ok(Self { triangles, report })
    }

    /// Signed distance from `point` to the mesh surface.
    ///
    /// Negative inside, positive outside, zero on the surface. The sign is
    /// meaningful for closed meshes with consistent outward winding.
    #[must_use]
    pub fn distance(&self, point: Point3<f64>) -> f64 {
        nearest_signed_distance(&self.triangles, point)
    }

    /// Absolute distance from `point` to the mesh surface.
    #[must_use]
    pub fn unsigned_distance(&self, point: Point3<f64>) -> f64 {
        self.distance(point).abs()
    }

    /// Closest point on the mesh surface to `point`.
    #[must_use]
    pub fn closest_point(&self, point: Point3<f64>) -> Point3<f64> {
        let mut min_dist_sq = f64::INFINITY;
        let mut closest = point;
        for tri in &self.triangles {
            let (candidate, _) = tri.closest_feature(point);
            let dist_sq = (point - candidate).norm_squared();
            if dist_sq < min_dist_sq {
                min_dist_sq = dist_sq;
                closest = candidate;
            }
        }
        closest
    }

    /// Number of triangles backing the field.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Defect counts from precomputation.
    #[must_use]
    pub fn report(&self) -> &BuildReport {
        &self.report
    }
}

/// Brute-force nearest-triangle signed distance.
///
/// Ties in squared distance keep the lowest triangle index.
pub(crate) fn nearest_signed_distance(triangles: &[TriangleData], point: Point3<f64>) -> f64 {
    let mut min_dist_sq = f64::INFINITY;
    let mut nearest = 0;
    for (t, tri) in triangles.iter().enumerate() {
        let dist_sq = tri.distance_squared(point);
        if dist_sq < min_dist_sq {
            min_dist_sq = dist_sq;
            nearest = t;
        }
    }
    triangles[nearest].signed_distance(point)
}

/// One-off signed distance query without keeping the evaluator.
///
/// Precomputes triangle data on every call; for repeated queries build an
/// [`ExactSdf`] once and reuse it.
///
/// # Errors
///
/// Returns [`crate::SdfError::EmptyMesh`] if the mesh has no faces.
pub fn signed_distance(point: Point3<f64>, mesh: &IndexedMesh) -> SdfResult<f64> {
    let (triangles, _) = build_triangle_data(mesh)?;
    Ok(nearest_signed_distance(&triangles, point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::unit_cube;

    #[test]
    fn empty_mesh_is_rejected() {
        assert!(ExactSdf::new(&IndexedMesh::new()).is_err());
    }

    #[test]
    fn cube_center_is_inside() {
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        let d = sdf.distance(Point3::new(0.5, 0.5, 0.5));
        assert_relative_eq!(d, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn cube_outside_distance() {
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        assert_relative_eq!(
            sdf.distance(Point3::new(2.0, 0.5, 0.5)),
            1.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            sdf.distance(Point3::new(0.5, 0.5, -0.75)),
            0.75,
            epsilon = 1e-12
        );
    }

    #[test]
    fn cube_face_point_is_on_surface() {
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        let d = sdf.distance(Point3::new(0.0, 0.5, 0.5));
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn cube_vertices_are_on_surface() {
        let mesh = unit_cube();
        let sdf = ExactSdf::new(&mesh).unwrap();
        for vertex in &mesh.vertices {
            assert!(sdf.distance(vertex.position).abs() < 1e-12);
        }
    }

    #[test]
    fn sign_is_correct_near_reflex_features() {
        // Near a cube corner the nearest feature is a vertex; a plain face
        // normal test is ambiguous there, the pseudonormal is not.
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        assert!(sdf.distance(Point3::new(-0.1, -0.1, -0.1)) > 0.0);
        assert!(sdf.distance(Point3::new(0.05, 0.05, 0.05)) < 0.0);
        // Near an edge
        assert!(sdf.distance(Point3::new(-0.1, 0.5, -0.1)) > 0.0);
        assert!(sdf.distance(Point3::new(0.05, 0.5, 0.05)) < 0.0);
    }

    #[test]
    fn unsigned_distance_is_magnitude() {
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        assert_relative_eq!(
            sdf.unsigned_distance(Point3::new(0.5, 0.5, 0.5)),
            0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn closest_point_projects_to_face() {
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        let closest = sdf.closest_point(Point3::new(0.5, 0.25, 2.0));
        assert_relative_eq!(closest.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(closest.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(closest.y, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn standalone_matches_evaluator() {
        let mesh = unit_cube();
        let sdf = ExactSdf::new(&mesh).unwrap();
        let p = Point3::new(1.4, 0.3, 0.7);
        assert_relative_eq!(
            signed_distance(p, &mesh).unwrap(),
            sdf.distance(p),
            epsilon = 1e-12
        );
    }

    #[test]
    fn triangle_count_matches_mesh() {
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        assert_eq!(sdf.triangle_count(), 12);
        assert_eq!(sdf.report().triangle_count, 12);
    }
}
