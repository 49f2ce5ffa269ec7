//! Per-triangle geometric data and queries.
//!
//! [`TriangleData`] carries everything a signed distance query needs from a
//! single triangle: vertex positions, an orthonormal local frame, and the
//! edge/vertex pseudonormals accumulated by the builder. The closest-point
//! search implements the algorithm from "Real-Time Collision Detection" by
//! Christer Ericson, extended to report which feature of the triangle holds
//! the closest point.

use nalgebra::{Matrix3, Point3, RowVector3, Vector3};

/// The feature of a triangle containing the closest point to a query.
///
/// Edge `k` connects vertices `k` and `(k + 1) % 3`; vertex `k` is the
/// triangle's `k`-th corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosestFeature {
    /// Closest point is strictly interior to the face.
    Face,
    /// Closest point lies on edge `k`.
    Edge(usize),
    /// Closest point is vertex `k`.
    Vertex(usize),
}

/// Immutable per-triangle record used by the SDF evaluators.
///
/// Pseudonormals are stored in the triangle's local frame as unnormalized
/// sums; only the sign of a dot product against them is ever consumed.
/// For a degenerate triangle the frame's normal row is zeroed, which marks
/// the face normal as unusable for sign classification.
#[derive(Debug, Clone)]
pub struct TriangleData {
    pub(crate) positions: [Point3<f64>; 3],
    /// World-to-local rotation; rows are tangent, bitangent, normal.
    pub(crate) frame: Matrix3<f64>,
    pub(crate) edge_pseudonormals: [Vector3<f64>; 3],
    pub(crate) vertex_pseudonormals: [Vector3<f64>; 3],
    pub(crate) degenerate: bool,
}

impl TriangleData {
    /// Build the record for one triangle, pseudonormals zeroed.
    ///
    /// A collapsed triangle (zero or non-finite cross product) gets a zero
    /// normal row from the start; the builder additionally flags it
    /// degenerate.
    pub(crate) fn new(p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>) -> Self {
        let cross = (p1 - p0).cross(&(p2 - p0));
        let normal = if cross.norm_squared().is_finite() {
            cross.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros)
        } else {
            Vector3::zeros()
        };
        let tangent = (p1 - p0)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::x);
        let bitangent = normal.cross(&tangent);

        #[rustfmt::skip]
        let frame = Matrix3::new(
            tangent.x,   tangent.y,   tangent.z,
            bitangent.x, bitangent.y, bitangent.z,
            normal.x,    normal.y,    normal.z,
        );

        Self {
            positions: [p0, p1, p2],
            frame,
            edge_pseudonormals: [Vector3::zeros(); 3],
            vertex_pseudonormals: [Vector3::zeros(); 3],
            degenerate: false,
        }
    }

    /// Flag the triangle as degenerate and zero the frame's normal row.
    pub(crate) fn mark_degenerate(&mut self) {
        self.degenerate = true;
        self.frame.set_row(2, &RowVector3::zeros());
    }

    /// The triangle's vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[Point3<f64>; 3] {
        &self.positions
    }

    /// Whether the triangle was classified as numerically collapsed.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Unit face normal, or the zero vector for a degenerate triangle.
    #[must_use]
    pub fn face_normal(&self) -> Vector3<f64> {
        self.frame.row(2).transpose()
    }

    /// Closest point on the triangle to `point`, and the feature holding it.
    #[must_use]
    pub fn closest_feature(&self, point: Point3<f64>) -> (Point3<f64>, ClosestFeature) {
        let [a, b, c] = self.positions;
        let ab = b - a;
        let ac = c - a;
        let ap = point - a;

        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return (a, ClosestFeature::Vertex(0));
        }

        let bp = point - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return (b, ClosestFeature::Vertex(1));
        }

        // Edge AB. The denominator guard skips collapsed edges instead of
        // dividing 0/0.
        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 && d1 - d3 > 0.0 {
            let v = d1 / (d1 - d3);
            return (a + ab * v, ClosestFeature::Edge(0));
        }

        let cp = point - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return (c, ClosestFeature::Vertex(2));
        }

        // Edge CA
        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 && d2 - d6 > 0.0 {
            let w = d2 / (d2 - d6);
            return (a + ac * w, ClosestFeature::Edge(2));
        }

        // Edge BC
        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && d4 - d3 >= 0.0 && d5 - d6 >= 0.0 && (d4 - d3) + (d5 - d6) > 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return (b + (c - b) * w, ClosestFeature::Edge(1));
        }

        let denom = va + vb + vc;
        if denom <= f64::EPSILON {
            // Collapsed face region; the nearest edge stands in.
            let (closest, k) = self.nearest_edge(point);
            return (closest, ClosestFeature::Edge(k));
        }

        let v = vb / denom;
        let w = vc / denom;
        (a + ab * v + ac * w, ClosestFeature::Face)
    }

    /// Squared Euclidean distance from `point` to the triangle.
    #[must_use]
    pub fn distance_squared(&self, point: Point3<f64>) -> f64 {
        let (closest, _) = self.closest_feature(point);
        (point - closest).norm_squared()
    }

    /// Signed distance from `point` to the triangle.
    ///
    /// The sign comes from the face normal when the closest point is
    /// interior to a non-degenerate face, otherwise from the pseudonormal of
    /// the closest edge or vertex. Negative means the query point lies on
    /// the inner side of the surface.
    #[must_use]
    pub fn signed_distance(&self, point: Point3<f64>) -> f64 {
        let (closest, feature) = self.closest_feature(point);
        let dir = point - closest;

        let dot = match feature {
            ClosestFeature::Face if !self.degenerate => dir.dot(&self.face_normal()),
            // Degenerate triangles never classify by face normal.
            ClosestFeature::Face => {
                let (_, k) = self.nearest_edge(point);
                (self.frame * dir).dot(&self.edge_pseudonormals[k])
            }
            ClosestFeature::Edge(k) => (self.frame * dir).dot(&self.edge_pseudonormals[k]),
            ClosestFeature::Vertex(k) => (self.frame * dir).dot(&self.vertex_pseudonormals[k]),
        };

        let dist = dir.norm();
        if dot >= 0.0 {
            dist
        } else {
            -dist
        }
    }

    /// Closest point over the three boundary edges and the edge index.
    fn nearest_edge(&self, point: Point3<f64>) -> (Point3<f64>, usize) {
        let mut best_dist_sq = f64::INFINITY;
        let mut best = (self.positions[0], 0);
        for k in 0..3 {
            let closest =
                closest_point_on_segment(point, self.positions[k], self.positions[(k + 1) % 3]);
            let dist_sq = (point - closest).norm_squared();
            if dist_sq < best_dist_sq {
                best_dist_sq = dist_sq;
                best = (closest, k);
            }
        }
        best
    }
}

/// Closest point on segment `ab` to `point`.
fn closest_point_on_segment(point: Point3<f64>, a: Point3<f64>, b: Point3<f64>) -> Point3<f64> {
    let ab = b - a;
    let t = (point - a).dot(&ab) / ab.norm_squared().max(f64::EPSILON);
    a + ab * t.clamp(0.0, 1.0)
}
