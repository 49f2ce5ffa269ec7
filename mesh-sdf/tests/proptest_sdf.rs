//! Property-based tests for signed distance evaluation.
//!
//! These tests use proptest to generate random query points and meshes and
//! verify invariants against the analytic unit-cube distance.
//!
//! Run with: cargo test -p mesh-sdf -- proptest

use mesh_sdf::{ExactSdf, GridSdf};
use mesh_types::{unit_cube, IndexedMesh, Point3, Vertex};
use nalgebra::Vector3;
use proptest::prelude::*;

// =============================================================================
// Strategies and analytic ground truth
// =============================================================================

/// Generate a query point in a box comfortably larger than the unit cube.
fn arb_query_point() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-1.0..2.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Generate a query point strictly inside the unit cube bounds.
fn arb_interior_point() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(0.0..1.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Generate a random vertex position in a bounded range.
fn arb_vertex() -> impl Strategy<Value = Vertex> {
    prop::array::uniform3(-10.0..10.0f64).prop_map(|[x, y, z]| Vertex::from_coords(x, y, z))
}

/// Generate a mesh with random vertices and random (possibly repeated,
/// possibly degenerate) faces over them.
fn arb_mesh(max_vertices: usize, max_faces: usize) -> impl Strategy<Value = IndexedMesh> {
    prop::collection::vec(arb_vertex(), 3..=max_vertices).prop_flat_map(move |verts| {
        let n = verts.len() as u32;
        let face = prop::array::uniform3(0..n);
        prop::collection::vec(face, 1..=max_faces).prop_map(move |faces| IndexedMesh {
            vertices: verts.clone(),
            faces,
        })
    })
}

/// Analytic signed distance from `p` to the axis-aligned unit cube.
fn analytic_cube_distance(p: Point3<f64>) -> f64 {
    let q = Vector3::new(
        (p.x - 0.5).abs() - 0.5,
        (p.y - 0.5).abs() - 0.5,
        (p.z - 0.5).abs() - 0.5,
    );
    let outside = Vector3::new(q.x.max(0.0), q.y.max(0.0), q.z.max(0.0)).norm();
    let inside = q.x.max(q.y).max(q.z).min(0.0);
    outside + inside
}

// =============================================================================
// Property Tests: Exact evaluator vs analytic cube
// =============================================================================

proptest! {
    /// The magnitude of the signed distance matches the analytic cube
    /// distance everywhere, including on and near the surface.
    #[test]
    fn exact_magnitude_matches_analytic(p in arb_query_point()) {
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        let expected = analytic_cube_distance(p).abs();
        prop_assert!((sdf.distance(p).abs() - expected).abs() < 1e-9);
    }

    /// Away from the surface the sign matches the analytic inside test.
    /// Points within 1e-3 of the surface are excluded: the analytic value
    /// and the pseudonormal dot can legitimately disagree at rounding scale.
    #[test]
    fn exact_sign_matches_analytic(p in arb_query_point()) {
        let expected = analytic_cube_distance(p);
        prop_assume!(expected.abs() > 1e-3);

        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        prop_assert_eq!(sdf.distance(p).signum(), expected.signum());
    }

    /// The closest surface point realizes the unsigned distance and lies
    /// on the surface.
    #[test]
    fn closest_point_realizes_distance(p in arb_query_point()) {
        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        let closest = sdf.closest_point(p);

        prop_assert!(((p - closest).norm() - sdf.unsigned_distance(p)).abs() < 1e-9);
        prop_assert!(analytic_cube_distance(closest).abs() < 1e-9);
    }

    /// Translating mesh and query together leaves the distance unchanged.
    #[test]
    fn distance_is_translation_invariant(
        p in arb_query_point(),
        offset in prop::array::uniform3(-5.0..5.0f64),
    ) {
        let offset = Vector3::new(offset[0], offset[1], offset[2]);
        let mut shifted = unit_cube();
        for vertex in &mut shifted.vertices {
            vertex.position += offset;
        }

        let sdf = ExactSdf::new(&unit_cube()).unwrap();
        let shifted_sdf = ExactSdf::new(&shifted).unwrap();
        prop_assert!((sdf.distance(p) - shifted_sdf.distance(p + offset)).abs() < 1e-9);
    }
}

// =============================================================================
// Property Tests: Grid evaluator
// =============================================================================

proptest! {
    /// Every in-bounds query succeeds and stays within one cell of the
    /// exact field.
    #[test]
    fn grid_tracks_exact_inside_bounds(p in arb_interior_point()) {
        let mesh = unit_cube();
        let cell = 0.25;
        let grid = GridSdf::new(&mesh, mesh.bounds(), cell).unwrap();
        let exact = ExactSdf::new(&mesh).unwrap();

        let d = grid.distance(p).unwrap();
        prop_assert!(d.is_finite());
        prop_assert!((d - exact.distance(p)).abs() <= cell);
    }
}

// =============================================================================
// Property Tests: Robustness on arbitrary meshes
// =============================================================================

proptest! {
    /// Construction and querying never panic on garbage meshes, and the
    /// result is always finite. Random faces are full of duplicated
    /// indices and collapsed triangles; those degrade, never crash.
    #[test]
    fn arbitrary_meshes_never_panic(mesh in arb_mesh(20, 40), p in arb_query_point()) {
        let sdf = ExactSdf::new(&mesh).unwrap();
        prop_assert!(sdf.distance(p).is_finite());
        prop_assert!(sdf.unsigned_distance(p) >= 0.0);
    }
}
