//! Per-mesh pseudonormal precomputation.
//!
//! Transforms a raw indexed mesh into the [`TriangleData`] sequence the
//! evaluators query, tolerating minor mesh defects:
//!
//! 1. a parallel per-triangle feature pass classifies numerically collapsed
//!    triangles,
//! 2. a sequential pairing pass matches edges between incident faces and
//!    accumulates angle-weighted vertex pseudonormals (Thürmer–Wüthrich),
//! 3. degenerate triangles are reinterpreted as zero-width edges joining
//!    their non-degenerate neighbors,
//! 4. edges still unmatched are repaired by merging coincident vertices
//!    through a union-find, and
//! 5. the accumulated vertex pseudonormals are written back into every
//!    triangle corner in its local frame.
//!
//! Geometric defects never fail the build; they are counted in the returned
//! [`BuildReport`] and logged.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use mesh_types::IndexedMesh;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{error, info};

use crate::error::{SdfError, SdfResult};
use crate::triangle::TriangleData;

/// Triangles with area below this are candidates for degeneracy.
const DEGENERATE_AREA_THRESHOLD: f64 = 1e-5;

/// Slenderness (height relative to the longest edge, scaled by tan 30°)
/// below which a small triangle counts as collapsed rather than a
/// legitimately thin sliver.
const SLENDERNESS_THRESHOLD: f64 = 0.02;

/// Squared distance under which two boundary vertices are merged.
const VERTEX_MERGE_EPSILON_SQ: f64 = 1e-5;

/// Defect counts gathered while building triangle data.
///
/// Construction succeeds even when defects remain; callers that care can
/// inspect the counts here instead of scraping log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Total triangles in the mesh.
    pub triangle_count: usize,
    /// Triangles classified as numerically collapsed.
    pub degenerate_triangles: usize,
    /// Edges left unmatched after pairing and degenerate reinterpretation.
    pub open_edges: usize,
    /// Unmatched edges that paired up after coincident-vertex merging.
    pub repaired_edges: usize,
    /// Edges that remained unmatched after merging; triangles touching them
    /// keep only their own pseudonormal contributions.
    pub unrepaired_edges: usize,
}

/// Compute per-triangle pseudonormal data for a mesh.
///
/// # Errors
///
/// Returns [`SdfError::EmptyMesh`] if the mesh has no faces. Geometric
/// defects (degenerate triangles, non-manifold or open edges) are never
/// errors; they degrade gracefully and are counted in the report.
pub fn build_triangle_data(mesh: &IndexedMesh) -> SdfResult<(Vec<TriangleData>, BuildReport)> {
    if mesh.faces.is_empty() {
        return Err(SdfError::EmptyMesh);
    }

    let pos = |i: u32| mesh.vertices[i as usize].position;

    // Phase 1: independent per-triangle features.
    let seeds: Vec<(TriangleData, Option<usize>)> = mesh
        .faces
        .par_iter()
        .map(|&[i0, i1, i2]| {
            let corners = [pos(i0), pos(i1), pos(i2)];
            let mut data = TriangleData::new(corners[0], corners[1], corners[2]);
            let corner = degenerate_corner(&corners, &data);
            if corner.is_some() {
                data.mark_degenerate();
            }
            (data, corner)
        })
        .collect();

    let mut triangles: Vec<TriangleData> = Vec::with_capacity(seeds.len());
    let mut degenerate: Vec<(usize, usize)> = Vec::new();
    for (t, (data, corner)) in seeds.into_iter().enumerate() {
        if let Some(k) = corner {
            degenerate.push((t, k));
        }
        triangles.push(data);
    }
    if !degenerate.is_empty() {
        info!(count = degenerate.len(), "mesh has degenerate triangles");
    }

    // Phase 2: edge pairing and angle-weighted vertex accumulation.
    // Pending entries encode the incident face corner as 3 * triangle + k.
    let mut pending: HashMap<(u32, u32), usize> = HashMap::new();
    let mut vertex_accum: Vec<Vector3<f64>> = vec![Vector3::zeros(); mesh.vertices.len()];

    for (t, face) in mesh.faces.iter().enumerate() {
        if triangles[t].is_degenerate() {
            continue;
        }
        let face_normal = triangles[t].face_normal();
        for k in 0..3 {
            let v1 = face[k];
            let v2 = face[(k + 1) % 3];
            let v3 = face[(k + 2) % 3];

            match pending.entry(edge_key(v1, v2)) {
                Entry::Occupied(entry) => {
                    let other = entry.remove();
                    let edge_normal = face_normal + triangles[other / 3].face_normal();
                    set_edge_pseudonormal(&mut triangles, 3 * t + k, edge_normal);
                    set_edge_pseudonormal(&mut triangles, other, edge_normal);
                }
                Entry::Vacant(entry) => {
                    entry.insert(3 * t + k);
                }
            }

            let angle = interior_angle(pos(v1), pos(v2), pos(v3));
            vertex_accum[v1 as usize] += angle * face_normal;
        }
    }

    // Phase 3: a degenerate triangle is a zero-width sliver joining its
    // longest edge to the opposite vertex; stitch its neighbors together.
    for &(t, corner) in &degenerate {
        let face = mesh.faces[t];
        let v1 = face[corner];
        let v2 = face[(corner + 1) % 3];
        let v3 = face[(corner + 2) % 3];

        let mut edge_normal = Vector3::zeros();
        let mut adjacent: [Option<usize>; 3] = [None; 3];
        let mut resolvable = true;

        let base_key = edge_key(v1, v2);
        if let Some(&slot) = pending.get(&base_key) {
            edge_normal += triangles[slot / 3].face_normal();
            adjacent[0] = Some(slot);
        } else {
            resolvable = false;
        }

        // The longer of the two remaining edges must also have a live
        // neighbor; the third is folded in opportunistically below.
        let key_23 = edge_key(v2, v3);
        let key_31 = edge_key(v3, v1);
        let required = if (pos(v3) - pos(v2)).norm_squared() > (pos(v1) - pos(v3)).norm_squared() {
            key_23
        } else {
            key_31
        };
        if let Some(&slot) = pending.get(&required) {
            edge_normal += triangles[slot / 3].face_normal();
        } else {
            resolvable = false;
        }

        if !resolvable {
            // Isolated sliver, e.g. at a mesh boundary: best effort only.
            continue;
        }

        pending.remove(&base_key);
        if let Some(slot) = pending.remove(&key_23) {
            adjacent[1] = Some(slot);
        }
        if let Some(slot) = pending.remove(&key_31) {
            adjacent[2] = Some(slot);
        }

        for slot in adjacent.into_iter().flatten() {
            set_edge_pseudonormal(&mut triangles, slot, edge_normal);
        }

        for k in 0..3 {
            let a1 = face[k];
            let a2 = face[(k + 1) % 3];
            let a3 = face[(k + 2) % 3];
            let angle = interior_angle(pos(a1), pos(a2), pos(a3));
            vertex_accum[a1 as usize] += angle * edge_normal;
        }
    }

    // Phase 4: repair remaining open edges by merging coincident vertices.
    let open_edges = pending.len();
    let mut repaired_edges = 0;
    let mut unrepaired_edges = 0;

    if !pending.is_empty() {
        info!(
            open_edges,
            "mesh has unmatched edges, trying to merge coincident vertices"
        );

        let mut boundary_vertices: Vec<u32> =
            pending.keys().flat_map(|&(a, b)| [a, b]).collect();
        boundary_vertices.sort_unstable();
        boundary_vertices.dedup();

        let mut clusters = UnionFind::new(mesh.vertices.len());
        for (i, &vi) in boundary_vertices.iter().enumerate() {
            for &vj in &boundary_vertices[i + 1..] {
                if (pos(vi) - pos(vj)).norm_squared() < VERTEX_MERGE_EPSILON_SQ {
                    clusters.union(vi, vj);
                    break;
                }
            }
        }

        // Re-pair by cluster root; sorted order keeps the outcome
        // deterministic when three or more edges share a root key.
        let mut entries: Vec<((u32, u32), usize)> =
            pending.iter().map(|(&key, &slot)| (key, slot)).collect();
        entries.sort_unstable();

        let mut merged: HashMap<(u32, u32), usize> = HashMap::new();
        for (key, slot) in entries {
            let root_key = edge_key(clusters.find(key.0), clusters.find(key.1));
            match merged.entry(root_key) {
                Entry::Occupied(entry) => {
                    let other = entry.remove();
                    let edge_normal =
                        triangles[slot / 3].face_normal() + triangles[other / 3].face_normal();
                    set_edge_pseudonormal(&mut triangles, slot, edge_normal);
                    set_edge_pseudonormal(&mut triangles, other, edge_normal);
                    repaired_edges += 1;
                }
                Entry::Vacant(entry) => {
                    entry.insert(slot);
                }
            }
        }
        unrepaired_edges = merged.len();

        // Fold accumulated pseudonormals into cluster roots, then share the
        // combined value back to every member.
        for &v in &boundary_vertices {
            let root = clusters.find(v);
            if root != v {
                let contribution = vertex_accum[v as usize];
                vertex_accum[root as usize] += contribution;
            }
        }
        for &v in &boundary_vertices {
            let root = clusters.find(v);
            vertex_accum[v as usize] = vertex_accum[root as usize];
        }

        if unrepaired_edges > 0 {
            error!(
                unrepaired_edges,
                "non-manifold edges could not be repaired by vertex merging"
            );
        } else {
            info!("all unmatched edges repaired by vertex merging");
        }
    }

    // Phase 5: write the accumulated vertex pseudonormals into every corner.
    for (t, face) in mesh.faces.iter().enumerate() {
        for k in 0..3 {
            let local = triangles[t].frame * vertex_accum[face[k] as usize];
            triangles[t].vertex_pseudonormals[k] = local;
        }
    }

    let report = BuildReport {
        triangle_count: triangles.len(),
        degenerate_triangles: degenerate.len(),
        open_edges,
        repaired_edges,
        unrepaired_edges,
    };
    Ok((triangles, report))
}

/// Classify a triangle as collapsed; returns the corner starting its
/// longest edge when degenerate.
///
/// A triangle is degenerate when its area is near zero *and* it is far
/// slenderer than a 30° sliver, or when no usable face normal exists at
/// all (zero or non-finite cross product).
fn degenerate_corner(corners: &[Point3<f64>; 3], data: &TriangleData) -> Option<usize> {
    let area = 0.5 * (corners[1] - corners[0])
        .cross(&(corners[2] - corners[0]))
        .norm();

    let mut longest = 0;
    let mut longest_len = 0.0;
    for k in 0..3 {
        let len = (corners[(k + 1) % 3] - corners[k]).norm();
        if len > longest_len {
            longest_len = len;
            longest = k;
        }
    }

    let slenderness = 2.0 * area * 30.0_f64.to_radians().tan()
        / (longest_len * longest_len).max(f64::MIN_POSITIVE);
    let collapsed = area < DEGENERATE_AREA_THRESHOLD && slenderness < SLENDERNESS_THRESHOLD;

    if collapsed || !area.is_finite() || data.face_normal() == Vector3::zeros() {
        Some(longest)
    } else {
        None
    }
}

/// Store an edge pseudonormal into the slot encoded as `3 * triangle + k`,
/// transformed into that triangle's local frame.
fn set_edge_pseudonormal(triangles: &mut [TriangleData], slot: usize, edge_normal: Vector3<f64>) {
    let t = slot / 3;
    let local = triangles[t].frame * edge_normal;
    triangles[t].edge_pseudonormals[slot % 3] = local;
}

/// Interior angle at `apex` between the directions towards `a` and `b`.
///
/// The cosine is clamped to [-1, 1] before `acos`; zero-length directions
/// contribute a zero angle instead of NaN.
fn interior_angle(apex: Point3<f64>, a: Point3<f64>, b: Point3<f64>) -> f64 {
    let u = (a - apex).try_normalize(f64::EPSILON);
    let v = (b - apex).try_normalize(f64::EPSILON);
    match (u, v) {
        (Some(u), Some(v)) => u.dot(&v).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}

/// Edge key as a sorted vertex-index pair.
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

/// Array-backed union-find over the dense vertex-index range.
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    // Mesh indices are u32; vertex counts beyond that are unsupported.
    #[allow(clippy::cast_possible_truncation)]
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
        }
    }

    fn find(&mut self, mut v: u32) -> u32 {
        while self.parent[v as usize] != v {
            // path halving
            let grandparent = self.parent[self.parent[v as usize] as usize];
            self.parent[v as usize] = grandparent;
            v = grandparent;
        }
        v
    }

    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent[root_b as usize] = root_a;
        }
    }
}
