//! Signed distance fields for triangle meshes.
//!
//! Converts an [`mesh_types::IndexedMesh`] into a queryable signed distance
//! field: negative inside the enclosed volume, positive outside, zero on
//! the surface.
//!
//! A plain "nearest face normal" sign test is wrong near the edges and
//! vertices of non-convex meshes. This crate precomputes angle-weighted
//! **pseudonormals** (Thürmer–Wüthrich) per edge and vertex during
//! construction, repairing degenerate triangles and non-manifold edges
//! along the way, and uses the pseudonormal of whichever triangle feature
//! is closest to decide the sign.
//!
//! Two evaluators share that precomputation:
//!
//! - [`ExactSdf`] answers queries by brute-force nearest-triangle search,
//!   O(T) per query.
//! - [`GridSdf`] samples the exact field on a dense uniform grid once and
//!   answers queries in O(1) via trilinear interpolation.
//!
//! # Example
//!
//! ```
//! use mesh_sdf::{ExactSdf, GridSdf};
//! use mesh_types::{unit_cube, Point3};
//!
//! let mesh = unit_cube();
//!
//! let sdf = ExactSdf::new(&mesh)?;
//! assert!(sdf.distance(Point3::new(0.5, 0.5, 0.5)) < 0.0);
//!
//! let grid = GridSdf::new(&mesh, mesh.bounds(), 0.25)?;
//! assert!(grid.distance(Point3::new(0.5, 0.5, 0.5))? < 0.0);
//! # Ok::<(), mesh_sdf::SdfError>(())
//! ```
//!
//! # Mesh requirements
//!
//! The sign is meaningful for closed meshes with consistent outward (CCW)
//! winding. Minor defects are tolerated: numerically collapsed triangles
//! are folded into their neighbors, and edges left open by duplicated
//! vertices are repaired by an epsilon vertex merge. Remaining defects are
//! reported through [`BuildReport`] and the `tracing` side-channel, never
//! as errors.

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod build;
mod error;
mod exact;
mod grid;
mod triangle;

pub use build::{build_triangle_data, BuildReport};
pub use error::{SdfError, SdfResult};
pub use exact::{signed_distance, ExactSdf};
pub use grid::GridSdf;
pub use triangle::{ClosestFeature, TriangleData};
