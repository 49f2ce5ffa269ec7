//! Error types for SDF operations.

use thiserror::Error;

/// Result type for SDF operations.
pub type SdfResult<T> = Result<T, SdfError>;

/// Errors that can occur during SDF construction or queries.
#[derive(Debug, Error)]
pub enum SdfError {
    /// Mesh has no faces.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Grid cell size is zero, negative, or not finite.
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),

    /// Query point is outside the sampled grid range.
    #[error("point ({x}, {y}, {z}) is outside the sampled grid")]
    OutOfBounds {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
        /// Z coordinate.
        z: f64,
    },
}
