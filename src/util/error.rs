//! Error types for the lightbake library.

use thiserror::Error;

/// Main error type for bake operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Mesh lacks the second UV channel required as the baking-space unwrap
    #[error("Mesh has no second UV channel")]
    MissingUv2,

    /// Object has no renderable mesh
    #[error("Object {0} has no mesh")]
    MeshUnavailable(u32),

    /// Vertex buffer layout does not match its declared element mask
    #[error("Invalid vertex data: {0}")]
    InvalidVertexData(String),

    /// Renderer failed to service a capture request
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for bake operations.
pub type Result<T> = std::result::Result<T, Error>;
