// Copyright @yucwang 2026

//! Error types shared by the scene loader, the integrators and the
//! standalone renderer.

use thiserror::Error;

/// Failure while reading a scene description.
#[derive(Error, Debug)]
pub enum SceneLoadError {
    /// Scene file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed XML
    #[error("XML error: {0}")]
    Xml(String),

    /// Attribute value could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Required attribute is missing
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Reference to an undeclared id
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// Element type the loader does not know
    #[error("unsupported {kind}: {name}")]
    Unsupported { kind: &'static str, name: String },
}

/// Failure while flattening, rendering or persisting a scene.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    SceneLoad(#[from] SceneLoadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXR encoding failed: {0}")]
    Exr(#[from] exr::error::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Resume file exists but is truncated or corrupt
    #[error("invalid resume data: {0}")]
    InvalidResumeData(String),

    /// Resume file is well-formed but was written for a different setup
    #[error("resume data does not match the scene: {0}")]
    IncompatibleResumeData(String),

    #[error("scene has no emitters")]
    NoEmitters,

    #[error("camera has an empty resolution")]
    EmptyResolution,

    #[error("a render pass is already in flight")]
    PassInFlight,

    #[error("render worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, RenderError>;
