//! File format parsers for importing sample geometries.
//!
//! Supported formats:
//! - [`.obj`](obj): Wavefront OBJ triangle meshes

pub mod obj;

use std::path::Path;

use thiserror::Error;

use crate::mesh::MeshShape;

/// Errors during geometry file parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Load a mesh shape from disk, dispatching on the file extension.
pub fn load_shape(path: &Path, scale: f64) -> Result<MeshShape, ParseError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "obj" => {
            let content = std::fs::read_to_string(path)?;
            Ok(MeshShape::new(obj::parse_obj(&content, scale)?))
        }
        other => Err(ParseError::UnsupportedFormat(other.to_string())),
    }
}
