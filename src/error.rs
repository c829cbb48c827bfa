/// Error types surfaced by loaders, scene edits and configuration.
/// The per-frame rendering path never returns these; it discards bad
/// geometry and records it in the frame statistics instead.
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Malformed mesh, material or texture data.
    #[error("invalid asset {source_name}{}: {message}", .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    InvalidAsset {
        source_name: String,
        line: Option<usize>,
        message: String,
    },

    /// A referenced file does not exist.
    #[error("resource not found: {}", .path.display())]
    ResourceNotFound { path: PathBuf },

    /// Scene graph edit that would break the forest invariant, or that
    /// names a node which no longer exists.
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn invalid_asset(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAsset {
            source_name: source_name.into(),
            line: None,
            message: message.into(),
        }
    }

    pub fn invalid_asset_at(
        source_name: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAsset {
            source_name: source_name.into(),
            line: Some(line),
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::ResourceNotFound { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_asset_message_names_line() {
        let err = RenderError::invalid_asset_at("cube.obj", 12, "bad vertex");
        assert_eq!(err.to_string(), "invalid asset cube.obj (line 12): bad vertex");

        let err = RenderError::invalid_asset("tex.png", "decode failed");
        assert_eq!(err.to_string(), "invalid asset tex.png: decode failed");
    }
}
