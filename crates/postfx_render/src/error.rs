//! Error types for render passes

use thiserror::Error;

use crate::resource::TextureHandle;

/// Render pass errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PassError {
    /// A required shader or material reference is unset or could not be found
    #[error("Missing resource: {0}")]
    MissingResource(String),

    /// The requested target descriptor is degenerate (e.g. 0x0 during a resize)
    #[error("Cannot allocate target '{name}' at {width}x{height}")]
    AllocationFailed {
        name: String,
        width: u32,
        height: u32,
    },

    /// A target handle is not bound this frame
    #[error("Texture handle {0:?} is not bound")]
    InvalidHandle(TextureHandle),

    /// The scratch target would be read and written by the same draw
    #[error("Scratch target {0:?} aliases the source or destination")]
    AliasedTarget(TextureHandle),

    /// The pass was used after disposal
    #[error("Pass '{0}' is disposed")]
    Disposed(String),

    /// Configuration data could not be applied
    #[error("Invalid configuration for '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    /// Host backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl PassError {
    /// Whether the error only affects the current frame.
    ///
    /// Frame-local errors are absorbed by skipping the pass's work for one
    /// frame; the next frame starts from a clean slate.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. } | Self::InvalidHandle(_))
    }
}

/// Result type for pass operations
pub type Result<T> = std::result::Result<T, PassError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_local_classification() {
        let zero = PassError::AllocationFailed {
            name: "_BlurTexture".into(),
            width: 0,
            height: 0,
        };
        assert!(zero.is_frame_local());
        assert!(PassError::InvalidHandle(TextureHandle::NONE).is_frame_local());
        assert!(!PassError::MissingResource("shader".into()).is_frame_local());
        assert!(!PassError::Backend("device lost".into()).is_frame_local());
    }

    #[test]
    fn test_error_display() {
        let err = PassError::AllocationFailed {
            name: "_FilterTexture".into(),
            width: 0,
            height: 720,
        };
        let msg = err.to_string();
        assert!(msg.contains("_FilterTexture"));
        assert!(msg.contains("0x720"));
    }
}
