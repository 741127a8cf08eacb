//! Error types for GPU texture operations.

use std::fmt;

use super::TextureHandle;

/// Errors raised by a [`GpuDevice`](super::GpuDevice) or the block texture manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The device lacks a feature the payload format needs.
    MissingCapability(String),
    /// A block texture would exceed the device's size limit.
    TextureTooLarge { width: u32, height: u32, max: u32 },
    /// The device context is gone; every texture is invalid.
    ContextLost,
    /// The handle does not name a live texture.
    UnknownTexture(TextureHandle),
    /// Upload data does not match the target region.
    InvalidUpload { expected: usize, actual: usize },
    /// The device refused to allocate.
    AllocationFailed(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::MissingCapability(what) => write!(f, "Missing GPU capability: {}", what),
            GpuError::TextureTooLarge { width, height, max } => {
                write!(f, "Texture {}×{} exceeds device limit {}", width, height, max)
            }
            GpuError::ContextLost => write!(f, "GPU context lost"),
            GpuError::UnknownTexture(handle) => write!(f, "Unknown texture {}", handle),
            GpuError::InvalidUpload { expected, actual } => {
                write!(f, "Invalid upload: expected {} bytes, got {}", expected, actual)
            }
            GpuError::AllocationFailed(msg) => write!(f, "Texture allocation failed: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_error_display_missing_capability() {
        let err = GpuError::MissingCapability("float textures".to_string());
        assert_eq!(err.to_string(), "Missing GPU capability: float textures");
    }

    #[test]
    fn test_gpu_error_display_too_large() {
        let err = GpuError::TextureTooLarge {
            width: 8192,
            height: 8,
            max: 4096,
        };
        assert_eq!(err.to_string(), "Texture 8192×8 exceeds device limit 4096");
    }

    #[test]
    fn test_gpu_error_display_invalid_upload() {
        let err = GpuError::InvalidUpload {
            expected: 4096,
            actual: 12,
        };
        assert_eq!(err.to_string(), "Invalid upload: expected 4096 bytes, got 12");
    }

    #[test]
    fn test_gpu_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(GpuError::ContextLost);
        assert_eq!(err.to_string(), "GPU context lost");
    }
}
