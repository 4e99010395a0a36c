//! Depth texture error types.

use ash::vk;
use thiserror::Error;

/// Errors produced while allocating or uploading depth textures.
///
/// Provider operations never return these across the staging/update boundary;
/// they are logged there. Lower-level calls (memory selection, device
/// operations) return them to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DepthError {
    #[error("no compatible memory type for type bits {type_bits:#034b} with flags {required:?}")]
    NoCompatibleMemoryType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },
    #[error("failed to create resource: {0}")]
    ResourceCreationFailed(String),
    #[error("failed to map memory: {0}")]
    MapFailed(String),
    #[error("failed to submit commands: {0}")]
    SubmissionFailed(String),
    #[error("invalid depth frame {width}x{height} with {len} bytes")]
    InvalidFrame { width: u32, height: u32, len: usize },
}

pub type DepthResult<T> = Result<T, DepthError>;
