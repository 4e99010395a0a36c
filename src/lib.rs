//! # Depth Texture
//!
//! Staging and upload pipeline that turns 8-bit depth frames into sampled
//! GPU textures.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`DepthProvider`] - Thread-safe bridge from depth producers to the render thread
//! - [`TextureResource`] - Host-mapped linear texture with its view and sampler
//! - [`memory`] - Host-visible memory type selection
//! - [`layout`] - Layout states and transition barrier masks
//! - Multiple backend support: Vulkan and Dummy (for testing)
//!
//! ## Example
//!
//! ```ignore
//! use depth_texture::{DepthProvider, DepthProviderConfig, DepthTextureSource};
//!
//! let provider = DepthProvider::new(DepthProviderConfig::default());
//! provider.init(device);
//!
//! // Any producer thread
//! provider.update_data(&frame, width, height);
//!
//! // Render thread, once per frame
//! if provider.update_texture() {
//!     // Rebind the new view and sampler
//! }
//! let binding = provider.texture();
//! ```

pub mod backend;
pub mod config;
pub mod depth_map;
pub mod error;
pub mod layout;
pub mod memory;
pub mod provider;
pub mod staging;
pub mod texture;
pub mod throttle;

// Re-export main types for convenience
pub use backend::TextureDevice;
#[cfg(feature = "dummy")]
pub use backend::dummy::DummyDevice;
#[cfg(feature = "vulkan-backend")]
pub use backend::vulkan::VulkanContext;
pub use config::{DepthProviderConfig, DepthSource, QualityTier, UploadPath};
pub use depth_map::DepthMap;
pub use error::{DepthError, DepthResult};
pub use layout::{TextureLayout, TransitionMasks};
pub use memory::{HostVisibleMemory, select_host_visible, select_memory_type};
pub use provider::{DepthProvider, DepthProviderStats, DepthTextureSource};
pub use staging::StagingBuffer;
pub use texture::{TextureBinding, TextureResource};
pub use throttle::{FramePermit, FrameThrottle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
