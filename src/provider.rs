//! Depth texture providers.
//!
//! A provider sits between depth producers (inference or sensor threads)
//! and the render thread. Producers stage frames with
//! [`DepthTextureSource::update_data`] at whatever rate they run; once per
//! rendered frame the render thread calls
//! [`DepthTextureSource::update_texture`] to move the latest frame into GPU
//! memory, then [`DepthTextureSource::texture`] to bind it.
//!
//! All state lives behind one mutex per provider. The lock is held across
//! GPU work only while a texture is being recreated.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::TextureDevice;
use crate::config::{DepthProviderConfig, DepthSource, UploadPath};
use crate::staging::StagingBuffer;
use crate::texture::{TextureBinding, TextureResource};

/// Something that turns staged depth frames into a bindable texture.
pub trait DepthTextureSource: Send + Sync {
    type Device: TextureDevice;

    /// Attach to a device and create the placeholder texture.
    fn init(&self, device: Arc<Self::Device>);

    /// Stage a tightly packed `width`x`height` frame. Never touches the GPU.
    fn update_data(&self, data: &[u8], width: u32, height: u32);

    /// Upload the staged frame if there is a new one.
    ///
    /// Returns true when the texture was recreated and must be rebound.
    fn update_texture(&self) -> bool;

    /// Current texture for binding.
    fn texture(&self) -> TextureBinding;

    /// Release GPU resources. Safe to call at any time, any number of times.
    fn destroy(&self);
}

/// Counters describing what a provider has done so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthProviderStats {
    /// Frames accepted into the staging buffer.
    pub frames_staged: u64,
    /// Staged frames copied into texture memory.
    pub uploads: u64,
    /// Textures recreated because the frame size changed.
    pub recreations: u64,
    /// Frames rejected as malformed.
    pub dropped_frames: u64,
}

struct ProviderState<D: TextureDevice> {
    device: Option<Arc<D>>,
    texture: TextureResource<D>,
    staging: StagingBuffer,
    generation: u64,
    stats: DepthProviderStats,
}

/// Depth provider over a [`TextureDevice`].
pub struct DepthProvider<D: TextureDevice> {
    config: DepthProviderConfig,
    state: Mutex<ProviderState<D>>,
}

impl<D: TextureDevice> DepthProvider<D> {
    pub fn new(config: DepthProviderConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ProviderState {
                device: None,
                texture: TextureResource::empty(),
                staging: StagingBuffer::new(),
                generation: 0,
                stats: DepthProviderStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &DepthProviderConfig {
        &self.config
    }

    pub fn source(&self) -> DepthSource {
        self.config.source
    }

    pub fn stats(&self) -> DepthProviderStats {
        self.state.lock().stats
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().device.is_some()
    }

    /// Read back a texel of the current texture through its mapping.
    pub fn texel(&self, x: u32, y: u32) -> Option<u8> {
        self.state.lock().texture.texel(x, y)
    }
}

impl<D: TextureDevice> Default for DepthProvider<D> {
    fn default() -> Self {
        Self::new(DepthProviderConfig::default())
    }
}

impl<D: TextureDevice> DepthTextureSource for DepthProvider<D> {
    type Device = D;

    fn init(&self, device: Arc<D>) {
        let mut state = self.state.lock();
        if state.device.is_some() {
            log::warn!(
                "{}: already initialized, releasing previous texture",
                self.config.label
            );
            state.texture.release();
        }

        state.texture = TextureResource::create(Arc::clone(&device), 1, 1);
        if !state.texture.fill(self.config.placeholder_value) {
            log::error!("{}: placeholder texture is not mapped", self.config.label);
        }
        state.generation += 1;
        state.staging.mark_clean();
        state.device = Some(device);

        log::info!(
            "{}: initialized {} depth provider",
            self.config.label,
            self.config.source.name()
        );
    }

    fn update_data(&self, data: &[u8], width: u32, height: u32) {
        let mut state = self.state.lock();
        if state.device.is_none() {
            log::debug!(
                "{}: ignoring {}x{} frame, provider not initialized",
                self.config.label,
                width,
                height
            );
            return;
        }

        match state.staging.write(data, width, height) {
            Ok(()) => state.stats.frames_staged += 1,
            Err(e) => {
                log::warn!("{}: dropping frame: {}", self.config.label, e);
                state.stats.dropped_frames += 1;
            }
        }
    }

    fn update_texture(&self) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(device) = state.device.clone() else {
            return false;
        };
        if !state.staging.is_dirty() {
            return false;
        }

        let (width, height) = state.staging.dimensions();
        let mut recreated = false;
        if state.texture.extent() != (width, height) {
            log::debug!(
                "{}: resizing depth texture {:?} -> {}x{}",
                self.config.label,
                state.texture.extent(),
                width,
                height
            );
            state.texture.release();
            state.texture = TextureResource::create(device, width, height);
            state.generation += 1;
            state.stats.recreations += 1;
            recreated = true;
        }

        let copied = match self.config.upload_path {
            UploadPath::StagedCopy => state.texture.upload(state.staging.frame()),
        };
        if copied {
            state.stats.uploads += 1;
        } else {
            log::trace!("{}: depth texture not mapped, skipping copy", self.config.label);
        }
        state.staging.mark_clean();

        recreated
    }

    fn texture(&self) -> TextureBinding {
        let state = self.state.lock();
        state.texture.binding(state.generation)
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        if state.device.take().is_some() {
            log::debug!("{}: destroying depth provider", self.config.label);
        }
        state.texture.release();
        state.staging = StagingBuffer::new();
    }
}

impl<D: TextureDevice> Drop for DepthProvider<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
