//! CPU-side staging storage for the latest depth frame.

use crate::error::{DepthError, DepthResult};

/// Latest depth frame written by a producer, waiting to be uploaded.
///
/// Storage only grows; a smaller frame reuses the front of the existing
/// allocation.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    dirty: bool,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a tightly packed `width`x`height` frame, replacing any frame
    /// not yet uploaded.
    ///
    /// Bytes beyond `width * height` are ignored.
    pub fn write(&mut self, data: &[u8], width: u32, height: u32) -> DepthResult<()> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .filter(|&len| len > 0 && data.len() >= len)
            .ok_or(DepthError::InvalidFrame {
                width,
                height,
                len: data.len(),
            })?;

        if self.bytes.len() < len {
            self.bytes.resize(len, 0);
        }
        self.bytes[..len].copy_from_slice(&data[..len]);
        self.width = width;
        self.height = height;
        self.dirty = true;
        Ok(())
    }

    /// The staged frame, `width * height` bytes.
    pub fn frame(&self) -> &[u8] {
        &self.bytes[..self.width as usize * self.height as usize]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// A frame has been staged since the last [`StagingBuffer::mark_clean`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Bytes currently reserved for frames.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }
}
