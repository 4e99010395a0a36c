//! Single-channel 8-bit depth maps.
//!
//! Producers hand the provider plain `&[u8]` rows; these helpers build such
//! maps from model output, or synthesize one when no model is available.

/// A tightly packed single-channel depth map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl DepthMap {
    /// A map filled with `value`.
    pub fn new(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap existing bytes. Returns `None` unless `data` holds exactly
    /// `width * height` bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Square map with a centred disc of 255 and 0 elsewhere.
///
/// Stands in for a subject segmentation when no model is loaded. The disc
/// radius is a third of `size`.
pub fn subject_disc(size: u32) -> DepthMap {
    let center = size as f32 / 2.0;
    let radius = size as f32 / 3.0;

    let data = (0..size)
        .flat_map(|y| (0..size).map(move |x| (x, y)))
        .map(|(x, y)| {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            if (dx * dx + dy * dy).sqrt() < radius {
                255
            } else {
                0
            }
        })
        .collect();

    DepthMap {
        width: size,
        height: size,
        data,
    }
}

/// Convert two-class segmentation logits to a depth map.
///
/// `logits` holds interleaved `[background, foreground]` pairs per pixel.
/// Each pixel becomes `sigmoid(foreground - background) * 255`. Returns
/// `None` if there are fewer than `width * height` pairs.
pub fn from_segmentation_logits(logits: &[f32], width: u32, height: u32) -> Option<DepthMap> {
    let pixels = width as usize * height as usize;
    if logits.len() < pixels * 2 {
        return None;
    }

    let data = logits
        .chunks_exact(2)
        .take(pixels)
        .map(|pair| {
            let probability = 1.0 / (1.0 + (-(pair[1] - pair[0])).exp());
            (probability * 255.0).clamp(0.0, 255.0) as u8
        })
        .collect();

    Some(DepthMap {
        width,
        height,
        data,
    })
}
