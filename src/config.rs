//! Provider configuration and device quality tiers.

/// Where a provider's depth frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthSource {
    /// Estimated by a segmentation or depth model from camera frames.
    #[default]
    Inferred,
    /// Measured by a depth sensor.
    Sensed,
}

impl DepthSource {
    pub fn name(self) -> &'static str {
        match self {
            Self::Inferred => "inferred",
            Self::Sensed => "sensed",
        }
    }
}

/// How staged frames reach GPU memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum UploadPath {
    /// Row-by-row host copy into a persistently mapped linear image.
    #[default]
    StagedCopy,
}

/// Configuration of a [`DepthProvider`](crate::DepthProvider).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthProviderConfig {
    /// Name used in log messages.
    pub label: String,
    pub source: DepthSource,
    /// Value of every texel of the placeholder texture created at init.
    /// 255 means fully sharp, so effects keyed on depth stay off until the
    /// first real frame arrives.
    pub placeholder_value: u8,
    pub upload_path: UploadPath,
}

impl Default for DepthProviderConfig {
    fn default() -> Self {
        Self {
            label: "depth".to_string(),
            source: DepthSource::default(),
            placeholder_value: 255,
            upload_path: UploadPath::default(),
        }
    }
}

impl DepthProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration for a source, labelled after it.
    pub fn for_source(source: DepthSource) -> Self {
        Self {
            label: source.name().to_string(),
            source,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_source(mut self, source: DepthSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_placeholder_value(mut self, value: u8) -> Self {
        self.placeholder_value = value;
        self
    }

    pub fn with_upload_path(mut self, upload_path: UploadPath) -> Self {
        self.upload_path = upload_path;
        self
    }
}

/// Processing budget chosen from device capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityTier {
    High,
    Standard,
}

impl QualityTier {
    /// Devices with at least this much memory get [`QualityTier::High`].
    pub const HIGH_MEMORY_THRESHOLD: u64 = 8 * 1024 * 1024 * 1024;

    /// Pick a tier from total system memory in bytes.
    pub fn for_memory(total_bytes: u64) -> Self {
        let tier = if total_bytes >= Self::HIGH_MEMORY_THRESHOLD {
            Self::High
        } else {
            Self::Standard
        };
        log::info!(
            "Quality tier {:?} for {} GiB of memory",
            tier,
            total_bytes / (1024 * 1024 * 1024)
        );
        tier
    }

    /// Square input resolution of the depth model.
    pub fn inference_resolution(self) -> u32 {
        match self {
            Self::High => 512,
            Self::Standard => 256,
        }
    }

    /// Samples taken by the depth-keyed blur shader.
    pub fn blur_sample_count(self) -> u32 {
        match self {
            Self::High => 32,
            Self::Standard => 16,
        }
    }

    /// Run inference on every n-th camera frame.
    pub fn frame_divisor(self) -> u32 {
        match self {
            Self::High => 1,
            Self::Standard => 2,
        }
    }
}
