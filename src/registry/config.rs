//! Registry configuration

/// Registry configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of boxes that may exist at once
    pub max_boxes: usize,

    /// Per-box byte limit enforced by the backing store (None = unlimited)
    pub max_box_size: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_boxes: 64,
            max_box_size: None,
        }
    }
}

impl RegistryConfig {
    /// Set the maximum box count
    pub fn max_boxes(mut self, max: usize) -> Self {
        self.max_boxes = max;
        self
    }

    /// Set the per-box byte limit
    pub fn max_box_size(mut self, limit: u64) -> Self {
        self.max_box_size = Some(limit);
        self
    }
}
