/// Sizing for the 2D renderer's batch and GPU buffers.
///
/// Hardware capacity bounds a single batch and sizes the GPU vertex/index
/// buffers. The CPU staging arrays start at the initial capacity, double on
/// demand, and never grow past `hardware capacity * max_batches_per_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderer2DConfig {
    pub batch_vertex_capacity: u32,
    pub batch_index_capacity: u32,
    pub initial_vertex_capacity: u32,
    pub initial_index_capacity: u32,
    pub max_batches_per_frame: u32,
}

impl Default for Renderer2DConfig {
    fn default() -> Self {
        Self {
            batch_vertex_capacity: 65_536,
            batch_index_capacity: 524_288,
            initial_vertex_capacity: 4_096,
            initial_index_capacity: 16_384,
            max_batches_per_frame: 64,
        }
    }
}

impl Renderer2DConfig {
    pub fn with_batch_capacity(mut self, vertices: u32, indices: u32) -> Self {
        self.batch_vertex_capacity = vertices.max(3);
        self.batch_index_capacity = indices.max(3);
        self
    }

    pub fn with_initial_capacity(mut self, vertices: u32, indices: u32) -> Self {
        self.initial_vertex_capacity = vertices.max(1);
        self.initial_index_capacity = indices.max(1);
        self
    }

    pub fn with_max_batches_per_frame(mut self, batches: u32) -> Self {
        self.max_batches_per_frame = batches.max(1);
        self
    }

    /// Hard cap on CPU staging vertices for one frame.
    pub fn max_vertex_count(&self) -> u64 {
        self.batch_vertex_capacity as u64 * self.max_batches_per_frame as u64
    }

    /// Hard cap on CPU staging indices for one frame.
    pub fn max_index_count(&self) -> u64 {
        self.batch_index_capacity as u64 * self.max_batches_per_frame as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacities() {
        let config = Renderer2DConfig::default();
        assert_eq!(config.batch_vertex_capacity, 65_536);
        assert_eq!(config.batch_index_capacity, 524_288);
        assert_eq!(config.max_index_count(), 524_288 * 64);
    }

    #[test]
    fn test_builder_clamps() {
        let config = Renderer2DConfig::default()
            .with_batch_capacity(0, 0)
            .with_max_batches_per_frame(0);
        assert_eq!(config.batch_vertex_capacity, 3);
        assert_eq!(config.max_batches_per_frame, 1);
    }
}
