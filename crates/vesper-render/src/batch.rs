//! CPU staging for per-frame geometry, split into GPU-sized batches.

use vesper_core::profiling::profile_function;

use crate::backend::{BufferUploader, MapMode};
use crate::command::CommandManager;
use crate::config::Renderer2DConfig;
use crate::vertex::{Index, Vertex2D};

/// Ranges of the CPU arrays belonging to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchInfo {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub index_start: u32,
    pub index_count: u32,
}

/// Where a batch landed in the GPU buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawOffset {
    pub base_vertex: u32,
    pub first_index: u32,
}

/// Writable spans handed to a tessellator.
///
/// Indices written into `indices` must be offset by `index_offset`, which is
/// the batch-local position of `vertices[0]`.
pub struct BatchAllocation<'a> {
    pub vertices: &'a mut [Vertex2D],
    pub indices: &'a mut [Index],
    pub index_offset: u32,
}

pub struct BatchBuffer {
    config: Renderer2DConfig,
    vertices: Vec<Vertex2D>,
    indices: Vec<Index>,
    vertex_cursor: u32,
    index_cursor: u32,
    batches: Vec<BatchInfo>,
    gpu_vertex_cursor: u32,
    gpu_index_cursor: u32,
    dropped: u32,
}

impl BatchBuffer {
    pub fn new(config: Renderer2DConfig) -> Self {
        Self {
            vertices: vec![Vertex2D::default(); config.initial_vertex_capacity as usize],
            indices: vec![0; config.initial_index_capacity as usize],
            vertex_cursor: 0,
            index_cursor: 0,
            batches: vec![BatchInfo::default()],
            gpu_vertex_cursor: 0,
            gpu_index_cursor: 0,
            dropped: 0,
            config,
        }
    }

    /// Reserves space for one primitive.
    ///
    /// Returns `None` when either count is zero, when the request cannot fit
    /// in any batch, or when the CPU arrays would pass their hard cap. The
    /// caller then drops the draw. When the current batch is too full, a new
    /// batch is opened and `NextBatch` is recorded on `commands` first.
    pub fn allocate(
        &mut self,
        vertex_count: u32,
        index_count: u32,
        commands: &mut CommandManager,
    ) -> Option<BatchAllocation<'_>> {
        if vertex_count == 0 || index_count == 0 {
            return None;
        }

        if vertex_count > self.config.batch_vertex_capacity
            || index_count > self.config.batch_index_capacity
        {
            self.drop_draw(vertex_count, index_count);
            return None;
        }

        let vertex_end = self.vertex_cursor as u64 + vertex_count as u64;
        let index_end = self.index_cursor as u64 + index_count as u64;
        if vertex_end > self.config.max_vertex_count() || index_end > self.config.max_index_count()
        {
            self.drop_draw(vertex_count, index_count);
            return None;
        }

        grow_to(&mut self.vertices, vertex_end as usize, Vertex2D::default());
        grow_to(&mut self.indices, index_end as usize, 0);

        let current = self.current_batch();
        if current.vertex_count + vertex_count > self.config.batch_vertex_capacity
            || current.index_count + index_count > self.config.batch_index_capacity
        {
            self.batches.push(BatchInfo {
                vertex_start: self.vertex_cursor,
                vertex_count: 0,
                index_start: self.index_cursor,
                index_count: 0,
            });
            commands.push_next_batch();
            tracing::debug!("Opened batch {}", self.batches.len() - 1);
        }

        let vertex_start = self.vertex_cursor as usize;
        let index_start = self.index_cursor as usize;
        self.vertex_cursor += vertex_count;
        self.index_cursor += index_count;

        let batch = self.current_batch_mut();
        let index_offset = batch.vertex_count;
        batch.vertex_count += vertex_count;
        batch.index_count += index_count;

        Some(BatchAllocation {
            vertices: &mut self.vertices[vertex_start..vertex_start + vertex_count as usize],
            indices: &mut self.indices[index_start..index_start + index_count as usize],
            index_offset,
        })
    }

    /// Uploads one batch and returns where its draws must read from.
    ///
    /// The GPU buffers are used as a ring. A batch that does not fit behind the
    /// cursor restarts the buffer with [`MapMode::Discard`]. Upload failures
    /// are logged and the offsets are returned anyway.
    pub fn set_buffers(&mut self, batch_index: usize, uploader: &mut dyn BufferUploader) -> DrawOffset {
        profile_function!();
        let Some(batch) = self.batches.get(batch_index).copied() else {
            tracing::warn!("set_buffers called for missing batch {}", batch_index);
            return DrawOffset {
                base_vertex: self.gpu_vertex_cursor,
                first_index: self.gpu_index_cursor,
            };
        };

        let base_vertex = if batch.vertex_count == 0 {
            self.gpu_vertex_cursor
        } else {
            let mode = ring_mode(
                &mut self.gpu_vertex_cursor,
                batch.vertex_count,
                self.config.batch_vertex_capacity,
            );
            let first = self.gpu_vertex_cursor;
            let start = batch.vertex_start as usize;
            let data = &self.vertices[start..start + batch.vertex_count as usize];
            if let Err(e) = uploader.upload_vertices(first, data, mode) {
                tracing::warn!("Skipping vertex upload for batch {}: {}", batch_index, e);
            }
            self.gpu_vertex_cursor += batch.vertex_count;
            first
        };

        let first_index = if batch.index_count == 0 {
            self.gpu_index_cursor
        } else {
            let mode = ring_mode(
                &mut self.gpu_index_cursor,
                batch.index_count,
                self.config.batch_index_capacity,
            );
            let first = self.gpu_index_cursor;
            let start = batch.index_start as usize;
            let data = &self.indices[start..start + batch.index_count as usize];
            if let Err(e) = uploader.upload_indices(first, data, mode) {
                tracing::warn!("Skipping index upload for batch {}: {}", batch_index, e);
            }
            self.gpu_index_cursor += batch.index_count;
            first
        };

        DrawOffset {
            base_vertex,
            first_index,
        }
    }

    /// Back to one empty batch. Storage is kept for the next frame.
    pub fn clear(&mut self) {
        self.batches.clear();
        self.batches.push(BatchInfo::default());
        self.vertex_cursor = 0;
        self.index_cursor = 0;
        self.dropped = 0;
    }

    pub fn batches(&self) -> &[BatchInfo] {
        &self.batches
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_cursor
    }

    pub fn index_count(&self) -> u32 {
        self.index_cursor
    }

    /// Current length of the CPU staging arrays `(vertices, indices)`.
    pub fn capacity(&self) -> (usize, usize) {
        (self.vertices.len(), self.indices.len())
    }

    /// Draws rejected since the last [`clear`](Self::clear).
    pub fn dropped_draws(&self) -> u32 {
        self.dropped
    }

    pub fn vertices(&self) -> &[Vertex2D] {
        &self.vertices[..self.vertex_cursor as usize]
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices[..self.index_cursor as usize]
    }

    pub fn config(&self) -> &Renderer2DConfig {
        &self.config
    }

    fn current_batch(&self) -> BatchInfo {
        self.batches.last().copied().unwrap_or_default()
    }

    fn current_batch_mut(&mut self) -> &mut BatchInfo {
        if self.batches.is_empty() {
            self.batches.push(BatchInfo::default());
        }
        let last = self.batches.len() - 1;
        &mut self.batches[last]
    }

    fn drop_draw(&mut self, vertex_count: u32, index_count: u32) {
        self.dropped += 1;
        tracing::debug!(
            "Dropped draw of {} vertices / {} indices: batch buffer exhausted",
            vertex_count,
            index_count
        );
    }
}

/// Doubles `storage` until it holds at least `required` elements.
fn grow_to<T: Copy>(storage: &mut Vec<T>, required: usize, fill: T) {
    if storage.len() >= required {
        return;
    }
    let mut new_len = storage.len().max(1);
    while new_len < required {
        new_len *= 2;
    }
    storage.resize(new_len, fill);
}

fn ring_mode(cursor: &mut u32, count: u32, capacity: u32) -> MapMode {
    if *cursor as u64 + count as u64 > capacity as u64 {
        *cursor = 0;
        MapMode::Discard
    } else {
        MapMode::NoOverwrite
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::asset::{PixelShaderId, StandardShaderTable, Texture, TextureId, TextureInfo};
    use crate::command::Command;
    use crate::error::NativeError;
    use vesper_core::geometry::Size;

    fn commands() -> CommandManager {
        let shaders = StandardShaderTable::new([1, 2, 3, 4].map(PixelShaderId::from_raw));
        let back_buffer = Texture::unmanaged(
            TextureId::from_raw(1),
            TextureInfo {
                size: Size::new(800, 600),
                render_target: true,
            },
        );
        CommandManager::new(Arc::new(shaders), back_buffer)
    }

    fn small_config() -> Renderer2DConfig {
        Renderer2DConfig::default()
            .with_batch_capacity(16, 24)
            .with_initial_capacity(4, 6)
            .with_max_batches_per_frame(4)
    }

    fn next_batch_count(commands: &CommandManager) -> usize {
        commands
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::NextBatch))
            .count()
    }

    #[derive(Default)]
    struct Uploads {
        vertices: Vec<(u32, usize, MapMode)>,
        indices: Vec<(u32, usize, MapMode)>,
        fail: bool,
    }

    impl BufferUploader for Uploads {
        fn upload_vertices(
            &mut self,
            first: u32,
            vertices: &[Vertex2D],
            mode: MapMode,
        ) -> Result<(), NativeError> {
            self.vertices.push((first, vertices.len(), mode));
            if self.fail {
                return Err(NativeError::Upload("map failed".into()));
            }
            Ok(())
        }

        fn upload_indices(
            &mut self,
            first: u32,
            indices: &[Index],
            mode: MapMode,
        ) -> Result<(), NativeError> {
            self.indices.push((first, indices.len(), mode));
            Ok(())
        }
    }

    #[test]
    fn test_zero_counts_are_rejected() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        assert!(batch.allocate(0, 3, &mut commands).is_none());
        assert!(batch.allocate(3, 0, &mut commands).is_none());
        assert_eq!(batch.vertex_count(), 0);
    }

    #[test]
    fn test_arrays_grow_by_doubling() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        assert_eq!(batch.capacity(), (4, 6));
        assert!(batch.allocate(5, 7, &mut commands).is_some());
        assert_eq!(batch.capacity(), (8, 12));
        assert!(batch.allocate(4, 6, &mut commands).is_some());
        assert_eq!(batch.capacity(), (16, 24));
    }

    #[test]
    fn test_index_offset_is_batch_local() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        let first = batch.allocate(4, 6, &mut commands).map(|a| a.index_offset);
        let second = batch.allocate(3, 3, &mut commands).map(|a| a.index_offset);
        assert_eq!(first, Some(0));
        assert_eq!(second, Some(4));
    }

    #[test]
    fn test_batch_boundary_moves_whole_allocation() {
        let mut commands = commands();
        let before = next_batch_count(&commands);
        let mut batch = BatchBuffer::new(small_config());

        assert!(batch.allocate(12, 12, &mut commands).is_some());
        assert_eq!(next_batch_count(&commands), before);

        let alloc = batch.allocate(8, 6, &mut commands).map(|a| (a.index_offset, a.vertices.len()));
        assert_eq!(alloc, Some((0, 8)));
        assert_eq!(next_batch_count(&commands), before + 1);
        assert_eq!(
            batch.batches(),
            &[
                BatchInfo {
                    vertex_start: 0,
                    vertex_count: 12,
                    index_start: 0,
                    index_count: 12,
                },
                BatchInfo {
                    vertex_start: 12,
                    vertex_count: 8,
                    index_start: 12,
                    index_count: 6,
                },
            ]
        );
    }

    #[test]
    fn test_index_capacity_also_splits_batches() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        assert!(batch.allocate(3, 20, &mut commands).is_some());
        assert!(batch.allocate(3, 6, &mut commands).is_some());
        assert_eq!(batch.batch_count(), 2);
    }

    #[test]
    fn test_oversized_request_is_dropped() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        let stream_len = commands.commands().len();
        assert!(batch.allocate(3, 25, &mut commands).is_none());
        assert_eq!(batch.dropped_draws(), 1);
        assert_eq!(commands.commands().len(), stream_len);
        assert!(batch.allocate(3, 3, &mut commands).is_some());
    }

    #[test]
    fn test_cpu_cap_is_enforced() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        for _ in 0..4 {
            assert!(batch.allocate(16, 3, &mut commands).is_some());
        }
        assert!(batch.allocate(1, 3, &mut commands).is_none());
        assert_eq!(batch.dropped_draws(), 1);
        assert_eq!(batch.batch_count(), 4);
    }

    #[test]
    fn test_clear_keeps_storage() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        assert!(batch.allocate(16, 20, &mut commands).is_some());
        assert!(batch.allocate(16, 20, &mut commands).is_some());
        let capacity = batch.capacity();
        batch.clear();
        assert_eq!(batch.batch_count(), 1);
        assert_eq!(batch.vertex_count(), 0);
        assert_eq!(batch.capacity(), capacity);
    }

    #[test]
    fn test_set_buffers_ring_protocol() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        let mut uploads = Uploads::default();

        assert!(batch.allocate(10, 12, &mut commands).is_some());
        let first = batch.set_buffers(0, &mut uploads);
        assert_eq!(first, DrawOffset::default());
        batch.clear();

        assert!(batch.allocate(4, 6, &mut commands).is_some());
        let second = batch.set_buffers(0, &mut uploads);
        assert_eq!(
            second,
            DrawOffset {
                base_vertex: 10,
                first_index: 12,
            }
        );
        batch.clear();

        assert!(batch.allocate(8, 9, &mut commands).is_some());
        let third = batch.set_buffers(0, &mut uploads);
        assert_eq!(third, DrawOffset::default());

        assert_eq!(
            uploads.vertices,
            vec![
                (0, 10, MapMode::NoOverwrite),
                (10, 4, MapMode::NoOverwrite),
                (0, 8, MapMode::Discard),
            ]
        );
        assert_eq!(uploads.indices[2], (0, 9, MapMode::Discard));
    }

    #[test]
    fn test_failed_upload_still_returns_offsets() {
        let mut commands = commands();
        let mut batch = BatchBuffer::new(small_config());
        let mut uploads = Uploads {
            fail: true,
            ..Default::default()
        };
        assert!(batch.allocate(3, 3, &mut commands).is_some());
        assert_eq!(batch.set_buffers(0, &mut uploads), DrawOffset::default());
        assert!(batch.allocate(3, 3, &mut commands).is_some());
        batch.clear();
        assert!(batch.allocate(3, 3, &mut commands).is_some());
        let offset = batch.set_buffers(0, &mut uploads);
        assert_eq!(offset.base_vertex, 3);
    }

    #[test]
    fn test_empty_batch_uploads_nothing() {
        let mut batch = BatchBuffer::new(small_config());
        let mut uploads = Uploads::default();
        assert_eq!(batch.set_buffers(0, &mut uploads), DrawOffset::default());
        assert!(uploads.vertices.is_empty());
        assert!(uploads.indices.is_empty());
    }
}
