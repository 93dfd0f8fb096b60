//! A backend that records native calls for verification in tests.

use std::sync::Arc;

use parking_lot::Mutex;
use vesper_core::geometry::IntRect;
use vesper_core::math::Mat3x2;
use vesper_render::{
    BlendState, BufferUploader, Index, MapMode, NativeError, NativeRenderer2D, PixelShaderId,
    RasterizerState, SamplerState, StandardShaderTable, TextureId, Vertex2D,
};

use crate::StaticShaders;

/// Records a native call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    BeginReplay,
    UploadVertices {
        first: u32,
        count: u32,
        mode: MapMode,
    },
    UploadIndices {
        first: u32,
        count: u32,
        mode: MapMode,
    },
    BlendState(BlendState),
    RasterizerState(RasterizerState),
    SamplerState {
        slot: u32,
        state: SamplerState,
    },
    ScissorRect(IntRect),
    Viewport(IntRect),
    Transform(Mat3x2),
    PixelShader(PixelShaderId),
    BindTexture {
        slot: u32,
        texture: Option<TextureId>,
    },
    RenderTarget(TextureId),
    DrawIndexed {
        index_count: u32,
        first_index: u32,
        base_vertex: u32,
    },
    EndReplay,
}

/// [`NativeRenderer2D`] that draws nothing and remembers everything.
///
/// Clones share one call log, so a test can keep a clone while a
/// [`Renderer2D`](vesper_render::Renderer2D) owns the backend.
///
/// ```rust
/// use vesper_render::{BlendState, NativeRenderer2D};
/// use vesper_test_utils::{NativeCall, RecordingRenderer2D};
///
/// let mut backend = RecordingRenderer2D::new();
/// backend.set_blend_state(BlendState::Additive);
/// assert_eq!(backend.calls(), vec![NativeCall::BlendState(BlendState::Additive)]);
/// ```
#[derive(Clone)]
pub struct RecordingRenderer2D {
    calls: Arc<Mutex<Vec<NativeCall>>>,
    shaders: StandardShaderTable,
    fail_uploads: bool,
}

impl Default for RecordingRenderer2D {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRenderer2D {
    /// Reports the [`StaticShaders`] ids as its standard shaders.
    pub fn new() -> Self {
        Self::with_shaders(StaticShaders::table())
    }

    pub fn with_shaders(shaders: StandardShaderTable) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            shaders,
            fail_uploads: false,
        }
    }

    /// Makes every buffer upload return an error (the call is still recorded).
    pub fn with_failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<NativeCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// `(index_count, first_index, base_vertex)` of every draw, in order.
    pub fn draws(&self) -> Vec<(u32, u32, u32)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match *call {
                NativeCall::DrawIndexed {
                    index_count,
                    first_index,
                    base_vertex,
                } => Some((index_count, first_index, base_vertex)),
                _ => None,
            })
            .collect()
    }

    pub fn count_draws(&self) -> usize {
        self.count(|call| matches!(call, NativeCall::DrawIndexed { .. }))
    }

    pub fn count_uploads(&self) -> usize {
        self.count(|call| {
            matches!(
                call,
                NativeCall::UploadVertices { .. } | NativeCall::UploadIndices { .. }
            )
        })
    }

    /// Upload modes of the vertex buffer, in order.
    pub fn vertex_upload_modes(&self) -> Vec<MapMode> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match *call {
                NativeCall::UploadVertices { mode, .. } => Some(mode),
                _ => None,
            })
            .collect()
    }

    pub fn last_transform(&self) -> Option<Mat3x2> {
        self.calls.lock().iter().rev().find_map(|call| match *call {
            NativeCall::Transform(matrix) => Some(matrix),
            _ => None,
        })
    }

    pub fn last_viewport(&self) -> Option<IntRect> {
        self.calls.lock().iter().rev().find_map(|call| match *call {
            NativeCall::Viewport(rect) => Some(rect),
            _ => None,
        })
    }

    fn count(&self, predicate: impl Fn(&NativeCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: NativeCall) {
        self.calls.lock().push(call);
    }

    fn upload_result(&self) -> Result<(), NativeError> {
        if self.fail_uploads {
            tracing::debug!("Recording renderer rejecting upload");
            return Err(NativeError::Upload("recording renderer set to fail".to_string()));
        }
        Ok(())
    }
}

impl BufferUploader for RecordingRenderer2D {
    fn upload_vertices(
        &mut self,
        first: u32,
        vertices: &[Vertex2D],
        mode: MapMode,
    ) -> Result<(), NativeError> {
        self.record(NativeCall::UploadVertices {
            first,
            count: vertices.len() as u32,
            mode,
        });
        self.upload_result()
    }

    fn upload_indices(&mut self, first: u32, indices: &[Index], mode: MapMode) -> Result<(), NativeError> {
        self.record(NativeCall::UploadIndices {
            first,
            count: indices.len() as u32,
            mode,
        });
        self.upload_result()
    }
}

impl NativeRenderer2D for RecordingRenderer2D {
    fn standard_shaders(&self) -> StandardShaderTable {
        self.shaders
    }

    fn begin_replay(&mut self) {
        self.record(NativeCall::BeginReplay);
    }

    fn set_blend_state(&mut self, state: BlendState) {
        self.record(NativeCall::BlendState(state));
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.record(NativeCall::RasterizerState(state));
    }

    fn set_sampler_state(&mut self, slot: u32, state: SamplerState) {
        self.record(NativeCall::SamplerState { slot, state });
    }

    fn set_scissor_rect(&mut self, rect: IntRect) {
        self.record(NativeCall::ScissorRect(rect));
    }

    fn set_viewport(&mut self, rect: IntRect) {
        self.record(NativeCall::Viewport(rect));
    }

    fn set_transform(&mut self, matrix: &Mat3x2) {
        self.record(NativeCall::Transform(*matrix));
    }

    fn set_pixel_shader(&mut self, shader: PixelShaderId) {
        self.record(NativeCall::PixelShader(shader));
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureId>) {
        self.record(NativeCall::BindTexture { slot, texture });
    }

    fn set_render_target(&mut self, texture: TextureId) {
        self.record(NativeCall::RenderTarget(texture));
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: u32) {
        self.record(NativeCall::DrawIndexed {
            index_count,
            first_index,
            base_vertex,
        });
    }

    fn end_replay(&mut self) {
        self.record(NativeCall::EndReplay);
    }
}
