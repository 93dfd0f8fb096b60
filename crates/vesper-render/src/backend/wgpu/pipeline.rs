//! Render pipelines for every blend/rasterizer/shader combination in use.

use vesper_core::alloc::HashMap;
use vesper_core::profiling::profile_function;

use crate::asset::PixelShaderId;
use crate::state::{BlendFactor, BlendOp, BlendState, CullMode, FillMode, RasterizerState};
use crate::vertex::Vertex2D;

/// Everything a pipeline bakes in. The scissor flag is dynamic state and is
/// not part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub blend: BlendState,
    pub fill: FillMode,
    pub cull: CullMode,
    pub shader: PixelShaderId,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    pub fn new(
        blend: BlendState,
        rasterizer: RasterizerState,
        shader: PixelShaderId,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            blend,
            fill: rasterizer.fill,
            cull: rasterizer.cull,
            shader,
            format,
        }
    }
}

/// A fragment entry point inside a compiled module.
pub struct FragmentProgram {
    pub module: wgpu::ShaderModule,
    pub entry_point: String,
}

fn to_wgpu_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
    }
}

fn to_wgpu_op(op: BlendOp) -> wgpu::BlendOperation {
    match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
    }
}

/// `None` disables blending.
pub fn to_wgpu_blend(state: BlendState) -> Option<wgpu::BlendState> {
    state.equation().map(|eq| wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: to_wgpu_factor(eq.color.src),
            dst_factor: to_wgpu_factor(eq.color.dst),
            operation: to_wgpu_op(eq.color.op),
        },
        alpha: wgpu::BlendComponent {
            src_factor: to_wgpu_factor(eq.alpha.src),
            dst_factor: to_wgpu_factor(eq.alpha.dst),
            operation: to_wgpu_op(eq.alpha.op),
        },
    })
}

pub fn primitive_state(fill: FillMode, cull: CullMode, wireframe_supported: bool) -> wgpu::PrimitiveState {
    let polygon_mode = match fill {
        FillMode::Wireframe if wireframe_supported => wgpu::PolygonMode::Line,
        _ => wgpu::PolygonMode::Fill,
    };
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        cull_mode: match cull {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        },
        polygon_mode,
        ..Default::default()
    }
}

pub struct PipelineCache {
    layout: wgpu::PipelineLayout,
    vertex: wgpu::ShaderModule,
    wireframe_supported: bool,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(layout: wgpu::PipelineLayout, vertex: wgpu::ShaderModule, wireframe_supported: bool) -> Self {
        Self {
            layout,
            vertex,
            wireframe_supported,
            pipelines: HashMap::new(),
        }
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        fragment: &FragmentProgram,
    ) -> &wgpu::RenderPipeline {
        let Self {
            layout,
            vertex,
            wireframe_supported,
            pipelines,
        } = self;
        pipelines.entry(key).or_insert_with(|| {
            profile_function!();
            if key.fill == FillMode::Wireframe && !*wireframe_supported {
                tracing::warn!("Wireframe fill unsupported on this device, drawing solid");
            }
            tracing::debug!("Creating pipeline {:?}", key);
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("vesper_renderer2d_pipeline"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("vs_main"),
                    buffers: &[Vertex2D::layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some(fragment.entry_point.as_str()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: to_wgpu_blend(key.blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: primitive_state(key.fill, key.cull, *wireframe_supported),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    /// Drops every pipeline built with `shader`.
    pub fn remove_shader(&mut self, shader: PixelShaderId) {
        self.pipelines.retain(|key, _| key.shader != shader);
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
