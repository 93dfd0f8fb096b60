//! Immediate-mode 2D renderer.
//!
//! Shapes, lines and textured primitives are tessellated on the CPU into a
//! [`BatchBuffer`] while a [`CommandManager`] records the state changes and
//! draws between them. Once per frame the stream is replayed against a
//! [`NativeRenderer2D`] backend, which only binds state, streams buffers and
//! issues indexed draws.
//!
//! The `wgpu` backend is enabled by default; an OpenGL backend built on `glow`
//! is available behind the `gl` feature.

pub mod asset;
pub mod backend;
pub mod batch;
mod color;
pub mod command;
pub mod config;
pub mod error;
pub mod renderer;
pub mod replay;
pub mod state;
pub mod tessellate;
pub mod vertex;

pub use asset::{
    AssetHandle, AssetId, AssetRegistry, PixelShader, PixelShaderId, PixelShaderType,
    ShaderLookup, ShaderRegistry, StandardPixelShader, StandardShaderTable, Texture, TextureId,
    TextureInfo, TextureLookup, TextureRegistry,
};
pub use backend::{BufferUploader, MapMode, NativeRenderer2D};
pub use batch::BatchBuffer;
pub use color::Color;
pub use command::{Command, CommandManager};
pub use config::Renderer2DConfig;
pub use error::{NativeError, Renderer2DError};
pub use renderer::{Renderer2D, Renderer2DStats};
pub use replay::{ReplayStats, replay};
pub use state::{
    AddressMode, BlendState, CullMode, FillMode, FilterMode, MAX_SAMPLER_SLOTS, RasterizerState,
    SamplerState,
};
pub use tessellate::LineStyle;
pub use vertex::{Index, Vertex2D};

#[cfg(feature = "gl")]
pub use backend::gl::{GlRenderer2D, GlslVersion};
#[cfg(feature = "wgpu")]
pub use backend::wgpu::WgpuRenderer2D;
