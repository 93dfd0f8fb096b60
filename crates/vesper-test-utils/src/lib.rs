//! Test utilities for Vesper renderer backends.
//!
//! # Overview
//!
//! - [`RecordingRenderer2D`] - a [`NativeRenderer2D`](vesper_render::NativeRenderer2D)
//!   that records every native call instead of talking to a GPU
//! - [`NativeCall`] - one recorded call
//! - [`StaticShaders`] - fixed standard shader ids for command-stream tests
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vesper_render::{Color, Renderer2D, Renderer2DConfig, TextureRegistry};
//! use vesper_test_utils::{NativeCall, RecordingRenderer2D};
//!
//! let textures = TextureRegistry::new();
//! let back_buffer = textures.create_render_target(800, 600);
//! let backend = RecordingRenderer2D::new();
//! let log = backend.clone();
//!
//! let mut renderer = Renderer2D::new(backend, textures, back_buffer, Renderer2DConfig::default());
//! renderer.add_triangle(
//!     [vesper_core::math::vec2(0.0, 0.0), vesper_core::math::vec2(10.0, 0.0), vesper_core::math::vec2(0.0, 10.0)],
//!     Color::RED,
//! );
//! renderer.flush(true);
//!
//! assert_eq!(log.count_draws(), 1);
//! assert_eq!(log.calls().last(), Some(&NativeCall::EndReplay));
//! ```

mod recording;
mod shaders;

pub use recording::{NativeCall, RecordingRenderer2D};
pub use shaders::StaticShaders;
