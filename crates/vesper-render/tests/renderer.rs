//! Full frames recorded by [`Renderer2D`] and replayed into a recording backend.

use std::sync::Arc;

use vesper_core::geometry::{FloatRect, IntRect};
use vesper_core::math::{Mat3x2, Vec2, vec2};
use vesper_render::{
    BlendState, Color, MAX_SAMPLER_SLOTS, MapMode, PixelShaderId, RasterizerState, Renderer2D,
    Renderer2DConfig, SamplerState, ShaderRegistry, StandardShaderTable, TextureRegistry,
};
use vesper_test_utils::{NativeCall, RecordingRenderer2D, StaticShaders};

struct Harness {
    textures: Arc<TextureRegistry>,
    log: RecordingRenderer2D,
    renderer: Renderer2D<RecordingRenderer2D>,
}

fn harness_with(backend: RecordingRenderer2D, config: Renderer2DConfig) -> Harness {
    vesper_core::logging::init();
    let textures = TextureRegistry::new();
    let back_buffer = textures.create_render_target(800, 600);
    let log = backend.clone();
    let renderer = Renderer2D::new(backend, textures.clone(), back_buffer, config);
    Harness {
        textures,
        log,
        renderer,
    }
}

fn harness() -> Harness {
    harness_with(RecordingRenderer2D::new(), Renderer2DConfig::default())
}

fn unit_rect(i: usize) -> FloatRect {
    FloatRect::new(i as f32 * 10.0, 0.0, 8.0, 8.0)
}

#[test]
fn test_single_rect_frame() {
    let mut h = harness();
    h.renderer.add_rect(&FloatRect::new(10.0, 10.0, 100.0, 50.0), Color::RED);
    let stats = h.renderer.flush(true);

    let calls = h.log.calls();
    assert_eq!(calls.first(), Some(&NativeCall::BeginReplay));
    assert_eq!(calls.last(), Some(&NativeCall::EndReplay));
    assert_eq!(h.log.draws(), vec![(6, 0, 0)]);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.uploaded_vertices, 4);
    assert_eq!(stats.uploaded_indices, 6);
    assert_eq!(stats.dropped_draws, 0);
}

#[test]
fn test_viewport_falls_back_to_target_size() {
    let mut h = harness();
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    h.renderer.flush(true);

    assert_eq!(h.log.last_viewport(), Some(IntRect::new(0, 0, 800, 600)));
    let transform = h.log.last_transform().expect("transform was set");
    assert_eq!(transform, Mat3x2::screen(800.0, 600.0));

    let top_left = transform.transform_point(vec2(0.0, 0.0));
    let bottom_right = transform.transform_point(vec2(800.0, 600.0));
    assert!((top_left - vec2(-1.0, 1.0)).length() < 1e-5);
    assert!((bottom_right - vec2(1.0, -1.0)).length() < 1e-5);
}

#[test]
fn test_explicit_viewport_drives_screen_matrix() {
    let mut h = harness();
    h.renderer.set_viewport(Some(IntRect::new(100, 50, 200, 100)));
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    h.renderer.flush(true);

    assert_eq!(h.log.last_viewport(), Some(IntRect::new(100, 50, 200, 100)));
    assert_eq!(h.log.last_transform(), Some(Mat3x2::screen(200.0, 100.0)));
}

#[test]
fn test_render_target_viewport() {
    let mut h = harness();
    let target = h.textures.create_render_target(256, 128);
    h.renderer.set_render_target(Some(&target));
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    h.renderer.flush(true);

    assert!(h.log.calls().contains(&NativeCall::RenderTarget(target.id())));
    assert_eq!(h.log.last_viewport(), Some(IntRect::new(0, 0, 256, 128)));
    assert_eq!(h.log.last_transform(), Some(Mat3x2::screen(256.0, 128.0)));
}

#[test]
fn test_exhausted_buffer_drops_draw() {
    let config = Renderer2DConfig::default()
        .with_batch_capacity(16, 24)
        .with_max_batches_per_frame(1);
    let mut h = harness_with(RecordingRenderer2D::new(), config);
    for i in 0..5 {
        h.renderer.add_rect(&unit_rect(i), Color::WHITE);
    }
    let stats = h.renderer.flush(true);

    assert_eq!(stats.dropped_draws, 1);
    assert_eq!(h.log.draws(), vec![(24, 0, 0)]);

    h.log.clear_calls();
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    let stats = h.renderer.flush(true);
    assert_eq!(stats.dropped_draws, 0);
    assert_eq!(h.log.count_draws(), 1);
}

#[test]
fn test_oversized_request_is_dropped_alone() {
    let config = Renderer2DConfig::default().with_batch_capacity(16, 24);
    let mut h = harness_with(RecordingRenderer2D::new(), config);
    h.renderer.add_circle(vec2(400.0, 300.0), 100.0, Color::RED);
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    let stats = h.renderer.flush(true);

    assert_eq!(stats.dropped_draws, 1);
    assert_eq!(h.log.draws(), vec![(6, 0, 0)]);
}

#[test]
fn test_batch_boundaries_use_gpu_ring() {
    let config = Renderer2DConfig::default().with_batch_capacity(16, 24);
    let mut h = harness_with(RecordingRenderer2D::new(), config);
    for i in 0..5 {
        h.renderer.add_rect(&unit_rect(i), Color::WHITE);
    }
    let stats = h.renderer.flush(true);

    assert_eq!(stats.batches, 2);
    assert_eq!(h.log.draws(), vec![(24, 0, 0), (6, 0, 0)]);
    assert_eq!(
        h.log.vertex_upload_modes(),
        vec![MapMode::NoOverwrite, MapMode::Discard]
    );

    // The ring cursor survives the frame boundary.
    h.log.clear_calls();
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    h.renderer.flush(true);
    assert_eq!(h.log.draws(), vec![(6, 6, 4)]);
    assert_eq!(h.log.vertex_upload_modes(), vec![MapMode::NoOverwrite]);
}

#[test]
fn test_failed_uploads_still_draw() {
    let backend = RecordingRenderer2D::new().with_failing_uploads();
    let mut h = harness_with(backend, Renderer2DConfig::default());
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    h.renderer.add_rect(&unit_rect(1), Color::WHITE);
    h.renderer.flush(true);

    assert_eq!(h.log.count_uploads(), 2);
    assert_eq!(h.log.draws(), vec![(12, 0, 0)]);
}

#[test]
fn test_custom_shader_overrides_standard() {
    let standard = StandardShaderTable::new([101, 102, 103, 104].map(PixelShaderId::from_raw));
    let mut h = harness_with(
        RecordingRenderer2D::with_shaders(standard),
        Renderer2DConfig::default(),
    );
    let shaders = ShaderRegistry::new();
    let custom = shaders.create_pixel_shader("tint");

    h.renderer.set_custom_pixel_shader(Some(&custom));
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    h.renderer.set_custom_pixel_shader(None);
    h.renderer.add_rect(&unit_rect(1), Color::WHITE);
    h.renderer.flush(true);

    let shader_calls: Vec<_> = h
        .log
        .calls()
        .into_iter()
        .filter(|call| matches!(call, NativeCall::PixelShader(_)))
        .collect();
    assert_eq!(
        shader_calls,
        vec![
            NativeCall::PixelShader(PixelShaderId::from_raw(101)),
            NativeCall::PixelShader(custom.id()),
            NativeCall::PixelShader(PixelShaderId::from_raw(101)),
        ]
    );
    assert_eq!(h.log.draws(), vec![(6, 0, 0), (6, 6, 0)]);
}

#[test]
fn test_custom_shader_cleared_by_new_frame() {
    let mut h = harness();
    let shaders = ShaderRegistry::new();
    let custom = shaders.create_pixel_shader("tint");
    h.renderer.set_custom_pixel_shader(Some(&custom));
    h.renderer.flush(true);
    assert!(h.renderer.custom_pixel_shader().is_none());
}

#[test]
fn test_flush_without_clear_replays_same_frame() {
    let mut h = harness();
    h.renderer.set_blend_state(BlendState::Additive);
    h.renderer.add_circle(vec2(100.0, 100.0), 20.0, Color::GREEN);
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);

    let first = h.renderer.flush(false);
    let first_draws = h.log.draws();
    h.log.clear_calls();
    let second = h.renderer.flush(false);

    assert_eq!(first.commands, second.commands);
    assert_eq!(first.draw_calls, second.draw_calls);
    assert_eq!(first_draws.len(), h.log.draws().len());
    assert_eq!(
        first_draws.iter().map(|d| d.0).collect::<Vec<_>>(),
        h.log.draws().iter().map(|d| d.0).collect::<Vec<_>>()
    );
    assert!(h.log.calls().contains(&NativeCall::BlendState(BlendState::Additive)));
}

#[test]
fn test_textured_draw_keeps_texture_alive_until_next_frame() {
    let mut h = harness();
    let texture = h.textures.create_texture(32, 32);
    let id = texture.id();

    h.renderer.add_texture_region(
        &texture,
        &FloatRect::new(0.0, 0.0, 32.0, 32.0),
        &FloatRect::new(0.0, 0.0, 1.0, 1.0),
        Color::WHITE,
    );
    drop(texture);
    assert!(h.textures.contains(id));

    h.renderer.flush(true);
    assert!(h.log.calls().contains(&NativeCall::BindTexture {
        slot: 0,
        texture: Some(id),
    }));
    assert!(h.log.calls().contains(&NativeCall::PixelShader(StaticShaders::TEXTURE)));
    assert!(!h.textures.contains(id));
    assert_eq!(h.textures.drain_released(), vec![id]);
}

#[test]
fn test_transforms_compose_before_screen_matrix() {
    let mut h = harness();
    let camera = Mat3x2::translate(Vec2::new(50.0, 0.0));
    h.renderer.set_transform_camera(camera);
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    h.renderer.flush(true);

    let expected = camera * Mat3x2::screen(800.0, 600.0);
    assert_eq!(h.log.last_transform(), Some(expected));
    let origin = expected.transform_point(Vec2::ZERO);
    assert!((origin.x - (100.0 / 800.0 - 1.0)).abs() < 1e-5);
}

#[test]
fn test_next_frame_replays_defaults() {
    let mut h = harness();
    let target = h.textures.create_render_target(64, 64);
    h.renderer.set_blend_state(BlendState::Multiply);
    h.renderer.set_rasterizer_state(RasterizerState::WIREFRAME_CULL_NONE);
    for slot in 0..MAX_SAMPLER_SLOTS as u32 {
        h.renderer.set_sampler_state(slot, SamplerState::NEAREST_REPEAT);
    }
    h.renderer.set_scissor_rect(IntRect::new(1, 1, 2, 2));
    h.renderer.set_viewport(Some(IntRect::new(0, 0, 32, 32)));
    h.renderer.set_render_target(Some(&target));
    h.renderer.add_rect(&unit_rect(0), Color::WHITE);
    h.renderer.flush(true);

    h.log.clear_calls();
    h.renderer.flush(true);
    let calls = h.log.calls();

    assert!(calls.contains(&NativeCall::BlendState(BlendState::Alpha)));
    assert!(calls.contains(&NativeCall::RasterizerState(RasterizerState::SOLID_CULL_NONE)));
    for slot in 0..MAX_SAMPLER_SLOTS as u32 {
        assert!(calls.contains(&NativeCall::SamplerState {
            slot,
            state: SamplerState::LINEAR_CLAMP,
        }));
        assert!(calls.contains(&NativeCall::BindTexture { slot, texture: None }));
    }
    assert!(calls.contains(&NativeCall::ScissorRect(IntRect::new(0, 0, 800, 600))));
    assert!(calls.contains(&NativeCall::RenderTarget(h.renderer.render_target())));
    assert!(calls.contains(&NativeCall::PixelShader(StaticShaders::SHAPE)));
    assert_eq!(h.log.last_viewport(), Some(IntRect::new(0, 0, 800, 600)));
    assert_eq!(h.log.count_draws(), 0);
}
