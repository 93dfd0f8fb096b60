//! Command stream behaviour observed through the public API.

use std::sync::Arc;

use vesper_core::geometry::IntRect;
use vesper_core::math::{Mat3x2, Vec2};
use vesper_render::{
    BlendState, Command, CommandManager, MAX_SAMPLER_SLOTS, PixelShaderType, RasterizerState,
    SamplerState, StandardPixelShader, TextureRegistry,
};
use vesper_test_utils::StaticShaders;

const SHAPE: PixelShaderType = PixelShaderType::Standard(StandardPixelShader::Shape);
const PREFIX_LEN: usize = 8 + 2 * MAX_SAMPLER_SLOTS;

fn manager() -> (Arc<TextureRegistry>, CommandManager) {
    let registry = TextureRegistry::new();
    let back_buffer = registry.create_render_target(800, 600);
    let manager = CommandManager::new(Arc::new(StaticShaders), back_buffer);
    (registry, manager)
}

#[test]
fn test_round_trip_stream() {
    let (_registry, mut manager) = manager();
    manager.push_blend_state(BlendState::Additive);
    manager.push_draw(6, SHAPE);
    manager.push_draw(6, SHAPE);
    manager.push_blend_state(BlendState::Additive);

    let commands = manager.commands();
    assert_eq!(commands.len(), PREFIX_LEN + 2);
    assert_eq!(commands[0], Command::NextBatch);
    assert_eq!(
        &commands[PREFIX_LEN..],
        &[
            Command::BlendState(BlendState::Additive),
            Command::Draw { index_count: 12 },
        ]
    );
}

#[test]
fn test_prefix_emits_every_state_once() {
    let (registry, manager) = manager();
    let commands = manager.commands();
    assert_eq!(commands.len(), PREFIX_LEN);

    let count = |f: fn(&Command) -> bool| commands.iter().filter(|c| f(c)).count();
    assert_eq!(count(|c| matches!(c, Command::NextBatch)), 1);
    assert_eq!(count(|c| matches!(c, Command::BlendState(_))), 1);
    assert_eq!(count(|c| matches!(c, Command::RasterizerState(_))), 1);
    assert_eq!(count(|c| matches!(c, Command::SamplerState { .. })), MAX_SAMPLER_SLOTS);
    assert_eq!(count(|c| matches!(c, Command::SetRenderTarget(_))), 1);
    assert_eq!(count(|c| matches!(c, Command::ScissorRect(_))), 1);
    assert_eq!(count(|c| matches!(c, Command::Viewport(None))), 1);
    assert_eq!(count(|c| matches!(c, Command::Transform(_))), 1);
    assert_eq!(
        count(|c| matches!(c, Command::PixelShader(id) if *id == StaticShaders::SHAPE)),
        1
    );
    assert_eq!(
        count(|c| matches!(c, Command::BindTexture { texture: None, .. })),
        MAX_SAMPLER_SLOTS
    );
    assert!(!commands.iter().any(|c| matches!(c, Command::Draw { .. })));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_state_pushes_dedup_against_current_value() {
    let (_registry, mut manager) = manager();
    manager.push_blend_state(BlendState::Alpha);
    manager.push_rasterizer_state(RasterizerState::SOLID_CULL_NONE);
    manager.push_sampler_state(0, SamplerState::LINEAR_CLAMP);
    manager.push_scissor_rect(IntRect::new(0, 0, 800, 600));
    manager.push_viewport(None);
    manager.push_texture(3, None);
    manager.push_render_target(None);
    manager.push_transform_local(Mat3x2::IDENTITY);
    assert_eq!(manager.commands().len(), PREFIX_LEN);
}

#[test]
fn test_draws_split_only_on_changes() {
    let (registry, mut manager) = manager();
    let texture = registry.create_texture(16, 16);
    let texture_shader = PixelShaderType::Standard(StandardPixelShader::Texture);

    manager.push_draw(6, SHAPE);
    manager.push_draw(3, SHAPE);
    manager.push_texture(0, Some(&texture));
    manager.push_draw(6, texture_shader);
    manager.push_draw(6, texture_shader);
    manager.push_transform_camera(Mat3x2::translate(Vec2::new(10.0, 0.0)));
    manager.push_draw(6, texture_shader);

    assert_eq!(
        &manager.commands()[PREFIX_LEN..],
        &[
            Command::Draw { index_count: 9 },
            Command::BindTexture {
                slot: 0,
                texture: Some(texture.id()),
            },
            Command::PixelShader(StaticShaders::TEXTURE),
            Command::Draw { index_count: 12 },
            Command::Transform(Mat3x2::translate(Vec2::new(10.0, 0.0))),
            Command::Draw { index_count: 6 },
        ]
    );
}

#[test]
fn test_reset_starts_clean_frame_but_keeps_screen() {
    let (registry, mut manager) = manager();
    let target = registry.create_render_target(64, 64);
    let screen = Mat3x2::scale(Vec2::splat(0.5));

    manager.push_transform_screen(screen);
    manager.push_blend_state(BlendState::Multiply);
    manager.push_render_target(Some(&target));
    manager.push_draw(6, SHAPE);
    manager.reset();

    assert_eq!(manager.commands().len(), PREFIX_LEN);
    assert_eq!(manager.blend_state(), BlendState::Alpha);
    assert_eq!(manager.render_target(), manager.back_buffer().id());
    assert_eq!(manager.transform_screen(), screen);
    assert!(manager.commands().contains(&Command::Transform(screen)));
    assert!(!manager.is_texture_reserved(target.id()));
}
