use vesper_render::{PixelShaderId, ShaderLookup, StandardPixelShader, StandardShaderTable};

/// Standard shader ids that never change, for tests that build a
/// [`CommandManager`](vesper_render::CommandManager) without a backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticShaders;

impl StaticShaders {
    pub const SHAPE: PixelShaderId = PixelShaderId::from_raw(1);
    pub const TEXTURE: PixelShaderId = PixelShaderId::from_raw(2);
    pub const SQUARE_DOT: PixelShaderId = PixelShaderId::from_raw(3);
    pub const ROUND_DOT: PixelShaderId = PixelShaderId::from_raw(4);

    pub fn table() -> StandardShaderTable {
        StandardShaderTable::new([Self::SHAPE, Self::TEXTURE, Self::SQUARE_DOT, Self::ROUND_DOT])
    }
}

impl ShaderLookup for StaticShaders {
    fn pixel_shader(&self, shader: StandardPixelShader) -> PixelShaderId {
        match shader {
            StandardPixelShader::Shape => Self::SHAPE,
            StandardPixelShader::Texture => Self::TEXTURE,
            StandardPixelShader::SquareDot => Self::SQUARE_DOT,
            StandardPixelShader::RoundDot => Self::ROUND_DOT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_lookup() {
        let table = StaticShaders::table();
        for shader in StandardPixelShader::ALL {
            assert_eq!(table.pixel_shader(shader), StaticShaders.pixel_shader(shader));
        }
    }
}
