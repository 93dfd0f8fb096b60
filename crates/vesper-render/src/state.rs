//! Backend-neutral pipeline state values tracked by the command stream.
//!
//! These are plain `Copy + Eq` values so the command manager can dedup them
//! cheaply. Each backend maps them onto its own native state objects.

/// Number of texture/sampler slots tracked per frame.
pub const MAX_SAMPLER_SLOTS: usize = 8;

/// Blend presets for 2D drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendState {
    /// Standard alpha blending.
    ///
    /// Formula: `src.rgb * src.a + dst.rgb * (1 - src.a)`
    #[default]
    Alpha,

    /// No blending - source completely replaces destination.
    Opaque,

    /// Formula: `src.rgb * src.a + dst.rgb`
    ///
    /// Use for: glow effects, particles, light sources.
    Additive,

    /// Formula: `dst.rgb - src.rgb * src.a`
    Subtractive,

    /// Formula: `src.rgb * dst.rgb`
    ///
    /// Use for: shadows, color tinting.
    Multiply,

    /// Formula: `src.rgb + dst.rgb * (1 - src.a)`
    PremultipliedAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    DstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    ReverseSubtract,
}

/// One channel group (color or alpha) of a blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
}

impl BlendComponent {
    const fn new(src: BlendFactor, dst: BlendFactor, op: BlendOp) -> Self {
        Self { src, dst, op }
    }
}

/// Fully expanded blend equation, `None` from [`BlendState::equation`] means
/// blending is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendEquation {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    pub fn equation(self) -> Option<BlendEquation> {
        use BlendFactor::*;
        use BlendOp::*;

        let alpha_over = BlendComponent::new(One, OneMinusSrcAlpha, Add);
        match self {
            BlendState::Opaque => None,
            BlendState::Alpha => Some(BlendEquation {
                color: BlendComponent::new(SrcAlpha, OneMinusSrcAlpha, Add),
                alpha: alpha_over,
            }),
            BlendState::Additive => Some(BlendEquation {
                color: BlendComponent::new(SrcAlpha, One, Add),
                alpha: BlendComponent::new(Zero, One, Add),
            }),
            BlendState::Subtractive => Some(BlendEquation {
                color: BlendComponent::new(SrcAlpha, One, ReverseSubtract),
                alpha: BlendComponent::new(Zero, One, Add),
            }),
            BlendState::Multiply => Some(BlendEquation {
                color: BlendComponent::new(DstColor, Zero, Add),
                alpha: BlendComponent::new(DstAlpha, Zero, Add),
            }),
            BlendState::PremultipliedAlpha => Some(BlendEquation {
                color: BlendComponent::new(One, OneMinusSrcAlpha, Add),
                alpha: alpha_over,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterizerState {
    pub fill: FillMode,
    pub cull: CullMode,
    /// When false the scissor rect is tracked but not applied.
    pub scissor_enable: bool,
}

impl RasterizerState {
    pub const SOLID_CULL_NONE: Self = Self {
        fill: FillMode::Solid,
        cull: CullMode::None,
        scissor_enable: false,
    };
    pub const SOLID_CULL_BACK: Self = Self {
        fill: FillMode::Solid,
        cull: CullMode::Back,
        scissor_enable: false,
    };
    pub const WIREFRAME_CULL_NONE: Self = Self {
        fill: FillMode::Wireframe,
        cull: CullMode::None,
        scissor_enable: false,
    };
    pub const SCISSOR_CULL_NONE: Self = Self {
        fill: FillMode::Solid,
        cull: CullMode::None,
        scissor_enable: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    Repeat,
    Mirror,
    #[default]
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Texture sampling state for one slot. Min, mag and mip filters share one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerState {
    pub address: AddressMode,
    pub filter: FilterMode,
}

impl SamplerState {
    pub const LINEAR_CLAMP: Self = Self {
        address: AddressMode::Clamp,
        filter: FilterMode::Linear,
    };
    pub const LINEAR_REPEAT: Self = Self {
        address: AddressMode::Repeat,
        filter: FilterMode::Linear,
    };
    pub const LINEAR_MIRROR: Self = Self {
        address: AddressMode::Mirror,
        filter: FilterMode::Linear,
    };
    pub const NEAREST_CLAMP: Self = Self {
        address: AddressMode::Clamp,
        filter: FilterMode::Nearest,
    };
    pub const NEAREST_REPEAT: Self = Self {
        address: AddressMode::Repeat,
        filter: FilterMode::Nearest,
    };
}
