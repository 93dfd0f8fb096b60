/// Errors surfaced while creating a renderer backend.
///
/// Nothing after construction returns this; per-frame native failures are
/// logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renderer2DError {
    /// No suitable adapter or context could be obtained
    NoAdapter(String),
    /// Device or context creation failed
    DeviceCreation(String),
    /// A shader failed to compile or link
    ShaderCompilation { label: String, log: String },
    /// A native buffer could not be created
    BufferCreation(String),
    /// A native state object could not be created
    StateCreation(String),
}

impl std::fmt::Display for Renderer2DError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAdapter(msg) => write!(f, "No suitable graphics adapter: {}", msg),
            Self::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            Self::ShaderCompilation { label, log } => {
                write!(f, "Shader '{}' failed to compile: {}", label, log)
            }
            Self::BufferCreation(msg) => write!(f, "Buffer creation failed: {}", msg),
            Self::StateCreation(msg) => write!(f, "State object creation failed: {}", msg),
        }
    }
}

impl std::error::Error for Renderer2DError {}

/// Failure of a single native call during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// Mapping or writing a GPU buffer failed
    Upload(String),
    /// The id does not name a registered native resource
    UnknownResource(String),
}

impl std::fmt::Display for NativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload(msg) => write!(f, "Buffer upload failed: {}", msg),
            Self::UnknownResource(msg) => write!(f, "Unknown native resource: {}", msg),
        }
    }
}

impl std::error::Error for NativeError {}
