//! Shared resource handles and the lookup interfaces the renderer consumes.
//!
//! Every resource kind (textures, pixel shaders) goes through one generic
//! [`AssetHandle`]. A handle is an `Arc` around the id and immutable metadata.
//! When the last clone drops, the owning [`AssetRegistry`] is told through
//! [`ReleaseAsset`] so backends can free the native object at a safe point.

use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use vesper_core::alloc::HashMap;
use vesper_core::geometry::Size;

/// A category of GPU resource addressed by [`AssetId`].
pub trait AssetKind: Send + Sync + 'static {
    /// Immutable metadata stored alongside every handle.
    type Info: Clone + std::fmt::Debug + Send + Sync;

    fn kind_name() -> &'static str;
}

/// Typed numeric id of a resource. Ids are never reused by a registry.
pub struct AssetId<K: AssetKind> {
    raw: u32,
    _marker: PhantomData<fn() -> K>,
}

impl<K: AssetKind> AssetId<K> {
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn raw(self) -> u32 {
        self.raw
    }
}

impl<K: AssetKind> std::fmt::Debug for AssetId<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", K::kind_name(), self.raw)
    }
}

impl<K: AssetKind> Clone for AssetId<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: AssetKind> Copy for AssetId<K> {}

impl<K: AssetKind> PartialEq for AssetId<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: AssetKind> Eq for AssetId<K> {}

impl<K: AssetKind> Hash for AssetId<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

/// Receives the id of a resource whose last handle was dropped.
pub trait ReleaseAsset<K: AssetKind>: Send + Sync {
    fn release(&self, id: AssetId<K>);
}

struct HandleInner<K: AssetKind> {
    id: AssetId<K>,
    info: K::Info,
    manager: Option<Weak<dyn ReleaseAsset<K>>>,
}

impl<K: AssetKind> Drop for HandleInner<K> {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.as_ref().and_then(Weak::upgrade) {
            manager.release(self.id);
        }
    }
}

/// Shared-ownership handle to a resource of kind `K`.
///
/// Cloning is an `Arc` clone. Equality and hashing use the id only.
pub struct AssetHandle<K: AssetKind> {
    inner: Arc<HandleInner<K>>,
}

impl<K: AssetKind> AssetHandle<K> {
    /// Creates a handle that reports its release to `manager`.
    pub fn new(id: AssetId<K>, info: K::Info, manager: Weak<dyn ReleaseAsset<K>>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                info,
                manager: Some(manager),
            }),
        }
    }

    /// Creates a handle nobody is notified about, e.g. for resources owned
    /// by the windowing layer.
    pub fn unmanaged(id: AssetId<K>, info: K::Info) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                info,
                manager: None,
            }),
        }
    }

    pub fn id(&self) -> AssetId<K> {
        self.inner.id
    }

    pub fn info(&self) -> &K::Info {
        &self.inner.info
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<K: AssetKind> Clone for AssetHandle<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: AssetKind> std::fmt::Debug for AssetHandle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetHandle")
            .field("id", &self.inner.id)
            .field("info", &self.inner.info)
            .finish()
    }
}

impl<K: AssetKind> PartialEq for AssetHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<K: AssetKind> Eq for AssetHandle<K> {}

impl<K: AssetKind> Hash for AssetHandle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub size: Size<u32>,
    /// Whether the texture can be bound with `SetRenderTarget`.
    pub render_target: bool,
}

pub struct TextureAsset;

impl AssetKind for TextureAsset {
    type Info = TextureInfo;

    fn kind_name() -> &'static str {
        "Texture"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelShaderInfo {
    pub label: String,
}

pub struct PixelShaderAsset;

impl AssetKind for PixelShaderAsset {
    type Info = PixelShaderInfo;

    fn kind_name() -> &'static str {
        "PixelShader"
    }
}

pub type TextureId = AssetId<TextureAsset>;
pub type PixelShaderId = AssetId<PixelShaderAsset>;
pub type Texture = AssetHandle<TextureAsset>;
pub type PixelShader = AssetHandle<PixelShaderAsset>;

/// Size lookup for textures referenced by id in the command stream.
pub trait TextureLookup: Send + Sync {
    fn size(&self, id: TextureId) -> Option<Size<u32>>;
}

/// Built-in pixel shaders every backend provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardPixelShader {
    /// Vertex color only.
    Shape,
    /// Vertex color multiplied by the slot 0 texture.
    Texture,
    /// Square dashes driven by the x texture coordinate.
    SquareDot,
    /// Round dots driven by the x texture coordinate.
    RoundDot,
}

impl StandardPixelShader {
    pub const ALL: [StandardPixelShader; 4] = [
        StandardPixelShader::Shape,
        StandardPixelShader::Texture,
        StandardPixelShader::SquareDot,
        StandardPixelShader::RoundDot,
    ];

    pub const fn index(self) -> usize {
        match self {
            StandardPixelShader::Shape => 0,
            StandardPixelShader::Texture => 1,
            StandardPixelShader::SquareDot => 2,
            StandardPixelShader::RoundDot => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            StandardPixelShader::Shape => "shape",
            StandardPixelShader::Texture => "texture",
            StandardPixelShader::SquareDot => "square_dot",
            StandardPixelShader::RoundDot => "round_dot",
        }
    }
}

/// The shader a draw is recorded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelShaderType {
    Standard(StandardPixelShader),
    Custom(PixelShaderId),
}

impl From<StandardPixelShader> for PixelShaderType {
    fn from(shader: StandardPixelShader) -> Self {
        PixelShaderType::Standard(shader)
    }
}

/// Resolves standard shader kinds to the ids a backend registered for them.
pub trait ShaderLookup: Send + Sync {
    fn pixel_shader(&self, shader: StandardPixelShader) -> PixelShaderId;

    fn resolve(&self, shader: PixelShaderType) -> PixelShaderId {
        match shader {
            PixelShaderType::Standard(standard) => self.pixel_shader(standard),
            PixelShaderType::Custom(id) => id,
        }
    }
}

/// Fixed table of standard shader ids, produced by backends at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardShaderTable {
    ids: [PixelShaderId; 4],
}

impl StandardShaderTable {
    pub fn new(ids: [PixelShaderId; 4]) -> Self {
        Self { ids }
    }
}

impl ShaderLookup for StandardShaderTable {
    fn pixel_shader(&self, shader: StandardPixelShader) -> PixelShaderId {
        self.ids[shader.index()]
    }
}

/// Allocates ids for one resource kind and tracks the metadata of live ones.
///
/// Released ids are queued until a backend drains them with
/// [`drain_released`](Self::drain_released).
pub struct AssetRegistry<K: AssetKind> {
    next_id: AtomicU32,
    entries: RwLock<HashMap<u32, K::Info>>,
    released: Mutex<Vec<AssetId<K>>>,
    this: Weak<AssetRegistry<K>>,
}

pub type TextureRegistry = AssetRegistry<TextureAsset>;
pub type ShaderRegistry = AssetRegistry<PixelShaderAsset>;

impl<K: AssetKind> AssetRegistry<K> {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            next_id: AtomicU32::new(1),
            entries: RwLock::new(HashMap::new()),
            released: Mutex::new(Vec::new()),
            this: this.clone(),
        })
    }

    pub fn create(&self, info: K::Info) -> AssetHandle<K> {
        let id = AssetId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().insert(id.raw(), info.clone());
        tracing::trace!("Created {:?}", id);
        let manager: Weak<dyn ReleaseAsset<K>> = self.this.clone();
        AssetHandle::new(id, info, manager)
    }

    pub fn info(&self, id: AssetId<K>) -> Option<K::Info> {
        self.entries.read().get(&id.raw()).cloned()
    }

    pub fn contains(&self, id: AssetId<K>) -> bool {
        self.entries.read().contains_key(&id.raw())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the ids released since the last call.
    pub fn drain_released(&self) -> Vec<AssetId<K>> {
        std::mem::take(&mut *self.released.lock())
    }
}

impl<K: AssetKind> ReleaseAsset<K> for AssetRegistry<K> {
    fn release(&self, id: AssetId<K>) {
        self.entries.write().remove(&id.raw());
        self.released.lock().push(id);
        tracing::trace!("Released {:?}", id);
    }
}

impl TextureLookup for TextureRegistry {
    fn size(&self, id: TextureId) -> Option<Size<u32>> {
        self.info(id).map(|info| info.size)
    }
}

impl TextureRegistry {
    pub fn create_texture(&self, width: u32, height: u32) -> Texture {
        self.create(TextureInfo {
            size: Size::new(width, height),
            render_target: false,
        })
    }

    pub fn create_render_target(&self, width: u32, height: u32) -> Texture {
        self.create(TextureInfo {
            size: Size::new(width, height),
            render_target: true,
        })
    }
}

impl ShaderRegistry {
    pub fn create_pixel_shader(&self, label: impl Into<String>) -> PixelShader {
        self.create(PixelShaderInfo {
            label: label.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_assigns_unique_ids() {
        let registry = TextureRegistry::new();
        let a = registry.create_texture(4, 4);
        let b = registry.create_texture(8, 8);
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.size(b.id()), Some(Size::new(8, 8)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_last_drop_releases() {
        let registry = TextureRegistry::new();
        let texture = registry.create_texture(16, 16);
        let id = texture.id();
        let clone = texture.clone();
        assert_eq!(texture.strong_count(), 2);

        drop(texture);
        assert!(registry.contains(id));
        assert!(registry.drain_released().is_empty());

        drop(clone);
        assert!(!registry.contains(id));
        assert_eq!(registry.drain_released(), vec![id]);
        assert!(registry.drain_released().is_empty());
    }

    #[test]
    fn test_unmanaged_handle_outlives_nothing() {
        let texture = Texture::unmanaged(
            TextureId::from_raw(99),
            TextureInfo {
                size: Size::new(1, 1),
                render_target: true,
            },
        );
        assert_eq!(texture.id().raw(), 99);
        drop(texture);
    }

    #[test]
    fn test_handle_dropped_after_registry() {
        let registry = TextureRegistry::new();
        let texture = registry.create_texture(2, 2);
        drop(registry);
        drop(texture);
    }

    #[test]
    fn test_standard_shader_table() {
        let ids = [1, 2, 3, 4].map(PixelShaderId::from_raw);
        let table = StandardShaderTable::new(ids);
        assert_eq!(table.pixel_shader(StandardPixelShader::RoundDot).raw(), 4);
        let custom = PixelShaderId::from_raw(42);
        assert_eq!(table.resolve(PixelShaderType::Custom(custom)), custom);
    }

    #[test]
    fn test_id_debug_names_kind() {
        assert_eq!(format!("{:?}", TextureId::from_raw(3)), "Texture(3)");
    }
}
