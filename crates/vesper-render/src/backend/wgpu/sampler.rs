//! Sampler reuse.
//!
//! [`SamplerState`] is already hashable, so it is the cache key directly.

use std::sync::Arc;

use parking_lot::RwLock;
use vesper_core::alloc::HashMap;
use vesper_core::profiling::profile_function;

use crate::state::{AddressMode, FilterMode, SamplerState};

pub fn to_wgpu_address(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
    }
}

pub fn to_wgpu_filter(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

pub fn descriptor(state: SamplerState) -> wgpu::SamplerDescriptor<'static> {
    let address = to_wgpu_address(state.address);
    let filter = to_wgpu_filter(state.filter);
    wgpu::SamplerDescriptor {
        label: Some("vesper_sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        ..Default::default()
    }
}

/// Thread-safe cache of GPU samplers keyed by sampler state.
#[derive(Default)]
pub struct SamplerCache {
    cache: RwLock<HashMap<SamplerState, Arc<wgpu::Sampler>>>,
}

impl SamplerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, device: &wgpu::Device, state: SamplerState) -> Arc<wgpu::Sampler> {
        profile_function!();
        if let Some(sampler) = self.cache.read().get(&state) {
            return Arc::clone(sampler);
        }

        let mut cache = self.cache.write();
        // Another thread may have inserted while we waited for the lock
        if let Some(sampler) = cache.get(&state) {
            return Arc::clone(sampler);
        }
        tracing::debug!("Creating sampler {:?}", state);
        let sampler = Arc::new(device.create_sampler(&descriptor(state)));
        cache.insert(state, Arc::clone(&sampler));
        sampler
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}
