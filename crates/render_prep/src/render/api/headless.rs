//! In-memory backend
//!
//! Hands out sequential ids, remembers the descriptor of every live object and
//! counts each call. Allocation failures can be injected to exercise the
//! degradation paths of the pool and the preparation pipeline.

use std::collections::HashMap;

use super::render_backend::{
    BackendError, BackendResourceId, BackendResult, GpuBackend, SamplerState,
};
use crate::render::resources::pool::{PixelFormat, ResourceCategory, ResourceDescriptor};

/// Counters for every backend call the headless backend has served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCallStats {
    /// Successful object creations
    pub creates: u64,
    /// Failed object creations
    pub failed_creates: u64,
    /// In-place storage redefinitions
    pub resizes: u64,
    /// Object destructions
    pub destroys: u64,
    /// Sampler state updates
    pub sampler_updates: u64,
    /// Pixel uploads
    pub uploads: u64,
}

/// Backend with no device behind it
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    live: HashMap<BackendResourceId, ResourceDescriptor>,
    samplers: HashMap<BackendResourceId, SamplerState>,
    stats: BackendCallStats,
    fail_next: u32,
    max_live: Option<usize>,
}

impl HeadlessBackend {
    /// Create a backend with unlimited capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that refuses creations once `max_live` objects exist
    pub fn with_capacity_limit(max_live: usize) -> Self {
        Self {
            max_live: Some(max_live),
            ..Self::default()
        }
    }

    /// Make the next `count` creation calls fail
    pub fn fail_next_allocations(&mut self, count: u32) {
        self.fail_next = count;
    }

    /// Call counters
    pub fn stats(&self) -> BackendCallStats {
        self.stats
    }

    /// Number of objects currently alive
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Descriptor of a live object
    pub fn descriptor(&self, id: BackendResourceId) -> Option<&ResourceDescriptor> {
        self.live.get(&id)
    }

    /// Last sampler state applied to an object
    pub fn sampler_state(&self, id: BackendResourceId) -> Option<SamplerState> {
        self.samplers.get(&id).copied()
    }

    fn create(&mut self, desc: ResourceDescriptor) -> BackendResult<BackendResourceId> {
        let at_capacity = self.max_live.is_some_and(|max| self.live.len() >= max);
        if self.fail_next > 0 || at_capacity {
            self.fail_next = self.fail_next.saturating_sub(1);
            self.stats.failed_creates += 1;
            return Err(BackendError::OutOfMemory {
                category: desc.category,
                width: desc.width,
                height: desc.height,
            });
        }

        self.next_id += 1;
        let id = BackendResourceId(self.next_id);
        self.live.insert(id, desc);
        self.stats.creates += 1;
        log::trace!("headless: created {:?} as {:?}", desc, id);
        Ok(id)
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_render_target(&mut self) -> BackendResult<BackendResourceId> {
        self.create(ResourceDescriptor::render_target())
    }

    fn create_render_buffer(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        sample_count: u32,
    ) -> BackendResult<BackendResourceId> {
        self.create(ResourceDescriptor::render_buffer(width, height, format, sample_count))
    }

    fn create_texture_2d(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId> {
        self.create(*desc)
    }

    fn create_texture_array(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId> {
        self.create(*desc)
    }

    fn create_texture_cube(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId> {
        self.create(*desc)
    }

    fn create_image_2d(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId> {
        self.create(*desc)
    }

    fn destroy_resource(&mut self, id: BackendResourceId, category: ResourceCategory) {
        match self.live.remove(&id) {
            Some(desc) if desc.category == category => {}
            Some(desc) => {
                log::error!("headless: destroyed {:?} as {:?} but it is a {:?}", id, category, desc.category);
            }
            None => log::error!("headless: destroy of unknown resource {:?}", id),
        }
        self.samplers.remove(&id);
        self.stats.destroys += 1;
    }

    fn resize_resource(&mut self, id: BackendResourceId, desc: &ResourceDescriptor) -> BackendResult<()> {
        let live = self.live.get_mut(&id).ok_or(BackendError::InvalidResource(id))?;
        *live = *desc;
        self.stats.resizes += 1;
        Ok(())
    }

    fn set_sampler_state(&mut self, id: BackendResourceId, state: SamplerState) {
        self.samplers.insert(id, state);
        self.stats.sampler_updates += 1;
    }

    fn set_texture_data(&mut self, id: BackendResourceId, _data: &[u8]) -> BackendResult<()> {
        if !self.live.contains_key(&id) {
            return Err(BackendError::InvalidResource(id));
        }
        self.stats.uploads += 1;
        Ok(())
    }
}
