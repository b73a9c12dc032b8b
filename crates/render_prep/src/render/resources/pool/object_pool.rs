//! GPU Object Pool
//!
//! Amortizes GPU object creation across frames. Callers `allocate` a resource
//! by descriptor and `release` it when the frame no longer needs it; released
//! resources stay alive on the GPU in a per-category free list and satisfy
//! later requests without a driver round-trip.
//!
//! # Allocation order
//!
//! 1. Exact descriptor match from the category free list.
//! 2. For single-sampled requests, in-place resize of a free resource of the
//!    same category that is itself single-sampled and mutable.
//! 3. Fresh creation through the backend.
//!
//! Handles are generational slotmap keys. A handle whose resource was trimmed
//! or destroyed no longer resolves, so late releases are detected instead of
//! corrupting a free list.

use std::collections::HashMap;

use thiserror::Error;

use super::descriptor::{ResourceCategory, ResourceDescriptor};
use crate::config::PoolConfig;
use crate::foundation::collections::{ResourceHandle, SlotMap};
use crate::render::api::{BackendError, BackendResourceId, Filter, GpuBackend, SamplerState};

/// Errors that can occur during pool allocation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The backend could not create the requested resource
    #[error("allocation of {descriptor:?} failed: {source}")]
    AllocationFailed {
        /// Requested descriptor
        descriptor: ResourceDescriptor,
        /// Backend failure
        #[source]
        source: BackendError,
    },
}

/// A GPU object owned by the pool
#[derive(Debug, Clone)]
pub struct PooledResource {
    /// Backend-side object id
    pub backend_id: BackendResourceId,
    /// Current storage description
    pub descriptor: ResourceDescriptor,
    /// Last sampler state applied through the backend
    pub sampler: SamplerState,
}

/// Statistics for the object pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful `allocate` calls
    pub allocations: u64,
    /// Allocations satisfied by an exact free-list match
    pub reuse_hits: u64,
    /// Allocations satisfied by resizing a free resource
    pub resizes: u64,
    /// Allocations that created a new backend object
    pub creations: u64,
    /// Accepted `release` calls
    pub releases: u64,
    /// Releases ignored because of a stale handle or double release
    pub rejected_releases: u64,
    /// Resources destroyed by `trim`
    pub trimmed: u64,
}

/// Recycling pool of GPU render targets, buffers, textures and images
#[derive(Debug)]
pub struct GpuObjectPool {
    /// Master ownership list of every live resource, loaned or free
    resources: SlotMap<ResourceHandle, PooledResource>,
    /// Released resources per category, unordered
    free_lists: HashMap<ResourceCategory, Vec<ResourceHandle>>,
    /// Filter applied to sampled textures on every allocation
    default_filter: Filter,
    stats: PoolStats,
}

impl GpuObjectPool {
    /// Create an empty pool with linear default filtering
    pub fn new() -> Self {
        Self::with_config(&PoolConfig::default())
    }

    /// Create an empty pool from configuration
    pub fn with_config(config: &PoolConfig) -> Self {
        Self {
            resources: SlotMap::with_key(),
            free_lists: ResourceCategory::ALL
                .iter()
                .map(|category| (*category, Vec::new()))
                .collect(),
            default_filter: config.default_filter,
            stats: PoolStats::default(),
        }
    }

    /// Loan a resource matching `descriptor`
    ///
    /// # Returns
    ///
    /// * `Ok(ResourceHandle)` - Reused, resized or freshly created resource
    /// * `Err(PoolError)` - The backend failed to create the resource
    pub fn allocate(
        &mut self,
        backend: &mut dyn GpuBackend,
        descriptor: ResourceDescriptor,
    ) -> Result<ResourceHandle, PoolError> {
        if let Some(handle) = self.take_exact_match(&descriptor) {
            self.stats.reuse_hits += 1;
            self.finish_allocation(backend, handle);
            return Ok(handle);
        }

        if let Some(handle) = self.resize_free_resource(backend, &descriptor) {
            self.stats.resizes += 1;
            self.finish_allocation(backend, handle);
            return Ok(handle);
        }

        let backend_id = backend
            .create_resource(&descriptor)
            .map_err(|source| PoolError::AllocationFailed { descriptor, source })?;

        let handle = self.resources.insert(PooledResource {
            backend_id,
            descriptor,
            sampler: SamplerState::default(),
        });
        self.stats.creations += 1;
        log::debug!("Pool created {:?} {}x{}x{} {:?} as {:?}",
            descriptor.category, descriptor.width, descriptor.height, descriptor.depth,
            descriptor.format, backend_id);

        self.finish_allocation(backend, handle);
        Ok(handle)
    }

    /// Return a loaned resource to its free list
    ///
    /// The resource stays alive on the GPU. Releasing a handle twice is a
    /// programming error: it asserts in debug builds and is logged and ignored
    /// otherwise. Stale handles (resource already trimmed) are ignored.
    pub fn release(&mut self, handle: ResourceHandle) {
        let Some(resource) = self.resources.get(handle) else {
            log::warn!("Pool release of stale handle {:?} ignored", handle);
            self.stats.rejected_releases += 1;
            return;
        };

        let free = self.free_lists.entry(resource.descriptor.category).or_default();
        let already_free = free.contains(&handle);
        debug_assert!(!already_free, "double release of pooled resource {:?}", handle);
        if already_free {
            log::error!("Pool double release of {:?} ignored", handle);
            self.stats.rejected_releases += 1;
            return;
        }

        free.push(handle);
        self.stats.releases += 1;
    }

    /// Destroy every free resource of the variable-size categories
    ///
    /// Render targets and image bindings are kept. Loaned resources are never
    /// touched.
    ///
    /// # Returns
    ///
    /// Number of resources destroyed
    pub fn trim(&mut self, backend: &mut dyn GpuBackend) -> usize {
        let mut destroyed = 0;
        for category in ResourceCategory::ALL.into_iter().filter(|c| c.is_trimmable()) {
            let handles = self.free_lists.get_mut(&category).map(std::mem::take).unwrap_or_default();
            for handle in handles {
                if let Some(resource) = self.resources.remove(handle) {
                    backend.destroy_resource(resource.backend_id, category);
                    destroyed += 1;
                }
            }
        }

        self.stats.trimmed += destroyed as u64;
        if destroyed > 0 {
            log::debug!("Pool trimmed {} free resources", destroyed);
        }
        destroyed
    }

    /// Destroy every resource the pool owns, loaned or free
    pub fn destroy_all(&mut self, backend: &mut dyn GpuBackend) {
        let count = self.resources.len();
        for (_, resource) in self.resources.drain() {
            backend.destroy_resource(resource.backend_id, resource.descriptor.category);
        }
        for free in self.free_lists.values_mut() {
            free.clear();
        }
        log::debug!("Pool destroyed {} resources", count);
    }

    /// Look up a resource by handle
    pub fn get(&self, handle: ResourceHandle) -> Option<&PooledResource> {
        self.resources.get(handle)
    }

    /// Backend id of a resource
    pub fn backend_id(&self, handle: ResourceHandle) -> Option<BackendResourceId> {
        self.resources.get(handle).map(|r| r.backend_id)
    }

    /// Current descriptor of a resource
    pub fn descriptor(&self, handle: ResourceHandle) -> Option<ResourceDescriptor> {
        self.resources.get(handle).map(|r| r.descriptor)
    }

    /// Apply a sampler state to a texture resource
    pub fn set_sampler_state(
        &mut self,
        backend: &mut dyn GpuBackend,
        handle: ResourceHandle,
        state: SamplerState,
    ) {
        if let Some(resource) = self.resources.get_mut(handle) {
            backend.set_sampler_state(resource.backend_id, state);
            resource.sampler = state;
        }
    }

    /// Whether `handle` is currently in a free list
    pub fn is_free(&self, handle: ResourceHandle) -> bool {
        self.resources
            .get(handle)
            .and_then(|r| self.free_lists.get(&r.descriptor.category))
            .is_some_and(|free| free.contains(&handle))
    }

    /// Number of live resources (loaned and free)
    pub fn live_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of free resources in a category
    pub fn free_count(&self, category: ResourceCategory) -> usize {
        self.free_lists.get(&category).map_or(0, Vec::len)
    }

    /// Number of resources currently on loan
    pub fn loaned_count(&self) -> usize {
        let free: usize = self.free_lists.values().map(Vec::len).sum();
        self.resources.len() - free
    }

    /// Pool statistics
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn take_exact_match(&mut self, descriptor: &ResourceDescriptor) -> Option<ResourceHandle> {
        let free = self.free_lists.get_mut(&descriptor.category)?;
        let position = free.iter().position(|handle| {
            self.resources
                .get(*handle)
                .is_some_and(|resource| resource.descriptor == *descriptor)
        })?;
        Some(free.swap_remove(position))
    }

    fn resize_free_resource(
        &mut self,
        backend: &mut dyn GpuBackend,
        descriptor: &ResourceDescriptor,
    ) -> Option<ResourceHandle> {
        if !descriptor.can_resize() {
            return None;
        }

        let free = self.free_lists.get_mut(&descriptor.category)?;
        let position = free.iter().position(|handle| {
            self.resources
                .get(*handle)
                .is_some_and(|resource| resource.descriptor.can_resize())
        })?;
        let handle = free.swap_remove(position);
        let resource = self.resources.get_mut(handle)?;

        match backend.resize_resource(resource.backend_id, descriptor) {
            Ok(()) => {
                log::trace!("Pool resized {:?} from {:?} to {:?}", handle, resource.descriptor, descriptor);
                resource.descriptor = *descriptor;
                Some(handle)
            }
            Err(err) => {
                // The resource keeps its old storage; fall through to creation
                log::debug!("Pool resize of {:?} failed: {}", handle, err);
                free.push(handle);
                None
            }
        }
    }

    fn finish_allocation(&mut self, backend: &mut dyn GpuBackend, handle: ResourceHandle) {
        self.stats.allocations += 1;
        let Some(resource) = self.resources.get_mut(handle) else {
            return;
        };

        let sampled = matches!(
            resource.descriptor.category,
            ResourceCategory::Texture2D | ResourceCategory::Texture2DArray | ResourceCategory::TextureCube
        );
        if sampled && !resource.descriptor.is_multisampled() {
            let state = resource.sampler.with_filter(self.default_filter);
            backend.set_sampler_state(resource.backend_id, state);
            resource.sampler = state;
        }
    }
}

impl Default for GpuObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::HeadlessBackend;
    use crate::render::resources::pool::PixelFormat;

    fn texture(width: u32, height: u32) -> ResourceDescriptor {
        ResourceDescriptor::texture_2d(width, height, PixelFormat::Rgba8, 1)
    }

    #[test]
    fn test_release_then_allocate_reuses_resource() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let first = pool.allocate(&mut backend, texture(128, 128)).unwrap();
        let first_id = pool.backend_id(first).unwrap();
        pool.release(first);

        let second = pool.allocate(&mut backend, texture(128, 128)).unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.backend_id(second), Some(first_id));
        assert_eq!(backend.stats().creates, 1);
        assert_eq!(pool.stats().reuse_hits, 1);
    }

    #[test]
    fn test_reuse_applies_linear_filtering() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let handle = pool.allocate(&mut backend, texture(8, 8)).unwrap();
        let id = pool.backend_id(handle).unwrap();
        pool.set_sampler_state(&mut backend, handle, SamplerState::default());
        pool.release(handle);

        pool.allocate(&mut backend, texture(8, 8)).unwrap();
        let state = backend.sampler_state(id).unwrap();
        assert_eq!(state.min_filter, Filter::Linear);
        assert_eq!(state.mag_filter, Filter::Linear);
    }

    #[test]
    fn test_size_change_resizes_instead_of_recreating() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let handle = pool.allocate(&mut backend, texture(256, 256)).unwrap();
        pool.release(handle);

        let resized = pool.allocate(&mut backend, texture(512, 300)).unwrap();
        assert_eq!(resized, handle);
        assert_eq!(backend.stats().resizes, 1);
        assert_eq!(backend.stats().creates, 1);
        assert_eq!(backend.stats().destroys, 0);
        assert_eq!(pool.descriptor(resized), Some(texture(512, 300)));
    }

    #[test]
    fn test_multisampled_request_never_resizes() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let single = pool.allocate(&mut backend, texture(64, 64)).unwrap();
        pool.release(single);

        let msaa = ResourceDescriptor::texture_2d(64, 64, PixelFormat::Rgba8, 4);
        let handle = pool.allocate(&mut backend, msaa).unwrap();
        assert_ne!(handle, single);
        assert_eq!(backend.stats().resizes, 0);
        assert_eq!(backend.stats().creates, 2);
    }

    #[test]
    fn test_multisampled_free_resource_is_not_resized() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let msaa = pool
            .allocate(&mut backend, ResourceDescriptor::render_buffer(64, 64, PixelFormat::Depth24, 4))
            .unwrap();
        pool.release(msaa);

        let request = ResourceDescriptor::render_buffer(128, 128, PixelFormat::Depth24, 1);
        let handle = pool.allocate(&mut backend, request).unwrap();
        assert_ne!(handle, msaa);
        assert_eq!(backend.stats().resizes, 0);
        assert!(pool.is_free(msaa));
    }

    #[test]
    fn test_immutable_free_resource_is_not_resized() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let immutable = pool.allocate(&mut backend, texture(32, 32).immutable()).unwrap();
        pool.release(immutable);

        pool.allocate(&mut backend, texture(64, 64)).unwrap();
        assert_eq!(backend.stats().resizes, 0);
        assert_eq!(backend.stats().creates, 2);
    }

    #[test]
    fn test_categories_do_not_mix() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let flat = pool.allocate(&mut backend, texture(64, 64)).unwrap();
        pool.release(flat);

        let cube = pool
            .allocate(&mut backend, ResourceDescriptor::texture_cube(64, 64, PixelFormat::Rgba8, 1))
            .unwrap();
        assert_ne!(cube, flat);
        assert_eq!(pool.free_count(ResourceCategory::Texture2D), 1);
    }

    #[test]
    fn test_render_targets_are_interchangeable() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let target = pool.allocate(&mut backend, ResourceDescriptor::render_target()).unwrap();
        pool.release(target);
        assert_eq!(pool.allocate(&mut backend, ResourceDescriptor::render_target()).unwrap(), target);
    }

    #[test]
    fn test_backend_failure_propagates() {
        let mut backend = HeadlessBackend::new();
        backend.fail_next_allocations(1);
        let mut pool = GpuObjectPool::new();

        let result = pool.allocate(&mut backend, texture(16, 16));
        assert!(matches!(result, Err(PoolError::AllocationFailed { .. })));
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.stats().allocations, 0);
    }

    #[test]
    fn test_trim_drops_free_variable_size_resources_only() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let loaned = pool.allocate(&mut backend, texture(16, 16)).unwrap();
        let free_texture = pool.allocate(&mut backend, texture(32, 32)).unwrap();
        let free_buffer = pool
            .allocate(&mut backend, ResourceDescriptor::render_buffer(32, 32, PixelFormat::Depth24Stencil8, 1))
            .unwrap();
        let free_target = pool.allocate(&mut backend, ResourceDescriptor::render_target()).unwrap();
        let free_image = pool
            .allocate(&mut backend, ResourceDescriptor::image_2d(8, 8, PixelFormat::R32F))
            .unwrap();
        pool.release(free_texture);
        pool.release(free_buffer);
        pool.release(free_target);
        pool.release(free_image);

        assert_eq!(pool.trim(&mut backend), 2);
        assert!(pool.get(loaned).is_some());
        assert!(pool.get(free_texture).is_none());
        assert!(pool.get(free_buffer).is_none());
        assert!(pool.is_free(free_target));
        assert!(pool.is_free(free_image));
        assert_eq!(backend.live_count(), 3);
    }

    #[test]
    fn test_release_after_trim_is_ignored() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let handle = pool.allocate(&mut backend, texture(16, 16)).unwrap();
        pool.release(handle);
        pool.trim(&mut backend);

        pool.release(handle);
        assert_eq!(pool.stats().rejected_releases, 1);
        assert_eq!(pool.free_count(ResourceCategory::Texture2D), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "double release")]
    fn test_double_release_asserts_in_debug() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let handle = pool.allocate(&mut backend, texture(16, 16)).unwrap();
        pool.release(handle);
        pool.release(handle);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_double_release_ignored_in_release() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let handle = pool.allocate(&mut backend, texture(16, 16)).unwrap();
        pool.release(handle);
        pool.release(handle);
        assert_eq!(pool.free_count(ResourceCategory::Texture2D), 1);
        assert_eq!(pool.stats().rejected_releases, 1);
    }

    #[test]
    fn test_loaned_count_and_destroy_all() {
        let mut backend = HeadlessBackend::new();
        let mut pool = GpuObjectPool::new();

        let a = pool.allocate(&mut backend, texture(16, 16)).unwrap();
        let _b = pool.allocate(&mut backend, texture(16, 16)).unwrap();
        pool.release(a);
        assert_eq!(pool.loaned_count(), 1);

        pool.destroy_all(&mut backend);
        assert_eq!(pool.live_count(), 0);
        assert_eq!(backend.live_count(), 0);
    }
}
