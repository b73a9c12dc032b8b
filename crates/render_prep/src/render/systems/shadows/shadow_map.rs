//! Shadow map resource tracking
//!
//! Each shadow-casting light owns an entry keyed by its index in the layer's
//! light list. An entry holds either a 2D depth map and its working copy or a
//! cube depth map and its copy, plus a 2D depth-stencil texture the shadow
//! pass renders into. All textures are loans from the [`GpuObjectPool`].
//!
//! Entries persist across frames and are re-validated on every request; GPU
//! work only happens when the requested size, format, sample count or mode
//! differs from what the entry already holds.

use thiserror::Error;

use crate::foundation::collections::ResourceHandle;
use crate::render::api::{GpuBackend, SamplerState};
use crate::render::resources::pool::{GpuObjectPool, PixelFormat, PoolError, ResourceDescriptor};
use crate::render::systems::lighting::ShadowFilter;

/// Format of the depth-stencil texture the shadow pass renders into
pub const DEPTH_RENDER_FORMAT: PixelFormat = PixelFormat::Depth24Stencil8;

/// Shadow projection model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMode {
    /// Single 2D depth map (directional and spot lights)
    Standard,
    /// Six-faced cube depth map (point lights)
    Cube,
}

/// Depth map storage of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMapResources {
    /// 2D depth map and its blur/working copy
    Standard {
        /// Depth map sampled by the lighting pass
        depth_map: ResourceHandle,
        /// Working copy used while filtering
        depth_copy: ResourceHandle,
    },
    /// Cube depth map and its working copy
    Cube {
        /// Cube depth map sampled by the lighting pass
        depth_cube: ResourceHandle,
        /// Working copy used while filtering
        cube_copy: ResourceHandle,
    },
}

impl ShadowMapResources {
    /// Mode this storage corresponds to
    pub fn mode(&self) -> ShadowMode {
        match self {
            ShadowMapResources::Standard { .. } => ShadowMode::Standard,
            ShadowMapResources::Cube { .. } => ShadowMode::Cube,
        }
    }

    /// Both handles of the pair
    pub fn handles(&self) -> [ResourceHandle; 2] {
        match *self {
            ShadowMapResources::Standard { depth_map, depth_copy } => [depth_map, depth_copy],
            ShadowMapResources::Cube { depth_cube, cube_copy } => [depth_cube, cube_copy],
        }
    }
}

/// Parameters of a shadow map request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowMapRequest {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Depth map storage format
    pub format: PixelFormat,
    /// MSAA sample count
    pub sample_count: u32,
    /// 2D or cube
    pub mode: ShadowMode,
    /// Filtering parameters
    pub filter: ShadowFilter,
}

impl ShadowMapRequest {
    /// Square single-sampled request
    pub fn square(size: u32, format: PixelFormat, mode: ShadowMode, filter: ShadowFilter) -> Self {
        Self {
            width: size,
            height: size,
            format,
            sample_count: 1,
            mode,
            filter,
        }
    }
}

/// Shadow resources of one light
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowMapEntry {
    /// Index of the light in the layer light list
    pub light_index: usize,
    /// Depth map pair
    pub resources: ShadowMapResources,
    /// Depth-stencil texture the shadow pass renders into
    pub depth_render: ResourceHandle,
    /// Width of the held maps
    pub width: u32,
    /// Height of the held maps
    pub height: u32,
    /// Format of the held maps
    pub format: PixelFormat,
    /// Sample count of the held maps
    pub sample_count: u32,
    /// Filtering parameters of the last request
    pub filter: ShadowFilter,
}

impl ShadowMapEntry {
    /// Current shadow mode
    pub fn mode(&self) -> ShadowMode {
        self.resources.mode()
    }

    fn matches_storage(&self, request: &ShadowMapRequest) -> bool {
        self.width == request.width
            && self.height == request.height
            && self.format == request.format
            && self.sample_count == request.sample_count.max(1)
    }

    fn handles(&self) -> [ResourceHandle; 3] {
        let [map, copy] = self.resources.handles();
        [map, copy, self.depth_render]
    }
}

/// Outcome of [`ShadowMapTracker::add_shadow_map_entry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMapUpdate {
    /// First request for this light; resources were allocated
    Allocated,
    /// Size, format or sample count changed; resources were reallocated
    Reallocated,
    /// Mode changed; the old pair was released and the other kind allocated
    ModeSwitched,
    /// Request matched the held resources; nothing was allocated
    Unchanged,
}

/// Shadow allocation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShadowError {
    /// The pool could not provide one of the entry's textures
    #[error("shadow map allocation for light {light_index} failed: {source}")]
    Allocation {
        /// Light whose entry failed
        light_index: usize,
        /// Pool failure
        #[source]
        source: PoolError,
    },
}

/// Per-light shadow map resource records for one layer
#[derive(Debug, Default)]
pub struct ShadowMapTracker {
    entries: Vec<ShadowMapEntry>,
    reallocations: u64,
}

impl ShadowMapTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure the light at `light_index` holds shadow resources matching `request`
    ///
    /// # Returns
    ///
    /// * `Ok(ShadowMapUpdate)` - What had to be done to satisfy the request
    /// * `Err(ShadowError)` - Allocation failed; the light is left without an
    ///   entry and every partially obtained texture is back in the pool
    pub fn add_shadow_map_entry(
        &mut self,
        pool: &mut GpuObjectPool,
        backend: &mut dyn GpuBackend,
        light_index: usize,
        request: ShadowMapRequest,
    ) -> Result<ShadowMapUpdate, ShadowError> {
        let Some(position) = self.entries.iter().position(|e| e.light_index == light_index) else {
            let entry = Self::allocate_entry(pool, backend, light_index, &request)?;
            log::debug!("Allocated {:?} shadow map {}x{} for light {}",
                request.mode, request.width, request.height, light_index);
            self.entries.push(entry);
            return Ok(ShadowMapUpdate::Allocated);
        };

        let entry = &mut self.entries[position];
        let mode_changed = entry.mode() != request.mode;
        if !mode_changed && entry.matches_storage(&request) {
            entry.filter = request.filter;
            return Ok(ShadowMapUpdate::Unchanged);
        }

        // Release first so the pool can recycle the old textures for the new pair
        let old = self.entries.swap_remove(position);
        for handle in old.handles() {
            pool.release(handle);
        }

        let entry = Self::allocate_entry(pool, backend, light_index, &request)?;
        self.entries.push(entry);
        self.reallocations += 1;

        if mode_changed {
            log::debug!("Shadow map for light {} switched {:?} -> {:?}", light_index, old.mode(), request.mode);
            Ok(ShadowMapUpdate::ModeSwitched)
        } else {
            log::debug!("Shadow map for light {} reallocated {}x{} -> {}x{}",
                light_index, old.width, old.height, request.width, request.height);
            Ok(ShadowMapUpdate::Reallocated)
        }
    }

    /// Shadow resources of a light, if it has any
    pub fn get_shadow_map_entry(&self, light_index: usize) -> Option<&ShadowMapEntry> {
        self.entries.iter().find(|e| e.light_index == light_index)
    }

    /// Release the resources of one light
    ///
    /// # Returns
    ///
    /// Whether the light had an entry
    pub fn remove_shadow_map_entry(&mut self, pool: &mut GpuObjectPool, light_index: usize) -> bool {
        let Some(position) = self.entries.iter().position(|e| e.light_index == light_index) else {
            return false;
        };
        let entry = self.entries.swap_remove(position);
        for handle in entry.handles() {
            pool.release(handle);
        }
        true
    }

    /// Release every entry back to the pool
    pub fn release_all(&mut self, pool: &mut GpuObjectPool) {
        for entry in self.entries.drain(..) {
            for handle in entry.handles() {
                pool.release(handle);
            }
        }
    }

    /// All entries
    pub fn entries(&self) -> &[ShadowMapEntry] {
        &self.entries
    }

    /// Number of lights with shadow resources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no light has shadow resources
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of reallocations and mode switches performed so far
    pub fn reallocation_count(&self) -> u64 {
        self.reallocations
    }

    fn allocate_entry(
        pool: &mut GpuObjectPool,
        backend: &mut dyn GpuBackend,
        light_index: usize,
        request: &ShadowMapRequest,
    ) -> Result<ShadowMapEntry, ShadowError> {
        let samples = request.sample_count.max(1);
        let map_desc = match request.mode {
            ShadowMode::Standard => ResourceDescriptor::texture_2d(request.width, request.height, request.format, samples),
            ShadowMode::Cube => ResourceDescriptor::texture_cube(request.width, request.height, request.format, samples),
        };
        let depth_desc = ResourceDescriptor::texture_2d(request.width, request.height, DEPTH_RENDER_FORMAT, samples);

        let mut obtained: Vec<ResourceHandle> = Vec::with_capacity(3);
        for desc in [map_desc, map_desc, depth_desc] {
            match pool.allocate(backend, desc) {
                Ok(handle) => obtained.push(handle),
                Err(source) => {
                    for handle in obtained {
                        pool.release(handle);
                    }
                    return Err(ShadowError::Allocation { light_index, source });
                }
            }
        }

        // Sampling must not depend on whatever state a recycled texture carried
        for handle in &obtained {
            pool.set_sampler_state(backend, *handle, SamplerState::LINEAR_CLAMP);
        }

        let (map, copy, depth_render) = (obtained[0], obtained[1], obtained[2]);
        let resources = match request.mode {
            ShadowMode::Standard => ShadowMapResources::Standard { depth_map: map, depth_copy: copy },
            ShadowMode::Cube => ShadowMapResources::Cube { depth_cube: map, cube_copy: copy },
        };

        Ok(ShadowMapEntry {
            light_index,
            resources,
            depth_render,
            width: request.width,
            height: request.height,
            format: request.format,
            sample_count: samples,
            filter: request.filter,
        })
    }
}
