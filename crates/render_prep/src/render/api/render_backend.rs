//! Backend abstraction traits for the resource pool
//!
//! This module defines the narrow interface a graphics backend must provide so
//! the pool and shadow tracker can create, resize and destroy GPU objects. The
//! preparation pipeline never issues draw or shader-binding calls, so none are
//! part of the trait.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::resources::pool::{PixelFormat, ResourceCategory, ResourceDescriptor};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Opaque identifier of a backend-side object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendResourceId(pub u64);

/// Errors reported by a graphics backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The device could not provide storage for the request
    #[error("out of GPU memory allocating {category:?} {width}x{height}")]
    OutOfMemory {
        /// Category of the failed request
        category: ResourceCategory,
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// The backend does not support the requested format or feature
    #[error("unsupported request: {0}")]
    Unsupported(String),

    /// The id does not refer to a live backend object
    #[error("invalid backend resource {0:?}")]
    InvalidResource(BackendResourceId),

    /// The device or surface was lost
    #[error("device lost")]
    DeviceLost,
}

/// Texture filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    /// Nearest texel
    Nearest,
    /// Bilinear interpolation
    Linear,
}

/// Texture coordinate wrap mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    /// Clamp coordinates to the edge texel
    ClampToEdge,
    /// Tile the texture
    Repeat,
    /// Tile the texture, mirroring every other repetition
    MirroredRepeat,
}

/// Sampling parameters attached to a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplerState {
    /// Minification filter
    pub min_filter: Filter,
    /// Magnification filter
    pub mag_filter: Filter,
    /// Wrap mode along S
    pub wrap_s: WrapMode,
    /// Wrap mode along T
    pub wrap_t: WrapMode,
}

impl SamplerState {
    /// Linear filtering, clamp-to-edge wrapping
    pub const LINEAR_CLAMP: SamplerState = SamplerState {
        min_filter: Filter::Linear,
        mag_filter: Filter::Linear,
        wrap_s: WrapMode::ClampToEdge,
        wrap_t: WrapMode::ClampToEdge,
    };

    /// Same wrapping, with both filters replaced
    pub fn with_filter(self, filter: Filter) -> Self {
        Self {
            min_filter: filter,
            mag_filter: filter,
            ..self
        }
    }
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
        }
    }
}

/// GPU object creation interface consumed by the pool
///
/// Implementations own the real API objects; the pool only ever sees
/// [`BackendResourceId`]s. Every `create_*` call may fail, in which case the
/// pool surfaces the failure to its caller without retrying.
pub trait GpuBackend {
    /// Create a framebuffer object
    fn create_render_target(&mut self) -> BackendResult<BackendResourceId>;

    /// Create a render buffer attachment
    fn create_render_buffer(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        sample_count: u32,
    ) -> BackendResult<BackendResourceId>;

    /// Create a 2D texture (multisampled when `desc.sample_count > 1`)
    fn create_texture_2d(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId>;

    /// Create a 2D texture array with `desc.depth` slices
    fn create_texture_array(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId>;

    /// Create a cube texture
    fn create_texture_cube(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId>;

    /// Create an image binding
    fn create_image_2d(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId>;

    /// Destroy a backend object
    fn destroy_resource(&mut self, id: BackendResourceId, category: ResourceCategory);

    /// Redefine the storage of a resizable object in place
    fn resize_resource(&mut self, id: BackendResourceId, desc: &ResourceDescriptor) -> BackendResult<()>;

    /// Apply sampling parameters to a texture object
    fn set_sampler_state(&mut self, id: BackendResourceId, state: SamplerState);

    /// Upload pixel data to a texture object
    fn set_texture_data(&mut self, id: BackendResourceId, data: &[u8]) -> BackendResult<()>;

    /// Create an object matching `desc`, dispatching on its category
    fn create_resource(&mut self, desc: &ResourceDescriptor) -> BackendResult<BackendResourceId> {
        match desc.category {
            ResourceCategory::RenderTarget => self.create_render_target(),
            ResourceCategory::RenderBuffer => {
                self.create_render_buffer(desc.width, desc.height, desc.format, desc.sample_count)
            }
            ResourceCategory::Texture2D => self.create_texture_2d(desc),
            ResourceCategory::Texture2DArray => self.create_texture_array(desc),
            ResourceCategory::TextureCube => self.create_texture_cube(desc),
            ResourceCategory::Image2D => self.create_image_2d(desc),
        }
    }
}
