//! Structural descriptors for pooled GPU resources
//!
//! Two descriptors with identical fields describe interchangeable resources, so
//! the pool can satisfy a request with any free resource whose descriptor is
//! equal to the requested one.

use serde::{Deserialize, Serialize};

/// Kind of GPU object a descriptor refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceCategory {
    /// Framebuffer object, carries no storage of its own
    RenderTarget,
    /// Render buffer attachment (depth/stencil or multisampled color)
    RenderBuffer,
    /// Plain 2D texture
    Texture2D,
    /// Layered 2D texture
    Texture2DArray,
    /// Six-faced cube texture
    TextureCube,
    /// Image binding for compute/load-store access
    Image2D,
}

impl ResourceCategory {
    /// Every category, in free-list order
    pub const ALL: [ResourceCategory; 6] = [
        ResourceCategory::RenderTarget,
        ResourceCategory::RenderBuffer,
        ResourceCategory::Texture2D,
        ResourceCategory::Texture2DArray,
        ResourceCategory::TextureCube,
        ResourceCategory::Image2D,
    ];

    /// Whether a free resource of this category can be resized in place
    pub fn is_resizable(self) -> bool {
        matches!(
            self,
            ResourceCategory::RenderBuffer
                | ResourceCategory::Texture2D
                | ResourceCategory::Texture2DArray
                | ResourceCategory::TextureCube
        )
    }

    /// Whether `trim()` drops free resources of this category
    pub fn is_trimmable(self) -> bool {
        self.is_resizable()
    }
}

/// Pixel storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// No storage (render targets)
    Unknown,
    /// Single 8-bit channel
    R8,
    /// Single 16-bit float channel
    R16F,
    /// Single 32-bit float channel
    R32F,
    /// 8-bit RGBA
    Rgba8,
    /// 16-bit float RGBA
    Rgba16F,
    /// 32-bit float RGBA
    Rgba32F,
    /// 16-bit depth
    Depth16,
    /// 24-bit depth
    Depth24,
    /// 32-bit depth
    Depth32,
    /// 24-bit depth with 8-bit stencil
    Depth24Stencil8,
}

impl PixelFormat {
    /// Whether the format stores depth values
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            PixelFormat::Depth16 | PixelFormat::Depth24 | PixelFormat::Depth32 | PixelFormat::Depth24Stencil8
        )
    }
}

/// Whether the storage of a resource may be redefined after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutability {
    /// Storage may be resized or reformatted in place
    Mutable,
    /// Storage is fixed at creation (immutable texture storage)
    Immutable,
}

/// Full structural description of a pooled GPU resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Object kind
    pub category: ResourceCategory,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Depth or slice count (1 for non-array resources)
    pub depth: u32,
    /// Pixel storage format
    pub format: PixelFormat,
    /// MSAA sample count (1 = not multisampled)
    pub sample_count: u32,
    /// Storage mutability
    pub mutability: Mutability,
}

impl ResourceDescriptor {
    /// Descriptor for a framebuffer object
    pub fn render_target() -> Self {
        Self {
            category: ResourceCategory::RenderTarget,
            width: 0,
            height: 0,
            depth: 1,
            format: PixelFormat::Unknown,
            sample_count: 1,
            mutability: Mutability::Mutable,
        }
    }

    /// Descriptor for a render buffer
    pub fn render_buffer(width: u32, height: u32, format: PixelFormat, sample_count: u32) -> Self {
        Self::sized(ResourceCategory::RenderBuffer, width, height, 1, format, sample_count)
    }

    /// Descriptor for a mutable 2D texture
    pub fn texture_2d(width: u32, height: u32, format: PixelFormat, sample_count: u32) -> Self {
        Self::sized(ResourceCategory::Texture2D, width, height, 1, format, sample_count)
    }

    /// Descriptor for a mutable 2D texture array with `slices` layers
    pub fn texture_array(width: u32, height: u32, slices: u32, format: PixelFormat, sample_count: u32) -> Self {
        Self::sized(ResourceCategory::Texture2DArray, width, height, slices.max(1), format, sample_count)
    }

    /// Descriptor for a mutable cube texture
    pub fn texture_cube(width: u32, height: u32, format: PixelFormat, sample_count: u32) -> Self {
        Self::sized(ResourceCategory::TextureCube, width, height, 1, format, sample_count)
    }

    /// Descriptor for an image binding
    pub fn image_2d(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::sized(ResourceCategory::Image2D, width, height, 1, format, 1)
    }

    fn sized(
        category: ResourceCategory,
        width: u32,
        height: u32,
        depth: u32,
        format: PixelFormat,
        sample_count: u32,
    ) -> Self {
        let sample_count = sample_count.max(1);
        Self {
            category,
            width,
            height,
            depth,
            format,
            sample_count,
            // Multisampled storage can never be redefined after creation
            mutability: if sample_count > 1 { Mutability::Immutable } else { Mutability::Mutable },
        }
    }

    /// Same descriptor with immutable storage
    pub fn immutable(mut self) -> Self {
        self.mutability = Mutability::Immutable;
        self
    }

    /// Whether the descriptor requests multisampled storage
    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }

    /// Whether a free resource with this descriptor may be resized to satisfy
    /// another request
    pub fn can_resize(&self) -> bool {
        self.category.is_resizable() && !self.is_multisampled() && self.mutability == Mutability::Mutable
    }
}
