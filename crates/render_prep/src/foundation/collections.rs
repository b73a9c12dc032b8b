//! Arena handle types
//!
//! Every long-lived object in the crate lives in a generational slot map and is
//! referred to by one of the keys below. A key whose slot has been removed no
//! longer resolves, so stale handles are detected instead of aliasing a newer
//! object that reused the slot.

pub use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// Handle to a node in the [`SceneGraph`](crate::scene::SceneGraph)
    pub struct NodeId;

    /// Handle to a mesh in the [`SceneAssets`](crate::scene::SceneAssets) store
    pub struct MeshId;

    /// Handle to a material in the [`SceneAssets`](crate::scene::SceneAssets) store
    pub struct MaterialId;

    /// Handle to an image in the [`SceneAssets`](crate::scene::SceneAssets) store
    pub struct ImageId;

    /// Loan handle for a GPU resource owned by the
    /// [`GpuObjectPool`](crate::render::resources::pool::GpuObjectPool)
    pub struct ResourceHandle;
}
