//! Typed per-kind indices into the descriptor / realized-resource tables.
//!
//! Reservation returns one of these newtypes; the numeric value is the
//! append-only position within that kind's table and is stable for the
//! table's whole lifetime. Keeping one newtype per kind makes a cross-kind
//! mixup (e.g. binding a `SamplerId` where a `BufferId` is expected) a type
//! error instead of a silent out-of-range lookup.

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

resource_id!(
    /// Index of a compiled-shader reservation.
    ShaderId
);
resource_id!(
    /// Index of a sampler reservation.
    SamplerId
);
resource_id!(
    /// Index of a 2D texture reservation.
    TextureId
);
resource_id!(
    /// Index of a buffer reservation.
    BufferId
);
resource_id!(
    /// Index of a read-only (shader-resource) view reservation.
    SrvId
);
resource_id!(
    /// Index of a read-write (unordered-access) view reservation.
    UavId
);
resource_id!(
    /// Index of an input-layout reservation.
    LayoutId
);

/// Resource kinds, in realization order.
///
/// The realizer processes kinds in exactly this order so that views can
/// reference buffers/textures that already exist, and input layouts can
/// reference realized vertex shaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Shader,
    Sampler,
    Texture,
    Buffer,
    Srv,
    Uav,
    InputLayout,
}

impl ResourceKind {
    /// All kinds, in realization order.
    pub const REALIZE_ORDER: [ResourceKind; 7] = [
        ResourceKind::Shader,
        ResourceKind::Sampler,
        ResourceKind::Texture,
        ResourceKind::Buffer,
        ResourceKind::Srv,
        ResourceKind::Uav,
        ResourceKind::InputLayout,
    ];
}
