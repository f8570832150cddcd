//! Typed handles to device objects.
//!
//! Handles are plain indices chosen by the device. Each kind of object gets
//! its own type so a vertex buffer can never be passed where an index buffer
//! is expected.

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a device-chosen raw value.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// The raw value chosen by the device.
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_handle!(
    /// Handle to a registered vertex layout.
    VertexLayoutHandle
);
define_handle!(
    /// Handle to an immutable vertex buffer.
    VertexBufferHandle
);
define_handle!(
    /// Handle to an updatable vertex buffer.
    DynamicVertexBufferHandle
);
define_handle!(
    /// Handle to an immutable index buffer.
    IndexBufferHandle
);
define_handle!(
    /// Handle to an updatable index buffer.
    DynamicIndexBufferHandle
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_raw_roundtrip() {
        let handle = VertexBufferHandle::from_raw(42);
        assert_eq!(handle.raw(), 42);
        assert_eq!(handle, VertexBufferHandle::from_raw(42));
        assert_ne!(handle, VertexBufferHandle::from_raw(7));
    }
}
