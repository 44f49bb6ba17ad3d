//! Strongly-typed index newtypes.
//!
//! Mesh arrays are flat and keyed by plain integers. These wrappers keep
//! element, node and local-face indices apart at the type level.

use std::fmt;

/// Generates a `usize` index newtype with slice indexing and conversions.
macro_rules! define_index {
    (
        $(#[$meta:meta])*
        $name:ident, $display_prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// First index (0).
            pub const ZERO: Self = Self(0);

            /// Wrap a raw index.
            #[inline]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Raw index value.
            #[inline]
            pub const fn get(self) -> usize {
                self.0
            }

            /// Wrap `index` only if it addresses an array of length `len`.
            #[inline]
            pub const fn checked(index: usize, len: usize) -> Option<Self> {
                if index < len { Some(Self(index)) } else { None }
            }

            /// Iterate over `[0, n)`.
            pub fn iter(n: usize) -> impl ExactSizeIterator<Item = Self> + DoubleEndedIterator {
                (0..n).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(idx: $name) -> usize {
                idx.0
            }
        }

        impl<T> std::ops::Index<$name> for [T] {
            type Output = T;
            #[inline]
            fn index(&self, idx: $name) -> &T {
                &self[idx.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for [T] {
            #[inline]
            fn index_mut(&mut self, idx: $name) -> &mut T {
                &mut self[idx.0]
            }
        }

        impl<T> std::ops::Index<$name> for Vec<T> {
            type Output = T;
            #[inline]
            fn index(&self, idx: $name) -> &T {
                &self[idx.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for Vec<T> {
            #[inline]
            fn index_mut(&mut self, idx: $name) -> &mut T {
                &mut self[idx.0]
            }
        }
    };
}

define_index!(
    /// Element index in a simplex mesh.
    ///
    /// Identifies a triangle (2D) or tetrahedron (3D). Also used as the
    /// per-node reference element that seeds the mesh walk.
    ///
    /// # Example
    ///
    /// ```
    /// use sl_rs::types::ElementIndex;
    ///
    /// let elem = ElementIndex::new(42);
    /// assert_eq!(elem.get(), 42);
    /// assert_eq!(ElementIndex::checked(42, 10), None);
    /// ```
    ElementIndex,
    "E"
);

define_index!(
    /// Global mesh node index.
    ///
    /// Addresses corner and mid-edge nodes in the flat coordinate and
    /// field arrays.
    NodeIndex,
    "N"
);

define_index!(
    /// Local face index within an element.
    ///
    /// Face `i` is the edge (2D) or triangle (3D) opposite corner `i`.
    ///
    /// ```
    /// use sl_rs::types::FaceIndex;
    ///
    /// // faces of a tetrahedron
    /// let faces: Vec<_> = FaceIndex::iter(4).collect();
    /// assert_eq!(faces.len(), 4);
    /// assert_eq!(faces[3].get(), 3);
    /// ```
    FaceIndex,
    "F"
);
