//! Strongly-typed index types.
//!
//! Every mesh quantity lives in a flat array; the newtypes here stop an
//! element index from being used where a node index is expected.
//!
//! # Example
//!
//! ```
//! use sl_rs::types::{ElementIndex, NodeIndex};
//!
//! let reference = vec![ElementIndex::new(0); 4];
//! assert_eq!(reference[NodeIndex::new(3)], ElementIndex::ZERO);
//! ```

mod indices;

pub use indices::{ElementIndex, FaceIndex, NodeIndex};
