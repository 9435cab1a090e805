//! `tm-shm` - Named shared memory segments for tilemul.
//!
//! A [`SharedSegment`] is an OS-global memory object identified by name and
//! mapped into the current process. Several processes can map the same
//! object: one creates it as [`Ownership::Owner`] and removes it when done,
//! the others open it as [`Ownership::Attached`] and only drop their local
//! mapping.

pub mod error;
pub mod name;
pub mod segment;
mod sys;

pub use error::{Result, ShmError};
pub use name::SegmentName;
pub use segment::{matrix_bytes, Ownership, SharedSegment};
