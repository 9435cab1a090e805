use std::ptr::NonNull;

use memmap2::MmapMut;

use crate::error::{Result, ShmError};
use crate::name::SegmentName;
use crate::sys;

/// Who is responsible for removing the OS-level shared memory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created the object; unlinks it on release.
    Owner,
    /// Opened an existing object; only unmaps its local view on release.
    Attached,
}

enum State {
    Mapped { map: MmapMut, base: NonNull<u8> },
    Unavailable(ShmError),
    Released,
}

/// A named OS shared memory region mapped into this process.
///
/// Opening never panics and never returns an error directly: a segment
/// that could not be created or mapped is kept in an *unavailable* state
/// ([`is_valid`](Self::is_valid) is false, [`as_ptr`](Self::as_ptr) is null,
/// [`error`](Self::error) says why). Use [`create`](Self::create) or
/// [`attach`](Self::attach) for a `Result`-returning constructor.
///
/// The handle is not `Clone`: each mapping has exactly one
/// handle that unmaps it, and each OS object exactly one owner that unlinks
/// it.
pub struct SharedSegment {
    name: SegmentName,
    size: usize,
    ownership: Ownership,
    state: State,
}

impl SharedSegment {
    /// Create or attach a segment of `size` bytes.
    ///
    /// With [`Ownership::Owner`] the object must not exist yet; it is created,
    /// sized and zero-filled. With [`Ownership::Attached`] the object must
    /// already exist and be at least `size` bytes.
    pub fn open(name: SegmentName, size: usize, ownership: Ownership) -> Self {
        let state = match sys::map(&name, size, ownership) {
            Ok(mut map) => {
                if ownership == Ownership::Owner {
                    map.fill(0);
                }
                match NonNull::new(map.as_mut_ptr()) {
                    Some(base) => {
                        tracing::debug!(segment = %name, size, ?ownership, "mapped shared segment");
                        State::Mapped { map, base }
                    }
                    None => State::Unavailable(ShmError::Unavailable(name.to_string())),
                }
            }
            Err(err) => {
                tracing::warn!(segment = %name, size, ?ownership, error = %err, "shared segment unavailable");
                State::Unavailable(err)
            }
        };

        SharedSegment {
            name,
            size,
            ownership,
            state,
        }
    }

    /// Create a fresh zero-filled segment owned by this handle.
    pub fn create(name: SegmentName, size: usize) -> Result<Self> {
        Self::open(name, size, Ownership::Owner).into_result()
    }

    /// Attach to a segment some other handle created.
    pub fn attach(name: SegmentName, size: usize) -> Result<Self> {
        Self::open(name, size, Ownership::Attached).into_result()
    }

    /// Turn an unavailable segment into its error.
    pub fn into_result(mut self) -> Result<Self> {
        match std::mem::replace(&mut self.state, State::Released) {
            State::Unavailable(err) => Err(err),
            state => {
                self.state = state;
                Ok(self)
            }
        }
    }

    pub fn name(&self) -> &SegmentName {
        &self.name
    }

    /// Requested capacity in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// True while the segment is mapped in this process.
    pub fn is_valid(&self) -> bool {
        matches!(self.state, State::Mapped { .. })
    }

    /// Why the segment could not be opened, if it could not.
    pub fn error(&self) -> Option<&ShmError> {
        match &self.state {
            State::Unavailable(err) => Some(err),
            _ => None,
        }
    }

    /// Base address of the local mapping, or null when not mapped.
    ///
    /// The address is only meaningful inside this process (and in children
    /// forked while the mapping is alive).
    pub fn as_ptr(&self) -> *mut u8 {
        match &self.state {
            State::Mapped { base, .. } => base.as_ptr(),
            _ => std::ptr::null_mut(),
        }
    }

    /// Number of whole f64 values that fit in the segment.
    pub fn f64_len(&self) -> usize {
        self.size / std::mem::size_of::<f64>()
    }

    /// View the segment as f64 values.
    pub fn as_f64_slice(&self) -> Result<&[f64]> {
        match &self.state {
            // Mappings are page aligned, so the cast to f64 is aligned.
            State::Mapped { base, .. } => Ok(unsafe {
                std::slice::from_raw_parts(base.as_ptr() as *const f64, self.f64_len())
            }),
            _ => Err(ShmError::Unavailable(self.name.to_string())),
        }
    }

    /// Mutable view of the segment as f64 values.
    ///
    /// Other processes may map the same object; keeping their writes
    /// disjoint from this one is the caller's job.
    pub fn as_f64_slice_mut(&mut self) -> Result<&mut [f64]> {
        match &self.state {
            State::Mapped { base, .. } => Ok(unsafe {
                std::slice::from_raw_parts_mut(base.as_ptr() as *mut f64, self.f64_len())
            }),
            _ => Err(ShmError::Unavailable(self.name.to_string())),
        }
    }

    /// Unmap the local view and, for the owner, unlink the OS object.
    ///
    /// Calling this more than once is a no-op. Runs on drop.
    pub fn release(&mut self) {
        if let State::Mapped { map, .. } = std::mem::replace(&mut self.state, State::Released) {
            drop(map);
            if self.ownership == Ownership::Owner {
                if let Err(err) = sys::unlink(&self.name) {
                    tracing::warn!(segment = %self.name, error = %err, "failed to unlink shared segment");
                }
            }
            tracing::debug!(segment = %self.name, ownership = ?self.ownership, "released shared segment");
        }
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SharedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSegment")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("ownership", &self.ownership)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Bytes needed for a flat `n x n` matrix of f64.
pub fn matrix_bytes(n: usize) -> usize {
    n * n * std::mem::size_of::<f64>()
}
