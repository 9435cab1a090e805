// Platform layer: POSIX shm_open + memmap2 on unix, unsupported elsewhere.

use memmap2::MmapMut;

use crate::error::{Result, ShmError};
use crate::name::SegmentName;
use crate::segment::Ownership;

#[cfg(unix)]
pub(crate) fn map(name: &SegmentName, size: usize, ownership: Ownership) -> Result<MmapMut> {
    use std::ffi::CString;
    use std::fs::File;
    use std::io;
    use std::os::unix::io::FromRawFd;

    use memmap2::MmapOptions;

    if size == 0 {
        return Err(ShmError::ZeroSize);
    }
    let c_name =
        CString::new(name.as_str()).map_err(|_| ShmError::InvalidName(name.to_string()))?;

    let flags = match ownership {
        Ownership::Owner => libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
        Ownership::Attached => libc::O_RDWR,
    };
    let fd = unsafe { shm_open(&c_name, flags) };
    if fd == -1 {
        let err = io::Error::last_os_error();
        return Err(match err.kind() {
            io::ErrorKind::AlreadyExists => ShmError::AlreadyExists(name.to_string()),
            io::ErrorKind::NotFound => ShmError::NotFound(name.to_string()),
            _ => ShmError::Os {
                op: "shm_open",
                name: name.to_string(),
                source: err,
            },
        });
    }
    // The File closes the descriptor; the mapping outlives it.
    let file = unsafe { File::from_raw_fd(fd) };

    let prepared = match ownership {
        Ownership::Owner => file.set_len(size as u64).map_err(|source| ShmError::Os {
            op: "ftruncate",
            name: name.to_string(),
            source,
        }),
        Ownership::Attached => check_len(&file, name, size),
    };
    let mapped = prepared.and_then(|()| {
        unsafe { MmapOptions::new().len(size).map_mut(&file) }.map_err(|source| ShmError::Os {
            op: "mmap",
            name: name.to_string(),
            source,
        })
    });

    if mapped.is_err() && ownership == Ownership::Owner {
        let _ = unlink(name);
    }
    mapped
}

#[cfg(unix)]
fn check_len(file: &std::fs::File, name: &SegmentName, size: usize) -> Result<()> {
    let actual = file
        .metadata()
        .map_err(|source| ShmError::Os {
            op: "fstat",
            name: name.to_string(),
            source,
        })?
        .len() as usize;
    if actual < size {
        return Err(ShmError::TooSmall {
            name: name.to_string(),
            expected: size,
            actual,
        });
    }
    Ok(())
}

#[cfg(all(unix, target_os = "macos"))]
unsafe fn shm_open(name: &std::ffi::CStr, flags: libc::c_int) -> libc::c_int {
    // Variadic on macOS: the mode is promoted to an unsigned int.
    libc::shm_open(name.as_ptr(), flags, 0o600 as libc::c_uint)
}

#[cfg(all(unix, not(target_os = "macos")))]
unsafe fn shm_open(name: &std::ffi::CStr, flags: libc::c_int) -> libc::c_int {
    libc::shm_open(name.as_ptr(), flags, 0o600 as libc::mode_t)
}

#[cfg(unix)]
pub(crate) fn unlink(name: &SegmentName) -> Result<()> {
    let c_name =
        std::ffi::CString::new(name.as_str()).map_err(|_| ShmError::InvalidName(name.to_string()))?;
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } == -1 {
        return Err(ShmError::Os {
            op: "shm_unlink",
            name: name.to_string(),
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn map(_name: &SegmentName, _size: usize, _ownership: Ownership) -> Result<MmapMut> {
    Err(ShmError::Unsupported)
}

#[cfg(not(unix))]
pub(crate) fn unlink(_name: &SegmentName) -> Result<()> {
    Err(ShmError::Unsupported)
}
