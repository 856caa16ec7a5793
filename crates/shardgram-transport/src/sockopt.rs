//! Kernel socket buffer sizing.
//!
//! The standard library does not expose `SO_RCVBUF`/`SO_SNDBUF`, so on Unix
//! these go straight through `setsockopt`. Other platforms keep the kernel
//! defaults.

use std::io;

/// Which kernel buffer to resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// `SO_RCVBUF`
    Receive,
    /// `SO_SNDBUF`
    Send,
}

impl BufferKind {
    /// Option name for diagnostics.
    pub fn option_name(self) -> &'static str {
        match self {
            BufferKind::Receive => "SO_RCVBUF",
            BufferKind::Send => "SO_SNDBUF",
        }
    }
}

/// Request a kernel buffer of `size` bytes on `socket`.
///
/// The kernel may round or clamp the value; use [`buffer_size`] to observe
/// what was granted.
#[cfg(unix)]
pub fn set_buffer_size<S: std::os::fd::AsRawFd>(
    socket: &S,
    kind: BufferKind,
    size: usize,
) -> io::Result<()> {
    let value = libc::c_int::try_from(size).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("buffer size {size} exceeds c_int"),
        )
    })?;

    // SAFETY: `value` lives for the duration of the call and its size is passed
    // alongside the pointer; the descriptor is owned by `socket`.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            raw_option(kind),
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Read back the kernel buffer size currently applied to `socket`.
#[cfg(unix)]
pub fn buffer_size<S: std::os::fd::AsRawFd>(socket: &S, kind: BufferKind) -> io::Result<usize> {
    let mut value: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

    // SAFETY: `value` and `len` are valid writable pointers for the provided sizes.
    let rc = unsafe {
        libc::getsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            raw_option(kind),
            (&mut value as *mut libc::c_int).cast::<libc::c_void>(),
            &mut len,
        )
    };

    if rc == 0 {
        Ok(usize::try_from(value).unwrap_or(0))
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn raw_option(kind: BufferKind) -> libc::c_int {
    match kind {
        BufferKind::Receive => libc::SO_RCVBUF,
        BufferKind::Send => libc::SO_SNDBUF,
    }
}

/// Request a kernel buffer of `size` bytes on `socket`.
#[cfg(not(unix))]
pub fn set_buffer_size<S>(_socket: &S, kind: BufferKind, _size: usize) -> io::Result<()> {
    tracing::debug!(option = kind.option_name(), "socket buffer sizing unsupported; keeping default");
    Ok(())
}
