//! Raw input event sources.
//!
//! Only presence of events matters, so a source reports how many events it
//! drained, never their content.

use std::io;
use std::path::Path;

/// A pollable stream of input events.
pub trait EventSource {
    /// Drains every pending event without blocking and returns the count.
    ///
    /// `Ok(0)` means nothing happened since the last call.
    fn drain(&mut self) -> io::Result<usize>;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn drain(&mut self) -> io::Result<usize> {
        (**self).drain()
    }
}

/// Upper bound on reads per drain so a flooding device cannot pin a tick.
#[cfg(target_os = "linux")]
const MAX_READS_PER_DRAIN: usize = 64;

/// An evdev node (`/dev/input/eventN`) opened in non-blocking mode.
///
/// The handle is released when the source is dropped.
#[cfg(target_os = "linux")]
pub struct EvdevSource {
    device: evdev::Device,
}

#[cfg(target_os = "linux")]
impl EvdevSource {
    /// Opens the device node. Requires read access to it (usually the
    /// `input` group).
    pub fn open(path: &Path) -> io::Result<Self> {
        use std::os::fd::AsRawFd;

        let device = evdev::Device::open(path)?;

        let fd = device.as_raw_fd();
        // SAFETY: `fd` is a valid descriptor owned by `device` for this scope.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: as above; only the O_NONBLOCK status flag is added.
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }

        tracing::debug!(
            path = ?path,
            name = device.name().unwrap_or("unknown"),
            "Opened input device"
        );

        Ok(Self { device })
    }
}

#[cfg(target_os = "linux")]
impl EventSource for EvdevSource {
    fn drain(&mut self) -> io::Result<usize> {
        let mut total = 0;

        for _ in 0..MAX_READS_PER_DRAIN {
            match self.device.fetch_events() {
                Ok(events) => {
                    let count = events.count();
                    if count == 0 {
                        break;
                    }
                    total += count;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(total)
    }
}

/// Placeholder for targets without evdev. Opening always fails.
#[cfg(not(target_os = "linux"))]
pub struct EvdevSource {
    _private: (),
}

#[cfg(not(target_os = "linux"))]
impl EvdevSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{}: evdev input is only available on Linux", path.display()),
        ))
    }
}

#[cfg(not(target_os = "linux"))]
impl EventSource for EvdevSource {
    fn drain(&mut self) -> io::Result<usize> {
        Ok(0)
    }
}
