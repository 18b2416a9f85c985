//! Narrowing of a device enumeration down to a single device.

use tracing::{info, warn};

use crate::config::DeviceIndex;

/// Something that answers the Vulkan two-phase enumeration query.
pub trait DeviceSource {
    type Handle: Copy + Default;
    type Error;

    /// `None` asks for the count only. `Some(buf)` fills at most `buf.len()`
    /// handles and returns how many were written.
    fn enumerate(&mut self, out: Option<&mut [Self::Handle]>) -> Result<usize, Self::Error>;
}

/// Outcome of narrowing one enumeration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<H> {
    /// The real chain reported no devices; there is nothing to choose from.
    NoDevices,
    Chosen {
        device: H,
        /// Position of `device` in the real list.
        index: usize,
        /// Length of the real list.
        available: usize,
    },
}

impl<H: Copy> Selection<H> {
    pub fn device(&self) -> Option<H> {
        match *self {
            Self::NoDevices => None,
            Self::Chosen { device, .. } => Some(device),
        }
    }
}

/// Query the full device list from `source` and pick the one `request` names.
///
/// Errors from `source` are returned untouched. An unusable request is never an
/// error: it is reported and replaced with index 0.
pub fn choose<S: DeviceSource>(
    source: &mut S,
    request: &DeviceIndex,
) -> Result<Selection<S::Handle>, S::Error> {
    let count = source.enumerate(None)?;
    if count == 0 {
        return Ok(Selection::NoDevices);
    }

    let mut devices = vec![S::Handle::default(); count];
    let written = source.enumerate(Some(&mut devices))?;
    devices.truncate(written);
    if devices.is_empty() {
        return Ok(Selection::NoDevices);
    }

    let resolved = request.resolve(devices.len());
    match &resolved.fallback {
        Some(reason) => warn!("{}", reason),
        None => info!("using Vulkan device index {}", resolved.index),
    }

    Ok(Selection::Chosen {
        device: devices[resolved.index],
        index: resolved.index,
        available: devices.len(),
    })
}

/// A fixed list of devices, for callers that already hold the real list.
#[derive(Debug, Clone)]
pub struct FixedDevices<H>(pub Vec<H>);

impl<H: Copy + Default> DeviceSource for FixedDevices<H> {
    type Handle = H;
    type Error = std::convert::Infallible;

    fn enumerate(&mut self, out: Option<&mut [H]>) -> Result<usize, Self::Error> {
        match out {
            None => Ok(self.0.len()),
            Some(buf) => {
                let n = buf.len().min(self.0.len());
                buf[..n].copy_from_slice(&self.0[..n]);
                Ok(n)
            }
        }
    }
}
