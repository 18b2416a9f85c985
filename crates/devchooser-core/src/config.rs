use std::fmt;

use crate::error::CoreError;

pub use devchooser_common::logging::LOG_ENV;

/// Environment variable holding the index of the device to expose.
/// Unset means the layer forwards enumeration untouched.
pub const DEVICE_INDEX_ENV: &str = "VULKAN_DEVICE_INDEX";

/// The selection input, as read from the environment for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceIndex {
    /// A well-formed, non-negative index. It may still be out of range.
    Index(usize),
    /// Anything that is not a non-negative integer: negative, empty, garbage.
    Malformed(String),
}

impl DeviceIndex {
    /// Read the selection input. Not cached: every call sees the current value.
    pub fn from_env() -> Option<Self> {
        std::env::var_os(DEVICE_INDEX_ENV).map(|raw| Self::parse(&raw.to_string_lossy()))
    }

    /// Parse a raw value. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<usize>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Malformed(raw.to_string()),
        }
    }

    /// The requested index, or an error for malformed input.
    pub fn index(&self) -> Result<usize, CoreError> {
        match self {
            Self::Index(index) => Ok(*index),
            Self::Malformed(raw) => Err(CoreError::InvalidIndex { raw: raw.clone() }),
        }
    }

    /// Map the request onto a list of `count` devices (`count > 0`).
    ///
    /// Out-of-range and malformed requests fall back to index 0; the reason is
    /// kept so the caller can report it.
    pub fn resolve(&self, count: usize) -> Resolved {
        match self.index() {
            Ok(index) if index < count => Resolved { index, fallback: None },
            Ok(requested) => Resolved {
                index: 0,
                fallback: Some(Fallback::OutOfRange { requested, count }),
            },
            Err(err) => Resolved {
                index: 0,
                fallback: Some(Fallback::Invalid(err)),
            },
        }
    }
}

impl fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Malformed(raw) => write!(f, "{:?}", raw),
        }
    }
}

/// The index actually used for one enumeration call.
#[derive(Debug)]
pub struct Resolved {
    pub index: usize,
    pub fallback: Option<Fallback>,
}

/// Why a request was replaced by index 0.
#[derive(Debug)]
pub enum Fallback {
    OutOfRange { requested: usize, count: usize },
    Invalid(CoreError),
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { requested, count } => write!(
                f,
                "device index {} does not exist ({} device(s) available), returning device 0",
                requested, count
            ),
            Self::Invalid(err) => write!(f, "{}, returning device 0", err),
        }
    }
}
