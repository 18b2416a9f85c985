//! Platform-independent pieces of the device chooser layer: the dispatch
//! registry, the selection input, the narrowing algorithm and the layer's
//! identity and manifest.

pub mod config;
pub mod error;
pub mod identity;
pub mod manifest;
pub mod registry;
pub mod selector;

pub use error::CoreError;
pub use registry::{DispatchKey, DispatchRegistry};
