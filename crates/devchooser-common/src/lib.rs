pub mod logging;

pub use logging::{init_layer_logging, init_logging};
