//! Fixed identity the layer reports to the loader and to applications.

use ash::vk;

pub const LAYER_NAME: &str = "VK_LAYER_AEJS_DeviceChooserLayer";
pub const LAYER_DESCRIPTION: &str = "Device chooser layer";
pub const IMPLEMENTATION_VERSION: u32 = 1;
pub const SPEC_VERSION: u32 = vk::API_VERSION_1_0;

/// Environment variable the loader checks to skip an implicit install.
pub const DISABLE_ENV: &str = "DISABLE_DEVICE_CHOOSER_LAYER";

/// `true` if `name` is this layer's name.
pub fn is_layer_name(name: &[u8]) -> bool {
    name == LAYER_NAME.as_bytes()
}

/// `major.minor.patch` rendering of [`SPEC_VERSION`], as manifests spell it.
pub fn spec_version_string() -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(SPEC_VERSION),
        vk::api_version_minor(SPEC_VERSION),
        vk::api_version_patch(SPEC_VERSION)
    )
}
