//! Device chooser Vulkan layer.
//!
//! This cdylib sits between an application and the Vulkan driver(s). When
//! `VULKAN_DEVICE_INDEX` is set, physical device (and device group)
//! enumeration reports only the device at that index; everything else is
//! forwarded to the next layer unchanged.
//!
//! The loader finds the layer through its JSON manifest (see
//! `devchooser manifest`) and then talks to it exclusively through
//! `vkNegotiateLoaderLayerInterfaceVersion`, `vkGetInstanceProcAddr` and
//! `vkGetDeviceProcAddr`.

use ash::vk;

pub mod device;
pub mod dispatch;
pub mod enumerate;
pub mod error;
pub mod instance;
pub mod loader;
pub mod proc_addr;
pub mod properties;

pub use dispatch::{key_of, layer, Layer};
pub use error::LayerError;
pub use proc_addr::{vkGetDeviceProcAddr, vkGetInstanceProcAddr, Intercept, Scope};

// ── Loader Negotiation ──────────────────────────────────────

/// Negotiate the loader/layer interface version and hand the loader this
/// layer's resolvers.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn vkNegotiateLoaderLayerInterfaceVersion(
    p_version_struct: *mut loader::NegotiateLayerInterface,
) -> vk::Result {
    devchooser_common::init_layer_logging();

    if p_version_struct.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    // SAFETY: checked non-null; the loader owns the struct for this call.
    let negotiate = unsafe { &mut *p_version_struct };
    if negotiate.s_type != loader::NegotiateLayerStructType::INTERFACE_STRUCT {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }

    negotiate.loader_layer_interface_version = negotiate
        .loader_layer_interface_version
        .min(loader::LAYER_INTERFACE_VERSION);
    negotiate.pfn_get_instance_proc_addr = Some(vkGetInstanceProcAddr);
    negotiate.pfn_get_device_proc_addr = Some(vkGetDeviceProcAddr);
    negotiate.pfn_get_physical_device_proc_addr = None;

    tracing::debug!(
        version = negotiate.loader_layer_interface_version,
        "negotiated loader interface"
    );
    vk::Result::SUCCESS
}
