//! Layer and extension property queries.
//!
//! The layer reports its own identity and no extensions. Device extension
//! queries for other layers (or the driver) pass through to the next layer.

use std::ffi::{c_char, CStr};

use ash::vk;
use tracing::warn;

use devchooser_core::identity;

use crate::dispatch::layer;

pub unsafe extern "system" fn enumerate_instance_layer_properties(
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    if p_property_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }

    // SAFETY: checked non-null; the array holds `*p_property_count` entries.
    unsafe {
        if p_properties.is_null() {
            *p_property_count = 1;
            return vk::Result::SUCCESS;
        }
        if *p_property_count == 0 {
            return vk::Result::INCOMPLETE;
        }

        let props = &mut *p_properties;
        write_c_string(identity::LAYER_NAME, &mut props.layer_name);
        write_c_string(identity::LAYER_DESCRIPTION, &mut props.description);
        props.spec_version = identity::SPEC_VERSION;
        props.implementation_version = identity::IMPLEMENTATION_VERSION;
        *p_property_count = 1;
    }
    vk::Result::SUCCESS
}

pub unsafe extern "system" fn enumerate_device_layer_properties(
    _physical_device: vk::PhysicalDevice,
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    // SAFETY: same contract as the instance query.
    unsafe { enumerate_instance_layer_properties(p_property_count, p_properties) }
}

pub unsafe extern "system" fn enumerate_instance_extension_properties(
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    _p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    // SAFETY: a non-null layer name is a NUL-terminated string.
    if !unsafe { names_this_layer(p_layer_name) } {
        return vk::Result::ERROR_LAYER_NOT_PRESENT;
    }

    if !p_property_count.is_null() {
        // SAFETY: checked non-null.
        unsafe { *p_property_count = 0 };
    }
    vk::Result::SUCCESS
}

pub unsafe extern "system" fn enumerate_device_extension_properties(
    physical_device: vk::PhysicalDevice,
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    // SAFETY: a non-null layer name is a NUL-terminated string.
    let ours = unsafe { names_this_layer(p_layer_name) };

    if ours || physical_device == vk::PhysicalDevice::null() {
        if !p_property_count.is_null() {
            // SAFETY: checked non-null.
            unsafe { *p_property_count = 0 };
        }
        return vk::Result::SUCCESS;
    }

    // SAFETY: `physical_device` is a live handle of a registered instance.
    let forward = unsafe { layer().instance_dispatch(physical_device) }
        .and_then(|table| table.enumerate_device_extension_properties);

    match forward {
        // SAFETY: untouched arguments for the next layer.
        Some(forward) => unsafe {
            forward(physical_device, p_layer_name, p_property_count, p_properties)
        },
        None => {
            warn!("vkEnumerateDeviceExtensionProperties on a physical device unknown to this layer");
            vk::Result::ERROR_INITIALIZATION_FAILED
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────

unsafe fn names_this_layer(p_layer_name: *const c_char) -> bool {
    if p_layer_name.is_null() {
        return false;
    }
    // SAFETY: per the caller.
    identity::is_layer_name(unsafe { CStr::from_ptr(p_layer_name) }.to_bytes())
}

fn write_c_string(src: &str, dst: &mut [c_char]) {
    let bytes = src.as_bytes();
    let len = std::cmp::min(bytes.len(), dst.len() - 1);
    for i in 0..len {
        dst[i] = bytes[i] as c_char;
    }
    dst[len] = 0;
}
