//! Next-in-chain function tables and the registries that hold them.
//!
//! The loader requires that dispatchable handles (VkInstance, VkPhysicalDevice,
//! VkDevice) keep a pointer to its dispatch table in their first
//! `sizeof(void*)` bytes. That pointer is what keys the registries here.

use std::sync::OnceLock;

use ash::vk;
use devchooser_core::{DispatchKey, DispatchRegistry};

/// Resolve `$name` through `$gpa` and cast it to the type the caller expects.
macro_rules! resolve {
    ($gpa:expr, $handle:expr, $name:expr) => {
        // SAFETY: the loader guarantees a non-null result has the signature
        // the name implies.
        unsafe { ($gpa)($handle, $name.as_ptr()) }.map(|f| unsafe { std::mem::transmute(f) })
    };
}
pub(crate) use resolve;

/// Functions forwarded for instance-level objects (instances and their
/// physical devices).
#[derive(Clone, Copy)]
pub struct InstanceDispatch {
    pub get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub destroy_instance: Option<vk::PFN_vkDestroyInstance>,
    pub enumerate_physical_devices: Option<vk::PFN_vkEnumeratePhysicalDevices>,
    pub enumerate_physical_device_groups: Option<vk::PFN_vkEnumeratePhysicalDeviceGroups>,
    pub enumerate_physical_device_groups_khr: Option<vk::PFN_vkEnumeratePhysicalDeviceGroups>,
    pub enumerate_device_extension_properties: Option<vk::PFN_vkEnumerateDeviceExtensionProperties>,
}

impl InstanceDispatch {
    /// Build the table for a freshly created `instance`.
    ///
    /// # Safety
    /// `gipa` must be the next layer's resolver and `instance` a live handle
    /// created through it.
    pub unsafe fn load(instance: vk::Instance, gipa: vk::PFN_vkGetInstanceProcAddr) -> Self {
        Self {
            get_instance_proc_addr: gipa,
            destroy_instance: resolve!(gipa, instance, c"vkDestroyInstance"),
            enumerate_physical_devices: resolve!(gipa, instance, c"vkEnumeratePhysicalDevices"),
            enumerate_physical_device_groups: resolve!(
                gipa,
                instance,
                c"vkEnumeratePhysicalDeviceGroups"
            ),
            enumerate_physical_device_groups_khr: resolve!(
                gipa,
                instance,
                c"vkEnumeratePhysicalDeviceGroupsKHR"
            ),
            enumerate_device_extension_properties: resolve!(
                gipa,
                instance,
                c"vkEnumerateDeviceExtensionProperties"
            ),
        }
    }
}

/// Functions forwarded for logical devices.
#[derive(Clone, Copy)]
pub struct DeviceDispatch {
    pub get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr,
    pub destroy_device: Option<vk::PFN_vkDestroyDevice>,
}

impl DeviceDispatch {
    /// # Safety
    /// `gdpa` must be the next layer's resolver and `device` a live handle
    /// created through it.
    pub unsafe fn load(device: vk::Device, gdpa: vk::PFN_vkGetDeviceProcAddr) -> Self {
        Self {
            get_device_proc_addr: gdpa,
            destroy_device: resolve!(gdpa, device, c"vkDestroyDevice"),
        }
    }
}

/// Registry key of a dispatchable handle, `None` for a null handle.
///
/// # Safety
/// A non-null `handle` must be a live dispatchable object.
pub unsafe fn key_of<H: vk::Handle>(handle: H) -> Option<DispatchKey> {
    // SAFETY: forwarded from the caller.
    unsafe { DispatchKey::from_dispatchable(handle.as_raw() as usize as *const usize) }
}

/// Process-wide layer state: one registry per object category.
pub struct Layer {
    instances: DispatchRegistry<InstanceDispatch>,
    devices: DispatchRegistry<DeviceDispatch>,
}

static LAYER: OnceLock<Layer> = OnceLock::new();

/// The layer service. Created on first use.
pub fn layer() -> &'static Layer {
    LAYER.get_or_init(Layer::new)
}

impl Layer {
    fn new() -> Self {
        Self {
            instances: DispatchRegistry::new(),
            devices: DispatchRegistry::new(),
        }
    }

    pub fn instances(&self) -> &DispatchRegistry<InstanceDispatch> {
        &self.instances
    }

    pub fn devices(&self) -> &DispatchRegistry<DeviceDispatch> {
        &self.devices
    }

    /// Instance table for an instance or one of its physical devices.
    ///
    /// # Safety
    /// See [`key_of`].
    pub unsafe fn instance_dispatch<H: vk::Handle>(&self, handle: H) -> Option<InstanceDispatch> {
        // SAFETY: forwarded from the caller.
        unsafe { key_of(handle) }.and_then(|key| self.instances.lookup(key))
    }

    /// # Safety
    /// See [`key_of`].
    pub unsafe fn device_dispatch(&self, device: vk::Device) -> Option<DeviceDispatch> {
        // SAFETY: forwarded from the caller.
        unsafe { key_of(device) }.and_then(|key| self.devices.lookup(key))
    }
}
