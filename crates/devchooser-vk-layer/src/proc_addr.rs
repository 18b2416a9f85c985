//! Name resolution: the two functions the loader uses to discover the layer.
//!
//! Names in [`Intercept`] resolve to this layer. Every other name is handed to
//! the next layer's resolver stored for the object, which is how any number of
//! layers stack.

use std::ffi::{c_char, CStr};

use ash::vk;

use crate::dispatch::{layer, InstanceDispatch};
use crate::{device, enumerate, instance, properties};

/// Which resolver is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Instance,
    Device,
}

/// Every entry point this layer implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intercept {
    GetInstanceProcAddr,
    GetDeviceProcAddr,
    EnumerateInstanceLayerProperties,
    EnumerateInstanceExtensionProperties,
    EnumerateDeviceLayerProperties,
    EnumerateDeviceExtensionProperties,
    CreateInstance,
    DestroyInstance,
    CreateDevice,
    DestroyDevice,
    EnumeratePhysicalDevices,
    EnumeratePhysicalDeviceGroups,
    EnumeratePhysicalDeviceGroupsKHR,
}

impl Intercept {
    pub const ALL: [Intercept; 13] = [
        Self::GetInstanceProcAddr,
        Self::GetDeviceProcAddr,
        Self::EnumerateInstanceLayerProperties,
        Self::EnumerateInstanceExtensionProperties,
        Self::EnumerateDeviceLayerProperties,
        Self::EnumerateDeviceExtensionProperties,
        Self::CreateInstance,
        Self::DestroyInstance,
        Self::CreateDevice,
        Self::DestroyDevice,
        Self::EnumeratePhysicalDevices,
        Self::EnumeratePhysicalDeviceGroups,
        Self::EnumeratePhysicalDeviceGroupsKHR,
    ];

    pub fn name(self) -> &'static CStr {
        match self {
            Self::GetInstanceProcAddr => c"vkGetInstanceProcAddr",
            Self::GetDeviceProcAddr => c"vkGetDeviceProcAddr",
            Self::EnumerateInstanceLayerProperties => c"vkEnumerateInstanceLayerProperties",
            Self::EnumerateInstanceExtensionProperties => c"vkEnumerateInstanceExtensionProperties",
            Self::EnumerateDeviceLayerProperties => c"vkEnumerateDeviceLayerProperties",
            Self::EnumerateDeviceExtensionProperties => c"vkEnumerateDeviceExtensionProperties",
            Self::CreateInstance => c"vkCreateInstance",
            Self::DestroyInstance => c"vkDestroyInstance",
            Self::CreateDevice => c"vkCreateDevice",
            Self::DestroyDevice => c"vkDestroyDevice",
            Self::EnumeratePhysicalDevices => c"vkEnumeratePhysicalDevices",
            Self::EnumeratePhysicalDeviceGroups => c"vkEnumeratePhysicalDeviceGroups",
            Self::EnumeratePhysicalDeviceGroupsKHR => c"vkEnumeratePhysicalDeviceGroupsKHR",
        }
    }

    /// The instance resolver hands out everything; the device resolver only
    /// device-level functions.
    pub fn in_scope(self, scope: Scope) -> bool {
        match scope {
            Scope::Instance => true,
            Scope::Device => matches!(
                self,
                Self::GetDeviceProcAddr
                    | Self::EnumerateDeviceLayerProperties
                    | Self::EnumerateDeviceExtensionProperties
                    | Self::CreateDevice
                    | Self::DestroyDevice
            ),
        }
    }

    pub fn lookup(name: &CStr, scope: Scope) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|intercept| intercept.in_scope(scope) && intercept.name() == name)
    }

    /// Whether the layer below can back this entry point for `table`'s instance.
    /// Only the device group functions are optional.
    fn backed_by(self, table: &InstanceDispatch) -> bool {
        match self {
            Self::EnumeratePhysicalDeviceGroups => table.enumerate_physical_device_groups.is_some(),
            Self::EnumeratePhysicalDeviceGroupsKHR => {
                table.enumerate_physical_device_groups_khr.is_some()
            }
            _ => true,
        }
    }

    /// This layer's implementation, as the untyped pointer resolvers return.
    pub fn entry_point(self) -> unsafe extern "system" fn() {
        let ptr = match self {
            Self::GetInstanceProcAddr => vkGetInstanceProcAddr as *const (),
            Self::GetDeviceProcAddr => vkGetDeviceProcAddr as *const (),
            Self::EnumerateInstanceLayerProperties => {
                properties::enumerate_instance_layer_properties as *const ()
            }
            Self::EnumerateInstanceExtensionProperties => {
                properties::enumerate_instance_extension_properties as *const ()
            }
            Self::EnumerateDeviceLayerProperties => {
                properties::enumerate_device_layer_properties as *const ()
            }
            Self::EnumerateDeviceExtensionProperties => {
                properties::enumerate_device_extension_properties as *const ()
            }
            Self::CreateInstance => instance::create_instance as *const (),
            Self::DestroyInstance => instance::destroy_instance as *const (),
            Self::CreateDevice => device::create_device as *const (),
            Self::DestroyDevice => device::destroy_device as *const (),
            Self::EnumeratePhysicalDevices => enumerate::enumerate_physical_devices as *const (),
            Self::EnumeratePhysicalDeviceGroups => {
                enumerate::enumerate_physical_device_groups as *const ()
            }
            Self::EnumeratePhysicalDeviceGroupsKHR => {
                enumerate::enumerate_physical_device_groups_khr as *const ()
            }
        };
        // SAFETY: `ptr` is a function; callers cast it back to the signature
        // its name implies before calling.
        unsafe { std::mem::transmute::<*const (), unsafe extern "system" fn()>(ptr) }
    }
}

#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn vkGetInstanceProcAddr(
    instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    // SAFETY: the loader passes a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(p_name) };

    // SAFETY: a non-null instance is a live handle.
    let table = unsafe { layer().instance_dispatch(instance) };

    if let Some(intercept) = Intercept::lookup(name, Scope::Instance) {
        return match &table {
            Some(table) if !intercept.backed_by(table) => None,
            _ => Some(intercept.entry_point()),
        };
    }

    let table = table?;
    // SAFETY: the next layer's resolver, called for an object it created.
    unsafe { (table.get_instance_proc_addr)(instance, p_name) }
}

#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn vkGetDeviceProcAddr(
    device: vk::Device,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    // SAFETY: the loader passes a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(p_name) };

    if let Some(intercept) = Intercept::lookup(name, Scope::Device) {
        return Some(intercept.entry_point());
    }

    // SAFETY: a non-null device is a live handle.
    let table = unsafe { layer().device_dispatch(device) }?;
    // SAFETY: the next layer's resolver, called for an object it created.
    unsafe { (table.get_device_proc_addr)(device, p_name) }
}
