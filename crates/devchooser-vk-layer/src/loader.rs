//! Loader-to-layer structures and the walk over the create info chain.
//!
//! The loader threads a `VkLayerInstanceCreateInfo` / `VkLayerDeviceCreateInfo`
//! record through `pNext` of every create call. Its link list names the next
//! layer's resolvers; each layer takes the head link and advances the list
//! before calling down, so the layer below sees only what remains.

use std::ffi::{c_char, c_void};
use std::marker::PhantomData;

use ash::vk;

use crate::error::LayerError;

pub const LOADER_INSTANCE_CREATE_INFO: vk::StructureType = vk::StructureType::from_raw(47);
pub const LOADER_DEVICE_CREATE_INFO: vk::StructureType = vk::StructureType::from_raw(48);

/// Highest loader/layer interface version this layer speaks.
pub const LAYER_INTERFACE_VERSION: u32 = 2;

/// `VkLayerFunction`: what a loader create info record carries.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerFunction(pub i32);

impl LayerFunction {
    pub const LINK_INFO: Self = Self(0);
    pub const LOADER_DATA_CALLBACK: Self = Self(1);
    pub const LAYER_CREATE_DEVICE_CALLBACK: Self = Self(2);
    pub const LOADER_FEATURES: Self = Self(3);
}

#[allow(non_camel_case_types)]
pub type PFN_GetPhysicalDeviceProcAddr =
    unsafe extern "system" fn(instance: vk::Instance, p_name: *const c_char) -> vk::PFN_vkVoidFunction;

#[repr(C)]
pub struct LayerInstanceLink {
    pub p_next: *mut LayerInstanceLink,
    pub pfn_next_get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub pfn_next_get_physical_device_proc_addr: Option<PFN_GetPhysicalDeviceProcAddr>,
}

#[repr(C)]
pub struct LayerDeviceLink {
    pub p_next: *mut LayerDeviceLink,
    pub pfn_next_get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub pfn_next_get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union InstancePayload {
    pub layer_info: *mut LayerInstanceLink,
    pub set_instance_loader_data: *const c_void,
    pub layer_device: [*const c_void; 2],
    pub loader_features: u32,
}

#[repr(C)]
pub struct LayerInstanceCreateInfo {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub function: LayerFunction,
    pub u: InstancePayload,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union DevicePayload {
    pub layer_info: *mut LayerDeviceLink,
    pub set_device_loader_data: *const c_void,
}

#[repr(C)]
pub struct LayerDeviceCreateInfo {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub function: LayerFunction,
    pub u: DevicePayload,
}

/// `VkNegotiateLayerStructType`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiateLayerStructType(pub i32);

impl NegotiateLayerStructType {
    pub const INTERFACE_STRUCT: Self = Self(1);
}

#[repr(C)]
pub struct NegotiateLayerInterface {
    pub s_type: NegotiateLayerStructType,
    pub p_next: *mut c_void,
    pub loader_layer_interface_version: u32,
    pub pfn_get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
    pub pfn_get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>,
    pub pfn_get_physical_device_proc_addr: Option<PFN_GetPhysicalDeviceProcAddr>,
}

// ── Chain walk ──────────────────────────────────────────────

/// One record of a create info `pNext` chain.
pub enum ChainRecord<'a> {
    /// The loader's instance link record: this layer's way down.
    InstanceLink(&'a mut LayerInstanceCreateInfo),
    /// The loader's device link record.
    DeviceLink(&'a mut LayerDeviceCreateInfo),
    /// A loader record carrying something other than the link list.
    Loader {
        s_type: vk::StructureType,
        function: LayerFunction,
    },
    /// Any application structure.
    Other(vk::StructureType),
}

/// Iterator over the records of a `pNext` chain.
pub struct ChainRecords<'a> {
    cursor: *const c_void,
    _chain: PhantomData<&'a mut ()>,
}

/// Walk the chain starting at `p_next`.
///
/// # Safety
/// `p_next` must be null or the head of a valid Vulkan structure chain that
/// stays alive, and is not otherwise accessed, for `'a`.
pub unsafe fn records<'a>(p_next: *const c_void) -> ChainRecords<'a> {
    ChainRecords {
        cursor: p_next,
        _chain: PhantomData,
    }
}

impl<'a> Iterator for ChainRecords<'a> {
    type Item = ChainRecord<'a>;

    fn next(&mut self) -> Option<ChainRecord<'a>> {
        if self.cursor.is_null() {
            return None;
        }

        let base = self.cursor as *const vk::BaseInStructure<'_>;
        // SAFETY: `records` requires every node to be a valid Vulkan structure.
        let (s_type, next) = unsafe { ((*base).s_type, (*base).p_next as *const c_void) };

        let record = if s_type == LOADER_INSTANCE_CREATE_INFO {
            // SAFETY: the structure type identifies the layout. The loader owns
            // the record and expects layers to rewrite its link.
            let info = unsafe { &mut *(self.cursor as *mut LayerInstanceCreateInfo) };
            if info.function == LayerFunction::LINK_INFO {
                ChainRecord::InstanceLink(info)
            } else {
                ChainRecord::Loader { s_type, function: info.function }
            }
        } else if s_type == LOADER_DEVICE_CREATE_INFO {
            // SAFETY: as above.
            let info = unsafe { &mut *(self.cursor as *mut LayerDeviceCreateInfo) };
            if info.function == LayerFunction::LINK_INFO {
                ChainRecord::DeviceLink(info)
            } else {
                ChainRecord::Loader { s_type, function: info.function }
            }
        } else {
            ChainRecord::Other(s_type)
        };

        self.cursor = next;
        Some(record)
    }
}

/// Resolvers of the layer below, taken from an instance link.
#[derive(Clone, Copy)]
pub struct NextInstance {
    pub get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
}

/// Resolvers of the layer below, taken from a device link.
#[derive(Clone, Copy)]
pub struct NextDevice {
    pub get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr,
}

/// This layer's instance link, found but not yet taken.
pub struct InstanceLinkCursor<'a>(&'a mut LayerInstanceCreateInfo);

/// This layer's device link, found but not yet taken.
pub struct DeviceLinkCursor<'a>(&'a mut LayerDeviceCreateInfo);

/// Find the first instance link record in the chain.
///
/// # Safety
/// See [`records`].
pub unsafe fn find_instance_link<'a>(
    p_next: *const c_void,
) -> Result<InstanceLinkCursor<'a>, LayerError> {
    // SAFETY: forwarded from the caller.
    unsafe { records(p_next) }
        .find_map(|record| match record {
            ChainRecord::InstanceLink(info) => Some(InstanceLinkCursor(info)),
            _ => None,
        })
        .ok_or(LayerError::LinkNotFound("instance"))
}

/// Find the first device link record in the chain.
///
/// # Safety
/// See [`records`].
pub unsafe fn find_device_link<'a>(
    p_next: *const c_void,
) -> Result<DeviceLinkCursor<'a>, LayerError> {
    // SAFETY: forwarded from the caller.
    unsafe { records(p_next) }
        .find_map(|record| match record {
            ChainRecord::DeviceLink(info) => Some(DeviceLinkCursor(info)),
            _ => None,
        })
        .ok_or(LayerError::LinkNotFound("device"))
}

impl InstanceLinkCursor<'_> {
    /// Take the head link and advance the record to the next layer's link.
    ///
    /// # Safety
    /// The record's link list must be valid.
    pub unsafe fn consume(self) -> Result<NextInstance, LayerError> {
        // SAFETY: LINK_INFO records carry `layer_info`.
        let link = unsafe { self.0.u.layer_info };
        if link.is_null() {
            return Err(LayerError::LinkNotFound("instance"));
        }
        // SAFETY: non-null links are valid per the caller.
        let link = unsafe { &*link };
        self.0.u.layer_info = link.p_next;

        Ok(NextInstance {
            get_instance_proc_addr: link.pfn_next_get_instance_proc_addr,
        })
    }
}

impl DeviceLinkCursor<'_> {
    /// Take the head link and advance the record to the next layer's link.
    ///
    /// # Safety
    /// The record's link list must be valid.
    pub unsafe fn consume(self) -> Result<NextDevice, LayerError> {
        // SAFETY: LINK_INFO records carry `layer_info`.
        let link = unsafe { self.0.u.layer_info };
        if link.is_null() {
            return Err(LayerError::LinkNotFound("device"));
        }
        // SAFETY: non-null links are valid per the caller.
        let link = unsafe { &*link };
        self.0.u.layer_info = link.p_next;

        Ok(NextDevice {
            get_instance_proc_addr: link.pfn_next_get_instance_proc_addr,
            get_device_proc_addr: link.pfn_next_get_device_proc_addr,
        })
    }
}
