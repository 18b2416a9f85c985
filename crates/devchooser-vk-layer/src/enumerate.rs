//! Physical device and device group enumeration.
//!
//! With `VULKAN_DEVICE_INDEX` unset these calls forward untouched. When it is
//! set, the real list is fetched once per call and the answer is narrowed to
//! the chosen device (or a single group holding only that device).

use ash::vk;
use tracing::warn;

use devchooser_core::config::DeviceIndex;
use devchooser_core::selector::{self, DeviceSource, Selection};

use crate::dispatch::layer;

/// The real `vkEnumeratePhysicalDevices` for one instance.
struct PhysicalDevices {
    instance: vk::Instance,
    enumerate: vk::PFN_vkEnumeratePhysicalDevices,
}

impl DeviceSource for PhysicalDevices {
    type Handle = vk::PhysicalDevice;
    type Error = vk::Result;

    fn enumerate(&mut self, out: Option<&mut [vk::PhysicalDevice]>) -> Result<usize, vk::Result> {
        let (mut count, p_devices) = match out {
            None => (0, std::ptr::null_mut()),
            Some(buf) => (buf.len() as u32, buf.as_mut_ptr()),
        };
        // SAFETY: `count` is the capacity of `p_devices`, or the buffer is null.
        unsafe { (self.enumerate)(self.instance, &mut count, p_devices) }.result()?;
        Ok(count as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupEntry {
    Core,
    Khr,
}

pub unsafe extern "system" fn enumerate_physical_devices(
    instance: vk::Instance,
    p_physical_device_count: *mut u32,
    p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    // SAFETY: `instance` is a live instance handle.
    let Some(enumerate) = (unsafe { layer().instance_dispatch(instance) })
        .and_then(|table| table.enumerate_physical_devices)
    else {
        warn!("vkEnumeratePhysicalDevices on an instance unknown to this layer");
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };

    let Some(request) = DeviceIndex::from_env() else {
        // SAFETY: untouched arguments for the next layer.
        return unsafe { enumerate(instance, p_physical_device_count, p_physical_devices) };
    };

    if p_physical_device_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }

    let selection = match selector::choose(&mut PhysicalDevices { instance, enumerate }, &request) {
        Ok(selection) => selection,
        Err(code) => return code,
    };

    // SAFETY: the caller's count and array follow the two-phase convention.
    unsafe {
        respond(selection, p_physical_device_count, p_physical_devices, |slot, device| {
            *slot = device;
        })
    }
}

pub unsafe extern "system" fn enumerate_physical_device_groups(
    instance: vk::Instance,
    p_physical_device_group_count: *mut u32,
    p_physical_device_groups: *mut vk::PhysicalDeviceGroupProperties<'_>,
) -> vk::Result {
    // SAFETY: forwarded from the loader.
    unsafe {
        enumerate_groups(
            GroupEntry::Core,
            instance,
            p_physical_device_group_count,
            p_physical_device_groups,
        )
    }
}

pub unsafe extern "system" fn enumerate_physical_device_groups_khr(
    instance: vk::Instance,
    p_physical_device_group_count: *mut u32,
    p_physical_device_groups: *mut vk::PhysicalDeviceGroupProperties<'_>,
) -> vk::Result {
    // SAFETY: forwarded from the loader.
    unsafe {
        enumerate_groups(
            GroupEntry::Khr,
            instance,
            p_physical_device_group_count,
            p_physical_device_groups,
        )
    }
}

unsafe fn enumerate_groups(
    entry: GroupEntry,
    instance: vk::Instance,
    p_group_count: *mut u32,
    p_groups: *mut vk::PhysicalDeviceGroupProperties<'_>,
) -> vk::Result {
    // SAFETY: `instance` is a live instance handle.
    let Some(table) = (unsafe { layer().instance_dispatch(instance) }) else {
        warn!("vkEnumeratePhysicalDeviceGroups on an instance unknown to this layer");
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };

    let Some(request) = DeviceIndex::from_env() else {
        let forward = match entry {
            GroupEntry::Core => table.enumerate_physical_device_groups,
            GroupEntry::Khr => table.enumerate_physical_device_groups_khr,
        };
        return match forward {
            // SAFETY: untouched arguments for the next layer.
            Some(forward) => unsafe { forward(instance, p_group_count, p_groups) },
            None => {
                warn!(?entry, "next layer provides no device group enumeration");
                vk::Result::ERROR_INITIALIZATION_FAILED
            }
        };
    };

    let Some(enumerate) = table.enumerate_physical_devices else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    if p_group_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }

    let selection = match selector::choose(&mut PhysicalDevices { instance, enumerate }, &request) {
        Ok(selection) => selection,
        Err(code) => return code,
    };

    // SAFETY: the caller's count and array follow the two-phase convention;
    // `sType`/`pNext` of the caller's group are left as provided.
    unsafe {
        respond(selection, p_group_count, p_groups, |group, device| {
            group.physical_device_count = 1;
            group.physical_devices = [vk::PhysicalDevice::null(); vk::MAX_DEVICE_GROUP_SIZE];
            group.physical_devices[0] = device;
            group.subset_allocation = vk::FALSE;
        })
    }
}

/// Answer a two-phase query with at most one element.
///
/// # Safety
/// `p_count` must be valid; `p_out` must be null or hold `*p_count` elements.
unsafe fn respond<T>(
    selection: Selection<vk::PhysicalDevice>,
    p_count: *mut u32,
    p_out: *mut T,
    fill: impl FnOnce(&mut T, vk::PhysicalDevice),
) -> vk::Result {
    // SAFETY: per the function contract.
    unsafe {
        let Some(device) = selection.device() else {
            *p_count = 0;
            return vk::Result::SUCCESS;
        };

        if p_out.is_null() {
            *p_count = 1;
            return vk::Result::SUCCESS;
        }
        if *p_count == 0 {
            return vk::Result::INCOMPLETE;
        }

        fill(&mut *p_out, device);
        *p_count = 1;
        vk::Result::SUCCESS
    }
}
