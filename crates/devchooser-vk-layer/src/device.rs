//! Logical device creation and destruction.

use ash::vk;
use tracing::{debug, error};

use crate::dispatch::{self, layer, resolve, DeviceDispatch};
use crate::error::LayerError;
use crate::loader;

pub unsafe extern "system" fn create_device(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_device: *mut vk::Device,
) -> vk::Result {
    // SAFETY: arguments come straight from the loader.
    match unsafe { install(physical_device, p_create_info, p_allocator, p_device) } {
        Ok(()) => vk::Result::SUCCESS,
        Err(LayerError::Downstream(code)) => {
            debug!("vkCreateDevice failed below this layer: {}", code);
            code
        }
        Err(err) => {
            error!("vkCreateDevice: {}", err);
            err.into()
        }
    }
}

unsafe fn install(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_device: *mut vk::Device,
) -> Result<(), LayerError> {
    if p_create_info.is_null() {
        return Err(LayerError::NullArgument("pCreateInfo"));
    }
    if p_device.is_null() {
        return Err(LayerError::NullArgument("pDevice"));
    }

    // SAFETY: the create info and its chain are valid for this call.
    let next = unsafe { loader::find_device_link((*p_create_info).p_next)?.consume()? };

    let create: vk::PFN_vkCreateDevice = resolve!(
        next.get_instance_proc_addr,
        vk::Instance::null(),
        c"vkCreateDevice"
    )
    .ok_or(LayerError::MissingEntryPoint("vkCreateDevice"))?;

    // SAFETY: original arguments, forwarded unchanged.
    unsafe { create(physical_device, p_create_info, p_allocator, p_device) }
        .result()
        .map_err(LayerError::Downstream)?;

    // SAFETY: the call above succeeded, so `*p_device` is a live device.
    let device = unsafe { *p_device };
    let key = unsafe { dispatch::key_of(device) }.ok_or(LayerError::NullHandle("device"))?;
    let table = unsafe { DeviceDispatch::load(device, next.get_device_proc_addr) };

    let epoch = layer().devices().register(key, table);
    debug!(?key, epoch, "device registered");
    Ok(())
}

pub unsafe extern "system" fn destroy_device(
    device: vk::Device,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    // SAFETY: a non-null device is live until this call returns.
    let Some(key) = (unsafe { dispatch::key_of(device) }) else {
        return;
    };

    let registry = layer().devices();
    let Some(entry) = registry.lookup_entry(key) else {
        error!(?key, "vkDestroyDevice on a device created outside this layer");
        return;
    };

    match entry.table.destroy_device {
        // SAFETY: the table was resolved for this device.
        Some(destroy) => unsafe { destroy(device, p_allocator) },
        None => error!(?key, "next layer provides no vkDestroyDevice"),
    }

    registry.erase_epoch(key, entry.epoch);
    debug!(?key, "device unregistered");
}
