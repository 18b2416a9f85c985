//! Instance creation and destruction: joining and leaving the instance chain.

use ash::vk;
use tracing::{debug, error};

use crate::dispatch::{self, layer, resolve, InstanceDispatch};
use crate::error::LayerError;
use crate::loader;

pub unsafe extern "system" fn create_instance(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    devchooser_common::init_layer_logging();

    // SAFETY: arguments come straight from the loader.
    match unsafe { install(p_create_info, p_allocator, p_instance) } {
        Ok(()) => vk::Result::SUCCESS,
        Err(LayerError::Downstream(code)) => {
            debug!("vkCreateInstance failed below this layer: {}", code);
            code
        }
        Err(err) => {
            error!("vkCreateInstance: {}", err);
            err.into()
        }
    }
}

unsafe fn install(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> Result<(), LayerError> {
    if p_create_info.is_null() {
        return Err(LayerError::NullArgument("pCreateInfo"));
    }
    if p_instance.is_null() {
        return Err(LayerError::NullArgument("pInstance"));
    }

    // SAFETY: the create info and its chain are valid for this call.
    let next = unsafe { loader::find_instance_link((*p_create_info).p_next)?.consume()? };

    let create: vk::PFN_vkCreateInstance = resolve!(
        next.get_instance_proc_addr,
        vk::Instance::null(),
        c"vkCreateInstance"
    )
    .ok_or(LayerError::MissingEntryPoint("vkCreateInstance"))?;

    // SAFETY: original arguments, forwarded unchanged.
    unsafe { create(p_create_info, p_allocator, p_instance) }
        .result()
        .map_err(LayerError::Downstream)?;

    // SAFETY: the call above succeeded, so `*p_instance` is a live instance.
    let instance = unsafe { *p_instance };
    let key = unsafe { dispatch::key_of(instance) }.ok_or(LayerError::NullHandle("instance"))?;
    let table = unsafe { InstanceDispatch::load(instance, next.get_instance_proc_addr) };

    let epoch = layer().instances().register(key, table);
    debug!(?key, epoch, "instance registered");
    Ok(())
}

pub unsafe extern "system" fn destroy_instance(
    instance: vk::Instance,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    // SAFETY: a non-null instance is live until this call returns.
    let Some(key) = (unsafe { dispatch::key_of(instance) }) else {
        return;
    };

    let registry = layer().instances();
    let Some(entry) = registry.lookup_entry(key) else {
        error!(?key, "vkDestroyInstance on an instance created outside this layer");
        return;
    };

    match entry.table.destroy_instance {
        // SAFETY: the table was resolved for this instance.
        Some(destroy) => unsafe { destroy(instance, p_allocator) },
        None => error!(?key, "next layer provides no vkDestroyInstance"),
    }

    registry.erase_epoch(key, entry.epoch);
    debug!(?key, "instance unregistered");
}
