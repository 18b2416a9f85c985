//! A fake "next layer" for driving the device chooser end to end.
//!
//! The fake hands out dispatchable handles whose first word plays the role of
//! the loader's dispatch pointer, the way a real loader-wrapped driver would.
//! Physical devices carry their instance's key.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};

use ash::vk;
use ash::vk::Handle;
use parking_lot::{const_mutex, Mutex, MutexGuard};

use devchooser_core::config::DEVICE_INDEX_ENV;
use devchooser_vk_layer::loader::{
    DevicePayload, InstancePayload, LayerDeviceCreateInfo, LayerDeviceLink, LayerFunction,
    LayerInstanceCreateInfo, LayerInstanceLink, LOADER_DEVICE_CREATE_INFO,
    LOADER_INSTANCE_CREATE_INFO,
};
use devchooser_vk_layer::vkGetInstanceProcAddr;

/// Dispatchable object layout: dispatch pointer first, then our payload.
#[repr(C)]
pub struct FakeDispatchable {
    pub loader_data: usize,
    pub index: usize,
}

static SERIAL: Mutex<()> = const_mutex(());
static DRIVER: Mutex<Option<DriverState>> = const_mutex(None);
static NEXT_KEY: AtomicUsize = AtomicUsize::new(0x5000);

pub struct DriverState {
    pub device_count: usize,
    pub provide_groups: bool,
    pub fail_create_instance: Option<vk::Result>,
    pub fail_create_device: Option<vk::Result>,
    pub fail_enumerate: Option<vk::Result>,
    pub create_instance_calls: usize,
    pub enumerate_calls: usize,
    /// `layer_info` of the link record as the fake saw it during creation.
    pub link_seen: Option<usize>,
    pub instance_devices: HashMap<u64, Vec<vk::PhysicalDevice>>,
    pub destroyed_instances: Vec<u64>,
    pub destroyed_devices: Vec<u64>,
}

impl DriverState {
    fn new(device_count: usize) -> Self {
        Self {
            device_count,
            provide_groups: true,
            fail_create_instance: None,
            fail_create_device: None,
            fail_enumerate: None,
            create_instance_calls: 0,
            enumerate_calls: 0,
            link_seen: None,
            instance_devices: HashMap::new(),
            destroyed_instances: Vec::new(),
            destroyed_devices: Vec::new(),
        }
    }
}

/// Serialize tests that touch the fake driver or the environment, and reset
/// both. The fake reports `device_count` physical devices per instance.
pub fn setup(device_count: usize) -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock();
    *DRIVER.lock() = Some(DriverState::new(device_count));
    std::env::remove_var(DEVICE_INDEX_ENV);
    guard
}

pub fn set_index(value: &str) {
    std::env::set_var(DEVICE_INDEX_ENV, value);
}

pub fn clear_index() {
    std::env::remove_var(DEVICE_INDEX_ENV);
}

pub fn with_driver<R>(f: impl FnOnce(&mut DriverState) -> R) -> R {
    let mut driver = DRIVER.lock();
    f(driver.as_mut().expect("driver not set up"))
}

fn alloc_object(loader_data: usize, index: usize) -> u64 {
    let object = Box::leak(Box::new(FakeDispatchable { loader_data, index }));
    object as *mut FakeDispatchable as u64
}

/// Position of a fake physical device in its instance's list.
pub fn device_index(physical_device: vk::PhysicalDevice) -> usize {
    assert_ne!(physical_device, vk::PhysicalDevice::null());
    // SAFETY: every non-null physical device comes from `alloc_object`.
    unsafe { (*(physical_device.as_raw() as *const FakeDispatchable)).index }
}

/// The real device list the fake reports for `instance`.
pub fn real_devices(instance: vk::Instance) -> Vec<vk::PhysicalDevice> {
    with_driver(|driver| driver.instance_devices[&instance.as_raw()].clone())
}

// ── Fake next layer ─────────────────────────────────────────

macro_rules! entry {
    ($f:expr) => {
        Some(unsafe { std::mem::transmute::<*const (), unsafe extern "system" fn()>($f as *const ()) })
    };
}

pub unsafe extern "system" fn fake_get_instance_proc_addr(
    _instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = CStr::from_ptr(p_name).to_bytes();
    let groups = with_driver(|driver| driver.provide_groups);
    match name {
        b"vkCreateInstance" => entry!(fake_create_instance),
        b"vkDestroyInstance" => entry!(fake_destroy_instance),
        b"vkEnumeratePhysicalDevices" => entry!(fake_enumerate_physical_devices),
        b"vkEnumeratePhysicalDeviceGroups" | b"vkEnumeratePhysicalDeviceGroupsKHR" if groups => {
            entry!(fake_enumerate_physical_device_groups)
        }
        b"vkEnumerateDeviceExtensionProperties" => entry!(fake_enumerate_device_extension_properties),
        b"vkCreateDevice" => entry!(fake_create_device),
        b"vkGetPhysicalDeviceFeatures" => entry!(fake_instance_marker),
        _ => None,
    }
}

pub unsafe extern "system" fn fake_get_device_proc_addr(
    _device: vk::Device,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    match CStr::from_ptr(p_name).to_bytes() {
        b"vkDestroyDevice" => entry!(fake_destroy_device),
        b"vkGetDeviceQueue" => entry!(fake_device_marker),
        _ => None,
    }
}

/// Stand-in for a function the layer does not intercept.
pub unsafe extern "system" fn fake_instance_marker() {}

pub unsafe extern "system" fn fake_device_marker() {}

unsafe extern "system" fn fake_create_instance(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    let link_seen = find_instance_link_record((*p_create_info).p_next)
        .map(|info| (*info).u.layer_info as usize);

    with_driver(|driver| {
        driver.create_instance_calls += 1;
        driver.link_seen = link_seen;
        if let Some(code) = driver.fail_create_instance {
            return code;
        }

        let key = NEXT_KEY.fetch_add(0x10, Ordering::Relaxed);
        let instance = alloc_object(key, usize::MAX);
        let devices = (0..driver.device_count)
            .map(|index| vk::PhysicalDevice::from_raw(alloc_object(key, index)))
            .collect();
        driver.instance_devices.insert(instance, devices);
        *p_instance = vk::Instance::from_raw(instance);
        vk::Result::SUCCESS
    })
}

unsafe fn find_instance_link_record(mut p_next: *const c_void) -> Option<*const LayerInstanceCreateInfo> {
    while !p_next.is_null() {
        let base = p_next as *const vk::BaseInStructure<'_>;
        if (*base).s_type == LOADER_INSTANCE_CREATE_INFO {
            let info = p_next as *const LayerInstanceCreateInfo;
            if (*info).function == LayerFunction::LINK_INFO {
                return Some(info);
            }
        }
        p_next = (*base).p_next as *const c_void;
    }
    None
}

unsafe extern "system" fn fake_destroy_instance(
    instance: vk::Instance,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_driver(|driver| driver.destroyed_instances.push(instance.as_raw()));
}

unsafe extern "system" fn fake_enumerate_physical_devices(
    instance: vk::Instance,
    p_count: *mut u32,
    p_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    with_driver(|driver| {
        driver.enumerate_calls += 1;
        if let Some(code) = driver.fail_enumerate {
            return code;
        }
        let devices = &driver.instance_devices[&instance.as_raw()];
        if p_devices.is_null() {
            *p_count = devices.len() as u32;
            return vk::Result::SUCCESS;
        }
        let n = (*p_count as usize).min(devices.len());
        std::ptr::copy_nonoverlapping(devices.as_ptr(), p_devices, n);
        *p_count = n as u32;
        if n < devices.len() {
            vk::Result::INCOMPLETE
        } else {
            vk::Result::SUCCESS
        }
    })
}

/// Every device is its own group, flagged with subset allocation.
unsafe extern "system" fn fake_enumerate_physical_device_groups(
    instance: vk::Instance,
    p_count: *mut u32,
    p_groups: *mut vk::PhysicalDeviceGroupProperties<'_>,
) -> vk::Result {
    with_driver(|driver| {
        let devices = &driver.instance_devices[&instance.as_raw()];
        if p_groups.is_null() {
            *p_count = devices.len() as u32;
            return vk::Result::SUCCESS;
        }
        let n = (*p_count as usize).min(devices.len());
        for (i, device) in devices.iter().take(n).enumerate() {
            let group = &mut *p_groups.add(i);
            group.physical_device_count = 1;
            group.physical_devices[0] = *device;
            group.subset_allocation = vk::TRUE;
        }
        *p_count = n as u32;
        vk::Result::SUCCESS
    })
}

unsafe extern "system" fn fake_enumerate_device_extension_properties(
    _physical_device: vk::PhysicalDevice,
    _p_layer_name: *const c_char,
    p_count: *mut u32,
    _p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    *p_count = 7;
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_create_device(
    _physical_device: vk::PhysicalDevice,
    _p_create_info: *const vk::DeviceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_device: *mut vk::Device,
) -> vk::Result {
    with_driver(|driver| {
        if let Some(code) = driver.fail_create_device {
            return code;
        }
        let key = NEXT_KEY.fetch_add(0x10, Ordering::Relaxed);
        *p_device = vk::Device::from_raw(alloc_object(key, usize::MAX));
        vk::Result::SUCCESS
    })
}

unsafe extern "system" fn fake_destroy_device(
    device: vk::Device,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_driver(|driver| driver.destroyed_devices.push(device.as_raw()));
}

// ── Loader side ─────────────────────────────────────────────

/// Resolve one of the layer's functions the way the loader does.
pub fn layer_fn<F: Copy>(instance: vk::Instance, name: &CStr) -> F {
    assert_eq!(
        std::mem::size_of::<F>(),
        std::mem::size_of::<unsafe extern "system" fn()>()
    );
    let f = unsafe { vkGetInstanceProcAddr(instance, name.as_ptr()) }
        .unwrap_or_else(|| panic!("layer does not resolve {:?}", name));
    unsafe { std::mem::transmute_copy(&f) }
}

/// Instance create info with the loader's records in its `pNext` chain:
/// an unrelated application struct, a non-link loader record, then the link.
pub struct InstanceChain {
    pub create_info: Box<vk::InstanceCreateInfo<'static>>,
    pub link_record: Box<LayerInstanceCreateInfo>,
    pub callback_record: Box<LayerInstanceCreateInfo>,
    pub validation: Box<vk::ValidationFeaturesEXT<'static>>,
    pub link: Box<LayerInstanceLink>,
}

impl InstanceChain {
    pub fn new() -> Self {
        let mut link = Box::new(LayerInstanceLink {
            p_next: std::ptr::null_mut(),
            pfn_next_get_instance_proc_addr: fake_get_instance_proc_addr,
            pfn_next_get_physical_device_proc_addr: None,
        });
        let link_record = Box::new(LayerInstanceCreateInfo {
            s_type: LOADER_INSTANCE_CREATE_INFO,
            p_next: std::ptr::null(),
            function: LayerFunction::LINK_INFO,
            u: InstancePayload {
                layer_info: &mut *link,
            },
        });
        let callback_record = Box::new(LayerInstanceCreateInfo {
            s_type: LOADER_INSTANCE_CREATE_INFO,
            p_next: &*link_record as *const LayerInstanceCreateInfo as *const c_void,
            function: LayerFunction::LOADER_DATA_CALLBACK,
            u: InstancePayload {
                set_instance_loader_data: std::ptr::null(),
            },
        });
        let mut validation = Box::new(vk::ValidationFeaturesEXT::default());
        validation.p_next = &*callback_record as *const LayerInstanceCreateInfo as *const c_void;
        let mut create_info = Box::new(vk::InstanceCreateInfo::default());
        create_info.p_next = &*validation as *const vk::ValidationFeaturesEXT<'_> as *const c_void;

        Self {
            create_info,
            link_record,
            callback_record,
            validation,
            link,
        }
    }

    /// A chain without any loader link record.
    pub fn without_link() -> Self {
        let mut chain = Self::new();
        chain.validation.p_next = std::ptr::null();
        chain
    }

    /// Current head of the link list in the link record.
    pub fn link_head(&self) -> *mut LayerInstanceLink {
        unsafe { self.link_record.u.layer_info }
    }

    pub fn link_ptr(&self) -> *const LayerInstanceLink {
        &*self.link
    }
}

pub struct DeviceChain {
    pub create_info: Box<vk::DeviceCreateInfo<'static>>,
    pub link_record: Box<LayerDeviceCreateInfo>,
    pub link: Box<LayerDeviceLink>,
}

impl DeviceChain {
    pub fn new() -> Self {
        let mut link = Box::new(LayerDeviceLink {
            p_next: std::ptr::null_mut(),
            pfn_next_get_instance_proc_addr: fake_get_instance_proc_addr,
            pfn_next_get_device_proc_addr: fake_get_device_proc_addr,
        });
        let link_record = Box::new(LayerDeviceCreateInfo {
            s_type: LOADER_DEVICE_CREATE_INFO,
            p_next: std::ptr::null(),
            function: LayerFunction::LINK_INFO,
            u: DevicePayload {
                layer_info: &mut *link,
            },
        });
        let mut create_info = Box::new(vk::DeviceCreateInfo::default());
        create_info.p_next = &*link_record as *const LayerDeviceCreateInfo as *const c_void;

        Self {
            create_info,
            link_record,
            link,
        }
    }

    pub fn link_head(&self) -> *mut LayerDeviceLink {
        unsafe { self.link_record.u.layer_info }
    }
}

/// Create an instance through the layer with a fresh chain.
pub fn create_instance() -> Result<vk::Instance, vk::Result> {
    let chain = InstanceChain::new();
    create_instance_with(&chain)
}

pub fn create_instance_with(chain: &InstanceChain) -> Result<vk::Instance, vk::Result> {
    let create: vk::PFN_vkCreateInstance = layer_fn(vk::Instance::null(), c"vkCreateInstance");
    let mut instance = vk::Instance::null();
    let result = unsafe { create(&*chain.create_info, std::ptr::null(), &mut instance) };
    result.result_with_success(instance)
}

pub fn destroy_instance(instance: vk::Instance) {
    let destroy: vk::PFN_vkDestroyInstance = layer_fn(instance, c"vkDestroyInstance");
    unsafe { destroy(instance, std::ptr::null()) };
}

/// Enumerate physical devices through the layer with the two-phase query.
pub fn enumerate_devices(instance: vk::Instance) -> Result<Vec<vk::PhysicalDevice>, vk::Result> {
    let enumerate: vk::PFN_vkEnumeratePhysicalDevices =
        layer_fn(instance, c"vkEnumeratePhysicalDevices");
    let mut count = 0u32;
    unsafe { enumerate(instance, &mut count, std::ptr::null_mut()) }.result()?;
    let mut devices = vec![vk::PhysicalDevice::null(); count as usize];
    unsafe { enumerate(instance, &mut count, devices.as_mut_ptr()) }.result()?;
    devices.truncate(count as usize);
    Ok(devices)
}

/// Enumerate device groups through the layer with the two-phase query.
pub fn enumerate_groups(
    instance: vk::Instance,
    name: &CStr,
) -> Result<Vec<vk::PhysicalDeviceGroupProperties<'static>>, vk::Result> {
    let enumerate: vk::PFN_vkEnumeratePhysicalDeviceGroups = layer_fn(instance, name);
    let mut count = 0u32;
    unsafe { enumerate(instance, &mut count, std::ptr::null_mut()) }.result()?;
    let mut groups = vec![vk::PhysicalDeviceGroupProperties::default(); count as usize];
    unsafe { enumerate(instance, &mut count, groups.as_mut_ptr()) }.result()?;
    groups.truncate(count as usize);
    Ok(groups)
}
