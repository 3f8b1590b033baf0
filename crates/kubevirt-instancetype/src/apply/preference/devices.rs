use crate::{
    crd::{
        preference::DevicePreferences,
        virtual_machine::{Devices, Disk, DiskTarget, Input, Interface, Network},
    },
    merge::Merge,
};

pub(super) fn apply_devices(
    preferences: &DevicePreferences,
    devices: &mut Devices,
    networks: &[Network],
) {
    devices
        .autoattach_graphics_device
        .merge(&preferences.preferred_autoattach_graphics_device);
    devices
        .autoattach_mem_balloon
        .merge(&preferences.preferred_autoattach_mem_balloon);
    devices
        .autoattach_pod_interface
        .merge(&preferences.preferred_autoattach_pod_interface);
    devices
        .autoattach_serial_console
        .merge(&preferences.preferred_autoattach_serial_console);
    devices
        .autoattach_input_device
        .merge(&preferences.preferred_autoattach_input_device);
    devices
        .use_virtio_transitional
        .merge(&preferences.preferred_use_virtio_transitional);
    devices
        .block_multi_queue
        .merge(&preferences.preferred_block_multi_queue);
    devices
        .network_interface_multi_queue
        .merge(&preferences.preferred_network_interface_multi_queue);

    // A plain bool without an unset state
    if let Some(disable_hotplug) = preferences.preferred_disable_hotplug {
        devices.disable_hotplug = disable_hotplug;
    }

    if let Some(sound) = &mut devices.sound {
        sound.model.merge(&preferences.preferred_sound_model);
    }
    devices.rng.merge(&preferences.preferred_rng);
    devices.tpm.merge(&preferences.preferred_tpm);

    for gpu in &mut devices.gpus {
        gpu.virtual_gpu_options
            .merge(&preferences.preferred_virtual_gpu_options);
    }
    for panic_device in &mut devices.panic_devices {
        panic_device
            .model
            .merge(&preferences.preferred_panic_device_model);
    }

    for disk in &mut devices.disks {
        apply_disk(preferences, disk);
    }
    for interface in &mut devices.interfaces {
        apply_interface(preferences, interface, networks);
    }
    for input in &mut devices.inputs {
        apply_input(preferences, input);
    }
}

/// Disks without a target become plain disks before the bus defaults are applied.
fn apply_disk(preferences: &DevicePreferences, disk: &mut Disk) {
    if disk.target.is_unset() {
        disk.target.disk = Some(DiskTarget::default());
    }

    if let Some(target) = &mut disk.target.disk {
        target.bus.merge(&preferences.preferred_disk_bus);
        disk.block_size.merge(&preferences.preferred_disk_block_size);
        disk.cache.merge(&preferences.preferred_disk_cache);
        disk.io.merge(&preferences.preferred_disk_io);
        disk.dedicated_io_thread
            .merge(&preferences.preferred_disk_dedicated_io_thread);
    } else if let Some(target) = &mut disk.target.cdrom {
        target.bus.merge(&preferences.preferred_cdrom_bus);
    } else if let Some(target) = &mut disk.target.lun {
        target.bus.merge(&preferences.preferred_lun_bus);
    }
}

fn apply_interface(preferences: &DevicePreferences, interface: &mut Interface, networks: &[Network]) {
    interface.model.merge(&preferences.preferred_interface_model);

    if preferences.preferred_interface_masquerade.is_some()
        && interface.is_binding_unset()
        && networks
            .iter()
            .any(|network| network.name == interface.name && network.is_pod_network())
    {
        interface
            .binding_method
            .masquerade
            .clone_from(&preferences.preferred_interface_masquerade);
    }
}

fn apply_input(preferences: &DevicePreferences, input: &mut Input) {
    input.bus.merge(&preferences.preferred_input_bus);
    input.input_type.merge(&preferences.preferred_input_type);
}
