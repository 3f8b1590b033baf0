use crate::{
    crd::{
        preference::FirmwarePreferences,
        virtual_machine::{Bios, Bootloader, Efi, Firmware},
    },
    merge::Merge,
};

/// Picks a bootloader for targets that didn't choose one.
///
/// `preferredEfi` wins over every other setting. Without it, `preferredUseBios` and the
/// deprecated `preferredUseEfi` select the bootloader, and the serial console and secure boot
/// defaults are applied to whatever bootloader ends up selected.
pub(super) fn apply_firmware(preferences: &FirmwarePreferences, firmware: &mut Option<Firmware>) {
    let firmware = firmware.get_or_insert_with(Firmware::default);
    let bootloader = firmware.bootloader.get_or_insert_with(Bootloader::default);

    if let Some(efi) = &preferences.preferred_efi
        && bootloader.efi.is_none()
        && bootloader.bios.is_none()
    {
        bootloader.efi = Some(efi.clone());
        return;
    }

    if preferences.preferred_use_bios == Some(true)
        && bootloader.bios.is_none()
        && bootloader.efi.is_none()
    {
        bootloader.bios = Some(Bios::default());
    }
    if let Some(bios) = &mut bootloader.bios {
        bios.use_serial.merge(&preferences.preferred_use_bios_serial);
    }

    if preferences.deprecated_preferred_use_efi == Some(true)
        && bootloader.efi.is_none()
        && bootloader.bios.is_none()
    {
        bootloader.efi = Some(Efi::default());
    }
    if let Some(efi) = &mut bootloader.efi {
        efi.secure_boot
            .merge(&preferences.deprecated_preferred_use_secure_boot);
    }
}
