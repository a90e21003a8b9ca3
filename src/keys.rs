//! Identifiers shared between the COM DLL and the installer.
//! GUIDs are kept as `u128` so registry plans can be built on any host.

/// AppID of the 64-bit preview host (`prevhost.exe`).
///
/// The preview handler CLSID points its `AppID` value here so Explorer hosts
/// it out of process in the stock surrogate.
pub const PREVHOST_APPID_X64: u128 = 0x6D2B5079_2F0B_48DD_AB7F_97CEC514D30B;

/// Shell thumbnail provider category.
/// - `CLSID\{clsid}\Implemented Categories\{SHELL_THUMB_HANDLER_CATID}`
/// - `<.ext | ProgID>\ShellEx\{SHELL_THUMB_HANDLER_CATID}` = `{clsid}`
pub const SHELL_THUMB_HANDLER_CATID: u128 = 0xE357FCCD_A995_4576_B01F_234630154E96;

/// Shell preview handler category.
pub const SHELL_PREVIEW_HANDLER_CATID: u128 = 0x8895B1C6_B41F_4C1C_A562_0D564250836F;

pub const CLSID_FLIF_THUMB: u128 = 0x4A6C1B2E_93D5_4F0A_8E27_5C1F0B9D3A61;
pub const CLSID_FLIF_PROPERTIES: u128 = 0x7E3D9A10_2B64_4C8F_A1D3_96E0F4B52C78;
pub const CLSID_FLIF_PREVIEW: u128 = 0xC51F8E42_6A0D_4B3E_9F72_1D8B6E30A5F4;
pub const CLSID_FLIF_DECODER: u128 = 0x2F8B6D13_5C47_4E9A_B0D6_83A1E47C592B;

/// WIC component category every bitmap decoder is listed under
/// (`CLSID\{CATID}\Instance\{clsid}`).
pub const CATID_WIC_BITMAP_DECODERS: u128 = 0x7ED96837_96F0_4812_B211_F13C24117ED3;
/// Container format reported by the WIC decoder; shared with other FLIF codecs.
pub const GUID_CONTAINER_FORMAT_FLIF: u128 = 0x3B9D0588_14A5_4DF3_9C53_7EFCF8BFD65D;
pub const WIC_VENDOR_ID: u128 = 0x5E1A7C39_0D84_4B6F_9A2E_C7305B18F4D6;
/// `GUID_WICPixelFormat32bppRGBA`, the only format the decoder hands out.
pub const WIC_PIXEL_FORMAT_RGBA: u128 = 0xF5C7AD2D_6A8D_43DD_A7A8_A29935261AE9;

pub const DEFAULT_EXT: &str = ".flif";
pub const DEFAULT_PROGID: &str = "FLIF.Image";
pub const CONTENT_TYPE: &str = "image/flif";
pub const PERCEIVED_TYPE: &str = "image";
pub const KIND: &str = "Picture";

pub const PROGID_FRIENDLY_NAME: &str = "FLIF Image";
pub const THUMB_FRIENDLY_NAME: &str = "FLIF Thumbnail Provider";
pub const PROPERTIES_FRIENDLY_NAME: &str = "FLIF Property Handler";
pub const PREVIEW_FRIENDLY_NAME: &str = "FLIF Preview Handler";
pub const DECODER_FRIENDLY_NAME: &str = "FLIF Decoder";

/// Per-user settings key, relative to HKCU.
pub const LOG_SETTINGS_SUBKEY: &str = r"Software\flif-shell-win";
/// DWORD, 1 = file logging on.
pub const LOGGING_VALUE_NAME: &str = "LogEnabled";

/// `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`, upper-case, with braces.
pub fn guid_braced_upper(value: u128) -> String {
    let hex = format!("{value:032X}");
    format!(
        "{{{}-{}-{}-{}-{}}}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[inline]
pub fn clsid_str() -> String {
    guid_braced_upper(CLSID_FLIF_THUMB)
}

#[inline]
pub fn properties_clsid_str() -> String {
    guid_braced_upper(CLSID_FLIF_PROPERTIES)
}

#[inline]
pub fn preview_clsid_str() -> String {
    guid_braced_upper(CLSID_FLIF_PREVIEW)
}

#[inline]
pub fn decoder_clsid_str() -> String {
    guid_braced_upper(CLSID_FLIF_DECODER)
}

#[inline]
pub fn shell_thumb_handler_catid_str() -> String {
    guid_braced_upper(SHELL_THUMB_HANDLER_CATID)
}

#[inline]
pub fn shell_preview_handler_catid_str() -> String {
    guid_braced_upper(SHELL_PREVIEW_HANDLER_CATID)
}
